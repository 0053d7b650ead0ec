use crossterm::event::{KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

use crate::palette::{pad_to, query_line, separator_line, Selector, SelectorKey};
use crate::pane::{KeyOutcome, PaneContent, PaneCtx, PaneRequest};

/// Community idiom library, published as a TSV table.
pub const IDIOM_TABLE_URL: &str =
    "https://raw.githubusercontent.com/abrudz/aplcart/master/table.tsv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdiomEntry {
    pub syntax: String,
    pub description: String,
    pub keywords: String,
}

/// Parse the idiom TSV: a header row, then one entry per line with the
/// syntax, description and (seventh column) keywords.
pub fn parse_idiom_table(body: &str) -> Vec<IdiomEntry> {
    body.lines()
        .skip(1)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 7 {
                return None;
            }
            Some(IdiomEntry {
                syntax: fields[0].to_string(),
                description: fields[1].to_string(),
                keywords: fields[6].to_string(),
            })
        })
        .collect()
}

/// Blocking fetch, run from a one-shot worker thread.
pub fn fetch_idiom_table(url: &str) -> Result<Vec<IdiomEntry>, String> {
    let body = reqwest::blocking::get(url)
        .and_then(reqwest::blocking::Response::error_for_status)
        .and_then(|response| response.text())
        .map_err(|err| err.to_string())?;
    Ok(parse_idiom_table(&body))
}

/// Searchable idiom list, lazily fetched; Enter inserts the syntax at the
/// session caret.
pub struct IdiomSearch {
    entries: Vec<IdiomEntry>,
    filtered: Vec<usize>,
    sel: Selector,
    loading: bool,
    error: Option<String>,
}

impl Default for IdiomSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl IdiomSearch {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            filtered: Vec::new(),
            sel: Selector::default(),
            loading: true,
            error: None,
        }
    }

    pub fn set_data(&mut self, result: Result<Vec<IdiomEntry>, String>) {
        self.loading = false;
        match result {
            Ok(entries) => {
                self.entries = entries;
                self.error = None;
            }
            Err(err) => self.error = Some(err),
        }
        self.refilter();
    }

    fn refilter(&mut self) {
        let query = self.sel.query.to_lowercase();
        self.filtered = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                query.is_empty()
                    || e.syntax.to_lowercase().contains(&query)
                    || e.description.to_lowercase().contains(&query)
                    || e.keywords.to_lowercase().contains(&query)
            })
            .map(|(idx, _)| idx)
            .collect();
        self.sel.clamp(self.filtered.len());
    }
}

impl PaneContent for IdiomSearch {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn title(&self, _ctx: &PaneCtx<'_>) -> String {
        "Idioms".to_string()
    }

    fn render(&mut self, w: u16, h: u16, ctx: &mut PaneCtx<'_>) -> Text<'static> {
        if self.loading {
            return Text::from(Span::styled(
                "Loading idiom table...",
                Style::default().fg(Color::DarkGray),
            ));
        }
        if let Some(err) = &self.error {
            return Text::from(Span::styled(
                format!("Fetch failed: {err}"),
                Style::default().fg(Color::Red),
            ));
        }

        let mut prompt = query_line("/ ", &self.sel.query, ctx.accent);
        prompt.spans.push(Span::styled(
            format!("  ({})", self.filtered.len()),
            Style::default().fg(Color::DarkGray),
        ));
        let mut lines = vec![prompt, separator_line(w)];

        let list_h = (h as usize).saturating_sub(2);
        self.sel.adjust_scroll(list_h);

        let syntax_w = ((w as usize) / 3).max(12);
        let max_desc = (w as usize).saturating_sub(syntax_w + 1).max(8);
        let syntax_style = Style::default().fg(ctx.accent).add_modifier(Modifier::BOLD);
        let selected_style = Style::default().bg(ctx.accent).fg(Color::Black);
        let desc_style = Style::default().fg(Color::Gray);

        for (row, &idx) in self
            .filtered
            .iter()
            .enumerate()
            .skip(self.sel.scroll)
            .take(list_h)
        {
            let entry = &self.entries[idx];
            let syntax = pad_to(&entry.syntax, syntax_w);
            let syntax_span = if row == self.sel.selected {
                Span::styled(syntax, selected_style)
            } else {
                Span::styled(syntax, syntax_style)
            };
            let mut desc = entry.description.clone();
            if desc.chars().count() > max_desc {
                desc = desc.chars().take(max_desc - 1).collect::<String>() + "…";
            }
            lines.push(Line::from(vec![
                syntax_span,
                Span::raw(" "),
                Span::styled(desc, desc_style),
            ]));
        }
        Text::from(lines)
    }

    fn handle_key(&mut self, key: KeyEvent, _ctx: &mut PaneCtx<'_>) -> KeyOutcome {
        if self.loading || self.error.is_some() {
            return KeyOutcome::ignored();
        }
        match self.sel.handle_key(key, self.filtered.len()) {
            SelectorKey::Chosen(row) => {
                let syntax = self.entries[self.filtered[row]].syntax.clone();
                KeyOutcome::request(PaneRequest::InsertText(syntax))
            }
            SelectorKey::Handled => {
                self.refilter();
                KeyOutcome::consumed()
            }
            SelectorKey::Ignored => KeyOutcome::ignored(),
        }
    }

    fn handle_mouse(
        &mut self,
        _x: u16,
        y: u16,
        event: MouseEvent,
        _ctx: &mut PaneCtx<'_>,
    ) -> Option<PaneRequest> {
        if self.loading || self.error.is_some() {
            return None;
        }
        if event.kind != MouseEventKind::Down(MouseButton::Left) {
            return None;
        }
        let row = self.sel.row_at(y, self.filtered.len())?;
        self.sel.selected = row;
        Some(PaneRequest::InsertText(
            self.entries[self.filtered[row]].syntax.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "syntax\tdescription\tclass\ttype\tgroup\tcategory\tkeywords\n\
⍳≢x\tIndices of x\tA\tB\tC\tD\tindices count\n\
short\trow\n\
{⍵[⍋⍵]}x\tSort x ascending\tA\tB\tC\tD\tsort ascending\n";

    #[test]
    fn tsv_parse_skips_header_and_short_rows() {
        let entries = parse_idiom_table(TABLE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].syntax, "⍳≢x");
        assert_eq!(entries[0].keywords, "indices count");
        assert_eq!(entries[1].description, "Sort x ascending");
    }

    #[test]
    fn filter_covers_syntax_description_and_keywords() {
        let mut search = IdiomSearch::new();
        search.set_data(Ok(parse_idiom_table(TABLE)));
        search.sel.query = "ascending".to_string();
        search.refilter();
        assert_eq!(search.filtered.len(), 1);
        assert_eq!(search.entries[search.filtered[0]].syntax, "{⍵[⍋⍵]}x");
    }
}
