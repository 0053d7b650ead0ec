use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crossterm::event::{KeyCode, KeyEvent, MouseEvent, MouseEventKind};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use regex::Regex;
use serde::Deserialize;

use crate::pane::{KeyOutcome, PaneContent, PaneCtx, PaneRequest};

/// One bundled document: navigation path, source file and markdown body.
#[derive(Debug, Clone, Deserialize)]
pub struct DocEntry {
    pub path: String,
    pub file: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelpEntry {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub url: String,
    pub path: String,
}

#[derive(Debug, Deserialize)]
struct StoreFile {
    docs: Vec<DocEntry>,
    #[serde(default)]
    help_urls: Vec<HelpEntry>,
}

/// The on-disk documentation store produced by the bundling utility.
/// Two tables: documents keyed by navigation path, and help-URL/symbol
/// associations pointing back into them. Read-only at runtime.
pub struct DocStore {
    by_path: HashMap<String, DocEntry>,
    file_to_path: HashMap<String, String>,
    help: Vec<HelpEntry>,
}

impl DocStore {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let store: StoreFile = serde_json::from_str(&text)?;
        Ok(Self::from_entries(store.docs, store.help_urls))
    }

    pub fn from_entries(docs: Vec<DocEntry>, help: Vec<HelpEntry>) -> Self {
        let mut by_path = HashMap::new();
        let mut file_to_path = HashMap::new();
        for doc in docs {
            file_to_path.insert(doc.file.clone(), doc.path.clone());
            by_path.insert(doc.path.clone(), doc);
        }
        Self {
            by_path,
            file_to_path,
            help,
        }
    }

    /// Store discovery: `./dyad-docs.json`, then the per-user data dir.
    pub fn open_default() -> Option<Self> {
        for path in Self::search_paths() {
            if path.exists() {
                match Self::load(&path) {
                    Ok(store) => return Some(store),
                    Err(err) => {
                        tracing::warn!(path = %path.display(), %err, "unreadable docs store")
                    }
                }
            }
        }
        None
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("dyad-docs.json")];
        let data_home = std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share"))
            });
        if let Some(dir) = data_home {
            paths.push(dir.join("dyad").join("dyad-docs.json"));
        }
        paths
    }

    pub fn by_path(&self, path: &str) -> Option<&DocEntry> {
        self.by_path.get(path)
    }

    pub fn by_file(&self, file: &str) -> Option<&DocEntry> {
        let path = self.file_to_path.get(file)?;
        self.by_path.get(path)
    }

    /// First document, used as the index page.
    pub fn index(&self) -> Option<&DocEntry> {
        self.by_path
            .keys()
            .min()
            .and_then(|path| self.by_path.get(path))
    }

    /// Help lookup for a glyph under the caret.
    pub fn by_symbol(&self, symbol: &str) -> Option<&DocEntry> {
        let entry = self.help.iter().find(|h| h.symbol == symbol)?;
        self.resolve_help(&entry.path)
    }

    /// Best-effort URL association: an exact path hit, then a prefix
    /// match over navigation paths. Some help entries point at
    /// disambiguation pages absent from the contents table; a miss is
    /// not an error.
    pub fn by_help_url(&self, url: &str) -> Option<&DocEntry> {
        let entry = self.help.iter().find(|h| h.url == url)?;
        self.resolve_help(&entry.path)
    }

    fn resolve_help(&self, path: &str) -> Option<&DocEntry> {
        if let Some(doc) = self.by_path.get(path) {
            return Some(doc);
        }
        self.by_path
            .iter()
            .find(|(candidate, _)| candidate.starts_with(path))
            .map(|(_, doc)| doc)
    }
}

/// An in-repo link rewritten to a «marker» during pre-processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocLink {
    pub display: String,
    /// Resolved file path relative to the documentation root.
    pub file: String,
}

/// Rewrite `[text](relative.md)` links into `«text»` markers, resolving
/// targets against the current file's directory. External links and
/// anchor-only links pass through untouched.
pub fn process_links(markdown: &str, current_file: &str) -> (String, Vec<DocLink>) {
    let link_re = Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("link pattern");
    let dir = Path::new(current_file)
        .parent()
        .unwrap_or_else(|| Path::new(""));
    let mut links = Vec::new();

    let processed = link_re.replace_all(markdown, |caps: &regex::Captures<'_>| {
        let text = &caps[1];
        let mut target = caps[2].to_string();
        if target.starts_with("http://") || target.starts_with("https://") {
            return caps[0].to_string();
        }
        if let Some(anchor) = target.find('#') {
            target.truncate(anchor);
        }
        if target.is_empty() {
            return text.to_string();
        }
        let resolved = normalize_path(&dir.join(&target));
        links.push(DocLink {
            display: text.to_string(),
            file: resolved,
        });
        format!("«{text}»")
    });

    (processed.into_owned(), links)
}

/// Lexical `.`/`..` resolution; targets never escape the root.
fn normalize_path(path: &Path) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.iter() {
        let piece = component.to_str().unwrap_or("");
        match piece {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Minimal markdown to plain lines: headings, bullet lists, fenced code,
/// wrapped paragraphs. Marker-delimited links survive as text for the
/// pane to style.
pub fn render_markdown(markdown: &str, width: usize) -> Vec<String> {
    let width = width.max(10);
    let mut out = Vec::new();
    let mut in_code = false;

    for raw in markdown.lines() {
        if raw.trim_start().starts_with("```") {
            in_code = !in_code;
            continue;
        }
        if in_code {
            out.push(format!("    {raw}"));
            continue;
        }
        let trimmed = raw.trim_end();
        if trimmed.is_empty() {
            out.push(String::new());
            continue;
        }
        if let Some(head) = trimmed.strip_prefix("### ") {
            out.push(format!("· {head}"));
        } else if let Some(head) = trimmed.strip_prefix("## ") {
            out.push(format!("▌ {head}"));
        } else if let Some(head) = trimmed.strip_prefix("# ") {
            out.push(head.to_uppercase());
        } else if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* "))
        {
            wrap_into(&mut out, &format!("• {item}"), width);
        } else {
            wrap_into(&mut out, trimmed, width);
        }
    }
    out
}

fn wrap_into(out: &mut Vec<String>, text: &str, width: usize) {
    let mut line = String::new();
    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.chars().count()
        } else {
            line.chars().count() + 1 + word.chars().count()
        };
        if candidate > width && !line.is_empty() {
            out.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        out.push(line);
    }
}

#[derive(Debug, Clone)]
struct DocHistory {
    path: String,
    file: String,
    scroll: usize,
}

/// Markdown documentation pane: Tab cycles link selection, Enter follows,
/// Backspace pops the in-pane history stack.
pub struct DocPane {
    nav_path: String,
    file: String,
    raw_lines: Vec<String>,
    links: Vec<DocLink>,
    link_pos: Vec<usize>,
    link_idx: Option<usize>,
    scroll: usize,
    width: usize,
    history: Vec<DocHistory>,
}

impl DocPane {
    pub fn new(doc: &DocEntry, width: usize) -> Self {
        let mut pane = Self {
            nav_path: String::new(),
            file: String::new(),
            raw_lines: Vec::new(),
            links: Vec::new(),
            link_pos: Vec::new(),
            link_idx: None,
            scroll: 0,
            width,
            history: Vec::new(),
        };
        pane.load(doc);
        pane
    }

    fn load(&mut self, doc: &DocEntry) {
        let (processed, links) = process_links(&doc.content, &doc.file);
        self.raw_lines = render_markdown(&processed, self.width);
        self.link_pos = find_link_positions(&self.raw_lines, &links);
        self.links = links;
        self.link_idx = None;
        self.scroll = 0;
        self.nav_path = doc.path.clone();
        self.file = doc.file.clone();
    }

    /// Follow the selected link through the store; a dangling target
    /// leaves the pane unchanged.
    pub fn follow_link(&mut self, store: &DocStore) {
        let Some(idx) = self.link_idx else {
            return;
        };
        let Some(link) = self.links.get(idx) else {
            return;
        };
        let Some(doc) = store.by_file(&link.file) else {
            return;
        };
        self.history.push(DocHistory {
            path: self.nav_path.clone(),
            file: self.file.clone(),
            scroll: self.scroll,
        });
        let doc = doc.clone();
        self.load(&doc);
    }

    pub fn go_back(&mut self, store: &DocStore) {
        let Some(prev) = self.history.pop() else {
            return;
        };
        if let Some(doc) = store.by_path(&prev.path) {
            let doc = doc.clone();
            self.load(&doc);
            self.scroll = prev.scroll;
        }
    }

    fn scroll_down(&mut self, n: usize) {
        let max = self.raw_lines.len().saturating_sub(10);
        self.scroll = (self.scroll + n).min(max);
    }

    fn scroll_up(&mut self, n: usize) {
        self.scroll = self.scroll.saturating_sub(n);
    }

    fn cycle_link(&mut self, step: i32) {
        if self.links.is_empty() {
            return;
        }
        let len = self.links.len() as i32;
        let next = match self.link_idx {
            Some(idx) => (idx as i32 + step).rem_euclid(len),
            None if step > 0 => 0,
            None => len - 1,
        };
        self.link_idx = Some(next as usize);
        self.scroll_to_link();
    }

    fn scroll_to_link(&mut self) {
        let Some(idx) = self.link_idx else {
            return;
        };
        let Some(&line) = self.link_pos.get(idx) else {
            return;
        };
        if line < self.scroll + 2 {
            self.scroll = line.saturating_sub(2);
        } else if line > self.scroll + 20 {
            self.scroll = line.saturating_sub(5);
        }
    }

    /// Style one raw line, replacing each «marker» with link styling.
    fn style_line(&self, raw: &str, accent: Color) -> Line<'static> {
        let link_style = Style::default().fg(accent).add_modifier(Modifier::UNDERLINED);
        let selected_style = Style::default()
            .add_modifier(Modifier::UNDERLINED | Modifier::BOLD | Modifier::REVERSED);

        let mut spans = Vec::new();
        let mut rest = raw;
        while let Some(open) = rest.find('«') {
            let Some(close_rel) = rest[open..].find('»') else {
                break;
            };
            let close = open + close_rel;
            if open > 0 {
                spans.push(Span::raw(rest[..open].to_string()));
            }
            let display = &rest[open + '«'.len_utf8()..close];
            let selected = self
                .link_idx
                .and_then(|idx| self.links.get(idx))
                .is_some_and(|link| link.display == display);
            spans.push(Span::styled(
                display.to_string(),
                if selected { selected_style } else { link_style },
            ));
            rest = &rest[close + '»'.len_utf8()..];
        }
        if !rest.is_empty() {
            spans.push(Span::raw(rest.to_string()));
        }
        Line::from(spans)
    }
}

fn find_link_positions(lines: &[String], links: &[DocLink]) -> Vec<usize> {
    let mut positions = vec![0; links.len()];
    let mut found = 0;
    for (idx, line) in lines.iter().enumerate() {
        while found < links.len() && line.contains(&format!("«{}»", links[found].display)) {
            positions[found] = idx;
            found += 1;
        }
    }
    positions
}

impl PaneContent for DocPane {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn title(&self, _ctx: &PaneCtx<'_>) -> String {
        if self.history.is_empty() {
            self.nav_path.clone()
        } else {
            format!("← {}", self.nav_path)
        }
    }

    fn render(&mut self, w: u16, h: u16, ctx: &mut PaneCtx<'_>) -> Text<'static> {
        let h = h as usize;
        let end = (self.scroll + h).min(self.raw_lines.len());
        let mut lines: Vec<Line<'static>> = self.raw_lines[self.scroll..end]
            .iter()
            .map(|raw| self.style_line(raw, ctx.accent))
            .collect();

        if self.raw_lines.len() > h && h > 0 {
            let pos = format!(" {}/{} ", self.scroll + 1, self.raw_lines.len());
            let pad = (w as usize).saturating_sub(pos.chars().count());
            let footer = format!("{}{}", "─".repeat(pad), pos);
            if lines.len() == h {
                lines.pop();
            }
            lines.push(Line::from(Span::styled(
                footer,
                Style::default().fg(Color::DarkGray),
            )));
        }
        Text::from(lines)
    }

    fn handle_key(&mut self, key: KeyEvent, ctx: &mut PaneCtx<'_>) -> KeyOutcome {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.scroll_down(1),
            KeyCode::PageUp => self.scroll_up(20),
            KeyCode::PageDown => self.scroll_down(20),
            KeyCode::Tab => self.cycle_link(1),
            KeyCode::BackTab => self.cycle_link(-1),
            KeyCode::Enter => {
                if let Some(store) = ctx.docs {
                    self.follow_link(store);
                }
            }
            KeyCode::Backspace | KeyCode::Char('b') => {
                if let Some(store) = ctx.docs {
                    self.go_back(store);
                }
            }
            _ => return KeyOutcome::ignored(),
        }
        KeyOutcome::consumed()
    }

    fn handle_mouse(
        &mut self,
        _x: u16,
        _y: u16,
        event: MouseEvent,
        _ctx: &mut PaneCtx<'_>,
    ) -> Option<PaneRequest> {
        match event.kind {
            MouseEventKind::ScrollUp => self.scroll_up(3),
            MouseEventKind::ScrollDown => self.scroll_down(3),
            _ => {}
        }
        None
    }
}
