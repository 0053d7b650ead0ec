use ratatui::buffer::Buffer;
use ratatui::style::{Color, Modifier, Style};

use crate::pane::put_str;

/// The completion popup. Borderless; rendered over everything else while
/// the session or an editor stays focused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Autocomplete {
    pub options: Vec<String>,
    pub selected: usize,
    /// Characters to replace before the caret.
    pub skip: usize,
    /// Owning window token, 0 for the session.
    pub token: i64,
    /// Caret column when the completion was requested.
    pub trigger_col: usize,
}

impl Autocomplete {
    pub fn new(options: Vec<String>, skip: usize, token: i64, trigger_col: usize) -> Self {
        Self {
            options,
            selected: 0,
            skip,
            token,
            trigger_col,
        }
    }

    pub fn cycle_next(&mut self) {
        if !self.options.is_empty() {
            self.selected = (self.selected + 1) % self.options.len();
        }
    }

    pub fn cycle_prev(&mut self) {
        if !self.options.is_empty() {
            self.selected = (self.selected + self.options.len() - 1) % self.options.len();
        }
    }

    pub fn selected_option(&self) -> &str {
        self.options
            .get(self.selected)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn width(&self) -> u16 {
        self.options
            .iter()
            .map(|opt| opt.chars().count())
            .max()
            .unwrap_or(0)
            .clamp(10, 60) as u16
    }

    /// Draw the popup near the caret: below it when there is room,
    /// otherwise above.
    pub fn draw(&self, buf: &mut Buffer, caret_x: u16, caret_y: u16, accent: Color) {
        if self.options.is_empty() {
            return;
        }
        let screen_w = buf.area.width;
        let screen_h = buf.area.height;
        let width = self.width().min(screen_w);
        let below = screen_h.saturating_sub(caret_y + 1);
        let above = caret_y;
        let max_h = below.max(above).min(8) as usize;
        let height = self.options.len().min(max_h.max(1));

        let y0 = if (below as usize) >= height {
            caret_y + 1
        } else {
            caret_y.saturating_sub(height as u16)
        };
        let x0 = caret_x.min(screen_w.saturating_sub(width)) as i32;

        let scroll = if self.selected >= height {
            self.selected + 1 - height
        } else {
            0
        };

        let normal = Style::default().bg(Color::DarkGray).fg(Color::White);
        let selected = Style::default().bg(accent).fg(Color::Black).add_modifier(Modifier::BOLD);
        for (row, (idx, option)) in self
            .options
            .iter()
            .enumerate()
            .skip(scroll)
            .take(height)
            .enumerate()
        {
            let mut text: String = option.chars().take(width as usize).collect();
            while text.chars().count() < width as usize {
                text.push(' ');
            }
            let style = if idx == self.selected { selected } else { normal };
            put_str(buf, x0, y0 as i32 + row as i32, &text, style);
        }
    }
}

/// Replace `skip` characters before `col` with the chosen option.
/// Returns the new text and caret column.
pub fn apply_completion(text: &str, col: usize, skip: usize, option: &str) -> (String, usize) {
    let chars: Vec<char> = text.chars().collect();
    let col = col.min(chars.len());
    let start = col.saturating_sub(skip);
    let mut out: String = chars[..start].iter().collect();
    out.push_str(option);
    let new_col = start + option.chars().count();
    out.extend(chars[col..].iter());
    (out, new_col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycling_wraps_both_ways() {
        let mut ac = Autocomplete::new(
            vec!["alpha".to_string(), "alphabet".to_string(), "alpine".to_string()],
            2,
            0,
            8,
        );
        ac.cycle_prev();
        assert_eq!(ac.selected, 2);
        ac.cycle_next();
        assert_eq!(ac.selected, 0);
        ac.cycle_next();
        assert_eq!(ac.selected, 1);
        assert_eq!(ac.selected_option(), "alphabet");
    }

    #[test]
    fn completion_replaces_exactly_skip_characters() {
        let (text, col) = apply_completion("      zeta", 10, 4, "zetaUnique");
        assert_eq!(text, "      zetaUnique");
        assert_eq!(col, 16);
    }

    #[test]
    fn completion_preserves_the_line_tail() {
        let (text, col) = apply_completion("x←al+1", 4, 2, "alpha");
        assert_eq!(text, "x←alpha+1");
        assert_eq!(col, 7);
    }

    #[test]
    fn zero_skip_inserts_without_deleting() {
        let (text, col) = apply_completion("abc", 1, 0, "Z");
        assert_eq!(text, "aZbc");
        assert_eq!(col, 2);
    }
}
