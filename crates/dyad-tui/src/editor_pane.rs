use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};

use crate::editor::EditorWindow;
use crate::pane::{KeyOutcome, PaneContent, PaneCtx, PaneRequest, TracerCommand};

/// Content for both function editors and the surfaced tracer frame.
///
/// Three modal states: tracer-mode (debugger window, read-only stepping),
/// edit-mode (opted into inside a tracer, or any writable editor), and
/// read-only. The window record itself lives in the application's editor
/// table; this pane only holds view state and looks the record up by
/// token.
pub struct EditorPane {
    token: i64,
    scroll: usize,
}

impl EditorPane {
    pub fn new(token: i64) -> Self {
        Self { token, scroll: 0 }
    }

    pub fn token(&self) -> i64 {
        self.token
    }

    fn gutter_width(w: &EditorWindow) -> usize {
        let max_line = w.text.len().saturating_sub(1);
        // "● [nn] " = marker, space, bracketed number, space.
        format!("[{max_line}]").len() + 3
    }
}

enum Mode {
    Tracer,
    Edit,
    ReadOnly,
}

fn mode_of(w: &EditorWindow) -> Mode {
    if w.debugger && !w.edit_mode {
        Mode::Tracer
    } else if w.read_only && !w.edit_mode {
        Mode::ReadOnly
    } else {
        Mode::Edit
    }
}

impl PaneContent for EditorPane {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn title(&self, ctx: &PaneCtx<'_>) -> String {
        let Some(w) = ctx.editors.get(&self.token) else {
            return String::new();
        };
        let prefix = if w.modified { "* " } else { "" };
        let suffix = if w.debugger {
            if w.edit_mode {
                " [edit]"
            } else {
                " [tracer]"
            }
        } else if w.edit_mode && w.read_only {
            " [edit]"
        } else {
            ""
        };
        format!("{prefix}{}{suffix}", w.name)
    }

    fn render(&mut self, width: u16, height: u16, ctx: &mut PaneCtx<'_>) -> Text<'static> {
        let accent = ctx.accent;
        let Some(w) = ctx.editors.get_mut(&self.token) else {
            return Text::default();
        };
        if w.text.is_empty() {
            w.text.push(String::new());
        }
        let h = height as usize;
        let max_line = w.text.len() - 1;
        let num_width = format!("[{max_line}]").len();

        // Keep the caret in view.
        if w.cursor_row < self.scroll {
            self.scroll = w.cursor_row;
        }
        if w.cursor_row >= self.scroll + h {
            self.scroll = w.cursor_row + 1 - h;
        }

        let gutter = Self::gutter_width(w);
        let content_w = (width as usize).saturating_sub(gutter).max(1);
        let num_style = Style::default().fg(ratatui::style::Color::DarkGray);
        let stop_style = Style::default().fg(accent);
        let cursor_style = Style::default().add_modifier(Modifier::REVERSED);

        let mut lines = Vec::with_capacity(h);
        for i in 0..h {
            let idx = self.scroll + i;
            if idx >= w.text.len() {
                lines.push(Line::default());
                continue;
            }

            let mut spans = Vec::with_capacity(6);
            if w.has_stop(idx) {
                spans.push(Span::styled("●", stop_style));
            } else {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                format!("[{:0width$}]", idx, width = num_width - 2),
                num_style,
            ));
            spans.push(Span::raw(" "));

            let chars: Vec<char> = w.text[idx].chars().collect();
            if idx == w.cursor_row {
                let col = w.cursor_col.min(chars.len());
                let before: String = chars[..col.min(chars.len())].iter().collect();
                if !before.is_empty() {
                    spans.push(Span::raw(before));
                }
                if col < chars.len() {
                    spans.push(Span::styled(chars[col].to_string(), cursor_style));
                    let after: String = chars[col + 1..].iter().collect();
                    if !after.is_empty() {
                        spans.push(Span::raw(after));
                    }
                } else {
                    spans.push(Span::styled(" ", cursor_style));
                }
            } else {
                let text: String = chars.iter().take(content_w).collect();
                spans.push(Span::raw(text));
            }
            lines.push(Line::from(spans));
        }
        Text::from(lines)
    }

    fn handle_key(&mut self, key: KeyEvent, ctx: &mut PaneCtx<'_>) -> KeyOutcome {
        let tracer_keys = ctx.keys.tracer.clone();
        let autocomplete = ctx.keys.autocomplete.clone();
        let Some(w) = ctx.editors.get_mut(&self.token) else {
            return KeyOutcome::ignored();
        };
        let token = self.token;

        match mode_of(w) {
            Mode::Tracer => {
                let step = |cmd| KeyOutcome::request(PaneRequest::Tracer(cmd, token));
                match key.code {
                    KeyCode::Up => cursor_up(w),
                    KeyCode::Down => cursor_down(w),
                    KeyCode::Left => cursor_left(w),
                    KeyCode::Right => cursor_right(w),
                    KeyCode::Home => w.cursor_col = 0,
                    KeyCode::End => w.cursor_col = line_len(w),
                    KeyCode::Enter => return step(TracerCommand::StepOver),
                    KeyCode::Esc => {
                        return KeyOutcome::request(PaneRequest::CloseEditor(token))
                    }
                    KeyCode::Char(ch) => {
                        let keys = &tracer_keys;
                        if keys.step_into == Some(ch) {
                            return step(TracerCommand::StepInto);
                        } else if keys.step_over == Some(ch) {
                            return step(TracerCommand::StepOver);
                        } else if keys.step_out == Some(ch) {
                            return step(TracerCommand::StepOut);
                        } else if keys.resume == Some(ch) {
                            return step(TracerCommand::Resume);
                        } else if keys.resume_all == Some(ch) {
                            return step(TracerCommand::ResumeAll);
                        } else if keys.backward == Some(ch) {
                            return step(TracerCommand::Backward);
                        } else if keys.forward == Some(ch) {
                            return step(TracerCommand::Forward);
                        } else if keys.edit_mode == Some(ch) {
                            w.edit_mode = true;
                        }
                        // Anything else is blocked: tracer mode never
                        // inserts text.
                    }
                    _ => {}
                }
                KeyOutcome::consumed()
            }

            Mode::ReadOnly => {
                match key.code {
                    KeyCode::Up => cursor_up(w),
                    KeyCode::Down => cursor_down(w),
                    KeyCode::Left => cursor_left(w),
                    KeyCode::Right => cursor_right(w),
                    KeyCode::Home => w.cursor_col = 0,
                    KeyCode::End => w.cursor_col = line_len(w),
                    KeyCode::PageUp => {
                        w.cursor_row = w.cursor_row.saturating_sub(10);
                        clamp_col(w);
                    }
                    KeyCode::PageDown => {
                        w.cursor_row = (w.cursor_row + 10).min(w.text.len().saturating_sub(1));
                        clamp_col(w);
                    }
                    KeyCode::Esc => {
                        return KeyOutcome::request(PaneRequest::CloseEditor(token))
                    }
                    _ => return KeyOutcome::ignored(),
                }
                KeyOutcome::consumed()
            }

            Mode::Edit => {
                if autocomplete.matches(key) {
                    return KeyOutcome::request(PaneRequest::Autocomplete {
                        token,
                        line: current_line(w).to_string(),
                        pos: w.cursor_col,
                    });
                }
                match key.code {
                    KeyCode::Up => cursor_up(w),
                    KeyCode::Down => cursor_down(w),
                    KeyCode::Left => cursor_left(w),
                    KeyCode::Right => cursor_right(w),
                    KeyCode::Home => w.cursor_col = 0,
                    KeyCode::End => w.cursor_col = line_len(w),
                    KeyCode::Enter => insert_newline(w),
                    KeyCode::Backspace => delete_back(w),
                    KeyCode::Delete => delete_forward(w),
                    KeyCode::Esc => {
                        // Inside a tracer, Escape only leaves edit mode;
                        // changes stay pending until the window closes.
                        if w.debugger || w.read_only {
                            w.edit_mode = false;
                        } else {
                            return KeyOutcome::request(PaneRequest::CloseEditor(token));
                        }
                    }
                    KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return KeyOutcome::request(PaneRequest::SaveEditor(token));
                    }
                    KeyCode::Char(ch) => insert_char(w, ch),
                    _ => return KeyOutcome::ignored(),
                }
                KeyOutcome::consumed()
            }
        }
    }

    fn handle_mouse(
        &mut self,
        x: u16,
        y: u16,
        event: MouseEvent,
        ctx: &mut PaneCtx<'_>,
    ) -> Option<PaneRequest> {
        let Some(w) = ctx.editors.get_mut(&self.token) else {
            return None;
        };
        match event.kind {
            MouseEventKind::ScrollUp => {
                self.scroll = self.scroll.saturating_sub(1);
            }
            MouseEventKind::ScrollDown => {
                if self.scroll + 1 < w.text.len() {
                    self.scroll += 1;
                }
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let row = self.scroll + y as usize;
                if row < w.text.len() {
                    w.cursor_row = row;
                    let gutter = Self::gutter_width(w);
                    w.cursor_col = (x as usize).saturating_sub(gutter);
                    clamp_col(w);
                }
            }
            _ => {}
        }
        None
    }
}

fn current_line(w: &EditorWindow) -> &str {
    w.line(w.cursor_row)
}

fn line_len(w: &EditorWindow) -> usize {
    current_line(w).chars().count()
}

fn clamp_col(w: &mut EditorWindow) {
    w.cursor_col = w.cursor_col.min(line_len(w));
}

fn cursor_up(w: &mut EditorWindow) {
    if w.cursor_row > 0 {
        w.cursor_row -= 1;
        clamp_col(w);
    }
}

fn cursor_down(w: &mut EditorWindow) {
    if w.cursor_row + 1 < w.text.len() {
        w.cursor_row += 1;
        clamp_col(w);
    }
}

/// Left at column zero wraps to the end of the previous line.
fn cursor_left(w: &mut EditorWindow) {
    if w.cursor_col > 0 {
        w.cursor_col -= 1;
    } else if w.cursor_row > 0 {
        w.cursor_row -= 1;
        w.cursor_col = line_len(w);
    }
}

/// Right at end of line wraps to the start of the next.
fn cursor_right(w: &mut EditorWindow) {
    if w.cursor_col < line_len(w) {
        w.cursor_col += 1;
    } else if w.cursor_row + 1 < w.text.len() {
        w.cursor_row += 1;
        w.cursor_col = 0;
    }
}

pub(crate) fn insert_char(w: &mut EditorWindow, ch: char) {
    let mut chars: Vec<char> = current_line(w).chars().collect();
    let col = w.cursor_col.min(chars.len());
    chars.insert(col, ch);
    w.text[w.cursor_row] = chars.into_iter().collect();
    w.cursor_col = col + 1;
    w.modified = true;
}

/// Backspace at column zero joins onto the previous line.
fn delete_back(w: &mut EditorWindow) {
    if w.cursor_col > 0 {
        let mut chars: Vec<char> = current_line(w).chars().collect();
        let col = w.cursor_col.min(chars.len());
        chars.remove(col - 1);
        w.text[w.cursor_row] = chars.into_iter().collect();
        w.cursor_col = col - 1;
        w.modified = true;
    } else if w.cursor_row > 0 {
        let current = w.text.remove(w.cursor_row);
        w.cursor_row -= 1;
        w.cursor_col = line_len(w);
        w.text[w.cursor_row].push_str(&current);
        w.modified = true;
    }
}

/// Delete at end of line joins the next line up.
fn delete_forward(w: &mut EditorWindow) {
    let len = line_len(w);
    if w.cursor_col < len {
        let mut chars: Vec<char> = current_line(w).chars().collect();
        chars.remove(w.cursor_col);
        w.text[w.cursor_row] = chars.into_iter().collect();
        w.modified = true;
    } else if w.cursor_row + 1 < w.text.len() {
        let next = w.text.remove(w.cursor_row + 1);
        w.text[w.cursor_row].push_str(&next);
        w.modified = true;
    }
}

fn insert_newline(w: &mut EditorWindow) {
    let chars: Vec<char> = current_line(w).chars().collect();
    let col = w.cursor_col.min(chars.len());
    let before: String = chars[..col].iter().collect();
    let after: String = chars[col..].iter().collect();
    w.text[w.cursor_row] = before;
    w.text.insert(w.cursor_row + 1, after);
    w.cursor_row += 1;
    w.cursor_col = 0;
    w.modified = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::keys::KeyMap;
    use crate::logbuf::LogBuffer;
    use crate::tracer::TracerStack;
    use dyad_ride::{parse_payload, Incoming};
    use ratatui::style::Color;
    use std::collections::HashMap;

    struct Fixture {
        editors: HashMap<i64, EditorWindow>,
        tracer: TracerStack,
        log: LogBuffer,
        keys: KeyMap,
    }

    impl Fixture {
        fn new(payload: &str) -> Self {
            let Incoming::Command(msg) = parse_payload(payload) else {
                panic!("expected command payload");
            };
            let w = EditorWindow::from_args(&msg.args);
            let mut editors = HashMap::new();
            editors.insert(w.token, w);
            Self {
                editors,
                tracer: TracerStack::default(),
                log: LogBuffer::default(),
                keys: Config::embedded_default().key_map(),
            }
        }

        fn ctx(&mut self) -> PaneCtx<'_> {
            PaneCtx {
                editors: &mut self.editors,
                tracer: &self.tracer,
                log: &self.log,
                keys: &self.keys,
                docs: None,
                accent: Color::Yellow,
            }
        }

        fn window(&self) -> &EditorWindow {
            self.editors.values().next().unwrap()
        }
    }

    fn press(pane: &mut EditorPane, fx: &mut Fixture, code: KeyCode) -> KeyOutcome {
        pane.handle_key(KeyEvent::from(code), &mut fx.ctx())
    }

    const EDITOR: &str =
        r#"["OpenWindow",{"token":7,"name":"F","text":["foo","ba"],"debugger":0,"readOnly":0}]"#;
    const TRACER: &str =
        r#"["OpenWindow",{"token":9,"name":"Z","text":["Z;a","9÷0"],"debugger":1,"currentRow":1}]"#;

    #[test]
    fn left_wraps_to_the_previous_line_end() {
        let mut fx = Fixture::new(EDITOR);
        let mut pane = EditorPane::new(7);
        fx.editors.get_mut(&7).unwrap().cursor_row = 1;
        press(&mut pane, &mut fx, KeyCode::Left);
        // col was 0 on row 1; wraps to end of "foo"
        assert_eq!(fx.window().cursor_row, 0);
        assert_eq!(fx.window().cursor_col, 3);
    }

    #[test]
    fn right_at_line_end_wraps_to_the_next_line_start() {
        let mut fx = Fixture::new(EDITOR);
        let mut pane = EditorPane::new(7);
        fx.editors.get_mut(&7).unwrap().cursor_col = 3;
        press(&mut pane, &mut fx, KeyCode::Right);
        assert_eq!(fx.window().cursor_row, 1);
        assert_eq!(fx.window().cursor_col, 0);
    }

    #[test]
    fn backspace_at_column_zero_joins_lines() {
        let mut fx = Fixture::new(EDITOR);
        let mut pane = EditorPane::new(7);
        fx.editors.get_mut(&7).unwrap().cursor_row = 1;
        press(&mut pane, &mut fx, KeyCode::Backspace);
        assert_eq!(fx.window().text, vec!["fooba"]);
        assert_eq!(fx.window().cursor_col, 3);
        assert!(fx.window().modified);
    }

    #[test]
    fn newline_splits_at_the_caret() {
        let mut fx = Fixture::new(EDITOR);
        let mut pane = EditorPane::new(7);
        fx.editors.get_mut(&7).unwrap().cursor_col = 1;
        press(&mut pane, &mut fx, KeyCode::Enter);
        assert_eq!(fx.window().text, vec!["f", "oo", "ba"]);
        assert_eq!(fx.window().cursor_row, 1);
        assert_eq!(fx.window().cursor_col, 0);
    }

    #[test]
    fn tracer_mode_blocks_text_and_maps_step_keys() {
        let mut fx = Fixture::new(TRACER);
        let mut pane = EditorPane::new(9);

        let out = press(&mut pane, &mut fx, KeyCode::Char('x'));
        assert!(out.consumed && out.request.is_none());
        assert_eq!(fx.window().text, vec!["Z;a", "9÷0"]);

        let out = press(&mut pane, &mut fx, KeyCode::Char('s'));
        assert_eq!(
            out.request,
            Some(PaneRequest::Tracer(TracerCommand::StepInto, 9))
        );
        let out = press(&mut pane, &mut fx, KeyCode::Enter);
        assert_eq!(
            out.request,
            Some(PaneRequest::Tracer(TracerCommand::StepOver, 9))
        );
        let out = press(&mut pane, &mut fx, KeyCode::Char('c'));
        assert_eq!(
            out.request,
            Some(PaneRequest::Tracer(TracerCommand::Resume, 9))
        );
    }

    #[test]
    fn escape_pops_the_tracer_but_only_leaves_edit_mode() {
        let mut fx = Fixture::new(TRACER);
        let mut pane = EditorPane::new(9);

        press(&mut pane, &mut fx, KeyCode::Char('e'));
        assert!(fx.window().edit_mode);

        let out = press(&mut pane, &mut fx, KeyCode::Esc);
        assert!(out.request.is_none());
        assert!(!fx.window().edit_mode);

        let out = press(&mut pane, &mut fx, KeyCode::Esc);
        assert_eq!(out.request, Some(PaneRequest::CloseEditor(9)));
    }

    #[test]
    fn edit_mode_inside_a_tracer_inserts_text() {
        let mut fx = Fixture::new(TRACER);
        let mut pane = EditorPane::new(9);
        press(&mut pane, &mut fx, KeyCode::Char('e'));
        {
            let w = fx.editors.get_mut(&9).unwrap();
            w.cursor_row = 1;
            w.cursor_col = 0;
        }
        press(&mut pane, &mut fx, KeyCode::Char('⍝'));
        assert_eq!(fx.window().text[1], "⍝9÷0");
        assert!(fx.window().modified);
    }

    #[test]
    fn title_reflects_mode_and_modification() {
        let mut fx = Fixture::new(TRACER);
        let mut pane = EditorPane::new(9);
        assert_eq!(pane.title(&fx.ctx()), "Z [tracer]");
        press(&mut pane, &mut fx, KeyCode::Char('e'));
        assert_eq!(pane.title(&fx.ctx()), "Z [edit]");
        fx.editors.get_mut(&9).unwrap().modified = true;
        assert_eq!(pane.title(&fx.ctx()), "* Z [edit]");
    }

    #[test]
    fn render_marks_breakpoints_and_the_caret() {
        let mut fx = Fixture::new(EDITOR);
        fx.editors.get_mut(&7).unwrap().stop = vec![1];
        let mut pane = EditorPane::new(7);
        let text = pane.render(20, 4, &mut fx.ctx());
        let row0: String = text.lines[0]
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        let row1: String = text.lines[1]
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert!(row0.starts_with("  [0] "));
        assert!(row1.starts_with("● [1] "));
    }
}
