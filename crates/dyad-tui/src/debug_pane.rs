use crossterm::event::{KeyCode, KeyEvent, MouseEvent, MouseEventKind};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};

use crate::pane::{KeyOutcome, PaneContent, PaneCtx, PaneRequest};

/// Read-only view of the debug ring. Follows the tail until the user
/// scrolls away; End resumes following.
pub struct DebugPane {
    scroll: usize,
    follow: bool,
}

impl Default for DebugPane {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugPane {
    pub fn new() -> Self {
        Self {
            scroll: 0,
            follow: true,
        }
    }
}

impl PaneContent for DebugPane {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn title(&self, _ctx: &PaneCtx<'_>) -> String {
        "debug".to_string()
    }

    fn render(&mut self, w: u16, h: u16, ctx: &mut PaneCtx<'_>) -> Text<'static> {
        let total = ctx.log.len();
        let h = h as usize;
        let max_scroll = total.saturating_sub(h);
        if self.follow {
            self.scroll = max_scroll;
        } else {
            self.scroll = self.scroll.min(max_scroll);
        }

        let lines = ctx
            .log
            .iter()
            .skip(self.scroll)
            .take(h)
            .map(|line| {
                let text: String = line.chars().take(w as usize).collect();
                Line::from(Span::styled(text, Style::default().fg(Color::Gray)))
            })
            .collect::<Vec<_>>();
        Text::from(lines)
    }

    fn handle_key(&mut self, key: KeyEvent, _ctx: &mut PaneCtx<'_>) -> KeyOutcome {
        match key.code {
            KeyCode::Up => {
                self.follow = false;
                self.scroll = self.scroll.saturating_sub(1);
            }
            KeyCode::Down => self.scroll += 1,
            KeyCode::PageUp => {
                self.follow = false;
                self.scroll = self.scroll.saturating_sub(20);
            }
            KeyCode::PageDown => self.scroll += 20,
            KeyCode::Home => {
                self.follow = false;
                self.scroll = 0;
            }
            KeyCode::End => self.follow = true,
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
            MouseEventKind::ScrollUp => {
                self.follow = false;
                self.scroll = self.scroll.saturating_sub(3);
            }
            MouseEventKind::ScrollDown => self.scroll += 3,
            _ => {}
        }
        None
    }
}

/// Static listing of the active key bindings.
pub struct KeysPane {
    rows: Vec<(String, &'static str)>,
}

impl KeysPane {
    pub fn new(rows: Vec<(String, &'static str)>) -> Self {
        Self { rows }
    }
}

impl PaneContent for KeysPane {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn title(&self, _ctx: &PaneCtx<'_>) -> String {
        "keys".to_string()
    }

    fn render(&mut self, _w: u16, h: u16, ctx: &mut PaneCtx<'_>) -> Text<'static> {
        let chord_style = Style::default().fg(ctx.accent);
        let lines = self
            .rows
            .iter()
            .take(h as usize)
            .map(|(chord, action)| {
                Line::from(vec![
                    Span::styled(format!(" {chord:<10}"), chord_style),
                    Span::raw(*action),
                ])
            })
            .collect::<Vec<_>>();
        Text::from(lines)
    }

    fn handle_key(&mut self, _key: KeyEvent, _ctx: &mut PaneCtx<'_>) -> KeyOutcome {
        KeyOutcome::ignored()
    }

    fn handle_mouse(
        &mut self,
        _x: u16,
        _y: u16,
        _event: MouseEvent,
        _ctx: &mut PaneCtx<'_>,
    ) -> Option<PaneRequest> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::logbuf::LogBuffer;

    #[test]
    fn follows_the_tail_until_scrolled_away() {
        let mut log = LogBuffer::default();
        for i in 0..30 {
            log.push(format!("entry {i}"));
        }
        let keys = Config::embedded_default().key_map();
        let mut editors = Default::default();
        let tracer = Default::default();
        let mut ctx = PaneCtx {
            editors: &mut editors,
            tracer: &tracer,
            log: &log,
            keys: &keys,
            docs: None,
            accent: Color::Yellow,
        };

        let mut pane = DebugPane::new();
        let text = pane.render(40, 10, &mut ctx);
        let first: String = text.lines[0].spans[0].content.to_string();
        assert_eq!(first, "entry 20");

        pane.handle_key(KeyEvent::from(KeyCode::Up), &mut ctx);
        let text = pane.render(40, 10, &mut ctx);
        let first: String = text.lines[0].spans[0].content.to_string();
        assert_eq!(first, "entry 19");
    }
}
