use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

use crate::pane::{KeyOutcome, PaneContent, PaneCtx, PaneRequest};

/// The tracer stack, displayed top frame first. Enter surfaces the
/// selected frame in the tracer pane; the editor table is untouched.
#[derive(Debug, Default)]
pub struct StackPane {
    /// Display index: 0 is the top of the stack.
    selected: usize,
}

impl StackPane {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PaneContent for StackPane {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn title(&self, ctx: &PaneCtx<'_>) -> String {
        format!("stack ({})", ctx.tracer.depth())
    }

    fn render(&mut self, w: u16, h: u16, ctx: &mut PaneCtx<'_>) -> Text<'static> {
        let frames = ctx.tracer.frames(ctx.editors);
        if frames.is_empty() {
            return Text::from(Span::styled(
                "  (no stack)",
                Style::default().fg(Color::Gray),
            ));
        }
        self.selected = self.selected.min(frames.len() - 1);

        let current_style = Style::default().fg(ctx.accent).add_modifier(Modifier::BOLD);
        let selected_style = Style::default().bg(Color::DarkGray);

        let mut lines = Vec::new();
        for (display_idx, frame) in frames.iter().rev().enumerate() {
            if display_idx >= h as usize {
                break;
            }
            let marker = if frame.current { "►" } else { " " };
            let head = format!("{marker}{}[{}] ", frame.name, frame.line);
            let code_w = (w as usize).saturating_sub(head.chars().count());
            let mut code = frame.code.clone();
            if code.chars().count() > code_w && code_w > 3 {
                code = code.chars().take(code_w - 3).collect::<String>() + "...";
            }
            let mut text = head + &code;
            while text.chars().count() < w as usize {
                text.push(' ');
            }

            let style = if display_idx == self.selected {
                selected_style
            } else if frame.current {
                current_style
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(text, style)));
        }
        Text::from(lines)
    }

    fn handle_key(&mut self, key: KeyEvent, ctx: &mut PaneCtx<'_>) -> KeyOutcome {
        let depth = ctx.tracer.depth();
        if depth == 0 {
            return KeyOutcome::ignored();
        }
        match key.code {
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                KeyOutcome::consumed()
            }
            KeyCode::Down => {
                if self.selected + 1 < depth {
                    self.selected += 1;
                }
                KeyOutcome::consumed()
            }
            KeyCode::Enter => {
                let frames = ctx.tracer.frames(ctx.editors);
                let stack_idx = frames.len().saturating_sub(1 + self.selected);
                match frames.get(stack_idx) {
                    Some(frame) => KeyOutcome::request(PaneRequest::SurfaceFrame(frame.token)),
                    None => KeyOutcome::consumed(),
                }
            }
            _ => KeyOutcome::ignored(),
        }
    }

    fn handle_mouse(
        &mut self,
        _x: u16,
        y: u16,
        event: MouseEvent,
        ctx: &mut PaneCtx<'_>,
    ) -> Option<PaneRequest> {
        if event.kind != MouseEventKind::Down(MouseButton::Left) {
            return None;
        }
        let frames = ctx.tracer.frames(ctx.editors);
        if (y as usize) >= frames.len() {
            return None;
        }
        self.selected = y as usize;
        let stack_idx = frames.len() - 1 - self.selected;
        frames
            .get(stack_idx)
            .map(|frame| PaneRequest::SurfaceFrame(frame.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::editor::EditorWindow;
    use crate::logbuf::LogBuffer;
    use crate::tracer::TracerStack;
    use dyad_ride::{parse_payload, Incoming};
    use std::collections::HashMap;

    fn open(editors: &mut HashMap<i64, EditorWindow>, tracer: &mut TracerStack, payload: &str) {
        let Incoming::Command(msg) = parse_payload(payload) else {
            panic!("expected command payload");
        };
        let w = EditorWindow::from_args(&msg.args);
        tracer.push(w.token);
        editors.insert(w.token, w);
    }

    #[test]
    fn enter_surfaces_the_selected_frame_by_token() {
        let mut editors = HashMap::new();
        let mut tracer = TracerStack::default();
        open(&mut editors, &mut tracer,
            r#"["OpenWindow",{"token":10,"name":"X","text":["X","Y"],"debugger":1,"currentRow":1}]"#);
        open(&mut editors, &mut tracer,
            r#"["OpenWindow",{"token":11,"name":"Y","text":["Y","Z"],"debugger":1,"currentRow":1}]"#);
        open(&mut editors, &mut tracer,
            r#"["OpenWindow",{"token":12,"name":"Z","text":["Z","9÷0"],"debugger":1,"currentRow":1}]"#);

        let log = LogBuffer::default();
        let keys = Config::embedded_default().key_map();
        let mut ctx = PaneCtx {
            editors: &mut editors,
            tracer: &tracer,
            log: &log,
            keys: &keys,
            docs: None,
            accent: Color::Yellow,
        };

        let mut pane = StackPane::new();
        assert_eq!(pane.title(&ctx), "stack (3)");

        // Display order is top-first: Z, Y, X. Select Y.
        pane.handle_key(KeyEvent::from(KeyCode::Down), &mut ctx);
        let out = pane.handle_key(KeyEvent::from(KeyCode::Enter), &mut ctx);
        assert_eq!(out.request, Some(PaneRequest::SurfaceFrame(11)));
    }
}
