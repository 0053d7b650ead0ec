use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};

use crate::pane::{KeyOutcome, PaneContent, PaneCtx, PaneRequest};

/// Which variables the pane lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VarsMode {
    /// Only names declared local in the frame's header.
    #[default]
    Locals,
    /// Everything visible from the frame, locals bulleted.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVar {
    pub name: String,
    pub value: String,
    pub is_local: bool,
}

/// Parse the captured refresh output: one `name = value` row per line.
pub fn parse_var_lines<'a>(
    lines: impl Iterator<Item = &'a str>,
    locals: &[&str],
) -> Vec<LocalVar> {
    lines
        .filter_map(|line| {
            let (name, value) = line.split_once(" = ")?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(LocalVar {
                name: name.to_string(),
                value: value.trim_end().to_string(),
                is_local: locals.contains(&name),
            })
        })
        .collect()
}

/// Variables of the surfaced tracer frame. `~` flips locals/all and asks
/// the dispatcher for a refresh; Enter opens an editor on the variable.
pub struct VariablesPane {
    vars: Vec<LocalVar>,
    selected: usize,
    mode: VarsMode,
    loading: bool,
}

impl Default for VariablesPane {
    fn default() -> Self {
        Self::new()
    }
}

impl VariablesPane {
    pub fn new() -> Self {
        Self {
            vars: Vec::new(),
            selected: 0,
            mode: VarsMode::Locals,
            loading: true,
        }
    }

    pub fn mode(&self) -> VarsMode {
        self.mode
    }

    pub fn set_vars(&mut self, vars: Vec<LocalVar>) {
        self.vars = vars;
        self.loading = false;
        if !self.vars.is_empty() {
            self.selected = self.selected.min(self.vars.len() - 1);
        } else {
            self.selected = 0;
        }
    }

    pub fn clear(&mut self) {
        self.vars.clear();
        self.selected = 0;
        self.loading = false;
    }
}

impl PaneContent for VariablesPane {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn title(&self, _ctx: &PaneCtx<'_>) -> String {
        match self.mode {
            VarsMode::Locals => "variables [local]".to_string(),
            VarsMode::All => "variables [all]".to_string(),
        }
    }

    fn render(&mut self, w: u16, h: u16, ctx: &mut PaneCtx<'_>) -> Text<'static> {
        let dim = Style::default().fg(Color::Gray);
        if self.loading {
            return Text::from(Span::styled("  Loading...", dim));
        }
        if self.vars.is_empty() {
            return Text::from(Span::styled("  (no variables)", dim));
        }

        let name_w = self
            .vars
            .iter()
            .map(|v| v.name.chars().count())
            .max()
            .unwrap_or(0)
            .min((w as usize) / 3)
            .max(1);
        let value_w = (w as usize).saturating_sub(name_w + 5).max(4);
        let selected_style = Style::default().fg(ctx.accent);

        let start = if self.selected >= h as usize {
            self.selected + 1 - h as usize
        } else {
            0
        };

        let mut lines = Vec::new();
        for (idx, var) in self.vars.iter().enumerate().skip(start).take(h as usize) {
            let bullet = if self.mode == VarsMode::All && var.is_local {
                "• "
            } else {
                "  "
            };
            let mut name: String = var.name.chars().take(name_w).collect();
            while name.chars().count() < name_w {
                name.push(' ');
            }
            let mut value = var.value.clone();
            if value.chars().count() > value_w {
                value = value.chars().take(value_w.saturating_sub(3)).collect::<String>() + "...";
            }
            let style = if idx == self.selected {
                selected_style
            } else {
                dim
            };
            lines.push(Line::from(Span::styled(
                format!("{bullet}{name} = {value}"),
                style,
            )));
        }
        Text::from(lines)
    }

    fn handle_key(&mut self, key: KeyEvent, _ctx: &mut PaneCtx<'_>) -> KeyOutcome {
        match key.code {
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                KeyOutcome::consumed()
            }
            KeyCode::Down => {
                if !self.vars.is_empty() && self.selected + 1 < self.vars.len() {
                    self.selected += 1;
                }
                KeyOutcome::consumed()
            }
            KeyCode::Enter => match self.vars.get(self.selected) {
                Some(var) => KeyOutcome::request(PaneRequest::OpenVariable(var.name.clone())),
                None => KeyOutcome::consumed(),
            },
            KeyCode::Char('~') => {
                self.mode = match self.mode {
                    VarsMode::Locals => VarsMode::All,
                    VarsMode::All => VarsMode::Locals,
                };
                self.loading = true;
                KeyOutcome::request(PaneRequest::RefreshVariables(self.mode))
            }
            _ => KeyOutcome::ignored(),
        }
    }

    fn handle_mouse(
        &mut self,
        _x: u16,
        y: u16,
        event: MouseEvent,
        _ctx: &mut PaneCtx<'_>,
    ) -> Option<PaneRequest> {
        if event.kind == MouseEventKind::Down(MouseButton::Left) && (y as usize) < self.vars.len()
        {
            self.selected = y as usize;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_value_rows_and_marks_locals() {
        let captured = ["a = 42", "b = hello", "yvar = 123", "junk row"];
        let vars = parse_var_lines(captured.into_iter(), &["a", "b"]);
        assert_eq!(vars.len(), 3);
        assert!(vars[0].is_local);
        assert_eq!(vars[1].value, "hello");
        assert!(!vars[2].is_local);
    }

    #[test]
    fn tilde_flips_mode_and_requests_a_refresh() {
        let mut pane = VariablesPane::new();
        pane.set_vars(vec![LocalVar {
            name: "a".to_string(),
            value: "1".to_string(),
            is_local: true,
        }]);
        let out = pane.handle_key(
            KeyEvent::from(KeyCode::Char('~')),
            &mut crate::pane::PaneCtx {
                editors: &mut Default::default(),
                tracer: &Default::default(),
                log: &Default::default(),
                keys: &crate::config::Config::embedded_default().key_map(),
                docs: None,
                accent: Color::Yellow,
            },
        );
        assert_eq!(
            out.request,
            Some(PaneRequest::RefreshVariables(VarsMode::All))
        );
        assert_eq!(pane.mode(), VarsMode::All);
        assert!(pane.loading);
    }

    #[test]
    fn enter_opens_the_selected_variable() {
        let mut pane = VariablesPane::new();
        pane.set_vars(vec![
            LocalVar {
                name: "a".to_string(),
                value: "42".to_string(),
                is_local: true,
            },
            LocalVar {
                name: "b".to_string(),
                value: "hello".to_string(),
                is_local: true,
            },
        ]);
        let mut ctx = crate::pane::PaneCtx {
            editors: &mut Default::default(),
            tracer: &Default::default(),
            log: &Default::default(),
            keys: &crate::config::Config::embedded_default().key_map(),
            docs: None,
            accent: Color::Yellow,
        };
        pane.handle_key(KeyEvent::from(KeyCode::Down), &mut ctx);
        let out = pane.handle_key(KeyEvent::from(KeyCode::Enter), &mut ctx);
        assert_eq!(
            out.request,
            Some(PaneRequest::OpenVariable("b".to_string()))
        );
    }
}
