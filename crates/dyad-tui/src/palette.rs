use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use smol_str::SmolStr;

use crate::pane::{KeyOutcome, PaneContent, PaneCtx, PaneRequest};

/// Shared query/selection/scroll state of the search panes.
#[derive(Debug, Default)]
pub struct Selector {
    pub query: String,
    pub selected: usize,
    pub scroll: usize,
}

/// What a selector did with a key.
pub enum SelectorKey {
    /// Selection moved or the query changed.
    Handled,
    /// Enter on the current selection.
    Chosen(usize),
    Ignored,
}

impl Selector {
    pub fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    /// Keep the selection inside the visible window of `list_h` rows.
    pub fn adjust_scroll(&mut self, list_h: usize) {
        let list_h = list_h.max(1);
        if self.selected >= self.scroll + list_h {
            self.scroll = self.selected + 1 - list_h;
        }
        if self.selected < self.scroll {
            self.scroll = self.selected;
        }
    }

    /// Route one key. Typing mutates the query and resets scroll; the
    /// caller refilters when `Handled` is returned.
    pub fn handle_key(&mut self, key: KeyEvent, len: usize) -> SelectorKey {
        match key.code {
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                SelectorKey::Handled
            }
            KeyCode::Down => {
                if len > 0 && self.selected + 1 < len {
                    self.selected += 1;
                }
                SelectorKey::Handled
            }
            KeyCode::Enter => {
                if self.selected < len {
                    SelectorKey::Chosen(self.selected)
                } else {
                    SelectorKey::Ignored
                }
            }
            KeyCode::Backspace => {
                if self.query.pop().is_some() {
                    self.selected = 0;
                    self.scroll = 0;
                }
                SelectorKey::Handled
            }
            KeyCode::Char(ch) => {
                self.query.push(ch);
                self.selected = 0;
                self.scroll = 0;
                SelectorKey::Handled
            }
            _ => SelectorKey::Ignored,
        }
    }

    /// Row index for a content-relative mouse click, if it lands on the
    /// list below the prompt and separator.
    pub fn row_at(&self, y: u16, len: usize) -> Option<usize> {
        if y < 2 {
            return None;
        }
        let idx = self.scroll + y as usize - 2;
        (idx < len).then_some(idx)
    }
}

/// Prompt row shown at the top of every search pane.
pub fn query_line(prompt: &str, query: &str, accent: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(prompt.to_string(), Style::default().fg(accent)),
        Span::raw(query.to_string()),
        Span::styled(" ", Style::default().add_modifier(Modifier::REVERSED)),
    ])
}

pub fn separator_line(w: u16) -> Line<'static> {
    Line::from("─".repeat(w as usize))
}

pub fn pad_to(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    while out.chars().count() < width {
        out.push(' ');
    }
    out
}

/// One palette entry: an action token plus its help text.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: SmolStr,
    pub help: &'static str,
}

pub fn builtin_commands() -> Vec<Command> {
    let cmd = |name: &str, help: &'static str| Command {
        name: SmolStr::new(name),
        help,
    };
    vec![
        cmd("debug", "Toggle debug log pane"),
        cmd("stack", "Toggle tracer stack pane"),
        cmd("vars", "Toggle variables pane"),
        cmd("keys", "Show key bindings"),
        cmd("symbols", "Search APL symbols"),
        cmd("idioms", "Search the idiom library"),
        cmd("docs", "Browse documentation"),
        cmd("help", "Docs for the glyph at the caret"),
        cmd("reconnect", "Reconnect to the interpreter"),
        cmd("save", "Save session to file"),
        cmd("quit", "Quit dyad"),
    ]
}

/// The searchable command palette.
pub struct CommandPalette {
    commands: Vec<Command>,
    filtered: Vec<usize>,
    sel: Selector,
}

impl CommandPalette {
    pub fn new(commands: Vec<Command>) -> Self {
        let filtered = (0..commands.len()).collect();
        Self {
            commands,
            filtered,
            sel: Selector::default(),
        }
    }

    fn refilter(&mut self) {
        let query = self.sel.query.to_lowercase();
        self.filtered = self
            .commands
            .iter()
            .enumerate()
            .filter(|(_, cmd)| {
                query.is_empty()
                    || cmd.name.to_lowercase().contains(&query)
                    || cmd.help.to_lowercase().contains(&query)
            })
            .map(|(idx, _)| idx)
            .collect();
        self.sel.clamp(self.filtered.len());
    }
}

impl PaneContent for CommandPalette {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn title(&self, _ctx: &PaneCtx<'_>) -> String {
        "Commands".to_string()
    }

    fn render(&mut self, w: u16, h: u16, ctx: &mut PaneCtx<'_>) -> Text<'static> {
        let mut lines = vec![
            query_line(": ", &self.sel.query, ctx.accent),
            separator_line(w),
        ];
        let list_h = (h as usize).saturating_sub(2);
        self.sel.adjust_scroll(list_h);

        let name_w = ((w as usize) / 3).max(10);
        let selected_style = Style::default().bg(ctx.accent).fg(Color::Black);
        let help_style = Style::default().fg(Color::DarkGray);

        for (row, &idx) in self
            .filtered
            .iter()
            .enumerate()
            .skip(self.sel.scroll)
            .take(list_h)
        {
            let cmd = &self.commands[idx];
            let name = pad_to(&cmd.name, name_w);
            let name_span = if row == self.sel.selected {
                Span::styled(name, selected_style)
            } else {
                Span::raw(name)
            };
            lines.push(Line::from(vec![
                name_span,
                Span::raw(" "),
                Span::styled(cmd.help.to_string(), help_style),
            ]));
        }
        Text::from(lines)
    }

    fn handle_key(&mut self, key: KeyEvent, _ctx: &mut PaneCtx<'_>) -> KeyOutcome {
        match self.sel.handle_key(key, self.filtered.len()) {
            SelectorKey::Chosen(row) => {
                let name = self.commands[self.filtered[row]].name.clone();
                KeyOutcome::request(PaneRequest::Action(name))
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
        if event.kind != MouseEventKind::Down(MouseButton::Left) {
            return None;
        }
        let row = self.sel.row_at(y, self.filtered.len())?;
        self.sel.selected = row;
        let name = self.commands[self.filtered[row]].name.clone();
        Some(PaneRequest::Action(name))
    }
}
