//! Screen composition: session box, floating panes, the completion
//! overlay and the status line.

use ratatui::buffer::Buffer;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::Frame;

use super::App;
use crate::pane::{put_line, put_str};

pub fn render(app: &mut App, frame: &mut Frame<'_>) {
    let area = frame.size();
    if area.width < 10 || area.height < 4 {
        return;
    }
    let main_h = area.height - 1;
    let buf = frame.buffer_mut();

    draw_session(app, buf, area.width, main_h);

    app.with_ctx(|panes, ctx| panes.render(buf, ctx));

    draw_autocomplete(app, buf, main_h);
    draw_status_line(app, buf, area.width, main_h);
}

fn session_viewport(app: &App, content_h: usize) -> usize {
    if app.session.row >= content_h {
        app.session.row + 1 - content_h
    } else {
        0
    }
}

fn draw_session(app: &App, buf: &mut Buffer, width: u16, height: u16) {
    let (title, border_color) = if app.connected {
        ("dyad".to_string(), app.accent)
    } else {
        ("dyad [disconnected]".to_string(), Color::Red)
    };
    let border_style = Style::default().fg(border_color);
    let title_style = Style::default().fg(border_color).add_modifier(Modifier::BOLD);

    let content_w = width.saturating_sub(2) as usize;
    let content_h = height.saturating_sub(2) as usize;

    // Top border with the title inline.
    put_str(buf, 0, 0, "╭─ ", border_style);
    put_str(buf, 3, 0, &title, title_style);
    let mut col = 3 + title.chars().count() as i32;
    put_str(buf, col, 0, " ", border_style);
    col += 1;
    while col < width as i32 - 1 {
        put_str(buf, col, 0, "─", border_style);
        col += 1;
    }
    put_str(buf, width as i32 - 1, 0, "╮", border_style);

    let start = session_viewport(app, content_h);
    let cursor_style = Style::default().add_modifier(Modifier::REVERSED);

    for row in 0..content_h {
        let y = row as i32 + 1;
        put_str(buf, 0, y, "│", border_style);
        for x in 1..=content_w {
            put_str(buf, x as i32, y, " ", Style::default());
        }
        put_str(buf, width as i32 - 1, y, "│", border_style);

        let idx = start + row;
        let Some(line) = app.session.lines.get(idx) else {
            continue;
        };
        let chars: Vec<char> = line.text.chars().collect();
        let rendered = if idx == app.session.row {
            let col = app.session.col.min(chars.len());
            let mut spans = Vec::with_capacity(3);
            if col > 0 {
                spans.push(Span::raw(chars[..col].iter().collect::<String>()));
            }
            if col < chars.len() {
                spans.push(Span::styled(chars[col].to_string(), cursor_style));
                if col + 1 < chars.len() {
                    spans.push(Span::raw(chars[col + 1..].iter().collect::<String>()));
                }
            } else {
                spans.push(Span::styled(" ", cursor_style));
            }
            Line::from(spans)
        } else {
            Line::from(line.text.clone())
        };
        put_line(buf, 1, y, &rendered, content_w);
    }

    let bottom = height as i32 - 1;
    put_str(buf, 0, bottom, "╰", border_style);
    for x in 1..width as i32 - 1 {
        put_str(buf, x, bottom, "─", border_style);
    }
    put_str(buf, width as i32 - 1, bottom, "╯", border_style);
}

/// Screen position of the caret owning the completion popup.
fn autocomplete_anchor(app: &App, main_h: u16) -> Option<(u16, u16)> {
    let ac = app.autocomplete.as_ref()?;
    if ac.token == 0 {
        let content_h = main_h.saturating_sub(2) as usize;
        let start = session_viewport(app, content_h);
        let row = app.session.row.checked_sub(start)?;
        let x = (1 + ac.trigger_col.saturating_sub(ac.skip)) as u16;
        return Some((x, row as u16 + 1));
    }
    let token = ac.token;
    let skip = ac.skip;
    let trigger_col = ac.trigger_col;
    let pane_id = if app.tracer.current() == token {
        "tracer".to_string()
    } else {
        format!("editor:{token}")
    };
    let pane = app.panes.get(&pane_id)?;
    let w = app.editors.get(&token)?;
    let gutter = format!("[{}]", w.text.len().saturating_sub(1)).len() + 3;
    let x = pane.x + 1 + gutter as i32 + trigger_col.saturating_sub(skip) as i32;
    let y = pane.y + 1 + w.cursor_row as i32;
    Some((x.max(0) as u16, y.max(0) as u16))
}

fn draw_autocomplete(app: &App, buf: &mut Buffer, main_h: u16) {
    let Some((x, y)) = autocomplete_anchor(app, main_h) else {
        return;
    };
    if let Some(ac) = app.autocomplete.as_ref() {
        ac.draw(buf, x, y, app.accent);
    }
}

fn draw_status_line(app: &App, buf: &mut Buffer, width: u16, y: u16) {
    let y = y as i32;
    for x in 0..width as i32 {
        put_str(buf, x, y, " ", Style::default());
    }

    let accent = Style::default().fg(app.accent);
    let bold_accent = accent.add_modifier(Modifier::BOLD);
    let leader = app.keys.leader.label.as_str();

    if app.confirm_quit {
        put_str(
            buf,
            0,
            y,
            "Quit? (y/n)",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        );
    } else if let Some(filename) = &app.save_prompt {
        let prompt = format!("Save as: {filename}");
        put_str(buf, 0, y, &prompt, Style::default().add_modifier(Modifier::BOLD));
        put_str(
            buf,
            prompt.chars().count() as i32,
            y,
            " ",
            Style::default().add_modifier(Modifier::REVERSED),
        );
    } else if app.show_quit_hint {
        put_str(buf, 0, y, &format!("Type {leader} q to quit"), accent);
    } else if app.leader_active {
        put_str(buf, 0, y, &format!("{leader} ..."), bold_accent);
    } else if app.pane_move_mode {
        put_str(
            buf,
            0,
            y,
            "MOVE: arrows move, shift+arrows resize, esc exit",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        );
    } else if app.backtick_active {
        put_str(buf, 0, y, "` APL glyph...", bold_accent);
    } else {
        let help = short_help(app);
        put_str(buf, 0, y, &help, Style::default().fg(Color::DarkGray));
    }
}

fn short_help(app: &App) -> String {
    let keys = &app.keys;
    let leader = keys.leader.label.as_str();
    format!(
        "{} execute · {} complete · {leader} {} debug · {leader} {} commands · {leader} {} quit",
        keys.execute.label,
        keys.autocomplete.label,
        keys.toggle_debug.label,
        keys.command_palette.label,
        keys.quit.label,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::UiEvent;
    use crate::config::Config;
    use crate::logbuf::ProtocolLog;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn test_app() -> App {
        let cfg = Config::embedded_default();
        let mut app = App::new(&cfg, "localhost:4502", ProtocolLog::default(), None);
        app.update(UiEvent::Resize(80, 24));
        app
    }

    fn snapshot(app: &mut App) -> Vec<String> {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).expect("create test terminal");
        terminal.draw(|frame| render(app, frame)).expect("draw ui");
        let buffer = terminal.backend().buffer().clone();
        (0..24)
            .map(|y| {
                (0..80)
                    .map(|x| buffer.get(x, y).symbol().to_string())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn session_box_carries_the_title_and_help_line() {
        let mut app = test_app();
        let rows = snapshot(&mut app);
        assert!(rows[0].starts_with("╭─ dyad "));
        assert!(rows[23].contains("execute"));
        // The caret sits after the six-space indent on the input line.
        assert!(rows[1].starts_with("│      "));
    }

    #[test]
    fn disconnect_changes_the_session_title() {
        let mut app = test_app();
        app.connected = false;
        let rows = snapshot(&mut app);
        assert!(rows[0].contains("dyad [disconnected]"));
    }

    #[test]
    fn focused_pane_overlays_the_session_with_a_doubled_border() {
        let mut app = test_app();
        app.update(UiEvent::Key(KeyEvent::new(
            KeyCode::Char(']'),
            KeyModifiers::CONTROL,
        )));
        app.update(UiEvent::Key(KeyEvent::from(KeyCode::Char('d'))));

        let screen = snapshot(&mut app).join("\n");
        assert!(screen.contains("╔"));
        assert!(screen.contains(" debug "));

        // Closing the pane removes the doubled border again.
        app.update(UiEvent::Key(KeyEvent::from(KeyCode::Esc)));
        let screen = snapshot(&mut app).join("\n");
        assert!(!screen.contains("╔"));
    }

    #[test]
    fn leader_state_shows_in_the_status_line() {
        let mut app = test_app();
        app.update(UiEvent::Key(KeyEvent::new(
            KeyCode::Char(']'),
            KeyModifiers::CONTROL,
        )));
        let rows = snapshot(&mut app);
        assert!(rows[23].starts_with("ctrl+] ..."));
    }
}
