//! Modal key and mouse routing.
//!
//! Precedence, first match wins: backtick composition, quit
//! confirmation, the save prompt, pane-move mode, a pending leader,
//! the leader chord itself, the quit hint, the autocomplete popup,
//! global pane cycling, the focused pane, and finally the session.

use crossterm::event::{
    KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use super::{panes, App, Effect};
use crate::pane::{zone_to_drag_mode, HitZone};
use crate::symbols::backtick_glyph;

pub(super) fn handle_key(app: &mut App, key: KeyEvent) -> Vec<Effect> {
    // Backtick composition: the next key becomes an APL glyph.
    if app.backtick_active {
        app.backtick_active = false;
        match key.code {
            KeyCode::Char(ch) => {
                if let Some(glyph) = backtick_glyph(ch) {
                    app.insert_glyph(glyph);
                } else {
                    app.insert_glyph('`');
                    app.insert_glyph(ch);
                }
            }
            _ => app.insert_glyph('`'),
        }
        return Vec::new();
    }
    if key.code == KeyCode::Char('`') && !key.modifiers.contains(KeyModifiers::CONTROL) {
        app.backtick_active = true;
        return Vec::new();
    }

    if app.confirm_quit {
        app.confirm_quit = false;
        if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
            return vec![Effect::Quit];
        }
        return Vec::new();
    }

    if app.save_prompt.is_some() {
        return handle_save_prompt_key(app, key);
    }

    if app.pane_move_mode {
        return handle_pane_move_key(app, key);
    }

    if app.leader_active {
        app.leader_active = false;
        return handle_leader_key(app, key);
    }
    if app.keys.leader.matches(key) {
        app.leader_active = true;
        return Vec::new();
    }

    // Any key clears the transient quit hint; Ctrl+C raises it.
    app.show_quit_hint = false;
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.show_quit_hint = true;
        return Vec::new();
    }

    // A live completion popup consumes its navigation keys; anything
    // else dismisses it and is processed normally.
    if app.autocomplete.is_some() {
        match key.code {
            KeyCode::Tab | KeyCode::Down => {
                if let Some(ac) = app.autocomplete.as_mut() {
                    ac.cycle_next();
                }
                return Vec::new();
            }
            KeyCode::BackTab | KeyCode::Up => {
                if let Some(ac) = app.autocomplete.as_mut() {
                    ac.cycle_prev();
                }
                return Vec::new();
            }
            KeyCode::Enter => {
                if let Some(ac) = app.autocomplete.take() {
                    let option = ac.selected_option().to_string();
                    app.apply_autocomplete(ac.token, ac.skip, &option);
                }
                return Vec::new();
            }
            KeyCode::Esc => {
                app.autocomplete = None;
                return Vec::new();
            }
            _ => app.autocomplete = None,
        }
    }

    // Tab cycles pane focus, unless the focused pane claims it: an
    // editor taking text wants completion, the docs pane cycles links.
    if app.keys.cycle_pane.matches(key) && app.panes.has_panes() && !focused_pane_wants_tab(app) {
        app.panes.focus_next();
        return Vec::new();
    }

    if app.panes.focused_id().is_some() {
        return route_key_to_focused_pane(app, key);
    }

    handle_session_key(app, key)
}

fn focused_pane_wants_tab(app: &App) -> bool {
    if app.panes.focused_id() == Some("docs") {
        return true;
    }
    app.focused_editor_token()
        .and_then(|token| app.editors.get(&token))
        .is_some_and(|w| w.edit_mode || (!w.debugger && !w.read_only))
}

fn handle_leader_key(app: &mut App, key: KeyEvent) -> Vec<Effect> {
    let keys = app.keys.clone();
    if keys.toggle_debug.matches(key) {
        panes::toggle_debug_pane(app);
    } else if keys.toggle_stack.matches(key) {
        panes::toggle_stack_pane(app);
    } else if keys.toggle_locals.matches(key) {
        return panes::toggle_vars_pane(app);
    } else if keys.toggle_breakpoint.matches(key) {
        return toggle_breakpoint(app);
    } else if keys.reconnect.matches(key) {
        return vec![Effect::Reconnect];
    } else if keys.command_palette.matches(key) {
        panes::toggle_command_palette(app);
    } else if keys.pane_move_mode.matches(key) {
        if app.panes.focused_id().is_some() {
            app.pane_move_mode = true;
        }
    } else if keys.show_keys.matches(key) {
        panes::toggle_keys_pane(app);
    } else if keys.quit.matches(key) {
        app.confirm_quit = true;
    }
    // Unknown leader sequences are dropped.
    Vec::new()
}

/// Flip the breakpoint on the focused editor's current line and push the
/// change live without waiting for a save.
fn toggle_breakpoint(app: &mut App) -> Vec<Effect> {
    let Some(token) = app.focused_editor_token() else {
        return Vec::new();
    };
    let Some(w) = app.editors.get_mut(&token) else {
        return Vec::new();
    };
    let line = w.cursor_row;
    w.toggle_stop(line);
    let args = w.line_attribute_args();
    let on = w.has_stop(line);
    app.log(format!(
        "→ SetLineAttributes win={token} line={line} stop={on}"
    ));
    vec![Effect::send("SetLineAttributes", args)]
}

fn handle_save_prompt_key(app: &mut App, key: KeyEvent) -> Vec<Effect> {
    match key.code {
        KeyCode::Esc => {
            app.save_prompt = None;
            app.log("Save cancelled");
        }
        KeyCode::Enter => {
            let Some(filename) = app.save_prompt.take() else {
                return Vec::new();
            };
            if filename.is_empty() {
                app.log("Save cancelled");
                return Vec::new();
            }
            return vec![Effect::WriteFile {
                path: filename.into(),
                contents: app.session.contents(),
            }];
        }
        KeyCode::Backspace => {
            if let Some(name) = app.save_prompt.as_mut() {
                name.pop();
            }
        }
        KeyCode::Char(ch) => {
            if let Some(name) = app.save_prompt.as_mut() {
                name.push(ch);
            }
        }
        _ => {}
    }
    Vec::new()
}

fn handle_pane_move_key(app: &mut App, key: KeyEvent) -> Vec<Effect> {
    let (screen_w, screen_h) = app.screen_size();
    let Some(pane) = app.panes.focused_pane_mut() else {
        app.pane_move_mode = false;
        return Vec::new();
    };
    let shifted = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        KeyCode::Esc | KeyCode::Enter => app.pane_move_mode = false,
        KeyCode::Up if shifted => pane.height = pane.height.saturating_sub(1).max(pane.min_height),
        KeyCode::Up => pane.y = (pane.y - 1).max(0),
        KeyCode::Down if shifted => {
            pane.height = (pane.height + 1).min(screen_h.saturating_sub(2))
        }
        KeyCode::Down => {
            pane.y = (pane.y + 1).min(screen_h as i32 - pane.height as i32 - 1).max(0)
        }
        KeyCode::Left if shifted => pane.width = pane.width.saturating_sub(1).max(pane.min_width),
        KeyCode::Left => pane.x = (pane.x - 1).max(0),
        KeyCode::Right if shifted => {
            pane.width = (pane.width + 1).min(screen_w.saturating_sub(2))
        }
        KeyCode::Right => {
            pane.x = (pane.x + 1).min(screen_w as i32 - pane.width as i32 - 1).max(0)
        }
        _ => {}
    }
    Vec::new()
}

fn route_key_to_focused_pane(app: &mut App, key: KeyEvent) -> Vec<Effect> {
    let outcome = app.with_ctx(|panes, ctx| {
        panes
            .focused_pane_mut()
            .map(|pane| pane.content.handle_key(key, ctx))
    });
    let Some(outcome) = outcome else {
        return Vec::new();
    };

    if let Some(request) = outcome.request {
        return app.apply_pane_request(request);
    }
    if outcome.consumed {
        return Vec::new();
    }

    // Escape falls back to closing whatever pane is focused; editor
    // panes already consumed it with their own close semantics.
    if app.keys.close_pane.matches(key) {
        if let Some(id) = app.panes.focused_id().map(str::to_string) {
            app.panes.remove(&id);
        }
    }
    // A focused pane consumes everything else.
    Vec::new()
}

fn handle_session_key(app: &mut App, key: KeyEvent) -> Vec<Effect> {
    let keys = app.keys.clone();
    let page = (app.screen_size().1 as usize).saturating_sub(4).max(1);

    if keys.execute.matches(key) {
        return app.execute_current_line();
    }
    if keys.autocomplete.matches(key) {
        return app.request_session_autocomplete();
    }
    if keys.up.matches(key) {
        app.session.move_up(1);
    } else if keys.down.matches(key) {
        app.session.move_down(1);
    } else if keys.left.matches(key) {
        app.session.move_left();
    } else if keys.right.matches(key) {
        app.session.move_right();
    } else if keys.home.matches(key) {
        app.session.move_home();
    } else if keys.end.matches(key) {
        app.session.move_end();
    } else if keys.pgup.matches(key) {
        app.session.move_up(page);
    } else if keys.pgdn.matches(key) {
        app.session.move_down(page);
    } else if keys.backspace.matches(key) {
        app.session.backspace();
    } else if keys.delete.matches(key) {
        app.session.delete_forward();
    } else if let KeyCode::Char(ch) = key.code {
        if !key.modifiers.contains(KeyModifiers::CONTROL) {
            app.session.insert_char(ch);
        }
    }
    Vec::new()
}

pub(super) fn handle_mouse(app: &mut App, event: MouseEvent) -> Vec<Effect> {
    let x = event.column as i32;
    let y = event.row as i32;
    let (screen_w, screen_h) = app.panes.screen_size();

    // An active drag swallows motion until the button is released.
    if let Some(pane) = app.panes.dragging_pane_mut() {
        match event.kind {
            MouseEventKind::Drag(MouseButton::Left) => {
                pane.update_drag(x, y, screen_w, screen_h);
                return Vec::new();
            }
            MouseEventKind::Up(MouseButton::Left) => {
                pane.stop_drag();
                return Vec::new();
            }
            _ => {}
        }
    }

    match event.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            let Some(id) = app.panes.pane_at(x, y) else {
                app.panes.unfocus();
                return Vec::new();
            };
            app.panes.focus(&id);
            let Some(pane) = app.panes.get_mut(&id) else {
                return Vec::new();
            };
            let zone = pane.hit_zone(x, y);
            match zone {
                HitZone::Content => {
                    let rel_x = (x - pane.x - 1).max(0) as u16;
                    let rel_y = (y - pane.y - 1).max(0) as u16;
                    return route_mouse_to_pane(app, &id, rel_x, rel_y, event);
                }
                zone => {
                    if let Some(mode) = zone_to_drag_mode(zone) {
                        pane.start_drag(mode, x, y);
                    }
                }
            }
        }
        MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
            if let Some(id) = app.panes.pane_at(x, y) {
                let pane = match app.panes.get(&id) {
                    Some(pane) => (pane.x, pane.y),
                    None => return Vec::new(),
                };
                let rel_x = (x - pane.0 - 1).max(0) as u16;
                let rel_y = (y - pane.1 - 1).max(0) as u16;
                return route_mouse_to_pane(app, &id, rel_x, rel_y, event);
            }
            // Wheel over the session scrolls the caret.
            if event.kind == MouseEventKind::ScrollUp {
                app.session.move_up(3);
            } else {
                app.session.move_down(3);
            }
        }
        _ => {}
    }
    Vec::new()
}

fn route_mouse_to_pane(
    app: &mut App,
    id: &str,
    rel_x: u16,
    rel_y: u16,
    event: MouseEvent,
) -> Vec<Effect> {
    let request = app.with_ctx(|panes, ctx| {
        panes
            .get_mut(id)
            .and_then(|pane| pane.content.handle_mouse(rel_x, rel_y, event, ctx))
    });
    match request {
        Some(request) => app.apply_pane_request(request),
        None => Vec::new(),
    }
}
