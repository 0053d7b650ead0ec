//! Pane construction, placement and the palette action table.

use serde_json::json;

use super::{App, Effect, VarsCapture};
use crate::debug_pane::{DebugPane, KeysPane};
use crate::docs::DocPane;
use crate::editor_pane::EditorPane;
use crate::idioms::IdiomSearch;
use crate::palette::{builtin_commands, CommandPalette};
use crate::pane::Pane;
use crate::stack_pane::StackPane;
use crate::symbols::SymbolSearch;
use crate::tracer::TracerSurface;
use crate::vars_pane::{VariablesPane, VarsMode};

/// Centered placement clamped to the screen.
fn centered(app: &App, w: u16, h: u16) -> (i32, i32, u16, u16) {
    let (screen_w, screen_h) = app.screen_size();
    let w = w.min(screen_w.saturating_sub(2)).max(20);
    let h = h.min(screen_h.saturating_sub(2)).max(5);
    let x = (screen_w.saturating_sub(w) / 2) as i32;
    let y = (screen_h.saturating_sub(h) / 2) as i32;
    (x, y, w, h)
}

/// Right-hand column placement used by the inspector panes.
fn right_side(app: &App, w: u16, h: u16) -> (i32, i32, u16, u16) {
    let (screen_w, screen_h) = app.screen_size();
    let w = w.min(screen_w.saturating_sub(2)).max(20);
    let h = h.min(screen_h.saturating_sub(4)).max(5);
    let x = (screen_w as i32 - w as i32 - 2).max(0);
    (x, 2, w, h)
}

fn toggle<F>(app: &mut App, id: &str, build: F)
where
    F: FnOnce(&App) -> Pane,
{
    if app.panes.contains(id) {
        app.panes.remove(id);
    } else {
        let pane = build(app);
        app.panes.add(pane);
        app.panes.focus(id);
    }
}

pub(super) fn toggle_debug_pane(app: &mut App) {
    toggle(app, "debug", |app| {
        let (screen_w, screen_h) = app.screen_size();
        let w = 50u16.min(screen_w.saturating_sub(2)).max(20);
        let h = screen_h.saturating_sub(4).max(10);
        let x = (screen_w as i32 - w as i32 - 2).max(0);
        Pane::new("debug", Box::new(DebugPane::new()), x, 1, w, h)
    });
}

pub(super) fn toggle_stack_pane(app: &mut App) {
    toggle(app, "stack", |app| {
        let (x, y, w, h) = right_side(app, 30, 15);
        Pane::new("stack", Box::new(StackPane::new()), x, y, w, h)
    });
}

pub(super) fn toggle_keys_pane(app: &mut App) {
    toggle(app, "keys", |app| {
        let rows = app.keys.reference_rows();
        let (x, y, w, h) = centered(app, 40, rows.len() as u16 + 2);
        Pane::new("keys", Box::new(KeysPane::new(rows)), x, y, w, h)
    });
}

pub(super) fn toggle_command_palette(app: &mut App) {
    if app.panes.contains("commands") {
        app.panes.remove("commands");
        return;
    }
    let commands = builtin_commands();
    let (screen_w, _) = app.screen_size();
    let w = 44u16.min(screen_w.saturating_sub(2));
    let h = (commands.len() as u16 + 4).min(15);
    let x = (screen_w.saturating_sub(w) / 2) as i32;
    app.panes.add(Pane::new(
        "commands",
        Box::new(CommandPalette::new(commands)),
        x,
        2,
        w,
        h,
    ));
    app.panes.focus("commands");
}

pub(super) fn toggle_symbol_search(app: &mut App) {
    toggle(app, "symbols", |app| {
        let (x, y, w, h) = centered(app, 50, 20);
        Pane::new("symbols", Box::new(SymbolSearch::new()), x, y, w, h)
    });
}

/// The idiom table is fetched on first open and kept for the session.
pub(super) fn toggle_idiom_search(app: &mut App) -> Vec<Effect> {
    if app.panes.contains("idioms") {
        app.panes.remove("idioms");
        return Vec::new();
    }
    let (x, y, w, h) = centered(app, 70, 25);
    app.panes.add(Pane::new(
        "idioms",
        Box::new(IdiomSearch::new()),
        x,
        y,
        w,
        h,
    ));
    app.panes.focus("idioms");
    vec![Effect::FetchIdioms]
}

pub(super) fn toggle_vars_pane(app: &mut App) -> Vec<Effect> {
    if app.panes.contains("vars") {
        app.panes.remove("vars");
        return Vec::new();
    }
    let (x, y, w, h) = right_side(app, 34, 15);
    app.panes.add(Pane::new(
        "vars",
        Box::new(VariablesPane::new()),
        x,
        y,
        w,
        h,
    ));
    app.panes.focus("vars");
    request_vars_refresh(app, VarsMode::Locals)
}

pub(super) fn toggle_docs_pane(app: &mut App) {
    if app.panes.contains("docs") {
        app.panes.remove("docs");
        return;
    }
    let Some(index) = app.docs.as_ref().and_then(|store| store.index()).cloned() else {
        app.log("No documentation store found");
        return;
    };
    let (x, y, w, h) = centered(app, 72, app.screen_size().1.saturating_sub(6));
    let pane_width = w.saturating_sub(2) as usize;
    app.panes.add(Pane::new(
        "docs",
        Box::new(DocPane::new(&index, pane_width)),
        x,
        y,
        w,
        h,
    ));
    app.panes.focus("docs");
}

/// Surface `token` in the single tracer pane, creating it if needed.
pub(super) fn show_tracer(app: &mut App, token: i64) {
    if let Some(w) = app.editors.get_mut(&token) {
        w.cursor_row = w.current_row.max(0) as usize;
        w.cursor_col = 0;
    }
    if let Some(pane) = app.panes.get_mut("tracer") {
        pane.content = Box::new(EditorPane::new(token));
        return;
    }
    let (x, y, w, h) = centered(app, 60, 20);
    app.panes
        .add(Pane::new("tracer", Box::new(EditorPane::new(token)), x, y, w, h));
    app.panes.focus("tracer");
}

/// Stack-pane navigation: only which frame is surfaced changes.
pub(super) fn surface_frame(app: &mut App, token: i64) {
    if let TracerSurface::Surface(token) = app.tracer.switch(token) {
        show_tracer(app, token);
    }
}

pub(super) fn open_editor_pane(app: &mut App, token: i64) {
    let id = format!("editor:{token}");
    let (x, y, w, h) = centered(app, 60, 20);
    app.panes
        .add(Pane::new(id.as_str(), Box::new(EditorPane::new(token)), x, y, w, h));
    app.panes.focus(&id);
}

/// Refresh the variables pane by executing a formatting expression whose
/// output is diverted to the pane until the next ready prompt.
pub(super) fn request_vars_refresh(app: &mut App, mode: VarsMode) -> Vec<Effect> {
    let current = app.tracer.current();
    let locals = app
        .editors
        .get(&current)
        .map(|w| {
            w.header_locals()
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if !app.connected || !app.ready {
        if let Some(pane) = app.content_mut::<VariablesPane>("vars") {
            pane.clear();
        }
        app.log("Variables refresh blocked: interpreter busy");
        return Vec::new();
    }

    app.vars_capture = Some(VarsCapture {
        mode,
        lines: Vec::new(),
        locals,
    });
    let expr = "⍪{⍵,' = ',⍕⍎⍵}¨⎕NL ¯2";
    app.ready = false;
    app.last_execute = format!("{expr}\n");
    app.log("→ Execute (variables refresh)");
    vec![Effect::send(
        "Execute",
        json!({"text": app.last_execute, "trace": 0}),
    )]
}

/// Open a documentation page for the glyph under the session caret, if
/// the store knows it.
fn open_symbol_help(app: &mut App) {
    let glyph = symbol_at_caret(app);
    let Some(glyph) = glyph else {
        app.log("No APL glyph under the caret");
        return;
    };
    let Some(doc) = app
        .docs
        .as_ref()
        .and_then(|store| store.by_symbol(&glyph.to_string()))
        .cloned()
    else {
        app.log(format!("No help page for {glyph}"));
        return;
    };
    app.panes.remove("docs");
    let (x, y, w, h) = centered(app, 72, app.screen_size().1.saturating_sub(6));
    let pane_width = w.saturating_sub(2) as usize;
    app.panes.add(Pane::new(
        "docs",
        Box::new(DocPane::new(&doc, pane_width)),
        x,
        y,
        w,
        h,
    ));
    app.panes.focus("docs");
}

/// A non-ASCII glyph under the session caret.
fn symbol_at_caret(app: &App) -> Option<char> {
    let ch = app
        .session
        .current_text()
        .chars()
        .nth(app.session.col)?;
    (!ch.is_ascii()).then_some(ch)
}

/// Palette action tokens; unknown tokens are logged and dropped.
pub(super) fn dispatch_action(app: &mut App, action: &str) -> Vec<Effect> {
    match action {
        "debug" => toggle_debug_pane(app),
        "stack" => toggle_stack_pane(app),
        "vars" => return toggle_vars_pane(app),
        "keys" => toggle_keys_pane(app),
        "symbols" => toggle_symbol_search(app),
        "idioms" => return toggle_idiom_search(app),
        "docs" => toggle_docs_pane(app),
        "help" => open_symbol_help(app),
        "reconnect" => return vec![Effect::Reconnect],
        "save" => app.begin_save_prompt(),
        "quit" => app.confirm_quit = true,
        other => app.log(format!("Unknown command: {other}")),
    }
    Vec::new()
}
