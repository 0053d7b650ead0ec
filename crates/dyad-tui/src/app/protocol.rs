//! State machines for interpreter-initiated messages.

use dyad_ride::{args, Incoming, Message};

use super::{panes, App, Effect, RideEvent, RideEventKind};
use crate::editor::EditorWindow;
use crate::tracer::TracerSurface;
use crate::vars_pane::{parse_var_lines, VariablesPane};
use crate::SHUTDOWN_EXPR;

pub(super) fn handle_ride(app: &mut App, event: RideEvent) -> Vec<Effect> {
    if event.gen != app.gen {
        // Leftover from a connection that was already torn down.
        return Vec::new();
    }
    match event.kind {
        RideEventKind::Failed { error } => handle_failure(app, &error),
        RideEventKind::Incoming(Incoming::Line(line)) => {
            app.log(format!("← raw: {line}"));
            Vec::new()
        }
        RideEventKind::Incoming(Incoming::Command(msg)) => handle_message(app, msg),
    }
}

fn handle_failure(app: &mut App, error: &str) -> Vec<Effect> {
    app.connected = false;
    app.ready = false;

    if app.pending_quit {
        app.log("Session ended by the shutdown expression");
        return vec![Effect::Quit];
    }
    app.log(format!("Disconnected: {error}"));
    app.session.push_disconnect_marker();
    Vec::new()
}

fn handle_message(app: &mut App, msg: Message) -> Vec<Effect> {
    match serde_json::to_string(&serde_json::Value::Object(msg.args.clone())) {
        Ok(args_json) => app.log(format!("← {} {}", msg.name, args_json)),
        Err(_) => app.log(format!("← {}", msg.name)),
    }

    match msg.name.as_str() {
        "AppendSessionOutput" => append_session_output(app, &msg),
        "SetPromptType" => set_prompt_type(app, &msg),
        "OpenWindow" => open_window(app, &msg),
        "UpdateWindow" => update_window(app, &msg),
        "CloseWindow" => close_window(app, &msg),
        "ReplySaveChanges" => reply_save_changes(app, &msg),
        "SetHighlightLine" => set_highlight_line(app, &msg),
        "WindowTypeChanged" => window_type_changed(app, &msg),
        "HadError" => had_error(app, &msg),
        "ReplyGetAutocomplete" => reply_get_autocomplete(app, &msg),
        _ => Vec::new(),
    }
}

fn append_session_output(app: &mut App, msg: &Message) -> Vec<Effect> {
    let result = args::text(&msg.args, "result").unwrap_or("").to_string();
    if args::int(&msg.args, "type") == Some(14) {
        // Exactly one echo is dropped per execute, matched by text.
        if result == app.last_execute {
            app.log("  (skipped: own input echo)");
            app.last_execute.clear();
            return Vec::new();
        }
        if result.trim() == SHUTDOWN_EXPR {
            app.log("  (skipped: external shutdown echo)");
            return Vec::new();
        }
        app.log("  (external input)");
    }
    if result.is_empty() {
        return Vec::new();
    }
    if let Some(capture) = app.vars_capture.as_mut() {
        capture.lines.push(result);
        return Vec::new();
    }
    app.session.append_output(&result);
    Vec::new()
}

fn set_prompt_type(app: &mut App, msg: &Message) -> Vec<Effect> {
    let prompt_type = args::int(&msg.args, "type").unwrap_or(0);
    let was_ready = app.ready;
    app.ready = prompt_type > 0;
    app.log(format!("  ready: {was_ready} → {}", app.ready));

    if app.ready {
        if let Some(capture) = app.vars_capture.take() {
            finish_vars_capture(app, capture);
        } else {
            app.session.push_input_line();
        }
    }
    Vec::new()
}

fn finish_vars_capture(app: &mut App, capture: super::VarsCapture) {
    let locals: Vec<&str> = capture.locals.iter().map(String::as_str).collect();
    let mut vars = parse_var_lines(
        capture.lines.iter().flat_map(|chunk| chunk.lines()),
        &locals,
    );
    if capture.mode == crate::vars_pane::VarsMode::Locals {
        vars.retain(|var| var.is_local);
    }
    app.log(format!("  variables: {} row(s)", vars.len()));
    if let Some(pane) = app.content_mut::<VariablesPane>("vars") {
        pane.set_vars(vars);
    }
}

fn open_window(app: &mut App, msg: &Message) -> Vec<Effect> {
    let w = EditorWindow::from_args(&msg.args);
    let token = w.token;
    if token == 0 {
        app.log("  (ignored: OpenWindow without a token)");
        return Vec::new();
    }
    let debugger = w.debugger;
    let name = w.name.clone();
    app.editors.insert(token, w);

    if debugger {
        app.tracer.push(token);
        panes::show_tracer(app, token);
        app.log(format!(
            "  opened tracer: {name} (token={token}, depth={})",
            app.tracer.depth()
        ));
    } else {
        panes::open_editor_pane(app, token);
        app.log(format!("  opened editor: {name} (token={token})"));
    }
    Vec::new()
}

fn update_window(app: &mut App, msg: &Message) -> Vec<Effect> {
    let Some(token) = args::int(&msg.args, "token") else {
        return Vec::new();
    };
    let surfaced = token == app.tracer.current();
    if let Some(w) = app.editors.get_mut(&token) {
        w.update_from(&msg.args);
        // Only the surfaced tracer follows the interpreter's caret.
        if surfaced {
            w.cursor_row = w.current_row.max(0) as usize;
            w.cursor_col = 0;
        }
        app.log(format!("  updated window token={token}"));
    }
    Vec::new()
}

fn close_window(app: &mut App, msg: &Message) -> Vec<Effect> {
    let Some(win) = args::int(&msg.args, "win") else {
        return Vec::new();
    };
    if app.tracer.contains(win) {
        match app.tracer.close(win) {
            TracerSurface::Surface(top) => panes::show_tracer(app, top),
            TracerSurface::Dismiss => app.panes.remove("tracer"),
            TracerSurface::Unchanged => {}
        }
        app.log(format!(
            "  closed tracer token={win} (depth={})",
            app.tracer.depth()
        ));
    } else {
        app.panes.remove(&format!("editor:{win}"));
        app.log(format!("  closed editor token={win}"));
    }
    app.editors.remove(&win);
    Vec::new()
}

fn reply_save_changes(app: &mut App, msg: &Message) -> Vec<Effect> {
    let Some(win) = args::int(&msg.args, "win") else {
        return Vec::new();
    };
    let err = args::int(&msg.args, "err").unwrap_or(0);

    if err != 0 {
        app.log(format!("  save FAILED: token={win}, err={err}"));
        if let Some(w) = app.editors.get_mut(&win) {
            w.pending_close = false;
        }
        return Vec::new();
    }

    app.log(format!("  save succeeded: token={win}"));
    let mut follow_up_close = false;
    if let Some(w) = app.editors.get_mut(&win) {
        w.modified = false;
        if w.pending_close {
            w.pending_close = false;
            follow_up_close = true;
        }
    }
    if follow_up_close {
        app.send_close_window(win)
    } else {
        Vec::new()
    }
}

fn set_highlight_line(app: &mut App, msg: &Message) -> Vec<Effect> {
    let Some(win) = args::int(&msg.args, "win") else {
        return Vec::new();
    };
    let line = args::int(&msg.args, "line").unwrap_or(-1);
    let visible =
        win == app.tracer.current() || app.panes.contains(&format!("editor:{win}"));
    if let Some(w) = app.editors.get_mut(&win) {
        w.current_row = line;
        if visible && line >= 0 {
            w.cursor_row = line as usize;
            w.cursor_col = 0;
        }
    }
    app.log(format!("  highlight: token={win}, line={line}"));
    Vec::new()
}

fn window_type_changed(app: &mut App, msg: &Message) -> Vec<Effect> {
    let Some(win) = args::int(&msg.args, "win") else {
        return Vec::new();
    };
    let is_tracer = args::flag(&msg.args, "tracer").unwrap_or(false);
    if !app.editors.contains_key(&win) {
        return Vec::new();
    }
    if let Some(w) = app.editors.get_mut(&win) {
        w.debugger = is_tracer;
    }
    app.log(format!("  window type changed: token={win}, tracer={is_tracer}"));

    if is_tracer && !app.tracer.contains(win) {
        app.panes.remove(&format!("editor:{win}"));
        app.tracer.push(win);
        panes::show_tracer(app, win);
    } else if !is_tracer && app.tracer.contains(win) {
        match app.tracer.close(win) {
            TracerSurface::Surface(top) => panes::show_tracer(app, top),
            TracerSurface::Dismiss => app.panes.remove("tracer"),
            TracerSurface::Unchanged => {}
        }
        panes::open_editor_pane(app, win);
    }
    Vec::new()
}

fn had_error(app: &mut App, msg: &Message) -> Vec<Effect> {
    let detail = args::text(&msg.args, "error")
        .map(str::to_string)
        .or_else(|| {
            msg.args
                .get("dmx")
                .and_then(|dmx| dmx.get("EM"))
                .and_then(|em| em.as_str())
                .map(str::to_string)
        })
        .or_else(|| msg.args.get("error").map(|v| v.to_string()));
    if let Some(detail) = detail {
        app.session.append_output(&format!("{detail}\n"));
    }
    app.log("  interpreter error surfaced to session");
    Vec::new()
}

fn reply_get_autocomplete(app: &mut App, msg: &Message) -> Vec<Effect> {
    let token = args::int(&msg.args, "token").unwrap_or(0);
    let skip = args::int(&msg.args, "skip").unwrap_or(0).max(0) as usize;
    let options = args::lines(&msg.args, "options").unwrap_or_default();

    match options.len() {
        0 => {
            app.autocomplete = None;
            app.log("  autocomplete: no options");
        }
        1 => {
            app.apply_autocomplete(token, skip, &options[0]);
            app.autocomplete = None;
            app.log("  autocomplete: single option applied");
        }
        n => {
            let trigger_col = if token == 0 {
                app.session.col
            } else {
                app.editors
                    .get(&token)
                    .map(|w| w.cursor_col)
                    .unwrap_or_default()
            };
            app.autocomplete = Some(crate::autocomplete::Autocomplete::new(
                options,
                skip,
                token,
                trigger_col,
            ));
            app.log(format!("  autocomplete: {n} options"));
        }
    }
    Vec::new()
}
