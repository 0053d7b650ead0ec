//! Application state and the single-threaded update function.
//!
//! `App::update` consumes one event and returns the side effects the
//! event loop must perform (protocol sends, file writes, reconnects,
//! quit). All state transitions happen here; the loop and the worker
//! threads never mutate state themselves.

use std::collections::HashMap;
use std::path::PathBuf;

use crossterm::event::{KeyEvent, MouseEvent};
use dyad_ride::Incoming;
use ratatui::style::Color;
use serde_json::{json, Value};

use crate::autocomplete::{apply_completion, Autocomplete};
use crate::config::Config;
use crate::docs::DocStore;
use crate::editor::EditorWindow;
use crate::idioms::IdiomEntry;
use crate::keys::KeyMap;
use crate::logbuf::{LogBuffer, ProtocolLog};
use crate::pane::{PaneCtx, PaneManager, PaneRequest};
use crate::session::{ExecuteOutcome, SessionBuffer};
use crate::tracer::TracerStack;
use crate::vars_pane::VarsMode;
use crate::SHUTDOWN_EXPR;

mod input;
mod panes;
mod protocol;
mod render;

pub use render::render;

/// Side effects requested by an update step, performed by the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send { name: String, args: Value },
    FetchIdioms,
    WriteFile { path: PathBuf, contents: String },
    Reconnect,
    Quit,
}

impl Effect {
    pub fn send(name: &str, args: Value) -> Self {
        Effect::Send {
            name: name.to_string(),
            args,
        }
    }
}

/// One event from the protocol reader thread. `gen` identifies the
/// connection the event came from; stale generations are dropped after a
/// reconnect.
#[derive(Debug)]
pub struct RideEvent {
    pub gen: u64,
    pub kind: RideEventKind,
}

#[derive(Debug)]
pub enum RideEventKind {
    Incoming(Incoming),
    Failed { error: String },
}

/// The unified event stream the loop feeds into `App::update`.
#[derive(Debug)]
pub enum UiEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Ride(RideEvent),
    IdiomsLoaded(Result<Vec<IdiomEntry>, String>),
}

/// Output of the variables-refresh expression, diverted from the session
/// until the next ready prompt.
#[derive(Debug)]
struct VarsCapture {
    mode: VarsMode,
    lines: Vec<String>,
    locals: Vec<String>,
}

pub struct App {
    pub addr: String,
    pub keys: KeyMap,
    pub accent: Color,

    pub connected: bool,
    pub ready: bool,
    /// Connection generation, bumped on every reconnect.
    pub gen: u64,

    pub session: SessionBuffer,
    /// Most recent execute payload, for own-echo suppression.
    last_execute: String,
    /// The shutdown expression was sent; the next disconnect is
    /// intentional.
    pending_quit: bool,

    pub debug_log: LogBuffer,
    proto_log: ProtocolLog,

    pub panes: PaneManager,
    pub editors: HashMap<i64, EditorWindow>,
    pub tracer: TracerStack,
    pub docs: Option<DocStore>,
    pub autocomplete: Option<Autocomplete>,

    // Modal dispatcher state.
    leader_active: bool,
    show_quit_hint: bool,
    confirm_quit: bool,
    pane_move_mode: bool,
    backtick_active: bool,
    save_prompt: Option<String>,

    vars_capture: Option<VarsCapture>,

    width: u16,
    height: u16,
}

impl App {
    pub fn new(cfg: &Config, addr: &str, proto_log: ProtocolLog, docs: Option<DocStore>) -> Self {
        let mut app = Self {
            addr: addr.to_string(),
            keys: cfg.key_map(),
            accent: cfg.accent_color(),
            connected: true,
            ready: true,
            gen: 1,
            session: SessionBuffer::new(),
            last_execute: String::new(),
            pending_quit: false,
            debug_log: LogBuffer::default(),
            proto_log,
            panes: PaneManager::new(80, 24),
            editors: HashMap::new(),
            tracer: TracerStack::default(),
            docs,
            autocomplete: None,
            leader_active: false,
            show_quit_hint: false,
            confirm_quit: false,
            pane_move_mode: false,
            backtick_active: false,
            save_prompt: None,
            vars_capture: None,
            width: 80,
            height: 24,
        };
        app.log(format!("Connected to {addr}"));
        app
    }

    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        self.proto_log.write(&line);
        self.debug_log.push(line);
    }

    pub fn update(&mut self, event: UiEvent) -> Vec<Effect> {
        match event {
            UiEvent::Resize(w, h) => {
                self.width = w;
                self.height = h;
                self.panes.update_size(w, h);
                Vec::new()
            }
            UiEvent::Key(key) => input::handle_key(self, key),
            UiEvent::Mouse(event) => input::handle_mouse(self, event),
            UiEvent::Ride(event) => protocol::handle_ride(self, event),
            UiEvent::IdiomsLoaded(result) => {
                if let Err(err) = &result {
                    self.log(format!("Idiom fetch failed: {err}"));
                }
                if let Some(pane) = self.content_mut::<crate::idioms::IdiomSearch>("idioms") {
                    pane.set_data(result);
                }
                Vec::new()
            }
        }
    }

    /// The loop reconnected; restore readiness and ask the interpreter to
    /// replay any orphaned editor/tracer windows.
    pub fn on_reconnected(&mut self) -> Vec<Effect> {
        self.connected = true;
        self.ready = true;
        let addr = self.addr.clone();
        self.log(format!("Reconnected to {addr}"));
        vec![Effect::send("GetWindowLayout", json!({}))]
    }

    pub fn on_reconnect_failed(&mut self, error: &str) {
        self.log(format!("Reconnect failed: {error}"));
    }

    pub fn on_send_failed(&mut self, error: &str) {
        self.connected = false;
        self.ready = false;
        self.log(format!("Send failed, disconnected: {error}"));
    }

    pub fn screen_size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Borrow the pane manager together with the context panes render
    /// and handle input against.
    fn with_ctx<R>(&mut self, f: impl FnOnce(&mut PaneManager, &mut PaneCtx<'_>) -> R) -> R {
        let App {
            panes,
            editors,
            tracer,
            debug_log,
            keys,
            docs,
            accent,
            ..
        } = self;
        let mut ctx = PaneCtx {
            editors,
            tracer,
            log: debug_log,
            keys,
            docs: docs.as_ref(),
            accent: *accent,
        };
        f(panes, &mut ctx)
    }

    fn content_mut<T: 'static>(&mut self, id: &str) -> Option<&mut T> {
        self.panes
            .get_mut(id)
            .and_then(|pane| pane.content.as_any_mut().downcast_mut::<T>())
    }

    /// Token shown by the focused pane, if it is an editor or the tracer.
    fn focused_editor_token(&self) -> Option<i64> {
        match self.panes.focused_id()? {
            "tracer" => {
                let current = self.tracer.current();
                (current != 0).then_some(current)
            }
            id => id.strip_prefix("editor:")?.parse().ok(),
        }
    }

    /// Resolve the execute key on the session buffer and emit the send,
    /// recording the payload for echo suppression and shutdown tracking.
    fn execute_current_line(&mut self) -> Vec<Effect> {
        if !self.connected {
            self.log("Execute blocked: not connected");
            return Vec::new();
        }
        if !self.ready {
            self.log("Execute blocked: not ready");
            return Vec::new();
        }
        match self.session.take_execute() {
            ExecuteOutcome::Nothing => Vec::new(),
            ExecuteOutcome::Run(text) => {
                self.ready = false;
                self.last_execute = format!("{text}\n");
                self.pending_quit = text.trim() == SHUTDOWN_EXPR;
                self.log(format!("→ Execute {text:?}"));
                vec![Effect::send(
                    "Execute",
                    json!({"text": self.last_execute, "trace": 0}),
                )]
            }
        }
    }

    /// Run an expression on the session's behalf (variable open, variable
    /// refresh) with the same bookkeeping as a typed execute.
    fn execute_hidden(&mut self, expr: &str) -> Vec<Effect> {
        if !self.connected || !self.ready {
            self.log("Execute blocked: interpreter busy");
            return Vec::new();
        }
        self.ready = false;
        self.last_execute = format!("{expr}\n");
        self.log(format!("→ Execute {expr:?}"));
        vec![Effect::send(
            "Execute",
            json!({"text": self.last_execute, "trace": 0}),
        )]
    }

    fn save_editor(&mut self, token: i64) -> Vec<Effect> {
        let Some(w) = self.editors.get(&token) else {
            return Vec::new();
        };
        let args = w.save_args();
        self.log(format!("→ SaveChanges win={token}"));
        vec![Effect::send("SaveChanges", args)]
    }

    /// Close an editor window. A modified window is saved first; the
    /// close request is not issued until the save reply confirms, since
    /// the interpreter answers the two independently.
    fn close_editor(&mut self, token: i64) -> Vec<Effect> {
        let Some(w) = self.editors.get_mut(&token) else {
            return Vec::new();
        };
        if w.modified {
            w.pending_close = true;
            let effects = self.save_editor(token);
            self.log("  (waiting for ReplySaveChanges before CloseWindow)");
            effects
        } else {
            self.send_close_window(token)
        }
    }

    fn send_close_window(&mut self, token: i64) -> Vec<Effect> {
        self.log(format!("→ CloseWindow win={token}"));
        // The pane stays until the interpreter confirms the close.
        vec![Effect::send("CloseWindow", json!({"win": token}))]
    }

    /// Insert a glyph where the user is typing: the focused editable
    /// editor, else the session.
    fn insert_glyph(&mut self, glyph: char) {
        if let Some(token) = self.focused_editor_token() {
            if let Some(w) = self.editors.get_mut(&token) {
                let editable = w.edit_mode || (!w.debugger && !w.read_only);
                if editable {
                    crate::editor_pane::insert_char(w, glyph);
                    return;
                }
            }
        }
        self.session.insert_char(glyph);
    }

    /// Apply a completion to its owning window (0 = session), replacing
    /// `skip` characters before the caret.
    fn apply_autocomplete(&mut self, token: i64, skip: usize, option: &str) {
        if token == 0 {
            let (text, col) =
                apply_completion(self.session.current_text(), self.session.col, skip, option);
            self.session.set_current_text(text);
            self.session.col = col;
        } else if let Some(w) = self.editors.get_mut(&token) {
            let (text, col) = apply_completion(w.line(w.cursor_row), w.cursor_col, skip, option);
            if w.cursor_row < w.text.len() {
                w.text[w.cursor_row] = text;
                w.cursor_col = col;
                w.modified = true;
            }
        }
    }

    /// Perform a one-shot request handed back by a pane.
    fn apply_pane_request(&mut self, request: PaneRequest) -> Vec<Effect> {
        match request {
            PaneRequest::CloseEditor(token) => self.close_editor(token),
            PaneRequest::SaveEditor(token) => self.save_editor(token),
            PaneRequest::Tracer(cmd, token) => {
                self.log(format!("→ {} win={token}", cmd.message_name()));
                vec![Effect::send(cmd.message_name(), json!({"win": token}))]
            }
            PaneRequest::Action(action) => {
                self.panes.remove("commands");
                panes::dispatch_action(self, action.as_str())
            }
            PaneRequest::InsertGlyph(glyph) => {
                self.panes.remove("symbols");
                self.session.insert_char(glyph);
                Vec::new()
            }
            PaneRequest::InsertText(text) => {
                self.panes.remove("idioms");
                for ch in text.chars() {
                    self.session.insert_char(ch);
                }
                Vec::new()
            }
            PaneRequest::SurfaceFrame(token) => {
                panes::surface_frame(self, token);
                Vec::new()
            }
            PaneRequest::OpenVariable(name) => self.execute_hidden(&format!(")ed {name}")),
            PaneRequest::RefreshVariables(mode) => panes::request_vars_refresh(self, mode),
            PaneRequest::Autocomplete { token, line, pos } => {
                self.log(format!("→ GetAutocomplete pos={pos} win={token}"));
                vec![Effect::send(
                    "GetAutocomplete",
                    json!({"line": line, "pos": pos, "token": token}),
                )]
            }
        }
    }

    /// Autocomplete for the session caret. The indent is stripped so the
    /// interpreter sees the expression the way the user reads it.
    fn request_session_autocomplete(&mut self) -> Vec<Effect> {
        let full = self.session.current_text();
        let col = self.session.col;
        let lead = full
            .chars()
            .take_while(|ch| *ch == ' ')
            .count()
            .min(col);
        let line: String = full.chars().skip(lead).collect();
        let pos = col - lead;
        self.apply_pane_request(PaneRequest::Autocomplete {
            token: 0,
            line,
            pos,
        })
    }

    fn begin_save_prompt(&mut self) {
        let stamp = time::OffsetDateTime::now_utc()
            .format(time::macros::format_description!(
                "[year][month][day]-[hour][minute][second]"
            ))
            .unwrap_or_default();
        self.save_prompt = Some(format!("session-{stamp}"));
    }

    pub fn leader_is_active(&self) -> bool {
        self.leader_active
    }
}
