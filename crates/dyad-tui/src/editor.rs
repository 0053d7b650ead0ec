use dyad_ride::args;
use serde_json::{Map, Value};
use smol_str::SmolStr;

/// State of one interpreter-side editor or tracer window, keyed by the
/// non-zero token the interpreter assigned to it.
#[derive(Debug, Clone, Default)]
pub struct EditorWindow {
    pub token: i64,
    pub name: SmolStr,
    pub text: Vec<String>,
    pub entity_type: i64,
    /// Breakpoint lines, zero-based.
    pub stop: Vec<usize>,
    pub monitor: Vec<usize>,
    pub trace: Vec<usize>,
    /// Interpreter-highlighted line, -1 when none.
    pub current_row: i64,
    pub read_only: bool,
    /// True for tracer frames.
    pub debugger: bool,

    // Local editing state.
    pub modified: bool,
    /// Waiting for a save reply before sending the close.
    pub pending_close: bool,
    /// The user opted into editing a tracer or read-only window.
    pub edit_mode: bool,
    pub cursor_row: usize,
    pub cursor_col: usize,
}

impl EditorWindow {
    /// Build from `OpenWindow` args. The peer sends `debugger`/`readOnly`
    /// as 0/1 numbers or booleans; both are accepted.
    pub fn from_args(args_map: &Map<String, Value>) -> Self {
        let current_row = args::int(args_map, "currentRow").unwrap_or(-1);
        Self {
            token: args::int(args_map, "token").unwrap_or(0),
            name: SmolStr::new(args::text(args_map, "name").unwrap_or("")),
            text: args::lines(args_map, "text").unwrap_or_default(),
            entity_type: args::int(args_map, "entityType").unwrap_or(0),
            stop: args::line_set(args_map, "stop").unwrap_or_default(),
            monitor: args::line_set(args_map, "monitor").unwrap_or_default(),
            trace: args::line_set(args_map, "trace").unwrap_or_default(),
            current_row,
            read_only: args::flag(args_map, "readOnly").unwrap_or(false),
            debugger: args::flag(args_map, "debugger").unwrap_or(false),
            modified: false,
            pending_close: false,
            edit_mode: false,
            cursor_row: current_row.max(0) as usize,
            cursor_col: 0,
        }
    }

    /// Apply an `UpdateWindow`: only fields present are replaced.
    pub fn update_from(&mut self, args_map: &Map<String, Value>) {
        if let Some(text) = args::lines(args_map, "text") {
            self.text = text;
        }
        if let Some(row) = args::int(args_map, "currentRow") {
            self.current_row = row;
        }
        if let Some(debugger) = args::flag(args_map, "debugger") {
            self.debugger = debugger;
        }
        if let Some(stop) = args::line_set(args_map, "stop") {
            self.stop = stop;
        }
        if let Some(monitor) = args::line_set(args_map, "monitor") {
            self.monitor = monitor;
        }
        if let Some(trace) = args::line_set(args_map, "trace") {
            self.trace = trace;
        }
        self.cursor_row = self.cursor_row.min(self.text.len().saturating_sub(1));
    }

    pub fn has_stop(&self, line: usize) -> bool {
        self.stop.contains(&line)
    }

    /// Flip the breakpoint on `line`. Always marks the window modified so
    /// the change is persisted when the window closes.
    pub fn toggle_stop(&mut self, line: usize) {
        if let Some(idx) = self.stop.iter().position(|&s| s == line) {
            self.stop.remove(idx);
        } else {
            self.stop.push(line);
        }
        self.modified = true;
    }

    pub fn line(&self, row: usize) -> &str {
        self.text.get(row).map(String::as_str).unwrap_or("")
    }

    /// Locals named in the function header, e.g. `r←f y;a;b` declares
    /// `a` and `b`.
    pub fn header_locals(&self) -> Vec<&str> {
        let header = self.line(0);
        header
            .split(';')
            .skip(1)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Args for a `SaveChanges` request.
    pub fn save_args(&self) -> Value {
        serde_json::json!({
            "win": self.token,
            "text": self.text,
            "stop": self.stop,
            "monitor": self.monitor,
            "trace": self.trace,
        })
    }

    /// Args for an immediate `SetLineAttributes` update.
    pub fn line_attribute_args(&self) -> Value {
        serde_json::json!({
            "win": self.token,
            "stop": self.stop,
            "monitor": self.monitor,
            "trace": self.trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dyad_ride::{parse_payload, Incoming};

    fn window_from(payload: &str) -> EditorWindow {
        let Incoming::Command(msg) = parse_payload(payload) else {
            panic!("expected command payload");
        };
        EditorWindow::from_args(&msg.args)
    }

    #[test]
    fn parses_an_open_window_with_numeric_flags() {
        let w = window_from(
            r#"["OpenWindow",{"token":10,"name":"X","text":["X","Y"],"entityType":1,
                "currentRow":1,"debugger":1,"readOnly":0,"stop":[1],"monitor":[],"trace":[]}]"#,
        );
        assert_eq!(w.token, 10);
        assert_eq!(w.name, "X");
        assert!(w.debugger);
        assert!(!w.read_only);
        assert_eq!(w.stop, vec![1]);
        assert_eq!(w.current_row, 1);
        assert_eq!(w.cursor_row, 1);
    }

    #[test]
    fn update_replaces_only_present_fields() {
        let mut w = window_from(
            r#"["OpenWindow",{"token":7,"name":"F","text":["F","a←1"],"stop":[1],"currentRow":0}]"#,
        );
        let Incoming::Command(msg) =
            parse_payload(r#"["UpdateWindow",{"token":7,"currentRow":1}]"#)
        else {
            panic!("expected command payload");
        };
        w.update_from(&msg.args);
        assert_eq!(w.current_row, 1);
        assert_eq!(w.text, vec!["F", "a←1"]);
        assert_eq!(w.stop, vec![1]);
    }

    #[test]
    fn toggle_stop_twice_restores_the_set() {
        let mut w = window_from(r#"["OpenWindow",{"token":1,"name":"F","text":["F"],"stop":[2]}]"#);
        let before = w.stop.clone();
        w.toggle_stop(4);
        assert!(w.has_stop(4));
        assert!(w.modified);
        w.toggle_stop(4);
        assert_eq!(w.stop, before);
        assert!(w.modified);
    }

    #[test]
    fn header_locals_come_after_the_semicolons() {
        let w = window_from(
            r#"["OpenWindow",{"token":1,"name":"Z","text":["r←Z;a;b","a←42","b←'hi'"]}]"#,
        );
        assert_eq!(w.header_locals(), vec!["a", "b"]);
    }

    #[test]
    fn save_args_carry_all_line_attribute_sets() {
        let mut w = window_from(
            r#"["OpenWindow",{"token":7,"name":"F","text":["F","a←1"],"stop":[],"monitor":[1],"trace":[]}]"#,
        );
        w.toggle_stop(0);
        let args = w.save_args();
        assert_eq!(args["win"], 7);
        assert_eq!(args["stop"], serde_json::json!([0]));
        assert_eq!(args["monitor"], serde_json::json!([1]));
        assert_eq!(args["text"], serde_json::json!(["F", "a←1"]));
    }
}
