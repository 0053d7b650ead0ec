use serde_json::{Map, Value};
use tracing::warn;

/// One protocol command: `["Name", {args}]` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub name: String,
    pub args: Map<String, Value>,
}

impl Message {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn to_payload(&self) -> String {
        Value::Array(vec![
            Value::String(self.name.clone()),
            Value::Object(self.args.clone()),
        ])
        .to_string()
    }
}

/// Semantic content of one received frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Command(Message),
    /// Handshake lines, and any payload that fails to parse as a command.
    Line(String),
}

/// Interpret a frame payload. Payloads that do not begin with `[` are
/// handshake lines; malformed JSON degrades to a raw line and is logged,
/// never a hard error.
pub fn parse_payload(payload: &str) -> Incoming {
    if !payload.starts_with('[') {
        return Incoming::Line(payload.to_string());
    }

    let parsed: Result<Vec<Value>, _> = serde_json::from_str(payload);
    let mut items = match parsed {
        Ok(items) => items,
        Err(err) => {
            warn!(%err, "undecodable frame payload");
            return Incoming::Line(payload.to_string());
        }
    };
    if items.len() < 2 {
        warn!(len = items.len(), "frame payload is not a command pair");
        return Incoming::Line(payload.to_string());
    }

    let args = items.remove(1);
    let name = items.remove(0);
    match (name, args) {
        (Value::String(name), Value::Object(args)) => Incoming::Command(Message { name, args }),
        _ => {
            warn!("frame payload has a non-string name or non-object args");
            Incoming::Line(payload.to_string())
        }
    }
}

/// Tolerant accessors for command arguments.
///
/// The peer encodes booleans as 0/1 numbers for some fields (`debugger`,
/// `readOnly`, dialog flags); [`flag`] accepts either form.
pub mod args {
    use serde_json::{Map, Value};

    pub fn int(args: &Map<String, Value>, key: &str) -> Option<i64> {
        args.get(key).and_then(Value::as_i64)
    }

    pub fn flag(args: &Map<String, Value>, key: &str) -> Option<bool> {
        match args.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(n.as_i64()? != 0),
            _ => None,
        }
    }

    pub fn text<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
        args.get(key).and_then(Value::as_str)
    }

    pub fn lines(args: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
        let items = args.get(key)?.as_array()?;
        Some(
            items
                .iter()
                .map(|item| item.as_str().unwrap_or_default().to_string())
                .collect(),
        )
    }

    pub fn line_set(args: &Map<String, Value>, key: &str) -> Option<Vec<usize>> {
        let items = args.get(key)?.as_array()?;
        Some(
            items
                .iter()
                .filter_map(|item| item.as_u64().map(|n| n as usize))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_payload_roundtrips() {
        let msg = Message::new("Execute", json!({"text": "1+1\n", "trace": 0}));
        let payload = msg.to_payload();
        assert_eq!(parse_payload(&payload), Incoming::Command(msg));
    }

    #[test]
    fn handshake_line_passes_through() {
        assert_eq!(
            parse_payload("SupportedProtocols=2"),
            Incoming::Line("SupportedProtocols=2".to_string())
        );
    }

    #[test]
    fn malformed_json_degrades_to_raw_line() {
        for bad in ["[truncated", "[1, 2]", "[\"OnlyName\"]", "[{}, {}]"] {
            assert_eq!(parse_payload(bad), Incoming::Line(bad.to_string()));
        }
    }

    #[test]
    fn flag_accepts_bool_and_numeric_forms() {
        let Incoming::Command(msg) = parse_payload(
            r#"["OpenWindow",{"debugger":1,"readOnly":false,"token":3}]"#,
        ) else {
            panic!("expected command");
        };
        assert_eq!(args::flag(&msg.args, "debugger"), Some(true));
        assert_eq!(args::flag(&msg.args, "readOnly"), Some(false));
        assert_eq!(args::flag(&msg.args, "missing"), None);
        assert_eq!(args::int(&msg.args, "token"), Some(3));
    }

    #[test]
    fn line_set_skips_non_numeric_entries() {
        let Incoming::Command(msg) =
            parse_payload(r#"["UpdateWindow",{"stop":[0, 2, "x", 5]}]"#)
        else {
            panic!("expected command");
        };
        assert_eq!(args::line_set(&msg.args, "stop"), Some(vec![0, 2, 5]));
    }
}
