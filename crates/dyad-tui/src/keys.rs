use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use smol_str::SmolStr;

/// One configured key chord, e.g. `ctrl+]`, `shift+tab`, `f12`, `d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

/// A bindable action: zero or more chords plus a display label.
/// An empty chord list is a disabled binding.
#[derive(Debug, Clone)]
pub struct Binding {
    specs: Vec<KeySpec>,
    pub label: SmolStr,
}

impl Binding {
    pub fn disabled() -> Self {
        Self {
            specs: Vec::new(),
            label: SmolStr::default(),
        }
    }

    /// Build from configured key names; unparseable names are dropped.
    pub fn parse(names: &[String]) -> Self {
        let specs = names
            .iter()
            .filter_map(|name| parse_key_name(name))
            .collect::<Vec<_>>();
        let label = SmolStr::new(names.first().map(String::as_str).unwrap_or(""));
        Self { specs, label }
    }

    pub fn matches(&self, key: KeyEvent) -> bool {
        let (code, mods) = normalize(key);
        self.specs
            .iter()
            .any(|spec| spec.code == code && spec.mods == mods)
    }

    pub fn is_disabled(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Uppercase chars and BackTab arrive with an implicit SHIFT; fold it
/// away so bindings written as `D` or `shift+tab` behave the same.
fn normalize(key: KeyEvent) -> (KeyCode, KeyModifiers) {
    let mut mods = key.modifiers;
    if matches!(key.code, KeyCode::Char(_) | KeyCode::BackTab) {
        mods.remove(KeyModifiers::SHIFT);
    }
    (key.code, mods)
}

/// Parse a key name of the form `[ctrl+][alt+][shift+]key`.
pub fn parse_key_name(name: &str) -> Option<KeySpec> {
    let mut mods = KeyModifiers::NONE;
    let mut rest = name.trim();
    loop {
        let lower = rest.to_ascii_lowercase();
        if let Some(tail) = lower.strip_prefix("ctrl+") {
            mods |= KeyModifiers::CONTROL;
            rest = &rest[rest.len() - tail.len()..];
        } else if let Some(tail) = lower.strip_prefix("alt+") {
            mods |= KeyModifiers::ALT;
            rest = &rest[rest.len() - tail.len()..];
        } else if let Some(tail) = lower.strip_prefix("shift+") {
            mods |= KeyModifiers::SHIFT;
            rest = &rest[rest.len() - tail.len()..];
        } else {
            break;
        }
    }

    let code = match rest.to_ascii_lowercase().as_str() {
        "enter" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "tab" => {
            if mods.contains(KeyModifiers::SHIFT) {
                mods.remove(KeyModifiers::SHIFT);
                KeyCode::BackTab
            } else {
                KeyCode::Tab
            }
        }
        "backtab" => KeyCode::BackTab,
        "space" => KeyCode::Char(' '),
        "backspace" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pgup" | "pageup" => KeyCode::PageUp,
        "pgdn" | "pagedown" => KeyCode::PageDown,
        other => {
            if let Some(n) = other.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                KeyCode::F(n)
            } else {
                let mut chars = rest.chars();
                let ch = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                // Char chords fold SHIFT into the char itself.
                if mods.contains(KeyModifiers::SHIFT) {
                    mods.remove(KeyModifiers::SHIFT);
                }
                KeyCode::Char(ch)
            }
        }
    };
    Some(KeySpec { code, mods })
}

/// Tracer-mode single keys. Empty string disables a key.
#[derive(Debug, Clone, Default)]
pub struct TracerKeys {
    pub step_over: Option<char>,
    pub step_into: Option<char>,
    pub step_out: Option<char>,
    pub resume: Option<char>,
    pub resume_all: Option<char>,
    pub backward: Option<char>,
    pub forward: Option<char>,
    pub edit_mode: Option<char>,
}

/// All configured bindings, resolved for dispatch.
#[derive(Debug, Clone)]
pub struct KeyMap {
    pub leader: Binding,
    pub execute: Binding,
    pub toggle_debug: Binding,
    pub toggle_stack: Binding,
    pub toggle_locals: Binding,
    pub toggle_breakpoint: Binding,
    pub reconnect: Binding,
    pub command_palette: Binding,
    pub pane_move_mode: Binding,
    pub cycle_pane: Binding,
    pub close_pane: Binding,
    pub quit: Binding,
    pub show_keys: Binding,
    pub autocomplete: Binding,

    pub up: Binding,
    pub down: Binding,
    pub left: Binding,
    pub right: Binding,
    pub home: Binding,
    pub end: Binding,
    pub pgup: Binding,
    pub pgdn: Binding,
    pub backspace: Binding,
    pub delete: Binding,

    pub tracer: TracerKeys,
}

impl KeyMap {
    /// Rows for the keys pane: (chord, action), leader sequences spelled
    /// with the leader prefix.
    pub fn reference_rows(&self) -> Vec<(String, &'static str)> {
        let leader = self.leader.label.as_str();
        let with_leader = |b: &Binding| format!("{leader} {}", b.label);
        let plain = |b: &Binding| b.label.to_string();
        let tracer = |key: Option<char>| key.map(String::from).unwrap_or_default();

        vec![
            (plain(&self.execute), "execute line"),
            (plain(&self.autocomplete), "autocomplete"),
            (plain(&self.cycle_pane), "cycle pane focus"),
            (plain(&self.close_pane), "close pane"),
            (with_leader(&self.toggle_debug), "toggle debug log"),
            (with_leader(&self.toggle_stack), "toggle stack pane"),
            (with_leader(&self.toggle_locals), "toggle variables"),
            (with_leader(&self.toggle_breakpoint), "toggle breakpoint"),
            (with_leader(&self.reconnect), "reconnect"),
            (with_leader(&self.command_palette), "command palette"),
            (with_leader(&self.pane_move_mode), "move/resize pane"),
            (with_leader(&self.show_keys), "this list"),
            (with_leader(&self.quit), "quit"),
            ("`".to_string(), "APL glyph prefix"),
            (tracer(self.tracer.step_over), "tracer: step over"),
            (tracer(self.tracer.step_into), "tracer: step into"),
            (tracer(self.tracer.step_out), "tracer: step out"),
            (tracer(self.tracer.resume), "tracer: continue"),
            (tracer(self.tracer.resume_all), "tracer: resume all"),
            (tracer(self.tracer.backward), "tracer: jump back"),
            (tracer(self.tracer.forward), "tracer: jump forward"),
            (tracer(self.tracer.edit_mode), "tracer: edit mode"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn parses_modifier_chords() {
        assert_eq!(
            parse_key_name("ctrl+]"),
            Some(KeySpec {
                code: KeyCode::Char(']'),
                mods: KeyModifiers::CONTROL
            })
        );
        assert_eq!(
            parse_key_name("shift+tab"),
            Some(KeySpec {
                code: KeyCode::BackTab,
                mods: KeyModifiers::NONE
            })
        );
        assert_eq!(
            parse_key_name("f12"),
            Some(KeySpec {
                code: KeyCode::F(12),
                mods: KeyModifiers::NONE
            })
        );
        assert_eq!(parse_key_name("not-a-key"), None);
    }

    #[test]
    fn binding_matches_any_listed_chord() {
        let binding = Binding::parse(&["esc".to_string(), "ctrl+g".to_string()]);
        assert!(binding.matches(key(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(binding.matches(key(KeyCode::Char('g'), KeyModifiers::CONTROL)));
        assert!(!binding.matches(key(KeyCode::Char('g'), KeyModifiers::NONE)));
    }

    #[test]
    fn empty_binding_is_disabled_and_never_matches() {
        let binding = Binding::parse(&[]);
        assert!(binding.is_disabled());
        assert!(!binding.matches(key(KeyCode::Enter, KeyModifiers::NONE)));
    }

    #[test]
    fn uppercase_char_events_fold_their_shift_modifier() {
        let binding = Binding::parse(&["D".to_string()]);
        assert!(binding.matches(key(KeyCode::Char('D'), KeyModifiers::SHIFT)));
    }
}
