use std::env;
use std::path::PathBuf;

use ratatui::style::Color;
use serde::Deserialize;

use crate::keys::{Binding, KeyMap, TracerKeys};

const DEFAULT_CONFIG: &str = include_str!("../dyad.default.toml");

/// User configuration, discovered in order: `./dyad.toml`, the per-user
/// config directory, then the embedded default.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub accent: String,
    pub keys: KeysConfig,
    pub tracer_keys: TracerKeysConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KeysConfig {
    pub leader: Vec<String>,
    pub execute: Vec<String>,
    pub toggle_debug: Vec<String>,
    pub toggle_stack: Vec<String>,
    pub toggle_locals: Vec<String>,
    pub toggle_breakpoint: Vec<String>,
    pub reconnect: Vec<String>,
    pub command_palette: Vec<String>,
    pub pane_move_mode: Vec<String>,
    pub cycle_pane: Vec<String>,
    pub close_pane: Vec<String>,
    pub quit: Vec<String>,
    pub show_keys: Vec<String>,
    pub autocomplete: Vec<String>,

    pub up: Vec<String>,
    pub down: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub home: Vec<String>,
    pub end: Vec<String>,
    pub pgup: Vec<String>,
    pub pgdn: Vec<String>,
    pub backspace: Vec<String>,
    pub delete: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TracerKeysConfig {
    pub step_over: String,
    pub step_into: String,
    pub step_out: String,
    #[serde(rename = "continue")]
    pub resume: String,
    pub resume_all: String,
    pub backward: String,
    pub forward: String,
    pub edit_mode: String,
}

impl Config {
    pub fn load() -> Self {
        for path in Self::search_paths() {
            if let Ok(text) = std::fs::read_to_string(&path) {
                match toml::from_str(&text) {
                    Ok(cfg) => return cfg,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), %err, "ignoring bad config file")
                    }
                }
            }
        }
        Self::embedded_default()
    }

    pub fn embedded_default() -> Self {
        // The embedded file ships with the binary; a parse failure is a
        // build defect, caught by tests.
        toml::from_str(DEFAULT_CONFIG).unwrap_or_default()
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("dyad.toml")];
        let config_home = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")));
        if let Some(dir) = config_home {
            paths.push(dir.join("dyad").join("dyad.toml"));
        }
        paths
    }

    /// Accent color: `#RRGGBB`, or an indexed color number.
    pub fn accent_color(&self) -> Color {
        parse_color(&self.accent).unwrap_or(Color::Rgb(0xF2, 0xA7, 0x4F))
    }

    pub fn key_map(&self) -> KeyMap {
        let single = |s: &String| s.chars().next();
        KeyMap {
            leader: Binding::parse(&self.keys.leader),
            execute: Binding::parse(&self.keys.execute),
            toggle_debug: Binding::parse(&self.keys.toggle_debug),
            toggle_stack: Binding::parse(&self.keys.toggle_stack),
            toggle_locals: Binding::parse(&self.keys.toggle_locals),
            toggle_breakpoint: Binding::parse(&self.keys.toggle_breakpoint),
            reconnect: Binding::parse(&self.keys.reconnect),
            command_palette: Binding::parse(&self.keys.command_palette),
            pane_move_mode: Binding::parse(&self.keys.pane_move_mode),
            cycle_pane: Binding::parse(&self.keys.cycle_pane),
            close_pane: Binding::parse(&self.keys.close_pane),
            quit: Binding::parse(&self.keys.quit),
            show_keys: Binding::parse(&self.keys.show_keys),
            autocomplete: Binding::parse(&self.keys.autocomplete),
            up: Binding::parse(&self.keys.up),
            down: Binding::parse(&self.keys.down),
            left: Binding::parse(&self.keys.left),
            right: Binding::parse(&self.keys.right),
            home: Binding::parse(&self.keys.home),
            end: Binding::parse(&self.keys.end),
            pgup: Binding::parse(&self.keys.pgup),
            pgdn: Binding::parse(&self.keys.pgdn),
            backspace: Binding::parse(&self.keys.backspace),
            delete: Binding::parse(&self.keys.delete),
            tracer: TracerKeys {
                step_over: single(&self.tracer_keys.step_over),
                step_into: single(&self.tracer_keys.step_into),
                step_out: single(&self.tracer_keys.step_out),
                resume: single(&self.tracer_keys.resume),
                resume_all: single(&self.tracer_keys.resume_all),
                backward: single(&self.tracer_keys.backward),
                forward: single(&self.tracer_keys.forward),
                edit_mode: single(&self.tracer_keys.edit_mode),
            },
        }
    }
}

fn parse_color(text: &str) -> Option<Color> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix('#') {
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some(Color::Rgb(r, g, b));
        }
        return None;
    }
    text.parse::<u8>().ok().map(Color::Indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[test]
    fn embedded_default_parses_and_binds_the_leader() {
        let cfg = Config::embedded_default();
        let keys = cfg.key_map();
        assert!(keys
            .leader
            .matches(KeyEvent::new(KeyCode::Char(']'), KeyModifiers::CONTROL)));
        assert!(keys.execute.matches(KeyEvent::from(KeyCode::Enter)));
        assert_eq!(keys.tracer.edit_mode, Some('e'));
        assert_eq!(keys.tracer.resume, Some('c'));
    }

    #[test]
    fn missing_binding_lists_disable_their_actions() {
        let cfg: Config = toml::from_str("accent = \"#112233\"").expect("parse");
        let keys = cfg.key_map();
        assert!(keys.toggle_debug.is_disabled());
        assert_eq!(cfg.accent_color(), Color::Rgb(0x11, 0x22, 0x33));
    }

    #[test]
    fn bad_accent_falls_back_to_the_brand_color() {
        let cfg: Config = toml::from_str("accent = \"#nothex\"").expect("parse");
        assert_eq!(cfg.accent_color(), Color::Rgb(0xF2, 0xA7, 0x4F));
    }
}
