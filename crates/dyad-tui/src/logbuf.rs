use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const LOG_CAP: usize = 500;
const TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[hour]:[minute]:[second].[subsecond digits:3]");

/// Append-only debug ring. Owned by the event loop; the debug pane only
/// reads it.
#[derive(Debug, Default)]
pub struct LogBuffer {
    lines: VecDeque<String>,
}

impl LogBuffer {
    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() >= LOG_CAP {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}

/// Optional timestamped protocol log appended to a user-chosen file.
#[derive(Debug, Default)]
pub struct ProtocolLog {
    file: Option<File>,
}

impl ProtocolLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Some(file) })
    }

    pub fn write(&mut self, line: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let stamp = OffsetDateTime::now_utc()
            .format(TIMESTAMP)
            .unwrap_or_default();
        let _ = writeln!(file, "[{stamp}] {line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_drops_the_oldest_line_past_the_cap() {
        let mut log = LogBuffer::default();
        for i in 0..(LOG_CAP + 10) {
            log.push(format!("line {i}"));
        }
        assert_eq!(log.len(), LOG_CAP);
        assert_eq!(log.iter().next(), Some("line 10"));
        assert_eq!(log.iter().last(), Some("line 509"));
    }
}
