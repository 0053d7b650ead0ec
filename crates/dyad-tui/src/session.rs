use crate::APL_INDENT;

/// One line of the session: the visible text plus an undo snapshot taken
/// on the first in-place edit of a history line.
#[derive(Debug, Clone, Default)]
pub struct SessionLine {
    pub text: String,
    pub original: String,
    pub edited: bool,
}

impl SessionLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            original: String::new(),
            edited: false,
        }
    }
}

/// What pressing execute resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Nothing to run (blank history line, or a blank input line that
    /// became a spacer).
    Nothing,
    /// Run this text; the buffer has already been rearranged.
    Run(String),
}

/// The editable command history. At least one line always exists and the
/// last line is the live input line.
#[derive(Debug)]
pub struct SessionBuffer {
    pub lines: Vec<SessionLine>,
    pub row: usize,
    pub col: usize,
}

impl Default for SessionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self {
            lines: vec![SessionLine::new(APL_INDENT)],
            row: 0,
            col: APL_INDENT.chars().count(),
        }
    }

    pub fn current_text(&self) -> &str {
        self.lines
            .get(self.row)
            .map(|line| line.text.as_str())
            .unwrap_or("")
    }

    fn current_len(&self) -> usize {
        self.current_text().chars().count()
    }

    /// Replace the current line's text, snapshotting the pre-edit text the
    /// first time a line is touched.
    pub fn set_current_text(&mut self, text: String) {
        let Some(line) = self.lines.get_mut(self.row) else {
            return;
        };
        if !line.edited {
            line.original = line.text.clone();
            line.edited = true;
        }
        line.text = text;
    }

    pub fn insert_char(&mut self, ch: char) {
        let mut chars: Vec<char> = self.current_text().chars().collect();
        let col = self.col.min(chars.len());
        chars.insert(col, ch);
        self.set_current_text(chars.into_iter().collect());
        self.col = col + 1;
    }

    pub fn backspace(&mut self) {
        if self.col == 0 {
            return;
        }
        let mut chars: Vec<char> = self.current_text().chars().collect();
        let col = self.col.min(chars.len());
        if col == 0 {
            return;
        }
        chars.remove(col - 1);
        self.set_current_text(chars.into_iter().collect());
        self.col = col - 1;
    }

    pub fn delete_forward(&mut self) {
        let mut chars: Vec<char> = self.current_text().chars().collect();
        if self.col < chars.len() {
            chars.remove(self.col);
            self.set_current_text(chars.into_iter().collect());
        }
    }

    pub fn move_left(&mut self) {
        self.col = self.col.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.col < self.current_len() {
            self.col += 1;
        }
    }

    pub fn move_up(&mut self, rows: usize) {
        self.row = self.row.saturating_sub(rows);
        self.clamp_col();
    }

    pub fn move_down(&mut self, rows: usize) {
        self.row = (self.row + rows).min(self.lines.len() - 1);
        self.clamp_col();
    }

    pub fn move_home(&mut self) {
        self.col = 0;
    }

    pub fn move_end(&mut self) {
        self.col = self.current_len();
    }

    pub fn clamp_col(&mut self) {
        self.col = self.col.min(self.current_len());
    }

    fn on_input_line(&self) -> bool {
        self.row == self.lines.len() - 1
    }

    /// Resolve an execute request.
    ///
    /// A history line with edits is restored to its snapshot and the
    /// edited text is moved onto the input line; the caret lands on the
    /// input line either way. Blank input appends a spacer line.
    pub fn take_execute(&mut self) -> ExecuteOutcome {
        let edited = self.current_text().to_string();
        let code = edited.trim();

        if code.is_empty() {
            if self.on_input_line() {
                self.push_input_line();
            }
            return ExecuteOutcome::Nothing;
        }

        if self.on_input_line() {
            let line = &mut self.lines[self.row];
            line.text = edited.clone();
            line.edited = false;
            line.original.clear();
        } else {
            let line = &mut self.lines[self.row];
            if line.edited {
                line.text = std::mem::take(&mut line.original);
                line.edited = false;
            }
            let last = self.lines.len() - 1;
            let input = &mut self.lines[last];
            input.text = edited.clone();
            input.edited = false;
            input.original.clear();
            self.row = last;
        }
        self.col = edited.chars().count();
        ExecuteOutcome::Run(edited)
    }

    /// Append interpreter output, one session line per text line, and
    /// follow it with the caret.
    pub fn append_output(&mut self, text: &str) {
        let trimmed = text.strip_suffix('\n').unwrap_or(text);
        for piece in trimmed.split('\n') {
            self.lines.push(SessionLine::new(piece));
        }
        self.row = self.lines.len() - 1;
        self.col = 0;
    }

    /// Append a fresh indented input line and move the caret onto it.
    pub fn push_input_line(&mut self) {
        self.lines.push(SessionLine::new(APL_INDENT));
        self.row = self.lines.len() - 1;
        self.col = APL_INDENT.chars().count();
    }

    /// Visible marker for a connection loss; the session itself survives.
    pub fn push_disconnect_marker(&mut self) {
        self.lines.push(SessionLine::new("⍝ Disconnected"));
        self.lines.push(SessionLine::new(""));
        self.row = self.lines.len() - 1;
        self.col = 0;
    }

    /// The whole buffer, for saving to a file.
    pub fn contents(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(session: &mut SessionBuffer, text: &str) {
        for ch in text.chars() {
            session.insert_char(ch);
        }
    }

    #[test]
    fn starts_with_one_indented_input_line() {
        let session = SessionBuffer::new();
        assert_eq!(session.lines.len(), 1);
        assert_eq!(session.current_text(), APL_INDENT);
        assert_eq!(session.col, 6);
    }

    #[test]
    fn execute_on_the_input_line_runs_it_as_typed() {
        let mut session = SessionBuffer::new();
        type_text(&mut session, "1+1");
        assert_eq!(
            session.take_execute(),
            ExecuteOutcome::Run("      1+1".to_string())
        );
        assert!(!session.lines[0].edited);
        assert_eq!(session.row, 0);
    }

    #[test]
    fn blank_input_line_becomes_a_spacer() {
        let mut session = SessionBuffer::new();
        assert_eq!(session.take_execute(), ExecuteOutcome::Nothing);
        assert_eq!(session.lines.len(), 2);
        assert_eq!(session.row, 1);
        assert_eq!(session.col, 6);
    }

    #[test]
    fn blank_history_line_does_nothing() {
        let mut session = SessionBuffer::new();
        session.append_output("2\n\n");
        session.push_input_line();
        session.row = 2; // the blank output line
        session.col = 0;
        let lines_before = session.lines.len();
        assert_eq!(session.take_execute(), ExecuteOutcome::Nothing);
        assert_eq!(session.lines.len(), lines_before);
    }

    #[test]
    fn first_edit_snapshots_the_original_text() {
        let mut session = SessionBuffer::new();
        type_text(&mut session, "1+1");
        session.take_execute();
        session.append_output("2\n");
        session.push_input_line();

        session.row = 0;
        session.move_end();
        session.backspace();
        session.insert_char('2');

        assert!(session.lines[0].edited);
        assert_eq!(session.lines[0].original, "      1+1");
        assert_eq!(session.lines[0].text, "      1+2");
    }

    #[test]
    fn executing_an_edited_history_line_restores_and_appends() {
        // Session: [      1+1, 2, <input>]
        let mut session = SessionBuffer::new();
        type_text(&mut session, "1+1");
        session.take_execute();
        session.append_output("2\n");
        session.push_input_line();

        session.row = 0;
        session.move_end();
        session.backspace();
        session.insert_char('2');

        assert_eq!(
            session.take_execute(),
            ExecuteOutcome::Run("      1+2".to_string())
        );
        assert_eq!(session.lines[0].text, "      1+1");
        assert!(!session.lines[0].edited);
        let last = session.lines.len() - 1;
        assert_eq!(session.lines[last].text, "      1+2");
        assert_eq!(session.row, last);
        assert_eq!(session.col, 9);
    }

    #[test]
    fn append_output_splits_lines_and_follows_with_the_caret() {
        let mut session = SessionBuffer::new();
        session.append_output("1 2 3\n4 5 6\n");
        assert_eq!(session.lines.len(), 3);
        assert_eq!(session.lines[1].text, "1 2 3");
        assert_eq!(session.lines[2].text, "4 5 6");
        assert_eq!(session.row, 2);
    }

    #[test]
    fn cursor_clamps_when_moving_between_lines_of_unequal_length() {
        let mut session = SessionBuffer::new();
        session.append_output("ab\n");
        session.push_input_line();
        session.move_end();
        session.move_up(1);
        assert_eq!(session.col, 2);
    }

    #[test]
    fn disconnect_marker_preserves_history() {
        let mut session = SessionBuffer::new();
        type_text(&mut session, "1+1");
        session.take_execute();
        session.push_disconnect_marker();
        assert_eq!(session.lines[1].text, "⍝ Disconnected");
        assert_eq!(session.lines[2].text, "");
        assert_eq!(session.contents(), "      1+1\n⍝ Disconnected\n\n");
    }
}
