use std::collections::HashMap;

use crate::editor::EditorWindow;

/// What the UI must do after a stack mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracerSurface {
    /// Show this token in the tracer pane.
    Surface(i64),
    /// The stack emptied; remove the tracer pane.
    Dismiss,
    /// The surfaced frame did not change.
    Unchanged,
}

/// Frame summary for the stack pane, derived on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub token: i64,
    pub name: String,
    pub line: i64,
    pub code: String,
    pub current: bool,
}

/// Maps the interpreter's stack of tracer window tokens to the single
/// surfaced tracer pane. This is the only place that decides which tracer
/// is on screen.
#[derive(Debug, Default)]
pub struct TracerStack {
    stack: Vec<i64>,
    current: i64,
}

impl TracerStack {
    /// Append a token and surface it.
    pub fn push(&mut self, token: i64) -> TracerSurface {
        self.stack.push(token);
        self.current = token;
        TracerSurface::Surface(token)
    }

    /// Remove a token. If it was surfaced, the new top takes over; an
    /// empty stack dismisses the pane.
    pub fn close(&mut self, token: i64) -> TracerSurface {
        if let Some(idx) = self.stack.iter().position(|&t| t == token) {
            self.stack.remove(idx);
        }
        if self.current != token {
            return TracerSurface::Unchanged;
        }
        match self.stack.last() {
            Some(&top) => {
                self.current = top;
                TracerSurface::Surface(top)
            }
            None => {
                self.current = 0;
                TracerSurface::Dismiss
            }
        }
    }

    /// Surface an already-stacked token (stack-pane navigation).
    pub fn switch(&mut self, token: i64) -> TracerSurface {
        if !self.contains(token) || self.current == token {
            return TracerSurface::Unchanged;
        }
        self.current = token;
        TracerSurface::Surface(token)
    }

    pub fn contains(&self, token: i64) -> bool {
        self.stack.contains(&token)
    }

    /// The surfaced token, 0 when none.
    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Frames bottom to top; the stack pane displays them reversed.
    pub fn frames(&self, editors: &HashMap<i64, EditorWindow>) -> Vec<StackFrame> {
        self.stack
            .iter()
            .filter_map(|&token| {
                let w = editors.get(&token)?;
                let code = if w.current_row >= 0 {
                    w.line(w.current_row as usize).trim().to_string()
                } else {
                    String::new()
                };
                Some(StackFrame {
                    token,
                    name: w.name.to_string(),
                    line: w.current_row,
                    code,
                    current: token == self.current,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_surfaces_each_new_frame() {
        let mut stack = TracerStack::default();
        assert_eq!(stack.push(10), TracerSurface::Surface(10));
        assert_eq!(stack.push(11), TracerSurface::Surface(11));
        assert_eq!(stack.push(12), TracerSurface::Surface(12));
        assert_eq!(stack.current(), 12);
        assert_eq!(stack.depth(), 3);
    }

    #[test]
    fn closing_a_middle_frame_keeps_the_surfaced_one() {
        let mut stack = TracerStack::default();
        stack.push(10);
        stack.push(11);
        stack.push(12);
        assert_eq!(stack.close(11), TracerSurface::Unchanged);
        assert_eq!(stack.current(), 12);
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn closing_the_surfaced_frame_surfaces_the_new_top() {
        // Stack [10, 11, 12]; the user switched down to 11, then closed it.
        let mut stack = TracerStack::default();
        stack.push(10);
        stack.push(11);
        stack.push(12);
        assert_eq!(stack.switch(11), TracerSurface::Surface(11));
        assert_eq!(stack.close(11), TracerSurface::Surface(12));
        assert_eq!(stack.current(), 12);
    }

    #[test]
    fn emptying_the_stack_dismisses_the_pane() {
        let mut stack = TracerStack::default();
        stack.push(10);
        assert_eq!(stack.close(10), TracerSurface::Dismiss);
        assert!(stack.is_empty());
        assert_eq!(stack.current(), 0);
    }

    #[test]
    fn switch_to_an_unknown_token_changes_nothing() {
        let mut stack = TracerStack::default();
        stack.push(10);
        assert_eq!(stack.switch(99), TracerSurface::Unchanged);
        assert_eq!(stack.current(), 10);
    }
}
