use compact_str::CompactString;

use super::{DEFAULT_MODE, DEFAULT_TOKEN_CHANNEL, MORE, SKIP};
use crate::atn::TOKEN_INVALID_TYPE;
use crate::error::StateError;

/// The token being built and the mode stack, as seen by lexer actions.
#[derive(Debug, Clone)]
pub struct LexerState {
    /// Type of the token being emitted; [`SKIP`] and [`MORE`] are commands.
    pub token_type: i32,
    pub channel: i32,
    /// Text replacing the matched input, set by custom actions.
    pub text: Option<CompactString>,
    /// Input index of the first character of the current token.
    pub token_start: usize,
    pub token_start_line: usize,
    pub token_start_column: usize,
    /// Input index at which the running action appeared in its rule.
    pub position: usize,
    mode: usize,
    mode_stack: Vec<usize>,
}

impl Default for LexerState {
    fn default() -> Self {
        Self {
            token_type: TOKEN_INVALID_TYPE,
            channel: DEFAULT_TOKEN_CHANNEL,
            text: None,
            token_start: 0,
            token_start_line: 1,
            token_start_column: 0,
            position: 0,
            mode: DEFAULT_MODE,
            mode_stack: Vec::new(),
        }
    }
}

impl LexerState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets per-token fields before matching a token at `start`.
    pub(crate) fn begin_token(&mut self, start: usize, line: usize, column: usize) {
        self.token_type = TOKEN_INVALID_TYPE;
        self.channel = DEFAULT_TOKEN_CHANNEL;
        self.text = None;
        self.token_start = start;
        self.token_start_line = line;
        self.token_start_column = column;
        self.position = start;
    }

    pub fn set_type(&mut self, token_type: i32) {
        self.token_type = token_type;
    }

    pub fn set_channel(&mut self, channel: i32) {
        self.channel = channel;
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = Some(CompactString::from(text));
    }

    pub fn skip(&mut self) {
        self.token_type = SKIP;
    }

    pub fn more(&mut self) {
        self.token_type = MORE;
    }

    #[must_use]
    pub const fn mode(&self) -> usize {
        self.mode
    }

    pub fn set_mode(&mut self, mode: usize) {
        self.mode = mode;
    }

    pub fn push_mode(&mut self, mode: usize) {
        tracing::trace!(from = self.mode, to = mode, "push mode");
        self.mode_stack.push(self.mode);
        self.mode = mode;
    }

    /// Returns to the mode saved by the matching [`push_mode`](Self::push_mode).
    pub fn pop_mode(&mut self) -> Result<usize, StateError> {
        let mode = self.mode_stack.pop().ok_or(StateError::EmptyModeStack)?;
        tracing::trace!(from = self.mode, to = mode, "pop mode");
        self.mode = mode;
        Ok(mode)
    }

    #[must_use]
    pub fn mode_stack(&self) -> &[usize] {
        &self.mode_stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_stack() {
        let mut state = LexerState::new();
        state.push_mode(2);
        state.push_mode(3);
        assert_eq!(state.mode_stack(), &[0, 2]);
        assert_eq!(state.pop_mode(), Ok(2));
        assert_eq!(state.pop_mode(), Ok(0));
        assert_eq!(state.pop_mode(), Err(StateError::EmptyModeStack));
        assert_eq!(state.mode(), 0);
    }

    #[test]
    fn test_begin_token_resets_commands() {
        let mut state = LexerState::new();
        state.skip();
        state.set_channel(1);
        state.set_text("x");
        state.begin_token(4, 2, 1);
        assert_eq!(state.token_type, TOKEN_INVALID_TYPE);
        assert_eq!(state.channel, DEFAULT_TOKEN_CHANNEL);
        assert!(state.text.is_none());
        assert_eq!((state.token_start, state.token_start_line), (4, 2));
    }
}
