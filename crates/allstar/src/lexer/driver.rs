use std::sync::Arc;

use compact_str::CompactString;

use super::{LexerAtnSimulator, LexerState, Token, MORE, SKIP};
use crate::atn::{TOKEN_EOF, TOKEN_INVALID_TYPE};
use crate::error::{AtnError, LexerError, LexerErrorKind, StateError, TextSpan};
use crate::options::LexerOptions;
use crate::recognizer::LexerRecognizer;
use crate::shared::SharedDfaCache;
use crate::stream::CharStream;

/// Turns a character stream into tokens.
///
/// Token types, channels and modes come from the lexer ATN and its
/// commands; embedded actions and predicates are delegated to the
/// recognizer. Input no rule can match is reported as a [`LexerError`] and
/// skipped one character at a time.
pub struct Lexer<I: CharStream, R: LexerRecognizer> {
    simulator: LexerAtnSimulator,
    input: I,
    recognizer: R,
    state: LexerState,
    hit_eof: bool,
    eof_emitted: bool,
    token_count: usize,
    errors: Vec<LexerError>,
}

impl<I: CharStream, R: LexerRecognizer> Lexer<I, R> {
    #[must_use]
    pub fn new(shared: Arc<SharedDfaCache>, input: I, recognizer: R) -> Self {
        Self::with_options(shared, input, recognizer, LexerOptions::default())
    }

    #[must_use]
    pub fn with_options(
        shared: Arc<SharedDfaCache>,
        input: I,
        recognizer: R,
        options: LexerOptions,
    ) -> Self {
        Self {
            simulator: LexerAtnSimulator::with_options(shared, options),
            input,
            recognizer,
            state: LexerState::new(),
            hit_eof: false,
            eof_emitted: false,
            token_count: 0,
            errors: Vec::new(),
        }
    }

    /// Returns the next token, skipping skipped tokens and recording
    /// recognition errors. After the input is exhausted every call returns
    /// an EOF token.
    pub fn next_token(&mut self) -> Result<Token, StateError> {
        'outer: loop {
            if self.hit_eof {
                return Ok(self.emit_eof());
            }
            self.state.begin_token(
                self.input.index(),
                self.simulator.line(),
                self.simulator.column(),
            );
            loop {
                self.state.token_type = TOKEN_INVALID_TYPE;
                let matched = match self.simulator.match_token(
                    &mut self.input,
                    self.state.mode(),
                    &mut self.recognizer,
                ) {
                    Ok(matched) => {
                        if let Some(executor) = &matched.executor {
                            let start = self.state.token_start;
                            executor.execute(
                                &mut self.state,
                                &mut self.recognizer,
                                &mut self.input,
                                start,
                            )?;
                        }
                        matched.token_type
                    }
                    Err(AtnError::State(err)) => return Err(err),
                    Err(_) => {
                        self.record_error();
                        self.recover()?;
                        SKIP
                    }
                };
                if self.input.la(1) == TOKEN_EOF {
                    self.hit_eof = true;
                }
                if self.state.token_type == TOKEN_INVALID_TYPE {
                    self.state.token_type = matched;
                }
                match self.state.token_type {
                    SKIP => continue 'outer,
                    MORE => {}
                    TOKEN_EOF => return Ok(self.emit_eof()),
                    _ => break,
                }
            }
            return Ok(self.emit());
        }
    }

    /// Lexes the remaining input. The token list ends with EOF and includes
    /// off-channel tokens.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, Vec<LexerError>> {
        let mut tokens = Vec::new();
        loop {
            match self.next_token() {
                Ok(token) => {
                    let eof = token.is_eof();
                    tokens.push(token);
                    if eof {
                        break;
                    }
                }
                Err(err) => {
                    let at = self.input.index();
                    self.errors.push(LexerError {
                        kind: LexerErrorKind::Aborted(err),
                        span: TextSpan::new(at, at),
                        line: self.simulator.line(),
                        column: self.simulator.column(),
                        text: String::new(),
                    });
                    break;
                }
            }
        }
        if self.errors.is_empty() {
            Ok(tokens)
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn emit(&mut self) -> Token {
        let end = self.input.index();
        let text = self.state.text.take().unwrap_or_else(|| {
            CompactString::from(self.input.text(self.state.token_start, end))
        });
        let token = Token {
            token_type: self.state.token_type,
            channel: self.state.channel,
            start: self.state.token_start,
            end,
            line: self.state.token_start_line,
            column: self.state.token_start_column,
            text,
            token_index: self.token_count,
        };
        self.token_count += 1;
        tracing::trace!(token = %token, "emit");
        token
    }

    fn emit_eof(&mut self) -> Token {
        let mut token = Token::eof(
            self.input.index(),
            self.simulator.line(),
            self.simulator.column(),
        );
        token.token_index = self.token_count;
        self.token_count += 1;
        self.eof_emitted = true;
        token
    }

    fn record_error(&mut self) {
        let start = self.state.token_start;
        let end = (self.input.index() + 1).min(self.input.size());
        let error = LexerError {
            kind: LexerErrorKind::TokenRecognition,
            span: TextSpan::new(start, end),
            line: self.state.token_start_line,
            column: self.state.token_start_column,
            text: self.input.text(start, end),
        };
        tracing::debug!(error = %error, "lexer recovery");
        self.errors.push(error);
    }

    fn recover(&mut self) -> Result<(), StateError> {
        if self.input.la(1) != TOKEN_EOF {
            self.simulator.consume(&mut self.input)?;
        }
        Ok(())
    }

    /// Errors recorded since the last call to [`take_errors`](Self::take_errors).
    #[must_use]
    pub fn errors(&self) -> &[LexerError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<LexerError> {
        std::mem::take(&mut self.errors)
    }

    #[must_use]
    pub const fn state(&self) -> &LexerState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut LexerState {
        &mut self.state
    }

    #[must_use]
    pub const fn input(&self) -> &I {
        &self.input
    }

    #[must_use]
    pub const fn recognizer(&self) -> &R {
        &self.recognizer
    }

    #[must_use]
    pub const fn simulator(&self) -> &LexerAtnSimulator {
        &self.simulator
    }

    /// Rewinds to the start of the input. Cached DFA states are kept.
    pub fn reset(&mut self) {
        self.input.seek(0);
        self.simulator.reset();
        self.state = LexerState::new();
        self.hit_eof = false;
        self.eof_emitted = false;
        self.token_count = 0;
        self.errors.clear();
    }
}

impl<I: CharStream, R: LexerRecognizer> Iterator for Lexer<I, R> {
    type Item = Result<Token, StateError>;

    /// Yields tokens up to and including the first EOF.
    fn next(&mut self) -> Option<Self::Item> {
        if self.eof_emitted {
            return None;
        }
        Some(self.next_token())
    }
}
