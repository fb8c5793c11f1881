//! # Error Types
//!
//! Errors raised while loading an ATN and while simulating it.
//!
//! ## Overview
//!
//! - [`DeserializeError`]: the serialized ATN is malformed or fails
//!   verification. Fatal, an ATN is never partially loaded.
//! - [`StateError`]: API misuse such as consuming past end of input, mutating
//!   a frozen configuration set or releasing stream marks out of order.
//! - [`RecognitionError`]: no viable alternative or a failed predicate. The
//!   caller decides how to recover.
//! - [`AtnError`]: umbrella over the three with `From` conversions.
//! - [`LexerError`]: a recovered lexer failure recorded by the lexer driver.
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, errors integrate with [`miette`]
//! for rich error reporting.

use std::sync::Arc;

use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

use crate::configs::{AltSet, AtnConfigSet};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum DeserializeError {
    #[error("could not deserialize ATN with version {found} (expected {expected})")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codec::version)))]
    UnsupportedVersion { found: i32, expected: i32 },

    #[error("serialized ATN ended unexpectedly at offset {offset}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codec::truncated)))]
    UnexpectedEnd { offset: usize },

    #[error("invalid 16-bit word encoding at offset {offset}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codec::words)))]
    InvalidWordEncoding { offset: usize },

    #[error("value {value} cannot be encoded in the serialized ATN")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codec::value_range)))]
    ValueOutOfRange { value: i64 },

    #[error("invalid grammar type {value}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codec::grammar_type)))]
    InvalidGrammarType { value: i32 },

    #[error("invalid state type {value} for state {state}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codec::state_type)))]
    InvalidStateType { state: usize, value: i32 },

    #[error("invalid transition type {value}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codec::transition_type)))]
    InvalidTransitionType { value: i32 },

    #[error("invalid lexer action type {value}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codec::lexer_action_type)))]
    InvalidLexerActionType { value: i32 },

    #[error("{what} index {index} is out of range")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codec::index)))]
    IndexOutOfRange { what: &'static str, index: i64 },

    #[error("state {state} is not a {expected} state")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codec::state_kind)))]
    UnexpectedStateKind { state: usize, expected: &'static str },

    #[error("ATN verification failed at state {state}: {reason}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(code(codec::verify), help("the serialized ATN is corrupt or was produced by an incompatible tool"))
    )]
    Verification { state: usize, reason: &'static str },

    #[error("could not identify the final state of the precedence rule prefix in rule {rule}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(codec::bypass)))]
    BypassUnsupported { rule: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum StateError {
    #[error("cannot consume past end of input")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(state::consume_eof)))]
    ConsumeAtEof,

    #[error("mark {found} released out of order (innermost open mark is {expected:?})")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(state::mark_order)))]
    MarkReleaseOrder { expected: Option<usize>, found: usize },

    #[error("configuration set is read-only")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(state::readonly)))]
    ReadonlyConfigSet,

    #[error("mode stack is empty")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(state::mode_stack)))]
    EmptyModeStack,

    #[error("precedence predicates are not supported in lexers")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(state::lexer_precedence)))]
    PrecedencePredicateInLexer,

    #[error("state {state} does not invoke a rule")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(state::invoking_state)))]
    InvalidInvokingState { state: usize },

    #[error("no decision {decision} in this ATN")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(state::decision)))]
    UnknownDecision { decision: usize },

    #[error("no lexer mode {mode} in this ATN")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(state::mode)))]
    UnknownMode { mode: usize },

    #[error("expected a {expected} ATN")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(state::grammar_type)))]
    GrammarTypeMismatch { expected: &'static str },
}

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum RecognitionError {
    #[error("no viable alternative for decision {decision} at input {start_index}..={offending_index}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(recognition::no_viable_alt)))]
    NoViableAlt {
        decision: usize,
        start_index: usize,
        offending_index: usize,
        configs: Arc<AtnConfigSet>,
    },

    #[error("no viable token at input index {start_index}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(recognition::lexer_no_viable_alt)))]
    LexerNoViableAlt {
        start_index: usize,
        configs: Arc<AtnConfigSet>,
    },

    #[error("every predicate guarding decision {decision} failed (alternatives {alts:?})")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(recognition::predicate_failed)))]
    PredicateFailed {
        decision: usize,
        start_index: usize,
        alts: AltSet,
    },
}

impl RecognitionError {
    /// Input index where the failed match started.
    #[must_use]
    pub const fn start_index(&self) -> usize {
        match self {
            Self::NoViableAlt { start_index, .. }
            | Self::LexerNoViableAlt { start_index, .. }
            | Self::PredicateFailed { start_index, .. } => *start_index,
        }
    }

    /// The dead-end configuration set, for no-viable-alternative failures.
    #[must_use]
    pub fn dead_end_configs(&self) -> Option<&AtnConfigSet> {
        match self {
            Self::NoViableAlt { configs, .. } | Self::LexerNoViableAlt { configs, .. } => {
                Some(configs)
            }
            Self::PredicateFailed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum AtnError {
    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Deserialize(#[from] DeserializeError),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    State(#[from] StateError),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Recognition(#[from] RecognitionError),
}

/// Byte-free character span, `start..end` in code points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

#[cfg(feature = "diagnostics")]
impl From<TextSpan> for miette::SourceSpan {
    fn from(span: TextSpan) -> Self {
        (span.start, span.len()).into()
    }
}

/// Why the lexer driver recorded a [`LexerError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexerErrorKind {
    /// No rule matched; the text was skipped and lexing continued.
    TokenRecognition,
    /// Lexing stopped on an unrecoverable error.
    Aborted(StateError),
}

impl std::fmt::Display for LexerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenRecognition => f.write_str("token recognition error"),
            Self::Aborted(err) => write!(f, "lexing aborted ({err})"),
        }
    }
}

/// Lexer error with location information
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[cfg_attr(feature = "diagnostics", diagnostic(code(lexer::token_recognition)))]
#[error("{kind} at {line}:{column}: '{text}'")]
pub struct LexerError {
    pub kind: LexerErrorKind,
    #[cfg_attr(feature = "diagnostics", label("no token matches here"))]
    pub span: TextSpan,
    pub line: usize,
    pub column: usize,
    pub text: String,
}

pub type Result<T, E = AtnError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_umbrella_conversion() {
        let err: AtnError = StateError::ConsumeAtEof.into();
        assert!(matches!(err, AtnError::State(StateError::ConsumeAtEof)));
        assert_eq!(err.to_string(), "cannot consume past end of input");
    }

    #[test]
    fn test_lexer_error_message() {
        let err = LexerError {
            kind: LexerErrorKind::TokenRecognition,
            span: TextSpan::new(3, 4),
            line: 1,
            column: 3,
            text: "#".to_string(),
        };
        assert_eq!(err.to_string(), "token recognition error at 1:3: '#'");
        assert_eq!(err.span.len(), 1);

        let aborted = LexerError {
            kind: LexerErrorKind::Aborted(StateError::EmptyModeStack),
            ..err
        };
        assert_eq!(
            aborted.to_string(),
            "lexing aborted (mode stack is empty) at 1:3: '#'"
        );
    }
}
