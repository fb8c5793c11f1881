//! # Lexer
//!
//! Character-level simulation of a lexer ATN.
//!
//! ## Overview
//!
//! - [`LexerAtnSimulator`] matches a single token: the longest input any rule
//!   accepts, ties going to the rule declared first.
//! - [`LexerActionExecutor`] holds the lexer commands and embedded actions
//!   of the winning rule; they run only once the match is final.
//! - [`Lexer`] is the token loop: modes, `skip`, `more`, channels, the EOF
//!   token and recovery from unmatchable input.
//! - With the `parallel` feature, [`parallel::tokenize_all`] lexes many
//!   inputs concurrently against one [`SharedDfaCache`](crate::shared::SharedDfaCache).

mod action_executor;
mod driver;
#[cfg(feature = "parallel")]
pub mod parallel;
mod simulator;
mod state;
mod token;

pub use action_executor::LexerActionExecutor;
pub use driver::Lexer;
pub use simulator::{LexerAtnSimulator, LexerMatch};
pub use state::LexerState;
pub use token::Token;

/// Token type that drops the matched text.
pub const SKIP: i32 = -3;
/// Token type that keeps the matched text for the next token.
pub const MORE: i32 = -2;
pub const DEFAULT_MODE: usize = 0;
pub const DEFAULT_TOKEN_CHANNEL: i32 = 0;
pub const HIDDEN: i32 = 1;
