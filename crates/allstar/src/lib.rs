//! # Allstar
//!
//! Runtime prediction engine for ATN-based generated recognizers.
//!
//! ## Overview
//!
//! A grammar is compiled into an augmented transition network (ATN), one
//! sub-graph per rule. This crate loads such a network from its binary form
//! and drives it:
//!
//! - **Lexing**: the [`lexer`] simulator matches characters against the ATN
//!   with maximal munch and rule priority, caching its work in a DFA per mode.
//! - **Adaptive prediction**: the [`parser`] simulator chooses among the
//!   alternatives of a decision with ALL(*) lookahead, trying cheap SLL
//!   prediction first and falling back to full-context LL on conflicts.
//! - **Caching**: prediction contexts are merged into a shared DAG and
//!   interned, and every decision keeps a lazily grown [`dfa::Dfa`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use allstar::codec::deserialize;
//! use allstar::lexer::Lexer;
//! use allstar::options::DeserializationOptions;
//! use allstar::recognizer::DefaultRecognizer;
//! use allstar::shared::SharedDfaCache;
//! use allstar::stream::CodePointCharStream;
//!
//! # fn run(serialized: &[i32]) -> Result<(), Box<dyn std::error::Error>> {
//! let atn = deserialize(serialized, &DeserializationOptions::default())?;
//! let cache = SharedDfaCache::for_lexer(Arc::new(atn));
//! let input = CodePointCharStream::new("x1 42");
//! let mut lexer = Lexer::new(cache, input, DefaultRecognizer);
//! for token in lexer.tokenize().map_err(|errors| errors[0].clone())? {
//!     println!("{token}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod atn;
pub mod codec;
pub mod configs;
pub mod context;
pub mod dfa;
pub mod error;
pub mod lexer;
pub mod misc;
pub mod options;
pub mod parser;
pub mod recognizer;
pub mod shared;
pub mod stream;

pub use atn::{Atn, AtnState, AtnStateKind, GrammarType, StateId, Transition, TransitionKind};
pub use error::{
    AtnError, DeserializeError, LexerError, LexerErrorKind, RecognitionError, StateError,
};
pub use misc::{Interval, IntervalSet};
