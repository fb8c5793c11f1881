//! Parser-side adaptive prediction.
//!
//! ## Overview
//!
//! A generated parser calls [`ParserAtnSimulator::adaptive_predict`] at each
//! decision with the token stream positioned at the decision and the rule
//! invocation stack as a [`RuleContext`]. The simulator answers with an
//! alternative number and leaves the stream where it was.
//!
//! Diagnostics (full-context retries, context sensitivities, ambiguities)
//! go to a [`PredictionListener`]; [`PredictionStats`] counts how often the
//! cached DFA answered alone.

mod closure;
mod listener;
pub mod prediction_mode;
mod rule_context;
mod simulator;
mod stats;

pub use listener::{CollectingListener, NoopListener, PredictionEvent, PredictionListener};
pub use rule_context::RuleContext;
pub use simulator::ParserAtnSimulator;
pub use stats::PredictionStats;
