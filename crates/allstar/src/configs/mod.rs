//! # Configurations
//!
//! The units of ATN exploration.
//!
//! ## Overview
//!
//! An [`AtnConfig`] pairs an ATN state and a predicted alternative with the
//! call stack ([`crate::context::PredictionContext`]) and predicate guard
//! ([`SemanticContext`]) under which that state was reached. An
//! [`AtnConfigSet`] collects the configurations reachable at one step of
//! prediction; configurations agreeing on state, alternative and predicate
//! share one entry whose stack is the merge of theirs.

mod config;
mod semantic;
mod set;

pub use config::AtnConfig;
pub use semantic::{SemanticContext, SemanticRef};
pub use set::AtnConfigSet;

use std::collections::BTreeSet;

/// A set of alternative numbers, iterated in ascending order.
pub type AltSet = BTreeSet<usize>;
