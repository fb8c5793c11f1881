use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::{SemanticContext, SemanticRef};
use crate::atn::StateId;
use crate::context::ContextRef;
use crate::lexer::LexerActionExecutor;

/// One point of ATN exploration: a state reached while predicting `alt`
/// under call stack `context`, guarded by `semantic_context`.
#[derive(Debug, Clone)]
pub struct AtnConfig {
    pub state: StateId,
    /// Alternative being predicted, numbered from 1.
    pub alt: usize,
    pub context: ContextRef,
    pub semantic_context: SemanticRef,
    /// How many rule-stop states were passed with the wildcard stack, i.e.
    /// how far this configuration wandered into the caller's rules.
    pub reaches_into_outer_context: u32,
    /// Set on configurations that must survive precedence filtering.
    pub precedence_filter_suppressed: bool,
    /// Deferred lexer actions collected on the way here.
    pub lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    /// Whether a lexer configuration crossed a non-greedy decision.
    pub passed_through_non_greedy_decision: bool,
}

impl AtnConfig {
    #[must_use]
    pub fn new(state: StateId, alt: usize, context: ContextRef) -> Self {
        Self {
            state,
            alt,
            context,
            semantic_context: SemanticContext::none(),
            reaches_into_outer_context: 0,
            precedence_filter_suppressed: false,
            lexer_action_executor: None,
            passed_through_non_greedy_decision: false,
        }
    }

    /// Same configuration moved to `state`.
    #[must_use]
    pub fn with_state(&self, state: StateId) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_state_and_context(&self, state: StateId, context: ContextRef) -> Self {
        Self {
            state,
            context,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_semantic_context(&self, state: StateId, semantic_context: SemanticRef) -> Self {
        Self {
            state,
            semantic_context,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_executor(&self, state: StateId, executor: Option<Arc<LexerActionExecutor>>) -> Self {
        Self {
            state,
            lexer_action_executor: executor,
            ..self.clone()
        }
    }
}

impl PartialEq for AtnConfig {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.alt == other.alt
            && (Arc::ptr_eq(&self.context, &other.context) || self.context == other.context)
            && self.semantic_context == other.semantic_context
            && self.precedence_filter_suppressed == other.precedence_filter_suppressed
            && self.passed_through_non_greedy_decision == other.passed_through_non_greedy_decision
            && self.lexer_action_executor == other.lexer_action_executor
    }
}

impl Eq for AtnConfig {}

impl Hash for AtnConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state.hash(state);
        self.alt.hash(state);
        self.context.hash(state);
        self.semantic_context.hash(state);
        self.passed_through_non_greedy_decision.hash(state);
        self.lexer_action_executor.hash(state);
    }
}

impl fmt::Display for AtnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},[{}]", self.state, self.alt, self.context)?;
        if !self.semantic_context.is_empty() {
            write!(f, ",{}", self.semantic_context)?;
        }
        if self.reaches_into_outer_context > 0 {
            write!(f, ",up={}", self.reaches_into_outer_context)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PredictionContext;

    #[test]
    fn test_equality_ignores_outer_depth() {
        let ctx = PredictionContext::singleton(Some(PredictionContext::empty()), 7);
        let a = AtnConfig::new(3, 1, ctx.clone());
        let mut b = AtnConfig::new(3, 1, PredictionContext::singleton(Some(PredictionContext::empty()), 7));
        b.reaches_into_outer_context = 2;
        assert_eq!(a, b);
        b.precedence_filter_suppressed = true;
        assert_ne!(a, b);
        assert_ne!(a, a.with_state(4));
    }

    #[test]
    fn test_display() {
        let ctx = PredictionContext::singleton(Some(PredictionContext::empty()), 7);
        let mut config = AtnConfig::new(3, 2, ctx);
        assert_eq!(config.to_string(), "(3,2,[7])");
        config.semantic_context = SemanticContext::predicate(0, 1, false);
        config.reaches_into_outer_context = 1;
        assert_eq!(config.to_string(), "(3,2,[7],{0:1}?,up=1)");
    }
}
