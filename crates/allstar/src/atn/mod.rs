//! # ATN Graph Model
//!
//! The augmented transition network: one sub-graph per grammar rule, built
//! once by the codec (or [`builder::AtnBuilder`]) and immutable afterwards.
//!
//! ## Overview
//!
//! - [`AtnState`] / [`AtnStateKind`]: the closed set of state shapes.
//! - [`Transition`] / [`TransitionKind`]: labelled and epsilon edges.
//! - [`Atn`]: the state table plus rule, mode and decision indexes, and
//!   LL(1) lookahead queries backed by [`ll1::Ll1Analyzer`].

pub mod builder;
pub mod lexer_action;
pub mod ll1;
pub(crate) mod state;
pub(crate) mod transition;

pub use lexer_action::LexerAction;
pub use state::{AtnState, AtnStateKind};
pub use transition::{Transition, TransitionKind};

use crate::error::StateError;
use crate::misc::IntervalSet;
use crate::parser::RuleContext;
use ll1::Ll1Analyzer;

/// Index of a state in [`Atn::states`].
pub type StateId = usize;

pub const TOKEN_EOF: i32 = -1;
/// Marker added to lookahead sets when the end of a rule is reachable.
pub const TOKEN_EPSILON: i32 = -2;
pub const TOKEN_INVALID_TYPE: i32 = 0;
pub const MIN_USER_TOKEN_TYPE: i32 = 1;
pub const INVALID_ALT: usize = 0;
pub const MIN_CHAR_VALUE: i32 = 0;
pub const MAX_CHAR_VALUE: i32 = 0x10FFFF;
/// Rule index of states that belong to no rule, such as lexer mode starts.
pub const NO_RULE: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum GrammarType {
    Lexer,
    Parser,
}

impl GrammarType {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Lexer => 0,
            Self::Parser => 1,
        }
    }

    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Lexer),
            1 => Some(Self::Parser),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Atn {
    pub grammar_type: GrammarType,
    pub max_token_type: i32,
    pub states: Vec<AtnState>,
    /// Decision number to decision state.
    pub decision_to_state: Vec<StateId>,
    pub rule_to_start_state: Vec<StateId>,
    pub rule_to_stop_state: Vec<StateId>,
    /// Token type per lexer rule; for parsers, the bypass token per rule when
    /// bypass transitions were generated.
    pub rule_to_token_type: Vec<i32>,
    pub mode_to_start_state: Vec<StateId>,
    pub lexer_actions: Vec<LexerAction>,
}

impl Atn {
    #[must_use]
    pub const fn new(grammar_type: GrammarType, max_token_type: i32) -> Self {
        Self {
            grammar_type,
            max_token_type,
            states: Vec::new(),
            decision_to_state: Vec::new(),
            rule_to_start_state: Vec::new(),
            rule_to_stop_state: Vec::new(),
            rule_to_token_type: Vec::new(),
            mode_to_start_state: Vec::new(),
            lexer_actions: Vec::new(),
        }
    }

    /// Appends a state and returns its number.
    pub fn add_state(&mut self, rule_index: usize, kind: AtnStateKind) -> StateId {
        let id = self.states.len();
        self.states.push(AtnState::new(id, rule_index, kind));
        id
    }

    /// Assigns the next decision number to `state`.
    pub fn define_decision_state(&mut self, state: StateId) -> usize {
        let decision = self.decision_to_state.len();
        self.decision_to_state.push(state);
        self.states[state].decision = Some(decision);
        decision
    }

    /// # Panics
    ///
    /// Panics if `id` is not a state of this ATN. Ids stored in a loaded ATN
    /// are verified to be in range.
    #[must_use]
    pub fn state(&self, id: StateId) -> &AtnState {
        &self.states[id]
    }

    #[must_use]
    pub fn decision_state(&self, decision: usize) -> Option<&AtnState> {
        self.decision_to_state
            .get(decision)
            .map(|&id| &self.states[id])
    }

    #[must_use]
    pub fn num_decisions(&self) -> usize {
        self.decision_to_state.len()
    }

    #[must_use]
    pub fn num_rules(&self) -> usize {
        self.rule_to_start_state.len()
    }

    /// Whether the rule was rewritten from left recursion.
    #[must_use]
    pub fn is_left_recursive(&self, rule: usize) -> bool {
        self.rule_to_start_state.get(rule).is_some_and(|&start| {
            matches!(
                self.states[start].kind,
                AtnStateKind::RuleStart {
                    is_left_recursive: true,
                    ..
                }
            )
        })
    }

    /// Follow state of the rule invocation at `state`, or `None` if the
    /// state does not invoke a rule.
    #[must_use]
    pub fn follow_state_of_invocation(&self, state: StateId) -> Option<StateId> {
        match self.states.get(state)?.transition(0)?.kind {
            TransitionKind::Rule { follow_state, .. } => Some(follow_state),
            _ => None,
        }
    }

    /// Tokens that can follow `state` within its rule. Contains
    /// [`TOKEN_EPSILON`] if the end of the rule is reachable. Computed once
    /// per state.
    pub fn next_tokens(&self, state: StateId) -> &IntervalSet {
        self.states[state]
            .cached_next_tokens()
            .get_or_init(|| Ll1Analyzer::new(self).look(state, None, None))
    }

    /// Tokens that can follow `state` given the invocation stack `ctx`.
    /// Contains [`TOKEN_EOF`] when the outermost rule can end.
    pub fn next_tokens_in_context(
        &self,
        state: StateId,
        ctx: &RuleContext,
    ) -> Result<IntervalSet, StateError> {
        Ll1Analyzer::new(self).look_in_context(state, None, ctx)
    }

    /// The set of tokens that would be accepted at `state`, walking out
    /// through the invoking rules while the end of the current rule is
    /// reachable.
    pub fn expected_tokens(
        &self,
        state: StateId,
        ctx: &RuleContext,
    ) -> Result<IntervalSet, StateError> {
        let mut following = self.next_tokens(state).clone();
        if !following.contains(TOKEN_EPSILON) {
            return Ok(following);
        }
        let mut expected = following.clone();
        expected.remove_one(TOKEN_EPSILON);
        for &invoking in ctx.invoking_states() {
            if !following.contains(TOKEN_EPSILON) {
                break;
            }
            let follow = self
                .follow_state_of_invocation(invoking)
                .ok_or(StateError::InvalidInvokingState { state: invoking })?;
            following = self.next_tokens(follow).clone();
            expected.add_set(&following);
            expected.remove_one(TOKEN_EPSILON);
        }
        if following.contains(TOKEN_EPSILON) {
            expected.add_one(TOKEN_EOF);
        }
        Ok(expected)
    }

    /// Number of transitions over all states, derived rule-stop edges included.
    #[must_use]
    pub fn num_transitions(&self) -> usize {
        self.states.iter().map(AtnState::num_transitions).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::builder::AtnBuilder;
    use super::*;

    const A: i32 = 1;
    const B: i32 = 2;
    const C: i32 = 3;

    /// `s : a C ; a : A | B? ;`
    fn grammar() -> (Atn, StateId) {
        let mut b = AtnBuilder::parser(3);
        let s = b.rule();
        let a = b.rule();
        let call = b.rule_ref(s, a, 0);
        let c = b.atom(s, C);
        let body = b.sequence(s, vec![call, c]);
        b.set_rule_body(s, body);
        let alt1 = b.atom(a, A);
        let opt = b.atom(a, B);
        let alt2 = b.optional(a, vec![opt], true);
        let body = b.block(a, vec![alt1, alt2]);
        b.set_rule_body(a, body);
        let atn = b.finish().unwrap();
        let start = atn.rule_to_start_state[a];
        (atn, start)
    }

    #[test]
    fn test_next_tokens_within_rule() {
        let (atn, a_start) = grammar();
        let set = atn.next_tokens(a_start);
        assert!(set.contains(A));
        assert!(set.contains(B));
        assert!(set.contains(TOKEN_EPSILON));
        assert!(!set.contains(C));
    }

    #[test]
    fn test_expected_tokens_walk_out_of_rule() {
        let (atn, a_start) = grammar();
        let s_start = atn.rule_to_start_state[0];
        // the invoking state is the source of the rule transition in `s`
        let invoking = atn
            .states
            .iter()
            .find(|st| {
                st.rule_index == 0
                    && matches!(
                        st.transition(0).map(|t| &t.kind),
                        Some(TransitionKind::Rule { .. })
                    )
            })
            .map(|st| st.state_number)
            .unwrap();
        let ctx = RuleContext::new(vec![invoking]);
        let expected = atn.expected_tokens(a_start, &ctx).unwrap();
        assert_eq!(expected, [A, B, C].into_iter().collect());
        assert!(atn.next_tokens(s_start).contains(A));
    }
}
