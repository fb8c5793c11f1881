//! ATN states.

use std::sync::OnceLock;

use super::{StateId, Transition};
use crate::misc::IntervalSet;

/// The closed set of state shapes. Link fields point at partner states and
/// are filled in while the ATN is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtnStateKind {
    /// Placeholder for a state removed before serialization.
    Invalid,
    Basic,
    RuleStart {
        stop_state: Option<StateId>,
        is_left_recursive: bool,
    },
    RuleStop,
    BlockStart {
        end_state: Option<StateId>,
    },
    PlusBlockStart {
        end_state: Option<StateId>,
        loop_back: Option<StateId>,
    },
    StarBlockStart {
        end_state: Option<StateId>,
    },
    TokensStart,
    BlockEnd {
        start_state: Option<StateId>,
    },
    StarLoopBack,
    StarLoopEntry {
        loop_back: Option<StateId>,
        is_precedence_decision: bool,
    },
    PlusLoopBack,
    LoopEnd {
        loop_back: Option<StateId>,
    },
}

pub(crate) const INVALID: i32 = 0;
pub(crate) const BASIC: i32 = 1;
pub(crate) const RULE_START: i32 = 2;
pub(crate) const BLOCK_START: i32 = 3;
pub(crate) const PLUS_BLOCK_START: i32 = 4;
pub(crate) const STAR_BLOCK_START: i32 = 5;
pub(crate) const TOKEN_START: i32 = 6;
pub(crate) const RULE_STOP: i32 = 7;
pub(crate) const BLOCK_END: i32 = 8;
pub(crate) const STAR_LOOP_BACK: i32 = 9;
pub(crate) const STAR_LOOP_ENTRY: i32 = 10;
pub(crate) const PLUS_LOOP_BACK: i32 = 11;
pub(crate) const LOOP_END: i32 = 12;

impl AtnStateKind {
    /// Serialized state-type code.
    #[must_use]
    pub const fn type_code(&self) -> i32 {
        match self {
            Self::Invalid => INVALID,
            Self::Basic => BASIC,
            Self::RuleStart { .. } => RULE_START,
            Self::BlockStart { .. } => BLOCK_START,
            Self::PlusBlockStart { .. } => PLUS_BLOCK_START,
            Self::StarBlockStart { .. } => STAR_BLOCK_START,
            Self::TokensStart => TOKEN_START,
            Self::RuleStop => RULE_STOP,
            Self::BlockEnd { .. } => BLOCK_END,
            Self::StarLoopBack => STAR_LOOP_BACK,
            Self::StarLoopEntry { .. } => STAR_LOOP_ENTRY,
            Self::PlusLoopBack => PLUS_LOOP_BACK,
            Self::LoopEnd { .. } => LOOP_END,
        }
    }

    /// Fresh, unlinked state kind for a serialized type code.
    #[must_use]
    pub const fn from_type_code(code: i32) -> Option<Self> {
        Some(match code {
            INVALID => Self::Invalid,
            BASIC => Self::Basic,
            RULE_START => Self::RuleStart {
                stop_state: None,
                is_left_recursive: false,
            },
            BLOCK_START => Self::BlockStart { end_state: None },
            PLUS_BLOCK_START => Self::PlusBlockStart {
                end_state: None,
                loop_back: None,
            },
            STAR_BLOCK_START => Self::StarBlockStart { end_state: None },
            TOKEN_START => Self::TokensStart,
            RULE_STOP => Self::RuleStop,
            BLOCK_END => Self::BlockEnd { start_state: None },
            STAR_LOOP_BACK => Self::StarLoopBack,
            STAR_LOOP_ENTRY => Self::StarLoopEntry {
                loop_back: None,
                is_precedence_decision: false,
            },
            PLUS_LOOP_BACK => Self::PlusLoopBack,
            LOOP_END => Self::LoopEnd { loop_back: None },
            _ => return None,
        })
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Basic => "BASIC",
            Self::RuleStart { .. } => "RULE_START",
            Self::BlockStart { .. } => "BLOCK_START",
            Self::PlusBlockStart { .. } => "PLUS_BLOCK_START",
            Self::StarBlockStart { .. } => "STAR_BLOCK_START",
            Self::TokensStart => "TOKEN_START",
            Self::RuleStop => "RULE_STOP",
            Self::BlockEnd { .. } => "BLOCK_END",
            Self::StarLoopBack => "STAR_LOOP_BACK",
            Self::StarLoopEntry { .. } => "STAR_LOOP_ENTRY",
            Self::PlusLoopBack => "PLUS_LOOP_BACK",
            Self::LoopEnd { .. } => "LOOP_END",
        }
    }

    /// States that may own a decision number.
    #[must_use]
    pub const fn is_decision(&self) -> bool {
        matches!(
            self,
            Self::BlockStart { .. }
                | Self::PlusBlockStart { .. }
                | Self::StarBlockStart { .. }
                | Self::TokensStart
                | Self::StarLoopEntry { .. }
                | Self::PlusLoopBack
        )
    }

    #[must_use]
    pub const fn is_block_start(&self) -> bool {
        matches!(
            self,
            Self::BlockStart { .. } | Self::PlusBlockStart { .. } | Self::StarBlockStart { .. }
        )
    }

    /// End state of a block start.
    #[must_use]
    pub const fn end_state(&self) -> Option<StateId> {
        match self {
            Self::BlockStart { end_state }
            | Self::PlusBlockStart { end_state, .. }
            | Self::StarBlockStart { end_state } => *end_state,
            _ => None,
        }
    }

    pub(crate) fn set_end_state(&mut self, end: StateId) {
        if let Self::BlockStart { end_state }
        | Self::PlusBlockStart { end_state, .. }
        | Self::StarBlockStart { end_state } = self
        {
            *end_state = Some(end);
        }
    }

    /// Loop-back partner of loop ends, star loop entries and plus block starts.
    #[must_use]
    pub const fn loop_back(&self) -> Option<StateId> {
        match self {
            Self::LoopEnd { loop_back }
            | Self::StarLoopEntry { loop_back, .. }
            | Self::PlusBlockStart { loop_back, .. } => *loop_back,
            _ => None,
        }
    }

    pub(crate) fn set_loop_back(&mut self, state: StateId) {
        if let Self::LoopEnd { loop_back }
        | Self::StarLoopEntry { loop_back, .. }
        | Self::PlusBlockStart { loop_back, .. } = self
        {
            *loop_back = Some(state);
        }
    }
}

/// A node of the ATN.
///
/// Besides the shape-specific links in [`AtnStateKind`], decision states carry
/// a dense decision number and a non-greedy flag.
#[derive(Debug)]
pub struct AtnState {
    pub state_number: StateId,
    pub rule_index: usize,
    pub kind: AtnStateKind,
    pub decision: Option<usize>,
    pub non_greedy: bool,
    transitions: Vec<Transition>,
    epsilon_only: bool,
    next_tokens: OnceLock<IntervalSet>,
}

impl AtnState {
    #[must_use]
    pub fn new(state_number: StateId, rule_index: usize, kind: AtnStateKind) -> Self {
        Self {
            state_number,
            rule_index,
            kind,
            decision: None,
            non_greedy: false,
            transitions: Vec::new(),
            epsilon_only: false,
            next_tokens: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    #[must_use]
    pub fn transition(&self, index: usize) -> Option<&Transition> {
        self.transitions.get(index)
    }

    #[must_use]
    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    /// True when every outgoing edge is epsilon. A state without edges is not
    /// epsilon-only.
    #[must_use]
    pub const fn only_has_epsilon_transitions(&self) -> bool {
        self.epsilon_only
    }

    #[must_use]
    pub const fn is_rule_stop(&self) -> bool {
        matches!(self.kind, AtnStateKind::RuleStop)
    }

    #[must_use]
    pub const fn is_decision_state(&self) -> bool {
        self.kind.is_decision()
    }

    pub fn add_transition(&mut self, transition: Transition) {
        let index = self.transitions.len();
        self.insert_transition(index, transition);
    }

    /// Inserts `transition` at `index` unless an equivalent edge to the same
    /// target already exists.
    pub fn insert_transition(&mut self, index: usize, transition: Transition) {
        if self.transitions.is_empty() {
            self.epsilon_only = transition.is_epsilon();
        } else if self.epsilon_only != transition.is_epsilon() {
            tracing::warn!(
                state = self.state_number,
                "ATN state has both epsilon and non-epsilon transitions"
            );
            self.epsilon_only = false;
        }
        if self.transitions.iter().any(|t| t.duplicates(&transition)) {
            return;
        }
        let index = index.min(self.transitions.len());
        self.transitions.insert(index, transition);
    }

    pub(crate) fn remove_transition(&mut self, index: usize) -> Option<Transition> {
        (index < self.transitions.len()).then(|| self.transitions.remove(index))
    }

    pub(crate) fn transitions_mut(&mut self) -> &mut [Transition] {
        &mut self.transitions
    }

    pub(crate) fn cached_next_tokens(&self) -> &OnceLock<IntervalSet> {
        &self.next_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_round_trip() {
        for code in 0..=12 {
            let kind = AtnStateKind::from_type_code(code);
            assert_eq!(kind.map(|k| k.type_code()), Some(code));
        }
        assert!(AtnStateKind::from_type_code(13).is_none());
    }

    #[test]
    fn test_epsilon_only_tracking() {
        let mut state = AtnState::new(0, 0, AtnStateKind::Basic);
        assert!(!state.only_has_epsilon_transitions());
        state.add_transition(Transition::epsilon(1));
        assert!(state.only_has_epsilon_transitions());
        state.add_transition(Transition::atom(2, 5));
        assert!(!state.only_has_epsilon_transitions());
        assert_eq!(state.num_transitions(), 2);
    }

    #[test]
    fn test_duplicate_transition_skipped() {
        let mut state = AtnState::new(0, 0, AtnStateKind::Basic);
        state.add_transition(Transition::epsilon(1));
        state.add_transition(Transition::epsilon(1));
        state.insert_transition(0, Transition::epsilon(2));
        assert_eq!(state.num_transitions(), 2);
        assert_eq!(state.transition(0).map(|t| t.target), Some(2));
    }

    #[test]
    fn test_links() {
        let mut kind = AtnStateKind::from_type_code(PLUS_BLOCK_START).unwrap();
        kind.set_end_state(4);
        kind.set_loop_back(7);
        assert_eq!(kind.end_state(), Some(4));
        assert_eq!(kind.loop_back(), Some(7));
        assert!(kind.is_decision());
        assert!(!AtnStateKind::LoopEnd { loop_back: None }.is_decision());
    }
}
