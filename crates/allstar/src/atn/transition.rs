//! ATN transitions.

use std::fmt;

use super::{StateId, TOKEN_EOF};
use crate::misc::IntervalSet;

/// An edge of the ATN. `target` indexes the owning ATN's state table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub target: StateId,
    pub kind: TransitionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionKind {
    /// Consumes nothing. Derived rule-stop return edges record the rule
    /// index when they leave the outermost call of a left-recursive rule.
    Epsilon {
        outermost_precedence_return: Option<usize>,
    },
    Range {
        from: i32,
        to: i32,
    },
    /// Call of `rule_index`; `target` is the rule start state and
    /// `follow_state` is where matching resumes afterwards.
    Rule {
        rule_index: usize,
        precedence: i32,
        follow_state: StateId,
    },
    Predicate {
        rule_index: usize,
        pred_index: usize,
        is_ctx_dependent: bool,
    },
    Atom {
        label: i32,
    },
    Action {
        rule_index: usize,
        action_index: Option<usize>,
        is_ctx_dependent: bool,
    },
    Set {
        set: IntervalSet,
    },
    NotSet {
        set: IntervalSet,
    },
    Wildcard,
    Precedence {
        precedence: i32,
    },
}

pub(crate) const EPSILON: i32 = 1;
pub(crate) const RANGE: i32 = 2;
pub(crate) const RULE: i32 = 3;
pub(crate) const PREDICATE: i32 = 4;
pub(crate) const ATOM: i32 = 5;
pub(crate) const ACTION: i32 = 6;
pub(crate) const SET: i32 = 7;
pub(crate) const NOT_SET: i32 = 8;
pub(crate) const WILDCARD: i32 = 9;
pub(crate) const PRECEDENCE: i32 = 10;

impl Transition {
    #[must_use]
    pub const fn epsilon(target: StateId) -> Self {
        Self {
            target,
            kind: TransitionKind::Epsilon {
                outermost_precedence_return: None,
            },
        }
    }

    #[must_use]
    pub const fn atom(target: StateId, label: i32) -> Self {
        Self {
            target,
            kind: TransitionKind::Atom { label },
        }
    }

    #[must_use]
    pub const fn range(target: StateId, from: i32, to: i32) -> Self {
        Self {
            target,
            kind: TransitionKind::Range { from, to },
        }
    }

    #[must_use]
    pub const fn set(target: StateId, set: IntervalSet) -> Self {
        Self {
            target,
            kind: TransitionKind::Set { set },
        }
    }

    #[must_use]
    pub const fn not_set(target: StateId, set: IntervalSet) -> Self {
        Self {
            target,
            kind: TransitionKind::NotSet { set },
        }
    }

    #[must_use]
    pub const fn wildcard(target: StateId) -> Self {
        Self {
            target,
            kind: TransitionKind::Wildcard,
        }
    }

    #[must_use]
    pub const fn rule(
        rule_start: StateId,
        rule_index: usize,
        precedence: i32,
        follow_state: StateId,
    ) -> Self {
        Self {
            target: rule_start,
            kind: TransitionKind::Rule {
                rule_index,
                precedence,
                follow_state,
            },
        }
    }

    #[must_use]
    pub const fn predicate(
        target: StateId,
        rule_index: usize,
        pred_index: usize,
        is_ctx_dependent: bool,
    ) -> Self {
        Self {
            target,
            kind: TransitionKind::Predicate {
                rule_index,
                pred_index,
                is_ctx_dependent,
            },
        }
    }

    #[must_use]
    pub const fn precedence(target: StateId, precedence: i32) -> Self {
        Self {
            target,
            kind: TransitionKind::Precedence { precedence },
        }
    }

    #[must_use]
    pub const fn action(target: StateId, rule_index: usize, action_index: Option<usize>) -> Self {
        Self {
            target,
            kind: TransitionKind::Action {
                rule_index,
                action_index,
                is_ctx_dependent: false,
            },
        }
    }

    /// Rule calls, predicates and actions consume no input either.
    #[must_use]
    pub const fn is_epsilon(&self) -> bool {
        matches!(
            self.kind,
            TransitionKind::Epsilon { .. }
                | TransitionKind::Rule { .. }
                | TransitionKind::Predicate { .. }
                | TransitionKind::Action { .. }
                | TransitionKind::Precedence { .. }
        )
    }

    /// Whether consuming `symbol` follows this edge. Negated sets and
    /// wildcards only match inside `min_vocab..=max_vocab`.
    #[must_use]
    pub fn matches(&self, symbol: i32, min_vocab: i32, max_vocab: i32) -> bool {
        match &self.kind {
            TransitionKind::Atom { label } => *label == symbol,
            TransitionKind::Range { from, to } => *from <= symbol && symbol <= *to,
            TransitionKind::Set { set } => set.contains(symbol),
            TransitionKind::NotSet { set } => {
                symbol >= min_vocab && symbol <= max_vocab && !set.contains(symbol)
            }
            TransitionKind::Wildcard => symbol >= min_vocab && symbol <= max_vocab,
            _ => false,
        }
    }

    /// The symbols on this edge. For negated sets this is the set being
    /// negated, not its complement.
    #[must_use]
    pub fn label(&self) -> Option<IntervalSet> {
        match &self.kind {
            TransitionKind::Atom { label } => Some(IntervalSet::of(*label)),
            TransitionKind::Range { from, to } => Some(IntervalSet::of_range(*from, *to)),
            TransitionKind::Set { set } | TransitionKind::NotSet { set } => Some(set.clone()),
            _ => None,
        }
    }

    /// Serialized edge-kind code.
    #[must_use]
    pub const fn type_code(&self) -> i32 {
        match self.kind {
            TransitionKind::Epsilon { .. } => EPSILON,
            TransitionKind::Range { .. } => RANGE,
            TransitionKind::Rule { .. } => RULE,
            TransitionKind::Predicate { .. } => PREDICATE,
            TransitionKind::Atom { .. } => ATOM,
            TransitionKind::Action { .. } => ACTION,
            TransitionKind::Set { .. } => SET,
            TransitionKind::NotSet { .. } => NOT_SET,
            TransitionKind::Wildcard => WILDCARD,
            TransitionKind::Precedence { .. } => PRECEDENCE,
        }
    }

    /// Whether same-target duplicates of this edge may be collapsed.
    pub(crate) fn duplicates(&self, other: &Self) -> bool {
        if self.target != other.target {
            return false;
        }
        match (self.label(), other.label()) {
            (Some(a), Some(b)) => a == b,
            _ => self.is_epsilon() && other.is_epsilon(),
        }
    }
}

fn symbol_name(symbol: i32) -> String {
    if symbol == TOKEN_EOF {
        "EOF".to_string()
    } else {
        symbol.to_string()
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TransitionKind::Epsilon { .. } => write!(f, "ε"),
            TransitionKind::Range { from, to } => {
                write!(f, "{}..{}", symbol_name(*from), symbol_name(*to))
            }
            TransitionKind::Rule {
                rule_index,
                precedence,
                ..
            } => {
                if *precedence == 0 {
                    write!(f, "rule {rule_index}")
                } else {
                    write!(f, "rule {rule_index}[{precedence}]")
                }
            }
            TransitionKind::Predicate {
                rule_index,
                pred_index,
                ..
            } => write!(f, "pred_{rule_index}:{pred_index}"),
            TransitionKind::Atom { label } => f.write_str(&symbol_name(*label)),
            TransitionKind::Action {
                rule_index,
                action_index,
                ..
            } => match action_index {
                Some(action) => write!(f, "action_{rule_index}:{action}"),
                None => write!(f, "action_{rule_index}"),
            },
            TransitionKind::Set { set } => write!(f, "{set}"),
            TransitionKind::NotSet { set } => write!(f, "~{set}"),
            TransitionKind::Wildcard => write!(f, "."),
            TransitionKind::Precedence { precedence } => write!(f, "{precedence} >= _p"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_respects_vocabulary() {
        let not = Transition::not_set(1, IntervalSet::of_range(3, 4));
        assert!(not.matches(1, 1, 10));
        assert!(!not.matches(3, 1, 10));
        assert!(!not.matches(11, 1, 10));
        assert!(!not.matches(TOKEN_EOF, 1, 10));

        let wildcard = Transition::wildcard(1);
        assert!(wildcard.matches(10, 1, 10));
        assert!(!wildcard.matches(TOKEN_EOF, 1, 10));
    }

    #[test]
    fn test_epsilon_kinds() {
        assert!(Transition::epsilon(0).is_epsilon());
        assert!(Transition::rule(0, 1, 0, 2).is_epsilon());
        assert!(Transition::predicate(0, 0, 0, false).is_epsilon());
        assert!(Transition::precedence(0, 2).is_epsilon());
        assert!(!Transition::atom(0, 4).is_epsilon());
        assert!(!Transition::atom(0, 4).matches(5, 0, 10));
    }

    #[test]
    fn test_duplicate_detection() {
        let a = Transition::atom(3, 7);
        let b = Transition::set(3, IntervalSet::of(7));
        assert!(a.duplicates(&b));
        assert!(Transition::epsilon(3).duplicates(&Transition::action(3, 0, None)));
        assert!(!Transition::epsilon(3).duplicates(&Transition::epsilon(4)));
    }
}
