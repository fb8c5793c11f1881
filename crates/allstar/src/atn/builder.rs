//! Programmatic ATN construction.
//!
//! [`AtnBuilder`] assembles the same state shapes a grammar compiler emits:
//! every construct is a [`Fragment`] with an entry and an exit state, and
//! fragments are wired together with epsilon edges. [`AtnBuilder::finish`]
//! round-trips the result through the codec, so a built ATN is linked and
//! verified exactly like a deserialized one.
//!
//! ```rust
//! use allstar::atn::builder::AtnBuilder;
//!
//! // s : A B | A C ;
//! let mut b = AtnBuilder::parser(3);
//! let s = b.rule();
//! let a1 = b.atom(s, 1);
//! let b1 = b.atom(s, 2);
//! let alt1 = b.sequence(s, vec![a1, b1]);
//! let a2 = b.atom(s, 1);
//! let c2 = b.atom(s, 3);
//! let alt2 = b.sequence(s, vec![a2, c2]);
//! let body = b.block(s, vec![alt1, alt2]);
//! b.set_rule_body(s, body);
//! let atn = b.finish().unwrap();
//! assert_eq!(atn.num_decisions(), 1);
//! ```

use super::{Atn, AtnStateKind, GrammarType, LexerAction, NO_RULE, StateId, Transition};
use crate::codec::{deserialize, serialize};
use crate::error::DeserializeError;
use crate::misc::IntervalSet;
use crate::options::DeserializationOptions;

/// A sub-graph with one entry (`left`) and one exit (`right`) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub left: StateId,
    pub right: StateId,
}

#[derive(Debug)]
pub struct AtnBuilder {
    atn: Atn,
}

impl AtnBuilder {
    /// Builder for a parser ATN over token types `1..=max_token_type`.
    #[must_use]
    pub fn parser(max_token_type: i32) -> Self {
        Self {
            atn: Atn::new(GrammarType::Parser, max_token_type),
        }
    }

    /// Builder for a lexer ATN. The default mode (0) already exists.
    #[must_use]
    pub fn lexer(max_token_type: i32) -> Self {
        let mut builder = Self {
            atn: Atn::new(GrammarType::Lexer, max_token_type),
        };
        builder.mode();
        builder
    }

    /// Adds a lexer mode and returns its number.
    pub fn mode(&mut self) -> usize {
        let start = self.atn.add_state(NO_RULE, AtnStateKind::TokensStart);
        self.atn.mode_to_start_state.push(start);
        self.atn.define_decision_state(start);
        self.atn.mode_to_start_state.len() - 1
    }

    /// Adds a rule with empty body and returns its index. In a lexer this is
    /// a fragment rule: it produces no token of its own.
    pub fn rule(&mut self) -> usize {
        let rule = self.atn.rule_to_start_state.len();
        let start = self.atn.add_state(
            rule,
            AtnStateKind::RuleStart {
                stop_state: None,
                is_left_recursive: false,
            },
        );
        let stop = self.atn.add_state(rule, AtnStateKind::RuleStop);
        if let AtnStateKind::RuleStart { stop_state, .. } = &mut self.atn.states[start].kind {
            *stop_state = Some(stop);
        }
        self.atn.rule_to_start_state.push(start);
        self.atn.rule_to_stop_state.push(stop);
        if self.atn.grammar_type == GrammarType::Lexer {
            self.atn.rule_to_token_type.push(0);
        }
        rule
    }

    /// Adds a lexer rule producing `token_type`, tried in `mode` after the
    /// rules added to that mode before it.
    pub fn lexer_rule(&mut self, mode: usize, token_type: i32) -> usize {
        let rule = self.rule();
        self.atn.rule_to_token_type[rule] = token_type;
        let mode_start = self.atn.mode_to_start_state[mode];
        let rule_start = self.atn.rule_to_start_state[rule];
        self.epsilon_edge(mode_start, rule_start);
        rule
    }

    /// Marks `rule` as rewritten from left recursion. Its operator loop
    /// then becomes a precedence decision.
    pub fn set_left_recursive(&mut self, rule: usize) {
        let start = self.atn.rule_to_start_state[rule];
        if let AtnStateKind::RuleStart {
            is_left_recursive, ..
        } = &mut self.atn.states[start].kind
        {
            *is_left_recursive = true;
        }
    }

    /// Connects the rule's start and stop states through `body`.
    pub fn set_rule_body(&mut self, rule: usize, body: Fragment) {
        let start = self.atn.rule_to_start_state[rule];
        let stop = self.atn.rule_to_stop_state[rule];
        self.epsilon_edge(start, body.left);
        self.epsilon_edge(body.right, stop);
    }

    fn basic(&mut self, rule: usize) -> StateId {
        self.atn.add_state(rule, AtnStateKind::Basic)
    }

    fn epsilon_edge(&mut self, from: StateId, to: StateId) {
        self.atn.states[from].add_transition(Transition::epsilon(to));
    }

    fn edge(&mut self, rule: usize, make: impl FnOnce(StateId) -> Transition) -> Fragment {
        let left = self.basic(rule);
        let right = self.basic(rule);
        self.atn.states[left].add_transition(make(right));
        Fragment { left, right }
    }

    /// Matches nothing.
    pub fn epsilon(&mut self, rule: usize) -> Fragment {
        self.edge(rule, Transition::epsilon)
    }

    /// Matches one token type (parser) or character (lexer).
    pub fn atom(&mut self, rule: usize, label: i32) -> Fragment {
        self.edge(rule, |target| Transition::atom(target, label))
    }

    pub fn range(&mut self, rule: usize, from: i32, to: i32) -> Fragment {
        self.edge(rule, |target| Transition::range(target, from, to))
    }

    pub fn set(&mut self, rule: usize, set: IntervalSet) -> Fragment {
        self.edge(rule, |target| Transition::set(target, set))
    }

    pub fn not_set(&mut self, rule: usize, set: IntervalSet) -> Fragment {
        self.edge(rule, |target| Transition::not_set(target, set))
    }

    pub fn wildcard(&mut self, rule: usize) -> Fragment {
        self.edge(rule, Transition::wildcard)
    }

    /// Matches the characters of `text` in order.
    pub fn string(&mut self, rule: usize, text: &str) -> Fragment {
        let left = self.basic(rule);
        let mut prev = left;
        for c in text.chars() {
            let next = self.basic(rule);
            self.atn.states[prev].add_transition(Transition::atom(next, c as i32));
            prev = next;
        }
        Fragment { left, right: prev }
    }

    /// Invokes `target` from inside `rule`. A non-zero `precedence` is the
    /// precedence argument of a left-recursive call.
    pub fn rule_ref(&mut self, rule: usize, target: usize, precedence: i32) -> Fragment {
        let target_start = self.atn.rule_to_start_state[target];
        let left = self.basic(rule);
        let right = self.basic(rule);
        self.atn.states[left].add_transition(Transition::rule(target_start, target, precedence, right));
        Fragment { left, right }
    }

    /// Semantic predicate `pred_index` of `rule`.
    pub fn predicate(&mut self, rule: usize, pred_index: usize, is_ctx_dependent: bool) -> Fragment {
        self.edge(rule, |target| {
            Transition::predicate(target, rule, pred_index, is_ctx_dependent)
        })
    }

    /// Precedence predicate `precedence >= _p` of a left-recursive rule.
    pub fn precedence(&mut self, rule: usize, precedence: i32) -> Fragment {
        self.edge(rule, |target| Transition::precedence(target, precedence))
    }

    /// Parser action `action_index` of `rule`.
    pub fn action(&mut self, rule: usize, action_index: Option<usize>) -> Fragment {
        self.edge(rule, |target| Transition::action(target, rule, action_index))
    }

    /// Lexer command executed when a token of `rule` is emitted. Equal
    /// actions share one entry in the action table.
    pub fn lexer_action(&mut self, rule: usize, action: LexerAction) -> Fragment {
        let index = match self.atn.lexer_actions.iter().position(|a| *a == action) {
            Some(index) => index,
            None => {
                self.atn.lexer_actions.push(action);
                self.atn.lexer_actions.len() - 1
            }
        };
        self.edge(rule, |target| Transition::action(target, rule, Some(index)))
    }

    /// Elements matched one after the other.
    pub fn sequence(&mut self, rule: usize, elements: Vec<Fragment>) -> Fragment {
        let mut iter = elements.into_iter();
        let Some(first) = iter.next() else {
            return self.epsilon(rule);
        };
        let mut right = first.right;
        for element in iter {
            self.epsilon_edge(right, element.left);
            right = element.right;
        }
        Fragment {
            left: first.left,
            right,
        }
    }

    fn make_block(&mut self, start: StateId, alts: Vec<Fragment>) -> Fragment {
        let rule = self.atn.states[start].rule_index;
        let end = self.atn.add_state(rule, AtnStateKind::BlockEnd { start_state: None });
        self.atn.states[start].kind.set_end_state(end);
        for alt in alts {
            self.epsilon_edge(start, alt.left);
            self.epsilon_edge(alt.right, end);
        }
        Fragment { left: start, right: end }
    }

    /// Choice between `alts`, numbered from 1 in order. A single
    /// alternative is returned as is.
    pub fn block(&mut self, rule: usize, mut alts: Vec<Fragment>) -> Fragment {
        if alts.len() == 1 {
            return alts.remove(0);
        }
        let start = self.atn.add_state(rule, AtnStateKind::BlockStart { end_state: None });
        if alts.len() > 1 {
            self.atn.define_decision_state(start);
        }
        self.make_block(start, alts)
    }

    /// `(alts)?`. The greedy form prefers matching, the non-greedy form
    /// prefers skipping.
    pub fn optional(&mut self, rule: usize, alts: Vec<Fragment>, greedy: bool) -> Fragment {
        let start = self.atn.add_state(rule, AtnStateKind::BlockStart { end_state: None });
        self.atn.define_decision_state(start);
        let block = self.make_block(start, alts);
        self.atn.states[start].non_greedy = !greedy;
        let skip = Transition::epsilon(block.right);
        if greedy {
            self.atn.states[start].add_transition(skip);
        } else {
            self.atn.states[start].insert_transition(0, skip);
        }
        block
    }

    /// `(alts)*`.
    pub fn star(&mut self, rule: usize, alts: Vec<Fragment>, greedy: bool) -> Fragment {
        let many = alts.len() > 1;
        let block_start = self.atn.add_state(rule, AtnStateKind::StarBlockStart { end_state: None });
        if many {
            self.atn.define_decision_state(block_start);
        }
        let block = self.make_block(block_start, alts);

        let entry = self.atn.add_state(
            rule,
            AtnStateKind::StarLoopEntry {
                loop_back: None,
                is_precedence_decision: false,
            },
        );
        self.atn.states[entry].non_greedy = !greedy;
        self.atn.define_decision_state(entry);
        let end = self.atn.add_state(rule, AtnStateKind::LoopEnd { loop_back: None });
        let loop_back = self.atn.add_state(rule, AtnStateKind::StarLoopBack);
        self.atn.states[entry].kind.set_loop_back(loop_back);
        self.atn.states[end].kind.set_loop_back(loop_back);

        if greedy {
            self.epsilon_edge(entry, block.left);
            self.epsilon_edge(entry, end);
        } else {
            self.epsilon_edge(entry, end);
            self.epsilon_edge(entry, block.left);
        }
        self.epsilon_edge(block.right, loop_back);
        self.epsilon_edge(loop_back, entry);
        Fragment { left: entry, right: end }
    }

    /// `(alts)+`.
    pub fn plus(&mut self, rule: usize, alts: Vec<Fragment>, greedy: bool) -> Fragment {
        let many = alts.len() > 1;
        let block_start = self.atn.add_state(
            rule,
            AtnStateKind::PlusBlockStart {
                end_state: None,
                loop_back: None,
            },
        );
        if many {
            self.atn.define_decision_state(block_start);
        }
        let block = self.make_block(block_start, alts);

        let loop_back = self.atn.add_state(rule, AtnStateKind::PlusLoopBack);
        self.atn.states[loop_back].non_greedy = !greedy;
        self.atn.define_decision_state(loop_back);
        let end = self.atn.add_state(rule, AtnStateKind::LoopEnd { loop_back: None });
        self.atn.states[block_start].kind.set_loop_back(loop_back);
        self.atn.states[end].kind.set_loop_back(loop_back);

        self.epsilon_edge(block.right, loop_back);
        if greedy {
            self.epsilon_edge(loop_back, block_start);
            self.epsilon_edge(loop_back, end);
        } else {
            self.epsilon_edge(loop_back, end);
            self.epsilon_edge(loop_back, block_start);
        }
        Fragment {
            left: block_start,
            right: end,
        }
    }

    /// The ATN as built, before the codec round trip.
    #[must_use]
    pub const fn atn(&self) -> &Atn {
        &self.atn
    }

    /// Serializes the ATN and loads it back with default options.
    pub fn finish(self) -> Result<Atn, DeserializeError> {
        self.finish_with(&DeserializationOptions::default())
    }

    pub fn finish_with(self, options: &DeserializationOptions) -> Result<Atn, DeserializeError> {
        deserialize(&serialize(&self.atn), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::TransitionKind;

    #[test]
    fn test_block_defines_decision() {
        let mut b = AtnBuilder::parser(2);
        let r = b.rule();
        let x = b.atom(r, 1);
        let y = b.atom(r, 2);
        let body = b.block(r, vec![x, y]);
        b.set_rule_body(r, body);
        let atn = b.finish().unwrap();
        assert_eq!(atn.num_decisions(), 1);
        let decision = atn.decision_state(0).unwrap();
        assert_eq!(decision.num_transitions(), 2);
        let end = decision.kind.end_state().unwrap();
        assert_eq!(
            atn.state(end).kind,
            AtnStateKind::BlockEnd {
                start_state: Some(decision.state_number)
            }
        );
    }

    #[test]
    fn test_non_greedy_optional_prefers_skip() {
        let mut b = AtnBuilder::parser(1);
        let r = b.rule();
        let x = b.atom(r, 1);
        let body = b.optional(r, vec![x], false);
        b.set_rule_body(r, body);
        let atn = b.finish().unwrap();
        let decision = atn.decision_state(0).unwrap();
        assert!(decision.non_greedy);
        assert_eq!(decision.transition(0).map(|t| t.target), decision.kind.end_state());
    }

    #[test]
    fn test_star_loop_links() {
        let mut b = AtnBuilder::parser(1);
        let r = b.rule();
        let x = b.atom(r, 1);
        let body = b.star(r, vec![x], true);
        b.set_rule_body(r, body);
        let atn = b.finish().unwrap();
        let entry = atn.decision_state(0).unwrap();
        assert!(matches!(
            entry.kind,
            AtnStateKind::StarLoopEntry {
                loop_back: Some(_),
                is_precedence_decision: false
            }
        ));
    }

    #[test]
    fn test_left_recursive_loop_is_precedence_decision() {
        // e : INT ( {2 >= _p}? '*' e[3] )* ;
        let mut b = AtnBuilder::parser(2);
        let e = b.rule();
        b.set_left_recursive(e);
        let primary = b.atom(e, 1);
        let pred = b.precedence(e, 2);
        let op = b.atom(e, 2);
        let call = b.rule_ref(e, e, 3);
        let suffix = b.sequence(e, vec![pred, op, call]);
        let operators = b.star(e, vec![suffix], true);
        let body = b.sequence(e, vec![primary, operators]);
        b.set_rule_body(e, body);
        let atn = b.finish().unwrap();

        assert!(atn.is_left_recursive(e));
        let entry = atn.decision_state(0).unwrap();
        assert!(matches!(
            entry.kind,
            AtnStateKind::StarLoopEntry {
                is_precedence_decision: true,
                ..
            }
        ));
        // the recursive call has precedence 3, so its return edge is not
        // the outermost one
        let stop = atn.state(atn.rule_to_stop_state[e]);
        assert!(stop.transitions().iter().all(|t| matches!(
            t.kind,
            TransitionKind::Epsilon {
                outermost_precedence_return: None
            }
        )));
    }

    #[test]
    fn test_lexer_rules_hang_off_mode_start() {
        let mut b = AtnBuilder::lexer(2);
        let id = b.lexer_rule(0, 1);
        let letters = b.range(id, 'a' as i32, 'z' as i32);
        b.set_rule_body(id, letters);
        let ws = b.lexer_rule(0, 2);
        let space = b.atom(ws, ' ' as i32);
        let skip = b.lexer_action(ws, LexerAction::Skip);
        let body = b.sequence(ws, vec![space, skip]);
        b.set_rule_body(ws, body);
        let atn = b.finish().unwrap();

        assert_eq!(atn.rule_to_token_type, vec![1, 2]);
        assert_eq!(atn.lexer_actions, vec![LexerAction::Skip]);
        let mode_start = atn.state(atn.mode_to_start_state[0]);
        assert_eq!(mode_start.num_transitions(), 2);
        assert_eq!(mode_start.rule_index, NO_RULE);
    }
}
