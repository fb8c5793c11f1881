//! LL(1) lookahead over the ATN.
//!
//! Walks epsilon, predicate and rule-call edges depth first from a state and
//! collects the tokens reachable without consuming input. Used for
//! expected-token reporting, independent of adaptive prediction.

use ahash::RandomState;
use hashbrown::HashSet;

use super::{Atn, StateId, TransitionKind, MIN_USER_TOKEN_TYPE, TOKEN_EOF, TOKEN_EPSILON};
use crate::context::{ContextRef, PredictionContext, EMPTY_RETURN_STATE};
use crate::error::StateError;
use crate::misc::IntervalSet;
use crate::parser::RuleContext;

/// Marker added to a lookahead set when a predicate blocked the walk.
pub const HIT_PRED: i32 = super::TOKEN_INVALID_TYPE;

pub struct Ll1Analyzer<'a> {
    atn: &'a Atn,
}

struct LookWalk {
    look: IntervalSet,
    busy: HashSet<(StateId, Option<ContextRef>), RandomState>,
    called_rules: Vec<bool>,
    see_thru_preds: bool,
    add_eof: bool,
}

impl<'a> Ll1Analyzer<'a> {
    #[must_use]
    pub const fn new(atn: &'a Atn) -> Self {
        Self { atn }
    }

    /// Per-alternative LL(1) sets for a decision state. An entry is `None`
    /// when the alternative has no lookahead or is guarded by a predicate.
    #[must_use]
    pub fn decision_lookahead(&self, state: StateId) -> Vec<Option<IntervalSet>> {
        self.atn.states[state]
            .transitions()
            .iter()
            .map(|t| {
                let mut walk = self.walk(false, false);
                self.look_from(t.target, None, Some(PredictionContext::empty()), &mut walk);
                (!walk.look.is_empty() && !walk.look.contains(HIT_PRED)).then_some(walk.look)
            })
            .collect()
    }

    /// Tokens reachable from `state` before `stop_state` (or the end of the
    /// rule). Without a context, reaching the end of the rule adds
    /// [`TOKEN_EPSILON`]; with the empty context it adds [`TOKEN_EOF`].
    #[must_use]
    pub fn look(
        &self,
        state: StateId,
        stop_state: Option<StateId>,
        ctx: Option<ContextRef>,
    ) -> IntervalSet {
        let mut walk = self.walk(true, true);
        self.look_from(state, stop_state, ctx, &mut walk);
        walk.look
    }

    /// [`Ll1Analyzer::look`] with the invocation stack of a rule context.
    pub fn look_in_context(
        &self,
        state: StateId,
        stop_state: Option<StateId>,
        ctx: &RuleContext,
    ) -> Result<IntervalSet, StateError> {
        let ctx = PredictionContext::from_rule_context(self.atn, ctx)?;
        Ok(self.look(state, stop_state, Some(ctx)))
    }

    fn walk(&self, see_thru_preds: bool, add_eof: bool) -> LookWalk {
        LookWalk {
            look: IntervalSet::new(),
            busy: HashSet::default(),
            called_rules: vec![false; self.atn.num_rules()],
            see_thru_preds,
            add_eof,
        }
    }

    fn look_from(
        &self,
        state: StateId,
        stop_state: Option<StateId>,
        ctx: Option<ContextRef>,
        walk: &mut LookWalk,
    ) {
        if !walk.busy.insert((state, ctx.clone())) {
            return;
        }
        let s = &self.atn.states[state];
        if Some(state) == stop_state || s.is_rule_stop() {
            match &ctx {
                None => {
                    walk.look.add_one(TOKEN_EPSILON);
                    return;
                }
                Some(c) if c.is_empty() && walk.add_eof => {
                    walk.look.add_one(TOKEN_EOF);
                    return;
                }
                _ => {}
            }
        }

        // an empty context falls through to the derived follow edges below
        if s.is_rule_stop()
            && let Some(ctx) = &ctx
            && !ctx.is_empty()
        {
            // returning from the rule lifts the recursion guard for it
            let was_called = std::mem::replace(&mut walk.called_rules[s.rule_index], false);
            for i in 0..ctx.len() {
                let return_state = ctx.return_state(i);
                if return_state == EMPTY_RETURN_STATE {
                    if walk.add_eof {
                        walk.look.add_one(TOKEN_EOF);
                    }
                    continue;
                }
                self.look_from(return_state, stop_state, ctx.parent(i).cloned(), walk);
            }
            walk.called_rules[s.rule_index] = was_called;
            return;
        }

        for t in s.transitions() {
            match &t.kind {
                TransitionKind::Rule {
                    rule_index,
                    follow_state,
                    ..
                } => {
                    if walk.called_rules[*rule_index] {
                        continue;
                    }
                    let new_ctx = PredictionContext::singleton(ctx.clone(), *follow_state);
                    walk.called_rules[*rule_index] = true;
                    self.look_from(t.target, stop_state, Some(new_ctx), walk);
                    walk.called_rules[*rule_index] = false;
                }
                TransitionKind::Predicate { .. } | TransitionKind::Precedence { .. } => {
                    if walk.see_thru_preds {
                        self.look_from(t.target, stop_state, ctx.clone(), walk);
                    } else {
                        walk.look.add_one(HIT_PRED);
                    }
                }
                TransitionKind::Wildcard => {
                    walk.look
                        .add_range(MIN_USER_TOKEN_TYPE, self.atn.max_token_type);
                }
                TransitionKind::NotSet { set } => {
                    let vocabulary = IntervalSet::of_range(MIN_USER_TOKEN_TYPE, self.atn.max_token_type);
                    walk.look.add_set(&set.complement(&vocabulary));
                }
                _ if t.is_epsilon() => self.look_from(t.target, stop_state, ctx.clone(), walk),
                _ => {
                    if let Some(label) = t.label() {
                        walk.look.add_set(&label);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::builder::AtnBuilder;

    #[test]
    fn test_decision_lookahead_per_alt() {
        // s : A | B C | {p}? C ;
        let mut b = AtnBuilder::parser(3);
        let s = b.rule();
        let alt1 = b.atom(s, 1);
        let b_tok = b.atom(s, 2);
        let c_tok = b.atom(s, 3);
        let alt2 = b.sequence(s, vec![b_tok, c_tok]);
        let pred = b.predicate(s, 0, false);
        let c2 = b.atom(s, 3);
        let alt3 = b.sequence(s, vec![pred, c2]);
        let body = b.block(s, vec![alt1, alt2, alt3]);
        b.set_rule_body(s, body);
        let atn = b.finish().unwrap();

        let decision = atn.decision_to_state[0];
        let look = Ll1Analyzer::new(&atn).decision_lookahead(decision);
        assert_eq!(look.len(), 3);
        assert_eq!(look[0], Some(IntervalSet::of(1)));
        assert_eq!(look[1], Some(IntervalSet::of(2)));
        assert_eq!(look[2], None);
    }

    #[test]
    fn test_look_with_empty_context_adds_eof() {
        // s : A? ;
        let mut b = AtnBuilder::parser(1);
        let s = b.rule();
        let a = b.atom(s, 1);
        let body = b.optional(s, vec![a], true);
        b.set_rule_body(s, body);
        let atn = b.finish().unwrap();

        let start = atn.rule_to_start_state[s];
        let analyzer = Ll1Analyzer::new(&atn);
        let without = analyzer.look(start, None, None);
        assert!(without.contains(TOKEN_EPSILON));
        let with = analyzer.look(start, None, Some(PredictionContext::empty()));
        assert!(with.contains(TOKEN_EOF));
        assert!(with.contains(1));
    }
}
