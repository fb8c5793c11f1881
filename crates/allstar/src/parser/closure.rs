//! Reach and closure operations of parser prediction.
//!
//! `compute_reach_set` moves every configuration over one input symbol and
//! then closes the result over epsilon edges. Closure follows rule calls by
//! pushing return states onto the configuration's stack, and follows rule
//! ends by popping them. An empty stack under SLL means "any caller", so
//! closure walks into every follow state of the rule and records that the
//! configuration now reaches into the outer context.

use ahash::RandomState;
use hashbrown::{HashMap, HashSet};

use super::simulator::Prediction;
use crate::atn::{
    AtnStateKind, StateId, Transition, TransitionKind, INVALID_ALT, TOKEN_EOF, TOKEN_EPSILON,
};
use crate::configs::{AtnConfig, AtnConfigSet, SemanticContext, SemanticRef};
use crate::context::{ContextRef, PredictionContext, EMPTY_RETURN_STATE};
use crate::error::StateError;
use crate::parser::prediction_mode::{
    all_configs_in_rule_stop_states, has_config_in_rule_stop_state, unique_alt_of,
};
use crate::parser::RuleContext;

pub(super) type ClosureBusy = HashSet<AtnConfig, RandomState>;

impl Prediction<'_> {
    /// Configurations of the decision's start state under `ctx`.
    pub(super) fn compute_start_state(
        &mut self,
        start: StateId,
        ctx: &RuleContext,
        full_ctx: bool,
    ) -> Result<AtnConfigSet, StateError> {
        let atn = self.atn;
        let initial = PredictionContext::from_rule_context(atn, ctx)?;
        let mut configs = AtnConfigSet::new(full_ctx);
        for (i, transition) in atn.state(start).transitions().iter().enumerate() {
            let config = AtnConfig::new(transition.target, i + 1, initial.clone());
            let mut busy = ClosureBusy::default();
            self.closure(config, &mut configs, &mut busy, true, full_ctx, false)?;
        }
        Ok(configs)
    }

    /// Configurations reached from `closure` by consuming `t`, or `None`
    /// when nothing matches.
    pub(super) fn compute_reach_set(
        &mut self,
        closure: &AtnConfigSet,
        t: i32,
        full_ctx: bool,
    ) -> Result<Option<AtnConfigSet>, StateError> {
        let atn = self.atn;
        let mut intermediate = AtnConfigSet::new(full_ctx);
        // configurations that finished the decision rule wait here so the
        // closure below cannot merge them away
        let mut skipped_stop_states: Option<Vec<AtnConfig>> = None;

        for config in closure {
            let state = atn.state(config.state);
            if state.is_rule_stop() {
                if full_ctx || t == TOKEN_EOF {
                    skipped_stop_states
                        .get_or_insert_with(Vec::new)
                        .push(config.clone());
                }
                continue;
            }
            for transition in state.transitions() {
                if transition.matches(t, 0, atn.max_token_type) {
                    intermediate.add(
                        config.with_state(transition.target),
                        Some(&mut self.merge_cache),
                    )?;
                }
            }
        }

        let use_intermediate = skipped_stop_states.is_none()
            && t != TOKEN_EOF
            && (intermediate.len() == 1 || unique_alt_of(&intermediate) != INVALID_ALT);

        let mut reach = if use_intermediate {
            intermediate
        } else {
            let mut reach = AtnConfigSet::new(full_ctx);
            let mut busy = ClosureBusy::default();
            let treat_eof_as_epsilon = t == TOKEN_EOF;
            for config in &intermediate {
                self.closure(
                    config.clone(),
                    &mut reach,
                    &mut busy,
                    false,
                    full_ctx,
                    treat_eof_as_epsilon,
                )?;
            }
            reach
        };

        if t == TOKEN_EOF {
            reach = self.remove_all_configs_not_in_rule_stop_state(reach, use_intermediate)?;
        }

        if let Some(skipped) = skipped_stop_states
            && (!full_ctx || !has_config_in_rule_stop_state(&reach, atn))
        {
            for config in skipped {
                reach.add(config, Some(&mut self.merge_cache))?;
            }
        }

        tracing::trace!(t, full_ctx, size = reach.len(), "reach");
        if reach.is_empty() {
            return Ok(None);
        }
        Ok(Some(reach))
    }

    /// Keeps only configurations at a rule stop state. With
    /// `look_to_end_of_rule`, configurations that can reach the end of their
    /// rule without consuming are moved to its stop state.
    pub(super) fn remove_all_configs_not_in_rule_stop_state(
        &mut self,
        configs: AtnConfigSet,
        look_to_end_of_rule: bool,
    ) -> Result<AtnConfigSet, StateError> {
        let atn = self.atn;
        if all_configs_in_rule_stop_states(&configs, atn) {
            return Ok(configs);
        }
        let mut result = AtnConfigSet::new(configs.full_ctx());
        for config in &configs {
            let state = atn.state(config.state);
            if state.is_rule_stop() {
                result.add(config.clone(), Some(&mut self.merge_cache))?;
                continue;
            }
            if look_to_end_of_rule
                && state.only_has_epsilon_transitions()
                && atn.next_tokens(config.state).contains(TOKEN_EPSILON)
            {
                let end = atn.rule_to_stop_state[state.rule_index];
                result.add(config.with_state(end), Some(&mut self.merge_cache))?;
            }
        }
        Ok(result)
    }

    /// Start-state filter of a precedence DFA.
    ///
    /// Precedence predicates are resolved against the current precedence.
    /// Alternatives other than 1 are dropped where alternative 1 reached the
    /// same state with the same stack, since in a left-recursive rule that
    /// means they only continue what alternative 1 already covers.
    pub(super) fn apply_precedence_filter(
        &mut self,
        configs: &AtnConfigSet,
    ) -> Result<AtnConfigSet, StateError> {
        let outer = self.outer;
        let mut states_from_alt1: HashMap<StateId, ContextRef, RandomState> = HashMap::default();
        let mut filtered = AtnConfigSet::new(configs.full_ctx());

        for config in configs {
            if config.alt != 1 {
                continue;
            }
            let Some(updated) =
                SemanticContext::eval_precedence(&config.semantic_context, self.recognizer, Some(outer))
            else {
                continue;
            };
            states_from_alt1.insert(config.state, config.context.clone());
            let mut config = config.clone();
            config.semantic_context = updated;
            filtered.add(config, Some(&mut self.merge_cache))?;
        }

        for config in configs {
            if config.alt == 1 {
                continue;
            }
            if !config.precedence_filter_suppressed
                && states_from_alt1
                    .get(&config.state)
                    .is_some_and(|ctx| *ctx == config.context)
            {
                continue;
            }
            filtered.add(config.clone(), Some(&mut self.merge_cache))?;
        }
        Ok(filtered)
    }

    pub(super) fn closure(
        &mut self,
        config: AtnConfig,
        configs: &mut AtnConfigSet,
        busy: &mut ClosureBusy,
        collect_predicates: bool,
        full_ctx: bool,
        treat_eof_as_epsilon: bool,
    ) -> Result<(), StateError> {
        self.closure_checking_stop_state(
            config,
            configs,
            busy,
            collect_predicates,
            full_ctx,
            0,
            treat_eof_as_epsilon,
        )
    }

    /// Pops the stack at rule stop states before continuing the closure.
    /// `depth` counts rule calls entered (positive) or left (negative)
    /// since the closure started.
    #[allow(clippy::too_many_arguments)]
    fn closure_checking_stop_state(
        &mut self,
        config: AtnConfig,
        configs: &mut AtnConfigSet,
        busy: &mut ClosureBusy,
        collect_predicates: bool,
        full_ctx: bool,
        depth: i32,
        treat_eof_as_epsilon: bool,
    ) -> Result<(), StateError> {
        let atn = self.atn;
        if atn.state(config.state).is_rule_stop() {
            if !config.context.is_empty() {
                let context = config.context.clone();
                for i in 0..context.len() {
                    let return_state = context.return_state(i);
                    if return_state == EMPTY_RETURN_STATE {
                        if full_ctx {
                            configs.add(
                                config.with_state_and_context(
                                    config.state,
                                    PredictionContext::empty(),
                                ),
                                Some(&mut self.merge_cache),
                            )?;
                        } else {
                            self.closure_inner(
                                config.clone(),
                                configs,
                                busy,
                                collect_predicates,
                                full_ctx,
                                depth,
                                treat_eof_as_epsilon,
                            )?;
                        }
                        continue;
                    }
                    let parent = context
                        .parent(i)
                        .cloned()
                        .unwrap_or_else(PredictionContext::empty);
                    let mut popped = AtnConfig::new(return_state, config.alt, parent);
                    popped.semantic_context = config.semantic_context.clone();
                    popped.reaches_into_outer_context = config.reaches_into_outer_context;
                    popped.precedence_filter_suppressed = config.precedence_filter_suppressed;
                    self.closure_checking_stop_state(
                        popped,
                        configs,
                        busy,
                        collect_predicates,
                        full_ctx,
                        depth - 1,
                        treat_eof_as_epsilon,
                    )?;
                }
                return Ok(());
            }
            if full_ctx {
                // the real caller stack is exhausted; the decision rule ends here
                configs.add(config, Some(&mut self.merge_cache))?;
                return Ok(());
            }
        }
        self.closure_inner(
            config,
            configs,
            busy,
            collect_predicates,
            full_ctx,
            depth,
            treat_eof_as_epsilon,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn closure_inner(
        &mut self,
        config: AtnConfig,
        configs: &mut AtnConfigSet,
        busy: &mut ClosureBusy,
        collect_predicates: bool,
        full_ctx: bool,
        depth: i32,
        treat_eof_as_epsilon: bool,
    ) -> Result<(), StateError> {
        let atn = self.atn;
        let state = atn.state(config.state);
        if !state.only_has_epsilon_transitions() {
            configs.add(config.clone(), Some(&mut self.merge_cache))?;
        }

        for (i, transition) in state.transitions().iter().enumerate() {
            if i == 0 && self.can_drop_loop_entry_edge_in_left_recursive_rule(&config) {
                continue;
            }
            let continue_collecting =
                collect_predicates && !matches!(transition.kind, TransitionKind::Action { .. });
            let Some(mut next) = self.epsilon_target(
                &config,
                transition,
                continue_collecting,
                depth == 0,
                full_ctx,
                treat_eof_as_epsilon,
            ) else {
                continue;
            };

            let mut new_depth = depth;
            if state.is_rule_stop() {
                // leaving the decision rule for some unknown caller
                if self.dfa.is_precedence_dfa()
                    && let TransitionKind::Epsilon {
                        outermost_precedence_return: Some(rule),
                    } = transition.kind
                    && rule == atn.state(self.dfa.atn_start_state).rule_index
                {
                    next.precedence_filter_suppressed = true;
                }
                next.reaches_into_outer_context += 1;
                if !busy.insert(next.clone()) {
                    continue;
                }
                configs.dips_into_outer_context = true;
                new_depth -= 1;
                tracing::trace!(config = %next, "dips into outer context");
            } else {
                if !transition.is_epsilon() && !busy.insert(next.clone()) {
                    continue;
                }
                if matches!(transition.kind, TransitionKind::Rule { .. }) && new_depth >= 0 {
                    new_depth += 1;
                }
            }

            self.closure_checking_stop_state(
                next,
                configs,
                busy,
                continue_collecting,
                full_ctx,
                new_depth,
                treat_eof_as_epsilon,
            )?;
        }
        Ok(())
    }

    /// Whether the loop-entry edge of a left-recursive rule can be skipped
    /// because every caller on the stack returns into the same loop, so
    /// following the exit branch can only rediscover configurations the loop
    /// already produces.
    fn can_drop_loop_entry_edge_in_left_recursive_rule(&self, config: &AtnConfig) -> bool {
        let atn = self.atn;
        let p = atn.state(config.state);
        if !matches!(
            p.kind,
            AtnStateKind::StarLoopEntry {
                is_precedence_decision: true,
                ..
            }
        ) || config.context.is_empty()
            || config.context.has_empty_path()
        {
            return false;
        }

        let ctx = &config.context;
        let num_ctxs = ctx.len();
        if (0..num_ctxs).any(|i| atn.state(ctx.return_state(i)).rule_index != p.rule_index) {
            return false;
        }

        let Some(block_end) = p
            .transition(0)
            .and_then(|t| atn.state(t.target).kind.end_state())
        else {
            return false;
        };

        for i in 0..num_ctxs {
            let return_state = atn.state(ctx.return_state(i));
            if return_state.num_transitions() != 1 {
                return false;
            }
            let Some(return_edge) = return_state.transition(0) else {
                return false;
            };
            if !return_edge.is_epsilon() {
                return false;
            }
            let target = return_edge.target;
            if matches!(return_state.kind, AtnStateKind::BlockEnd { .. })
                && target == p.state_number
            {
                continue;
            }
            if return_state.state_number == block_end || target == block_end {
                continue;
            }
            let target_state = atn.state(target);
            if matches!(target_state.kind, AtnStateKind::BlockEnd { .. })
                && target_state.num_transitions() == 1
                && target_state
                    .transition(0)
                    .is_some_and(|t| t.is_epsilon() && t.target == p.state_number)
            {
                continue;
            }
            return false;
        }
        true
    }

    /// The configuration reached over a non-consuming `transition`, or
    /// `None` if the edge consumes input or a predicate fails.
    fn epsilon_target(
        &mut self,
        config: &AtnConfig,
        transition: &Transition,
        collect_predicates: bool,
        in_context: bool,
        full_ctx: bool,
        treat_eof_as_epsilon: bool,
    ) -> Option<AtnConfig> {
        match &transition.kind {
            TransitionKind::Rule { follow_state, .. } => {
                let ctx = PredictionContext::singleton(Some(config.context.clone()), *follow_state);
                Some(config.with_state_and_context(transition.target, ctx))
            }
            TransitionKind::Precedence { precedence } => {
                let pred = SemanticContext::precedence(*precedence);
                self.predicate_target(
                    config,
                    transition.target,
                    pred,
                    collect_predicates && in_context,
                    full_ctx,
                )
            }
            TransitionKind::Predicate {
                rule_index,
                pred_index,
                is_ctx_dependent,
            } => {
                let pred = SemanticContext::predicate(*rule_index, *pred_index, *is_ctx_dependent);
                self.predicate_target(
                    config,
                    transition.target,
                    pred,
                    collect_predicates && (!is_ctx_dependent || in_context),
                    full_ctx,
                )
            }
            TransitionKind::Action { .. } | TransitionKind::Epsilon { .. } => {
                Some(config.with_state(transition.target))
            }
            TransitionKind::Atom { .. } | TransitionKind::Range { .. } | TransitionKind::Set { .. }
                if treat_eof_as_epsilon && transition.matches(TOKEN_EOF, 0, 1) =>
            {
                Some(config.with_state(transition.target))
            }
            _ => None,
        }
    }

    /// Crosses a predicate edge. Under full context the predicate is
    /// evaluated on the spot at the decision's start; under SLL it is
    /// attached to the configuration for the DFA state to evaluate later.
    fn predicate_target(
        &mut self,
        config: &AtnConfig,
        target: StateId,
        pred: SemanticRef,
        collect: bool,
        full_ctx: bool,
    ) -> Option<AtnConfig> {
        if !collect {
            return Some(config.with_state(target));
        }
        if full_ctx {
            let outer = self.outer;
            let current = self.input.index();
            self.input.seek(self.start_index);
            let passes = pred.eval(self.recognizer, Some(outer));
            self.input.seek(current);
            return passes.then(|| config.with_state(target));
        }
        let combined = SemanticContext::and(Some(&config.semantic_context), Some(&pred));
        Some(config.with_semantic_context(target, combined))
    }
}
