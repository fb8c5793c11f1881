//! Adaptive LL(*) prediction.
//!
//! [`ParserAtnSimulator::adaptive_predict`] chooses an alternative for one
//! decision by looking ahead in the token stream:
//!
//! 1. Follow cached DFA edges from the decision's start state while they
//!    exist.
//! 2. On a missing edge, simulate the ATN with SLL semantics (unknown
//!    callers are a wildcard), add the result to the DFA and continue.
//! 3. When SLL ends in a conflict, restart from the decision with the real
//!    call stack (full-context LL). Ties that LL cannot break are reported
//!    as ambiguities and resolved to the lowest alternative.
//!
//! The input is always restored to where prediction started.

use std::sync::Arc;

use crate::atn::{Atn, INVALID_ALT, TOKEN_EOF};
use crate::configs::{AltSet, AtnConfigSet, SemanticContext, SemanticRef};
use crate::context::MergeCache;
use crate::dfa::{Dfa, DfaState, DfaStateId, PredPrediction};
use crate::error::{AtnError, RecognitionError, StateError};
use crate::options::PredictionMode;
use crate::parser::prediction_mode::{
    all_subsets_conflict, all_subsets_equal, alts, conflicting_alt_subsets,
    has_sll_conflict_terminating_prediction, resolves_to_just_one_viable_alt, single_viable_alt,
    unique_alt_of,
};
use crate::parser::{PredictionListener, PredictionStats, RuleContext};
use crate::recognizer::Recognizer;
use crate::shared::SharedDfaCache;
use crate::stream::TokenStream;
use crate::GrammarType;

/// Chooses alternatives at parser decisions.
#[derive(Debug)]
pub struct ParserAtnSimulator {
    shared: Arc<SharedDfaCache>,
    mode: PredictionMode,
    stats: PredictionStats,
}

impl ParserAtnSimulator {
    #[must_use]
    pub fn new(shared: Arc<SharedDfaCache>) -> Self {
        Self::with_mode(shared, PredictionMode::default())
    }

    #[must_use]
    pub fn with_mode(shared: Arc<SharedDfaCache>, mode: PredictionMode) -> Self {
        Self {
            shared,
            mode,
            stats: PredictionStats::default(),
        }
    }

    #[must_use]
    pub const fn prediction_mode(&self) -> PredictionMode {
        self.mode
    }

    pub fn set_prediction_mode(&mut self, mode: PredictionMode) {
        self.mode = mode;
    }

    #[must_use]
    pub fn shared(&self) -> &Arc<SharedDfaCache> {
        &self.shared
    }

    #[must_use]
    pub const fn stats(&self) -> &PredictionStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Discards the DFA of every decision of this grammar.
    pub fn clear_dfa(&self) {
        self.shared.clear();
    }

    /// Renders the DFA of `decision` with token names.
    #[must_use]
    pub fn render_dfa(&self, decision: usize, token_names: &[&str]) -> Option<String> {
        self.shared.dfa(decision).map(|dfa| dfa.render_parser(token_names))
    }

    /// Predicts the alternative (numbered from 1) to take at `decision`,
    /// invoked from the rule stack `outer`.
    pub fn adaptive_predict(
        &mut self,
        input: &mut dyn TokenStream,
        decision: usize,
        outer: &RuleContext,
        recognizer: &mut dyn Recognizer,
        listener: &mut dyn PredictionListener,
    ) -> Result<usize, AtnError> {
        if self.shared.grammar_type() != GrammarType::Parser {
            return Err(StateError::GrammarTypeMismatch { expected: "parser" }.into());
        }
        let shared = self.shared.clone();
        let dfa = shared
            .dfa(decision)
            .ok_or(StateError::UnknownDecision { decision })?;
        let marker = input.mark();
        let start_index = input.index();
        tracing::trace!(decision, start_index, la1 = input.la(1), "adaptive predict");

        let mut prediction = Prediction {
            atn: shared.atn(),
            shared: &shared,
            dfa,
            input: &mut *input,
            outer,
            recognizer,
            listener,
            start_index,
            merge_cache: MergeCache::default(),
            mode: self.mode,
            stats: &mut self.stats,
            used_atn: false,
        };
        let result = prediction.run();

        input.seek(start_index);
        input.release(marker)?;
        result
    }
}

/// State of one `adaptive_predict` call.
pub(super) struct Prediction<'a> {
    pub(super) atn: &'a Atn,
    pub(super) shared: &'a SharedDfaCache,
    pub(super) dfa: &'a Dfa,
    pub(super) input: &'a mut dyn TokenStream,
    pub(super) outer: &'a RuleContext,
    pub(super) recognizer: &'a mut dyn Recognizer,
    pub(super) listener: &'a mut dyn PredictionListener,
    pub(super) start_index: usize,
    pub(super) merge_cache: MergeCache,
    pub(super) mode: PredictionMode,
    pub(super) stats: &'a mut PredictionStats,
    pub(super) used_atn: bool,
}

/// Accept-state fields computed before a DFA state is added.
#[derive(Debug, Default)]
struct Acceptance {
    is_accept_state: bool,
    prediction: usize,
    requires_full_context: bool,
    predicates: Option<Vec<PredPrediction>>,
}

impl Prediction<'_> {
    fn run(&mut self) -> Result<usize, AtnError> {
        self.stats.predictions += 1;
        let s0 = if self.dfa.is_precedence_dfa() {
            self.dfa
                .precedence_start_state(self.recognizer.precedence())
        } else {
            self.dfa.s0()
        };

        let s0 = match s0 {
            Some(s0) => s0,
            None => {
                self.used_atn = true;
                let start = self.dfa.atn_start_state;
                let s0_closure = self.compute_start_state(start, &RuleContext::empty(), false)?;
                if self.dfa.is_precedence_dfa() {
                    let filtered = self.apply_precedence_filter(&s0_closure)?;
                    let s0 = self.add_dfa_state(filtered, Acceptance::default())?;
                    self.dfa
                        .set_precedence_start_state(self.recognizer.precedence(), s0.state_number);
                    s0
                } else {
                    let s0 = self.add_dfa_state(s0_closure, Acceptance::default())?;
                    self.dfa.set_s0(s0.state_number);
                    s0
                }
            }
        };

        let alt = self.exec_atn(s0)?;
        if !self.used_atn {
            self.stats.dfa_hits += 1;
        }
        tracing::trace!(decision = self.dfa.decision, alt, "predicted");
        Ok(alt)
    }

    fn exec_atn(&mut self, s0: Arc<DfaState>) -> Result<usize, AtnError> {
        let decision = self.dfa.decision;
        let mut previous = s0;
        let mut t = self.input.la(1);
        loop {
            let target = match self.existing_target_state(&previous, t) {
                Some(target) => target,
                None => self.compute_target_state(&previous, t)?,
            };
            let Some(d) = target else {
                return self.no_viable_alt(&previous.configs);
            };

            if d.requires_full_context && self.mode != PredictionMode::Sll {
                let mut conflicting_alts = d.configs.conflicting_alts.clone();
                if let Some(predicates) = &d.predicates {
                    let conflict_index = self.input.index();
                    if conflict_index != self.start_index {
                        self.input.seek(self.start_index);
                    }
                    let alts = self.eval_predicates(predicates, true);
                    if alts.len() == 1
                        && let Some(&alt) = alts.first()
                    {
                        return Ok(alt);
                    }
                    conflicting_alts = Some(alts);
                    if conflict_index != self.start_index {
                        self.input.seek(conflict_index);
                    }
                }

                self.used_atn = true;
                self.stats.ll_fallbacks += 1;
                let outer = self.outer;
                let s0_closure = self.compute_start_state(self.dfa.atn_start_state, outer, true)?;
                tracing::debug!(
                    decision,
                    start_index = self.start_index,
                    stop_index = self.input.index(),
                    "attempting full context"
                );
                self.listener.report_attempting_full_context(
                    decision,
                    conflicting_alts.as_ref(),
                    &d.configs,
                    self.start_index,
                    self.input.index(),
                );
                return self.exec_atn_with_full_context(&d, s0_closure);
            }

            if d.is_accept_state {
                let Some(predicates) = &d.predicates else {
                    return Ok(d.prediction as usize);
                };
                self.input.seek(self.start_index);
                let alts = self.eval_predicates(predicates, true);
                return match alts.first() {
                    Some(&alt) => Ok(alt),
                    None => Err(RecognitionError::PredicateFailed {
                        decision,
                        start_index: self.start_index,
                        alts: predicates.iter().map(|p| p.alt).collect(),
                    }
                    .into()),
                };
            }

            previous = d;
            if t != TOKEN_EOF {
                self.input.consume()?;
                t = self.input.la(1);
            }
        }
    }

    /// Cached edge of `previous` on `t`: `Some(None)` is a known dead end.
    fn existing_target_state(
        &self,
        previous: &DfaState,
        t: i32,
    ) -> Option<Option<Arc<DfaState>>> {
        if t > self.atn.max_token_type {
            return None;
        }
        let index = usize::try_from(t + 1).ok()?;
        let (_, state) = self.dfa.edge_target(previous.state_number, index)?;
        Some(state)
    }

    fn compute_target_state(
        &mut self,
        previous: &DfaState,
        t: i32,
    ) -> Result<Option<Arc<DfaState>>, AtnError> {
        self.used_atn = true;
        self.stats.sll_atn_steps += 1;
        let Some(mut reach) = self.compute_reach_set(&previous.configs, t, false)? else {
            self.add_dfa_edge(previous, t, DfaStateId::ERROR);
            return Ok(None);
        };

        let mut acceptance = Acceptance::default();
        let predicted = unique_alt_of(&reach);
        if predicted != INVALID_ALT {
            reach.unique_alt = predicted;
            acceptance.is_accept_state = true;
            acceptance.prediction = predicted;
        } else if has_sll_conflict_terminating_prediction(self.mode, &reach, self.atn)? {
            let conflicting = alts(&conflicting_alt_subsets(&reach));
            acceptance.prediction = conflicting.first().copied().unwrap_or(INVALID_ALT);
            acceptance.requires_full_context = true;
            acceptance.is_accept_state = true;
            tracing::trace!(decision = self.dfa.decision, ?conflicting, "SLL conflict");
            reach.conflicting_alts = Some(conflicting);
        }

        if acceptance.is_accept_state && reach.has_semantic_context {
            self.predicate_dfa_state(&mut acceptance, &reach);
        }

        let d = self.add_dfa_state(reach, acceptance)?;
        self.add_dfa_edge(previous, t, d.state_number);
        Ok(Some(d))
    }

    /// Attaches the predicates guarding the predicted alternatives.
    fn predicate_dfa_state(&self, acceptance: &mut Acceptance, configs: &AtnConfigSet) {
        let num_alts = self
            .atn
            .decision_state(self.dfa.decision)
            .map_or(0, |s| s.num_transitions());
        let alts_to_collect = if configs.unique_alt == INVALID_ALT {
            configs.conflicting_alts.clone().unwrap_or_default()
        } else {
            AltSet::from([configs.unique_alt])
        };
        match preds_for_ambig_alts(&alts_to_collect, configs, num_alts) {
            Some(alt_to_pred) => {
                acceptance.predicates = predicate_predictions(&alts_to_collect, &alt_to_pred);
                acceptance.prediction = INVALID_ALT;
            }
            None => {
                acceptance.prediction = alts_to_collect.first().copied().unwrap_or(INVALID_ALT);
            }
        }
    }

    fn exec_atn_with_full_context(
        &mut self,
        d: &DfaState,
        s0: AtnConfigSet,
    ) -> Result<usize, AtnError> {
        let decision = self.dfa.decision;
        let mut found_exact_ambig = false;
        let mut previous = s0;
        self.input.seek(self.start_index);
        let mut t = self.input.la(1);

        let (predicted, reach) = loop {
            self.stats.ll_atn_steps += 1;
            let Some(mut reach) = self.compute_reach_set(&previous, t, true)? else {
                return self.no_viable_alt(&Arc::new(previous));
            };
            let subsets = conflicting_alt_subsets(&reach);
            reach.unique_alt = unique_alt_of(&reach);
            if reach.unique_alt != INVALID_ALT {
                break (reach.unique_alt, reach);
            }
            if self.mode == PredictionMode::LlExactAmbigDetection {
                if all_subsets_conflict(&subsets) && all_subsets_equal(&subsets) {
                    found_exact_ambig = true;
                    break (single_viable_alt(&subsets), reach);
                }
            } else {
                let alt = resolves_to_just_one_viable_alt(&subsets);
                if alt != INVALID_ALT {
                    break (alt, reach);
                }
            }
            previous = reach;
            if t != TOKEN_EOF {
                self.input.consume()?;
                t = self.input.la(1);
            }
        };

        let stop_index = self.input.index();
        if reach.unique_alt != INVALID_ALT {
            let sll_alt = d
                .configs
                .conflicting_alts
                .as_ref()
                .and_then(|alts| alts.first().copied())
                .unwrap_or(d.prediction as usize);
            if predicted != sll_alt {
                self.stats.context_sensitivities += 1;
                tracing::debug!(decision, predicted, sll_alt, "context sensitivity");
                self.listener.report_context_sensitivity(
                    decision,
                    predicted,
                    &reach,
                    self.start_index,
                    stop_index,
                );
            }
            return Ok(predicted);
        }

        let ambig_alts = reach.alts();
        self.stats.ambiguities += 1;
        tracing::debug!(decision, ?ambig_alts, exact = found_exact_ambig, "ambiguity");
        self.listener.report_ambiguity(
            decision,
            self.start_index,
            stop_index,
            found_exact_ambig,
            &ambig_alts,
            &reach,
        );
        Ok(predicted)
    }

    /// Recovers an alternative from a dead-end set, or fails.
    fn no_viable_alt(&mut self, configs: &Arc<AtnConfigSet>) -> Result<usize, AtnError> {
        let offending_index = self.input.index();
        self.input.seek(self.start_index);
        let alt = self.syn_valid_or_sem_invalid_alt(configs);
        if alt != INVALID_ALT {
            return Ok(alt);
        }
        Err(RecognitionError::NoViableAlt {
            decision: self.dfa.decision,
            start_index: self.start_index,
            offending_index,
            configs: configs.clone(),
        }
        .into())
    }

    /// Among configurations that finished the decision rule, the lowest
    /// alternative whose predicates pass, else the lowest whose predicates
    /// fail.
    fn syn_valid_or_sem_invalid_alt(&mut self, configs: &AtnConfigSet) -> usize {
        let outer = self.outer;
        let mut valid: Option<usize> = None;
        let mut invalid: Option<usize> = None;
        for config in configs {
            let finished = config.reaches_into_outer_context > 0
                || (self.atn.state(config.state).is_rule_stop() && config.context.has_empty_path());
            if !finished {
                continue;
            }
            let passes = config.semantic_context.is_empty()
                || config.semantic_context.eval(self.recognizer, Some(outer));
            let slot = if passes { &mut valid } else { &mut invalid };
            *slot = Some(slot.map_or(config.alt, |alt| alt.min(config.alt)));
        }
        valid.or(invalid).unwrap_or(INVALID_ALT)
    }

    /// Alternatives whose predicates pass. Unless `complete`, stops at the
    /// first.
    fn eval_predicates(&mut self, predicates: &[PredPrediction], complete: bool) -> AltSet {
        let outer = self.outer;
        let mut alts = AltSet::new();
        for pair in predicates {
            if pair.pred.is_empty() || pair.pred.eval(self.recognizer, Some(outer)) {
                alts.insert(pair.alt);
                if !complete {
                    break;
                }
            }
        }
        alts
    }

    fn add_dfa_edge(&self, from: &DfaState, t: i32, to: DfaStateId) {
        if t < TOKEN_EOF || t > self.atn.max_token_type {
            return;
        }
        if let Ok(index) = usize::try_from(t + 1) {
            self.dfa.set_edge(from.state_number, index, to);
        }
    }

    fn add_dfa_state(
        &mut self,
        configs: AtnConfigSet,
        acceptance: Acceptance,
    ) -> Result<Arc<DfaState>, StateError> {
        if let Some(existing) = self.dfa.lookup(&configs) {
            return Ok(existing);
        }
        let mut configs = configs;
        if !configs.is_readonly() {
            configs.optimize_configs(&mut self.shared.context_cache())?;
            configs.set_readonly();
        }
        let mut state = DfaState::new(Arc::new(configs));
        state.is_accept_state = acceptance.is_accept_state;
        state.prediction = acceptance.prediction as i32;
        state.requires_full_context = acceptance.requires_full_context;
        state.predicates = acceptance.predicates;
        Ok(self.dfa.add_state(state))
    }
}

/// The predicate of each alternative in `ambig_alts` (index = alternative),
/// or `None` when none of them is guarded.
fn preds_for_ambig_alts(
    ambig_alts: &AltSet,
    configs: &AtnConfigSet,
    num_alts: usize,
) -> Option<Vec<SemanticRef>> {
    let mut alt_to_pred: Vec<Option<SemanticRef>> = vec![None; num_alts + 1];
    for config in configs {
        if ambig_alts.contains(&config.alt)
            && let Some(slot) = alt_to_pred.get_mut(config.alt)
        {
            *slot = Some(SemanticContext::or(slot.as_ref(), Some(&config.semantic_context)));
        }
    }
    let mut guarded = 0;
    let resolved: Vec<_> = alt_to_pred
        .into_iter()
        .enumerate()
        .map(|(alt, pred)| match pred {
            Some(pred) => {
                if alt > 0 && !pred.is_empty() {
                    guarded += 1;
                }
                pred
            }
            None => SemanticContext::none(),
        })
        .collect();
    (guarded > 0).then_some(resolved)
}

fn predicate_predictions(
    ambig_alts: &AltSet,
    alt_to_pred: &[SemanticRef],
) -> Option<Vec<PredPrediction>> {
    let mut pairs = Vec::new();
    let mut contains_predicate = false;
    for (alt, pred) in alt_to_pred.iter().enumerate().skip(1) {
        if ambig_alts.contains(&alt) {
            pairs.push(PredPrediction {
                pred: pred.clone(),
                alt,
            });
        }
        if !pred.is_empty() {
            contains_predicate = true;
        }
    }
    contains_predicate.then_some(pairs)
}
