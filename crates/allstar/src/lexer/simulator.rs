//! Character-driven ATN simulation for one token at a time.
//!
//! Matching starts from the mode's DFA start state and follows cached edges
//! while they exist. On a miss the simulator computes the reachable
//! configurations from the ATN, adds them as a new DFA state and edge, and
//! continues. Every accepting state seen along the way is remembered; when
//! no configuration survives, the last one wins (maximal munch). Among
//! configurations accepting at the same length, the earliest alternative
//! (the first-declared rule) wins because lexer configuration sets are
//! ordered.

use std::sync::Arc;

use crate::atn::{
    Atn, AtnState, StateId, Transition, TransitionKind, INVALID_ALT, MAX_CHAR_VALUE,
    MIN_CHAR_VALUE, TOKEN_EOF,
};
use crate::configs::{AtnConfig, AtnConfigSet};
use crate::context::{ContextRef, PredictionContext, EMPTY_RETURN_STATE};
use crate::dfa::{Dfa, DfaState, DfaStateId};
use crate::error::{AtnError, RecognitionError, StateError};
use crate::lexer::LexerActionExecutor;
use crate::options::LexerOptions;
use crate::recognizer::{LexerPredicateSite, LexerRecognizer};
use crate::shared::SharedDfaCache;
use crate::stream::CharStream;
use crate::GrammarType;

/// Outcome of matching one token.
#[derive(Debug, Clone)]
pub struct LexerMatch {
    /// Token type of the winning rule, or EOF.
    pub token_type: i32,
    /// Actions to run for the token, with the input positioned at its end.
    pub executor: Option<Arc<LexerActionExecutor>>,
}

#[derive(Debug, Clone, Default)]
struct SimState {
    index: usize,
    line: usize,
    column: usize,
    dfa_state: Option<Arc<DfaState>>,
}

/// Maximal-munch matcher over a lexer ATN.
#[derive(Debug)]
pub struct LexerAtnSimulator {
    shared: Arc<SharedDfaCache>,
    options: LexerOptions,
    start_index: usize,
    line: usize,
    column: usize,
    mode: usize,
    prev_accept: SimState,
}

impl LexerAtnSimulator {
    #[must_use]
    pub fn new(shared: Arc<SharedDfaCache>) -> Self {
        Self::with_options(shared, LexerOptions::default())
    }

    #[must_use]
    pub fn with_options(shared: Arc<SharedDfaCache>, options: LexerOptions) -> Self {
        Self {
            shared,
            options,
            start_index: 0,
            line: 1,
            column: 0,
            mode: 0,
            prev_accept: SimState::default(),
        }
    }

    #[must_use]
    pub fn shared(&self) -> &Arc<SharedDfaCache> {
        &self.shared
    }

    #[must_use]
    pub const fn options(&self) -> &LexerOptions {
        &self.options
    }

    /// 1-based line of the input cursor.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// 0-based column of the input cursor.
    #[must_use]
    pub const fn column(&self) -> usize {
        self.column
    }

    pub fn set_line(&mut self, line: usize) {
        self.line = line;
    }

    pub fn set_column(&mut self, column: usize) {
        self.column = column;
    }

    /// Resets position tracking to the start of a new input.
    pub fn reset(&mut self) {
        self.start_index = 0;
        self.line = 1;
        self.column = 0;
        self.mode = 0;
        self.prev_accept = SimState::default();
    }

    /// Matches one token in `mode` starting at the input cursor. On success
    /// the input is positioned after the token.
    pub fn match_token(
        &mut self,
        input: &mut dyn CharStream,
        mode: usize,
        recognizer: &mut dyn LexerRecognizer,
    ) -> Result<LexerMatch, AtnError> {
        if self.shared.grammar_type() != GrammarType::Lexer {
            return Err(StateError::GrammarTypeMismatch { expected: "lexer" }.into());
        }
        let shared = self.shared.clone();
        let dfa = shared.dfa(mode).ok_or(StateError::UnknownMode { mode })?;
        self.mode = mode;
        let marker = input.mark();
        self.start_index = input.index();
        self.prev_accept = SimState::default();

        let result = match dfa.s0() {
            Some(s0) => self.exec_atn(input, dfa, s0, recognizer),
            None => self.match_atn(input, dfa, recognizer),
        };
        input.release(marker)?;
        result
    }

    fn match_atn(
        &mut self,
        input: &mut dyn CharStream,
        dfa: &Dfa,
        recognizer: &mut dyn LexerRecognizer,
    ) -> Result<LexerMatch, AtnError> {
        let shared = self.shared.clone();
        let atn = shared.atn();
        let start = atn.mode_to_start_state[self.mode];
        tracing::trace!(mode = self.mode, start, "match ATN");

        let mut s0_closure = self.compute_start_state(atn, input, start, recognizer)?;
        let suppress_edge = s0_closure.has_semantic_context;
        s0_closure.has_semantic_context = false;
        let next = self.add_dfa_state(dfa, s0_closure)?;
        if !suppress_edge {
            dfa.set_s0(next.state_number);
        }
        self.exec_atn(input, dfa, next, recognizer)
    }

    fn exec_atn(
        &mut self,
        input: &mut dyn CharStream,
        dfa: &Dfa,
        ds0: Arc<DfaState>,
        recognizer: &mut dyn LexerRecognizer,
    ) -> Result<LexerMatch, AtnError> {
        if ds0.is_accept_state {
            self.capture_sim_state(input, &ds0);
        }
        let mut t = input.la(1);
        let mut s = ds0;
        loop {
            tracing::trace!(state = %s.state_number, symbol = t, "lexer step");
            let target = match self.existing_target_state(dfa, &s, t) {
                Some(target) => target,
                None => self.compute_target_state(input, dfa, &s, t, recognizer)?,
            };
            let Some(target) = target else { break };

            // EOF is never consumed; accepting on it ends the token
            if t != TOKEN_EOF {
                self.consume(input)?;
            }
            if target.is_accept_state {
                self.capture_sim_state(input, &target);
                if t == TOKEN_EOF {
                    break;
                }
            }
            t = input.la(1);
            s = target;
        }
        self.fail_or_accept(input, &s.configs, t)
    }

    /// Cached edge of `s` on `t`: `Some(None)` is a known dead end, `None`
    /// means the edge has not been computed.
    fn existing_target_state(&self, dfa: &Dfa, s: &DfaState, t: i32) -> Option<Option<Arc<DfaState>>> {
        let index = self.options.edge_index(t)?;
        let (_, state) = dfa.edge_target(s.state_number, index)?;
        Some(state)
    }

    fn compute_target_state(
        &mut self,
        input: &mut dyn CharStream,
        dfa: &Dfa,
        s: &DfaState,
        t: i32,
        recognizer: &mut dyn LexerRecognizer,
    ) -> Result<Option<Arc<DfaState>>, AtnError> {
        let shared = self.shared.clone();
        let atn = shared.atn();
        let mut reach = AtnConfigSet::ordered();
        self.reachable_config_set(atn, input, &s.configs, &mut reach, t, recognizer)?;

        if reach.is_empty() {
            if !reach.has_semantic_context {
                self.add_dfa_edge(dfa, s, t, DfaStateId::ERROR);
            }
            return Ok(None);
        }

        let suppress_edge = reach.has_semantic_context;
        reach.has_semantic_context = false;
        let to = self.add_dfa_state(dfa, reach)?;
        if !suppress_edge {
            self.add_dfa_edge(dfa, s, t, to.state_number);
        }
        Ok(Some(to))
    }

    fn fail_or_accept(
        &mut self,
        input: &mut dyn CharStream,
        reach: &Arc<AtnConfigSet>,
        t: i32,
    ) -> Result<LexerMatch, AtnError> {
        if let Some(accept) = self.prev_accept.dfa_state.clone() {
            input.seek(self.prev_accept.index);
            self.line = self.prev_accept.line;
            self.column = self.prev_accept.column;
            return Ok(LexerMatch {
                token_type: accept.prediction,
                executor: accept.lexer_action_executor.clone(),
            });
        }
        if t == TOKEN_EOF && input.index() == self.start_index {
            return Ok(LexerMatch {
                token_type: TOKEN_EOF,
                executor: None,
            });
        }
        Err(RecognitionError::LexerNoViableAlt {
            start_index: self.start_index,
            configs: reach.clone(),
        }
        .into())
    }

    /// Advances every configuration of `closure` over `t` into `reach`.
    fn reachable_config_set(
        &mut self,
        atn: &Atn,
        input: &mut dyn CharStream,
        closure: &AtnConfigSet,
        reach: &mut AtnConfigSet,
        t: i32,
        recognizer: &mut dyn LexerRecognizer,
    ) -> Result<(), AtnError> {
        // once an alternative accepts, its non-greedy configurations stop
        let mut skip_alt = INVALID_ALT;
        for config in closure {
            let current_alt_reached_accept_state = config.alt == skip_alt;
            if current_alt_reached_accept_state && config.passed_through_non_greedy_decision {
                continue;
            }
            tracing::trace!(config = %config, "testing lexer config");
            for transition in atn.state(config.state).transitions() {
                if !transition.matches(t, MIN_CHAR_VALUE, MAX_CHAR_VALUE) {
                    continue;
                }
                let executor = config.lexer_action_executor.as_ref().map(|executor| {
                    LexerActionExecutor::fix_offset_before_match(executor, input.index() - self.start_index)
                });
                let next = derive(atn, config, transition.target, None, Some(executor));
                let treat_eof_as_epsilon = t == TOKEN_EOF;
                if self.closure(
                    atn,
                    input,
                    next,
                    reach,
                    current_alt_reached_accept_state,
                    true,
                    treat_eof_as_epsilon,
                    recognizer,
                )? {
                    skip_alt = config.alt;
                    break;
                }
            }
        }
        Ok(())
    }

    fn compute_start_state(
        &mut self,
        atn: &Atn,
        input: &mut dyn CharStream,
        start: StateId,
        recognizer: &mut dyn LexerRecognizer,
    ) -> Result<AtnConfigSet, AtnError> {
        let mut configs = AtnConfigSet::ordered();
        for (i, transition) in atn.state(start).transitions().iter().enumerate() {
            let config = AtnConfig::new(transition.target, i + 1, PredictionContext::empty());
            self.closure(atn, input, config, &mut configs, false, false, false, recognizer)?;
        }
        Ok(configs)
    }

    /// Adds the epsilon closure of `config` to `configs`. Returns whether the
    /// current alternative reached an accept state.
    #[allow(clippy::too_many_arguments)]
    fn closure(
        &mut self,
        atn: &Atn,
        input: &mut dyn CharStream,
        config: AtnConfig,
        configs: &mut AtnConfigSet,
        mut current_alt_reached_accept_state: bool,
        speculative: bool,
        treat_eof_as_epsilon: bool,
        recognizer: &mut dyn LexerRecognizer,
    ) -> Result<bool, AtnError> {
        let state = atn.state(config.state);
        if state.is_rule_stop() {
            let context = config.context.clone();
            if context.has_empty_path() {
                if context.is_empty() {
                    configs.add(config, None)?;
                    return Ok(true);
                }
                configs.add(
                    config.with_state_and_context(config.state, PredictionContext::empty()),
                    None,
                )?;
                current_alt_reached_accept_state = true;
            }
            if !context.is_empty() {
                for i in 0..context.len() {
                    let return_state = context.return_state(i);
                    if return_state == EMPTY_RETURN_STATE {
                        continue;
                    }
                    let parent = context.parent(i).cloned().unwrap_or_else(PredictionContext::empty);
                    let next = derive(atn, &config, return_state, Some(parent), None);
                    current_alt_reached_accept_state = self.closure(
                        atn,
                        input,
                        next,
                        configs,
                        current_alt_reached_accept_state,
                        speculative,
                        treat_eof_as_epsilon,
                        recognizer,
                    )?;
                }
            }
            return Ok(current_alt_reached_accept_state);
        }

        if !state.only_has_epsilon_transitions()
            && (!current_alt_reached_accept_state || !config.passed_through_non_greedy_decision)
        {
            configs.add(config.clone(), None)?;
        }

        for transition in state.transitions() {
            let next = self.epsilon_target(
                atn,
                input,
                &config,
                state,
                transition,
                configs,
                speculative,
                treat_eof_as_epsilon,
                recognizer,
            )?;
            if let Some(next) = next {
                current_alt_reached_accept_state = self.closure(
                    atn,
                    input,
                    next,
                    configs,
                    current_alt_reached_accept_state,
                    speculative,
                    treat_eof_as_epsilon,
                    recognizer,
                )?;
            }
        }
        Ok(current_alt_reached_accept_state)
    }

    #[allow(clippy::too_many_arguments)]
    fn epsilon_target(
        &mut self,
        atn: &Atn,
        input: &mut dyn CharStream,
        config: &AtnConfig,
        state: &AtnState,
        transition: &Transition,
        configs: &mut AtnConfigSet,
        speculative: bool,
        treat_eof_as_epsilon: bool,
        recognizer: &mut dyn LexerRecognizer,
    ) -> Result<Option<AtnConfig>, AtnError> {
        let target = transition.target;
        let next = match &transition.kind {
            TransitionKind::Rule { follow_state, .. } => {
                let context = PredictionContext::singleton(Some(config.context.clone()), *follow_state);
                Some(derive(atn, config, target, Some(context), None))
            }
            TransitionKind::Precedence { .. } => {
                return Err(StateError::PrecedencePredicateInLexer.into());
            }
            TransitionKind::Predicate {
                rule_index,
                pred_index,
                ..
            } => {
                tracing::trace!(rule = rule_index, pred = pred_index, state = state.state_number, "lexer predicate");
                configs.has_semantic_context = true;
                self.evaluate_predicate(input, *rule_index, *pred_index, speculative, recognizer)?
                    .then(|| derive(atn, config, target, None, None))
            }
            TransitionKind::Action { action_index, .. } => {
                let action = action_index.and_then(|i| atn.lexer_actions.get(i));
                match action {
                    // actions in invoked rules do not run
                    Some(action) if config.context.has_empty_path() => {
                        let executor = LexerActionExecutor::append(
                            config.lexer_action_executor.as_ref(),
                            action.clone(),
                        );
                        Some(derive(atn, config, target, None, Some(Some(executor))))
                    }
                    _ => Some(derive(atn, config, target, None, None)),
                }
            }
            TransitionKind::Epsilon { .. } => Some(derive(atn, config, target, None, None)),
            TransitionKind::Atom { .. } | TransitionKind::Range { .. } | TransitionKind::Set { .. }
                if treat_eof_as_epsilon && transition.matches(TOKEN_EOF, MIN_CHAR_VALUE, MAX_CHAR_VALUE) =>
            {
                Some(derive(atn, config, target, None, None))
            }
            _ => None,
        };
        Ok(next)
    }

    /// Evaluates a lexer predicate. Speculative evaluation happens one
    /// character ahead of the accept decision, so the character is consumed
    /// for the call and the position restored afterwards.
    fn evaluate_predicate(
        &mut self,
        input: &mut dyn CharStream,
        rule_index: usize,
        pred_index: usize,
        speculative: bool,
        recognizer: &mut dyn LexerRecognizer,
    ) -> Result<bool, StateError> {
        if !speculative {
            let site = LexerPredicateSite {
                input: &*input,
                token_start: self.start_index,
                line: self.line,
                column: self.column,
            };
            return Ok(recognizer.sempred(&site, rule_index, pred_index));
        }

        let (saved_line, saved_column, saved_index) = (self.line, self.column, input.index());
        let marker = input.mark();
        if input.la(1) != TOKEN_EOF {
            self.consume(input)?;
        }
        let site = LexerPredicateSite {
            input: &*input,
            token_start: self.start_index,
            line: self.line,
            column: self.column,
        };
        let result = recognizer.sempred(&site, rule_index, pred_index);
        self.line = saved_line;
        self.column = saved_column;
        input.seek(saved_index);
        input.release(marker)?;
        Ok(result)
    }

    fn capture_sim_state(&mut self, input: &dyn CharStream, state: &Arc<DfaState>) {
        self.prev_accept = SimState {
            index: input.index(),
            line: self.line,
            column: self.column,
            dfa_state: Some(state.clone()),
        };
    }

    fn add_dfa_edge(&self, dfa: &Dfa, from: &DfaState, t: i32, to: DfaStateId) {
        if let Some(index) = self.options.edge_index(t) {
            tracing::trace!(from = %from.state_number, to = %to, symbol = t, "lexer DFA edge");
            dfa.set_edge(from.state_number, index, to);
        }
    }

    /// Adds a DFA state for `configs`, or returns the existing equal one.
    fn add_dfa_state(&self, dfa: &Dfa, mut configs: AtnConfigSet) -> Result<Arc<DfaState>, StateError> {
        if let Some(existing) = dfa.lookup(&configs) {
            return Ok(existing);
        }
        let atn = self.shared.atn();
        let accept = configs
            .iter()
            .find(|c| atn.state(c.state).is_rule_stop())
            .map(|c| (c.lexer_action_executor.clone(), atn.state(c.state).rule_index));

        configs.optimize_configs(&mut self.shared.context_cache())?;
        configs.set_readonly();
        let mut state = DfaState::new(Arc::new(configs));
        if let Some((executor, rule_index)) = accept {
            state.is_accept_state = true;
            state.lexer_action_executor = executor;
            state.prediction = atn.rule_to_token_type.get(rule_index).copied().unwrap_or(TOKEN_EOF);
        }
        Ok(dfa.add_state(state))
    }

    /// Consumes one character, tracking line and column.
    pub fn consume(&mut self, input: &mut dyn CharStream) -> Result<(), StateError> {
        if input.la(1) == '\n' as i32 {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        input.consume()
    }

    /// Text matched so far by the current token.
    #[must_use]
    pub fn text(&self, input: &dyn CharStream) -> String {
        input.text(self.start_index, input.index())
    }

    /// Renders the DFA of `mode`.
    #[must_use]
    pub fn render_dfa(&self, mode: usize) -> Option<String> {
        self.shared.dfa(mode).map(|dfa| dfa.render_lexer(&self.options))
    }
}

/// A lexer configuration moved to `target`, optionally with a new stack or
/// executor. Entering a non-greedy decision marks the result.
fn derive(
    atn: &Atn,
    config: &AtnConfig,
    target: StateId,
    context: Option<ContextRef>,
    executor: Option<Option<Arc<LexerActionExecutor>>>,
) -> AtnConfig {
    let target_state = atn.state(target);
    let mut next = config.with_state(target);
    if let Some(context) = context {
        next.context = context;
    }
    if let Some(executor) = executor {
        next.lexer_action_executor = executor;
    }
    next.passed_through_non_greedy_decision = config.passed_through_non_greedy_decision
        || (target_state.is_decision_state() && target_state.non_greedy);
    next
}
