//! Loading and post-processing of serialized ATNs.

use super::{SERIALIZED_VERSION, decode_words};
use crate::atn::lexer_action::LexerAction;
use crate::atn::transition::{
    ACTION, ATOM, EPSILON, NOT_SET, PRECEDENCE, PREDICATE, RANGE, RULE, SET, WILDCARD,
};
use crate::atn::{
    Atn, AtnState, AtnStateKind, GrammarType, NO_RULE, StateId, TOKEN_EOF, Transition,
    TransitionKind,
};
use crate::error::DeserializeError;
use crate::misc::IntervalSet;
use crate::options::DeserializationOptions;

/// Loads an ATN from its serialized integer form.
///
/// Fails without returning a partial ATN when the data is malformed or, with
/// [`DeserializationOptions::verify_atn`], when a structural check fails.
pub fn deserialize(data: &[i32], options: &DeserializationOptions) -> Result<Atn, DeserializeError> {
    let mut reader = Reader { data, pos: 0 };

    let version = reader.next()?;
    if version != SERIALIZED_VERSION {
        return Err(DeserializeError::UnsupportedVersion {
            found: version,
            expected: SERIALIZED_VERSION,
        });
    }
    let grammar_code = reader.next()?;
    let grammar_type = GrammarType::from_code(grammar_code)
        .ok_or(DeserializeError::InvalidGrammarType { value: grammar_code })?;
    let max_token_type = reader.next()?;
    let mut atn = Atn::new(grammar_type, max_token_type);

    read_states(&mut reader, &mut atn)?;
    read_flags(&mut reader, &mut atn)?;
    read_rules(&mut reader, &mut atn)?;
    read_modes(&mut reader, &mut atn)?;
    let sets = read_sets(&mut reader)?;
    read_edges(&mut reader, &mut atn, &sets)?;
    derive_rule_stop_edges(&mut atn)?;
    link_blocks_and_loops(&mut atn)?;
    read_decisions(&mut reader, &mut atn)?;
    if grammar_type == GrammarType::Lexer {
        read_lexer_actions(&mut reader, &mut atn)?;
    }
    mark_precedence_decisions(&mut atn);

    if options.verify_atn {
        verify(&atn)?;
    }
    if options.generate_rule_bypass_transitions && grammar_type == GrammarType::Parser {
        generate_rule_bypass_transitions(&mut atn)?;
        if options.verify_atn {
            verify(&atn)?;
        }
    }

    tracing::debug!(
        grammar = ?atn.grammar_type,
        states = atn.states.len(),
        rules = atn.num_rules(),
        decisions = atn.num_decisions(),
        "deserialized ATN"
    );
    Ok(atn)
}

/// [`deserialize`] over 16-bit packed words.
pub fn deserialize_words(
    words: &[u16],
    options: &DeserializationOptions,
) -> Result<Atn, DeserializeError> {
    deserialize(&decode_words(words)?, options)
}

struct Reader<'a> {
    data: &'a [i32],
    pos: usize,
}

impl Reader<'_> {
    fn next(&mut self) -> Result<i32, DeserializeError> {
        let value = *self
            .data
            .get(self.pos)
            .ok_or(DeserializeError::UnexpectedEnd { offset: self.pos })?;
        self.pos += 1;
        Ok(value)
    }

    fn next_index(&mut self, what: &'static str) -> Result<usize, DeserializeError> {
        let value = self.next()?;
        usize::try_from(value).map_err(|_| DeserializeError::IndexOutOfRange {
            what,
            index: i64::from(value),
        })
    }

    /// A count that must fit in the remaining input, so corrupt lengths fail
    /// before anything is allocated for them.
    fn next_count(&mut self, what: &'static str) -> Result<usize, DeserializeError> {
        let count = self.next_index(what)?;
        if count > self.data.len() - self.pos.min(self.data.len()) {
            return Err(DeserializeError::UnexpectedEnd {
                offset: self.data.len(),
            });
        }
        Ok(count)
    }

    fn next_state(&mut self, atn: &Atn, what: &'static str) -> Result<StateId, DeserializeError> {
        let state = self.next_index(what)?;
        check_state(atn, state, what)
    }
}

fn check_state(atn: &Atn, state: usize, what: &'static str) -> Result<StateId, DeserializeError> {
    if state < atn.states.len() {
        Ok(state)
    } else {
        Err(DeserializeError::IndexOutOfRange {
            what,
            index: state as i64,
        })
    }
}

fn read_states(reader: &mut Reader<'_>, atn: &mut Atn) -> Result<(), DeserializeError> {
    let num_states = reader.next_count("state count")?;
    let mut links = Vec::new();
    for id in 0..num_states {
        let code = reader.next()?;
        let kind = AtnStateKind::from_type_code(code)
            .ok_or(DeserializeError::InvalidStateType { state: id, value: code })?;
        if kind == AtnStateKind::Invalid {
            atn.add_state(NO_RULE, kind);
            continue;
        }
        let rule = reader.next()?;
        let rule_index = if rule == -1 {
            NO_RULE
        } else {
            usize::try_from(rule).map_err(|_| DeserializeError::IndexOutOfRange {
                what: "rule",
                index: i64::from(rule),
            })?
        };
        let state = atn.add_state(rule_index, kind);
        if matches!(kind, AtnStateKind::LoopEnd { .. }) || kind.is_block_start() {
            links.push((state, reader.next_index("partner state")?));
        }
    }
    for (state, partner) in links {
        check_state(atn, partner, "partner state")?;
        let kind = &mut atn.states[state].kind;
        if matches!(kind, AtnStateKind::LoopEnd { .. }) {
            kind.set_loop_back(partner);
        } else {
            kind.set_end_state(partner);
        }
    }
    Ok(())
}

fn read_flags(reader: &mut Reader<'_>, atn: &mut Atn) -> Result<(), DeserializeError> {
    let num_non_greedy = reader.next_count("non-greedy count")?;
    for _ in 0..num_non_greedy {
        let state = reader.next_state(atn, "non-greedy state")?;
        if !atn.states[state].is_decision_state() {
            return Err(DeserializeError::UnexpectedStateKind {
                state,
                expected: "decision",
            });
        }
        atn.states[state].non_greedy = true;
    }

    let num_precedence = reader.next_count("precedence count")?;
    for _ in 0..num_precedence {
        let state = reader.next_state(atn, "precedence state")?;
        match &mut atn.states[state].kind {
            AtnStateKind::RuleStart {
                is_left_recursive, ..
            } => *is_left_recursive = true,
            _ => {
                return Err(DeserializeError::UnexpectedStateKind {
                    state,
                    expected: "rule start",
                });
            }
        }
    }
    Ok(())
}

fn read_rules(reader: &mut Reader<'_>, atn: &mut Atn) -> Result<(), DeserializeError> {
    let num_rules = reader.next_count("rule count")?;
    for _ in 0..num_rules {
        let start = reader.next_state(atn, "rule start state")?;
        if !matches!(atn.states[start].kind, AtnStateKind::RuleStart { .. }) {
            return Err(DeserializeError::UnexpectedStateKind {
                state: start,
                expected: "rule start",
            });
        }
        atn.rule_to_start_state.push(start);
        if atn.grammar_type == GrammarType::Lexer {
            let token_type = reader.next()?;
            atn.rule_to_token_type.push(token_type);
        }
    }

    if let Some(state) = atn
        .states
        .iter()
        .find(|s| s.rule_index != NO_RULE && s.rule_index >= num_rules)
    {
        return Err(DeserializeError::IndexOutOfRange {
            what: "state rule",
            index: state.rule_index as i64,
        });
    }

    let mut stops: Vec<Option<StateId>> = vec![None; num_rules];
    for state in &atn.states {
        if state.is_rule_stop()
            && let Some(slot) = stops.get_mut(state.rule_index)
        {
            *slot = Some(state.state_number);
        }
    }
    for (rule, stop) in stops.into_iter().enumerate() {
        let start = atn.rule_to_start_state[rule];
        let stop = stop.ok_or(DeserializeError::Verification {
            state: start,
            reason: "rule has no stop state",
        })?;
        atn.rule_to_stop_state.push(stop);
        if let AtnStateKind::RuleStart { stop_state, .. } = &mut atn.states[start].kind {
            *stop_state = Some(stop);
        }
    }
    Ok(())
}

fn read_modes(reader: &mut Reader<'_>, atn: &mut Atn) -> Result<(), DeserializeError> {
    let num_modes = reader.next_count("mode count")?;
    for _ in 0..num_modes {
        let state = reader.next_state(atn, "mode start state")?;
        if atn.states[state].kind != AtnStateKind::TokensStart {
            return Err(DeserializeError::UnexpectedStateKind {
                state,
                expected: "tokens start",
            });
        }
        atn.mode_to_start_state.push(state);
    }
    Ok(())
}

fn read_sets(reader: &mut Reader<'_>) -> Result<Vec<IntervalSet>, DeserializeError> {
    let num_sets = reader.next_count("set count")?;
    let mut sets = Vec::with_capacity(num_sets);
    for _ in 0..num_sets {
        let num_intervals = reader.next_count("interval count")?;
        let mut set = IntervalSet::new();
        if reader.next()? != 0 {
            set.add_one(TOKEN_EOF);
        }
        for _ in 0..num_intervals {
            let a = reader.next()?;
            let b = reader.next()?;
            set.add_range(a, b);
        }
        sets.push(set);
    }
    Ok(sets)
}

fn read_edges(
    reader: &mut Reader<'_>,
    atn: &mut Atn,
    sets: &[IntervalSet],
) -> Result<(), DeserializeError> {
    let num_edges = reader.next_count("edge count")?;
    for _ in 0..num_edges {
        let source = reader.next_state(atn, "edge source")?;
        let target = reader.next_state(atn, "edge target")?;
        let kind = reader.next()?;
        let args = [reader.next()?, reader.next()?, reader.next()?];
        let transition = edge(atn, kind, target, args, sets)?;
        atn.states[source].add_transition(transition);
    }
    Ok(())
}

fn arg_index(value: i32, what: &'static str) -> Result<usize, DeserializeError> {
    usize::try_from(value).map_err(|_| DeserializeError::IndexOutOfRange {
        what,
        index: i64::from(value),
    })
}

fn rule_index(atn: &Atn, value: i32) -> Result<usize, DeserializeError> {
    arg_index(value, "rule")
        .ok()
        .filter(|&rule| rule < atn.num_rules())
        .ok_or(DeserializeError::IndexOutOfRange {
            what: "rule",
            index: i64::from(value),
        })
}

fn edge(
    atn: &Atn,
    kind: i32,
    target: StateId,
    [arg1, arg2, arg3]: [i32; 3],
    sets: &[IntervalSet],
) -> Result<Transition, DeserializeError> {
    let set = |index: i32| {
        arg_index(index, "set").and_then(|i| {
            sets.get(i).cloned().ok_or(DeserializeError::IndexOutOfRange {
                what: "set",
                index: i64::from(index),
            })
        })
    };
    Ok(match kind {
        EPSILON => Transition::epsilon(target),
        RANGE if arg3 != 0 => Transition::range(target, TOKEN_EOF, arg2),
        RANGE => Transition::range(target, arg1, arg2),
        RULE => {
            let rule_start = check_state(atn, arg_index(arg1, "rule start state")?, "rule start state")?;
            let rule = rule_index(atn, arg2)?;
            if atn.rule_to_start_state[rule] != rule_start {
                return Err(DeserializeError::UnexpectedStateKind {
                    state: rule_start,
                    expected: "invoked rule's start",
                });
            }
            Transition::rule(rule_start, rule, arg3, target)
        }
        PREDICATE => Transition::predicate(
            target,
            rule_index(atn, arg1)?,
            arg_index(arg2, "predicate")?,
            arg3 != 0,
        ),
        PRECEDENCE => Transition::precedence(target, arg1),
        ATOM if arg3 != 0 => Transition::atom(target, TOKEN_EOF),
        ATOM => Transition::atom(target, arg1),
        ACTION => Transition {
            target,
            kind: TransitionKind::Action {
                rule_index: rule_index(atn, arg1)?,
                action_index: usize::try_from(arg2).ok(),
                is_ctx_dependent: arg3 != 0,
            },
        },
        SET => Transition::set(target, set(arg1)?),
        NOT_SET => Transition::not_set(target, set(arg1)?),
        WILDCARD => Transition::wildcard(target),
        value => return Err(DeserializeError::InvalidTransitionType { value }),
    })
}

/// Adds the return edges of every rule stop state: one epsilon edge to the
/// follow state of each call of the rule.
fn derive_rule_stop_edges(atn: &mut Atn) -> Result<(), DeserializeError> {
    let mut derived = Vec::new();
    for state in &atn.states {
        for transition in state.transitions() {
            let TransitionKind::Rule {
                precedence,
                follow_state,
                ..
            } = transition.kind
            else {
                continue;
            };
            let rule = atn.states[transition.target].rule_index;
            let stop = *atn
                .rule_to_stop_state
                .get(rule)
                .ok_or(DeserializeError::IndexOutOfRange {
                    what: "rule",
                    index: rule as i64,
                })?;
            let outermost_precedence_return =
                (atn.is_left_recursive(rule) && precedence == 0).then_some(rule);
            derived.push((
                stop,
                Transition {
                    target: follow_state,
                    kind: TransitionKind::Epsilon {
                        outermost_precedence_return,
                    },
                },
            ));
        }
    }
    for (stop, transition) in derived {
        atn.states[stop].add_transition(transition);
    }
    Ok(())
}

/// Points block ends back at their block start, and plus/star loop entries
/// at their loop-back state.
fn link_blocks_and_loops(atn: &mut Atn) -> Result<(), DeserializeError> {
    for id in 0..atn.states.len() {
        let kind = atn.states[id].kind;
        if kind.is_block_start() {
            let end = kind.end_state().ok_or(DeserializeError::Verification {
                state: id,
                reason: "block start without end state",
            })?;
            match &mut atn.states[end].kind {
                AtnStateKind::BlockEnd {
                    start_state: Some(_),
                } => {
                    return Err(DeserializeError::Verification {
                        state: end,
                        reason: "block end shared by two block starts",
                    });
                }
                AtnStateKind::BlockEnd { start_state } => *start_state = Some(id),
                _ => {
                    return Err(DeserializeError::UnexpectedStateKind {
                        state: end,
                        expected: "block end",
                    });
                }
            }
        }

        let loop_entry_matches: fn(&AtnStateKind) -> bool = match kind {
            AtnStateKind::PlusLoopBack => |k| matches!(k, AtnStateKind::PlusBlockStart { .. }),
            AtnStateKind::StarLoopBack => |k| matches!(k, AtnStateKind::StarLoopEntry { .. }),
            _ => continue,
        };
        let targets: Vec<StateId> = atn.states[id]
            .transitions()
            .iter()
            .map(|t| t.target)
            .filter(|&t| loop_entry_matches(&atn.states[t].kind))
            .collect();
        for target in targets {
            atn.states[target].kind.set_loop_back(id);
        }
    }
    Ok(())
}

fn read_decisions(reader: &mut Reader<'_>, atn: &mut Atn) -> Result<(), DeserializeError> {
    let num_decisions = reader.next_count("decision count")?;
    for _ in 0..num_decisions {
        let state = reader.next_state(atn, "decision state")?;
        if !atn.states[state].is_decision_state() {
            return Err(DeserializeError::UnexpectedStateKind {
                state,
                expected: "decision",
            });
        }
        atn.define_decision_state(state);
    }
    Ok(())
}

fn read_lexer_actions(reader: &mut Reader<'_>, atn: &mut Atn) -> Result<(), DeserializeError> {
    let num_actions = reader.next_count("lexer action count")?;
    for _ in 0..num_actions {
        let code = reader.next()?;
        let data1 = reader.next()?;
        let data2 = reader.next()?;
        let action = LexerAction::from_serialized(code, data1, data2)
            .ok_or(DeserializeError::InvalidLexerActionType { value: code })?;
        atn.lexer_actions.push(action);
    }
    Ok(())
}

/// The star-loop entry whose exit branch ends the rule, if `state` is one.
fn is_rule_ending_loop_entry(atn: &Atn, state: &AtnState) -> bool {
    if !matches!(state.kind, AtnStateKind::StarLoopEntry { .. }) {
        return false;
    }
    let Some(maybe_loop_end) = state.transitions().last().map(|t| &atn.states[t.target]) else {
        return false;
    };
    matches!(maybe_loop_end.kind, AtnStateKind::LoopEnd { .. })
        && maybe_loop_end.only_has_epsilon_transitions()
        && maybe_loop_end
            .transition(0)
            .is_some_and(|t| atn.states[t.target].is_rule_stop())
}

/// Flags the star-loop entries of left-recursive rules that decide whether
/// to continue the operator loop. Their DFAs are keyed by precedence.
fn mark_precedence_decisions(atn: &mut Atn) {
    let marked: Vec<StateId> = atn
        .states
        .iter()
        .filter(|s| s.rule_index != NO_RULE && atn.is_left_recursive(s.rule_index))
        .filter(|s| is_rule_ending_loop_entry(atn, s))
        .map(|s| s.state_number)
        .collect();
    for id in marked {
        if let AtnStateKind::StarLoopEntry {
            is_precedence_decision,
            ..
        } = &mut atn.states[id].kind
        {
            *is_precedence_decision = true;
        }
    }
}

fn check(condition: bool, state: StateId, reason: &'static str) -> Result<(), DeserializeError> {
    if condition {
        Ok(())
    } else {
        Err(DeserializeError::Verification { state, reason })
    }
}

/// Structural checks on a loaded ATN.
pub(crate) fn verify(atn: &Atn) -> Result<(), DeserializeError> {
    let target_kind = |state: &AtnState, index: usize| {
        state.transition(index).map(|t| atn.states[t.target].kind)
    };
    for state in &atn.states {
        let id = state.state_number;
        if state.kind == AtnStateKind::Invalid {
            continue;
        }
        check(
            state.only_has_epsilon_transitions() || state.num_transitions() <= 1,
            id,
            "state mixes several consuming transitions",
        )?;

        match state.kind {
            AtnStateKind::PlusBlockStart { loop_back, .. } => {
                check(loop_back.is_some(), id, "plus block start without loop back")?;
            }
            AtnStateKind::StarLoopEntry { loop_back, .. } => {
                check(loop_back.is_some(), id, "star loop entry without loop back")?;
                check(state.num_transitions() == 2, id, "star loop entry needs two transitions")?;
                match (target_kind(state, 0), target_kind(state, 1)) {
                    (Some(AtnStateKind::StarBlockStart { .. }), second) => {
                        check(
                            matches!(second, Some(AtnStateKind::LoopEnd { .. })),
                            id,
                            "greedy star loop must exit through its loop end",
                        )?;
                        check(!state.non_greedy, id, "greedy star loop marked non-greedy")?;
                    }
                    (Some(AtnStateKind::LoopEnd { .. }), second) => {
                        check(
                            matches!(second, Some(AtnStateKind::StarBlockStart { .. })),
                            id,
                            "non-greedy star loop must enter its block second",
                        )?;
                        check(state.non_greedy, id, "non-greedy star loop not marked")?;
                    }
                    _ => {
                        return Err(DeserializeError::Verification {
                            state: id,
                            reason: "star loop entry has unexpected targets",
                        });
                    }
                }
            }
            AtnStateKind::StarLoopBack => {
                check(state.num_transitions() == 1, id, "star loop back needs one transition")?;
                check(
                    matches!(target_kind(state, 0), Some(AtnStateKind::StarLoopEntry { .. })),
                    id,
                    "star loop back must return to its loop entry",
                )?;
            }
            AtnStateKind::LoopEnd { loop_back } => {
                check(loop_back.is_some(), id, "loop end without loop back")?;
            }
            AtnStateKind::RuleStart { stop_state, .. } => {
                check(stop_state.is_some(), id, "rule start without stop state")?;
            }
            AtnStateKind::BlockEnd { start_state } => {
                check(start_state.is_some(), id, "block end without block start")?;
            }
            _ => {}
        }
        if state.kind.is_block_start() {
            check(state.kind.end_state().is_some(), id, "block start without end state")?;
        }

        if state.is_decision_state() {
            check(
                state.num_transitions() <= 1 || state.decision.is_some(),
                id,
                "decision state without decision number",
            )?;
        } else {
            check(
                state.num_transitions() <= 1 || state.is_rule_stop(),
                id,
                "non-decision state with several transitions",
            )?;
        }
    }
    Ok(())
}

/// Lets every rule be matched by a single synthetic token of type
/// `max_token_type + rule + 1`, as used when parsing tree patterns.
fn generate_rule_bypass_transitions(atn: &mut Atn) -> Result<(), DeserializeError> {
    let num_rules = atn.num_rules();
    atn.rule_to_token_type = (0..num_rules)
        .map(|rule| atn.max_token_type + rule as i32 + 1)
        .collect();
    for rule in 0..num_rules {
        generate_rule_bypass_transition(atn, rule)?;
    }
    Ok(())
}

fn generate_rule_bypass_transition(atn: &mut Atn, rule: usize) -> Result<(), DeserializeError> {
    let bypass_start = atn.add_state(rule, AtnStateKind::BlockStart { end_state: None });
    let bypass_stop = atn.add_state(rule, AtnStateKind::BlockEnd {
        start_state: Some(bypass_start),
    });
    atn.states[bypass_start].kind.set_end_state(bypass_stop);
    atn.define_decision_state(bypass_start);

    let rule_start = atn.rule_to_start_state[rule];
    let (end_state, exclude) = if atn.is_left_recursive(rule) {
        let entry = atn
            .states
            .iter()
            .find(|s| s.rule_index == rule && is_rule_ending_loop_entry(atn, s))
            .ok_or(DeserializeError::BypassUnsupported { rule })?;
        let loop_back = entry
            .kind
            .loop_back()
            .ok_or(DeserializeError::BypassUnsupported { rule })?;
        (entry.state_number, Some(loop_back))
    } else {
        (atn.rule_to_stop_state[rule], None)
    };

    // edges into the end of the rule now pass through the bypass block,
    // except the loop back of a left-recursive rule
    for state in &mut atn.states {
        let skip_first = exclude == Some(state.state_number);
        for (i, transition) in state.transitions_mut().iter_mut().enumerate() {
            if skip_first && i == 0 {
                continue;
            }
            if transition.target == end_state {
                transition.target = bypass_stop;
            }
        }
    }

    let mut moved = Vec::new();
    while let Some(transition) = atn.states[rule_start].remove_transition(0) {
        moved.push(transition);
    }
    for transition in moved {
        atn.states[bypass_start].add_transition(transition);
    }

    atn.states[rule_start].add_transition(Transition::epsilon(bypass_start));
    atn.states[bypass_stop].add_transition(Transition::epsilon(end_state));

    let match_state = atn.add_state(rule, AtnStateKind::Basic);
    let token_type = atn.rule_to_token_type[rule];
    atn.states[match_state].add_transition(Transition::atom(bypass_stop, token_type));
    atn.states[bypass_start].add_transition(Transition::epsilon(match_state));
    Ok(())
}
