use ahash::RandomState;
use hashbrown::HashMap;

use super::{SERIALIZED_VERSION, encode_words};
use crate::atn::{Atn, AtnStateKind, GrammarType, StateId, TOKEN_EOF, Transition, TransitionKind};
use crate::error::DeserializeError;
use crate::misc::IntervalSet;

/// Writes `atn` in the serialized integer form.
///
/// Derived rule-stop edges are left out, since loading recreates them.
#[must_use]
pub fn serialize(atn: &Atn) -> Vec<i32> {
    let mut data = vec![
        SERIALIZED_VERSION,
        atn.grammar_type.code(),
        atn.max_token_type,
    ];

    let mut non_greedy = Vec::new();
    let mut left_recursive = Vec::new();
    let mut sets: Vec<&IntervalSet> = Vec::new();
    let mut set_index: HashMap<&IntervalSet, usize, RandomState> = HashMap::default();

    data.push(index(atn.states.len()));
    for state in &atn.states {
        if state.kind == AtnStateKind::Invalid {
            data.push(state.kind.type_code());
            continue;
        }
        if state.is_decision_state() && state.non_greedy {
            non_greedy.push(state.state_number);
        }
        if let AtnStateKind::RuleStart {
            is_left_recursive: true,
            ..
        } = state.kind
        {
            left_recursive.push(state.state_number);
        }

        data.push(state.kind.type_code());
        data.push(index(state.rule_index));
        if let AtnStateKind::LoopEnd { loop_back } = state.kind {
            data.push(link(loop_back));
        } else if state.kind.is_block_start() {
            data.push(link(state.kind.end_state()));
        }

        for transition in state.transitions() {
            if let TransitionKind::Set { set } | TransitionKind::NotSet { set } = &transition.kind {
                set_index.entry(set).or_insert_with(|| {
                    sets.push(set);
                    sets.len() - 1
                });
            }
        }
    }

    push_list(&mut data, &non_greedy);
    push_list(&mut data, &left_recursive);

    data.push(index(atn.rule_to_start_state.len()));
    for (rule, &start) in atn.rule_to_start_state.iter().enumerate() {
        data.push(index(start));
        if atn.grammar_type == GrammarType::Lexer {
            data.push(atn.rule_to_token_type.get(rule).copied().unwrap_or(0));
        }
    }

    push_list(&mut data, &atn.mode_to_start_state);

    data.push(index(sets.len()));
    for set in &sets {
        serialize_set(&mut data, set);
    }

    let edges: Vec<_> = atn
        .states
        .iter()
        .filter(|s| s.kind != AtnStateKind::Invalid && !s.is_rule_stop())
        .flat_map(|s| s.transitions().iter().map(move |t| (s.state_number, t)))
        .collect();
    data.push(index(edges.len()));
    for (source, transition) in edges {
        let (target, arg1, arg2, arg3) = edge_args(transition, &set_index);
        data.extend([
            index(source),
            target,
            transition.type_code(),
            arg1,
            arg2,
            arg3,
        ]);
    }

    push_list(&mut data, &atn.decision_to_state);

    if atn.grammar_type == GrammarType::Lexer {
        data.push(index(atn.lexer_actions.len()));
        for action in &atn.lexer_actions {
            let (data1, data2) = action.data();
            data.extend([action.type_code(), data1, data2]);
        }
    }

    tracing::debug!(
        states = atn.states.len(),
        sets = sets.len(),
        values = data.len(),
        "serialized ATN"
    );
    data
}

/// [`serialize`] followed by 16-bit word packing.
pub fn serialize_words(atn: &Atn) -> Result<Vec<u16>, DeserializeError> {
    encode_words(&serialize(atn))
}

/// Indexes beyond `i32` (and [`NO_RULE`](crate::atn::NO_RULE)) become -1.
fn index(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(-1)
}

fn link(state: Option<StateId>) -> i32 {
    state.map_or(-1, index)
}

fn push_list(data: &mut Vec<i32>, states: &[StateId]) {
    data.push(index(states.len()));
    data.extend(states.iter().map(|&s| index(s)));
}

/// EOF is carried by a flag rather than as an interval bound.
fn serialize_set(data: &mut Vec<i32>, set: &IntervalSet) {
    let intervals = set.intervals();
    let contains_eof = set.contains(TOKEN_EOF);
    let eof_only_first = contains_eof && intervals.first().is_some_and(|i| i.b == TOKEN_EOF);
    let count = if eof_only_first {
        intervals.len() - 1
    } else {
        intervals.len()
    };
    data.push(index(count));
    data.push(i32::from(contains_eof));
    for interval in intervals {
        if interval.a == TOKEN_EOF {
            if interval.b == TOKEN_EOF {
                continue;
            }
            data.push(0);
        } else {
            data.push(interval.a);
        }
        data.push(interval.b);
    }
}

/// Serialized target and arguments of an edge. Rule edges store the follow
/// state as their target and the rule start as the first argument.
fn edge_args(
    transition: &Transition,
    set_index: &HashMap<&IntervalSet, usize, RandomState>,
) -> (i32, i32, i32, i32) {
    let target = index(transition.target);
    match &transition.kind {
        TransitionKind::Rule {
            rule_index,
            precedence,
            follow_state,
        } => (index(*follow_state), target, index(*rule_index), *precedence),
        TransitionKind::Precedence { precedence } => (target, *precedence, 0, 0),
        TransitionKind::Predicate {
            rule_index,
            pred_index,
            is_ctx_dependent,
        } => (
            target,
            index(*rule_index),
            index(*pred_index),
            i32::from(*is_ctx_dependent),
        ),
        TransitionKind::Range { from, to } if *from == TOKEN_EOF => (target, 0, *to, 1),
        TransitionKind::Range { from, to } => (target, *from, *to, 0),
        TransitionKind::Atom { label } if *label == TOKEN_EOF => (target, 0, 0, 1),
        TransitionKind::Atom { label } => (target, *label, 0, 0),
        TransitionKind::Action {
            rule_index,
            action_index,
            is_ctx_dependent,
        } => (
            target,
            index(*rule_index),
            action_index.map_or(-1, index),
            i32::from(*is_ctx_dependent),
        ),
        TransitionKind::Set { set } | TransitionKind::NotSet { set } => {
            (target, set_index.get(set).map_or(-1, |&i| index(i)), 0, 0)
        }
        TransitionKind::Epsilon { .. } | TransitionKind::Wildcard => (target, 0, 0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_with_eof_uses_flag() {
        let mut set = IntervalSet::of(TOKEN_EOF);
        set.add_range(3, 5);
        let mut data = Vec::new();
        serialize_set(&mut data, &set);
        assert_eq!(data, vec![1, 1, 3, 5]);
    }

    #[test]
    fn test_eof_range_prefix() {
        let set = IntervalSet::of_range(TOKEN_EOF, 2);
        let mut data = Vec::new();
        serialize_set(&mut data, &set);
        assert_eq!(data, vec![1, 1, 0, 2]);
    }

    #[test]
    fn test_rule_edge_args() {
        let t = Transition::rule(10, 2, 3, 7);
        let sets = HashMap::default();
        assert_eq!(edge_args(&t, &sets), (7, 10, 2, 3));
        assert_eq!(edge_args(&Transition::atom(4, TOKEN_EOF), &sets), (4, 0, 0, 1));
    }
}
