use allstar::atn::builder::AtnBuilder;
use allstar::atn::lexer_action::LexerAction;
use allstar::codec::{
    SERIALIZED_VERSION, decode_words, deserialize, deserialize_words, serialize, serialize_words,
};
use allstar::options::DeserializationOptions;
use allstar::{Atn, AtnStateKind, DeserializeError, GrammarType, IntervalSet, TransitionKind};

/// ```text
/// s : a ('+' a)* EOF ;
/// a : ID | '(' s ')' | ;
/// ```
fn parser_atn() -> Atn {
    const PLUS: i32 = 1;
    const ID: i32 = 2;
    const LPAREN: i32 = 3;
    const RPAREN: i32 = 4;
    let mut g = AtnBuilder::parser(RPAREN);
    let s = g.rule();
    let a = g.rule();

    let first = g.rule_ref(s, a, 0);
    let plus = g.atom(s, PLUS);
    let next = g.rule_ref(s, a, 0);
    let tail = g.sequence(s, vec![plus, next]);
    let tail = g.star(s, vec![tail], true);
    let eof = g.atom(s, -1);
    let body = g.sequence(s, vec![first, tail, eof]);
    g.set_rule_body(s, body);

    let id = g.atom(a, ID);
    let open = g.atom(a, LPAREN);
    let inner = g.rule_ref(a, s, 0);
    let close = g.atom(a, RPAREN);
    let nested = g.sequence(a, vec![open, inner, close]);
    let empty = g.epsilon(a);
    let body = g.block(a, vec![id, nested, empty]);
    g.set_rule_body(a, body);
    g.finish().unwrap()
}

fn lexer_atn() -> Atn {
    let mut g = AtnBuilder::lexer(2);
    let comment_mode = g.mode();
    let word = g.lexer_rule(0, 1);
    let mut letters = IntervalSet::of_range('a' as i32, 'z' as i32);
    letters.add_one(-1);
    let body = g.set(word, letters);
    g.set_rule_body(word, body);

    let open = g.lexer_rule(0, 2);
    let hash = g.atom(open, '#' as i32);
    let push = g.lexer_action(open, LexerAction::PushMode(comment_mode));
    let more = g.lexer_action(open, LexerAction::More);
    let body = g.sequence(open, vec![hash, push, more]);
    g.set_rule_body(open, body);

    let line = g.lexer_rule(comment_mode, 2);
    let text = g.not_set(line, IntervalSet::of('\n' as i32));
    let text = g.star(line, vec![text], true);
    let pop = g.lexer_action(line, LexerAction::PopMode);
    let channel = g.lexer_action(line, LexerAction::Channel(1));
    let body = g.sequence(line, vec![text, pop, channel]);
    g.set_rule_body(line, body);
    g.finish().unwrap()
}

fn assert_same_shape(a: &Atn, b: &Atn) {
    assert_eq!(a.grammar_type, b.grammar_type);
    assert_eq!(a.max_token_type, b.max_token_type);
    assert_eq!(a.states.len(), b.states.len());
    for (x, y) in a.states.iter().zip(&b.states) {
        assert_eq!(x.kind, y.kind, "state {}", x.state_number);
        assert_eq!(x.rule_index, y.rule_index, "state {}", x.state_number);
        assert_eq!(x.transitions(), y.transitions(), "state {}", x.state_number);
    }
    assert_eq!(a.decision_to_state, b.decision_to_state);
    assert_eq!(a.rule_to_start_state, b.rule_to_start_state);
    assert_eq!(a.rule_to_stop_state, b.rule_to_stop_state);
    assert_eq!(a.mode_to_start_state, b.mode_to_start_state);
    assert_eq!(a.lexer_actions, b.lexer_actions);
}

#[test]
fn parser_atn_survives_round_trip() {
    let atn = parser_atn();
    let data = serialize(&atn);
    assert_eq!(&data[..3], &[SERIALIZED_VERSION, GrammarType::Parser.code(), 4]);

    let loaded = deserialize(&data, &DeserializationOptions::default()).unwrap();
    assert_same_shape(&atn, &loaded);
    assert_eq!(serialize(&loaded), data);
    assert_eq!(loaded.num_decisions(), 2);
    for (decision, &state) in loaded.decision_to_state.iter().enumerate() {
        assert_eq!(loaded.state(state).decision, Some(decision));
    }
}

#[test]
fn rule_stop_edges_are_rebuilt() {
    let atn = parser_atn();
    // `a` is called twice from `s`, `s` once from `a`.
    let a_stop = atn.state(atn.rule_to_stop_state[1]);
    assert_eq!(a_stop.transitions().len(), 2);
    let s_stop = atn.state(atn.rule_to_stop_state[0]);
    assert_eq!(s_stop.transitions().len(), 1);
    assert!(
        s_stop
            .transitions()
            .iter()
            .all(|t| matches!(t.kind, TransitionKind::Epsilon { .. }))
    );
}

#[test]
fn lexer_atn_survives_word_round_trip() {
    let atn = lexer_atn();
    let words = serialize_words(&atn).unwrap();
    assert_eq!(decode_words(&words).unwrap(), serialize(&atn));

    let loaded = deserialize_words(&words, &DeserializationOptions::default()).unwrap();
    assert_same_shape(&atn, &loaded);
    assert_eq!(loaded.rule_to_token_type, vec![1, 2, 2]);
    assert_eq!(loaded.lexer_actions.len(), 4);
    assert_eq!(loaded.mode_to_start_state.len(), 2);
    assert!(matches!(
        loaded.state(loaded.mode_to_start_state[1]).kind,
        AtnStateKind::TokensStart
    ));
}

#[test]
fn eof_in_sets_is_preserved() {
    let atn = lexer_atn();
    let loaded = deserialize(&serialize(&atn), &DeserializationOptions::default()).unwrap();
    let has_eof_set = loaded.states.iter().flat_map(|s| s.transitions()).any(|t| {
        matches!(&t.kind, TransitionKind::Set { set } if set.contains(-1) && set.contains('q' as i32))
    });
    assert!(has_eof_set);
}

#[test]
fn bypass_transitions_add_states() {
    let atn = parser_atn();
    let data = serialize(&atn);
    let options = DeserializationOptions {
        verify_atn: true,
        generate_rule_bypass_transitions: true,
    };
    let loaded = deserialize(&data, &options).unwrap();
    assert!(loaded.states.len() > atn.states.len());
    assert_eq!(loaded.max_token_type, atn.max_token_type);
    assert_eq!(loaded.rule_to_token_type, vec![5, 6]);
    assert_eq!(loaded.num_decisions(), atn.num_decisions() + 2);
}

#[test]
fn damaged_input_is_rejected() {
    let data = serialize(&parser_atn());
    let options = DeserializationOptions::default();

    let mut wrong_version = data.clone();
    wrong_version[0] = 3;
    assert_eq!(
        deserialize(&wrong_version, &options).unwrap_err(),
        DeserializeError::UnsupportedVersion {
            found: 3,
            expected: SERIALIZED_VERSION
        }
    );

    for len in [0, 1, 3, data.len() / 2, data.len() - 1] {
        assert!(
            deserialize(&data[..len], &options).is_err(),
            "prefix of length {len} loaded"
        );
    }

    assert!(deserialize_words(&[4, 1, 0x8000], &options).is_err());
}

/// Offset of the serialized rule edge `source -> follow` invoking `rule`.
fn rule_edge_offset(data: &[i32], atn: &Atn, rule: usize) -> usize {
    let (source, follow, start) = atn
        .states
        .iter()
        .flat_map(|s| s.transitions().iter().map(move |t| (s.state_number, t)))
        .find_map(|(source, t)| match t.kind {
            TransitionKind::Rule {
                rule_index,
                follow_state,
                ..
            } if rule_index == rule => Some((source, follow_state, t.target)),
            _ => None,
        })
        .unwrap();
    let edge = [source as i32, follow as i32];
    (0..data.len() - 5)
        .find(|&i| data[i..i + 2] == edge && data[i + 3] == start as i32 && data[i + 4] == rule as i32)
        .unwrap()
}

#[test]
fn rule_references_outside_the_rule_table_are_rejected() {
    let atn = parser_atn();
    let data = serialize(&atn);
    let options = DeserializationOptions::default();
    let offset = rule_edge_offset(&data, &atn, 1);

    let mut unknown_rule = data.clone();
    unknown_rule[offset + 4] = 99;
    assert_eq!(
        deserialize(&unknown_rule, &options).unwrap_err(),
        DeserializeError::IndexOutOfRange {
            what: "rule",
            index: 99
        }
    );
    // also without verification: later walks index rule tables with it
    let unverified = DeserializationOptions {
        verify_atn: false,
        ..options
    };
    assert!(deserialize(&unknown_rule, &unverified).is_err());

    let mut wrong_start = data.clone();
    wrong_start[offset + 4] = 0;
    assert!(matches!(
        deserialize(&wrong_start, &options).unwrap_err(),
        DeserializeError::UnexpectedStateKind { .. }
    ));

    // rule index of the first state
    let mut state_rule = data;
    state_rule[5] = 99;
    assert_eq!(
        deserialize(&state_rule, &options).unwrap_err(),
        DeserializeError::IndexOutOfRange {
            what: "state rule",
            index: 99
        }
    );
}
