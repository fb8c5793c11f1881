use std::sync::Arc;

use allstar::atn::builder::AtnBuilder;
use allstar::atn::lexer_action::LexerAction;
use allstar::lexer::{HIDDEN, Lexer, Token};
use allstar::recognizer::DefaultRecognizer;
use allstar::shared::SharedDfaCache;
use allstar::stream::CodePointCharStream;
use allstar::{IntervalSet, LexerErrorKind};

const ID: i32 = 1;
const INT: i32 = 2;
const WS: i32 = 3;

fn letters() -> IntervalSet {
    let mut set = IntervalSet::of_range('a' as i32, 'z' as i32);
    set.add_range('A' as i32, 'Z' as i32);
    set
}

/// ```text
/// ID  : [a-zA-Z] [a-zA-Z0-9]* ;
/// INT : [0-9]+ ;
/// WS  : ' '+ -> <ws_action> ;
/// ```
fn simple_lexer(ws_action: LexerAction) -> Arc<SharedDfaCache> {
    let mut g = AtnBuilder::lexer(WS);

    let id = g.lexer_rule(0, ID);
    let first = g.set(id, letters());
    let mut rest = letters();
    rest.add_range('0' as i32, '9' as i32);
    let rest = g.set(id, rest);
    let rest = g.star(id, vec![rest], true);
    let body = g.sequence(id, vec![first, rest]);
    g.set_rule_body(id, body);

    let int = g.lexer_rule(0, INT);
    let digit = g.range(int, '0' as i32, '9' as i32);
    let body = g.plus(int, vec![digit], true);
    g.set_rule_body(int, body);

    let ws = g.lexer_rule(0, WS);
    let space = g.atom(ws, ' ' as i32);
    let spaces = g.plus(ws, vec![space], true);
    let action = g.lexer_action(ws, ws_action);
    let body = g.sequence(ws, vec![spaces, action]);
    g.set_rule_body(ws, body);

    SharedDfaCache::for_lexer(Arc::new(g.finish().unwrap()))
}

fn tokenize(cache: &Arc<SharedDfaCache>, text: &str) -> Vec<Token> {
    Lexer::new(cache.clone(), CodePointCharStream::new(text), DefaultRecognizer)
        .tokenize()
        .unwrap()
}

fn summary(tokens: &[Token]) -> Vec<(i32, &str, usize)> {
    tokens
        .iter()
        .map(|t| (t.token_type, t.text.as_str(), t.start))
        .collect()
}

#[test]
fn tokenizes_identifier_and_number() {
    let cache = simple_lexer(LexerAction::Skip);
    let tokens = tokenize(&cache, "x1 42");
    assert_eq!(
        summary(&tokens),
        vec![(ID, "x1", 0), (INT, "42", 3), (-1, "<EOF>", 5)]
    );
    assert_eq!(tokens[1].column, 3);
    assert_eq!(tokens[1].token_index, 1);
    assert!(cache.state_count() > 0);

    cache.clear();
    assert_eq!(cache.state_count(), 0);
    assert_eq!(tokenize(&cache, "x1 42"), tokens);
}

#[test]
fn warm_dfa_gives_identical_tokens() {
    let cache = simple_lexer(LexerAction::Skip);
    let cold = tokenize(&cache, "abc 123 d4");
    let states = cache.state_count();
    let warm = tokenize(&cache, "abc 123 d4");
    assert_eq!(cold, warm);
    assert_eq!(cache.state_count(), states);
}

#[test]
fn channel_command_keeps_hidden_tokens() {
    let cache = simple_lexer(LexerAction::Channel(HIDDEN));
    let tokens = tokenize(&cache, "a  b");
    assert_eq!(
        summary(&tokens),
        vec![(ID, "a", 0), (WS, "  ", 1), (ID, "b", 3), (-1, "<EOF>", 4)]
    );
    assert_eq!(tokens[1].channel, HIDDEN);
    assert_eq!(tokens[0].channel, 0);
}

#[test]
fn unmatched_input_is_reported_and_skipped() {
    let cache = simple_lexer(LexerAction::Skip);
    let mut lexer = Lexer::new(cache, CodePointCharStream::new("x1 #42"), DefaultRecognizer);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token().unwrap();
        let eof = token.is_eof();
        tokens.push(token);
        if eof {
            break;
        }
    }
    assert_eq!(
        summary(&tokens),
        vec![(ID, "x1", 0), (INT, "42", 4), (-1, "<EOF>", 6)]
    );
    let errors = lexer.take_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, LexerErrorKind::TokenRecognition);
    assert_eq!(errors[0].text, "#");
    assert_eq!(errors[0].span.start, 3);
}

#[test]
fn tokenize_returns_recorded_errors() {
    let cache = simple_lexer(LexerAction::Skip);
    let mut lexer = Lexer::new(cache, CodePointCharStream::new("a%"), DefaultRecognizer);
    let errors = lexer.tokenize().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(lexer.errors().is_empty());
}

#[test]
fn longest_match_wins() {
    // AB : 'ab' ; A : 'a' ;
    let mut g = AtnBuilder::lexer(2);
    let ab = g.lexer_rule(0, 1);
    let body = g.string(ab, "ab");
    g.set_rule_body(ab, body);
    let a = g.lexer_rule(0, 2);
    let body = g.string(a, "a");
    g.set_rule_body(a, body);
    let cache = SharedDfaCache::for_lexer(Arc::new(g.finish().unwrap()));

    assert_eq!(summary(&tokenize(&cache, "ab"))[0], (1, "ab", 0));
    assert_eq!(
        summary(&tokenize(&cache, "aab")),
        vec![(2, "a", 0), (1, "ab", 1), (-1, "<EOF>", 3)]
    );
}

#[test]
fn earlier_rule_wins_a_tie() {
    // IF : 'if' ; NAME : [a-z]+ ;
    let mut g = AtnBuilder::lexer(3);
    let kw = g.lexer_rule(0, 1);
    let body = g.string(kw, "if");
    g.set_rule_body(kw, body);
    let name = g.lexer_rule(0, 2);
    let letter = g.range(name, 'a' as i32, 'z' as i32);
    let body = g.plus(name, vec![letter], true);
    g.set_rule_body(name, body);
    let ws = g.lexer_rule(0, 3);
    let space = g.atom(ws, ' ' as i32);
    let skip = g.lexer_action(ws, LexerAction::Skip);
    let body = g.sequence(ws, vec![space, skip]);
    g.set_rule_body(ws, body);
    let cache = SharedDfaCache::for_lexer(Arc::new(g.finish().unwrap()));

    let tokens = tokenize(&cache, "if iff i");
    assert_eq!(
        summary(&tokens),
        vec![(1, "if", 0), (2, "iff", 3), (2, "i", 7), (-1, "<EOF>", 8)]
    );
}

#[test]
fn mode_commands_switch_rule_sets() {
    const QUOTE: i32 = 1;
    const CHARS: i32 = 2;
    const END: i32 = 3;
    let mut g = AtnBuilder::lexer(END);
    let string_mode = g.mode();

    // QUOTE : '"' -> pushMode(STRING) ;
    let open = g.lexer_rule(0, QUOTE);
    let quote = g.atom(open, '"' as i32);
    let push = g.lexer_action(open, LexerAction::PushMode(string_mode));
    let body = g.sequence(open, vec![quote, push]);
    g.set_rule_body(open, body);

    // mode STRING; CHARS : ~'"'+ ; END : '"' -> popMode ;
    let chars = g.lexer_rule(string_mode, CHARS);
    let other = g.not_set(chars, IntervalSet::of('"' as i32));
    let body = g.plus(chars, vec![other], true);
    g.set_rule_body(chars, body);

    let close = g.lexer_rule(string_mode, END);
    let quote = g.atom(close, '"' as i32);
    let pop = g.lexer_action(close, LexerAction::PopMode);
    let body = g.sequence(close, vec![quote, pop]);
    g.set_rule_body(close, body);

    let cache = SharedDfaCache::for_lexer(Arc::new(g.finish().unwrap()));
    let mut lexer = Lexer::new(cache, CodePointCharStream::new("\"a b\"\""), DefaultRecognizer);
    let tokens = lexer.tokenize().unwrap();
    assert_eq!(
        summary(&tokens),
        vec![
            (QUOTE, "\"", 0),
            (CHARS, "a b", 1),
            (END, "\"", 4),
            (QUOTE, "\"", 5),
            (-1, "<EOF>", 6),
        ]
    );
    assert_eq!(lexer.state().mode_stack(), &[0]);
}

#[test]
fn reset_rewinds_the_input() {
    let cache = simple_lexer(LexerAction::Skip);
    let mut lexer = Lexer::new(cache, CodePointCharStream::new("a 1"), DefaultRecognizer);
    let first = lexer.tokenize().unwrap();
    lexer.reset();
    assert_eq!(lexer.tokenize().unwrap(), first);
}

#[cfg(feature = "parallel")]
#[test]
fn parallel_tokenize_keeps_input_order() {
    use allstar::lexer::parallel::tokenize_all;

    let cache = simple_lexer(LexerAction::Skip);
    let inputs: Vec<String> = (0..32).map(|i| format!("v{i} {i}")).collect();
    let results = tokenize_all(&cache, &inputs, || DefaultRecognizer);
    assert_eq!(results.len(), inputs.len());
    for (i, result) in results.into_iter().enumerate() {
        let tokens = result.unwrap();
        assert_eq!(tokens[0].text, format!("v{i}"));
        assert_eq!(tokens[1].text, i.to_string());
    }
}
