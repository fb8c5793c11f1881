#![no_main]
use std::sync::{Arc, OnceLock};

use allstar::atn::builder::AtnBuilder;
use allstar::atn::lexer_action::LexerAction;
use allstar::lexer::Lexer;
use allstar::recognizer::DefaultRecognizer;
use allstar::shared::SharedDfaCache;
use allstar::stream::CodePointCharStream;
use allstar::IntervalSet;
use libfuzzer_sys::fuzz_target;

/// ID : [a-z]+ ; INT : [0-9]+ ; STR : '"' ~'"'* '"' ; WS : [ \t\n]+ -> skip ;
fn cache() -> Arc<SharedDfaCache> {
    static CACHE: OnceLock<Arc<SharedDfaCache>> = OnceLock::new();
    CACHE
        .get_or_init(|| {
            let mut g = AtnBuilder::lexer(4);
            let id = g.lexer_rule(0, 1);
            let letter = g.range(id, 'a' as i32, 'z' as i32);
            let body = g.plus(id, vec![letter], true);
            g.set_rule_body(id, body);

            let int = g.lexer_rule(0, 2);
            let digit = g.range(int, '0' as i32, '9' as i32);
            let body = g.plus(int, vec![digit], true);
            g.set_rule_body(int, body);

            let string = g.lexer_rule(0, 3);
            let open = g.atom(string, '"' as i32);
            let inner = g.not_set(string, IntervalSet::of('"' as i32));
            let inner = g.star(string, vec![inner], true);
            let close = g.atom(string, '"' as i32);
            let body = g.sequence(string, vec![open, inner, close]);
            g.set_rule_body(string, body);

            let ws = g.lexer_rule(0, 4);
            let mut blank = IntervalSet::of(' ' as i32);
            blank.add_range('\t' as i32, '\n' as i32);
            let blank = g.set(ws, blank);
            let blanks = g.plus(ws, vec![blank], true);
            let skip = g.lexer_action(ws, LexerAction::Skip);
            let body = g.sequence(ws, vec![blanks, skip]);
            g.set_rule_body(ws, body);

            SharedDfaCache::for_lexer(Arc::new(g.finish().expect("fixture grammar loads")))
        })
        .clone()
}

fuzz_target!(|text: &str| {
    let mut lexer = Lexer::new(cache(), CodePointCharStream::new(text), DefaultRecognizer);
    let mut end = 0;
    loop {
        let Ok(token) = lexer.next_token() else {
            return;
        };
        assert!(token.start >= end, "tokens must not overlap");
        end = token.end;
        if token.is_eof() {
            break;
        }
    }
});
