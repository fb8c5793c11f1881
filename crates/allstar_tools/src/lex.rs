//! Tokenizing text with a serialized lexer ATN.

use std::fmt::Write;
use std::sync::Arc;

use allstar::lexer::{Lexer, Token};
use allstar::options::LexerOptions;
use allstar::recognizer::DefaultRecognizer;
use allstar::shared::SharedDfaCache;
use allstar::stream::CodePointCharStream;
use allstar::{Atn, GrammarType, LexerError};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct LexReport {
    pub tokens: Vec<Token>,
    pub errors: Vec<String>,
    /// Rendered DFA per mode, when requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dfas: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("expected a lexer ATN, found a {found:?} ATN")]
pub struct NotALexer {
    pub found: GrammarType,
}

/// Tokenizes `text` with the default recognizer. Recognition errors are
/// collected into the report; lexing continues past them.
pub fn lex(atn: Arc<Atn>, text: &str, show_dfa: bool) -> Result<LexReport, NotALexer> {
    if atn.grammar_type != GrammarType::Lexer {
        return Err(NotALexer {
            found: atn.grammar_type,
        });
    }
    let cache = SharedDfaCache::for_lexer(atn);
    let mut lexer = Lexer::new(cache.clone(), CodePointCharStream::new(text), DefaultRecognizer);
    let (tokens, errors) = collect(&mut lexer);
    tracing::debug!(
        tokens = tokens.len(),
        errors = errors.len(),
        dfa_states = cache.state_count(),
        "lexed input"
    );

    let options = LexerOptions::default();
    let dfas = if show_dfa {
        cache.dfas().iter().map(|dfa| dfa.render_lexer(&options)).collect()
    } else {
        Vec::new()
    };
    Ok(LexReport {
        tokens,
        errors: errors.iter().map(ToString::to_string).collect(),
        dfas,
    })
}

fn collect(
    lexer: &mut Lexer<CodePointCharStream, DefaultRecognizer>,
) -> (Vec<Token>, Vec<LexerError>) {
    let mut tokens = Vec::new();
    loop {
        match lexer.next_token() {
            Ok(token) => {
                let eof = token.is_eof();
                tokens.push(token);
                if eof {
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "lexing aborted");
                break;
            }
        }
    }
    (tokens, lexer.take_errors())
}

/// One token per line, followed by errors and DFAs.
#[must_use]
pub fn render_text(report: &LexReport) -> String {
    let mut out = String::new();
    for token in &report.tokens {
        let _ = writeln!(out, "{token}");
    }
    for error in &report.errors {
        let _ = writeln!(out, "error: {error}");
    }
    for (mode, dfa) in report.dfas.iter().enumerate() {
        let _ = writeln!(out, "\nmode {mode} DFA:");
        out.push_str(dfa);
    }
    out
}

#[cfg(test)]
mod tests {
    use allstar::atn::builder::AtnBuilder;
    use allstar::atn::lexer_action::LexerAction;

    use super::*;

    fn digits_lexer() -> Arc<Atn> {
        let mut g = AtnBuilder::lexer(2);
        let int = g.lexer_rule(0, 1);
        let digit = g.range(int, '0' as i32, '9' as i32);
        let body = g.plus(int, vec![digit], true);
        g.set_rule_body(int, body);
        let ws = g.lexer_rule(0, 2);
        let space = g.atom(ws, ' ' as i32);
        let skip = g.lexer_action(ws, LexerAction::Skip);
        let body = g.sequence(ws, vec![space, skip]);
        g.set_rule_body(ws, body);
        Arc::new(g.finish().unwrap())
    }

    #[test]
    fn test_lex_with_errors_and_dfa() {
        let report = lex(digits_lexer(), "12 x 3", true).unwrap();
        let texts: Vec<_> = report.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["12", "3", "<EOF>"]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.dfas.len(), 1);
        assert!(report.dfas[0].contains("'1'"));

        let text = render_text(&report);
        assert!(text.contains("error: token recognition error"));
        assert!(text.contains("mode 0 DFA:"));
    }

    #[test]
    fn test_parser_atn_is_rejected() {
        let mut g = AtnBuilder::parser(1);
        let s = g.rule();
        let a = g.atom(s, 1);
        g.set_rule_body(s, a);
        let err = lex(Arc::new(g.finish().unwrap()), "", false).unwrap_err();
        assert_eq!(err.found, GrammarType::Parser);
    }
}
