//! Callbacks from the simulators into generated recognizer code.
//!
//! The simulators never interpret predicates or embedded actions themselves;
//! they hand rule and predicate indices to these traits. Every method has a
//! default so a grammar without predicates or actions can use
//! [`DefaultRecognizer`].

use crate::lexer::LexerState;
use crate::parser::RuleContext;
use crate::stream::CharStream;

/// Parser-side callbacks.
pub trait Recognizer {
    /// Rule names indexed by rule number, for diagnostics.
    fn rule_names(&self) -> &[&str] {
        &[]
    }

    /// Evaluates predicate `pred_index` of rule `rule_index`.
    fn sempred(&mut self, ctx: Option<&RuleContext>, rule_index: usize, pred_index: usize) -> bool {
        let _ = (ctx, rule_index, pred_index);
        true
    }

    /// Evaluates a precedence predicate `{precedence >= _p}?`.
    fn precpred(&mut self, ctx: Option<&RuleContext>, precedence: i32) -> bool {
        let _ = ctx;
        precedence >= self.precedence()
    }

    /// Precedence level of the innermost left-recursive rule invocation.
    fn precedence(&self) -> i32 {
        0
    }
}

/// Where a lexer predicate is being evaluated.
pub struct LexerPredicateSite<'a> {
    pub input: &'a dyn CharStream,
    /// Index of the first character of the current token.
    pub token_start: usize,
    pub line: usize,
    pub column: usize,
}

/// Lexer-side callbacks.
pub trait LexerRecognizer {
    fn sempred(&mut self, site: &LexerPredicateSite<'_>, rule_index: usize, pred_index: usize) -> bool {
        let _ = (site, rule_index, pred_index);
        true
    }

    /// Runs embedded action `action_index` of rule `rule_index`.
    fn action(&mut self, state: &mut LexerState, rule_index: usize, action_index: usize) {
        let _ = (state, rule_index, action_index);
    }
}

/// Accepts every predicate and ignores every action.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRecognizer;

impl Recognizer for DefaultRecognizer {}

impl LexerRecognizer for DefaultRecognizer {}

/// A parser recognizer pinned at a fixed precedence level.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecedenceRecognizer {
    pub precedence: i32,
}

impl Recognizer for PrecedenceRecognizer {
    fn precedence(&self) -> i32 {
        self.precedence
    }
}
