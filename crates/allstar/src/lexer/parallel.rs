//! Tokenizing many inputs at once.

use std::sync::Arc;

use rayon::prelude::*;

use super::{Lexer, Token};
use crate::error::LexerError;
use crate::recognizer::LexerRecognizer;
use crate::shared::SharedDfaCache;
use crate::stream::CodePointCharStream;

/// Tokenizes every input on the rayon pool. All lexers share `shared`, so
/// DFA states built for one input are reused by the others. Results keep
/// the order of `inputs`.
pub fn tokenize_all<S, R, F>(
    shared: &Arc<SharedDfaCache>,
    inputs: &[S],
    make_recognizer: F,
) -> Vec<Result<Vec<Token>, Vec<LexerError>>>
where
    S: AsRef<str> + Sync,
    R: LexerRecognizer,
    F: Fn() -> R + Sync,
{
    inputs
        .par_iter()
        .map(|text| {
            let input = CodePointCharStream::new(text.as_ref());
            Lexer::new(shared.clone(), input, make_recognizer()).tokenize()
        })
        .collect()
}
