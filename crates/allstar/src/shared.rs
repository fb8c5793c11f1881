//! Per-grammar caches shared by every recognizer instance.
//!
//! A [`SharedDfaCache`] owns the ATN of one grammar, a [`Dfa`] for each of its
//! decisions (parser) or modes (lexer), and the prediction-context interning
//! cache. Create one per grammar, wrap it in an `Arc`, and hand it to every
//! lexer or parser simulator working on that grammar; work done by one
//! instance speeds up all others.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::atn::{Atn, GrammarType};
use crate::context::PredictionContextCache;
use crate::dfa::Dfa;

#[derive(Debug)]
pub struct SharedDfaCache {
    atn: Arc<Atn>,
    dfas: Vec<Dfa>,
    context_cache: Mutex<PredictionContextCache>,
}

impl SharedDfaCache {
    fn with_dfas(atn: Arc<Atn>, dfas: Vec<Dfa>) -> Arc<Self> {
        Arc::new(Self {
            atn,
            dfas,
            context_cache: Mutex::new(PredictionContextCache::new()),
        })
    }

    /// One DFA per decision of a parser ATN.
    #[must_use]
    pub fn for_parser(atn: Arc<Atn>) -> Arc<Self> {
        let dfas = atn
            .decision_to_state
            .iter()
            .enumerate()
            .map(|(decision, &state)| Dfa::new(&atn, decision, state))
            .collect();
        Self::with_dfas(atn, dfas)
    }

    /// One DFA per mode of a lexer ATN.
    #[must_use]
    pub fn for_lexer(atn: Arc<Atn>) -> Arc<Self> {
        let dfas = atn
            .mode_to_start_state
            .iter()
            .enumerate()
            .map(|(mode, &state)| Dfa::new(&atn, mode, state))
            .collect();
        Self::with_dfas(atn, dfas)
    }

    #[must_use]
    pub fn atn(&self) -> &Atn {
        &self.atn
    }

    #[must_use]
    pub fn atn_arc(&self) -> Arc<Atn> {
        self.atn.clone()
    }

    #[must_use]
    pub fn grammar_type(&self) -> GrammarType {
        self.atn.grammar_type
    }

    /// DFA of decision (parser) or mode (lexer) `index`.
    #[must_use]
    pub fn dfa(&self, index: usize) -> Option<&Dfa> {
        self.dfas.get(index)
    }

    #[must_use]
    pub fn dfas(&self) -> &[Dfa] {
        &self.dfas
    }

    /// Locks the prediction-context interning cache.
    pub fn context_cache(&self) -> MutexGuard<'_, PredictionContextCache> {
        self.context_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Discards every cached DFA state and interned context.
    pub fn clear(&self) {
        for dfa in &self.dfas {
            dfa.clear();
        }
        self.context_cache().clear();
        tracing::debug!(dfas = self.dfas.len(), "cleared DFA cache");
    }

    /// Total number of DFA states across all decisions.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.dfas.iter().map(Dfa::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::builder::AtnBuilder;

    #[test]
    fn test_one_dfa_per_decision() {
        let mut builder = AtnBuilder::parser(3);
        let rule = builder.rule();
        let alts: Vec<_> = (1..=3).map(|t| builder.atom(rule, t)).collect();
        let body = builder.block(rule, alts);
        builder.set_rule_body(rule, body);
        let cache = SharedDfaCache::for_parser(Arc::new(builder.finish().unwrap()));
        assert_eq!(cache.dfas().len(), 1);
        assert_eq!(cache.dfa(0).map(|d| d.decision), Some(0));
        assert!(cache.dfa(1).is_none());
        assert_eq!(cache.state_count(), 0);
        cache.clear();
        assert!(cache.context_cache().is_empty());
    }
}
