//! Runtime options, constructed explicitly and passed to the components that
//! use them.

use crate::atn::{MAX_CHAR_VALUE, MIN_CHAR_VALUE};

/// Options controlling how a serialized ATN is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DeserializationOptions {
    /// Check structural invariants after loading. A failed check aborts the load.
    pub verify_atn: bool,
    /// Append bypass states so a whole rule can be matched by a single token
    /// (parser ATNs only).
    pub generate_rule_bypass_transitions: bool,
}

impl Default for DeserializationOptions {
    fn default() -> Self {
        Self {
            verify_atn: true,
            generate_rule_bypass_transitions: false,
        }
    }
}

/// How the parser simulator resolves SLL conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PredictionMode {
    /// SLL only. Conflicts resolve to the minimum alternative without
    /// consulting the full context.
    Sll,
    /// SLL first, full-context LL on conflict. Stops as soon as a single
    /// alternative remains viable.
    #[default]
    Ll,
    /// Like [`PredictionMode::Ll`] but keeps going until an ambiguity is exact,
    /// so reported ambiguities carry the complete set of alternatives.
    LlExactAmbigDetection,
}

/// Lexer simulator options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LexerOptions {
    /// Lowest character with a cached DFA edge.
    pub min_dfa_edge: i32,
    /// Highest character with a cached DFA edge.
    pub max_dfa_edge: i32,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            min_dfa_edge: 0,
            max_dfa_edge: 127,
        }
    }
}

impl LexerOptions {
    /// Edge slot for `symbol`, or `None` when it never gets a cached edge.
    #[must_use]
    pub const fn edge_index(&self, symbol: i32) -> Option<usize> {
        if symbol < self.min_dfa_edge
            || symbol > self.max_dfa_edge
            || symbol < MIN_CHAR_VALUE
            || symbol > MAX_CHAR_VALUE
        {
            None
        } else {
            Some((symbol - self.min_dfa_edge) as usize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = DeserializationOptions::default();
        assert!(opts.verify_atn);
        assert!(!opts.generate_rule_bypass_transitions);
        assert_eq!(PredictionMode::default(), PredictionMode::Ll);
    }

    #[test]
    fn test_lexer_edge_range() {
        let opts = LexerOptions::default();
        assert_eq!(opts.edge_index(0), Some(0));
        assert_eq!(opts.edge_index(127), Some(127));
        assert_eq!(opts.edge_index(128), None);
        assert_eq!(opts.edge_index(-1), None);
    }
}
