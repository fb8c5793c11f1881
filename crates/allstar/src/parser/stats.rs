use std::fmt;

/// Counters kept by one [`ParserAtnSimulator`](super::ParserAtnSimulator).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PredictionStats {
    pub predictions: u64,
    /// Predictions answered entirely from cached DFA edges.
    pub dfa_hits: u64,
    /// Lookahead steps that had to simulate the ATN under SLL.
    pub sll_atn_steps: u64,
    pub ll_fallbacks: u64,
    /// Lookahead steps simulated with full context.
    pub ll_atn_steps: u64,
    pub ambiguities: u64,
    pub context_sensitivities: u64,
}

impl PredictionStats {
    /// Share of predictions served by the DFA alone.
    #[must_use]
    pub fn dfa_hit_rate(&self) -> f64 {
        if self.predictions == 0 {
            return 0.0;
        }
        self.dfa_hits as f64 / self.predictions as f64
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for PredictionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "predictions={} dfa_hits={} sll_steps={} ll_fallbacks={} ll_steps={} ambiguities={} context_sensitivities={}",
            self.predictions,
            self.dfa_hits,
            self.sll_atn_steps,
            self.ll_fallbacks,
            self.ll_atn_steps,
            self.ambiguities,
            self.context_sensitivities
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let mut stats = PredictionStats::default();
        assert_eq!(stats.dfa_hit_rate(), 0.0);
        stats.predictions = 4;
        stats.dfa_hits = 3;
        assert!((stats.dfa_hit_rate() - 0.75).abs() < f64::EPSILON);
        stats.reset();
        assert_eq!(stats, PredictionStats::default());
    }
}
