//! Diagnostic events raised during adaptive prediction.
//!
//! Events are advisory. They never change the predicted alternative.

use crate::configs::{AltSet, AtnConfigSet};

/// Receives prediction diagnostics. Every method defaults to doing nothing.
pub trait PredictionListener {
    /// SLL prediction hit a conflict and is retrying with full context.
    fn report_attempting_full_context(
        &mut self,
        decision: usize,
        conflicting_alts: Option<&AltSet>,
        configs: &AtnConfigSet,
        start_index: usize,
        stop_index: usize,
    ) {
        let _ = (decision, conflicting_alts, configs, start_index, stop_index);
    }

    /// Full-context prediction chose a different alternative than SLL would
    /// have.
    fn report_context_sensitivity(
        &mut self,
        decision: usize,
        prediction: usize,
        configs: &AtnConfigSet,
        start_index: usize,
        stop_index: usize,
    ) {
        let _ = (decision, prediction, configs, start_index, stop_index);
    }

    /// Full-context prediction could not separate `ambig_alts`; the lowest
    /// of them was chosen.
    fn report_ambiguity(
        &mut self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: &AltSet,
        configs: &AtnConfigSet,
    ) {
        let _ = (decision, start_index, stop_index, exact, ambig_alts, configs);
    }
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl PredictionListener for NoopListener {}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PredictionEvent {
    AttemptingFullContext {
        decision: usize,
        conflicting_alts: Option<AltSet>,
        start_index: usize,
        stop_index: usize,
    },
    ContextSensitivity {
        decision: usize,
        prediction: usize,
        start_index: usize,
        stop_index: usize,
    },
    Ambiguity {
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: AltSet,
    },
}

/// Records every event in order.
#[derive(Debug, Clone, Default)]
pub struct CollectingListener {
    pub events: Vec<PredictionEvent>,
}

impl CollectingListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ambiguities(&self) -> impl Iterator<Item = &PredictionEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, PredictionEvent::Ambiguity { .. }))
    }

    pub fn context_sensitivities(&self) -> impl Iterator<Item = &PredictionEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, PredictionEvent::ContextSensitivity { .. }))
    }

    pub fn full_context_attempts(&self) -> impl Iterator<Item = &PredictionEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, PredictionEvent::AttemptingFullContext { .. }))
    }
}

impl PredictionListener for CollectingListener {
    fn report_attempting_full_context(
        &mut self,
        decision: usize,
        conflicting_alts: Option<&AltSet>,
        _configs: &AtnConfigSet,
        start_index: usize,
        stop_index: usize,
    ) {
        self.events.push(PredictionEvent::AttemptingFullContext {
            decision,
            conflicting_alts: conflicting_alts.cloned(),
            start_index,
            stop_index,
        });
    }

    fn report_context_sensitivity(
        &mut self,
        decision: usize,
        prediction: usize,
        _configs: &AtnConfigSet,
        start_index: usize,
        stop_index: usize,
    ) {
        self.events.push(PredictionEvent::ContextSensitivity {
            decision,
            prediction,
            start_index,
            stop_index,
        });
    }

    fn report_ambiguity(
        &mut self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: &AltSet,
        _configs: &AtnConfigSet,
    ) {
        self.events.push(PredictionEvent::Ambiguity {
            decision,
            start_index,
            stop_index,
            exact,
            ambig_alts: ambig_alts.clone(),
        });
    }
}
