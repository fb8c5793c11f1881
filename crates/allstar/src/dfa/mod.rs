//! # DFA Cache
//!
//! Lazily built deterministic automata over ATN configuration sets.
//!
//! ## Overview
//!
//! Every parser decision and every lexer mode owns one [`Dfa`]. Its states
//! are frozen [`AtnConfigSet`]s; an edge records which state a given input
//! symbol led to last time. Prediction walks these edges first and only
//! falls back to the ATN simulators when an edge is missing.
//!
//! The state table and its edges sit behind one mutex per DFA, so a DFA can
//! be shared between threads that tokenize or parse different inputs.
//! Individual [`DfaState`]s are immutable once added and are handed out as
//! `Arc`s.
//!
//! A *precedence DFA* belongs to the loop-entry decision of a
//! left-recursive rule. Its start state depends on the precedence level of
//! the rule invocation, so it keeps one start state per level instead of a
//! single `s0`.

mod render;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ahash::RandomState;
use hashbrown::HashMap;

use crate::atn::{Atn, AtnStateKind, StateId};
use crate::configs::{AtnConfigSet, SemanticRef};
use crate::lexer::LexerActionExecutor;

/// Index of a state in its DFA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DfaStateId(pub u32);

impl DfaStateId {
    /// Edge target meaning "no viable continuation".
    pub const ERROR: Self = Self(u32::MAX);

    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 == u32::MAX
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DfaStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            f.write_str("ERROR")
        } else {
            write!(f, "s{}", self.0)
        }
    }
}

/// A predicate guarding one alternative of an accepting parser state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredPrediction {
    pub pred: SemanticRef,
    pub alt: usize,
}

impl fmt::Display for PredPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.pred, self.alt)
    }
}

#[derive(Debug, Clone)]
pub struct DfaState {
    /// Assigned when the state is added to its DFA.
    pub state_number: DfaStateId,
    pub configs: Arc<AtnConfigSet>,
    pub is_accept_state: bool,
    /// Token type (lexer) or alternative (parser) of an accepting state.
    pub prediction: i32,
    pub lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    /// SLL found a conflict here; prediction must retry with full context.
    pub requires_full_context: bool,
    /// Predicates to evaluate, in alternative order, before accepting.
    pub predicates: Option<Vec<PredPrediction>>,
}

impl DfaState {
    #[must_use]
    pub fn new(configs: Arc<AtnConfigSet>) -> Self {
        Self {
            state_number: DfaStateId::ERROR,
            configs,
            is_accept_state: false,
            prediction: 0,
            lexer_action_executor: None,
            requires_full_context: false,
            predicates: None,
        }
    }
}

impl fmt::Display for DfaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.state_number, self.configs)?;
        if self.is_accept_state {
            f.write_str("=>")?;
            match &self.predicates {
                Some(preds) => {
                    f.write_str("[")?;
                    for (i, pred) in preds.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{pred}")?;
                    }
                    f.write_str("]")?;
                }
                None => write!(f, "{}", self.prediction)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct DfaTable {
    states: Vec<Arc<DfaState>>,
    edges: Vec<Vec<Option<DfaStateId>>>,
    index: HashMap<Arc<AtnConfigSet>, DfaStateId, RandomState>,
    s0: Option<DfaStateId>,
    precedence_start: Vec<Option<DfaStateId>>,
}

/// The cached automaton of one decision or lexer mode.
#[derive(Debug)]
pub struct Dfa {
    pub decision: usize,
    pub atn_start_state: StateId,
    precedence_dfa: bool,
    table: Mutex<DfaTable>,
}

impl Dfa {
    /// A DFA for the decision (or lexer mode) whose ATN entry is `start_state`.
    #[must_use]
    pub fn new(atn: &Atn, decision: usize, start_state: StateId) -> Self {
        let precedence_dfa = matches!(
            atn.state(start_state).kind,
            AtnStateKind::StarLoopEntry {
                is_precedence_decision: true,
                ..
            }
        );
        Self {
            decision,
            atn_start_state: start_state,
            precedence_dfa,
            table: Mutex::new(DfaTable::default()),
        }
    }

    fn table(&self) -> MutexGuard<'_, DfaTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub const fn is_precedence_dfa(&self) -> bool {
        self.precedence_dfa
    }

    #[must_use]
    pub fn s0(&self) -> Option<Arc<DfaState>> {
        let table = self.table();
        table.s0.map(|id| table.states[id.index()].clone())
    }

    pub fn set_s0(&self, id: DfaStateId) {
        self.table().s0 = Some(id);
    }

    /// Start state for invocations at `precedence`, in a precedence DFA.
    #[must_use]
    pub fn precedence_start_state(&self, precedence: i32) -> Option<Arc<DfaState>> {
        let table = self.table();
        let level = usize::try_from(precedence).ok()?;
        let id = (*table.precedence_start.get(level)?)?;
        Some(table.states[id.index()].clone())
    }

    pub fn set_precedence_start_state(&self, precedence: i32, id: DfaStateId) {
        let Ok(level) = usize::try_from(precedence) else {
            return;
        };
        let mut table = self.table();
        if table.precedence_start.len() <= level {
            table.precedence_start.resize(level + 1, None);
        }
        table.precedence_start[level] = Some(id);
    }

    /// Cached target of `from` on edge `index`. `Some(DfaStateId::ERROR)`
    /// records a known dead end.
    #[must_use]
    pub fn edge(&self, from: DfaStateId, index: usize) -> Option<DfaStateId> {
        let table = self.table();
        table.edges.get(from.index())?.get(index).copied().flatten()
    }

    /// Like [`edge`](Self::edge), but resolves the target state.
    #[must_use]
    pub fn edge_target(&self, from: DfaStateId, index: usize) -> Option<(DfaStateId, Option<Arc<DfaState>>)> {
        let table = self.table();
        let target = table.edges.get(from.index())?.get(index).copied().flatten()?;
        let state = (!target.is_error()).then(|| table.states[target.index()].clone());
        Some((target, state))
    }

    pub fn set_edge(&self, from: DfaStateId, index: usize, to: DfaStateId) {
        if from.is_error() {
            return;
        }
        let mut table = self.table();
        let Some(edges) = table.edges.get_mut(from.index()) else {
            return;
        };
        if edges.len() <= index {
            edges.resize(index + 1, None);
        }
        edges[index] = Some(to);
    }

    /// The state already holding `configs`, if any.
    #[must_use]
    pub fn lookup(&self, configs: &AtnConfigSet) -> Option<Arc<DfaState>> {
        let table = self.table();
        let id = *table.index.get(configs)?;
        Some(table.states[id.index()].clone())
    }

    /// Adds `state` unless an equal configuration set is already present,
    /// and returns the state the table holds.
    pub fn add_state(&self, mut state: DfaState) -> Arc<DfaState> {
        let mut table = self.table();
        if let Some(&id) = table.index.get(state.configs.as_ref()) {
            return table.states[id.index()].clone();
        }
        let id = DfaStateId(u32::try_from(table.states.len()).unwrap_or(u32::MAX - 1));
        state.state_number = id;
        let state = Arc::new(state);
        table.index.insert(state.configs.clone(), id);
        table.states.push(state.clone());
        table.edges.push(Vec::new());
        tracing::trace!(decision = self.decision, state = %id, "new DFA state");
        state
    }

    #[must_use]
    pub fn state(&self, id: DfaStateId) -> Option<Arc<DfaState>> {
        self.table().states.get(id.index()).cloned()
    }

    /// States in creation order.
    #[must_use]
    pub fn states(&self) -> Vec<Arc<DfaState>> {
        self.table().states.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table().states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table().states.is_empty()
    }

    /// Discards every state and edge.
    pub fn clear(&self) {
        *self.table() = DfaTable::default();
    }

    fn edges_snapshot(&self) -> Vec<(Arc<DfaState>, Vec<Option<DfaStateId>>)> {
        let table = self.table();
        table
            .states
            .iter()
            .cloned()
            .zip(table.edges.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::builder::AtnBuilder;
    use crate::configs::AtnConfig;
    use crate::context::PredictionContext;

    fn frozen(state: StateId, alt: usize) -> Arc<AtnConfigSet> {
        let mut set = AtnConfigSet::new(false);
        set.add(AtnConfig::new(state, alt, PredictionContext::empty()), None)
            .unwrap();
        set.set_readonly();
        Arc::new(set)
    }

    fn dfa() -> Dfa {
        let mut builder = AtnBuilder::parser(2);
        let rule = builder.rule();
        let a = builder.atom(rule, 1);
        let b = builder.atom(rule, 2);
        let body = builder.block(rule, vec![a, b]);
        builder.set_rule_body(rule, body);
        let atn = builder.finish().unwrap();
        let start = atn.decision_to_state[0];
        Dfa::new(&atn, 0, start)
    }

    #[test]
    fn test_add_state_dedupes_by_configs() {
        let dfa = dfa();
        let first = dfa.add_state(DfaState::new(frozen(3, 1)));
        let second = dfa.add_state(DfaState::new(frozen(3, 1)));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.state_number, DfaStateId(0));
        let other = dfa.add_state(DfaState::new(frozen(4, 1)));
        assert_eq!(other.state_number, DfaStateId(1));
        assert!(dfa.lookup(&frozen(4, 1)).is_some());
    }

    #[test]
    fn test_edges_and_clear() {
        let dfa = dfa();
        let s0 = dfa.add_state(DfaState::new(frozen(3, 1)));
        let s1 = dfa.add_state(DfaState::new(frozen(4, 2)));
        dfa.set_s0(s0.state_number);
        dfa.set_edge(s0.state_number, 5, s1.state_number);
        dfa.set_edge(s0.state_number, 2, DfaStateId::ERROR);
        assert_eq!(dfa.edge(s0.state_number, 5), Some(s1.state_number));
        assert_eq!(dfa.edge(s0.state_number, 2), Some(DfaStateId::ERROR));
        assert_eq!(dfa.edge(s0.state_number, 3), None);
        assert_eq!(dfa.edge(s1.state_number, 5), None);
        assert!(!dfa.is_precedence_dfa());

        dfa.clear();
        assert!(dfa.s0().is_none());
        assert!(dfa.is_empty());
    }

    #[test]
    fn test_precedence_start_states() {
        let dfa = dfa();
        let s = dfa.add_state(DfaState::new(frozen(3, 1)));
        dfa.set_precedence_start_state(2, s.state_number);
        assert!(dfa.precedence_start_state(2).is_some());
        assert!(dfa.precedence_start_state(1).is_none());
        assert!(dfa.precedence_start_state(9).is_none());
        assert!(dfa.precedence_start_state(-1).is_none());
    }
}
