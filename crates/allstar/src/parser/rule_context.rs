use crate::atn::StateId;

/// The chain of rule invocations leading to the current rule.
///
/// Each entry is the ATN state that invoked a rule, innermost first. The
/// empty context is the start rule called from outside the grammar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RuleContext {
    invoking_states: Vec<StateId>,
}

impl RuleContext {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            invoking_states: Vec::new(),
        }
    }

    /// Context from invoking states, innermost first.
    #[must_use]
    pub const fn new(invoking_states: Vec<StateId>) -> Self {
        Self { invoking_states }
    }

    #[must_use]
    pub fn invoking_states(&self) -> &[StateId] {
        &self.invoking_states
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invoking_states.is_empty()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.invoking_states.len()
    }

    /// Context of the invoked rule when `invoking_state` calls into it.
    #[must_use]
    pub fn enter(&self, invoking_state: StateId) -> Self {
        let mut invoking_states = Vec::with_capacity(self.invoking_states.len() + 1);
        invoking_states.push(invoking_state);
        invoking_states.extend_from_slice(&self.invoking_states);
        Self { invoking_states }
    }

    /// The caller's context, or `None` at the outermost rule.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        (!self.invoking_states.is_empty()).then(|| Self {
            invoking_states: self.invoking_states[1..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_and_parent() {
        let outer = RuleContext::empty();
        let inner = outer.enter(4).enter(9);
        assert_eq!(inner.invoking_states(), &[9, 4]);
        assert_eq!(inner.parent(), Some(RuleContext::new(vec![4])));
        assert_eq!(outer.parent(), None);
        assert_eq!(inner.depth(), 2);
    }
}
