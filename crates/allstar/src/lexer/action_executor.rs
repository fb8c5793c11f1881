use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::LexerState;
use crate::atn::LexerAction;
use crate::error::StateError;
use crate::recognizer::LexerRecognizer;
use crate::stream::CharStream;

/// The ordered lexer actions collected while matching one token.
///
/// Executors are immutable and shared between configurations and DFA
/// states; [`append`](Self::append) and
/// [`fix_offset_before_match`](Self::fix_offset_before_match) return new
/// instances.
#[derive(Debug)]
pub struct LexerActionExecutor {
    actions: Vec<LexerAction>,
    hash: u64,
}

impl LexerActionExecutor {
    #[must_use]
    pub fn new(actions: Vec<LexerAction>) -> Self {
        let mut hasher = ahash::AHasher::default();
        actions.hash(&mut hasher);
        Self {
            hash: hasher.finish(),
            actions,
        }
    }

    /// `executor` followed by `action`.
    #[must_use]
    pub fn append(executor: Option<&Arc<Self>>, action: LexerAction) -> Arc<Self> {
        let mut actions = executor.map_or_else(Vec::new, |e| e.actions.clone());
        actions.push(action);
        Arc::new(Self::new(actions))
    }

    /// Pins every position-dependent action that is not yet pinned to
    /// `offset` characters past the token start. Returns `this` unchanged
    /// when nothing needed pinning.
    #[must_use]
    pub fn fix_offset_before_match(this: &Arc<Self>, offset: usize) -> Arc<Self> {
        let needs_fix = this
            .actions
            .iter()
            .any(|a| a.is_position_dependent() && !matches!(a, LexerAction::Indexed { .. }));
        if !needs_fix {
            return this.clone();
        }
        let actions = this
            .actions
            .iter()
            .map(|action| {
                if action.is_position_dependent() && !matches!(action, LexerAction::Indexed { .. }) {
                    LexerAction::Indexed {
                        offset,
                        action: Box::new(action.clone()),
                    }
                } else {
                    action.clone()
                }
            })
            .collect();
        Arc::new(Self::new(actions))
    }

    #[must_use]
    pub fn actions(&self) -> &[LexerAction] {
        &self.actions
    }

    /// Runs the actions for a token that started at `start_index` and ends
    /// at the input's current index. Pinned actions see the input positioned
    /// where they appeared; the input is left at the token end.
    pub fn execute(
        &self,
        state: &mut LexerState,
        recognizer: &mut dyn LexerRecognizer,
        input: &mut dyn CharStream,
        start_index: usize,
    ) -> Result<(), StateError> {
        let stop_index = input.index();
        let mut requires_seek = false;
        for action in &self.actions {
            if let LexerAction::Indexed { offset, .. } = action {
                let index = start_index + offset;
                input.seek(index);
                requires_seek = index != stop_index;
            } else if action.is_position_dependent() {
                input.seek(stop_index);
                requires_seek = false;
            }
            state.position = input.index();
            action.execute(state, recognizer)?;
        }
        if requires_seek {
            input.seek(stop_index);
        }
        state.position = stop_index;
        Ok(())
    }
}

impl PartialEq for LexerActionExecutor {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.actions == other.actions
    }
}

impl Eq for LexerActionExecutor {}

impl Hash for LexerActionExecutor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for LexerActionExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, action) in self.actions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{action}")?;
        }
        Ok(())
    }
}
