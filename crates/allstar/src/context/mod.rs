//! # Prediction Contexts
//!
//! A graph-structured stack of rule return states.
//!
//! ## Overview
//!
//! Each node is immutable and shared through [`ContextRef`]. Nodes come in
//! three shapes:
//!
//! - **Empty**: the bottom of the stack. Under SLL prediction it acts as a
//!   wildcard for "any caller"; under full-context prediction it is the real
//!   end of input.
//! - **Singleton**: one return state and its parent.
//! - **Array**: several return states sorted ascending, each with a parent.
//!   A slot holding [`EMPTY_RETURN_STATE`] with no parent stands for the empty
//!   stack and is always last.
//!
//! Equality and hashing are by value with a hash cached at construction, so
//! structurally equal graphs can be recognised and collapsed by
//! [`PredictionContextCache`]. Stacks are combined with [`merge`].

mod cache;
mod merge;

pub use cache::{get_cached_context, PredictionContextCache};
pub use merge::{merge, MergeCache};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::atn::{Atn, StateId};
use crate::error::StateError;
use crate::parser::RuleContext;

pub type ContextRef = Arc<PredictionContext>;

/// Return state paired with the empty stack inside array nodes.
pub const EMPTY_RETURN_STATE: StateId = i32::MAX as StateId;

#[derive(Debug, PartialEq, Eq)]
pub enum ContextShape {
    Empty,
    /// `parent` is `None` only for lookahead walks started without a caller.
    Singleton {
        parent: Option<ContextRef>,
        return_state: StateId,
    },
    Array {
        parents: Vec<Option<ContextRef>>,
        return_states: Vec<StateId>,
    },
}

#[derive(Debug)]
pub struct PredictionContext {
    hash: u64,
    shape: ContextShape,
}

static EMPTY: OnceLock<ContextRef> = OnceLock::new();

fn parent_hash(parent: Option<&ContextRef>) -> u64 {
    parent.map_or(0, |p| p.hash)
}

impl PredictionContext {
    /// The shared empty-stack sentinel.
    #[must_use]
    pub fn empty() -> ContextRef {
        EMPTY
            .get_or_init(|| {
                Arc::new(Self {
                    hash: Self::compute_hash(&[], &[]),
                    shape: ContextShape::Empty,
                })
            })
            .clone()
    }

    /// A single-frame node. `(None, EMPTY_RETURN_STATE)` is the empty stack.
    #[must_use]
    pub fn singleton(parent: Option<ContextRef>, return_state: StateId) -> ContextRef {
        if parent.is_none() && return_state == EMPTY_RETURN_STATE {
            return Self::empty();
        }
        let hash = Self::compute_hash(&[parent_hash(parent.as_ref())], &[return_state]);
        Arc::new(Self {
            hash,
            shape: ContextShape::Singleton {
                parent,
                return_state,
            },
        })
    }

    /// An array node. `return_states` must be sorted ascending with the
    /// empty-stack slot last.
    #[must_use]
    pub fn array(parents: Vec<Option<ContextRef>>, return_states: Vec<StateId>) -> ContextRef {
        debug_assert_eq!(parents.len(), return_states.len());
        debug_assert!(return_states.windows(2).all(|w| w[0] <= w[1]));
        let parent_hashes: Vec<u64> = parents.iter().map(|p| parent_hash(p.as_ref())).collect();
        let hash = Self::compute_hash(&parent_hashes, &return_states);
        Arc::new(Self {
            hash,
            shape: ContextShape::Array {
                parents,
                return_states,
            },
        })
    }

    fn compute_hash(parents: &[u64], return_states: &[StateId]) -> u64 {
        let mut hasher = ahash::AHasher::default();
        parents.len().hash(&mut hasher);
        for (parent, return_state) in parents.iter().zip(return_states) {
            parent.hash(&mut hasher);
            return_state.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// The same stack as an array node (arrays are returned unchanged).
    #[must_use]
    pub fn to_array(this: &ContextRef) -> (Vec<Option<ContextRef>>, Vec<StateId>) {
        match &this.shape {
            ContextShape::Array {
                parents,
                return_states,
            } => (parents.clone(), return_states.clone()),
            _ => (vec![this.parent(0).cloned()], vec![this.return_state(0)]),
        }
    }

    #[must_use]
    pub const fn shape(&self) -> &ContextShape {
        &self.shape
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.shape, ContextShape::Empty)
    }

    /// Number of return states at the top of this node.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.shape {
            ContextShape::Empty | ContextShape::Singleton { .. } => 1,
            ContextShape::Array { return_states, .. } => return_states.len(),
        }
    }

    #[must_use]
    pub fn parent(&self, index: usize) -> Option<&ContextRef> {
        match &self.shape {
            ContextShape::Empty => None,
            ContextShape::Singleton { parent, .. } => parent.as_ref(),
            ContextShape::Array { parents, .. } => parents.get(index)?.as_ref(),
        }
    }

    #[must_use]
    pub fn return_state(&self, index: usize) -> StateId {
        match &self.shape {
            ContextShape::Empty => EMPTY_RETURN_STATE,
            ContextShape::Singleton { return_state, .. } => *return_state,
            ContextShape::Array { return_states, .. } => {
                return_states.get(index).copied().unwrap_or(EMPTY_RETURN_STATE)
            }
        }
    }

    /// Whether one of the represented stacks is the empty stack.
    #[must_use]
    pub fn has_empty_path(&self) -> bool {
        self.return_state(self.len() - 1) == EMPTY_RETURN_STATE
    }

    /// Converts a rule invocation stack into a prediction context: one frame
    /// per invocation, holding the follow state of its rule transition.
    pub fn from_rule_context(atn: &Atn, ctx: &RuleContext) -> Result<ContextRef, StateError> {
        let mut context = Self::empty();
        for &invoking in ctx.invoking_states().iter().rev() {
            let follow = atn
                .follow_state_of_invocation(invoking)
                .ok_or(StateError::InvalidInvokingState { state: invoking })?;
            context = Self::singleton(Some(context), follow);
        }
        Ok(context)
    }

    /// Number of distinct nodes reachable from this one, itself included.
    #[must_use]
    pub fn node_count(this: &ContextRef) -> usize {
        let mut seen: hashbrown::HashSet<*const Self, ahash::RandomState> =
            hashbrown::HashSet::default();
        let mut pending = vec![this.clone()];
        while let Some(node) = pending.pop() {
            if !seen.insert(Arc::as_ptr(&node)) {
                continue;
            }
            for i in 0..node.len() {
                if let Some(parent) = node.parent(i) {
                    pending.push(parent.clone());
                }
            }
        }
        seen.len()
    }
}

impl PartialEq for PredictionContext {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || (self.hash == other.hash && self.shape == other.shape)
    }
}

impl Eq for PredictionContext {}

impl Hash for PredictionContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for PredictionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            ContextShape::Empty => f.write_str("$"),
            ContextShape::Singleton {
                parent,
                return_state,
            } => match parent {
                Some(parent) if !parent.is_empty() => write!(f, "{return_state} {parent}"),
                _ => write!(f, "{return_state}"),
            },
            ContextShape::Array {
                parents,
                return_states,
            } => {
                f.write_str("[")?;
                for (i, (parent, return_state)) in parents.iter().zip(return_states).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if *return_state == EMPTY_RETURN_STATE {
                        f.write_str("$")?;
                        continue;
                    }
                    match parent {
                        Some(parent) if !parent.is_empty() => {
                            write!(f, "{return_state} {parent}")?;
                        }
                        _ => write!(f, "{return_state}")?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_shared() {
        let a = PredictionContext::empty();
        let b = PredictionContext::singleton(None, EMPTY_RETURN_STATE);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.has_empty_path());
        assert_eq!(a.to_string(), "$");
    }

    #[test]
    fn test_value_equality() {
        let root = PredictionContext::empty();
        let a = PredictionContext::singleton(Some(root.clone()), 5);
        let b = PredictionContext::singleton(Some(PredictionContext::empty()), 5);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert_ne!(a, PredictionContext::singleton(Some(root), 6));
    }

    #[test]
    fn test_array_accessors() {
        let root = PredictionContext::empty();
        let x = PredictionContext::singleton(Some(root), 9);
        let arr = PredictionContext::array(vec![Some(x.clone()), None], vec![3, EMPTY_RETURN_STATE]);
        assert_eq!(arr.len(), 2);
        assert_eq!(arr.return_state(0), 3);
        assert!(arr.parent(1).is_none());
        assert!(arr.has_empty_path());
        assert_eq!(arr.to_string(), "[3 9, $]");
        assert_eq!(PredictionContext::node_count(&arr), 3);
    }
}
