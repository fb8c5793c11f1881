//! Union of two prediction-context graphs.
//!
//! The result represents every stack of both inputs and reuses input nodes
//! wherever the union does not change them. With `root_is_wildcard` (SLL) the
//! empty stack absorbs everything; otherwise it is kept as an explicit
//! empty-stack slot.

use std::sync::Arc;

use ahash::RandomState;
use hashbrown::HashMap;

use super::{ContextRef, ContextShape, PredictionContext, EMPTY_RETURN_STATE};

/// Pair-keyed memo of merge results, kept for one prediction attempt.
pub type MergeCache = HashMap<(ContextRef, ContextRef), ContextRef, RandomState>;

fn cached(cache: Option<&MergeCache>, a: &ContextRef, b: &ContextRef) -> Option<ContextRef> {
    let cache = cache?;
    cache
        .get(&(a.clone(), b.clone()))
        .or_else(|| cache.get(&(b.clone(), a.clone())))
        .cloned()
}

fn remember(cache: Option<&mut MergeCache>, a: &ContextRef, b: &ContextRef, result: &ContextRef) {
    if let Some(cache) = cache {
        cache.insert((a.clone(), b.clone()), result.clone());
    }
}

/// Merges `a` and `b`. The content of the result does not depend on argument
/// order.
pub fn merge(
    a: &ContextRef,
    b: &ContextRef,
    root_is_wildcard: bool,
    mut cache: Option<&mut MergeCache>,
) -> ContextRef {
    if Arc::ptr_eq(a, b) || a == b {
        return a.clone();
    }
    let a_array = matches!(a.shape(), ContextShape::Array { .. });
    let b_array = matches!(b.shape(), ContextShape::Array { .. });
    if !a_array && !b_array {
        return merge_singletons(a, b, root_is_wildcard, cache);
    }
    if root_is_wildcard {
        if a.is_empty() {
            return a.clone();
        }
        if b.is_empty() {
            return b.clone();
        }
    }
    if let Some(hit) = cached(cache.as_deref(), a, b) {
        return hit;
    }
    merge_arrays(a, b, root_is_wildcard, cache.as_deref_mut())
}

fn merge_parents(
    a: Option<&ContextRef>,
    b: Option<&ContextRef>,
    root_is_wildcard: bool,
    cache: Option<&mut MergeCache>,
) -> Option<ContextRef> {
    match (a, b) {
        (Some(a), Some(b)) => Some(merge(a, b, root_is_wildcard, cache)),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    }
}

fn same_parent(a: Option<&ContextRef>, b: Option<&ContextRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn merge_singletons(
    a: &ContextRef,
    b: &ContextRef,
    root_is_wildcard: bool,
    mut cache: Option<&mut MergeCache>,
) -> ContextRef {
    if let Some(hit) = cached(cache.as_deref(), a, b) {
        return hit;
    }
    if let Some(root) = merge_root(a, b, root_is_wildcard) {
        remember(cache, a, b, &root);
        return root;
    }

    let (a_state, b_state) = (a.return_state(0), b.return_state(0));
    let (a_parent, b_parent) = (a.parent(0), b.parent(0));
    let merged = if a_state == b_state {
        let parent = merge_parents(a_parent, b_parent, root_is_wildcard, cache.as_deref_mut());
        // ax + bx = ax when a's parent already covers both
        if same_parent(parent.as_ref(), a_parent) {
            return a.clone();
        }
        if same_parent(parent.as_ref(), b_parent) {
            return b.clone();
        }
        PredictionContext::singleton(parent, a_state)
    } else {
        let (lo, hi) = if a_state < b_state { (a, b) } else { (b, a) };
        if a_parent.is_some() && a_parent == b_parent {
            // ax + bx = [a,b]x
            let parent = a_parent.cloned();
            PredictionContext::array(
                vec![parent.clone(), parent],
                vec![lo.return_state(0), hi.return_state(0)],
            )
        } else {
            PredictionContext::array(
                vec![lo.parent(0).cloned(), hi.parent(0).cloned()],
                vec![lo.return_state(0), hi.return_state(0)],
            )
        }
    };
    remember(cache, a, b, &merged);
    merged
}

/// Handles the cases where either side is the empty stack.
fn merge_root(a: &ContextRef, b: &ContextRef, root_is_wildcard: bool) -> Option<ContextRef> {
    if root_is_wildcard {
        if a.is_empty() || b.is_empty() {
            return Some(PredictionContext::empty());
        }
        return None;
    }
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Some(PredictionContext::empty()),
        // $ + x = [x,$]
        (true, false) => Some(PredictionContext::array(
            vec![b.parent(0).cloned(), None],
            vec![b.return_state(0), EMPTY_RETURN_STATE],
        )),
        (false, true) => Some(PredictionContext::array(
            vec![a.parent(0).cloned(), None],
            vec![a.return_state(0), EMPTY_RETURN_STATE],
        )),
        (false, false) => None,
    }
}

fn merge_arrays(
    a: &ContextRef,
    b: &ContextRef,
    root_is_wildcard: bool,
    mut cache: Option<&mut MergeCache>,
) -> ContextRef {
    let (a_parents, a_states) = PredictionContext::to_array(a);
    let (b_parents, b_states) = PredictionContext::to_array(b);
    let capacity = a_states.len() + b_states.len();
    let mut parents: Vec<Option<ContextRef>> = Vec::with_capacity(capacity);
    let mut states = Vec::with_capacity(capacity);

    let (mut i, mut j) = (0, 0);
    while i < a_states.len() && j < b_states.len() {
        let (a_parent, b_parent) = (&a_parents[i], &b_parents[j]);
        if a_states[i] == b_states[j] {
            let payload = a_states[i];
            let both_empty = payload == EMPTY_RETURN_STATE && a_parent.is_none() && b_parent.is_none();
            let same = a_parent.is_some() && a_parent == b_parent;
            if both_empty || same {
                parents.push(a_parent.clone());
            } else {
                parents.push(merge_parents(
                    a_parent.as_ref(),
                    b_parent.as_ref(),
                    root_is_wildcard,
                    cache.as_deref_mut(),
                ));
            }
            states.push(payload);
            i += 1;
            j += 1;
        } else if a_states[i] < b_states[j] {
            parents.push(a_parent.clone());
            states.push(a_states[i]);
            i += 1;
        } else {
            parents.push(b_parent.clone());
            states.push(b_states[j]);
            j += 1;
        }
    }
    parents.extend(a_parents[i..].iter().cloned());
    states.extend_from_slice(&a_states[i..]);
    parents.extend(b_parents[j..].iter().cloned());
    states.extend_from_slice(&b_states[j..]);

    if states.len() == 1 {
        let single = PredictionContext::singleton(parents.pop().flatten(), states[0]);
        remember(cache, a, b, &single);
        return single;
    }

    combine_common_parents(&mut parents);
    let merged = PredictionContext::array(parents, states);
    let result = if merged == *a {
        a.clone()
    } else if merged == *b {
        b.clone()
    } else {
        merged
    };
    remember(cache, a, b, &result);
    result
}

/// Makes value-equal parents share one node.
fn combine_common_parents(parents: &mut [Option<ContextRef>]) {
    let mut unique: HashMap<ContextRef, ContextRef, RandomState> = HashMap::default();
    for parent in parents.iter_mut().flatten() {
        let canonical = unique
            .entry(parent.clone())
            .or_insert_with(|| parent.clone())
            .clone();
        *parent = canonical;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(return_states: &[usize]) -> ContextRef {
        // outermost frame last
        return_states
            .iter()
            .rev()
            .fold(PredictionContext::empty(), |parent, &rs| {
                PredictionContext::singleton(Some(parent), rs)
            })
    }

    #[test]
    fn test_equal_singletons_return_input() {
        let a = ctx(&[1, 2]);
        let b = ctx(&[1, 2]);
        let merged = merge(&a, &b, true, None);
        assert!(Arc::ptr_eq(&merged, &a));
    }

    #[test]
    fn test_same_return_state_reuses_original() {
        // a = 5 $, b = 5 3 $ ; SLL merge of parents is $, which is a's parent
        let a = ctx(&[5]);
        let b = ctx(&[5, 3]);
        let merged = merge(&a, &b, true, None);
        assert!(Arc::ptr_eq(&merged, &a));
    }

    #[test]
    fn test_wildcard_absorbs() {
        let a = ctx(&[1]);
        let empty = PredictionContext::empty();
        assert!(merge(&a, &empty, true, None).is_empty());
        assert!(merge(&empty, &a, true, None).is_empty());
    }

    #[test]
    fn test_full_context_keeps_empty_slot() {
        let a = ctx(&[7]);
        let empty = PredictionContext::empty();
        let merged = merge(&empty, &a, false, None);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.return_state(0), 7);
        assert_eq!(merged.return_state(1), EMPTY_RETURN_STATE);
        assert_eq!(merged, merge(&a, &empty, false, None));
    }

    #[test]
    fn test_different_return_states_shared_parent() {
        let parent = ctx(&[9]);
        let a = PredictionContext::singleton(Some(parent.clone()), 4);
        let b = PredictionContext::singleton(Some(parent.clone()), 2);
        let merged = merge(&a, &b, true, None);
        match merged.shape() {
            ContextShape::Array {
                parents,
                return_states,
            } => {
                assert_eq!(return_states, &vec![2, 4]);
                assert!(parents.iter().all(|p| p.as_ref() == Some(&parent)));
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_array_merge_join() {
        let x = ctx(&[1, 10]);
        let y = ctx(&[3, 10]);
        let z = ctx(&[2, 11]);
        let xy = merge(&x, &y, true, None);
        let zy = merge(&z, &y, true, None);
        let mut cache = MergeCache::default();
        let all = merge(&xy, &zy, true, Some(&mut cache));
        assert_eq!(all.len(), 3);
        assert_eq!(
            (0..3).map(|i| all.return_state(i)).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(!cache.is_empty());
        // memoized
        let again = merge(&xy, &zy, true, Some(&mut cache));
        assert!(Arc::ptr_eq(&all, &again));
    }

    #[test]
    fn test_shared_top_merges_parents() {
        let a = ctx(&[4, 1]);
        let b = ctx(&[4, 2]);
        let merged = merge(&a, &b, false, None);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.return_state(0), 4);
        assert_eq!(merged.parent(0).map(|p| p.len()), Some(2));
    }
}
