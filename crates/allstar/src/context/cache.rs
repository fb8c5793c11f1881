//! Interning of prediction contexts.

use ahash::RandomState;
use hashbrown::{HashMap, HashSet};

use super::{ContextRef, PredictionContext};

/// Long-lived table of canonical context nodes. Once a node has been added,
/// every value-equal node resolves to the same instance.
#[derive(Debug, Default)]
pub struct PredictionContextCache {
    cache: HashSet<ContextRef, RandomState>,
}

impl PredictionContextCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `ctx`, returning the canonical instance.
    pub fn add(&mut self, ctx: &ContextRef) -> ContextRef {
        if ctx.is_empty() {
            return PredictionContext::empty();
        }
        if let Some(existing) = self.cache.get(ctx) {
            return existing.clone();
        }
        self.cache.insert(ctx.clone());
        ctx.clone()
    }

    #[must_use]
    pub fn get(&self, ctx: &ContextRef) -> Option<ContextRef> {
        self.cache.get(ctx).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

/// Rewrites `ctx` bottom-up so every node is the canonical instance from
/// `cache`. `visited` memoizes nodes already rewritten during this pass.
pub fn get_cached_context(
    ctx: &ContextRef,
    cache: &mut PredictionContextCache,
    visited: &mut HashMap<ContextRef, ContextRef, RandomState>,
) -> ContextRef {
    if ctx.is_empty() {
        return ctx.clone();
    }
    if let Some(existing) = visited.get(ctx) {
        return existing.clone();
    }
    if let Some(existing) = cache.get(ctx) {
        visited.insert(ctx.clone(), existing.clone());
        return existing;
    }

    let mut changed = false;
    let mut parents = Vec::with_capacity(ctx.len());
    for i in 0..ctx.len() {
        let original = ctx.parent(i);
        let parent = original.map(|p| get_cached_context(p, cache, visited));
        if let (Some(new), Some(old)) = (&parent, original)
            && !std::sync::Arc::ptr_eq(new, old)
        {
            changed = true;
        }
        parents.push(parent);
    }

    if !changed {
        let canonical = cache.add(ctx);
        visited.insert(ctx.clone(), canonical.clone());
        return canonical;
    }

    let updated = if parents.len() == 1 {
        PredictionContext::singleton(parents.pop().flatten(), ctx.return_state(0))
    } else {
        let return_states = (0..ctx.len()).map(|i| ctx.return_state(i)).collect();
        PredictionContext::array(parents, return_states)
    };
    let canonical = cache.add(&updated);
    visited.insert(updated, canonical.clone());
    visited.insert(ctx.clone(), canonical.clone());
    canonical
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn chain(return_states: &[usize]) -> ContextRef {
        return_states
            .iter()
            .rev()
            .fold(PredictionContext::empty(), |parent, &rs| {
                PredictionContext::singleton(Some(parent), rs)
            })
    }

    #[test]
    fn test_add_returns_first_instance() {
        let mut cache = PredictionContextCache::new();
        let a = chain(&[3, 4]);
        let b = chain(&[3, 4]);
        let first = cache.add(&a);
        let second = cache.add(&b);
        assert!(Arc::ptr_eq(&first, &a));
        assert!(Arc::ptr_eq(&second, &a));
        assert!(cache.add(&PredictionContext::empty()).is_empty());
    }

    #[test]
    fn test_cached_context_shares_subgraphs() {
        let mut cache = PredictionContextCache::new();
        let mut visited = HashMap::default();
        let a = chain(&[1, 2, 3]);
        let canonical_a = get_cached_context(&a, &mut cache, &mut visited);
        assert!(Arc::ptr_eq(&canonical_a, &a));

        let mut visited = HashMap::default();
        let b = chain(&[9, 2, 3]);
        let canonical_b = get_cached_context(&b, &mut cache, &mut visited);
        assert_eq!(canonical_b, b);
        let a_parent = canonical_a.parent(0).unwrap();
        let b_parent = canonical_b.parent(0).unwrap();
        assert!(Arc::ptr_eq(a_parent, b_parent));
    }
}
