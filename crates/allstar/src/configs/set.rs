use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use ahash::RandomState;
use hashbrown::{HashMap, HashSet};

use super::{AltSet, AtnConfig, SemanticRef};
use crate::atn::{StateId, INVALID_ALT};
use crate::context::{get_cached_context, merge, MergeCache, PredictionContextCache};
use crate::error::StateError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConfigKey {
    /// Parser sets: one entry per state, alternative and predicate.
    Merged(StateId, usize, SemanticRef),
    /// Lexer sets: one entry per distinct configuration.
    Exact(AtnConfig),
}

/// Insertion-ordered set of configurations reached at one prediction step.
///
/// Parser sets merge the stacks of configurations sharing state, alternative
/// and predicate. Lexer sets ([`AtnConfigSet::ordered`]) keep every distinct
/// configuration, since their order encodes rule priority. Once
/// [`set_readonly`](Self::set_readonly) has been called the set is frozen and
/// its lookup index is dropped.
#[derive(Debug, Clone)]
pub struct AtnConfigSet {
    configs: Vec<AtnConfig>,
    lookup: Option<HashMap<ConfigKey, usize, RandomState>>,
    ordered: bool,
    full_ctx: bool,
    readonly: bool,
    cached_hash: OnceLock<u64>,
    /// Some configuration carries a non-trivial predicate.
    pub has_semantic_context: bool,
    /// Some configuration left the decision rule through the wildcard stack.
    pub dips_into_outer_context: bool,
    /// The single predicted alternative, or [`INVALID_ALT`].
    pub unique_alt: usize,
    pub conflicting_alts: Option<AltSet>,
}

impl Default for AtnConfigSet {
    fn default() -> Self {
        Self::new(false)
    }
}

impl AtnConfigSet {
    /// An empty parser set. `full_ctx` selects full-context merging.
    #[must_use]
    pub fn new(full_ctx: bool) -> Self {
        Self {
            configs: Vec::new(),
            lookup: Some(HashMap::default()),
            ordered: false,
            full_ctx,
            readonly: false,
            cached_hash: OnceLock::new(),
            has_semantic_context: false,
            dips_into_outer_context: false,
            unique_alt: INVALID_ALT,
            conflicting_alts: None,
        }
    }

    /// An empty lexer set.
    #[must_use]
    pub fn ordered() -> Self {
        Self {
            ordered: true,
            ..Self::new(false)
        }
    }

    /// Adds `config`, merging its stack into an existing entry with the same
    /// key. Returns whether a new entry was created.
    pub fn add(
        &mut self,
        config: AtnConfig,
        merge_cache: Option<&mut MergeCache>,
    ) -> Result<bool, StateError> {
        if self.readonly {
            return Err(StateError::ReadonlyConfigSet);
        }
        if !config.semantic_context.is_empty() {
            self.has_semantic_context = true;
        }
        if config.reaches_into_outer_context > 0 {
            self.dips_into_outer_context = true;
        }
        let key = if self.ordered {
            ConfigKey::Exact(config.clone())
        } else {
            ConfigKey::Merged(config.state, config.alt, config.semantic_context.clone())
        };
        let lookup = self.lookup.get_or_insert_with(HashMap::default);
        let Some(&index) = lookup.get(&key) else {
            lookup.insert(key, self.configs.len());
            self.configs.push(config);
            return Ok(true);
        };
        if self.ordered {
            return Ok(false);
        }

        let root_is_wildcard = !self.full_ctx;
        let existing = &mut self.configs[index];
        let merged = merge(&existing.context, &config.context, root_is_wildcard, merge_cache);
        existing.reaches_into_outer_context = existing
            .reaches_into_outer_context
            .max(config.reaches_into_outer_context);
        if config.precedence_filter_suppressed {
            existing.precedence_filter_suppressed = true;
        }
        existing.context = merged;
        Ok(false)
    }

    /// Adds every configuration of `other`.
    pub fn add_all(
        &mut self,
        other: &Self,
        mut merge_cache: Option<&mut MergeCache>,
    ) -> Result<(), StateError> {
        for config in &other.configs {
            self.add(config.clone(), merge_cache.as_deref_mut())?;
        }
        Ok(())
    }

    /// Replaces every stack with its canonical instance from `cache`.
    pub fn optimize_configs(&mut self, cache: &mut PredictionContextCache) -> Result<(), StateError> {
        if self.readonly {
            return Err(StateError::ReadonlyConfigSet);
        }
        if self.configs.is_empty() {
            return Ok(());
        }
        let mut visited = HashMap::default();
        for config in &mut self.configs {
            config.context = get_cached_context(&config.context, cache, &mut visited);
        }
        Ok(())
    }

    /// Freezes the set and drops its lookup index.
    pub fn set_readonly(&mut self) {
        self.readonly = true;
        self.lookup = None;
    }

    #[must_use]
    pub const fn is_readonly(&self) -> bool {
        self.readonly
    }

    #[must_use]
    pub const fn full_ctx(&self) -> bool {
        self.full_ctx
    }

    pub fn clear(&mut self) -> Result<(), StateError> {
        if self.readonly {
            return Err(StateError::ReadonlyConfigSet);
        }
        self.configs.clear();
        self.lookup = Some(HashMap::default());
        self.cached_hash = OnceLock::new();
        Ok(())
    }

    #[must_use]
    pub fn configs(&self) -> &[AtnConfig] {
        &self.configs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtnConfig> {
        self.configs.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Every alternative predicted by some configuration.
    #[must_use]
    pub fn alts(&self) -> AltSet {
        self.configs.iter().map(|c| c.alt).collect()
    }

    #[must_use]
    pub fn states(&self) -> HashSet<StateId, RandomState> {
        self.configs.iter().map(|c| c.state).collect()
    }

    /// The non-trivial predicates, in configuration order.
    #[must_use]
    pub fn predicates(&self) -> Vec<SemanticRef> {
        self.configs
            .iter()
            .filter(|c| !c.semantic_context.is_empty())
            .map(|c| c.semantic_context.clone())
            .collect()
    }

    fn content_hash(&self) -> u64 {
        let mut hasher = ahash::AHasher::default();
        for config in &self.configs {
            config.hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl<'a> IntoIterator for &'a AtnConfigSet {
    type Item = &'a AtnConfig;
    type IntoIter = std::slice::Iter<'a, AtnConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.configs.iter()
    }
}

impl PartialEq for AtnConfigSet {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
            || (self.full_ctx == other.full_ctx
                && self.unique_alt == other.unique_alt
                && self.conflicting_alts == other.conflicting_alts
                && self.has_semantic_context == other.has_semantic_context
                && self.dips_into_outer_context == other.dips_into_outer_context
                && self.configs == other.configs)
    }
}

impl Eq for AtnConfigSet {}

impl Hash for AtnConfigSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let hash = if self.readonly {
            *self.cached_hash.get_or_init(|| self.content_hash())
        } else {
            self.content_hash()
        };
        state.write_u64(hash);
    }
}

impl fmt::Display for AtnConfigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, config) in self.configs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{config}")?;
        }
        f.write_str("]")?;
        if self.has_semantic_context {
            f.write_str(",hasSemanticContext")?;
        }
        if self.unique_alt != INVALID_ALT {
            write!(f, ",uniqueAlt={}", self.unique_alt)?;
        }
        if let Some(alts) = &self.conflicting_alts {
            write!(f, ",conflictingAlts={alts:?}")?;
        }
        if self.dips_into_outer_context {
            f.write_str(",dipsIntoOuterContext")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::hash::BuildHasher;

    use super::*;
    use crate::configs::SemanticContext;
    use crate::context::PredictionContext;

    fn hash_of(set: &AtnConfigSet) -> u64 {
        RandomState::with_seeds(1, 2, 3, 4).hash_one(set)
    }

    fn stack(return_state: usize) -> crate::context::ContextRef {
        PredictionContext::singleton(Some(PredictionContext::empty()), return_state)
    }

    #[test]
    fn test_same_key_merges_contexts() {
        let mut set = AtnConfigSet::new(true);
        let a = stack(4);
        let b = stack(9);
        assert!(set.add(AtnConfig::new(1, 1, a.clone()), None).unwrap());
        assert!(!set.add(AtnConfig::new(1, 1, b.clone()), None).unwrap());
        assert_eq!(set.len(), 1);
        assert_eq!(set.configs()[0].context, merge(&a, &b, false, None));
    }

    #[test]
    fn test_different_predicates_stay_apart() {
        let mut set = AtnConfigSet::new(false);
        let mut guarded = AtnConfig::new(1, 1, stack(4));
        guarded.semantic_context = SemanticContext::predicate(0, 0, false);
        set.add(AtnConfig::new(1, 1, stack(4)), None).unwrap();
        set.add(guarded, None).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.has_semantic_context);
        assert_eq!(set.predicates().len(), 1);
    }

    #[test]
    fn test_reordered_conjunctions_share_a_key() {
        let p = SemanticContext::predicate(0, 0, false);
        let q = SemanticContext::predicate(0, 1, false);
        let mut set = AtnConfigSet::new(false);
        let mut first = AtnConfig::new(1, 1, stack(4));
        first.semantic_context = SemanticContext::and(Some(&p), Some(&q));
        let mut second = AtnConfig::new(1, 1, stack(5));
        second.semantic_context = SemanticContext::and(Some(&q), Some(&p));
        assert!(set.add(first, None).unwrap());
        assert!(!set.add(second, None).unwrap());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_outer_context_flag_and_depth() {
        let mut set = AtnConfigSet::new(false);
        let mut deep = AtnConfig::new(2, 1, stack(4));
        deep.reaches_into_outer_context = 3;
        set.add(AtnConfig::new(2, 1, stack(4)), None).unwrap();
        set.add(deep, None).unwrap();
        assert!(set.dips_into_outer_context);
        assert_eq!(set.configs()[0].reaches_into_outer_context, 3);
    }

    #[test]
    fn test_ordered_set_keeps_distinct_stacks() {
        let mut set = AtnConfigSet::ordered();
        set.add(AtnConfig::new(1, 1, stack(4)), None).unwrap();
        set.add(AtnConfig::new(1, 1, stack(5)), None).unwrap();
        assert!(!set.add(AtnConfig::new(1, 1, stack(4)), None).unwrap());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_readonly_rejects_mutation() {
        let mut set = AtnConfigSet::new(false);
        set.add(AtnConfig::new(1, 2, stack(4)), None).unwrap();
        set.set_readonly();
        assert_eq!(
            set.add(AtnConfig::new(3, 1, stack(4)), None),
            Err(StateError::ReadonlyConfigSet)
        );
        assert_eq!(set.clear(), Err(StateError::ReadonlyConfigSet));
        assert_eq!(set.alts(), AltSet::from([2]));
    }

    #[test]
    fn test_optimize_shares_cached_nodes() {
        let mut cache = PredictionContextCache::new();
        let first = stack(4);
        cache.add(&first);
        let mut set = AtnConfigSet::new(false);
        set.add(AtnConfig::new(1, 1, stack(4)), None).unwrap();
        set.optimize_configs(&mut cache).unwrap();
        assert!(std::sync::Arc::ptr_eq(&set.configs()[0].context, &first));
    }

    #[test]
    fn test_equal_content_hashes_equal() {
        let mut a = AtnConfigSet::new(false);
        let mut b = AtnConfigSet::new(false);
        a.add(AtnConfig::new(1, 1, stack(4)), None).unwrap();
        b.add(AtnConfig::new(1, 1, stack(4)), None).unwrap();
        b.set_readonly();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }
}
