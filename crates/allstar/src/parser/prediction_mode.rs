//! Conflict analysis over configuration sets.
//!
//! A configuration set is split into *alt subsets*: for each distinct
//! (state, stack) pair, the alternatives that reached it. Two alternatives
//! in one subset can never be told apart by more lookahead, since they will
//! see the same input from the same place. These helpers decide from the
//! subsets when SLL or LL prediction can stop.

use ahash::RandomState;
use hashbrown::HashMap;

use crate::atn::{Atn, StateId, INVALID_ALT};
use crate::configs::{AltSet, AtnConfigSet, SemanticContext};
use crate::context::ContextRef;
use crate::error::StateError;
use crate::options::PredictionMode;

/// Whether SLL prediction can stop at `configs`, either because every
/// configuration finished the decision rule or because a conflict makes
/// further lookahead pointless.
pub fn has_sll_conflict_terminating_prediction(
    mode: PredictionMode,
    configs: &AtnConfigSet,
    atn: &Atn,
) -> Result<bool, StateError> {
    if all_configs_in_rule_stop_states(configs, atn) {
        return Ok(true);
    }
    let subsets = if mode == PredictionMode::Sll && configs.has_semantic_context {
        // pure SLL ignores predicates when looking for conflicts
        let mut stripped = AtnConfigSet::new(configs.full_ctx());
        for config in configs {
            let mut config = config.clone();
            config.semantic_context = SemanticContext::none();
            stripped.add(config, None)?;
        }
        conflicting_alt_subsets(&stripped)
    } else {
        conflicting_alt_subsets(configs)
    };
    Ok(has_conflicting_alt_set(&subsets) && !has_state_associated_with_one_alt(configs))
}

#[must_use]
pub fn has_config_in_rule_stop_state(configs: &AtnConfigSet, atn: &Atn) -> bool {
    configs.iter().any(|c| atn.state(c.state).is_rule_stop())
}

#[must_use]
pub fn all_configs_in_rule_stop_states(configs: &AtnConfigSet, atn: &Atn) -> bool {
    configs.iter().all(|c| atn.state(c.state).is_rule_stop())
}

/// The single alternative every subset would pick by lowest number, or
/// [`INVALID_ALT`].
#[must_use]
pub fn resolves_to_just_one_viable_alt(subsets: &[AltSet]) -> usize {
    single_viable_alt(subsets)
}

#[must_use]
pub fn all_subsets_conflict(subsets: &[AltSet]) -> bool {
    !has_non_conflicting_alt_set(subsets)
}

#[must_use]
pub fn has_non_conflicting_alt_set(subsets: &[AltSet]) -> bool {
    subsets.iter().any(|alts| alts.len() == 1)
}

#[must_use]
pub fn has_conflicting_alt_set(subsets: &[AltSet]) -> bool {
    subsets.iter().any(|alts| alts.len() > 1)
}

#[must_use]
pub fn all_subsets_equal(subsets: &[AltSet]) -> bool {
    subsets.windows(2).all(|pair| pair[0] == pair[1])
}

/// The alternative shared by all subsets when there is exactly one overall.
#[must_use]
pub fn unique_alt(subsets: &[AltSet]) -> usize {
    let all = alts(subsets);
    match (all.len(), all.first()) {
        (1, Some(&alt)) => alt,
        _ => INVALID_ALT,
    }
}

/// Union of all subsets.
#[must_use]
pub fn alts(subsets: &[AltSet]) -> AltSet {
    subsets.iter().flatten().copied().collect()
}

/// Alternatives grouped by (state, stack), in first-seen order.
#[must_use]
pub fn conflicting_alt_subsets(configs: &AtnConfigSet) -> Vec<AltSet> {
    let mut index: HashMap<(StateId, &ContextRef), usize, RandomState> = HashMap::default();
    let mut subsets: Vec<AltSet> = Vec::new();
    for config in configs {
        let slot = *index
            .entry((config.state, &config.context))
            .or_insert_with(|| {
                subsets.push(AltSet::new());
                subsets.len() - 1
            });
        subsets[slot].insert(config.alt);
    }
    subsets
}

/// Alternatives reaching each state.
#[must_use]
pub fn state_to_alt_map(configs: &AtnConfigSet) -> HashMap<StateId, AltSet, RandomState> {
    let mut map: HashMap<StateId, AltSet, RandomState> = HashMap::default();
    for config in configs {
        map.entry(config.state).or_default().insert(config.alt);
    }
    map
}

#[must_use]
pub fn has_state_associated_with_one_alt(configs: &AtnConfigSet) -> bool {
    state_to_alt_map(configs).values().any(|alts| alts.len() == 1)
}

/// The lowest alternative of every subset, if they all agree.
#[must_use]
pub fn single_viable_alt(subsets: &[AltSet]) -> usize {
    let mut viable = INVALID_ALT;
    for alts in subsets {
        let Some(&min) = alts.first() else { continue };
        if viable == INVALID_ALT {
            viable = min;
        } else if viable != min {
            return INVALID_ALT;
        }
    }
    viable
}

/// The only alternative in `configs`, or [`INVALID_ALT`].
#[must_use]
pub fn unique_alt_of(configs: &AtnConfigSet) -> usize {
    let mut alt = INVALID_ALT;
    for config in configs {
        if alt == INVALID_ALT {
            alt = config.alt;
        } else if config.alt != alt {
            return INVALID_ALT;
        }
    }
    alt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::AtnConfig;
    use crate::context::PredictionContext;

    fn set(entries: &[(StateId, usize, usize)]) -> AtnConfigSet {
        let mut configs = AtnConfigSet::new(false);
        for &(state, alt, return_state) in entries {
            let ctx = PredictionContext::singleton(Some(PredictionContext::empty()), return_state);
            configs.add(AtnConfig::new(state, alt, ctx), None).unwrap();
        }
        configs
    }

    #[test]
    fn test_subsets_group_by_state_and_stack() {
        let configs = set(&[(1, 1, 9), (1, 2, 9), (1, 3, 8), (2, 1, 9)]);
        let subsets = conflicting_alt_subsets(&configs);
        assert_eq!(
            subsets,
            vec![AltSet::from([1, 2]), AltSet::from([3]), AltSet::from([1])]
        );
        assert!(has_conflicting_alt_set(&subsets));
        assert!(has_non_conflicting_alt_set(&subsets));
        assert!(!all_subsets_conflict(&subsets));
        assert_eq!(alts(&subsets), AltSet::from([1, 2, 3]));
        assert_eq!(single_viable_alt(&subsets), INVALID_ALT);
    }

    #[test]
    fn test_single_viable_alt_takes_minimums() {
        let subsets = vec![AltSet::from([1, 2]), AltSet::from([1, 3])];
        assert_eq!(resolves_to_just_one_viable_alt(&subsets), 1);
        assert!(all_subsets_conflict(&subsets));
        assert!(!all_subsets_equal(&subsets));
        assert_eq!(unique_alt(&subsets), INVALID_ALT);
        assert_eq!(unique_alt(&[AltSet::from([2]), AltSet::from([2])]), 2);
    }

    #[test]
    fn test_sll_conflict_ignores_predicates() {
        let mut atn = Atn::new(crate::GrammarType::Parser, 1);
        atn.add_state(0, crate::AtnStateKind::Basic);
        atn.add_state(0, crate::AtnStateKind::Basic);
        let ctx = PredictionContext::singleton(Some(PredictionContext::empty()), 9);
        let mut configs = AtnConfigSet::new(false);
        for (alt, pred) in [(1, 0), (2, 1)] {
            let mut config = AtnConfig::new(1, alt, ctx.clone());
            config.semantic_context = SemanticContext::predicate(0, pred, false);
            configs.add(config, None).unwrap();
        }
        assert!(configs.has_semantic_context);
        assert_eq!(
            has_sll_conflict_terminating_prediction(PredictionMode::Sll, &configs, &atn),
            Ok(true)
        );
        configs.set_readonly();
        assert_eq!(
            has_sll_conflict_terminating_prediction(PredictionMode::Sll, &configs, &atn),
            Ok(true)
        );
    }

    #[test]
    fn test_state_alt_map() {
        let configs = set(&[(1, 1, 9), (1, 2, 8)]);
        assert!(!has_state_associated_with_one_alt(&configs));
        assert_eq!(unique_alt_of(&configs), INVALID_ALT);
        let configs = set(&[(1, 2, 9), (4, 2, 8)]);
        assert!(has_state_associated_with_one_alt(&configs));
        assert_eq!(unique_alt_of(&configs), 2);
    }
}
