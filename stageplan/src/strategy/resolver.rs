//! Failure-strategy resolution.
//!
//! Rules from the stage, the nearest step group and the step are turned
//! into one category-to-action map per level, merged with the most specific
//! level winning, then inverted into the action-to-categories shape the
//! adviser builder consumes.

use crate::declarative::{ActionConfig, ErrorCategory, FailureStrategyConfig};
use crate::errors::ConfigError;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Category-to-action map of a single level.
pub type LevelMap = BTreeMap<ErrorCategory, ActionConfig>;

/// Builds the category map of one level.
///
/// `ALL_ERRORS` fills every concrete category not explicitly mapped at the
/// same level.
///
/// # Errors
///
/// - `ConfigError::DuplicateAllErrors` if `ALL_ERRORS` shares a rule with
///   other categories or appears in two rules.
/// - `ConfigError::ConflictingAction` if one category maps to two
///   different actions.
pub fn level_map(rules: &[FailureStrategyConfig], owner: &str) -> Result<LevelMap, ConfigError> {
    let mut map = LevelMap::new();
    let mut all_errors: Option<&ActionConfig> = None;

    for rule in rules {
        if rule.error_categories.is_empty() {
            warn!(owner = %owner, action = rule.action.name(), "Skipping failure strategy with no error categories");
            continue;
        }

        if rule.error_categories.iter().any(ErrorCategory::is_all_errors) {
            if !rule.is_all_errors_only() {
                return Err(ConfigError::DuplicateAllErrors {
                    owner: owner.to_string(),
                    reason: "ALL_ERRORS must be the only category of its rule".to_string(),
                });
            }
            if all_errors.is_some() {
                return Err(ConfigError::DuplicateAllErrors {
                    owner: owner.to_string(),
                    reason: "ALL_ERRORS is declared in more than one rule".to_string(),
                });
            }
            all_errors = Some(&rule.action);
            continue;
        }

        for category in &rule.error_categories {
            match map.get(category) {
                Some(existing) if existing != &rule.action => {
                    return Err(ConfigError::ConflictingAction {
                        owner: owner.to_string(),
                        category: *category,
                    });
                }
                Some(_) => {}
                None => {
                    map.insert(*category, rule.action.clone());
                }
            }
        }
    }

    if let Some(action) = all_errors {
        for category in ErrorCategory::CONCRETE {
            map.entry(category).or_insert_with(|| action.clone());
        }
    }
    Ok(map)
}

/// Merges level maps from least to most specific; later maps win.
#[must_use]
pub fn merge_levels<'a>(levels: impl IntoIterator<Item = &'a LevelMap>) -> LevelMap {
    let mut merged = LevelMap::new();
    for level in levels {
        for (category, action) in level {
            merged.insert(*category, action.clone());
        }
    }
    merged
}

/// Resolved strategies: each distinct action with the categories it handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedStrategies {
    entries: Vec<(ActionConfig, BTreeSet<ErrorCategory>)>,
}

impl ResolvedStrategies {
    /// Inverts a merged map, keeping actions in first-appearance order.
    #[must_use]
    pub fn from_map(map: &LevelMap) -> Self {
        let mut entries: Vec<(ActionConfig, BTreeSet<ErrorCategory>)> = Vec::new();
        for (category, action) in map {
            match entries.iter_mut().find(|(existing, _)| existing == action) {
                Some((_, categories)) => {
                    categories.insert(*category);
                }
                None => entries.push((action.clone(), BTreeSet::from([*category]))),
            }
        }
        Self { entries }
    }

    /// The `(action, categories)` pairs.
    #[must_use]
    pub fn entries(&self) -> &[(ActionConfig, BTreeSet<ErrorCategory>)] {
        &self.entries
    }

    /// The action resolved for one category.
    #[must_use]
    pub fn action_for(&self, category: ErrorCategory) -> Option<&ActionConfig> {
        self.entries
            .iter()
            .find(|(_, categories)| categories.contains(&category))
            .map(|(action, _)| action)
    }

    /// Returns true if nothing was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops stage and step group rollback actions, returning what was dropped.
    pub fn remove_local_rollbacks(&mut self) -> Vec<(ActionConfig, BTreeSet<ErrorCategory>)> {
        let (dropped, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|(action, _)| action.is_local_rollback());
        self.entries = kept;
        dropped
    }
}

/// Resolves the strategies applying to one node.
///
/// Each tuple is `(owner, rules)`, ordered from least specific (stage) to
/// most specific (step).
///
/// # Errors
///
/// See [`level_map`].
pub fn resolve(levels: &[(&str, &[FailureStrategyConfig])]) -> Result<ResolvedStrategies, ConfigError> {
    let maps = levels
        .iter()
        .map(|(owner, rules)| level_map(rules, owner))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResolvedStrategies::from_map(&merge_levels(&maps)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_most_specific_level_wins() {
        let stage = vec![FailureStrategyConfig::new([ErrorCategory::NetworkError], ActionConfig::Abort)];
        let group = vec![FailureStrategyConfig::new(
            [ErrorCategory::NetworkError],
            ActionConfig::retry(2, &["1s"], ActionConfig::Abort),
        )];
        let step = vec![FailureStrategyConfig::new([ErrorCategory::NetworkError], ActionConfig::Ignore)];

        let resolved = resolve(&[
            ("stage 's'", &stage[..]),
            ("step group 'g'", &group[..]),
            ("step 'a'", &step[..]),
        ])
        .unwrap();

        assert_eq!(resolved.action_for(ErrorCategory::NetworkError), Some(&ActionConfig::Ignore));
    }

    #[test]
    fn test_all_errors_expands_to_every_category() {
        let step = vec![FailureStrategyConfig::all_errors(ActionConfig::MarkAsFailure)];
        let map = level_map(&step, "step 'a'").unwrap();

        assert_eq!(map.len(), ErrorCategory::CONCRETE.len());
        assert!(map.values().all(|action| action == &ActionConfig::MarkAsFailure));

        let resolved = ResolvedStrategies::from_map(&map);
        assert_eq!(resolved.entries().len(), 1);
        assert_eq!(resolved.entries()[0].1.len(), 12);
    }

    #[test]
    fn test_all_errors_only_backfills_unmapped_categories() {
        let rules = vec![
            FailureStrategyConfig::all_errors(ActionConfig::Abort),
            FailureStrategyConfig::new([ErrorCategory::Timeout], ActionConfig::Ignore),
        ];
        let map = level_map(&rules, "stage 's'").unwrap();
        assert_eq!(map.get(&ErrorCategory::Timeout), Some(&ActionConfig::Ignore));
        assert_eq!(map.get(&ErrorCategory::Unknown), Some(&ActionConfig::Abort));
    }

    #[test]
    fn test_two_all_errors_rules_are_rejected() {
        let rules = vec![
            FailureStrategyConfig::all_errors(ActionConfig::Abort),
            FailureStrategyConfig::all_errors(ActionConfig::Ignore),
        ];
        assert!(matches!(
            level_map(&rules, "step 'a'"),
            Err(ConfigError::DuplicateAllErrors { .. })
        ));
    }

    #[test]
    fn test_all_errors_with_other_categories_is_rejected() {
        let rules = vec![FailureStrategyConfig::new(
            [ErrorCategory::AllErrors, ErrorCategory::Timeout],
            ActionConfig::Abort,
        )];
        assert!(matches!(
            level_map(&rules, "step 'a'"),
            Err(ConfigError::DuplicateAllErrors { .. })
        ));
    }

    #[test]
    fn test_conflicting_actions_are_rejected() {
        let rules = vec![
            FailureStrategyConfig::new([ErrorCategory::Timeout], ActionConfig::Abort),
            FailureStrategyConfig::new([ErrorCategory::Timeout], ActionConfig::Ignore),
        ];
        let err = level_map(&rules, "step 'a'").unwrap_err();
        assert_eq!(
            err,
            ConfigError::ConflictingAction {
                owner: "step 'a'".to_string(),
                category: ErrorCategory::Timeout,
            }
        );
    }

    #[test]
    fn test_repeated_identical_mapping_is_allowed() {
        let rules = vec![
            FailureStrategyConfig::new([ErrorCategory::Timeout], ActionConfig::Abort),
            FailureStrategyConfig::new([ErrorCategory::Timeout, ErrorCategory::Unknown], ActionConfig::Abort),
        ];
        assert_eq!(level_map(&rules, "step 'a'").unwrap().len(), 2);
    }

    #[test]
    fn test_empty_category_list_is_skipped() {
        let rules = vec![FailureStrategyConfig::new([], ActionConfig::Abort)];
        assert!(level_map(&rules, "step 'a'").unwrap().is_empty());
    }

    #[test]
    fn test_inversion_groups_categories_by_action() {
        let rules = vec![
            FailureStrategyConfig::new([ErrorCategory::Timeout, ErrorCategory::Unknown], ActionConfig::Abort),
            FailureStrategyConfig::new([ErrorCategory::NetworkError], ActionConfig::Ignore),
        ];
        let resolved = resolve(&[("step 'a'", &rules[..])]).unwrap();
        assert_eq!(resolved.entries().len(), 2);
        let abort = resolved
            .entries()
            .iter()
            .find(|(action, _)| action == &ActionConfig::Abort)
            .map(|(_, categories)| categories.clone())
            .unwrap();
        assert_eq!(abort, BTreeSet::from([ErrorCategory::Unknown, ErrorCategory::Timeout]));
    }

    #[test]
    fn test_remove_local_rollbacks() {
        let rules = vec![
            FailureStrategyConfig::new([ErrorCategory::Timeout], ActionConfig::StageRollback),
            FailureStrategyConfig::new([ErrorCategory::Unknown], ActionConfig::Abort),
        ];
        let mut resolved = resolve(&[("stage 's'", &rules[..])]).unwrap();
        let dropped = resolved.remove_local_rollbacks();
        assert_eq!(dropped.len(), 1);
        assert_eq!(resolved.entries().len(), 1);
        assert_eq!(resolved.action_for(ErrorCategory::Unknown), Some(&ActionConfig::Abort));
    }
}
