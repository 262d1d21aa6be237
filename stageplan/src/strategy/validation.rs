//! Validation of failure-strategy actions.
//!
//! Rules are checked where they are declared. Nested actions are walked to
//! any depth, so retry and manual-intervention cycles are caught however
//! deeply they are wrapped.

use crate::declarative::{ActionConfig, FailureStrategyConfig, Param};
use crate::errors::ConfigError;
use std::fmt;

/// The nesting level a rule list is declared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyLevel {
    /// Declared on a stage.
    Stage,
    /// Declared on a step group.
    StepGroup,
    /// Declared on a step.
    Step,
}

impl fmt::Display for StrategyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage => write!(f, "stage"),
            Self::StepGroup => write!(f, "step group"),
            Self::Step => write!(f, "step"),
        }
    }
}

/// Where a rule list is declared.
#[derive(Debug, Clone)]
pub struct RuleScope {
    /// Human-readable owner, e.g. `step 'deploy'`.
    pub owner: String,
    /// The declaring level.
    pub level: StrategyLevel,
    /// The declaring node sits inside a step group.
    pub inside_step_group: bool,
    /// The declaring node sits inside a rollback block.
    pub inside_rollback: bool,
}

impl RuleScope {
    /// Scope of a stage's rules.
    #[must_use]
    pub fn stage(identifier: &str) -> Self {
        Self {
            owner: format!("stage '{identifier}'"),
            level: StrategyLevel::Stage,
            inside_step_group: false,
            inside_rollback: false,
        }
    }

    /// Scope of a step group's rules.
    #[must_use]
    pub fn step_group(identifier: &str, inside_rollback: bool) -> Self {
        Self {
            owner: format!("step group '{identifier}'"),
            level: StrategyLevel::StepGroup,
            inside_step_group: true,
            inside_rollback,
        }
    }

    /// Scope of a step's rules.
    #[must_use]
    pub fn step(identifier: &str, inside_step_group: bool, inside_rollback: bool) -> Self {
        Self {
            owner: format!("step '{identifier}'"),
            level: StrategyLevel::Step,
            inside_step_group,
            inside_rollback,
        }
    }

    fn nesting(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidNesting {
            owner: self.owner.clone(),
            reason: reason.into(),
        }
    }
}

/// Validates every rule declared in one scope.
///
/// # Errors
///
/// Returns `ConfigError::InvalidNesting` or `ConfigError::MissingRetryFields`
/// for the first offending action.
pub fn validate_rules(rules: &[FailureStrategyConfig], scope: &RuleScope) -> Result<(), ConfigError> {
    rules.iter().try_for_each(|rule| validate_action(&rule.action, scope))
}

/// Validates one action and everything nested inside it.
///
/// # Errors
///
/// See [`validate_rules`].
pub fn validate_action(action: &ActionConfig, scope: &RuleScope) -> Result<(), ConfigError> {
    match action {
        ActionConfig::Retry {
            retry_count,
            retry_intervals,
            on_retry_failure,
        } => {
            concrete_retry_fields(retry_count.as_ref(), retry_intervals.as_ref(), &scope.owner)?;
            if on_retry_failure.is_retry() {
                return Err(scope.nesting(format!(
                    "Retry cannot fall back to {} once retries are exhausted",
                    on_retry_failure.name()
                )));
            }
            validate_action(on_retry_failure, scope)
        }
        ActionConfig::ManualIntervention { on_timeout, .. } => {
            if matches!(on_timeout.as_ref(), ActionConfig::ManualIntervention { .. }) {
                return Err(scope.nesting("ManualIntervention cannot time out into another ManualIntervention"));
            }
            if on_timeout.is_retry() {
                return Err(scope.nesting(format!(
                    "ManualIntervention cannot time out into {}",
                    on_timeout.name()
                )));
            }
            validate_action(on_timeout, scope)
        }
        ActionConfig::RetryStepGroup {
            retry_count,
            retry_intervals,
        } => {
            concrete_retry_fields(retry_count.as_ref(), retry_intervals.as_ref(), &scope.owner)?;
            if scope.level == StrategyLevel::Stage || !scope.inside_step_group {
                return Err(scope.nesting(format!(
                    "RetryStepGroup is only allowed inside a step group, not on a {}",
                    scope.level
                )));
            }
            Ok(())
        }
        ActionConfig::StageRollback | ActionConfig::StepGroupRollback
            if scope.inside_rollback && scope.level != StrategyLevel::Stage =>
        {
            Err(scope.nesting(format!("{} cannot be declared inside a rollback block", action.name())))
        }
        ActionConfig::Ignore
        | ActionConfig::MarkAsSuccess
        | ActionConfig::MarkAsFailure
        | ActionConfig::Abort
        | ActionConfig::StageRollback
        | ActionConfig::StepGroupRollback
        | ActionConfig::PipelineRollback => Ok(()),
    }
}

/// Extracts the concrete retry count and intervals.
///
/// # Errors
///
/// Returns `ConfigError::MissingRetryFields` if either field is absent or
/// still an unresolved expression.
pub fn concrete_retry_fields(
    retry_count: Option<&Param<u32>>,
    retry_intervals: Option<&Param<Vec<String>>>,
    owner: &str,
) -> Result<(u32, Vec<String>), ConfigError> {
    let missing = |field: &str| ConfigError::MissingRetryFields {
        owner: owner.to_string(),
        field: field.to_string(),
    };
    let count = retry_count.and_then(Param::value).ok_or_else(|| missing("retryCount"))?;
    let intervals = retry_intervals
        .and_then(Param::value)
        .ok_or_else(|| missing("retryIntervals"))?;
    Ok((*count, intervals.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declarative::ErrorCategory;

    fn step_scope() -> RuleScope {
        RuleScope::step("a", false, false)
    }

    #[test]
    fn test_retry_into_retry_is_rejected() {
        let action = ActionConfig::retry(2, &["1s"], ActionConfig::retry(1, &["1s"], ActionConfig::Abort));
        let err = validate_action(&action, &step_scope()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNesting { .. }));
    }

    #[test]
    fn test_retry_manual_retry_cycle_is_rejected() {
        let action = ActionConfig::retry(
            2,
            &["1s"],
            ActionConfig::manual_intervention("1h", ActionConfig::retry(1, &["1s"], ActionConfig::Abort)),
        );
        assert!(matches!(
            validate_action(&action, &step_scope()),
            Err(ConfigError::InvalidNesting { .. })
        ));
    }

    #[test]
    fn test_deep_manual_retry_manual_cycle_is_rejected() {
        let action = ActionConfig::manual_intervention(
            "1h",
            ActionConfig::retry(1, &["1s"], ActionConfig::manual_intervention("1h", ActionConfig::Abort)),
        );
        assert!(matches!(
            validate_action(&action, &step_scope()),
            Err(ConfigError::InvalidNesting { .. })
        ));
    }

    #[test]
    fn test_manual_into_manual_is_rejected() {
        let action =
            ActionConfig::manual_intervention("1h", ActionConfig::manual_intervention("1h", ActionConfig::Abort));
        assert!(validate_action(&action, &step_scope()).is_err());
    }

    #[test]
    fn test_retry_into_manual_into_abort_is_allowed() {
        let action = ActionConfig::retry(
            3,
            &["1s", "5s"],
            ActionConfig::manual_intervention("30m", ActionConfig::MarkAsFailure),
        );
        assert!(validate_action(&action, &step_scope()).is_ok());
    }

    #[test]
    fn test_expression_retry_count_is_missing_field() {
        let action = ActionConfig::Retry {
            retry_count: Some(Param::Expression("<+input>".to_string())),
            retry_intervals: Some(Param::Value(vec!["1s".to_string()])),
            on_retry_failure: Box::new(ActionConfig::Abort),
        };
        let err = validate_action(&action, &step_scope()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingRetryFields {
                owner: "step 'a'".to_string(),
                field: "retryCount".to_string(),
            }
        );
    }

    #[test]
    fn test_rollback_inside_rollback_block_is_rejected() {
        let scope = RuleScope::step("undo", true, true);
        let rules = vec![FailureStrategyConfig::new(
            [ErrorCategory::Timeout],
            ActionConfig::StepGroupRollback,
        )];
        assert!(matches!(
            validate_rules(&rules, &scope),
            Err(ConfigError::InvalidNesting { .. })
        ));
        assert!(validate_rules(&rules, &RuleScope::step("undo", true, false)).is_ok());
    }

    #[test]
    fn test_retry_step_group_scope() {
        let action = ActionConfig::retry_step_group(2, &["1s"]);
        assert!(validate_action(&action, &RuleScope::stage("s")).is_err());
        assert!(validate_action(&action, &RuleScope::step("a", false, false)).is_err());
        assert!(validate_action(&action, &RuleScope::step("a", true, false)).is_ok());
        assert!(validate_action(&action, &RuleScope::step_group("sg", false)).is_ok());
    }
}
