//! Adviser-chain construction.
//!
//! Failure-driven advisers come first, in the order of the resolved
//! strategies. The default routing adviser, if any, is always appended last.

use super::resolver::ResolvedStrategies;
use super::validation::concrete_retry_fields;
use crate::declarative::{ActionConfig, ErrorCategory};
use crate::errors::ConfigError;
use crate::plan::{Adviser, RepairAction};
use crate::utils::PlanNodeId;
use std::collections::BTreeSet;
use tracing::warn;

/// Inputs describing where the node sits.
#[derive(Debug, Clone, Copy)]
pub struct AdviserTarget<'a> {
    /// Human-readable owner, used in errors and logs.
    pub owner: &'a str,
    /// The next sibling, if any.
    pub next_node_id: Option<PlanNodeId>,
    /// The node sits inside a rollback block.
    pub inside_rollback: bool,
}

/// Builds the ordered adviser list of one node.
///
/// Inside a rollback block, inherited stage and step group rollback actions
/// are dropped and the default adviser is `OnSuccess` instead of `NextStep`.
///
/// # Errors
///
/// Returns `ConfigError::MissingRetryFields` or `ConfigError::InvalidNesting`
/// if a retry cannot be turned into a concrete adviser.
pub fn build_advisers(
    strategies: &ResolvedStrategies,
    target: AdviserTarget<'_>,
) -> Result<Vec<Adviser>, ConfigError> {
    let mut strategies = strategies.clone();
    if target.inside_rollback {
        for (action, categories) in strategies.remove_local_rollbacks() {
            warn!(
                owner = %target.owner,
                action = action.name(),
                categories = categories.len(),
                "Dropping inherited rollback action inside a rollback block"
            );
        }
    }

    let mut advisers = strategies
        .entries()
        .iter()
        .map(|(action, categories)| failure_adviser(action, categories.clone(), target))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(next_node_id) = target.next_node_id {
        advisers.push(if target.inside_rollback {
            Adviser::OnSuccess { next_node_id }
        } else {
            Adviser::NextStep { next_node_id }
        });
    }
    Ok(advisers)
}

fn failure_adviser(
    action: &ActionConfig,
    applicable_categories: BTreeSet<ErrorCategory>,
    target: AdviserTarget<'_>,
) -> Result<Adviser, ConfigError> {
    let next_node_id = target.next_node_id;
    let adviser = match action {
        ActionConfig::Ignore => Adviser::Ignore {
            applicable_categories,
            next_node_id,
        },
        ActionConfig::Retry {
            retry_count,
            retry_intervals,
            on_retry_failure,
        } => {
            let (retry_count, wait_intervals) =
                concrete_retry_fields(retry_count.as_ref(), retry_intervals.as_ref(), target.owner)?;
            Adviser::Retry {
                applicable_categories,
                retry_count,
                wait_intervals,
                repair_action_after_retry: repair_action(on_retry_failure, target.owner)?,
                next_node_id,
            }
        }
        ActionConfig::ManualIntervention { timeout, on_timeout } => Adviser::ManualIntervention {
            applicable_categories,
            timeout: timeout.clone(),
            timeout_action: repair_action(on_timeout, target.owner)?,
        },
        ActionConfig::MarkAsSuccess => Adviser::MarkSuccess {
            applicable_categories,
            next_node_id,
        },
        ActionConfig::MarkAsFailure => Adviser::MarkFailure {
            applicable_categories,
            next_node_id,
        },
        ActionConfig::Abort => Adviser::Abort { applicable_categories },
        ActionConfig::StageRollback => Adviser::StageRollback { applicable_categories },
        ActionConfig::StepGroupRollback => Adviser::StepGroupRollback { applicable_categories },
        ActionConfig::PipelineRollback => Adviser::PipelineRollback { applicable_categories },
        ActionConfig::RetryStepGroup {
            retry_count,
            retry_intervals,
        } => {
            let (retry_count, wait_intervals) =
                concrete_retry_fields(retry_count.as_ref(), retry_intervals.as_ref(), target.owner)?;
            Adviser::RetryStepGroup {
                applicable_categories,
                retry_count,
                wait_intervals,
            }
        }
    };
    Ok(adviser)
}

/// Converts the fallback of a retry or manual intervention.
///
/// # Errors
///
/// Returns `ConfigError::InvalidNesting` for a plain retry, which can never
/// be a fallback.
pub fn repair_action(action: &ActionConfig, owner: &str) -> Result<RepairAction, ConfigError> {
    Ok(match action {
        ActionConfig::Ignore => RepairAction::Ignore,
        ActionConfig::ManualIntervention { timeout, on_timeout } => RepairAction::ManualIntervention {
            timeout: timeout.clone(),
            on_timeout: Box::new(repair_action(on_timeout, owner)?),
        },
        ActionConfig::MarkAsSuccess => RepairAction::MarkAsSuccess,
        ActionConfig::MarkAsFailure => RepairAction::MarkAsFailure,
        ActionConfig::Abort => RepairAction::EndExecution,
        ActionConfig::StageRollback => RepairAction::StageRollback,
        ActionConfig::StepGroupRollback => RepairAction::StepGroupRollback,
        ActionConfig::PipelineRollback => RepairAction::PipelineRollback,
        ActionConfig::RetryStepGroup {
            retry_count,
            retry_intervals,
        } => {
            let (retry_count, wait_intervals) =
                concrete_retry_fields(retry_count.as_ref(), retry_intervals.as_ref(), owner)?;
            RepairAction::RetryStepGroup {
                retry_count,
                wait_intervals,
            }
        }
        ActionConfig::Retry { .. } => {
            return Err(ConfigError::InvalidNesting {
                owner: owner.to_string(),
                reason: "Retry cannot be used as a fallback action".to_string(),
            })
        }
    })
}
