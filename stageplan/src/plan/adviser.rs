//! Advisers: runtime rules attached to plan nodes.
//!
//! The runtime evaluates a node's advisers in order once the node reaches a
//! terminal status; the first applicable adviser decides what happens next.

use crate::declarative::ErrorCategory;
use crate::utils::PlanNodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Action the runtime takes after retries are exhausted or a manual
/// intervention times out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairAction {
    /// Continue as if the node succeeded.
    Ignore,
    /// Wait for a human, then apply the nested action.
    #[serde(rename_all = "camelCase")]
    ManualIntervention {
        /// How long to wait.
        timeout: Option<String>,
        /// Action once the wait times out.
        on_timeout: Box<RepairAction>,
    },
    /// Mark the node as succeeded.
    MarkAsSuccess,
    /// Mark the node as failed.
    MarkAsFailure,
    /// Abort the pipeline.
    EndExecution,
    /// Roll back the enclosing stage.
    StageRollback,
    /// Roll back the enclosing step group.
    StepGroupRollback,
    /// Roll back the pipeline.
    PipelineRollback,
    /// Retry the enclosing step group.
    #[serde(rename_all = "camelCase")]
    RetryStepGroup {
        /// How many times to retry.
        retry_count: u32,
        /// Wait intervals between attempts.
        wait_intervals: Vec<String>,
    },
}

/// Discriminant of [`Adviser`], used for counting and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdviserType {
    /// See [`Adviser::Ignore`].
    Ignore,
    /// See [`Adviser::Retry`].
    Retry,
    /// See [`Adviser::ManualIntervention`].
    ManualIntervention,
    /// See [`Adviser::MarkSuccess`].
    MarkSuccess,
    /// See [`Adviser::MarkFailure`].
    MarkFailure,
    /// See [`Adviser::Abort`].
    Abort,
    /// See [`Adviser::StageRollback`].
    StageRollback,
    /// See [`Adviser::StepGroupRollback`].
    StepGroupRollback,
    /// See [`Adviser::PipelineRollback`].
    PipelineRollback,
    /// See [`Adviser::RetryStepGroup`].
    RetryStepGroup,
    /// See [`Adviser::NextStep`].
    NextStep,
    /// See [`Adviser::NextStage`].
    NextStage,
    /// See [`Adviser::OnSuccess`].
    OnSuccess,
    /// See [`Adviser::OnFail`].
    OnFail,
}

impl fmt::Display for AdviserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ignore => "IGNORE",
            Self::Retry => "RETRY",
            Self::ManualIntervention => "MANUAL_INTERVENTION",
            Self::MarkSuccess => "MARK_SUCCESS",
            Self::MarkFailure => "MARK_FAILURE",
            Self::Abort => "ABORT",
            Self::StageRollback => "STAGE_ROLLBACK",
            Self::StepGroupRollback => "STEP_GROUP_ROLLBACK",
            Self::PipelineRollback => "PIPELINE_ROLLBACK",
            Self::RetryStepGroup => "RETRY_STEP_GROUP",
            Self::NextStep => "NEXT_STEP",
            Self::NextStage => "NEXT_STAGE",
            Self::OnSuccess => "ON_SUCCESS",
            Self::OnFail => "ON_FAIL",
        };
        f.write_str(name)
    }
}

/// One adviser with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Adviser {
    /// Ignore the failure and continue.
    #[serde(rename_all = "camelCase")]
    Ignore {
        /// Categories this adviser handles.
        applicable_categories: BTreeSet<ErrorCategory>,
        /// Where to continue.
        next_node_id: Option<PlanNodeId>,
    },
    /// Retry the node.
    #[serde(rename_all = "camelCase")]
    Retry {
        /// Categories this adviser handles.
        applicable_categories: BTreeSet<ErrorCategory>,
        /// How many times to retry.
        retry_count: u32,
        /// Wait intervals between attempts.
        wait_intervals: Vec<String>,
        /// Action once retries are exhausted.
        repair_action_after_retry: RepairAction,
        /// Where to continue if the repair action moves on.
        next_node_id: Option<PlanNodeId>,
    },
    /// Pause for a human decision.
    #[serde(rename_all = "camelCase")]
    ManualIntervention {
        /// Categories this adviser handles.
        applicable_categories: BTreeSet<ErrorCategory>,
        /// How long to wait.
        timeout: Option<String>,
        /// Action once the wait times out.
        timeout_action: RepairAction,
    },
    /// Mark the node as succeeded.
    #[serde(rename_all = "camelCase")]
    MarkSuccess {
        /// Categories this adviser handles.
        applicable_categories: BTreeSet<ErrorCategory>,
        /// Where to continue.
        next_node_id: Option<PlanNodeId>,
    },
    /// Mark the node as failed.
    #[serde(rename_all = "camelCase")]
    MarkFailure {
        /// Categories this adviser handles.
        applicable_categories: BTreeSet<ErrorCategory>,
        /// Where to continue.
        next_node_id: Option<PlanNodeId>,
    },
    /// Abort the pipeline.
    #[serde(rename_all = "camelCase")]
    Abort {
        /// Categories this adviser handles.
        applicable_categories: BTreeSet<ErrorCategory>,
    },
    /// Roll back the enclosing stage.
    #[serde(rename_all = "camelCase")]
    StageRollback {
        /// Categories this adviser handles.
        applicable_categories: BTreeSet<ErrorCategory>,
    },
    /// Roll back the enclosing step group.
    #[serde(rename_all = "camelCase")]
    StepGroupRollback {
        /// Categories this adviser handles.
        applicable_categories: BTreeSet<ErrorCategory>,
    },
    /// Roll back the pipeline.
    #[serde(rename_all = "camelCase")]
    PipelineRollback {
        /// Categories this adviser handles.
        applicable_categories: BTreeSet<ErrorCategory>,
    },
    /// Retry the enclosing step group.
    #[serde(rename_all = "camelCase")]
    RetryStepGroup {
        /// Categories this adviser handles.
        applicable_categories: BTreeSet<ErrorCategory>,
        /// How many times to retry.
        retry_count: u32,
        /// Wait intervals between attempts.
        wait_intervals: Vec<String>,
    },
    /// Continue with the next sibling on success.
    #[serde(rename_all = "camelCase")]
    NextStep {
        /// The next sibling.
        next_node_id: PlanNodeId,
    },
    /// Continue with the next stage.
    #[serde(rename_all = "camelCase")]
    NextStage {
        /// The next stage.
        next_node_id: PlanNodeId,
    },
    /// Continue with the next sibling inside a rollback block.
    #[serde(rename_all = "camelCase")]
    OnSuccess {
        /// The next sibling.
        next_node_id: PlanNodeId,
    },
    /// Jump to a node on unhandled failure.
    #[serde(rename_all = "camelCase")]
    OnFail {
        /// The node to run, e.g. a stage rollback root.
        next_node_id: PlanNodeId,
    },
}

impl Adviser {
    /// The adviser's discriminant.
    #[must_use]
    pub const fn adviser_type(&self) -> AdviserType {
        match self {
            Self::Ignore { .. } => AdviserType::Ignore,
            Self::Retry { .. } => AdviserType::Retry,
            Self::ManualIntervention { .. } => AdviserType::ManualIntervention,
            Self::MarkSuccess { .. } => AdviserType::MarkSuccess,
            Self::MarkFailure { .. } => AdviserType::MarkFailure,
            Self::Abort { .. } => AdviserType::Abort,
            Self::StageRollback { .. } => AdviserType::StageRollback,
            Self::StepGroupRollback { .. } => AdviserType::StepGroupRollback,
            Self::PipelineRollback { .. } => AdviserType::PipelineRollback,
            Self::RetryStepGroup { .. } => AdviserType::RetryStepGroup,
            Self::NextStep { .. } => AdviserType::NextStep,
            Self::NextStage { .. } => AdviserType::NextStage,
            Self::OnSuccess { .. } => AdviserType::OnSuccess,
            Self::OnFail { .. } => AdviserType::OnFail,
        }
    }

    /// The node this adviser may route to, if any.
    #[must_use]
    pub const fn next_node_id(&self) -> Option<PlanNodeId> {
        match self {
            Self::Ignore { next_node_id, .. }
            | Self::Retry { next_node_id, .. }
            | Self::MarkSuccess { next_node_id, .. }
            | Self::MarkFailure { next_node_id, .. } => *next_node_id,
            Self::NextStep { next_node_id }
            | Self::NextStage { next_node_id }
            | Self::OnSuccess { next_node_id }
            | Self::OnFail { next_node_id } => Some(*next_node_id),
            Self::ManualIntervention { .. }
            | Self::Abort { .. }
            | Self::StageRollback { .. }
            | Self::StepGroupRollback { .. }
            | Self::PipelineRollback { .. }
            | Self::RetryStepGroup { .. } => None,
        }
    }

    /// Categories handled by a failure-driven adviser.
    ///
    /// Routing advisers (next step, next stage, on success, on fail) return
    /// `None`.
    #[must_use]
    pub const fn applicable_categories(&self) -> Option<&BTreeSet<ErrorCategory>> {
        match self {
            Self::Ignore { applicable_categories, .. }
            | Self::Retry { applicable_categories, .. }
            | Self::ManualIntervention { applicable_categories, .. }
            | Self::MarkSuccess { applicable_categories, .. }
            | Self::MarkFailure { applicable_categories, .. }
            | Self::Abort { applicable_categories }
            | Self::StageRollback { applicable_categories }
            | Self::StepGroupRollback { applicable_categories }
            | Self::PipelineRollback { applicable_categories }
            | Self::RetryStepGroup { applicable_categories, .. } => Some(applicable_categories),
            Self::NextStep { .. } | Self::NextStage { .. } | Self::OnSuccess { .. } | Self::OnFail { .. } => None,
        }
    }

    /// Returns true for advisers derived from failure strategies.
    #[must_use]
    pub const fn is_failure_driven(&self) -> bool {
        self.applicable_categories().is_some()
    }
}
