//! Declarative failure strategies.
//!
//! A failure strategy maps error categories to the action the runtime takes
//! when a node fails with one of them. Strategies may be declared on steps,
//! step groups and stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a runtime failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Matches every category not explicitly mapped at the same level.
    AllErrors,
    /// Failure with no better classification.
    Unknown,
    /// Connectivity problems.
    NetworkError,
    /// Credentials were rejected.
    Authentication,
    /// Credentials lack permissions.
    Authorization,
    /// A verification step failed.
    Verification,
    /// No delegate could be provisioned.
    DelegateProvisioning,
    /// The node timed out.
    Timeout,
    /// A policy evaluation denied the node.
    PolicyEvaluation,
    /// A runtime input was not supplied in time.
    InputTimeout,
    /// An approval was rejected.
    ApprovalRejection,
    /// The delegate restarted while running the node.
    DelegateRestart,
    /// A user marked the node as failed.
    UserMarkedFailure,
}

impl ErrorCategory {
    /// Every concrete category, i.e. everything `ALL_ERRORS` expands to.
    pub const CONCRETE: [Self; 12] = [
        Self::Unknown,
        Self::NetworkError,
        Self::Authentication,
        Self::Authorization,
        Self::Verification,
        Self::DelegateProvisioning,
        Self::Timeout,
        Self::PolicyEvaluation,
        Self::InputTimeout,
        Self::ApprovalRejection,
        Self::DelegateRestart,
        Self::UserMarkedFailure,
    ];

    /// Returns true for the `ALL_ERRORS` wildcard.
    #[must_use]
    pub const fn is_all_errors(&self) -> bool {
        matches!(self, Self::AllErrors)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AllErrors => "ALL_ERRORS",
            Self::Unknown => "UNKNOWN",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Authentication => "AUTHENTICATION",
            Self::Authorization => "AUTHORIZATION",
            Self::Verification => "VERIFICATION",
            Self::DelegateProvisioning => "DELEGATE_PROVISIONING",
            Self::Timeout => "TIMEOUT",
            Self::PolicyEvaluation => "POLICY_EVALUATION",
            Self::InputTimeout => "INPUT_TIMEOUT",
            Self::ApprovalRejection => "APPROVAL_REJECTION",
            Self::DelegateRestart => "DELEGATE_RESTART",
            Self::UserMarkedFailure => "USER_MARKED_FAILURE",
        };
        f.write_str(name)
    }
}

/// A field that holds either a fixed value or an unresolved expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param<T> {
    /// A concrete value.
    Value(T),
    /// An expression resolved later, at runtime.
    Expression(String),
}

impl<T> Param<T> {
    /// Returns the value if it is concrete.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Expression(_) => None,
        }
    }

    /// Returns true if this is still an expression.
    #[must_use]
    pub const fn is_expression(&self) -> bool {
        matches!(self, Self::Expression(_))
    }
}

impl<T> From<T> for Param<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

/// What the runtime does when a failure matches a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum ActionConfig {
    /// Ignore the failure and continue with the next node.
    Ignore,
    /// Retry the node, then apply `on_retry_failure`.
    #[serde(rename_all = "camelCase")]
    Retry {
        /// How many times to retry.
        retry_count: Option<Param<u32>>,
        /// Wait intervals between attempts (e.g. "1s", "10s").
        retry_intervals: Option<Param<Vec<String>>>,
        /// Action once retries are exhausted.
        on_retry_failure: Box<ActionConfig>,
    },
    /// Pause for a human decision, applying `on_timeout` if none comes.
    #[serde(rename_all = "camelCase")]
    ManualIntervention {
        /// How long to wait (carried through to the runtime).
        timeout: Option<String>,
        /// Action once the wait times out.
        on_timeout: Box<ActionConfig>,
    },
    /// Mark the node as succeeded and continue.
    MarkAsSuccess,
    /// Mark the node as failed and continue.
    MarkAsFailure,
    /// Abort the pipeline.
    Abort,
    /// Roll back the enclosing stage.
    StageRollback,
    /// Roll back the enclosing step group.
    StepGroupRollback,
    /// Roll back the whole pipeline.
    PipelineRollback,
    /// Retry the enclosing step group from its first step.
    #[serde(rename_all = "camelCase")]
    RetryStepGroup {
        /// How many times to retry.
        retry_count: Option<Param<u32>>,
        /// Wait intervals between attempts.
        retry_intervals: Option<Param<Vec<String>>>,
    },
}

impl ActionConfig {
    /// Creates a retry action with concrete fields.
    #[must_use]
    pub fn retry(count: u32, intervals: &[&str], on_retry_failure: Self) -> Self {
        Self::Retry {
            retry_count: Some(Param::Value(count)),
            retry_intervals: Some(Param::Value(intervals.iter().map(|s| (*s).to_string()).collect())),
            on_retry_failure: Box::new(on_retry_failure),
        }
    }

    /// Creates a manual intervention action.
    #[must_use]
    pub fn manual_intervention(timeout: impl Into<String>, on_timeout: Self) -> Self {
        Self::ManualIntervention {
            timeout: Some(timeout.into()),
            on_timeout: Box::new(on_timeout),
        }
    }

    /// Creates a step group retry with concrete fields.
    #[must_use]
    pub fn retry_step_group(count: u32, intervals: &[&str]) -> Self {
        Self::RetryStepGroup {
            retry_count: Some(Param::Value(count)),
            retry_intervals: Some(Param::Value(intervals.iter().map(|s| (*s).to_string()).collect())),
        }
    }

    /// Short name used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ignore => "Ignore",
            Self::Retry { .. } => "Retry",
            Self::ManualIntervention { .. } => "ManualIntervention",
            Self::MarkAsSuccess => "MarkAsSuccess",
            Self::MarkAsFailure => "MarkAsFailure",
            Self::Abort => "Abort",
            Self::StageRollback => "StageRollback",
            Self::StepGroupRollback => "StepGroupRollback",
            Self::PipelineRollback => "PipelineRollback",
            Self::RetryStepGroup { .. } => "RetryStepGroup",
        }
    }

    /// Returns true for both retry flavours.
    #[must_use]
    pub const fn is_retry(&self) -> bool {
        matches!(self, Self::Retry { .. } | Self::RetryStepGroup { .. })
    }

    /// Returns true for actions that trigger a stage or step group rollback.
    #[must_use]
    pub const fn is_local_rollback(&self) -> bool {
        matches!(self, Self::StageRollback | Self::StepGroupRollback)
    }
}

/// One failure rule: a set of categories and the action they trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureStrategyConfig {
    /// Categories the rule applies to.
    #[serde(alias = "errors")]
    pub error_categories: Vec<ErrorCategory>,
    /// The action to take.
    pub action: ActionConfig,
}

impl FailureStrategyConfig {
    /// Creates a new rule.
    #[must_use]
    pub fn new(categories: impl IntoIterator<Item = ErrorCategory>, action: ActionConfig) -> Self {
        Self {
            error_categories: categories.into_iter().collect(),
            action,
        }
    }

    /// Creates a rule covering every category.
    #[must_use]
    pub fn all_errors(action: ActionConfig) -> Self {
        Self::new([ErrorCategory::AllErrors], action)
    }

    /// Returns true if this rule's only category is `ALL_ERRORS`.
    #[must_use]
    pub fn is_all_errors_only(&self) -> bool {
        self.error_categories.len() == 1 && self.error_categories[0].is_all_errors()
    }
}
