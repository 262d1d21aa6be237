//! Error types for plan compilation.
//!
//! Compilation either produces a complete plan or fails with one of the
//! errors below. Nothing here is recoverable by the compiler itself: every
//! error propagates up the recursive compile and rejects the whole pipeline.

use crate::declarative::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The umbrella error returned by every public compile operation.
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    /// The pipeline definition violates a semantic rule.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A required plan creator was not registered.
    #[error("{0}")]
    Lookup(#[from] LookupError),

    /// A compiled plan broke one of its structural invariants.
    #[error("{0}")]
    Integrity(#[from] IntegrityError),
}

impl PlanError {
    /// Returns diagnostic metadata for this error.
    #[must_use]
    pub fn error_info(&self) -> ErrorInfo {
        match self {
            Self::Config(err) => err.error_info(),
            Self::Lookup(err) => err.error_info(),
            Self::Integrity(err) => err.error_info(),
        }
    }

    /// Returns true if this error is caused by the user's pipeline definition
    /// rather than by an internal wiring fault.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Metadata about a compile error for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "PLAN-001-DUPLICATE_ALL_ERRORS").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Semantic errors in a pipeline definition.
///
/// The `owner` fields carry a human-readable scope such as
/// `step 'deploy'` or `stage 'prod'`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `ALL_ERRORS` was combined with other categories, or declared twice
    /// at the same level.
    #[error("Invalid ALL_ERRORS usage in {owner}: {reason}")]
    DuplicateAllErrors {
        /// The scope declaring the rules.
        owner: String,
        /// What exactly was wrong.
        reason: String,
    },

    /// One error category maps to two different actions at the same level.
    #[error("Conflicting failure actions for {category} in {owner}")]
    ConflictingAction {
        /// The scope declaring the rules.
        owner: String,
        /// The category mapped twice.
        category: ErrorCategory,
    },

    /// An action is nested somewhere it is not allowed.
    #[error("Invalid failure strategy nesting in {owner}: {reason}")]
    InvalidNesting {
        /// The scope declaring the rules.
        owner: String,
        /// What exactly was nested illegally.
        reason: String,
    },

    /// A use-from-stage reference points at an unknown stage, or at a stage
    /// without the referenced section.
    #[error("Stage '{stage}' referenced from {owner} for its {section} was not found")]
    StageNotFound {
        /// The referenced stage identifier.
        stage: String,
        /// The scope holding the reference.
        owner: String,
        /// The section being reused.
        section: String,
    },

    /// Infrastructure declares both a definition and use-from-stage.
    #[error("Infrastructure in {owner} declares both a definition and use-from-stage")]
    ConflictingInfraSource {
        /// The scope declaring the infrastructure.
        owner: String,
    },

    /// Service declares both a definition and use-from-stage.
    #[error("Service in {owner} declares both a definition and use-from-stage")]
    ConflictingServiceSource {
        /// The scope declaring the service.
        owner: String,
    },

    /// A section declares neither a definition nor use-from-stage.
    #[error("The {section} in {owner} declares neither a definition nor use-from-stage")]
    MissingDefinition {
        /// The scope declaring the section.
        owner: String,
        /// The section name.
        section: String,
    },

    /// Retry count or intervals are missing or still expressions.
    #[error("Retry in {owner} has no concrete value for '{field}'")]
    MissingRetryFields {
        /// The scope declaring the rules.
        owner: String,
        /// The offending field.
        field: String,
    },

    /// A list that must contain at least one element is empty.
    #[error("The {section} of {owner} must not be empty")]
    EmptySection {
        /// The scope declaring the list.
        owner: String,
        /// The list name.
        section: String,
    },

    /// An identifier does not match the identifier syntax.
    #[error("Invalid identifier '{identifier}'")]
    InvalidIdentifier {
        /// The offending identifier.
        identifier: String,
    },

    /// An identifier is used twice in one scope.
    #[error("Duplicate identifier '{identifier}' in {owner}")]
    DuplicateIdentifier {
        /// The duplicated identifier.
        identifier: String,
        /// The scope that must hold unique identifiers.
        owner: String,
    },

    /// A step references an outcome nothing has registered.
    #[error("Outcome '{key}' requested by {owner} is not produced by any earlier step")]
    UnresolvedOutcome {
        /// The requesting scope.
        owner: String,
        /// The outcome key.
        key: String,
    },

    /// A stage lacks the mandatory failure strategy.
    #[error("Stage failure strategy missing in {owner}: {reason}")]
    MissingStageFailureStrategy {
        /// The stage scope.
        owner: String,
        /// What is missing.
        reason: String,
    },
}

impl ConfigError {
    /// Returns the stable code of this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DuplicateAllErrors { .. } => "PLAN-001-DUPLICATE_ALL_ERRORS",
            Self::ConflictingAction { .. } => "PLAN-002-CONFLICTING_ACTION",
            Self::InvalidNesting { .. } => "PLAN-003-INVALID_NESTING",
            Self::StageNotFound { .. } => "PLAN-004-STAGE_NOT_FOUND",
            Self::ConflictingInfraSource { .. } => "PLAN-005-CONFLICTING_INFRA_SOURCE",
            Self::ConflictingServiceSource { .. } => "PLAN-006-CONFLICTING_SERVICE_SOURCE",
            Self::MissingDefinition { .. } => "PLAN-007-MISSING_DEFINITION",
            Self::MissingRetryFields { .. } => "PLAN-008-MISSING_RETRY_FIELDS",
            Self::EmptySection { .. } => "PLAN-009-EMPTY_SECTION",
            Self::InvalidIdentifier { .. } => "PLAN-010-INVALID_IDENTIFIER",
            Self::DuplicateIdentifier { .. } => "PLAN-011-DUPLICATE_IDENTIFIER",
            Self::UnresolvedOutcome { .. } => "PLAN-012-UNRESOLVED_OUTCOME",
            Self::MissingStageFailureStrategy { .. } => "PLAN-013-MISSING_STAGE_FAILURE_STRATEGY",
        }
    }

    /// Returns diagnostic metadata for this error.
    #[must_use]
    pub fn error_info(&self) -> ErrorInfo {
        let info = ErrorInfo::new(self.code(), self.to_string());
        match self {
            Self::DuplicateAllErrors { .. } => info.with_fix_hint(
                "Declare ALL_ERRORS alone in a single rule per level.",
            ),
            Self::ConflictingAction { category, .. } => info
                .with_fix_hint("Map each error category to one action per level.")
                .with_context_entry("category", category.to_string()),
            Self::InvalidNesting { .. } => info.with_fix_hint(
                "Retry and manual intervention cannot wrap each other in a cycle, and rollback blocks cannot trigger rollbacks.",
            ),
            Self::StageNotFound { stage, .. } => info
                .with_fix_hint("use-from-stage must reference an earlier stage that defines the section.")
                .with_context_entry("stage", stage.clone()),
            Self::ConflictingInfraSource { .. } | Self::ConflictingServiceSource { .. } => {
                info.with_fix_hint("Remove either the definition or the use-from-stage reference.")
            }
            Self::MissingDefinition { .. } => {
                info.with_fix_hint("Add a definition or a use-from-stage reference.")
            }
            Self::MissingRetryFields { field, .. } => info
                .with_fix_hint("Retry count and intervals must be fixed values at plan creation time.")
                .with_context_entry("field", field.clone()),
            Self::EmptySection { .. } => info.with_fix_hint("Add at least one element."),
            Self::InvalidIdentifier { .. } => info.with_fix_hint(
                "Identifiers start with a letter or underscore and contain only letters, digits, '_' or '$'.",
            ),
            Self::DuplicateIdentifier { identifier, .. } => info
                .with_fix_hint("Rename one of the elements.")
                .with_context_entry("identifier", identifier.clone()),
            Self::UnresolvedOutcome { key, .. } => info
                .with_fix_hint("Only service, environment and infrastructure outcomes of the same stage can be referenced.")
                .with_context_entry("key", key.clone()),
            Self::MissingStageFailureStrategy { .. } => info.with_fix_hint(
                "Add a stage failure strategy whose only error category is ALL_ERRORS.",
            ),
        }
    }
}

/// Internal wiring faults: a plan creator for a node type is missing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    /// No facilitator is registered for a step type.
    #[error("No plan creator registered for step type '{step_type}' (step '{identifier}')")]
    UnknownStepType {
        /// The unregistered step type tag.
        step_type: String,
        /// The step declaring it.
        identifier: String,
    },
}

impl LookupError {
    /// Returns diagnostic metadata for this error.
    #[must_use]
    pub fn error_info(&self) -> ErrorInfo {
        match self {
            Self::UnknownStepType { step_type, .. } => {
                ErrorInfo::new("PLAN-100-UNKNOWN_STEP_TYPE", self.to_string())
                    .with_fix_hint("Register the step type in CompilerConfig::step_facilitators.")
                    .with_context_entry("step_type", step_type.clone())
            }
        }
    }
}

/// Violations of the compiled plan's structural invariants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntegrityError {
    /// Two plan nodes share one id.
    #[error("Plan node id {id} appears more than once")]
    DuplicateNodeId {
        /// The duplicated id.
        id: String,
    },

    /// A node references an id that is not in the plan.
    #[error("Plan node '{from}' references missing node {to}")]
    DanglingReference {
        /// Identifier of the referencing node.
        from: String,
        /// The missing id.
        to: String,
    },

    /// The starting node is not in the plan.
    #[error("Starting node {id} is not part of the plan")]
    MissingStartingNode {
        /// The missing id.
        id: String,
    },
}

impl IntegrityError {
    /// Returns diagnostic metadata for this error.
    #[must_use]
    pub fn error_info(&self) -> ErrorInfo {
        let code = match self {
            Self::DuplicateNodeId { .. } => "PLAN-200-DUPLICATE_NODE_ID",
            Self::DanglingReference { .. } => "PLAN-201-DANGLING_REFERENCE",
            Self::MissingStartingNode { .. } => "PLAN-202-MISSING_STARTING_NODE",
        };
        ErrorInfo::new(code, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_creation() {
        let info = ErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "my_stage");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.summary, "Test error");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"my_stage".to_string()));
    }

    #[test]
    fn test_config_error_codes_are_stable() {
        let err = ConfigError::DuplicateAllErrors {
            owner: "step 'a'".to_string(),
            reason: "declared twice".to_string(),
        };
        assert_eq!(err.code(), "PLAN-001-DUPLICATE_ALL_ERRORS");
        assert!(err.to_string().contains("step 'a'"));
    }

    #[test]
    fn test_conflicting_action_carries_category() {
        let err = ConfigError::ConflictingAction {
            owner: "stage 's1'".to_string(),
            category: ErrorCategory::NetworkError,
        };
        let info = err.error_info();
        assert_eq!(info.context.get("category"), Some(&"NETWORK_ERROR".to_string()));
    }

    #[test]
    fn test_plan_error_wraps_sources() {
        let err: PlanError = LookupError::UnknownStepType {
            step_type: "Mystery".to_string(),
            identifier: "s".to_string(),
        }
        .into();

        assert!(!err.is_user_facing());
        assert_eq!(err.error_info().code, "PLAN-100-UNKNOWN_STEP_TYPE");

        let err: PlanError = ConfigError::EmptySection {
            owner: "stage 's1'".to_string(),
            section: "execution steps".to_string(),
        }
        .into();
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_integrity_error_display() {
        let err = IntegrityError::DanglingReference {
            from: "execution".to_string(),
            to: "abc".to_string(),
        };
        assert!(err.to_string().contains("execution"));
        assert_eq!(err.error_info().code, "PLAN-201-DANGLING_REFERENCE");
    }
}
