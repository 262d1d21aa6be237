//! Compiler configuration.

use crate::errors::LookupError;
use crate::plan::FacilitatorType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for [`PlanCompiler`](crate::creator::PlanCompiler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Default facilitator of each known step type.
    #[serde(default = "default_step_facilitators")]
    pub step_facilitators: BTreeMap<String, FacilitatorType>,
    /// Compile unknown step types with `fallback_facilitator` instead of failing.
    #[serde(default)]
    pub allow_unknown_step_types: bool,
    /// Facilitator for unknown step types when they are allowed.
    #[serde(default)]
    pub fallback_facilitator: FacilitatorType,
    /// Require every stage to declare an `ALL_ERRORS` failure strategy.
    #[serde(default)]
    pub require_stage_failure_strategy: bool,
    /// Check identifier syntax and uniqueness.
    #[serde(default = "default_true")]
    pub validate_identifiers: bool,
}

fn default_true() -> bool {
    true
}

fn default_step_facilitators() -> BTreeMap<String, FacilitatorType> {
    const TASK_CHAIN: [&str; 7] = [
        "ShellScript",
        "Http",
        "K8sRollingDeploy",
        "K8sRollingRollback",
        "K8sApply",
        "TerraformApply",
        "TerraformRollback",
    ];
    const SYNC: [&str; 4] = ["Wait", "Barrier", "HarnessApproval", "Email"];

    TASK_CHAIN
        .iter()
        .map(|name| ((*name).to_string(), FacilitatorType::TaskChain))
        .chain(SYNC.iter().map(|name| ((*name).to_string(), FacilitatorType::Sync)))
        .collect()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            step_facilitators: default_step_facilitators(),
            allow_unknown_step_types: false,
            fallback_facilitator: FacilitatorType::default(),
            require_stage_failure_strategy: false,
            validate_identifiers: default_true(),
        }
    }
}

impl CompilerConfig {
    /// Creates a configuration with the built-in step types.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error for malformed input.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Registers a step type.
    #[must_use]
    pub fn with_step_type(mut self, step_type: impl Into<String>, facilitator: FacilitatorType) -> Self {
        self.step_facilitators.insert(step_type.into(), facilitator);
        self
    }

    /// Allows unknown step types, compiling them with `facilitator`.
    #[must_use]
    pub const fn with_unknown_step_types(mut self, facilitator: FacilitatorType) -> Self {
        self.allow_unknown_step_types = true;
        self.fallback_facilitator = facilitator;
        self
    }

    /// Sets whether stages must declare an `ALL_ERRORS` failure strategy.
    #[must_use]
    pub const fn with_required_stage_failure_strategy(mut self, required: bool) -> Self {
        self.require_stage_failure_strategy = required;
        self
    }

    /// Sets whether identifiers are validated.
    #[must_use]
    pub const fn with_identifier_validation(mut self, enabled: bool) -> Self {
        self.validate_identifiers = enabled;
        self
    }

    /// The facilitator for a step type.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::UnknownStepType` if the type is not registered
    /// and unknown types are not allowed.
    pub fn facilitator_for(&self, step_type: &str, identifier: &str) -> Result<FacilitatorType, LookupError> {
        match self.step_facilitators.get(step_type) {
            Some(facilitator) => Ok(*facilitator),
            None if self.allow_unknown_step_types => Ok(self.fallback_facilitator),
            None => Err(LookupError::UnknownStepType {
                step_type: step_type.to_string(),
                identifier: identifier.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_step_types() {
        let config = CompilerConfig::default();
        assert_eq!(config.facilitator_for("ShellScript", "a"), Ok(FacilitatorType::TaskChain));
        assert_eq!(config.facilitator_for("HarnessApproval", "a"), Ok(FacilitatorType::Sync));
        assert!(config.validate_identifiers);
        assert!(!config.require_stage_failure_strategy);
    }

    #[test]
    fn test_unknown_step_type_is_lookup_error() {
        let err = CompilerConfig::default().facilitator_for("Mystery", "a").unwrap_err();
        assert_eq!(
            err,
            LookupError::UnknownStepType {
                step_type: "Mystery".to_string(),
                identifier: "a".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_step_type_fallback() {
        let config = CompilerConfig::new().with_unknown_step_types(FacilitatorType::TaskChain);
        assert_eq!(config.facilitator_for("Mystery", "a"), Ok(FacilitatorType::TaskChain));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = CompilerConfig::from_json_str(
            r#"{ "require_stage_failure_strategy": true, "step_facilitators": { "Custom": "CHILD_CHAIN" } }"#,
        )
        .unwrap();

        // An explicit map replaces the built-ins.
        assert!(config.require_stage_failure_strategy);
        assert_eq!(config.facilitator_for("Custom", "a"), Ok(FacilitatorType::ChildChain));
        assert!(config.facilitator_for("ShellScript", "a").is_err());
        assert!(config.validate_identifiers);
    }

    #[test]
    fn test_with_step_type_registers() {
        let config = CompilerConfig::new().with_step_type("Custom", FacilitatorType::Child);
        assert_eq!(config.facilitator_for("Custom", "a"), Ok(FacilitatorType::Child));
        assert_eq!(config.facilitator_for("Wait", "a"), Ok(FacilitatorType::Sync));
    }
}
