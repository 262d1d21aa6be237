//! Declarative pipelines, stages and stage sections.

use super::execution::{ExecutionBlock, ExecutionElement};
use super::failure::FailureStrategyConfig;
use serde::{Deserialize, Serialize};

/// Reference to a section defined by an earlier stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseFromStage {
    /// Identifier of the stage to copy from.
    pub stage: String,
}

/// An explicit service definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    /// The referenced service entity.
    pub service_ref: String,
    /// Service-specific configuration.
    #[serde(default)]
    pub spec: serde_json::Value,
}

/// The service section of a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Explicit definition.
    #[serde(default)]
    pub definition: Option<ServiceDefinition>,
    /// Reuse the service of an earlier stage.
    #[serde(default)]
    pub use_from_stage: Option<UseFromStage>,
}

impl ServiceConfig {
    /// Creates a service section with an explicit definition.
    #[must_use]
    pub fn from_ref(service_ref: impl Into<String>) -> Self {
        Self {
            definition: Some(ServiceDefinition {
                service_ref: service_ref.into(),
                spec: serde_json::Value::Null,
            }),
            use_from_stage: None,
        }
    }

    /// Creates a service section reusing an earlier stage's service.
    #[must_use]
    pub fn use_from_stage(stage: impl Into<String>) -> Self {
        Self {
            definition: None,
            use_from_stage: Some(UseFromStage { stage: stage.into() }),
        }
    }
}

/// An explicit environment and infrastructure definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureDefinition {
    /// The referenced environment entity.
    pub environment_ref: String,
    /// The referenced infrastructure entity.
    pub infrastructure_ref: String,
    /// Infrastructure-specific configuration.
    #[serde(default)]
    pub spec: serde_json::Value,
}

/// Steps that provision infrastructure before it is resolved.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProvisionerBlock {
    /// Provisioning steps in document order.
    #[serde(default)]
    pub steps: Vec<ExecutionElement>,
}

/// The infrastructure section of a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureConfig {
    /// Explicit definition.
    #[serde(default)]
    pub definition: Option<InfrastructureDefinition>,
    /// Reuse the infrastructure of an earlier stage.
    #[serde(default)]
    pub use_from_stage: Option<UseFromStage>,
    /// Optional provisioning steps.
    #[serde(default)]
    pub provisioner: Option<ProvisionerBlock>,
}

impl InfrastructureConfig {
    /// Creates an infrastructure section with an explicit definition.
    #[must_use]
    pub fn new(environment_ref: impl Into<String>, infrastructure_ref: impl Into<String>) -> Self {
        Self {
            definition: Some(InfrastructureDefinition {
                environment_ref: environment_ref.into(),
                infrastructure_ref: infrastructure_ref.into(),
                spec: serde_json::Value::Null,
            }),
            use_from_stage: None,
            provisioner: None,
        }
    }

    /// Creates an infrastructure section reusing an earlier stage's.
    #[must_use]
    pub fn use_from_stage(stage: impl Into<String>) -> Self {
        Self {
            definition: None,
            use_from_stage: Some(UseFromStage { stage: stage.into() }),
            provisioner: None,
        }
    }

    /// Sets the provisioning steps.
    #[must_use]
    pub fn with_provisioner(mut self, steps: impl IntoIterator<Item = impl Into<ExecutionElement>>) -> Self {
        self.provisioner = Some(ProvisionerBlock {
            steps: steps.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// A deployment-shaped stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    /// Identifier, unique within the pipeline.
    pub identifier: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Runtime condition gating the stage.
    #[serde(default)]
    pub when: Option<String>,
    /// Timeout, passed through untouched.
    #[serde(default)]
    pub timeout: Option<String>,
    /// Failure rules declared on the stage.
    #[serde(default)]
    pub failure_strategies: Vec<FailureStrategyConfig>,
    /// Service section.
    #[serde(default)]
    pub service: Option<ServiceConfig>,
    /// Infrastructure section.
    #[serde(default)]
    pub infrastructure: Option<InfrastructureConfig>,
    /// Execution section.
    pub execution: ExecutionBlock,
}

impl Stage {
    /// Creates a stage with only an execution section.
    #[must_use]
    pub fn new(identifier: impl Into<String>, execution: ExecutionBlock) -> Self {
        let identifier = identifier.into();
        Self {
            name: identifier.clone(),
            identifier,
            when: None,
            timeout: None,
            failure_strategies: Vec::new(),
            service: None,
            infrastructure: None,
            execution,
        }
    }

    /// Sets the service section.
    #[must_use]
    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.service = Some(service);
        self
    }

    /// Sets the infrastructure section.
    #[must_use]
    pub fn with_infrastructure(mut self, infrastructure: InfrastructureConfig) -> Self {
        self.infrastructure = Some(infrastructure);
        self
    }

    /// Adds a failure rule.
    #[must_use]
    pub fn with_failure_strategy(mut self, rule: FailureStrategyConfig) -> Self {
        self.failure_strategies.push(rule);
        self
    }

    /// Sets the when condition.
    #[must_use]
    pub fn with_when(mut self, when: impl Into<String>) -> Self {
        self.when = Some(when.into());
        self
    }
}

/// A pipeline: an ordered list of stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    /// Pipeline identifier.
    pub identifier: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Stages in execution order.
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            name: identifier.clone(),
            identifier,
            stages: Vec::new(),
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Gets a stage by identifier.
    #[must_use]
    pub fn get_stage(&self, identifier: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.identifier == identifier)
    }
}
