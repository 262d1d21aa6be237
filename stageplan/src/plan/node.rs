//! Compiled plan nodes.

use super::adviser::Adviser;
use crate::utils::PlanNodeId;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// How the runtime dispatches a node and waits for its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FacilitatorType {
    /// Run inline, no children.
    #[default]
    Sync,
    /// Run a single child.
    Child,
    /// Run children one after another.
    ChildChain,
    /// Run all children side by side and wait for all.
    Children,
    /// Run a chain of delegate tasks.
    TaskChain,
}

impl fmt::Display for FacilitatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => write!(f, "SYNC"),
            Self::Child => write!(f, "CHILD"),
            Self::ChildChain => write!(f, "CHILD_CHAIN"),
            Self::Children => write!(f, "CHILDREN"),
            Self::TaskChain => write!(f, "TASK_CHAIN"),
        }
    }
}

/// Tag naming the runtime behaviour of a node.
///
/// Opaque to the compiler except for routing. Structural nodes use the
/// associated constants; leaf steps carry their declared step type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepType(Cow<'static, str>);

impl StepType {
    /// Root of a pipeline.
    pub const PIPELINE_SECTION: Self = Self(Cow::Borrowed("PIPELINE_SECTION"));
    /// A deployment stage.
    pub const DEPLOYMENT_STAGE: Self = Self(Cow::Borrowed("DEPLOYMENT_STAGE_STEP"));
    /// Service resolution.
    pub const SERVICE_STEP: Self = Self(Cow::Borrowed("SERVICE_STEP"));
    /// Environment resolution.
    pub const ENVIRONMENT_STEP: Self = Self(Cow::Borrowed("ENVIRONMENT_STEP"));
    /// Infrastructure resolution.
    pub const INFRASTRUCTURE_STEP: Self = Self(Cow::Borrowed("INFRASTRUCTURE_STEP"));
    /// Chain of environment, provisioner and infrastructure.
    pub const INFRASTRUCTURE_SECTION: Self = Self(Cow::Borrowed("INFRASTRUCTURE_SECTION"));
    /// Chain of provisioning steps.
    pub const PROVISIONER_SECTION: Self = Self(Cow::Borrowed("PROVISIONER_SECTION"));
    /// A chain of children (execution and rollback blocks).
    pub const SECTION_CHAIN: Self = Self(Cow::Borrowed("SECTION_CHAIN"));
    /// A step group.
    pub const STEP_GROUP: Self = Self(Cow::Borrowed("STEP_GROUP"));
    /// A parallel block.
    pub const FORK: Self = Self(Cow::Borrowed("NG_FORK"));
    /// Chain of gated rollback children.
    pub const ROLLBACK_OPTIONAL_CHILD_CHAIN: Self = Self(Cow::Borrowed("ROLLBACK_OPTIONAL_CHILD_CHAIN"));
    /// Fan-out of gated rollback children.
    pub const ROLLBACK_OPTIONAL_CHILDREN: Self = Self(Cow::Borrowed("ROLLBACK_OPTIONAL_CHILDREN"));

    /// A leaf step type.
    #[must_use]
    pub fn step(step_type: impl Into<String>) -> Self {
        Self(Cow::Owned(step_type.into()))
    }

    /// The tag as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical group a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeGroup {
    /// The pipeline root.
    Pipeline,
    /// A stage.
    Stage,
    /// Service resolution.
    Service,
    /// Environment resolution.
    Environment,
    /// Infrastructure resolution and its section.
    Infrastructure,
    /// Provisioning steps.
    Provisioner,
    /// The execution section.
    Execution,
    /// A step group.
    StepGroup,
    /// A parallel block.
    Parallel,
    /// A leaf step.
    Step,
    /// Any rollback node.
    Rollback,
}

impl fmt::Display for NodeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline => write!(f, "PIPELINE"),
            Self::Stage => write!(f, "STAGE"),
            Self::Service => write!(f, "SERVICE"),
            Self::Environment => write!(f, "ENVIRONMENT"),
            Self::Infrastructure => write!(f, "INFRASTRUCTURE"),
            Self::Provisioner => write!(f, "PROVISIONER"),
            Self::Execution => write!(f, "EXECUTION"),
            Self::StepGroup => write!(f, "STEP_GROUP"),
            Self::Parallel => write!(f, "PARALLEL"),
            Self::Step => write!(f, "STEP"),
            Self::Rollback => write!(f, "ROLLBACK"),
        }
    }
}

/// A rollback child gated on the runtime status of a forward node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackNode {
    /// The rollback node to run.
    pub node_id: PlanNodeId,
    /// Fully-qualified path of the forward node whose status gates this one.
    pub dependent_node_identifier: String,
    /// Run regardless of the forward node's status.
    pub should_always_run: bool,
}

impl RollbackNode {
    /// A rollback child that only runs if its forward node ran.
    #[must_use]
    pub fn gated(node_id: PlanNodeId, dependent_node_identifier: impl Into<String>) -> Self {
        Self {
            node_id,
            dependent_node_identifier: dependent_node_identifier.into(),
            should_always_run: false,
        }
    }

    /// A rollback child that runs regardless of sibling outcomes.
    #[must_use]
    pub fn always(node_id: PlanNodeId, dependent_node_identifier: impl Into<String>) -> Self {
        Self {
            node_id,
            dependent_node_identifier: dependent_node_identifier.into(),
            should_always_run: true,
        }
    }
}

/// Parameters of a service resolution node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceParameters {
    /// The resolved service entity.
    pub service_ref: String,
    /// Service configuration.
    pub spec: serde_json::Value,
    /// The stage the definition was copied from, if any.
    pub use_from_stage: Option<String>,
}

/// Parameters of an environment resolution node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentParameters {
    /// The resolved environment entity.
    pub environment_ref: String,
    /// The stage the definition was copied from, if any.
    pub use_from_stage: Option<String>,
}

/// Parameters of an infrastructure resolution node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureParameters {
    /// The environment the infrastructure belongs to.
    pub environment_ref: String,
    /// The resolved infrastructure entity.
    pub infrastructure_ref: String,
    /// Infrastructure configuration.
    pub spec: serde_json::Value,
    /// The stage the definition was copied from, if any.
    pub use_from_stage: Option<String>,
}

/// Parameters of a leaf step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSpecParameters {
    /// The declared step type.
    pub step_type: String,
    /// Type-specific configuration.
    pub spec: serde_json::Value,
    /// Outcome key to producing node, resolved through the dependency registry.
    pub outcome_dependencies: BTreeMap<String, PlanNodeId>,
}

/// Parameter payload of a node; exactly one shape per step type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StepParameters {
    /// A single child.
    #[serde(rename_all = "camelCase")]
    Child {
        /// The child to run.
        child_node_id: PlanNodeId,
    },
    /// Children run in order.
    #[serde(rename_all = "camelCase")]
    ChildChain {
        /// The children, in execution order.
        child_node_ids: Vec<PlanNodeId>,
    },
    /// Children run side by side.
    #[serde(rename_all = "camelCase")]
    Children {
        /// The children.
        child_node_ids: Vec<PlanNodeId>,
    },
    /// Gated rollback children run in order.
    RollbackChain {
        /// The gated children, in execution order.
        children: Vec<RollbackNode>,
    },
    /// Gated rollback children run side by side.
    RollbackChildren {
        /// The gated children.
        children: Vec<RollbackNode>,
    },
    /// Service resolution.
    Service(ServiceParameters),
    /// Environment resolution.
    Environment(EnvironmentParameters),
    /// Infrastructure resolution.
    Infrastructure(InfrastructureParameters),
    /// A leaf step.
    Step(StepSpecParameters),
}

impl StepParameters {
    /// Every node id these parameters reference.
    #[must_use]
    pub fn referenced_node_ids(&self) -> Vec<PlanNodeId> {
        match self {
            Self::Child { child_node_id } => vec![*child_node_id],
            Self::ChildChain { child_node_ids } | Self::Children { child_node_ids } => child_node_ids.clone(),
            Self::RollbackChain { children } | Self::RollbackChildren { children } => {
                children.iter().map(|c| c.node_id).collect()
            }
            Self::Step(params) => params.outcome_dependencies.values().copied().collect(),
            Self::Service(_) | Self::Environment(_) | Self::Infrastructure(_) => Vec::new(),
        }
    }

    /// The gated rollback children, if these are rollback parameters.
    #[must_use]
    pub fn rollback_children(&self) -> &[RollbackNode] {
        match self {
            Self::RollbackChain { children } | Self::RollbackChildren { children } => children,
            _ => &[],
        }
    }

    /// The ordered child ids of chain and fan-out parameters.
    #[must_use]
    pub fn child_node_ids(&self) -> &[PlanNodeId] {
        match self {
            Self::Child { child_node_id } => std::slice::from_ref(child_node_id),
            Self::ChildChain { child_node_ids } | Self::Children { child_node_ids } => child_node_ids,
            _ => &[],
        }
    }
}

/// One compiled unit of runtime work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanNode {
    /// Globally unique id.
    pub id: PlanNodeId,
    /// Human-facing identifier.
    pub identifier: String,
    /// Human-facing name.
    pub name: String,
    /// Runtime behaviour tag.
    pub step_type: StepType,
    /// Logical group.
    pub group: NodeGroup,
    /// Parameter payload.
    pub step_parameters: StepParameters,
    /// Child dispatch strategy.
    pub facilitator: FacilitatorType,
    /// Advisers in evaluation order.
    pub advisers: Vec<Adviser>,
    /// Whether expressions resolve through this node.
    pub skip_expression_chain: bool,
    /// Runtime skip condition.
    pub skip_condition: Option<String>,
    /// Runtime when condition.
    pub when_condition: Option<String>,
    /// Timeout, carried through.
    pub timeout: Option<String>,
}

impl PlanNode {
    /// Creates a node without advisers or conditions.
    #[must_use]
    pub fn new(
        id: PlanNodeId,
        identifier: impl Into<String>,
        name: impl Into<String>,
        step_type: StepType,
        group: NodeGroup,
        step_parameters: StepParameters,
        facilitator: FacilitatorType,
    ) -> Self {
        Self {
            id,
            identifier: identifier.into(),
            name: name.into(),
            step_type,
            group,
            step_parameters,
            facilitator,
            advisers: Vec::new(),
            skip_expression_chain: false,
            skip_condition: None,
            when_condition: None,
            timeout: None,
        }
    }

    /// Sets the advisers.
    #[must_use]
    pub fn with_advisers(mut self, advisers: Vec<Adviser>) -> Self {
        self.advisers = advisers;
        self
    }

    /// Marks the node as skipped in the expression chain.
    #[must_use]
    pub const fn skip_expression_chain(mut self, skip: bool) -> Self {
        self.skip_expression_chain = skip;
        self
    }

    /// Sets the skip condition.
    #[must_use]
    pub fn with_skip_condition(mut self, condition: Option<String>) -> Self {
        self.skip_condition = condition;
        self
    }

    /// Sets the when condition.
    #[must_use]
    pub fn with_when_condition(mut self, condition: Option<String>) -> Self {
        self.when_condition = condition;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<String>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Every node id referenced by parameters or advisers.
    #[must_use]
    pub fn referenced_node_ids(&self) -> Vec<PlanNodeId> {
        let mut ids = self.step_parameters.referenced_node_ids();
        ids.extend(self.advisers.iter().filter_map(Adviser::next_node_id));
        ids
    }
}
