//! Declarative execution blocks: steps, step groups and parallel blocks.

use super::failure::FailureStrategyConfig;
use serde::{Deserialize, Serialize};

/// A leaf unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Identifier, unique within the stage.
    pub identifier: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Step type tag (e.g. "ShellScript").
    #[serde(rename = "type")]
    pub step_type: String,
    /// Type-specific configuration, passed through untouched.
    #[serde(default)]
    pub spec: serde_json::Value,
    /// Timeout, passed through untouched.
    #[serde(default)]
    pub timeout: Option<String>,
    /// Runtime condition gating the step.
    #[serde(default)]
    pub when: Option<String>,
    /// Runtime condition skipping the step.
    #[serde(default)]
    pub skip_condition: Option<String>,
    /// Failure rules declared on this step.
    #[serde(default)]
    pub failure_strategies: Vec<FailureStrategyConfig>,
    /// Stage outcomes this step consumes (e.g. "service").
    #[serde(default)]
    pub outcome_refs: Vec<String>,
}

impl Step {
    /// Creates a new step.
    #[must_use]
    pub fn new(identifier: impl Into<String>, step_type: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            name: identifier.clone(),
            identifier,
            step_type: step_type.into(),
            spec: serde_json::Value::Null,
            timeout: None,
            when: None,
            skip_condition: None,
            failure_strategies: Vec::new(),
            outcome_refs: Vec::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the type-specific configuration.
    #[must_use]
    pub fn with_spec(mut self, spec: serde_json::Value) -> Self {
        self.spec = spec;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// Sets the when condition.
    #[must_use]
    pub fn with_when(mut self, when: impl Into<String>) -> Self {
        self.when = Some(when.into());
        self
    }

    /// Sets the skip condition.
    #[must_use]
    pub fn with_skip_condition(mut self, condition: impl Into<String>) -> Self {
        self.skip_condition = Some(condition.into());
        self
    }

    /// Adds a failure rule.
    #[must_use]
    pub fn with_failure_strategy(mut self, rule: FailureStrategyConfig) -> Self {
        self.failure_strategies.push(rule);
        self
    }

    /// Adds an outcome reference.
    #[must_use]
    pub fn with_outcome_ref(mut self, key: impl Into<String>) -> Self {
        self.outcome_refs.push(key.into());
        self
    }
}

/// A named group of steps with optional rollback steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepGroup {
    /// Identifier, unique within the stage.
    pub identifier: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Forward steps.
    #[serde(default)]
    pub steps: Vec<ExecutionElement>,
    /// Steps run when the group is rolled back.
    #[serde(default)]
    pub rollback_steps: Vec<ExecutionElement>,
    /// Failure rules declared on the group.
    #[serde(default)]
    pub failure_strategies: Vec<FailureStrategyConfig>,
    /// Runtime condition gating the group.
    #[serde(default)]
    pub when: Option<String>,
}

impl StepGroup {
    /// Creates an empty step group.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            name: identifier.clone(),
            identifier,
            steps: Vec::new(),
            rollback_steps: Vec::new(),
            failure_strategies: Vec::new(),
            when: None,
        }
    }

    /// Sets the forward steps.
    #[must_use]
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = impl Into<ExecutionElement>>) -> Self {
        self.steps = steps.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the rollback steps.
    #[must_use]
    pub fn with_rollback_steps(
        mut self,
        steps: impl IntoIterator<Item = impl Into<ExecutionElement>>,
    ) -> Self {
        self.rollback_steps = steps.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a failure rule.
    #[must_use]
    pub fn with_failure_strategy(mut self, rule: FailureStrategyConfig) -> Self {
        self.failure_strategies.push(rule);
        self
    }

    /// Returns true if the group declares rollback steps.
    #[must_use]
    pub fn has_rollback(&self) -> bool {
        !self.rollback_steps.is_empty()
    }
}

/// Sections that run side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelBlock {
    /// Identifier, unique within the stage.
    pub identifier: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// The parallel sections.
    #[serde(default)]
    pub sections: Vec<ExecutionElement>,
}

impl ParallelBlock {
    /// Creates a parallel block.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        sections: impl IntoIterator<Item = impl Into<ExecutionElement>>,
    ) -> Self {
        let identifier = identifier.into();
        Self {
            name: identifier.clone(),
            identifier,
            sections: sections.into_iter().map(Into::into).collect(),
        }
    }

    /// Step groups among the sections that declare rollback steps.
    pub fn step_groups_with_rollback(&self) -> impl Iterator<Item = &StepGroup> {
        self.sections.iter().filter_map(|section| match section {
            ExecutionElement::StepGroup(group) if group.has_rollback() => Some(group),
            _ => None,
        })
    }
}

/// One element of an ordered step list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionElement {
    /// A single step.
    Step(Step),
    /// A step group.
    StepGroup(StepGroup),
    /// A parallel block.
    Parallel(ParallelBlock),
}

impl ExecutionElement {
    /// The element's identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Step(step) => &step.identifier,
            Self::StepGroup(group) => &group.identifier,
            Self::Parallel(block) => &block.identifier,
        }
    }

    /// Appends this element's identifier and every nested identifier.
    pub fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(self.identifier());
        match self {
            Self::Step(_) => {}
            Self::StepGroup(group) => {
                for element in group.steps.iter().chain(&group.rollback_steps) {
                    element.collect_identifiers(out);
                }
            }
            Self::Parallel(block) => {
                for element in &block.sections {
                    element.collect_identifiers(out);
                }
            }
        }
    }
}

impl From<Step> for ExecutionElement {
    fn from(step: Step) -> Self {
        Self::Step(step)
    }
}

impl From<StepGroup> for ExecutionElement {
    fn from(group: StepGroup) -> Self {
        Self::StepGroup(group)
    }
}

impl From<ParallelBlock> for ExecutionElement {
    fn from(block: ParallelBlock) -> Self {
        Self::Parallel(block)
    }
}

/// The execution section of a stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionBlock {
    /// Forward steps in document order.
    #[serde(default)]
    pub steps: Vec<ExecutionElement>,
    /// Stage-level rollback steps.
    #[serde(default)]
    pub rollback_steps: Vec<ExecutionElement>,
}

impl ExecutionBlock {
    /// Creates an execution block.
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = impl Into<ExecutionElement>>) -> Self {
        Self {
            steps: steps.into_iter().map(Into::into).collect(),
            rollback_steps: Vec::new(),
        }
    }

    /// Sets the stage-level rollback steps.
    #[must_use]
    pub fn with_rollback_steps(
        mut self,
        steps: impl IntoIterator<Item = impl Into<ExecutionElement>>,
    ) -> Self {
        self.rollback_steps = steps.into_iter().map(Into::into).collect();
        self
    }

    /// Every identifier declared anywhere in the block.
    #[must_use]
    pub fn all_identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for element in self.steps.iter().chain(&self.rollback_steps) {
            element.collect_identifiers(&mut out);
        }
        out
    }
}
