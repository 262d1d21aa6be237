//! Declarative fixtures for compiler tests.

use crate::config::CompilerConfig;
use crate::creator::{PlanCompiler, StepDependencyRegistry};
use crate::declarative::{
    ExecutionBlock, ExecutionElement, InfrastructureConfig, Pipeline, ServiceConfig, Stage, Step,
    StepGroup,
};
use crate::errors::PlanError;
use crate::plan::Plan;

/// A shell step.
#[must_use]
pub fn shell_step(identifier: &str) -> Step {
    Step::new(identifier, "ShellScript")
}

/// A stage with a service, an infrastructure and a two-step execution.
#[must_use]
pub fn standard_deployment_stage(identifier: &str) -> Stage {
    Stage::new(
        identifier,
        ExecutionBlock::new([shell_step("prepare"), shell_step("rollout")]),
    )
    .with_service(ServiceConfig::from_ref("svc"))
    .with_infrastructure(InfrastructureConfig::new("env", "infra"))
}

/// A stage whose execution is `[sg_a, plain, sg_b]`, where both step
/// groups declare rollback steps.
#[must_use]
pub fn rollback_stage(identifier: &str) -> Stage {
    let group = |id: &str| {
        StepGroup::new(id)
            .with_steps([shell_step(&format!("{id}_apply"))])
            .with_rollback_steps([shell_step(&format!("{id}_revert"))])
    };
    Stage::new(
        identifier,
        ExecutionBlock::new([
            ExecutionElement::from(group("sg_a")),
            shell_step("plain").into(),
            group("sg_b").into(),
        ]),
    )
}

/// A pipeline builder for tests.
#[derive(Debug, Clone)]
pub struct TestPipeline {
    pipeline: Pipeline,
}

impl TestPipeline {
    /// Creates an empty test pipeline.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            pipeline: Pipeline::new(identifier),
        }
    }

    /// Adds a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.pipeline.stages.push(stage);
        self
    }

    /// Creates a pipeline of `count` single-step stages named `s0`, `s1`, ...
    #[must_use]
    pub fn linear(identifier: impl Into<String>, count: usize) -> Self {
        (0..count).fold(Self::new(identifier), |builder, index| {
            builder.with_stage(Stage::new(
                format!("s{index}"),
                ExecutionBlock::new([shell_step("step")]),
            ))
        })
    }

    /// Stage identifiers in order.
    #[must_use]
    pub fn stage_identifiers(&self) -> Vec<&str> {
        self.pipeline.stages.iter().map(|s| s.identifier.as_str()).collect()
    }

    /// The built pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}

/// A compiler plus the registry of its last compile.
#[derive(Debug, Default)]
pub struct TestFixture {
    /// The compiler under test.
    pub compiler: PlanCompiler,
    /// Registry filled by [`TestFixture::compile`].
    pub registry: StepDependencyRegistry,
}

impl TestFixture {
    /// Creates a fixture with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fixture with the given configuration.
    #[must_use]
    pub fn with_config(config: CompilerConfig) -> Self {
        Self {
            compiler: PlanCompiler::new(config),
            registry: StepDependencyRegistry::new(),
        }
    }

    /// Compiles `pipeline` against the fixture's registry.
    pub fn compile(&self, pipeline: &Pipeline) -> Result<Plan, PlanError> {
        self.compiler.compile_with_registry(pipeline, &self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_pipeline() {
        let pipeline = TestPipeline::linear("p", 3);
        assert_eq!(pipeline.stage_identifiers(), vec!["s0", "s1", "s2"]);
        assert_eq!(pipeline.build().stages.len(), 3);
    }

    #[test]
    fn test_fixture_compiles_standard_stage() {
        let fixture = TestFixture::new();
        let pipeline = TestPipeline::new("p")
            .with_stage(standard_deployment_stage("deploy"))
            .build();

        assert!(fixture.compile(&pipeline).is_ok());
        assert_eq!(fixture.registry.len(), 3);
    }
}
