//! The public compile entry points.

use super::context::CompileContext;
use super::execution::{compile_execution, compile_parallel, compile_step, compile_step_group};
use super::pipeline::{compile_pipeline, StageCatalog};
use super::registry::{DependencyRegistry, StepDependencyRegistry};
use super::rollback::compile_rollback;
use super::stage::{compile_infrastructure, compile_service, compile_stage};
use crate::config::CompilerConfig;
use crate::declarative::{DeclarativeNode, Pipeline, Stage};
use crate::errors::PlanError;
use crate::observability::{CompileSummary, SpanTimer};
use crate::plan::{Plan, PlanCreationResult};
use crate::utils::generate_node_id;
use tracing::{debug, warn};

/// Compiles declarative pipelines into plans.
///
/// A compiler holds only its configuration and can be shared across
/// threads; every compile gets its own dependency registry.
///
/// # Example
///
/// ```rust,ignore
/// let compiler = PlanCompiler::new(CompilerConfig::default());
/// let plan = compiler.compile(&pipeline)?;
/// assert_eq!(plan.starting_node().unwrap().identifier, pipeline.identifier);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PlanCompiler {
    config: CompilerConfig,
}

impl PlanCompiler {
    /// Creates a compiler.
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// The compiler configuration.
    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// A root context over this compiler's configuration.
    #[must_use]
    pub fn context<'a>(&'a self, registry: &'a dyn DependencyRegistry) -> CompileContext<'a> {
        CompileContext::new(&self.config, registry)
    }

    /// Compiles a pipeline into a validated plan.
    ///
    /// # Errors
    ///
    /// Returns the first error found anywhere in the pipeline. No partial
    /// plan is produced.
    pub fn compile(&self, pipeline: &Pipeline) -> Result<Plan, PlanError> {
        let registry = StepDependencyRegistry::new();
        self.compile_with_registry(pipeline, &registry)
    }

    /// Compiles a pipeline against a caller-supplied registry.
    ///
    /// # Errors
    ///
    /// Same as [`PlanCompiler::compile`].
    pub fn compile_with_registry(
        &self,
        pipeline: &Pipeline,
        registry: &dyn DependencyRegistry,
    ) -> Result<Plan, PlanError> {
        let timer = SpanTimer::start(format!("compile:{}", pipeline.identifier));
        let ctx = self.context(registry);

        let plan = compile_pipeline(pipeline, &ctx)
            .and_then(|result| Plan::from_result(result).map_err(PlanError::from))
            .inspect_err(|err| {
                let info = err.error_info();
                warn!(
                    pipeline = %pipeline.identifier,
                    code = %info.code,
                    error = %err,
                    "Plan compilation failed"
                );
            })?;

        let elapsed_ms = timer.finish();
        CompileSummary::from_plan(&plan, elapsed_ms).log();
        Ok(plan)
    }

    /// Compiles any declarative node in isolation.
    ///
    /// Nodes that need a successor or a node id of their own get a fresh id
    /// and no successor. Sections compiled outside a stage cannot see other
    /// stages, so use-from-stage references fail with `StageNotFound`.
    ///
    /// # Errors
    ///
    /// Propagates the node creator's error.
    pub fn create_plan<'a>(
        &self,
        node: DeclarativeNode<'a>,
        ctx: &CompileContext<'a>,
    ) -> Result<PlanCreationResult, PlanError> {
        debug!(kind = node.kind(), identifier = node.identifier(), "Creating plan for node");
        let catalog = StageCatalog::new();
        match node {
            DeclarativeNode::Pipeline(pipeline) => compile_pipeline(pipeline, ctx),
            DeclarativeNode::Stage(stage) => {
                compile_stage(stage, generate_node_id(), None, &catalog, ctx).map(|compiled| compiled.result)
            }
            DeclarativeNode::Service(service) => {
                compile_service(service, &catalog, ctx).map(|compiled| compiled.result)
            }
            DeclarativeNode::Infrastructure(infrastructure) => {
                compile_infrastructure(infrastructure, &catalog, ctx).map(|compiled| compiled.result)
            }
            DeclarativeNode::Execution(block) => compile_execution(block, ctx),
            DeclarativeNode::Step(step) => compile_step(step, generate_node_id(), None, ctx),
            DeclarativeNode::StepGroup(group) => compile_step_group(group, generate_node_id(), None, ctx),
            DeclarativeNode::Parallel(block) => compile_parallel(block, generate_node_id(), None, ctx),
        }
    }

    /// Compiles the rollback plan of a stage on its own.
    ///
    /// Returns `None` if the stage has nothing to roll back.
    ///
    /// # Errors
    ///
    /// Propagates errors from compiling the rollback steps.
    pub fn create_rollback_plan<'a>(
        &self,
        stage: &'a Stage,
        ctx: &CompileContext<'a>,
    ) -> Result<Option<PlanCreationResult>, PlanError> {
        compile_rollback(stage, &ctx.for_stage(stage))
    }
}
