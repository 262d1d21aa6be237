//! Pipeline plan creator and the catalog backing use-from-stage lookups.

use super::context::CompileContext;
use super::stage::compile_stage;
use crate::declarative::{InfrastructureDefinition, Pipeline, ServiceDefinition};
use crate::errors::{ConfigError, PlanError};
use crate::plan::{FacilitatorType, NodeGroup, PlanCreationResult, PlanNode, StepParameters, StepType};
use crate::utils::{generate_node_id, generate_node_ids, validate_unique_identifiers};
use std::collections::BTreeMap;
use tracing::debug;

/// Sections a compiled stage resolved to.
#[derive(Debug, Clone, Default)]
struct StageSections {
    service: Option<ServiceDefinition>,
    infrastructure: Option<InfrastructureDefinition>,
}

/// Resolved sections of the stages compiled so far.
///
/// Stages are recorded in pipeline order, so a use-from-stage reference
/// can only see earlier stages.
#[derive(Debug, Clone, Default)]
pub struct StageCatalog {
    stages: BTreeMap<String, StageSections>,
}

impl StageCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the resolved sections of a stage.
    pub fn record(
        &mut self,
        stage: impl Into<String>,
        service: Option<ServiceDefinition>,
        infrastructure: Option<InfrastructureDefinition>,
    ) {
        self.stages.insert(
            stage.into(),
            StageSections {
                service,
                infrastructure,
            },
        );
    }

    /// The service an earlier stage resolved to.
    #[must_use]
    pub fn service_of(&self, stage: &str) -> Option<&ServiceDefinition> {
        self.stages.get(stage).and_then(|s| s.service.as_ref())
    }

    /// The infrastructure an earlier stage resolved to.
    #[must_use]
    pub fn infrastructure_of(&self, stage: &str) -> Option<&InfrastructureDefinition> {
        self.stages.get(stage).and_then(|s| s.infrastructure.as_ref())
    }
}

/// Compiles a pipeline: a `CHILD` root over the first stage, with stages
/// chained through `NextStage` advisers.
///
/// # Errors
///
/// Returns `ConfigError::EmptySection` for a pipeline without stages,
/// identifier errors for stage identifiers, and any stage error.
pub fn compile_pipeline<'a>(
    pipeline: &'a Pipeline,
    ctx: &CompileContext<'a>,
) -> Result<PlanCreationResult, PlanError> {
    let owner = format!("pipeline '{}'", pipeline.identifier);
    if pipeline.stages.is_empty() {
        return Err(ConfigError::EmptySection {
            owner,
            section: "stages".to_string(),
        }
        .into());
    }

    if ctx.config.validate_identifiers {
        validate_unique_identifiers(pipeline.stages.iter().map(|s| s.identifier.as_str()), &owner)?;
    }

    let ids = generate_node_ids(pipeline.stages.len());
    let mut catalog = StageCatalog::new();
    let mut stages = Vec::with_capacity(pipeline.stages.len());
    for (index, stage) in pipeline.stages.iter().enumerate() {
        let compiled = compile_stage(stage, ids[index], ids.get(index + 1).copied(), &catalog, ctx)?;
        catalog.record(&stage.identifier, compiled.service, compiled.infrastructure);
        stages.push(compiled.result);
    }

    let node = PlanNode::new(
        generate_node_id(),
        &pipeline.identifier,
        &pipeline.name,
        StepType::PIPELINE_SECTION,
        NodeGroup::Pipeline,
        StepParameters::Child { child_node_id: ids[0] },
        FacilitatorType::Child,
    );

    let result = PlanCreationResult::assemble(node, stages);
    debug!(
        pipeline = %pipeline.identifier,
        stages = pipeline.stages.len(),
        nodes = result.len(),
        "Compiled pipeline"
    );
    Ok(result)
}
