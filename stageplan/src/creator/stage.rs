//! Plan creators for stages and their service and infrastructure sections.

use super::context::CompileContext;
use super::execution::{compile_elements, compile_execution, starting_ids};
use super::pipeline::StageCatalog;
use super::rollback::compile_rollback;
use crate::declarative::{
    InfrastructureConfig, InfrastructureDefinition, ServiceConfig, ServiceDefinition, Stage, UseFromStage,
};
use crate::errors::{ConfigError, PlanError};
use crate::plan::{
    Adviser, EnvironmentParameters, FacilitatorType, InfrastructureParameters, NodeGroup, PlanCreationResult,
    PlanNode, ServiceParameters, StepParameters, StepType,
};
use crate::strategy::{level_map, validate_rules, RuleScope};
use crate::utils::paths::{ENVIRONMENT, INFRASTRUCTURE, SERVICE};
use crate::utils::{generate_node_id, validate_identifier, validate_unique_identifiers, PlanNodeId};
use tracing::debug;

const PROVISIONER: &str = "provisioner";
const INFRASTRUCTURE_DEFINITION: &str = "infrastructureDefinition";

/// A compiled stage together with the sections later stages may reuse.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    /// The stage's nodes, forward and rollback.
    pub result: PlanCreationResult,
    /// The resolved service definition.
    pub service: Option<ServiceDefinition>,
    /// The resolved infrastructure definition.
    pub infrastructure: Option<InfrastructureDefinition>,
}

/// A compiled section with the definition it resolved to.
#[derive(Debug, Clone)]
pub struct CompiledSection<D> {
    /// The section's nodes.
    pub result: PlanCreationResult,
    /// The definition, explicit or copied from an earlier stage.
    pub definition: D,
}

/// Compiles a deployment stage.
///
/// The stage node chains service, infrastructure and execution in that
/// order. If the stage has anything to roll back, its rollback plan is
/// compiled too and reached through an `OnFail` adviser.
///
/// # Errors
///
/// Returns the first `ConfigError` or `LookupError` found anywhere in the
/// stage.
pub fn compile_stage<'a>(
    stage: &'a Stage,
    id: PlanNodeId,
    next_stage: Option<PlanNodeId>,
    catalog: &StageCatalog,
    ctx: &CompileContext<'a>,
) -> Result<CompiledStage, PlanError> {
    let ctx = ctx.for_stage(stage);
    validate_stage(stage, &ctx)?;

    let service = stage
        .service
        .as_ref()
        .map(|service| compile_service(service, catalog, &ctx))
        .transpose()?;
    let infrastructure = stage
        .infrastructure
        .as_ref()
        .map(|infrastructure| compile_infrastructure(infrastructure, catalog, &ctx))
        .transpose()?;
    let execution = compile_execution(&stage.execution, &ctx)?;
    let rollback = compile_rollback(stage, &ctx)?;

    let mut advisers = Vec::new();
    if let Some(rollback) = &rollback {
        advisers.push(Adviser::OnFail {
            next_node_id: rollback.starting_node_id,
        });
    }
    if let Some(next_node_id) = next_stage {
        advisers.push(Adviser::NextStage { next_node_id });
    }

    let (service_result, service) = service.map(|s| (s.result, s.definition)).unzip();
    let (infrastructure_result, infrastructure) = infrastructure.map(|i| (i.result, i.definition)).unzip();

    let children: Vec<PlanCreationResult> = service_result
        .into_iter()
        .chain(infrastructure_result)
        .chain(std::iter::once(execution))
        .collect();

    let node = PlanNode::new(
        id,
        &stage.identifier,
        &stage.name,
        StepType::DEPLOYMENT_STAGE,
        NodeGroup::Stage,
        StepParameters::ChildChain {
            child_node_ids: starting_ids(&children),
        },
        FacilitatorType::ChildChain,
    )
    .with_advisers(advisers)
    .with_when_condition(stage.when.clone())
    .with_timeout(stage.timeout.clone());

    let result = PlanCreationResult::assemble(node, children.into_iter().chain(rollback));
    debug!(stage = %stage.identifier, nodes = result.len(), "Compiled stage");

    Ok(CompiledStage {
        result,
        service,
        infrastructure,
    })
}

fn validate_stage(stage: &Stage, ctx: &CompileContext<'_>) -> Result<(), ConfigError> {
    let scope = RuleScope::stage(&stage.identifier);

    if ctx.config.validate_identifiers {
        validate_identifier(&stage.identifier)?;
        let mut identifiers = stage.execution.all_identifiers();
        if let Some(provisioner) = stage.infrastructure.as_ref().and_then(|i| i.provisioner.as_ref()) {
            for element in &provisioner.steps {
                element.collect_identifiers(&mut identifiers);
            }
        }
        identifiers.iter().try_for_each(|identifier| validate_identifier(identifier))?;
        validate_unique_identifiers(identifiers, &scope.owner)?;
    }

    if ctx.config.require_stage_failure_strategy {
        if stage.failure_strategies.is_empty() {
            return Err(ConfigError::MissingStageFailureStrategy {
                owner: scope.owner,
                reason: "no failure strategy is declared".to_string(),
            });
        }
        if !stage.failure_strategies.iter().any(|rule| rule.is_all_errors_only()) {
            return Err(ConfigError::MissingStageFailureStrategy {
                owner: scope.owner,
                reason: "no rule has ALL_ERRORS as its only category".to_string(),
            });
        }
    }

    validate_rules(&stage.failure_strategies, &scope)?;
    level_map(&stage.failure_strategies, &scope.owner)?;
    Ok(())
}

/// Compiles a stage's service section into a `SYNC` service node.
///
/// The node registers itself as the stage's `service` outcome.
///
/// # Errors
///
/// - `ConfigError::ConflictingServiceSource` if both a definition and
///   use-from-stage are present.
/// - `ConfigError::MissingDefinition` if neither is.
/// - `ConfigError::StageNotFound` if the referenced stage is unknown or has
///   no service.
pub fn compile_service(
    config: &ServiceConfig,
    catalog: &StageCatalog,
    ctx: &CompileContext<'_>,
) -> Result<CompiledSection<ServiceDefinition>, PlanError> {
    let owner = section_owner(ctx);
    let definition = match (&config.definition, &config.use_from_stage) {
        (Some(_), Some(_)) => return Err(ConfigError::ConflictingServiceSource { owner }.into()),
        (None, None) => {
            return Err(ConfigError::MissingDefinition {
                owner,
                section: SERVICE.to_string(),
            }
            .into())
        }
        (Some(definition), None) => definition.clone(),
        (None, Some(reference)) => catalog
            .service_of(&reference.stage)
            .cloned()
            .ok_or_else(|| stage_not_found(reference, &owner, SERVICE))?,
    };

    let node = PlanNode::new(
        generate_node_id(),
        SERVICE,
        "Service",
        StepType::SERVICE_STEP,
        NodeGroup::Service,
        StepParameters::Service(ServiceParameters {
            service_ref: definition.service_ref.clone(),
            spec: definition.spec.clone(),
            use_from_stage: config.use_from_stage.as_ref().map(|r| r.stage.clone()),
        }),
        FacilitatorType::Sync,
    );
    register_outcome(ctx, SERVICE, node.id);
    debug!(owner = %owner, service_ref = %definition.service_ref, "Compiled service");

    Ok(CompiledSection {
        result: PlanCreationResult::single(node),
        definition,
    })
}

/// Compiles a stage's infrastructure section.
///
/// The section is a `CHILD_CHAIN` over the environment node, the optional
/// provisioner and the infrastructure node. Environment and infrastructure
/// register themselves as stage outcomes.
///
/// # Errors
///
/// - `ConfigError::ConflictingInfraSource` if both a definition and
///   use-from-stage are present.
/// - `ConfigError::MissingDefinition` if neither is.
/// - `ConfigError::StageNotFound` if the referenced stage is unknown or has
///   no infrastructure.
/// - Any error raised by the provisioner steps.
pub fn compile_infrastructure<'a>(
    config: &'a InfrastructureConfig,
    catalog: &StageCatalog,
    ctx: &CompileContext<'a>,
) -> Result<CompiledSection<InfrastructureDefinition>, PlanError> {
    let owner = section_owner(ctx);
    let definition = match (&config.definition, &config.use_from_stage) {
        (Some(_), Some(_)) => return Err(ConfigError::ConflictingInfraSource { owner }.into()),
        (None, None) => {
            return Err(ConfigError::MissingDefinition {
                owner,
                section: INFRASTRUCTURE.to_string(),
            }
            .into())
        }
        (Some(definition), None) => definition.clone(),
        (None, Some(reference)) => catalog
            .infrastructure_of(&reference.stage)
            .cloned()
            .ok_or_else(|| stage_not_found(reference, &owner, INFRASTRUCTURE))?,
    };
    let use_from_stage = config.use_from_stage.as_ref().map(|r| r.stage.clone());

    let environment = PlanNode::new(
        generate_node_id(),
        ENVIRONMENT,
        "Environment",
        StepType::ENVIRONMENT_STEP,
        NodeGroup::Environment,
        StepParameters::Environment(EnvironmentParameters {
            environment_ref: definition.environment_ref.clone(),
            use_from_stage: use_from_stage.clone(),
        }),
        FacilitatorType::Sync,
    );
    register_outcome(ctx, ENVIRONMENT, environment.id);

    let provisioner = match &config.provisioner {
        Some(block) if block.steps.is_empty() => {
            return Err(ConfigError::EmptySection {
                owner,
                section: "provisioner steps".to_string(),
            }
            .into())
        }
        Some(block) => {
            let section_ctx = ctx.with_ancestor(INFRASTRUCTURE).with_ancestor(PROVISIONER);
            let children = compile_elements(&block.steps, &section_ctx, true)?;
            let node = PlanNode::new(
                generate_node_id(),
                PROVISIONER,
                "Provisioner",
                StepType::PROVISIONER_SECTION,
                NodeGroup::Provisioner,
                StepParameters::ChildChain {
                    child_node_ids: starting_ids(&children),
                },
                FacilitatorType::ChildChain,
            );
            Some(PlanCreationResult::assemble(node, children))
        }
        None => None,
    };

    let infrastructure = PlanNode::new(
        generate_node_id(),
        INFRASTRUCTURE_DEFINITION,
        "Infrastructure",
        StepType::INFRASTRUCTURE_STEP,
        NodeGroup::Infrastructure,
        StepParameters::Infrastructure(InfrastructureParameters {
            environment_ref: definition.environment_ref.clone(),
            infrastructure_ref: definition.infrastructure_ref.clone(),
            spec: definition.spec.clone(),
            use_from_stage,
        }),
        FacilitatorType::Sync,
    );
    register_outcome(ctx, INFRASTRUCTURE, infrastructure.id);

    let children: Vec<PlanCreationResult> = std::iter::once(PlanCreationResult::single(environment))
        .chain(provisioner)
        .chain(std::iter::once(PlanCreationResult::single(infrastructure)))
        .collect();
    let section = PlanNode::new(
        generate_node_id(),
        INFRASTRUCTURE,
        "Infrastructure Section",
        StepType::INFRASTRUCTURE_SECTION,
        NodeGroup::Infrastructure,
        StepParameters::ChildChain {
            child_node_ids: starting_ids(&children),
        },
        FacilitatorType::ChildChain,
    );

    let result = PlanCreationResult::assemble(section, children);
    debug!(
        owner = %owner,
        infrastructure_ref = %definition.infrastructure_ref,
        nodes = result.len(),
        "Compiled infrastructure"
    );
    Ok(CompiledSection { result, definition })
}

fn register_outcome(ctx: &CompileContext<'_>, key: &str, node_id: PlanNodeId) {
    if let Some(token) = ctx.outcome_token(key) {
        ctx.registry.register(&token, node_id);
    }
}

fn section_owner(ctx: &CompileContext<'_>) -> String {
    format!("stage '{}'", ctx.stage_identifier.unwrap_or_default())
}

fn stage_not_found(reference: &UseFromStage, owner: &str, section: &str) -> ConfigError {
    ConfigError::StageNotFound {
        stage: reference.stage.clone(),
        owner: owner.to_string(),
        section: section.to_string(),
    }
}
