//! Plan creators for execution sections, steps, step groups and parallel blocks.

use super::context::CompileContext;
use crate::declarative::{ExecutionBlock, ExecutionElement, ParallelBlock, Step, StepGroup};
use crate::errors::{ConfigError, PlanError};
use crate::plan::{
    FacilitatorType, NodeGroup, PlanCreationResult, PlanNode, StepParameters, StepSpecParameters, StepType,
};
use crate::strategy::{build_advisers, validate_rules, AdviserTarget, RuleScope};
use crate::utils::paths::EXECUTION;
use crate::utils::{generate_node_id, generate_node_ids, PlanNodeId};
use std::collections::BTreeMap;
use tracing::debug;

/// Compiles an execution section into a `CHILD_CHAIN` over its elements.
///
/// # Errors
///
/// Returns `ConfigError::EmptySection` for an empty step list, plus any
/// error raised while compiling the elements.
pub fn compile_execution<'a>(
    block: &'a ExecutionBlock,
    ctx: &CompileContext<'a>,
) -> Result<PlanCreationResult, PlanError> {
    if block.steps.is_empty() {
        return Err(ConfigError::EmptySection {
            owner: owner_of_section(ctx),
            section: "execution steps".to_string(),
        }
        .into());
    }

    let ctx = ctx.with_ancestor(EXECUTION);
    let children = compile_elements(&block.steps, &ctx, true)?;
    let node = PlanNode::new(
        generate_node_id(),
        EXECUTION,
        "Execution",
        StepType::SECTION_CHAIN,
        NodeGroup::Execution,
        StepParameters::ChildChain {
            child_node_ids: starting_ids(&children),
        },
        FacilitatorType::ChildChain,
    );

    let result = PlanCreationResult::assemble(node, children);
    debug!(
        stage = ctx.stage_identifier.unwrap_or_default(),
        nodes = result.len(),
        "Compiled execution section"
    );
    Ok(result)
}

/// Compiles an ordered element list.
///
/// With `chained` set, each element is advised to continue with the next
/// one; parallel sections pass `false` since they have no forward order.
///
/// # Errors
///
/// Propagates the first element's error.
pub fn compile_elements<'a>(
    elements: &'a [ExecutionElement],
    ctx: &CompileContext<'a>,
    chained: bool,
) -> Result<Vec<PlanCreationResult>, PlanError> {
    let ids = generate_node_ids(elements.len());
    elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let next = if chained { ids.get(index + 1).copied() } else { None };
            compile_element(element, ids[index], next, ctx)
        })
        .collect()
}

/// Dispatches one element to its creator.
///
/// # Errors
///
/// Propagates the creator's error.
pub fn compile_element<'a>(
    element: &'a ExecutionElement,
    id: PlanNodeId,
    next: Option<PlanNodeId>,
    ctx: &CompileContext<'a>,
) -> Result<PlanCreationResult, PlanError> {
    match element {
        ExecutionElement::Step(step) => compile_step(step, id, next, ctx),
        ExecutionElement::StepGroup(group) => compile_step_group(group, id, next, ctx),
        ExecutionElement::Parallel(block) => compile_parallel(block, id, next, ctx),
    }
}

/// Compiles a leaf step.
///
/// # Errors
///
/// - `LookupError::UnknownStepType` for an unregistered step type.
/// - `ConfigError` for invalid or conflicting failure strategies, or an
///   outcome reference nothing has registered.
pub fn compile_step<'a>(
    step: &'a Step,
    id: PlanNodeId,
    next: Option<PlanNodeId>,
    ctx: &CompileContext<'a>,
) -> Result<PlanCreationResult, PlanError> {
    let facilitator = ctx.config.facilitator_for(&step.step_type, &step.identifier)?;

    let scope = RuleScope::step(&step.identifier, ctx.inside_step_group(), ctx.inside_rollback);
    validate_rules(&step.failure_strategies, &scope)?;
    let strategies = ctx.resolve_strategies(&scope.owner, &step.failure_strategies)?;
    let advisers = build_advisers(
        &strategies,
        AdviserTarget {
            owner: &scope.owner,
            next_node_id: next,
            inside_rollback: ctx.inside_rollback,
        },
    )?;

    let mut outcome_dependencies = BTreeMap::new();
    for key in &step.outcome_refs {
        let producer = ctx
            .outcome_token(key)
            .and_then(|token| ctx.registry.resolve(&token))
            .ok_or_else(|| ConfigError::UnresolvedOutcome {
                owner: scope.owner.clone(),
                key: key.clone(),
            })?;
        outcome_dependencies.insert(key.clone(), producer);
    }

    let node = PlanNode::new(
        id,
        &step.identifier,
        &step.name,
        StepType::step(&step.step_type),
        NodeGroup::Step,
        StepParameters::Step(StepSpecParameters {
            step_type: step.step_type.clone(),
            spec: step.spec.clone(),
            outcome_dependencies,
        }),
        facilitator,
    )
    .with_advisers(advisers)
    .with_when_condition(step.when.clone())
    .with_skip_condition(step.skip_condition.clone())
    .with_timeout(step.timeout.clone());

    debug!(
        step = %step.identifier,
        step_type = %step.step_type,
        facilitator = %facilitator,
        advisers = node.advisers.len(),
        "Compiled step"
    );
    Ok(PlanCreationResult::single(node))
}

/// Compiles a step group into a `CHILD` node over its chained steps.
///
/// Rollback steps are not part of the forward plan.
///
/// # Errors
///
/// Returns `ConfigError::EmptySection` for a group without steps, plus any
/// error raised while compiling its rules or steps.
pub fn compile_step_group<'a>(
    group: &'a StepGroup,
    id: PlanNodeId,
    next: Option<PlanNodeId>,
    ctx: &CompileContext<'a>,
) -> Result<PlanCreationResult, PlanError> {
    let scope = RuleScope::step_group(&group.identifier, ctx.inside_rollback);
    if group.steps.is_empty() {
        return Err(ConfigError::EmptySection {
            owner: scope.owner,
            section: "steps".to_string(),
        }
        .into());
    }
    validate_rules(&group.failure_strategies, &scope)?;

    let group_ctx = ctx.in_step_group(group);
    let strategies = group_ctx.resolve_strategies(&scope.owner, &[])?;
    let advisers = build_advisers(
        &strategies,
        AdviserTarget {
            owner: &scope.owner,
            next_node_id: next,
            inside_rollback: ctx.inside_rollback,
        },
    )?;

    let children = compile_elements(&group.steps, &group_ctx, true)?;
    let node = PlanNode::new(
        id,
        &group.identifier,
        &group.name,
        StepType::STEP_GROUP,
        NodeGroup::StepGroup,
        StepParameters::Child {
            child_node_id: children[0].starting_node_id,
        },
        FacilitatorType::Child,
    )
    .with_advisers(advisers)
    .with_when_condition(group.when.clone());

    let result = PlanCreationResult::assemble(node, children);
    debug!(step_group = %group.identifier, nodes = result.len(), "Compiled step group");
    Ok(result)
}

/// Compiles a parallel block into a `CHILDREN` fan-out.
///
/// Sections are compiled independently and carry no next-sibling advisers.
///
/// # Errors
///
/// Returns `ConfigError::EmptySection` for a block without sections, plus
/// any error raised while compiling them.
pub fn compile_parallel<'a>(
    block: &'a ParallelBlock,
    id: PlanNodeId,
    next: Option<PlanNodeId>,
    ctx: &CompileContext<'a>,
) -> Result<PlanCreationResult, PlanError> {
    let owner = format!("parallel '{}'", block.identifier);
    if block.sections.is_empty() {
        return Err(ConfigError::EmptySection {
            owner,
            section: "sections".to_string(),
        }
        .into());
    }

    let strategies = ctx.resolve_strategies(&owner, &[])?;
    let advisers = build_advisers(
        &strategies,
        AdviserTarget {
            owner: &owner,
            next_node_id: next,
            inside_rollback: ctx.inside_rollback,
        },
    )?;

    let children = compile_elements(&block.sections, ctx, false)?;
    let node = PlanNode::new(
        id,
        &block.identifier,
        &block.name,
        StepType::FORK,
        NodeGroup::Parallel,
        StepParameters::Children {
            child_node_ids: starting_ids(&children),
        },
        FacilitatorType::Children,
    )
    .with_advisers(advisers)
    .skip_expression_chain(true);

    let result = PlanCreationResult::assemble(node, children);
    debug!(parallel = %block.identifier, sections = block.sections.len(), "Compiled parallel block");
    Ok(result)
}

pub(crate) fn starting_ids(results: &[PlanCreationResult]) -> Vec<PlanNodeId> {
    results.iter().map(|result| result.starting_node_id).collect()
}

fn owner_of_section(ctx: &CompileContext<'_>) -> String {
    ctx.stage_identifier
        .map_or_else(|| "execution".to_string(), |stage| format!("stage '{stage}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::creator::registry::{DependencyRegistry, StepDependencyRegistry};
    use crate::declarative::{ActionConfig, ErrorCategory, FailureStrategyConfig, Stage};
    use crate::errors::LookupError;
    use crate::plan::{Adviser, AdviserType};

    fn stage_with(elements: Vec<ExecutionElement>) -> Stage {
        Stage::new("deploy", ExecutionBlock::new(elements))
    }

    #[test]
    fn test_execution_chains_steps() {
        let config = CompilerConfig::default();
        let registry = StepDependencyRegistry::new();
        let stage = stage_with(vec![
            Step::new("a", "ShellScript").into(),
            Step::new("b", "ShellScript").into(),
        ]);
        let ctx = CompileContext::new(&config, &registry).for_stage(&stage);

        let result = compile_execution(&stage.execution, &ctx).unwrap();

        assert_eq!(result.len(), 3);
        let root = result.starting_node().unwrap();
        assert_eq!(root.facilitator, FacilitatorType::ChildChain);
        assert_eq!(root.step_type, StepType::SECTION_CHAIN);

        let ids = root.step_parameters.child_node_ids().to_vec();
        let a = result.get(ids[0]).unwrap();
        let b = result.get(ids[1]).unwrap();
        assert_eq!(a.identifier, "a");
        assert_eq!(a.advisers, vec![Adviser::NextStep { next_node_id: b.id }]);
        assert!(b.advisers.is_empty());
    }

    #[test]
    fn test_empty_execution_is_rejected() {
        let config = CompilerConfig::default();
        let registry = StepDependencyRegistry::new();
        let stage = stage_with(vec![]);
        let ctx = CompileContext::new(&config, &registry).for_stage(&stage);

        let err = compile_execution(&stage.execution, &ctx).unwrap_err();
        assert!(matches!(err, PlanError::Config(ConfigError::EmptySection { .. })));
    }

    #[test]
    fn test_step_group_is_child_of_first_step() {
        let config = CompilerConfig::default();
        let registry = StepDependencyRegistry::new();
        let group = StepGroup::new("sg")
            .with_steps([Step::new("a", "ShellScript"), Step::new("b", "ShellScript")])
            .with_rollback_steps([Step::new("undo", "ShellScript")]);
        let stage = stage_with(vec![group.into()]);
        let ctx = CompileContext::new(&config, &registry).for_stage(&stage);

        let ExecutionElement::StepGroup(group) = &stage.execution.steps[0] else {
            panic!("expected step group");
        };
        let result = compile_step_group(group, generate_node_id(), None, &ctx).unwrap();

        // Rollback steps are compiled separately.
        assert_eq!(result.len(), 3);
        let root = result.starting_node().unwrap();
        assert_eq!(root.facilitator, FacilitatorType::Child);
        let first = result.get(root.step_parameters.child_node_ids()[0]).unwrap();
        assert_eq!(first.identifier, "a");
        assert!(result.nodes.iter().all(|n| n.identifier != "undo"));
    }

    #[test]
    fn test_parallel_sections_do_not_chain() {
        let config = CompilerConfig::default();
        let registry = StepDependencyRegistry::new();
        let block = ParallelBlock::new("par", [Step::new("a", "ShellScript"), Step::new("b", "ShellScript")]);
        let stage = stage_with(vec![block.into()]);
        let ctx = CompileContext::new(&config, &registry).for_stage(&stage);
        let next = generate_node_id();

        let ExecutionElement::Parallel(block) = &stage.execution.steps[0] else {
            panic!("expected parallel block");
        };
        let result = compile_parallel(block, generate_node_id(), Some(next), &ctx).unwrap();

        let root = result.starting_node().unwrap();
        assert_eq!(root.facilitator, FacilitatorType::Children);
        assert_eq!(root.advisers, vec![Adviser::NextStep { next_node_id: next }]);
        for id in root.step_parameters.child_node_ids() {
            assert!(result.get(*id).unwrap().advisers.is_empty());
        }
    }

    #[test]
    fn test_step_advisers_merge_group_and_stage_rules() {
        let config = CompilerConfig::default();
        let registry = StepDependencyRegistry::new();
        let stage = stage_with(vec![StepGroup::new("sg")
            .with_steps([Step::new("a", "ShellScript").with_failure_strategy(FailureStrategyConfig::new(
                [ErrorCategory::NetworkError],
                ActionConfig::Ignore,
            ))])
            .with_failure_strategy(FailureStrategyConfig::new(
                [ErrorCategory::NetworkError, ErrorCategory::Timeout],
                ActionConfig::retry_step_group(2, &["5s"]),
            ))
            .into()])
        .with_failure_strategy(FailureStrategyConfig::all_errors(ActionConfig::Abort));
        let ctx = CompileContext::new(&config, &registry).for_stage(&stage);

        let result = compile_execution(&stage.execution, &ctx).unwrap();
        let step = result.nodes.iter().find(|n| n.identifier == "a").unwrap();

        let ignore = step
            .advisers
            .iter()
            .find(|a| a.adviser_type() == AdviserType::Ignore)
            .and_then(Adviser::applicable_categories)
            .unwrap();
        assert!(ignore.contains(&ErrorCategory::NetworkError));
        let retry_group = step
            .advisers
            .iter()
            .find(|a| a.adviser_type() == AdviserType::RetryStepGroup)
            .and_then(Adviser::applicable_categories)
            .unwrap();
        assert_eq!(retry_group.len(), 1);
        assert!(retry_group.contains(&ErrorCategory::Timeout));
    }

    #[test]
    fn test_unknown_step_type_fails() {
        let config = CompilerConfig::default();
        let registry = StepDependencyRegistry::new();
        let stage = stage_with(vec![Step::new("a", "Mystery").into()]);
        let ctx = CompileContext::new(&config, &registry).for_stage(&stage);

        let err = compile_execution(&stage.execution, &ctx).unwrap_err();
        assert!(matches!(err, PlanError::Lookup(LookupError::UnknownStepType { .. })));
    }

    #[test]
    fn test_outcome_refs_resolve_through_registry() {
        let config = CompilerConfig::default();
        let registry = StepDependencyRegistry::new();
        let service = generate_node_id();
        registry.register("deploy.service", service);
        let stage = stage_with(vec![Step::new("a", "K8sRollingDeploy").with_outcome_ref("service").into()]);
        let ctx = CompileContext::new(&config, &registry).for_stage(&stage);

        let result = compile_execution(&stage.execution, &ctx).unwrap();
        let step = result.nodes.iter().find(|n| n.identifier == "a").unwrap();
        assert_eq!(step.referenced_node_ids(), vec![service]);

        let missing = stage_with(vec![Step::new("b", "ShellScript").with_outcome_ref("infrastructure").into()]);
        let ctx = CompileContext::new(&config, &registry).for_stage(&missing);
        let err = compile_execution(&missing.execution, &ctx).unwrap_err();
        assert!(matches!(err, PlanError::Config(ConfigError::UnresolvedOutcome { .. })));
    }

    #[test]
    fn test_step_conditions_are_carried() {
        let config = CompilerConfig::default();
        let registry = StepDependencyRegistry::new();
        let step = Step::new("a", "ShellScript")
            .with_when("<+pipeline.branch> == \"main\"")
            .with_skip_condition("<+skip>")
            .with_timeout("10m");
        let ctx = CompileContext::new(&config, &registry);

        let result = compile_step(&step, generate_node_id(), None, &ctx).unwrap();
        let node = result.starting_node().unwrap();
        assert_eq!(node.when_condition.as_deref(), Some("<+pipeline.branch> == \"main\""));
        assert_eq!(node.skip_condition.as_deref(), Some("<+skip>"));
        assert_eq!(node.timeout.as_deref(), Some("10m"));
        assert_eq!(node.facilitator, FacilitatorType::TaskChain);
    }
}
