//! Rollback plan creator.
//!
//! The rollback plan of a stage is compiled from the same execution tree as
//! the forward plan, in reverse document order. Every rollback child is
//! gated on the runtime status of its forward counterpart through a
//! fully-qualified path, so work that never started is never rolled back.

use super::context::CompileContext;
use super::execution::{compile_elements, starting_ids};
use crate::declarative::{ExecutionElement, ParallelBlock, Stage, StepGroup};
use crate::errors::PlanError;
use crate::plan::{FacilitatorType, NodeGroup, PlanCreationResult, PlanNode, RollbackNode, StepParameters, StepType};
use crate::utils::generate_node_id;
use crate::utils::paths::EXECUTION;
use tracing::debug;

/// Identifier of the node rolling back step groups.
pub const STEP_GROUPS_ROLLBACK: &str = "STEP_GROUPS_ROLLBACK";
/// Identifier of the node running the stage-level rollback steps.
pub const EXECUTION_ROLLBACK: &str = "EXECUTION_ROLLBACK";

/// Identifier of a rollback node derived from `identifier`.
#[must_use]
pub fn rollback_identifier(identifier: &str) -> String {
    format!("{identifier}_rollback")
}

/// Compiles the rollback plan of a stage.
///
/// `ctx` must be the stage's own context. Returns `None` if the stage has
/// nothing to roll back.
///
/// # Errors
///
/// Propagates errors from compiling the rollback steps.
pub fn compile_rollback<'a>(
    stage: &'a Stage,
    ctx: &CompileContext<'a>,
) -> Result<Option<PlanCreationResult>, PlanError> {
    let stage_id = stage.identifier.as_str();
    let execution_ctx = ctx.with_ancestor(EXECUTION);
    let execution_path = ctx.path_of(EXECUTION);

    // TODO: add the infrastructure rollback node once dynamic provisioning exposes a rollback section.
    let infrastructure: Option<(PlanCreationResult, RollbackNode)> = None;

    let step_groups = compile_step_groups_rollback(stage, &execution_ctx)?
        .map(|result| {
            let gate = RollbackNode::gated(result.starting_node_id, execution_path.clone());
            (result, gate)
        });

    let execution = if stage.execution.rollback_steps.is_empty() {
        None
    } else {
        let rollback_ctx = execution_ctx.in_rollback();
        let children = compile_elements(&stage.execution.rollback_steps, &rollback_ctx, true)?;
        let node = rollback_chain_node(EXECUTION_ROLLBACK, "Execution Rollback", &children);
        let result = PlanCreationResult::assemble(node, children);
        let gate = RollbackNode::gated(result.starting_node_id, execution_path.clone());
        Some((result, gate))
    };

    let sections: Vec<(PlanCreationResult, RollbackNode)> =
        infrastructure.into_iter().chain(step_groups).chain(execution).collect();
    if sections.is_empty() {
        return Ok(None);
    }

    let (results, gates): (Vec<_>, Vec<_>) = sections.into_iter().unzip();
    let root = PlanNode::new(
        generate_node_id(),
        rollback_identifier(stage_id),
        format!("{} Rollback", stage.name),
        StepType::ROLLBACK_OPTIONAL_CHILD_CHAIN,
        NodeGroup::Rollback,
        StepParameters::RollbackChain { children: gates },
        FacilitatorType::ChildChain,
    )
    .skip_expression_chain(true);

    let result = PlanCreationResult::assemble(root, results);
    debug!(stage = %stage_id, nodes = result.len(), "Compiled stage rollback");
    Ok(Some(result))
}

/// Collects the rollback of every step group, and of every parallel block
/// holding step groups, in reverse document order.
///
/// `ctx` must be the stage's execution context.
fn compile_step_groups_rollback<'a>(
    stage: &'a Stage,
    ctx: &CompileContext<'a>,
) -> Result<Option<PlanCreationResult>, PlanError> {
    let mut candidates = Vec::new();

    for element in stage.execution.steps.iter().rev() {
        let compiled = match element {
            ExecutionElement::StepGroup(group) if group.has_rollback() => compile_group_rollback(group, ctx)?,
            ExecutionElement::Parallel(block) => match compile_parallel_rollback(block, ctx)? {
                Some(result) => result,
                None => continue,
            },
            ExecutionElement::Step(_) | ExecutionElement::StepGroup(_) => continue,
        };
        let gate = RollbackNode::gated(compiled.starting_node_id, ctx.path_of(element.identifier()));
        candidates.push((compiled, gate));
    }

    if candidates.is_empty() {
        return Ok(None);
    }

    let (results, gates): (Vec<_>, Vec<_>) = candidates.into_iter().unzip();
    let node = PlanNode::new(
        generate_node_id(),
        STEP_GROUPS_ROLLBACK,
        "Step Groups Rollback",
        StepType::ROLLBACK_OPTIONAL_CHILD_CHAIN,
        NodeGroup::Rollback,
        StepParameters::RollbackChain { children: gates },
        FacilitatorType::ChildChain,
    )
    .skip_expression_chain(true);
    Ok(Some(PlanCreationResult::assemble(node, results)))
}

/// Compiles a step group's rollback steps into `<group>_rollback`.
fn compile_group_rollback<'a>(
    group: &'a StepGroup,
    ctx: &CompileContext<'a>,
) -> Result<PlanCreationResult, PlanError> {
    let rollback_ctx = ctx.in_step_group(group).in_rollback();
    let children = compile_elements(&group.rollback_steps, &rollback_ctx, true)?;
    let node = rollback_chain_node(
        &rollback_identifier(&group.identifier),
        &format!("{} Rollback", group.name),
        &children,
    );
    debug!(step_group = %group.identifier, steps = group.rollback_steps.len(), "Compiled step group rollback");
    Ok(PlanCreationResult::assemble(node, children))
}

/// Fans out the rollback of every step group in a parallel block.
///
/// Each child runs regardless of how its siblings ended.
fn compile_parallel_rollback<'a>(
    block: &'a ParallelBlock,
    ctx: &CompileContext<'a>,
) -> Result<Option<PlanCreationResult>, PlanError> {
    let mut results = Vec::new();
    let mut gates = Vec::new();
    for group in block.step_groups_with_rollback() {
        let result = compile_group_rollback(group, ctx)?;
        gates.push(RollbackNode::always(result.starting_node_id, ctx.path_of(&group.identifier)));
        results.push(result);
    }
    if results.is_empty() {
        return Ok(None);
    }

    let node = PlanNode::new(
        generate_node_id(),
        rollback_identifier(&block.identifier),
        format!("{} Rollback", block.name),
        StepType::ROLLBACK_OPTIONAL_CHILDREN,
        NodeGroup::Rollback,
        StepParameters::RollbackChildren { children: gates },
        FacilitatorType::Children,
    )
    .skip_expression_chain(true);
    Ok(Some(PlanCreationResult::assemble(node, results)))
}

fn rollback_chain_node(identifier: &str, name: &str, children: &[PlanCreationResult]) -> PlanNode {
    PlanNode::new(
        generate_node_id(),
        identifier,
        name,
        StepType::SECTION_CHAIN,
        NodeGroup::Rollback,
        StepParameters::ChildChain {
            child_node_ids: starting_ids(children),
        },
        FacilitatorType::ChildChain,
    )
}
