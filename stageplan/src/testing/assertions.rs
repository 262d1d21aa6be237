//! Structural assertions over compiled plans.

use crate::plan::{AdviserType, Plan, PlanNode, StepType};
use std::collections::HashSet;

/// Asserts that no two nodes share an id.
pub fn assert_unique_ids(plan: &Plan) {
    let mut seen = HashSet::new();
    for node in &plan.nodes {
        assert!(
            seen.insert(node.id),
            "Duplicate node id {} on '{}'",
            node.id,
            node.identifier
        );
    }
}

/// Asserts that every referenced id, including adviser targets, is a node
/// of the plan.
pub fn assert_referential_integrity(plan: &Plan) {
    let ids: HashSet<_> = plan.nodes.iter().map(|node| node.id).collect();
    assert!(
        ids.contains(&plan.starting_node_id),
        "Starting node {} is not in the plan",
        plan.starting_node_id
    );
    for node in &plan.nodes {
        for reference in node.referenced_node_ids() {
            assert!(
                ids.contains(&reference),
                "Node '{}' references missing node {}",
                node.identifier,
                reference
            );
        }
    }
}

/// Asserts the number of nodes of a step type.
pub fn assert_node_count_by_type(plan: &Plan, step_type: &StepType, expected: usize) {
    let actual = plan.nodes.iter().filter(|node| &node.step_type == step_type).count();
    assert_eq!(
        actual, expected,
        "Expected {expected} node(s) of type {}, found {actual}",
        step_type.as_str()
    );
}

/// Asserts that the node with `identifier` exists and returns it.
pub fn assert_node<'p>(plan: &'p Plan, identifier: &str) -> &'p PlanNode {
    match plan.find_by_identifier(identifier) {
        Some(node) => node,
        None => panic!("Expected a node '{identifier}' in the plan"),
    }
}

/// Asserts that `node` carries an adviser of the given type.
pub fn assert_has_adviser(node: &PlanNode, adviser_type: AdviserType) {
    assert!(
        node.advisers.iter().any(|adviser| adviser.adviser_type() == adviser_type),
        "Expected '{}' to have a {adviser_type} adviser, found {:?}",
        node.identifier,
        node.advisers.iter().map(|adviser| adviser.adviser_type()).collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{standard_deployment_stage, TestFixture, TestPipeline};

    #[test]
    fn test_assertions_hold_for_compiled_plan() {
        let pipeline = TestPipeline::new("p")
            .with_stage(standard_deployment_stage("deploy"))
            .build();
        let plan = TestFixture::new().compile(&pipeline).unwrap();

        assert_unique_ids(&plan);
        assert_referential_integrity(&plan);
        assert_node_count_by_type(&plan, &StepType::DEPLOYMENT_STAGE, 1);
        assert_has_adviser(assert_node(&plan, "prepare"), AdviserType::NextStep);
    }

    #[test]
    #[should_panic(expected = "Expected a node 'missing'")]
    fn test_assert_node_panics_when_absent() {
        let pipeline = TestPipeline::linear("p", 1).build();
        let plan = TestFixture::new().compile(&pipeline).unwrap();
        assert_node(&plan, "missing");
    }
}
