//! Per-subtree compile results and their bottom-up assembly.

use super::node::PlanNode;
use crate::utils::PlanNodeId;
use serde::{Deserialize, Serialize};

/// The unit of composition: a subtree's starting node and all its nodes.
///
/// Parents splice their children's nodes into their own result and only
/// keep the child's starting id for wiring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanCreationResult {
    /// The node the runtime starts this subtree with.
    pub starting_node_id: PlanNodeId,
    /// Every node of the subtree.
    pub nodes: Vec<PlanNode>,
}

impl PlanCreationResult {
    /// A result consisting of a single leaf node.
    #[must_use]
    pub fn single(node: PlanNode) -> Self {
        Self {
            starting_node_id: node.id,
            nodes: vec![node],
        }
    }

    /// Merges child results under a new parent node.
    ///
    /// The parent comes first and becomes the starting node; child nodes
    /// follow in the order given.
    #[must_use]
    pub fn assemble(parent: PlanNode, children: impl IntoIterator<Item = Self>) -> Self {
        let mut result = Self::single(parent);
        for child in children {
            result.extend(child);
        }
        result
    }

    /// Splices another result's nodes in, keeping this result's starting node.
    pub fn extend(&mut self, other: Self) {
        self.nodes.extend(other.nodes);
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if there are no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Gets a node by id.
    #[must_use]
    pub fn get(&self, id: PlanNodeId) -> Option<&PlanNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// The starting node.
    #[must_use]
    pub fn starting_node(&self) -> Option<&PlanNode> {
        self.get(self.starting_node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{FacilitatorType, NodeGroup, StepParameters, StepType};
    use crate::utils::generate_node_id;

    fn leaf(identifier: &str) -> PlanNode {
        PlanNode::new(
            generate_node_id(),
            identifier,
            identifier,
            StepType::step("ShellScript"),
            NodeGroup::Step,
            StepParameters::ChildChain { child_node_ids: vec![] },
            FacilitatorType::TaskChain,
        )
    }

    #[test]
    fn test_assemble_puts_parent_first() {
        let a = PlanCreationResult::single(leaf("a"));
        let b = PlanCreationResult::single(leaf("b"));
        let parent = PlanNode::new(
            generate_node_id(),
            "execution",
            "Execution",
            StepType::SECTION_CHAIN,
            NodeGroup::Execution,
            StepParameters::ChildChain {
                child_node_ids: vec![a.starting_node_id, b.starting_node_id],
            },
            FacilitatorType::ChildChain,
        );
        let parent_id = parent.id;

        let merged = PlanCreationResult::assemble(parent, [a, b]);

        assert_eq!(merged.starting_node_id, parent_id);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.starting_node().map(|n| n.identifier.as_str()), Some("execution"));
        assert_eq!(merged.nodes[1].identifier, "a");
    }

    #[test]
    fn test_extend_keeps_starting_node() {
        let mut a = PlanCreationResult::single(leaf("a"));
        let start = a.starting_node_id;
        a.extend(PlanCreationResult::single(leaf("b")));
        assert_eq!(a.starting_node_id, start);
        assert_eq!(a.len(), 2);
    }
}
