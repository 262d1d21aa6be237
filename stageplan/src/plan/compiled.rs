//! The final plan handed to the orchestrator.

use super::node::PlanNode;
use super::result::PlanCreationResult;
use crate::errors::IntegrityError;
use crate::utils::PlanNodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A compiled, validated plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Id of this compile.
    pub plan_id: Uuid,
    /// The pipeline root node.
    pub starting_node_id: PlanNodeId,
    /// Every node, forward and rollback.
    pub nodes: Vec<PlanNode>,
    /// When the plan was compiled.
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Wraps a pipeline result into a plan after checking its invariants.
    ///
    /// # Errors
    ///
    /// Returns the first [`IntegrityError`] found by [`Plan::validate`].
    pub fn from_result(result: PlanCreationResult) -> Result<Self, IntegrityError> {
        let plan = Self {
            plan_id: Uuid::now_v7(),
            starting_node_id: result.starting_node_id,
            nodes: result.nodes,
            created_at: Utc::now(),
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Checks id uniqueness and referential integrity.
    ///
    /// # Errors
    ///
    /// Returns an [`IntegrityError`] for a duplicated id, a reference to a
    /// node outside the plan, or a missing starting node.
    pub fn validate(&self) -> Result<(), IntegrityError> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id) {
                return Err(IntegrityError::DuplicateNodeId {
                    id: node.id.to_string(),
                });
            }
        }

        if !ids.contains(&self.starting_node_id) {
            return Err(IntegrityError::MissingStartingNode {
                id: self.starting_node_id.to_string(),
            });
        }

        for node in &self.nodes {
            if let Some(missing) = node.referenced_node_ids().into_iter().find(|id| !ids.contains(id)) {
                return Err(IntegrityError::DanglingReference {
                    from: node.identifier.clone(),
                    to: missing.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Gets a node by id.
    #[must_use]
    pub fn get(&self, id: PlanNodeId) -> Option<&PlanNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Gets the first node with the given identifier.
    #[must_use]
    pub fn find_by_identifier(&self, identifier: &str) -> Option<&PlanNode> {
        self.nodes.iter().find(|node| node.identifier == identifier)
    }

    /// The starting node.
    #[must_use]
    pub fn starting_node(&self) -> Option<&PlanNode> {
        self.get(self.starting_node_id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the plan has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// SHA-256 hex digest of the plan's structure.
    ///
    /// Node ids are replaced by their position in `nodes` before hashing,
    /// so two compiles of the same tree produce the same fingerprint even
    /// though their ids differ. `plan_id` and `created_at` are ignored.
    ///
    /// # Errors
    ///
    /// Returns the serialization error if a node cannot be rendered as JSON.
    pub fn structural_fingerprint(&self) -> Result<String, serde_json::Error> {
        let ordinals: HashMap<String, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.to_string(), index))
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(canonical_ref(&ordinals, &self.starting_node_id.to_string()).as_bytes());
        for node in &self.nodes {
            let mut value = serde_json::to_value(node)?;
            remap_ids(&mut value, &ordinals);
            hasher.update(value.to_string().as_bytes());
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

fn canonical_ref(ordinals: &HashMap<String, usize>, id: &str) -> String {
    ordinals
        .get(id)
        .map_or_else(|| id.to_string(), |ordinal| format!("#{ordinal}"))
}

fn remap_ids(value: &mut serde_json::Value, ordinals: &HashMap<String, usize>) {
    match value {
        serde_json::Value::String(s) => {
            if ordinals.contains_key(s.as_str()) {
                *s = canonical_ref(ordinals, s);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                remap_ids(item, ordinals);
            }
        }
        serde_json::Value::Object(map) => {
            // Outcome dependencies are keyed by name, not id, so only values move.
            for item in map.values_mut() {
                remap_ids(item, ordinals);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Adviser, FacilitatorType, NodeGroup, StepParameters, StepType};
    use crate::utils::generate_node_id;

    fn step(identifier: &str) -> PlanNode {
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

    fn chain(identifier: &str, children: &[&PlanNode]) -> PlanNode {
        PlanNode::new(
            generate_node_id(),
            identifier,
            identifier,
            StepType::SECTION_CHAIN,
            NodeGroup::Execution,
            StepParameters::ChildChain {
                child_node_ids: children.iter().map(|c| c.id).collect(),
            },
            FacilitatorType::ChildChain,
        )
    }

    fn two_step_plan() -> Plan {
        let b = step("b");
        let a = step("a").with_advisers(vec![Adviser::NextStep { next_node_id: b.id }]);
        let root = chain("execution", &[&a, &b]);
        Plan::from_result(PlanCreationResult::assemble(
            root,
            [PlanCreationResult::single(a), PlanCreationResult::single(b)],
        ))
        .unwrap()
    }

    #[test]
    fn test_valid_plan_passes() {
        let plan = two_step_plan();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.starting_node().map(|n| n.identifier.as_str()), Some("execution"));
        assert!(plan.find_by_identifier("b").is_some());
    }

    #[test]
    fn test_dangling_child_is_rejected() {
        let a = step("a");
        let orphan = step("orphan");
        let root = chain("execution", &[&a, &orphan]);
        let err = Plan::from_result(PlanCreationResult::assemble(root, [PlanCreationResult::single(a)]))
            .unwrap_err();
        assert!(matches!(err, IntegrityError::DanglingReference { ref from, .. } if from == "execution"));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let a = step("a");
        let copy = a.clone();
        let root = chain("execution", &[&a]);
        let err = Plan::from_result(PlanCreationResult::assemble(
            root,
            [PlanCreationResult::single(a), PlanCreationResult::single(copy)],
        ))
        .unwrap_err();
        assert!(matches!(err, IntegrityError::DuplicateNodeId { .. }));
    }

    #[test]
    fn test_missing_starting_node_is_rejected() {
        let plan = Plan {
            plan_id: Uuid::now_v7(),
            starting_node_id: generate_node_id(),
            nodes: vec![step("a")],
            created_at: Utc::now(),
        };
        assert!(matches!(plan.validate(), Err(IntegrityError::MissingStartingNode { .. })));
    }

    #[test]
    fn test_fingerprint_ignores_ids() {
        let first = two_step_plan();
        let second = two_step_plan();
        assert_ne!(first.starting_node_id, second.starting_node_id);
        assert_eq!(first.structural_fingerprint().unwrap(), second.structural_fingerprint().unwrap());
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fingerprint = two_step_plan().structural_fingerprint().unwrap();
        assert_eq!(fingerprint.len(), 64);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_detects_structural_change() {
        let plan = two_step_plan();
        let mut changed = plan.clone();
        changed.nodes[1].advisers.clear();
        assert_ne!(plan.structural_fingerprint().unwrap(), changed.structural_fingerprint().unwrap());
    }
}
