//! Plan node identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Globally unique id of a compiled plan node.
///
/// Ids are generated, never user supplied. Human-facing labels live in
/// `PlanNode::identifier` and `PlanNode::name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanNodeId(Uuid);

impl PlanNodeId {
    /// Generates a fresh id.
    #[must_use]
    pub fn new() -> Self {
        generate_node_id()
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlanNodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates a new plan node id backed by a random UUID v4.
#[must_use]
pub fn generate_node_id() -> PlanNodeId {
    PlanNodeId(Uuid::new_v4())
}

/// Generates `count` fresh ids, used to pre-assign sibling ids so that each
/// sibling can point at the next one before it is compiled.
#[must_use]
pub fn generate_node_ids(count: usize) -> Vec<PlanNodeId> {
    (0..count).map(|_| generate_node_id()).collect()
}
