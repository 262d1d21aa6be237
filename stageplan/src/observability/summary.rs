//! Per-compile summary event.

use crate::plan::{AdviserType, NodeGroup, Plan};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Shape of a compiled plan, logged once per compile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompileSummary {
    /// Pipeline identifier (the root node's identifier).
    pub pipeline: String,
    /// Total node count.
    pub node_count: usize,
    /// Nodes in the forward plan.
    pub forward_node_count: usize,
    /// Nodes grouped under rollback.
    pub rollback_node_count: usize,
    /// Stage nodes.
    pub stage_count: usize,
    /// Adviser counts keyed by adviser type.
    pub advisers: BTreeMap<AdviserType, usize>,
    /// Compile time in milliseconds.
    pub elapsed_ms: f64,
}

impl CompileSummary {
    /// Summarizes a plan.
    #[must_use]
    pub fn from_plan(plan: &Plan, elapsed_ms: f64) -> Self {
        let mut summary = Self {
            pipeline: plan
                .starting_node()
                .map(|node| node.identifier.clone())
                .unwrap_or_default(),
            node_count: plan.len(),
            elapsed_ms,
            ..Self::default()
        };

        for node in &plan.nodes {
            match node.group {
                NodeGroup::Rollback => summary.rollback_node_count += 1,
                NodeGroup::Stage => summary.stage_count += 1,
                _ => {}
            }
            for adviser in &node.advisers {
                *summary.advisers.entry(adviser.adviser_type()).or_insert(0) += 1;
            }
        }
        summary.forward_node_count = summary.node_count - summary.rollback_node_count;
        summary
    }

    /// Number of advisers of the given type.
    #[must_use]
    pub fn adviser_count(&self, adviser_type: AdviserType) -> usize {
        self.advisers.get(&adviser_type).copied().unwrap_or(0)
    }

    /// Emits the summary as one structured `info` event.
    pub fn log(&self) {
        let advisers = self
            .advisers
            .iter()
            .map(|(adviser_type, count)| format!("{adviser_type}={count}"))
            .collect::<Vec<_>>()
            .join(",");
        info!(
            pipeline = %self.pipeline,
            nodes = self.node_count,
            forward_nodes = self.forward_node_count,
            rollback_nodes = self.rollback_node_count,
            stages = self.stage_count,
            advisers = %advisers,
            elapsed_ms = self.elapsed_ms,
            "Plan compiled"
        );
    }
}
