//! Testing utilities for plan compilation.
//!
//! This module provides:
//! - Declarative fixtures and a compile harness
//! - Structural assertions over compiled plans

mod assertions;
mod fixtures;

pub use assertions::{
    assert_has_adviser, assert_node, assert_node_count_by_type, assert_referential_integrity,
    assert_unique_ids,
};
pub use fixtures::{rollback_stage, shell_step, standard_deployment_stage, TestFixture, TestPipeline};
