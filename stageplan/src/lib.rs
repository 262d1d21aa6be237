//! # Stageplan
//!
//! Compiles declarative deployment pipelines into executable plans.
//!
//! A pipeline is a tree of stages, each with optional service and
//! infrastructure sections and an execution section of steps, step groups
//! and parallel blocks. Stageplan turns that tree into a flat graph of
//! [`PlanNode`](plan::PlanNode)s, each carrying:
//!
//! - **A facilitator**: how the runtime drives the node (sync, a chain of
//!   children, a fan-out, a task chain)
//! - **Advisers**: what happens after the node ends, derived from the
//!   failure strategies in scope plus next-step routing
//! - **Rollback subgraphs**: reverse-ordered, gated rollback of step groups
//!   and stage-level rollback steps
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stageplan::prelude::*;
//!
//! let pipeline = Pipeline::new("release").with_stage(
//!     Stage::new("deploy", ExecutionBlock::new([Step::new("rollout", "K8sRollingDeploy")]))
//!         .with_failure_strategy(FailureStrategyConfig::all_errors(ActionConfig::StageRollback)),
//! );
//!
//! let plan = PlanCompiler::new(CompilerConfig::default()).compile(&pipeline)?;
//! println!("{} nodes", plan.len());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod creator;
pub mod declarative;
pub mod errors;
pub mod observability;
pub mod plan;
pub mod strategy;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::CompilerConfig;
    pub use crate::creator::{
        CompileContext, DependencyRegistry, PlanCompiler, StepDependencyRegistry,
    };
    pub use crate::declarative::{
        ActionConfig, DeclarativeNode, ErrorCategory, ExecutionBlock, ExecutionElement,
        FailureStrategyConfig, InfrastructureConfig, ParallelBlock, Pipeline, ServiceConfig,
        Stage, Step, StepGroup,
    };
    pub use crate::errors::{ConfigError, IntegrityError, LookupError, PlanError};
    pub use crate::observability::{init_tracing, CompileSummary};
    pub use crate::plan::{
        Adviser, AdviserType, FacilitatorType, NodeGroup, Plan, PlanCreationResult, PlanNode,
        RollbackNode, StepParameters, StepType,
    };
    pub use crate::utils::PlanNodeId;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn prelude_compiles_a_pipeline() {
        let pipeline = Pipeline::new("release").with_stage(Stage::new(
            "deploy",
            ExecutionBlock::new([Step::new("rollout", "K8sRollingDeploy")]),
        ));
        let plan = PlanCompiler::new(CompilerConfig::default())
            .compile(&pipeline)
            .unwrap();
        assert_eq!(plan.len(), 4);
    }
}
