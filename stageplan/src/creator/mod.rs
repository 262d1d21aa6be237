//! Plan creators.
//!
//! Each declarative node kind has one creator function. Creators recurse
//! into their children through a [`CompileContext`] carrying the enclosing
//! stage, step group and rollback state, and return a
//! [`PlanCreationResult`](crate::plan::PlanCreationResult) holding the
//! node and all of its descendants. [`PlanCompiler`] is the entry point.

mod compiler;
mod context;
pub mod execution;
pub mod pipeline;
pub mod registry;
pub mod rollback;
pub mod stage;

pub use compiler::PlanCompiler;
pub use context::CompileContext;
pub use pipeline::StageCatalog;
pub use registry::{DependencyRegistry, StepDependencyRegistry};
