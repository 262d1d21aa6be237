//! The declarative input tree.
//!
//! These types are produced by an external parser and are read-only input
//! to the compiler. They derive `Deserialize` so that the parsed YAML/JSON
//! can be mapped straight onto them.

mod execution;
mod failure;
mod pipeline;

pub use execution::{ExecutionBlock, ExecutionElement, ParallelBlock, Step, StepGroup};
pub use failure::{ActionConfig, ErrorCategory, FailureStrategyConfig, Param};
pub use pipeline::{
    InfrastructureConfig, InfrastructureDefinition, Pipeline, ProvisionerBlock, ServiceConfig,
    ServiceDefinition, Stage, UseFromStage,
};

/// A borrowed view over any node of the declarative tree.
///
/// The compiler dispatches on this closed set of kinds with a single
/// `match`; there is no runtime registry of node handlers.
#[derive(Debug, Clone, Copy)]
pub enum DeclarativeNode<'a> {
    /// A whole pipeline.
    Pipeline(&'a Pipeline),
    /// A stage.
    Stage(&'a Stage),
    /// A stage's service section.
    Service(&'a ServiceConfig),
    /// A stage's infrastructure section.
    Infrastructure(&'a InfrastructureConfig),
    /// A stage's execution section.
    Execution(&'a ExecutionBlock),
    /// A step.
    Step(&'a Step),
    /// A step group.
    StepGroup(&'a StepGroup),
    /// A parallel block.
    Parallel(&'a ParallelBlock),
}

impl<'a> DeclarativeNode<'a> {
    /// The node kind as a short label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Pipeline(_) => "pipeline",
            Self::Stage(_) => "stage",
            Self::Service(_) => "service",
            Self::Infrastructure(_) => "infrastructure",
            Self::Execution(_) => "execution",
            Self::Step(_) => "step",
            Self::StepGroup(_) => "stepGroup",
            Self::Parallel(_) => "parallel",
        }
    }

    /// The node's identifier. Sections use their fixed section name.
    #[must_use]
    pub fn identifier(&self) -> &'a str {
        match self {
            Self::Pipeline(p) => &p.identifier,
            Self::Stage(s) => &s.identifier,
            Self::Service(_) => "service",
            Self::Infrastructure(_) => "infrastructure",
            Self::Execution(_) => "execution",
            Self::Step(s) => &s.identifier,
            Self::StepGroup(g) => &g.identifier,
            Self::Parallel(p) => &p.identifier,
        }
    }
}

impl<'a> From<&'a ExecutionElement> for DeclarativeNode<'a> {
    fn from(element: &'a ExecutionElement) -> Self {
        match element {
            ExecutionElement::Step(step) => Self::Step(step),
            ExecutionElement::StepGroup(group) => Self::StepGroup(group),
            ExecutionElement::Parallel(block) => Self::Parallel(block),
        }
    }
}
