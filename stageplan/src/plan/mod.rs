//! The compiled plan: nodes, advisers and their assembly.
//!
//! Every compile step returns a [`PlanCreationResult`] for its subtree.
//! The pipeline's result is finally wrapped into a validated [`Plan`].

mod adviser;
mod compiled;
mod node;
mod result;

pub use adviser::{Adviser, AdviserType, RepairAction};
pub use compiled::Plan;
pub use node::{
    EnvironmentParameters, FacilitatorType, InfrastructureParameters, NodeGroup, PlanNode, RollbackNode,
    ServiceParameters, StepParameters, StepSpecParameters, StepType,
};
pub use result::PlanCreationResult;
