//! Observability utilities.

mod summary;
mod tracing;

pub use summary::CompileSummary;
pub use self::tracing::{init_tracing, SpanTimer};
