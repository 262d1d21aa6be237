//! Fully-qualified dotted paths.
//!
//! These strings are only consumed at runtime, where expressions such as
//! `${stages.deploy.execution.canary.status}` resolve them back to a node
//! status. The compiler never resolves them itself.

/// Root segment for stage paths.
pub const STAGES: &str = "stages";
/// Segment of the execution section.
pub const EXECUTION: &str = "execution";
/// Segment of the service section.
pub const SERVICE: &str = "service";
/// Segment of the infrastructure section.
pub const INFRASTRUCTURE: &str = "infrastructure";
/// Segment of the environment inside the infrastructure section.
pub const ENVIRONMENT: &str = "environment";

/// Joins ancestor identifiers and `identifier` with `.`.
#[must_use]
pub fn fully_qualified_path<S: AsRef<str>>(ancestors: &[S], identifier: &str) -> String {
    let mut path = String::new();
    for ancestor in ancestors {
        path.push_str(ancestor.as_ref());
        path.push('.');
    }
    path.push_str(identifier);
    path
}

/// Key under which a stage section registers its outcome in the
/// dependency registry, e.g. `deploy.service`.
#[must_use]
pub fn outcome_scope_token(stage: &str, key: &str) -> String {
    fully_qualified_path(&[stage], key)
}
