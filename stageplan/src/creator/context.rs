//! Immutable compile context threaded through the recursive plan creators.

use super::registry::DependencyRegistry;
use crate::config::CompilerConfig;
use crate::declarative::{FailureStrategyConfig, Stage, StepGroup};
use crate::errors::ConfigError;
use crate::strategy::{resolve, ResolvedStrategies};
use crate::utils::paths::{self, STAGES};
use crate::utils::fully_qualified_path;

/// What each creator needs to know about where it sits in the tree.
///
/// Contexts are never mutated. Descending into a stage, section, step
/// group or rollback block derives a new context from the parent.
#[derive(Clone)]
pub struct CompileContext<'a> {
    /// The compiler configuration.
    pub config: &'a CompilerConfig,
    /// Outcome registry shared by the whole compile.
    pub registry: &'a dyn DependencyRegistry,
    /// Identifier of the enclosing stage.
    pub stage_identifier: Option<&'a str>,
    /// Path segments of the enclosing section, e.g. `["stages", "deploy", "execution"]`.
    pub ancestors: Vec<String>,
    /// Failure rules of the enclosing stage.
    pub stage_strategies: &'a [FailureStrategyConfig],
    /// Identifier and failure rules of the nearest enclosing step group.
    pub step_group: Option<(&'a str, &'a [FailureStrategyConfig])>,
    /// Inside a rollback block.
    pub inside_rollback: bool,
}

impl std::fmt::Debug for CompileContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileContext")
            .field("stage_identifier", &self.stage_identifier)
            .field("ancestors", &self.ancestors)
            .field("step_group", &self.step_group.map(|(id, _)| id))
            .field("inside_rollback", &self.inside_rollback)
            .finish_non_exhaustive()
    }
}

impl<'a> CompileContext<'a> {
    /// Creates a root context.
    #[must_use]
    pub fn new(config: &'a CompilerConfig, registry: &'a dyn DependencyRegistry) -> Self {
        Self {
            config,
            registry,
            stage_identifier: None,
            ancestors: Vec::new(),
            stage_strategies: &[],
            step_group: None,
            inside_rollback: false,
        }
    }

    /// Context for the body of `stage`.
    #[must_use]
    pub fn for_stage(&self, stage: &'a Stage) -> Self {
        Self {
            stage_identifier: Some(stage.identifier.as_str()),
            ancestors: vec![STAGES.to_string(), stage.identifier.clone()],
            stage_strategies: &stage.failure_strategies,
            step_group: None,
            inside_rollback: false,
            ..self.clone()
        }
    }

    /// Context one path segment deeper.
    #[must_use]
    pub fn with_ancestor(&self, segment: &str) -> Self {
        let mut ctx = self.clone();
        ctx.ancestors.push(segment.to_string());
        ctx
    }

    /// Context for the children of `group`.
    ///
    /// Paths stay flat: step group identifiers are not added as segments.
    #[must_use]
    pub fn in_step_group(&self, group: &'a StepGroup) -> Self {
        Self {
            step_group: Some((group.identifier.as_str(), group.failure_strategies.as_slice())),
            ..self.clone()
        }
    }

    /// Context for a rollback block.
    #[must_use]
    pub fn in_rollback(&self) -> Self {
        Self {
            inside_rollback: true,
            ..self.clone()
        }
    }

    /// Returns true inside a step group.
    #[must_use]
    pub const fn inside_step_group(&self) -> bool {
        self.step_group.is_some()
    }

    /// Fully-qualified path of a child of the current section.
    #[must_use]
    pub fn path_of(&self, identifier: &str) -> String {
        fully_qualified_path(&self.ancestors, identifier)
    }

    /// Registry key of a stage outcome, if a stage is known.
    #[must_use]
    pub fn outcome_token(&self, key: &str) -> Option<String> {
        self.stage_identifier.map(|stage| paths::outcome_scope_token(stage, key))
    }

    /// Resolves the strategies of a node declaring `rules`, merged over the
    /// enclosing step group and stage.
    ///
    /// # Errors
    ///
    /// Propagates resolver errors from any of the levels.
    pub fn resolve_strategies(
        &self,
        owner: &str,
        rules: &[FailureStrategyConfig],
    ) -> Result<ResolvedStrategies, ConfigError> {
        let stage_owner = format!("stage '{}'", self.stage_identifier.unwrap_or_default());
        let group_owner = self.step_group.map(|(id, _)| format!("step group '{id}'"));

        let mut levels: Vec<(&str, &[FailureStrategyConfig])> =
            vec![(stage_owner.as_str(), self.stage_strategies)];
        if let (Some(owner), Some((_, group_rules))) = (&group_owner, self.step_group) {
            levels.push((owner.as_str(), group_rules));
        }
        levels.push((owner, rules));
        resolve(&levels)
    }
}
