//! Failure strategies: validation, resolution and adviser construction.

pub mod advisers;
pub mod resolver;
pub mod validation;

pub use advisers::{build_advisers, AdviserTarget};
pub use resolver::{level_map, merge_levels, resolve, LevelMap, ResolvedStrategies};
pub use validation::{validate_action, validate_rules, RuleScope, StrategyLevel};
