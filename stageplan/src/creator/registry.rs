//! Outcome dependency registry.
//!
//! Service, environment and infrastructure nodes register themselves under a
//! scope token (`<stage>.<key>`) so later steps of the same stage can find
//! the node producing an outcome by key rather than by direct reference.

use crate::utils::PlanNodeId;
use dashmap::DashMap;
use tracing::debug;

/// Key-to-producer lookup consumed by the plan creators.
#[cfg_attr(test, mockall::automock)]
pub trait DependencyRegistry: Send + Sync {
    /// Records `node_id` as the producer of `key`. A later registration of
    /// the same key wins.
    fn register(&self, key: &str, node_id: PlanNodeId);

    /// Looks up the producer of `key`.
    fn resolve(&self, key: &str) -> Option<PlanNodeId>;
}

/// Concurrent registry scoped to one compile.
#[derive(Debug, Default)]
pub struct StepDependencyRegistry {
    entries: DashMap<String, PlanNodeId>,
}

impl StepDependencyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl DependencyRegistry for StepDependencyRegistry {
    fn register(&self, key: &str, node_id: PlanNodeId) {
        if let Some(previous) = self.entries.insert(key.to_string(), node_id) {
            debug!(key = %key, previous = %previous, current = %node_id, "Outcome producer re-registered");
        }
    }

    fn resolve(&self, key: &str) -> Option<PlanNodeId> {
        self.entries.get(key).map(|entry| *entry.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_node_id;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_register_and_resolve() {
        let registry = StepDependencyRegistry::new();
        let id = generate_node_id();
        registry.register("deploy.service", id);

        assert_eq!(registry.resolve("deploy.service"), Some(id));
        assert_eq!(registry.resolve("deploy.infrastructure"), None);
        assert_eq!(registry.keys(), vec!["deploy.service".to_string()]);
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = StepDependencyRegistry::new();
        let first = generate_node_id();
        let second = generate_node_id();
        registry.register("deploy.service", first);
        registry.register("deploy.service", second);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("deploy.service"), Some(second));
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(StepDependencyRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.register(&format!("stage{i}.service"), generate_node_id()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_mock_registry() {
        let id = generate_node_id();
        let mut mock = MockDependencyRegistry::new();
        mock.expect_resolve()
            .withf(|key| key == "deploy.service")
            .return_const(Some(id));

        assert_eq!(mock.resolve("deploy.service"), Some(id));
    }
}
