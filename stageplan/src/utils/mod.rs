//! Identifier, path and validation helpers shared by the plan creators.

mod ids;
pub mod paths;
pub mod validation;

pub use ids::{generate_node_id, generate_node_ids, PlanNodeId};
pub use paths::fully_qualified_path;
pub use validation::{is_valid_identifier, validate_identifier, validate_unique_identifiers};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_node_id_is_valid() {
        let id = generate_node_id();
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_fully_qualified_path_reexport() {
        assert_eq!(fully_qualified_path(&["stages"], "s1"), "stages.s1");
    }
}
