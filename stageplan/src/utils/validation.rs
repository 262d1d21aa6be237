//! Validation utilities for declarative identifiers.
//!
//! Identifiers are joined with `.` into fully-qualified paths, so they must
//! not contain dots and must be unique within the namespace a path covers.

use crate::errors::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][0-9a-zA-Z_$]{0,127}$").expect("Valid regex pattern"));

/// Returns true if `identifier` matches the identifier syntax.
#[must_use]
pub fn is_valid_identifier(identifier: &str) -> bool {
    IDENTIFIER_PATTERN.is_match(identifier)
}

/// Validates the identifier syntax.
///
/// # Errors
///
/// Returns `ConfigError::InvalidIdentifier` if the identifier is malformed.
pub fn validate_identifier(identifier: &str) -> Result<(), ConfigError> {
    if is_valid_identifier(identifier) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

/// Validates that no identifier appears twice.
///
/// # Errors
///
/// Returns `ConfigError::DuplicateIdentifier` naming the first repeated
/// identifier in iteration order.
pub fn validate_unique_identifiers<'a, I>(identifiers: I, owner: &str) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for identifier in identifiers {
        if !seen.insert(identifier) {
            return Err(ConfigError::DuplicateIdentifier {
                identifier: identifier.to_string(),
                owner: owner.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("deploy"));
        assert!(is_valid_identifier("_canary_1"));
        assert!(is_valid_identifier("step$2"));
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1st"));
        assert!(!is_valid_identifier("stage.one"));
        assert!(!is_valid_identifier("with space"));
        assert!(!is_valid_identifier(&"a".repeat(129)));
    }

    #[test]
    fn test_validate_identifier_error() {
        let err = validate_identifier("a.b").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidIdentifier {
                identifier: "a.b".to_string()
            }
        );
    }

    #[test]
    fn test_unique_identifiers() {
        assert!(validate_unique_identifiers(["a", "b", "c"], "stage 's'").is_ok());

        let err = validate_unique_identifiers(["a", "b", "a"], "stage 's'").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateIdentifier { ref identifier, .. } if identifier == "a"
        ));
    }
}
