// ABOUTME: Output-key policy - naming validation, deterministic generation from
// ABOUTME: namespace and name, and sibling-uniqueness checking.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

/// Default maximum key length.
pub const DEFAULT_MAX_KEY_LEN: usize = 100;

/// Maximum key length on the workflow-config path: namespace (63) + `_` + name (63).
pub const CONFIG_MAX_KEY_LEN: usize = 127;

static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Validate a key with the default length limit.
pub fn validate(key: &str) -> Result<(), ValidationError> {
    validate_with_max(key, DEFAULT_MAX_KEY_LEN)
}

/// Validate a key: non-empty, at most `max` characters, identifier-shaped.
pub fn validate_with_max(key: &str, max: usize) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::EmptyOutputKey);
    }

    if key.chars().count() > max {
        return Err(ValidationError::OutputKeyTooLong {
            key: key.to_string(),
            max,
        });
    }

    if !KEY_PATTERN.is_match(key) {
        return Err(ValidationError::InvalidOutputKey(key.to_string()));
    }

    Ok(())
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Generate the key for a sub-task that did not declare one.
///
/// `("prod-env", "east-us-collector")` becomes `prod_env_east_us_collector`.
pub fn generate(namespace: &str, name: &str) -> String {
    format!("{}_{}", sanitize(namespace), sanitize(name))
}

/// Fail if any key appears more than once, naming every duplicated value.
pub fn ensure_unique<'a>(keys: impl IntoIterator<Item = &'a str>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    let mut duplicates = BTreeSet::new();

    for key in keys {
        if !seen.insert(key) {
            duplicates.insert(key.to_string());
        }
    }

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::DuplicateOutputKeys(
            duplicates.into_iter().collect(),
        ))
    }
}
