// ABOUTME: Template substitution - expands {name} placeholders in instruction
// ABOUTME: text from a state snapshot in a single, non-recursive pass.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::TemplateError;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Replace every `{identifier}` in `template` with its value from `state`.
///
/// Inserted values are never re-scanned, so a value containing `{other}` is
/// emitted literally. A placeholder with no value fails with the missing key
/// and every available key, sorted.
///
/// ```
/// use std::collections::HashMap;
/// use fanout::workflow::substitute;
///
/// let state = HashMap::from([("generated_code".to_string(), "fn f() {}".to_string())]);
/// let out = substitute("Review this code: {generated_code}", &state).unwrap();
/// assert_eq!(out, "Review this code: fn f() {}");
/// ```
pub fn substitute(template: &str, state: &HashMap<String, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        let value = state.get(name.as_str()).ok_or_else(|| {
            let mut available: Vec<String> = state.keys().cloned().collect();
            available.sort();
            TemplateError::MissingKey {
                key: name.as_str().to_string(),
                available,
            }
        })?;

        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}

/// Placeholder names referenced by `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        if let Some(name) = caps.get(1) {
            if !names.iter().any(|n| n == name.as_str()) {
                names.push(name.as_str().to_string());
            }
        }
    }
    names
}
