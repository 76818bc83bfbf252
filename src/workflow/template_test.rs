// ABOUTME: Tests for template substitution.
// ABOUTME: Covers missing keys, single-pass expansion, repeats and no-op templates.

use std::collections::HashMap;

use super::template::{placeholders, substitute};
use crate::error::TemplateError;

fn state(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_substitutes_single_key() {
    let s = state(&[("generated_code", "def hello(): pass")]);
    let out = substitute("Review this code: {generated_code}", &s).unwrap();
    assert_eq!(out, "Review this code: def hello(): pass");
}

#[test]
fn test_missing_key_lists_available_keys() {
    let s = state(&[("generated_code", "x")]);
    let err = substitute("Review: {code}", &s).unwrap_err();

    assert_eq!(
        err,
        TemplateError::MissingKey {
            key: "code".into(),
            available: vec!["generated_code".into()],
        }
    );
    let msg = err.to_string();
    assert!(msg.contains("State key 'code' not found"));
    assert!(msg.contains("Available keys: [generated_code]"));
}

#[test]
fn test_available_keys_are_sorted() {
    let s = state(&[("zeta", "1"), ("alpha", "2"), ("mid", "3")]);
    match substitute("{missing}", &s) {
        Err(TemplateError::MissingKey { available, .. }) => {
            assert_eq!(available, vec!["alpha", "mid", "zeta"]);
        }
        other => panic!("Expected MissingKey, got {:?}", other),
    }
}

#[test]
fn test_no_placeholders_is_noop() {
    let template = "Plain text with braces { not a key } and {1bad}.";
    let out = substitute(template, &HashMap::new()).unwrap();
    assert_eq!(out, template);
}

#[test]
fn test_values_are_not_rescanned() {
    let s = state(&[("a", "{b}"), ("b", "should not appear")]);
    let out = substitute("value: {a}", &s).unwrap();
    assert_eq!(out, "value: {b}");
}

#[test]
fn test_self_reference_does_not_loop() {
    let s = state(&[("a", "{a}{a}")]);
    let out = substitute("{a}", &s).unwrap();
    assert_eq!(out, "{a}{a}");
}

#[test]
fn test_repeated_placeholder_replaced_consistently() {
    let s = state(&[("name", "east")]);
    let out = substitute("{name} then {name} again, {name}", &s).unwrap();
    assert_eq!(out, "east then east again, east");
}

#[test]
fn test_multiple_keys() {
    let s = state(&[
        ("generated_code", "fn f() {}"),
        ("review_comments", "add docs"),
    ]);
    let out = substitute(
        "Original code:\n{generated_code}\n\nReview comments:\n{review_comments}",
        &s,
    )
    .unwrap();
    assert!(out.contains("fn f() {}"));
    assert!(out.contains("add docs"));
    assert!(!out.contains("{generated_code}"));
}

#[test]
fn test_placeholders_in_order_without_repeats() {
    assert_eq!(
        placeholders("{b} {a} {b} {c_1}"),
        vec!["b".to_string(), "a".to_string(), "c_1".to_string()]
    );
    assert!(placeholders("nothing here").is_empty());
}
