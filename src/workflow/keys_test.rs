// ABOUTME: Tests for the output-key policy.
// ABOUTME: Covers validation rules, generation from hyphenated names, and duplicates.

use super::keys::*;
use crate::error::ValidationError;

#[test]
fn test_valid_keys() {
    for key in ["generated_code", "_private", "a", "Result2", "east_data"] {
        assert!(validate(key).is_ok(), "{} should be valid", key);
    }
}

#[test]
fn test_empty_key_rejected() {
    assert_eq!(validate(""), Err(ValidationError::EmptyOutputKey));
}

#[test]
fn test_key_must_not_start_with_digit() {
    assert_eq!(
        validate("1result"),
        Err(ValidationError::InvalidOutputKey("1result".into()))
    );
}

#[test]
fn test_key_rejects_hyphens_and_spaces() {
    assert!(validate("east-data").is_err());
    assert!(validate("east data").is_err());
    assert!(validate("east.data").is_err());
}

#[test]
fn test_length_limits() {
    let at_default = "k".repeat(DEFAULT_MAX_KEY_LEN);
    assert!(validate(&at_default).is_ok());

    let over_default = "k".repeat(DEFAULT_MAX_KEY_LEN + 1);
    match validate(&over_default) {
        Err(ValidationError::OutputKeyTooLong { max, .. }) => assert_eq!(max, DEFAULT_MAX_KEY_LEN),
        other => panic!("Expected OutputKeyTooLong, got {:?}", other),
    }

    // The config path allows up to 127.
    assert!(validate_with_max(&over_default, CONFIG_MAX_KEY_LEN).is_ok());
    assert!(validate_with_max(&"k".repeat(128), CONFIG_MAX_KEY_LEN).is_err());
}

#[test]
fn test_generate_from_hyphenated_names() {
    assert_eq!(generate("east-us", "data-collector"), "east_us_data_collector");
    assert_eq!(
        generate("prod-env", "east-us-collector"),
        "prod_env_east_us_collector"
    );
    assert_eq!(generate("production", "agent.v2"), "production_agent_v2");
}

#[test]
fn test_generated_keys_pass_validation() {
    let key = generate("kube-system", "node-exporter");
    assert!(validate(&key).is_ok());
}

#[test]
fn test_same_name_and_namespace_generate_same_key() {
    assert_eq!(
        generate("production", "collector"),
        generate("production", "collector")
    );
}

#[test]
fn test_sanitize_leaves_valid_characters() {
    assert_eq!(sanitize("abc_XYZ_123"), "abc_XYZ_123");
    assert_eq!(sanitize("a-b c/d"), "a_b_c_d");
}

#[test]
fn test_unique_keys_pass() {
    assert!(ensure_unique(["a", "b", "c"]).is_ok());
    assert!(ensure_unique(Vec::<&str>::new()).is_ok());
}

#[test]
fn test_duplicates_enumerate_every_value() {
    let err = ensure_unique(["code", "review", "code", "tests", "review", "code"]).unwrap_err();
    assert_eq!(
        err,
        ValidationError::DuplicateOutputKeys(vec!["code".into(), "review".into()])
    );

    let msg = err.to_string();
    assert!(msg.contains("code"));
    assert!(msg.contains("review"));
    assert!(!msg.contains("tests"));
}
