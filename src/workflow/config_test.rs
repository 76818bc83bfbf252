// ABOUTME: Tests for workflow configuration loading and building.
// ABOUTME: Covers YAML defaults, key resolution, resolvers, and validation failures.

use std::io::Write;
use std::sync::Arc;

use super::*;
use crate::context::{ExecutionContext, Session};
use crate::error::{ConfigError, ValidationError};
use crate::state::WorkflowStatus;
use crate::subtask::{Event, FnSubTask, SubTask};

fn replying(text: &str) -> Arc<dyn SubTask> {
    let text = text.to_string();
    Arc::new(FnSubTask::new(move |_ctx| {
        let text = text.clone();
        async move { Ok(vec![Event::text("worker", text)]) }
    }))
}

const COLLECTORS: &str = r#"
name: collectors
description: "Collect metrics from every region"
namespace: prod-env
type: parallel
max_workers: 3
sub_tasks:
  - name: east-us-collector
  - name: west-collector
    namespace: staging
  - name: summary
    output_key: regional_summary
    instruction: "Summarize for {team}"
"#;

#[test]
fn test_parse_yaml_with_defaults() {
    let config = WorkflowConfig::from_yaml("name: minimal\n").unwrap();
    assert_eq!(config.name, "minimal");
    assert_eq!(config.namespace, "default");
    assert_eq!(config.workflow_type, WorkflowType::Parallel);
    assert_eq!(config.max_workers, 5);
    assert_eq!(config.max_value_bytes, 10 * 1024 * 1024);
    assert!(config.sub_tasks.is_empty());
}

#[test]
fn test_parse_full_yaml() {
    let config = WorkflowConfig::from_yaml(COLLECTORS).unwrap();
    assert_eq!(config.namespace, "prod-env");
    assert_eq!(config.max_workers, 3);
    assert_eq!(config.sub_tasks.len(), 3);
    assert_eq!(config.sub_tasks[1].namespace.as_deref(), Some("staging"));
    assert_eq!(
        config.sub_tasks[2].instruction.as_deref(),
        Some("Summarize for {team}")
    );
}

#[test]
fn test_sequential_type_and_alias() {
    let config = WorkflowConfig::from_yaml("name: pipe\ntype: sequential\n").unwrap();
    assert_eq!(config.workflow_type, WorkflowType::Sequential);

    let config = WorkflowConfig::from_yaml("name: pipe\nworkflow_type: sequential\n").unwrap();
    assert_eq!(config.workflow_type, WorkflowType::Sequential);
}

#[test]
fn test_invalid_yaml_is_yaml_error() {
    let err = WorkflowConfig::from_yaml("name: [unclosed").unwrap_err();
    assert!(matches!(err, ConfigError::Yaml(_)));

    let err = WorkflowConfig::from_yaml("type: parallel\n").unwrap_err();
    assert!(matches!(err, ConfigError::Yaml(_)), "name is required");
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(COLLECTORS.as_bytes()).unwrap();

    let config = WorkflowConfig::from_file(file.path()).unwrap();
    assert_eq!(config.name, "collectors");
}

#[test]
fn test_from_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = WorkflowConfig::from_file(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_output_keys_generated_and_inherited() {
    let config = WorkflowConfig::from_yaml(COLLECTORS).unwrap();
    assert_eq!(
        config.output_keys().unwrap(),
        vec![
            "prod_env_east_us_collector".to_string(),
            "staging_west_collector".to_string(),
            "regional_summary".to_string(),
        ]
    );
}

#[test]
fn test_explicit_keys_are_verbatim() {
    let mut config = WorkflowConfig::new("verbatim");
    let mut reference = SubTaskReference::new("x");
    reference.output_key = Some("not-a-valid-identifier".into());
    config.sub_tasks.push(reference);

    assert_eq!(config.output_keys().unwrap(), vec!["not-a-valid-identifier"]);
}

#[test]
fn test_generated_key_allows_up_to_127_chars() {
    let mut config = WorkflowConfig::new("long");
    config.namespace = "n".repeat(63);
    config.sub_tasks.push(SubTaskReference::new("t".repeat(63)));
    assert_eq!(config.output_keys().unwrap()[0].len(), 127);

    config.sub_tasks[0].name = "t".repeat(64);
    assert!(matches!(
        config.output_keys(),
        Err(ValidationError::OutputKeyTooLong { max: 127, .. })
    ));
}

#[test]
fn test_generated_key_starting_with_digit_rejected() {
    let mut config = WorkflowConfig::new("digits");
    config.namespace = "1st".into();
    config.sub_tasks.push(SubTaskReference::new("agent"));
    assert!(matches!(
        config.output_keys(),
        Err(ValidationError::InvalidOutputKey(_))
    ));
}

#[test]
fn test_validate_catches_duplicates_and_workers() {
    let yaml = r#"
name: dupes
sub_tasks:
  - name: a
    output_key: same
  - name: b
    output_key: same
"#;
    let config = WorkflowConfig::from_yaml(yaml).unwrap();
    assert_eq!(
        config.validate(),
        Err(ValidationError::DuplicateOutputKeys(vec!["same".into()]))
    );

    let mut config = WorkflowConfig::new("workers");
    config.max_workers = 0;
    assert!(config.validate().is_err());
    config.workflow_type = WorkflowType::Sequential;
    assert!(config.validate().is_ok());
}

#[test]
fn test_build_with_unknown_sub_task() {
    let config = WorkflowConfig::from_yaml(COLLECTORS).unwrap();
    let catalog = SubTaskCatalog::new().register("east-us-collector", replying("e"));

    let err = config.build(&catalog).unwrap_err();
    match err {
        ConfigError::UnknownSubTask(name) => assert_eq!(name, "staging/west-collector"),
        other => panic!("Expected UnknownSubTask, got {:?}", other),
    }
}

#[test]
fn test_build_surfaces_validation_errors() {
    let yaml = r#"
name: bad
max_workers: 99
sub_tasks:
  - name: a
"#;
    let config = WorkflowConfig::from_yaml(yaml).unwrap();
    let catalog = SubTaskCatalog::new().register("a", replying("a"));
    assert!(matches!(
        config.build(&catalog),
        Err(ConfigError::Validation(ValidationError::MaxWorkersOutOfRange { value: 99 }))
    ));
}

#[test]
fn test_catalog_prefers_namespaced_entry() {
    let catalog = SubTaskCatalog::new()
        .register("collector", replying("bare"))
        .register_in("prod", "collector", replying("namespaced"));
    assert_eq!(catalog.len(), 2);

    let mut reference = SubTaskReference::new("collector");
    assert!(catalog.resolve(&reference).is_some());
    reference.namespace = Some("prod".into());
    assert!(catalog.resolve(&reference).is_some());
    reference.name = "missing".into();
    assert!(catalog.resolve(&reference).is_none());
}

#[tokio::test]
async fn test_build_and_run_parallel_from_config() {
    let config = WorkflowConfig::from_yaml(COLLECTORS).unwrap();
    let catalog = SubTaskCatalog::new()
        .register_in("prod-env", "east-us-collector", replying("east: ok"))
        .register("west-collector", replying("west: ok"))
        .register(
            "summary",
            Arc::new(FnSubTask::new(|ctx: ExecutionContext| async move {
                Ok(vec![Event::text("summary", ctx.instruction().unwrap_or_default())])
            })),
        );

    let workflow = config.build(&catalog).unwrap();
    assert_eq!(workflow.workflow_type(), WorkflowType::Parallel);
    assert_eq!(workflow.name(), "collectors");
    assert_eq!(workflow.sub_tasks()[1].namespace.as_deref(), Some("staging"));

    let ctx = ExecutionContext::new(Session::new("cfg-run", "ops", "app"));
    ctx.session().set("team", "platform");
    let report = workflow.run(&ctx).await.unwrap();

    assert_eq!(report.status, WorkflowStatus::Completed);
    assert_eq!(
        ctx.session().get("prod_env_east_us_collector"),
        Some("east: ok".to_string())
    );
    assert_eq!(
        ctx.session().get("staging_west_collector"),
        Some("west: ok".to_string())
    );
    assert_eq!(
        ctx.session().get("regional_summary"),
        Some("Summarize for platform".to_string())
    );
}

#[tokio::test]
async fn test_closure_resolver_builds_sequential() {
    let yaml = r#"
name: pipe
type: sequential
sub_tasks:
  - name: writer
    output_key: draft
  - name: editor
    output_key: final
    instruction: "Edit: {draft}"
"#;
    let config = WorkflowConfig::from_yaml(yaml).unwrap();
    let resolver = |reference: &SubTaskReference| -> Option<Arc<dyn SubTask>> {
        match reference.name.as_str() {
            "writer" => Some(replying("first draft")),
            "editor" => Some(Arc::new(FnSubTask::new(|ctx: ExecutionContext| async move {
                Ok(vec![Event::text("editor", ctx.instruction().unwrap_or_default())])
            }))),
            _ => None,
        }
    };

    let workflow = config.build(&resolver).unwrap();
    assert_eq!(workflow.workflow_type(), WorkflowType::Sequential);

    let ctx = ExecutionContext::new(Session::new("cfg-seq", "ops", "app"));
    let report = workflow.run(&ctx).await.unwrap();
    assert_eq!(
        report.outputs().unwrap()["final"],
        "Edit: first draft"
    );
}
