//! Integration tests for parsing complete workflow sources.

use awc_core::{
    Error, FragmentResolver, Level, NoImports, ParseOptions, ParsedWorkflow, Roles, SchemaCache,
    Scope, WorkflowSpec,
};
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

const FULL_WORKFLOW: &str = r"---
name: Weekly Research
description: Summarize open issues
on:
  issues:
    types: [opened]
  workflow_dispatch:
    inputs:
      topic:
        description: What to research
  stop-after: +7d
  skip-if-match: 'is:issue is:open label:research-done'
  reaction: +1
  status-comment: true
roles: [admin, maintainer]
rate-limit:
  max: 2
  window: 30
engine:
  id: claude
  model: claude-sonnet-4
runs-on: ubuntu-24.04
timeout-minutes: 45
env:
  LOG_LEVEL: debug
permissions:
  contents: read
  issues: read
imports:
  - shared/reporting.md
safe-outputs:
  create-issue:
    title-prefix: '[research] '
  missing-tool:
---

# Weekly Research

Research ${{ inputs.topic }} for issue #${{ github.event.issue.number }}.
";

fn options<'a>(schema: &'a SchemaCache, resolver: &'a dyn FragmentResolver) -> ParseOptions<'a> {
    ParseOptions {
        schema,
        resolver,
        now: Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap(),
    }
}

fn parse_with(source: &str, resolver: &dyn FragmentResolver) -> awc_core::Result<ParsedWorkflow> {
    let schema = SchemaCache::new();
    WorkflowSpec::parse("weekly-research", source, &options(&schema, resolver))
}

#[test]
fn test_full_workflow() {
    let resolver = BTreeMap::from([(
        "shared/reporting.md".to_string(),
        "---\nenv:\n  REPORT_FORMAT: markdown\nsafe-outputs:\n  add-comment:\n    max: 1\n---\nAlways end with a summary table.\n"
            .to_string(),
    )]);

    let parsed = parse_with(FULL_WORKFLOW, &resolver).unwrap();
    assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
    let spec = parsed.spec;

    assert_eq!(spec.id, "weekly-research");
    assert_eq!(spec.name, "Weekly Research");
    assert_eq!(spec.description.as_deref(), Some("Summarize open issues"));
    assert_eq!(
        spec.triggers.names().collect::<Vec<_>>(),
        vec!["issues", "workflow_dispatch"]
    );
    assert_eq!(spec.dispatch_inputs, vec!["topic"]);
    assert_eq!(
        spec.stop_time,
        Some(Utc.with_ymd_and_hms(2025, 3, 8, 8, 30, 0).unwrap())
    );
    assert_eq!(spec.reaction.as_deref(), Some("+1"));
    assert!(spec.status_comment);
    assert_eq!(
        spec.roles,
        Roles::Restricted(vec!["admin".into(), "maintainer".into()])
    );
    let rate_limit = spec.rate_limit.unwrap();
    assert_eq!((rate_limit.max, rate_limit.window_minutes), (2, 30));
    assert_eq!(spec.engine.id, "claude");
    assert_eq!(spec.engine.model.as_deref(), Some("claude-sonnet-4"));
    assert_eq!(spec.runs_on, "ubuntu-24.04");
    assert_eq!(spec.timeout_minutes, 45);
    assert_eq!(spec.permissions.level(Scope::Issues), Level::Read);

    let env: Vec<_> = spec.env.keys().cloned().collect();
    assert_eq!(env, vec!["LOG_LEVEL", "REPORT_FORMAT"]);

    let capabilities: Vec<_> = spec.safe_outputs.capabilities.keys().cloned().collect();
    assert_eq!(capabilities, vec!["create-issue", "missing-tool", "add-comment"]);

    assert!(spec.body.starts_with("# Weekly Research"));
    assert!(spec.body.ends_with("Always end with a summary table.\n"));
}

#[test]
fn test_unresolvable_import_is_a_warning() {
    let parsed = parse_with(FULL_WORKFLOW, &NoImports).unwrap();
    assert_eq!(parsed.warnings.len(), 1);
    assert!(parsed.warnings[0].contains("shared/reporting.md"));
    assert!(!parsed.spec.safe_outputs.capabilities.contains_key("add-comment"));
}

#[test]
fn test_conflicting_command_trigger() {
    let source = "---\non:\n  command: review\n  pull_request:\n    types: [opened]\n---\n";
    let err = parse_with(source, &NoImports).unwrap_err();
    assert!(matches!(err, Error::ConflictingTriggers { .. }));
    assert!(err.to_string().contains("pull_request"));
}

#[test]
fn test_bad_stop_after_names_field() {
    let source = "---\non:\n  issues:\n  stop-after: next tuesday\n---\n";
    let err = parse_with(source, &NoImports).unwrap_err();
    assert!(err.to_string().contains("on.stop-after"));
}

#[test]
fn test_bad_permission_scope() {
    let source = "---\non: issues\npermissions:\n  wiki: write\n---\n";
    assert!(matches!(
        parse_with(source, &NoImports),
        Err(Error::UnknownScope { .. })
    ));
}

#[test]
fn test_safe_job_unsupported_field() {
    let source = "---\non: issues\nsafe-outputs:\n  jobs:\n    deploy:\n      environment: prod\n      steps:\n        - run: ./deploy\n---\n";
    let err = parse_with(source, &NoImports).unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedJobField { ref job, ref field } if job == "deploy" && field == "environment"
    ));
}

#[test]
fn test_parsing_is_deterministic() {
    let resolver = BTreeMap::from([(
        "shared/reporting.md".to_string(),
        "Plain fragment body.\n".to_string(),
    )]);
    let first = parse_with(FULL_WORKFLOW, &resolver).unwrap().spec;
    let second = parse_with(FULL_WORKFLOW, &resolver).unwrap().spec;
    assert_eq!(first, second);
}
