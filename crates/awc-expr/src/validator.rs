//! Injection-safety validation for `${{ ... }}` placeholders.
//!
//! Any placeholder that survives validation is interpolated unescaped into a
//! script context at run time, so the allow-list is deliberately narrow:
//! free-text event fields such as issue titles or comment bodies are never
//! accepted, and output namespaces only accept `root.<name>.outputs.<leaf>`.

use crate::ast::ConditionNode;
use crate::error::{ExprError, Finding, FindingReason, Result};
use crate::parser::parse_condition;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

// Non-greedy so adjacent placeholders are not merged
#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\$\{\{(.*?)\}\}").expect("placeholder pattern is valid")
});

/// Exact `github.*` paths that carry no attacker-controlled free text.
pub const ALLOWED_GITHUB_PATHS: &[&str] = &[
    "github.action",
    "github.actor",
    "github.actor_id",
    "github.base_ref",
    "github.event.after",
    "github.event.before",
    "github.event.check_run.id",
    "github.event.check_suite.id",
    "github.event.comment.id",
    "github.event.deployment.id",
    "github.event.deployment_status.id",
    "github.event.discussion.number",
    "github.event.head_commit.id",
    "github.event.installation.id",
    "github.event.issue.number",
    "github.event.label.id",
    "github.event.milestone.number",
    "github.event.organization.id",
    "github.event.page.id",
    "github.event.project.id",
    "github.event.pull_request.number",
    "github.event.release.id",
    "github.event.release.tag_name",
    "github.event.repository.id",
    "github.event.review.id",
    "github.event.review_comment.id",
    "github.event.sender.id",
    "github.event.workflow_run.conclusion",
    "github.event.workflow_run.event",
    "github.event.workflow_run.head_sha",
    "github.event.workflow_run.html_url",
    "github.event.workflow_run.id",
    "github.event.workflow_run.run_number",
    "github.event.workflow_run.status",
    "github.event_name",
    "github.job",
    "github.owner",
    "github.ref",
    "github.ref_name",
    "github.repository",
    "github.repository_owner",
    "github.run_attempt",
    "github.run_id",
    "github.run_number",
    "github.server_url",
    "github.sha",
    "github.workflow",
    "github.workspace",
];

/// Functions callable from validated expressions.
pub const ALLOWED_FUNCTIONS: &[&str] = &[
    "always",
    "cancelled",
    "contains",
    "endswith",
    "failure",
    "format",
    "fromjson",
    "hashfiles",
    "join",
    "startswith",
    "success",
    "tojson",
];

/// Find every `${{ ... }}` placeholder in `text`, returning the trimmed inner text.
#[must_use]
pub fn extract_expressions(text: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim()))
        .collect()
}

/// Replace every `${{ ... }}` placeholder in `text` with `replace(inner)`,
/// where `inner` is the trimmed expression text.
#[must_use]
pub fn replace_expressions(text: &str, mut replace: impl FnMut(&str) -> String) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &regex::Captures<'_>| {
            caps.get(1).map_or_else(String::new, |m| replace(m.as_str().trim()))
        })
        .into_owned()
}

/// Allow-list validator for interpolated expressions.
#[derive(Debug, Clone)]
pub struct ExpressionValidator {
    declared_inputs: Option<BTreeSet<String>>,
    allowed_secrets: BTreeSet<String>,
}

impl Default for ExpressionValidator {
    fn default() -> Self {
        Self {
            declared_inputs: None,
            allowed_secrets: BTreeSet::from(["GITHUB_TOKEN".to_string()]),
        }
    }
}

impl ExpressionValidator {
    /// Validator with the default secret subset and no input restriction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `inputs.*` and `github.event.inputs.*` to the declared names.
    #[must_use]
    pub fn with_declared_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared_inputs = Some(inputs.into_iter().map(Into::into).collect());
        self
    }

    /// Permit one more `secrets.<NAME>`.
    #[must_use]
    pub fn with_allowed_secret(mut self, name: impl Into<String>) -> Self {
        self.allowed_secrets.insert(name.into());
        self
    }

    fn input_allowed(&self, name: &str) -> bool {
        self.declared_inputs
            .as_ref()
            .is_none_or(|declared| declared.contains(name))
    }

    /// Whether a single dotted property path may be interpolated.
    #[must_use]
    pub fn is_authorized_path(&self, path: &str) -> bool {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return false;
        }

        match segments.as_slice() {
            ["needs" | "steps", _, "outputs", _] => true,
            ["inputs", name] => self.input_allowed(name),
            ["github", "event", "inputs", name] => self.input_allowed(name),
            ["env", _] => true,
            ["secrets", name] => self.allowed_secrets.contains(*name),
            ["github", ..] => ALLOWED_GITHUB_PATHS.contains(&path),
            _ => false,
        }
    }

    /// Collect findings for an already-parsed condition.
    #[must_use]
    pub fn condition_findings(&self, expression: &str, node: &ConditionNode) -> Vec<Finding> {
        let mut findings = Vec::new();

        for path in node.property_paths() {
            if !self.is_authorized_path(path) {
                push_unique(
                    &mut findings,
                    Finding {
                        expression: expression.to_string(),
                        reason: FindingReason::UnauthorizedPath(path.to_string()),
                    },
                );
            }
        }

        for name in node.function_names() {
            if !ALLOWED_FUNCTIONS.contains(&name.to_ascii_lowercase().as_str()) {
                push_unique(
                    &mut findings,
                    Finding {
                        expression: expression.to_string(),
                        reason: FindingReason::UnknownFunction(name.to_string()),
                    },
                );
            }
        }

        findings
    }

    /// Scan `text` and return every rejected placeholder, in order of appearance.
    #[must_use]
    pub fn findings_in_text(&self, text: &str) -> Vec<Finding> {
        let mut findings = Vec::new();

        for expression in extract_expressions(text) {
            match parse_condition(expression) {
                Ok(node) => {
                    for finding in self.condition_findings(expression, &node) {
                        push_unique(&mut findings, finding);
                    }
                }
                Err(err) => push_unique(
                    &mut findings,
                    Finding {
                        expression: expression.to_string(),
                        reason: FindingReason::Unparseable(parse_message(&err)),
                    },
                ),
            }
        }

        debug!(count = findings.len(), "Scanned text for expressions");
        findings
    }

    /// Validate every placeholder in `text`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Unauthorized`] listing all findings when any
    /// placeholder is rejected.
    pub fn validate_text(&self, text: &str) -> Result<()> {
        into_result(self.findings_in_text(text))
    }

    /// Validate a parsed condition.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Unauthorized`] listing all findings.
    pub fn validate_condition(&self, node: &ConditionNode) -> Result<()> {
        into_result(self.condition_findings(&node.render(), node))
    }
}

fn parse_message(err: &ExprError) -> String {
    match err {
        ExprError::Parse { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn push_unique(findings: &mut Vec<Finding>, finding: Finding) {
    if !findings.contains(&finding) {
        findings.push(finding);
    }
}

fn into_result(findings: Vec<Finding>) -> Result<()> {
    if findings.is_empty() {
        Ok(())
    } else {
        Err(ExprError::Unauthorized { findings })
    }
}
