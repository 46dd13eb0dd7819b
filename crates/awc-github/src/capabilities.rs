//! Safe-output capabilities.
//!
//! The agent never writes to the repository itself. It records intended side
//! effects, and the `safe_outputs` job replays them with exactly the grant the
//! enabled capabilities require. Each capability here describes that job-level
//! wiring: required permissions, the handler step, and the outputs it exposes.

use crate::error::{CompileError, Result};
use crate::stages::AGENT;
use crate::workflow::schema::Step;
use awc_core::{Level, PermissionSet, Scope};
use awc_expr::ConditionNode;
use awc_expr::builder::{function, job_output, step_output, string_literal};
use indexmap::IndexMap;
use serde_json::Value;

/// Directory the handler scripts are unpacked into on the runner.
pub const HANDLER_DIR: &str = "/tmp/awc/actions";

/// One kind of side effect the agent may request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    /// Key under `safe-outputs:`
    pub name: &'static str,
    /// Step id of the handler, also the prefix of its job outputs
    pub step_id: &'static str,
    /// Handler script file name
    pub script: &'static str,
    /// Grants the handler needs
    pub permissions: &'static [(Scope, Level)],
    /// Step outputs the handler sets
    pub outputs: &'static [&'static str],
    /// Output holding the URL of the created artifact, if any
    pub url_output: Option<&'static str>,
    /// Whether the handler operates on a repository checkout
    pub needs_checkout: bool,
}

const COMMENT_SCOPES: &[(Scope, Level)] = &[
    (Scope::Discussions, Level::Write),
    (Scope::Issues, Level::Write),
    (Scope::PullRequests, Level::Write),
];

/// Every built-in capability, in registry order.
pub const BUILTIN_CAPABILITIES: &[Capability] = &[
    Capability {
        name: "create-issue",
        step_id: "create_issue",
        script: "create_issue.cjs",
        permissions: &[(Scope::Issues, Level::Write)],
        outputs: &["issue_number", "issue_url"],
        url_output: Some("issue_url"),
        needs_checkout: false,
    },
    Capability {
        name: "add-comment",
        step_id: "add_comment",
        script: "add_comment.cjs",
        permissions: COMMENT_SCOPES,
        outputs: &["comment_id", "comment_url"],
        url_output: Some("comment_url"),
        needs_checkout: false,
    },
    Capability {
        name: "create-pull-request",
        step_id: "create_pull_request",
        script: "create_pull_request.cjs",
        permissions: &[
            (Scope::Contents, Level::Write),
            (Scope::Issues, Level::Write),
            (Scope::PullRequests, Level::Write),
        ],
        outputs: &["pull_request_number", "pull_request_url", "branch_name"],
        url_output: Some("pull_request_url"),
        needs_checkout: true,
    },
    Capability {
        name: "add-labels",
        step_id: "add_labels",
        script: "add_labels.cjs",
        permissions: &[(Scope::Issues, Level::Write), (Scope::PullRequests, Level::Write)],
        outputs: &["labels_added"],
        url_output: None,
        needs_checkout: false,
    },
    Capability {
        name: "update-issue",
        step_id: "update_issue",
        script: "update_issue.cjs",
        permissions: &[(Scope::Issues, Level::Write)],
        outputs: &["issue_number", "issue_url"],
        url_output: Some("issue_url"),
        needs_checkout: false,
    },
    Capability {
        name: "create-discussion",
        step_id: "create_discussion",
        script: "create_discussion.cjs",
        permissions: &[(Scope::Discussions, Level::Write)],
        outputs: &["discussion_number", "discussion_url"],
        url_output: Some("discussion_url"),
        needs_checkout: false,
    },
    Capability {
        name: "create-pull-request-review-comment",
        step_id: "create_pr_review_comment",
        script: "create_pr_review_comment.cjs",
        permissions: &[(Scope::PullRequests, Level::Write)],
        outputs: &["review_comment_id", "review_comment_url"],
        url_output: Some("review_comment_url"),
        needs_checkout: false,
    },
    Capability {
        name: "push-to-pull-request-branch",
        step_id: "push_to_pull_request_branch",
        script: "push_to_pull_request_branch.cjs",
        permissions: &[(Scope::Contents, Level::Write), (Scope::PullRequests, Level::Read)],
        outputs: &["branch_name", "commit_sha", "push_url"],
        url_output: Some("push_url"),
        needs_checkout: true,
    },
    Capability {
        name: "upload-asset",
        step_id: "upload_assets",
        script: "upload_assets.cjs",
        permissions: &[(Scope::Contents, Level::Write)],
        outputs: &["branch_name", "published_count"],
        url_output: None,
        needs_checkout: true,
    },
    Capability {
        name: "create-code-scanning-alert",
        step_id: "create_code_scanning_alert",
        script: "create_code_scanning_alert.cjs",
        permissions: &[(Scope::SecurityEvents, Level::Write)],
        outputs: &["sarif_file", "findings_count"],
        url_output: None,
        needs_checkout: false,
    },
    Capability {
        name: "missing-tool",
        step_id: "missing_tool",
        script: "missing_tool.cjs",
        permissions: &[],
        outputs: &["tools_reported", "total_count"],
        url_output: None,
        needs_checkout: false,
    },
    Capability {
        name: "noop",
        step_id: "noop",
        script: "noop.cjs",
        permissions: &[],
        outputs: &["noop_message"],
        url_output: None,
        needs_checkout: false,
    },
];

impl Capability {
    /// The grant this capability adds to the `safe_outputs` job.
    #[must_use]
    pub fn permissions(&self) -> PermissionSet {
        self.permissions
            .iter()
            .fold(PermissionSet::new(), |set, &(scope, level)| set.with(scope, level))
    }

    /// Whether the capability needs no write grant at all.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        !self.permissions().has_write()
    }

    /// Check a frontmatter configuration value.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::CapabilityConfig`] when the value is not a
    /// mapping or `max` is not a positive integer.
    pub fn validate_config(&self, config: &Value) -> Result<()> {
        let Value::Object(map) = config else {
            return Err(CompileError::capability_config(
                self.name,
                "expected a mapping or an empty value",
            ));
        };
        if let Some(max) = map.get("max") {
            if !max.as_u64().is_some_and(|max| max > 0) {
                return Err(CompileError::capability_config(
                    self.name,
                    format!("'max' must be a positive integer, found {max}"),
                ));
            }
        }
        Ok(())
    }

    /// Steps that apply this capability's records, in order.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid.
    pub fn steps(&self, config: &Value) -> Result<Vec<Step>> {
        self.validate_config(config)?;
        let encoded = serde_json::to_string(config)
            .map_err(|err| CompileError::capability_config(self.name, err.to_string()))?;

        let mut steps = Vec::new();
        if self.needs_checkout {
            steps.push(
                Step::uses("actions/checkout@v5")
                    .with_name(format!("Checkout repository for {}", self.name))
                    .with_condition(&self.condition())
                    .with_input("fetch-depth", 0)
                    .with_input("persist-credentials", false),
            );
        }
        steps.push(
            Step::uses("actions/github-script@v8")
                .with_name(format!("Apply {}", self.name))
                .with_id(self.step_id)
                .with_condition(&self.condition())
                .with_env("GH_AW_SAFE_OUTPUT_CONFIG", encoded)
                .with_input(
                    "script",
                    format!(
                        "const {{ main }} = require('{HANDLER_DIR}/{}');\nawait main();\n",
                        self.script
                    ),
                ),
        );
        Ok(steps)
    }

    /// Job outputs, named `<step_id>_<output>`.
    #[must_use]
    pub fn job_outputs(&self) -> IndexMap<String, String> {
        self.outputs
            .iter()
            .map(|output| {
                (
                    self.output_name(output),
                    step_output(self.step_id, output).render_interpolated(),
                )
            })
            .collect()
    }

    /// Job output name for one of this capability's step outputs.
    #[must_use]
    pub fn output_name(&self, output: &str) -> String {
        format!("{}_{output}", self.step_id)
    }

    /// `contains(needs.agent.outputs.output_types, '<name>')`
    fn condition(&self) -> ConditionNode {
        function(
            "contains",
            vec![job_output(AGENT, "output_types"), string_literal(self.name)],
        )
    }
}

/// Lookup table of capabilities by `safe-outputs` key.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    capabilities: IndexMap<&'static str, Capability>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self {
            capabilities: BUILTIN_CAPABILITIES
                .iter()
                .map(|capability| (capability.name, capability.clone()))
                .collect(),
        }
    }
}

impl CapabilityRegistry {
    /// Registry with the built-in capabilities
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a capability.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::UnknownCapability`] for unknown keys.
    pub fn get(&self, name: &str) -> Result<&Capability> {
        self.capabilities
            .get(name)
            .ok_or_else(|| CompileError::UnknownCapability {
                capability: name.to_string(),
            })
    }

    /// Registered names in registry order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.capabilities.keys().copied()
    }
}
