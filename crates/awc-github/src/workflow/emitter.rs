//! GitHub Actions Workflow Emitter
//!
//! Renders a [`JobGraph`] into workflow YAML.
//!
//! # Graph to GitHub Actions Mapping
//!
//! | Graph | GitHub Actions |
//! |-------|----------------|
//! | `spec.name` | Workflow `name:` |
//! | `spec.triggers` | `on:` |
//! | `GraphJob.name` | Job key |
//! | `GraphJob.needs` | Job `needs:` |
//! | `GraphJob.guard` | Job `if:` |
//! | `GraphJob.permissions` | Job `permissions:` |
//! | `GraphJob.outputs` | Job `outputs:` |

use crate::error::Result;
use crate::graph::{GraphJob, JobGraph};
use crate::workflow::schema::{Concurrency, Job, RunsOn, Workflow};
use awc_core::{PermissionSet, WorkflowSpec};
use awc_expr::builder::property;
use indexmap::IndexMap;

const PER_ITEM_EVENTS: &[&str] = &[
    "issues",
    "issue_comment",
    "pull_request",
    "pull_request_review_comment",
    "discussion",
    "discussion_comment",
];

/// GitHub Actions workflow emitter
#[derive(Debug, Clone, Default)]
pub struct GitHubActionsEmitter {
    /// Path of the markdown source, named in the generated header
    pub source_path: Option<String>,
}

impl GitHubActionsEmitter {
    /// Create an emitter with no source path
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the source file in the header
    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Render the workflow file.
    ///
    /// # Errors
    ///
    /// Returns an error if YAML serialization fails.
    pub fn emit(&self, spec: &WorkflowSpec, graph: &JobGraph) -> Result<String> {
        let workflow = Self::build_workflow(spec, graph);
        self.serialize_workflow(&workflow)
    }

    /// Build the serializable workflow.
    #[must_use]
    pub fn build_workflow(spec: &WorkflowSpec, graph: &JobGraph) -> Workflow {
        Workflow {
            name: spec.name.clone(),
            on: spec.triggers.as_map().clone(),
            permissions: PermissionSet::new(),
            concurrency: Some(Self::build_concurrency(spec)),
            jobs: graph
                .jobs()
                .map(|job| (job.name.clone(), Self::build_job(job)))
                .collect::<IndexMap<_, _>>(),
        }
    }

    fn build_concurrency(spec: &WorkflowSpec) -> Concurrency {
        let per_item = spec
            .triggers
            .names()
            .any(|event| PER_ITEM_EVENTS.contains(&event));
        let workflow = property("github.workflow").render_interpolated();
        let group = if per_item {
            let item = property("github.event.issue.number")
                .or_else(property("github.event.pull_request.number"))
                .or_else(property("github.event.discussion.number"));
            format!("awc-{workflow}-{}", item.render_interpolated())
        } else {
            format!("awc-{workflow}")
        };
        Concurrency {
            group,
            cancel_in_progress: None,
        }
    }

    fn build_job(job: &GraphJob) -> Job {
        Job {
            name: job.display_name.clone(),
            needs: job.needs.clone(),
            if_condition: job.guard.as_ref().map(|guard| guard.render()),
            runs_on: RunsOn::Label(job.runs_on.clone()),
            permissions: job.permissions.clone(),
            timeout_minutes: job.timeout_minutes,
            env: job.env.clone(),
            outputs: job.outputs.clone(),
            steps: job.steps.clone(),
        }
    }

    /// Serialize a workflow to YAML with a generation header
    fn serialize_workflow(&self, workflow: &Workflow) -> Result<String> {
        let yaml = serde_yaml::to_string(workflow)?;
        let source = self.source_path.as_deref().unwrap_or("the workflow source");
        let header = format!(
            "# Generated by awc - do not edit manually\n# Regenerate with: awc compile {source}\n\n"
        );
        Ok(format!("{header}{yaml}"))
    }
}
