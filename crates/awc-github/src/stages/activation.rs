//! The `activation` job: acknowledges the trigger and carries the workflow
//! condition for everything downstream.

use super::{ACTIVATION, PRE_ACTIVATION, StageContext};
use crate::error::Result;
use crate::graph::GraphJob;
use crate::workflow::schema::Step;
use awc_core::spec::DEFAULT_RUNNER;
use awc_core::{Level, Scope};
use awc_expr::builder::step_output;

/// Reference the markdown body uses to read the sanitized triggering text.
pub const TEXT_REFERENCE: &str = "needs.activation.outputs.text";

fn script_step(name: &str, id: Option<&str>, script: &str) -> Step {
    let step = Step::uses("actions/github-script@v8")
        .with_name(name)
        .with_input(
            "script",
            format!("const {{ main }} = require('/tmp/awc/actions/{script}');\nawait main();\n"),
        );
    match id {
        Some(id) => step.with_id(id),
        None => step,
    }
}

/// Build the activation job.
///
/// # Errors
///
/// Currently infallible, but returns `Result` like every stage.
pub fn build(ctx: &StageContext<'_>) -> Result<GraphJob> {
    let spec = ctx.spec;
    let mut job = GraphJob::new(ACTIVATION, DEFAULT_RUNNER).with_guard(ctx.guards.activation.clone());
    if ctx.guards.has_pre_activation {
        job.add_need(PRE_ACTIVATION);
    }

    job.steps.push(
        script_step(
            "Check workflow file timestamps",
            None,
            "check_workflow_timestamp.cjs",
        )
        .with_env("GH_AW_WORKFLOW_FILE", format!("{}.lock.yml", spec.id)),
    );

    if spec.lock_for_agent {
        job.steps
            .push(script_step("Lock issue for agent workflow", Some("lock_issue"), "lock_issue.cjs"));
        job.permissions.require(Scope::Issues, Level::Write);
        job.outputs.insert(
            "issue_locked".into(),
            step_output("lock_issue", "locked").render_interpolated(),
        );
    }

    if let Some(reaction) = &spec.reaction {
        job.steps.push(
            script_step("Add reaction to the triggering item", Some("react"), "add_reaction.cjs")
                .with_env("GH_AW_REACTION", reaction.clone()),
        );
        grant_comment_scopes(&mut job);
        job.outputs
            .insert("reaction_id".into(), step_output("react", "reaction-id").render_interpolated());
    }

    if spec.status_comment {
        job.steps.push(
            script_step("Post status comment", Some("status_comment"), "add_status_comment.cjs")
                .with_env("GH_AW_WORKFLOW_NAME", spec.name.clone()),
        );
        grant_comment_scopes(&mut job);
        job.outputs.insert(
            "comment_id".into(),
            step_output("status_comment", "comment-id").render_interpolated(),
        );
        job.outputs.insert(
            "comment_repo".into(),
            step_output("status_comment", "comment-repo").render_interpolated(),
        );
    }

    if spec.body.contains(TEXT_REFERENCE) {
        job.steps.push(script_step(
            "Compute current body text",
            Some("compute_text"),
            "compute_text.cjs",
        ));
        job.outputs
            .insert("text".into(), step_output("compute_text", "text").render_interpolated());
    }

    Ok(job)
}

fn grant_comment_scopes(job: &mut GraphJob) {
    for scope in [Scope::Discussions, Scope::Issues, Scope::PullRequests] {
        job.permissions.require(scope, Level::Write);
    }
}
