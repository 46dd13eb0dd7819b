//! The `conclusion` job: always runs last to report what happened.

use super::{ACTIVATION, AGENT, CONCLUSION, DETECTION, SAFE_OUTPUTS, StageContext};
use crate::error::Result;
use crate::graph::{GraphJob, JobGraph};
use crate::workflow::schema::Step;
use awc_core::spec::DEFAULT_RUNNER;
use awc_core::{Level, Scope};
use awc_expr::builder::{function, is_true, job_output, job_result};

/// Build the conclusion job. Fixed needs are the safe-output jobs already in
/// `graph`; everything else it reads is inferred.
///
/// # Errors
///
/// Returns an error for an unknown capability.
pub fn build(ctx: &StageContext<'_>, graph: &JobGraph) -> Result<GraphJob> {
    let spec = ctx.spec;
    let mut job = GraphJob::new(CONCLUSION, DEFAULT_RUNNER)
        .with_guard(Some(function("always", Vec::new())))
        .with_output("agent_result", job_result(AGENT).render_interpolated());

    if graph.contains(SAFE_OUTPUTS) {
        job.add_need(SAFE_OUTPUTS);
    }
    for name in spec.safe_outputs.jobs.keys() {
        job.add_need(name.clone());
    }

    job.steps.push(
        Step::run("echo \"Agent job finished with result: $AGENT_RESULT\" >> \"$GITHUB_STEP_SUMMARY\"")
            .with_name("Record agent result")
            .with_env("AGENT_RESULT", job_result(AGENT).render_interpolated()),
    );

    if spec.status_comment {
        let mut update = Step::uses("actions/github-script@v8")
            .with_name("Update status comment")
            .with_env(
                "GH_AW_COMMENT_ID",
                job_output(ACTIVATION, "comment_id").render_interpolated(),
            )
            .with_env(
                "GH_AW_COMMENT_REPO",
                job_output(ACTIVATION, "comment_repo").render_interpolated(),
            )
            .with_env("GH_AW_AGENT_CONCLUSION", job_result(AGENT).render_interpolated())
            .with_input(
                "script",
                "const { main } = require('/tmp/awc/actions/update_status_comment.cjs');\nawait main();\n",
            );
        if graph.contains(DETECTION) {
            update = update.with_env(
                "GH_AW_DETECTION_CONCLUSION",
                job_result(DETECTION).render_interpolated(),
            );
        }
        job.steps.push(update);
        for scope in [Scope::Discussions, Scope::Issues, Scope::PullRequests] {
            job.permissions.require(scope, Level::Write);
        }
    }

    if spec.lock_for_agent {
        job.steps.push(
            Step::uses("actions/github-script@v8")
                .with_name("Unlock issue after agent workflow")
                .with_condition(&is_true(job_output(ACTIVATION, "issue_locked")))
                .with_input(
                    "script",
                    "const { main } = require('/tmp/awc/actions/unlock_issue.cjs');\nawait main();\n",
                ),
        );
        job.permissions.require(Scope::Issues, Level::Write);
    }

    if graph.contains(SAFE_OUTPUTS) {
        for name in spec.safe_outputs.capabilities.keys() {
            let capability = ctx.capabilities.get(name)?;
            if let Some(url) = capability.url_output {
                job.outputs.insert(
                    format!("{}_url", capability.step_id),
                    job_output(SAFE_OUTPUTS, &capability.output_name(url)).render_interpolated(),
                );
            }
        }
    }
    for (name, fragment) in &spec.safe_outputs.jobs {
        for output in fragment.outputs.keys().filter(|output| output.ends_with("url")) {
            job.outputs.insert(
                format!("{name}_{output}"),
                job_output(name, output).render_interpolated(),
            );
        }
    }

    Ok(job)
}
