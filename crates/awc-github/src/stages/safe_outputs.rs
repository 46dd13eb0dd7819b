//! The `safe_outputs` job and user-declared safe jobs.
//!
//! Both wait for the agent (and detection, when enabled) and only run when
//! the agent was not skipped and detection, if any, passed.

use super::{AGENT, DETECTION, SAFE_OUTPUTS, StageContext, custom, safe_output_guard};
use crate::detection::AGENT_OUTPUT_ARTIFACT;
use crate::error::Result;
use crate::graph::GraphJob;
use crate::workflow::schema::Step;
use awc_core::SafeJobFragment;
use awc_core::spec::DEFAULT_RUNNER;
use awc_expr::builder::job_output;

const DOWNLOAD_DIR: &str = "/tmp/awc/safeoutputs/";

fn wire(job: &mut GraphJob, with_detection: bool) {
    job.add_need(AGENT);
    if with_detection {
        job.add_need(DETECTION);
    }
    job.guard = Some(safe_output_guard(with_detection));
}

/// Build the consolidated job for every enabled capability, if any.
///
/// Permissions are the `contents: read` floor merged with each capability's
/// requirement; nothing else is granted.
///
/// # Errors
///
/// Returns an error for an unknown capability or an invalid capability
/// configuration.
pub fn build(ctx: &StageContext<'_>, with_detection: bool) -> Result<Option<GraphJob>> {
    let capabilities = &ctx.spec.safe_outputs.capabilities;
    if capabilities.is_empty() {
        return Ok(None);
    }

    let mut job = GraphJob::new(SAFE_OUTPUTS, DEFAULT_RUNNER);
    wire(&mut job, with_detection);
    job.timeout_minutes = Some(15);
    job.env.insert(
        "GH_AW_AGENT_OUTPUT".into(),
        format!("{DOWNLOAD_DIR}{AGENT_OUTPUT_ARTIFACT}"),
    );
    job.steps.push(
        Step::uses("actions/download-artifact@v5")
            .with_name("Download agent output artifact")
            .with_input("name", AGENT_OUTPUT_ARTIFACT)
            .with_input("path", DOWNLOAD_DIR),
    );

    for (name, config) in capabilities {
        let capability = ctx.capabilities.get(name)?;
        job.steps.extend(capability.steps(config)?);
        job.permissions.absorb(&capability.permissions());
        job.outputs.extend(capability.job_outputs());
    }

    Ok(Some(job))
}

/// Build one safe job.
///
/// # Errors
///
/// Returns an error when a step does not match the Actions step shape.
pub fn build_safe_job(
    ctx: &StageContext<'_>,
    name: &str,
    fragment: &SafeJobFragment,
    with_detection: bool,
) -> Result<GraphJob> {
    let mut job = GraphJob::new(name, ctx.spec.runs_on.clone());
    wire(&mut job, with_detection);
    job.env.insert(
        "GH_AW_AGENT_OUTPUT".into(),
        job_output(AGENT, "output").render_interpolated(),
    );
    job.steps = custom::parse_steps(name, &fragment.steps)?;
    job.outputs.clone_from(&fragment.outputs);
    job.permissions.absorb(&fragment.permissions);
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityRegistry;
    use crate::detection::EngineThreatDetector;
    use crate::engine::CliEngine;
    use crate::error::CompileError;
    use crate::stages::GuardPlan;
    use crate::stages::test_support::make_spec;
    use awc_core::{Level, Scope, WorkflowSpec};

    fn build_for(spec: &WorkflowSpec, with_detection: bool) -> Result<Option<GraphJob>> {
        let guards = GuardPlan::new(spec).unwrap();
        let ctx = StageContext {
            spec,
            engine: &CliEngine::copilot(),
            capabilities: &CapabilityRegistry::new(),
            detector: &EngineThreatDetector,
            guards: &guards,
        };
        build(&ctx, with_detection)
    }

    #[test]
    fn test_read_only_capability_grants_no_write() {
        let spec = make_spec("on: workflow_dispatch\nsafe-outputs:\n  missing-tool:\n", "");
        let job = build_for(&spec, false).unwrap().unwrap();
        assert!(!job.permissions.has_write());
        assert_eq!(job.permissions.level(Scope::Contents), Level::Read);
    }

    #[test]
    fn test_permissions_are_union_of_capabilities() {
        let spec = make_spec(
            "on: workflow_dispatch\nsafe-outputs:\n  create-issue:\n  create-discussion:\n",
            "",
        );
        let job = build_for(&spec, true).unwrap().unwrap();
        let writes: Vec<_> = job.permissions.write_scopes().collect();
        assert_eq!(writes, vec![Scope::Discussions, Scope::Issues]);
        assert_eq!(job.needs, vec!["agent", "detection"]);
        assert_eq!(
            job.guard.unwrap().render(),
            "needs.agent.result != 'skipped' && needs.detection.outputs.success == 'true'"
        );
    }

    #[test]
    fn test_unknown_capability_is_error() {
        let spec = make_spec("on: workflow_dispatch\nsafe-outputs:\n  send-email:\n", "");
        assert!(matches!(
            build_for(&spec, false),
            Err(CompileError::UnknownCapability { .. })
        ));
    }

    #[test]
    fn test_no_capabilities_no_job() {
        let spec = make_spec(
            "on: workflow_dispatch\nsafe-outputs:\n  jobs:\n    notify:\n      steps:\n        - run: ./notify\n",
            "",
        );
        assert!(build_for(&spec, false).unwrap().is_none());
    }
}
