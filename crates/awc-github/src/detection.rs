//! Threat detection over agent output before any side effect is applied.

use crate::engine::{Engine, EngineContext};
use crate::workflow::schema::Step;
use awc_core::WorkflowSpec;
use awc_expr::builder::step_output;
use std::fmt;

/// Artifact the agent job uploads its collected safe-output records under.
pub const AGENT_OUTPUT_ARTIFACT: &str = "agent_output.json";

/// Produces the steps of the `detection` job.
pub trait ThreatDetector: fmt::Debug + Send + Sync {
    /// Steps that inspect the agent output and set a `success` step output
    fn steps(&self, spec: &WorkflowSpec, engine: &dyn Engine) -> Vec<Step>;

    /// Expression text for the job-level `success` output
    fn success_output(&self) -> String;
}

/// Runs the workflow's own engine against a threat-analysis prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineThreatDetector;

const PROMPT_PATH: &str = "/tmp/awc/threat-detection/prompt.txt";
const RESULT_STEP_ID: &str = "parse_results";

impl ThreatDetector for EngineThreatDetector {
    fn steps(&self, spec: &WorkflowSpec, engine: &dyn Engine) -> Vec<Step> {
        let mut steps = vec![
            Step::uses("actions/download-artifact@v5")
                .with_name("Download agent output artifact")
                .with_input("name", AGENT_OUTPUT_ARTIFACT)
                .with_input("path", "/tmp/awc/threat-detection/"),
            Step::uses("actions/github-script@v8")
                .with_name("Setup threat detection")
                .with_env("WORKFLOW_NAME", spec.name.clone())
                .with_env(
                    "WORKFLOW_DESCRIPTION",
                    spec.description.clone().unwrap_or_default(),
                )
                .with_env("GH_AW_THREAT_PROMPT", PROMPT_PATH)
                .with_input(
                    "script",
                    "const { main } = require('/tmp/awc/actions/setup_threat_detection.cjs');\nawait main();\n",
                ),
        ];

        let ctx = EngineContext {
            spec,
            prompt_path: PROMPT_PATH,
            safe_outputs_path: None,
        };
        steps.extend(engine.steps(&ctx));

        steps.push(
            Step::uses("actions/github-script@v8")
                .with_name("Parse threat detection results")
                .with_id(RESULT_STEP_ID)
                .with_input(
                    "script",
                    "const { main } = require('/tmp/awc/actions/parse_threat_detection_results.cjs');\nawait main();\n",
                ),
        );
        steps
    }

    fn success_output(&self) -> String {
        step_output(RESULT_STEP_ID, "success").render_interpolated()
    }
}
