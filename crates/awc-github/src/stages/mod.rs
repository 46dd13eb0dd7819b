//! Job construction stages.
//!
//! The compiler runs these in a fixed order. Each stage reads the
//! [`WorkflowSpec`] plus the jobs already in the graph and returns the
//! job(s) it contributes, with their fixed dependencies set. References to
//! other jobs' outputs are resolved into further `needs` by the compiler.

pub mod activation;
pub mod agent;
pub mod conclusion;
pub mod custom;
pub mod detection;
pub mod pre_activation;
pub mod safe_outputs;

use crate::capabilities::CapabilityRegistry;
use crate::detection::ThreatDetector;
use crate::engine::Engine;
use crate::error::Result;
use awc_core::WorkflowSpec;
use awc_expr::ConditionNode;
use awc_expr::builder::{is_true, job_output, job_result, not_equals, string_literal};

/// Gate job running the configured activation checks
pub const PRE_ACTIVATION: &str = "pre_activation";
/// Job reacting to the trigger and carrying the workflow condition
pub const ACTIVATION: &str = "activation";
/// Job running the engine
pub const AGENT: &str = "agent";
/// Job screening agent output
pub const DETECTION: &str = "detection";
/// Job applying safe-output capabilities
pub const SAFE_OUTPUTS: &str = "safe_outputs";
/// Job finalizing status after everything else
pub const CONCLUSION: &str = "conclusion";

/// Name of the boolean output a gating job exposes.
pub const ACTIVATED_OUTPUT: &str = "activated";

/// Shared inputs for every stage.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    /// The workflow being compiled
    pub spec: &'a WorkflowSpec,
    /// Engine running in the agent and detection jobs
    pub engine: &'a dyn Engine,
    /// Safe-output capability table
    pub capabilities: &'a CapabilityRegistry,
    /// Detection step provider
    pub detector: &'a dyn ThreatDetector,
    /// Where the workflow condition goes
    pub guards: &'a GuardPlan,
}

/// `needs.pre_activation.outputs.activated == 'true'`
#[must_use]
pub fn activated_check() -> ConditionNode {
    is_true(job_output(PRE_ACTIVATION, ACTIVATED_OUTPUT))
}

/// Guard shared by every job that applies agent output.
#[must_use]
pub fn safe_output_guard(with_detection: bool) -> ConditionNode {
    let ran = not_equals(job_result(AGENT), string_literal("skipped"));
    if with_detection {
        ran.and_then(is_true(job_output(DETECTION, "success")))
    } else {
        ran
    }
}

/// Placement of the workflow condition across the gate and activation jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardPlan {
    /// Whether a pre-activation job is built
    pub has_pre_activation: bool,
    /// Guard of `pre_activation`
    pub pre_activation: Option<ConditionNode>,
    /// Guard of `activation`
    pub activation: Option<ConditionNode>,
}

impl GuardPlan {
    /// Decide guard placement for `spec`.
    ///
    /// A condition reading outputs of a custom job cannot sit on
    /// `pre_activation`, because those custom jobs run after it; it then
    /// moves onto `activation` next to the activated check.
    ///
    /// # Errors
    ///
    /// Propagates condition builder errors.
    pub fn new(spec: &WorkflowSpec) -> Result<Self> {
        let condition = spec.effective_condition()?;
        let has_pre_activation = pre_activation::is_needed(spec);

        let plan = match condition {
            Some(condition) if has_pre_activation && reads_custom_job(&condition, spec) => Self {
                has_pre_activation,
                pre_activation: None,
                activation: Some(activated_check().and_then(condition)),
            },
            condition if has_pre_activation => Self {
                has_pre_activation,
                pre_activation: condition,
                activation: Some(activated_check()),
            },
            condition => Self {
                has_pre_activation,
                pre_activation: None,
                activation: condition,
            },
        };
        Ok(plan)
    }
}

fn reads_custom_job(condition: &ConditionNode, spec: &WorkflowSpec) -> bool {
    spec.custom_jobs
        .keys()
        .any(|job| condition.references_prefix(&format!("needs.{job}.")))
}

#[cfg(test)]
pub(crate) mod test_support {
    use awc_core::{NoImports, ParseOptions, SchemaCache, WorkflowSpec};
    use chrono::{TimeZone, Utc};

    pub fn make_spec(frontmatter: &str, body: &str) -> WorkflowSpec {
        let schema = SchemaCache::new();
        let options = ParseOptions {
            schema: &schema,
            resolver: &NoImports,
            now: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        };
        WorkflowSpec::parse("test", &format!("---\n{frontmatter}---\n{body}"), &options)
            .unwrap()
            .spec
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::make_spec;
    use super::*;

    #[test]
    fn test_condition_on_pre_activation() {
        let spec = make_spec("on: issues\nif: github.actor != 'bot'\n", "");
        let plan = GuardPlan::new(&spec).unwrap();
        assert!(plan.has_pre_activation);
        assert_eq!(
            plan.pre_activation.unwrap().render(),
            "github.actor != 'bot'"
        );
        assert_eq!(plan.activation, Some(activated_check()));
    }

    #[test]
    fn test_condition_reading_custom_job_moves_to_activation() {
        let spec = make_spec(
            "on: issues\nif: needs.preflight.outputs.ready == 'true'\njobs:\n  preflight:\n    steps:\n      - run: echo ready=true >> $GITHUB_OUTPUT\n",
            "",
        );
        let plan = GuardPlan::new(&spec).unwrap();
        assert_eq!(plan.pre_activation, None);
        assert_eq!(
            plan.activation.unwrap().render(),
            "needs.pre_activation.outputs.activated == 'true' && needs.preflight.outputs.ready == 'true'"
        );
    }

    #[test]
    fn test_condition_without_pre_activation() {
        let spec = make_spec(
            "on: schedule\nroles: all\nif: github.ref == 'refs/heads/main'\n",
            "",
        );
        let plan = GuardPlan::new(&spec).unwrap();
        assert!(!plan.has_pre_activation);
        assert_eq!(
            plan.activation.unwrap().render(),
            "github.ref == 'refs/heads/main'"
        );
    }

    #[test]
    fn test_no_condition_no_gate() {
        let spec = make_spec("on: workflow_dispatch\n", "");
        let plan = GuardPlan::new(&spec).unwrap();
        assert_eq!(plan.activation, None);
        assert_eq!(plan.pre_activation, None);
    }

    #[test]
    fn test_safe_output_guard() {
        assert_eq!(safe_output_guard(false).render(), "needs.agent.result != 'skipped'");
        assert_eq!(
            safe_output_guard(true).render(),
            "needs.agent.result != 'skipped' && needs.detection.outputs.success == 'true'"
        );
    }
}
