//! The `pre_activation` gate.
//!
//! Runs every configured activation check as one step and exposes a single
//! `activated` output equal to the conjunction of the check results.

use super::{ACTIVATED_OUTPUT, PRE_ACTIVATION, StageContext};
use crate::error::{CompileError, Result};
use crate::graph::GraphJob;
use crate::workflow::schema::Step;
use awc_core::spec::DEFAULT_RUNNER;
use awc_core::{Level, Roles, Scope, WorkflowSpec};
use awc_expr::ConditionNode;
use awc_expr::builder::{and, is_true, step_output};

/// One activation check: a step and the boolean output it sets.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    /// Step id
    pub id: &'static str,
    /// Output set to `'true'` when the check passes
    pub output: &'static str,
    /// The step itself
    pub step: Step,
}

impl Check {
    fn new(id: &'static str, output: &'static str, name: &str, script: &str) -> Self {
        let step = Step::uses("actions/github-script@v8")
            .with_name(name)
            .with_id(id)
            .with_input(
                "script",
                format!("const {{ main }} = require('/tmp/awc/actions/{script}');\nawait main();\n"),
            );
        Self { id, output, step }
    }

    fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.step = self.step.with_env(key, value);
        self
    }

    /// `steps.<id>.outputs.<output> == 'true'`
    #[must_use]
    pub fn passed(&self) -> ConditionNode {
        is_true(step_output(self.id, self.output))
    }
}

/// Configured checks, in fixed order: membership, rate limit, stop time,
/// skip-if-match, skip-if-no-match, command position.
#[must_use]
pub fn checks(spec: &WorkflowSpec) -> Vec<Check> {
    let mut checks = Vec::new();

    if spec.requires_membership_check() {
        let roles = match &spec.roles {
            Roles::Restricted(roles) => roles.join(","),
            Roles::All => String::new(),
        };
        checks.push(
            Check::new(
                "check_membership",
                "is_team_member",
                "Check team membership",
                "check_membership.cjs",
            )
            .env("GH_AW_REQUIRED_ROLES", roles),
        );
    }

    if let Some(limit) = &spec.rate_limit {
        checks.push(
            Check::new(
                "check_rate_limit",
                "rate_limit_ok",
                "Check rate limit",
                "check_rate_limit.cjs",
            )
            .env("GH_AW_RATE_LIMIT_MAX", limit.max.to_string())
            .env("GH_AW_RATE_LIMIT_WINDOW", limit.window_minutes.to_string()),
        );
    }

    if let Some(stop_time) = &spec.stop_time {
        checks.push(
            Check::new(
                "check_stop_time",
                "stop_time_ok",
                "Check stop-time limit",
                "check_stop_time.cjs",
            )
            .env("GH_AW_STOP_TIME", stop_time.format("%Y-%m-%d %H:%M:%S").to_string())
            .env("GH_AW_WORKFLOW_NAME", spec.name.clone()),
        );
    }

    if let Some(query) = &spec.skip_if_match {
        checks.push(
            Check::new(
                "check_skip_if_match",
                "skip_check_ok",
                "Check skip-if-match query",
                "check_skip_if_match.cjs",
            )
            .env("GH_AW_SKIP_QUERY", query.query.clone())
            .env("GH_AW_SKIP_MAX_MATCHES", query.threshold.to_string()),
        );
    }

    if let Some(query) = &spec.skip_if_no_match {
        checks.push(
            Check::new(
                "check_skip_if_no_match",
                "skip_no_match_check_ok",
                "Check skip-if-no-match query",
                "check_skip_if_no_match.cjs",
            )
            .env("GH_AW_SKIP_NO_MATCH_QUERY", query.query.clone())
            .env("GH_AW_SKIP_MIN_MATCHES", query.threshold.to_string()),
        );
    }

    if let Some(command) = &spec.command {
        checks.push(
            Check::new(
                "check_command_position",
                "command_position_ok",
                "Check command position",
                "check_command_position.cjs",
            )
            .env("GH_AW_COMMAND", command.name.clone()),
        );
    }

    checks
}

/// Whether `spec` configures any activation check.
#[must_use]
pub fn is_needed(spec: &WorkflowSpec) -> bool {
    !checks(spec).is_empty()
}

/// Conjunction of every check, in check order.
///
/// # Errors
///
/// Returns a logic error when `checks` is empty; the gate job is only built
/// when at least one check is configured.
pub fn activation_gate(checks: &[Check]) -> Result<ConditionNode> {
    if checks.is_empty() {
        return Err(CompileError::logic(
            "activation gate requested with zero checks",
        ));
    }
    Ok(and(checks.iter().map(Check::passed))?)
}

/// Build the gate job.
///
/// # Errors
///
/// Returns a logic error when no check is configured.
pub fn build(ctx: &StageContext<'_>) -> Result<GraphJob> {
    let checks = checks(ctx.spec);
    let gate = activation_gate(&checks)?;

    let mut job = GraphJob::new(PRE_ACTIVATION, DEFAULT_RUNNER)
        .with_guard(ctx.guards.pre_activation.clone())
        .with_output(ACTIVATED_OUTPUT, gate.render_interpolated());
    if ctx.spec.rate_limit.is_some() {
        job.permissions.require(Scope::Actions, Level::Read);
    }
    job.steps = checks.into_iter().map(|check| check.step).collect();
    Ok(job)
}
