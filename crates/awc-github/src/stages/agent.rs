//! The `agent` job: renders the prompt and runs the engine.
//!
//! Placeholders in the body never reach the script text. Each distinct
//! expression becomes an `AWC_EXPR_<n>` variable on the prompt step, and the
//! written template is filled in with `envsubst`, restricted to exactly those
//! variables.

use super::{ACTIVATION, AGENT, StageContext};
use crate::detection::AGENT_OUTPUT_ARTIFACT;
use crate::engine::EngineContext;
use crate::error::{CompileError, Result};
use crate::graph::GraphJob;
use crate::workflow::schema::Step;
use awc_core::WorkflowSpec;
use awc_expr::builder::{function, step_output};
use awc_expr::{extract_expressions, parse_condition, replace_expressions};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Prompt file on the runner.
pub const PROMPT_PATH: &str = "/tmp/awc/prompt.txt";
/// File the agent appends safe-output records to.
pub const SAFE_OUTPUTS_PATH: &str = "/tmp/awc/safe-outputs.jsonl";

const TEMPLATE_PATH: &str = "/tmp/awc/prompt.template";
const PROMPT_DELIMITER: &str = "AWC_PROMPT_EOF";
const EXPRESSION_VARIABLE: &str = "AWC_EXPR_";

/// Prompt text with its placeholders lifted into environment variables.
struct Prompt {
    text: String,
    variables: IndexMap<String, String>,
}

impl Prompt {
    /// Replace each placeholder with `${AWC_EXPR_<n>}`; equal expressions
    /// share a variable.
    fn lift(body: &str) -> Result<Self> {
        let mut by_expression: IndexMap<String, String> = IndexMap::new();
        let mut names: IndexMap<String, String> = IndexMap::new();
        for expression in extract_expressions(body) {
            let value = parse_condition(expression)?.render_interpolated();
            let next = by_expression.len();
            let name = by_expression
                .entry(value)
                .or_insert_with(|| format!("{EXPRESSION_VARIABLE}{next}"))
                .clone();
            names.insert(expression.to_string(), name);
        }

        let text = replace_expressions(body, |expression| {
            names
                .get(expression)
                .map_or_else(String::new, |name| format!("${{{name}}}"))
        });
        let variables = by_expression
            .into_iter()
            .map(|(value, name)| (name, value))
            .collect();
        Ok(Self { text, variables })
    }
}

/// A heredoc delimiter that no line of `text` equals.
fn delimiter_for(text: &str) -> String {
    let mut delimiter = PROMPT_DELIMITER.to_string();
    let mut suffix = 0;
    while text.lines().any(|line| line == delimiter) {
        suffix += 1;
        delimiter = format!("{PROMPT_DELIMITER}_{suffix}");
    }
    delimiter
}

fn prompt_step(spec: &WorkflowSpec) -> Result<Step> {
    let Prompt { text, variables } = Prompt::lift(spec.body.trim_end())?;
    let mut prompt = text;
    if !spec.safe_outputs.is_empty() {
        let kinds: Vec<&str> = spec
            .safe_outputs
            .capabilities
            .keys()
            .chain(spec.safe_outputs.jobs.keys())
            .map(String::as_str)
            .collect();
        prompt = format!(
            "{prompt}\n\n## Safe outputs\n\nYou cannot write to the repository directly. Record each intended change as one JSON line in the file named by the GH_AW_SAFE_OUTPUTS environment variable.\nAllowed output types: {}.",
            kinds.join(", ")
        );
    }

    let delimiter = delimiter_for(&prompt);
    let script = if variables.is_empty() {
        format!("mkdir -p /tmp/awc\ncat > {PROMPT_PATH} << '{delimiter}'\n{prompt}\n{delimiter}\n")
    } else {
        let shell_format: Vec<String> = variables.keys().map(|name| format!("${{{name}}}")).collect();
        format!(
            "mkdir -p /tmp/awc\ncat > {TEMPLATE_PATH} << '{delimiter}'\n{prompt}\n{delimiter}\nenvsubst '{}' < {TEMPLATE_PATH} > {PROMPT_PATH}\n",
            shell_format.join(" ")
        )
    };

    let mut step = Step::run(script).with_name("Create prompt");
    step.env = variables;
    Ok(step)
}

fn allowed_outputs(spec: &WorkflowSpec) -> Result<String> {
    let mut allowed: Map<String, Value> = spec
        .safe_outputs
        .capabilities
        .iter()
        .map(|(name, config)| (name.clone(), config.clone()))
        .collect();
    for name in spec.safe_outputs.jobs.keys() {
        allowed.insert(name.clone(), Value::Object(Map::new()));
    }
    serde_json::to_string(&allowed).map_err(|err| CompileError::logic(err.to_string()))
}

/// Build the agent job.
///
/// # Errors
///
/// Returns an error when a body placeholder does not parse or the
/// safe-output configuration cannot be encoded.
pub fn build(ctx: &StageContext<'_>) -> Result<GraphJob> {
    let spec = ctx.spec;
    let safe_outputs = !spec.safe_outputs.is_empty();

    let mut job = GraphJob::new(AGENT, spec.runs_on.clone());
    job.add_need(ACTIVATION);
    job.timeout_minutes = Some(spec.timeout_minutes);
    job.permissions.absorb(&spec.permissions);
    job.env.clone_from(&spec.env);
    if safe_outputs {
        job.env
            .insert("GH_AW_SAFE_OUTPUTS".into(), SAFE_OUTPUTS_PATH.into());
    }

    job.steps.push(
        Step::uses("actions/checkout@v5")
            .with_name("Checkout repository")
            .with_input("persist-credentials", false),
    );
    job.steps.push(prompt_step(spec)?);

    let engine_ctx = EngineContext {
        spec,
        prompt_path: PROMPT_PATH,
        safe_outputs_path: safe_outputs.then_some(SAFE_OUTPUTS_PATH),
    };
    job.steps.extend(ctx.engine.steps(&engine_ctx));
    job.outputs.extend(ctx.engine.outputs());

    if safe_outputs {
        job.steps.push(
            Step::uses("actions/github-script@v8")
                .with_name("Collect agent output")
                .with_id("collect_output")
                .with_env("GH_AW_ALLOWED_SAFE_OUTPUTS", allowed_outputs(spec)?)
                .with_input(
                    "script",
                    "const { main } = require('/tmp/awc/actions/collect_ndjson_output.cjs');\nawait main();\n",
                ),
        );
        job.steps.push(
            Step::uses("actions/upload-artifact@v4")
                .with_name("Upload agent output")
                .with_condition(&function("always", Vec::new()))
                .with_input("name", AGENT_OUTPUT_ARTIFACT)
                .with_input("path", format!("/tmp/awc/{AGENT_OUTPUT_ARTIFACT}"))
                .with_input("if-no-files-found", "warn"),
        );
        job.outputs.insert(
            "output".into(),
            step_output("collect_output", "output").render_interpolated(),
        );
        job.outputs.insert(
            "output_types".into(),
            step_output("collect_output", "output_types").render_interpolated(),
        );
    }

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityRegistry;
    use crate::detection::EngineThreatDetector;
    use crate::engine::CliEngine;
    use crate::stages::GuardPlan;
    use crate::stages::test_support::make_spec;
    use awc_core::{Level, Scope};

    fn make_job(frontmatter: &str, body: &str) -> GraphJob {
        let spec = make_spec(frontmatter, body);
        let guards = GuardPlan::new(&spec).unwrap();
        let ctx = StageContext {
            spec: &spec,
            engine: &CliEngine::copilot(),
            capabilities: &CapabilityRegistry::new(),
            detector: &EngineThreatDetector,
            guards: &guards,
        };
        build(&ctx).unwrap()
    }

    #[test]
    fn test_agent_without_safe_outputs() {
        let job = make_job("on: workflow_dispatch\n", "Say hello.\n");
        assert_eq!(job.needs, vec!["activation"]);
        assert!(job.guard.is_none());
        assert!(!job.outputs.contains_key("output"));
        assert!(job.outputs.contains_key("model"));
        let prompt = job.steps[1].run.as_deref().unwrap();
        assert!(prompt.contains("Say hello."));
        assert!(!prompt.contains("Safe outputs"));
    }

    #[test]
    fn test_prompt_placeholders_move_to_env() {
        let job = make_job(
            "on: issues\n",
            "Issue ${{ github.event.issue.number }} in ${{github.repository}}.\nAgain #${{ github.event.issue.number }}.\n",
        );
        let step = &job.steps[1];
        let run = step.run.as_deref().unwrap();
        assert!(!run.contains("${{"));
        assert!(run.contains("Issue ${AWC_EXPR_0} in ${AWC_EXPR_1}.\nAgain #${AWC_EXPR_0}."));
        assert!(run.contains("envsubst '${AWC_EXPR_0} ${AWC_EXPR_1}' < /tmp/awc/prompt.template > /tmp/awc/prompt.txt"));
        assert_eq!(
            step.env.get("AWC_EXPR_0").map(String::as_str),
            Some("${{ github.event.issue.number }}")
        );
        assert_eq!(
            step.env.get("AWC_EXPR_1").map(String::as_str),
            Some("${{ github.repository }}")
        );
    }

    #[test]
    fn test_prompt_delimiter_avoids_body_lines() {
        let job = make_job("on: workflow_dispatch\n", "Line\nAWC_PROMPT_EOF\nAWC_PROMPT_EOF_1\n");
        let run = job.steps[1].run.as_deref().unwrap();
        assert!(run.contains("<< 'AWC_PROMPT_EOF_2'\n"));
        assert!(run.ends_with("\nAWC_PROMPT_EOF_2\n"));
        assert!(job.steps[1].env.is_empty());
    }

    #[test]
    fn test_agent_permissions_from_frontmatter() {
        let job = make_job(
            "on: workflow_dispatch\npermissions:\n  issues: read\n  actions: read\n",
            "",
        );
        assert_eq!(job.permissions.level(Scope::Contents), Level::Read);
        assert_eq!(job.permissions.level(Scope::Issues), Level::Read);
        assert_eq!(job.permissions.level(Scope::Actions), Level::Read);
        assert!(!job.permissions.has_write());
    }

    #[test]
    fn test_agent_collects_safe_outputs() {
        let job = make_job(
            "on: workflow_dispatch\nsafe-outputs:\n  create-issue:\n  noop:\n",
            "File an issue.\n",
        );
        assert_eq!(
            job.env.get("GH_AW_SAFE_OUTPUTS").map(String::as_str),
            Some(SAFE_OUTPUTS_PATH)
        );
        let collect = job
            .steps
            .iter()
            .find(|s| s.id.as_deref() == Some("collect_output"))
            .unwrap();
        assert_eq!(
            collect.env.get("GH_AW_ALLOWED_SAFE_OUTPUTS").map(String::as_str),
            Some(r#"{"create-issue":{},"noop":{}}"#)
        );
        assert!(job.steps[1]
            .run
            .as_deref()
            .unwrap()
            .contains("Allowed output types: create-issue, noop."));
        assert!(job.outputs.contains_key("output_types"));
    }
}
