//! The strongly-typed workflow specification.
//!
//! [`WorkflowSpec::parse`] is the only way to build one. It runs the whole
//! boundary pipeline: split the source, parse the YAML, schema-check it, merge
//! imports, deserialize the raw shapes and interpret every loosely-typed key.
//! After that the `WorkflowSpec` is read-only.

use crate::error::{Error, Result};
use crate::frontmatter::{Document, kind};
use crate::imports::{FragmentResolver, merge_imports};
use crate::permissions::PermissionSet;
use crate::raw::{RawEngine, RawFrontmatter, RawRoles};
use crate::schema::SchemaCache;
use crate::triggers::{CommandTrigger, OnConfig, SearchQuery, Triggers};
use awc_expr::{ConditionNode, parse_condition};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, instrument};

/// Job names the compiler reserves for its own stages.
pub const RESERVED_JOB_NAMES: &[&str] = &[
    "pre_activation",
    "activation",
    "agent",
    "detection",
    "safe_outputs",
    "conclusion",
];

/// Roles a membership check can require.
pub const KNOWN_ROLES: &[&str] = &["admin", "maintainer", "maintain", "write", "triage"];

/// Default agent engine.
pub const DEFAULT_ENGINE: &str = "copilot";

/// Default runner label.
pub const DEFAULT_RUNNER: &str = "ubuntu-latest";

/// Default agent timeout in minutes.
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 20;

#[allow(clippy::expect_used)]
static JOB_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("job name pattern is valid"));

/// Who may trigger the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Roles {
    /// Anyone; no membership check
    All,
    /// Only users holding one of these repository roles
    Restricted(Vec<String>),
}

impl Default for Roles {
    fn default() -> Self {
        Self::Restricted(vec!["admin".into(), "maintainer".into(), "write".into()])
    }
}

/// Per-user run limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Runs allowed per window
    pub max: u32,
    /// Window length in minutes
    pub window_minutes: u32,
}

/// Selected agent engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Engine id (`copilot`, `claude`, `codex`)
    pub id: String,
    /// Model override
    pub model: Option<String>,
    /// Turn limit
    pub max_turns: Option<u32>,
}

/// A custom job fragment from `jobs:`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobFragment {
    /// Opaque step bodies, in order
    pub steps: Vec<Value>,
    /// Output name to expression text
    pub outputs: IndexMap<String, String>,
}

/// A custom job declared under `safe-outputs.jobs`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SafeJobFragment {
    /// Opaque step bodies, in order
    pub steps: Vec<Value>,
    /// Output name to expression text
    pub outputs: IndexMap<String, String>,
    /// Permissions the job needs on top of the floor
    pub permissions: PermissionSet,
}

/// Enabled safe-output capabilities and their wiring options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SafeOutputs {
    /// Capability name to raw configuration, in declaration order
    pub capabilities: IndexMap<String, Value>,
    /// Custom safe jobs, in declaration order
    pub jobs: IndexMap<String, SafeJobFragment>,
    /// Gate side effects on a threat-detection pass
    pub threat_detection: bool,
}

impl SafeOutputs {
    /// Whether neither a capability nor a safe job is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty() && self.jobs.is_empty()
    }
}

/// Parse-time inputs that do not come from the workflow source.
#[derive(Clone, Copy)]
pub struct ParseOptions<'a> {
    /// Compiled frontmatter schema
    pub schema: &'a SchemaCache,
    /// Source of imported fragments
    pub resolver: &'a dyn FragmentResolver,
    /// Reference clock for relative `stop-after` values
    pub now: DateTime<Utc>,
}

/// A parsed spec plus non-fatal diagnostics.
#[derive(Debug, Clone)]
pub struct ParsedWorkflow {
    /// The specification
    pub spec: WorkflowSpec,
    /// Messages for skipped import fragments
    pub warnings: Vec<String>,
}

/// Immutable, validated description of one agentic workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSpec {
    /// Workflow id (usually the source file stem)
    pub id: String,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Actions events
    pub triggers: Triggers,
    /// Membership constraint
    pub roles: Roles,
    /// Per-user rate limit
    pub rate_limit: Option<RateLimit>,
    /// Absolute activation deadline
    pub stop_time: Option<DateTime<Utc>>,
    /// Skip when this query has matches
    pub skip_if_match: Option<SearchQuery>,
    /// Skip when this query has no matches
    pub skip_if_no_match: Option<SearchQuery>,
    /// `/command` trigger
    pub command: Option<CommandTrigger>,
    /// Reaction on the triggering item
    pub reaction: Option<String>,
    /// Maintain a status comment
    pub status_comment: bool,
    /// Lock the triggering issue while the agent runs
    pub lock_for_agent: bool,
    /// User `if:` condition
    pub condition: Option<ConditionNode>,
    /// Agent engine
    pub engine: EngineConfig,
    /// Agent job permissions
    pub permissions: PermissionSet,
    /// Agent runner label
    pub runs_on: String,
    /// Agent timeout in minutes
    pub timeout_minutes: u32,
    /// Agent environment
    pub env: IndexMap<String, String>,
    /// Safe-output configuration
    pub safe_outputs: SafeOutputs,
    /// Custom jobs, in declaration order
    pub custom_jobs: IndexMap<String, JobFragment>,
    /// Markdown prompt, imported bodies appended
    pub body: String,
    /// Strict mode
    pub strict: bool,
    /// Declared `workflow_dispatch` inputs
    pub dispatch_inputs: Vec<String>,
}

impl WorkflowSpec {
    /// Parse and validate a workflow source.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found. Schema violations are
    /// reported together in one [`Error::Schema`]. Import failures are not
    /// errors; they are returned as warnings.
    #[instrument(name = "parse_workflow", skip(source, options), fields(source_len = source.len()))]
    pub fn parse(id: &str, source: &str, options: &ParseOptions<'_>) -> Result<ParsedWorkflow> {
        let doc = Document::split(source)?;
        let mut frontmatter = doc.frontmatter_value()?;
        options
            .schema
            .validate(&Value::Object(frontmatter.clone()))?;

        let imports = import_list(&frontmatter);
        let merged = merge_imports(&mut frontmatter, &imports, options.resolver, options.schema);

        let raw: RawFrontmatter = serde_json::from_value(Value::Object(frontmatter))
            .map_err(|e| Error::configuration("frontmatter", e.to_string()))?;

        let mut body = doc.body.to_string();
        for fragment in &merged.bodies {
            if !body.is_empty() && !body.ends_with("\n\n") {
                body.push_str(if body.ends_with('\n') { "\n" } else { "\n\n" });
            }
            body.push_str(fragment);
        }

        let name = raw
            .name
            .clone()
            .or_else(|| doc.title().map(str::to_string))
            .unwrap_or_else(|| id.to_string());

        let spec = Self::from_raw(id.to_string(), name, raw, body, options.now)?;
        debug!(
            workflow = %spec.id,
            triggers = spec.triggers.as_map().len(),
            custom_jobs = spec.custom_jobs.len(),
            capabilities = spec.safe_outputs.capabilities.len(),
            "Parsed workflow specification"
        );

        Ok(ParsedWorkflow {
            spec,
            warnings: merged.warnings,
        })
    }

    fn from_raw(
        id: String,
        name: String,
        raw: RawFrontmatter,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let on = OnConfig::parse(raw.on.as_ref(), now)?;
        let strict = raw.strict.unwrap_or(false);

        let permissions = match &raw.permissions {
            Some(value) => PermissionSet::from_frontmatter(value)?,
            None => PermissionSet::with_contents_read(),
        };
        if strict && permissions.has_write() {
            let scopes: Vec<_> = permissions
                .write_scopes()
                .map(|s| s.as_str().to_string())
                .collect();
            return Err(Error::strict(format!(
                "the agent job may not hold write permissions ({})",
                scopes.join(", ")
            )));
        }

        let condition = raw
            .condition
            .as_deref()
            .map(parse_condition)
            .transpose()?;

        let custom_jobs = raw
            .jobs
            .iter()
            .map(|(job, value)| Ok((check_job_name(job, "jobs")?, parse_job_fragment(job, value)?)))
            .collect::<Result<IndexMap<_, _>>>()?;

        let safe_outputs = parse_safe_outputs(&raw.safe_outputs, &custom_jobs)?;

        let rate_limit = raw
            .rate_limit
            .map(|rl| {
                if rl.max == 0 || rl.window == 0 {
                    Err(Error::configuration("rate-limit", "'max' and 'window' must be positive"))
                } else {
                    Ok(RateLimit {
                        max: rl.max,
                        window_minutes: rl.window,
                    })
                }
            })
            .transpose()?;

        let timeout_minutes = match raw.timeout_minutes {
            Some(0) => return Err(Error::configuration("timeout-minutes", "must be positive")),
            Some(minutes) => minutes,
            None => DEFAULT_TIMEOUT_MINUTES,
        };

        let dispatch_inputs = on.triggers.dispatch_inputs();

        Ok(Self {
            id,
            name,
            description: raw.description,
            roles: parse_roles(raw.roles.as_ref())?,
            rate_limit,
            stop_time: on.stop_time,
            skip_if_match: on.skip_if_match,
            skip_if_no_match: on.skip_if_no_match,
            command: on.command,
            reaction: on.reaction,
            status_comment: on.status_comment,
            lock_for_agent: on.lock_for_agent,
            triggers: on.triggers,
            condition,
            engine: parse_engine(raw.engine),
            permissions,
            runs_on: raw.runs_on.unwrap_or_else(|| DEFAULT_RUNNER.to_string()),
            timeout_minutes,
            env: raw.env,
            safe_outputs,
            custom_jobs,
            body,
            strict,
            dispatch_inputs,
        })
    }

    /// Whether the pre-activation gate must verify the actor's role.
    #[must_use]
    pub fn requires_membership_check(&self) -> bool {
        matches!(self.roles, Roles::Restricted(_)) && !self.triggers.all_safe()
    }

    /// The condition the workflow as a whole is gated on: the command
    /// mention check (when a command is declared) and the user `if:`.
    ///
    /// # Errors
    ///
    /// Propagates condition builder errors.
    pub fn effective_condition(&self) -> awc_expr::Result<Option<ConditionNode>> {
        let command = self.command.as_ref().map(CommandTrigger::condition).transpose()?;
        Ok(match (command, self.condition.clone()) {
            (Some(command), Some(user)) => Some(command.and_then(user)),
            (command, user) => command.or(user),
        })
    }
}

fn import_list(frontmatter: &Map<String, Value>) -> Vec<String> {
    frontmatter
        .get("imports")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn check_job_name(job: &str, section: &str) -> Result<String> {
    if !JOB_NAME.is_match(job) {
        return Err(Error::configuration(
            format!("{section}.{job}"),
            "job names must start with a letter or '_' and contain only letters, digits, '-' and '_'",
        ));
    }
    if RESERVED_JOB_NAMES.contains(&job) {
        return Err(Error::configuration(
            format!("{section}.{job}"),
            format!("'{job}' is reserved for a compiler-generated job"),
        ));
    }
    Ok(job.to_string())
}

fn fragment_fields<'a>(job: &str, value: &'a Value, allowed: &[&str]) -> Result<&'a Map<String, Value>> {
    let Value::Object(map) = value else {
        return Err(Error::configuration(
            format!("jobs.{job}"),
            format!("expected a mapping, found {}", kind(value)),
        ));
    };
    if let Some(field) = map.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(Error::UnsupportedJobField {
            job: job.to_string(),
            field: field.clone(),
        });
    }
    Ok(map)
}

fn parse_steps(job: &str, map: &Map<String, Value>) -> Result<Vec<Value>> {
    let field = format!("jobs.{job}.steps");
    let steps = match map.get("steps") {
        Some(Value::Array(steps)) => steps.clone(),
        Some(other) => return Err(Error::configuration(field, format!("expected a list, found {}", kind(other)))),
        None => Vec::new(),
    };
    if steps.is_empty() {
        return Err(Error::configuration(field, "a job needs at least one step"));
    }
    if let Some(bad) = steps.iter().find(|step| !step.is_object()) {
        return Err(Error::configuration(field, format!("each step must be a mapping, found {}", kind(bad))));
    }
    Ok(steps)
}

fn parse_outputs(job: &str, map: &Map<String, Value>) -> Result<IndexMap<String, String>> {
    let field = format!("jobs.{job}.outputs");
    match map.get("outputs") {
        None => Ok(IndexMap::new()),
        Some(Value::Object(outputs)) => outputs
            .iter()
            .map(|(name, value)| match value {
                Value::String(expr) => Ok((name.clone(), expr.clone())),
                other => Err(Error::configuration(
                    format!("{field}.{name}"),
                    format!("expected an expression string, found {}", kind(other)),
                )),
            })
            .collect(),
        Some(other) => Err(Error::configuration(field, format!("expected a mapping, found {}", kind(other)))),
    }
}

fn parse_job_fragment(job: &str, value: &Value) -> Result<JobFragment> {
    let map = fragment_fields(job, value, &["steps", "outputs"])?;
    Ok(JobFragment {
        steps: parse_steps(job, map)?,
        outputs: parse_outputs(job, map)?,
    })
}

fn parse_safe_job(job: &str, value: &Value) -> Result<SafeJobFragment> {
    let map = fragment_fields(job, value, &["steps", "outputs", "permissions"])?;
    let permissions = map
        .get("permissions")
        .map(PermissionSet::from_frontmatter)
        .transpose()?
        .unwrap_or_default();
    Ok(SafeJobFragment {
        steps: parse_steps(job, map)?,
        outputs: parse_outputs(job, map)?,
        permissions,
    })
}

fn parse_safe_outputs(
    raw: &IndexMap<String, Value>,
    custom_jobs: &IndexMap<String, JobFragment>,
) -> Result<SafeOutputs> {
    let mut safe_outputs = SafeOutputs::default();
    let mut threat_detection = None;

    for (key, value) in raw {
        match key.as_str() {
            "jobs" => {
                let Value::Object(jobs) = value else {
                    return Err(Error::configuration(
                        "safe-outputs.jobs",
                        format!("expected a mapping, found {}", kind(value)),
                    ));
                };
                for (job, fragment) in jobs {
                    let name = check_job_name(job, "safe-outputs.jobs")?;
                    if custom_jobs.contains_key(&name) {
                        return Err(Error::configuration(
                            format!("safe-outputs.jobs.{job}"),
                            "a custom job with this name already exists",
                        ));
                    }
                    safe_outputs.jobs.insert(name, parse_safe_job(job, fragment)?);
                }
            }
            "threat-detection" => {
                threat_detection = Some(match value {
                    Value::Bool(enabled) => *enabled,
                    Value::Object(map) => map.get("enabled").and_then(Value::as_bool).unwrap_or(true),
                    other => {
                        return Err(Error::configuration(
                            "safe-outputs.threat-detection",
                            format!("expected true, false or a mapping, found {}", kind(other)),
                        ));
                    }
                });
            }
            capability => {
                let config = match value {
                    Value::Null => Value::Object(Map::new()),
                    other => other.clone(),
                };
                safe_outputs.capabilities.insert(capability.to_string(), config);
            }
        }
    }

    safe_outputs.threat_detection = threat_detection.unwrap_or(!safe_outputs.is_empty());
    Ok(safe_outputs)
}

fn parse_roles(raw: Option<&RawRoles>) -> Result<Roles> {
    let roles = match raw {
        None => return Ok(Roles::default()),
        Some(RawRoles::Keyword(keyword)) if keyword == "all" => return Ok(Roles::All),
        Some(RawRoles::Keyword(role)) => vec![role.clone()],
        Some(RawRoles::List(list)) => list.clone(),
    };

    if roles.is_empty() {
        return Err(Error::configuration("roles", "use 'all' or list at least one role"));
    }
    if let Some(unknown) = roles.iter().find(|r| !KNOWN_ROLES.contains(&r.as_str())) {
        return Err(Error::configuration(
            "roles",
            format!("unknown role '{unknown}', expected one of {}", KNOWN_ROLES.join(", ")),
        ));
    }
    Ok(Roles::Restricted(roles))
}

fn parse_engine(raw: Option<RawEngine>) -> EngineConfig {
    match raw {
        None => EngineConfig {
            id: DEFAULT_ENGINE.to_string(),
            model: None,
            max_turns: None,
        },
        Some(RawEngine::Id(id)) => EngineConfig {
            id,
            model: None,
            max_turns: None,
        },
        Some(RawEngine::Config(config)) => EngineConfig {
            id: config.id,
            model: config.model,
            max_turns: config.max_turns,
        },
    }
}
