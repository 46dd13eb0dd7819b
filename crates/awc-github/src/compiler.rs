//! Job-graph synthesis.
//!
//! [`Compiler::build_graph`] runs the construction stages in a fixed order:
//!
//! 0. expression validation of the markdown body and the `if:` condition
//! 1. `pre_activation` (only when a check is configured)
//! 2. custom jobs, in declaration order
//! 3. `activation`
//! 4. `agent`
//! 5. `detection` (threat detection enabled and safe outputs present)
//! 6. `safe_outputs` (at least one capability enabled)
//! 7. safe jobs, in declaration order
//! 8. `conclusion`
//!
//! Every job's `needs` is its fixed dependencies followed by each job whose
//! outputs it references. A reference to a job that is not built yet is a
//! configuration error. Any stage failure aborts compilation.

use crate::capabilities::CapabilityRegistry;
use crate::detection::{EngineThreatDetector, ThreatDetector};
use crate::engine::EngineRegistry;
use crate::error::{CompileError, Result};
use crate::graph::{GraphJob, JobGraph};
use crate::stages::{
    self, ACTIVATION, AGENT, CONCLUSION, DETECTION, GuardPlan, PRE_ACTIVATION, SAFE_OUTPUTS,
    StageContext,
};
use crate::workflow::GitHubActionsEmitter;
use awc_core::{FragmentResolver, ParseOptions, ParsedWorkflow, SchemaCache, WorkflowSpec};
use awc_expr::{ExprError, ExpressionValidator};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Per-compilation settings.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Reference clock for relative `stop-after` values
    pub now: DateTime<Utc>,
    /// Source path named in the generated header
    pub source_path: Option<String>,
}

impl CompileOptions {
    /// Options using `now` as the reference clock
    #[must_use]
    pub const fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            source_path: None,
        }
    }

    /// Name the source file in the generated header
    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

/// Result of compiling one workflow.
#[derive(Debug, Clone)]
pub struct CompiledWorkflow {
    /// The parsed specification
    pub spec: WorkflowSpec,
    /// The synthesized job graph
    pub graph: JobGraph,
    /// Rendered workflow YAML
    pub yaml: String,
    /// Recoverable problems, such as skipped imports
    pub warnings: Vec<String>,
}

/// Compiles workflow sources into GitHub Actions workflows.
#[derive(Debug)]
pub struct Compiler {
    schema: Arc<SchemaCache>,
    engines: EngineRegistry,
    capabilities: CapabilityRegistry,
    detector: Box<dyn ThreatDetector>,
}

impl Compiler {
    /// Compiler with the built-in engines, capabilities and detector
    #[must_use]
    pub fn new(schema: Arc<SchemaCache>) -> Self {
        Self {
            schema,
            engines: EngineRegistry::new(),
            capabilities: CapabilityRegistry::new(),
            detector: Box::new(EngineThreatDetector),
        }
    }

    /// Replace the engine registry
    #[must_use]
    pub fn with_engines(mut self, engines: EngineRegistry) -> Self {
        self.engines = engines;
        self
    }

    /// Replace the capability registry
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: CapabilityRegistry) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Replace the threat detector
    #[must_use]
    pub fn with_detector(mut self, detector: Box<dyn ThreatDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// The shared frontmatter schema
    #[must_use]
    pub fn schema(&self) -> &SchemaCache {
        &self.schema
    }

    /// Parse a source into a specification without building jobs.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Spec`] for any parse or configuration error.
    pub fn parse(
        &self,
        id: &str,
        source: &str,
        resolver: &dyn FragmentResolver,
        options: &CompileOptions,
    ) -> Result<ParsedWorkflow> {
        let parse_options = ParseOptions {
            schema: &self.schema,
            resolver,
            now: options.now,
        };
        Ok(WorkflowSpec::parse(id, source, &parse_options)?)
    }

    /// Compile a source all the way to YAML.
    ///
    /// # Errors
    ///
    /// Returns the first parse, validation or stage error. Nothing is
    /// rendered when any step fails.
    #[instrument(name = "compile", skip_all, fields(workflow = %id))]
    pub fn compile(
        &self,
        id: &str,
        source: &str,
        resolver: &dyn FragmentResolver,
        options: &CompileOptions,
    ) -> Result<CompiledWorkflow> {
        let ParsedWorkflow { spec, warnings } = self.parse(id, source, resolver, options)?;
        let graph = self.build_graph(&spec)?;

        let mut emitter = GitHubActionsEmitter::new();
        if let Some(path) = &options.source_path {
            emitter = emitter.with_source_path(path.clone());
        }
        let yaml = emitter.emit(&spec, &graph)?;
        debug!(jobs = graph.len(), bytes = yaml.len(), "Compiled workflow");

        Ok(CompiledWorkflow {
            spec,
            graph,
            yaml,
            warnings,
        })
    }

    /// Run every construction stage over `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Stage`] wrapping the failure of the stage
    /// that broke, or an unknown-engine error.
    #[instrument(skip_all, fields(workflow = %spec.id))]
    pub fn build_graph(&self, spec: &WorkflowSpec) -> Result<JobGraph> {
        validate_expressions(spec).map_err(|err| CompileError::stage("expression validation", err))?;

        let engine = self.engines.get(&spec.engine.id)?;
        let guards = GuardPlan::new(spec)?;
        let ctx = StageContext {
            spec,
            engine,
            capabilities: &self.capabilities,
            detector: self.detector.as_ref(),
            guards: &guards,
        };
        let mut graph = JobGraph::new();

        if guards.has_pre_activation {
            insert(&mut graph, PRE_ACTIVATION, stages::pre_activation::build(&ctx))?;
        }
        for (name, fragment) in &spec.custom_jobs {
            let stage = format!("custom job '{name}'");
            insert(&mut graph, &stage, stages::custom::build(&ctx, name, fragment))?;
        }
        insert(&mut graph, ACTIVATION, stages::activation::build(&ctx))?;
        insert(&mut graph, AGENT, stages::agent::build(&ctx))?;

        let with_detection = stages::detection::is_needed(&ctx);
        if with_detection {
            insert(&mut graph, DETECTION, stages::detection::build(&ctx))?;
        }
        match stages::safe_outputs::build(&ctx, with_detection) {
            Ok(Some(job)) => insert(&mut graph, SAFE_OUTPUTS, Ok(job))?,
            Ok(None) => {}
            Err(err) => return Err(CompileError::stage(SAFE_OUTPUTS, err)),
        }
        for (name, fragment) in &spec.safe_outputs.jobs {
            let stage = format!("safe job '{name}'");
            let job = stages::safe_outputs::build_safe_job(&ctx, name, fragment, with_detection);
            insert(&mut graph, &stage, job)?;
        }
        let conclusion = stages::conclusion::build(&ctx, &graph);
        insert(&mut graph, CONCLUSION, conclusion)?;

        debug!(jobs = ?graph.names().collect::<Vec<_>>(), "Built job graph");
        Ok(graph)
    }
}

/// Reject body and condition expressions outside the allow-list, reporting
/// all findings at once.
fn validate_expressions(spec: &WorkflowSpec) -> Result<()> {
    let validator = ExpressionValidator::new().with_declared_inputs(spec.dispatch_inputs.iter().cloned());
    let mut findings = validator.findings_in_text(&spec.body);
    if let Some(condition) = &spec.condition {
        for finding in validator.condition_findings(&condition.render(), condition) {
            if !findings.contains(&finding) {
                findings.push(finding);
            }
        }
    }

    if findings.is_empty() {
        Ok(())
    } else {
        Err(ExprError::Unauthorized { findings }.into())
    }
}

/// Add the jobs `job` references to its `needs`, after the fixed ones.
fn infer_needs(graph: &JobGraph, job: &mut GraphJob) -> Result<()> {
    for reference in job.referenced_jobs() {
        if reference == job.name || !graph.contains(&reference) {
            return Err(CompileError::UnknownJobReference {
                job: job.name.clone(),
                reference,
            });
        }
        job.add_need(reference);
    }
    Ok(())
}

fn insert(graph: &mut JobGraph, stage: &str, job: Result<GraphJob>) -> Result<()> {
    let inserted = job.and_then(|mut job| {
        infer_needs(graph, &mut job)?;
        debug!(stage, job = %job.name, needs = ?job.needs, "Stage complete");
        graph.add_job(job)
    });
    inserted
        .map(|_| ())
        .map_err(|err| CompileError::stage(stage, err))
}
