//! Job graph built up stage by stage using petgraph.
//!
//! Jobs are inserted in construction order; each insertion adds one edge per
//! `needs` entry, pointing from the dependency to the dependent. Because a
//! job may only depend on jobs that already exist, the graph stays acyclic.

use crate::error::{CompileError, Result};
use crate::workflow::schema::Step;
use awc_core::PermissionSet;
use awc_expr::{ConditionNode, extract_expressions};
use indexmap::IndexMap;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

#[allow(clippy::expect_used)]
static JOB_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"needs\.([A-Za-z_][A-Za-z0-9_-]*)\.").expect("job reference pattern is valid")
});

/// Job names referenced as `needs.<job>.` in `text`, in order of first appearance.
///
/// The whole of `text` is read as an expression, the way an `if:` field is.
#[must_use]
pub fn referenced_jobs(text: &str) -> Vec<String> {
    let mut jobs: Vec<String> = Vec::new();
    collect_references(text, &mut jobs);
    jobs
}

fn collect_references(expression: &str, jobs: &mut Vec<String>) {
    for caps in JOB_REFERENCE.captures_iter(expression) {
        let name = &caps[1];
        if !jobs.iter().any(|job| job == name) {
            jobs.push(name.to_string());
        }
    }
}

/// One job of the compiled workflow, before serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphJob {
    /// Job key in the workflow (unique in the graph)
    pub name: String,
    /// Display name shown in the Actions UI
    pub display_name: Option<String>,
    /// Runner label
    pub runs_on: String,
    /// Jobs that must finish first, fixed dependencies first
    pub needs: Vec<String>,
    /// Job-level `if:` condition
    pub guard: Option<ConditionNode>,
    /// Accumulated `GITHUB_TOKEN` grant
    pub permissions: PermissionSet,
    /// Output name to expression text
    pub outputs: IndexMap<String, String>,
    /// Job-level environment
    pub env: IndexMap<String, String>,
    /// Ordered steps
    pub steps: Vec<Step>,
    /// Optional timeout
    pub timeout_minutes: Option<u32>,
}

impl GraphJob {
    /// A job with the `contents: read` floor and nothing else.
    #[must_use]
    pub fn new(name: impl Into<String>, runs_on: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            runs_on: runs_on.into(),
            needs: Vec::new(),
            guard: None,
            permissions: PermissionSet::with_contents_read(),
            outputs: IndexMap::new(),
            env: IndexMap::new(),
            steps: Vec::new(),
            timeout_minutes: None,
        }
    }

    /// Set the guard condition
    #[must_use]
    pub fn with_guard(mut self, guard: Option<ConditionNode>) -> Self {
        self.guard = guard;
        self
    }

    /// Append a step
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Declare an output
    #[must_use]
    pub fn with_output(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.outputs.insert(name.into(), expression.into());
        self
    }

    /// Add a dependency unless it is already present
    pub fn add_need(&mut self, job: impl Into<String>) {
        let job = job.into();
        if !self.needs.contains(&job) {
            self.needs.push(job);
        }
    }

    /// Jobs referenced as `needs.<job>.` from the guard, outputs, env or steps.
    ///
    /// Guards and step `if:` fields are expressions throughout; every other
    /// value only references a job from inside a `${{ }}` placeholder.
    #[must_use]
    pub fn referenced_jobs(&self) -> Vec<String> {
        let mut jobs: Vec<String> = Vec::new();
        if let Some(guard) = &self.guard {
            collect_references(&guard.render(), &mut jobs);
        }
        let values = self
            .outputs
            .values()
            .chain(self.env.values())
            .map(String::as_str);
        for value in values {
            for expression in extract_expressions(value) {
                collect_references(expression, &mut jobs);
            }
        }
        for step in &self.steps {
            if let Some(condition) = &step.if_condition {
                collect_references(condition, &mut jobs);
            }
            for expression in step.texts().into_iter().flat_map(extract_expressions) {
                collect_references(expression, &mut jobs);
            }
        }
        jobs
    }
}

/// Insertion-ordered, acyclic set of jobs.
#[derive(Debug, Clone, Default)]
pub struct JobGraph {
    graph: DiGraph<GraphJob, ()>,
    name_to_node: HashMap<String, NodeIndex>,
}

impl JobGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job after its dependencies.
    ///
    /// # Errors
    ///
    /// Returns a logic error when the name is taken or a `needs` entry names
    /// a job that is not in the graph.
    pub fn add_job(&mut self, job: GraphJob) -> Result<NodeIndex> {
        if self.name_to_node.contains_key(&job.name) {
            return Err(CompileError::logic(format!(
                "job '{}' was added twice",
                job.name
            )));
        }

        let mut dependencies = Vec::with_capacity(job.needs.len());
        for need in &job.needs {
            let Some(&index) = self.name_to_node.get(need) else {
                return Err(CompileError::logic(format!(
                    "job '{}' needs '{need}', which is not in the graph",
                    job.name
                )));
            };
            dependencies.push(index);
        }

        let name = job.name.clone();
        let node = self.graph.add_node(job);
        for dependency in dependencies {
            self.graph.add_edge(dependency, node, ());
        }
        self.name_to_node.insert(name.clone(), node);
        debug!(job = %name, "Added job node");

        Ok(node)
    }

    /// Look up a job by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GraphJob> {
        self.name_to_node
            .get(name)
            .and_then(|&index| self.graph.node_weight(index))
    }

    /// Whether a job with this name exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_node.contains_key(name)
    }

    /// Jobs in insertion order
    pub fn jobs(&self) -> impl Iterator<Item = &GraphJob> {
        self.graph.node_indices().map(|index| &self.graph[index])
    }

    /// Job names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.jobs().map(|job| job.name.as_str())
    }

    /// Number of jobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no jobs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Whether the dependency edges form no cycle
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }

    /// Job names in a dependency-respecting order.
    ///
    /// # Errors
    ///
    /// Returns a logic error if the graph contains a cycle.
    pub fn topological_order(&self) -> Result<Vec<&str>> {
        toposort(&self.graph, None)
            .map(|sorted| {
                sorted
                    .into_iter()
                    .map(|index| self.graph[index].name.as_str())
                    .collect()
            })
            .map_err(|cycle| {
                CompileError::logic(format!(
                    "job graph contains a cycle through '{}'",
                    self.graph[cycle.node_id()].name
                ))
            })
    }
}
