//! GitHub Actions job-graph synthesis for awc.
//!
//! This crate turns a [`awc_core::WorkflowSpec`] into a multi-job GitHub
//! Actions workflow:
//! - [`Compiler`] runs the construction stages and emits YAML
//! - [`JobGraph`] holds the jobs in construction order, backed by petgraph
//! - [`EngineRegistry`], [`CapabilityRegistry`] and [`ThreatDetector`] supply
//!   the steps of the agent, safe-output and detection jobs
//! - [`JsonSchemaOracle`] checks emitted YAML against a caller-supplied schema
//!
//! # Example
//!
//! ```
//! use awc_core::{NoImports, SchemaCache};
//! use awc_github::{CompileOptions, Compiler};
//! use chrono::Utc;
//! use std::sync::Arc;
//!
//! let compiler = Compiler::new(Arc::new(SchemaCache::new()));
//! let source = "---\non: workflow_dispatch\n---\n# Greeter\nSay hello.\n";
//! let compiled = compiler.compile("greeter", source, &NoImports, &CompileOptions::at(Utc::now()))?;
//! assert!(compiled.yaml.contains("agent:"));
//! # Ok::<(), awc_github::CompileError>(())
//! ```

pub mod capabilities;
pub mod compiler;
pub mod conformance;
pub mod detection;
pub mod engine;
pub mod error;
pub mod graph;
pub mod stages;
pub mod workflow;

pub use capabilities::{Capability, CapabilityRegistry};
pub use compiler::{CompileOptions, CompiledWorkflow, Compiler};
pub use conformance::{ConformanceOracle, ConformanceReport, JsonSchemaOracle};
pub use detection::{EngineThreatDetector, ThreatDetector};
pub use engine::{CliEngine, Engine, EngineContext, EngineRegistry};
pub use error::{CompileError, Result};
pub use graph::{GraphJob, JobGraph};
pub use workflow::GitHubActionsEmitter;
