//! GitHub Actions Workflow Generator
//!
//! Serializable workflow types and the emitter that renders a compiled
//! [`JobGraph`](crate::graph::JobGraph) into a committed workflow file.
//!
//! # Example
//!
//! ```ignore
//! use awc_github::workflow::GitHubActionsEmitter;
//!
//! let yaml = GitHubActionsEmitter::new()
//!     .with_source_path(".github/workflows/triage.md")
//!     .emit(&spec, &graph)?;
//! std::fs::write(".github/workflows/triage.lock.yml", yaml)?;
//! ```

pub mod emitter;
pub mod schema;

pub use emitter::GitHubActionsEmitter;
