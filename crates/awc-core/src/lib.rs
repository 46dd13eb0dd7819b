//! Workflow specification model for awc.
//!
//! Turns an agentic workflow source (YAML frontmatter plus markdown body) into
//! an immutable [`WorkflowSpec`], and provides the [`PermissionSet`] model the
//! compiler accumulates job grants with.
//!
//! ```
//! use awc_core::{NoImports, ParseOptions, SchemaCache, WorkflowSpec};
//! use chrono::Utc;
//!
//! let schema = SchemaCache::new();
//! let options = ParseOptions { schema: &schema, resolver: &NoImports, now: Utc::now() };
//! let parsed = WorkflowSpec::parse("triage", "---\non: issues\n---\n# Triage\n", &options)?;
//! assert_eq!(parsed.spec.name, "Triage");
//! # Ok::<(), awc_core::Error>(())
//! ```

pub mod error;
pub mod frontmatter;
pub mod imports;
pub mod permissions;
pub mod raw;
pub mod schema;
pub mod spec;
pub mod triggers;

pub use error::{Error, Result};
pub use imports::{FragmentResolver, NoImports};
pub use permissions::{Level, PermissionSet, Scope};
pub use schema::SchemaCache;
pub use spec::{
    EngineConfig, JobFragment, ParseOptions, ParsedWorkflow, RateLimit, Roles, SafeJobFragment,
    SafeOutputs, WorkflowSpec,
};
pub use triggers::{CommandTrigger, SearchQuery, Triggers};
