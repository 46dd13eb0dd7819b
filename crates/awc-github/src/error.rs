//! Error types for job-graph synthesis and workflow emission

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use awc_expr::ExprError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type for compilation
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors produced while compiling a workflow into a job graph
#[derive(Error, Debug, Diagnostic)]
pub enum CompileError {
    /// The workflow source could not be turned into a specification
    #[error(transparent)]
    #[diagnostic(transparent)]
    Spec(#[from] awc_core::Error),

    /// Expression parsing failed or interpolated expressions were rejected
    #[error(transparent)]
    #[diagnostic(transparent)]
    Expression(#[from] ExprError),

    /// A construction stage failed
    #[error("{stage}: {source}")]
    #[diagnostic(code(awc::github::stage))]
    Stage {
        /// Name of the stage that failed (`activation`, `custom job 'build'`)
        stage: String,
        /// Underlying failure
        #[source]
        source: Box<CompileError>,
    },

    /// A job references outputs of a job that is not built before it
    #[error("Job '{job}' references '{reference}', which is not built before it")]
    #[diagnostic(
        code(awc::github::unknown_job_reference),
        help("Jobs may only read outputs of jobs declared earlier in the workflow")
    )]
    UnknownJobReference {
        /// The referencing job
        job: String,
        /// The referenced job name
        reference: String,
    },

    /// The frontmatter names an engine no registry entry exists for
    #[error("Unknown engine '{engine}' (available: {available})")]
    #[diagnostic(code(awc::github::unknown_engine))]
    UnknownEngine {
        /// Requested engine id
        engine: String,
        /// Comma-separated registered engine ids
        available: String,
    },

    /// A `safe-outputs` key that is not a known capability
    #[error("Unknown safe-output capability '{capability}'")]
    #[diagnostic(
        code(awc::github::unknown_capability),
        help("Declare custom side effects under 'safe-outputs.jobs' instead")
    )]
    UnknownCapability {
        /// The unrecognized key
        capability: String,
    },

    /// A capability configuration has the wrong shape
    #[error("Invalid configuration for safe-output '{capability}': {message}")]
    #[diagnostic(code(awc::github::capability_config))]
    CapabilityConfig {
        /// Capability name
        capability: String,
        /// What is wrong with it
        message: String,
    },

    /// A user-supplied step does not match the Actions step shape
    #[error("Invalid step {index} in job '{job}': {message}")]
    #[diagnostic(code(awc::github::invalid_step))]
    InvalidStep {
        /// Job the step belongs to
        job: String,
        /// Zero-based step position
        index: usize,
        /// Deserializer message
        message: String,
    },

    /// The conformance oracle could not be set up
    #[error("Conformance schema error: {message}")]
    #[diagnostic(code(awc::github::conformance))]
    Conformance {
        /// What went wrong
        message: String,
    },

    /// Serializing the workflow failed
    #[error("Failed to serialize workflow: {0}")]
    #[diagnostic(code(awc::github::serialize))]
    Serialization(#[from] serde_yaml::Error),

    /// An invariant of the synthesizer was violated
    #[error("internal error: {message}")]
    #[diagnostic(
        code(awc::github::logic),
        help("This is a bug in awc, not in the workflow")
    )]
    Logic {
        /// Description of the violated invariant
        message: String,
    },
}

impl CompileError {
    /// Wrap an error with the name of the stage it came from
    #[must_use]
    pub fn stage(stage: impl Into<String>, source: Self) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// Create a logic error
    #[must_use]
    pub fn logic(message: impl Into<String>) -> Self {
        Self::Logic {
            message: message.into(),
        }
    }

    /// Create a capability configuration error
    #[must_use]
    pub fn capability_config(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CapabilityConfig {
            capability: capability.into(),
            message: message.into(),
        }
    }

    /// The innermost error, looking through stage wrappers
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error indicates a bug in the compiler rather than bad input
    #[must_use]
    pub fn is_logic_error(&self) -> bool {
        match self.root() {
            Self::Logic { .. } => true,
            Self::Expression(err) => err.is_logic_error(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wrapping_keeps_message() {
        let err = CompileError::stage(
            "activation",
            CompileError::UnknownJobReference {
                job: "activation".into(),
                reference: "agent".into(),
            },
        );
        let message = err.to_string();
        assert!(message.starts_with("activation: "));
        assert!(message.contains("'agent'"));
        assert!(matches!(err.root(), CompileError::UnknownJobReference { .. }));
    }

    #[test]
    fn test_logic_errors_are_distinguishable() {
        let err = CompileError::stage("pre_activation", CompileError::logic("no checks"));
        assert!(err.is_logic_error());
        assert!(err.to_string().contains("internal error"));

        let err = CompileError::from(ExprError::EmptyConjunction);
        assert!(err.is_logic_error());

        let err = CompileError::UnknownCapability {
            capability: "send-email".into(),
        };
        assert!(!err.is_logic_error());
    }
}
