//! Error types for workflow specification parsing

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use awc_expr::ExprError;
use miette::Diagnostic;
use thiserror::Error;

/// Error type for workflow specification parsing
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The source has no usable frontmatter block
    #[error("Invalid frontmatter: {message}")]
    #[diagnostic(
        code(awc::core::frontmatter),
        help("A workflow starts with a YAML block delimited by '---' lines")
    )]
    Frontmatter {
        /// What is wrong with the block
        message: String,
    },

    /// The frontmatter is not valid YAML
    #[error("Frontmatter YAML error: {message}")]
    #[diagnostic(code(awc::core::yaml))]
    Yaml {
        /// Message from the YAML parser
        message: String,
    },

    /// The frontmatter violates the frontmatter schema
    #[error("Frontmatter does not match the workflow schema:\n{}", violations.iter().map(|v| format!("  - {v}")).collect::<Vec<_>>().join("\n"))]
    #[diagnostic(
        code(awc::core::schema),
        help("Run `awc validate` to list every supported frontmatter key")
    )]
    Schema {
        /// Every violation, in the order the validator reported them
        violations: Vec<String>,
    },

    /// A frontmatter field has an unusable value
    #[error("Invalid value for '{field}': {message}")]
    #[diagnostic(code(awc::core::config))]
    Configuration {
        /// Frontmatter path of the field (`on.stop-after`)
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// A command trigger was combined with an event it already implies
    #[error("Command trigger '/{command}' cannot be combined with the '{event}' event")]
    #[diagnostic(
        code(awc::core::conflicting_triggers),
        help("A command trigger already listens on issues, issue_comment, pull_request and pull_request_review_comment")
    )]
    ConflictingTriggers {
        /// Command name without the leading slash
        command: String,
        /// The conflicting event
        event: String,
    },

    /// A custom job fragment declares a field other than `steps` or `outputs`
    #[error("Custom job '{job}' uses unsupported field '{field}'")]
    #[diagnostic(
        code(awc::core::unsupported_job_field),
        help("Custom jobs may only declare 'steps' and 'outputs'")
    )]
    UnsupportedJobField {
        /// Job name
        job: String,
        /// The rejected field
        field: String,
    },

    /// A permission scope that does not exist
    #[error("Unknown permission scope '{scope}'")]
    #[diagnostic(code(awc::core::permission_scope))]
    UnknownScope {
        /// The scope as written
        scope: String,
    },

    /// A permission level other than none/read/write
    #[error("Invalid permission level '{level}' for scope '{scope}'")]
    #[diagnostic(
        code(awc::core::permission_level),
        help("Permission levels are 'none', 'read' and 'write'")
    )]
    InvalidLevel {
        /// Scope the level was given for
        scope: String,
        /// The level as written
        level: String,
    },

    /// Strict mode forbids the requested configuration
    #[error("Strict mode violation: {message}")]
    #[diagnostic(
        code(awc::core::strict),
        help("Route writes through safe-outputs, or set 'strict: false'")
    )]
    Strict {
        /// Description of the violation
        message: String,
    },

    /// An import fragment could not be resolved
    #[error("Cannot import '{path}': {message}")]
    #[diagnostic(code(awc::core::import))]
    Import {
        /// The import path as written
        path: String,
        /// Why resolution failed
        message: String,
    },

    /// The schema document itself failed to compile
    #[error("Frontmatter schema could not be compiled: {message}")]
    #[diagnostic(code(awc::core::schema_compile))]
    SchemaCompile {
        /// Message from the schema compiler
        message: String,
    },

    /// Malformed condition syntax
    #[error(transparent)]
    #[diagnostic(transparent)]
    Expression(#[from] ExprError),
}

impl Error {
    /// Create a frontmatter error
    #[must_use]
    pub fn frontmatter(msg: impl Into<String>) -> Self {
        Self::Frontmatter {
            message: msg.into(),
        }
    }

    /// Create a configuration error for `field`
    #[must_use]
    pub fn configuration(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create an import error
    #[must_use]
    pub fn import(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Import {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a strict-mode error
    #[must_use]
    pub fn strict(msg: impl Into<String>) -> Self {
        Self::Strict {
            message: msg.into(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

/// Result type for workflow specification parsing
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_every_violation() {
        let err = Error::Schema {
            violations: vec!["/engine: 5 is not of type string".into(), "/foo: unexpected".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("  - /engine: 5 is not of type string"));
        assert!(msg.contains("  - /foo: unexpected"));
    }

    #[test]
    fn test_unsupported_job_field_names_field() {
        let err = Error::UnsupportedJobField {
            job: "prep".into(),
            field: "runs-on".into(),
        };
        assert_eq!(err.to_string(), "Custom job 'prep' uses unsupported field 'runs-on'");
    }

    #[test]
    fn test_expression_error_is_transparent() {
        let err: Error = ExprError::parse("a ==", 4, "unexpected end of expression").into();
        assert!(err.to_string().starts_with("Invalid expression 'a =='"));
    }
}
