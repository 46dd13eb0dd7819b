//! Error types for expression parsing, building and validation.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

/// Result type for expression operations.
pub type Result<T> = std::result::Result<T, ExprError>;

/// Why a single interpolation placeholder was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingReason {
    /// A property path whose root or shape is not on the allow-list.
    UnauthorizedPath(String),
    /// A function the expression language does not permit.
    UnknownFunction(String),
    /// The placeholder content could not be parsed at all.
    Unparseable(String),
}

/// One rejected expression found while scanning text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// The raw expression text between the `${{` and `}}` delimiters, trimmed.
    pub expression: String,
    /// Why it was rejected.
    pub reason: FindingReason,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            FindingReason::UnauthorizedPath(path) => write!(
                f,
                "${{{{ {} }}}}: '{path}' is not an allowed expression source",
                self.expression
            ),
            FindingReason::UnknownFunction(name) => write!(
                f,
                "${{{{ {} }}}}: function '{name}' is not allowed",
                self.expression
            ),
            FindingReason::Unparseable(message) => write!(
                f,
                "${{{{ {} }}}}: could not be parsed ({message})",
                self.expression
            ),
        }
    }
}

fn format_findings(findings: &[Finding]) -> String {
    let list = findings
        .iter()
        .map(|finding| format!("  - {finding}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{} unauthorized expression(s) found:\n{list}",
        findings.len()
    )
}

/// Errors produced by the expression language.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// Malformed expression syntax
    #[error("Invalid expression '{expression}' at offset {position}: {message}")]
    #[diagnostic(
        code(awc::expr::parse),
        help("Expressions support literals, dotted properties, ==, !=, <, <=, >, >=, &&, ||, ! and function calls")
    )]
    Parse {
        /// The full expression being parsed
        expression: String,
        /// Byte offset of the offending token
        position: usize,
        /// Description of what went wrong
        message: String,
    },

    /// `and()` was asked to combine zero operands
    #[error("internal error: cannot build a conjunction from zero operands")]
    #[diagnostic(code(awc::expr::empty_conjunction))]
    EmptyConjunction,

    /// `or()` was asked to combine zero operands
    #[error("internal error: cannot build a disjunction from zero operands")]
    #[diagnostic(code(awc::expr::empty_disjunction))]
    EmptyDisjunction,

    /// One or more expressions reference sources outside the allow-list
    #[error("{}", format_findings(findings))]
    #[diagnostic(
        code(awc::expr::unauthorized),
        help(
            "Only github event metadata, needs.<job>.outputs.<name>, steps.<id>.outputs.<name>, inputs, env and approved secrets may be interpolated"
        )
    )]
    Unauthorized {
        /// Every rejected expression, in order of appearance
        findings: Vec<Finding>,
    },
}

impl ExprError {
    /// Create a parse error.
    #[must_use]
    pub fn parse(expression: &str, position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            expression: expression.to_string(),
            position,
            message: message.into(),
        }
    }

    /// Whether this error indicates a programming error rather than bad user input.
    #[must_use]
    pub const fn is_logic_error(&self) -> bool {
        matches!(self, Self::EmptyConjunction | Self::EmptyDisjunction)
    }
}
