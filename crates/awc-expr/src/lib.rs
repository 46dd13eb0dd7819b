//! Expression language for awc.
//!
//! This crate provides the three pieces of the `${{ ... }}` micro-language
//! that the workflow compiler relies on:
//!
//! - [`parse_condition`]: tokenizer and recursive-descent parser producing a
//!   [`ConditionNode`] tree
//! - [`builder`]: constructors for gating conditions and the canonical
//!   renderer on [`ConditionNode`]
//! - [`ExpressionValidator`]: the allow-list that certifies every
//!   interpolated property path before it reaches a script context
//!
//! # Example
//!
//! ```
//! use awc_expr::builder::{and, equals_true};
//!
//! let gate = and([
//!     equals_true("steps.check_membership.outputs.is_team_member"),
//!     equals_true("steps.check_stop_time.outputs.stop_time_ok"),
//! ])?;
//! assert_eq!(
//!     gate.render(),
//!     "steps.check_membership.outputs.is_team_member == 'true' && steps.check_stop_time.outputs.stop_time_ok == 'true'"
//! );
//! # Ok::<(), awc_expr::ExprError>(())
//! ```

mod ast;
pub mod builder;
mod error;
mod lexer;
mod parser;
mod validator;

pub use ast::{ComparisonOp, ConditionNode, Literal, Operands};
pub use error::{ExprError, Finding, FindingReason, Result};
pub use lexer::{Spanned, Token, tokenize};
pub use parser::{MAX_NESTING, parse_condition, strip_delimiters};
pub use validator::{ALLOWED_FUNCTIONS, ALLOWED_GITHUB_PATHS, ExpressionValidator, extract_expressions, replace_expressions};
