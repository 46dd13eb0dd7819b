//! Constructors for condition trees.
//!
//! Conjunctions and disjunctions flatten nested nodes of the same kind and keep
//! caller order, so output is deterministic. Combining zero operands is an
//! error: an empty `and()` must never silently become "always true".

use crate::ast::{ComparisonOp, ConditionNode, Literal, Operands};
use crate::error::{ExprError, Result};

/// Property access such as `github.event_name`.
#[must_use]
pub fn property(path: impl Into<String>) -> ConditionNode {
    ConditionNode::Property(path.into())
}

/// String literal; quoting and escaping happen at render time.
#[must_use]
pub fn string_literal(value: impl Into<String>) -> ConditionNode {
    ConditionNode::Literal(Literal::String(value.into()))
}

/// Boolean literal.
#[must_use]
pub const fn bool_literal(value: bool) -> ConditionNode {
    ConditionNode::Literal(Literal::Bool(value))
}

/// Binary comparison.
#[must_use]
pub fn comparison(lhs: ConditionNode, op: ComparisonOp, rhs: ConditionNode) -> ConditionNode {
    ConditionNode::Comparison {
        left: Box::new(lhs),
        op,
        right: Box::new(rhs),
    }
}

/// `lhs == rhs`
#[must_use]
pub fn equals(lhs: ConditionNode, rhs: ConditionNode) -> ConditionNode {
    comparison(lhs, ComparisonOp::Eq, rhs)
}

/// `lhs != rhs`
#[must_use]
pub fn not_equals(lhs: ConditionNode, rhs: ConditionNode) -> ConditionNode {
    comparison(lhs, ComparisonOp::Ne, rhs)
}

/// `node == 'true'`
#[must_use]
pub fn is_true(node: ConditionNode) -> ConditionNode {
    equals(node, string_literal("true"))
}

/// `<path> == 'true'`, the shape of every gate check.
#[must_use]
pub fn equals_true(path: impl Into<String>) -> ConditionNode {
    is_true(property(path))
}

/// `needs.<job>.outputs.<name>`
#[must_use]
pub fn job_output(job: &str, name: &str) -> ConditionNode {
    property(format!("needs.{job}.outputs.{name}"))
}

/// `needs.<job>.result`
#[must_use]
pub fn job_result(job: &str) -> ConditionNode {
    property(format!("needs.{job}.result"))
}

/// `steps.<id>.outputs.<name>`
#[must_use]
pub fn step_output(id: &str, name: &str) -> ConditionNode {
    property(format!("steps.{id}.outputs.{name}"))
}

/// `secrets.<name>`
#[must_use]
pub fn secret(name: &str) -> ConditionNode {
    property(format!("secrets.{name}"))
}

/// `github.event_name == '<name>'`
#[must_use]
pub fn event_type_equals(name: impl Into<String>) -> ConditionNode {
    ConditionNode::EventTypeEquals(name.into())
}

/// `!node`
#[must_use]
pub fn not(node: ConditionNode) -> ConditionNode {
    ConditionNode::Not(Box::new(node))
}

/// Function call such as `always()`.
#[must_use]
pub fn function(name: impl Into<String>, args: Vec<ConditionNode>) -> ConditionNode {
    ConditionNode::Call {
        name: name.into(),
        args,
    }
}

/// Conjunction of `nodes`, in the order given.
///
/// A single operand is returned unchanged.
///
/// # Errors
///
/// Returns [`ExprError::EmptyConjunction`] when `nodes` is empty.
pub fn and(nodes: impl IntoIterator<Item = ConditionNode>) -> Result<ConditionNode> {
    junction(nodes, true).ok_or(ExprError::EmptyConjunction)
}

/// Disjunction of `nodes`, in the order given.
///
/// # Errors
///
/// Returns [`ExprError::EmptyDisjunction`] when `nodes` is empty.
pub fn or(nodes: impl IntoIterator<Item = ConditionNode>) -> Result<ConditionNode> {
    junction(nodes, false).ok_or(ExprError::EmptyDisjunction)
}

fn flatten(nodes: impl IntoIterator<Item = ConditionNode>, conjunction: bool) -> Vec<ConditionNode> {
    let mut flat = Vec::new();
    for node in nodes {
        match node {
            ConditionNode::And(inner) if conjunction => flat.extend(inner.into_vec()),
            ConditionNode::Or(inner) if !conjunction => flat.extend(inner.into_vec()),
            other => flat.push(other),
        }
    }
    flat
}

fn junction(nodes: impl IntoIterator<Item = ConditionNode>, conjunction: bool) -> Option<ConditionNode> {
    let mut flat = flatten(nodes, conjunction);
    match flat.len() {
        0 => None,
        1 => flat.pop(),
        _ if conjunction => Some(ConditionNode::And(Operands::new(flat))),
        _ => Some(ConditionNode::Or(Operands::new(flat))),
    }
}

impl ConditionNode {
    /// `self && other`
    #[must_use]
    pub fn and_then(self, other: Self) -> Self {
        Self::And(Operands::new(flatten([self, other], true)))
    }

    /// `self || other`
    #[must_use]
    pub fn or_else(self, other: Self) -> Self {
        Self::Or(Operands::new(flatten([self, other], false)))
    }
}
