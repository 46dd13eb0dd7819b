//! Condition AST and its canonical renderer.
//!
//! Every guard and `${{ }}` value the compiler emits is built as a
//! [`ConditionNode`] tree and turned into text through
//! [`ConditionNode::render`] or [`ConditionNode::render_interpolated`].

use std::fmt;

/// A literal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Single-quoted string
    String(String),
    /// Number, kept as written
    Number(String),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl ComparisonOp {
    /// Operator text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Operands of an `&&` or `||` node.
///
/// Only constructible through the builder functions, which reject empty
/// operand lists, so a rendered conjunction always has at least two terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operands(Vec<ConditionNode>);

impl Operands {
    pub(crate) fn new(nodes: Vec<ConditionNode>) -> Self {
        debug_assert!(nodes.len() >= 2);
        Self(nodes)
    }

    /// Iterate over the operands in caller order.
    pub fn iter(&self) -> std::slice::Iter<'_, ConditionNode> {
        self.0.iter()
    }

    /// Number of operands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no operands; never true for a node built by the
    /// builder functions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn into_vec(self) -> Vec<ConditionNode> {
        self.0
    }
}

/// A node of a boolean gating expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionNode {
    /// Literal value
    Literal(Literal),
    /// Dotted property path (`needs.agent.outputs.output`)
    Property(String),
    /// Binary comparison
    Comparison {
        /// Left operand
        left: Box<ConditionNode>,
        /// Operator
        op: ComparisonOp,
        /// Right operand
        right: Box<ConditionNode>,
    },
    /// Conjunction, rendered in operand order
    And(Operands),
    /// Disjunction, rendered in operand order
    Or(Operands),
    /// Negation
    Not(Box<ConditionNode>),
    /// `github.event_name == '<name>'`
    EventTypeEquals(String),
    /// Function call such as `cancelled()` or `contains(a, 'b')`
    Call {
        /// Function name as written
        name: String,
        /// Arguments in call order
        args: Vec<ConditionNode>,
    },
}

const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_COMPARISON: u8 = 3;
const PREC_UNARY: u8 = 4;
const PREC_ATOM: u8 = 5;

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl ConditionNode {
    const fn precedence(&self) -> u8 {
        match self {
            Self::Or(_) => PREC_OR,
            Self::And(_) => PREC_AND,
            Self::Comparison { .. } | Self::EventTypeEquals(_) => PREC_COMPARISON,
            Self::Not(_) => PREC_UNARY,
            Self::Literal(_) | Self::Property(_) | Self::Call { .. } => PREC_ATOM,
        }
    }

    /// Render to canonical expression text (without `${{ }}` delimiters).
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    /// Render wrapped in `${{ ... }}` for use in value positions.
    #[must_use]
    pub fn render_interpolated(&self) -> String {
        format!("${{{{ {} }}}}", self.render())
    }

    fn render_into(&self, out: &mut String, min_precedence: u8) {
        let wrap = self.precedence() < min_precedence;
        if wrap {
            out.push('(');
        }

        match self {
            Self::Literal(Literal::String(s)) => out.push_str(&quote(s)),
            Self::Literal(Literal::Number(n)) => out.push_str(n),
            Self::Literal(Literal::Bool(b)) => out.push_str(if *b { "true" } else { "false" }),
            Self::Literal(Literal::Null) => out.push_str("null"),
            Self::Property(path) => out.push_str(path),
            Self::Comparison { left, op, right } => {
                left.render_into(out, PREC_UNARY);
                out.push(' ');
                out.push_str(op.as_str());
                out.push(' ');
                right.render_into(out, PREC_UNARY);
            }
            Self::EventTypeEquals(name) => {
                out.push_str("github.event_name == ");
                out.push_str(&quote(name));
            }
            Self::And(operands) => Self::render_junction(out, operands, " && ", PREC_AND),
            Self::Or(operands) => Self::render_junction(out, operands, " || ", PREC_OR),
            Self::Not(inner) => {
                out.push('!');
                inner.render_into(out, PREC_UNARY);
            }
            Self::Call { name, args } => {
                out.push_str(name);
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    arg.render_into(out, 0);
                }
                out.push(')');
            }
        }

        if wrap {
            out.push(')');
        }
    }

    fn render_junction(out: &mut String, operands: &Operands, separator: &str, precedence: u8) {
        for (i, operand) in operands.iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            operand.render_into(out, precedence);
        }
    }

    /// Every property path referenced by this tree, in rendering order.
    ///
    /// [`ConditionNode::EventTypeEquals`] contributes `github.event_name`.
    #[must_use]
    pub fn property_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        self.walk(&mut |node| match node {
            Self::Property(path) => paths.push(path.as_str()),
            Self::EventTypeEquals(_) => paths.push("github.event_name"),
            _ => {}
        });
        paths
    }

    /// Every function name called in this tree, in rendering order.
    #[must_use]
    pub fn function_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.walk(&mut |node| {
            if let Self::Call { name, .. } = node {
                names.push(name.as_str());
            }
        });
        names
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        match self {
            Self::Comparison { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Self::And(operands) | Self::Or(operands) => {
                for operand in operands.iter() {
                    operand.walk(visit);
                }
            }
            Self::Not(inner) => inner.walk(visit),
            Self::Call { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Self::Literal(_) | Self::Property(_) | Self::EventTypeEquals(_) => {}
        }
    }

    /// Whether any property path starts with `prefix`.
    #[must_use]
    pub fn references_prefix(&self, prefix: &str) -> bool {
        self.property_paths().iter().any(|p| p.starts_with(prefix))
    }
}

impl fmt::Display for ConditionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
