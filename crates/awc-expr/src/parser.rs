//! Recursive-descent parser producing [`ConditionNode`] trees.
//!
//! Precedence, lowest first: `||`, `&&`, comparison, unary `!`, primary.
//! Parentheses, negations and call arguments may nest at most
//! [`MAX_NESTING`] levels deep.

use crate::ast::{ComparisonOp, ConditionNode, Literal};
use crate::builder;
use crate::error::{ExprError, Result};
use crate::lexer::{Spanned, Token, tokenize};

/// Deepest nesting of parentheses, `!` and call arguments the parser accepts.
pub const MAX_NESTING: usize = 64;

/// Parse an expression, with or without surrounding `${{ }}` delimiters.
///
/// # Errors
///
/// Returns [`ExprError::Parse`] when the text is not a well-formed expression.
pub fn parse_condition(text: &str) -> Result<ConditionNode> {
    let inner = strip_delimiters(text);
    let tokens = tokenize(inner)?;
    let mut parser = Parser {
        source: inner,
        tokens,
        pos: 0,
        depth: 0,
    };

    if parser.tokens.is_empty() {
        return Err(ExprError::parse(inner, 0, "empty expression"));
    }

    let node = parser.parse_or()?;
    if let Some(extra) = parser.peek() {
        return Err(ExprError::parse(
            inner,
            extra.offset,
            "unexpected token after end of expression",
        ));
    }
    Ok(node)
}

/// Remove one `${{ ... }}` wrapper if present and trim whitespace.
#[must_use]
pub fn strip_delimiters(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("${{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .map_or(trimmed, str::trim)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn end_offset(&self) -> usize {
        self.source.len()
    }

    fn error_here(&self, message: impl Into<String>) -> ExprError {
        let offset = self.peek().map_or_else(|| self.end_offset(), |s| s.offset);
        ExprError::parse(self.source, offset, message)
    }

    fn nested<T>(
        &mut self,
        offset: usize,
        parse: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(ExprError::parse(
                self.source,
                offset,
                format!("expression nests deeper than {MAX_NESTING} levels"),
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_or(&mut self) -> Result<ConditionNode> {
        let mut operands = vec![self.parse_and()?];
        while self.peek_token() == Some(&Token::Or) {
            self.advance();
            operands.push(self.parse_and()?);
        }
        builder::or(operands)
    }

    fn parse_and(&mut self) -> Result<ConditionNode> {
        let mut operands = vec![self.parse_comparison()?];
        while self.peek_token() == Some(&Token::And) {
            self.advance();
            operands.push(self.parse_comparison()?);
        }
        builder::and(operands)
    }

    fn parse_comparison(&mut self) -> Result<ConditionNode> {
        let left = self.parse_unary()?;

        let op = match self.peek_token() {
            Some(Token::Eq) => ComparisonOp::Eq,
            Some(Token::Ne) => ComparisonOp::Ne,
            Some(Token::Lt) => ComparisonOp::Lt,
            Some(Token::Le) => ComparisonOp::Le,
            Some(Token::Gt) => ComparisonOp::Gt,
            Some(Token::Ge) => ComparisonOp::Ge,
            _ => return Ok(left),
        };
        self.advance();

        let right = self.parse_unary()?;
        Ok(builder::comparison(left, op, right))
    }

    fn parse_unary(&mut self) -> Result<ConditionNode> {
        if let Some(Spanned {
            token: Token::Not,
            offset,
        }) = self.peek()
        {
            let offset = *offset;
            self.advance();
            let inner = self.nested(offset, Self::parse_unary)?;
            return Ok(builder::not(inner));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<ConditionNode> {
        let Some(spanned) = self.advance() else {
            return Err(ExprError::parse(
                self.source,
                self.end_offset(),
                "unexpected end of expression",
            ));
        };

        match spanned.token {
            Token::Str(value) => Ok(ConditionNode::Literal(Literal::String(value))),
            Token::Number(value) => Ok(ConditionNode::Literal(Literal::Number(value))),
            Token::LParen => {
                let inner = self.nested(spanned.offset, Self::parse_or)?;
                match self.advance() {
                    Some(Spanned {
                        token: Token::RParen,
                        ..
                    }) => Ok(inner),
                    _ => Err(ExprError::parse(
                        self.source,
                        spanned.offset,
                        "unclosed parenthesis",
                    )),
                }
            }
            Token::Ident(name) => self.parse_identifier(name, spanned.offset),
            other => Err(ExprError::parse(
                self.source,
                spanned.offset,
                format!("expected a value, found {}", describe(&other)),
            )),
        }
    }

    fn parse_identifier(&mut self, name: String, offset: usize) -> Result<ConditionNode> {
        match name.as_str() {
            "true" => return Ok(builder::bool_literal(true)),
            "false" => return Ok(builder::bool_literal(false)),
            "null" => return Ok(ConditionNode::Literal(Literal::Null)),
            _ => {}
        }

        if self.peek_token() != Some(&Token::LParen) {
            return Ok(ConditionNode::Property(name));
        }

        if name.contains('.') {
            return Err(ExprError::parse(
                self.source,
                offset,
                format!("'{name}' is not a function name"),
            ));
        }

        self.advance();
        let mut args = Vec::new();
        if self.peek_token() == Some(&Token::RParen) {
            self.advance();
            return Ok(builder::function(name, args));
        }

        loop {
            args.push(self.nested(offset, Self::parse_or)?);
            match self.advance().map(|s| s.token) {
                Some(Token::Comma) => {}
                Some(Token::RParen) => break,
                _ => {
                    self.pos -= 1;
                    return Err(self.error_here(format!(
                        "expected ',' or ')' in call to '{name}'"
                    )));
                }
            }
        }

        Ok(builder::function(name, args))
    }
}

fn describe(token: &Token) -> &'static str {
    match token {
        Token::Eq => "'=='",
        Token::Ne => "'!='",
        Token::Lt => "'<'",
        Token::Le => "'<='",
        Token::Gt => "'>'",
        Token::Ge => "'>='",
        Token::And => "'&&'",
        Token::Or => "'||'",
        Token::Not => "'!'",
        Token::LParen => "'('",
        Token::RParen => "')'",
        Token::Comma => "','",
        Token::Ident(_) => "identifier",
        Token::Str(_) => "string",
        Token::Number(_) => "number",
    }
}
