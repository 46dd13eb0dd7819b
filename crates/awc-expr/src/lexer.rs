//! Tokenizer for the expression micro-language.

use crate::error::{ExprError, Result};

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identifier or dotted property path (`github.event_name`, `cancelled`)
    Ident(String),
    /// Single-quoted string literal, already unescaped
    Str(String),
    /// Numeric literal, kept as written
    Number(String),
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
    /// `&&`
    And,
    /// `||`
    Or,
    /// `!`
    Not,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
}

/// A token together with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    /// The token
    pub token: Token,
    /// Byte offset into the source
    pub offset: usize,
}

const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Split an expression into tokens.
///
/// # Errors
///
/// Returns [`ExprError::Parse`] for unterminated strings, malformed paths and
/// characters that are not part of the language.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::Ne, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('!', _) => (Token::Not, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            ('\'', _) => {
                let (value, consumed) = lex_string(input, &chars, i)?;
                tokens.push(Spanned {
                    token: Token::Str(value),
                    offset,
                });
                i += consumed;
                continue;
            }
            (c, _) if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let (value, consumed) = lex_number(&chars, i);
                tokens.push(Spanned {
                    token: Token::Number(value),
                    offset,
                });
                i += consumed;
                continue;
            }
            (c, _) if is_ident_start(c) => {
                let (value, consumed) = lex_path(input, &chars, i)?;
                tokens.push(Spanned {
                    token: Token::Ident(value),
                    offset,
                });
                i += consumed;
                continue;
            }
            (other, _) => {
                return Err(ExprError::parse(
                    input,
                    offset,
                    format!("unexpected character '{other}'"),
                ));
            }
        };

        tokens.push(Spanned { token, offset });
        i += width;
    }

    Ok(tokens)
}

fn lex_string(input: &str, chars: &[(usize, char)], start: usize) -> Result<(String, usize)> {
    let mut value = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let (_, c) = chars[i];
        if c == '\'' {
            // '' is an escaped quote
            if chars.get(i + 1).map(|&(_, c)| c) == Some('\'') {
                value.push('\'');
                i += 2;
                continue;
            }
            return Ok((value, i + 1 - start));
        }
        value.push(c);
        i += 1;
    }

    Err(ExprError::parse(
        input,
        chars[start].0,
        "unterminated string literal",
    ))
}

fn lex_number(chars: &[(usize, char)], start: usize) -> (String, usize) {
    let mut value = String::new();
    let mut i = start;
    let mut seen_dot = false;

    if chars[i].1 == '-' {
        value.push('-');
        i += 1;
    }

    while let Some(&(_, c)) = chars.get(i) {
        if c.is_ascii_digit() {
            value.push(c);
        } else if c == '.' && !seen_dot && chars.get(i + 1).is_some_and(|&(_, n)| n.is_ascii_digit()) {
            seen_dot = true;
            value.push(c);
        } else {
            break;
        }
        i += 1;
    }

    (value, i - start)
}

fn lex_path(input: &str, chars: &[(usize, char)], start: usize) -> Result<(String, usize)> {
    let mut value = String::new();
    let mut i = start;

    loop {
        while let Some(&(_, c)) = chars.get(i) {
            if !is_ident_char(c) {
                break;
            }
            value.push(c);
            i += 1;
        }

        match chars.get(i) {
            Some(&(offset, '.')) => {
                if !chars.get(i + 1).is_some_and(|&(_, n)| is_ident_start(n) || n.is_ascii_digit()) {
                    return Err(ExprError::parse(
                        input,
                        offset,
                        "property path segment must follow '.'",
                    ));
                }
                value.push('.');
                i += 1;
            }
            _ => break,
        }
    }

    Ok((value, i - start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_tokenize_comparison() {
        assert_eq!(
            kinds("github.event_name == 'issues'"),
            vec![
                Token::Ident("github.event_name".to_string()),
                Token::Eq,
                Token::Str("issues".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            kinds("!a && b || c != d <= 1 >= 2 < 3 > 4"),
            vec![
                Token::Not,
                Token::Ident("a".to_string()),
                Token::And,
                Token::Ident("b".to_string()),
                Token::Or,
                Token::Ident("c".to_string()),
                Token::Ne,
                Token::Ident("d".to_string()),
                Token::Le,
                Token::Number("1".to_string()),
                Token::Ge,
                Token::Number("2".to_string()),
                Token::Lt,
                Token::Number("3".to_string()),
                Token::Gt,
                Token::Number("4".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_escaped_quote() {
        assert_eq!(kinds("'it''s'"), vec![Token::Str("it's".to_string())]);
    }

    #[test]
    fn test_tokenize_hyphenated_path() {
        assert_eq!(
            kinds("needs.pre-check.outputs.ok"),
            vec![Token::Ident("needs.pre-check.outputs.ok".to_string())]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(
            kinds("-1.5 42"),
            vec![
                Token::Number("-1.5".to_string()),
                Token::Number("42".to_string())
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("a == 'open").unwrap_err();
        assert!(matches!(err, ExprError::Parse { position: 5, .. }));
    }

    #[test]
    fn test_single_equals_rejected() {
        assert!(tokenize("a = b").is_err());
        assert!(tokenize("a & b").is_err());
    }

    #[test]
    fn test_trailing_dot_rejected() {
        assert!(tokenize("github.").is_err());
    }
}
