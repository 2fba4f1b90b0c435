//! Pattern lexer.
//!
//! Every token carries its byte span so syntax errors can point at the
//! offending substring.

use crate::error::{Error, Result};

/// Token payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    At,
    Star,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    ColonColon,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Name(String),
    Literal(String),
    Number(f64),
}

/// A token with its byte span in the pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub start: usize,
    pub end: usize,
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Tokenize a whole pattern.
pub fn tokenize(pattern: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let rest = &pattern[i..];
        let c = match rest.chars().next() {
            Some(c) => c,
            None => break,
        };
        if c.is_whitespace() {
            i += c.len_utf8();
            continue;
        }
        let start = i;
        let tok = match c {
            '/' => {
                if rest.starts_with("//") {
                    i += 2;
                    Tok::DoubleSlash
                } else {
                    i += 1;
                    Tok::Slash
                }
            }
            '.' => {
                if rest.starts_with("..") {
                    i += 2;
                    Tok::DotDot
                } else {
                    i += 1;
                    Tok::Dot
                }
            }
            '@' => {
                i += 1;
                Tok::At
            }
            '*' => {
                i += 1;
                Tok::Star
            }
            '[' => {
                i += 1;
                Tok::LBracket
            }
            ']' => {
                i += 1;
                Tok::RBracket
            }
            '(' => {
                i += 1;
                Tok::LParen
            }
            ')' => {
                i += 1;
                Tok::RParen
            }
            ',' => {
                i += 1;
                Tok::Comma
            }
            ':' => {
                if rest.starts_with("::") {
                    i += 2;
                    Tok::ColonColon
                } else {
                    return Err(span_error(pattern, start, start + 1));
                }
            }
            '=' => {
                i += 1;
                Tok::Eq
            }
            '!' => {
                if rest.starts_with("!=") {
                    i += 2;
                    Tok::Ne
                } else {
                    return Err(span_error(pattern, start, start + 1));
                }
            }
            '<' => {
                if rest.starts_with("<=") {
                    i += 2;
                    Tok::Le
                } else {
                    i += 1;
                    Tok::Lt
                }
            }
            '>' => {
                if rest.starts_with(">=") {
                    i += 2;
                    Tok::Ge
                } else {
                    i += 1;
                    Tok::Gt
                }
            }
            '"' | '\'' => {
                let body = &rest[1..];
                match body.find(c) {
                    Some(end) => {
                        let value = body[..end].to_string();
                        i += end + 2;
                        Tok::Literal(value)
                    }
                    None => return Err(span_error(pattern, start, pattern.len())),
                }
            }
            c if c.is_ascii_digit() => {
                let mut end = i;
                let mut seen_dot = false;
                for ch in rest.chars() {
                    if ch.is_ascii_digit() {
                        end += 1;
                    } else if ch == '.' && !seen_dot {
                        seen_dot = true;
                        end += 1;
                    } else {
                        break;
                    }
                }
                let text = &pattern[i..end];
                let value: f64 = text
                    .parse()
                    .map_err(|_| span_error(pattern, i, end))?;
                i = end;
                Tok::Number(value)
            }
            c if is_name_start(c) => {
                let mut end = i + c.len_utf8();
                for ch in rest.chars().skip(1) {
                    if is_name_char(ch) {
                        end += ch.len_utf8();
                    } else {
                        break;
                    }
                }
                let name = pattern[i..end].to_string();
                i = end;
                Tok::Name(name)
            }
            other => {
                return Err(span_error(pattern, start, start + other.len_utf8()));
            }
        };
        tokens.push(Token {
            tok,
            start,
            end: i,
        });
    }
    Ok(tokens)
}

pub(crate) fn span_error(pattern: &str, start: usize, end: usize) -> Error {
    Error::QuerySyntax {
        pattern: pattern.to_string(),
        found: pattern.get(start..end).unwrap_or("").to_string(),
        start,
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(pattern: &str) -> Vec<Tok> {
        tokenize(pattern).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_path_tokens() {
        assert_eq!(
            toks("/foo//bar[2]"),
            vec![
                Tok::Slash,
                Tok::Name("foo".into()),
                Tok::DoubleSlash,
                Tok::Name("bar".into()),
                Tok::LBracket,
                Tok::Number(2.0),
                Tok::RBracket,
            ]
        );
    }

    #[test]
    fn test_predicate_tokens() {
        assert_eq!(
            toks("@loo=\"skip\""),
            vec![Tok::At, Tok::Name("loo".into()), Tok::Eq, Tok::Literal("skip".into())]
        );
    }

    #[test]
    fn test_bad_character_span() {
        let err = tokenize("/$").unwrap_err();
        assert_eq!(
            err,
            Error::QuerySyntax {
                pattern: "/$".into(),
                found: "$".into(),
                start: 1,
                end: 2,
            }
        );
    }

    #[test]
    fn test_unterminated_literal() {
        assert!(tokenize("[@a=\"oops]").is_err());
    }
}
