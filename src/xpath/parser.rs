//! Recursive-descent grammar compiler: token stream to [`OpIr`].

use crate::error::Result;
use crate::xpath::ir::{CompareOp, OpIr, SlashKind};
use crate::xpath::lexer::{self, Tok, Token};

/// Compile a pattern string into its operator IR.
pub fn compile(pattern: &str) -> Result<OpIr> {
    let tokens = lexer::tokenize(pattern)?;
    let mut parser = Parser {
        pattern,
        tokens,
        pos: 0,
    };
    let op = parser.parse_pattern()?;
    if !parser.at_end() {
        return Err(parser.unexpected());
    }
    Ok(op)
}

struct Parser<'a> {
    pattern: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Syntax error at the current token (or at end of input).
    fn unexpected(&self) -> crate::error::Error {
        match self.tokens.get(self.pos) {
            Some(t) => lexer::span_error(self.pattern, t.start, t.end),
            None => {
                let n = self.pattern.len();
                lexer::span_error(self.pattern, n, n)
            }
        }
    }

    /// `expr (',' expr)*`
    fn parse_pattern(&mut self) -> Result<OpIr> {
        let first = self.parse_expr()?;
        if self.peek() != Some(&Tok::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&Tok::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(OpIr::Comma(exprs))
    }

    /// Absolute (`/`, `//`) or relative path.
    fn parse_expr(&mut self) -> Result<OpIr> {
        if self.eat(&Tok::Slash) {
            if self.path_ends_here() {
                return Ok(OpIr::Root(None));
            }
            let rel = self.parse_relative()?;
            return Ok(OpIr::Root(Some(Box::new(rel))));
        }
        if self.eat(&Tok::DoubleSlash) {
            let rel = self.parse_relative()?;
            return Ok(OpIr::All(Box::new(rel)));
        }
        self.parse_relative()
    }

    /// Whether the current position ends a path (so a bare `/` is the
    /// whole expression).
    fn path_ends_here(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(Tok::Comma) | Some(Tok::RBracket) | Some(Tok::RParen)
                | Some(Tok::Eq)
                | Some(Tok::Ne)
                | Some(Tok::Lt)
                | Some(Tok::Le)
                | Some(Tok::Gt)
                | Some(Tok::Ge)
        )
    }

    /// `step ( ('/'|'//') step )*`
    fn parse_relative(&mut self) -> Result<OpIr> {
        let first = self.parse_step_expr()?;
        let mut steps = Vec::new();
        loop {
            if self.eat(&Tok::Slash) {
                steps.push((SlashKind::Single, self.parse_step_expr()?));
            } else if self.eat(&Tok::DoubleSlash) {
                steps.push((SlashKind::Double, self.parse_step_expr()?));
            } else {
                break;
            }
        }
        if steps.is_empty() {
            Ok(first)
        } else {
            Ok(OpIr::Relative(Box::new(first), steps))
        }
    }

    /// A primary expression with optional `[...]` predicates.
    fn parse_step_expr(&mut self) -> Result<OpIr> {
        let primary = self.parse_primary()?;
        let mut predicates = Vec::new();
        while self.eat(&Tok::LBracket) {
            predicates.push(self.parse_predicate()?);
            if !self.eat(&Tok::RBracket) {
                return Err(self.unexpected());
            }
        }
        if predicates.is_empty() {
            Ok(primary)
        } else {
            Ok(OpIr::Filter(Box::new(primary), predicates))
        }
    }

    fn parse_primary(&mut self) -> Result<OpIr> {
        let token = match self.advance() {
            Some(t) => t,
            None => return Err(self.unexpected()),
        };
        match token.tok {
            Tok::At => match self.advance().map(|t| t.tok) {
                Some(Tok::Name(name)) => Ok(OpIr::Attrib(Box::new(OpIr::NameTest(name)))),
                Some(Tok::Star) => Ok(OpIr::Attrib(Box::new(OpIr::Wildcard))),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    Err(self.unexpected())
                }
            },
            Tok::Star => Ok(OpIr::Wildcard),
            Tok::Dot => Ok(OpIr::Dot),
            Tok::DotDot => Ok(OpIr::Parent),
            Tok::Number(n) => Ok(OpIr::Number(n)),
            Tok::Literal(s) => Ok(OpIr::Literal(s)),
            Tok::Name(name) => {
                if self.eat(&Tok::LParen) {
                    let mut args = Vec::new();
                    if self.peek() != Some(&Tok::RParen) {
                        args.push(self.parse_expr()?);
                        while self.eat(&Tok::Comma) {
                            args.push(self.parse_expr()?);
                        }
                    }
                    if !self.eat(&Tok::RParen) {
                        return Err(self.unexpected());
                    }
                    return Ok(match (name.as_str(), args.len()) {
                        ("text", 0) => OpIr::TextTest,
                        ("comment", 0) => OpIr::CommentTest,
                        _ => OpIr::Call(name, args),
                    });
                }
                if self.eat(&Tok::ColonColon) {
                    // Axis syntax is accepted but unsupported; the node
                    // test after it still has to parse.
                    self.parse_primary()?;
                    return Ok(OpIr::Unimplemented(format!("{}:: axis", name)));
                }
                Ok(OpIr::NameTest(name))
            }
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.unexpected())
            }
        }
    }

    /// `[` contents `]`: a number, an expression, or a comparison.
    fn parse_predicate(&mut self) -> Result<OpIr> {
        let left = self.parse_expr()?;
        let op = match self.peek() {
            Some(Tok::Eq) => Some(CompareOp::Eq),
            Some(Tok::Ne) => Some(CompareOp::Ne),
            Some(Tok::Lt) => Some(CompareOp::Lt),
            Some(Tok::Le) => Some(CompareOp::Le),
            Some(Tok::Gt) => Some(CompareOp::Gt),
            Some(Tok::Ge) => Some(CompareOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let right = self.parse_expr()?;
            return Ok(OpIr::Compare(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }
}
