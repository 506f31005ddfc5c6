//! The expression precedence ladder.
//!
//! Lowest to highest: `or`; `and`; `not`; comparison chains; `+ -`;
//! `* / %`; unary `+ -`; attribute/call/subscript postfix; atoms.

use crate::ast::{Arg, BinOp, CmpOp, Expr, ExprKind, FsSegment, UnaryOp};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::lexer::{StrSegment, Token, TokenKind};
use crate::parser::Parser;

impl Parser<'_> {
    pub(crate) fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::KwOr) {
            let rhs = self.parse_and()?;
            lhs = binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.parse_not()?;
        while self.eat(&TokenKind::KwAnd) {
            let rhs = self.parse_not()?;
            lhs = binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, Diagnostic> {
        if self.at(&TokenKind::KwNot) {
            let start = self.span();
            self.bump();
            let operand = self.parse_not()?;
            let span = start.cover(operand.span);
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            });
        }
        self.parse_comparison()
    }

    fn comparator(&self) -> Option<CmpOp> {
        Some(match self.kind() {
            TokenKind::EqEq => CmpOp::Eq,
            TokenKind::NotEq => CmpOp::Ne,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::LtEq => CmpOp::Le,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::GtEq => CmpOp::Ge,
            _ => return None,
        })
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let first = self.parse_arith()?;
        let Some(op) = self.comparator() else {
            return Ok(first);
        };
        self.bump();
        let mut span = first.span;
        let mut rest = Vec::new();
        let operand = self.parse_arith()?;
        span = span.cover(operand.span);
        rest.push((op, operand));
        while let Some(op) = self.comparator() {
            self.bump();
            let operand = self.parse_arith()?;
            span = span.cover(operand.span);
            rest.push((op, operand));
        }
        Ok(Expr {
            kind: ExprKind::Compare {
                first: Box::new(first),
                rest,
            },
            span,
        })
    }

    fn parse_arith(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = match self.kind() {
            TokenKind::Plus => UnaryOp::Pos,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        let start = self.span();
        self.bump();
        let operand = self.parse_unary()?;
        let span = start.cover(operand.span);
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.bump();
                    let (attr, attr_span) = self.expect_ident("attribute name")?;
                    let span = expr.span.cover(attr_span);
                    expr = Expr {
                        kind: ExprKind::Attribute {
                            obj: Box::new(expr),
                            attr,
                            attr_span,
                        },
                        span,
                    };
                }
                TokenKind::LParen => {
                    let args = self.parse_args()?;
                    let span = expr.span.cover(self.prev_span());
                    expr = Expr {
                        kind: ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    };
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.parse_index()?;
                    self.expect(TokenKind::RBracket, "`]`")?;
                    let span = expr.span.cover(self.prev_span());
                    expr = Expr {
                        kind: ExprKind::Subscript {
                            obj: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `expr`, `expr:expr`, `:expr`, `expr:`, or `:` between brackets.
    fn parse_index(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.span();
        let lo = if self.at(&TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        if !self.eat(&TokenKind::Colon) {
            return Ok(*lo.expect("either lo or a colon"));
        }
        let hi = if self.at(&TokenKind::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let span = start.cover(self.span());
        Ok(Expr {
            kind: ExprKind::Slice { lo, hi },
            span,
        })
    }

    /// `(a, b, name=c)`; named and positional arguments in any order, the
    /// analyzer enforces binding rules.
    pub(crate) fn parse_args(&mut self) -> Result<Vec<Arg>, Diagnostic> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut args = Vec::new();
        while !self.at(&TokenKind::RParen) {
            let start = self.span();
            let name = if matches!(self.kind(), TokenKind::Ident(_))
                && self.nth_kind(1) == &TokenKind::Assign
            {
                let (name, _) = self.expect_ident("argument name")?;
                self.bump(); // `=`
                Some(name)
            } else {
                None
            };
            let value = self.parse_expr()?;
            let span = start.cover(value.span);
            args.push(Arg { name, value, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(args)
    }

    fn parse_atom(&mut self) -> Result<Expr, Diagnostic> {
        let span = self.span();
        match self.kind().clone() {
            TokenKind::Int(value) => {
                self.bump();
                Ok(Expr {
                    kind: ExprKind::Int(value),
                    span,
                })
            }
            TokenKind::Float(value) => {
                self.bump();
                Ok(Expr {
                    kind: ExprKind::Float(value),
                    span,
                })
            }
            TokenKind::KwTrue => {
                self.bump();
                Ok(Expr {
                    kind: ExprKind::Bool(true),
                    span,
                })
            }
            TokenKind::KwFalse => {
                self.bump();
                Ok(Expr {
                    kind: ExprKind::Bool(false),
                    span,
                })
            }
            TokenKind::KwNone => {
                self.bump();
                Ok(Expr {
                    kind: ExprKind::NoneLit,
                    span,
                })
            }
            TokenKind::KwSelf => {
                self.bump();
                Ok(Expr {
                    kind: ExprKind::SelfRef,
                    span,
                })
            }
            TokenKind::Ident(name) => {
                self.bump();
                Ok(Expr {
                    kind: ExprKind::Ident(name),
                    span,
                })
            }
            TokenKind::Str(segments) => {
                self.bump();
                let parsed = self.parse_str_segments(segments, span)?;
                Ok(Expr {
                    kind: ExprKind::Str(parsed),
                    span,
                })
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LBrace => self.parse_map(),
            TokenKind::Bar => self.parse_score(),
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_list(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.span();
        self.bump(); // `[`
        let mut items = Vec::new();
        while !self.at(&TokenKind::RBracket) {
            items.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBracket, "`]`")?;
        Ok(Expr {
            kind: ExprKind::List(items),
            span: start.cover(self.prev_span()),
        })
    }

    fn parse_map(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.span();
        self.bump(); // `{`
        let mut entries = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            let key = self.parse_expr()?;
            self.expect(TokenKind::Colon, "`:`")?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(Expr {
            kind: ExprKind::Map(entries),
            span: start.cover(self.prev_span()),
        })
    }

    /// `|"selector": "objective"|`.
    fn parse_score(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.span();
        self.bump(); // `|`
        let selector = self.expect_plain_str("a selector string")?;
        self.expect(TokenKind::Colon, "`:`")?;
        let objective = self.expect_plain_str("an objective string")?;
        self.expect(TokenKind::Bar, "`|`")?;
        Ok(Expr {
            kind: ExprKind::Score {
                selector,
                objective,
            },
            span: start.cover(self.prev_span()),
        })
    }

    /// A string literal with no holes or fonts, flattened to text.
    pub(crate) fn expect_plain_str(&mut self, what: &str) -> Result<String, Diagnostic> {
        let TokenKind::Str(segments) = self.kind() else {
            return Err(self.unexpected(what));
        };
        let segments = segments.clone();
        let token = self.bump();
        let mut text = String::new();
        for segment in segments {
            match segment {
                StrSegment::Text(t) => text.push_str(&t),
                StrSegment::Expr(_) | StrSegment::Font(_) => {
                    return Err(self.error(DiagnosticKind::InvalidFexpr, token.span));
                }
            }
        }
        Ok(text)
    }

    fn parse_str_segments(
        &mut self,
        segments: Vec<StrSegment>,
        span: acacia_core::Span,
    ) -> Result<Vec<FsSegment>, Diagnostic> {
        let mut parsed = Vec::with_capacity(segments.len());
        for segment in segments {
            parsed.push(match segment {
                StrSegment::Text(t) => FsSegment::Text(t),
                StrSegment::Font(f) => FsSegment::Font(f),
                StrSegment::Expr(tokens) => {
                    let tokens: Vec<Token> = tokens;
                    let expr = Parser::parse_embedded_expr(self.source(), &tokens, span)?;
                    FsSegment::Expr(expr)
                }
            });
        }
        Ok(parsed)
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.cover(rhs.span);
    Expr {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    }
}
