//! Recursive-descent parser.
//!
//! The grammar lives in `grammar/` as `impl Parser` blocks: `expressions`
//! for the precedence ladder, `statements` for simple and block statements,
//! `definitions` for functions, entities, structs, and interfaces. This
//! module is the cursor: token access, `expect`/`eat`, and error plumbing.

mod grammar;

#[cfg(test)]
mod parser_tests;

use acacia_core::Span;

use crate::ast::Module;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::lexer::{Token, TokenKind};
use crate::source::SourceId;

/// Parse a whole source unit.
pub fn parse_module(source: SourceId, tokens: &[Token]) -> Result<Module, Diagnostic> {
    let mut parser = Parser::new(source, tokens);
    let mut body = Vec::new();
    while !parser.at(&TokenKind::Eof) {
        body.push(parser.parse_stmt()?);
    }
    Ok(Module { body })
}

pub(crate) struct Parser<'t> {
    source: SourceId,
    tokens: &'t [Token],
    pos: usize,
    eof: Token,
}

impl<'t> Parser<'t> {
    pub(crate) fn new(source: SourceId, tokens: &'t [Token]) -> Self {
        let eof_span = tokens
            .last()
            .map_or(Span::point(0, acacia_core::Pos::start()), |t| {
                Span::point(t.span.hi, t.span.end)
            });
        Self {
            source,
            tokens,
            pos: 0,
            eof: Token {
                kind: TokenKind::Eof,
                span: eof_span,
            },
        }
    }

    /// Parse an expression from an embedded token sequence (a string hole).
    /// The whole sequence must form exactly one expression.
    pub(crate) fn parse_embedded_expr(
        source: SourceId,
        tokens: &'t [Token],
        hole_span: Span,
    ) -> Result<crate::ast::Expr, Diagnostic> {
        let mut parser = Parser::new(source, tokens);
        if parser.at(&TokenKind::Eof) {
            return Err(Diagnostic::new(
                DiagnosticKind::InvalidFexpr,
                source,
                hole_span,
            ));
        }
        let expr = parser.parse_expr()?;
        if !parser.at(&TokenKind::Eof) {
            return Err(parser.unexpected("end of formatted expression"));
        }
        Ok(expr)
    }

    // ---- cursor -----------------------------------------------------------

    pub(crate) fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    pub(crate) fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    pub(crate) fn nth_kind(&self, lookahead: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + lookahead)
            .map_or(&self.eof.kind, |t| &t.kind)
    }

    pub(crate) fn span(&self) -> Span {
        self.current().span
    }

    /// Span of the most recently consumed token.
    pub(crate) fn prev_span(&self) -> Span {
        if self.pos == 0 {
            self.span()
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    pub(crate) fn bump(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn at(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, Diagnostic> {
        if self.at(&kind) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(what))
        }
    }

    pub(crate) fn expect_newline(&mut self) -> Result<(), Diagnostic> {
        self.expect(TokenKind::Newline, "end of line")?;
        Ok(())
    }

    pub(crate) fn expect_ident(&mut self, what: &str) -> Result<(String, Span), Diagnostic> {
        match self.kind() {
            TokenKind::Ident(_) => {
                let token = self.bump();
                let TokenKind::Ident(name) = token.kind else {
                    unreachable!("checked above");
                };
                Ok((name, token.span))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    pub(crate) fn unexpected(&self, expected: &str) -> Diagnostic {
        self.error(
            DiagnosticKind::UnexpectedToken {
                found: self.kind().describe(),
                expected: expected.to_string(),
            },
            self.span(),
        )
    }

    pub(crate) fn error(&self, kind: DiagnosticKind, span: Span) -> Diagnostic {
        Diagnostic::new(kind, self.source, span)
    }

    pub(crate) fn source(&self) -> SourceId {
        self.source
    }
}
