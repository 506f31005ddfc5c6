//! Simple and block statements.

use acacia_core::Span;

use crate::ast::{BinOp, Expr, ExprKind, Stmt, StmtKind};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::lexer::TokenKind;
use crate::parser::Parser;

impl Parser<'_> {
    pub(crate) fn parse_stmt(&mut self) -> Result<Stmt, Diagnostic> {
        match self.kind() {
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => self.parse_while(),
            TokenKind::KwFor => self.parse_for(),
            TokenKind::KwDef | TokenKind::KwInline => self.parse_func_stmt(),
            TokenKind::KwConst => {
                if self.nth_kind(1) == &TokenKind::KwDef {
                    self.parse_func_stmt()
                } else {
                    self.parse_const_decl()
                }
            }
            TokenKind::KwEntity => self.parse_entity(),
            TokenKind::KwStruct => self.parse_struct(),
            TokenKind::KwInterface => self.parse_interface(),
            TokenKind::KwImport => self.parse_import(),
            TokenKind::KwPass => {
                let span = self.span();
                self.bump();
                self.expect_newline()?;
                Ok(Stmt {
                    kind: StmtKind::Pass,
                    span,
                })
            }
            TokenKind::KwResult => {
                let start = self.span();
                self.bump();
                let value = self.parse_expr()?;
                let span = start.cover(value.span);
                self.expect_newline()?;
                Ok(Stmt {
                    kind: StmtKind::Result(value),
                    span,
                })
            }
            TokenKind::KwNew => {
                let start = self.span();
                self.bump();
                let args = self.parse_args()?;
                let span = start.cover(self.prev_span());
                self.expect_newline()?;
                Ok(Stmt {
                    kind: StmtKind::NewCall { args },
                    span,
                })
            }
            TokenKind::Command(_) => {
                let token = self.bump();
                let TokenKind::Command(segments) = token.kind else {
                    unreachable!("checked above");
                };
                self.expect_newline()?;
                Ok(Stmt {
                    kind: StmtKind::Command(segments),
                    span: token.span,
                })
            }
            TokenKind::Amp => self.parse_ref_decl(),
            _ => self.parse_expr_stmt(),
        }
    }

    /// Anything starting with an expression: plain expression statements,
    /// `=` chains, augmented assignment, and the two declaration forms.
    fn parse_expr_stmt(&mut self) -> Result<Stmt, Diagnostic> {
        let first = self.parse_expr()?;
        let start = first.span;

        let aug_op = match self.kind() {
            TokenKind::PlusAssign => Some(BinOp::Add),
            TokenKind::MinusAssign => Some(BinOp::Sub),
            TokenKind::StarAssign => Some(BinOp::Mul),
            TokenKind::SlashAssign => Some(BinOp::Div),
            TokenKind::PercentAssign => Some(BinOp::Mod),
            _ => None,
        };
        if let Some(op) = aug_op {
            self.check_assignable(&first)?;
            self.bump();
            let value = self.parse_expr()?;
            let span = start.cover(value.span);
            self.expect_newline()?;
            return Ok(Stmt {
                kind: StmtKind::AugAssign {
                    target: first,
                    op,
                    value,
                },
                span,
            });
        }

        match self.kind() {
            TokenKind::Walrus => {
                let (name, name_span) = self.ident_target(first)?;
                self.bump();
                let value = self.parse_expr()?;
                let span = name_span.cover(value.span);
                self.expect_newline()?;
                Ok(Stmt {
                    kind: StmtKind::Declare {
                        name,
                        name_span,
                        ty: None,
                        value,
                    },
                    span,
                })
            }
            TokenKind::Colon => {
                // `x: T = e`
                let (name, name_span) = self.ident_target(first)?;
                self.bump();
                let ty = self.parse_expr()?;
                self.expect(TokenKind::Assign, "`=`")?;
                let value = self.parse_expr()?;
                let span = name_span.cover(value.span);
                self.expect_newline()?;
                Ok(Stmt {
                    kind: StmtKind::Declare {
                        name,
                        name_span,
                        ty: Some(ty),
                        value,
                    },
                    span,
                })
            }
            TokenKind::Assign => {
                let mut exprs = vec![first];
                while self.eat(&TokenKind::Assign) {
                    exprs.push(self.parse_expr()?);
                }
                let value = exprs.pop().expect("at least the first expression");
                for target in &exprs {
                    self.check_assignable(target)?;
                }
                let span = start.cover(value.span);
                self.expect_newline()?;
                Ok(Stmt {
                    kind: StmtKind::Assign {
                        targets: exprs,
                        value,
                    },
                    span,
                })
            }
            _ => {
                self.expect_newline()?;
                Ok(Stmt {
                    kind: StmtKind::Expr(first),
                    span: start,
                })
            }
        }
    }

    fn parse_const_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.span();
        self.bump(); // `const`
        let (name, name_span) = self.expect_ident("a constant name")?;
        self.expect(TokenKind::Assign, "`=`")?;
        let value = self.parse_expr()?;
        let span = start.cover(value.span);
        self.expect_newline()?;
        Ok(Stmt {
            kind: StmtKind::ConstDecl {
                name,
                name_span,
                value,
            },
            span,
        })
    }

    fn parse_ref_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.span();
        self.bump(); // `&`
        let (name, name_span) = self.expect_ident("a reference name")?;
        self.expect(TokenKind::Assign, "`=`")?;
        let target = self.parse_expr()?;
        let span = start.cover(target.span);
        self.expect_newline()?;
        Ok(Stmt {
            kind: StmtKind::RefDecl {
                name,
                name_span,
                target,
            },
            span,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.span();
        self.bump(); // `if`
        let mut arms = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        arms.push((cond, body));
        let mut orelse = Vec::new();
        loop {
            if self.at(&TokenKind::KwElif) {
                self.bump();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                arms.push((cond, body));
            } else if self.at(&TokenKind::KwElse) {
                self.bump();
                orelse = self.parse_block()?;
                break;
            } else {
                break;
            }
        }
        let span = start.cover(self.prev_span());
        Ok(Stmt {
            kind: StmtKind::If { arms, orelse },
            span,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.span();
        self.bump(); // `while`
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        let span = start.cover(self.prev_span());
        Ok(Stmt {
            kind: StmtKind::While { cond, body },
            span,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.span();
        self.bump(); // `for`
        let (var, var_span) = self.expect_ident("a loop variable")?;
        self.expect(TokenKind::KwIn, "`in`")?;
        let iter = self.parse_expr()?;
        let body = self.parse_block()?;
        let span = start.cover(self.prev_span());
        Ok(Stmt {
            kind: StmtKind::For {
                var,
                var_span,
                iter,
                body,
            },
            span,
        })
    }

    fn parse_import(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.span();
        self.bump(); // `import`
        let (path, path_span) = self.parse_dotted_path()?;
        let span = start.cover(path_span);
        self.expect_newline()?;
        Ok(Stmt {
            kind: StmtKind::Import { path, path_span },
            span,
        })
    }

    pub(super) fn parse_dotted_path(&mut self) -> Result<(Vec<String>, Span), Diagnostic> {
        let (first, first_span) = self.expect_ident("a module path")?;
        let mut path = vec![first];
        let mut span = first_span;
        while self.eat(&TokenKind::Dot) {
            let (next, next_span) = self.expect_ident("a path segment")?;
            path.push(next);
            span = span.cover(next_span);
        }
        Ok((path, span))
    }

    /// `:` NEWLINE INDENT stmt+ DEDENT. A missing indented body is the
    /// empty-block error.
    pub(crate) fn parse_block(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        self.expect(TokenKind::Colon, "`:`")?;
        self.expect_newline()?;
        if !self.at(&TokenKind::Indent) {
            return Err(self.error(DiagnosticKind::EmptyBlock, self.span()));
        }
        self.bump();
        let mut body = Vec::new();
        while !self.at(&TokenKind::Dedent) && !self.at(&TokenKind::Eof) {
            body.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::Dedent, "dedent")?;
        Ok(body)
    }

    fn check_assignable(&self, target: &Expr) -> Result<(), Diagnostic> {
        if target.is_assignable() {
            Ok(())
        } else {
            Err(self.error(DiagnosticKind::InvalidAssignTarget, target.span))
        }
    }

    fn ident_target(&self, expr: Expr) -> Result<(String, Span), Diagnostic> {
        match expr.kind {
            ExprKind::Ident(name) => Ok((name, expr.span)),
            _ => Err(self.error(DiagnosticKind::InvalidAssignTarget, expr.span)),
        }
    }
}
