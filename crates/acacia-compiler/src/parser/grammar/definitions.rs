//! Function, entity, struct, and interface definitions.

use crate::ast::{
    EntityDef, FieldDecl, FuncDef, FuncFlavor, MethodQualifier, Param, ParamPort, Stmt, StmtKind,
    StructDef,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::lexer::TokenKind;
use crate::parser::Parser;

impl Parser<'_> {
    /// `def` / `inline def` / `const def` at statement level.
    pub(super) fn parse_func_stmt(&mut self) -> Result<Stmt, Diagnostic> {
        let func = self.parse_func(MethodQualifier::None)?;
        let span = func.span;
        Ok(Stmt {
            kind: StmtKind::FuncDef(func),
            span,
        })
    }

    pub(super) fn parse_func(&mut self, qualifier: MethodQualifier) -> Result<FuncDef, Diagnostic> {
        let start = self.span();
        let flavor = if self.eat(&TokenKind::KwInline) {
            FuncFlavor::Inline
        } else if self.eat(&TokenKind::KwConst) {
            FuncFlavor::Compile
        } else {
            FuncFlavor::Runtime
        };
        self.expect(TokenKind::KwDef, "`def`")?;
        let (name, name_span) = if self.at(&TokenKind::KwNew) {
            // The constructor is spelled `def new(...)`.
            let token = self.bump();
            ("new".to_string(), token.span)
        } else {
            self.expect_ident("a function name")?
        };
        let params = self.parse_params()?;
        let result_ty = if self.eat(&TokenKind::Arrow) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        let span = start.cover(self.prev_span());
        Ok(FuncDef {
            name,
            name_span,
            flavor,
            qualifier,
            params,
            result_ty,
            body,
            span,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, Diagnostic> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        let mut seen_default = false;
        while !self.at(&TokenKind::RParen) {
            let start = self.span();
            let port = if self.eat(&TokenKind::Amp) {
                ParamPort::ByRef
            } else if self.eat(&TokenKind::KwConst) {
                ParamPort::Const
            } else {
                ParamPort::ByValue
            };
            let (name, _) = self.expect_ident("a parameter name")?;
            let ty = if self.eat(&TokenKind::Colon) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let default = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            if default.is_some() {
                seen_default = true;
            } else if seen_default {
                return Err(self.error(
                    DiagnosticKind::NonDefaultAfterDefault,
                    start.cover(self.prev_span()),
                ));
            }
            let span = start.cover(self.prev_span());
            params.push(Param {
                name,
                port,
                ty,
                default,
                span,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(params)
    }

    /// `entity Name(Base, ...) of "minecraft:ty" at expr:` with a body of
    /// field declarations and method definitions.
    pub(super) fn parse_entity(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.span();
        self.bump(); // `entity`
        let (name, name_span) = self.expect_ident("a template name")?;

        let mut bases = Vec::new();
        if self.eat(&TokenKind::LParen) {
            while !self.at(&TokenKind::RParen) {
                bases.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "`)`")?;
        }

        let entity_type = if self.eat(&TokenKind::KwOf) {
            Some(self.expect_plain_str("an entity type string")?)
        } else {
            None
        };
        let spawn_at = if self.eat(&TokenKind::KwAt) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        self.expect(TokenKind::Colon, "`:`")?;
        self.expect_newline()?;
        if !self.at(&TokenKind::Indent) {
            return Err(self.error(DiagnosticKind::EmptyBlock, self.span()));
        }
        self.bump();

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.at(&TokenKind::Dedent) && !self.at(&TokenKind::Eof) {
            match self.kind() {
                TokenKind::KwPass => {
                    self.bump();
                    self.expect_newline()?;
                }
                TokenKind::KwDef | TokenKind::KwInline | TokenKind::KwConst => {
                    methods.push(self.parse_func(MethodQualifier::None)?);
                }
                TokenKind::KwVirtual => {
                    self.bump();
                    methods.push(self.parse_func(MethodQualifier::Virtual)?);
                }
                TokenKind::KwOverride => {
                    self.bump();
                    methods.push(self.parse_func(MethodQualifier::Override)?);
                }
                TokenKind::KwStatic => {
                    self.bump();
                    methods.push(self.parse_func(MethodQualifier::Static)?);
                }
                TokenKind::Ident(_) => {
                    fields.push(self.parse_field_decl()?);
                }
                _ => return Err(self.unexpected("a field or method definition")),
            }
        }
        self.expect(TokenKind::Dedent, "dedent")?;

        let span = start.cover(self.prev_span());
        Ok(Stmt {
            kind: StmtKind::EntityDef(EntityDef {
                name,
                name_span,
                bases,
                entity_type,
                spawn_at,
                fields,
                methods,
                span,
            }),
            span,
        })
    }

    fn parse_field_decl(&mut self) -> Result<FieldDecl, Diagnostic> {
        let (name, name_span) = self.expect_ident("a field name")?;
        self.expect(TokenKind::Colon, "`:`")?;
        let ty = self.parse_expr()?;
        self.expect_newline()?;
        Ok(FieldDecl {
            name,
            name_span,
            ty,
        })
    }

    pub(super) fn parse_struct(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.span();
        self.bump(); // `struct`
        let (name, name_span) = self.expect_ident("a struct name")?;
        self.expect(TokenKind::Colon, "`:`")?;
        self.expect_newline()?;
        if !self.at(&TokenKind::Indent) {
            return Err(self.error(DiagnosticKind::EmptyBlock, self.span()));
        }
        self.bump();

        let mut fields = Vec::new();
        while !self.at(&TokenKind::Dedent) && !self.at(&TokenKind::Eof) {
            match self.kind() {
                TokenKind::KwPass => {
                    self.bump();
                    self.expect_newline()?;
                }
                TokenKind::Ident(_) => fields.push(self.parse_field_decl()?),
                _ => return Err(self.unexpected("a field declaration")),
            }
        }
        self.expect(TokenKind::Dedent, "dedent")?;

        let span = start.cover(self.prev_span());
        Ok(Stmt {
            kind: StmtKind::StructDef(StructDef {
                name,
                name_span,
                fields,
                span,
            }),
            span,
        })
    }

    /// `interface a.b:` compiles its block into `a/b.mcfunction`.
    pub(super) fn parse_interface(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.span();
        self.bump(); // `interface`
        let (path, path_span) = self.parse_dotted_path()?;
        let body = self.parse_block()?;
        let span = start.cover(self.prev_span());
        Ok(Stmt {
            kind: StmtKind::InterfaceDef {
                path,
                path_span,
                body,
            },
            span,
        })
    }
}
