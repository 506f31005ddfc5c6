//! Statement analysis and lowering.

use acacia_core::Span;

use crate::ast::{BinOp, Expr, ExprKind, FuncFlavor, Stmt, StmtKind};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::ir::{Op, ScoreOpKind, Selector};
use crate::lexer::CmdSegment;
use crate::value::Value;

use super::{Analyzer, Binding, BoolPlace, RtBool, RtPlace, RtValue, ScopeKind, Typed};

/// Short label for `--debug-comments`; statements with no runtime footprint
/// stay unlabeled.
fn stmt_label(kind: &StmtKind) -> Option<&'static str> {
    Some(match kind {
        StmtKind::Expr(_) => "expression",
        StmtKind::Assign { .. } => "assignment",
        StmtKind::AugAssign { .. } => "augmented assignment",
        StmtKind::Declare { .. } => "declaration",
        StmtKind::If { .. } => "if",
        StmtKind::While { .. } => "while",
        StmtKind::For { .. } => "for",
        StmtKind::Command(_) => "command",
        StmtKind::Result(_) => "result",
        StmtKind::NewCall { .. } => "new",
        _ => return None,
    })
}

impl Analyzer {
    pub(crate) fn analyze_block(&mut self, stmts: &[Stmt]) -> Result<(), Diagnostic> {
        for stmt in stmts {
            self.analyze_stmt(stmt)?;
        }
        Ok(())
    }

    pub(crate) fn analyze_stmt(&mut self, stmt: &Stmt) -> Result<(), Diagnostic> {
        if self.config.debug_comments
            && !self.in_compile_context()
            && let Some(label) = stmt_label(&stmt.kind)
        {
            let line = stmt.span.start.line;
            self.emit(Op::Comment(format!("{label} (line {line})")));
        }
        match &stmt.kind {
            StmtKind::Pass => Ok(()),
            StmtKind::Expr(expr) => {
                self.analyze_expr(expr)?;
                Ok(())
            }
            StmtKind::Declare {
                name,
                name_span,
                ty,
                value,
            } => self.analyze_declare(name, *name_span, ty.as_ref(), value),
            StmtKind::ConstDecl {
                name,
                name_span,
                value,
            } => {
                let typed = self.analyze_expr(value)?;
                let constant = self.expect_const(typed, value)?;
                self.declare(name, Binding::Const(constant), *name_span)
            }
            StmtKind::RefDecl {
                name,
                name_span,
                target,
            } => {
                let place = self.resolve_place(target)?;
                let ty = self.place_type(&place);
                self.declare(name, Binding::Ref { ty, place }, *name_span)
            }
            StmtKind::Assign { targets, value } => {
                let typed = self.analyze_expr(value)?;
                for target in targets {
                    self.assign_to(target, typed.clone())?;
                }
                Ok(())
            }
            StmtKind::AugAssign { target, op, value } => self.analyze_aug_assign(target, *op, value),
            StmtKind::If { arms, orelse } => self.analyze_if(arms, orelse),
            StmtKind::While { cond, body } => self.analyze_while(cond, body, stmt.span),
            StmtKind::For {
                var,
                var_span,
                iter,
                body,
            } => self.analyze_for(var, *var_span, iter, body),
            StmtKind::FuncDef(def) => {
                let fid = self.register_function(def, None)?;
                self.declare(&def.name, Binding::Const(Value::Function(fid)), def.name_span)
            }
            StmtKind::EntityDef(def) => self.register_entity(def),
            StmtKind::StructDef(def) => self.register_struct(def),
            StmtKind::InterfaceDef {
                path,
                path_span,
                body,
            } => self.analyze_interface(path, *path_span, body),
            StmtKind::Import { path, path_span } => {
                let module = self.load_module(path, *path_span)?;
                let name = path.last().expect("import path never empty").clone();
                self.declare(&name, Binding::Const(Value::Module(module)), *path_span)
            }
            StmtKind::Command(segments) => self.analyze_command(segments, stmt.span),
            StmtKind::Result(expr) => self.analyze_result(expr, stmt.span),
            StmtKind::NewCall { args } => self.analyze_new_call(args, stmt.span),
        }
    }

    // ---- declarations -----------------------------------------------------

    fn analyze_declare(
        &mut self,
        name: &str,
        name_span: Span,
        ty: Option<&Expr>,
        value: &Expr,
    ) -> Result<(), Diagnostic> {
        let typed = self.analyze_expr(value)?;
        let declared = match ty {
            Some(ty_expr) => {
                let declared = self.resolve_type(ty_expr)?;
                let found = self.typed_type(&typed);
                if !declared.accepts(&found) {
                    return Err(self.err(
                        DiagnosticKind::WrongAssignType {
                            expected: declared.to_string(),
                            found: found.to_string(),
                        },
                        value.span,
                    ));
                }
                declared
            }
            None => self.typed_type(&typed),
        };
        let binding = self.make_binding(declared, typed, value.span)?;
        self.declare(name, binding, name_span)
    }

    /// Build the binding for a fresh declaration: runtime storage when the
    /// type has a runtime form and the context allows it, a compile-time
    /// variable otherwise.
    fn make_binding(
        &mut self,
        ty: crate::types::Type,
        typed: Typed,
        span: Span,
    ) -> Result<Binding, Diagnostic> {
        if !self.in_compile_context() && ty.has_runtime_form() {
            let place = self.alloc_place(&ty, span)?;
            self.store(&place, typed, span, self.at_top_level())?;
            return Ok(Binding::Rt { ty, place });
        }
        match typed {
            Typed::Const(value) => Ok(Binding::CtVar(value)),
            Typed::Rt(_) => Err(self.err(
                DiagnosticKind::RuntimeInConstContext("a compile-time declaration".to_string()),
                span,
            )),
        }
    }

    /// Allocate storage for a runtime variable of the given type.
    pub(crate) fn alloc_place(
        &mut self,
        ty: &crate::types::Type,
        span: Span,
    ) -> Result<RtPlace, Diagnostic> {
        use crate::types::Type;
        match ty {
            Type::Int => Ok(RtPlace::Int(self.alloc_slot())),
            Type::Bool => Ok(RtPlace::Bool(BoolPlace::Score(self.alloc_slot()))),
            Type::Entity { template, .. } => {
                let tag = self.alloc_tag("v");
                Ok(RtPlace::Entity {
                    template: *template,
                    tag,
                })
            }
            Type::Engroup { template, .. } => {
                let tag = self.alloc_tag("g");
                Ok(RtPlace::Group {
                    template: *template,
                    tag,
                })
            }
            Type::Struct { id, name } => {
                let field_types: Vec<(String, Type)> = self.structs[id.index()]
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let mut fields = indexmap::IndexMap::new();
                for (field, field_ty) in field_types {
                    fields.insert(field.clone(), self.alloc_place(&field_ty, span)?);
                }
                Ok(RtPlace::Struct {
                    id: *id,
                    name: name.clone(),
                    fields,
                })
            }
            other => Err(self.err(DiagnosticKind::NonRtName(other.to_string()), span)),
        }
    }

    /// Write a value into a place. Constant writes route to the init file
    /// when `init_route` holds (module top level); runtime writes always go
    /// to the active sink.
    pub(crate) fn store(
        &mut self,
        place: &RtPlace,
        value: Typed,
        span: Span,
        init_route: bool,
    ) -> Result<(), Diagnostic> {
        let mismatch = |a: &Analyzer, found: &Typed| {
            a.err(
                DiagnosticKind::WrongAssignType {
                    expected: a.place_type(place).to_string(),
                    found: a.typed_type(found).to_string(),
                },
                span,
            )
        };
        match (place, value) {
            (RtPlace::Int(target), Typed::Const(Value::Int(v))) => {
                let op = Op::SetConst {
                    target: target.clone(),
                    value: v,
                };
                if init_route {
                    self.emit_init(op);
                } else {
                    self.emit(op);
                }
            }
            (RtPlace::Int(target), Typed::Rt(RtValue::Int(source))) => {
                self.emit(Op::ScoreOp {
                    op: ScoreOpKind::Assign,
                    target: target.clone(),
                    source,
                });
            }
            (RtPlace::Bool(BoolPlace::Score(target)), Typed::Const(Value::Bool(v))) => {
                let op = Op::SetConst {
                    target: target.clone(),
                    value: i32::from(v),
                };
                if init_route {
                    self.emit_init(op);
                } else {
                    self.emit(op);
                }
            }
            (RtPlace::Bool(BoolPlace::Score(target)), Typed::Rt(RtValue::Bool(value))) => {
                match value {
                    RtBool::Score(source) => self.emit(Op::ScoreOp {
                        op: ScoreOpKind::Assign,
                        target: target.clone(),
                        source,
                    }),
                    RtBool::Conds(conds) => {
                        self.emit(Op::SetConst {
                            target: target.clone(),
                            value: 0,
                        });
                        self.emit(Op::Guarded {
                            conds,
                            body: vec![Op::SetConst {
                                target: target.clone(),
                                value: 1,
                            }],
                        });
                    }
                }
            }
            (RtPlace::Bool(BoolPlace::Tag { owner, tag }), Typed::Const(Value::Bool(v))) => {
                let op = if v {
                    Op::TagAdd {
                        target: owner.clone(),
                        tag: *tag,
                    }
                } else {
                    Op::TagRemove {
                        target: owner.clone(),
                        tag: *tag,
                    }
                };
                if init_route {
                    self.emit_init(op);
                } else {
                    self.emit(op);
                }
            }
            (RtPlace::Bool(BoolPlace::Tag { owner, tag }), Typed::Rt(RtValue::Bool(value))) => {
                let conds = self.bool_conds(value);
                self.emit(Op::TagRemove {
                    target: owner.clone(),
                    tag: *tag,
                });
                self.emit(Op::Guarded {
                    conds,
                    body: vec![Op::TagAdd {
                        target: owner.clone(),
                        tag: *tag,
                    }],
                });
            }
            (RtPlace::Entity { template, tag }, Typed::Rt(RtValue::Entity { template: src, sel })) => {
                if !self.templates[src.index()].mro.contains(template) {
                    let found = Typed::Rt(RtValue::Entity { template: src, sel });
                    return Err(mismatch(self, &found));
                }
                self.emit(Op::TagRemove {
                    target: Selector::all_tagged(*tag),
                    tag: *tag,
                });
                self.emit(Op::TagAdd { target: sel, tag: *tag });
            }
            (RtPlace::Group { tag, .. }, Typed::Rt(RtValue::Group { tag: src, .. })) => {
                self.emit(Op::TagRemove {
                    target: Selector::all_tagged(*tag),
                    tag: *tag,
                });
                self.emit(Op::TagAdd {
                    target: Selector::all_tagged(src),
                    tag: *tag,
                });
            }
            (RtPlace::Struct { fields, .. }, Typed::Const(Value::Struct { fields: values, .. })) => {
                let pairs: Vec<(RtPlace, Value)> = fields
                    .iter()
                    .filter_map(|(name, place)| {
                        values.get(name).map(|v| (place.clone(), v.clone()))
                    })
                    .collect();
                for (field_place, field_value) in pairs {
                    self.store(&field_place, Typed::Const(field_value), span, init_route)?;
                }
            }
            (RtPlace::Struct { fields, .. }, Typed::Rt(RtValue::Struct { fields: values, .. })) => {
                let pairs: Vec<(RtPlace, RtValue)> = fields
                    .iter()
                    .filter_map(|(name, place)| {
                        values.get(name).map(|v| (place.clone(), v.clone()))
                    })
                    .collect();
                for (field_place, field_value) in pairs {
                    self.store(&field_place, Typed::Rt(field_value), span, init_route)?;
                }
            }
            (_, found) => return Err(mismatch(self, &found)),
        }
        Ok(())
    }

    /// Pick the diagnostic for a non-constant value in a constant position.
    pub(crate) fn expect_const(&self, typed: Typed, expr: &Expr) -> Result<Value, Diagnostic> {
        match typed {
            Typed::Const(value) => Ok(value),
            Typed::Rt(_) => Err(match &expr.kind {
                ExprKind::Ident(name) => {
                    self.err(DiagnosticKind::NotConstName(name.clone()), expr.span)
                }
                ExprKind::Attribute { attr, .. } => {
                    self.err(DiagnosticKind::NotConstAttr(attr.clone()), expr.span)
                }
                _ => self.err(
                    DiagnosticKind::RuntimeInConstContext("a constant initializer".to_string()),
                    expr.span,
                ),
            }),
        }
    }

    // ---- assignment -------------------------------------------------------

    fn assign_to(&mut self, target: &Expr, value: Typed) -> Result<(), Diagnostic> {
        match &target.kind {
            ExprKind::Ident(name) => self.assign_name(name, target.span, value),
            ExprKind::Attribute { .. } | ExprKind::Score { .. } => {
                let place = self.resolve_place(target)?;
                let ty = self.place_type(&place);
                let found = self.typed_type(&value);
                if !ty.accepts(&found) {
                    return Err(self.err(
                        DiagnosticKind::WrongAssignType {
                            expected: ty.to_string(),
                            found: found.to_string(),
                        },
                        target.span,
                    ));
                }
                self.store(&place, value, target.span, false)
            }
            ExprKind::Subscript { obj, index } => self.assign_subscript(obj, index, target, value),
            _ => Err(self.err(DiagnosticKind::InvalidAssignTarget, target.span)),
        }
    }

    fn assign_name(&mut self, name: &str, span: Span, value: Typed) -> Result<(), Diagnostic> {
        let Some((idx, crossed)) = self.lookup_idx(name) else {
            // First assignment doubles as declaration.
            let ty = self.typed_type(&value);
            let binding = self.make_binding(ty, value, span)?;
            return self.declare(name, binding, span);
        };
        let binding = self.scopes[idx]
            .bindings
            .get(name)
            .expect("looked up above")
            .clone();
        match binding {
            Binding::Rt { ty, place } | Binding::Ref { ty, place } => {
                if crossed {
                    return Err(self.err(DiagnosticKind::NotConstName(name.to_string()), span));
                }
                let found = self.typed_type(&value);
                if !ty.accepts(&found) {
                    return Err(self.err(
                        DiagnosticKind::WrongAssignType {
                            expected: ty.to_string(),
                            found: found.to_string(),
                        },
                        span,
                    ));
                }
                self.store(&place, value, span, false)
            }
            Binding::CtVar(old) => {
                let found = self.typed_type(&value);
                let Typed::Const(new) = value else {
                    return Err(self.err(
                        DiagnosticKind::WrongAssignType {
                            expected: old.type_of().to_string(),
                            found: found.to_string(),
                        },
                        span,
                    ));
                };
                if !old.type_of().accepts(&found) {
                    return Err(self.err(
                        DiagnosticKind::WrongAssignType {
                            expected: old.type_of().to_string(),
                            found: found.to_string(),
                        },
                        span,
                    ));
                }
                self.scopes[idx]
                    .bindings
                    .insert(name.to_string(), Binding::CtVar(new));
                Ok(())
            }
            Binding::Const(_) => {
                Err(self.err(DiagnosticKind::AssignToConst(name.to_string()), span))
            }
        }
    }

    /// `l[i] = v` / `m[k] = v` on compile-time containers.
    fn assign_subscript(
        &mut self,
        obj: &Expr,
        index: &Expr,
        target: &Expr,
        value: Typed,
    ) -> Result<(), Diagnostic> {
        let ExprKind::Ident(name) = &obj.kind else {
            return Err(self.err(DiagnosticKind::InvalidAssignTarget, target.span));
        };
        let Some((idx, _)) = self.lookup_idx(name) else {
            return Err(self.err(DiagnosticKind::NameNotDefined(name.clone()), obj.span));
        };
        let Binding::CtVar(container) = self.scopes[idx]
            .bindings
            .get(name)
            .expect("looked up above")
            .clone()
        else {
            return Err(self.err(DiagnosticKind::InvalidAssignTarget, target.span));
        };
        let index_typed = self.analyze_expr(index)?;
        let index_value = self.expect_const(index_typed, index)?;
        let new_value = self.expect_const(value, target)?;

        let updated = match container {
            Value::List(mut items) => {
                let Value::Int(raw) = index_value else {
                    return Err(self.err(
                        DiagnosticKind::NoGetitem(index_value.type_of().to_string()),
                        index.span,
                    ));
                };
                let len = items.len();
                let resolved = if raw < 0 {
                    (len as i64 + i64::from(raw)).try_into().ok()
                } else {
                    usize::try_from(raw).ok().filter(|i| *i < len)
                };
                let Some(i) = resolved.filter(|i: &usize| *i < len) else {
                    return Err(self.err(
                        DiagnosticKind::ListIndexOutOfBounds {
                            len,
                            index: i64::from(raw),
                        },
                        index.span,
                    ));
                };
                items[i] = new_value;
                Value::List(items)
            }
            Value::Map(mut entries) => {
                let key = crate::value::MapKey::from_value(&index_value).ok_or_else(|| {
                    self.err(
                        DiagnosticKind::InvalidMapKey(index_value.type_of().to_string()),
                        index.span,
                    )
                })?;
                entries.insert(key, new_value);
                Value::Map(entries)
            }
            other => {
                return Err(self.err(
                    DiagnosticKind::NoGetitem(other.type_of().to_string()),
                    obj.span,
                ));
            }
        };
        self.scopes[idx]
            .bindings
            .insert(name.clone(), Binding::CtVar(updated));
        Ok(())
    }

    fn analyze_aug_assign(
        &mut self,
        target: &Expr,
        op: BinOp,
        value: &Expr,
    ) -> Result<(), Diagnostic> {
        // Compile-time variables fold in place.
        if let ExprKind::Ident(name) = &target.kind
            && let Some((idx, _)) = self.lookup_idx(name)
        {
            let ct_value = match self.scopes[idx].bindings.get(name) {
                Some(Binding::CtVar(old)) => Some(old.clone()),
                _ => None,
            };
            if let Some(old) = ct_value {
                let rhs_typed = self.analyze_expr(value)?;
                let rhs = self.expect_const(rhs_typed, value)?;
                let new = crate::value::const_binary(op, &old, &rhs)
                    .map_err(|kind| self.err(kind, target.span.cover(value.span)))?;
                self.scopes[idx]
                    .bindings
                    .insert(name.clone(), Binding::CtVar(new));
                return Ok(());
            }
        }

        let place = self.resolve_place(target)?;
        let RtPlace::Int(score) = place else {
            return Err(self.err(
                DiagnosticKind::InvalidOperand {
                    op: format!("{}=", op.symbol()),
                    operands: format!("`{}`", self.place_type(&place)),
                },
                target.span,
            ));
        };
        let rhs = self.analyze_expr(value)?;
        self.apply_int_op(op, score, rhs, value.span)
    }

    /// `target <op>= rhs` on a score.
    pub(crate) fn apply_int_op(
        &mut self,
        op: BinOp,
        target: crate::ir::ScoreRef,
        rhs: Typed,
        span: Span,
    ) -> Result<(), Diagnostic> {
        let score_op = match op {
            BinOp::Add => ScoreOpKind::Add,
            BinOp::Sub => ScoreOpKind::Sub,
            BinOp::Mul => ScoreOpKind::Mul,
            BinOp::Div => ScoreOpKind::Div,
            BinOp::Mod => ScoreOpKind::Mod,
            BinOp::And | BinOp::Or => {
                return Err(self.err(
                    DiagnosticKind::InvalidOperand {
                        op: op.symbol().to_string(),
                        operands: "`int`".to_string(),
                    },
                    span,
                ));
            }
        };
        match rhs {
            Typed::Const(Value::Int(v)) => match op {
                BinOp::Add => self.emit(Op::AddConst { target, value: v }),
                BinOp::Sub => self.emit(Op::SubConst { target, value: v }),
                _ => {
                    let source = self.const_slot(v);
                    self.emit(Op::ScoreOp {
                        op: score_op,
                        target,
                        source,
                    });
                }
            },
            Typed::Rt(RtValue::Int(source)) => {
                self.emit(Op::ScoreOp {
                    op: score_op,
                    target,
                    source,
                });
            }
            other => {
                return Err(self.err(
                    DiagnosticKind::InvalidOperand {
                        op: op.symbol().to_string(),
                        operands: format!("`int` and `{}`", self.typed_type(&other)),
                    },
                    span,
                ));
            }
        }
        Ok(())
    }

    // ---- control flow -----------------------------------------------------

    fn analyze_if(
        &mut self,
        arms: &[(Expr, Vec<Stmt>)],
        orelse: &[Stmt],
    ) -> Result<(), Diagnostic> {
        // A chain of materialized condition scores; arm N runs when its own
        // score is 1 and all earlier scores are 0. Conditions are frozen
        // before any body runs so bodies cannot re-trigger later arms.
        let mut flags: Vec<crate::ir::ScoreRef> = Vec::new();
        let mut decided = false;

        for (cond, body) in arms {
            if decided {
                break;
            }
            let typed = self.analyze_expr(cond)?;
            match typed {
                Typed::Const(Value::Bool(true)) => {
                    // Only the selected branch is analyzed and emitted.
                    self.analyze_nested_block(body)?;
                    decided = true;
                }
                Typed::Const(Value::Bool(false)) => {}
                Typed::Const(other) => {
                    return Err(self.err(
                        DiagnosticKind::WrongIfCondition(other.type_of().to_string()),
                        cond.span,
                    ));
                }
                Typed::Rt(RtValue::Bool(value)) => {
                    let flag = self.materialize_bool(value);
                    let mut conds: Vec<crate::ir::Cond> = flags
                        .iter()
                        .map(|f| crate::ir::Cond::is_true(f.clone()).negate())
                        .collect();
                    conds.push(crate::ir::Cond::is_true(flag.clone()));
                    flags.push(flag);
                    let ((), ops) = self.with_sink(|a| a.analyze_nested_block(body))?;
                    self.emit(Op::Guarded { conds, body: ops });
                }
                Typed::Rt(other) => {
                    return Err(self.err(
                        DiagnosticKind::WrongIfCondition(self.rt_type(&other).to_string()),
                        cond.span,
                    ));
                }
            }
        }

        if !decided && !orelse.is_empty() {
            if flags.is_empty() {
                // Every runtime arm folded away false.
                self.analyze_nested_block(orelse)?;
            } else {
                let conds: Vec<crate::ir::Cond> = flags
                    .iter()
                    .map(|f| crate::ir::Cond::is_true(f.clone()).negate())
                    .collect();
                let ((), ops) = self.with_sink(|a| a.analyze_nested_block(orelse))?;
                self.emit(Op::Guarded { conds, body: ops });
            }
        }
        Ok(())
    }

    fn analyze_while(
        &mut self,
        cond: &Expr,
        body: &[Stmt],
        span: Span,
    ) -> Result<(), Diagnostic> {
        if self.in_compile_context() {
            return self.analyze_const_while(cond, body, span);
        }

        // Evaluate the condition once in the current sink to decide entry;
        // the loop file re-evaluates it after each body run and calls
        // itself while it still holds.
        let (flag, cond_ops) = {
            let (typed, ops) = self.with_sink(|a| a.analyze_expr(cond))?;
            match typed {
                Typed::Const(Value::Bool(true)) => {
                    return Err(self.err(DiagnosticKind::EndlessWhileLoop, cond.span));
                }
                Typed::Const(Value::Bool(false)) => return Ok(()),
                Typed::Const(other) => {
                    return Err(self.err(
                        DiagnosticKind::WrongWhileCondition(other.type_of().to_string()),
                        cond.span,
                    ));
                }
                Typed::Rt(RtValue::Bool(value)) => {
                    for op in &ops {
                        self.emit(op.clone());
                    }
                    let mut cond_ops = ops;
                    let flag = {
                        // Materialize inside a throwaway sink to capture the
                        // materialization ops for the loop file as well.
                        let (flag, mat_ops) =
                            self.with_sink(|a| Ok(a.materialize_bool(value.clone())))?;
                        for op in &mat_ops {
                            self.emit(op.clone());
                        }
                        cond_ops.extend(mat_ops);
                        flag
                    };
                    (flag, cond_ops)
                }
                Typed::Rt(other) => {
                    return Err(self.err(
                        DiagnosticKind::WrongWhileCondition(self.rt_type(&other).to_string()),
                        cond.span,
                    ));
                }
            }
        };

        let path = self.internal_path("while");
        let ((), mut loop_ops) = self.with_sink(|a| a.analyze_nested_block(body))?;
        loop_ops.extend(cond_ops);
        loop_ops.push(Op::Guarded {
            conds: vec![crate::ir::Cond::is_true(flag.clone())],
            body: vec![Op::Call(path.clone())],
        });
        self.files.insert(path.clone(), loop_ops);
        self.emit(Op::Guarded {
            conds: vec![crate::ir::Cond::is_true(flag)],
            body: vec![Op::Call(path)],
        });
        Ok(())
    }

    /// `while` inside a compile-time function: iterate the evaluator.
    fn analyze_const_while(
        &mut self,
        cond: &Expr,
        body: &[Stmt],
        span: Span,
    ) -> Result<(), Diagnostic> {
        const FUEL: u32 = 100_000;
        let mut fuel = FUEL;
        loop {
            let typed = self.analyze_expr(cond)?;
            let value = self.expect_const(typed, cond)?;
            match value {
                Value::Bool(false) => return Ok(()),
                Value::Bool(true) => {}
                other => {
                    return Err(self.err(
                        DiagnosticKind::WrongWhileCondition(other.type_of().to_string()),
                        cond.span,
                    ));
                }
            }
            if fuel == 0 {
                return Err(self.err(DiagnosticKind::EndlessWhileLoop, span));
            }
            fuel -= 1;
            self.analyze_nested_block(body)?;
        }
    }

    fn analyze_for(
        &mut self,
        var: &str,
        var_span: Span,
        iter: &Expr,
        body: &[Stmt],
    ) -> Result<(), Diagnostic> {
        let typed = self.analyze_expr(iter)?;
        let Typed::Const(value) = typed else {
            return Err(self.err(
                DiagnosticKind::NotIterable(self.typed_type(&typed).to_string()),
                iter.span,
            ));
        };
        let elements: Vec<Value> = match value {
            Value::List(items) => items,
            Value::Map(entries) => entries.keys().map(|k| k.to_value()).collect(),
            other => {
                return Err(self.err(
                    DiagnosticKind::NotIterable(other.type_of().to_string()),
                    iter.span,
                ));
            }
        };
        // The body is re-analyzed once per element, with the loop variable
        // bound to that element as a constant.
        for element in elements {
            self.push_scope(ScopeKind::Block);
            self.declare(var, Binding::Const(element), var_span)?;
            let result = self.analyze_block(body);
            self.pop_scope();
            result?;
        }
        Ok(())
    }

    pub(crate) fn analyze_nested_block(&mut self, body: &[Stmt]) -> Result<(), Diagnostic> {
        self.push_scope(ScopeKind::Block);
        let result = self.analyze_block(body);
        self.pop_scope();
        result
    }

    // ---- interfaces, commands, result, new --------------------------------

    fn analyze_interface(
        &mut self,
        path: &[String],
        path_span: Span,
        body: &[Stmt],
    ) -> Result<(), Diagnostic> {
        let joined = path.join("/");
        if acacia_core::validate_path(&joined).is_err() {
            return Err(self.err(DiagnosticKind::BadInterfacePath(joined), path_span));
        }
        let reserved = joined == self.config.main_file
            || joined == self.config.init_file
            || joined == self.config.internal_folder
            || joined.starts_with(&format!("{}/", self.config.internal_folder));
        if reserved {
            return Err(self.err(DiagnosticKind::ReservedInterfacePath(joined), path_span));
        }
        if self.interfaces.contains_key(&joined) {
            return Err(self.err(DiagnosticKind::DuplicateInterface(joined), path_span));
        }
        self.interfaces.insert(joined.clone(), path_span);
        let ((), ops) = self.with_sink(|a| a.analyze_nested_block(body))?;
        self.files.insert(crate::ir::FnPath::new(joined), ops);
        Ok(())
    }

    fn analyze_command(
        &mut self,
        segments: &[CmdSegment],
        span: Span,
    ) -> Result<(), Diagnostic> {
        if self.in_compile_context() {
            return Err(self.err(
                DiagnosticKind::RuntimeInConstContext("a raw command".to_string()),
                span,
            ));
        }
        let mut line = String::new();
        for segment in segments {
            match segment {
                CmdSegment::Text(text) => line.push_str(text),
                CmdSegment::Interp { name, span } => {
                    let value = self.resolve_dotted_const(name, *span)?;
                    let text = value.command_text().ok_or_else(|| {
                        self.err(
                            DiagnosticKind::InvalidOperand {
                                op: "${}".to_string(),
                                operands: format!("`{}`", value.type_of()),
                            },
                            *span,
                        )
                    })?;
                    line.push_str(&text);
                }
            }
        }
        self.emit(Op::Raw(line));
        Ok(())
    }

    /// `a.b.c` in a compile-time position (command interpolation).
    fn resolve_dotted_const(&mut self, dotted: &str, span: Span) -> Result<Value, Diagnostic> {
        let mut parts = dotted.split('.');
        let first = parts.next().expect("split yields at least one part");
        let Some((binding, _)) = self.lookup(first) else {
            return Err(self.err(DiagnosticKind::NameNotDefined(first.to_string()), span));
        };
        let mut value = match binding {
            Binding::Const(v) | Binding::CtVar(v) => v.clone(),
            Binding::Rt { .. } | Binding::Ref { .. } => {
                return Err(self.err(DiagnosticKind::NotConstName(first.to_string()), span));
            }
        };
        for attr in parts {
            value = match value {
                Value::Module(module) => {
                    let info = &self.modules[module.index()];
                    match info.bindings.get(attr) {
                        Some(Binding::Const(v) | Binding::CtVar(v)) => v.clone(),
                        Some(_) => {
                            return Err(
                                self.err(DiagnosticKind::NotConstAttr(attr.to_string()), span)
                            );
                        }
                        None => {
                            return Err(self.err(
                                DiagnosticKind::ModuleNoAttribute {
                                    module: info.name.clone(),
                                    attr: attr.to_string(),
                                },
                                span,
                            ));
                        }
                    }
                }
                Value::Struct { fields, .. } => match fields.get(attr) {
                    Some(v) => v.clone(),
                    None => {
                        return Err(self.err(DiagnosticKind::NotConstAttr(attr.to_string()), span));
                    }
                },
                other => {
                    return Err(self.err(
                        DiagnosticKind::HasNoAttribute {
                            ty: other.type_of().to_string(),
                            attr: attr.to_string(),
                        },
                        span,
                    ));
                }
            };
        }
        Ok(value)
    }

    fn analyze_result(&mut self, expr: &Expr, span: Span) -> Result<(), Diagnostic> {
        if self.frames.is_empty() {
            return Err(self.err(DiagnosticKind::ResultOutOfScope, span));
        }
        let typed = self.analyze_expr(expr)?;
        let found = self.typed_type(&typed);
        let frame = self.frames.last().expect("checked above");
        let result_ty = frame.result_ty.clone();
        if !result_ty.accepts(&found) {
            return Err(self.err(
                DiagnosticKind::WrongResultType {
                    expected: result_ty.to_string(),
                    found: found.to_string(),
                },
                expr.span,
            ));
        }
        let flavor = frame.flavor;
        let place = frame.result_place.clone();

        match flavor {
            FuncFlavor::Compile => {
                let value = match typed {
                    Typed::Const(v) => v,
                    Typed::Rt(_) => return Err(self.err(DiagnosticKind::NonRtResult, expr.span)),
                };
                let frame = self.frames.last_mut().expect("checked above");
                frame.const_result = Some(value);
                frame.results_seen += 1;
            }
            FuncFlavor::Runtime | FuncFlavor::Inline => {
                if let Some(place) = place {
                    self.store(&place, typed, expr.span, false)?;
                } else {
                    // Compile-only result type: keep the constant.
                    let value = self.expect_const(typed, expr)?;
                    let frame = self.frames.last_mut().expect("checked above");
                    frame.const_result = Some(value);
                }
                let frame = self.frames.last_mut().expect("checked above");
                frame.results_seen += 1;
            }
        }
        Ok(())
    }

    fn analyze_new_call(
        &mut self,
        args: &[crate::ast::Arg],
        span: Span,
    ) -> Result<(), Diagnostic> {
        let in_new = self
            .frames
            .last()
            .is_some_and(|f| f.new_template.is_some());
        if !in_new {
            return Err(self.err(DiagnosticKind::NewOutOfScope, span));
        }
        let mut pos = None;
        for arg in args {
            match arg.name.as_deref() {
                Some("pos") | None if pos.is_none() => {
                    let typed = self.analyze_expr(&arg.value)?;
                    let value = self.expect_const(typed, &arg.value)?;
                    let rendered = match value {
                        Value::Pos(p) | Value::Offset(p) => p.render(),
                        other => {
                            return Err(self.err(
                                DiagnosticKind::WrongArgType {
                                    arg: "pos".to_string(),
                                    expected: "Pos".to_string(),
                                    found: other.type_of().to_string(),
                                },
                                arg.span,
                            ));
                        }
                    };
                    pos = Some(rendered);
                }
                Some("pos") | None => {
                    return Err(self.err(DiagnosticKind::DuplicateArg("pos".to_string()), arg.span));
                }
                Some(other) => {
                    return Err(self.err(
                        DiagnosticKind::UnknownArg {
                            func: "new".to_string(),
                            arg: other.to_string(),
                        },
                        arg.span,
                    ));
                }
            }
        }
        // The instance is summoned before its constructor runs; `new(...)`
        // re-anchors it at the given position.
        if let Some(pos) = pos {
            self.emit(Op::Teleport {
                target: Selector::executor(),
                pos,
            });
        }
        Ok(())
    }
}
