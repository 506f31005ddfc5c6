//! Expression analysis: typing, world classification, folding, lowering.

use acacia_core::Span;

use crate::ast::{BinOp, CmpOp, Expr, ExprKind, FsSegment, UnaryOp};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::ir::{Cond, Op, ScoreOpKind, ScoreRef, SelArg};
use crate::types::Type;
use crate::value::{
    const_binary, const_compare, const_index, const_slice, const_unary, font_code, FString,
    MapKey, Value,
};

use super::{Analyzer, Binding, BoolPlace, RtBool, RtPlace, RtValue, Typed};

impl Analyzer {
    pub(crate) fn analyze_expr(&mut self, expr: &Expr) -> Result<Typed, Diagnostic> {
        match &expr.kind {
            ExprKind::Int(v) => Ok(Typed::Const(Value::Int(*v))),
            ExprKind::Float(v) => Ok(Typed::Const(Value::Float(*v))),
            ExprKind::Bool(v) => Ok(Typed::Const(Value::Bool(*v))),
            ExprKind::NoneLit => Ok(Typed::Const(Value::None)),
            ExprKind::Str(segments) => self.analyze_string(segments, expr.span),
            ExprKind::Ident(name) => self.analyze_name(name, expr.span),
            ExprKind::SelfRef => match self.frames.last().and_then(|f| f.self_value.clone()) {
                Some(value) => Ok(Typed::Rt(value)),
                None => Err(self.err(DiagnosticKind::SelfOutOfScope, expr.span)),
            },
            ExprKind::Unary { op, operand } => self.analyze_unary(*op, operand, expr.span),
            ExprKind::Binary { op, lhs, rhs } => self.analyze_binary(*op, lhs, rhs, expr.span),
            ExprKind::Compare { first, rest } => self.analyze_compare(first, rest, expr.span),
            ExprKind::Call { callee, args } => self.analyze_call(callee, args, expr.span),
            ExprKind::Attribute {
                obj,
                attr,
                attr_span,
            } => self.analyze_attribute(obj, attr, *attr_span),
            ExprKind::Subscript { obj, index } => self.analyze_subscript(obj, index, expr.span),
            ExprKind::Slice { .. } => {
                unreachable!("slice expressions appear only inside subscripts")
            }
            ExprKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let typed = self.analyze_expr(item)?;
                    let Typed::Const(value) = typed else {
                        return Err(self.err(
                            DiagnosticKind::RuntimeInConstContext("a list literal".to_string()),
                            item.span,
                        ));
                    };
                    values.push(value);
                }
                Ok(Typed::Const(Value::List(values)))
            }
            ExprKind::Map(entries) => {
                let mut map = indexmap::IndexMap::new();
                for (key_expr, value_expr) in entries {
                    let key_typed = self.analyze_expr(key_expr)?;
                    let Typed::Const(key_value) = key_typed else {
                        return Err(self.err(
                            DiagnosticKind::RuntimeInConstContext("a map literal".to_string()),
                            key_expr.span,
                        ));
                    };
                    let key = MapKey::from_value(&key_value).ok_or_else(|| {
                        self.err(
                            DiagnosticKind::InvalidMapKey(key_value.type_of().to_string()),
                            key_expr.span,
                        )
                    })?;
                    let value_typed = self.analyze_expr(value_expr)?;
                    let Typed::Const(value) = value_typed else {
                        return Err(self.err(
                            DiagnosticKind::RuntimeInConstContext("a map literal".to_string()),
                            value_expr.span,
                        ));
                    };
                    map.insert(key, value);
                }
                Ok(Typed::Const(Value::Map(map)))
            }
            ExprKind::Score {
                selector,
                objective,
            } => Ok(Typed::Rt(RtValue::Int(ScoreRef::Raw {
                player: selector.clone(),
                objective: objective.clone(),
            }))),
        }
    }

    fn analyze_name(&mut self, name: &str, span: Span) -> Result<Typed, Diagnostic> {
        let Some((binding, crossed)) = self.lookup(name) else {
            return Err(self.err(DiagnosticKind::NameNotDefined(name.to_string()), span));
        };
        match binding {
            Binding::Rt { place, .. } | Binding::Ref { place, .. } => {
                if crossed {
                    return Err(self.err(DiagnosticKind::NotConstName(name.to_string()), span));
                }
                let place = place.clone();
                Ok(Typed::Rt(self.read_place(&place)))
            }
            Binding::CtVar(value) | Binding::Const(value) => Ok(Typed::Const(value.clone())),
        }
    }

    // ---- strings ----------------------------------------------------------

    fn analyze_string(
        &mut self,
        segments: &[FsSegment],
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        let mut out = FString::default();
        for segment in segments {
            match segment {
                FsSegment::Text(text) => out.push_text(text),
                FsSegment::Font(spec) => {
                    let code = font_code(spec).ok_or_else(|| {
                        self.err(DiagnosticKind::UnknownFont(spec.clone()), span)
                    })?;
                    out.push_text(code);
                }
                FsSegment::Expr(hole) => {
                    let typed = self.analyze_expr(hole)?;
                    match typed {
                        Typed::Const(Value::Str(inner)) => {
                            for part in inner.parts {
                                match part {
                                    crate::value::FsPart::Text(t) => out.push_text(&t),
                                    crate::value::FsPart::Score(s) => out.push_score(s),
                                }
                            }
                        }
                        Typed::Const(value) => {
                            let text = value.command_text().ok_or_else(|| {
                                self.err(DiagnosticKind::InvalidFexpr, hole.span)
                            })?;
                            out.push_text(&text);
                        }
                        Typed::Rt(RtValue::Int(score)) => out.push_score(score),
                        Typed::Rt(RtValue::Bool(value)) => {
                            let score = self.materialize_bool(value);
                            out.push_score(score);
                        }
                        Typed::Rt(_) => {
                            return Err(self.err(DiagnosticKind::InvalidFexpr, hole.span));
                        }
                    }
                }
            }
        }
        Ok(Typed::Const(Value::Str(out)))
    }

    // ---- operators --------------------------------------------------------

    fn analyze_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        let typed = self.analyze_expr(operand)?;
        match typed {
            Typed::Const(value) => {
                let folded = const_unary(op, &value).map_err(|kind| self.err(kind, span))?;
                Ok(Typed::Const(folded))
            }
            Typed::Rt(RtValue::Bool(value)) if op == UnaryOp::Not => Ok(Typed::Rt(
                RtValue::Bool(self.negate_rt_bool(value)),
            )),
            Typed::Rt(RtValue::Int(score)) if op == UnaryOp::Neg => {
                let tmp = self.copy_int(score);
                let minus_one = self.const_slot(-1);
                self.emit(Op::ScoreOp {
                    op: ScoreOpKind::Mul,
                    target: tmp.clone(),
                    source: minus_one,
                });
                Ok(Typed::Rt(RtValue::Int(tmp)))
            }
            Typed::Rt(RtValue::Int(score)) if op == UnaryOp::Pos => {
                Ok(Typed::Rt(RtValue::Int(score)))
            }
            other => Err(self.err(
                DiagnosticKind::InvalidOperand {
                    op: match op {
                        UnaryOp::Pos => "+",
                        UnaryOp::Neg => "-",
                        UnaryOp::Not => "not",
                    }
                    .to_string(),
                    operands: format!("`{}`", self.typed_type(&other)),
                },
                span,
            )),
        }
    }

    fn negate_rt_bool(&mut self, value: RtBool) -> RtBool {
        match value {
            RtBool::Score(score) => RtBool::Conds(vec![Cond::is_true(score).negate()]),
            RtBool::Conds(conds) if conds.len() == 1 => {
                let cond = conds.into_iter().next().expect("length checked");
                RtBool::Conds(vec![cond.negate()])
            }
            // `not (a and b)` needs the conjunction materialized first.
            conds @ RtBool::Conds(_) => {
                let score = self.materialize_bool(conds);
                RtBool::Conds(vec![Cond::is_true(score).negate()])
            }
        }
    }

    fn analyze_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        if matches!(op, BinOp::And | BinOp::Or) {
            return self.analyze_bool_op(op, lhs, rhs, span);
        }

        let lhs_typed = self.analyze_expr(lhs)?;
        let rhs_typed = self.analyze_expr(rhs)?;

        if let (Typed::Const(a), Typed::Const(b)) = (&lhs_typed, &rhs_typed) {
            // List repetition demands a literal count, not merely a constant.
            if op == BinOp::Mul
                && matches!(a, Value::List(_))
                && !matches!(rhs.kind, ExprKind::Int(_))
            {
                return Err(self.err(DiagnosticKind::ListMultiplyNonLiteral, rhs.span));
            }
            let folded = const_binary(op, a, b).map_err(|kind| self.err(kind, span))?;
            return Ok(Typed::Const(folded));
        }

        // Mixed worlds: only int arithmetic survives at runtime.
        let lhs_score = self.as_int_operand(&lhs_typed, lhs.span, op)?;
        let tmp = match lhs_score {
            IntOperand::Const(v) => {
                let tmp = self.alloc_slot();
                self.emit(Op::SetConst {
                    target: tmp.clone(),
                    value: v,
                });
                tmp
            }
            IntOperand::Score(score) => self.copy_int(score),
        };
        let rhs_operand = self.as_int_operand(&rhs_typed, rhs.span, op)?;
        match rhs_operand {
            IntOperand::Const(v) => {
                let rhs_typed = Typed::Const(Value::Int(v));
                self.apply_int_op(op, tmp.clone(), rhs_typed, span)?;
            }
            IntOperand::Score(score) => {
                let rhs_typed = Typed::Rt(RtValue::Int(score));
                self.apply_int_op(op, tmp.clone(), rhs_typed, span)?;
            }
        }
        Ok(Typed::Rt(RtValue::Int(tmp)))
    }

    fn as_int_operand(
        &self,
        typed: &Typed,
        span: Span,
        op: BinOp,
    ) -> Result<IntOperand, Diagnostic> {
        match typed {
            Typed::Const(Value::Int(v)) => Ok(IntOperand::Const(*v)),
            Typed::Rt(RtValue::Int(score)) => Ok(IntOperand::Score(score.clone())),
            other => Err(self.err(
                DiagnosticKind::InvalidOperand {
                    op: op.symbol().to_string(),
                    operands: format!("`{}`", self.typed_type(other)),
                },
                span,
            )),
        }
    }

    fn analyze_bool_op(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        let lhs_typed = self.analyze_expr(lhs)?;
        // A constant side decides at compile time; the other side is then
        // the whole answer (or is skipped entirely).
        if let Typed::Const(value) = &lhs_typed {
            let Value::Bool(b) = value else {
                return Err(self.operand_error(op, &lhs_typed, span));
            };
            return match (op, b) {
                (BinOp::And, false) => Ok(Typed::Const(Value::Bool(false))),
                (BinOp::Or, true) => Ok(Typed::Const(Value::Bool(true))),
                _ => {
                    let rhs_typed = self.analyze_expr(rhs)?;
                    self.expect_bool(rhs_typed, op, rhs.span)
                }
            };
        }

        let Typed::Rt(RtValue::Bool(lhs_bool)) = lhs_typed else {
            return Err(self.operand_error(op, &lhs_typed, span));
        };
        let rhs_typed = self.analyze_expr(rhs)?;
        match rhs_typed {
            Typed::Const(Value::Bool(b)) => match (op, b) {
                (BinOp::And, false) => Ok(Typed::Const(Value::Bool(false))),
                (BinOp::Or, true) => Ok(Typed::Const(Value::Bool(true))),
                _ => Ok(Typed::Rt(RtValue::Bool(lhs_bool))),
            },
            Typed::Rt(RtValue::Bool(rhs_bool)) => match op {
                BinOp::And => {
                    let mut conds = self.bool_conds(lhs_bool);
                    conds.extend(self.bool_conds(rhs_bool));
                    Ok(Typed::Rt(RtValue::Bool(RtBool::Conds(conds))))
                }
                _ => {
                    let tmp = self.alloc_slot();
                    self.emit(Op::SetConst {
                        target: tmp.clone(),
                        value: 0,
                    });
                    for side in [lhs_bool, rhs_bool] {
                        let conds = self.bool_conds(side);
                        self.emit(Op::Guarded {
                            conds,
                            body: vec![Op::SetConst {
                                target: tmp.clone(),
                                value: 1,
                            }],
                        });
                    }
                    Ok(Typed::Rt(RtValue::Bool(RtBool::Score(tmp))))
                }
            },
            other => Err(self.operand_error(op, &other, rhs.span)),
        }
    }

    fn expect_bool(&self, typed: Typed, op: BinOp, span: Span) -> Result<Typed, Diagnostic> {
        match &typed {
            Typed::Const(Value::Bool(_)) | Typed::Rt(RtValue::Bool(_)) => Ok(typed),
            _ => Err(self.operand_error(op, &typed, span)),
        }
    }

    fn operand_error(&self, op: BinOp, typed: &Typed, span: Span) -> Diagnostic {
        self.err(
            DiagnosticKind::InvalidOperand {
                op: op.symbol().to_string(),
                operands: format!("`{}`", self.typed_type(typed)),
            },
            span,
        )
    }

    // ---- comparison chains ------------------------------------------------

    fn analyze_compare(
        &mut self,
        first: &Expr,
        rest: &[(CmpOp, Expr)],
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        let mut operands = Vec::with_capacity(rest.len() + 1);
        operands.push((self.analyze_expr(first)?, first.span));
        for (_, operand) in rest {
            operands.push((self.analyze_expr(operand)?, operand.span));
        }

        let mut conds: Vec<Cond> = Vec::new();
        let mut any_const_false = false;
        for (i, (op, _)) in rest.iter().enumerate() {
            let (lhs, lhs_span) = &operands[i];
            let (rhs, rhs_span) = &operands[i + 1];
            match (lhs, rhs) {
                (Typed::Const(a), Typed::Const(b)) => {
                    let holds = const_compare(*op, a, b)
                        .map_err(|kind| self.err(kind, lhs_span.cover(*rhs_span)))?;
                    if !holds {
                        any_const_false = true;
                    }
                }
                _ => {
                    let cond =
                        self.compare_pair(*op, lhs, rhs, lhs_span.cover(*rhs_span))?;
                    conds.push(cond);
                }
            }
        }
        let _ = span;
        if any_const_false {
            return Ok(Typed::Const(Value::Bool(false)));
        }
        if conds.is_empty() {
            return Ok(Typed::Const(Value::Bool(true)));
        }
        Ok(Typed::Rt(RtValue::Bool(RtBool::Conds(conds))))
    }

    /// Lower one `lhs <op> rhs` pair with at least one runtime side.
    fn compare_pair(
        &mut self,
        op: CmpOp,
        lhs: &Typed,
        rhs: &Typed,
        span: Span,
    ) -> Result<Cond, Diagnostic> {
        let as_score = |a: &mut Analyzer, t: &Typed| -> Option<ScoreRef> {
            match t {
                Typed::Rt(RtValue::Int(score)) => Some(score.clone()),
                Typed::Rt(RtValue::Bool(b)) => Some(a.materialize_bool(b.clone())),
                _ => None,
            }
        };

        match (lhs, rhs) {
            (_, Typed::Const(Value::Int(n))) => {
                let Some(score) = as_score(self, lhs) else {
                    return Err(self.compare_error(op, lhs, rhs, span));
                };
                Ok(self.matches_cond(score, op, *n))
            }
            (Typed::Const(Value::Int(n)), _) => {
                let Some(score) = as_score(self, rhs) else {
                    return Err(self.compare_error(op, lhs, rhs, span));
                };
                Ok(self.matches_cond(score, op.flipped(), *n))
            }
            (Typed::Const(Value::Bool(b)), _) | (_, Typed::Const(Value::Bool(b))) => {
                // Normalize the constant bool to a 0/1 literal comparison.
                let n = i32::from(*b);
                let (score, cmp) = if matches!(lhs, Typed::Const(_)) {
                    let Some(score) = as_score(self, rhs) else {
                        return Err(self.compare_error(op, lhs, rhs, span));
                    };
                    (score, op.flipped())
                } else {
                    let Some(score) = as_score(self, lhs) else {
                        return Err(self.compare_error(op, lhs, rhs, span));
                    };
                    (score, op)
                };
                Ok(self.matches_cond(score, cmp, n))
            }
            _ => {
                let Some(a) = as_score(self, lhs) else {
                    return Err(self.compare_error(op, lhs, rhs, span));
                };
                let Some(b) = as_score(self, rhs) else {
                    return Err(self.compare_error(op, lhs, rhs, span));
                };
                Ok(Cond::Compare {
                    lhs: a,
                    op,
                    rhs: b,
                    negated: false,
                })
            }
        }
    }

    fn compare_error(&self, op: CmpOp, lhs: &Typed, rhs: &Typed, span: Span) -> Diagnostic {
        self.err(
            DiagnosticKind::InvalidOperand {
                op: op.symbol().to_string(),
                operands: format!(
                    "`{}` and `{}`",
                    self.typed_type(lhs),
                    self.typed_type(rhs)
                ),
            },
            span,
        )
    }

    /// `score <op> n` as a `matches` range. The unrepresentable edge cases
    /// (`< i32::MIN`, `> i32::MAX`) compare against a constant slot instead.
    fn matches_cond(&mut self, score: ScoreRef, op: CmpOp, n: i32) -> Cond {
        let matches = |min: Option<i32>, max: Option<i32>, negated: bool| Cond::Matches {
            score: score.clone(),
            min,
            max,
            negated,
        };
        match op {
            CmpOp::Eq => matches(Some(n), Some(n), false),
            CmpOp::Ne => matches(Some(n), Some(n), true),
            CmpOp::Le => matches(None, Some(n), false),
            CmpOp::Ge => matches(Some(n), None, false),
            CmpOp::Lt => {
                if n == i32::MIN {
                    let rhs = self.const_slot(n);
                    Cond::Compare {
                        lhs: score.clone(),
                        op: CmpOp::Lt,
                        rhs,
                        negated: false,
                    }
                } else {
                    matches(None, Some(n - 1), false)
                }
            }
            CmpOp::Gt => {
                if n == i32::MAX {
                    let rhs = self.const_slot(n);
                    Cond::Compare {
                        lhs: score.clone(),
                        op: CmpOp::Gt,
                        rhs,
                        negated: false,
                    }
                } else {
                    matches(Some(n + 1), None, false)
                }
            }
        }
    }

    // ---- attributes and subscripts ----------------------------------------

    pub(crate) fn analyze_attribute(
        &mut self,
        obj: &Expr,
        attr: &str,
        attr_span: Span,
    ) -> Result<Typed, Diagnostic> {
        let typed = self.analyze_expr(obj)?;
        match typed {
            Typed::Const(Value::Module(module)) => {
                let info = &self.modules[module.index()];
                match info.bindings.get(attr) {
                    Some(Binding::Const(v) | Binding::CtVar(v)) => Ok(Typed::Const(v.clone())),
                    Some(Binding::Rt { place, .. } | Binding::Ref { place, .. }) => {
                        let place = place.clone();
                        Ok(Typed::Rt(self.read_place(&place)))
                    }
                    None => Err(self.err(
                        DiagnosticKind::ModuleNoAttribute {
                            module: info.name.clone(),
                            attr: attr.to_string(),
                        },
                        attr_span,
                    )),
                }
            }
            Typed::Const(Value::Struct { fields, name, .. }) => match fields.get(attr) {
                Some(value) => Ok(Typed::Const(value.clone())),
                None => Err(self.err(
                    DiagnosticKind::HasNoAttribute {
                        ty: name,
                        attr: attr.to_string(),
                    },
                    attr_span,
                )),
            },
            Typed::Const(Value::Template(template)) => {
                let info = &self.templates[template.index()];
                match info.methods.get(attr) {
                    Some(method) if method.qualifier == crate::ast::MethodQualifier::Static => {
                        Ok(Typed::Const(Value::Function(method.func)))
                    }
                    _ => Err(self.err(
                        DiagnosticKind::HasNoAttribute {
                            ty: info.name.clone(),
                            attr: attr.to_string(),
                        },
                        attr_span,
                    )),
                }
            }
            Typed::Rt(RtValue::Entity { template, sel }) => {
                let info = &self.templates[template.index()];
                let Some(field) = info.fields.get(attr) else {
                    return Err(self.err(
                        DiagnosticKind::HasNoAttribute {
                            ty: info.name.clone(),
                            attr: attr.to_string(),
                        },
                        attr_span,
                    ));
                };
                let place = self.field_place(&sel, &field.storage.clone(), &field.ty.clone());
                Ok(Typed::Rt(self.read_place(&place)))
            }
            Typed::Rt(RtValue::Struct { fields, name, .. }) => match fields.get(attr) {
                Some(value) => Ok(Typed::Rt(value.clone())),
                None => Err(self.err(
                    DiagnosticKind::HasNoAttribute {
                        ty: name,
                        attr: attr.to_string(),
                    },
                    attr_span,
                )),
            },
            other => Err(self.err(
                DiagnosticKind::HasNoAttribute {
                    ty: self.typed_type(&other).to_string(),
                    attr: attr.to_string(),
                },
                attr_span,
            )),
        }
    }

    /// Instantiate a field's storage layout against a concrete entity.
    pub(crate) fn field_place(
        &self,
        owner: &crate::ir::Selector,
        storage: &super::FieldStorage,
        ty: &Type,
    ) -> RtPlace {
        match (storage, ty) {
            (super::FieldStorage::IntObj(obj), _) => RtPlace::Int(ScoreRef::Entity {
                target: owner.clone(),
                obj: *obj,
            }),
            (super::FieldStorage::BoolTag(tag), _) => RtPlace::Bool(BoolPlace::Tag {
                owner: owner.clone(),
                tag: *tag,
            }),
            (super::FieldStorage::Struct(fields), Type::Struct { id, name }) => {
                let struct_fields = &self.structs[id.index()].fields;
                RtPlace::Struct {
                    id: *id,
                    name: name.clone(),
                    fields: fields
                        .iter()
                        .map(|(field, storage)| {
                            let field_ty = struct_fields
                                .get(field)
                                .expect("storage mirrors struct fields");
                            (
                                field.clone(),
                                self.field_place(owner, storage, field_ty),
                            )
                        })
                        .collect(),
                }
            }
            (super::FieldStorage::Struct(_), _) => {
                unreachable!("struct storage always pairs with a struct type")
            }
        }
    }

    fn analyze_subscript(
        &mut self,
        obj: &Expr,
        index: &Expr,
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        let obj_typed = self.analyze_expr(obj)?;

        // Type expressions: `list[T]`, `map[K: V]`, `Engroup[T]`.
        if let Typed::Const(Value::Type(Type::List(_))) = &obj_typed {
            let elem = self.resolve_type(index)?;
            return Ok(Typed::Const(Value::Type(Type::List(Box::new(elem)))));
        }
        if let Typed::Const(Value::Type(Type::Map(..))) = &obj_typed {
            let ExprKind::Slice {
                lo: Some(key),
                hi: Some(value),
            } = &index.kind
            else {
                return Err(self.err(
                    DiagnosticKind::InvalidTypeSpec("a `map[key: value]` form".to_string()),
                    index.span,
                ));
            };
            let key_ty = self.resolve_type(key)?;
            let value_ty = self.resolve_type(value)?;
            return Ok(Typed::Const(Value::Type(Type::Map(
                Box::new(key_ty),
                Box::new(value_ty),
            ))));
        }
        if let Typed::Const(Value::Builtin {
            module: "types",
            name: "Engroup",
        }) = &obj_typed
        {
            let elem = self.resolve_type(index)?;
            let Type::Entity { template, .. } = elem else {
                return Err(self.err(
                    DiagnosticKind::InvalidTypeSpec(format!("`{elem}` (expected a template)")),
                    index.span,
                ));
            };
            return Ok(Typed::Const(Value::Type(self.engroup_type(template))));
        }

        let Typed::Const(container) = obj_typed else {
            return Err(self.err(
                DiagnosticKind::NoGetitem(self.typed_type(&obj_typed).to_string()),
                obj.span,
            ));
        };

        if let ExprKind::Slice { lo, hi } = &index.kind {
            let lo_value = match lo {
                Some(e) => Some(self.analyze_const_operand(e)?),
                None => None,
            };
            let hi_value = match hi {
                Some(e) => Some(self.analyze_const_operand(e)?),
                None => None,
            };
            let sliced = const_slice(&container, lo_value.as_ref(), hi_value.as_ref())
                .map_err(|kind| self.err(kind, span))?;
            return Ok(Typed::Const(sliced));
        }

        let index_value = self.analyze_const_operand(index)?;
        let result =
            const_index(&container, &index_value).map_err(|kind| self.err(kind, span))?;
        Ok(Typed::Const(result))
    }

    fn analyze_const_operand(&mut self, expr: &Expr) -> Result<Value, Diagnostic> {
        let typed = self.analyze_expr(expr)?;
        match typed {
            Typed::Const(value) => Ok(value),
            Typed::Rt(_) => Err(self.err(
                DiagnosticKind::RuntimeInConstContext("a subscript index".to_string()),
                expr.span,
            )),
        }
    }

    // ---- type references ---------------------------------------------------

    /// Evaluate a type-reference expression (types are ordinary values).
    pub(crate) fn resolve_type(&mut self, expr: &Expr) -> Result<Type, Diagnostic> {
        let typed = self.analyze_expr(expr)?;
        match typed {
            Typed::Const(Value::Type(ty)) => Ok(ty),
            Typed::Const(Value::Template(template)) => Ok(self.template_type(template)),
            Typed::Const(Value::StructTemplate(id)) => Ok(Type::Struct {
                id,
                name: self.structs[id.index()].name.clone(),
            }),
            other => Err(self.err(
                DiagnosticKind::InvalidTypeSpec(format!("`{}`", self.typed_type(&other))),
                expr.span,
            )),
        }
    }

    // ---- places (assignable locations) ------------------------------------

    /// Resolve an expression to an assignable runtime location.
    pub(crate) fn resolve_place(&mut self, expr: &Expr) -> Result<RtPlace, Diagnostic> {
        match &expr.kind {
            ExprKind::Ident(name) => {
                let Some((binding, crossed)) = self.lookup(name) else {
                    return Err(self.err(DiagnosticKind::NameNotDefined(name.clone()), expr.span));
                };
                match binding {
                    Binding::Rt { place, .. } | Binding::Ref { place, .. } => {
                        if crossed {
                            return Err(
                                self.err(DiagnosticKind::NotConstName(name.clone()), expr.span)
                            );
                        }
                        Ok(place.clone())
                    }
                    Binding::CtVar(_) | Binding::Const(_) => {
                        Err(self.err(DiagnosticKind::CantRef, expr.span))
                    }
                }
            }
            ExprKind::SelfRef => {
                let Some(RtValue::Entity { template, sel }) =
                    self.frames.last().and_then(|f| f.self_value.clone())
                else {
                    return Err(self.err(DiagnosticKind::SelfOutOfScope, expr.span));
                };
                let _ = (template, sel);
                Err(self.err(DiagnosticKind::CantRef, expr.span))
            }
            ExprKind::Attribute {
                obj,
                attr,
                attr_span,
            } => {
                // Struct places chain: `h.p.x` addresses a field of the
                // struct place `h.p`.
                if matches!(obj.kind, ExprKind::Ident(_) | ExprKind::Attribute { .. })
                    && let Ok(RtPlace::Struct { fields, name, .. }) = self.resolve_place(obj)
                {
                    return fields.get(attr.as_str()).cloned().ok_or_else(|| {
                        self.err(
                            DiagnosticKind::HasNoAttribute {
                                ty: name,
                                attr: attr.clone(),
                            },
                            *attr_span,
                        )
                    });
                }
                let typed = self.analyze_expr(obj)?;
                match typed {
                    Typed::Rt(RtValue::Entity { template, sel }) => {
                        let info = &self.templates[template.index()];
                        let Some(field) = info.fields.get(attr.as_str()) else {
                            return Err(self.err(
                                DiagnosticKind::HasNoAttribute {
                                    ty: info.name.clone(),
                                    attr: attr.clone(),
                                },
                                *attr_span,
                            ));
                        };
                        Ok(self.field_place(&sel, &field.storage.clone(), &field.ty.clone()))
                    }
                    Typed::Const(Value::Module(module)) => {
                        let info = &self.modules[module.index()];
                        match info.bindings.get(attr.as_str()) {
                            Some(Binding::Rt { place, .. } | Binding::Ref { place, .. }) => {
                                Ok(place.clone())
                            }
                            Some(_) => Err(self.err(DiagnosticKind::CantRef, expr.span)),
                            None => Err(self.err(
                                DiagnosticKind::ModuleNoAttribute {
                                    module: info.name.clone(),
                                    attr: attr.clone(),
                                },
                                *attr_span,
                            )),
                        }
                    }
                    _ => Err(self.err(DiagnosticKind::CantRef, expr.span)),
                }
            }
            ExprKind::Score {
                selector,
                objective,
            } => Ok(RtPlace::Int(ScoreRef::Raw {
                player: selector.clone(),
                objective: objective.clone(),
            })),
            _ => Err(self.err(DiagnosticKind::CantRef, expr.span)),
        }
    }

    /// Splice an entity filter into a selector.
    pub(crate) fn apply_filter(
        &self,
        mut selector: crate::ir::Selector,
        filter: &crate::value::FilterValue,
    ) -> crate::ir::Selector {
        if filter.random {
            selector.base = crate::ir::SelBase::Raw("@r".to_string());
        }
        for arg in &filter.args {
            selector.args.push(SelArg::Raw(arg.clone()));
        }
        selector
    }
}

enum IntOperand {
    Const(i32),
    Score(ScoreRef),
}
