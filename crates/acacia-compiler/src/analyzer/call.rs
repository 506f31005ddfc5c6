//! Calls: user functions in all three flavors, entity instantiation,
//! methods with virtual dispatch, entity groups, filters, and builtins.

use std::rc::Rc;

use acacia_core::{FuncId, Span, TagId, TemplateId};

use crate::ast::{Arg, Expr, ExprKind, FuncFlavor, MethodQualifier, ParamPort, Stmt, StmtKind};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::ir::{FnPath, Op, Selector, TextPart};
use crate::types::Type;
use crate::value::{fmt_number, Coord, FilterValue, FsPart, PosValue, RotValue, Value};

use super::{
    Analyzer, Binding, Frame, FuncInstance, ParamInfo, RtPlace, RtValue, ScopeKind, Typed,
};

/// How one argument reaches its parameter.
enum Processed {
    Val(Typed),
    Ref(RtPlace),
    Const(Value),
}

impl Analyzer {
    pub(crate) fn analyze_call(
        &mut self,
        callee: &Expr,
        args: &[Arg],
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        if let ExprKind::Attribute {
            obj,
            attr,
            attr_span,
        } = &callee.kind
        {
            let obj_typed = self.analyze_expr(obj)?;
            return match obj_typed {
                Typed::Rt(RtValue::Entity { template, sel }) => {
                    self.method_call(template, sel, attr, *attr_span, args, span)
                }
                Typed::Rt(RtValue::Group { template, tag }) => {
                    self.group_call(template, tag, attr, *attr_span, args, span)
                }
                Typed::Const(Value::Filter(filter)) => {
                    self.filter_call(filter, attr, *attr_span, args)
                }
                Typed::Const(Value::Module(module)) => {
                    let info = &self.modules[module.index()];
                    let value = match info.bindings.get(attr.as_str()) {
                        Some(Binding::Const(v) | Binding::CtVar(v)) => v.clone(),
                        Some(_) => {
                            return Err(self.err(
                                DiagnosticKind::Uncallable("a runtime variable".to_string()),
                                *attr_span,
                            ));
                        }
                        None => {
                            return Err(self.err(
                                DiagnosticKind::ModuleNoAttribute {
                                    module: info.name.clone(),
                                    attr: attr.clone(),
                                },
                                *attr_span,
                            ));
                        }
                    };
                    self.call_value(value, args, span)
                }
                Typed::Const(Value::Template(template)) => {
                    let info = &self.templates[template.index()];
                    match info.methods.get(attr.as_str()) {
                        Some(method) if method.qualifier == MethodQualifier::Static => {
                            let func = method.func;
                            self.call_function(func, None, args, span)
                        }
                        _ => Err(self.err(
                            DiagnosticKind::HasNoAttribute {
                                ty: info.name.clone(),
                                attr: attr.clone(),
                            },
                            *attr_span,
                        )),
                    }
                }
                Typed::Const(Value::Struct { fields, name, .. }) => {
                    match fields.get(attr.as_str()) {
                        Some(value) => self.call_value(value.clone(), args, span),
                        None => Err(self.err(
                            DiagnosticKind::HasNoAttribute {
                                ty: name,
                                attr: attr.clone(),
                            },
                            *attr_span,
                        )),
                    }
                }
                other => Err(self.err(
                    DiagnosticKind::HasNoAttribute {
                        ty: self.typed_type(&other).to_string(),
                        attr: attr.clone(),
                    },
                    *attr_span,
                )),
            };
        }

        let typed = self.analyze_expr(callee)?;
        match typed {
            Typed::Const(value) => self.call_value(value, args, span),
            other => Err(self.err(
                DiagnosticKind::Uncallable(self.typed_type(&other).to_string()),
                callee.span,
            )),
        }
    }

    fn call_value(&mut self, value: Value, args: &[Arg], span: Span) -> Result<Typed, Diagnostic> {
        match value {
            Value::Function(fid) => self.call_function(fid, None, args, span),
            Value::Builtin { module, name } => self.call_builtin(module, name, args, span),
            Value::Template(template) => self.instantiate(template, args, span),
            Value::StructTemplate(id) => self.construct_struct(id, args, span),
            Value::Type(ty) => self.type_ctor(ty, args, span),
            other => Err(self.err(
                DiagnosticKind::Uncallable(other.type_of().to_string()),
                span,
            )),
        }
    }

    // ---- argument binding --------------------------------------------------

    /// Match call arguments against a parameter list: positionals in order,
    /// then keywords, then defaults.
    fn bind_args<'a>(
        &self,
        func_name: &str,
        params: &[ParamInfo],
        args: &'a [Arg],
        span: Span,
    ) -> Result<Vec<Option<&'a Arg>>, Diagnostic> {
        let mut bound: Vec<Option<&Arg>> = vec![None; params.len()];
        let mut next_positional = 0usize;
        for arg in args {
            match &arg.name {
                None => {
                    while next_positional < params.len() && bound[next_positional].is_some() {
                        next_positional += 1;
                    }
                    if next_positional >= params.len() {
                        return Err(self.err(
                            DiagnosticKind::TooManyArgs(func_name.to_string()),
                            arg.span,
                        ));
                    }
                    bound[next_positional] = Some(arg);
                    next_positional += 1;
                }
                Some(name) => {
                    let Some(idx) = params.iter().position(|p| &p.name == name) else {
                        return Err(self.err(
                            DiagnosticKind::UnknownArg {
                                func: func_name.to_string(),
                                arg: name.clone(),
                            },
                            arg.span,
                        ));
                    };
                    if bound[idx].is_some() {
                        return Err(self.err(DiagnosticKind::DuplicateArg(name.clone()), arg.span));
                    }
                    bound[idx] = Some(arg);
                }
            }
        }
        for (idx, param) in params.iter().enumerate() {
            if bound[idx].is_none() && param.default.is_none() {
                return Err(self.err(
                    DiagnosticKind::MissingArg {
                        func: func_name.to_string(),
                        arg: param.name.clone(),
                    },
                    span,
                ));
            }
        }
        Ok(bound)
    }

    /// Evaluate bound arguments per the parameter ports.
    fn process_args(
        &mut self,
        params: &[ParamInfo],
        bound: &[Option<&Arg>],
        span: Span,
    ) -> Result<Vec<Processed>, Diagnostic> {
        let mut processed = Vec::with_capacity(params.len());
        for (param, slot) in params.iter().zip(bound) {
            let entry = match (param.port, slot) {
                (ParamPort::ByRef, Some(arg)) => {
                    let place = self.resolve_place(&arg.value).map_err(|_| {
                        self.err(DiagnosticKind::CantRefArg(param.name.clone()), arg.span)
                    })?;
                    let found = self.place_type(&place);
                    if !param.ty.accepts(&found) {
                        return Err(self.arg_type_error(param, &found, arg.span));
                    }
                    Processed::Ref(place)
                }
                (ParamPort::ByRef, None) => {
                    // Ref params reject defaults at registration.
                    return Err(self.err(
                        DiagnosticKind::CantRefArg(param.name.clone()),
                        span,
                    ));
                }
                (ParamPort::Const, Some(arg)) => {
                    let typed = self.analyze_expr(&arg.value)?;
                    let Typed::Const(value) = typed else {
                        return Err(self.err(
                            DiagnosticKind::ArgNotConst(param.name.clone()),
                            arg.span,
                        ));
                    };
                    let found = value.type_of();
                    if !param.ty.accepts(&found) {
                        return Err(self.arg_type_error(param, &found, arg.span));
                    }
                    Processed::Const(value)
                }
                (ParamPort::Const, None) => {
                    Processed::Const(param.default.clone().expect("checked in bind_args"))
                }
                (ParamPort::ByValue, Some(arg)) => {
                    let typed = self.analyze_expr(&arg.value)?;
                    let found = self.typed_type(&typed);
                    if !param.ty.accepts(&found) {
                        return Err(self.arg_type_error(param, &found, arg.span));
                    }
                    Processed::Val(typed)
                }
                (ParamPort::ByValue, None) => Processed::Val(Typed::Const(
                    param.default.clone().expect("checked in bind_args"),
                )),
            };
            processed.push(entry);
        }
        Ok(processed)
    }

    fn arg_type_error(&self, param: &ParamInfo, found: &Type, span: Span) -> Diagnostic {
        self.err(
            DiagnosticKind::WrongArgType {
                arg: param.name.clone(),
                expected: param.ty.to_string(),
                found: found.to_string(),
            },
            span,
        )
    }

    // ---- user function calls ----------------------------------------------

    pub(crate) fn call_function(
        &mut self,
        fid: FuncId,
        self_ctx: Option<(TemplateId, Selector)>,
        args: &[Arg],
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        let info = &self.funcs[fid.index()];
        let name = info.name.clone();
        let flavor = info.flavor;
        let params = info.params.clone();
        let def = Rc::clone(&info.def);
        let def_source = info.source;
        let result_ty = info.result.clone();

        let bound = self.bind_args(&name, &params, args, span)?;
        let processed = self.process_args(&params, &bound, span)?;

        let note = |a: &Analyzer, diag: Diagnostic| {
            diag.with_note(def_source, def.name_span, format!("{name:?} defined here"))
                .with_plain_note(format!("while compiling the call at {}", a.span_text(span)))
        };

        match flavor {
            FuncFlavor::Compile => self
                .call_compile(&def, &params, processed, result_ty, span)
                .map_err(|d| note(self, d)),
            FuncFlavor::Inline => self
                .call_inline(&def, &params, processed, result_ty, self_ctx, span)
                .map_err(|d| note(self, d)),
            FuncFlavor::Runtime => self
                .call_runtime(fid, &def, &params, processed, result_ty, self_ctx, span)
                .map_err(|d| note(self, d)),
        }
    }

    pub(crate) fn span_text(&self, span: Span) -> String {
        span.to_string()
    }

    fn call_compile(
        &mut self,
        def: &crate::ast::FuncDef,
        params: &[ParamInfo],
        processed: Vec<Processed>,
        result_ty: Type,
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        self.push_scope(ScopeKind::Function { compile_only: true });
        self.frames.push(Frame {
            result_ty: result_ty.clone(),
            result_place: None,
            const_result: None,
            results_seen: 0,
            flavor: FuncFlavor::Compile,
            self_value: None,
            new_template: None,
        });

        let outcome = (|| {
            for (param, entry) in params.iter().zip(processed) {
                let value = match entry {
                    Processed::Const(v) => v,
                    Processed::Val(Typed::Const(v)) => v,
                    Processed::Val(Typed::Rt(_)) | Processed::Ref(_) => {
                        return Err(self.err(
                            DiagnosticKind::ArgNotConst(param.name.clone()),
                            span,
                        ));
                    }
                };
                let binding = match param.port {
                    ParamPort::Const => Binding::Const(value),
                    _ => Binding::CtVar(value),
                };
                self.declare(&param.name, binding, def.name_span)?;
            }
            self.analyze_block(&def.body)
        })();

        let frame = self.frames.pop().expect("frame pushed above");
        self.pop_scope();
        outcome?;

        match frame.const_result {
            Some(value) => Ok(Typed::Const(value)),
            None if result_ty == Type::None => Ok(Typed::Const(Value::None)),
            None => Err(self.err(
                DiagnosticKind::WrongResultType {
                    expected: result_ty.to_string(),
                    found: Type::None.to_string(),
                },
                span,
            )),
        }
    }

    fn call_inline(
        &mut self,
        def: &crate::ast::FuncDef,
        params: &[ParamInfo],
        processed: Vec<Processed>,
        result_ty: Type,
        self_ctx: Option<(TemplateId, Selector)>,
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        let const_shaped = result_ty != Type::None && !result_ty.has_runtime_form();
        if const_shaped && count_results(&def.body) > 1 {
            return Err(self.err(DiagnosticKind::MultipleResults, def.name_span));
        }

        let result_place = if result_ty.has_runtime_form() {
            Some(self.alloc_place(&result_ty, span)?)
        } else {
            None
        };

        self.push_scope(ScopeKind::Function { compile_only: false });
        self.frames.push(Frame {
            result_ty: result_ty.clone(),
            result_place: result_place.clone(),
            const_result: None,
            results_seen: 0,
            flavor: FuncFlavor::Inline,
            self_value: self_ctx.map(|(template, sel)| RtValue::Entity { template, sel }),
            new_template: None,
        });

        let outcome = (|| {
            for (param, entry) in params.iter().zip(processed) {
                let binding = match entry {
                    Processed::Const(value) => Binding::Const(value),
                    Processed::Ref(place) => Binding::Ref {
                        ty: param.ty.clone(),
                        place,
                    },
                    Processed::Val(Typed::Const(value)) if !param.ty.has_runtime_form() => {
                        Binding::CtVar(value)
                    }
                    Processed::Val(typed) => {
                        let place = self.alloc_place(&param.ty, span)?;
                        self.store(&place, typed, span, false)?;
                        Binding::Rt {
                            ty: param.ty.clone(),
                            place,
                        }
                    }
                };
                self.declare(&param.name, binding, def.name_span)?;
            }
            self.analyze_block(&def.body)
        })();

        let frame = self.frames.pop().expect("frame pushed above");
        self.pop_scope();
        outcome?;

        if const_shaped && frame.results_seen > 1 {
            return Err(self.err(DiagnosticKind::MultipleResults, def.name_span));
        }
        match (frame.result_place, frame.const_result) {
            (Some(place), _) => Ok(Typed::Rt(self.read_place(&place))),
            (None, Some(value)) => Ok(Typed::Const(value)),
            (None, None) if result_ty == Type::None => Ok(Typed::Const(Value::None)),
            (None, None) => Err(self.err(
                DiagnosticKind::WrongResultType {
                    expected: result_ty.to_string(),
                    found: Type::None.to_string(),
                },
                span,
            )),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn call_runtime(
        &mut self,
        fid: FuncId,
        def: &crate::ast::FuncDef,
        params: &[ParamInfo],
        processed: Vec<Processed>,
        result_ty: Type,
        self_ctx: Option<(TemplateId, Selector)>,
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        if self.in_compile_context() {
            return Err(self.err(
                DiagnosticKind::RuntimeInConstContext("a compile-time function body".to_string()),
                span,
            ));
        }

        let consts: Vec<Option<Value>> = processed
            .iter()
            .map(|p| match p {
                Processed::Const(v) => Some(v.clone()),
                _ => None,
            })
            .collect();
        let key = instance_key(&consts);

        let template = self_ctx.as_ref().map(|(t, _)| *t);
        let instance = match self.funcs[fid.index()].instances.get(&key) {
            Some(instance) => instance.clone(),
            None => self.compile_instance(fid, def, params, &consts, key, template, None)?,
        };

        // Copy arguments in.
        let mut ref_backs: Vec<(RtPlace, RtPlace)> = Vec::new();
        for ((entry, place), param) in processed
            .into_iter()
            .zip(instance.param_places.iter())
            .zip(params)
        {
            match entry {
                Processed::Const(_) => {}
                Processed::Val(typed) => {
                    let place = place.clone().expect("value params have places");
                    let found = self.typed_type(&typed);
                    if !param.ty.accepts(&found) {
                        return Err(self.arg_type_error(param, &found, span));
                    }
                    self.store(&place, typed, span, false)?;
                }
                Processed::Ref(caller_place) => {
                    let place = place.clone().expect("ref params have places");
                    let value = Typed::Rt(self.read_place(&caller_place));
                    self.store(&place, value, span, false)?;
                    ref_backs.push((caller_place, place));
                }
            }
        }

        let call = Op::Call(instance.path.clone());
        match &self_ctx {
            Some((_, sel)) => self.emit(Op::As {
                target: sel.clone(),
                body: vec![call],
            }),
            None => self.emit(call),
        }

        // Reference parameters use copy-in/copy-out: commands cannot alias
        // a different location per call against a single compiled body.
        for (caller_place, param_place) in ref_backs {
            let value = Typed::Rt(self.read_place(&param_place));
            self.store(&caller_place, value, span, false)?;
        }

        match instance.result_place {
            Some(place) => {
                let value = self.read_place(&place);
                Ok(Typed::Rt(self.detach_result(value)))
            }
            None if result_ty == Type::None => Ok(Typed::Const(Value::None)),
            None => Ok(Typed::Const(Value::None)),
        }
    }

    /// Copy scalar results out of the shared result slot so a later call
    /// cannot clobber this call's value.
    fn detach_result(&mut self, value: RtValue) -> RtValue {
        match value {
            RtValue::Int(score) => RtValue::Int(self.copy_int(score)),
            RtValue::Bool(b) => {
                let score = self.materialize_bool(b);
                RtValue::Bool(super::RtBool::Score(self.copy_int(score)))
            }
            other => other,
        }
    }

    /// Compile one body of a runtime function, optionally reusing the
    /// storage of a virtual origin so every override shares its slots.
    #[allow(clippy::too_many_arguments)]
    fn compile_instance(
        &mut self,
        fid: FuncId,
        def: &crate::ast::FuncDef,
        params: &[ParamInfo],
        consts: &[Option<Value>],
        key: String,
        template: Option<TemplateId>,
        shared: Option<(&[Option<RtPlace>], Option<&RtPlace>)>,
    ) -> Result<FuncInstance, Diagnostic> {
        let result_ty = self.funcs[fid.index()].result.clone();
        let path = self.internal_path("fn");

        let param_places: Vec<Option<RtPlace>> = match shared {
            Some((places, _)) => places.to_vec(),
            None => {
                let mut places = Vec::with_capacity(params.len());
                for param in params {
                    places.push(match param.port {
                        ParamPort::Const => None,
                        _ => Some(self.alloc_place(&param.ty, def.span)?),
                    });
                }
                places
            }
        };
        let result_place = match shared {
            Some((_, result)) => result.cloned(),
            None if result_ty.has_runtime_form() => Some(self.alloc_place(&result_ty, def.span)?),
            None => None,
        };

        let instance = FuncInstance {
            path: path.clone(),
            param_places: param_places.clone(),
            result_place: result_place.clone(),
        };
        // Register before compiling the body so recursive calls resolve.
        self.funcs[fid.index()]
            .instances
            .insert(key, instance.clone());

        self.push_scope(ScopeKind::Function { compile_only: false });
        self.frames.push(Frame {
            result_ty,
            result_place,
            const_result: None,
            results_seen: 0,
            flavor: FuncFlavor::Runtime,
            self_value: template.map(|t| RtValue::Entity {
                template: t,
                sel: Selector::executor(),
            }),
            new_template: (def.name == "new").then_some(template).flatten(),
        });

        let outcome = (|| {
            for ((param, place), constant) in params.iter().zip(&param_places).zip(consts) {
                let binding = match (place, constant) {
                    (Some(place), _) => Binding::Rt {
                        ty: param.ty.clone(),
                        place: place.clone(),
                    },
                    (None, Some(value)) => Binding::Const(value.clone()),
                    (None, None) => {
                        return Err(self.err(
                            DiagnosticKind::ArgNotConst(param.name.clone()),
                            def.span,
                        ));
                    }
                };
                self.declare(&param.name, binding, def.name_span)?;
            }
            self.with_sink(|a| a.analyze_block(&def.body))
        })();

        self.frames.pop();
        self.pop_scope();
        let ((), ops) = outcome?;
        self.files.insert(path, ops);
        Ok(instance)
    }

    /// Get (compiling on demand) the default-arguments instance of a
    /// template's method; dispatch tables and direct virtual calls route
    /// through this.
    pub(crate) fn ensure_method_instance(
        &mut self,
        template: TemplateId,
        method: &str,
    ) -> Result<FnPath, Diagnostic> {
        let entry = self.templates[template.index()]
            .methods
            .get(method)
            .expect("caller verified the method exists")
            .clone();
        let fid = entry.func;
        if let Some(instance) = self.funcs[fid.index()].instances.values().next() {
            return Ok(instance.path.clone());
        }

        let def = Rc::clone(&self.funcs[fid.index()].def);
        let params = self.funcs[fid.index()].params.clone();
        let consts: Vec<Option<Value>> = params
            .iter()
            .map(|p| match p.port {
                ParamPort::Const => p.default.clone(),
                _ => None,
            })
            .collect();
        let key = instance_key(&consts);

        // Overrides of a virtual share the origin's parameter and result
        // storage, so one copy-in site serves whichever body the dispatch
        // table picks.
        let shared = match entry.virtual_origin {
            Some(origin) if origin != template => {
                let origin_fid = self.templates[origin.index()]
                    .methods
                    .get(method)
                    .expect("origin keeps its virtual")
                    .func;
                if origin_fid != fid {
                    self.ensure_method_instance(origin, method)?;
                    let origin_instance = self.funcs[origin_fid.index()]
                        .instances
                        .values()
                        .next()
                        .expect("ensured above")
                        .clone();
                    Some(origin_instance)
                } else {
                    None
                }
            }
            _ => None,
        };

        let owner = entry.owner;
        let instance = match &shared {
            Some(origin_instance) => self.compile_instance(
                fid,
                &def,
                &params,
                &consts,
                key,
                Some(owner),
                Some((
                    &origin_instance.param_places,
                    origin_instance.result_place.as_ref(),
                )),
            )?,
            None => self.compile_instance(fid, &def, &params, &consts, key, Some(owner), None)?,
        };
        Ok(instance.path)
    }

    // ---- methods -----------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn method_call(
        &mut self,
        template: TemplateId,
        sel: Selector,
        attr: &str,
        attr_span: Span,
        args: &[Arg],
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        let Some(entry) = self.templates[template.index()].methods.get(attr).cloned() else {
            return Err(self.err(
                DiagnosticKind::HasNoAttribute {
                    ty: self.templates[template.index()].name.clone(),
                    attr: attr.to_string(),
                },
                attr_span,
            ));
        };

        if entry.qualifier == MethodQualifier::Static {
            return self.call_function(entry.func, None, args, span);
        }

        let flavor = self.funcs[entry.func.index()].flavor;
        if flavor != FuncFlavor::Runtime {
            // Inline methods lower at the call site with `self` bound to
            // the actual instance selector.
            return self.call_function(entry.func, Some((template, sel)), args, span);
        }

        match entry.virtual_origin {
            Some(origin) => self.virtual_call(origin, template, sel, attr, args, span),
            None => self.call_function(entry.func, Some((template, sel)), args, span),
        }
    }

    /// Copy arguments into the origin's shared slots, then run the
    /// tag-guarded dispatch table as the receiver.
    #[allow(clippy::too_many_arguments)]
    fn virtual_call(
        &mut self,
        origin: TemplateId,
        template: TemplateId,
        sel: Selector,
        method: &str,
        args: &[Arg],
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        let origin_fid = self.templates[origin.index()]
            .methods
            .get(method)
            .expect("origin keeps its virtual")
            .func;
        self.ensure_method_instance(origin, method)?;
        let origin_instance = self.funcs[origin_fid.index()]
            .instances
            .values()
            .next()
            .expect("ensured above")
            .clone();
        let params = self.funcs[origin_fid.index()].params.clone();
        let name = self.funcs[origin_fid.index()].name.clone();
        let result_ty = self.funcs[origin_fid.index()].result.clone();

        let bound = self.bind_args(&name, &params, args, span)?;
        let processed = self.process_args(&params, &bound, span)?;
        for ((entry, place), param) in processed
            .into_iter()
            .zip(origin_instance.param_places.iter())
            .zip(&params)
        {
            match entry {
                Processed::Val(typed) => {
                    let place = place.clone().expect("value params have places");
                    self.store(&place, typed, span, false)?;
                }
                // The shared dispatch body was compiled against the const
                // defaults; per-call const values and aliases cannot vary
                // under it.
                Processed::Const(value) => {
                    if param.default.as_ref() != Some(&value) {
                        return Err(self.err(
                            DiagnosticKind::ArgNotConst(param.name.clone()),
                            span,
                        ));
                    }
                }
                Processed::Ref(_) => {
                    return Err(self.err(
                        DiagnosticKind::CantRefArg(param.name.clone()),
                        span,
                    ));
                }
            }
        }

        let path = match self.dispatch_requests.get(&(origin, method.to_string())) {
            Some(path) => path.clone(),
            None => {
                let path = self.internal_path("dispatch");
                self.dispatch_requests
                    .insert((origin, method.to_string()), path.clone());
                path
            }
        };
        let _ = template;
        self.emit(Op::As {
            target: sel,
            body: vec![Op::Call(path)],
        });

        match origin_instance.result_place {
            Some(place) => {
                let value = self.read_place(&place);
                Ok(Typed::Rt(self.detach_result(value)))
            }
            None => {
                let _ = result_ty;
                Ok(Typed::Const(Value::None))
            }
        }
    }

    // ---- entity instantiation ----------------------------------------------

    fn instantiate(
        &mut self,
        template: TemplateId,
        args: &[Arg],
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        if self.in_compile_context() {
            return Err(self.err(
                DiagnosticKind::RuntimeInConstContext("a compile-time function body".to_string()),
                span,
            ));
        }

        let info = &self.templates[template.index()];
        let entity_type = info.entity_type.clone();
        let pos = info.spawn_pos.clone().unwrap_or_else(|| "~ ~ ~".to_string());
        let mut tags: Vec<TagId> = vec![info.exact_tag];
        for mro_template in &info.mro {
            tags.push(self.templates[mro_template.index()].member_tag);
        }
        let constructor = info.methods.get("new").map(|m| m.func);
        let fields: Vec<(super::FieldStorage, Type)> = info
            .fields
            .values()
            .map(|f| (f.storage.clone(), f.ty.clone()))
            .collect();

        let inst_tag = self.alloc_tag("e");
        tags.insert(0, inst_tag);
        self.emit(Op::Summon {
            entity_type,
            pos,
            tags,
        });

        // Integer fields start at 0; boolean fields are false by absence.
        let sel = Selector::all_tagged(inst_tag);
        for (storage, ty) in fields {
            self.zero_field(&sel, &storage, &ty);
        }

        if let Some(fid) = constructor {
            self.call_function(fid, Some((template, sel.clone())), args, span)?;
        } else if !args.is_empty() {
            let name = self.templates[template.index()].name.clone();
            return Err(self.err(DiagnosticKind::TooManyArgs(name), span));
        }

        Ok(Typed::Rt(RtValue::Entity { template, sel }))
    }

    fn zero_field(&mut self, sel: &Selector, storage: &super::FieldStorage, ty: &Type) {
        match storage {
            super::FieldStorage::IntObj(obj) => self.emit(Op::SetConst {
                target: crate::ir::ScoreRef::Entity {
                    target: sel.clone(),
                    obj: *obj,
                },
                value: 0,
            }),
            super::FieldStorage::BoolTag(_) => {}
            super::FieldStorage::Struct(fields) => {
                if let Type::Struct { id, .. } = ty {
                    let field_types: Vec<(String, Type)> = self.structs[id.index()]
                        .fields
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    for (name, field_ty) in field_types {
                        if let Some(storage) = fields.get(&name) {
                            self.zero_field(sel, &storage.clone(), &field_ty);
                        }
                    }
                }
            }
        }
    }

    // ---- groups and filters ------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn group_call(
        &mut self,
        template: TemplateId,
        tag: TagId,
        attr: &str,
        attr_span: Span,
        args: &[Arg],
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        let group_sel = Selector::all_tagged(tag);
        match attr {
            "add" | "remove" => {
                let [arg] = args else {
                    return Err(self.err(
                        DiagnosticKind::MissingArg {
                            func: attr.to_string(),
                            arg: "entity".to_string(),
                        },
                        span,
                    ));
                };
                let typed = self.analyze_expr(&arg.value)?;
                let Typed::Rt(RtValue::Entity { template: et, sel }) = typed else {
                    return Err(self.err(
                        DiagnosticKind::WrongArgType {
                            arg: "entity".to_string(),
                            expected: self.template_type(template).to_string(),
                            found: self.typed_type(&typed).to_string(),
                        },
                        arg.span,
                    ));
                };
                if !self.templates[et.index()].mro.contains(&template) {
                    return Err(self.err(
                        DiagnosticKind::WrongArgType {
                            arg: "entity".to_string(),
                            expected: self.template_type(template).to_string(),
                            found: self.template_type(et).to_string(),
                        },
                        arg.span,
                    ));
                }
                if attr == "add" {
                    self.emit(Op::TagAdd { target: sel, tag });
                } else {
                    self.emit(Op::TagRemove { target: sel, tag });
                }
                Ok(Typed::Const(Value::None))
            }
            "clear" => {
                self.expect_no_args(attr, args, span)?;
                self.emit(Op::TagRemove {
                    target: group_sel,
                    tag,
                });
                Ok(Typed::Const(Value::None))
            }
            "kill" => {
                self.expect_no_args(attr, args, span)?;
                self.emit(Op::Kill { target: group_sel });
                Ok(Typed::Const(Value::None))
            }
            "select" => {
                let [arg] = args else {
                    return Err(self.err(
                        DiagnosticKind::MissingArg {
                            func: attr.to_string(),
                            arg: "filter".to_string(),
                        },
                        span,
                    ));
                };
                let typed = self.analyze_expr(&arg.value)?;
                let Typed::Const(Value::Filter(filter)) = typed else {
                    return Err(self.err(
                        DiagnosticKind::WrongArgType {
                            arg: "filter".to_string(),
                            expected: Type::Enfilter.to_string(),
                            found: self.typed_type(&typed).to_string(),
                        },
                        arg.span,
                    ));
                };
                let member = self.templates[template.index()].member_tag;
                let base = Selector {
                    base: crate::ir::SelBase::AllEntities,
                    args: vec![crate::ir::SelArg::Tag(member)],
                };
                let target = self.apply_filter(base, &filter);
                self.emit(Op::TagAdd { target, tag });
                Ok(Typed::Const(Value::None))
            }
            "size" => {
                self.expect_no_args(attr, args, span)?;
                let tmp = self.alloc_slot();
                self.emit(Op::SetConst {
                    target: tmp.clone(),
                    value: 0,
                });
                self.emit(Op::As {
                    target: group_sel,
                    body: vec![Op::AddConst {
                        target: tmp.clone(),
                        value: 1,
                    }],
                });
                Ok(Typed::Rt(RtValue::Int(tmp)))
            }
            _ => Err(self.err(
                DiagnosticKind::HasNoAttribute {
                    ty: self.engroup_type(template).to_string(),
                    attr: attr.to_string(),
                },
                attr_span,
            )),
        }
    }

    fn expect_no_args(&self, func: &str, args: &[Arg], span: Span) -> Result<(), Diagnostic> {
        if args.is_empty() {
            Ok(())
        } else {
            Err(self.err(DiagnosticKind::TooManyArgs(func.to_string()), span))
        }
    }

    fn filter_call(
        &mut self,
        filter: FilterValue,
        attr: &str,
        attr_span: Span,
        args: &[Arg],
    ) -> Result<Typed, Diagnostic> {
        let const_arg = |a: &mut Analyzer, arg: &Arg| -> Result<Value, Diagnostic> {
            let typed = a.analyze_expr(&arg.value)?;
            match typed {
                Typed::Const(v) => Ok(v),
                Typed::Rt(_) => Err(a.err(
                    DiagnosticKind::ArgNotConst(attr.to_string()),
                    arg.span,
                )),
            }
        };
        let abs_pos = |a: &Analyzer, value: &Value, span: Span| -> Result<(f64, f64, f64), Diagnostic> {
            let Value::Pos(pos) = value else {
                return Err(a.err(
                    DiagnosticKind::WrongArgType {
                        arg: "pos".to_string(),
                        expected: Type::Pos.to_string(),
                        found: value.type_of().to_string(),
                    },
                    span,
                ));
            };
            pos.abs_xyz().ok_or_else(|| {
                a.err(
                    DiagnosticKind::InvalidOperand {
                        op: "selector position".to_string(),
                        operands: "relative coordinates".to_string(),
                    },
                    span,
                )
            })
        };

        match attr {
            "is_type" => {
                let [arg] = args else {
                    return Err(self.err(
                        DiagnosticKind::MissingArg {
                            func: attr.to_string(),
                            arg: "entity_type".to_string(),
                        },
                        attr_span,
                    ));
                };
                let value = const_arg(self, arg)?;
                let Value::Str(s) = &value else {
                    return Err(self.err(
                        DiagnosticKind::WrongArgType {
                            arg: "entity_type".to_string(),
                            expected: Type::Str.to_string(),
                            found: value.type_of().to_string(),
                        },
                        arg.span,
                    ));
                };
                let Some(text) = s.as_plain() else {
                    return Err(self.err(DiagnosticKind::ArgNotConst("entity_type".into()), arg.span));
                };
                Ok(Typed::Const(Value::Filter(
                    filter.with(format!("type={text}")),
                )))
            }
            "random" => {
                let [arg] = args else {
                    return Err(self.err(
                        DiagnosticKind::MissingArg {
                            func: attr.to_string(),
                            arg: "limit".to_string(),
                        },
                        attr_span,
                    ));
                };
                let value = const_arg(self, arg)?;
                let Value::Int(n) = value else {
                    return Err(self.err(
                        DiagnosticKind::WrongArgType {
                            arg: "limit".to_string(),
                            expected: Type::Int.to_string(),
                            found: value.type_of().to_string(),
                        },
                        arg.span,
                    ));
                };
                let mut out = filter.with(format!("c={n}"));
                out.random = true;
                Ok(Typed::Const(Value::Filter(out)))
            }
            "nearest_from" => {
                let [arg] = args else {
                    return Err(self.err(
                        DiagnosticKind::MissingArg {
                            func: attr.to_string(),
                            arg: "pos".to_string(),
                        },
                        attr_span,
                    ));
                };
                let value = const_arg(self, arg)?;
                let (x, y, z) = abs_pos(self, &value, arg.span)?;
                let out = filter
                    .with(format!("x={}", fmt_number(x)))
                    .with(format!("y={}", fmt_number(y)))
                    .with(format!("z={}", fmt_number(z)))
                    .with("c=1".to_string());
                Ok(Typed::Const(Value::Filter(out)))
            }
            "distance_from" => {
                let [pos_arg, max_arg] = args else {
                    return Err(self.err(
                        DiagnosticKind::MissingArg {
                            func: attr.to_string(),
                            arg: "pos, max".to_string(),
                        },
                        attr_span,
                    ));
                };
                let pos_value = const_arg(self, pos_arg)?;
                let (x, y, z) = abs_pos(self, &pos_value, pos_arg.span)?;
                let max_value = const_arg(self, max_arg)?;
                let max = match max_value {
                    Value::Int(v) => f64::from(v),
                    Value::Float(v) => v,
                    other => {
                        return Err(self.err(
                            DiagnosticKind::WrongArgType {
                                arg: "max".to_string(),
                                expected: Type::Float.to_string(),
                                found: other.type_of().to_string(),
                            },
                            max_arg.span,
                        ));
                    }
                };
                let out = filter
                    .with(format!("x={}", fmt_number(x)))
                    .with(format!("y={}", fmt_number(y)))
                    .with(format!("z={}", fmt_number(z)))
                    .with(format!("r={}", fmt_number(max)));
                Ok(Typed::Const(Value::Filter(out)))
            }
            _ => Err(self.err(
                DiagnosticKind::HasNoAttribute {
                    ty: Type::Enfilter.to_string(),
                    attr: attr.to_string(),
                },
                attr_span,
            )),
        }
    }

    // ---- struct construction and type constructors -------------------------

    fn construct_struct(
        &mut self,
        id: acacia_core::StructId,
        args: &[Arg],
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        let name = self.structs[id.index()].name.clone();
        let params: Vec<ParamInfo> = self.structs[id.index()]
            .fields
            .iter()
            .map(|(field, ty)| ParamInfo {
                name: field.clone(),
                port: ParamPort::ByValue,
                ty: ty.clone(),
                default: None,
            })
            .collect();
        let bound = self.bind_args(&name, &params, args, span)?;
        let mut fields = indexmap::IndexMap::new();
        for (param, slot) in params.iter().zip(&bound) {
            let arg = slot.expect("no defaults, so bind_args filled every slot");
            let typed = self.analyze_expr(&arg.value)?;
            let Typed::Const(value) = typed else {
                return Err(self.err(DiagnosticKind::ArgNotConst(param.name.clone()), arg.span));
            };
            let found = value.type_of();
            if !param.ty.accepts(&found) {
                return Err(self.arg_type_error(param, &found, arg.span));
            }
            fields.insert(param.name.clone(), value);
        }
        Ok(Typed::Const(Value::Struct { id, name, fields }))
    }

    fn type_ctor(&mut self, ty: Type, args: &[Arg], span: Span) -> Result<Typed, Diagnostic> {
        match ty {
            Type::Pos => {
                let (x, y, z) = self.three_numbers("Pos", args, span)?;
                Ok(Typed::Const(Value::Pos(PosValue {
                    x: Coord::Abs(x),
                    y: Coord::Abs(y),
                    z: Coord::Abs(z),
                })))
            }
            Type::Offset => {
                let (x, y, z) = self.three_numbers("Offset", args, span)?;
                Ok(Typed::Const(Value::Offset(PosValue {
                    x: Coord::Rel(x),
                    y: Coord::Rel(y),
                    z: Coord::Rel(z),
                })))
            }
            Type::Rot => {
                let numbers = self.const_numbers("Rot", args, 2, span)?;
                Ok(Typed::Const(Value::Rot(RotValue {
                    yaw: numbers[0],
                    pitch: numbers[1],
                })))
            }
            Type::Enfilter => {
                self.expect_no_args("Enfilter", args, span)?;
                Ok(Typed::Const(Value::Filter(FilterValue::default())))
            }
            Type::Engroup { template, .. } => {
                if self.in_compile_context() {
                    return Err(self.err(
                        DiagnosticKind::RuntimeInConstContext(
                            "a compile-time function body".to_string(),
                        ),
                        span,
                    ));
                }
                self.expect_no_args("Engroup", args, span)?;
                let tag = self.alloc_tag("g");
                Ok(Typed::Rt(RtValue::Group { template, tag }))
            }
            other => Err(self.err(DiagnosticKind::Uncallable(other.to_string()), span)),
        }
    }

    fn three_numbers(
        &mut self,
        what: &str,
        args: &[Arg],
        span: Span,
    ) -> Result<(f64, f64, f64), Diagnostic> {
        let numbers = self.const_numbers(what, args, 3, span)?;
        Ok((numbers[0], numbers[1], numbers[2]))
    }

    fn const_numbers(
        &mut self,
        what: &str,
        args: &[Arg],
        want: usize,
        span: Span,
    ) -> Result<Vec<f64>, Diagnostic> {
        if args.len() != want {
            return Err(self.err(
                if args.len() > want {
                    DiagnosticKind::TooManyArgs(what.to_string())
                } else {
                    DiagnosticKind::MissingArg {
                        func: what.to_string(),
                        arg: format!("{want} coordinates"),
                    }
                },
                span,
            ));
        }
        let mut numbers = Vec::with_capacity(want);
        for arg in args {
            let typed = self.analyze_expr(&arg.value)?;
            let value = match typed {
                Typed::Const(Value::Int(v)) => f64::from(v),
                Typed::Const(Value::Float(v)) => v,
                other => {
                    return Err(self.err(
                        DiagnosticKind::WrongArgType {
                            arg: what.to_string(),
                            expected: Type::Float.to_string(),
                            found: self.typed_type(&other).to_string(),
                        },
                        arg.span,
                    ));
                }
            };
            numbers.push(value);
        }
        Ok(numbers)
    }

    // ---- builtins ----------------------------------------------------------

    fn call_builtin(
        &mut self,
        module: &'static str,
        name: &'static str,
        args: &[Arg],
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        match (module, name) {
            ("builtins", "len") => {
                let [arg] = args else {
                    return Err(self.err(
                        DiagnosticKind::MissingArg {
                            func: "len".to_string(),
                            arg: "value".to_string(),
                        },
                        span,
                    ));
                };
                let typed = self.analyze_expr(&arg.value)?;
                let Typed::Const(value) = typed else {
                    return Err(self.err(DiagnosticKind::ArgNotConst("value".into()), arg.span));
                };
                let len = match &value {
                    Value::List(items) => items.len(),
                    Value::Map(entries) => entries.len(),
                    Value::Str(s) => match s.as_plain() {
                        Some(text) => text.chars().count(),
                        None => {
                            return Err(self.err(
                                DiagnosticKind::ArgNotConst("value".into()),
                                arg.span,
                            ));
                        }
                    },
                    other => {
                        return Err(self.err(
                            DiagnosticKind::InvalidOperand {
                                op: "len".to_string(),
                                operands: format!("`{}`", other.type_of()),
                            },
                            arg.span,
                        ));
                    }
                };
                Ok(Typed::Const(Value::Int(len as i32)))
            }
            ("types", "Engroup") => Err(self.err(
                DiagnosticKind::Uncallable("Engroup (write `Engroup[Template]()`)".to_string()),
                span,
            )),
            ("print", method) => self.builtin_print(method, args, span),
            ("math", method) => self.builtin_math(method, args, span),
            _ => Err(self.err(DiagnosticKind::Uncallable(name.to_string()), span)),
        }
    }

    fn builtin_print(
        &mut self,
        method: &str,
        args: &[Arg],
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        if self.in_compile_context() {
            return Err(self.err(
                DiagnosticKind::RuntimeInConstContext("a compile-time function body".to_string()),
                span,
            ));
        }
        let params = [
            ParamInfo {
                name: "message".to_string(),
                port: ParamPort::Const,
                ty: Type::Str,
                default: None,
            },
            ParamInfo {
                name: "target".to_string(),
                port: ParamPort::Const,
                ty: Type::Str,
                default: Some(Value::Str(crate::value::FString::plain("@a"))),
            },
            ParamInfo {
                name: "mode".to_string(),
                port: ParamPort::Const,
                ty: Type::Str,
                default: Some(Value::Str(crate::value::FString::plain("title"))),
            },
        ];
        let wanted = match method {
            "tell" => &params[..2],
            "title" => &params[..3],
            _ => {
                return Err(self.err(
                    DiagnosticKind::ModuleNoAttribute {
                        module: "print".to_string(),
                        attr: method.to_string(),
                    },
                    span,
                ));
            }
        };
        let bound = self.bind_args(method, wanted, args, span)?;
        let processed = self.process_args(wanted, &bound, span)?;

        let mut values = processed.into_iter().map(|p| match p {
            Processed::Const(v) => v,
            _ => unreachable!("const ports always produce constants"),
        });
        let Some(Value::Str(message)) = values.next() else {
            unreachable!("message param is typed str");
        };
        let target = match values.next() {
            Some(Value::Str(s)) => s.as_plain().unwrap_or_else(|| "@a".to_string()),
            _ => "@a".to_string(),
        };
        let parts: Vec<TextPart> = message
            .parts
            .into_iter()
            .map(|part| match part {
                FsPart::Text(t) => TextPart::Text(t),
                FsPart::Score(s) => TextPart::Score(s),
            })
            .collect();

        if method == "tell" {
            self.emit(Op::Tellraw { target, parts });
        } else {
            let mode = match values.next() {
                Some(Value::Str(s)) => s.as_plain().unwrap_or_else(|| "title".to_string()),
                _ => "title".to_string(),
            };
            self.emit(Op::Titleraw {
                target,
                mode,
                parts,
            });
        }
        Ok(Typed::Const(Value::None))
    }

    fn builtin_math(
        &mut self,
        method: &str,
        args: &[Arg],
        span: Span,
    ) -> Result<Typed, Diagnostic> {
        let mut ints = Vec::with_capacity(args.len());
        for arg in args {
            let typed = self.analyze_expr(&arg.value)?;
            let Typed::Const(Value::Int(v)) = typed else {
                return Err(self.err(
                    DiagnosticKind::WrongArgType {
                        arg: method.to_string(),
                        expected: Type::Int.to_string(),
                        found: self.typed_type(&typed).to_string(),
                    },
                    arg.span,
                ));
            };
            ints.push(v);
        }
        let want = |a: &Analyzer, n: usize| -> Result<(), Diagnostic> {
            if ints.len() == n {
                Ok(())
            } else if ints.len() > n {
                Err(a.err(DiagnosticKind::TooManyArgs(method.to_string()), span))
            } else {
                Err(a.err(
                    DiagnosticKind::MissingArg {
                        func: method.to_string(),
                        arg: format!("{n} integers"),
                    },
                    span,
                ))
            }
        };
        let arith =
            |a: &Analyzer, what: &str| a.err(DiagnosticKind::ConstArithmetic(what.to_string()), span);
        let result = match method {
            "min" => {
                want(self, 2)?;
                ints[0].min(ints[1])
            }
            "max" => {
                want(self, 2)?;
                ints[0].max(ints[1])
            }
            "abs" => {
                want(self, 1)?;
                ints[0].checked_abs().ok_or_else(|| arith(self, "overflow"))?
            }
            "pow" => {
                want(self, 2)?;
                if ints[1] < 0 {
                    return Err(arith(self, "negative power"));
                }
                ints[0]
                    .checked_pow(ints[1] as u32)
                    .ok_or_else(|| arith(self, "overflow"))?
            }
            _ => {
                return Err(self.err(
                    DiagnosticKind::ModuleNoAttribute {
                        module: "math".to_string(),
                        attr: method.to_string(),
                    },
                    span,
                ));
            }
        };
        Ok(Typed::Const(Value::Int(result)))
    }
}

fn instance_key(consts: &[Option<Value>]) -> String {
    let mut key = String::new();
    for entry in consts {
        match entry {
            Some(value) => key.push_str(&format!("{value}\u{1f}")),
            None => key.push('\u{1f}'),
        }
    }
    key
}

/// Syntactic count of `result` statements, recursively.
fn count_results(stmts: &[Stmt]) -> u32 {
    let mut count = 0;
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Result(_) => count += 1,
            StmtKind::If { arms, orelse } => {
                for (_, body) in arms {
                    count += count_results(body);
                }
                count += count_results(orelse);
            }
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                count += count_results(body);
            }
            _ => {}
        }
    }
    count
}
