//! Entity and struct template registration: field/method dictionary merging
//! along the MRO, C3 linearization, and function registration.

use std::collections::VecDeque;
use std::rc::Rc;

use indexmap::IndexMap;

use acacia_core::{FuncId, Span, TemplateId};

use crate::ast::{
    EntityDef, FuncDef, FuncFlavor, MethodQualifier, ParamPort, StructDef,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::types::Type;
use crate::value::Value;

use super::{
    Analyzer, Binding, EFieldInfo, FieldStorage, FuncInfo, MethodInfo, StructInfo, TemplateInfo,
    Typed,
};

impl Analyzer {
    // ---- functions ---------------------------------------------------------

    /// Resolve a function's signature and register it. Bodies compile
    /// lazily, at the first call with each const-argument signature.
    pub(crate) fn register_function(
        &mut self,
        def: &FuncDef,
        template: Option<TemplateId>,
    ) -> Result<FuncId, Diagnostic> {
        let mut params = Vec::with_capacity(def.params.len());
        for param in &def.params {
            if param.port == ParamPort::ByRef {
                if param.default.is_some() || def.flavor == FuncFlavor::Compile {
                    return Err(self.err(
                        DiagnosticKind::CantRefArg(param.name.clone()),
                        param.span,
                    ));
                }
            }

            let default = match &param.default {
                Some(expr) => {
                    let typed = self.analyze_expr(expr)?;
                    let Typed::Const(value) = typed else {
                        let kind = if def.flavor == FuncFlavor::Compile {
                            DiagnosticKind::ArgDefaultNotConst(param.name.clone())
                        } else {
                            DiagnosticKind::NonRefArgDefaultNotConst(param.name.clone())
                        };
                        return Err(self.err(kind, expr.span));
                    };
                    Some(value)
                }
                None => None,
            };

            let ty = match &param.ty {
                Some(expr) => self.resolve_type(expr)?,
                None => match &default {
                    Some(value) => value.type_of(),
                    None => {
                        return Err(self.err(
                            DiagnosticKind::InvalidTypeSpec(format!(
                                "parameter {:?} needs a type or a default",
                                param.name
                            )),
                            param.span,
                        ));
                    }
                },
            };
            if let Some(value) = &default {
                let found = value.type_of();
                if !ty.accepts(&found) {
                    return Err(self.err(
                        DiagnosticKind::WrongArgType {
                            arg: param.name.clone(),
                            expected: ty.to_string(),
                            found: found.to_string(),
                        },
                        param.span,
                    ));
                }
            }
            params.push(super::ParamInfo {
                name: param.name.clone(),
                port: param.port,
                ty,
                default,
            });
        }

        let result = match &def.result_ty {
            Some(expr) => self.resolve_type(expr)?,
            None => Type::None,
        };
        if def.flavor == FuncFlavor::Runtime && result != Type::None && !result.has_runtime_form()
        {
            let span = def.result_ty.as_ref().map_or(def.name_span, |e| e.span);
            return Err(self.err(DiagnosticKind::NonRtResult, span));
        }

        let fid = FuncId::from_raw(self.funcs.len() as u32);
        self.funcs.push(FuncInfo {
            name: def.name.clone(),
            def: Rc::new(def.clone()),
            source: self.src,
            params,
            result,
            flavor: def.flavor,
            qualifier: def.qualifier,
            template,
            instances: IndexMap::new(),
        });
        Ok(fid)
    }

    // ---- structs -----------------------------------------------------------

    pub(crate) fn register_struct(&mut self, def: &StructDef) -> Result<(), Diagnostic> {
        let mut fields: IndexMap<String, Type> = IndexMap::new();
        let mut entity_storable = true;
        for field in &def.fields {
            if fields.contains_key(&field.name) {
                return Err(self.err(
                    DiagnosticKind::DuplicateStructField(field.name.clone()),
                    field.name_span,
                ));
            }
            let ty = self.resolve_type(&field.ty)?;
            if !ty.storable_in_struct() {
                return Err(self.err(
                    DiagnosticKind::UnsupportedStructField {
                        field: field.name.clone(),
                        ty: ty.to_string(),
                    },
                    field.name_span,
                ));
            }
            entity_storable &= self.field_entity_storable(&ty);
            fields.insert(field.name.clone(), ty);
        }

        let id = acacia_core::StructId::from_raw(self.structs.len() as u32);
        self.structs.push(StructInfo {
            name: def.name.clone(),
            fields,
            entity_storable,
        });
        self.declare(&def.name, Binding::Const(Value::StructTemplate(id)), def.name_span)
    }

    fn field_entity_storable(&self, ty: &Type) -> bool {
        match ty {
            Type::Int | Type::Bool => true,
            Type::Struct { id, .. } => self.structs[id.index()].entity_storable,
            _ => false,
        }
    }

    // ---- entity templates --------------------------------------------------

    pub(crate) fn register_entity(&mut self, def: &EntityDef) -> Result<(), Diagnostic> {
        let mut bases = Vec::with_capacity(def.bases.len());
        for base in &def.bases {
            let typed = self.analyze_expr(base)?;
            let Typed::Const(Value::Template(tid)) = typed else {
                return Err(self.err(
                    DiagnosticKind::InvalidTypeSpec(format!(
                        "`{}` (expected a template)",
                        self.typed_type(&typed)
                    )),
                    base.span,
                ));
            };
            bases.push(tid);
        }

        let tid = TemplateId::from_raw(self.templates.len() as u32);
        let Some(mro) = c3_linearize(tid, &bases, &self.templates) else {
            return Err(self.err(DiagnosticKind::Mro(def.name.clone()), def.name_span));
        };

        let entity_type = match &def.entity_type {
            Some(ty) => ty.clone(),
            None => mro
                .get(1)
                .map(|base| self.templates[base.index()].entity_type.clone())
                .unwrap_or_else(|| "minecraft:armor_stand".to_string()),
        };
        let spawn_pos = match &def.spawn_at {
            Some(expr) => {
                let typed = self.analyze_expr(expr)?;
                let value = self.expect_const(typed, expr)?;
                match value {
                    Value::Pos(p) | Value::Offset(p) => Some(p.render()),
                    other => {
                        return Err(self.err(
                            DiagnosticKind::WrongArgType {
                                arg: "at".to_string(),
                                expected: Type::Pos.to_string(),
                                found: other.type_of().to_string(),
                            },
                            expr.span,
                        ));
                    }
                }
            }
            None => mro
                .iter()
                .skip(1)
                .find_map(|base| self.templates[base.index()].spawn_pos.clone()),
        };

        let fields = self.merge_fields(def, tid, &mro)?;

        let member_tag = self.alloc_named_tag(format!("t.{}", def.name));
        let exact_tag = self.alloc_named_tag(format!("x.{}", def.name));

        // Methods reference the template type in their signatures, so the
        // template is registered provisionally and discarded if merging
        // fails.
        self.templates.push(TemplateInfo {
            name: def.name.clone(),
            bases,
            mro: mro.clone(),
            entity_type,
            spawn_pos,
            fields,
            methods: IndexMap::new(),
            member_tag,
            exact_tag,
        });
        self.push_scope(super::ScopeKind::Block);
        let _ = self.declare(&def.name, Binding::Const(Value::Template(tid)), def.name_span);

        let merged = self.merge_methods(def, tid, &mro);
        self.pop_scope();
        let methods = match merged {
            Ok(methods) => methods,
            Err(diag) => {
                self.templates.pop();
                return Err(diag);
            }
        };

        // Fields and methods share one namespace.
        if let Some(name) = self.templates[tid.index()]
            .fields
            .keys()
            .find(|k| methods.contains_key(*k))
        {
            let name = name.clone();
            self.templates.pop();
            return Err(self.err(DiagnosticKind::MethodAttrConflict(name), def.name_span));
        }

        self.templates[tid.index()].methods = methods;
        self.declare(&def.name, Binding::Const(Value::Template(tid)), def.name_span)
    }

    fn merge_fields(
        &mut self,
        def: &EntityDef,
        tid: TemplateId,
        mro: &[TemplateId],
    ) -> Result<IndexMap<String, EFieldInfo>, Diagnostic> {
        // Base-first, so a duplicate is reported against the derived side.
        let mut merged: IndexMap<String, EFieldInfo> = IndexMap::new();
        for base in mro.iter().skip(1).rev() {
            let own: Vec<(String, EFieldInfo)> = self.templates[base.index()]
                .fields
                .iter()
                .filter(|(_, f)| f.owner == *base)
                .map(|(k, f)| (k.clone(), f.clone()))
                .collect();
            for (name, field) in own {
                if merged.contains_key(&name) {
                    return Err(self.err(
                        DiagnosticKind::DuplicateEntityField(name),
                        def.name_span,
                    ));
                }
                merged.insert(name, field);
            }
        }

        for field in &def.fields {
            if merged.contains_key(&field.name) {
                return Err(self.err(
                    DiagnosticKind::DuplicateEntityField(field.name.clone()),
                    field.name_span,
                ));
            }
            let ty = self.resolve_type(&field.ty)?;
            let storage = self.alloc_field_storage(&ty, &field.name, field.name_span)?;
            merged.insert(
                field.name.clone(),
                EFieldInfo {
                    ty,
                    storage,
                    owner: tid,
                },
            );
        }
        Ok(merged)
    }

    fn alloc_field_storage(
        &mut self,
        ty: &Type,
        field: &str,
        span: Span,
    ) -> Result<FieldStorage, Diagnostic> {
        match ty {
            Type::Int => Ok(FieldStorage::IntObj(self.alloc_entity_obj())),
            Type::Bool => Ok(FieldStorage::BoolTag(self.alloc_tag("b"))),
            Type::Struct { id, .. } => {
                if !self.structs[id.index()].entity_storable {
                    return Err(self.err(
                        DiagnosticKind::UnsupportedEntityFieldInStruct {
                            field: field.to_string(),
                            ty: ty.to_string(),
                        },
                        span,
                    ));
                }
                let field_types: Vec<(String, Type)> = self.structs[id.index()]
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let mut storages = IndexMap::new();
                for (name, field_ty) in field_types {
                    storages.insert(
                        name.clone(),
                        self.alloc_field_storage(&field_ty, field, span)?,
                    );
                }
                Ok(FieldStorage::Struct(storages))
            }
            other => Err(self.err(
                DiagnosticKind::UnsupportedEntityField {
                    field: field.to_string(),
                    ty: other.to_string(),
                },
                span,
            )),
        }
    }

    fn merge_methods(
        &mut self,
        def: &EntityDef,
        tid: TemplateId,
        mro: &[TemplateId],
    ) -> Result<IndexMap<String, MethodInfo>, Diagnostic> {
        // `new` is unique along the whole chain.
        let mut new_count = mro
            .iter()
            .skip(1)
            .filter(|base| {
                self.templates[base.index()]
                    .methods
                    .get("new")
                    .is_some_and(|m| m.owner == **base)
            })
            .count();

        // Inherited methods: first definition along the MRO wins.
        let mut inherited: IndexMap<String, MethodInfo> = IndexMap::new();
        for base in mro.iter().skip(1) {
            let own: Vec<(String, MethodInfo)> = self.templates[base.index()]
                .methods
                .iter()
                .filter(|(_, m)| m.owner == *base)
                .map(|(k, m)| (k.clone(), m.clone()))
                .collect();
            for (name, method) in own {
                inherited.entry(name).or_insert(method);
            }
        }

        // Two virtuals of the same name from unrelated bases never merge.
        for (name, method) in &inherited {
            if method.virtual_origin.is_none() {
                continue;
            }
            for base in mro.iter().skip(1) {
                let Some(other) = self.templates[base.index()].methods.get(name) else {
                    continue;
                };
                let (Some(a), Some(b)) = (method.virtual_origin, other.virtual_origin) else {
                    continue;
                };
                if a == b {
                    continue;
                }
                let a_mro = &self.templates[a.index()].mro;
                let b_mro = &self.templates[b.index()].mro;
                if !a_mro.contains(&b) && !b_mro.contains(&a) {
                    return Err(self.err(
                        DiagnosticKind::MultipleVirtualMethods(name.clone()),
                        def.name_span,
                    ));
                }
            }
        }

        let mut merged = inherited;
        for method_def in &def.methods {
            let name = method_def.name.clone();
            if method_def.name == "new" {
                if method_def.flavor == FuncFlavor::Compile {
                    return Err(self.err(
                        DiagnosticKind::CompileFuncNonStaticMethod("new".to_string()),
                        method_def.name_span,
                    ));
                }
                new_count += 1;
                if new_count > 1 {
                    return Err(
                        self.err(DiagnosticKind::MultipleNewMethods, method_def.name_span)
                    );
                }
            }
            if method_def.flavor == FuncFlavor::Compile
                && method_def.qualifier != MethodQualifier::Static
            {
                return Err(self.err(
                    DiagnosticKind::CompileFuncNonStaticMethod(name),
                    method_def.name_span,
                ));
            }
            if matches!(
                method_def.qualifier,
                MethodQualifier::Virtual | MethodQualifier::Override
            ) && method_def.flavor != FuncFlavor::Runtime
            {
                return Err(self.err(
                    DiagnosticKind::VirtualNotRuntime(name),
                    method_def.name_span,
                ));
            }
            if def.methods.iter().filter(|m| m.name == name).count() > 1 {
                return Err(self.err(DiagnosticKind::ShadowedName(name), method_def.name_span));
            }

            let fid = self.register_function(method_def, Some(tid))?;
            let mut info = MethodInfo {
                func: fid,
                qualifier: method_def.qualifier,
                owner: tid,
                virtual_origin: (method_def.qualifier == MethodQualifier::Virtual).then_some(tid),
            };

            match merged.get(&name) {
                None => {
                    if method_def.qualifier == MethodQualifier::Override {
                        return Err(
                            self.err(DiagnosticKind::NotOverriding(name), method_def.name_span)
                        );
                    }
                }
                Some(existing) => {
                    let existing_static = existing.qualifier == MethodQualifier::Static;
                    let own_static = method_def.qualifier == MethodQualifier::Static;
                    if existing_static && !own_static {
                        return Err(self.err(
                            DiagnosticKind::InstOverrideStatic(name),
                            method_def.name_span,
                        ));
                    }
                    if !existing_static && own_static {
                        return Err(self.err(
                            DiagnosticKind::StaticOverrideInst(name),
                            method_def.name_span,
                        ));
                    }
                    match existing.virtual_origin {
                        Some(origin) => {
                            if method_def.qualifier != MethodQualifier::Override {
                                return Err(self.err(
                                    DiagnosticKind::OverrideQualifier(name),
                                    method_def.name_span,
                                ));
                            }
                            let origin_func = self.templates[origin.index()]
                                .methods
                                .get(&name)
                                .expect("origin keeps its virtual")
                                .func;
                            let expected = self.funcs[origin_func.index()].result.clone();
                            let found = self.funcs[fid.index()].result.clone();
                            if expected != found {
                                return Err(self.err(
                                    DiagnosticKind::OverrideResultMismatch {
                                        method: name,
                                        expected: expected.to_string(),
                                        found: found.to_string(),
                                    },
                                    method_def.name_span,
                                ));
                            }
                            info.virtual_origin = Some(origin);
                        }
                        None => match method_def.qualifier {
                            MethodQualifier::Override => {
                                return Err(self.err(
                                    DiagnosticKind::NotOverriding(name),
                                    method_def.name_span,
                                ));
                            }
                            MethodQualifier::Virtual => {
                                return Err(self.err(
                                    DiagnosticKind::VirtualShadowsNonVirtual(name),
                                    method_def.name_span,
                                ));
                            }
                            _ => {}
                        },
                    }
                }
            }
            merged.insert(method_def.name.clone(), info);
        }
        Ok(merged)
    }
}

/// C3 linearization over registered templates.
fn c3_linearize(
    head: TemplateId,
    bases: &[TemplateId],
    templates: &[TemplateInfo],
) -> Option<Vec<TemplateId>> {
    let mut seqs: Vec<VecDeque<TemplateId>> = bases
        .iter()
        .map(|base| templates[base.index()].mro.iter().copied().collect())
        .collect();
    seqs.push(bases.iter().copied().collect());

    let mut result = vec![head];
    loop {
        seqs.retain(|seq| !seq.is_empty());
        if seqs.is_empty() {
            return Some(result);
        }
        // A good head appears in no tail.
        let candidate = seqs
            .iter()
            .map(|seq| seq[0])
            .find(|head| {
                !seqs
                    .iter()
                    .any(|seq| seq.iter().skip(1).any(|entry| entry == head))
            })?;
        result.push(candidate);
        for seq in &mut seqs {
            if seq.front() == Some(&candidate) {
                seq.pop_front();
            }
        }
    }
}
