//! Semantic analysis and lowering.
//!
//! A single top-down walk over the AST that does name resolution through a
//! lexical scope stack, assigns every expression a static type and a world
//! (compile-time value or runtime value), folds constants, unrolls
//! compile-time `for` loops, registers entity/struct templates (computing
//! C3 linearizations), and lowers all runtime work into [`Op`] sinks.
//!
//! Split by concern:
//! - `stmt` - statement walk
//! - `expr` - expression analysis and runtime lowering
//! - `call` - calls, function instances, instantiation, builtins
//! - `template` - entity/struct registration and MRO computation

mod call;
mod expr;
mod stmt;
mod template;

#[cfg(test)]
mod analyzer_tests;

use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;

use acacia_core::{EntityObjId, FuncId, ModuleId, SlotId, Span, StructId, TagId, TemplateId};

use crate::ast::{FuncDef, FuncFlavor, MethodQualifier, Module};
use crate::config::Config;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::ir::{Cond, FnPath, Op, ScoreRef, Selector};
use crate::source::{SourceId, SourceMap};
use crate::types::Type;
use crate::value::Value;

/// Everything the emitter needs: lowered op streams plus the allocation
/// tables that give names to ids.
pub struct LoweredProgram {
    pub init: Vec<Op>,
    pub main: Vec<Op>,
    pub files: IndexMap<FnPath, Vec<Op>>,
    /// Tag suffixes, indexed by `TagId`.
    pub tag_names: Vec<String>,
    /// How many per-attribute entity objectives were allocated.
    pub entity_obj_count: u32,
}

// ---- bindings and runtime shapes ------------------------------------------

/// An assignable runtime location.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RtPlace {
    Int(ScoreRef),
    Bool(BoolPlace),
    Entity { template: TemplateId, tag: TagId },
    Group { template: TemplateId, tag: TagId },
    Struct {
        id: StructId,
        name: String,
        fields: IndexMap<String, RtPlace>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum BoolPlace {
    /// 0/1 score.
    Score(ScoreRef),
    /// Tag presence on the owning entity.
    Tag { owner: Selector, tag: TagId },
}

/// A readable runtime value.
#[derive(Clone, Debug)]
pub(crate) enum RtValue {
    Int(ScoreRef),
    Bool(RtBool),
    Entity { template: TemplateId, sel: Selector },
    Group { template: TemplateId, tag: TagId },
    Struct {
        id: StructId,
        name: String,
        fields: IndexMap<String, RtValue>,
    },
}

#[derive(Clone, Debug)]
pub(crate) enum RtBool {
    /// Materialized 0/1 score.
    Score(ScoreRef),
    /// A conjunction of execute conditions, not yet materialized.
    Conds(Vec<Cond>),
}

/// World-tagged analysis result of an expression.
#[derive(Clone, Debug)]
pub(crate) enum Typed {
    Const(Value),
    Rt(RtValue),
}

/// What a name resolves to.
#[derive(Clone, Debug)]
pub(crate) enum Binding {
    /// Runtime variable occupying allocated storage.
    Rt { ty: Type, place: RtPlace },
    /// Compile-time variable; reassignable, never materialized unless read
    /// into a runtime position.
    CtVar(Value),
    /// `const` binding; not reassignable.
    Const(Value),
    /// Alias of another assignable location.
    Ref { ty: Type, place: RtPlace },
}

// ---- scopes and frames ----------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ScopeKind {
    Root,
    Module,
    /// Function body scope; `compile_only` bodies may not touch runtime
    /// bindings of enclosing scopes.
    Function { compile_only: bool },
    Block,
}

pub(crate) struct Scope {
    pub kind: ScopeKind,
    pub bindings: IndexMap<String, Binding>,
}

/// Per-function analysis state: result slot, `self`, `new` capture.
pub(crate) struct Frame {
    pub result_ty: Type,
    pub result_place: Option<RtPlace>,
    pub const_result: Option<Value>,
    pub results_seen: u32,
    pub flavor: FuncFlavor,
    pub self_value: Option<RtValue>,
    /// Set inside a `new` method: the template being constructed.
    pub new_template: Option<TemplateId>,
}

// ---- registries ------------------------------------------------------------

pub(crate) struct StructInfo {
    pub name: String,
    pub fields: IndexMap<String, Type>,
    /// Whether every leaf field is entity-storable.
    pub entity_storable: bool,
}

/// How one entity field is stored on instances.
#[derive(Clone, Debug)]
pub(crate) enum FieldStorage {
    IntObj(EntityObjId),
    BoolTag(TagId),
    Struct(IndexMap<String, FieldStorage>),
}

#[derive(Clone, Debug)]
pub(crate) struct EFieldInfo {
    pub ty: Type,
    pub storage: FieldStorage,
    pub owner: TemplateId,
}

#[derive(Clone, Debug)]
pub(crate) struct MethodInfo {
    pub func: FuncId,
    pub qualifier: MethodQualifier,
    pub owner: TemplateId,
    /// For virtual/override methods: the template whose `virtual` created
    /// the dispatch slot.
    pub virtual_origin: Option<TemplateId>,
}

pub(crate) struct TemplateInfo {
    pub name: String,
    pub bases: Vec<TemplateId>,
    /// C3 linearization, starting with this template.
    pub mro: Vec<TemplateId>,
    pub entity_type: String,
    /// Rendered spawn position from the `at` clause.
    pub spawn_pos: Option<String>,
    /// Fields merged along the MRO.
    pub fields: IndexMap<String, EFieldInfo>,
    /// Methods merged along the MRO.
    pub methods: IndexMap<String, MethodInfo>,
    /// On every instance whose MRO contains this template.
    pub member_tag: TagId,
    /// Only on instances whose concrete template is exactly this one.
    pub exact_tag: TagId,
}

#[derive(Clone)]
pub(crate) struct ParamInfo {
    pub name: String,
    pub port: crate::ast::ParamPort,
    pub ty: Type,
    pub default: Option<Value>,
}

/// One compiled body of a runtime function, keyed by its const-argument
/// signature.
#[derive(Clone)]
pub(crate) struct FuncInstance {
    pub path: FnPath,
    /// Copy-in locations aligned with params; `None` for const ports.
    pub param_places: Vec<Option<RtPlace>>,
    pub result_place: Option<RtPlace>,
}

pub(crate) struct FuncInfo {
    pub name: String,
    pub def: Rc<FuncDef>,
    pub source: SourceId,
    pub params: Vec<ParamInfo>,
    pub result: Type,
    pub flavor: FuncFlavor,
    pub qualifier: MethodQualifier,
    /// Defining template for methods.
    pub template: Option<TemplateId>,
    pub instances: IndexMap<String, FuncInstance>,
}

pub(crate) struct ModuleInfo {
    pub name: String,
    pub bindings: IndexMap<String, Binding>,
}

pub(crate) enum ModuleState {
    InProgress,
    Done(ModuleId),
}

// ---- the analyzer ----------------------------------------------------------

pub struct Analyzer {
    pub(crate) config: Config,
    pub(crate) sources: SourceMap,
    pub(crate) src: SourceId,
    base_dir: PathBuf,

    // allocation
    next_slot: u32,
    next_entity_obj: u32,
    pub(crate) tag_names: Vec<String>,
    internal_counters: IndexMap<&'static str, u32>,
    const_pool: IndexMap<i32, SlotId>,

    // registries
    pub(crate) templates: Vec<TemplateInfo>,
    pub(crate) structs: Vec<StructInfo>,
    pub(crate) funcs: Vec<FuncInfo>,
    pub(crate) modules: Vec<ModuleInfo>,
    pub(crate) module_cache: IndexMap<PathBuf, ModuleState>,

    // outputs
    pub(crate) init: Vec<Op>,
    pub(crate) files: IndexMap<FnPath, Vec<Op>>,
    pub(crate) interfaces: IndexMap<String, Span>,
    /// Virtual-call tables to generate once every template is known.
    pub(crate) dispatch_requests: IndexMap<(TemplateId, String), FnPath>,

    // walk state
    pub(crate) scopes: Vec<Scope>,
    pub(crate) frames: Vec<Frame>,
    sinks: Vec<Vec<Op>>,
}

impl Analyzer {
    pub fn new(config: Config, sources: SourceMap, entry: SourceId, base_dir: PathBuf) -> Self {
        let mut analyzer = Self {
            config,
            sources,
            src: entry,
            base_dir,
            next_slot: 0,
            next_entity_obj: 0,
            tag_names: Vec::new(),
            internal_counters: IndexMap::new(),
            const_pool: IndexMap::new(),
            templates: Vec::new(),
            structs: Vec::new(),
            funcs: Vec::new(),
            modules: Vec::new(),
            module_cache: IndexMap::new(),
            init: Vec::new(),
            files: IndexMap::new(),
            interfaces: IndexMap::new(),
            dispatch_requests: IndexMap::new(),
            scopes: Vec::new(),
            frames: Vec::new(),
            sinks: Vec::new(),
        };
        analyzer.scopes.push(Scope {
            kind: ScopeKind::Root,
            bindings: crate::module::builtin::root_bindings(),
        });
        analyzer
    }

    /// Analyze and lower the entry module. The source map always comes
    /// back, so diagnostics can render against whichever unit they point
    /// into.
    pub fn run(mut self, module: &Module) -> (SourceMap, Result<LoweredProgram, Diagnostic>) {
        self.scopes.push(Scope {
            kind: ScopeKind::Module,
            bindings: IndexMap::new(),
        });
        self.sinks.push(Vec::new());

        let outcome = self
            .analyze_block(&module.body)
            .and_then(|()| self.finalize_dispatch_tables());
        if let Err(diag) = outcome {
            return (self.sources, Err(diag));
        }

        let main = self.sinks.pop().expect("main sink pushed above");
        let lowered = LoweredProgram {
            init: self.init,
            main,
            files: self.files,
            tag_names: self.tag_names,
            entity_obj_count: self.next_entity_obj,
        };
        (self.sources, Ok(lowered))
    }

    pub(crate) fn base_dir(&self) -> &std::path::Path {
        &self.base_dir
    }

    // ---- errors -----------------------------------------------------------

    pub(crate) fn err(&self, kind: DiagnosticKind, span: Span) -> Diagnostic {
        Diagnostic::new(kind, self.src, span)
    }

    // ---- allocation -------------------------------------------------------

    pub(crate) fn alloc_slot(&mut self) -> ScoreRef {
        let slot = SlotId::from_raw(self.next_slot);
        self.next_slot += 1;
        ScoreRef::Slot(slot)
    }

    pub(crate) fn alloc_entity_obj(&mut self) -> EntityObjId {
        let obj = EntityObjId::from_raw(self.next_entity_obj);
        self.next_entity_obj += 1;
        obj
    }

    pub(crate) fn alloc_tag(&mut self, prefix: &str) -> TagId {
        let id = TagId::from_raw(self.tag_names.len() as u32);
        self.tag_names.push(format!("{prefix}{}", id.as_u32()));
        id
    }

    pub(crate) fn alloc_named_tag(&mut self, suffix: String) -> TagId {
        let id = TagId::from_raw(self.tag_names.len() as u32);
        self.tag_names.push(suffix);
        id
    }

    /// A slot permanently holding `value`, set once in the init file.
    /// Scoreboard multiplication and division need both operands as scores.
    pub(crate) fn const_slot(&mut self, value: i32) -> ScoreRef {
        if let Some(slot) = self.const_pool.get(&value) {
            return ScoreRef::Slot(*slot);
        }
        let ScoreRef::Slot(slot) = self.alloc_slot() else {
            unreachable!("alloc_slot returns slots");
        };
        self.const_pool.insert(value, slot);
        self.init.push(Op::SetConst {
            target: ScoreRef::Slot(slot),
            value,
        });
        ScoreRef::Slot(slot)
    }

    /// Fresh path under the internal folder, one counter per kind.
    pub(crate) fn internal_path(&mut self, kind: &'static str) -> FnPath {
        let counter = self.internal_counters.entry(kind).or_insert(0);
        *counter += 1;
        FnPath::new(format!(
            "{}/{kind}{counter}",
            self.config.internal_folder,
            counter = *counter
        ))
    }

    // ---- sinks ------------------------------------------------------------

    pub(crate) fn emit(&mut self, op: Op) {
        self.sinks
            .last_mut()
            .expect("emit outside any sink")
            .push(op);
    }

    pub(crate) fn emit_init(&mut self, op: Op) {
        self.init.push(op);
    }

    pub(crate) fn with_sink<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<(T, Vec<Op>), Diagnostic> {
        self.sinks.push(Vec::new());
        let result = f(self);
        let ops = self.sinks.pop().expect("sink pushed above");
        Ok((result?, ops))
    }

    /// Whether declarations currently initialize through the init file
    /// (module top level) or the active sink (function and block bodies).
    pub(crate) fn at_top_level(&self) -> bool {
        self.sinks.len() == 1 && self.frames.is_empty()
    }

    // ---- scopes -----------------------------------------------------------

    pub(crate) fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope {
            kind,
            bindings: IndexMap::new(),
        });
    }

    pub(crate) fn pop_scope(&mut self) -> Scope {
        self.scopes.pop().expect("scope stack never empty")
    }

    pub(crate) fn in_compile_context(&self) -> bool {
        self.frames
            .last()
            .is_some_and(|f| f.flavor == FuncFlavor::Compile)
    }

    /// Declare a new name in the current scope.
    pub(crate) fn declare(
        &mut self,
        name: &str,
        binding: Binding,
        span: Span,
    ) -> Result<(), Diagnostic> {
        let scope = self.scopes.last_mut().expect("scope stack never empty");
        if scope.bindings.contains_key(name) {
            return Err(self.err(DiagnosticKind::ShadowedName(name.to_string()), span));
        }
        scope.bindings.insert(name.to_string(), binding);
        Ok(())
    }

    /// Resolve a name. The second component reports whether the lookup
    /// crossed out of a compile-time function body; runtime bindings found
    /// beyond that boundary may not be used.
    pub(crate) fn lookup(&self, name: &str) -> Option<(&Binding, bool)> {
        let mut crossed = false;
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.bindings.get(name) {
                return Some((binding, crossed));
            }
            if scope.kind == (ScopeKind::Function { compile_only: true }) {
                crossed = true;
            }
        }
        None
    }

    /// Resolve a name to its scope index, for assignment through the chain.
    pub(crate) fn lookup_idx(&self, name: &str) -> Option<(usize, bool)> {
        let mut crossed = false;
        for (idx, scope) in self.scopes.iter().enumerate().rev() {
            if scope.bindings.contains_key(name) {
                return Some((idx, crossed));
            }
            if scope.kind == (ScopeKind::Function { compile_only: true }) {
                crossed = true;
            }
        }
        None
    }

    // ---- type plumbing ----------------------------------------------------

    pub(crate) fn template_type(&self, template: TemplateId) -> Type {
        Type::Entity {
            template,
            name: self.templates[template.index()].name.clone(),
        }
    }

    pub(crate) fn engroup_type(&self, template: TemplateId) -> Type {
        Type::Engroup {
            template,
            name: self.templates[template.index()].name.clone(),
        }
    }

    pub(crate) fn rt_type(&self, value: &RtValue) -> Type {
        match value {
            RtValue::Int(_) => Type::Int,
            RtValue::Bool(_) => Type::Bool,
            RtValue::Entity { template, .. } => self.template_type(*template),
            RtValue::Group { template, .. } => self.engroup_type(*template),
            RtValue::Struct { id, name, .. } => Type::Struct {
                id: *id,
                name: name.clone(),
            },
        }
    }

    pub(crate) fn typed_type(&self, typed: &Typed) -> Type {
        match typed {
            Typed::Const(value) => value.type_of(),
            Typed::Rt(value) => self.rt_type(value),
        }
    }

    pub(crate) fn place_type(&self, place: &RtPlace) -> Type {
        match place {
            RtPlace::Int(_) => Type::Int,
            RtPlace::Bool(_) => Type::Bool,
            RtPlace::Entity { template, .. } => self.template_type(*template),
            RtPlace::Group { template, .. } => self.engroup_type(*template),
            RtPlace::Struct { id, name, .. } => Type::Struct {
                id: *id,
                name: name.clone(),
            },
        }
    }

    // ---- materialization --------------------------------------------------

    /// Read a place as a value.
    pub(crate) fn read_place(&self, place: &RtPlace) -> RtValue {
        match place {
            RtPlace::Int(score) => RtValue::Int(score.clone()),
            RtPlace::Bool(BoolPlace::Score(score)) => RtValue::Bool(RtBool::Score(score.clone())),
            RtPlace::Bool(BoolPlace::Tag { owner, tag }) => {
                let mut sel = owner.clone();
                sel.args.push(crate::ir::SelArg::Tag(*tag));
                RtValue::Bool(RtBool::Conds(vec![Cond::Entity {
                    selector: sel,
                    negated: false,
                }]))
            }
            RtPlace::Entity { template, tag } => RtValue::Entity {
                template: *template,
                sel: Selector::all_tagged(*tag),
            },
            RtPlace::Group { template, tag } => RtValue::Group {
                template: *template,
                tag: *tag,
            },
            RtPlace::Struct { id, name, fields } => RtValue::Struct {
                id: *id,
                name: name.clone(),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), self.read_place(v)))
                    .collect(),
            },
        }
    }

    /// Turn a runtime bool into conditions for an `execute` chain.
    pub(crate) fn bool_conds(&self, value: RtBool) -> Vec<Cond> {
        match value {
            RtBool::Score(score) => vec![Cond::is_true(score)],
            RtBool::Conds(conds) => conds,
        }
    }

    /// Materialize a runtime bool into a fresh 0/1 score.
    pub(crate) fn materialize_bool(&mut self, value: RtBool) -> ScoreRef {
        match value {
            RtBool::Score(score) => score,
            RtBool::Conds(conds) => {
                let tmp = self.alloc_slot();
                self.emit(Op::SetConst {
                    target: tmp.clone(),
                    value: 0,
                });
                self.emit(Op::Guarded {
                    conds,
                    body: vec![Op::SetConst {
                        target: tmp.clone(),
                        value: 1,
                    }],
                });
                tmp
            }
        }
    }

    /// Copy an int into a fresh temporary.
    pub(crate) fn copy_int(&mut self, source: ScoreRef) -> ScoreRef {
        let tmp = self.alloc_slot();
        self.emit(Op::ScoreOp {
            op: crate::ir::ScoreOpKind::Assign,
            target: tmp.clone(),
            source,
        });
        tmp
    }

    /// Build the tag-guarded virtual-call tables. Every registered template
    /// that inherits the dispatch origin contributes one line guarded by its
    /// exact tag, calling the method its own merged table resolved to; the
    /// most-derived override therefore wins for each concrete template.
    fn finalize_dispatch_tables(&mut self) -> Result<(), Diagnostic> {
        let requests: Vec<((TemplateId, String), FnPath)> = self
            .dispatch_requests
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for ((origin, method), path) in requests {
            let mut body = Vec::new();
            for idx in 0..self.templates.len() {
                let tid = TemplateId::from_raw(idx as u32);
                if !self.templates[idx].mro.contains(&origin)
                    || !self.templates[idx].methods.contains_key(&method)
                {
                    continue;
                }
                let target_path = self.ensure_method_instance(tid, &method)?;
                let exact_tag = self.templates[idx].exact_tag;
                body.push(Op::Guarded {
                    conds: vec![Cond::Entity {
                        selector: Selector::executor()
                            .with_arg(crate::ir::SelArg::Tag(exact_tag)),
                        negated: false,
                    }],
                    body: vec![Op::Call(target_path)],
                });
            }
            self.files.insert(path, body);
        }
        Ok(())
    }
}
