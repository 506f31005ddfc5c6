//! The closed set of first-class types.
//!
//! Each type answers three capability questions: can a value of it be
//! materialized at runtime (scoreboards, selectors, tags), can it exist at
//! compile time, and can it be stored as an entity or struct field. The
//! analyzer routes every world-promotion and storability decision through
//! these queries instead of matching on type shapes.

use std::fmt;

use acacia_core::{StructId, TemplateId};

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Bool,
    /// Compile-time only; folded away before emission.
    Float,
    /// Compile-time only; may carry runtime display holes.
    Str,
    Pos,
    Rot,
    Offset,
    /// A runtime group of entities of one template.
    Engroup { template: TemplateId, name: String },
    Enfilter,
    /// A single runtime entity of a template.
    Entity { template: TemplateId, name: String },
    Struct { id: StructId, name: String },
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    /// A callable binding used as a value.
    Func,
    /// An entity template used as a value (callable constructor).
    Template,
    /// A struct template used as a value (callable constructor).
    StructTemplate,
    Module,
    None,
    /// Top type for untyped compile-time values.
    Any,
}

impl Type {
    /// Can a value of this type be materialized as scoreboards, tags, or
    /// selectors?
    pub fn has_runtime_form(&self) -> bool {
        matches!(
            self,
            Type::Int | Type::Bool | Type::Entity { .. } | Type::Engroup { .. }
        )
    }

    /// Can a value of this type exist during analysis?
    pub fn has_compile_form(&self) -> bool {
        !matches!(self, Type::Entity { .. } | Type::Engroup { .. })
    }

    /// Can an entity carry a field of this type? Struct fields are checked
    /// recursively at template registration.
    pub fn storable_in_entity(&self) -> bool {
        matches!(self, Type::Int | Type::Bool | Type::Struct { .. })
    }

    /// Can a struct carry a field of this type? Wider than entity storage:
    /// a struct may hold compile-time-only fields, but such a struct then
    /// cannot be stored on an entity.
    pub fn storable_in_struct(&self) -> bool {
        self.has_compile_form()
            && !matches!(
                self,
                Type::Func
                    | Type::Template
                    | Type::StructTemplate
                    | Type::Module
                    | Type::None
                    | Type::Any
            )
            || matches!(self, Type::Int | Type::Bool)
    }

    /// Does a value of `actual` fit a slot declared as `self`?
    ///
    /// Exact equality, except `Any` accepts everything (element-wise for
    /// containers). There is no numeric narrowing.
    pub fn accepts(&self, actual: &Type) -> bool {
        match (self, actual) {
            (Type::Any, _) => true,
            (Type::List(a), Type::List(b)) => a.accepts(b),
            (Type::Map(ak, av), Type::Map(bk, bv)) => ak.accepts(bk) && av.accepts(bv),
            _ => self == actual,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::Float => write!(f, "float"),
            Type::Str => write!(f, "str"),
            Type::Pos => write!(f, "Pos"),
            Type::Rot => write!(f, "Rot"),
            Type::Offset => write!(f, "Offset"),
            Type::Engroup { name, .. } => write!(f, "Engroup[{name}]"),
            Type::Enfilter => write!(f, "Enfilter"),
            Type::Entity { name, .. } => write!(f, "{name}"),
            Type::Struct { name, .. } => write!(f, "{name}"),
            Type::List(elem) => write!(f, "list[{elem}]"),
            Type::Map(key, value) => write!(f, "map[{key}: {value}]"),
            Type::Func => write!(f, "function"),
            Type::Template => write!(f, "entity template"),
            Type::StructTemplate => write!(f, "struct template"),
            Type::Module => write!(f, "module"),
            Type::None => write!(f, "None"),
            Type::Any => write!(f, "Any"),
        }
    }
}
