//! Compile-time values and constant evaluation.
//!
//! Everything the analyzer can hold in its hands during compilation lives
//! here: numbers, formatted strings (which may carry runtime display holes),
//! containers, positions, entity filters, and the "meta" values a name can
//! resolve to (types, templates, functions, modules). Arithmetic on these is
//! the constant folder; errors come back as bare [`DiagnosticKind`]s and the
//! caller attaches the span.

use std::fmt;

use indexmap::IndexMap;

use acacia_core::{FuncId, ModuleId, StructId, TemplateId};

use crate::ast::{BinOp, CmpOp, UnaryOp};
use crate::diagnostics::DiagnosticKind;
use crate::ir::ScoreRef;
use crate::types::Type;

// ---- formatted strings ----------------------------------------------------

/// A display piece of a formatted string.
#[derive(Debug, Clone, PartialEq)]
pub enum FsPart {
    Text(String),
    /// A runtime integer shown through a score component.
    Score(ScoreRef),
}

/// A string value. Compile-time, but its holes may reference runtime
/// scores, which materialize as score components in raw-text JSON.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FString {
    pub parts: Vec<FsPart>,
}

impl FString {
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            parts: vec![FsPart::Text(text)],
        }
    }

    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(FsPart::Text(last)) = self.parts.last_mut() {
            last.push_str(text);
        } else {
            self.parts.push(FsPart::Text(text.to_string()));
        }
    }

    pub fn push_score(&mut self, score: ScoreRef) {
        self.parts.push(FsPart::Score(score));
    }

    /// The text of a string with no runtime holes.
    pub fn as_plain(&self) -> Option<String> {
        let mut text = String::new();
        for part in &self.parts {
            match part {
                FsPart::Text(t) => text.push_str(t),
                FsPart::Score(_) => return None,
            }
        }
        Some(text)
    }

    pub fn concat(&self, other: &FString) -> FString {
        let mut out = self.clone();
        for part in &other.parts {
            match part {
                FsPart::Text(t) => out.push_text(t),
                FsPart::Score(s) => out.push_score(s.clone()),
            }
        }
        out
    }
}

/// Map a `\f{...}` specifier to a legacy formatting code.
pub fn font_code(spec: &str) -> Option<&'static str> {
    Some(match spec {
        "" | "reset" => "\u{a7}r",
        "black" => "\u{a7}0",
        "dark_blue" => "\u{a7}1",
        "dark_green" => "\u{a7}2",
        "dark_aqua" => "\u{a7}3",
        "dark_red" => "\u{a7}4",
        "dark_purple" => "\u{a7}5",
        "gold" => "\u{a7}6",
        "gray" => "\u{a7}7",
        "dark_gray" => "\u{a7}8",
        "blue" => "\u{a7}9",
        "green" => "\u{a7}a",
        "aqua" => "\u{a7}b",
        "red" => "\u{a7}c",
        "light_purple" => "\u{a7}d",
        "yellow" => "\u{a7}e",
        "white" => "\u{a7}f",
        "obfuscated" => "\u{a7}k",
        "bold" => "\u{a7}l",
        "italic" => "\u{a7}o",
        _ => return None,
    })
}

// ---- positions ------------------------------------------------------------

/// One coordinate of a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coord {
    Abs(f64),
    /// `~`-relative.
    Rel(f64),
    /// `^`-local.
    Local(f64),
}

impl Coord {
    fn render(self) -> String {
        match self {
            Coord::Abs(v) => fmt_coord(v),
            Coord::Rel(v) if v == 0.0 => "~".to_string(),
            Coord::Rel(v) => format!("~{}", fmt_coord(v)),
            Coord::Local(v) if v == 0.0 => "^".to_string(),
            Coord::Local(v) => format!("^{}", fmt_coord(v)),
        }
    }
}

/// Render a number the way commands spell them: integral values lose the
/// fraction dot.
pub fn fmt_number(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn fmt_coord(v: f64) -> String {
    fmt_number(v)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosValue {
    pub x: Coord,
    pub y: Coord,
    pub z: Coord,
}

impl PosValue {
    /// `x y z` as commands spell it.
    pub fn render(&self) -> String {
        format!("{} {} {}", self.x.render(), self.y.render(), self.z.render())
    }

    /// The absolute coordinates, if no component is `~`- or `^`-relative.
    /// Selector arguments only accept absolute positions.
    pub fn abs_xyz(&self) -> Option<(f64, f64, f64)> {
        match (self.x, self.y, self.z) {
            (Coord::Abs(x), Coord::Abs(y), Coord::Abs(z)) => Some((x, y, z)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotValue {
    pub yaw: f64,
    pub pitch: f64,
}

impl RotValue {
    pub fn render(&self) -> String {
        format!("{} {}", fmt_coord(self.yaw), fmt_coord(self.pitch))
    }
}

// ---- entity filters -------------------------------------------------------

/// An opaque, composable selector-argument builder.
///
/// Each filter method appends rendered `key=value` fragments; using the
/// filter splices them into an `@e[...]` selector. Bedrock has no
/// `sort=random` argument, so `random(n)` instead flips the base selector
/// to `@r`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterValue {
    pub args: Vec<String>,
    pub random: bool,
}

impl FilterValue {
    pub fn with(mut self, arg: String) -> Self {
        self.args.push(arg);
        self
    }
}

// ---- map keys -------------------------------------------------------------

/// A hashable compile-time value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(i32),
    Bool(bool),
    Str(String),
}

impl MapKey {
    /// Convert a value into a key; `None` marks an unhashable key.
    pub fn from_value(value: &Value) -> Option<MapKey> {
        match value {
            Value::Int(v) => Some(MapKey::Int(*v)),
            Value::Bool(v) => Some(MapKey::Bool(*v)),
            Value::Str(s) => s.as_plain().map(MapKey::Str),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Int(v) => Value::Int(*v),
            MapKey::Bool(v) => Value::Bool(*v),
            MapKey::Str(s) => Value::Str(FString::plain(s.clone())),
        }
    }

    fn type_of(&self) -> Type {
        match self {
            MapKey::Int(_) => Type::Int,
            MapKey::Bool(_) => Type::Bool,
            MapKey::Str(_) => Type::Str,
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Int(v) => write!(f, "{v}"),
            MapKey::Bool(v) => write!(f, "{}", if *v { "True" } else { "False" }),
            MapKey::Str(s) => write!(f, "{s:?}"),
        }
    }
}

// ---- values ---------------------------------------------------------------

/// A compile-time value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Int(i32),
    Bool(bool),
    Float(f64),
    Str(FString),
    List(Vec<Value>),
    Map(IndexMap<MapKey, Value>),
    Pos(PosValue),
    Offset(PosValue),
    Rot(RotValue),
    Filter(FilterValue),
    Struct {
        id: StructId,
        name: String,
        fields: IndexMap<String, Value>,
    },
    /// A type used as a value (annotation position).
    Type(Type),
    Template(TemplateId),
    StructTemplate(StructId),
    Function(FuncId),
    /// A host-registered function, dispatched by module and name.
    Builtin {
        module: &'static str,
        name: &'static str,
    },
    Module(ModuleId),
}

impl Value {
    pub fn type_of(&self) -> Type {
        match self {
            Value::None => Type::None,
            Value::Int(_) => Type::Int,
            Value::Bool(_) => Type::Bool,
            Value::Float(_) => Type::Float,
            Value::Str(_) => Type::Str,
            Value::List(items) => Type::List(Box::new(unify(items.iter().map(Value::type_of)))),
            Value::Map(entries) => Type::Map(
                Box::new(unify(entries.keys().map(MapKey::type_of))),
                Box::new(unify(entries.values().map(Value::type_of))),
            ),
            Value::Pos(_) => Type::Pos,
            Value::Offset(_) => Type::Offset,
            Value::Rot(_) => Type::Rot,
            Value::Filter(_) => Type::Enfilter,
            Value::Struct { id, name, .. } => Type::Struct {
                id: *id,
                name: name.clone(),
            },
            Value::Type(_) => Type::Any,
            Value::Template(_) => Type::Template,
            Value::StructTemplate(_) => Type::StructTemplate,
            Value::Function(_) | Value::Builtin { .. } => Type::Func,
            Value::Module(_) => Type::Module,
        }
    }

    /// Textual form for `${name}` command interpolation. `None` marks a
    /// value with no command-text rendition.
    pub fn command_text(&self) -> Option<String> {
        match self {
            Value::Int(v) => Some(v.to_string()),
            Value::Bool(v) => Some(if *v { "true" } else { "false" }.to_string()),
            Value::Float(v) => Some(fmt_coord(*v)),
            Value::Str(s) => s.as_plain(),
            Value::Pos(p) | Value::Offset(p) => Some(p.render()),
            Value::Rot(r) => Some(r.render()),
            _ => None,
        }
    }
}

fn unify(mut types: impl Iterator<Item = Type>) -> Type {
    let Some(first) = types.next() else {
        return Type::Any;
    };
    for ty in types {
        if ty != first {
            return Type::Any;
        }
    }
    first
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{}", if *v { "True" } else { "False" }),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => match s.as_plain() {
                Some(text) => write!(f, "{text:?}"),
                None => write!(f, "<formatted string>"),
            },
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Pos(p) => write!(f, "Pos({})", p.render()),
            Value::Offset(p) => write!(f, "Offset({})", p.render()),
            Value::Rot(r) => write!(f, "Rot({})", r.render()),
            Value::Filter(_) => write!(f, "<entity filter>"),
            Value::Struct { name, .. } => write!(f, "<{name} value>"),
            Value::Type(ty) => write!(f, "{ty}"),
            Value::Template(_) => write!(f, "<entity template>"),
            Value::StructTemplate(_) => write!(f, "<struct template>"),
            Value::Function(_) | Value::Builtin { .. } => write!(f, "<function>"),
            Value::Module(_) => write!(f, "<module>"),
        }
    }
}

// ---- constant folding -----------------------------------------------------

fn invalid_operand(op: &str, lhs: &Value, rhs: &Value) -> DiagnosticKind {
    DiagnosticKind::InvalidOperand {
        op: op.to_string(),
        operands: format!("`{}` and `{}`", lhs.type_of(), rhs.type_of()),
    }
}

pub fn const_unary(op: UnaryOp, operand: &Value) -> Result<Value, DiagnosticKind> {
    match (op, operand) {
        (UnaryOp::Pos, Value::Int(v)) => Ok(Value::Int(*v)),
        (UnaryOp::Pos, Value::Float(v)) => Ok(Value::Float(*v)),
        (UnaryOp::Neg, Value::Int(v)) => v
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| DiagnosticKind::ConstArithmetic("overflow".to_string())),
        (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        _ => Err(DiagnosticKind::InvalidOperand {
            op: match op {
                UnaryOp::Pos => "+",
                UnaryOp::Neg => "-",
                UnaryOp::Not => "not",
            }
            .to_string(),
            operands: format!("`{}`", operand.type_of()),
        }),
    }
}

pub fn const_binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, DiagnosticKind> {
    use BinOp::*;
    use Value::*;

    let arith = |what: &str| DiagnosticKind::ConstArithmetic(what.to_string());

    match (op, lhs, rhs) {
        (And, Bool(a), Bool(b)) => Ok(Bool(*a && *b)),
        (Or, Bool(a), Bool(b)) => Ok(Bool(*a || *b)),

        (Add, Int(a), Int(b)) => a.checked_add(*b).map(Int).ok_or_else(|| arith("overflow")),
        (Sub, Int(a), Int(b)) => a.checked_sub(*b).map(Int).ok_or_else(|| arith("overflow")),
        (Mul, Int(a), Int(b)) => a.checked_mul(*b).map(Int).ok_or_else(|| arith("overflow")),
        (Div, Int(_), Int(0)) => Err(arith("division by zero")),
        (Div, Int(a), Int(b)) => a.checked_div(*b).map(Int).ok_or_else(|| arith("overflow")),
        (Mod, Int(_), Int(0)) => Err(arith("modulo by zero")),
        (Mod, Int(a), Int(b)) => a.checked_rem(*b).map(Int).ok_or_else(|| arith("overflow")),

        (_, Float(_) | Int(_), Float(_) | Int(_)) => {
            let a = as_f64(lhs).expect("checked numeric");
            let b = as_f64(rhs).expect("checked numeric");
            match op {
                Add => Ok(Float(a + b)),
                Sub => Ok(Float(a - b)),
                Mul => Ok(Float(a * b)),
                Div if b == 0.0 => Err(arith("division by zero")),
                Div => Ok(Float(a / b)),
                Mod if b == 0.0 => Err(arith("modulo by zero")),
                Mod => Ok(Float(a % b)),
                And | Or => Err(invalid_operand(op.symbol(), lhs, rhs)),
            }
        }

        (Add, Str(a), Str(b)) => Ok(Str(a.concat(b))),

        (Add, List(a), List(b)) => {
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            Ok(List(out))
        }
        // The analyzer has already insisted the count is an integer literal.
        (Mul, List(items), Int(n)) => {
            let count = (*n).max(0) as usize;
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            Ok(List(out))
        }

        _ => Err(invalid_operand(op.symbol(), lhs, rhs)),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(v) => Some(f64::from(*v)),
        Value::Float(v) => Some(*v),
        _ => None,
    }
}

pub fn const_compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<bool, DiagnosticKind> {
    if let (Some(a), Some(b)) = (as_f64(lhs), as_f64(rhs)) {
        return Ok(match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        });
    }
    match op {
        CmpOp::Eq => Ok(lhs == rhs),
        CmpOp::Ne => Ok(lhs != rhs),
        _ => Err(invalid_operand(op.symbol(), lhs, rhs)),
    }
}

pub fn const_index(value: &Value, index: &Value) -> Result<Value, DiagnosticKind> {
    match value {
        Value::List(items) => {
            let Value::Int(raw) = index else {
                return Err(DiagnosticKind::InvalidOperand {
                    op: "[]".to_string(),
                    operands: format!("`{}` and `{}`", value.type_of(), index.type_of()),
                });
            };
            let idx = resolve_index(*raw, items.len()).ok_or({
                DiagnosticKind::ListIndexOutOfBounds {
                    len: items.len(),
                    index: i64::from(*raw),
                }
            })?;
            Ok(items[idx].clone())
        }
        Value::Map(entries) => {
            let key = MapKey::from_value(index)
                .ok_or_else(|| DiagnosticKind::InvalidMapKey(index.type_of().to_string()))?;
            entries
                .get(&key)
                .cloned()
                .ok_or_else(|| DiagnosticKind::MapKeyNotFound(key.to_string()))
        }
        _ => Err(DiagnosticKind::NoGetitem(value.type_of().to_string())),
    }
}

/// Resolve a possibly-negative index into `0..len`.
fn resolve_index(raw: i32, len: usize) -> Option<usize> {
    let idx = if raw < 0 {
        i64::try_from(len).ok()? + i64::from(raw)
    } else {
        i64::from(raw)
    };
    if idx < 0 || idx >= len as i64 {
        None
    } else {
        Some(idx as usize)
    }
}

pub fn const_slice(
    value: &Value,
    lo: Option<&Value>,
    hi: Option<&Value>,
) -> Result<Value, DiagnosticKind> {
    let Value::List(items) = value else {
        return Err(DiagnosticKind::NoGetitem(value.type_of().to_string()));
    };
    let clamp = |bound: Option<&Value>, default: i64| -> Result<i64, DiagnosticKind> {
        match bound {
            None => Ok(default),
            Some(Value::Int(v)) => {
                let mut idx = i64::from(*v);
                if idx < 0 {
                    idx += items.len() as i64;
                }
                Ok(idx.clamp(0, items.len() as i64))
            }
            Some(other) => Err(DiagnosticKind::InvalidOperand {
                op: "[:]".to_string(),
                operands: format!("`{}`", other.type_of()),
            }),
        }
    };
    let lo = clamp(lo, 0)?;
    let hi = clamp(hi, items.len() as i64)?;
    if lo >= hi {
        return Ok(Value::List(Vec::new()));
    }
    Ok(Value::List(items[lo as usize..hi as usize].to_vec()))
}
