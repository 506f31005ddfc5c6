//! Typed abstract syntax tree.
//!
//! Type annotations are ordinary expressions here; the analyzer decides
//! whether an expression denotes a type. String literals keep their segment
//! structure (text, formatted holes, font scopes) through to lowering.

use acacia_core::Span;

use crate::lexer::CmdSegment;

/// A parsed source unit.
#[derive(Debug, Clone)]
pub struct Module {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i32),
    Float(f64),
    Bool(bool),
    NoneLit,
    Str(Vec<FsSegment>),
    Ident(String),
    SelfRef,
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `a < b <= c`: N+1 operands, N comparators, lowered with
    /// short-circuiting.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
    },
    Attribute {
        obj: Box<Expr>,
        attr: String,
        attr_span: Span,
    },
    Subscript {
        obj: Box<Expr>,
        index: Box<Expr>,
    },
    /// Appears only as the index of a `Subscript`.
    Slice {
        lo: Option<Box<Expr>>,
        hi: Option<Box<Expr>>,
    },
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    /// `|"@p": "obj"|` direct scoreboard access.
    Score {
        selector: String,
        objective: String,
    },
}

/// A piece of a string literal, with holes parsed.
#[derive(Debug, Clone)]
pub enum FsSegment {
    Text(String),
    Expr(Expr),
    Font(String),
}

#[derive(Debug, Clone)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    /// The comparison with swapped operands: `a < b` iff `b > a`.
    pub fn flipped(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
        }
    }

    /// The negated comparison: `not (a < b)` iff `a >= b`.
    pub fn negated(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    Pass,
    /// `a = e`, or chained `a = b = e`.
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    /// `x := e` or `x: T = e`.
    Declare {
        name: String,
        name_span: Span,
        ty: Option<Expr>,
        value: Expr,
    },
    /// `const x = e`.
    ConstDecl {
        name: String,
        name_span: Span,
        value: Expr,
    },
    /// `&x = target`.
    RefDecl {
        name: String,
        name_span: Span,
        target: Expr,
    },
    If {
        arms: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        var: String,
        var_span: Span,
        iter: Expr,
        body: Vec<Stmt>,
    },
    FuncDef(FuncDef),
    EntityDef(EntityDef),
    StructDef(StructDef),
    InterfaceDef {
        path: Vec<String>,
        path_span: Span,
        body: Vec<Stmt>,
    },
    Import {
        path: Vec<String>,
        path_span: Span,
    },
    Command(Vec<CmdSegment>),
    Result(Expr),
    /// `new(...)`, valid only inside a `new` method.
    NewCall {
        args: Vec<Arg>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncFlavor {
    /// Emits commands once; calls jump to them.
    Runtime,
    /// Body lowered at each call site.
    Inline,
    /// Fully evaluated during analysis.
    Compile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodQualifier {
    None,
    Virtual,
    Override,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamPort {
    ByValue,
    ByRef,
    Const,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub port: ParamPort,
    pub ty: Option<Expr>,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub name_span: Span,
    pub flavor: FuncFlavor,
    pub qualifier: MethodQualifier,
    pub params: Vec<Param>,
    /// Absent means the function produces `None`.
    pub result_ty: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub name_span: Span,
    pub ty: Expr,
}

#[derive(Debug, Clone)]
pub struct EntityDef {
    pub name: String,
    pub name_span: Span,
    pub bases: Vec<Expr>,
    /// `of "minecraft:..."` clause.
    pub entity_type: Option<String>,
    /// `at <expr>` spawn position clause.
    pub spawn_at: Option<Expr>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<FuncDef>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub name_span: Span,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

impl Expr {
    /// Whether this expression is a legal assignment target shape.
    /// (Whether the binding actually allows assignment is the analyzer's
    /// business.)
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Ident(_)
                | ExprKind::Attribute { .. }
                | ExprKind::Subscript { .. }
                | ExprKind::Score { .. }
        )
    }
}
