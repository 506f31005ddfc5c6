//! Abstract runtime operations.
//!
//! The analyzer lowers runtime expressions into these; the emitter renders
//! them to command text. Operands reference allocated resources by id
//! (scoreboard slots, tags, per-attribute objectives) so that rendering is
//! the only place names exist.

use acacia_core::{EntityObjId, SlotId, TagId};

use crate::ast::CmpOp;

/// Where an integer lives at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreRef {
    /// Fake player `<scoreboard><n>` on the main objective.
    Slot(SlotId),
    /// A score held by selected entities on a per-attribute objective.
    Entity { target: Selector, obj: EntityObjId },
    /// Verbatim `|"player": "objective"|` access.
    Raw { player: String, objective: String },
}

/// Base of a target selector.
#[derive(Debug, Clone, PartialEq)]
pub enum SelBase {
    /// `@s`
    Executor,
    /// `@e`
    AllEntities,
    /// Verbatim selector or player name from source.
    Raw(String),
}

/// One selector argument.
#[derive(Debug, Clone, PartialEq)]
pub enum SelArg {
    Tag(TagId),
    NotTag(TagId),
    /// A pre-rendered `key=value` pair (entity filters, type checks).
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub base: SelBase,
    pub args: Vec<SelArg>,
}

impl Selector {
    pub fn executor() -> Self {
        Self {
            base: SelBase::Executor,
            args: Vec::new(),
        }
    }

    pub fn all_tagged(tag: TagId) -> Self {
        Self {
            base: SelBase::AllEntities,
            args: vec![SelArg::Tag(tag)],
        }
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            base: SelBase::Raw(text.into()),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: SelArg) -> Self {
        self.args.push(arg);
        self
    }
}

/// A relative path under the function folder, without extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FnPath(pub String);

impl FnPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `scoreboard players operation` kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOpKind {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ScoreOpKind {
    pub fn symbol(self) -> &'static str {
        match self {
            ScoreOpKind::Assign => "=",
            ScoreOpKind::Add => "+=",
            ScoreOpKind::Sub => "-=",
            ScoreOpKind::Mul => "*=",
            ScoreOpKind::Div => "/=",
            ScoreOpKind::Mod => "%=",
        }
    }
}

/// A condition of an `execute` chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    /// `if score <score> matches <min>..<max>` (or `unless` when negated).
    Matches {
        score: ScoreRef,
        min: Option<i32>,
        max: Option<i32>,
        negated: bool,
    },
    /// `if score <lhs> <op> <rhs>`.
    Compare {
        lhs: ScoreRef,
        op: CmpOp,
        rhs: ScoreRef,
        negated: bool,
    },
    /// `if entity <selector>`.
    Entity { selector: Selector, negated: bool },
}

impl Cond {
    /// `if score s matches 1` — the canonical runtime-bool test.
    pub fn is_true(score: ScoreRef) -> Self {
        Cond::Matches {
            score,
            min: Some(1),
            max: Some(1),
            negated: false,
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Cond::Matches {
                score,
                min,
                max,
                negated,
            } => Cond::Matches {
                score,
                min,
                max,
                negated: !negated,
            },
            Cond::Compare {
                lhs,
                op,
                rhs,
                negated,
            } => Cond::Compare {
                lhs,
                op,
                rhs,
                negated: !negated,
            },
            Cond::Entity { selector, negated } => Cond::Entity {
                selector,
                negated: !negated,
            },
        }
    }
}

/// A display piece of a `tellraw`/`titleraw` message.
#[derive(Debug, Clone, PartialEq)]
pub enum TextPart {
    Text(String),
    Score(ScoreRef),
}

/// One abstract runtime operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Emitted as a `#` line when debug comments are on, dropped otherwise.
    Comment(String),
    SetConst {
        target: ScoreRef,
        value: i32,
    },
    AddConst {
        target: ScoreRef,
        value: i32,
    },
    SubConst {
        target: ScoreRef,
        value: i32,
    },
    ScoreOp {
        op: ScoreOpKind,
        target: ScoreRef,
        source: ScoreRef,
    },
    TagAdd {
        target: Selector,
        tag: TagId,
    },
    TagRemove {
        target: Selector,
        tag: TagId,
    },
    Summon {
        entity_type: String,
        pos: String,
        tags: Vec<TagId>,
    },
    Teleport {
        target: Selector,
        pos: String,
    },
    Kill {
        target: Selector,
    },
    /// A fully-expanded raw command line.
    Raw(String),
    Tellraw {
        target: String,
        parts: Vec<TextPart>,
    },
    Titleraw {
        target: String,
        mode: String,
        parts: Vec<TextPart>,
    },
    /// `function <folder>/<path>`.
    Call(FnPath),
    /// Run `body` only when all `conds` hold. The emitter decides between
    /// inlining `execute ... run <line>` prefixes and spilling the body to
    /// an internal file.
    Guarded {
        conds: Vec<Cond>,
        body: Vec<Op>,
    },
    /// `execute as <selector> at @s run` around each line of `body`.
    As {
        target: Selector,
        body: Vec<Op>,
    },
}
