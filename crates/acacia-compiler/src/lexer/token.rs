//! Token stream definitions.

use std::fmt;

use acacia_core::Span;

/// One lexed token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// A piece of a string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum StrSegment {
    /// Plain text, escapes already resolved.
    Text(String),
    /// A `{...}` formatted hole: the tokens of the embedded expression.
    Expr(Vec<Token>),
    /// A `\f{spec}` font specifier; an empty spec closes the current scope.
    Font(String),
}

/// A piece of a raw command line.
#[derive(Debug, Clone, PartialEq)]
pub enum CmdSegment {
    Text(String),
    /// `${name}` interpolation of a compile-time constant.
    Interp { name: String, span: Span },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,

    // Literals and names
    Int(i32),
    Float(f64),
    Str(Vec<StrSegment>),
    Command(Vec<CmdSegment>),
    Ident(String),

    // Keywords
    KwAnd,
    KwOr,
    KwNot,
    KwIf,
    KwElif,
    KwElse,
    KwWhile,
    KwFor,
    KwIn,
    KwDef,
    KwInline,
    KwConst,
    KwEntity,
    KwStruct,
    KwInterface,
    KwImport,
    KwPass,
    KwResult,
    KwNew,
    KwVirtual,
    KwOverride,
    KwStatic,
    KwSelf,
    KwOf,
    KwAt,
    KwTrue,
    KwFalse,
    KwNone,

    // Punctuation and operators
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Arrow,
    Bar,
    Amp,
    Assign,
    Walrus,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl TokenKind {
    /// Keyword lookup for a lexed identifier.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        use TokenKind::*;
        Some(match ident {
            "and" => KwAnd,
            "or" => KwOr,
            "not" => KwNot,
            "if" => KwIf,
            "elif" => KwElif,
            "else" => KwElse,
            "while" => KwWhile,
            "for" => KwFor,
            "in" => KwIn,
            "def" => KwDef,
            "inline" => KwInline,
            "const" => KwConst,
            "entity" => KwEntity,
            "struct" => KwStruct,
            "interface" => KwInterface,
            "import" => KwImport,
            "pass" => KwPass,
            "result" => KwResult,
            "new" => KwNew,
            "virtual" => KwVirtual,
            "override" => KwOverride,
            "static" => KwStatic,
            "self" => KwSelf,
            "of" => KwOf,
            "at" => KwAt,
            "True" => KwTrue,
            "False" => KwFalse,
            "None" => KwNone,
            _ => return None,
        })
    }

    /// Short description for "unexpected token" messages.
    pub fn describe(&self) -> String {
        use TokenKind::*;
        match self {
            Newline => "end of line".into(),
            Indent => "indent".into(),
            Dedent => "dedent".into(),
            Eof => "end of file".into(),
            Int(_) => "integer literal".into(),
            Float(_) => "float literal".into(),
            Str(_) => "string literal".into(),
            Command(_) => "command".into(),
            Ident(name) => format!("identifier {name:?}"),
            KwAnd => "`and`".into(),
            KwOr => "`or`".into(),
            KwNot => "`not`".into(),
            KwIf => "`if`".into(),
            KwElif => "`elif`".into(),
            KwElse => "`else`".into(),
            KwWhile => "`while`".into(),
            KwFor => "`for`".into(),
            KwIn => "`in`".into(),
            KwDef => "`def`".into(),
            KwInline => "`inline`".into(),
            KwConst => "`const`".into(),
            KwEntity => "`entity`".into(),
            KwStruct => "`struct`".into(),
            KwInterface => "`interface`".into(),
            KwImport => "`import`".into(),
            KwPass => "`pass`".into(),
            KwResult => "`result`".into(),
            KwNew => "`new`".into(),
            KwVirtual => "`virtual`".into(),
            KwOverride => "`override`".into(),
            KwStatic => "`static`".into(),
            KwSelf => "`self`".into(),
            KwOf => "`of`".into(),
            KwAt => "`at`".into(),
            KwTrue => "`True`".into(),
            KwFalse => "`False`".into(),
            KwNone => "`None`".into(),
            LParen => "`(`".into(),
            RParen => "`)`".into(),
            LBracket => "`[`".into(),
            RBracket => "`]`".into(),
            LBrace => "`{`".into(),
            RBrace => "`}`".into(),
            Comma => "`,`".into(),
            Colon => "`:`".into(),
            Dot => "`.`".into(),
            Arrow => "`->`".into(),
            Bar => "`|`".into(),
            Amp => "`&`".into(),
            Assign => "`=`".into(),
            Walrus => "`:=`".into(),
            PlusAssign => "`+=`".into(),
            MinusAssign => "`-=`".into(),
            StarAssign => "`*=`".into(),
            SlashAssign => "`/=`".into(),
            PercentAssign => "`%=`".into(),
            Plus => "`+`".into(),
            Minus => "`-`".into(),
            Star => "`*`".into(),
            Slash => "`/`".into(),
            Percent => "`%`".into(),
            EqEq => "`==`".into(),
            NotEq => "`!=`".into(),
            Lt => "`<`".into(),
            LtEq => "`<=`".into(),
            Gt => "`>`".into(),
            GtEq => "`>=`".into(),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
