//! The closed set of compiler errors.

/// Everything the compiler can reject, with the data needed to render a
/// message. Grouped the way the pipeline produces them: lexical, syntactic,
/// name/type, world-coherence, template semantics, constant evaluation,
/// emission/environment.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    // Lexical
    InvalidChar(char),
    UnclosedQuote,
    UnclosedLongComment,
    UnclosedFont,
    UnclosedCommand,
    UnclosedInterpolation,
    InvalidDedent,
    IntOverflow,
    CharAfterContinuation,
    EofAfterContinuation,
    UnmatchedBracketPair(char),
    UnclosedBracket(char),
    InvalidUnicodeEscape,

    // Syntactic
    UnexpectedToken { found: String, expected: String },
    EmptyBlock,
    InvalidAssignTarget,
    InvalidFexpr,
    UnknownFont(String),
    NonDefaultAfterDefault,

    // Names and types
    NameNotDefined(String),
    HasNoAttribute { ty: String, attr: String },
    ModuleNoAttribute { module: String, attr: String },
    WrongAssignType { expected: String, found: String },
    WrongArgType { arg: String, expected: String, found: String },
    InvalidOperand { op: String, operands: String },
    Uncallable(String),
    NotIterable(String),
    NoGetitem(String),
    ShadowedName(String),
    WrongIfCondition(String),
    WrongWhileCondition(String),
    EndlessWhileLoop,
    ResultOutOfScope,
    NewOutOfScope,
    SelfOutOfScope,
    InvalidTypeSpec(String),
    WrongResultType { expected: String, found: String },
    TooManyArgs(String),
    MissingArg { func: String, arg: String },
    UnknownArg { func: String, arg: String },
    DuplicateArg(String),

    // World coherence
    NotConstName(String),
    NotConstAttr(String),
    ArgNotConst(String),
    NonRtResult,
    NonRtName(String),
    CantRef,
    CantRefArg(String),
    NonRefArgDefaultNotConst(String),
    ArgDefaultNotConst(String),
    MultipleResults,
    CompileFuncNonStaticMethod(String),
    RuntimeInConstContext(String),
    AssignToConst(String),

    // Entity templates and structs
    Mro(String),
    OverrideResultMismatch { method: String, expected: String, found: String },
    OverrideQualifier(String),
    NotOverriding(String),
    MultipleNewMethods,
    MultipleVirtualMethods(String),
    InstOverrideStatic(String),
    StaticOverrideInst(String),
    VirtualShadowsNonVirtual(String),
    VirtualNotRuntime(String),
    DuplicateEntityField(String),
    MethodAttrConflict(String),
    UnsupportedEntityField { field: String, ty: String },
    UnsupportedEntityFieldInStruct { field: String, ty: String },
    DuplicateStructField(String),
    UnsupportedStructField { field: String, ty: String },

    // Constant evaluation
    ConstArithmetic(String),
    ListIndexOutOfBounds { len: usize, index: i64 },
    MapKeyNotFound(String),
    InvalidMapKey(String),
    ListMultiplyNonLiteral,

    // Emission and environment
    Io(String),
    ModuleNotFound(String),
    CircularParse(String),
    ReservedInterfacePath(String),
    BadInterfacePath(String),
    DuplicateInterface(String),
}

impl DiagnosticKind {
    /// Render-ready message text.
    pub fn message(&self) -> String {
        use DiagnosticKind::*;
        match self {
            InvalidChar(c) => format!("invalid character {c:?}"),
            UnclosedQuote => "unclosed string literal".into(),
            UnclosedLongComment => "unclosed long comment".into(),
            UnclosedFont => "unclosed font specifier".into(),
            UnclosedCommand => "unclosed command block".into(),
            UnclosedInterpolation => "unclosed `${...}` interpolation".into(),
            InvalidDedent => "dedent does not match any outer indentation level".into(),
            IntOverflow => "integer literal does not fit in a 32-bit scoreboard".into(),
            CharAfterContinuation => "unexpected character after line continuation".into(),
            EofAfterContinuation => "end of file after line continuation".into(),
            UnmatchedBracketPair(c) => format!("closing {c:?} does not match the open bracket"),
            UnclosedBracket(c) => format!("unclosed {c:?}"),
            InvalidUnicodeEscape => "invalid escape sequence".into(),

            UnexpectedToken { found, expected } => {
                format!("unexpected {found}, expected {expected}")
            }
            EmptyBlock => "expected an indented block".into(),
            InvalidAssignTarget => "this expression cannot be assigned to".into(),
            InvalidFexpr => "invalid formatted expression".into(),
            UnknownFont(spec) => format!("unknown font specifier {spec:?}"),
            NonDefaultAfterDefault => {
                "parameter without a default follows one with a default".into()
            }

            NameNotDefined(n) => format!("name {n:?} is not defined"),
            HasNoAttribute { ty, attr } => format!("type `{ty}` has no attribute {attr:?}"),
            ModuleNoAttribute { module, attr } => {
                format!("module {module:?} has no attribute {attr:?}")
            }
            WrongAssignType { expected, found } => {
                format!("cannot assign `{found}` to a variable of type `{expected}`")
            }
            WrongArgType { arg, expected, found } => {
                format!("argument {arg:?} expects `{expected}`, got `{found}`")
            }
            InvalidOperand { op, operands } => {
                format!("operator `{op}` is not defined for {operands}")
            }
            Uncallable(ty) => format!("`{ty}` is not callable"),
            NotIterable(ty) => format!("`{ty}` is not iterable at compile time"),
            NoGetitem(ty) => format!("`{ty}` is not subscriptable"),
            ShadowedName(n) => format!("name {n:?} is already defined in this scope"),
            WrongIfCondition(ty) => format!("`if` condition must be `bool`, got `{ty}`"),
            WrongWhileCondition(ty) => format!("`while` condition must be `bool`, got `{ty}`"),
            EndlessWhileLoop => "`while` condition is a constant `True`".into(),
            ResultOutOfScope => "`result` outside a function body".into(),
            NewOutOfScope => "`new` call outside a `new` method".into(),
            SelfOutOfScope => "`self` outside an entity method".into(),
            InvalidTypeSpec(got) => format!("expected a type here, got {got}"),
            WrongResultType { expected, found } => {
                format!("`result` expects `{expected}`, got `{found}`")
            }
            TooManyArgs(func) => format!("too many arguments in call to {func:?}"),
            MissingArg { func, arg } => {
                format!("missing argument {arg:?} in call to {func:?}")
            }
            UnknownArg { func, arg } => {
                format!("unknown keyword argument {arg:?} in call to {func:?}")
            }
            DuplicateArg(arg) => format!("argument {arg:?} given more than once"),

            NotConstName(n) => format!("{n:?} is not a compile-time constant"),
            NotConstAttr(a) => format!("attribute {a:?} is not a compile-time constant"),
            ArgNotConst(a) => format!("argument {a:?} must be a compile-time constant"),
            NonRtResult => "this function's result has no runtime form".into(),
            NonRtName(n) => format!("{n:?} has no runtime form"),
            CantRef => "a reference needs an assignable target".into(),
            CantRefArg(a) => format!("reference argument {a:?} needs an assignable target"),
            NonRefArgDefaultNotConst(a) => {
                format!("default of parameter {a:?} must be a compile-time constant")
            }
            ArgDefaultNotConst(a) => {
                format!("default of compile-time parameter {a:?} must be constant")
            }
            MultipleResults => {
                "more than one `result` in a function returning a const or reference".into()
            }
            CompileFuncNonStaticMethod(m) => {
                format!("compile-time function {m:?} cannot be a non-static entity method")
            }
            RuntimeInConstContext(what) => {
                format!("a runtime value cannot appear in {what}")
            }
            AssignToConst(n) => format!("{n:?} is a constant and cannot be reassigned"),

            Mro(t) => format!("cannot linearize the bases of template {t:?}"),
            OverrideResultMismatch { method, expected, found } => format!(
                "override {method:?} returns `{found}` but the virtual method returns `{expected}`"
            ),
            OverrideQualifier(m) => {
                format!("{m:?} redefines a virtual method and must be marked `override`")
            }
            NotOverriding(m) => format!("{m:?} is marked `override` but overrides nothing"),
            MultipleNewMethods => "more than one `new` method along the inheritance chain".into(),
            MultipleVirtualMethods(m) => {
                format!("virtual method {m:?} is defined by more than one unrelated base")
            }
            InstOverrideStatic(m) => format!("{m:?} shadows a static method of the same name"),
            StaticOverrideInst(m) => {
                format!("static {m:?} shadows a non-static method of the same name")
            }
            VirtualShadowsNonVirtual(m) => {
                format!("virtual {m:?} shadows a non-virtual method of the same name")
            }
            VirtualNotRuntime(m) => {
                format!("virtual method {m:?} must be a runtime function")
            }
            DuplicateEntityField(f) => format!("entity field {f:?} is defined more than once"),
            MethodAttrConflict(n) => format!("{n:?} is both a field and a method"),
            UnsupportedEntityField { field, ty } => {
                format!("field {field:?} of type `{ty}` cannot be stored on an entity")
            }
            UnsupportedEntityFieldInStruct { field, ty } => format!(
                "struct field {field:?} of type `{ty}` cannot be stored on an entity"
            ),
            DuplicateStructField(f) => format!("struct field {f:?} is defined more than once"),
            UnsupportedStructField { field, ty } => {
                format!("field {field:?} of type `{ty}` cannot be stored in a struct")
            }

            ConstArithmetic(what) => format!("arithmetic error in constant expression: {what}"),
            ListIndexOutOfBounds { len, index } => {
                format!("index {index} out of bounds for a list of {len} elements")
            }
            MapKeyNotFound(k) => format!("map has no key {k}"),
            InvalidMapKey(ty) => format!("`{ty}` cannot be used as a map key"),
            ListMultiplyNonLiteral => {
                "list repetition count must be an integer literal".into()
            }

            Io(what) => format!("i/o error: {what}"),
            ModuleNotFound(m) => format!("module {m:?} not found"),
            CircularParse(m) => format!("circular import of module {m:?}"),
            ReservedInterfacePath(p) => format!("interface path {p:?} is reserved"),
            BadInterfacePath(p) => format!("interface path {p:?} is not a valid function path"),
            DuplicateInterface(p) => format!("interface {p:?} is already defined"),
        }
    }

    /// Stable kebab-case identifier.
    pub fn code(&self) -> &'static str {
        use DiagnosticKind::*;
        match self {
            InvalidChar(_) => "invalid-char",
            UnclosedQuote => "unclosed-quote",
            UnclosedLongComment => "unclosed-long-comment",
            UnclosedFont => "unclosed-font",
            UnclosedCommand => "unclosed-command",
            UnclosedInterpolation => "unclosed-interpolation",
            InvalidDedent => "invalid-dedent",
            IntOverflow => "int-overflow",
            CharAfterContinuation => "char-after-continuation",
            EofAfterContinuation => "eof-after-continuation",
            UnmatchedBracketPair(_) => "unmatched-bracket-pair",
            UnclosedBracket(_) => "unclosed-bracket",
            InvalidUnicodeEscape => "invalid-unicode-escape",
            UnexpectedToken { .. } => "unexpected-token",
            EmptyBlock => "empty-block",
            InvalidAssignTarget => "invalid-assign-target",
            InvalidFexpr => "invalid-fexpr",
            UnknownFont(_) => "unknown-font",
            NonDefaultAfterDefault => "non-default-after-default",
            NameNotDefined(_) => "name-not-defined",
            HasNoAttribute { .. } => "has-no-attribute",
            ModuleNoAttribute { .. } => "module-no-attribute",
            WrongAssignType { .. } => "wrong-assign-type",
            WrongArgType { .. } => "wrong-arg-type",
            InvalidOperand { .. } => "invalid-operand",
            Uncallable(_) => "uncallable",
            NotIterable(_) => "not-iterable",
            NoGetitem(_) => "no-getitem",
            ShadowedName(_) => "shadowed-name",
            WrongIfCondition(_) => "wrong-if-condition",
            WrongWhileCondition(_) => "wrong-while-condition",
            EndlessWhileLoop => "endless-while-loop",
            ResultOutOfScope => "result-out-of-scope",
            NewOutOfScope => "new-out-of-scope",
            SelfOutOfScope => "self-out-of-scope",
            InvalidTypeSpec(_) => "invalid-type-spec",
            WrongResultType { .. } => "wrong-result-type",
            TooManyArgs(_) => "too-many-args",
            MissingArg { .. } => "missing-arg",
            UnknownArg { .. } => "unknown-arg",
            DuplicateArg(_) => "duplicate-arg",
            NotConstName(_) => "not-const-name",
            NotConstAttr(_) => "not-const-attr",
            ArgNotConst(_) => "arg-not-const",
            NonRtResult => "nonrt-result",
            NonRtName(_) => "nonrt-name",
            CantRef => "cant-ref",
            CantRefArg(_) => "cant-ref-arg",
            NonRefArgDefaultNotConst(_) => "nonref-arg-default-not-const",
            ArgDefaultNotConst(_) => "arg-default-not-const",
            MultipleResults => "multiple-results",
            CompileFuncNonStaticMethod(_) => "compile-func-non-static-method",
            RuntimeInConstContext(_) => "runtime-in-const-context",
            AssignToConst(_) => "assign-to-const",
            Mro(_) => "mro",
            OverrideResultMismatch { .. } => "override-result-mismatch",
            OverrideQualifier(_) => "override-qualifier",
            NotOverriding(_) => "not-overriding",
            MultipleNewMethods => "multiple-new-methods",
            MultipleVirtualMethods(_) => "multiple-virtual-methods",
            InstOverrideStatic(_) => "inst-override-static",
            StaticOverrideInst(_) => "static-override-inst",
            VirtualShadowsNonVirtual(_) => "virtual-shadows-non-virtual",
            VirtualNotRuntime(_) => "virtual-not-runtime",
            DuplicateEntityField(_) => "duplicate-entity-field",
            MethodAttrConflict(_) => "method-attr-conflict",
            UnsupportedEntityField { .. } => "unsupported-entity-field",
            UnsupportedEntityFieldInStruct { .. } => "unsupported-entity-field-in-struct",
            DuplicateStructField(_) => "duplicate-struct-field",
            UnsupportedStructField { .. } => "unsupported-struct-field",
            ConstArithmetic(_) => "const-arithmetic",
            ListIndexOutOfBounds { .. } => "list-index-out-of-bounds",
            MapKeyNotFound(_) => "map-key-not-found",
            InvalidMapKey(_) => "invalid-map-key",
            ListMultiplyNonLiteral => "list-multiply-non-literal",
            Io(_) => "io",
            ModuleNotFound(_) => "module-not-found",
            CircularParse(_) => "circular-parse",
            ReservedInterfacePath(_) => "reserved-interface-path",
            BadInterfacePath(_) => "bad-interface-path",
            DuplicateInterface(_) => "duplicate-interface",
        }
    }
}
