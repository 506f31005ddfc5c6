use indoc::indoc;

use crate::ast::{
    BinOp, CmpOp, ExprKind, FsSegment, FuncFlavor, MethodQualifier, Module, ParamPort, StmtKind,
    UnaryOp,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::lexer;
use crate::source::SourceId;

fn parse(src: &str) -> Module {
    let tokens = lexer::tokenize(SourceId::ENTRY, src).expect("source should tokenize");
    super::parse_module(SourceId::ENTRY, &tokens).expect("source should parse")
}

fn parse_err(src: &str) -> Diagnostic {
    let tokens = lexer::tokenize(SourceId::ENTRY, src).expect("source should tokenize");
    super::parse_module(SourceId::ENTRY, &tokens).expect_err("source should not parse")
}

fn single_stmt(src: &str) -> StmtKind {
    let mut module = parse(src);
    assert_eq!(module.body.len(), 1, "expected a single statement");
    module.body.pop().unwrap().kind
}

#[test]
fn precedence_mul_over_add() {
    let StmtKind::Declare { value, .. } = single_stmt("x := 1 + 2 * 3\n") else {
        panic!("expected a declaration");
    };
    let ExprKind::Binary { op: BinOp::Add, lhs, rhs } = value.kind else {
        panic!("expected `+` at the top, got {:?}", value.kind);
    };
    assert!(matches!(lhs.kind, ExprKind::Int(1)));
    assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
}

#[test]
fn not_binds_looser_than_comparison() {
    let StmtKind::Declare { value, .. } = single_stmt("x := not 1 < 2\n") else {
        panic!("expected a declaration");
    };
    let ExprKind::Unary { op: UnaryOp::Not, operand } = value.kind else {
        panic!("expected `not` at the top");
    };
    assert!(matches!(operand.kind, ExprKind::Compare { .. }));
}

#[test]
fn comparison_chain_groups() {
    let StmtKind::Declare { value, .. } = single_stmt("b := 1 < x <= 10\n") else {
        panic!("expected a declaration");
    };
    let ExprKind::Compare { first, rest } = value.kind else {
        panic!("expected a comparison chain");
    };
    assert!(matches!(first.kind, ExprKind::Int(1)));
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[0].0, CmpOp::Lt);
    assert_eq!(rest[1].0, CmpOp::Le);
}

#[test]
fn chained_assignment_collects_targets() {
    let StmtKind::Assign { targets, value } = single_stmt("a = b = 1\n") else {
        panic!("expected an assignment");
    };
    assert_eq!(targets.len(), 2);
    assert!(matches!(value.kind, ExprKind::Int(1)));
}

#[test]
fn augmented_assignment() {
    let StmtKind::AugAssign { op, .. } = single_stmt("a %= 4\n") else {
        panic!("expected an augmented assignment");
    };
    assert_eq!(op, BinOp::Mod);
}

#[test]
fn annotated_declaration() {
    let StmtKind::Declare { name, ty, .. } = single_stmt("x: int = 5\n") else {
        panic!("expected a declaration");
    };
    assert_eq!(name, "x");
    assert!(matches!(ty.unwrap().kind, ExprKind::Ident(n) if n == "int"));
}

#[test]
fn literal_is_not_an_assign_target() {
    assert_eq!(
        parse_err("1 + 2 = 3\n").kind,
        DiagnosticKind::InvalidAssignTarget
    );
}

#[test]
fn if_elif_else_arms() {
    let src = indoc! {"
        if a:
            pass
        elif b:
            pass
        else:
            x := 1
    "};
    let StmtKind::If { arms, orelse } = single_stmt(src) else {
        panic!("expected an if statement");
    };
    assert_eq!(arms.len(), 2);
    assert_eq!(orelse.len(), 1);
}

#[test]
fn empty_block_is_rejected() {
    assert_eq!(
        parse_err("if a:\npass\n").kind,
        DiagnosticKind::EmptyBlock
    );
}

#[test]
fn function_definition_ports_and_defaults() {
    let src = indoc! {"
        def f(a: int, &b: int, const c = 5) -> int:
            result a
    "};
    let StmtKind::FuncDef(func) = single_stmt(src) else {
        panic!("expected a function definition");
    };
    assert_eq!(func.name, "f");
    assert_eq!(func.flavor, FuncFlavor::Runtime);
    assert_eq!(func.params.len(), 3);
    assert_eq!(func.params[0].port, ParamPort::ByValue);
    assert_eq!(func.params[1].port, ParamPort::ByRef);
    assert_eq!(func.params[2].port, ParamPort::Const);
    assert!(func.params[2].default.is_some());
    assert!(func.result_ty.is_some());
    assert_eq!(func.body.len(), 1);
}

#[test]
fn inline_and_compile_flavors() {
    let src = indoc! {"
        inline def g():
            pass
        const def h():
            pass
    "};
    let module = parse(src);
    let flavors: Vec<_> = module
        .body
        .iter()
        .map(|s| match &s.kind {
            StmtKind::FuncDef(f) => f.flavor,
            other => panic!("expected a function definition, got {other:?}"),
        })
        .collect();
    assert_eq!(flavors, vec![FuncFlavor::Inline, FuncFlavor::Compile]);
}

#[test]
fn non_default_after_default() {
    assert_eq!(
        parse_err("def f(a = 1, b):\n    pass\n").kind,
        DiagnosticKind::NonDefaultAfterDefault
    );
}

#[test]
fn entity_definition() {
    let src = indoc! {r#"
        entity Guard(Soldier, Mob) of "minecraft:zombie" at Pos(0, 64, 0):
            health: int
            virtual def hit():
                pass
            static def count() -> int:
                result 0
    "#};
    let StmtKind::EntityDef(entity) = single_stmt(src) else {
        panic!("expected an entity definition");
    };
    assert_eq!(entity.name, "Guard");
    assert_eq!(entity.bases.len(), 2);
    assert_eq!(entity.entity_type.as_deref(), Some("minecraft:zombie"));
    assert!(entity.spawn_at.is_some());
    assert_eq!(entity.fields.len(), 1);
    assert_eq!(entity.methods.len(), 2);
    assert_eq!(entity.methods[0].qualifier, MethodQualifier::Virtual);
    assert_eq!(entity.methods[1].qualifier, MethodQualifier::Static);
}

#[test]
fn constructor_is_a_named_method() {
    let src = indoc! {r#"
        entity Pet of "minecraft:wolf":
            def new(owner: int):
                new(pos=Pos(0, 64, 0))
    "#};
    let StmtKind::EntityDef(entity) = single_stmt(src) else {
        panic!("expected an entity definition");
    };
    assert_eq!(entity.methods[0].name, "new");
    assert!(matches!(
        entity.methods[0].body[0].kind,
        StmtKind::NewCall { .. }
    ));
}

#[test]
fn struct_definition() {
    let src = indoc! {"
        struct Point:
            x: int
            y: int
    "};
    let StmtKind::StructDef(def) = single_stmt(src) else {
        panic!("expected a struct definition");
    };
    assert_eq!(def.fields.len(), 2);
}

#[test]
fn interface_path() {
    let src = indoc! {"
        interface io.greet:
            /say hi
    "};
    let StmtKind::InterfaceDef { path, body, .. } = single_stmt(src) else {
        panic!("expected an interface definition");
    };
    assert_eq!(path, vec!["io".to_string(), "greet".to_string()]);
    assert_eq!(body.len(), 1);
    assert!(matches!(body[0].kind, StmtKind::Command(_)));
}

#[test]
fn import_dotted() {
    let StmtKind::Import { path, .. } = single_stmt("import lib.colors\n") else {
        panic!("expected an import");
    };
    assert_eq!(path, vec!["lib".to_string(), "colors".to_string()]);
}

#[test]
fn string_holes_parse_to_expressions() {
    let StmtKind::Declare { value, .. } = single_stmt("s := \"n={x + 1}\"\n") else {
        panic!("expected a declaration");
    };
    let ExprKind::Str(segments) = value.kind else {
        panic!("expected a string");
    };
    assert!(matches!(segments[0], FsSegment::Text(ref t) if t == "n="));
    let FsSegment::Expr(expr) = &segments[1] else {
        panic!("expected a hole");
    };
    assert!(matches!(expr.kind, ExprKind::Binary { op: BinOp::Add, .. }));
}

#[test]
fn subscript_and_slice() {
    let StmtKind::Declare { value, .. } = single_stmt("l2 := l[1:3]\n") else {
        panic!("expected a declaration");
    };
    let ExprKind::Subscript { index, .. } = value.kind else {
        panic!("expected a subscript");
    };
    assert!(matches!(index.kind, ExprKind::Slice { .. }));
}

#[test]
fn score_literal() {
    let StmtKind::Declare { value, .. } = single_stmt("s := |\"@p\": \"obj\"|\n") else {
        panic!("expected a declaration");
    };
    let ExprKind::Score { selector, objective } = value.kind else {
        panic!("expected a score literal");
    };
    assert_eq!(selector, "@p");
    assert_eq!(objective, "obj");
}

#[test]
fn call_arguments_mixed() {
    let StmtKind::Expr(expr) = single_stmt("f(1, delta=2)\n") else {
        panic!("expected an expression statement");
    };
    let ExprKind::Call { args, .. } = expr.kind else {
        panic!("expected a call");
    };
    assert_eq!(args.len(), 2);
    assert_eq!(args[0].name, None);
    assert_eq!(args[1].name.as_deref(), Some("delta"));
}

#[test]
fn result_statement() {
    let src = indoc! {"
        def f() -> int:
            result 1 + 2
    "};
    let StmtKind::FuncDef(func) = single_stmt(src) else {
        panic!("expected a function definition");
    };
    assert!(matches!(func.body[0].kind, StmtKind::Result(_)));
}
