use indoc::indoc;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::{compile_source, Config, Pack};

fn compile(src: &str) -> Pack {
    compile_with(src, Config::default())
}

fn compile_with(src: &str, config: Config) -> Pack {
    let (sources, result) = compile_source("test.aca", src.to_string(), config);
    match result {
        Ok(pack) => pack,
        Err(diag) => panic!(
            "expected success, got: {}",
            diag.printer().sources(&sources).render()
        ),
    }
}

fn compile_err(src: &str) -> Diagnostic {
    let (_, result) = compile_source("test.aca", src.to_string(), Config::default());
    result.expect_err("source should not compile")
}

fn main_lines(pack: &Pack) -> &[String] {
    &pack.file("main.mcfunction").expect("main is always emitted").lines
}

fn init_lines(pack: &Pack) -> &[String] {
    &pack.file("init.mcfunction").expect("init is always emitted").lines
}

// ---- two-world rules -------------------------------------------------------

#[test]
fn const_of_runtime_name_is_rejected() {
    let err = compile_err("a := 1\nconst k = a\n");
    assert_eq!(err.kind, DiagnosticKind::NotConstName("a".to_string()));
}

#[test]
fn assignment_requires_matching_type() {
    let err = compile_err("x := 1\nx = True\n");
    assert!(matches!(err.kind, DiagnosticKind::WrongAssignType { .. }));
}

#[test]
fn walrus_redeclaration_is_shadowing() {
    let err = compile_err("x := 1\nx := 2\n");
    assert_eq!(err.kind, DiagnosticKind::ShadowedName("x".to_string()));
}

#[test]
fn plain_assignment_declares_on_first_use() {
    let pack = compile("x = 5\nx = x + 1\n");
    assert!(init_lines(&pack).contains(&"scoreboard players set acacia1 acacia 5".to_string()));
}

#[test]
fn reference_declaration_aliases_storage() {
    let pack = compile("x := 1\n&y = x\ny = 5\n");
    assert!(main_lines(&pack).contains(&"scoreboard players set acacia1 acacia 5".to_string()));
}

#[test]
fn reference_needs_assignable_target() {
    let err = compile_err("&r = 1 + 2\n");
    assert_eq!(err.kind, DiagnosticKind::CantRef);
}

#[test]
fn assigning_to_const_is_rejected() {
    let err = compile_err("const k = 1\nk = 2\n");
    assert_eq!(err.kind, DiagnosticKind::AssignToConst("k".to_string()));
}

// ---- control flow ----------------------------------------------------------

#[test]
fn if_condition_must_be_bool() {
    let err = compile_err("if 1:\n    pass\n");
    assert_eq!(err.kind, DiagnosticKind::WrongIfCondition("int".to_string()));
}

#[test]
fn constant_true_while_is_endless() {
    let err = compile_err("while True:\n    pass\n");
    assert_eq!(err.kind, DiagnosticKind::EndlessWhileLoop);
}

#[test]
fn constant_false_while_vanishes() {
    let pack = compile("while False:\n    /say never\n");
    assert_eq!(main_lines(&pack), ["function init"]);
}

#[test]
fn for_unrolls_once_per_element() {
    let src = indoc! {r#"
        const COLORS = {"red": 1, "orange": 2, "yellow": 3, "green": 4,
            "blue": 5, "cyan": 6, "purple": 7}
        for c in COLORS:
            /say ${c}
    "#};
    let pack = compile(src);
    let says: Vec<&String> = main_lines(&pack)
        .iter()
        .filter(|l| l.starts_with("say "))
        .collect();
    assert_eq!(
        says,
        [
            "say red",
            "say orange",
            "say yellow",
            "say green",
            "say blue",
            "say cyan",
            "say purple",
        ]
    );
}

#[test]
fn for_body_resolves_map_values_per_iteration() {
    let src = indoc! {r#"
        const DAMAGE = {"stick": 1, "sword": 7}
        for item in DAMAGE:
            level := DAMAGE[item]
    "#};
    let pack = compile(src);
    let init = init_lines(&pack);
    assert!(init.contains(&"scoreboard players set acacia1 acacia 1".to_string()));
    assert!(init.contains(&"scoreboard players set acacia2 acacia 7".to_string()));
}

#[test]
fn for_over_runtime_value_is_rejected() {
    let err = compile_err("x := 1\nfor i in x:\n    pass\n");
    assert_eq!(err.kind, DiagnosticKind::NotIterable("int".to_string()));
}

#[test]
fn result_outside_function() {
    let err = compile_err("result 1\n");
    assert_eq!(err.kind, DiagnosticKind::ResultOutOfScope);
}

#[test]
fn new_outside_constructor() {
    let err = compile_err("new()\n");
    assert_eq!(err.kind, DiagnosticKind::NewOutOfScope);
}

// ---- functions -------------------------------------------------------------

#[test]
fn compile_time_function_folds_fully() {
    let src = indoc! {"
        const def arithmetic(start: int, to: int, const delta = 1) -> int:
            result (start + to) * ((to - start) / delta + 1) / 2
        const v = arithmetic(-30, 14, delta=2)
        x: int = v
    "};
    let pack = compile(src);
    assert!(init_lines(&pack)
        .contains(&"scoreboard players set acacia1 acacia -184".to_string()));
}

#[test]
fn runtime_function_compiles_to_a_file() {
    let src = indoc! {r#"
        import print
        def arithmetic(start: int, to: int, const delta = 1) -> int:
            result (start + to) * ((to - start) / delta + 1) / 2
        s := arithmetic(-30, 14, delta=2)
        print.tell("sum is {s}")
    "#};
    let pack = compile(src);
    assert!(pack.file("internal/fn1.mcfunction").is_some());
    let tellraw = main_lines(&pack)
        .iter()
        .find(|l| l.starts_with("tellraw @a "))
        .expect("tell emits a tellraw");
    assert!(tellraw.contains("\"score\""));
    assert!(tellraw.contains("\"objective\":\"acacia\""));
}

#[test]
fn inline_function_lowers_at_call_site() {
    let src = indoc! {"
        inline def bump(&target: int, const by = 1):
            target += by
        x := 0
        bump(x, by=3)
    "};
    let pack = compile(src);
    assert!(main_lines(&pack).contains(&"scoreboard players add acacia1 acacia 3".to_string()));
}

#[test]
fn inline_const_result_allows_one_result_only() {
    let src = indoc! {r#"
        inline def pick() -> str:
            result "a"
            result "b"
        const s = pick()
    "#};
    let err = compile_err(src);
    assert_eq!(err.kind, DiagnosticKind::MultipleResults);
}

#[test]
fn const_argument_must_be_constant() {
    let src = indoc! {"
        def f(const k: int) -> int:
            result k
        x := 1
        y := f(x)
    "};
    let err = compile_err(src);
    assert_eq!(err.kind, DiagnosticKind::ArgNotConst("k".to_string()));
}

#[test]
fn reference_argument_needs_assignable_actual() {
    let src = indoc! {"
        inline def bump(&target: int):
            target += 1
        bump(1 + 2)
    "};
    let err = compile_err(src);
    assert_eq!(err.kind, DiagnosticKind::CantRefArg("target".to_string()));
}

#[test]
fn compile_function_cannot_touch_runtime_names() {
    let src = indoc! {"
        x := 1
        const def peek() -> int:
            result x
        const v = peek()
    "};
    let err = compile_err(src);
    assert_eq!(err.kind, DiagnosticKind::NotConstName("x".to_string()));
}

// ---- entity templates ------------------------------------------------------

#[test]
fn diamond_mro_linearizes() {
    let src = indoc! {r#"
        entity A of "minecraft:cow":
            pass
        entity B(A):
            pass
        entity C(A):
            pass
        entity D(B, C):
            pass
        d := D()
    "#};
    compile(src);
}

#[test]
fn conflicting_base_orders_fail_c3() {
    let src = indoc! {r#"
        entity A of "minecraft:cow":
            pass
        entity B(A):
            pass
        entity C(A):
            pass
        entity X(B, C):
            pass
        entity Y(C, B):
            pass
        entity Z(X, Y):
            pass
    "#};
    let err = compile_err(src);
    assert_eq!(err.kind, DiagnosticKind::Mro("Z".to_string()));
}

#[test]
fn failed_template_is_not_registered() {
    // Z fails C3; referring to it afterwards is name-not-defined, proving
    // no partial registration survived.
    let src = indoc! {r#"
        entity A of "minecraft:cow":
            pass
        entity B(A):
            pass
        entity C(A):
            pass
        entity X(B, C):
            pass
        entity Y(C, B):
            pass
        entity Z(X, Y):
            pass
        z := Z()
    "#};
    let err = compile_err(src);
    assert_eq!(err.kind, DiagnosticKind::Mro("Z".to_string()));
}

#[test]
fn override_result_type_must_match() {
    let src = indoc! {r#"
        entity Base of "minecraft:cow":
            virtual def hit() -> int:
                result 1
        entity Sub(Base):
            override def hit() -> bool:
                result True
    "#};
    let err = compile_err(src);
    assert!(matches!(
        err.kind,
        DiagnosticKind::OverrideResultMismatch { .. }
    ));
}

#[test]
fn override_without_virtual_base() {
    let src = indoc! {r#"
        entity Lone of "minecraft:cow":
            override def hit():
                pass
    "#};
    let err = compile_err(src);
    assert_eq!(err.kind, DiagnosticKind::NotOverriding("hit".to_string()));
}

#[test]
fn shadowing_a_virtual_requires_override() {
    let src = indoc! {r#"
        entity Base of "minecraft:cow":
            virtual def hit():
                pass
        entity Sub(Base):
            def hit():
                pass
    "#};
    let err = compile_err(src);
    assert_eq!(err.kind, DiagnosticKind::OverrideQualifier("hit".to_string()));
}

#[test]
fn inherited_field_cannot_be_redefined() {
    let src = indoc! {r#"
        entity A of "minecraft:cow":
            hp: int
        entity B(A):
            hp: int
    "#};
    let err = compile_err(src);
    assert_eq!(err.kind, DiagnosticKind::DuplicateEntityField("hp".to_string()));
}

#[test]
fn field_and_method_share_a_namespace() {
    let src = indoc! {r#"
        entity E of "minecraft:cow":
            hp: int
            def hp() -> int:
                result 1
    "#};
    let err = compile_err(src);
    assert_eq!(err.kind, DiagnosticKind::MethodAttrConflict("hp".to_string()));
}

#[test]
fn one_new_method_per_chain() {
    let src = indoc! {r#"
        entity A of "minecraft:cow":
            def new():
                pass
        entity B(A):
            def new():
                pass
    "#};
    let err = compile_err(src);
    assert_eq!(err.kind, DiagnosticKind::MultipleNewMethods);
}

#[test]
fn virtual_dispatch_emits_a_tag_guarded_table() {
    let src = indoc! {r#"
        entity Base of "minecraft:cow":
            virtual def poke():
                /say base
        entity Sub(Base):
            override def poke():
                /say sub
        b := Base()
        b.poke()
    "#};
    let pack = compile(src);
    let dispatch = pack
        .file("internal/dispatch1.mcfunction")
        .expect("virtual call creates a dispatch table");
    assert_eq!(dispatch.lines.len(), 2);
    assert!(dispatch.lines[0].contains("tag=acacia.x.Base"));
    assert!(dispatch.lines[1].contains("tag=acacia.x.Sub"));
    for line in &dispatch.lines {
        assert!(line.starts_with("execute if entity @s["));
        assert!(line.contains("run function internal/fn"));
    }
}

#[test]
fn instantiation_summons_and_tags() {
    let src = indoc! {r#"
        entity Pig of "minecraft:pig" at Pos(0, 64, 0):
            hp: int
        p := Pig()
    "#};
    let pack = compile(src);
    let main = main_lines(&pack);
    assert!(main.contains(&"summon minecraft:pig 0 64 0".to_string()));
    assert!(main
        .iter()
        .any(|l| l.starts_with("execute positioned 0 64 0 run tag @e[type=minecraft:pig,c=1]")));
    // The integer field starts zeroed.
    assert!(main.iter().any(|l| l.contains("acacia.e1 0")));
}

#[test]
fn entity_rejects_compile_only_fields() {
    let src = indoc! {r#"
        entity Bad of "minecraft:cow":
            label: str
    "#};
    let err = compile_err(src);
    assert!(matches!(err.kind, DiagnosticKind::UnsupportedEntityField { .. }));
}

#[test]
fn entity_rejects_structs_with_compile_only_fields() {
    let src = indoc! {r#"
        struct Note:
            text: str
        entity Bad of "minecraft:cow":
            n: Note
    "#};
    let err = compile_err(src);
    assert!(matches!(
        err.kind,
        DiagnosticKind::UnsupportedEntityFieldInStruct { .. }
    ));
}

#[test]
fn struct_fields_flatten_onto_entities() {
    let src = indoc! {r#"
        struct Point:
            x: int
            y: int
        entity Holder of "minecraft:cow":
            p: Point
        h := Holder()
        h.p.x = 4
    "#};
    let pack = compile(src);
    assert!(main_lines(&pack)
        .iter()
        .any(|l| l.starts_with("scoreboard players set @e[tag=") && l.ends_with("acacia.e1 4")));
}

// ---- groups and filters ----------------------------------------------------

#[test]
fn engroup_select_splices_filter_args() {
    let src = indoc! {r#"
        entity Mob of "minecraft:zombie":
            pass
        g := Engroup[Mob]()
        g.select(Enfilter().is_type("zombie"))
        g.kill()
    "#};
    let pack = compile(src);
    let main = main_lines(&pack);
    assert!(main
        .iter()
        .any(|l| l.starts_with("tag @e[tag=acacia.t.Mob,type=zombie] add acacia.g")));
    assert!(main.iter().any(|l| l.starts_with("kill @e[tag=acacia.g")));
}

#[test]
fn engroup_size_counts_members() {
    let src = indoc! {r#"
        entity Mob of "minecraft:zombie":
            pass
        g := Engroup[Mob]()
        n := g.size()
    "#};
    let pack = compile(src);
    assert!(main_lines(&pack)
        .iter()
        .any(|l| l.starts_with("execute as @e[tag=acacia.g") && l.contains("run scoreboard players add")));
}

// ---- modules ---------------------------------------------------------------

#[test]
fn imports_resolve_relative_to_the_entry_unit() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.aca"), "const VALUE = 7\n").unwrap();
    let (sources, result) = compile_source(
        dir.path().join("main.aca"),
        "import lib\nx: int = lib.VALUE\n".to_string(),
        Config::default(),
    );
    let pack = match result {
        Ok(pack) => pack,
        Err(diag) => panic!("{}", diag.printer().sources(&sources).render()),
    };
    assert!(pack
        .file("init.mcfunction")
        .unwrap()
        .lines
        .contains(&"scoreboard players set acacia1 acacia 7".to_string()));
}

#[test]
fn missing_module() {
    let dir = tempfile::tempdir().unwrap();
    let (_, result) = compile_source(
        dir.path().join("main.aca"),
        "import nothing\n".to_string(),
        Config::default(),
    );
    let err = result.expect_err("import should fail");
    assert_eq!(err.kind, DiagnosticKind::ModuleNotFound("nothing".to_string()));
}

#[test]
fn circular_imports_are_detected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.aca"), "import b\n").unwrap();
    std::fs::write(dir.path().join("b.aca"), "import a\n").unwrap();
    let (_, result) = compile_source(
        dir.path().join("main.aca"),
        "import a\n".to_string(),
        Config::default(),
    );
    let err = result.expect_err("cycle should fail");
    assert_eq!(err.kind, DiagnosticKind::CircularParse("a".to_string()));
}

#[test]
fn math_module_folds() {
    let pack = compile("import math\nk: int = math.pow(2, 10)\n");
    assert!(init_lines(&pack)
        .contains(&"scoreboard players set acacia1 acacia 1024".to_string()));
}

#[test]
fn negative_power_is_const_arithmetic() {
    let err = compile_err("import math\nk: int = math.pow(2, -1)\n");
    assert!(matches!(err.kind, DiagnosticKind::ConstArithmetic(_)));
}
