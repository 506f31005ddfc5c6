use indoc::indoc;
use pretty_assertions::assert_eq;

use crate::diagnostics::DiagnosticKind;
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

#[test]
fn constant_folding_initializes_in_the_init_file() {
    let pack = compile("x = 0XF2e + 0b11\n");
    let init = pack.file("init.mcfunction").unwrap();
    assert_eq!(
        init.lines,
        vec![
            "scoreboard objectives add acacia dummy".to_string(),
            "scoreboard players set acacia1 acacia 3889".to_string(),
        ]
    );
    // No runtime arithmetic survives the fold.
    let main = pack.file("main.mcfunction").unwrap();
    assert_eq!(main.lines, vec!["function init".to_string()]);
}

#[test]
fn folded_if_emits_only_the_selected_branch() {
    let src = indoc! {"
        if True:
            /say yes
        else:
            /say no
    "};
    let pack = compile(src);
    let main = pack.file("main.mcfunction").unwrap();
    assert_eq!(
        main.lines,
        vec!["function init".to_string(), "say yes".to_string()]
    );
}

#[test]
fn runtime_if_freezes_its_condition() {
    let src = indoc! {"
        a := 10
        if a > 5:
            /say hi
    "};
    let pack = compile(src);
    let main = pack.file("main.mcfunction").unwrap();
    assert_eq!(
        main.lines,
        vec![
            "function init".to_string(),
            "scoreboard players set acacia2 acacia 0".to_string(),
            "execute if score acacia1 acacia matches 6.. run scoreboard players set acacia2 acacia 1"
                .to_string(),
            "execute if score acacia2 acacia matches 1 run say hi".to_string(),
        ]
    );
}

#[test]
fn command_interpolation_expands_to_one_line() {
    let src = indoc! {r#"
        const greeting = "hello world"
        /say ${greeting}
    "#};
    let pack = compile(src);
    let main = pack.file("main.mcfunction").unwrap();
    assert_eq!(
        main.lines,
        vec!["function init".to_string(), "say hello world".to_string()]
    );
}

#[test]
fn interfaces_become_files_at_their_path() {
    let src = indoc! {"
        interface io.greet:
            /say hi
    "};
    let pack = compile(src);
    let file = pack.file("io/greet.mcfunction").unwrap();
    assert_eq!(file.lines, vec!["say hi".to_string()]);
}

#[test]
fn reserved_interface_paths_are_rejected() {
    let (_, result) = compile_source(
        "test.aca",
        "interface main:\n    pass\n".to_string(),
        Config::default(),
    );
    assert_eq!(
        result.unwrap_err().kind,
        DiagnosticKind::ReservedInterfacePath("main".to_string())
    );
}

#[test]
fn duplicate_interfaces_are_rejected() {
    let src = indoc! {"
        interface a.b:
            pass
        interface a.b:
            pass
    "};
    let (_, result) = compile_source("test.aca", src.to_string(), Config::default());
    assert_eq!(
        result.unwrap_err().kind,
        DiagnosticKind::DuplicateInterface("a/b".to_string())
    );
}

#[test]
fn while_loops_recurse_through_an_internal_file() {
    let src = indoc! {"
        n := 3
        while n > 0:
            n -= 1
    "};
    let pack = compile(src);
    let loop_file = pack.file("internal/while1.mcfunction").unwrap();
    assert_eq!(
        loop_file.lines.last().unwrap(),
        "execute if score acacia2 acacia matches 1 run function internal/while1"
    );
    assert_eq!(
        loop_file.lines.first().unwrap(),
        "scoreboard players remove acacia1 acacia 1"
    );
}

#[test]
fn small_guarded_bodies_inline() {
    let src = indoc! {"
        a := 1
        if a > 0:
            /say one
            /say two
            /say three
    "};
    let pack = compile(src);
    let main = pack.file("main.mcfunction").unwrap();
    let inlined = main
        .lines
        .iter()
        .filter(|l| l.starts_with("execute if score acacia2 acacia matches 1 run say "))
        .count();
    assert_eq!(inlined, 3);
    assert!(pack.file("internal/exec1.mcfunction").is_none());
}

#[test]
fn bodies_over_the_inline_threshold_spill() {
    let mut config = Config::default();
    config.max_inline = 2;
    let src = indoc! {"
        a := 1
        if a > 0:
            /say one
            /say two
            /say three
    "};
    let pack = compile_with(src, config);
    let spill = pack.file("internal/exec1.mcfunction").unwrap();
    assert_eq!(
        spill.lines,
        vec!["say one".to_string(), "say two".to_string(), "say three".to_string()]
    );
    assert!(pack
        .file("main.mcfunction")
        .unwrap()
        .lines
        .iter()
        .any(|l| l.ends_with("run function internal/exec1")));
}

#[test]
fn no_optimize_spills_every_guarded_body() {
    let mut config = Config::default();
    config.optimize = false;
    let src = indoc! {"
        a := 1
        if a > 0:
            /say one
            /say two
    "};
    let pack = compile_with(src, config);
    // Even the single-line condition materialization spills.
    let first = pack.file("internal/exec1.mcfunction").unwrap();
    assert_eq!(
        first.lines,
        vec!["scoreboard players set acacia2 acacia 1".to_string()]
    );
    let body = pack.file("internal/exec2.mcfunction").unwrap();
    assert_eq!(
        body.lines,
        vec!["say one".to_string(), "say two".to_string()]
    );
    let main = pack.file("main.mcfunction").unwrap();
    assert!(main.lines.iter().all(|l| !l.contains("run say")));
}

#[test]
fn compiling_twice_is_byte_identical() {
    let src = indoc! {r#"
        import print
        count := 0
        count += 1
        if count == 1:
            /say first
        print.tell("count is {count}")
    "#};
    let first = compile(src);
    let second = compile(src);
    assert_eq!(first, second);
}

#[test]
fn debug_comments_label_statements() {
    let mut config = Config::default();
    config.debug_comments = true;
    let pack = compile_with("x := 1\n", config);
    assert!(pack
        .file("main.mcfunction")
        .unwrap()
        .lines
        .iter()
        .any(|l| l.starts_with("# declaration (line 1)")));
}

#[test]
fn custom_scoreboard_and_folder_names() {
    let mut config = Config::default();
    config.scoreboard = "pack".to_string();
    config.function_folder = "demo".to_string();
    let pack = compile_with("x = 4\n", config);
    let init = pack.file("demo/init.mcfunction").unwrap();
    assert_eq!(
        init.lines,
        vec![
            "scoreboard objectives add pack dummy".to_string(),
            "scoreboard players set pack1 pack 4".to_string(),
        ]
    );
    let main = pack.file("demo/main.mcfunction").unwrap();
    assert_eq!(main.lines, vec!["function demo/init".to_string()]);
}

#[test]
fn arithmetic_lowering_snapshot() {
    let pack = compile("a := 4\nb := a * 3\n");
    insta::assert_snapshot!(
        pack.file("main.mcfunction").unwrap().lines.join("\n"),
        @r"
    function init
    scoreboard players operation acacia2 acacia = acacia1 acacia
    scoreboard players operation acacia2 acacia *= acacia3 acacia
    scoreboard players operation acacia4 acacia = acacia2 acacia
    "
    );
    insta::assert_snapshot!(
        pack.file("init.mcfunction").unwrap().lines.join("\n"),
        @r"
    scoreboard objectives add acacia dummy
    scoreboard players set acacia1 acacia 4
    scoreboard players set acacia3 acacia 3
    "
    );
}

#[test]
fn comparison_chain_snapshot() {
    let src = indoc! {"
        a := 2
        ok := 1 < a <= 5
    "};
    let pack = compile(src);
    insta::assert_snapshot!(
        pack.file("main.mcfunction").unwrap().lines.join("\n"),
        @r"
    function init
    scoreboard players set acacia2 acacia 0
    execute if score acacia1 acacia matches 2.. if score acacia1 acacia matches ..5 run scoreboard players set acacia2 acacia 1
    "
    );
}

#[test]
fn writer_places_files_under_the_output_root() {
    let dir = tempfile::tempdir().unwrap();
    let pack = compile("interface io.greet:\n    /say hi\n");
    pack.write(dir.path()).unwrap();
    let content = std::fs::read_to_string(dir.path().join("io/greet.mcfunction")).unwrap();
    assert_eq!(content, "say hi\n");
    assert!(dir.path().join("main.mcfunction").is_file());
    assert!(dir.path().join("init.mcfunction").is_file());
}

#[test]
fn override_old_scrubs_the_function_folder() {
    let dir = tempfile::tempdir().unwrap();
    let stale = dir.path().join("demo/old.mcfunction");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, "say stale\n").unwrap();

    let mut config = Config::default();
    config.function_folder = "demo".to_string();
    config.override_old = true;
    let pack = compile_with("x = 1\n", config);
    pack.write(dir.path()).unwrap();

    assert!(!stale.exists());
    assert!(dir.path().join("demo/main.mcfunction").is_file());
}

#[test]
fn build_compiles_and_writes_in_one_step() {
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("game.aca");
    std::fs::write(&src_path, "x = 2 + 3\n").unwrap();
    let out = dir.path().join("out");

    let pack = crate::build(&src_path, &out, Config::default()).unwrap();
    assert_eq!(pack.files.len(), 2);
    let init = std::fs::read_to_string(out.join("init.mcfunction")).unwrap();
    assert!(init.contains("scoreboard players set acacia1 acacia 5"));

    let err = crate::build(&dir.path().join("missing.aca"), &out, Config::default())
        .expect_err("missing source should fail");
    assert!(matches!(err, crate::Error::Compile(_)));
}

#[test]
fn stale_files_survive_without_override_old() {
    let dir = tempfile::tempdir().unwrap();
    let stale = dir.path().join("demo/old.mcfunction");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, "say stale\n").unwrap();

    let mut config = Config::default();
    config.function_folder = "demo".to_string();
    let pack = compile_with("x = 1\n", config);
    pack.write(dir.path()).unwrap();

    assert!(stale.exists());
}
