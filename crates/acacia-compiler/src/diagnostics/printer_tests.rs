use acacia_core::{Pos, Span};

use crate::source::SourceMap;

use super::{Diagnostic, DiagnosticKind};

fn sample() -> (SourceMap, Diagnostic) {
    let mut sources = SourceMap::new();
    let src = "s = \"hello\n";
    let id = sources.add("demo.aca", src.to_string());
    let span = Span::new(4, 5, Pos::new(1, 5), Pos::new(1, 6));
    let diag = Diagnostic::new(DiagnosticKind::UnclosedQuote, id, span);
    (sources, diag)
}

#[test]
fn plain_rendering_without_sources() {
    let (_, diag) = sample();
    assert_eq!(
        diag.printer().render(),
        "error at 1:5: unclosed string literal"
    );
}

#[test]
fn snippet_rendering_names_the_file() {
    let (sources, diag) = sample();
    let rendered = diag.printer().sources(&sources).render();
    assert!(rendered.contains("unclosed string literal"));
    assert!(rendered.contains("demo.aca"));
}

#[test]
fn notes_render_below_the_message() {
    let (sources, diag) = sample();
    let diag = diag.with_plain_note("while reading the literal");
    let rendered = diag.printer().sources(&sources).render();
    assert!(rendered.contains("while reading the literal"));

    let plain = diag.printer().render();
    assert!(plain.contains("note: while reading the literal"));
}

#[test]
fn codes_are_stable() {
    let (_, diag) = sample();
    assert_eq!(diag.code(), "unclosed-quote");
}
