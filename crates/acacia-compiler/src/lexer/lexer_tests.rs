use acacia_core::Pos;
use pretty_assertions::assert_eq;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::source::SourceId;

use super::{tokenize, CmdSegment, StrSegment, TokenKind};
use TokenKind::*;

fn kinds(src: &str) -> Vec<TokenKind> {
    tokenize(SourceId::ENTRY, src)
        .expect("source should tokenize")
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

fn lex_err(src: &str) -> Diagnostic {
    tokenize(SourceId::ENTRY, src).expect_err("source should not tokenize")
}

fn ident(name: &str) -> TokenKind {
    Ident(name.to_string())
}

#[test]
fn plain_statement() {
    assert_eq!(
        kinds("x := 10 + 0x2A\n"),
        vec![ident("x"), Walrus, Int(10), Plus, Int(42), Newline, Eof]
    );
}

#[test]
fn hex_and_binary_literals() {
    assert_eq!(
        kinds("v := 0XF2e + 0b11\n"),
        vec![ident("v"), Walrus, Int(3886), Plus, Int(3), Newline, Eof]
    );
}

#[test]
fn float_literal() {
    assert_eq!(
        kinds("f := 1.5\n"),
        vec![ident("f"), Walrus, Float(1.5), Newline, Eof]
    );
}

#[test]
fn int_overflow() {
    assert_eq!(lex_err("2147483648\n").kind, DiagnosticKind::IntOverflow);
    assert_eq!(lex_err("0x80000000\n").kind, DiagnosticKind::IntOverflow);
    // The largest scoreboard value is fine.
    assert_eq!(kinds("2147483647\n"), vec![Int(2147483647), Newline, Eof]);
}

#[test]
fn indent_dedent_blocks() {
    let src = "if a:\n    pass\nelse:\n    pass\n";
    assert_eq!(
        kinds(src),
        vec![
            KwIf,
            ident("a"),
            Colon,
            Newline,
            Indent,
            KwPass,
            Newline,
            Dedent,
            KwElse,
            Colon,
            Newline,
            Indent,
            KwPass,
            Newline,
            Dedent,
            Eof,
        ]
    );
}

#[test]
fn dedent_to_unknown_level() {
    let src = "if a:\n    pass\n  x\n";
    assert_eq!(lex_err(src).kind, DiagnosticKind::InvalidDedent);
}

#[test]
fn missing_trailing_newline_is_supplied() {
    assert_eq!(kinds("x := 1"), vec![ident("x"), Walrus, Int(1), Newline, Eof]);
}

#[test]
fn blank_and_comment_lines_do_not_affect_layout() {
    let src = "if a:\n    x := 1\n\n    # note\n    y := 2\n";
    let toks = kinds(src);
    assert_eq!(toks.iter().filter(|k| **k == Indent).count(), 1);
    assert_eq!(toks.iter().filter(|k| **k == Dedent).count(), 1);
}

#[test]
fn long_comment_spans_lines() {
    let src = "x := 1 #* spans\nseveral\nlines *# + 2\n";
    assert_eq!(
        kinds(src),
        vec![ident("x"), Walrus, Int(1), Plus, Int(2), Newline, Eof]
    );
}

#[test]
fn unclosed_long_comment() {
    assert_eq!(
        lex_err("#* never closed\n").kind,
        DiagnosticKind::UnclosedLongComment
    );
}

#[test]
fn continuation_joins_lines() {
    assert_eq!(
        kinds("x = 1 + \\\n    2\n"),
        vec![ident("x"), Assign, Int(1), Plus, Int(2), Newline, Eof]
    );
}

#[test]
fn continuation_rejects_trailing_text() {
    assert_eq!(
        lex_err("x = \\ y\n").kind,
        DiagnosticKind::CharAfterContinuation
    );
}

#[test]
fn continuation_at_eof() {
    assert_eq!(lex_err("x = \\").kind, DiagnosticKind::EofAfterContinuation);
}

#[test]
fn brackets_suppress_newlines() {
    assert_eq!(
        kinds("v := [1,\n    2]\n"),
        vec![
            ident("v"),
            Walrus,
            LBracket,
            Int(1),
            Comma,
            Int(2),
            RBracket,
            Newline,
            Eof,
        ]
    );
}

#[test]
fn mismatched_closer() {
    assert_eq!(
        lex_err("(]\n").kind,
        DiagnosticKind::UnmatchedBracketPair(']')
    );
}

#[test]
fn unclosed_bracket_at_eof() {
    assert_eq!(lex_err("f(1\n").kind, DiagnosticKind::UnclosedBracket('('));
}

#[test]
fn unclosed_string_points_at_opening_quote() {
    let err = lex_err("s = \"hello");
    assert_eq!(err.kind, DiagnosticKind::UnclosedQuote);
    assert_eq!(err.span.start, Pos::new(1, 5));
}

#[test]
fn string_with_hole_and_font() {
    let toks = tokenize(SourceId::ENTRY, "m := \"a{b}c\\f{red}!\\f{}\"\n").unwrap();
    let TokenKind::Str(segments) = &toks[2].kind else {
        panic!("expected a string token, got {:?}", toks[2].kind);
    };
    assert_eq!(segments.len(), 6);
    assert_eq!(segments[0], StrSegment::Text("a".to_string()));
    let StrSegment::Expr(hole) = &segments[1] else {
        panic!("expected a hole, got {:?}", segments[1]);
    };
    assert_eq!(hole.len(), 1);
    assert_eq!(hole[0].kind, ident("b"));
    assert_eq!(segments[2], StrSegment::Text("c".to_string()));
    assert_eq!(segments[3], StrSegment::Font("red".to_string()));
    assert_eq!(segments[4], StrSegment::Text("!".to_string()));
    assert_eq!(segments[5], StrSegment::Font(String::new()));
}

#[test]
fn hole_nests_brackets_and_strings() {
    let toks = tokenize(SourceId::ENTRY, "t := \"n={m[\"k\"]}\"\n").unwrap();
    let TokenKind::Str(segments) = &toks[2].kind else {
        panic!("expected a string token");
    };
    let StrSegment::Expr(hole) = &segments[1] else {
        panic!("expected a hole");
    };
    let hole_kinds: Vec<_> = hole.iter().map(|t| t.kind.clone()).collect();
    assert_eq!(
        hole_kinds,
        vec![
            ident("m"),
            LBracket,
            Str(vec![StrSegment::Text("k".to_string())]),
            RBracket,
        ]
    );
}

#[test]
fn escapes_resolve() {
    let toks = tokenize(SourceId::ENTRY, "s := \"a\\n\\t\\\\\\\"\\u{41}\\{\"\n").unwrap();
    let TokenKind::Str(segments) = &toks[2].kind else {
        panic!("expected a string token");
    };
    assert_eq!(segments, &[StrSegment::Text("a\n\t\\\"A{".to_string())]);
}

#[test]
fn unknown_escape_is_rejected() {
    assert_eq!(
        lex_err("s := \"\\q\"\n").kind,
        DiagnosticKind::InvalidUnicodeEscape
    );
}

#[test]
fn hole_must_stay_on_one_line() {
    assert_eq!(lex_err("s := \"{a\n}\"\n").kind, DiagnosticKind::InvalidFexpr);
}

#[test]
fn line_command() {
    let toks = tokenize(SourceId::ENTRY, "/say hi ${name}\n").unwrap();
    let TokenKind::Command(segments) = &toks[0].kind else {
        panic!("expected a command token, got {:?}", toks[0].kind);
    };
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0], CmdSegment::Text("say hi ".to_string()));
    let CmdSegment::Interp { name, .. } = &segments[1] else {
        panic!("expected an interpolation");
    };
    assert_eq!(name, "name");
}

#[test]
fn block_command_joins_lines() {
    let toks = tokenize(SourceId::ENTRY, "/*tp @s\n    1 2 3*/\n").unwrap();
    let TokenKind::Command(segments) = &toks[0].kind else {
        panic!("expected a command token");
    };
    assert_eq!(segments, &[CmdSegment::Text("tp @s 1 2 3".to_string())]);
}

#[test]
fn unclosed_block_command() {
    assert_eq!(lex_err("/*tp @s\n").kind, DiagnosticKind::UnclosedCommand);
}

#[test]
fn slash_mid_line_is_division() {
    assert_eq!(
        kinds("x := a / b\n"),
        vec![ident("x"), Walrus, ident("a"), Slash, ident("b"), Newline, Eof]
    );
}

#[test]
fn selector_score_literal_tokens() {
    assert_eq!(
        kinds("e := |\"@p\": \"obj\"|\n"),
        vec![
            ident("e"),
            Walrus,
            Bar,
            Str(vec![StrSegment::Text("@p".to_string())]),
            Colon,
            Str(vec![StrSegment::Text("obj".to_string())]),
            Bar,
            Newline,
            Eof,
        ]
    );
}

#[test]
fn keywords_and_operators() {
    assert_eq!(
        kinds("def f(x: int) -> int:\n    result x != 0 and not x\n"),
        vec![
            KwDef,
            ident("f"),
            LParen,
            ident("x"),
            Colon,
            ident("int"),
            RParen,
            Arrow,
            ident("int"),
            Colon,
            Newline,
            Indent,
            KwResult,
            ident("x"),
            NotEq,
            Int(0),
            KwAnd,
            KwNot,
            ident("x"),
            Newline,
            Dedent,
            Eof,
        ]
    );
}

#[test]
fn invalid_character() {
    assert_eq!(lex_err("x := 1 ? 2\n").kind, DiagnosticKind::InvalidChar('?'));
}
