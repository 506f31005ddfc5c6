use crate::{Pos, Span};

fn span(lo: u32, hi: u32, line: u32, col: u32, end_line: u32, end_col: u32) -> Span {
    Span::new(lo, hi, Pos::new(line, col), Pos::new(end_line, end_col))
}

#[test]
fn cover_picks_outer_bounds() {
    let a = span(4, 9, 1, 5, 1, 10);
    let b = span(12, 15, 2, 3, 2, 6);
    let joined = a.cover(b);
    assert_eq!(joined.lo, 4);
    assert_eq!(joined.hi, 15);
    assert_eq!(joined.start, Pos::new(1, 5));
    assert_eq!(joined.end, Pos::new(2, 6));
    // Order of operands does not matter.
    assert_eq!(b.cover(a), joined);
}

#[test]
fn cover_with_nested_span() {
    let outer = span(0, 20, 1, 1, 3, 1);
    let inner = span(5, 10, 1, 6, 1, 11);
    assert_eq!(outer.cover(inner), outer);
}

#[test]
fn point_span_is_empty() {
    let p = Span::point(7, Pos::new(2, 4));
    assert!(p.is_empty());
    assert_eq!(p.byte_range(), 7..7);
}

#[test]
fn display_shows_start_position() {
    let s = span(4, 9, 3, 14, 3, 19);
    assert_eq!(s.to_string(), "3:14");
}
