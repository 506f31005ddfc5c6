use indexmap::IndexMap;

use crate::ast::{BinOp, CmpOp, UnaryOp};
use crate::diagnostics::DiagnosticKind;
use crate::value::{
    const_binary, const_compare, const_index, const_slice, const_unary, font_code, Coord, FString,
    MapKey, PosValue, Value,
};

fn ints(values: &[i32]) -> Value {
    Value::List(values.iter().copied().map(Value::Int).collect())
}

#[test]
fn int_arithmetic_folds() {
    let v = const_binary(BinOp::Add, &Value::Int(3886), &Value::Int(3)).unwrap();
    assert_eq!(v, Value::Int(3889));
    let v = const_binary(BinOp::Mod, &Value::Int(7), &Value::Int(3)).unwrap();
    assert_eq!(v, Value::Int(1));
}

#[test]
fn int_overflow_is_const_arithmetic() {
    let err = const_binary(BinOp::Add, &Value::Int(i32::MAX), &Value::Int(1)).unwrap_err();
    assert!(matches!(err, DiagnosticKind::ConstArithmetic(_)));
    let err = const_unary(UnaryOp::Neg, &Value::Int(i32::MIN)).unwrap_err();
    assert!(matches!(err, DiagnosticKind::ConstArithmetic(_)));
}

#[test]
fn division_and_modulo_by_zero() {
    for op in [BinOp::Div, BinOp::Mod] {
        let err = const_binary(op, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert!(matches!(err, DiagnosticKind::ConstArithmetic(_)));
    }
}

#[test]
fn mixed_numeric_promotes_to_float() {
    let v = const_binary(BinOp::Mul, &Value::Int(2), &Value::Float(1.5)).unwrap();
    assert_eq!(v, Value::Float(3.0));
}

#[test]
fn bool_operands_reject_arithmetic() {
    let err = const_binary(BinOp::Add, &Value::Bool(true), &Value::Int(1)).unwrap_err();
    assert!(matches!(err, DiagnosticKind::InvalidOperand { .. }));
}

#[test]
fn string_concat() {
    let a = Value::Str(FString::plain("ab"));
    let b = Value::Str(FString::plain("cd"));
    let Value::Str(joined) = const_binary(BinOp::Add, &a, &b).unwrap() else {
        panic!("expected a string");
    };
    assert_eq!(joined.as_plain().as_deref(), Some("abcd"));
}

#[test]
fn list_concat_and_repeat() {
    let v = const_binary(BinOp::Add, &ints(&[1, 2]), &ints(&[3])).unwrap();
    assert_eq!(v, ints(&[1, 2, 3]));
    let v = const_binary(BinOp::Mul, &ints(&[1, 2]), &Value::Int(3)).unwrap();
    assert_eq!(v, ints(&[1, 2, 1, 2, 1, 2]));
    let v = const_binary(BinOp::Mul, &ints(&[1]), &Value::Int(-2)).unwrap();
    assert_eq!(v, ints(&[]));
}

#[test]
fn comparison_chains_over_numbers() {
    assert!(const_compare(CmpOp::Lt, &Value::Int(1), &Value::Float(1.5)).unwrap());
    assert!(const_compare(CmpOp::Ne, &Value::Int(1), &Value::Int(2)).unwrap());
    let err =
        const_compare(CmpOp::Lt, &Value::Str(FString::plain("a")), &Value::Int(1)).unwrap_err();
    assert!(matches!(err, DiagnosticKind::InvalidOperand { .. }));
}

#[test]
fn list_indexing() {
    let list = ints(&[10, 20, 30]);
    assert_eq!(const_index(&list, &Value::Int(1)).unwrap(), Value::Int(20));
    assert_eq!(const_index(&list, &Value::Int(-1)).unwrap(), Value::Int(30));
    let err = const_index(&list, &Value::Int(3)).unwrap_err();
    assert_eq!(
        err,
        DiagnosticKind::ListIndexOutOfBounds { len: 3, index: 3 }
    );
}

#[test]
fn list_slicing() {
    let list = ints(&[1, 2, 3, 4]);
    assert_eq!(
        const_slice(&list, Some(&Value::Int(1)), Some(&Value::Int(3))).unwrap(),
        ints(&[2, 3])
    );
    assert_eq!(const_slice(&list, None, Some(&Value::Int(-2))).unwrap(), ints(&[1, 2]));
    assert_eq!(const_slice(&list, Some(&Value::Int(9)), None).unwrap(), ints(&[]));
}

#[test]
fn map_lookup() {
    let mut entries = IndexMap::new();
    entries.insert(MapKey::Str("red".to_string()), Value::Int(1));
    let map = Value::Map(entries);
    assert_eq!(
        const_index(&map, &Value::Str(FString::plain("red"))).unwrap(),
        Value::Int(1)
    );
    let err = const_index(&map, &Value::Str(FString::plain("blue"))).unwrap_err();
    assert!(matches!(err, DiagnosticKind::MapKeyNotFound(_)));
    let err = const_index(&map, &ints(&[])).unwrap_err();
    assert!(matches!(err, DiagnosticKind::InvalidMapKey(_)));
}

#[test]
fn position_rendering() {
    let pos = PosValue {
        x: Coord::Abs(0.0),
        y: Coord::Abs(64.5),
        z: Coord::Abs(-3.0),
    };
    assert_eq!(pos.render(), "0 64.5 -3");
    let off = PosValue {
        x: Coord::Rel(1.0),
        y: Coord::Rel(0.0),
        z: Coord::Rel(-2.0),
    };
    assert_eq!(off.render(), "~1 ~ ~-2");
}

#[test]
fn command_text_forms() {
    assert_eq!(Value::Int(5).command_text().as_deref(), Some("5"));
    assert_eq!(Value::Bool(true).command_text().as_deref(), Some("true"));
    assert_eq!(
        Value::Str(FString::plain("hi")).command_text().as_deref(),
        Some("hi")
    );
    assert_eq!(ints(&[]).command_text(), None);
}

#[test]
fn font_codes() {
    assert_eq!(font_code("red"), Some("\u{a7}c"));
    assert_eq!(font_code(""), Some("\u{a7}r"));
    assert_eq!(font_code("sparkly"), None);
}
