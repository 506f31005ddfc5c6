use crate::{validate_name, validate_path, NameError};

#[test]
fn accepts_plain_names() {
    assert_eq!(validate_name("acacia"), Ok(()));
    assert_eq!(validate_name("my_pack.v2"), Ok(()));
    assert_eq!(validate_name("A-b+c"), Ok(()));
}

#[test]
fn rejects_empty() {
    assert_eq!(validate_name(""), Err(NameError::Empty));
    assert_eq!(validate_path(""), Err(NameError::Empty));
}

#[test]
fn rejects_leading_digit() {
    assert_eq!(validate_name("1abc"), Err(NameError::LeadingDigit));
}

#[test]
fn rejects_invalid_characters() {
    assert_eq!(validate_name("a b"), Err(NameError::InvalidChar(' ')));
    assert_eq!(validate_name("a/b"), Err(NameError::InvalidChar('/')));
}

#[test]
fn paths_check_each_segment() {
    assert_eq!(validate_path("io/greet"), Ok(()));
    assert_eq!(validate_path("io//greet"), Err(NameError::Empty));
    assert_eq!(validate_path("io/9greet"), Err(NameError::LeadingDigit));
    // Uppercase is fine for names but not for pack paths.
    assert_eq!(validate_path("IO"), Err(NameError::InvalidChar('I')));
}
