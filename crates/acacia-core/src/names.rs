//! Validation for identifier-shaped names.
//!
//! Scoreboard objectives, entity-tag prefixes, and function-folder segments
//! all share the same shape rules: non-empty, no leading digit, and a
//! restricted character set. The CLI validates its options with these before
//! the pipeline runs; the emitter validates interface paths with the same
//! rules so the two surfaces cannot drift apart.

use thiserror::Error;

/// Why a name was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("must not be empty")]
    Empty,
    #[error("must not start with a digit")]
    LeadingDigit,
    #[error("invalid character {0:?}")]
    InvalidChar(char),
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+')
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.')
}

/// Validate a scoreboard objective or tag-prefix name.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    validate(name, is_name_char)
}

/// Validate one segment of a function path.
///
/// Function files land inside a behavior pack, where resource locations are
/// lowercase. Each `/`-separated segment is checked on its own.
pub fn validate_path(path: &str) -> Result<(), NameError> {
    if path.is_empty() {
        return Err(NameError::Empty);
    }
    for segment in path.split('/') {
        validate(segment, is_path_char)?;
    }
    Ok(())
}

fn validate(name: &str, valid: impl Fn(char) -> bool) -> Result<(), NameError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(NameError::Empty);
    };
    if first.is_ascii_digit() {
        return Err(NameError::LeadingDigit);
    }
    for c in std::iter::once(first).chain(chars) {
        if !valid(c) {
            return Err(NameError::InvalidChar(c));
        }
    }
    Ok(())
}
