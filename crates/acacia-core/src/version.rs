//! Minecraft Bedrock version triple.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A target game version `major.minor.patch`.
///
/// Ordering is lexicographic over the three components, so feature gates can
/// be written as `version >= McVersion::new(1, 19, 50)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct McVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl McVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Default for McVersion {
    fn default() -> Self {
        Self::new(1, 19, 50)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("expected three dot-separated components")]
    WrongShape,
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
}

impl FromStr for McVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        let &[major, minor, patch] = parts.as_slice() else {
            return Err(VersionParseError::WrongShape);
        };
        let parse = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| VersionParseError::InvalidNumber(p.to_string()))
        };
        Ok(Self {
            major: parse(major)?,
            minor: parse(minor)?,
            patch: parse(patch)?,
        })
    }
}

impl fmt::Display for McVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
