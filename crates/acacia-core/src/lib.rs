//! Core data structures shared across the Acacia compiler.
//!
//! - `span` - source positions and byte spans carried by tokens, AST nodes,
//!   and diagnostics
//! - `ids` - newtype handles for allocated runtime resources
//! - `names` - validation for identifier-shaped names (scoreboards, tags,
//!   function-path segments)
//! - `version` - Minecraft version triple

mod ids;
mod names;
mod span;
mod version;

#[cfg(test)]
mod names_tests;
#[cfg(test)]
mod span_tests;
#[cfg(test)]
mod version_tests;

pub use ids::{EntityObjId, FuncId, ModuleId, SlotId, StructId, TagId, TemplateId};
pub use names::{validate_name, validate_path, NameError};
pub use span::{Pos, Span};
pub use version::{McVersion, VersionParseError};
