//! Command emission.
//!
//! - `render` - turn lowered ops into command lines, allocating names for
//!   scoreboard slots, objectives, and tags
//! - `pack` - the emitted file tree and the disk writer

mod pack;
mod render;

#[cfg(test)]
mod emit_tests;

pub use pack::{Pack, PackFile};
pub use render::render;
