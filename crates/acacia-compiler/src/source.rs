//! Source units loaded during a compilation.

use std::path::{Path, PathBuf};

/// Handle to a loaded source unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SourceId(u32);

impl SourceId {
    /// The entry unit is always the first one registered.
    pub const ENTRY: SourceId = SourceId(0);

    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

struct SourceUnit {
    path: PathBuf,
    text: String,
}

/// All source units of one compilation, indexed by [`SourceId`].
///
/// Diagnostics carry a `SourceId` so an error inside an imported module
/// renders against that module's text, not the entry file's.
#[derive(Default)]
pub struct SourceMap {
    units: Vec<SourceUnit>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<PathBuf>, text: String) -> SourceId {
        let id = SourceId(self.units.len() as u32);
        self.units.push(SourceUnit {
            path: path.into(),
            text,
        });
        id
    }

    pub fn text(&self, id: SourceId) -> &str {
        &self.units[id.index()].text
    }

    pub fn path(&self, id: SourceId) -> &Path {
        &self.units[id.index()].path
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
