//! The emitted file tree.

use std::io;
use std::path::Path;

/// One emitted `.mcfunction` file, path relative to the output root.
#[derive(Debug, Clone, PartialEq)]
pub struct PackFile {
    pub path: String,
    pub lines: Vec<String>,
}

impl PackFile {
    pub fn content(&self) -> String {
        let mut out = self.lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

/// Every file of one compilation, produced in full before any byte hits
/// disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Pack {
    pub files: Vec<PackFile>,
    /// The function folder under the output root; scrubbed when
    /// `override_old` was requested.
    pub function_folder: String,
    pub override_old: bool,
}

impl Pack {
    /// Find a file by its root-relative path, for inspection.
    pub fn file(&self, path: &str) -> Option<&PackFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Write all files under `out_root`. With `override_old`, prior
    /// contents of the function folder are deleted first; otherwise files
    /// are overwritten one by one.
    pub fn write(&self, out_root: &Path) -> io::Result<()> {
        if self.override_old {
            let scrub = if self.function_folder.is_empty() {
                out_root.to_path_buf()
            } else {
                out_root.join(&self.function_folder)
            };
            match std::fs::remove_dir_all(&scrub) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        for file in &self.files {
            let path = out_root.join(&file.path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, file.content())?;
        }
        Ok(())
    }
}
