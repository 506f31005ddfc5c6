//! Compilation options.
//!
//! One value carries every knob of the CLI surface; it is threaded through
//! the analyzer and emitter explicitly so no stage reaches for globals.

use acacia_core::McVersion;

/// Source text encoding accepted by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    /// Bytes map 1:1 to the first 256 code points.
    Latin1,
}

impl Encoding {
    pub fn decode(self, bytes: &[u8]) -> Result<String, String> {
        match self {
            Encoding::Utf8 => {
                // Tolerate a BOM, reject anything else malformed.
                let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
                String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())
            }
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mc_version: McVersion,
    pub education_edition: bool,
    /// Objective holding all allocated variables, `dummy` criterion.
    pub scoreboard: String,
    /// Folder under the output root that receives every function file.
    pub function_folder: String,
    pub main_file: String,
    pub init_file: String,
    /// Folder for compiler-generated helper files.
    pub internal_folder: String,
    pub entity_tag_prefix: String,
    pub debug_comments: bool,
    /// When off, every guarded body spills to its own file.
    pub optimize: bool,
    pub override_old: bool,
    pub encoding: Encoding,
    pub verbose: bool,
    /// Largest guarded body, in rendered lines, that inlines into an
    /// `execute ... run` chain.
    pub max_inline: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mc_version: McVersion::default(),
            education_edition: false,
            scoreboard: "acacia".to_string(),
            function_folder: String::new(),
            main_file: "main".to_string(),
            init_file: "init".to_string(),
            internal_folder: "internal".to_string(),
            entity_tag_prefix: "acacia".to_string(),
            debug_comments: false,
            optimize: true,
            override_old: false,
            encoding: Encoding::Utf8,
            verbose: false,
            max_inline: 20,
        }
    }
}
