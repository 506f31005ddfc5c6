//! Acacia compiler: lexer, parser, analyzer, and command emitter.
//!
//! The pipeline for one invocation:
//! - `lexer` - indentation-aware tokenizer
//! - `parser` - recursive descent to a typed AST
//! - `analyzer` - name resolution, two-world type checking, constant
//!   folding, template MROs, lowering to abstract ops
//! - `emit` - scoreboard/tag allocation and `.mcfunction` rendering
//! - `module` - `import` resolution (source units and builtins)
//! - `diagnostics` - positioned errors, rendered with source snippets

pub mod analyzer;
pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod emit;
pub mod ir;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod source;
pub mod types;
pub mod value;

#[cfg(test)]
mod value_tests;

use std::path::{Path, PathBuf};

use acacia_core::{Pos, Span};

use crate::analyzer::Analyzer;
use crate::diagnostics::DiagnosticKind;

pub use crate::config::{Config, Encoding};
pub use crate::diagnostics::{Diagnostic, DiagnosticPrinter};
pub use crate::emit::{Pack, PackFile};
pub use crate::source::{SourceId, SourceMap};

/// Errors from the one-call [`build`] API. Callers that want to render
/// diagnostics themselves (colors, custom streams) use [`compile_file`]
/// instead, which hands back the source map.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Compile(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Compile `path` and write the emitted files under `out_root`.
pub fn build(path: &Path, out_root: &Path, config: Config) -> Result<Pack, Error> {
    let (sources, result) = compile_file(path, config);
    match result {
        Ok(pack) => {
            pack.write(out_root)?;
            Ok(pack)
        }
        Err(diag) => Err(Error::Compile(
            diag.printer().sources(&sources).render(),
        )),
    }
}

/// Compile a source file from disk.
///
/// The source map always comes back so the caller can render whatever
/// diagnostic aborted the pipeline.
pub fn compile_file(path: &Path, config: Config) -> (SourceMap, Result<Pack, Diagnostic>) {
    let text = match std::fs::read(path) {
        Ok(bytes) => match config.encoding.decode(&bytes) {
            Ok(text) => text,
            Err(e) => return entry_error(path, DiagnosticKind::Io(e)),
        },
        Err(e) => return entry_error(path, DiagnosticKind::Io(e.to_string())),
    };
    compile_source(path, text, config)
}

/// Compile source text as if read from `path`; imports resolve relative to
/// its parent directory.
pub fn compile_source(
    path: impl Into<PathBuf>,
    text: String,
    config: Config,
) -> (SourceMap, Result<Pack, Diagnostic>) {
    let path = path.into();
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut sources = SourceMap::new();
    let entry = sources.add(path, text);

    let tokens = match lexer::tokenize(entry, sources.text(entry)) {
        Ok(tokens) => tokens,
        Err(diag) => return (sources, Err(diag)),
    };
    let module = match parser::parse_module(entry, &tokens) {
        Ok(module) => module,
        Err(diag) => return (sources, Err(diag)),
    };

    let analyzer = Analyzer::new(config.clone(), sources, entry, base_dir);
    let (sources, lowered) = analyzer.run(&module);
    match lowered {
        Ok(lowered) => {
            let pack = emit::render(lowered, &config);
            (sources, Ok(pack))
        }
        Err(diag) => (sources, Err(diag)),
    }
}

fn entry_error(path: &Path, kind: DiagnosticKind) -> (SourceMap, Result<Pack, Diagnostic>) {
    let mut sources = SourceMap::new();
    let entry = sources.add(path, String::new());
    let diag = Diagnostic::new(kind, entry, Span::point(0, Pos::start()));
    (sources, Err(diag))
}
