//! Module loading.
//!
//! `import a.b` resolves either to a host-registered builtin module or to
//! `a/b.aca` next to the importing unit. Source modules re-enter the whole
//! pipeline (lexer, parser, analyzer); their top-level runtime statements
//! lower into the importer's current sink, and their module-scope bindings
//! become the module's attributes. Loads are cached by canonical path; a
//! unit observed mid-load is a circular import.

pub(crate) mod builtin;

use std::path::PathBuf;

use acacia_core::{ModuleId, Span};

use crate::analyzer::Analyzer;
use crate::diagnostics::{Diagnostic, DiagnosticKind};

use crate::analyzer::{ModuleInfo, ModuleState, ScopeKind};

impl Analyzer {
    pub(crate) fn load_module(
        &mut self,
        path: &[String],
        span: Span,
    ) -> Result<ModuleId, Diagnostic> {
        let dotted = path.join(".");

        if path.len() == 1
            && let Some(bindings) = builtin::builtin_module(&path[0])
        {
            let key = PathBuf::from(format!("<builtin:{}>", path[0]));
            if let Some(ModuleState::Done(id)) = self.module_cache.get(&key) {
                return Ok(*id);
            }
            let id = ModuleId::from_raw(self.modules.len() as u32);
            self.modules.push(ModuleInfo {
                name: path[0].clone(),
                bindings,
            });
            self.module_cache.insert(key, ModuleState::Done(id));
            return Ok(id);
        }

        let mut file = self.base_dir().to_path_buf();
        for segment in path {
            file.push(segment);
        }
        file.set_extension("aca");
        let canonical = file
            .canonicalize()
            .map_err(|_| self.err(DiagnosticKind::ModuleNotFound(dotted.clone()), span))?;

        match self.module_cache.get(&canonical) {
            Some(ModuleState::InProgress) => {
                return Err(self.err(DiagnosticKind::CircularParse(dotted), span));
            }
            Some(ModuleState::Done(id)) => return Ok(*id),
            None => {}
        }
        self.module_cache
            .insert(canonical.clone(), ModuleState::InProgress);

        let bytes = std::fs::read(&canonical)
            .map_err(|e| self.err(DiagnosticKind::Io(e.to_string()), span))?;
        let text = self
            .config
            .encoding
            .decode(&bytes)
            .map_err(|e| self.err(DiagnosticKind::Io(e), span))?;
        let source = self.sources.add(canonical.clone(), text);

        let tokens = crate::lexer::tokenize(source, self.sources.text(source))?;
        let module = crate::parser::parse_module(source, &tokens)?;

        let prev_src = std::mem::replace(&mut self.src, source);
        self.push_scope(ScopeKind::Module);
        let outcome = self.analyze_block(&module.body);
        let scope = self.pop_scope();
        self.src = prev_src;
        outcome?;

        let id = ModuleId::from_raw(self.modules.len() as u32);
        self.modules.push(ModuleInfo {
            name: path.last().expect("import path never empty").clone(),
            bindings: scope.bindings,
        });
        self.module_cache.insert(canonical, ModuleState::Done(id));
        Ok(id)
    }
}
