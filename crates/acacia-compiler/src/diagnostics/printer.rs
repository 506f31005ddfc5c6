//! Builder-pattern printer for rendering a diagnostic.

use std::fmt::Write;

use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};

use crate::source::SourceMap;

use super::Diagnostic;

/// Renders a [`Diagnostic`] against the sources it points into.
pub struct DiagnosticPrinter<'d, 's> {
    diagnostic: &'d Diagnostic,
    sources: Option<&'s SourceMap>,
    colored: bool,
}

impl<'d, 's> DiagnosticPrinter<'d, 's> {
    pub fn new(diagnostic: &'d Diagnostic) -> Self {
        Self {
            diagnostic,
            sources: None,
            colored: false,
        }
    }

    pub fn sources(mut self, sources: &'s SourceMap) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn colored(mut self, value: bool) -> Self {
        self.colored = value;
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.format(&mut out).expect("String write never fails");
        out
    }

    pub fn format(&self, w: &mut impl Write) -> std::fmt::Result {
        let Some(sources) = self.sources else {
            return self.format_plain(w);
        };

        let renderer = if self.colored {
            Renderer::styled()
        } else {
            Renderer::plain()
        };

        let diag = self.diagnostic;
        let message = diag.message();
        let path = sources.path(diag.source).display().to_string();
        let source = sources.text(diag.source);
        let range = adjust_range(diag.span.byte_range(), source.len());

        let mut snippet = Snippet::source(source)
            .line_start(1)
            .path(&path)
            .annotation(AnnotationKind::Primary.span(range).label(&message));

        // Notes in the same unit attach to the main snippet; notes elsewhere
        // become their own groups below it.
        let mut extra_paths: Vec<String> = Vec::new();
        for note in &diag.notes {
            if let Some((source_id, span)) = note.span
                && source_id == diag.source
            {
                snippet = snippet.annotation(
                    AnnotationKind::Context
                        .span(adjust_range(span.byte_range(), source.len()))
                        .label(&note.message),
                );
            } else if let Some((source_id, _)) = note.span {
                extra_paths.push(sources.path(source_id).display().to_string());
            }
        }

        let mut report: Vec<Group> = vec![Level::ERROR.primary_title(&message).element(snippet)];

        let mut extra_path_iter = extra_paths.iter();
        for note in &diag.notes {
            match note.span {
                Some((source_id, span)) if source_id != diag.source => {
                    let other = sources.text(source_id);
                    let other_path = extra_path_iter.next().expect("collected above");
                    report.push(
                        Level::NOTE.secondary_title(&note.message).element(
                            Snippet::source(other)
                                .line_start(1)
                                .path(other_path)
                                .annotation(
                                    AnnotationKind::Context
                                        .span(adjust_range(span.byte_range(), other.len()))
                                        .label(&note.message),
                                ),
                        ),
                    );
                }
                None => {
                    report.push(Group::with_title(Level::NOTE.secondary_title(&note.message)));
                }
                _ => {}
            }
        }

        write!(w, "{}", renderer.render(&report))
    }

    fn format_plain(&self, w: &mut impl Write) -> std::fmt::Result {
        let diag = self.diagnostic;
        write!(w, "error at {}: {}", diag.span, diag.message())?;
        for note in &diag.notes {
            write!(w, "\n  note: {}", note.message)?;
            if let Some((_, span)) = note.span {
                write!(w, " (at {span})")?;
            }
        }
        Ok(())
    }
}

fn adjust_range(range: std::ops::Range<usize>, limit: usize) -> std::ops::Range<usize> {
    if range.start == range.end {
        return range.start..(range.start + 1).min(limit);
    }
    range
}

impl Diagnostic {
    pub fn printer(&self) -> DiagnosticPrinter<'_, '_> {
        DiagnosticPrinter::new(self)
    }
}
