pub mod ansi;
pub mod json;
pub mod registry;

use crate::ast::Span;
use crate::compiler::{CompileError, ErrorLocation};
use crate::vm::RuntimeError;

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

/// An error ready for rendering. Everything `lox` reports is an error.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<&'static str>,
    pub message: String,
    /// Source line, for errors that only know a line (runtime errors).
    pub line: Option<usize>,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            code: None,
            message: message.into(),
            line: None,
            labels: Vec::new(),
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label { span, message: label.into() });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ---- From impls for error types ----

impl From<&CompileError> for Diagnostic {
    fn from(e: &CompileError) -> Self {
        let label = match &e.location {
            ErrorLocation::End => "at end of input",
            _ => "here",
        };
        let mut d = Diagnostic::error(&e.message)
            .with_code(e.code)
            .with_line(e.line)
            .with_span(e.span, label);
        if let Some(hint) = suggestion_for(e.code) {
            d = d.with_suggestion(hint);
        }
        d
    }
}

impl From<&RuntimeError> for Diagnostic {
    fn from(e: &RuntimeError) -> Self {
        let mut d = Diagnostic::error(e.kind.to_string())
            .with_code(e.kind.code())
            .with_line(e.line as usize)
            .with_note(format!("[line {}] in script", e.line));
        if e.kind.is_internal() {
            d = d.with_note("the bytecode is malformed; this is a bug in whatever produced the chunk");
        }
        d
    }
}

fn suggestion_for(code: &str) -> Option<&'static str> {
    match code {
        "LOX-P002" | "LOX-P003" | "LOX-P005" => Some("add a ';' to end the statement"),
        "LOX-P006" => Some("close the group with ')'"),
        "LOX-P007" => Some("close the block with '}'"),
        "LOX-C003" => Some("pick another name, or assign to the existing variable"),
        _ => None,
    }
}
