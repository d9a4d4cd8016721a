//! Diagnostics sink consumed by the analyzer. Formatting is left to the host.

use quill_ast::Span;

use crate::error::SemanticError;

/// Diagnostic severity level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Resolution of the offending expression is abandoned
    Error,
    /// Unwinds the current top-level request
    Fatal,
    /// Supporting detail attached to the preceding error
    Info,
}

impl Severity {
    pub fn display(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Info => "info",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error | Severity::Fatal)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiagnosticRecord {
    pub severity: Severity,
    pub span: Span,
    pub message: String,
}

impl DiagnosticRecord {
    pub fn display(&self) -> String {
        format!(
            "{} at {}: {}",
            self.severity.display(),
            self.span.offset(),
            self.message
        )
    }
}

pub trait DiagnosticSink {
    fn error(&mut self, span: Span, message: String);

    /// Records a fatal diagnostic and returns the error that unwinds the request.
    fn fatal(&mut self, span: Span, message: String) -> SemanticError;

    fn info(&mut self, span: Span, message: String);
}

/// In-memory sink keeping every record in emission order.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    records: Vec<DiagnosticRecord>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[DiagnosticRecord] {
        &self.records
    }

    pub fn error_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.severity.is_error())
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn messages(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.message.as_str()).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.records.iter().any(|r| r.message.contains(needle))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records a fatal error raised without a sink at hand, passing it on.
    pub fn record_fatal(&mut self, err: SemanticError) -> SemanticError {
        self.push(Severity::Fatal, err.span, err.message.clone());
        err
    }

    fn push(&mut self, severity: Severity, span: Span, message: String) {
        tracing::debug!(target: "quill::diag", severity = severity.display(), offset = span.offset(), "{message}");
        self.records.push(DiagnosticRecord {
            severity,
            span,
            message,
        });
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn error(&mut self, span: Span, message: String) {
        self.push(Severity::Error, span, message);
    }

    fn fatal(&mut self, span: Span, message: String) -> SemanticError {
        self.push(Severity::Fatal, span, message.clone());
        SemanticError::new(span, message)
    }

    fn info(&mut self, span: Span, message: String) {
        self.push(Severity::Info, span, message);
    }
}
