#![allow(unused_assignments)]

use miette::Diagnostic;
use quill_ast::Span;
use thiserror::Error;

/// A fatal semantic error. Raised after the diagnostic has been recorded,
/// it unwinds the current top-level request.
#[derive(Debug, Error, Diagnostic)]
#[error("semantic error: {message}")]
#[diagnostic(code(quill::sema))]
#[allow(unused_assignments)]
pub struct SemanticError {
    pub message: String,
    #[label]
    pub span: Span,
}

impl SemanticError {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

pub type SemaResult<T> = Result<T, SemanticError>;

/// Internal consistency failure. Never a user error.
macro_rules! ice {
    ($($arg:tt)*) => {
        panic!("internal error: {}", format_args!($($arg)*))
    };
}

pub(crate) use ice;
