//! Resolved expressions produced by name lookup and call analysis.

use quill_ast::Span;

use crate::defn::DefnId;
use crate::types::{ConstValue, QualifiedType};

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Left behind once a diagnostic has been reported.
    Error(Span),
    Const {
        span: Span,
        value: ConstValue,
        ty: QualifiedType,
    },
    /// Reference to a variable, parameter or function, optionally through
    /// a receiver.
    LValue {
        span: Span,
        defn: DefnId,
        base: Option<Box<Expr>>,
        ty: Option<QualifiedType>,
    },
    /// A type used in value position.
    TypeLiteral { span: Span, ty: QualifiedType },
    /// A module or namespace name.
    ScopeName { span: Span, defn: DefnId },
    Call {
        span: Span,
        method: DefnId,
        receiver: Option<Box<Expr>>,
        args: Vec<Expr>,
        ty: QualifiedType,
    },
    /// Call through a value of function type.
    CallValue {
        span: Span,
        callee: Box<Expr>,
        args: Vec<Expr>,
        ty: QualifiedType,
    },
    Construct {
        span: Span,
        ty: QualifiedType,
        ctor: DefnId,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Error(span)
            | Expr::Const { span, .. }
            | Expr::LValue { span, .. }
            | Expr::TypeLiteral { span, .. }
            | Expr::ScopeName { span, .. }
            | Expr::Call { span, .. }
            | Expr::CallValue { span, .. }
            | Expr::Construct { span, .. } => *span,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Expr::Error(_))
    }

    /// The value type, when the expression has one.
    pub fn ty(&self) -> Option<QualifiedType> {
        match self {
            Expr::Error(_) | Expr::ScopeName { .. } | Expr::TypeLiteral { .. } => None,
            Expr::Const { ty, .. }
            | Expr::Call { ty, .. }
            | Expr::CallValue { ty, .. }
            | Expr::Construct { ty, .. } => Some(*ty),
            Expr::LValue { ty, .. } => *ty,
        }
    }

    /// The definition this expression names, if it is a plain reference.
    pub fn defn(&self) -> Option<DefnId> {
        match self {
            Expr::LValue { defn, .. } | Expr::ScopeName { defn, .. } => Some(*defn),
            _ => None,
        }
    }
}
