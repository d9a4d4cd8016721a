//! Type expressions.

use quill_ast::{Node, NodeKind};

use crate::error::SemaResult;
use crate::types::{ConstValue, Primitive, QualifiedType};

use super::Analyzer;

impl Analyzer<'_> {
    /// Resolves a type expression. Failures are reported and yield the
    /// error type so the caller can keep going.
    pub fn resolve_type(&mut self, node: &Node) -> SemaResult<QualifiedType> {
        match &node.kind {
            NodeKind::Ident(_) | NodeKind::Member { .. } | NodeKind::Specialize { .. } => {
                let exprs = self.lookup_name(node)?;
                if exprs.is_empty() {
                    self.error(node.span, format!("Undefined symbol '{node}'"));
                    return Ok(self.error_type());
                }
                if exprs.iter().any(|e| e.is_error()) {
                    return Ok(self.error_type());
                }
                match self.types_from_exprs(&exprs).as_deref() {
                    Some([single]) => Ok(*single),
                    Some(_) => {
                        self.error(node.span, format!("Ambiguous type name '{node}'"));
                        Ok(self.error_type())
                    }
                    None => {
                        self.error(node.span, format!("'{node}' is not a type"));
                        Ok(self.error_type())
                    }
                }
            }
            NodeKind::Tuple(items) => {
                let mut members = Vec::with_capacity(items.len());
                for item in items {
                    members.push(self.resolve_type(item)?);
                }
                let tuple = self.session.graph.types.tuple(members);
                Ok(QualifiedType::plain(tuple))
            }
            NodeKind::Int(v) => Ok(self.unit(ConstValue::Int(*v))),
            NodeKind::Bool(v) => Ok(self.unit(ConstValue::Bool(*v))),
            NodeKind::Str(v) => Ok(self.unit(ConstValue::Str(v.clone()))),
            NodeKind::Call { .. } | NodeKind::Keyword { .. } => {
                self.error(node.span, format!("Expected a type, found '{node}'"));
                Ok(self.error_type())
            }
        }
    }

    fn unit(&mut self, value: ConstValue) -> QualifiedType {
        QualifiedType::plain(self.session.graph.types.unit(value))
    }

    pub(super) fn error_type(&mut self) -> QualifiedType {
        QualifiedType::plain(self.session.graph.types.error())
    }

    /// The builtin type of a constant as it appears in value position.
    pub(super) fn const_type(&mut self, value: &ConstValue) -> QualifiedType {
        let graph = &mut self.session.graph;
        match value {
            ConstValue::Int(v) => QualifiedType::plain(graph.types.unsized_int(*v)),
            ConstValue::Bool(_) => graph.primitive(Primitive::Bool),
            ConstValue::Char(_) => graph.primitive(Primitive::Char),
            ConstValue::Str(_) => QualifiedType::plain(graph.builtins.string),
        }
    }
}
