//! Reduction of value expressions.

use quill_ast::{Node, NodeKind};

use crate::error::SemaResult;
use crate::expr::Expr;
use crate::types::ConstValue;

use super::Analyzer;

impl Analyzer<'_> {
    pub fn reduce_expr(&mut self, node: &Node) -> SemaResult<Expr> {
        let span = node.span;
        let constant = match &node.kind {
            NodeKind::Int(v) => Some(ConstValue::Int(*v)),
            NodeKind::Bool(v) => Some(ConstValue::Bool(*v)),
            NodeKind::Str(v) => Some(ConstValue::Str(v.clone())),
            _ => None,
        };
        if let Some(value) = constant {
            let ty = self.const_type(&value);
            return Ok(Expr::Const { span, value, ty });
        }

        match &node.kind {
            NodeKind::Ident(_) | NodeKind::Member { .. } | NodeKind::Specialize { .. } => {
                let mut exprs = self.lookup_name(node)?;
                match exprs.len() {
                    0 => {
                        self.error(span, format!("Undefined symbol '{node}'"));
                        Ok(Expr::Error(span))
                    }
                    1 => Ok(exprs.remove(0)),
                    _ => {
                        self.error(span, format!("Ambiguous reference to '{node}'"));
                        Ok(Expr::Error(span))
                    }
                }
            }
            NodeKind::Call { callee, args } => {
                if callee.is_name() {
                    self.call_name(span, callee, args)
                } else {
                    let callee = self.reduce_expr(callee)?;
                    self.call_expr(span, callee, args)
                }
            }
            NodeKind::Keyword { name, .. } => {
                self.error(
                    span,
                    format!("Keyword argument '{}' is only allowed in a call", name.node),
                );
                Ok(Expr::Error(span))
            }
            NodeKind::Tuple(_) => {
                self.error(span, format!("Expected a value, found '{node}'"));
                Ok(Expr::Error(span))
            }
            NodeKind::Int(_) | NodeKind::Bool(_) | NodeKind::Str(_) => Ok(Expr::Error(span)),
        }
    }
}
