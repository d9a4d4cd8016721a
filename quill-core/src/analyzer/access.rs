use std::rc::Rc;

use quill_ast::Span;

use crate::defn::{DefnId, DefnKind, StorageClass, Visibility};
use crate::types::QualifiedType;

use super::Analyzer;

impl Analyzer<'_> {
    /// Visibility of `target` from code inside `from`. Non-public members are
    /// visible inside their declaring definition, and protected ones also
    /// inside subclasses of it.
    pub fn can_access(&self, from: Option<DefnId>, target: DefnId) -> bool {
        let defns = &self.session.graph.defns;
        let t = defns.get(target);
        if matches!(t.kind, DefnKind::Parameter(_))
            || matches!(t.storage, StorageClass::Local | StorageClass::Param)
            || t.visibility == Visibility::Public
        {
            return true;
        }
        let Some(owner) = t.parent else {
            return true;
        };
        let Some(from) = from else {
            return false;
        };
        if defns.ancestors(from).any(|d| self.same_origin(d, owner)) {
            return true;
        }
        if t.visibility != Visibility::Protected {
            return false;
        }
        let Some(owner_ty) = defns.get(owner).type_value() else {
            return false;
        };
        let rel = self.session.graph.relation();
        defns.ancestors(from).any(|d| {
            defns.get(d).type_value().is_some_and(|ty| {
                self.session.graph.composite_class(ty).is_some()
                    && rel.is_subclass(QualifiedType::plain(ty), QualifiedType::plain(owner_ty))
            })
        })
    }

    /// Same definition, or clones of one declaration.
    fn same_origin(&self, a: DefnId, b: DefnId) -> bool {
        if a == b {
            return true;
        }
        let defns = &self.session.graph.defns;
        match (&defns.get(a).ast, &defns.get(b).ast) {
            (Some(x), Some(y)) => Rc::ptr_eq(x, y),
            _ => false,
        }
    }

    /// Reports an access violation against the current subject.
    pub fn check_access(&mut self, span: Span, target: DefnId) -> bool {
        if self.can_access(self.subject, target) {
            return true;
        }
        let t = self.session.graph.defns.get(target);
        let (name, declared_at) = (t.name.clone(), t.span);
        self.error(
            span,
            format!("Symbol '{name}' is not accessible from this context"),
        );
        self.info(declared_at, format!("'{name}' is declared here"));
        false
    }
}
