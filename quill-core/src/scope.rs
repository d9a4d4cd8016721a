//! Symbol tables and the explicit scope stack searched by name resolution.

use std::collections::HashMap;

use crate::defn::DefnId;
use crate::error::ice;
use crate::template::InstanceId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Builtins,
    Module(DefnId),
    Namespace(DefnId),
    /// Member table of a type; searching with `inherit` walks base classes.
    Members(DefnId),
    /// Pattern variables of a generic declaration.
    TemplateParams(DefnId),
    /// Bound arguments of one instantiation.
    TemplateInstance(InstanceId),
    Local,
}

#[derive(Clone, Debug)]
pub struct ScopeData {
    pub kind: ScopeKind,
    pub name: String,
    parent: Option<ScopeId>,
    entries: HashMap<String, Vec<DefnId>>,
    order: Vec<DefnId>,
}

#[derive(Debug, Default)]
pub struct ScopeTable {
    scopes: Vec<ScopeData>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_scope(
        &mut self,
        kind: ScopeKind,
        name: impl Into<String>,
        parent: Option<ScopeId>,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            kind,
            name: name.into(),
            parent,
            entries: HashMap::new(),
            order: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &ScopeData {
        match self.scopes.get(id.0 as usize) {
            Some(scope) => scope,
            None => ice!("dangling scope id {}", id.0),
        }
    }

    fn get_mut(&mut self, id: ScopeId) -> &mut ScopeData {
        match self.scopes.get_mut(id.0 as usize) {
            Some(scope) => scope,
            None => ice!("dangling scope id {}", id.0),
        }
    }

    pub fn kind(&self, id: ScopeId) -> ScopeKind {
        self.get(id).kind
    }

    pub fn parent_scope(&self, id: ScopeId) -> Option<ScopeId> {
        self.get(id).parent
    }

    pub fn add_member(&mut self, id: ScopeId, name: &str, defn: DefnId) {
        let scope = self.get_mut(id);
        scope.entries.entry(name.to_string()).or_default().push(defn);
        scope.order.push(defn);
    }

    /// Members declared directly in this scope under `name`, in declaration order.
    pub fn lookup_local(&self, id: ScopeId, name: &str) -> &[DefnId] {
        self.get(id)
            .entries
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn members(&self, id: ScopeId) -> &[DefnId] {
        &self.get(id).order
    }

    /// `id` followed by each enclosing scope.
    pub fn chain(&self, id: ScopeId) -> Vec<ScopeId> {
        std::iter::successors(Some(id), |s| self.parent_scope(*s)).collect()
    }
}

/// Innermost-first list of scopes consulted for unqualified names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScopeStack {
    scopes: Vec<ScopeId>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// The chain of `innermost` and all of its parents.
    pub fn from_chain(table: &ScopeTable, innermost: ScopeId) -> Self {
        Self {
            scopes: table.chain(innermost),
        }
    }

    /// Makes `scope` the innermost scope.
    pub fn push(&mut self, scope: ScopeId) {
        self.scopes.insert(0, scope);
    }

    pub fn pop(&mut self) -> Option<ScopeId> {
        if self.scopes.is_empty() {
            None
        } else {
            Some(self.scopes.remove(0))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ScopeId> + '_ {
        self.scopes.iter().copied()
    }

    pub fn innermost(&self) -> Option<ScopeId> {
        self.scopes.first().copied()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
