//! Declarations and their per-definition analysis state.

use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

use quill_ast::{Decl, Span};

use crate::error::ice;
use crate::scope::ScopeId;
use crate::template::{InstanceId, TemplateId};
use crate::types::{ConstValue, QualifiedType, TypeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefnId(pub(crate) u32);

impl DefnId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub use quill_ast::Visibility;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageClass {
    Global,
    Static,
    Instance,
    Local,
    Param,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Traits(u16);

impl Traits {
    pub const NONE: Traits = Traits(0);
    pub const FINAL: Traits = Traits(1);
    pub const ABSTRACT: Traits = Traits(1 << 1);
    pub const READONLY: Traits = Traits(1 << 2);
    pub const EXTERN: Traits = Traits(1 << 3);
    pub const CTOR: Traits = Traits(1 << 4);
    pub const SYNTHETIC: Traits = Traits(1 << 5);
    /// Instantiated before all arguments were known.
    pub const PARTIAL: Traits = Traits(1 << 6);
    /// Throwaway instantiation, never cached.
    pub const SCAFFOLD: Traits = Traits(1 << 7);
    /// Traits an instantiation inherits from its template.
    pub const INSTANCE_WHITELIST: Traits =
        Traits(Self::FINAL.0 | Self::ABSTRACT.0 | Self::READONLY.0 | Self::EXTERN.0 | Self::CTOR.0);

    pub const fn contains(self, other: Traits) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersection(self, other: Traits) -> Traits {
        Traits(self.0 & other.0)
    }

    pub fn insert(&mut self, other: Traits) {
        self.0 |= other.0;
    }
}

impl BitOr for Traits {
    type Output = Traits;

    fn bitor(self, rhs: Traits) -> Traits {
        Traits(self.0 | rhs.0)
    }
}

/// Named analysis passes. Each runs at most once per definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pass {
    ResolveTemplateParams,
    ResolveBaseTypes,
    CreateMembers,
    ResolveSignature,
    ResolveVarType,
    ResolveAlias,
    PrepareCodeGen,
}

impl Pass {
    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Pass::ResolveTemplateParams => "resolve-template-params",
            Pass::ResolveBaseTypes => "resolve-base-types",
            Pass::CreateMembers => "create-members",
            Pass::ResolveSignature => "resolve-signature",
            Pass::ResolveVarType => "resolve-var-type",
            Pass::ResolveAlias => "resolve-alias",
            Pass::PrepareCodeGen => "prepare-codegen",
        };
        f.write_str(text)
    }
}

/// `NotStarted -> Running -> Finished`, tracked per pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassState {
    running: u16,
    finished: u16,
}

impl PassState {
    /// Marks `pass` running. False when it already finished or is running
    /// further up the stack, in which case the caller must not re-enter it.
    pub fn begin(&mut self, pass: Pass) -> bool {
        let bit = pass.bit();
        if (self.finished | self.running) & bit != 0 {
            return false;
        }
        self.running |= bit;
        true
    }

    pub fn finish(&mut self, pass: Pass) {
        let bit = pass.bit();
        self.running &= !bit;
        self.finished |= bit;
    }

    pub fn is_running(&self, pass: Pass) -> bool {
        self.running & pass.bit() != 0
    }

    pub fn is_finished(&self, pass: Pass) -> bool {
        self.finished & pass.bit() != 0
    }
}

/// Structural type operators provided by the builtins module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeOperator {
    Address,
    Pointer,
    NativeArray,
    FlexibleArray,
    TypeLiteral,
}

#[derive(Clone, Debug, Default)]
pub struct TypeDefn {
    pub ty: Option<TypeId>,
    pub bases: Vec<QualifiedType>,
    pub members: Option<ScopeId>,
    pub operator: Option<TypeOperator>,
}

#[derive(Clone, Debug, Default)]
pub struct FunctionDefn {
    pub fn_type: Option<TypeId>,
    pub params: Vec<DefnId>,
    pub is_ctor: bool,
}

#[derive(Clone, Debug, Default)]
pub struct VariableDefn {
    pub ty: Option<QualifiedType>,
    pub value: Option<ConstValue>,
    pub is_let: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ParameterDefn {
    pub ty: Option<QualifiedType>,
    pub variadic: bool,
}

#[derive(Clone, Debug)]
pub enum DefnKind {
    Type(TypeDefn),
    Function(FunctionDefn),
    Variable(VariableDefn),
    Parameter(ParameterDefn),
    Namespace { scope: ScopeId },
    Module { scope: ScopeId },
    ExplicitImport(Vec<DefnId>),
}

impl DefnKind {
    pub fn name(&self) -> &'static str {
        match self {
            DefnKind::Type(_) => "type",
            DefnKind::Function(_) => "function",
            DefnKind::Variable(_) => "variable",
            DefnKind::Parameter(_) => "parameter",
            DefnKind::Namespace { .. } => "namespace",
            DefnKind::Module { .. } => "module",
            DefnKind::ExplicitImport(_) => "import",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Defn {
    pub name: String,
    pub qualified_name: String,
    pub span: Span,
    pub kind: DefnKind,
    pub visibility: Visibility,
    pub storage: StorageClass,
    pub traits: Traits,
    pub passes: PassState,
    pub parent: Option<DefnId>,
    pub defining_scope: Option<ScopeId>,
    pub module: Option<DefnId>,
    /// Shared with every clone made by instantiation.
    pub ast: Option<Rc<Decl>>,
    /// Signature, when this declaration is generic.
    pub template: Option<TemplateId>,
    /// Set on clones produced by instantiation.
    pub instance: Option<InstanceId>,
    pub singular: bool,
}

impl Defn {
    pub fn new(name: impl Into<String>, span: Span, kind: DefnKind) -> Self {
        let name = name.into();
        Self {
            qualified_name: name.clone(),
            name,
            span,
            kind,
            visibility: Visibility::Public,
            storage: StorageClass::Global,
            traits: Traits::NONE,
            passes: PassState::default(),
            parent: None,
            defining_scope: None,
            module: None,
            ast: None,
            template: None,
            instance: None,
            singular: true,
        }
    }

    /// Generic and not yet bound to arguments.
    pub fn is_template(&self) -> bool {
        self.template.is_some() && self.instance.is_none()
    }

    pub fn is_template_instance(&self) -> bool {
        self.instance.is_some()
    }

    pub fn has_trait(&self, t: Traits) -> bool {
        self.traits.contains(t)
    }

    pub fn is_static(&self) -> bool {
        !matches!(self.storage, StorageClass::Instance)
    }

    pub fn type_defn(&self) -> Option<&TypeDefn> {
        match &self.kind {
            DefnKind::Type(td) => Some(td),
            _ => None,
        }
    }

    pub fn type_defn_mut(&mut self) -> Option<&mut TypeDefn> {
        match &mut self.kind {
            DefnKind::Type(td) => Some(td),
            _ => None,
        }
    }

    pub fn type_value(&self) -> Option<TypeId> {
        self.type_defn().and_then(|td| td.ty)
    }

    pub fn function_defn(&self) -> Option<&FunctionDefn> {
        match &self.kind {
            DefnKind::Function(fd) => Some(fd),
            _ => None,
        }
    }

    pub fn function_type(&self) -> Option<TypeId> {
        self.function_defn().and_then(|fd| fd.fn_type)
    }

    /// Scope holding this definition's members, for types, namespaces and modules.
    pub fn member_scope(&self) -> Option<ScopeId> {
        match &self.kind {
            DefnKind::Type(td) => td.members,
            DefnKind::Namespace { scope } | DefnKind::Module { scope } => Some(*scope),
            _ => None,
        }
    }

    /// The declared or inferred type of a value definition.
    pub fn value_type(&self) -> Option<QualifiedType> {
        match &self.kind {
            DefnKind::Variable(v) => v.ty,
            DefnKind::Parameter(p) => p.ty,
            DefnKind::Function(f) => f.fn_type.map(QualifiedType::plain),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct DefnTable {
    defns: Vec<Defn>,
}

impl DefnTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, defn: Defn) -> DefnId {
        let id = DefnId(self.defns.len() as u32);
        self.defns.push(defn);
        id
    }

    pub fn get(&self, id: DefnId) -> &Defn {
        match self.defns.get(id.index()) {
            Some(defn) => defn,
            None => ice!("dangling definition id {}", id.0),
        }
    }

    pub fn get_mut(&mut self, id: DefnId) -> &mut Defn {
        match self.defns.get_mut(id.index()) {
            Some(defn) => defn,
            None => ice!("dangling definition id {}", id.0),
        }
    }

    pub fn len(&self) -> usize {
        self.defns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defns.is_empty()
    }

    /// Walks `parent` links starting at `id` itself.
    pub fn ancestors(&self, id: DefnId) -> impl Iterator<Item = DefnId> + '_ {
        std::iter::successors(Some(id), move |d| self.get(*d).parent)
    }

    /// Whether `id` or one of its parents is an uninstantiated generic.
    pub fn is_within_template(&self, id: DefnId) -> bool {
        self.ancestors(id).any(|d| self.get(d).is_template())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_cannot_be_reentered_while_running() {
        let mut passes = PassState::default();
        assert!(passes.begin(Pass::CreateMembers));
        assert!(passes.is_running(Pass::CreateMembers));
        assert!(!passes.begin(Pass::CreateMembers));
        passes.finish(Pass::CreateMembers);
        assert!(passes.is_finished(Pass::CreateMembers));
        assert!(!passes.begin(Pass::CreateMembers));
        assert!(passes.begin(Pass::ResolveSignature));
    }

    #[test]
    fn whitelist_excludes_bookkeeping_traits() {
        let traits = Traits::FINAL | Traits::SYNTHETIC | Traits::PARTIAL;
        let copied = traits.intersection(Traits::INSTANCE_WHITELIST);
        assert!(copied.contains(Traits::FINAL));
        assert!(!copied.contains(Traits::SYNTHETIC));
        assert!(!copied.contains(Traits::PARTIAL));
    }
}
