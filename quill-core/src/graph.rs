use crate::builtins::Builtins;
use crate::config::SemaConfig;
use crate::defn::{DefnId, DefnKind, DefnTable, Traits};
use crate::infer::{ConstraintKind, VisitGuard};
use crate::relation::TypeRelation;
use crate::scope::{ScopeId, ScopeKind, ScopeTable};
use crate::template::TemplateTable;
use crate::types::{
    CompositeClass, ConstValue, Primitive, QualifiedType, TypeId, TypeKind, TypeStore,
};

/// Every table of the semantic model. Read-only algorithms borrow this;
/// anything that creates nodes goes through `Session`.
#[derive(Debug)]
pub struct SemaGraph {
    pub types: TypeStore,
    pub defns: DefnTable,
    pub scopes: ScopeTable,
    pub templates: TemplateTable,
    pub builtins: Builtins,
}

impl SemaGraph {
    pub fn new(config: &SemaConfig) -> Self {
        let mut types = TypeStore::new();
        let mut defns = DefnTable::new();
        let mut scopes = ScopeTable::new();
        let mut templates = TemplateTable::new();
        let builtins = Builtins::install(
            &mut types,
            &mut defns,
            &mut scopes,
            &mut templates,
            &config.root_object,
        );
        Self {
            types,
            defns,
            scopes,
            templates,
            builtins,
        }
    }

    pub fn relation(&self) -> TypeRelation<'_> {
        TypeRelation::new(self)
    }

    pub fn primitive(&self, p: Primitive) -> QualifiedType {
        QualifiedType::plain(self.builtins.primitive(p))
    }

    /// The declaration that introduced a named type.
    pub fn type_defn_of(&self, ty: TypeId) -> Option<DefnId> {
        match self.types.kind(ty) {
            TypeKind::Composite { defn, .. } | TypeKind::Enum { defn, .. } => Some(*defn),
            TypeKind::Primitive(p) => self.builtins.primitive_defn(*p),
            TypeKind::Alias { target, .. } => self.type_defn_of(target.ty),
            _ => None,
        }
    }

    pub fn composite_class(&self, ty: TypeId) -> Option<CompositeClass> {
        match self.types.kind(self.types.deref(ty.into()).ty) {
            TypeKind::Composite { class, .. } => Some(*class),
            _ => None,
        }
    }

    pub fn member_scope_of(&self, ty: TypeId) -> Option<ScopeId> {
        self.type_defn_of(ty)
            .and_then(|d| self.defns.get(d).member_scope())
    }

    /// Declared base types of a composite, aliases stripped.
    pub fn bases_of(&self, ty: TypeId) -> Vec<QualifiedType> {
        match self.types.kind(ty) {
            TypeKind::Composite { defn, .. } => self
                .defns
                .get(*defn)
                .type_defn()
                .map(|td| td.bases.iter().map(|b| self.types.dealias(*b)).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// `ty` and all of its ancestor classes, nearest first, without repeats.
    pub fn ancestors_of(&self, ty: TypeId) -> Vec<TypeId> {
        let mut out = vec![ty];
        let mut i = 0;
        while i < out.len() {
            for base in self.bases_of(out[i]) {
                if !out.contains(&base.ty) {
                    out.push(base.ty);
                }
            }
            i += 1;
        }
        out
    }

    /// Scope-provider lookup. With `inherit`, a member table of a composite
    /// falls back to the member tables of its base classes.
    pub fn lookup_member(&self, scope: ScopeId, name: &str, inherit: bool) -> Vec<DefnId> {
        let local = self.scopes.lookup_local(scope, name);
        if !local.is_empty() || !inherit {
            return local.to_vec();
        }
        if let ScopeKind::Members(owner) = self.scopes.kind(scope) {
            if let Some(ty) = self.defns.get(owner).type_value() {
                for base in self.bases_of(ty) {
                    if let Some(base_scope) = self.member_scope_of(base.ty) {
                        let found = self.lookup_member(base_scope, name, true);
                        if !found.is_empty() {
                            return found;
                        }
                    }
                }
            }
        }
        Vec::new()
    }

    /// True when the type has no unresolved variables or placeholders.
    pub fn is_singular(&self, ty: TypeId) -> bool {
        match self.types.kind(ty) {
            TypeKind::Error | TypeKind::Primitive(_) | TypeKind::Unit(_) => true,
            TypeKind::QualifierFn(_) => true,
            TypeKind::Composite { defn, .. } | TypeKind::Enum { defn, .. } => {
                self.defns.get(*defn).singular
            }
            TypeKind::Function(ft) => {
                ft.params.iter().all(|p| self.is_singular(p.ty.ty))
                    && self.is_singular(ft.ret.ty)
                    && ft.self_param.is_none_or(|s| self.is_singular(s.ty))
            }
            TypeKind::Tuple(members) | TypeKind::Union(members) => {
                members.iter().all(|m| self.is_singular(m.ty))
            }
            TypeKind::Address(elem)
            | TypeKind::Pointer(elem)
            | TypeKind::NativeArray { elem, .. }
            | TypeKind::FlexibleArray(elem)
            | TypeKind::TypeLiteral(elem) => self.is_singular(elem.ty),
            TypeKind::Alias { target, .. } => self.is_singular(target.ty),
            TypeKind::TypeVar(_) | TypeKind::PatternValue { .. } => false,
            TypeKind::Assignment(ta) => ta.value().is_some_and(|v| self.is_singular(v.ty)),
            TypeKind::Ambiguous(_) | TypeKind::TypeFunction(_) => false,
            TypeKind::TypeFnCall(call) => call.reduced.is_some_and(|r| self.is_singular(r.ty)),
        }
    }

    /// True for throwaway types produced during speculative analysis.
    pub fn is_scaffold(&self, ty: TypeId) -> bool {
        match self.types.kind(ty) {
            TypeKind::PatternValue { .. } => true,
            TypeKind::Composite { defn, .. } => self.defns.get(*defn).has_trait(Traits::SCAFFOLD),
            TypeKind::Tuple(members) | TypeKind::Union(members) => {
                members.iter().any(|m| self.is_scaffold(m.ty))
            }
            TypeKind::Address(elem)
            | TypeKind::Pointer(elem)
            | TypeKind::NativeArray { elem, .. }
            | TypeKind::FlexibleArray(elem)
            | TypeKind::TypeLiteral(elem) => self.is_scaffold(elem.ty),
            TypeKind::Alias { target, .. } => self.is_scaffold(target.ty),
            TypeKind::Assignment(ta) => ta.value().is_some_and(|v| self.is_scaffold(v.ty)),
            _ => false,
        }
    }

    pub fn is_reference_type(&self, ty: TypeId) -> bool {
        self.composite_class(ty).is_some_and(CompositeClass::is_reference)
    }

    /// The set of concrete possibilities a placeholder stands for. Other types
    /// expand to themselves.
    pub fn expand(&self, qt: QualifiedType, out: &mut Vec<QualifiedType>) {
        match self.types.kind(qt.ty) {
            TypeKind::Alias { target, .. } => self.expand(target.qualified(qt.quals), out),
            TypeKind::Ambiguous(amb) => {
                for choice in &amb.choices {
                    if self.check_provisions(&choice.provisions) {
                        self.expand(choice.ty, out);
                    }
                }
            }
            TypeKind::Assignment(ta) => {
                if let Some(value) = ta.value() {
                    self.expand(value, out);
                    return;
                }
                for c in &ta.constraints {
                    if c.is_visited() || !self.check_provisions(&c.provisions) {
                        continue;
                    }
                    let _guard = VisitGuard::enter(c);
                    self.expand(c.value, out);
                }
            }
            _ => {
                if !out.contains(&qt) {
                    out.push(qt);
                }
            }
        }
    }

    /// Whether a unit value or type may bind to a template variable.
    pub fn can_bind_to(&self, var: TypeId, value: QualifiedType) -> bool {
        let tv = self.types.type_var_data(var);
        let value = self.types.dealias(value);
        match self.types.kind(value.ty) {
            TypeKind::Unit(constant) => match tv.value_type {
                Some(vt) => self.const_converts_to(constant, vt.ty),
                None => false,
            },
            _ => tv.value_type.is_none(),
        }
    }

    fn const_converts_to(&self, value: &ConstValue, ty: TypeId) -> bool {
        let ty = self.types.dealias(ty.into()).ty;
        match (value, self.types.kind(ty)) {
            (ConstValue::Int(v), TypeKind::Primitive(p)) => p.fits(*v) || p.is_float(),
            (ConstValue::Bool(_), TypeKind::Primitive(Primitive::Bool)) => true,
            (ConstValue::Char(_), TypeKind::Primitive(Primitive::Char)) => true,
            (ConstValue::Str(_), _) => ty == self.builtins.string,
            _ => false,
        }
    }

    pub fn display(&self, qt: QualifiedType) -> String {
        let base = self.display_type(qt.ty);
        if qt.quals.is_empty() {
            base
        } else {
            format!("{} {}", qt.quals, base)
        }
    }

    pub fn display_type(&self, ty: TypeId) -> String {
        match self.types.kind(ty) {
            TypeKind::Error => "<error>".to_string(),
            TypeKind::Primitive(p) => p.name(),
            TypeKind::Composite { defn, .. } | TypeKind::Enum { defn, .. } => {
                self.display_defn(*defn)
            }
            TypeKind::Function(ft) => {
                let params: Vec<String> = ft
                    .params
                    .iter()
                    .map(|p| {
                        let dots = if p.variadic { "..." } else { "" };
                        format!("{}: {}{}", p.name, self.display(p.ty), dots)
                    })
                    .collect();
                format!("fn ({}) -> {}", params.join(", "), self.display(ft.ret))
            }
            TypeKind::Tuple(members) => format!("({})", self.display_list(members)),
            TypeKind::Union(members) => {
                let names: Vec<String> = members.iter().map(|m| self.display(*m)).collect();
                names.join(" or ")
            }
            TypeKind::Address(elem) => format!("Address[{}]", self.display(*elem)),
            TypeKind::Pointer(elem) => format!("Pointer[{}]", self.display(*elem)),
            TypeKind::NativeArray { elem, size } => {
                format!("NativeArray[{}, {}]", self.display(*elem), size)
            }
            TypeKind::FlexibleArray(elem) => format!("FlexibleArray[{}]", self.display(*elem)),
            TypeKind::TypeLiteral(elem) => format!("TypeLiteral[{}]", self.display(*elem)),
            TypeKind::Unit(value) => value.to_string(),
            TypeKind::Alias { name, .. } => name.clone(),
            TypeKind::TypeVar(var) => format!("%{}", var.name),
            TypeKind::PatternValue { var, serial } => {
                format!("%{}.{}", self.types.type_var_data(*var).name, serial)
            }
            TypeKind::Assignment(ta) => {
                let var = &self.types.type_var_data(ta.target).name;
                match ta.value() {
                    Some(value) => format!("%{}.{}={}", var, ta.sequence, self.display(value)),
                    None => format!("%{}.{}{}", var, ta.sequence, self.display_constraints(ty)),
                }
            }
            TypeKind::Ambiguous(amb) => {
                let names: Vec<String> = amb.choices.iter().map(|c| self.display(c.ty)).collect();
                format!("{{{}}}", names.join("|"))
            }
            TypeKind::TypeFunction(func) => func.name.clone(),
            TypeKind::TypeFnCall(call) => format!(
                "{}{}",
                self.display(call.func),
                self.display_type(call.args)
            ),
            TypeKind::QualifierFn(q) => format!("qualify[{q}]"),
        }
    }

    fn display_list(&self, members: &[QualifiedType]) -> String {
        let names: Vec<String> = members.iter().map(|m| self.display(*m)).collect();
        names.join(", ")
    }

    /// Renders the live constraints of an unsolved assignment, skipping any
    /// constraint already being printed further up.
    pub fn display_constraints(&self, assignment: TypeId) -> String {
        let ta = self.types.assignment_data(assignment);
        let mut parts = Vec::new();
        for c in &ta.constraints {
            if c.is_visited() || !self.check_provisions(&c.provisions) {
                continue;
            }
            let _guard = VisitGuard::enter(c);
            let op = match c.kind {
                ConstraintKind::Exact => "==",
                ConstraintKind::UpperBound => "<:",
                ConstraintKind::LowerBound => ">:",
            };
            parts.push(format!("{} {}", op, self.display(c.value)));
        }
        format!("{{{}}}", parts.join(", "))
    }

    pub fn display_defn(&self, id: DefnId) -> String {
        let defn = self.defns.get(id);
        match defn.instance {
            Some(inst) => {
                let args = self.types.tuple_members(self.templates.instance(inst).type_args);
                format!("{}[{}]", defn.qualified_name, self.display_list(args))
            }
            None => defn.qualified_name.clone(),
        }
    }

    /// Describes a callable for candidate listings: `name(params) -> ret`.
    pub fn display_signature(&self, id: DefnId) -> String {
        let defn = self.defns.get(id);
        match &defn.kind {
            DefnKind::Function(f) => match f.fn_type {
                Some(ft) => {
                    let ft = self.types.function_type(ft);
                    let params: Vec<String> =
                        ft.params.iter().map(|p| self.display(p.ty)).collect();
                    format!(
                        "{}({}) -> {}",
                        self.display_defn(id),
                        params.join(", "),
                        self.display(ft.ret)
                    )
                }
                None => format!("{}(?)", self.display_defn(id)),
            },
            _ => self.display_defn(id),
        }
    }
}
