//! Structural rewriting of type graphs.
//!
//! A transform overrides [`TypeTransform::rewrite`] for the nodes it cares
//! about and lets [`walk_type`] rebuild everything else. Structural nodes are
//! rebuilt only when a child changed, so interned identities survive an
//! identity pass.

use std::collections::HashMap;

use quill_ast::Span;

use crate::defn::{DefnId, Traits};
use crate::error::{SemaResult, SemanticError};
use crate::session::Session;
use crate::template::Expect;
use crate::types::{
    AmbiguousChoice, AmbiguousKind, FunctionType, QualifiedType, Qualifiers, TypeFunctionCall,
    TypeId, TypeKind,
};

/// Bindings from type variables (or pattern values) to types.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindingEnv {
    bindings: HashMap<TypeId, QualifiedType>,
}

impl BindingEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, var: TypeId, value: QualifiedType) {
        self.bindings.insert(var, value);
    }

    pub fn with(mut self, var: TypeId, value: QualifiedType) -> Self {
        self.bind(var, value);
        self
    }

    pub fn get(&self, var: TypeId) -> Option<QualifiedType> {
        self.bindings.get(&var).copied()
    }

    pub fn binds_any(&self, vars: &[TypeId]) -> bool {
        vars.iter().any(|v| self.bindings.contains_key(v))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl FromIterator<(TypeId, QualifiedType)> for BindingEnv {
    fn from_iter<I: IntoIterator<Item = (TypeId, QualifiedType)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

pub trait TypeTransform {
    /// Returning `Some` replaces the node without walking into it.
    fn rewrite(
        &mut self,
        session: &mut Session,
        qt: QualifiedType,
    ) -> SemaResult<Option<QualifiedType>>;

    fn transform(&mut self, session: &mut Session, qt: QualifiedType) -> SemaResult<QualifiedType>
    where
        Self: Sized,
    {
        walk_type(self, session, qt)
    }
}

/// Owned copy of the parts of a node a walk needs, taken before the store is
/// mutated.
enum Shape {
    Leaf,
    Tuple(Vec<QualifiedType>),
    Union(Vec<QualifiedType>),
    Address(QualifiedType),
    Pointer(QualifiedType),
    NativeArray(QualifiedType, u64),
    FlexibleArray(QualifiedType),
    TypeLiteral(QualifiedType),
    Function(FunctionType),
    Follow(QualifiedType),
    Ambiguous(AmbiguousKind, Vec<AmbiguousChoice>),
    FnCall(QualifiedType, TypeId),
}

fn shape_of(session: &Session, ty: TypeId) -> Shape {
    match session.graph.types.kind(ty) {
        TypeKind::Tuple(members) => Shape::Tuple(members.clone()),
        TypeKind::Union(members) => Shape::Union(members.clone()),
        TypeKind::Address(elem) => Shape::Address(*elem),
        TypeKind::Pointer(elem) => Shape::Pointer(*elem),
        TypeKind::NativeArray { elem, size } => Shape::NativeArray(*elem, *size),
        TypeKind::FlexibleArray(elem) => Shape::FlexibleArray(*elem),
        TypeKind::TypeLiteral(elem) => Shape::TypeLiteral(*elem),
        TypeKind::Function(ft) => Shape::Function(ft.clone()),
        TypeKind::Alias { target, .. } => Shape::Follow(*target),
        TypeKind::Assignment(ta) => match ta.value() {
            Some(value) => Shape::Follow(value),
            None => Shape::Leaf,
        },
        TypeKind::Ambiguous(amb) => Shape::Ambiguous(amb.kind, amb.choices.clone()),
        TypeKind::TypeFnCall(call) => Shape::FnCall(call.func, call.args),
        TypeKind::Error
        | TypeKind::Primitive(_)
        | TypeKind::Composite { .. }
        | TypeKind::Enum { .. }
        | TypeKind::Unit(_)
        | TypeKind::TypeVar(_)
        | TypeKind::PatternValue { .. }
        | TypeKind::TypeFunction(_)
        | TypeKind::QualifierFn(_) => Shape::Leaf,
    }
}

fn walk_list<T: TypeTransform + ?Sized>(
    t: &mut T,
    session: &mut Session,
    items: &[QualifiedType],
) -> SemaResult<(Vec<QualifiedType>, bool)> {
    let mut out = Vec::with_capacity(items.len());
    let mut changed = false;
    for item in items {
        let next = walk_type(t, session, *item)?;
        changed |= next != *item;
        out.push(next);
    }
    Ok((out, changed))
}

/// Applies `t` to `qt` and rebuilds the structure above any replaced node.
pub fn walk_type<T: TypeTransform + ?Sized>(
    t: &mut T,
    session: &mut Session,
    qt: QualifiedType,
) -> SemaResult<QualifiedType> {
    if let Some(replaced) = t.rewrite(session, qt)? {
        return Ok(replaced);
    }

    let rebuilt = match shape_of(session, qt.ty) {
        Shape::Leaf => None,
        Shape::Tuple(members) => {
            let (members, changed) = walk_list(t, session, &members)?;
            changed.then(|| session.graph.types.tuple(members))
        }
        Shape::Union(members) => {
            let (members, changed) = walk_list(t, session, &members)?;
            changed.then(|| session.graph.types.union(members))
        }
        Shape::Address(elem) => {
            let next = walk_type(t, session, elem)?;
            (next != elem).then(|| session.graph.types.address(next))
        }
        Shape::Pointer(elem) => {
            let next = walk_type(t, session, elem)?;
            (next != elem).then(|| session.graph.types.pointer(next))
        }
        Shape::NativeArray(elem, size) => {
            let next = walk_type(t, session, elem)?;
            (next != elem).then(|| session.graph.types.native_array(next, size))
        }
        Shape::FlexibleArray(elem) => {
            let next = walk_type(t, session, elem)?;
            (next != elem).then(|| session.graph.types.flexible_array(next))
        }
        Shape::TypeLiteral(elem) => {
            let next = walk_type(t, session, elem)?;
            (next != elem).then(|| session.graph.types.type_literal(next))
        }
        Shape::Function(mut ft) => {
            let mut changed = false;
            for param in &mut ft.params {
                let next = walk_type(t, session, param.ty)?;
                changed |= next != param.ty;
                param.ty = next;
            }
            let ret = walk_type(t, session, ft.ret)?;
            changed |= ret != ft.ret;
            ft.ret = ret;
            if let Some(self_param) = ft.self_param {
                let next = walk_type(t, session, self_param)?;
                changed |= next != self_param;
                ft.self_param = Some(next);
            }
            changed.then(|| session.graph.types.function(ft))
        }
        Shape::Follow(target) => {
            let next = walk_type(t, session, target)?;
            if next == target {
                None
            } else {
                return Ok(next.qualified(qt.quals));
            }
        }
        Shape::Ambiguous(kind, choices) => {
            let mut changed = false;
            let mut out = Vec::with_capacity(choices.len());
            for choice in choices {
                let ty = walk_type(t, session, choice.ty)?;
                changed |= ty != choice.ty;
                out.push(AmbiguousChoice {
                    ty,
                    provisions: choice.provisions,
                });
            }
            changed.then(|| session.graph.types.ambiguous(kind, out))
        }
        Shape::FnCall(func, args) => {
            let next_func = walk_type(t, session, func)?;
            let next_args = walk_type(t, session, QualifiedType::plain(args))?;
            if next_func != func || next_args.ty != args {
                Some(session.type_fn_call(next_func, next_args.ty)?)
            } else {
                None
            }
        }
    };

    Ok(match rebuilt {
        Some(ty) => QualifiedType::new(ty, qt.quals),
        None => qt,
    })
}

/// Replaces bound variables. Generic composites whose variables are bound get
/// instantiated, and partial instances are re-instantiated with the new
/// bindings layered over their old arguments.
///
/// An instantiation that fails leaves the error type in its place; the
/// first failure is handed back by [`SubstitutionTransform::apply`]
/// unreported.
pub struct SubstitutionTransform<'e> {
    env: &'e BindingEnv,
    span: Span,
    failure: Option<SemanticError>,
}

impl<'e> SubstitutionTransform<'e> {
    pub fn new(env: &'e BindingEnv, span: Span) -> Self {
        Self {
            env,
            span,
            failure: None,
        }
    }

    pub fn apply(mut self, session: &mut Session, qt: QualifiedType) -> SemaResult<QualifiedType> {
        let out = self.transform(session, qt)?;
        match self.failure {
            Some(err) => Err(err),
            None => Ok(out),
        }
    }

    fn instance_type(
        &mut self,
        session: &mut Session,
        defn: DefnId,
        env: &BindingEnv,
        quals: Qualifiers,
    ) -> Option<QualifiedType> {
        match session.instantiate_unreported(self.span, defn, env, Expect::NONE) {
            Ok(inst) => session
                .graph
                .defns
                .get(inst)
                .type_value()
                .map(|ty| QualifiedType::new(ty, quals)),
            Err(err) => {
                self.failure.get_or_insert(err);
                Some(QualifiedType::new(session.graph.types.error(), quals))
            }
        }
    }
}

impl TypeTransform for SubstitutionTransform<'_> {
    fn rewrite(
        &mut self,
        session: &mut Session,
        qt: QualifiedType,
    ) -> SemaResult<Option<QualifiedType>> {
        let graph = &session.graph;
        match graph.types.kind(qt.ty) {
            TypeKind::TypeVar(_) | TypeKind::PatternValue { .. } => {
                Ok(self.env.get(qt.ty).map(|value| value.qualified(qt.quals)))
            }
            TypeKind::Composite { defn, .. } => {
                let defn = *defn;
                let d = graph.defns.get(defn);
                if let (true, Some(template)) = (d.is_template(), d.template) {
                    if !self.env.binds_any(&graph.templates.get(template).vars) {
                        return Ok(None);
                    }
                    let env = self.env;
                    return Ok(self.instance_type(session, defn, env, qt.quals));
                }
                if let (true, Some(inst)) = (d.has_trait(Traits::PARTIAL), d.instance) {
                    let instance = graph.templates.instance(inst);
                    let template_defn = instance.template_defn;
                    let stale = instance.param_values.clone();
                    let mut layered = BindingEnv::new();
                    let mut changed = false;
                    for (var, value) in stale {
                        let next = walk_type(self, session, value)?;
                        changed |= next != value;
                        layered.bind(var, next);
                    }
                    if !changed {
                        return Ok(None);
                    }
                    return Ok(self.instance_type(session, template_defn, &layered, qt.quals));
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

/// Gives each listed variable a fresh pattern value, reused for every
/// occurrence within one pass.
pub struct RelabelTransform {
    vars: Vec<TypeId>,
    relabeled: HashMap<TypeId, TypeId>,
}

impl RelabelTransform {
    pub fn new(vars: Vec<TypeId>) -> Self {
        Self {
            vars,
            relabeled: HashMap::new(),
        }
    }

    /// The variable to pattern-value mapping built so far.
    pub fn mapping(&self) -> BindingEnv {
        self.relabeled
            .iter()
            .map(|(var, pv)| (*var, QualifiedType::plain(*pv)))
            .collect()
    }
}

impl TypeTransform for RelabelTransform {
    fn rewrite(
        &mut self,
        session: &mut Session,
        qt: QualifiedType,
    ) -> SemaResult<Option<QualifiedType>> {
        if !self.vars.contains(&qt.ty) {
            return Ok(None);
        }
        let fresh = match self.relabeled.get(&qt.ty) {
            Some(pv) => *pv,
            None => {
                let pv = session.graph.types.pattern_value(qt.ty);
                self.relabeled.insert(qt.ty, pv);
                pv
            }
        };
        Ok(Some(QualifiedType::new(fresh, qt.quals)))
    }
}

/// Collects the free type variables of a type in first-occurrence order.
#[derive(Default)]
pub struct FindTypeVariables {
    pub found: Vec<TypeId>,
}

impl TypeTransform for FindTypeVariables {
    fn rewrite(
        &mut self,
        session: &mut Session,
        qt: QualifiedType,
    ) -> SemaResult<Option<QualifiedType>> {
        if let TypeKind::TypeVar(_) = session.graph.types.kind(qt.ty) {
            if !self.found.contains(&qt.ty) {
                self.found.push(qt.ty);
            }
        }
        Ok(None)
    }
}

impl Session {
    /// Substitutes `env` into `qt`, recording any instantiation failure.
    pub fn substitute(
        &mut self,
        span: Span,
        env: &BindingEnv,
        qt: QualifiedType,
    ) -> SemaResult<QualifiedType> {
        self.substitute_unreported(span, env, qt)
            .map_err(|err| self.diag.record_fatal(err))
    }

    pub(crate) fn substitute_unreported(
        &mut self,
        span: Span,
        env: &BindingEnv,
        qt: QualifiedType,
    ) -> SemaResult<QualifiedType> {
        if env.is_empty() {
            return Ok(qt);
        }
        SubstitutionTransform::new(env, span).apply(self, qt)
    }

    /// Relabels `vars` in `qt` with fresh pattern values. The mapping comes
    /// back alongside so callers can bind the new placeholders.
    pub fn relabel(
        &mut self,
        vars: &[TypeId],
        qt: QualifiedType,
    ) -> SemaResult<(QualifiedType, BindingEnv)> {
        let mut relabel = RelabelTransform::new(vars.to_vec());
        let out = relabel
            .transform(self, qt)
            .map_err(|err| self.diag.record_fatal(err))?;
        Ok((out, relabel.mapping()))
    }

    pub fn find_type_variables(&mut self, qt: QualifiedType) -> SemaResult<Vec<TypeId>> {
        let mut finder = FindTypeVariables::default();
        finder.transform(self, qt)?;
        Ok(finder.found)
    }

    /// Builds a type function application, reducing it when the callee can
    /// be applied to `args`.
    pub fn type_fn_call(&mut self, func: QualifiedType, args: TypeId) -> SemaResult<TypeId> {
        let arg_list = match self.graph.types.kind(args) {
            TypeKind::Tuple(members) => members.clone(),
            _ => vec![QualifiedType::plain(args)],
        };
        let reduced = match self.graph.types.kind(self.graph.types.dealias(func).ty) {
            TypeKind::TypeFunction(tf) if tf.params.len() == arg_list.len() => {
                let body = tf.body;
                let env: BindingEnv = tf.params.iter().copied().zip(arg_list).collect();
                Some(SubstitutionTransform::new(&env, quill_ast::no_span()).apply(self, body)?)
            }
            TypeKind::QualifierFn(quals) if arg_list.len() == 1 => {
                Some(arg_list[0].qualified(*quals))
            }
            _ => None,
        };
        Ok(self
            .graph
            .types
            .type_fn_call(TypeFunctionCall { func, args, reduced }))
    }
}
