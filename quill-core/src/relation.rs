//! Equality, subtyping and specificity between qualified types.
//!
//! These are the only comparisons the rest of the analyzer uses. They never
//! mutate the graph, apart from the cycle flags on constraints, which are
//! always cleared again before returning.

use crate::defn::DefnKind;
use crate::graph::SemaGraph;
use crate::infer::{ConstraintKind, VisitGuard};
use crate::types::{can_assign_qualifiers, CompositeClass, QualifiedType, TypeId, TypeKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Specificity {
    MoreSpecific,
    EqualSpecificity,
    NotMoreSpecific,
}

#[derive(Clone, Copy)]
pub struct TypeRelation<'g> {
    g: &'g SemaGraph,
}

/// Which side of a subtype query an unsolved assignment sits on.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Sub,
    Base,
}

impl<'g> TypeRelation<'g> {
    pub fn new(g: &'g SemaGraph) -> Self {
        Self { g }
    }

    fn kind(&self, ty: TypeId) -> &'g TypeKind {
        self.g.types.kind(ty)
    }

    fn expansion(&self, qt: QualifiedType) -> Vec<QualifiedType> {
        let mut out = Vec::new();
        self.g.expand(qt, &mut out);
        out
    }

    pub fn is_equal(&self, lt: QualifiedType, rt: QualifiedType) -> bool {
        if lt == rt {
            return true;
        }

        match self.kind(rt.ty) {
            TypeKind::Alias { target, .. } => {
                return self.is_equal(lt, target.qualified(rt.quals));
            }
            TypeKind::Ambiguous(_) => {
                let expansion = self.expansion(rt);
                return !expansion.is_empty() && expansion.iter().all(|t| self.is_equal(lt, *t));
            }
            TypeKind::Assignment(ta) => {
                return ta.value().is_some_and(|v| self.is_equal(lt, v));
            }
            TypeKind::TypeFnCall(rcall) => {
                if let Some(reduced) = rcall.reduced {
                    return self.is_equal(lt, reduced.qualified(rt.quals));
                }
                if let TypeKind::TypeFnCall(lcall) = self.kind(lt.ty) {
                    if lcall.reduced.is_none() {
                        return self.is_equal(lcall.func, rcall.func)
                            && self.is_equal(lcall.args.into(), rcall.args.into());
                    }
                }
            }
            _ => {}
        }

        match self.kind(lt.ty) {
            TypeKind::Alias { target, .. } => self.is_equal(target.qualified(lt.quals), rt),
            // Qualifiers are meaningless on primitives; unsized constants are
            // interned by value, so identity is value equality.
            TypeKind::Primitive(_) => lt.ty == rt.ty,
            TypeKind::Enum { .. }
            | TypeKind::TypeVar(_)
            | TypeKind::PatternValue { .. }
            | TypeKind::TypeFunction(_)
            | TypeKind::Error => lt.ty == rt.ty,
            TypeKind::Composite { .. } => match self.kind(rt.ty) {
                TypeKind::Composite { .. } => self.is_equal_composite(lt, rt),
                _ => false,
            },
            TypeKind::Address(l) => match self.kind(rt.ty) {
                TypeKind::Address(r) => lt.quals == rt.quals && self.is_equal(*l, *r),
                _ => false,
            },
            TypeKind::Pointer(l) => match self.kind(rt.ty) {
                TypeKind::Pointer(r) => lt.quals == rt.quals && self.is_equal(*l, *r),
                _ => false,
            },
            TypeKind::NativeArray { elem: l, size: ls } => match self.kind(rt.ty) {
                TypeKind::NativeArray { elem: r, size: rs } => {
                    lt.quals == rt.quals && ls == rs && self.is_equal(*l, *r)
                }
                _ => false,
            },
            TypeKind::FlexibleArray(l) => match self.kind(rt.ty) {
                TypeKind::FlexibleArray(r) => lt.quals == rt.quals && self.is_equal(*l, *r),
                _ => false,
            },
            TypeKind::Function(_) => match self.kind(rt.ty) {
                TypeKind::Function(_) => self.is_equal_function(lt, rt),
                _ => false,
            },
            TypeKind::Unit(l) => match self.kind(rt.ty) {
                TypeKind::Unit(r) => l == r,
                _ => false,
            },
            TypeKind::Tuple(_) => match self.kind(rt.ty) {
                TypeKind::Tuple(_) => self.is_equal_tuple(lt, rt),
                _ => false,
            },
            TypeKind::Union(_) => match self.kind(rt.ty) {
                TypeKind::Union(_) => self.is_equal_tuple(lt, rt),
                _ => false,
            },
            TypeKind::TypeLiteral(l) => match self.kind(rt.ty) {
                TypeKind::TypeLiteral(r) => self.is_equal(*l, *r),
                _ => false,
            },
            TypeKind::Ambiguous(_) => {
                let expansion = self.expansion(lt);
                !expansion.is_empty() && expansion.iter().all(|t| self.is_equal(*t, rt))
            }
            TypeKind::Assignment(ta) => ta.value().is_some_and(|v| self.is_equal(v, rt)),
            TypeKind::TypeFnCall(call) => call
                .reduced
                .is_some_and(|reduced| self.is_equal(reduced.qualified(lt.quals), rt)),
            TypeKind::QualifierFn(l) => match self.kind(rt.ty) {
                TypeKind::QualifierFn(r) => l == r,
                _ => false,
            },
        }
    }

    /// Member-wise comparison shared by tuples and unions.
    fn is_equal_tuple(&self, lt: QualifiedType, rt: QualifiedType) -> bool {
        if lt.quals != rt.quals {
            return false;
        }
        if lt.ty == rt.ty {
            return true;
        }
        let members = |ty: TypeId| match self.kind(ty) {
            TypeKind::Tuple(m) | TypeKind::Union(m) => m.as_slice(),
            _ => &[],
        };
        let (l, r) = (members(lt.ty), members(rt.ty));
        l.len() == r.len() && l.iter().zip(r).all(|(a, b)| self.is_equal(*a, *b))
    }

    /// Two composites are equal when they come from the same declaration and
    /// were instantiated with equal arguments, possibly at an enclosing level.
    fn is_equal_composite(&self, lt: QualifiedType, rt: QualifiedType) -> bool {
        if lt.quals != rt.quals {
            return false;
        }
        let (TypeKind::Composite { defn: l, .. }, TypeKind::Composite { defn: r, .. }) =
            (self.kind(lt.ty), self.kind(rt.ty))
        else {
            return false;
        };
        let defns = &self.g.defns;
        let same_origin = match (&defns.get(*l).ast, &defns.get(*r).ast) {
            (Some(la), Some(ra)) => std::rc::Rc::ptr_eq(la, ra),
            _ => false,
        };
        if !same_origin {
            return false;
        }
        let (mut ldef, mut rdef) = (Some(*l), Some(*r));
        while let (Some(ld), Some(rd)) = (ldef, rdef) {
            let (ld_defn, rd_defn) = (defns.get(ld), defns.get(rd));
            match (ld_defn.instance, rd_defn.instance) {
                (Some(li), Some(ri)) => {
                    let la = self.g.templates.instance(li).type_args;
                    let ra = self.g.templates.instance(ri).type_args;
                    return self.is_equal_tuple(la.into(), ra.into());
                }
                (None, None) => {}
                _ => return false,
            }
            if ld_defn.is_template() || rd_defn.is_template() {
                return false;
            }
            ldef = ld_defn.parent.filter(|p| matches!(defns.get(*p).kind, DefnKind::Type(_)));
            rdef = rd_defn.parent.filter(|p| matches!(defns.get(*p).kind, DefnKind::Type(_)));
        }
        false
    }

    /// Compares parameter count, staticness, return type and each parameter's
    /// type and variadic flag. The self parameter is not compared.
    fn is_equal_function(&self, lt: QualifiedType, rt: QualifiedType) -> bool {
        if lt.quals != rt.quals {
            return false;
        }
        let (TypeKind::Function(lf), TypeKind::Function(rf)) = (self.kind(lt.ty), self.kind(rt.ty))
        else {
            return false;
        };
        lf.params.len() == rf.params.len()
            && lf.is_static == rf.is_static
            && self.is_equal(lf.ret, rf.ret)
            && lf
                .params
                .iter()
                .zip(&rf.params)
                .all(|(a, b)| a.variadic == b.variadic && self.is_equal(a.ty, b.ty))
    }

    /// An unsolved assignment satisfies a subtype query when every live
    /// constraint does and at least one exists. An upper bound can never be
    /// proven, so it answers false.
    fn assignment_subtype(
        &self,
        assignment: TypeId,
        side: Side,
        other: QualifiedType,
        test: impl Fn(&Self, QualifiedType, QualifiedType) -> bool,
    ) -> bool {
        let ta = self.g.types.assignment_data(assignment);
        let mut any = false;
        for c in &ta.constraints {
            if c.is_visited() {
                any = true;
                continue;
            }
            if !self.g.check_provisions(&c.provisions) {
                continue;
            }
            if c.kind == ConstraintKind::UpperBound {
                return false;
            }
            let _guard = VisitGuard::enter(c);
            let holds = match side {
                Side::Base => test(self, other, c.value),
                Side::Sub => test(self, c.value, other),
            };
            if !holds {
                return false;
            }
            any = true;
        }
        any
    }

    pub fn is_subtype(&self, ty: QualifiedType, base: QualifiedType) -> bool {
        if !can_assign_qualifiers(ty.quals, base.quals) {
            return false;
        }
        if ty.ty == base.ty {
            return true;
        }

        match self.kind(base.ty) {
            TypeKind::Alias { target, .. } => {
                return self.is_subtype(ty, target.qualified(base.quals));
            }
            TypeKind::Composite {
                class: CompositeClass::Protocol,
                ..
            } => {
                if self.is_supported_by(base.ty, ty) {
                    return true;
                }
            }
            TypeKind::Ambiguous(_) => {
                let expansion = self.expansion(base);
                return !expansion.is_empty()
                    && expansion.iter().all(|t| self.is_subtype(ty, *t));
            }
            TypeKind::Assignment(ta) => {
                return match ta.value() {
                    Some(v) => self.is_subtype(ty, v),
                    None => self.assignment_subtype(base.ty, Side::Base, ty, Self::is_subtype),
                };
            }
            TypeKind::TypeFnCall(call) => {
                return call
                    .reduced
                    .is_some_and(|r| self.is_subtype(ty, r.qualified(base.quals)));
            }
            _ => {}
        }

        match self.kind(ty.ty) {
            TypeKind::Alias { target, .. } => self.is_subtype(target.qualified(ty.quals), base),
            TypeKind::Primitive(p) => match self.kind(base.ty) {
                TypeKind::Primitive(b) => p.is_subtype_of(b),
                _ => false,
            },
            TypeKind::Composite { .. } => self.is_subclass_composite(ty, base, Self::is_subtype),
            TypeKind::Enum { base: underlying, .. } => match self.kind(base.ty) {
                TypeKind::Primitive(_) => self.is_subtype(QualifiedType::plain(*underlying), base),
                _ => false,
            },
            TypeKind::Address(_)
            | TypeKind::Pointer(_)
            | TypeKind::NativeArray { .. }
            | TypeKind::FlexibleArray(_)
            | TypeKind::Function(_)
            | TypeKind::Unit(_)
            | TypeKind::Tuple(_)
            | TypeKind::Union(_)
            | TypeKind::TypeLiteral(_)
            | TypeKind::TypeVar(_)
            | TypeKind::PatternValue { .. }
            | TypeKind::TypeFunction(_)
            | TypeKind::Error => self.is_equal(ty, base),
            TypeKind::Ambiguous(_) => {
                let expansion = self.expansion(ty);
                !expansion.is_empty() && expansion.iter().all(|t| self.is_subtype(*t, base))
            }
            TypeKind::Assignment(ta) => match ta.value() {
                Some(v) => self.is_subtype(v, base),
                None => self.assignment_subtype(ty.ty, Side::Sub, base, Self::is_subtype),
            },
            TypeKind::QualifierFn(q) => match self.kind(base.ty) {
                TypeKind::QualifierFn(b) => can_assign_qualifiers(*q, *b),
                _ => false,
            },
            TypeKind::TypeFnCall(call) => call
                .reduced
                .is_some_and(|r| self.is_subtype(r.qualified(ty.quals), base)),
        }
    }

    /// Nominal subclassing only: no protocol duck typing, no primitive widening.
    pub fn is_subclass(&self, ty: QualifiedType, base: QualifiedType) -> bool {
        if !can_assign_qualifiers(ty.quals, base.quals) {
            return false;
        }
        if ty.ty == base.ty {
            return true;
        }

        match self.kind(base.ty) {
            TypeKind::Alias { target, .. } => {
                return self.is_subclass(ty, target.qualified(base.quals));
            }
            TypeKind::Ambiguous(_) => {
                let expansion = self.expansion(base);
                return !expansion.is_empty()
                    && expansion.iter().all(|t| self.is_subclass(ty, *t));
            }
            TypeKind::Assignment(ta) => {
                return match ta.value() {
                    Some(v) => self.is_subclass(ty, v),
                    None => self.assignment_subtype(base.ty, Side::Base, ty, Self::is_subclass),
                };
            }
            TypeKind::TypeFnCall(call) => {
                return call
                    .reduced
                    .is_some_and(|r| self.is_subclass(ty, r.qualified(base.quals)));
            }
            _ => {}
        }

        match self.kind(ty.ty) {
            TypeKind::Alias { target, .. } => self.is_subclass(target.qualified(ty.quals), base),
            TypeKind::Composite { class, .. } if *class != CompositeClass::Struct => {
                self.is_subclass_composite(ty, base, Self::is_subclass)
            }
            TypeKind::Ambiguous(_) => {
                let expansion = self.expansion(ty);
                !expansion.is_empty() && expansion.iter().all(|t| self.is_subclass(*t, base))
            }
            TypeKind::Assignment(ta) => match ta.value() {
                Some(v) => self.is_subclass(v, base),
                None => self.assignment_subtype(ty.ty, Side::Sub, base, Self::is_subclass),
            },
            TypeKind::TypeFnCall(call) => call
                .reduced
                .is_some_and(|r| self.is_subclass(r.qualified(ty.quals), base)),
            _ => false,
        }
    }

    /// Walks declared bases of a composite `ty` looking for `base`.
    fn is_subclass_composite(
        &self,
        ty: QualifiedType,
        base: QualifiedType,
        recurse: fn(&Self, QualifiedType, QualifiedType) -> bool,
    ) -> bool {
        let TypeKind::Composite { class, .. } = self.kind(ty.ty) else {
            return false;
        };
        if !matches!(self.kind(base.ty), TypeKind::Composite { .. }) {
            return false;
        }
        if self.is_equal_composite(ty.unqualified(), base.unqualified()) {
            return true;
        }
        if *class == CompositeClass::Interface && base.ty == self.g.builtins.object {
            return true;
        }
        self.g
            .bases_of(ty.ty)
            .into_iter()
            .any(|b| recurse(self, b, base.unqualified()))
    }

    /// Duck-typed protocol satisfaction: every member the protocol declares
    /// has a same-named member on `ty`, with an equal signature for methods.
    pub fn is_supported_by(&self, protocol: TypeId, ty: QualifiedType) -> bool {
        let ty = self.g.types.deref(ty);
        let (Some(required), Some(provided)) = (
            self.g.member_scope_of(protocol),
            self.g.member_scope_of(ty.ty),
        ) else {
            return false;
        };
        if !matches!(self.kind(ty.ty), TypeKind::Composite { .. }) {
            return false;
        }
        self.g.scopes.members(required).iter().all(|member| {
            let want = self.g.defns.get(*member);
            let found = self.g.lookup_member(provided, &want.name, true);
            match want.function_type() {
                Some(want_fn) => found.iter().any(|f| {
                    self.g
                        .defns
                        .get(*f)
                        .function_type()
                        .is_some_and(|have| self.is_equal(want_fn.into(), have.into()))
                }),
                None => !found.is_empty(),
            }
        })
    }

    /// Orders two candidate parameter types for overload ranking.
    pub fn is_more_specific(&self, lhs: QualifiedType, rhs: QualifiedType) -> Specificity {
        if let TypeKind::Alias { target, .. } = self.kind(lhs.ty) {
            return self.is_more_specific(target.qualified(lhs.quals), rhs);
        }
        if let TypeKind::Alias { target, .. } = self.kind(rhs.ty) {
            return self.is_more_specific(lhs, target.qualified(rhs.quals));
        }

        match (self.kind(lhs.ty), self.kind(rhs.ty)) {
            (TypeKind::Assignment(lta), TypeKind::Assignment(rta)) => {
                let lu = &self.g.types.type_var_data(lta.target).upper_bounds;
                let ru = &self.g.types.type_var_data(rta.target).upper_bounds;
                let mut left_unmatched = vec![true; lu.len()];
                for r in ru {
                    let mut best: Option<usize> = None;
                    for (index, l) in lu.iter().enumerate() {
                        if self.is_subtype(*l, *r)
                            && best.is_none_or(|b| self.is_subtype(*l, lu[b]))
                        {
                            best = Some(index);
                        }
                    }
                    match best {
                        Some(index) => left_unmatched[index] = false,
                        None => return Specificity::NotMoreSpecific,
                    }
                }
                if left_unmatched.iter().any(|u| *u) {
                    Specificity::MoreSpecific
                } else {
                    Specificity::EqualSpecificity
                }
            }
            (TypeKind::Assignment(lta), _) => {
                let lu = &self.g.types.type_var_data(lta.target).upper_bounds;
                if lu
                    .iter()
                    .any(|l| self.is_subtype(*l, rhs) && !self.is_equal(*l, rhs))
                {
                    Specificity::MoreSpecific
                } else {
                    Specificity::NotMoreSpecific
                }
            }
            (_, TypeKind::Assignment(rta)) => {
                let ru = &self.g.types.type_var_data(rta.target).upper_bounds;
                if ru.iter().all(|r| self.is_subtype(lhs, *r)) {
                    Specificity::MoreSpecific
                } else {
                    Specificity::NotMoreSpecific
                }
            }
            (TypeKind::Address(l), TypeKind::Address(r))
            | (TypeKind::Pointer(l), TypeKind::Pointer(r))
            | (TypeKind::FlexibleArray(l), TypeKind::FlexibleArray(r))
            | (TypeKind::NativeArray { elem: l, .. }, TypeKind::NativeArray { elem: r, .. }) => {
                self.is_more_specific(*l, *r)
            }
            (
                TypeKind::Address(_)
                | TypeKind::Pointer(_)
                | TypeKind::FlexibleArray(_)
                | TypeKind::NativeArray { .. },
                _,
            ) => Specificity::NotMoreSpecific,
            _ => {
                if self.is_equal(lhs, rhs) {
                    debug_assert!(self.is_equal(rhs, lhs), "asymmetric type equality");
                    Specificity::EqualSpecificity
                } else if self.is_subtype(lhs, rhs) {
                    Specificity::MoreSpecific
                } else {
                    Specificity::NotMoreSpecific
                }
            }
        }
    }
}
