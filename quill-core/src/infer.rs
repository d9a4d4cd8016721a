//! Inference variables and the singular-solution search.

use std::cell::{Cell, OnceCell};

use crate::graph::SemaGraph;
use crate::relation::TypeRelation;
use crate::types::{Primitive, QualifiedType, TypeId, TypeKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProvisionId(pub(crate) u32);

/// A condition under which a constraint or ambiguous choice applies.
#[derive(Clone, Debug, PartialEq)]
pub enum Provision {
    /// Live while the flag is set; call candidates clear theirs when culled.
    Flag(ProvisionId),
    /// Live once `assignment` has been solved to a type equal to `value`.
    Resolved {
        assignment: TypeId,
        value: QualifiedType,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Provisions(Vec<Provision>);

impl Provisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(id: ProvisionId) -> Self {
        Self(vec![Provision::Flag(id)])
    }

    pub fn with(mut self, provision: Provision) -> Self {
        self.0.push(provision);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provision> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    /// The solution must equal the value.
    Exact,
    /// The solution must be a subtype of the value.
    UpperBound,
    /// The value must be a subtype of the solution.
    LowerBound,
}

#[derive(Debug)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub value: QualifiedType,
    pub provisions: Provisions,
    visited: Cell<bool>,
}

impl Constraint {
    pub fn new(kind: ConstraintKind, value: QualifiedType, provisions: Provisions) -> Self {
        Self {
            kind,
            value,
            provisions,
            visited: Cell::new(false),
        }
    }

    pub fn is_visited(&self) -> bool {
        self.visited.get()
    }

    pub fn accepts(&self, rel: &TypeRelation<'_>, candidate: QualifiedType) -> bool {
        match self.kind {
            ConstraintKind::Exact => rel.is_equal(candidate, self.value),
            ConstraintKind::UpperBound => rel.is_subtype(candidate, self.value),
            ConstraintKind::LowerBound => rel.is_subtype(self.value, candidate),
        }
    }
}

/// Marks a constraint visited for the guard's lifetime. Dropping the guard
/// clears the flag on every exit path.
pub(crate) struct VisitGuard<'a>(&'a Cell<bool>);

impl<'a> VisitGuard<'a> {
    pub(crate) fn enter(constraint: &'a Constraint) -> Self {
        constraint.visited.set(true);
        VisitGuard(&constraint.visited)
    }
}

impl Drop for VisitGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// One inference variable standing in for `target` at a particular use.
#[derive(Debug)]
pub struct TypeAssignment {
    pub target: TypeId,
    pub sequence: u32,
    pub constraints: Vec<Constraint>,
    value: OnceCell<QualifiedType>,
}

impl TypeAssignment {
    pub fn new(target: TypeId, sequence: u32) -> Self {
        Self {
            target,
            sequence,
            constraints: Vec::new(),
            value: OnceCell::new(),
        }
    }

    pub fn value(&self) -> Option<QualifiedType> {
        self.value.get().copied()
    }

    pub fn is_solved(&self) -> bool {
        self.value.get().is_some()
    }
}

impl SemaGraph {
    pub fn check_provisions(&self, provisions: &Provisions) -> bool {
        provisions.iter().all(|p| match p {
            Provision::Flag(id) => self.types.is_provision_live(*id),
            Provision::Resolved { assignment, value } => {
                match self.types.assignment_data(*assignment).value() {
                    Some(solved) => self.relation().is_equal(solved, *value),
                    None => false,
                }
            }
        })
    }

    /// Searches the live constraints of `assignment` for a single solution.
    /// A found solution is stored; later calls return it unchanged.
    pub fn find_singular_solution(&self, assignment: TypeId) -> Option<QualifiedType> {
        let ta = self.types.assignment_data(assignment);
        if let Some(value) = ta.value() {
            return Some(value);
        }
        let solution = self.solve(ta);
        tracing::trace!(
            target: "quill::infer",
            assignment = %self.display_type(assignment),
            solution = ?solution.map(|s| self.display(s)),
            "solve"
        );
        if let Some(value) = solution {
            let _ = ta.value.set(value);
        }
        solution
    }

    fn solve(&self, ta: &TypeAssignment) -> Option<QualifiedType> {
        let rel = self.relation();
        let live: Vec<&Constraint> = ta
            .constraints
            .iter()
            .filter(|c| self.check_provisions(&c.provisions))
            .collect();
        let exacts: Vec<&Constraint> = live
            .iter()
            .copied()
            .filter(|c| c.kind == ConstraintKind::Exact)
            .collect();
        let lowers: Vec<&Constraint> = live
            .iter()
            .copied()
            .filter(|c| c.kind == ConstraintKind::LowerBound)
            .collect();
        let uppers: Vec<&Constraint> = live
            .iter()
            .copied()
            .filter(|c| c.kind == ConstraintKind::UpperBound)
            .collect();

        let mut exact: Option<QualifiedType> = None;
        for c in &exacts {
            let ty = self.types.deref(c.value);
            match exact {
                None => exact = Some(ty),
                Some(prev) if !rel.is_equal(prev, ty) => return None,
                Some(_) => {}
            }
        }
        if let Some(value) = exact {
            // Bound to a variable of an enclosing generic; bounds can't be
            // checked until that generic is instantiated.
            if matches!(self.types.kind(value.ty), TypeKind::TypeVar(_)) {
                return Some(value);
            }
            let satisfied = live
                .iter()
                .filter(|c| c.kind != ConstraintKind::Exact)
                .all(|c| c.accepts(&rel, value));
            return satisfied.then_some(value);
        }

        let mut lower: Option<QualifiedType> = None;
        for c in &lowers {
            let ty = self.types.deref(c.value);
            lower = match lower {
                None => Some(ty),
                Some(prev) => Some(self.common_base(prev, ty)?),
            };
        }
        if let Some(value) = lower {
            let satisfied = uppers.iter().all(|c| {
                c.accepts(&rel, value)
                    || matches!(self.types.kind(c.value.ty), TypeKind::Assignment(_))
            });
            return satisfied.then_some(value);
        }

        let mut upper: Option<QualifiedType> = None;
        for c in &uppers {
            let ty = self.types.deref(c.value);
            upper = match upper {
                None => Some(ty),
                Some(prev) if rel.is_subtype(ty, prev) => Some(ty),
                Some(prev) if rel.is_subtype(prev, ty) => Some(prev),
                Some(_) => return None,
            };
        }
        upper
    }

    /// The narrowest type both `a` and `b` convert to, if any.
    pub fn common_base(&self, a: QualifiedType, b: QualifiedType) -> Option<QualifiedType> {
        let rel = self.relation();
        let a = self.types.deref(a);
        let b = self.types.deref(b);
        if rel.is_subtype(b, a) {
            return Some(a);
        }
        if rel.is_subtype(a, b) {
            return Some(b);
        }
        match (self.types.primitive_of(a.ty), self.types.primitive_of(b.ty)) {
            (Some(pa), Some(pb)) => {
                return Primitive::NAMED
                    .iter()
                    .find(|p| pa.is_subtype_of(p) && pb.is_subtype_of(p))
                    .map(|p| self.primitive(*p));
            }
            (Some(_), None) | (None, Some(_)) => return None,
            (None, None) => {}
        }
        if self.composite_class(a.ty).is_some() && self.composite_class(b.ty).is_some() {
            for ancestor in self.ancestors_of(a.ty) {
                let candidate = QualifiedType::plain(ancestor);
                if rel.is_subtype(b.unqualified(), candidate) {
                    return Some(candidate);
                }
            }
            if self.is_reference_type(a.ty) && self.is_reference_type(b.ty) {
                return Some(QualifiedType::plain(self.builtins.object));
            }
        }
        None
    }
}
