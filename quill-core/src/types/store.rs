use std::collections::HashMap;

use crate::defn::DefnId;
use crate::error::ice;
use crate::infer::{Constraint, ConstraintKind, ProvisionId, Provisions, TypeAssignment};

use super::{
    AmbiguousChoice, AmbiguousKind, AmbiguousType, CompositeClass, ConstValue, FunctionType,
    Primitive, QualifiedType, Qualifiers, TypeFunction, TypeFunctionCall, TypeId, TypeKind,
    TypeVariable,
};

/// Key of a canonicalized structural type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum InternKey {
    Error,
    Primitive(Primitive),
    Tuple(Vec<QualifiedType>),
    Union(Vec<QualifiedType>),
    Address(QualifiedType),
    Pointer(QualifiedType),
    NativeArray(QualifiedType, u64),
    FlexibleArray(QualifiedType),
    TypeLiteral(QualifiedType),
    Unit(ConstValue),
    QualifierFn(Qualifiers),
}

impl InternKey {
    fn to_kind(&self) -> TypeKind {
        match self {
            InternKey::Error => TypeKind::Error,
            InternKey::Primitive(p) => TypeKind::Primitive(*p),
            InternKey::Tuple(members) => TypeKind::Tuple(members.clone()),
            InternKey::Union(members) => TypeKind::Union(members.clone()),
            InternKey::Address(elem) => TypeKind::Address(*elem),
            InternKey::Pointer(elem) => TypeKind::Pointer(*elem),
            InternKey::NativeArray(elem, size) => TypeKind::NativeArray {
                elem: *elem,
                size: *size,
            },
            InternKey::FlexibleArray(elem) => TypeKind::FlexibleArray(*elem),
            InternKey::TypeLiteral(ty) => TypeKind::TypeLiteral(*ty),
            InternKey::Unit(value) => TypeKind::Unit(value.clone()),
            InternKey::QualifierFn(q) => TypeKind::QualifierFn(*q),
        }
    }
}

/// Arena of type nodes. Structural kinds are interned so equal shapes share
/// one id; declaration-owned kinds get a fresh node each time.
#[derive(Debug, Default)]
pub struct TypeStore {
    kinds: Vec<TypeKind>,
    interned: HashMap<InternKey, TypeId>,
    provisions: Vec<bool>,
    next_serial: u32,
}

impl TypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        match self.kinds.get(id.index()) {
            Some(kind) => kind,
            None => ice!("dangling type id {}", id.0),
        }
    }

    fn push(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind);
        id
    }

    fn intern(&mut self, key: InternKey) -> TypeId {
        if let Some(&id) = self.interned.get(&key) {
            return id;
        }
        let id = self.push(key.to_kind());
        self.interned.insert(key, id);
        id
    }

    fn serial(&mut self) -> u32 {
        self.next_serial += 1;
        self.next_serial
    }

    pub fn error(&mut self) -> TypeId {
        self.intern(InternKey::Error)
    }

    pub fn primitive(&mut self, p: Primitive) -> TypeId {
        self.intern(InternKey::Primitive(p))
    }

    pub fn unsized_int(&mut self, value: i128) -> TypeId {
        self.primitive(Primitive::UnsizedInt(value))
    }

    pub fn tuple(&mut self, members: Vec<QualifiedType>) -> TypeId {
        self.intern(InternKey::Tuple(members))
    }

    /// Nested unions are flattened and duplicate members dropped. A union of
    /// one member is that member.
    pub fn union(&mut self, members: Vec<QualifiedType>) -> TypeId {
        let mut flat: Vec<QualifiedType> = Vec::with_capacity(members.len());
        for member in members {
            let nested = match self.kind(member.ty) {
                TypeKind::Union(inner) => inner.clone(),
                _ => vec![member],
            };
            for m in nested {
                if !flat.contains(&m) {
                    flat.push(m);
                }
            }
        }
        if flat.len() == 1 {
            return flat[0].ty;
        }
        self.intern(InternKey::Union(flat))
    }

    pub fn address(&mut self, elem: QualifiedType) -> TypeId {
        self.intern(InternKey::Address(elem))
    }

    pub fn pointer(&mut self, elem: QualifiedType) -> TypeId {
        self.intern(InternKey::Pointer(elem))
    }

    pub fn native_array(&mut self, elem: QualifiedType, size: u64) -> TypeId {
        self.intern(InternKey::NativeArray(elem, size))
    }

    pub fn flexible_array(&mut self, elem: QualifiedType) -> TypeId {
        self.intern(InternKey::FlexibleArray(elem))
    }

    pub fn type_literal(&mut self, ty: QualifiedType) -> TypeId {
        self.intern(InternKey::TypeLiteral(ty))
    }

    pub fn unit(&mut self, value: ConstValue) -> TypeId {
        self.intern(InternKey::Unit(value))
    }

    pub fn qualifier_fn(&mut self, quals: Qualifiers) -> TypeId {
        self.intern(InternKey::QualifierFn(quals))
    }

    pub fn composite(&mut self, class: CompositeClass, defn: DefnId) -> TypeId {
        self.push(TypeKind::Composite { class, defn })
    }

    pub fn enumeration(&mut self, defn: DefnId, base: TypeId) -> TypeId {
        self.push(TypeKind::Enum { defn, base })
    }

    pub fn function(&mut self, ft: FunctionType) -> TypeId {
        self.push(TypeKind::Function(ft))
    }

    pub fn alias(&mut self, name: impl Into<String>, target: QualifiedType) -> TypeId {
        self.push(TypeKind::Alias {
            name: name.into(),
            target,
        })
    }

    pub fn type_var(&mut self, var: TypeVariable) -> TypeId {
        self.push(TypeKind::TypeVar(var))
    }

    pub fn pattern_value(&mut self, var: TypeId) -> TypeId {
        let serial = self.serial();
        self.push(TypeKind::PatternValue { var, serial })
    }

    pub fn assignment(&mut self, target: TypeId) -> TypeId {
        let sequence = self.serial();
        self.push(TypeKind::Assignment(TypeAssignment::new(target, sequence)))
    }

    pub fn ambiguous(&mut self, kind: AmbiguousKind, choices: Vec<AmbiguousChoice>) -> TypeId {
        self.push(TypeKind::Ambiguous(AmbiguousType { kind, choices }))
    }

    pub fn type_function(&mut self, func: TypeFunction) -> TypeId {
        self.push(TypeKind::TypeFunction(func))
    }

    pub fn type_fn_call(&mut self, call: TypeFunctionCall) -> TypeId {
        self.push(TypeKind::TypeFnCall(call))
    }

    pub fn type_var_data(&self, id: TypeId) -> &TypeVariable {
        match self.kind(id) {
            TypeKind::TypeVar(var) => var,
            other => ice!("expected a type variable, found {}", other.name()),
        }
    }

    pub fn type_var_data_mut(&mut self, id: TypeId) -> &mut TypeVariable {
        match self.kinds.get_mut(id.index()) {
            Some(TypeKind::TypeVar(var)) => var,
            _ => ice!("expected a type variable at {}", id.0),
        }
    }

    pub fn assignment_data(&self, id: TypeId) -> &TypeAssignment {
        match self.kind(id) {
            TypeKind::Assignment(ta) => ta,
            other => ice!("expected a type assignment, found {}", other.name()),
        }
    }

    pub fn add_constraint(
        &mut self,
        assignment: TypeId,
        kind: ConstraintKind,
        value: QualifiedType,
        provisions: Provisions,
    ) {
        match self.kinds.get_mut(assignment.index()) {
            Some(TypeKind::Assignment(ta)) => {
                ta.constraints.push(Constraint::new(kind, value, provisions))
            }
            _ => ice!("constraint added to a non-assignment type {}", assignment.0),
        }
    }

    pub fn tuple_members(&self, id: TypeId) -> &[QualifiedType] {
        match self.kind(id) {
            TypeKind::Tuple(members) => members,
            other => ice!("expected a tuple, found {}", other.name()),
        }
    }

    pub fn function_type(&self, id: TypeId) -> &FunctionType {
        match self.kind(id) {
            TypeKind::Function(ft) => ft,
            other => ice!("expected a function type, found {}", other.name()),
        }
    }

    /// Strips aliases, accumulating their qualifiers.
    pub fn dealias(&self, mut qt: QualifiedType) -> QualifiedType {
        while let TypeKind::Alias { target, .. } = self.kind(qt.ty) {
            qt = QualifiedType::new(target.ty, target.quals.combine(qt.quals));
        }
        qt
    }

    /// Follows solved assignments to their values.
    pub fn deref(&self, mut qt: QualifiedType) -> QualifiedType {
        loop {
            match self.kind(qt.ty) {
                TypeKind::Assignment(ta) => match ta.value() {
                    Some(value) => qt = value.qualified(qt.quals),
                    None => return qt,
                },
                TypeKind::Alias { target, .. } => {
                    qt = QualifiedType::new(target.ty, target.quals.combine(qt.quals))
                }
                _ => return qt,
            }
        }
    }

    pub fn primitive_of(&self, id: TypeId) -> Option<Primitive> {
        match self.kind(id) {
            TypeKind::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_unsized_int(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Primitive(Primitive::UnsizedInt(_)))
    }

    pub fn is_error(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Error)
    }

    pub fn new_provision(&mut self) -> ProvisionId {
        let id = ProvisionId(self.provisions.len() as u32);
        self.provisions.push(true);
        id
    }

    pub fn cull_provision(&mut self, id: ProvisionId) {
        if let Some(flag) = self.provisions.get_mut(id.0 as usize) {
            *flag = false;
        }
    }

    pub fn is_provision_live(&self, id: ProvisionId) -> bool {
        self.provisions.get(id.0 as usize).copied().unwrap_or(false)
    }
}
