//! Nodes of the type graph.
//!
//! Every type is an immutable node in [`TypeStore`], addressed by [`TypeId`].
//! The only node with mutable state is a [`TypeAssignment`], whose solved
//! value can be set once.

mod store;

pub use store::TypeStore;

use std::fmt;
use std::ops::BitOr;

use quill_ast::{CompositeKind, Span};

use crate::defn::DefnId;
use crate::infer::{Provisions, TypeAssignment};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Binding-site qualifiers. They never change the underlying type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Qualifiers(u8);

impl Qualifiers {
    pub const NONE: Qualifiers = Qualifiers(0);
    pub const MUTABLE: Qualifiers = Qualifiers(1);
    pub const IMMUTABLE: Qualifiers = Qualifiers(2);
    pub const READONLY: Qualifiers = Qualifiers(4);
    pub const ADOPTED: Qualifiers = Qualifiers(8);
    pub const VARIADIC: Qualifiers = Qualifiers(16);
    pub const VOLATILE: Qualifiers = Qualifiers(32);
    pub const MUTABILITY_MASK: Qualifiers = Qualifiers(1 | 2 | 4);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Qualifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Qualifiers) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn mutability(self) -> Qualifiers {
        Qualifiers(self.0 & Self::MUTABILITY_MASK.0)
    }

    /// Union of both sets, except that mutability bits on `right` replace
    /// those on `self`.
    pub const fn combine(self, right: Qualifiers) -> Qualifiers {
        let mut left = self.0;
        if right.0 & Self::MUTABILITY_MASK.0 != 0 {
            left &= !Self::MUTABILITY_MASK.0;
        }
        Qualifiers(left | right.0)
    }

    pub const fn without(self, other: Qualifiers) -> Qualifiers {
        Qualifiers(self.0 & !other.0)
    }
}

impl BitOr for Qualifiers {
    type Output = Qualifiers;

    fn bitor(self, rhs: Qualifiers) -> Qualifiers {
        Qualifiers(self.0 | rhs.0)
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Qualifiers::MUTABLE, "mutable"),
            (Qualifiers::IMMUTABLE, "immutable"),
            (Qualifiers::READONLY, "readonly"),
            (Qualifiers::ADOPTED, "adopted"),
            (Qualifiers::VARIADIC, "variadic"),
            (Qualifiers::VOLATILE, "volatile"),
        ];
        let mut first = true;
        for (bit, name) in names {
            if self.contains(bit) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Whether a value qualified with `from` may be bound where `to` is expected.
pub fn can_assign_qualifiers(from: Qualifiers, to: Qualifiers) -> bool {
    if to.contains(Qualifiers::READONLY) {
        true
    } else if to.contains(Qualifiers::IMMUTABLE) {
        from.contains(Qualifiers::IMMUTABLE)
    } else if to.contains(Qualifiers::MUTABLE) {
        !from.intersects(Qualifiers::IMMUTABLE | Qualifiers::READONLY)
    } else {
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QualifiedType {
    pub ty: TypeId,
    pub quals: Qualifiers,
}

impl QualifiedType {
    pub const fn new(ty: TypeId, quals: Qualifiers) -> Self {
        Self { ty, quals }
    }

    pub const fn plain(ty: TypeId) -> Self {
        Self {
            ty,
            quals: Qualifiers::NONE,
        }
    }

    /// Applies `quals` on top of the current qualifiers.
    pub const fn qualified(self, quals: Qualifiers) -> Self {
        Self {
            ty: self.ty,
            quals: self.quals.combine(quals),
        }
    }

    pub const fn unqualified(self) -> Self {
        Self::plain(self.ty)
    }
}

impl From<TypeId> for QualifiedType {
    fn from(ty: TypeId) -> Self {
        QualifiedType::plain(ty)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Void,
    Bool,
    Char,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Integer literal whose width is not yet known.
    UnsizedInt(i128),
}

impl Primitive {
    pub const NAMED: [Primitive; 13] = [
        Primitive::Void,
        Primitive::Bool,
        Primitive::Char,
        Primitive::Int8,
        Primitive::Int16,
        Primitive::Int32,
        Primitive::Int64,
        Primitive::UInt8,
        Primitive::UInt16,
        Primitive::UInt32,
        Primitive::UInt64,
        Primitive::Float32,
        Primitive::Float64,
    ];

    pub fn name(&self) -> String {
        match self {
            Primitive::Void => "Void".into(),
            Primitive::Bool => "Bool".into(),
            Primitive::Char => "Char".into(),
            Primitive::Int8 => "Int8".into(),
            Primitive::Int16 => "Int16".into(),
            Primitive::Int32 => "Int32".into(),
            Primitive::Int64 => "Int64".into(),
            Primitive::UInt8 => "UInt8".into(),
            Primitive::UInt16 => "UInt16".into(),
            Primitive::UInt32 => "UInt32".into(),
            Primitive::UInt64 => "UInt64".into(),
            Primitive::Float32 => "Float32".into(),
            Primitive::Float64 => "Float64".into(),
            Primitive::UnsizedInt(v) => format!("UnsizedInt({v})"),
        }
    }

    /// Bit width of fixed-size integers.
    pub fn int_bits(&self) -> Option<(bool, u32)> {
        match self {
            Primitive::Int8 => Some((true, 8)),
            Primitive::Int16 => Some((true, 16)),
            Primitive::Int32 => Some((true, 32)),
            Primitive::Int64 => Some((true, 64)),
            Primitive::UInt8 => Some((false, 8)),
            Primitive::UInt16 => Some((false, 16)),
            Primitive::UInt32 => Some((false, 32)),
            Primitive::UInt64 => Some((false, 64)),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.int_bits().is_some() || matches!(self, Primitive::UnsizedInt(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Primitive::Float32 | Primitive::Float64)
    }

    /// Whether `value` is representable by this integer type.
    pub fn fits(&self, value: i128) -> bool {
        match self.int_bits() {
            Some((true, bits)) => {
                let max = (1i128 << (bits - 1)) - 1;
                value >= -max - 1 && value <= max
            }
            Some((false, bits)) => value >= 0 && value < (1i128 << bits),
            None => matches!(self, Primitive::UnsizedInt(_)),
        }
    }

    /// The primitive widening order.
    pub fn is_subtype_of(&self, base: &Primitive) -> bool {
        if self == base {
            return true;
        }
        match (self, base) {
            (Primitive::UnsizedInt(v), _) if base.int_bits().is_some() => base.fits(*v),
            (Primitive::UnsizedInt(_), _) => base.is_float(),
            (Primitive::Float32, Primitive::Float64) => true,
            _ => match (self.int_bits(), base.int_bits()) {
                (Some((src_signed, src_bits)), Some((dst_signed, dst_bits))) => {
                    if src_signed == dst_signed {
                        src_bits < dst_bits
                    } else {
                        !src_signed && dst_bits > src_bits
                    }
                }
                _ => false,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositeClass {
    Class,
    Struct,
    Interface,
    Protocol,
}

impl CompositeClass {
    pub fn is_reference(self) -> bool {
        matches!(self, CompositeClass::Class | CompositeClass::Interface)
    }
}

impl From<CompositeKind> for CompositeClass {
    fn from(kind: CompositeKind) -> Self {
        match kind {
            CompositeKind::Class => CompositeClass::Class,
            CompositeKind::Struct => CompositeClass::Struct,
            CompositeKind::Interface => CompositeClass::Interface,
            CompositeKind::Protocol => CompositeClass::Protocol,
        }
    }
}

/// Compile-time constant carried by unit types and constant definitions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstValue {
    Int(i128),
    Bool(bool),
    Char(char),
    Str(String),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Bool(v) => write!(f, "{v}"),
            ConstValue::Char(v) => write!(f, "{v:?}"),
            ConstValue::Str(v) => write!(f, "{v:?}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamType {
    pub name: String,
    pub ty: QualifiedType,
    pub variadic: bool,
    pub keyword_only: bool,
    pub has_default: bool,
}

impl ParamType {
    pub fn new(name: impl Into<String>, ty: QualifiedType) -> Self {
        Self {
            name: name.into(),
            ty,
            variadic: false,
            keyword_only: false,
            has_default: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionType {
    pub params: Vec<ParamType>,
    pub ret: QualifiedType,
    pub self_param: Option<QualifiedType>,
    pub is_static: bool,
}

impl FunctionType {
    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

/// A template's pattern variable.
#[derive(Clone, Debug)]
pub struct TypeVariable {
    pub name: String,
    pub span: Span,
    /// Present for value parameters: only constants of this type bind.
    pub value_type: Option<QualifiedType>,
    pub variadic: bool,
    pub upper_bounds: Vec<QualifiedType>,
}

impl TypeVariable {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
            value_type: None,
            variadic: false,
            upper_bounds: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmbiguousKind {
    Parameter,
    Result,
    Phi,
    TypeParam,
}

#[derive(Clone, Debug)]
pub struct AmbiguousChoice {
    pub ty: QualifiedType,
    pub provisions: Provisions,
}

#[derive(Clone, Debug)]
pub struct AmbiguousType {
    pub kind: AmbiguousKind,
    pub choices: Vec<AmbiguousChoice>,
}

/// A type-level function `name[params] = body`.
#[derive(Clone, Debug)]
pub struct TypeFunction {
    pub name: String,
    pub params: Vec<TypeId>,
    pub body: QualifiedType,
}

#[derive(Clone, Debug)]
pub struct TypeFunctionCall {
    pub func: QualifiedType,
    pub args: TypeId,
    /// The application result, when the callee could be applied.
    pub reduced: Option<QualifiedType>,
}

#[derive(Debug)]
pub enum TypeKind {
    /// Sentinel left behind by a failed resolution.
    Error,
    Primitive(Primitive),
    Composite {
        class: CompositeClass,
        defn: DefnId,
    },
    Enum {
        defn: DefnId,
        base: TypeId,
    },
    Function(FunctionType),
    Tuple(Vec<QualifiedType>),
    Union(Vec<QualifiedType>),
    Address(QualifiedType),
    Pointer(QualifiedType),
    NativeArray {
        elem: QualifiedType,
        size: u64,
    },
    FlexibleArray(QualifiedType),
    TypeLiteral(QualifiedType),
    /// A constant lifted into the type graph for value parameters.
    Unit(ConstValue),
    Alias {
        name: String,
        target: QualifiedType,
    },
    TypeVar(TypeVariable),
    /// Fresh stand-in for a type variable, created by relabelling.
    PatternValue {
        var: TypeId,
        serial: u32,
    },
    Assignment(TypeAssignment),
    Ambiguous(AmbiguousType),
    TypeFunction(TypeFunction),
    TypeFnCall(TypeFunctionCall),
    /// Type function applying qualifiers to its argument.
    QualifierFn(Qualifiers),
}

impl TypeKind {
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Error => "error",
            TypeKind::Primitive(_) => "primitive",
            TypeKind::Composite { .. } => "composite",
            TypeKind::Enum { .. } => "enum",
            TypeKind::Function(_) => "function",
            TypeKind::Tuple(_) => "tuple",
            TypeKind::Union(_) => "union",
            TypeKind::Address(_) => "address",
            TypeKind::Pointer(_) => "pointer",
            TypeKind::NativeArray { .. } => "native array",
            TypeKind::FlexibleArray(_) => "flexible array",
            TypeKind::TypeLiteral(_) => "type literal",
            TypeKind::Unit(_) => "unit",
            TypeKind::Alias { .. } => "alias",
            TypeKind::TypeVar(_) => "type variable",
            TypeKind::PatternValue { .. } => "pattern value",
            TypeKind::Assignment(_) => "type assignment",
            TypeKind::Ambiguous(_) => "ambiguous",
            TypeKind::TypeFunction(_) => "type function",
            TypeKind::TypeFnCall(_) => "type function call",
            TypeKind::QualifierFn(_) => "qualifier function",
        }
    }
}
