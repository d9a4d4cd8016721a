#![forbid(unsafe_code)]

use std::fmt;
use std::rc::Rc;

use miette::SourceSpan;

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            span: self.span,
            node: f(self.node),
        }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

/// Span used for nodes built by hosts and tests rather than a parser.
pub fn no_span() -> Span {
    span(0, 0)
}

pub type Ident = Spanned<String>;

impl Spanned<String> {
    pub fn synthetic(name: impl Into<String>) -> Ident {
        Spanned::new(no_span(), name.into())
    }
}

/// A name, value or type expression as the front end hands it to the core.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub span: Span,
    pub kind: NodeKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// Unqualified identifier.
    Ident(String),
    /// `qualifier.member`
    Member { qualifier: Box<Node>, member: Ident },
    /// `base[args]`
    Specialize { base: Box<Node>, args: Vec<Node> },
    /// `callee(args)`
    Call { callee: Box<Node>, args: Vec<Node> },
    /// `name = arg` inside an argument list.
    Keyword { name: Ident, arg: Box<Node> },
    Int(i128),
    Bool(bool),
    Str(String),
    /// `(a, b, ...)` in type position.
    Tuple(Vec<Node>),
}

impl Node {
    pub fn new(span: Span, kind: NodeKind) -> Self {
        Self { span, kind }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::new(no_span(), NodeKind::Ident(name.into()))
    }

    /// Builds a dotted path such as `pkg.sub.Name` as nested member nodes.
    pub fn path(dotted: &str) -> Self {
        let mut parts = dotted.split('.');
        let head = parts.next().unwrap_or_default();
        parts.fold(Self::ident(head), |acc, part| Self::member(acc, part))
    }

    pub fn member(qualifier: Node, member: impl Into<String>) -> Self {
        Self::new(
            no_span(),
            NodeKind::Member {
                qualifier: Box::new(qualifier),
                member: Ident::synthetic(member),
            },
        )
    }

    pub fn specialize(base: Node, args: Vec<Node>) -> Self {
        Self::new(
            no_span(),
            NodeKind::Specialize {
                base: Box::new(base),
                args,
            },
        )
    }

    pub fn call(callee: Node, args: Vec<Node>) -> Self {
        Self::new(
            no_span(),
            NodeKind::Call {
                callee: Box::new(callee),
                args,
            },
        )
    }

    pub fn keyword(name: impl Into<String>, arg: Node) -> Self {
        Self::new(
            no_span(),
            NodeKind::Keyword {
                name: Ident::synthetic(name),
                arg: Box::new(arg),
            },
        )
    }

    pub fn int(value: i128) -> Self {
        Self::new(no_span(), NodeKind::Int(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(no_span(), NodeKind::Bool(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(no_span(), NodeKind::Str(value.into()))
    }

    pub fn tuple(items: Vec<Node>) -> Self {
        Self::new(no_span(), NodeKind::Tuple(items))
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// True for identifiers, member paths and specializations.
    pub fn is_name(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Ident(_) | NodeKind::Member { .. } | NodeKind::Specialize { .. }
        )
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Ident(name) => f.write_str(name),
            NodeKind::Member { qualifier, member } => write!(f, "{qualifier}.{}", member.node),
            NodeKind::Specialize { base, args } => {
                write!(f, "{base}[")?;
                write_list(f, args)?;
                f.write_str("]")
            }
            NodeKind::Call { callee, args } => {
                write!(f, "{callee}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            NodeKind::Keyword { name, arg } => write!(f, "{}={arg}", name.node),
            NodeKind::Int(v) => write!(f, "{v}"),
            NodeKind::Bool(v) => write!(f, "{v}"),
            NodeKind::Str(v) => write!(f, "{v:?}"),
            NodeKind::Tuple(items) => {
                f.write_str("(")?;
                write_list(f, items)?;
                f.write_str(")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Node]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub is_static: bool,
    pub is_final: bool,
    pub is_abstract: bool,
    pub is_readonly: bool,
    pub is_extern: bool,
}

/// One slot of a template parameter list.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeParam {
    /// A pattern variable, optionally restricted to values of `value_type`.
    Var {
        name: Ident,
        value_type: Option<Node>,
        variadic: bool,
    },
    /// A concrete type pattern, as in a specialization `Vec[Bool]`.
    Fixed(Node),
}

impl TypeParam {
    pub fn var(name: impl Into<String>) -> Self {
        TypeParam::Var {
            name: Ident::synthetic(name),
            value_type: None,
            variadic: false,
        }
    }

    pub fn variadic(name: impl Into<String>) -> Self {
        TypeParam::Var {
            name: Ident::synthetic(name),
            value_type: None,
            variadic: true,
        }
    }

    pub fn value(name: impl Into<String>, value_type: Node) -> Self {
        TypeParam::Var {
            name: Ident::synthetic(name),
            value_type: Some(value_type),
            variadic: false,
        }
    }

    pub fn fixed(pattern: Node) -> Self {
        TypeParam::Fixed(pattern)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub span: Span,
    pub name: Ident,
    pub ty: Node,
    pub variadic: bool,
    pub keyword_only: bool,
    pub default: Option<Node>,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Node) -> Self {
        Self {
            span: no_span(),
            name: Ident::synthetic(name),
            ty,
            variadic: false,
            keyword_only: false,
            default: None,
        }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn keyword_only(mut self) -> Self {
        self.keyword_only = true;
        self
    }

    pub fn with_default(mut self, default: Node) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeKind {
    Class,
    Struct,
    Interface,
    Protocol,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeclKind {
    Composite {
        kind: CompositeKind,
        bases: Vec<Node>,
        members: Vec<Rc<Decl>>,
    },
    Enum {
        base: Option<Node>,
        variants: Vec<Ident>,
    },
    Function {
        params: Vec<Param>,
        ret: Option<Node>,
    },
    Var {
        ty: Option<Node>,
        init: Option<Node>,
        is_let: bool,
    },
    Namespace {
        members: Vec<Rc<Decl>>,
    },
    Alias {
        target: Node,
    },
}

/// A declaration. Instantiated template clones share the same `Rc<Decl>`
/// as their generic, so pointer identity is the declaration's origin.
#[derive(Clone, Debug, PartialEq)]
pub struct Decl {
    pub span: Span,
    pub name: Ident,
    pub visibility: Visibility,
    pub modifiers: Modifiers,
    pub type_params: Vec<TypeParam>,
    pub kind: DeclKind,
}

impl Decl {
    pub fn new(name: impl Into<String>, kind: DeclKind) -> Self {
        Self {
            span: no_span(),
            name: Ident::synthetic(name),
            visibility: Visibility::Public,
            modifiers: Modifiers::default(),
            type_params: Vec::new(),
            kind,
        }
    }

    pub fn composite(kind: CompositeKind, name: impl Into<String>) -> Self {
        Self::new(
            name,
            DeclKind::Composite {
                kind,
                bases: Vec::new(),
                members: Vec::new(),
            },
        )
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::composite(CompositeKind::Class, name)
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self::composite(CompositeKind::Struct, name)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::composite(CompositeKind::Interface, name)
    }

    pub fn protocol(name: impl Into<String>) -> Self {
        Self::composite(CompositeKind::Protocol, name)
    }

    pub fn function(name: impl Into<String>, params: Vec<Param>, ret: Option<Node>) -> Self {
        Self::new(name, DeclKind::Function { params, ret })
    }

    pub fn var(name: impl Into<String>, ty: Option<Node>, init: Option<Node>) -> Self {
        Self::new(
            name,
            DeclKind::Var {
                ty,
                init,
                is_let: false,
            },
        )
    }

    pub fn constant(name: impl Into<String>, ty: Option<Node>, init: Node) -> Self {
        Self::new(
            name,
            DeclKind::Var {
                ty,
                init: Some(init),
                is_let: true,
            },
        )
    }

    pub fn namespace(name: impl Into<String>, members: Vec<Decl>) -> Self {
        Self::new(
            name,
            DeclKind::Namespace {
                members: members.into_iter().map(Rc::new).collect(),
            },
        )
    }

    pub fn alias(name: impl Into<String>, target: Node) -> Self {
        Self::new(name, DeclKind::Alias { target })
    }

    pub fn enumeration(name: impl Into<String>, base: Option<Node>, variants: &[&str]) -> Self {
        Self::new(
            name,
            DeclKind::Enum {
                base,
                variants: variants.iter().map(|v| Ident::synthetic(*v)).collect(),
            },
        )
    }

    pub fn with_type_params(mut self, params: Vec<TypeParam>) -> Self {
        self.type_params = params;
        self
    }

    pub fn with_bases(mut self, new_bases: Vec<Node>) -> Self {
        if let DeclKind::Composite { bases, .. } = &mut self.kind {
            *bases = new_bases;
        }
        self
    }

    /// Adds members to a composite or namespace declaration.
    pub fn with_members(mut self, new_members: Vec<Decl>) -> Self {
        match &mut self.kind {
            DeclKind::Composite { members, .. } | DeclKind::Namespace { members } => {
                members.extend(new_members.into_iter().map(Rc::new));
            }
            _ => {}
        }
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_static(mut self) -> Self {
        self.modifiers.is_static = true;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn members(&self) -> &[Rc<Decl>] {
        match &self.kind {
            DeclKind::Composite { members, .. } | DeclKind::Namespace { members } => members,
            _ => &[],
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_path_builds_nested_members() {
        let node = Node::path("pkg.sub.Name");
        assert_eq!(node.to_string(), "pkg.sub.Name");
        match node.kind {
            NodeKind::Member { qualifier, member } => {
                assert_eq!(member.node, "Name");
                assert_eq!(qualifier.to_string(), "pkg.sub");
            }
            other => panic!("expected member node, got {other:?}"),
        }
    }

    #[test]
    fn members_only_attach_to_scoped_declarations() {
        let class = Decl::class("Box").with_members(vec![Decl::var("x", None, None)]);
        assert_eq!(class.members().len(), 1);
        let func = Decl::function("f", vec![], None).with_members(vec![Decl::var("y", None, None)]);
        assert!(func.members().is_empty());
    }
}
