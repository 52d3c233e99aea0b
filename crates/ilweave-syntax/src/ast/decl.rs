//! Declaration nodes: the compilation unit, types and their members.
//!
//! Every declaration node's `declared_symbol` is the symbol it introduces;
//! signatures, modifiers and types are read from that symbol rather than from
//! the syntax.

use ilweave_core::{NodeId, Span};

use crate::ast::expr::{Argument, Expr};
use crate::ast::stmt::{Block, VarDeclarator};
use crate::ast::Ident;

/// The root of a typed tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompilationUnit<'ast> {
    pub types: &'ast [&'ast TypeDecl<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDeclKind {
    Class,
    Struct,
    Interface,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeDecl<'ast> {
    pub id: NodeId,
    pub kind: TypeDeclKind,
    pub name: Ident<'ast>,
    pub members: &'ast [Member<'ast>],
    pub span: Span,
}

/// A member of a type declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Member<'ast> {
    Field(&'ast FieldDecl<'ast>),
    Method(&'ast MethodDecl<'ast>),
    Constructor(&'ast ConstructorDecl<'ast>),
    Property(&'ast PropertyDecl<'ast>),
    Event(&'ast EventDecl<'ast>),
    /// User-defined operator or conversion; lowered like a static method.
    Operator(&'ast MethodDecl<'ast>),
    EnumMember(EnumMemberDecl<'ast>),
    NestedType(&'ast TypeDecl<'ast>),
    Destructor(UnsupportedMemberDecl<'ast>),
    Indexer(UnsupportedMemberDecl<'ast>),
}

impl<'ast> Member<'ast> {
    pub fn span(&self) -> Span {
        match self {
            Self::Field(m) => m.span,
            Self::Method(m) | Self::Operator(m) => m.span,
            Self::Constructor(m) => m.span,
            Self::Property(m) => m.span,
            Self::Event(m) => m.span,
            Self::EnumMember(m) => m.span,
            Self::NestedType(m) => m.span,
            Self::Destructor(m) | Self::Indexer(m) => m.span,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Field(_) => "field",
            Self::Method(_) => "method",
            Self::Constructor(_) => "constructor",
            Self::Property(_) => "property",
            Self::Event(_) => "event",
            Self::Operator(_) => "operator",
            Self::EnumMember(_) => "enum member",
            Self::NestedType(_) => "nested type",
            Self::Destructor(_) => "destructor",
            Self::Indexer(_) => "indexer declaration",
        }
    }
}

/// `int a = 1, b;` at type level. Each declarator declares a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDecl<'ast> {
    pub declarators: &'ast [VarDeclarator<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param<'ast> {
    pub id: NodeId,
    pub name: Ident<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodDecl<'ast> {
    pub id: NodeId,
    pub name: Ident<'ast>,
    pub params: &'ast [Param<'ast>],
    /// `None` for abstract, extern and interface methods.
    pub body: Option<Block<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtorInitializerKind {
    Base,
    This,
}

/// `: base(args)` / `: this(args)`. `symbol_info(id)` is the target constructor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CtorInitializer<'ast> {
    pub id: NodeId,
    pub kind: CtorInitializerKind,
    pub args: &'ast [Argument<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstructorDecl<'ast> {
    pub id: NodeId,
    pub params: &'ast [Param<'ast>],
    pub initializer: Option<CtorInitializer<'ast>>,
    pub body: Option<Block<'ast>>,
    pub span: Span,
}

/// `get { ... }`, `set { ... }`, `add { ... }`, `remove { ... }`.
///
/// `declared_symbol(id)` is the accessor method. A missing body on both
/// accessors of a property makes it an auto-property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accessor<'ast> {
    pub id: NodeId,
    pub body: Option<Block<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyDecl<'ast> {
    pub id: NodeId,
    pub name: Ident<'ast>,
    pub getter: Option<Accessor<'ast>>,
    pub setter: Option<Accessor<'ast>>,
    /// `= value;` after an auto-property.
    pub initializer: Option<&'ast Expr<'ast>>,
    pub span: Span,
}

impl PropertyDecl<'_> {
    pub fn is_auto(&self) -> bool {
        self.getter.is_none_or(|a| a.body.is_none()) && self.setter.is_none_or(|a| a.body.is_none())
    }
}

/// `event Handler Changed;` (field-like) or with explicit accessors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventDecl<'ast> {
    pub id: NodeId,
    pub name: Ident<'ast>,
    pub add: Option<Accessor<'ast>>,
    pub remove: Option<Accessor<'ast>>,
    pub span: Span,
}

impl EventDecl<'_> {
    pub fn is_field_like(&self) -> bool {
        self.add.is_none() && self.remove.is_none()
    }
}

/// An enum member; its value is the constant on the declared field symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnumMemberDecl<'ast> {
    pub id: NodeId,
    pub name: Ident<'ast>,
    pub span: Span,
}

/// Members recognized but not lowered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnsupportedMemberDecl<'ast> {
    pub id: NodeId,
    pub name: Ident<'ast>,
    pub span: Span,
}
