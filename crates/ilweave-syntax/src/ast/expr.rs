//! Expression nodes.
//!
//! Every node carries a [`NodeId`] under which the semantic model records its
//! type, the symbol it binds to and, for some nodes, a bound operation.
//! Nodes the lowering engine does not translate (lambdas, `await`) are kept so
//! that they can be reported instead of being silently dropped.

use ilweave_core::{NodeId, RefKind, Span};

use crate::ast::{AssignOp, BinaryOp, Ident, PostfixOp, TypeSyntax, UnaryOp};

/// An expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expr<'ast> {
    Literal(LiteralExpr<'ast>),
    Ident(IdentExpr<'ast>),
    /// `this`
    This(ThisExpr),
    Binary(&'ast BinaryExpr<'ast>),
    Unary(&'ast UnaryExpr<'ast>),
    Postfix(&'ast PostfixExpr<'ast>),
    Assign(&'ast AssignExpr<'ast>),
    /// `c ? a : b`
    Conditional(&'ast ConditionalExpr<'ast>),
    Call(&'ast CallExpr<'ast>),
    /// `obj.name`
    Member(&'ast MemberExpr<'ast>),
    /// `obj[index]`
    Index(&'ast IndexExpr<'ast>),
    /// `new T(args) { inits }`
    ObjectCreation(&'ast ObjectCreationExpr<'ast>),
    /// `new T[n]` / `new T[] { ... }`
    ArrayCreation(&'ast ArrayCreationExpr<'ast>),
    /// `stackalloc T[n]`
    StackAlloc(&'ast StackAllocExpr<'ast>),
    /// `(T)expr`
    Cast(&'ast CastExpr<'ast>),
    /// `expr is T`
    Is(&'ast TypeTestExpr<'ast>),
    /// `expr as T`
    As(&'ast TypeTestExpr<'ast>),
    /// `typeof(T)`
    TypeOf(TypeOfExpr<'ast>),
    /// `default` / `default(T)`
    Default(DefaultExpr),
    /// `a..b`
    Range(&'ast RangeExpr<'ast>),
    Paren(&'ast ParenExpr<'ast>),
    Lambda(&'ast LambdaExpr<'ast>),
    Await(&'ast AwaitExpr<'ast>),
}

impl<'ast> Expr<'ast> {
    pub fn id(&self) -> NodeId {
        match self {
            Self::Literal(e) => e.id,
            Self::Ident(e) => e.id,
            Self::This(e) => e.id,
            Self::Binary(e) => e.id,
            Self::Unary(e) => e.id,
            Self::Postfix(e) => e.id,
            Self::Assign(e) => e.id,
            Self::Conditional(e) => e.id,
            Self::Call(e) => e.id,
            Self::Member(e) => e.id,
            Self::Index(e) => e.id,
            Self::ObjectCreation(e) => e.id,
            Self::ArrayCreation(e) => e.id,
            Self::StackAlloc(e) => e.id,
            Self::Cast(e) => e.id,
            Self::Is(e) | Self::As(e) => e.id,
            Self::TypeOf(e) => e.id,
            Self::Default(e) => e.id,
            Self::Range(e) => e.id,
            Self::Paren(e) => e.id,
            Self::Lambda(e) => e.id,
            Self::Await(e) => e.id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Literal(e) => e.span,
            Self::Ident(e) => e.span,
            Self::This(e) => e.span,
            Self::Binary(e) => e.span,
            Self::Unary(e) => e.span,
            Self::Postfix(e) => e.span,
            Self::Assign(e) => e.span,
            Self::Conditional(e) => e.span,
            Self::Call(e) => e.span,
            Self::Member(e) => e.span,
            Self::Index(e) => e.span,
            Self::ObjectCreation(e) => e.span,
            Self::ArrayCreation(e) => e.span,
            Self::StackAlloc(e) => e.span,
            Self::Cast(e) => e.span,
            Self::Is(e) | Self::As(e) => e.span,
            Self::TypeOf(e) => e.span,
            Self::Default(e) => e.span,
            Self::Range(e) => e.span,
            Self::Paren(e) => e.span,
            Self::Lambda(e) => e.span,
            Self::Await(e) => e.span,
        }
    }

    /// Strip any number of enclosing parentheses.
    pub fn unparenthesized(&self) -> &Expr<'ast> {
        let mut current = self;
        while let Expr::Paren(p) = current {
            current = p.expr;
        }
        current
    }

    /// Short description used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Ident(_) => "identifier",
            Self::This(_) => "this",
            Self::Binary(_) => "binary expression",
            Self::Unary(_) => "unary expression",
            Self::Postfix(_) => "postfix expression",
            Self::Assign(_) => "assignment",
            Self::Conditional(_) => "conditional expression",
            Self::Call(_) => "invocation",
            Self::Member(_) => "member access",
            Self::Index(_) => "element access",
            Self::ObjectCreation(_) => "object creation",
            Self::ArrayCreation(_) => "array creation",
            Self::StackAlloc(_) => "stackalloc",
            Self::Cast(_) => "cast",
            Self::Is(_) => "is expression",
            Self::As(_) => "as expression",
            Self::TypeOf(_) => "typeof",
            Self::Default(_) => "default expression",
            Self::Range(_) => "range expression",
            Self::Paren(_) => "parenthesized expression",
            Self::Lambda(_) => "lambda expression",
            Self::Await(_) => "await expression",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiteralExpr<'ast> {
    pub id: NodeId,
    pub kind: LiteralKind<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiteralKind<'ast> {
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Char(char),
    String(&'ast str),
    Null,
}

/// A simple name: local, parameter, field, property, method group or type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentExpr<'ast> {
    pub id: NodeId,
    pub name: &'ast str,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThisExpr {
    pub id: NodeId,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryExpr<'ast> {
    pub id: NodeId,
    pub left: &'ast Expr<'ast>,
    pub op: BinaryOp,
    pub right: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnaryExpr<'ast> {
    pub id: NodeId,
    pub op: UnaryOp,
    pub operand: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostfixExpr<'ast> {
    pub id: NodeId,
    pub operand: &'ast Expr<'ast>,
    pub op: PostfixOp,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignExpr<'ast> {
    pub id: NodeId,
    pub target: &'ast Expr<'ast>,
    pub op: AssignOp,
    pub value: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionalExpr<'ast> {
    pub id: NodeId,
    pub condition: &'ast Expr<'ast>,
    pub then_expr: &'ast Expr<'ast>,
    pub else_expr: &'ast Expr<'ast>,
    pub span: Span,
}

/// One argument of a call or object creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Argument<'ast> {
    pub value: &'ast Expr<'ast>,
    pub ref_kind: RefKind,
}

/// `callee(args)`.
///
/// The invoked method is `symbol_info(id)`. When the callee is a method group
/// (an identifier or member access bound to a method) the call goes straight
/// to it; otherwise the callee is a delegate value and `symbol_info(id)` is
/// its `Invoke` method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallExpr<'ast> {
    pub id: NodeId,
    pub callee: &'ast Expr<'ast>,
    pub args: &'ast [Argument<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberExpr<'ast> {
    pub id: NodeId,
    pub object: &'ast Expr<'ast>,
    pub name: Ident<'ast>,
    pub span: Span,
}

/// `object[index]`: arrays, pointers, indexers and range slicing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexExpr<'ast> {
    pub id: NodeId,
    pub object: &'ast Expr<'ast>,
    pub index: &'ast Expr<'ast>,
    pub span: Span,
}

/// `Name = value` inside an object initializer. Bound to a field or property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberInit<'ast> {
    pub id: NodeId,
    pub name: Ident<'ast>,
    pub value: &'ast Expr<'ast>,
    pub span: Span,
}

/// `new T(args) { inits }`. The constructor is `symbol_info(id)`; it is
/// absent for the parameterless construction of a value type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectCreationExpr<'ast> {
    pub id: NodeId,
    pub ty: TypeSyntax<'ast>,
    pub args: &'ast [Argument<'ast>],
    pub initializers: &'ast [MemberInit<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayCreationExpr<'ast> {
    pub id: NodeId,
    pub element: TypeSyntax<'ast>,
    /// Explicit length; inferred from the initializer when absent.
    pub size: Option<&'ast Expr<'ast>>,
    pub initializer: Option<&'ast [&'ast Expr<'ast>]>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackAllocExpr<'ast> {
    pub id: NodeId,
    pub element: TypeSyntax<'ast>,
    pub size: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastExpr<'ast> {
    pub id: NodeId,
    pub ty: TypeSyntax<'ast>,
    pub operand: &'ast Expr<'ast>,
    pub span: Span,
}

/// Shared by `is` and `as`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeTestExpr<'ast> {
    pub id: NodeId,
    pub operand: &'ast Expr<'ast>,
    pub ty: TypeSyntax<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeOfExpr<'ast> {
    pub id: NodeId,
    pub ty: TypeSyntax<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultExpr {
    pub id: NodeId,
    pub span: Span,
}

/// `start..end`, with `^` (from-the-end) markers on either bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeExpr<'ast> {
    pub id: NodeId,
    pub start: Option<&'ast Expr<'ast>>,
    pub start_from_end: bool,
    pub end: Option<&'ast Expr<'ast>>,
    pub end_from_end: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParenExpr<'ast> {
    pub id: NodeId,
    pub expr: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambdaExpr<'ast> {
    pub id: NodeId,
    pub params: &'ast [Ident<'ast>],
    pub body: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AwaitExpr<'ast> {
    pub id: NodeId,
    pub operand: &'ast Expr<'ast>,
    pub span: Span,
}
