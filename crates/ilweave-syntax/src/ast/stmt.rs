//! Statement nodes.
//!
//! Provides nodes for:
//! - Expression statements and local declarations
//! - Control flow (if, while, do-while, for, foreach, switch)
//! - Jump statements (return, break, continue, throw)
//! - Exception handling (try/catch/finally)
//! - Blocks
//!
//! `lock`, `yield`, `goto` and local functions are represented so that they
//! can be reported; the lowering engine does not translate them.

use ilweave_core::{NodeId, Span};

use crate::ast::expr::Expr;
use crate::ast::{Ident, TypeSyntax};

/// A statement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stmt<'ast> {
    Expr(ExprStmt<'ast>),
    LocalDecl(&'ast LocalDeclStmt<'ast>),
    Return(ReturnStmt<'ast>),
    Break(BreakStmt),
    Continue(ContinueStmt),
    Block(Block<'ast>),
    If(&'ast IfStmt<'ast>),
    While(&'ast WhileStmt<'ast>),
    DoWhile(&'ast DoWhileStmt<'ast>),
    For(&'ast ForStmt<'ast>),
    Foreach(&'ast ForeachStmt<'ast>),
    Switch(&'ast SwitchStmt<'ast>),
    Try(&'ast TryStmt<'ast>),
    Throw(ThrowStmt<'ast>),
    Lock(&'ast LockStmt<'ast>),
    Yield(YieldStmt<'ast>),
    Goto(GotoStmt<'ast>),
    LocalFunction(LocalFunctionStmt<'ast>),
}

impl<'ast> Stmt<'ast> {
    pub fn span(&self) -> Span {
        match self {
            Self::Expr(s) => s.span,
            Self::LocalDecl(s) => s.span,
            Self::Return(s) => s.span,
            Self::Break(s) => s.span,
            Self::Continue(s) => s.span,
            Self::Block(s) => s.span,
            Self::If(s) => s.span,
            Self::While(s) => s.span,
            Self::DoWhile(s) => s.span,
            Self::For(s) => s.span,
            Self::Foreach(s) => s.span,
            Self::Switch(s) => s.span,
            Self::Try(s) => s.span,
            Self::Throw(s) => s.span,
            Self::Lock(s) => s.span,
            Self::Yield(s) => s.span,
            Self::Goto(s) => s.span,
            Self::LocalFunction(s) => s.span,
        }
    }

    /// Short description used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Expr(_) => "expression statement",
            Self::LocalDecl(_) => "local declaration",
            Self::Return(_) => "return statement",
            Self::Break(_) => "break statement",
            Self::Continue(_) => "continue statement",
            Self::Block(_) => "block",
            Self::If(_) => "if statement",
            Self::While(_) => "while statement",
            Self::DoWhile(_) => "do statement",
            Self::For(_) => "for statement",
            Self::Foreach(_) => "foreach statement",
            Self::Switch(_) => "switch statement",
            Self::Try(_) => "try statement",
            Self::Throw(_) => "throw statement",
            Self::Lock(_) => "lock statement",
            Self::Yield(_) => "yield statement",
            Self::Goto(_) => "goto statement",
            Self::LocalFunction(_) => "local function",
        }
    }
}

/// `expr;`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExprStmt<'ast> {
    /// `None` for the empty statement `;`.
    pub expr: Option<&'ast Expr<'ast>>,
    pub span: Span,
}

/// `int a = 1, b;`
///
/// Each declarator's `declared_symbol` is the local it introduces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalDeclStmt<'ast> {
    pub declarators: &'ast [VarDeclarator<'ast>],
    pub span: Span,
}

/// One name in a local or field declaration, with its optional initializer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarDeclarator<'ast> {
    pub id: NodeId,
    pub name: Ident<'ast>,
    pub init: Option<&'ast Expr<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnStmt<'ast> {
    pub value: Option<&'ast Expr<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakStmt {
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinueStmt {
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block<'ast> {
    pub stmts: &'ast [Stmt<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IfStmt<'ast> {
    pub condition: &'ast Expr<'ast>,
    pub then_stmt: &'ast Stmt<'ast>,
    pub else_stmt: Option<&'ast Stmt<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhileStmt<'ast> {
    pub condition: &'ast Expr<'ast>,
    pub body: &'ast Stmt<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoWhileStmt<'ast> {
    pub body: &'ast Stmt<'ast>,
    pub condition: &'ast Expr<'ast>,
    pub span: Span,
}

/// Initializer clause of a `for`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForInit<'ast> {
    LocalDecl(&'ast LocalDeclStmt<'ast>),
    Exprs(&'ast [&'ast Expr<'ast>]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForStmt<'ast> {
    pub init: Option<ForInit<'ast>>,
    pub condition: Option<&'ast Expr<'ast>>,
    pub update: &'ast [&'ast Expr<'ast>],
    pub body: &'ast Stmt<'ast>,
    pub span: Span,
}

/// `foreach (var x in collection) body`
///
/// `declared_symbol(id)` is the iteration variable. For non-array collections
/// `operation(id)` carries the bound enumeration protocol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForeachStmt<'ast> {
    pub id: NodeId,
    pub var: Ident<'ast>,
    pub collection: &'ast Expr<'ast>,
    pub body: &'ast Stmt<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchStmt<'ast> {
    pub selector: &'ast Expr<'ast>,
    pub sections: &'ast [SwitchSection<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchSection<'ast> {
    pub labels: &'ast [CaseLabel<'ast>],
    pub stmts: &'ast [Stmt<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaseLabel<'ast> {
    Case(&'ast Expr<'ast>),
    Default(Span),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TryStmt<'ast> {
    pub body: Block<'ast>,
    pub catches: &'ast [CatchClause<'ast>],
    pub finally: Option<Block<'ast>>,
    pub span: Span,
}

/// `catch (T name) when (filter) { ... }`
///
/// `declared_symbol(id)` is the catch variable, when one is named.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatchClause<'ast> {
    pub id: NodeId,
    /// Caught type; `None` catches everything.
    pub ty: Option<TypeSyntax<'ast>>,
    pub var: Option<Ident<'ast>>,
    pub filter: Option<&'ast Expr<'ast>>,
    pub body: Block<'ast>,
    pub span: Span,
}

/// `throw expr;` or a bare rethrow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrowStmt<'ast> {
    pub value: Option<&'ast Expr<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockStmt<'ast> {
    pub target: &'ast Expr<'ast>,
    pub body: &'ast Stmt<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldStmt<'ast> {
    pub value: Option<&'ast Expr<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GotoStmt<'ast> {
    pub label: Ident<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFunctionStmt<'ast> {
    pub name: Ident<'ast>,
    pub span: Span,
}
