//! Typed syntax tree.
//!
//! The tree is allocated in a [`bumpalo::Bump`] arena and is purely
//! structural: types, bound symbols and bound operations live in the semantic
//! model, keyed by each node's [`NodeId`](ilweave_core::NodeId).
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use ilweave_core::SemanticType;
//! use ilweave_syntax::AstBuilder;
//! use ilweave_syntax::ast::{BinaryOp, Expr};
//!
//! let arena = Bump::new();
//! let mut b = AstBuilder::new(&arena);
//! let one = b.int(1);
//! let two = b.int(2);
//! let sum = b.binary(BinaryOp::Add, one, two, SemanticType::INT32);
//! assert!(matches!(sum, Expr::Binary(_)));
//! ```

pub mod decl;
pub mod expr;
pub mod ops;
pub mod stmt;

pub use decl::*;
pub use expr::*;
pub use ops::*;
pub use stmt::*;

use ilweave_core::{NodeId, Span};

/// A name as written in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'ast> {
    pub name: &'ast str,
    pub span: Span,
}

impl<'ast> Ident<'ast> {
    pub fn new(name: &'ast str, span: Span) -> Self {
        Self { name, span }
    }
}

/// A type as written in source. Its meaning is `type_info(id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSyntax<'ast> {
    pub id: NodeId,
    pub name: &'ast str,
    pub span: Span,
}
