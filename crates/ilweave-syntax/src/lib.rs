//! Typed syntax tree for ilweave.
//!
//! The tree is the input of the lowering engine. It is produced by an
//! external front-end (parser plus type checker) or, for hosts and tests,
//! by [`AstBuilder`], which records the semantic facts alongside the nodes.
//!
//! ```
//! use bumpalo::Bump;
//! use ilweave_core::SemanticType;
//! use ilweave_syntax::AstBuilder;
//!
//! let arena = Bump::new();
//! let mut b = AstBuilder::new(&arena);
//! let x = b.local_symbol("x", SemanticType::INT32);
//! let one = b.int(1);
//! let stmt = b.local(x, Some(one));
//! assert_eq!(stmt.kind_name(), "local declaration");
//! ```

pub mod ast;
mod builder;

pub use builder::{AccessorSymbols, AstBuilder};
