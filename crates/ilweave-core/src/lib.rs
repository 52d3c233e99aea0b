//! Core types shared across the ilweave crates.
//!
//! This crate provides the foundational types that the syntax tree and the
//! lowering engine agree on:
//!
//! - [`Span`]: source locations
//! - [`LoweringError`], [`Diagnostic`], [`LoweringFailure`]: error taxonomy
//! - [`DefHash`], [`MemberKind`]: deterministic declaration identity
//! - [`NodeId`], [`SymbolId`]: keys into the semantic model
//! - [`semantic`]: the front-end contract ([`SemanticModel`]) and its
//!   map-backed implementation

pub mod def_hash;
pub mod error;
pub mod node;
pub mod semantic;
pub mod span;

pub use def_hash::{DefHash, MemberKind};
pub use error::{Diagnostic, LoweringError, LoweringFailure, Severity};
pub use node::{NodeId, SymbolId};
pub use semantic::{
    Accessibility, ConstantValue, Conversion, EventSymbol, FieldSymbol, ForEachInfo, MethodKind,
    MethodSymbol, NamedType, Operation, ParameterInfo, PrimitiveKind, PropertySymbol,
    RangeSliceInfo, RefKind, SemanticModel, SemanticTable, SemanticType, Symbol, SymbolKind,
    TypeInfo, TypeKind, TypeSymbol,
};
pub use span::Span;
