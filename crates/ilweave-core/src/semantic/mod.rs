//! The semantic model the lowering engine consumes.
//!
//! - [`types`]: resolved types ([`SemanticType`], [`PrimitiveKind`], [`NamedType`])
//! - [`symbols`]: resolved declarations ([`Symbol`], [`SymbolKind`])
//! - [`conversion`]: conversion classification ([`Conversion`])
//! - [`operation`]: bound protocols (foreach, user operators, range slicing)
//! - [`model`]: the [`SemanticModel`] trait and the map-backed [`SemanticTable`]

pub mod conversion;
pub mod model;
pub mod operation;
pub mod symbols;
pub mod types;

pub use conversion::Conversion;
pub use model::{SemanticModel, SemanticTable, TypeInfo};
pub use operation::{ForEachInfo, Operation, RangeSliceInfo};
pub use symbols::{
    Accessibility, ConstantValue, EventSymbol, FieldSymbol, MethodKind, MethodSymbol,
    ParameterInfo, PropertySymbol, RefKind, Symbol, SymbolKind, TypeSymbol,
};
pub use types::{NamedType, PrimitiveKind, SemanticType, TypeKind};
