//! Lowered-operation facts the front-end attaches to specific nodes.

use crate::SymbolId;

use super::types::SemanticType;

/// The enumeration protocol bound to a `foreach` over a non-array collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ForEachInfo {
    /// `GetEnumerator()` on the collection.
    pub get_enumerator: SymbolId,
    /// `MoveNext()` on the enumerator.
    pub move_next: SymbolId,
    /// `Current` getter on the enumerator.
    pub current: SymbolId,
    /// `Dispose()`, present when the enumerator is disposable.
    pub dispose: Option<SymbolId>,
    pub enumerator_type: SemanticType,
    pub element_type: SemanticType,
}

/// Members used to slice a container with a range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSliceInfo {
    /// `Length`/`Count` getter; absent for arrays, which use `ldlen`.
    pub length: Option<SymbolId>,
    /// `Slice(int, int)` or an equivalent helper.
    pub slice: SymbolId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    ForEach(ForEachInfo),
    /// A binary or unary operator bound to a user-defined operator method.
    UserDefinedOperator { method: SymbolId },
    RangeSlice(RangeSliceInfo),
}
