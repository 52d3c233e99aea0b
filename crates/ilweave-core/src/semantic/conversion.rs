//! Conversion classification.
//!
//! The front-end is the authority on which conversion applies between two
//! types; the lowering engine only maps the classification to instructions.
//! [`classify`] is the structural fallback used by
//! [`SemanticTable`](super::SemanticTable) when no hierarchy information or
//! explicit override is available.

use crate::SymbolId;

use super::types::{PrimitiveKind, SemanticType};

/// How a value of one type becomes a value of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    Identity,
    /// Widening numeric conversion.
    ImplicitNumeric,
    /// Narrowing numeric conversion (cast required in source).
    ExplicitNumeric,
    /// Constant expression that fits the target type.
    ImplicitConstant,
    Boxing,
    Unboxing,
    /// Reference to base class / implemented interface / object.
    ImplicitReference,
    /// Reference down-cast.
    ExplicitReference,
    /// `null` to a reference or pointer type.
    NullLiteral,
    /// Literal `0` to an enum.
    ImplicitEnumeration,
    /// Enum to/from its underlying numeric type or another enum.
    ExplicitEnumeration,
    /// Method group to delegate or function pointer.
    MethodGroup,
    /// A call to an `implicit`/`explicit` operator.
    UserDefined { method: SymbolId },
    NoConversion,
}

impl Conversion {
    /// Conversions allowed without a cast in source.
    pub fn is_implicit(self) -> bool {
        !matches!(
            self,
            Conversion::ExplicitNumeric
                | Conversion::ExplicitReference
                | Conversion::ExplicitEnumeration
                | Conversion::Unboxing
                | Conversion::NoConversion
        )
    }

    /// Conversions that need no instruction at all.
    pub fn is_representation_preserving(self) -> bool {
        matches!(
            self,
            Conversion::Identity
                | Conversion::ImplicitReference
                | Conversion::NullLiteral
                | Conversion::ImplicitEnumeration
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Conversion::Identity => "identity",
            Conversion::ImplicitNumeric => "implicit numeric",
            Conversion::ExplicitNumeric => "explicit numeric",
            Conversion::ImplicitConstant => "implicit constant",
            Conversion::Boxing => "boxing",
            Conversion::Unboxing => "unboxing",
            Conversion::ImplicitReference => "implicit reference",
            Conversion::ExplicitReference => "explicit reference",
            Conversion::NullLiteral => "null literal",
            Conversion::ImplicitEnumeration => "implicit enumeration",
            Conversion::ExplicitEnumeration => "explicit enumeration",
            Conversion::MethodGroup => "method group",
            Conversion::UserDefined { .. } => "user-defined",
            Conversion::NoConversion => "no",
        }
    }
}

/// Widening numeric conversions of the source language.
pub fn is_implicit_numeric(from: PrimitiveKind, to: PrimitiveKind) -> bool {
    use PrimitiveKind::*;
    match from {
        Int8 => matches!(to, Int16 | Int32 | Int64 | Float32 | Float64 | IntPtr),
        UInt8 => matches!(
            to,
            Int16 | UInt16 | Int32 | UInt32 | Int64 | UInt64 | Float32 | Float64 | IntPtr | UIntPtr
        ),
        Int16 => matches!(to, Int32 | Int64 | Float32 | Float64 | IntPtr),
        UInt16 | Char => matches!(
            to,
            Int32 | UInt32 | Int64 | UInt64 | Float32 | Float64 | IntPtr | UIntPtr
        ) || (from == Char && to == UInt16),
        Int32 => matches!(to, Int64 | Float32 | Float64 | IntPtr),
        UInt32 => matches!(to, Int64 | UInt64 | Float32 | Float64 | UIntPtr),
        Int64 | UInt64 => matches!(to, Float32 | Float64),
        IntPtr => matches!(to, Int64 | Float32 | Float64),
        UIntPtr => matches!(to, UInt64 | Float32 | Float64),
        Float32 => to == Float64,
        _ => false,
    }
}

/// Structural classification without hierarchy knowledge.
///
/// Reference-to-reference conversions other than to `object` classify as
/// explicit; a model that knows base types should answer those itself.
pub fn classify(from: &SemanticType, to: &SemanticType) -> Conversion {
    if from == to {
        return Conversion::Identity;
    }

    match (from, to) {
        (SemanticType::Null, t) if t.is_reference_type() || matches!(t, SemanticType::Pointer(_)) => {
            Conversion::NullLiteral
        }
        (SemanticType::Null, _) => Conversion::NoConversion,
        (SemanticType::Primitive(f), SemanticType::Primitive(t)) if f.is_numeric() && t.is_numeric() => {
            if is_implicit_numeric(*f, *t) {
                Conversion::ImplicitNumeric
            } else {
                Conversion::ExplicitNumeric
            }
        }
        (f, t) if f.is_enum() && (t.is_enum() || t.numeric_kind().is_some()) => {
            Conversion::ExplicitEnumeration
        }
        (f, t) if t.is_enum() && f.numeric_kind().is_some() => Conversion::ExplicitEnumeration,
        (f, t) if f.is_type_parameter() && t.is_reference_type() => Conversion::Boxing,
        (f, t) if f.is_reference_type() && t.is_type_parameter() => Conversion::Unboxing,
        (f, t) if f.is_value_type() && t.is_reference_type() => Conversion::Boxing,
        (f, t) if f.is_reference_type() && t.is_value_type() => Conversion::Unboxing,
        (f, SemanticType::Primitive(PrimitiveKind::Object)) if f.is_reference_type() => {
            Conversion::ImplicitReference
        }
        (f, t) if f.is_reference_type() && t.is_reference_type() => Conversion::ExplicitReference,
        _ => Conversion::NoConversion,
    }
}
