//! Mapping conversion classifications to instructions.
//!
//! The semantic model decides *which* conversion applies between an
//! expression's type and the type its context expects
//! ([`SemanticModel::classify_conversion`](ilweave_core::SemanticModel::classify_conversion));
//! [`plan_conversion`] decides *how* it is emitted.
//!
//! | Conversion                          | Emitted                         |
//! |-------------------------------------|---------------------------------|
//! | identity, reference widening, null  | nothing                         |
//! | numeric, enumeration                | `conv.*` (see [`primitive`])    |
//! | boxing                              | `box T`                         |
//! | unboxing                            | `unbox.any T`                   |
//! | reference narrowing                 | `castclass T`                   |
//! | user-defined                        | `call op_Implicit/op_Explicit`  |

pub mod primitive;

pub use primitive::{numeric_conversion, truncation};

use ilweave_core::{Conversion, LoweringError, SemanticType, Span, SymbolId};

use crate::bytecode::OpCode;

/// What to emit for one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionStep {
    Nothing,
    Numeric(Vec<OpCode>),
    /// `box` with the source type.
    Box,
    /// `unbox.any` with the target type.
    UnboxAny,
    /// `castclass` with the target type.
    Castclass,
    /// A static conversion operator.
    Call(SymbolId),
}

fn no_rule(conversion: Conversion, from: &SemanticType, to: &SemanticType, span: Span) -> LoweringError {
    LoweringError::UnsupportedConversion {
        kind: conversion.name().to_string(),
        from: from.to_string(),
        to: to.to_string(),
        span,
    }
}

/// Decide how `conversion` from `from` to `to` is emitted.
pub fn plan_conversion(
    conversion: Conversion,
    from: &SemanticType,
    to: &SemanticType,
    span: Span,
) -> Result<ConversionStep, LoweringError> {
    if conversion.is_representation_preserving() || conversion == Conversion::MethodGroup {
        return Ok(ConversionStep::Nothing);
    }
    match conversion {
        Conversion::ImplicitNumeric
        | Conversion::ExplicitNumeric
        | Conversion::ImplicitConstant
        | Conversion::ExplicitEnumeration => {
            let (Some(f), Some(t)) = (from.numeric_kind(), to.numeric_kind()) else {
                return Err(no_rule(conversion, from, to, span));
            };
            numeric_conversion(f, t)
                .map(ConversionStep::Numeric)
                .ok_or_else(|| no_rule(conversion, from, to, span))
        }
        Conversion::Boxing => Ok(ConversionStep::Box),
        Conversion::Unboxing => Ok(ConversionStep::UnboxAny),
        Conversion::ExplicitReference => Ok(ConversionStep::Castclass),
        Conversion::UserDefined { method } => Ok(ConversionStep::Call(method)),
        _ => Err(no_rule(conversion, from, to, span)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilweave_core::{NamedType, PrimitiveKind, TypeKind};

    fn color() -> SemanticType {
        SemanticType::named(NamedType::new("Demo", "Color", TypeKind::Enum).with_underlying(PrimitiveKind::UInt8))
    }

    #[test]
    fn representation_preserving_emits_nothing() {
        let step = plan_conversion(
            Conversion::ImplicitReference,
            &SemanticType::STRING,
            &SemanticType::OBJECT,
            Span::default(),
        );
        assert_eq!(step, Ok(ConversionStep::Nothing));
    }

    #[test]
    fn numeric_uses_table() {
        let step = plan_conversion(
            Conversion::ImplicitNumeric,
            &SemanticType::INT32,
            &SemanticType::INT64,
            Span::default(),
        );
        assert_eq!(step, Ok(ConversionStep::Numeric(vec![OpCode::Conv_I8])));
    }

    #[test]
    fn enum_converts_through_underlying_type() {
        let step = plan_conversion(
            Conversion::ExplicitEnumeration,
            &SemanticType::INT32,
            &color(),
            Span::default(),
        );
        assert_eq!(step, Ok(ConversionStep::Numeric(vec![OpCode::Conv_U1])));
    }

    #[test]
    fn boxing_and_casts() {
        let span = Span::default();
        assert_eq!(
            plan_conversion(Conversion::Boxing, &SemanticType::INT32, &SemanticType::OBJECT, span),
            Ok(ConversionStep::Box)
        );
        assert_eq!(
            plan_conversion(Conversion::Unboxing, &SemanticType::OBJECT, &SemanticType::INT32, span),
            Ok(ConversionStep::UnboxAny)
        );
        assert_eq!(
            plan_conversion(
                Conversion::ExplicitReference,
                &SemanticType::OBJECT,
                &SemanticType::STRING,
                span
            ),
            Ok(ConversionStep::Castclass)
        );
    }

    #[test]
    fn no_conversion_is_fatal() {
        let err = plan_conversion(
            Conversion::NoConversion,
            &SemanticType::BOOL,
            &SemanticType::INT32,
            Span::point(1, 2),
        )
        .unwrap_err();
        assert!(matches!(err, LoweringError::UnsupportedConversion { .. }));
        assert!(!err.is_gap());
    }
}
