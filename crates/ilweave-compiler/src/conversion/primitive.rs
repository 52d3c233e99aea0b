//! Numeric conversions between primitive types.
//!
//! The evaluation stack only holds 32-bit integers, 64-bit integers, native
//! integers and floats, so widening between small integral types needs no
//! instruction; everything else maps to one or two `conv.*` opcodes.

use ilweave_core::PrimitiveKind;

use crate::bytecode::OpCode;

/// Whether every value of `from` is representable in `to` without change
/// on the evaluation stack.
fn fits(from: PrimitiveKind, to: PrimitiveKind) -> bool {
    if !from.is_integral() || !to.is_integral() {
        return false;
    }
    if from.bits() == to.bits() {
        return from.is_unsigned() == to.is_unsigned();
    }
    from.bits() < to.bits() && (from.is_unsigned() || !to.is_unsigned())
}

/// Instructions converting a `from` value on the stack to `to`.
///
/// Returns `None` when either side is not numeric.
pub fn numeric_conversion(from: PrimitiveKind, to: PrimitiveKind) -> Option<Vec<OpCode>> {
    use OpCode::*;
    use PrimitiveKind::*;

    if !from.is_numeric() || !to.is_numeric() {
        return None;
    }
    if from == to {
        return Some(Vec::new());
    }
    let from_unsigned_int = from.is_integral() && from.is_unsigned();
    let ops = match to {
        Int8 => vec![Conv_I1],
        UInt8 => vec![Conv_U1],
        Int16 | UInt16 | Char if fits(from, to) => Vec::new(),
        Int16 => vec![Conv_I2],
        UInt16 | Char => vec![Conv_U2],
        Int32 | UInt32 if from.is_integral() && from.bits() <= 32 => Vec::new(),
        Int32 => vec![Conv_I4],
        UInt32 => vec![Conv_U4],
        Int64 | UInt64 if matches!(from, Int64 | UInt64) => Vec::new(),
        Int64 if from.is_floating() => vec![Conv_I8],
        UInt64 if from.is_floating() => vec![Conv_U8],
        Int64 | UInt64 if from_unsigned_int => vec![Conv_U8],
        Int64 | UInt64 => vec![Conv_I8],
        IntPtr | UIntPtr if from_unsigned_int => vec![Conv_U],
        IntPtr | UIntPtr => vec![Conv_I],
        Float32 if from_unsigned_int => vec![Conv_R_Un, Conv_R4],
        Float32 => vec![Conv_R4],
        Float64 if from_unsigned_int => vec![Conv_R_Un, Conv_R8],
        Float64 => vec![Conv_R8],
        Void | Bool | String | Object => return None,
    };
    Some(ops)
}

/// Truncation needed after arithmetic on a small integral type, e.g. `conv.u1`
/// after `byte + 1`.
pub fn truncation(kind: PrimitiveKind) -> Option<OpCode> {
    match kind {
        PrimitiveKind::Int8 => Some(OpCode::Conv_I1),
        PrimitiveKind::UInt8 => Some(OpCode::Conv_U1),
        PrimitiveKind::Int16 => Some(OpCode::Conv_I2),
        PrimitiveKind::UInt16 | PrimitiveKind::Char => Some(OpCode::Conv_U2),
        _ => None,
    }
}
