//! Unary operator resolution.
//!
//! Prefix `-`, `+`, `!` and `~` map to a fixed sequence per operand class.
//! Increments and decrements need the constant `1` in the operand's width
//! and, for small integers, a truncation afterwards; see [`increment`].

use ilweave_core::{LoweringError, PrimitiveKind, SemanticType, Span};
use ilweave_syntax::ast::UnaryOp;

use crate::bytecode::OpCode;
use crate::conversion::truncation;
use crate::emit::BodyEmitter;

use super::{OperandClass, UnaryResolution};

/// Opcode sequence for a value-producing prefix operator.
pub fn unary_rule(op: UnaryOp, class: OperandClass) -> Option<UnaryResolution> {
    use OperandClass::*;

    let resolution = match (op, class) {
        (UnaryOp::Neg, Signed | Float) => UnaryResolution::Primitive(&[OpCode::Neg]),
        (UnaryOp::Plus, Signed | Unsigned | Float) => UnaryResolution::NoOp,
        (UnaryOp::LogicalNot, Bool) => UnaryResolution::Primitive(&[OpCode::Ldc_I4_0, OpCode::Ceq]),
        (UnaryOp::BitNot, Signed | Unsigned) => UnaryResolution::Primitive(&[OpCode::Not]),
        _ => return None,
    };
    Some(resolution)
}

/// Resolve a prefix operator on an operand of type `operand`.
pub fn resolve_unary(
    op: UnaryOp,
    operand: &SemanticType,
    span: Span,
) -> Result<UnaryResolution, LoweringError> {
    unary_rule(op, OperandClass::of(operand)).ok_or_else(|| LoweringError::UnsupportedOperator {
        op: op.to_string(),
        left: operand.to_string(),
        right: String::new(),
        span,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum One {
    I4,
    I8,
    R4,
    R8,
}

/// The arithmetic of `++`/`--` on one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    one: One,
    /// `add` or `sub`.
    pub op: OpCode,
    /// Narrowing applied to the result of small integer types.
    pub truncate: Option<OpCode>,
}

impl Increment {
    /// Emit `1`, the operation and the truncation. The current value is
    /// already on the stack.
    pub fn emit(&self, emitter: &mut BodyEmitter) {
        match self.one {
            One::I4 => emitter.emit_i32(1),
            One::I8 => emitter.emit_i64(1),
            One::R4 => emitter.emit_f32(1.0),
            One::R8 => emitter.emit_f64(1.0),
        };
        emitter.emit(self.op);
        if let Some(conv) = self.truncate {
            emitter.emit(conv);
        }
    }
}

/// How to increment (or decrement) a value of type `ty`; `None` for types
/// without a primitive increment.
pub fn increment(ty: &SemanticType, decrement: bool) -> Option<Increment> {
    let kind = ty.numeric_kind()?;
    let one = match kind {
        PrimitiveKind::Int64 | PrimitiveKind::UInt64 => One::I8,
        PrimitiveKind::Float32 => One::R4,
        PrimitiveKind::Float64 => One::R8,
        k if k.is_integral() => One::I4,
        _ => return None,
    };
    Some(Increment {
        one,
        op: if decrement { OpCode::Sub } else { OpCode::Add },
        truncate: truncation(kind),
    })
}
