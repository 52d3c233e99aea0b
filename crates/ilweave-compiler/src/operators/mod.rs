//! Operator resolution for expression lowering.
//!
//! Operands are classified by the primitive that decides their arithmetic
//! (enums by their underlying type), then each operator is looked up in a
//! fixed rule table:
//! - Primitive operations map to an opcode sequence (`add`, `clt.un`, ...)
//! - String `+` becomes a `String.Concat` call, string `==`/`!=` the
//!   runtime equality operators
//! - Anything else has no rule and is reported as an error
//!
//! User-defined operators never reach this module; the semantic model binds
//! them to their method and the expression compiler emits a plain call.

mod binary;
mod unary;

pub use binary::{binary_rule, resolve_binary};
pub use unary::{increment, resolve_unary, unary_rule, Increment};

use ilweave_core::{PrimitiveKind, SemanticType};

use crate::bytecode::OpCode;

/// How an operand takes part in primitive arithmetic and comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandClass {
    /// Signed integers, including native `nint`.
    Signed,
    /// Unsigned integers, `char` and pointers.
    Unsigned,
    Float,
    Bool,
    String,
    /// Objects, arrays, delegates and other references.
    Reference,
}

impl OperandClass {
    pub fn of(ty: &SemanticType) -> Self {
        if let Some(kind) = ty.numeric_kind() {
            return match kind {
                PrimitiveKind::Bool => OperandClass::Bool,
                k if k.is_floating() => OperandClass::Float,
                k if k.is_unsigned() => OperandClass::Unsigned,
                k if k.is_integral() => OperandClass::Signed,
                _ => OperandClass::Reference,
            };
        }
        match ty {
            SemanticType::Primitive(PrimitiveKind::String) => OperandClass::String,
            SemanticType::Pointer(_) | SemanticType::FunctionPointer { .. } => OperandClass::Unsigned,
            _ => OperandClass::Reference,
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(self, OperandClass::Signed | OperandClass::Unsigned)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            OperandClass::Signed | OperandClass::Unsigned | OperandClass::Float
        )
    }
}

/// Result of binary operator resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorResolution {
    /// Emit the opcodes in order; both operands are on the stack.
    Primitive(&'static [OpCode]),
    /// `String.Concat(a, b)`. `boxed` when at least one side is not a
    /// string and the `object` overload is used.
    StringConcat { boxed: bool },
    /// `String.op_Equality` / `String.op_Inequality`.
    StringEquality { negate: bool },
}

/// Result of unary operator resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnaryResolution {
    Primitive(&'static [OpCode]),
    /// Unary `+` on a number.
    NoOp,
}
