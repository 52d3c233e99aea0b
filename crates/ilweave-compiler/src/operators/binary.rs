//! Binary operator resolution.
//!
//! Resolves binary operators by trying:
//! 1. String concatenation and string equality
//! 2. The primitive rule table, keyed by operator and operand class
//!
//! Short-circuit operators (`&&`, `||`, `??`) need branches rather than a
//! fixed sequence and are lowered by the expression compiler directly.

use ilweave_core::{LoweringError, SemanticType, Span};
use ilweave_syntax::ast::BinaryOp;

use crate::bytecode::OpCode::{self, *};

use super::{OperandClass, OperatorResolution};

/// Opcode sequence for `op` on two operands of class `class`, or `None`
/// when the pair has no primitive rule.
pub fn binary_rule(op: BinaryOp, class: OperandClass) -> Option<&'static [OpCode]> {
    use OperandClass::*;

    let ops: &'static [OpCode] = match (op, class) {
        (BinaryOp::Add, Signed | Unsigned | Float) => &[Add],
        (BinaryOp::Sub, Signed | Unsigned | Float) => &[Sub],
        (BinaryOp::Mul, Signed | Unsigned | Float) => &[Mul],
        (BinaryOp::Div, Signed | Float) => &[Div],
        (BinaryOp::Div, Unsigned) => &[Div_Un],
        (BinaryOp::Rem, Signed | Float) => &[Rem],
        (BinaryOp::Rem, Unsigned) => &[Rem_Un],

        (BinaryOp::BitAnd, Signed | Unsigned | Bool) => &[And],
        (BinaryOp::BitOr, Signed | Unsigned | Bool) => &[Or],
        (BinaryOp::BitXor, Signed | Unsigned | Bool) => &[Xor],
        (BinaryOp::Shl, Signed | Unsigned) => &[Shl],
        (BinaryOp::Shr, Signed) => &[Shr],
        (BinaryOp::Shr | BinaryOp::UShr, Unsigned) | (BinaryOp::UShr, Signed) => &[Shr_Un],

        (BinaryOp::Eq, Signed | Unsigned | Float | Bool | String | Reference) => &[Ceq],
        (BinaryOp::Ne, Signed | Unsigned | Float | Bool | String | Reference) => &[Ceq, Ldc_I4_0, Ceq],
        (BinaryOp::Lt, Signed | Float) => &[Clt],
        (BinaryOp::Lt, Unsigned) => &[Clt_Un],
        (BinaryOp::Gt, Signed | Float) => &[Cgt],
        (BinaryOp::Gt, Unsigned) => &[Cgt_Un],
        // `a <= b` is `!(a > b)`; for floats the unordered compare keeps NaN
        // operands false.
        (BinaryOp::Le, Signed) => &[Cgt, Ldc_I4_0, Ceq],
        (BinaryOp::Le, Unsigned | Float) => &[Cgt_Un, Ldc_I4_0, Ceq],
        (BinaryOp::Ge, Signed) => &[Clt, Ldc_I4_0, Ceq],
        (BinaryOp::Ge, Unsigned | Float) => &[Clt_Un, Ldc_I4_0, Ceq],

        _ => return None,
    };
    Some(ops)
}

/// Resolve `left op right` on the operands' converted types.
///
/// The class of the left operand decides the rule: the semantic model has
/// already converted both sides to a common type, except for shifts, whose
/// right operand is always `int`.
pub fn resolve_binary(
    op: BinaryOp,
    left: &SemanticType,
    right: &SemanticType,
    span: Span,
) -> Result<OperatorResolution, LoweringError> {
    let no_rule = || LoweringError::UnsupportedOperator {
        op: op.to_string(),
        left: left.to_string(),
        right: right.to_string(),
        span,
    };

    if op == BinaryOp::Add && (left.is_string() || right.is_string()) {
        return Ok(OperatorResolution::StringConcat {
            boxed: !(left.is_string() && right.is_string()),
        });
    }
    if left.is_string() && right.is_string() {
        return match op {
            BinaryOp::Eq => Ok(OperatorResolution::StringEquality { negate: false }),
            BinaryOp::Ne => Ok(OperatorResolution::StringEquality { negate: true }),
            _ => Err(no_rule()),
        };
    }
    if op.is_short_circuit() {
        return Err(no_rule());
    }

    let class = OperandClass::of(left);
    // Mixed classes only make sense for shifts (`long << int`) and for
    // reference equality against `null`.
    let right_class = OperandClass::of(right);
    let is_shift = matches!(op, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr);
    let against_null = matches!(op, BinaryOp::Eq | BinaryOp::Ne)
        && (matches!(right, SemanticType::Null) || matches!(left, SemanticType::Null));
    let compatible = class == right_class
        || (is_shift && class.is_integral() && right_class.is_integral())
        || against_null;
    if !compatible {
        return Err(no_rule());
    }

    binary_rule(op, class)
        .map(OperatorResolution::Primitive)
        .ok_or_else(no_rule)
}
