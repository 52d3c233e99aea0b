//! Prefix and postfix operators.

use ilweave_core::{LoweringError, Operation};
use ilweave_syntax::ast::{PostfixExpr, PostfixOp, UnaryExpr, UnaryOp};

use crate::bytecode::OpCode;
use crate::operators::{resolve_unary, UnaryResolution};

use super::{assignment, ExprCompiler};

type Result<T> = std::result::Result<T, LoweringError>;

/// Lower a prefix operator. `keep` only matters for `++x`/`--x`, which
/// leave nothing when their value is discarded.
pub fn compile_unary(compiler: &mut ExprCompiler<'_, '_>, un: &UnaryExpr<'_>, keep: bool) -> Result<()> {
    let span = un.span;
    match un.op {
        UnaryOp::PreInc | UnaryOp::PreDec => {
            return assignment::compile_increment(
                compiler,
                un.operand,
                un.op == UnaryOp::PreDec,
                true,
                keep,
                span,
            );
        }
        UnaryOp::AddressOf => return compiler.lower_address(un.operand),
        _ => {}
    }

    if let Some(Operation::UserDefinedOperator { method }) = compiler.ctx().model().operation(un.id) {
        let method = *method;
        compiler.lower(un.operand)?;
        let target = compiler.ctx().method_ref_of(method, span)?;
        compiler.emitter().emit_method(OpCode::Call, target);
        return Ok(());
    }

    let operand = compiler.converted_type(un.operand)?;
    let resolution = resolve_unary(un.op, &operand, span)?;
    compiler.lower(un.operand)?;
    if let UnaryResolution::Primitive(ops) = resolution {
        for op in ops {
            compiler.emitter().emit(*op);
        }
    }
    Ok(())
}

/// `x++` / `x--`: the old value is the result.
pub fn compile_postfix(compiler: &mut ExprCompiler<'_, '_>, postfix: &PostfixExpr<'_>, keep: bool) -> Result<()> {
    assignment::compile_increment(
        compiler,
        postfix.operand,
        postfix.op == PostfixOp::PostDec,
        false,
        keep,
        postfix.span,
    )
}
