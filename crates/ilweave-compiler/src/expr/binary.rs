//! Binary operators.
//!
//! `&&`, `||` and `??` need branches; user-defined operators are plain calls
//! to the bound method; everything else goes through the operator tables in
//! [`crate::operators`] on the operands' converted types.

use ilweave_core::{LoweringError, Operation};
use ilweave_syntax::ast::{BinaryExpr, BinaryOp};

use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::operators::{resolve_binary, OperatorResolution};
use crate::type_resolver::well_known;

use super::ExprCompiler;

type Result<T> = std::result::Result<T, LoweringError>;

pub fn compile_binary(compiler: &mut ExprCompiler<'_, '_>, bin: &BinaryExpr<'_>) -> Result<()> {
    let span = bin.span;

    if let Some(Operation::UserDefinedOperator { method }) = compiler.ctx().model().operation(bin.id) {
        let method = *method;
        compiler.lower(bin.left)?;
        compiler.lower(bin.right)?;
        let target = compiler.ctx().method_ref_of(method, span)?;
        compiler.emitter().emit_method(OpCode::Call, target);
        return Ok(());
    }

    match bin.op {
        BinaryOp::LogicalAnd => compile_short_circuit(compiler, bin, false),
        BinaryOp::LogicalOr => compile_short_circuit(compiler, bin, true),
        BinaryOp::Coalesce => compile_coalesce(compiler, bin),
        op => {
            let left = compiler.converted_type(bin.left)?;
            let right = compiler.converted_type(bin.right)?;
            // Concatenation operands are usually converted to object already;
            // classify on what they were before that.
            let result = compiler.ctx().type_info(bin.id, span)?.ty;
            let resolution = if op == BinaryOp::Add && result.is_string() {
                let static_left = compiler.static_type(bin.left)?;
                let static_right = compiler.static_type(bin.right)?;
                resolve_binary(op, &static_left, &static_right, span)?
            } else {
                resolve_binary(op, &left, &right, span)?
            };
            let boxed = matches!(resolution, OperatorResolution::StringConcat { boxed: true });

            compiler.lower(bin.left)?;
            if boxed {
                compiler.box_if_value(&left, span)?;
            }
            compiler.lower(bin.right)?;
            if boxed {
                compiler.box_if_value(&right, span)?;
            }
            emit_operator(compiler, &resolution);
            Ok(())
        }
    }
}

/// Emit a resolved operator; both operands are on the stack.
pub(super) fn emit_operator(compiler: &mut ExprCompiler<'_, '_>, resolution: &OperatorResolution) {
    match resolution {
        OperatorResolution::Primitive(ops) => {
            for op in ops.iter() {
                compiler.emitter().emit(*op);
            }
        }
        OperatorResolution::StringConcat { boxed } => {
            let param = if *boxed { well_known::object() } else { well_known::string() };
            let concat = LoweringContext::runtime_method(
                well_known::string(),
                "Concat",
                vec![param.clone(), param],
                Some(well_known::string()),
                false,
            );
            compiler.emitter().emit_method(OpCode::Call, concat);
        }
        OperatorResolution::StringEquality { negate } => {
            let name = if *negate { "op_Inequality" } else { "op_Equality" };
            let method = LoweringContext::runtime_method(
                well_known::string(),
                name,
                vec![well_known::string(), well_known::string()],
                Some(well_known::boolean()),
                false,
            );
            compiler.emitter().emit_method(OpCode::Call, method);
        }
    }
}

/// `a && b` / `a || b`, producing `0` or `1`.
///
/// ```text
///   a; brfalse false      (brtrue true for ||)
///   b; brfalse false
///   ldc.i4.1; br end
/// [false]
///   ldc.i4.0
/// [end]
/// ```
fn compile_short_circuit(compiler: &mut ExprCompiler<'_, '_>, bin: &BinaryExpr<'_>, is_or: bool) -> Result<()> {
    let short = compiler.emitter().new_label(if is_or { "or.true" } else { "and.false" });
    let end = compiler.emitter().new_label(if is_or { "or.end" } else { "and.end" });
    let skip = if is_or { OpCode::Brtrue } else { OpCode::Brfalse };

    compiler.lower(bin.left)?;
    compiler.emitter().emit_branch(skip, short);
    compiler.lower(bin.right)?;

    let emitter = compiler.emitter();
    emitter.emit_branch(skip, short);
    emitter.emit_bool(!is_or);
    emitter.emit_branch(OpCode::Br, end);
    emitter.place(short)?;
    emitter.emit_bool(is_or);
    emitter.place(end)?;
    Ok(())
}

/// `a ?? b`: `a; dup; brtrue end; pop; b; [end]`.
fn compile_coalesce(compiler: &mut ExprCompiler<'_, '_>, bin: &BinaryExpr<'_>) -> Result<()> {
    let end = compiler.emitter().new_label("coalesce.end");
    compiler.lower(bin.left)?;
    let emitter = compiler.emitter();
    emitter.emit(OpCode::Dup);
    emitter.emit_branch(OpCode::Brtrue, end);
    emitter.emit(OpCode::Pop);
    compiler.lower(bin.right)?;
    compiler.emitter().place(end)?;
    Ok(())
}
