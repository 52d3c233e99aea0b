//! Casts, type tests and `typeof`.

use ilweave_core::LoweringError;
use ilweave_syntax::ast::{CastExpr, TypeOfExpr, TypeTestExpr};

use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::type_resolver::well_known;

use super::ExprCompiler;

type Result<T> = std::result::Result<T, LoweringError>;

/// `(T)x`. The conversion to `T` is recorded on the operand, so lowering the
/// operand in its context already produces the cast.
pub fn compile_cast(compiler: &mut ExprCompiler<'_, '_>, cast: &CastExpr<'_>) -> Result<()> {
    compiler.lower(cast.operand)
}

/// `x is T`: `isinst T` compared against null.
pub fn compile_is(compiler: &mut ExprCompiler<'_, '_>, test: &TypeTestExpr<'_>) -> Result<()> {
    lower_isinst(compiler, test)?;
    let emitter = compiler.emitter();
    emitter.emit_null();
    emitter.emit(OpCode::Cgt_Un);
    Ok(())
}

/// `x as T`: `isinst T`, null on failure.
pub fn compile_as(compiler: &mut ExprCompiler<'_, '_>, test: &TypeTestExpr<'_>) -> Result<()> {
    lower_isinst(compiler, test)
}

fn lower_isinst(compiler: &mut ExprCompiler<'_, '_>, test: &TypeTestExpr<'_>) -> Result<()> {
    let span = test.span;
    let target = compiler.static_type_of(test.ty.id, span)?;
    let operand = compiler.converted_type(test.operand)?;
    let resolved = compiler.resolve(&target, span)?;

    compiler.lower(test.operand)?;
    compiler.box_if_value(&operand, span)?;
    compiler.emitter().emit_type(OpCode::Isinst, resolved.expr);
    Ok(())
}

/// `typeof(T)`: the runtime handle of `T` turned into a type object.
pub fn compile_typeof(compiler: &mut ExprCompiler<'_, '_>, type_of: &TypeOfExpr<'_>) -> Result<()> {
    let span = type_of.span;
    let target = compiler.static_type_of(type_of.ty.id, span)?;
    let resolved = compiler.resolve(&target, span)?;
    let from_handle = LoweringContext::runtime_method(
        well_known::system_type(),
        "GetTypeFromHandle",
        vec![well_known::runtime_type_handle()],
        Some(well_known::system_type()),
        false,
    );
    let emitter = compiler.emitter();
    emitter.emit_type(OpCode::Ldtoken, resolved.expr);
    emitter.emit_method(OpCode::Call, from_handle);
    Ok(())
}
