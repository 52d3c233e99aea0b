//! Helpers shared by the unit tests of the expression and statement
//! compilers.

use ilweave_core::{LoweringError, MemberKind, SemanticTable, Span, SymbolId};
use ilweave_syntax::ast::Stmt;

use crate::bytecode::MethodBody;
use crate::context::LoweringContext;
use crate::definitions::DefinitionVariable;
use crate::emit::BodyEmitter;
use crate::expr::ExprCompiler;
use crate::options::LoweringOptions;
use crate::stmt::StmtCompiler;

/// Run `f` against a fresh body, terminate it with `ret` and return the
/// listing.
pub(crate) fn body_listing(
    model: &SemanticTable,
    returns_value: bool,
    f: impl FnOnce(&mut ExprCompiler<'_, '_>) -> Result<(), LoweringError>,
) -> Vec<String> {
    let mut ctx = LoweringContext::new(model, LoweringOptions::default());
    let mut emitter = BodyEmitter::new("m_Test_0", returns_value);
    {
        let mut compiler = ExprCompiler::new(&mut ctx, &mut emitter);
        f(&mut compiler).unwrap();
    }
    emitter.emit_return();
    emitter.finish().unwrap().listing()
}

/// Lower `stmts` as the body of a method and finish it, adding the
/// trailing `ret` when control falls off the end.
pub(crate) fn stmt_body_with(model: &SemanticTable, returns_value: bool, stmts: &[Stmt<'_>]) -> MethodBody {
    let mut ctx = LoweringContext::new(model, LoweringOptions::default());
    let mut emitter = BodyEmitter::new("m_Test_0", returns_value);
    {
        let mut compiler = StmtCompiler::new(&mut ctx, &mut emitter);
        for stmt in stmts {
            compiler.compile(stmt).unwrap();
        }
    }
    if !emitter.ends_with_terminator() {
        emitter.emit_return();
    }
    emitter.finish().unwrap()
}

pub(crate) fn stmt_body(model: &SemanticTable, stmts: &[Stmt<'_>]) -> MethodBody {
    stmt_body_with(model, false, stmts)
}

pub(crate) fn stmt_listing(model: &SemanticTable, stmts: &[Stmt<'_>]) -> Vec<String> {
    stmt_body(model, stmts).listing()
}

/// Declare the local `sym` in the innermost scope.
pub(crate) fn declare_test_local(compiler: &mut ExprCompiler<'_, '_>, sym: SymbolId) -> Result<u16, LoweringError> {
    let symbol = compiler.ctx().symbol(sym, Span::default())?;
    compiler.declare_local(symbol, Span::default())
}

/// Make the parameter `sym` visible at argument slot `slot`.
pub(crate) fn declare_test_param(compiler: &mut ExprCompiler<'_, '_>, sym: SymbolId, slot: u16) -> Result<(), LoweringError> {
    let ctx = compiler.ctx();
    let symbol = ctx.symbol(sym, Span::default())?;
    let scope = ctx.defs.frame_scope();
    let id = ctx.defs.register(
        DefinitionVariable::new(MemberKind::Parameter, scope, symbol.name.clone(), format!("A_{slot}"))
            .with_ordinal(slot),
    )?;
    ctx.defs.push_active(id);
    Ok(())
}
