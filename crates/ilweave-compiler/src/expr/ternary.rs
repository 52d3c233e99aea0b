//! `c ? a : b`.

use ilweave_core::LoweringError;
use ilweave_syntax::ast::ConditionalExpr;

use crate::bytecode::OpCode;

use super::ExprCompiler;

type Result<T> = std::result::Result<T, LoweringError>;

/// ```text
///   c; brfalse else
///   a; br end
/// [else]
///   b
/// [end]
/// ```
pub fn compile_conditional(compiler: &mut ExprCompiler<'_, '_>, cond: &ConditionalExpr<'_>) -> Result<()> {
    let else_label = compiler.emitter().new_label("cond.else");
    let end = compiler.emitter().new_label("cond.end");

    compiler.lower(cond.condition)?;
    compiler.emitter().emit_branch(OpCode::Brfalse, else_label);
    compiler.lower(cond.then_expr)?;
    compiler.emitter().emit_branch(OpCode::Br, end);
    compiler.emitter().place(else_label)?;
    compiler.lower(cond.else_expr)?;
    compiler.emitter().place(end)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::testing::{body_listing, declare_test_local};
    use bumpalo::Bump;
    use ilweave_core::SemanticType;
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn branches_join_at_end() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let flag = b.local_symbol("flag", SemanticType::BOOL);
        let cond = b.ident(flag);
        let (one, two) = (b.int(1), b.int(2));
        let pick = b.conditional(cond, one, two, SemanticType::INT32);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, flag)?;
            c.lower_discard(pick)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc flag",
                "brfalse cond.else",
                "ldc.i4.1",
                "br cond.end",
                "[cond.else]",
                "ldc.i4.2",
                "[cond.end]",
                "pop",
                "ret"
            ]
        );
    }
}
