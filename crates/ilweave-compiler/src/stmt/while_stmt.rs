//! While loops.

use ilweave_syntax::ast::WhileStmt;

use crate::bytecode::OpCode;

use super::{Result, StmtCompiler};

impl<'a, 'm> StmtCompiler<'a, 'm> {
    /// Compile a while loop with the test at the bottom.
    ///
    /// Layout:
    /// ```text
    /// br test
    /// [body]
    /// [body statement]
    /// [test]          <- continue
    /// [condition]
    /// brtrue body
    /// [end]           <- break
    /// ```
    pub fn compile_while(&mut self, stmt: &WhileStmt<'_>) -> Result<()> {
        let body = self.emitter.new_label("body");
        let test = self.emitter.new_label("test");
        let end = self.emitter.new_label("end");

        self.emitter.emit_branch(OpCode::Br, test);
        self.place(body)?;
        self.compile_loop_body(stmt.body, end, test)?;
        self.place(test)?;
        self.branch_on(stmt.condition, true, body)?;
        self.place(end)
    }
}

#[cfg(test)]
mod tests {
    use crate::bytecode::verify_body;
    use crate::testing::stmt_body;
    use bumpalo::Bump;
    use ilweave_core::SemanticType;
    use ilweave_syntax::ast::{BinaryOp, PostfixOp};
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn while_tests_at_the_bottom() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let i = b.local_symbol("i", SemanticType::INT32);
        let zero = b.int(0);
        let decl = b.local(i, Some(zero));
        let read = b.ident(i);
        let ten = b.int(10);
        let cond = b.binary(BinaryOp::Lt, read, ten, SemanticType::BOOL);
        let read = b.ident(i);
        let inc = b.postfix(PostfixOp::PostInc, read);
        let body = b.expr_stmt(inc);
        let stmt = b.while_(cond, body);
        let model = b.finish();

        let body = stmt_body(&model, &[decl, stmt]);
        assert_eq!(
            body.listing(),
            vec![
                "ldc.i4.0",
                "stloc i",
                "br test",
                "[body]",
                "ldloc i",
                "ldc.i4.1",
                "add",
                "stloc i",
                "[test]",
                "ldloc i",
                "ldc.i4.s 10",
                "clt",
                "brtrue body",
                "ret"
            ]
        );
        verify_body(&body).unwrap();
    }

    #[test]
    fn break_and_continue_target_end_and_test() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let go = b.local_symbol("go", SemanticType::BOOL);
        let decl = b.local(go, None);
        let cond = b.ident(go);
        let again = b.ident(go);
        let cont = b.cont();
        let skip = b.if_(again, cont, None);
        let brk = b.brk();
        let body = b.block(&[skip, brk]);
        let stmt = b.while_(cond, body);
        let model = b.finish();

        let body = stmt_body(&model, &[decl, stmt]);
        assert_eq!(
            body.listing(),
            vec![
                "br test",
                "[body]",
                "ldloc go",
                "brfalse end",
                "br test",
                "[end]",
                "br end",
                "[test]",
                "ldloc go",
                "brtrue body",
                "[end]",
                "ret"
            ]
        );
        verify_body(&body).unwrap();
    }
}
