//! For loops.

use ilweave_syntax::ast::{ForInit, ForStmt};

use crate::bytecode::OpCode;

use super::{Result, StmtCompiler};

impl<'a, 'm> StmtCompiler<'a, 'm> {
    /// Compile a for loop. Locals declared by the initializer are scoped to
    /// the loop.
    ///
    /// Layout:
    /// ```text
    /// [initializers]
    /// br test
    /// [body]
    /// [body statement]
    /// [continue]      <- continue
    /// [updates]
    /// [test]
    /// [condition]
    /// brtrue body     (br body without a condition)
    /// [end]           <- break
    /// ```
    pub fn compile_for(&mut self, stmt: &ForStmt<'_>) -> Result<()> {
        self.scoped(|this| {
            match stmt.init {
                Some(ForInit::LocalDecl(decl)) => this.compile_local_decl(decl)?,
                Some(ForInit::Exprs(exprs)) => {
                    for expr in exprs {
                        this.expr_compiler().lower_discard(expr)?;
                    }
                }
                None => {}
            }

            let body = this.emitter.new_label("body");
            let next = this.emitter.new_label("continue");
            let test = this.emitter.new_label("test");
            let end = this.emitter.new_label("end");

            this.emitter.emit_branch(OpCode::Br, test);
            this.place(body)?;
            this.compile_loop_body(stmt.body, end, next)?;
            this.place(next)?;
            for update in stmt.update {
                this.expr_compiler().lower_discard(update)?;
            }
            this.place(test)?;
            match stmt.condition {
                Some(condition) => this.branch_on(condition, true, body)?,
                None => {
                    this.emitter.emit_branch(OpCode::Br, body);
                }
            }
            this.place(end)
        })
    }
}
