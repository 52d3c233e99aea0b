//! Do-while loops.

use ilweave_syntax::ast::DoWhileStmt;

use super::{Result, StmtCompiler};

impl<'a, 'm> StmtCompiler<'a, 'm> {
    /// Compile a do-while loop: the body runs once before the first test.
    ///
    /// Layout:
    /// ```text
    /// [body]
    /// [body statement]
    /// [test]          <- continue
    /// [condition]
    /// brtrue body
    /// [end]           <- break
    /// ```
    pub fn compile_do_while(&mut self, stmt: &DoWhileStmt<'_>) -> Result<()> {
        let body = self.emitter.new_label("body");
        let test = self.emitter.new_label("test");
        let end = self.emitter.new_label("end");

        self.place(body)?;
        self.compile_loop_body(stmt.body, end, test)?;
        self.place(test)?;
        self.branch_on(stmt.condition, true, body)?;
        self.place(end)
    }
}
