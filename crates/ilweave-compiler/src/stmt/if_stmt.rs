//! If/else statements.

use ilweave_syntax::ast::IfStmt;

use crate::bytecode::OpCode;

use super::{Result, StmtCompiler};

impl<'a, 'm> StmtCompiler<'a, 'm> {
    /// Compile an if statement.
    ///
    /// Layout:
    /// ```text
    /// [condition]
    /// brfalse else
    /// [then]
    /// br end          (only when `then` can complete normally)
    /// [else]
    /// [else branch]
    /// [end]
    /// ```
    /// Without an else branch the false edge goes straight to `end`.
    pub fn compile_if(&mut self, stmt: &IfStmt<'_>) -> Result<()> {
        let end = self.emitter.new_label("end");

        let Some(else_stmt) = stmt.else_stmt else {
            self.branch_on(stmt.condition, false, end)?;
            self.compile(stmt.then_stmt)?;
            return self.place(end);
        };

        let else_label = self.emitter.new_label("else");
        self.branch_on(stmt.condition, false, else_label)?;
        self.compile(stmt.then_stmt)?;
        let then_falls_through = self.falls_through();
        if then_falls_through {
            self.emitter.emit_branch(OpCode::Br, end);
        }
        self.place(else_label)?;
        self.compile(else_stmt)?;
        if then_falls_through {
            self.place(end)?;
        }
        Ok(())
    }
}
