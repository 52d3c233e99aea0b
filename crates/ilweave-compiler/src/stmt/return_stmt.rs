//! Return and throw statements.

use ilweave_syntax::ast::{ReturnStmt, ThrowStmt};

use crate::bytecode::OpCode;

use super::{Result, StmtCompiler};

impl<'a, 'm> StmtCompiler<'a, 'm> {
    /// Compile a return statement. Inside a protected region the value is
    /// parked in the return local and control leaves to the shared epilogue.
    pub fn compile_return(&mut self, stmt: &ReturnStmt<'_>) -> Result<()> {
        if let Some(value) = stmt.value {
            self.expr_compiler().lower(value)?;
        }
        self.emitter.emit_return();
        Ok(())
    }

    /// `throw e;`, or `throw;` inside a catch handler.
    pub fn compile_throw(&mut self, stmt: &ThrowStmt<'_>) -> Result<()> {
        match stmt.value {
            Some(value) => {
                self.expr_compiler().lower(value)?;
                self.emitter.emit(OpCode::Throw);
            }
            None => {
                self.emitter.emit(OpCode::Rethrow);
            }
        }
        Ok(())
    }
}
