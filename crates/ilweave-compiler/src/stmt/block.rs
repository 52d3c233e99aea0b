//! Block statements.

use ilweave_syntax::ast::Block;

use super::{Result, StmtCompiler};

impl<'a, 'm> StmtCompiler<'a, 'm> {
    /// Compile a block. Its locals live in a frame of their own, so sibling
    /// blocks may declare the same names.
    pub fn compile_block(&mut self, block: &Block<'_>) -> Result<()> {
        self.scoped(|this| this.compile_stmts(block))
    }

    /// Compile the statements of `block` in the current frame.
    pub(crate) fn compile_stmts(&mut self, block: &Block<'_>) -> Result<()> {
        for stmt in block.stmts {
            self.compile(stmt)?;
        }
        Ok(())
    }
}
