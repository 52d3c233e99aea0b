//! Statement lowering.
//!
//! The [`StmtCompiler`] translates statements into control flow over the
//! body's instruction list and hands every nested expression to an
//! [`ExprCompiler`] sharing the same context and emitter.
//!
//! Each statement kind has its own module:
//! - `block`: blocks and the frames their locals live in
//! - `var_decl`: local declarations
//! - `if_stmt`, `while_stmt`, `do_while_stmt`, `for_stmt`: branches and loops
//! - `foreach_stmt`: arrays and the enumerator protocol
//! - `switch_stmt`: compare-and-branch chains over a spilled selector
//! - `try_catch`: protected regions and their handler entries
//! - `return_stmt`: `return` and `throw`
//!
//! A statement that turns out to be unsupported is rolled back to where it
//! started and replaced by a comment; its siblings are still lowered.

mod block;
mod do_while_stmt;
mod for_stmt;
mod foreach_stmt;
mod if_stmt;
mod return_stmt;
mod switch_stmt;
mod try_catch;
mod var_decl;
mod while_stmt;

use ilweave_core::LoweringError;
use ilweave_syntax::ast::{BreakStmt, ContinueStmt, Expr, ExprStmt, Stmt};
use tracing::trace;

use crate::bytecode::{Label, OpCode};
use crate::context::LoweringContext;
use crate::emit::BodyEmitter;
use crate::expr::ExprCompiler;

type Result<T> = std::result::Result<T, LoweringError>;

/// Lowers the statements of one method body.
pub struct StmtCompiler<'a, 'm> {
    ctx: &'a mut LoweringContext<'m>,
    emitter: &'a mut BodyEmitter,
}

impl<'a, 'm> StmtCompiler<'a, 'm> {
    pub fn new(ctx: &'a mut LoweringContext<'m>, emitter: &'a mut BodyEmitter) -> Self {
        Self { ctx, emitter }
    }

    /// Compile a statement.
    ///
    /// Unsupported constructs anywhere inside `stmt` that no nested
    /// statement recovered from are recorded, and the partial code is
    /// replaced by a comment. Everything else propagates.
    pub fn compile(&mut self, stmt: &Stmt<'_>) -> Result<()> {
        let checkpoint = self.emitter.checkpoint();
        let mark = self.ctx.defs.mark();
        let previous = self.emitter.set_span(stmt.span());

        let result = self.compile_kind(stmt);
        self.emitter.restore_span(previous);

        if let Some(gap) = self.ctx.recover(result)? {
            self.emitter.rollback(checkpoint);
            self.ctx.defs.restore(mark);
            if self.ctx.options.inline_diagnostics {
                self.emitter.emit_comment(gap.to_string());
            }
        }
        Ok(())
    }

    fn compile_kind(&mut self, stmt: &Stmt<'_>) -> Result<()> {
        match stmt {
            Stmt::Expr(expr_stmt) => self.compile_expr_stmt(expr_stmt),
            Stmt::LocalDecl(decl) => self.compile_local_decl(decl),
            Stmt::Return(ret) => self.compile_return(ret),
            Stmt::Break(brk) => self.compile_break(brk),
            Stmt::Continue(cont) => self.compile_continue(cont),
            Stmt::Block(block) => self.compile_block(block),
            Stmt::If(if_stmt) => self.compile_if(if_stmt),
            Stmt::While(while_stmt) => self.compile_while(while_stmt),
            Stmt::DoWhile(do_while) => self.compile_do_while(do_while),
            Stmt::For(for_stmt) => self.compile_for(for_stmt),
            Stmt::Foreach(foreach) => self.compile_foreach(foreach),
            Stmt::Switch(switch) => self.compile_switch(switch),
            Stmt::Try(try_stmt) => self.compile_try(try_stmt),
            Stmt::Throw(throw) => self.compile_throw(throw),
            Stmt::Lock(_) | Stmt::Yield(_) | Stmt::Goto(_) | Stmt::LocalFunction(_) => {
                Err(LoweringError::unsupported(stmt.kind_name(), stmt.span()))
            }
        }
    }

    /// Compile an expression statement. The value, if any, is discarded.
    pub fn compile_expr_stmt(&mut self, stmt: &ExprStmt<'_>) -> Result<()> {
        match stmt.expr {
            Some(expr) => self.expr_compiler().lower_discard(expr),
            None => Ok(()),
        }
    }

    pub fn compile_break(&mut self, stmt: &BreakStmt) -> Result<()> {
        self.emitter.emit_break(stmt.span)?;
        Ok(())
    }

    pub fn compile_continue(&mut self, stmt: &ContinueStmt) -> Result<()> {
        self.emitter.emit_continue(stmt.span)?;
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// An expression compiler over the same context and emitter.
    pub(crate) fn expr_compiler(&mut self) -> ExprCompiler<'_, 'm> {
        ExprCompiler::new(self.ctx, self.emitter)
    }

    pub fn ctx(&mut self) -> &mut LoweringContext<'m> {
        self.ctx
    }

    pub fn emitter(&mut self) -> &mut BodyEmitter {
        self.emitter
    }

    /// Run `f` inside a fresh frame of the active scope; the frame is popped
    /// on every exit path.
    fn scoped(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let mark = self.ctx.defs.push_frame();
        let result = f(self);
        self.ctx.defs.restore(mark);
        result
    }

    /// Compile a loop body with `break` and `continue` bound.
    fn compile_loop_body(&mut self, body: &Stmt<'_>, break_label: Label, continue_label: Label) -> Result<()> {
        self.emitter.enter_loop(break_label, continue_label);
        let result = self.compile(body);
        self.emitter.exit_breakable();
        result
    }

    /// Lower a condition and branch to `target` when it is `jump_if`.
    fn branch_on(&mut self, condition: &Expr<'_>, jump_if: bool, target: Label) -> Result<()> {
        self.expr_compiler().lower(condition)?;
        let op = if jump_if { OpCode::Brtrue } else { OpCode::Brfalse };
        self.emitter.emit_branch(op, target);
        Ok(())
    }

    fn place(&mut self, label: Label) -> Result<()> {
        trace!(label = %self.emitter.label_name(label), "placing label");
        self.emitter.place(label)
    }

    /// Whether control can reach the end of what was emitted so far.
    fn falls_through(&self) -> bool {
        !self.emitter.ends_with_terminator()
    }
}
