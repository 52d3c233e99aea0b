//! Try/catch/finally statements.
//!
//! Each catch clause becomes one handler entry over the try block; the
//! handlers are contiguous, so each one ends where the next begins. A
//! finally clause protects the try block and every catch handler. All exits
//! from protected code are `leave`s to the label after the construct.
//!
//! Handler entries are added once the construct is complete, after any
//! entries of nested constructs.

use ilweave_syntax::ast::{CatchClause, TryStmt};

use crate::bytecode::{HandlerKind, Label, OpCode};
use crate::emit::PendingHandler;
use crate::type_resolver::{well_known, TypeExpr};

use super::{Result, StmtCompiler};

impl<'a, 'm> StmtCompiler<'a, 'm> {
    /// Compile a try statement.
    ///
    /// Layout:
    /// ```text
    /// [try.start]
    /// [try block]
    /// leave end
    /// [catch]                     (per clause)
    /// stloc var | pop
    /// [catch block]
    /// leave end
    /// [finally]
    /// [finally block]
    /// endfinally
    /// [end]
    /// ```
    pub fn compile_try(&mut self, stmt: &TryStmt<'_>) -> Result<()> {
        if let Some(filtered) = stmt.catches.iter().find(|c| c.filter.is_some()) {
            return Err(ilweave_core::LoweringError::unsupported("exception filter", filtered.span));
        }

        let try_start = self.emitter.new_label("try.start");
        let end = self.emitter.new_label("end");
        let finally = match stmt.finally {
            Some(_) => Some(self.emitter.new_label("finally")),
            None => None,
        };
        let handlers_end = finally.unwrap_or(end);
        let catch_labels: Vec<Label> = stmt
            .catches
            .iter()
            .map(|_| self.emitter.new_label("catch"))
            .collect();

        self.place(try_start)?;
        self.protected(|this| {
            this.compile_block(&stmt.body)?;
            this.leave_to(end);
            Ok(())
        })?;

        let mut entries = Vec::with_capacity(stmt.catches.len() + 1);
        for (index, clause) in stmt.catches.iter().enumerate() {
            let start = catch_labels[index];
            let handler_end = catch_labels.get(index + 1).copied().unwrap_or(handlers_end);
            self.place(start)?;
            let catch_type = self.compile_catch(clause, end)?;
            entries.push(PendingHandler {
                kind: HandlerKind::Catch,
                try_start,
                try_end: catch_labels[0],
                handler_start: start,
                handler_end,
                catch_type: Some(catch_type),
            });
        }

        if let (Some(label), Some(block)) = (finally, stmt.finally) {
            self.place(label)?;
            self.protected(|this| {
                this.compile_block(&block)?;
                this.emitter.emit(OpCode::Endfinally);
                Ok(())
            })?;
            entries.push(PendingHandler {
                kind: HandlerKind::Finally,
                try_start,
                try_end: label,
                handler_start: label,
                handler_end: end,
                catch_type: None,
            });
        }

        for entry in entries {
            self.emitter.add_handler(entry);
        }
        self.place(end)
    }

    /// Lower one catch handler and return the caught type.
    fn compile_catch(&mut self, clause: &CatchClause<'_>, end: Label) -> Result<TypeExpr> {
        let span = clause.span;
        let catch_type = match clause.ty {
            Some(ty) => {
                let mut exprs = self.expr_compiler();
                let semantic = exprs.static_type_of(ty.id, ty.span)?;
                exprs.resolve(&semantic, span)?.expr
            }
            None => well_known::object(),
        };

        self.protected(|this| {
            this.scoped(|this| {
                // The handler starts with the exception object on the stack.
                match clause.var {
                    Some(var) => {
                        let what = format!("catch variable '{}'", var.name);
                        let symbol = this.ctx.declared(clause.id, &what, span)?;
                        let slot = this.expr_compiler().declare_local(symbol, span)?;
                        this.emitter.stloc(slot);
                    }
                    None => {
                        this.emitter.emit(OpCode::Pop);
                    }
                }
                this.compile_stmts(&clause.body)
            })?;
            this.leave_to(end);
            Ok(())
        })?;
        Ok(catch_type)
    }

    /// Run `f` one protected-region level deeper.
    fn protected(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.emitter.enter_region();
        let result = f(self);
        self.emitter.exit_region();
        result
    }

    /// `leave target` unless control already left.
    fn leave_to(&mut self, target: Label) {
        if self.falls_through() {
            self.emitter.emit_branch(OpCode::Leave, target);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bytecode::{verify_body, HandlerKind};
    use crate::testing::{stmt_body, stmt_body_with};
    use bumpalo::Bump;
    use ilweave_core::{SemanticType, TypeKind};
    use ilweave_syntax::ast::CatchClause;
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn catches_chain_and_finally_covers_everything() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let app = b.imported_type("Demo", "App", TypeKind::Class);
        let work = b.method_symbol(&app, "Work", &[], SemanticType::VOID, true);
        let log = b.method_symbol(&app, "Log", &[("e", SemanticType::OBJECT)], SemanticType::VOID, true);
        let io = b.imported_type("System.IO", "IOException", TypeKind::Class);
        let any = b.imported_type("System", "Exception", TypeKind::Class);
        let e = b.local_symbol("e", io.clone());

        let call = b.call(work, None, &[]);
        let call = b.expr_stmt(call);
        let body = b.block_of(&[call]);
        let read = b.ident(e);
        let logged = b.call(log, None, &[read]);
        let logged = b.expr_stmt(logged);
        let first_body = b.block_of(&[logged]);
        let first = b.catch(Some(io), Some(e), first_body);
        let second_body = b.block_of(&[]);
        let second = b.catch(Some(any), None, second_body);
        let cleanup = b.call(work, None, &[]);
        let cleanup = b.expr_stmt(cleanup);
        let finally = b.block_of(&[cleanup]);
        let stmt = b.try_(body, &[first, second], Some(finally));
        let model = b.finish();

        let body = stmt_body(&model, &[stmt]);
        assert_eq!(
            body.listing(),
            vec![
                "[try.start]",
                "call Import(Import(\"Demo.App\"), \"Work\")",
                "leave end",
                "[catch]",
                "stloc e",
                "ldloc e",
                "call Import(Import(\"Demo.App\"), \"Log\")",
                "leave end",
                "[catch]",
                "pop",
                "leave end",
                "[finally]",
                "call Import(Import(\"Demo.App\"), \"Work\")",
                "endfinally",
                "[end]",
                "ret"
            ]
        );

        let handlers = &body.handlers;
        assert_eq!(handlers.len(), 3);
        assert!(handlers.iter().all(|h| h.is_ordered()));
        assert_eq!(handlers[0].handler_end, handlers[1].handler_start);
        assert_eq!(handlers[1].handler_end, handlers[2].handler_start);
        assert_eq!(handlers[2].kind, HandlerKind::Finally);
        assert_eq!(handlers[2].try_start, handlers[0].try_start);
        assert_eq!(handlers[2].try_end, handlers[1].handler_end);
        assert_eq!(
            handlers[0].catch_type.as_ref().map(|t| t.to_string()),
            Some("Import(\"System.IO.IOException\")".to_string())
        );
        verify_body(&body).unwrap();
    }

    #[test]
    fn return_inside_try_leaves_through_the_epilogue() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let one = b.int(1);
        let ret = b.ret(Some(one));
        let body = b.block_of(&[ret]);
        let finally = b.block_of(&[]);
        let stmt = b.try_(body, &[], Some(finally));
        let two = b.int(2);
        let after = b.ret(Some(two));
        let model = b.finish();

        let body = stmt_body_with(&model, true, &[stmt, after]);
        assert_eq!(
            body.listing(),
            vec![
                "[try.start]",
                "ldc.i4.1",
                "stloc ret",
                "leave return",
                "[finally]",
                "endfinally",
                "[end]",
                "ldc.i4.2",
                "ret",
                "[return]",
                "ldloc ret",
                "ret"
            ]
        );
        verify_body(&body).unwrap();
    }

    #[test]
    fn nested_handlers_come_first() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let any = b.imported_type("System", "Exception", TypeKind::Class);
        let inner_body = b.block_of(&[]);
        let inner_finally = b.block_of(&[]);
        let inner = b.try_(inner_body, &[], Some(inner_finally));
        let outer_body = b.block_of(&[inner]);
        let handler = b.block_of(&[]);
        let catch = b.catch(Some(any), None, handler);
        let outer = b.try_(outer_body, &[catch], None);
        let model = b.finish();

        let body = stmt_body(&model, &[outer]);
        assert_eq!(body.handlers[0].kind, HandlerKind::Finally);
        assert_eq!(body.handlers[1].kind, HandlerKind::Catch);
        assert!(body.handlers[0].try_start >= body.handlers[1].try_start);
        verify_body(&body).unwrap();
    }

    #[test]
    fn exception_filters_are_gaps() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let flag = b.bool(true);
        let handler = b.block_of(&[]);
        let clause = b.catch(None, None, handler);
        let clause = CatchClause {
            filter: Some(flag),
            ..clause
        };
        let body = b.block_of(&[]);
        let stmt = b.try_(body, &[clause], None);
        let model = b.finish();

        let listing = stmt_body(&model, &[stmt]).listing();
        assert_eq!(listing.len(), 2);
        assert!(listing[0].contains("exception filter"));
        assert_eq!(listing[1], "ret");
    }
}
