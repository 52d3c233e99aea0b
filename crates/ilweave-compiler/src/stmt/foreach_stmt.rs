//! Foreach loops.
//!
//! Over a single-dimensional array the loop is an indexed `for` against the
//! array length. Over anything else the enumerator protocol bound by the
//! semantic model is used: `GetEnumerator()` once, then `MoveNext()` and
//! `Current` per iteration. A disposable enumerator is disposed in a
//! `finally` handler wrapped around the loop.

use ilweave_core::{ForEachInfo, LoweringError, Operation, SemanticType, Span, Symbol};
use ilweave_syntax::ast::ForeachStmt;

use crate::bytecode::{HandlerKind, OpCode};
use crate::emit::PendingHandler;
use crate::expr::call_opcode;
use crate::type_resolver::load_element;

use super::{Result, StmtCompiler};

impl<'a, 'm> StmtCompiler<'a, 'm> {
    pub fn compile_foreach(&mut self, stmt: &ForeachStmt<'_>) -> Result<()> {
        let collection = self.expr_compiler().static_type(stmt.collection)?;
        self.scoped(|this| match &collection {
            SemanticType::Array { element, rank: 1 } => this.compile_foreach_array(stmt, &collection, element),
            SemanticType::Array { .. } => Err(LoweringError::unsupported(
                "foreach over a multi-dimensional array",
                stmt.span,
            )),
            _ => this.compile_foreach_enumerator(stmt),
        })
    }

    /// Layout:
    /// ```text
    /// [collection]; stloc foreach.array
    /// ldc.i4.0; stloc foreach.index
    /// br test
    /// [body]
    /// ldloc foreach.array; ldloc foreach.index; ldelem; stloc var
    /// [body statement]
    /// [continue]      <- continue
    /// foreach.index += 1
    /// [test]
    /// ldloc foreach.index; ldloc foreach.array; ldlen; conv.i4; clt
    /// brtrue body
    /// [end]           <- break
    /// ```
    fn compile_foreach_array(
        &mut self,
        stmt: &ForeachStmt<'_>,
        array_ty: &SemanticType,
        element: &SemanticType,
    ) -> Result<()> {
        let span = stmt.span;
        let (array, index, element_expr) = {
            let mut exprs = self.expr_compiler();
            let array = exprs.temp("foreach.array", array_ty, span)?;
            exprs.lower(stmt.collection)?;
            exprs.emitter().stloc(array);
            let index = exprs.temp("foreach.index", &SemanticType::INT32, span)?;
            exprs.emitter().emit_i32(0);
            exprs.emitter().stloc(index);
            (array, index, exprs.resolve(element, span)?.expr)
        };
        let (variable, variable_ty) = self.declare_iteration_variable(stmt)?;

        let body = self.emitter.new_label("body");
        let next = self.emitter.new_label("continue");
        let test = self.emitter.new_label("test");
        let end = self.emitter.new_label("end");

        self.emitter.emit_branch(OpCode::Br, test);
        self.place(body)?;
        self.emitter.ldloc(array);
        self.emitter.ldloc(index);
        load_element(element, &element_expr).emit(self.emitter);
        self.store_iteration_value(variable, element, variable_ty, span)?;
        self.compile_loop_body(stmt.body, end, next)?;

        self.place(next)?;
        self.emitter.ldloc(index);
        self.emitter.emit_i32(1);
        self.emitter.emit(OpCode::Add);
        self.emitter.stloc(index);

        self.place(test)?;
        self.emitter.ldloc(index);
        self.emitter.ldloc(array);
        self.emitter.emit(OpCode::Ldlen);
        self.emitter.emit(OpCode::Conv_I4);
        self.emitter.emit(OpCode::Clt);
        self.emitter.emit_branch(OpCode::Brtrue, body);
        self.place(end)
    }

    /// Layout, with the `try`/`finally` only for disposable enumerators:
    /// ```text
    /// [collection]; call GetEnumerator; stloc foreach.enumerator
    /// [try.start]
    /// br test
    /// [body]
    /// [enumerator]; call get_Current; stloc var
    /// [body statement]
    /// [test]          <- continue
    /// [enumerator]; call MoveNext; brtrue body
    /// [loop.end]      <- break
    /// leave end
    /// [finally]
    /// ldloc foreach.enumerator; brfalse skip     (reference types only)
    /// [enumerator]; call Dispose
    /// [skip]
    /// endfinally
    /// [end]
    /// ```
    fn compile_foreach_enumerator(&mut self, stmt: &ForeachStmt<'_>) -> Result<()> {
        let span = stmt.span;
        let info = match self.ctx.model().operation(stmt.id) {
            Some(Operation::ForEach(info)) => info,
            _ => {
                return Err(LoweringError::UnresolvedSymbol {
                    what: "enumerator protocol of foreach".to_string(),
                    span,
                });
            }
        };
        let get_enumerator = self.ctx.symbol(info.get_enumerator, span)?;
        let move_next = self.ctx.symbol(info.move_next, span)?;
        let current = self.ctx.symbol(info.current, span)?;
        let dispose = info
            .dispose
            .map(|id| self.ctx.symbol(id, span))
            .transpose()?;

        let enumerator = {
            let mut exprs = self.expr_compiler();
            let enumerator = exprs.temp("foreach.enumerator", &info.enumerator_type, span)?;
            let by_address = exprs.lower_receiver(Some(stmt.collection), get_enumerator, span)?;
            let target = exprs.ctx().method_ref(get_enumerator, span)?;
            exprs
                .emitter()
                .emit_method(call_opcode(get_enumerator, by_address), target);
            exprs.emitter().stloc(enumerator);
            enumerator
        };
        let (variable, variable_ty) = self.declare_iteration_variable(stmt)?;

        let end = self.emitter.new_label("end");
        let body = self.emitter.new_label("body");
        let test = self.emitter.new_label("test");
        let loop_end = match dispose {
            Some(_) => self.emitter.new_label("loop.end"),
            None => end,
        };
        let try_start = self.emitter.new_label("try.start");
        if dispose.is_some() {
            self.place(try_start)?;
            self.emitter.enter_region();
        }

        self.emitter.emit_branch(OpCode::Br, test);
        self.place(body)?;
        self.call_on_enumerator(enumerator, info, current, span)?;
        self.store_iteration_value(variable, &info.element_type, variable_ty, span)?;
        self.compile_loop_body(stmt.body, loop_end, test)?;
        self.place(test)?;
        self.call_on_enumerator(enumerator, info, move_next, span)?;
        self.emitter.emit_branch(OpCode::Brtrue, body);

        if let Some(dispose) = dispose {
            self.place(loop_end)?;
            self.emitter.emit_branch(OpCode::Leave, end);
            self.emitter.exit_region();

            let handler = self.emitter.new_label("finally");
            self.place(handler)?;
            self.emitter.enter_region();
            let skip = self.emitter.new_label("skip");
            let guarded = !info.enumerator_type.is_value_type();
            if guarded {
                self.emitter.ldloc(enumerator);
                self.emitter.emit_branch(OpCode::Brfalse, skip);
            }
            self.call_on_enumerator(enumerator, info, dispose, span)?;
            if guarded {
                self.place(skip)?;
            }
            self.emitter.emit(OpCode::Endfinally);
            self.emitter.exit_region();

            self.emitter.add_handler(PendingHandler {
                kind: HandlerKind::Finally,
                try_start,
                try_end: handler,
                handler_start: handler,
                handler_end: end,
                catch_type: None,
            });
        }
        self.place(end)
    }

    /// Declare the loop variable in the loop's frame.
    fn declare_iteration_variable(&mut self, stmt: &ForeachStmt<'_>) -> Result<(u16, &'m SemanticType)> {
        let span = stmt.span;
        let what = format!("foreach variable '{}'", stmt.var.name);
        let symbol = self.ctx.declared(stmt.id, &what, span)?;
        let ty = symbol.ty().ok_or_else(|| LoweringError::UnresolvedSymbol {
            what: format!("type of {what}"),
            span,
        })?;
        let slot = self.expr_compiler().declare_local(symbol, span)?;
        Ok((slot, ty))
    }

    /// Store the value on the stack into the loop variable, converting it
    /// from the element type.
    fn store_iteration_value(&mut self, slot: u16, element: &SemanticType, variable: &SemanticType, span: Span) -> Result<()> {
        if element != variable {
            self.expr_compiler().emit_conversion(element, variable, span)?;
        }
        self.emitter.stloc(slot);
        Ok(())
    }

    /// Call a parameterless member of the enumerator in `slot`.
    fn call_on_enumerator(&mut self, slot: u16, info: &ForEachInfo, method: &Symbol, span: Span) -> Result<()> {
        let by_address = info.enumerator_type.is_value_type();
        if by_address {
            self.emitter.ldloca(slot);
        } else {
            self.emitter.ldloc(slot);
        }
        let target = self.ctx.method_ref(method, span)?;
        self.emitter.emit_method(call_opcode(method, by_address), target);
        Ok(())
    }
}
