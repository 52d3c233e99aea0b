//! Invocations.
//!
//! A call whose callee is a name or member access bound to the invoked
//! method goes straight to that method; any other callee is a delegate value
//! invoked through its `Invoke` method.
//!
//! The call instruction is emitted right after the receiver and the
//! argument code is moved in front of it afterwards, so the instruction can
//! be used as the anchor for everything the arguments produce. Arguments
//! containing `stackalloc` need an empty evaluation stack; for those the
//! receiver and every argument go through temporaries first.

use ilweave_core::{LoweringError, ParameterInfo, RefKind, Symbol};
use ilweave_syntax::ast::{Argument, CallExpr, Expr};
use tracing::trace;

use crate::bytecode::OpCode;
use crate::type_resolver::TypeExpr;

use super::{call_opcode, ExprCompiler};

type Result<T> = std::result::Result<T, LoweringError>;

enum Callee<'e> {
    /// A method group; the receiver, if any, is the member access object.
    Direct(Option<&'e Expr<'e>>),
    Delegate(&'e Expr<'e>),
}

pub fn compile_call(compiler: &mut ExprCompiler<'_, '_>, call: &CallExpr<'_>) -> Result<()> {
    let span = call.span;
    let method = compiler.ctx().referenced(call.id, "invoked method", span)?;
    let Some(info) = method.as_method() else {
        return Err(LoweringError::other(
            format!("'{}' is not callable", method.name),
            span,
        ));
    };

    match classify_callee(compiler, call, method) {
        Callee::Direct(receiver) => {
            if call.args.iter().any(|arg| contains_stackalloc(arg.value)) {
                compile_spilled(compiler, call, method, &info.params, receiver)
            } else {
                compile_direct(compiler, call, method, &info.params, receiver)
            }
        }
        Callee::Delegate(delegate) => {
            compiler.lower(delegate)?;
            lower_args(compiler, call.args, &info.params)?;
            let target = compiler.ctx().method_ref(method, span)?;
            compiler.emitter().emit_method(OpCode::Callvirt, target);
            Ok(())
        }
    }
}

fn classify_callee<'e>(compiler: &ExprCompiler<'_, '_>, call: &CallExpr<'e>, method: &Symbol) -> Callee<'e> {
    let model = compiler.ctx.model();
    let bound_here = |id| model.referenced_symbol(id).is_some_and(|s| s.id == method.id);
    match call.callee {
        Expr::Ident(ident) if bound_here(ident.id) => Callee::Direct(None),
        Expr::Member(m) if bound_here(m.id) => Callee::Direct(Some(m.object)),
        other => Callee::Delegate(other),
    }
}

fn compile_direct(
    compiler: &mut ExprCompiler<'_, '_>,
    call: &CallExpr<'_>,
    method: &Symbol,
    params: &[ParameterInfo],
    receiver: Option<&Expr<'_>>,
) -> Result<()> {
    let span = call.span;
    let by_address = compiler.lower_receiver(receiver, method, span)?;
    let target = compiler.ctx().method_ref(method, span)?;
    let anchor = compiler
        .emitter()
        .emit_method(call_opcode(method, by_address), target);

    let checkpoint = compiler.emitter().checkpoint();
    lower_args(compiler, call.args, params)?;
    compiler.emitter().relocate_since(checkpoint, anchor);
    Ok(())
}

/// Push the arguments in order; by-reference parameters receive addresses.
pub(crate) fn lower_args(compiler: &mut ExprCompiler<'_, '_>, args: &[Argument<'_>], params: &[ParameterInfo]) -> Result<()> {
    for (index, arg) in args.iter().enumerate() {
        if passes_by_reference(arg, params.get(index)) {
            compiler.lower_address(arg.value)?;
        } else {
            compiler.lower(arg.value)?;
        }
    }
    Ok(())
}

fn passes_by_reference(arg: &Argument<'_>, param: Option<&ParameterInfo>) -> bool {
    arg.ref_kind != RefKind::None || param.is_some_and(|p| p.ref_kind != RefKind::None)
}

fn contains_stackalloc(expr: &Expr<'_>) -> bool {
    match expr {
        Expr::StackAlloc(_) => true,
        Expr::Paren(p) => contains_stackalloc(p.expr),
        Expr::Cast(c) => contains_stackalloc(c.operand),
        _ => false,
    }
}

/// Receiver and arguments evaluated into temporaries, each on an empty
/// stack, then reloaded for the call.
fn compile_spilled(
    compiler: &mut ExprCompiler<'_, '_>,
    call: &CallExpr<'_>,
    method: &Symbol,
    params: &[ParameterInfo],
    receiver: Option<&Expr<'_>>,
) -> Result<()> {
    let span = call.span;
    trace!(method = %method.name, "spilling call operands around stackalloc");

    let mut temps = Vec::with_capacity(call.args.len() + 1);
    let mut by_address = false;
    if !method.is_static() {
        let ty = match receiver {
            Some(expr) => compiler.converted_type(expr)?,
            None => method.containing_type.clone().ok_or_else(|| LoweringError::UnresolvedSymbol {
                what: format!("declaring type of '{}'", method.name),
                span,
            })?,
        };
        by_address = compiler.lower_receiver(receiver, method, span)?;
        let resolved = compiler.resolve(&ty, span)?.expr;
        let slot_ty = if by_address { TypeExpr::by_ref(resolved) } else { resolved };
        let temp = compiler.temp_of("call.receiver", slot_ty);
        compiler.emitter().stloc(temp);
        temps.push(temp);
    }

    for (index, arg) in call.args.iter().enumerate() {
        let ty = compiler.converted_type(arg.value)?;
        let resolved = compiler.resolve(&ty, span)?.expr;
        let slot_ty = if passes_by_reference(arg, params.get(index)) {
            compiler.lower_address(arg.value)?;
            TypeExpr::by_ref(resolved)
        } else {
            compiler.lower(arg.value)?;
            resolved
        };
        let temp = compiler.temp_of("call.arg", slot_ty);
        compiler.emitter().stloc(temp);
        temps.push(temp);
    }

    for temp in temps {
        compiler.emitter().ldloc(temp);
    }
    let target = compiler.ctx().method_ref(method, span)?;
    compiler
        .emitter()
        .emit_method(call_opcode(method, by_address), target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::testing::{body_listing, declare_test_local};
    use bumpalo::Bump;
    use ilweave_core::{RefKind, SemanticType, TypeKind};
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn instance_call_pushes_receiver_then_args() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let widget = b.imported_type("Demo", "Widget", TypeKind::Class);
        let move_to = b.method_symbol(
            &widget,
            "Move",
            &[("x", SemanticType::INT32), ("y", SemanticType::INT32)],
            SemanticType::VOID,
            false,
        );
        let w = b.local_symbol("w", widget.clone());
        let recv = b.ident(w);
        let (x, y) = (b.int(1), b.int(2));
        let call = b.call(move_to, Some(recv), &[x, y]);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, w)?;
            c.lower_discard(call)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc w",
                "ldc.i4.1",
                "ldc.i4.2",
                "call Import(Import(\"Demo.Widget\"), \"Move\")",
                "ret"
            ]
        );
    }

    #[test]
    fn virtual_call_uses_callvirt_and_result_is_popped() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let shape = b.imported_type("Demo", "Shape", TypeKind::Class);
        let area = b.virtual_method_symbol(&shape, "Area", &[], SemanticType::FLOAT64);
        let s = b.local_symbol("s", shape.clone());
        let recv = b.ident(s);
        let call = b.call(area, Some(recv), &[]);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, s)?;
            c.lower_discard(call)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc s",
                "callvirt Import(Import(\"Demo.Shape\"), \"Area\")",
                "pop",
                "ret"
            ]
        );
    }

    #[test]
    fn ref_arguments_pass_addresses() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let util = b.imported_type("Demo", "Util", TypeKind::Class);
        let bump = b.method_symbol(&util, "Bump", &[("v", SemanticType::INT32)], SemanticType::VOID, true);
        let n = b.local_symbol("n", SemanticType::INT32);
        let read = b.ident(n);
        let arg = b.ref_arg(read, RefKind::Ref);
        let call = b.call_with(bump, None, &[arg]);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, n)?;
            c.lower_discard(call)
        });
        assert_eq!(
            listing,
            vec!["ldloca n", "call Import(Import(\"Demo.Util\"), \"Bump\")", "ret"]
        );
    }

    #[test]
    fn struct_receiver_is_loaded_by_address() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let point = b.imported_type("Demo", "Point", TypeKind::Struct);
        let norm = b.method_symbol(&point, "Norm", &[], SemanticType::FLOAT64, false);
        let p = b.local_symbol("p", point.clone());
        let recv = b.ident(p);
        let call = b.call(norm, Some(recv), &[]);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, p)?;
            c.lower_discard(call)
        });
        assert_eq!(
            listing,
            vec!["ldloca p", "call Import(Import(\"Demo.Point\"), \"Norm\")", "pop", "ret"]
        );
    }

    #[test]
    fn delegate_values_are_invoked() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let action = b.imported_type("System", "Action", TypeKind::Delegate);
        let invoke = b.method_symbol(&action, "Invoke", &[("x", SemanticType::INT32)], SemanticType::VOID, false);
        let f = b.local_symbol("f", action.clone());
        let target = b.ident(f);
        let arg = b.int(5);
        let call = b.invoke(target, invoke, &[arg]);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, f)?;
            c.lower_discard(call)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc f",
                "ldc.i4.5",
                "callvirt Import(Import(\"System.Action\"), \"Invoke\")",
                "ret"
            ]
        );
    }

    #[test]
    fn stackalloc_argument_spills_operands() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let buffer = b.imported_type("Demo", "Buffer", TypeKind::Class);
        let fill = b.method_symbol(
            &buffer,
            "Fill",
            &[("data", SemanticType::pointer_to(SemanticType::INT32))],
            SemanticType::VOID,
            false,
        );
        let w = b.local_symbol("w", buffer.clone());
        let n = b.local_symbol("n", SemanticType::INT32);
        let recv = b.ident(w);
        let size = b.ident(n);
        let data = b.stackalloc(SemanticType::INT32, size);
        let call = b.call(fill, Some(recv), &[data]);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, w)?;
            declare_test_local(c, n)?;
            c.lower_discard(call)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc w",
                "stloc call.receiver",
                "ldloc n",
                "conv.u",
                "sizeof TypeSystem.Int32",
                "mul",
                "localloc",
                "stloc call.arg",
                "ldloc call.receiver",
                "ldloc call.arg",
                "call Import(Import(\"Demo.Buffer\"), \"Fill\")",
                "ret"
            ]
        );
    }
}
