//! Method groups used as values.
//!
//! Converted to a function pointer the group is just `ldftn`. Converted to a
//! delegate it becomes `newobj D::.ctor(object, native int)` over the target
//! object (null for static methods) and the method pointer; virtual methods
//! are looked up on the target with `ldvirtftn`.

use ilweave_core::{LoweringError, NodeId, SemanticType, Span, Symbol};
use ilweave_syntax::ast::Expr;

use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::type_resolver::well_known;

use super::ExprCompiler;

type Result<T> = std::result::Result<T, LoweringError>;

pub(super) fn compile_method_ref(
    compiler: &mut ExprCompiler<'_, '_>,
    method: &Symbol,
    receiver: Option<&Expr<'_>>,
    node: NodeId,
    span: Span,
) -> Result<()> {
    let info = compiler.ctx().type_info(node, span)?;
    let target_ty = if info.has_conversion() { info.converted } else { info.ty };
    let Some(method_info) = method.as_method() else {
        return Err(LoweringError::UnresolvedSymbol {
            what: format!("method '{}'", method.name),
            span,
        });
    };
    let target = compiler.ctx().method_ref(method, span)?;

    if matches!(target_ty, SemanticType::FunctionPointer { .. }) {
        compiler.emitter().emit_method(OpCode::Ldftn, target);
        return Ok(());
    }
    if !target_ty.is_delegate() {
        return Err(LoweringError::other(
            format!("method group '{}' used as a value of type '{target_ty}'", method.name),
            span,
        ));
    }

    if method_info.is_static {
        compiler.emitter().emit_null();
    } else {
        lower_target_object(compiler, method, receiver, span)?;
    }

    let dispatch_virtually = !method_info.is_static && (method_info.is_virtual || method_info.is_abstract || method_info.is_override);
    if dispatch_virtually {
        compiler.emitter().emit(OpCode::Dup);
        compiler.emitter().emit_method(OpCode::Ldvirtftn, target);
    } else {
        compiler.emitter().emit_method(OpCode::Ldftn, target);
    }

    let delegate = compiler.resolve(&target_ty, span)?;
    let ctor = LoweringContext::runtime_method(
        delegate.expr,
        ".ctor",
        vec![well_known::object(), well_known::intptr()],
        None,
        true,
    );
    compiler.emitter().emit_method(OpCode::Newobj, ctor);
    Ok(())
}

/// The object a delegate binds to, boxed when it is a value.
fn lower_target_object(
    compiler: &mut ExprCompiler<'_, '_>,
    method: &Symbol,
    receiver: Option<&Expr<'_>>,
    span: Span,
) -> Result<()> {
    match receiver {
        Some(expr) => {
            let ty = compiler.converted_type(expr)?;
            compiler.lower(expr)?;
            compiler.box_if_value(&ty, span)
        }
        None => {
            compiler.emitter().ldarg(0);
            let Some(owner) = method.containing_type.as_ref().filter(|t| t.is_value_type()) else {
                return Ok(());
            };
            let resolved = compiler.resolve(owner, span)?;
            compiler.emitter().emit_type(OpCode::Ldobj, resolved.expr.clone());
            compiler.emitter().emit_type(OpCode::Box, resolved.expr);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{body_listing, declare_test_local};
    use bumpalo::Bump;
    use ilweave_core::{SemanticType, TypeKind};
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn static_method_group_binds_null_target() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let action = b.imported_type("System", "Action", TypeKind::Delegate);
        let host = b.imported_type("Demo", "Host", TypeKind::Class);
        let tick = b.method_symbol(&host, "Tick", &[], SemanticType::VOID, true);
        let group = b.method_ref(tick, None, action);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| c.lower_discard(group));
        assert_eq!(
            listing,
            vec![
                "ldnull",
                "ldftn Import(Import(\"Demo.Host\"), \"Tick\")",
                "newobj Import(Import(\"System.Action\"), \".ctor\")",
                "pop",
                "ret"
            ]
        );
    }

    #[test]
    fn virtual_method_group_uses_ldvirtftn() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let action = b.imported_type("System", "Action", TypeKind::Delegate);
        let shape = b.imported_type("Demo", "Shape", TypeKind::Class);
        let draw = b.virtual_method_symbol(&shape, "Draw", &[], SemanticType::VOID);
        let s = b.local_symbol("s", shape.clone());
        let recv = b.ident(s);
        let group = b.method_ref(draw, Some(recv), action);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, s)?;
            c.lower_discard(group)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc s",
                "dup",
                "ldvirtftn Import(Import(\"Demo.Shape\"), \"Draw\")",
                "newobj Import(Import(\"System.Action\"), \".ctor\")",
                "pop",
                "ret"
            ]
        );
    }

    #[test]
    fn function_pointer_is_just_ldftn() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let host = b.imported_type("Demo", "Host", TypeKind::Class);
        let tick = b.method_symbol(&host, "Tick", &[], SemanticType::VOID, true);
        let fn_ptr = SemanticType::FunctionPointer {
            params: Vec::new(),
            ret: Box::new(SemanticType::VOID),
        };
        let group = b.method_ref(tick, None, fn_ptr);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| c.lower_discard(group));
        assert_eq!(
            listing,
            vec!["ldftn Import(Import(\"Demo.Host\"), \"Tick\")", "pop", "ret"]
        );
    }
}
