//! Simple names and `this`.
//!
//! A simple name can refer to a local, a parameter, or a member of the
//! enclosing type accessed without a receiver (implicitly `this` for
//! instance members). Method groups used as values become delegates.

use ilweave_core::{LoweringError, RefKind, Span, Symbol, SymbolKind};
use ilweave_syntax::ast::{Expr, IdentExpr, ThisExpr};

use crate::bytecode::OpCode;

use super::{delegates, member, ExprCompiler};

type Result<T> = std::result::Result<T, LoweringError>;

pub fn compile_ident(compiler: &mut ExprCompiler<'_, '_>, ident: &IdentExpr<'_>) -> Result<()> {
    let span = ident.span;
    let what = format!("name '{}'", ident.name);
    let symbol = compiler.ctx().referenced(ident.id, &what, span)?;
    load_symbol(compiler, symbol, None, ident.id, span)
}

/// Load the value `symbol` names, reached through `receiver` for members.
pub(super) fn load_symbol(
    compiler: &mut ExprCompiler<'_, '_>,
    symbol: &Symbol,
    receiver: Option<&Expr<'_>>,
    node: ilweave_core::NodeId,
    span: Span,
) -> Result<()> {
    match &symbol.kind {
        SymbolKind::Local {
            ty,
            constant: Some(value),
        } => {
            compiler.emit_constant(value, ty);
        }
        SymbolKind::Local { .. } => {
            let slot = compiler.local_slot(symbol, span)?;
            compiler.emitter().ldloc(slot);
        }
        SymbolKind::Parameter { ty, ref_kind, .. } => {
            let slot = compiler.arg_slot(symbol, span)?;
            compiler.emitter().ldarg(slot);
            if *ref_kind != RefKind::None {
                let resolved = compiler.resolve(ty, span)?;
                resolved.load_indirect().emit(compiler.emitter());
            }
        }
        SymbolKind::Field(_) => member::load_field(compiler, symbol, receiver, span)?,
        SymbolKind::Property(_) => member::load_property(compiler, symbol, receiver, span)?,
        SymbolKind::Event(_) => member::load_event(compiler, symbol, receiver, span)?,
        SymbolKind::Method(_) => delegates::compile_method_ref(compiler, symbol, receiver, node, span)?,
        SymbolKind::Type(_) => {
            return Err(LoweringError::other(
                format!("type '{}' used as a value", symbol.name),
                span,
            ));
        }
    }
    Ok(())
}

/// `this`: the reference for classes, the value behind the by-ref argument
/// for structs.
pub fn compile_this(compiler: &mut ExprCompiler<'_, '_>, this: &ThisExpr) -> Result<()> {
    let ty = compiler.ctx().type_info(this.id, this.span)?.ty;
    compiler.emitter().ldarg(0);
    if ty.is_value_type() {
        let resolved = compiler.resolve(&ty, this.span)?;
        compiler.emitter().emit_type(OpCode::Ldobj, resolved.expr);
    }
    Ok(())
}

/// Whether `symbol` names a storage location whose address can be taken.
pub(super) fn is_addressable(symbol: &Symbol) -> bool {
    match &symbol.kind {
        SymbolKind::Local { constant, .. } => constant.is_none(),
        SymbolKind::Parameter { .. } => true,
        SymbolKind::Field(field) => field.constant.is_none(),
        _ => false,
    }
}

/// Load the address of the location `symbol` names.
pub(super) fn address_of(
    compiler: &mut ExprCompiler<'_, '_>,
    symbol: &Symbol,
    receiver: Option<&Expr<'_>>,
    span: Span,
) -> Result<()> {
    match &symbol.kind {
        SymbolKind::Local { .. } => {
            let slot = compiler.local_slot(symbol, span)?;
            compiler.emitter().ldloca(slot);
        }
        SymbolKind::Parameter { ref_kind, .. } => {
            let slot = compiler.arg_slot(symbol, span)?;
            if *ref_kind == RefKind::None {
                compiler.emitter().ldarga(slot);
            } else {
                compiler.emitter().ldarg(slot);
            }
        }
        SymbolKind::Field(field) => {
            let target = compiler.ctx().field_ref(symbol, span)?;
            if field.is_static {
                compiler.emitter().emit_field(OpCode::Ldsflda, target);
            } else {
                compiler.lower_receiver(receiver, symbol, span)?;
                compiler.emitter().emit_field(OpCode::Ldflda, target);
            }
        }
        _ => {
            return Err(LoweringError::other(
                format!("'{}' is not a storage location", symbol.name),
                span,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::testing::{body_listing, declare_test_local, declare_test_param};
    use bumpalo::Bump;
    use ilweave_core::{ConstantValue, SemanticType, SymbolKind, TypeKind};
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn locals_and_parameters_load_by_slot() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let x = b.local_symbol("x", SemanticType::INT32);
        let host = b.source_type("Demo", "Host", TypeKind::Class);
        let m = b.method_symbol(&host, "Run", &[("a", SemanticType::INT32)], SemanticType::VOID, false);
        let params = b.param_symbols(m);
        let read_x = b.ident(x);
        let read_a = b.ident(params[0]);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, x)?;
            declare_test_param(c, params[0], 1)?;
            c.lower_discard(read_x)?;
            c.lower_discard(read_a)
        });
        assert_eq!(listing, vec!["ldloc x", "pop", "ldarg A_1", "pop", "ret"]);
    }

    #[test]
    fn constant_locals_are_inlined() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let k = b.local_symbol("k", SemanticType::INT32);
        if let Some(SymbolKind::Local { constant, .. }) = b.model_mut().symbol_mut(k).map(|s| &mut s.kind) {
            *constant = Some(ConstantValue::Int(42));
        }
        let read = b.ident(k);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| c.lower_discard(read));
        assert_eq!(listing, vec!["ldc.i4.s 42", "pop", "ret"]);
    }

    #[test]
    fn unbound_name_is_an_error() {
        use crate::context::LoweringContext;
        use crate::emit::BodyEmitter;
        use crate::expr::ExprCompiler;
        use crate::options::LoweringOptions;

        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let ty = b.imported_type("Demo", "Widget", TypeKind::Class);
        let name = b.type_ref(ty);
        let model = b.finish();

        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let mut emitter = BodyEmitter::new("m", false);
        let err = ExprCompiler::new(&mut ctx, &mut emitter).lower(name).unwrap_err();
        assert!(!err.is_gap());
        assert!(err.to_string().contains("Demo.Widget"));
    }
}
