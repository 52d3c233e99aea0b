//! `new` for objects and arrays, and `stackalloc`.

use ilweave_core::{LoweringError, SemanticType, SymbolKind};
use ilweave_syntax::ast::{ArrayCreationExpr, Expr, MemberInit, ObjectCreationExpr, StackAllocExpr};

use crate::bytecode::OpCode;

use super::{call_opcode, calls, member, ExprCompiler};

type Result<T> = std::result::Result<T, LoweringError>;

// =============================================================================
// Objects
// =============================================================================

/// The creation when `expr` is `new S()` or `new S { ... }` for a value
/// type `S` with no constructor to run; those are `initobj` on a location.
pub(crate) fn is_default_construction<'a>(
    compiler: &ExprCompiler<'_, '_>,
    expr: &Expr<'a>,
) -> Result<Option<&'a ObjectCreationExpr<'a>>> {
    let Expr::ObjectCreation(creation) = *expr.unparenthesized() else {
        return Ok(None);
    };
    let ty = compiler.static_type(expr)?;
    if !ty.is_value_type() || matches!(ty, SemanticType::Pointer(_) | SemanticType::FunctionPointer { .. }) {
        return Ok(None);
    }
    Ok(runs_no_constructor(compiler, creation).then_some(creation))
}

/// No arguments and either no bound constructor or the implicit
/// parameterless one of an imported value type.
fn runs_no_constructor(compiler: &ExprCompiler<'_, '_>, creation: &ObjectCreationExpr<'_>) -> bool {
    creation.args.is_empty()
        && compiler
            .ctx
            .model()
            .referenced_symbol(creation.id)
            .is_none_or(|ctor| !ctor.from_source && ctor.as_method().is_some_and(|m| m.params.is_empty()))
}

/// Zero-initialize the value at the address on the stack and run the member
/// initializers of `creation` on it. Consumes the address.
pub(crate) fn initialize_at_address(compiler: &mut ExprCompiler<'_, '_>, creation: &ObjectCreationExpr<'_>) -> Result<()> {
    let span = creation.span;
    let ty = compiler.static_type_of(creation.id, span)?;
    let resolved = compiler.resolve(&ty, span)?;

    let emitter = compiler.emitter();
    for _ in creation.initializers {
        emitter.emit(OpCode::Dup);
    }
    emitter.emit_type(OpCode::Initobj, resolved.expr);
    for init in creation.initializers {
        store_member_init(compiler, init, true)?;
    }
    Ok(())
}

pub fn compile_object_creation(compiler: &mut ExprCompiler<'_, '_>, creation: &ObjectCreationExpr<'_>) -> Result<()> {
    let span = creation.span;
    let ty = compiler.static_type_of(creation.id, span)?;

    if ty.is_type_parameter() {
        return Err(LoweringError::unsupported("creation of a type parameter", span));
    }

    if ty.is_value_type() && runs_no_constructor(compiler, creation) {
        let temp = compiler.temp("new", &ty, span)?;
        compiler.emitter().ldloca(temp);
        initialize_at_address(compiler, creation)?;
        compiler.emitter().ldloc(temp);
        return Ok(());
    }

    if ty.is_delegate()
        && let [target] = creation.args
    {
        // `new D(method)`: the argument already converts to the delegate.
        return compiler.lower(target.value);
    }

    let what = format!("constructor of '{ty}'");
    let ctor = compiler.ctx().referenced(creation.id, &what, span)?;
    let Some(info) = ctor.as_method() else {
        return Err(LoweringError::UnresolvedSymbol { what, span });
    };
    calls::lower_args(compiler, creation.args, &info.params)?;
    let target = compiler.ctx().method_ref(ctor, span)?;
    compiler.emitter().emit_method(OpCode::Newobj, target);

    if creation.initializers.is_empty() {
        return Ok(());
    }
    if ty.is_value_type() {
        let temp = compiler.temp("new", &ty, span)?;
        compiler.emitter().stloc(temp);
        for init in creation.initializers {
            compiler.emitter().ldloca(temp);
            store_member_init(compiler, init, true)?;
        }
        compiler.emitter().ldloc(temp);
    } else {
        for init in creation.initializers {
            compiler.emitter().emit(OpCode::Dup);
            store_member_init(compiler, init, false)?;
        }
    }
    Ok(())
}

/// `Member = value` with the object (or its address) on the stack.
fn store_member_init(compiler: &mut ExprCompiler<'_, '_>, init: &MemberInit<'_>, by_address: bool) -> Result<()> {
    let span = init.span;
    let what = format!("member '{}'", init.name.name);
    let symbol = compiler.ctx().referenced(init.id, &what, span)?;
    match &symbol.kind {
        SymbolKind::Field(field) if !field.is_static => {
            compiler.lower(init.value)?;
            let target = compiler.ctx().field_ref(symbol, span)?;
            compiler.emitter().emit_field(OpCode::Stfld, target);
        }
        SymbolKind::Property(property) if !property.is_static => {
            let setter = member::setter_of(compiler, symbol, span)?;
            compiler.lower(init.value)?;
            let target = compiler.ctx().method_ref(setter, span)?;
            compiler.emitter().emit_method(call_opcode(setter, by_address), target);
        }
        _ => {
            return Err(LoweringError::other(
                format!("'{}' cannot be set in an object initializer", symbol.name),
                span,
            ));
        }
    }
    Ok(())
}

// =============================================================================
// Arrays
// =============================================================================

pub fn compile_array_creation(compiler: &mut ExprCompiler<'_, '_>, creation: &ArrayCreationExpr<'_>) -> Result<()> {
    let span = creation.span;
    let array = compiler.static_type_of(creation.id, span)?;
    if let SemanticType::Array { rank, .. } = &array
        && *rank > 1
    {
        return Err(LoweringError::unsupported("multi-dimensional array creation", span));
    }
    let element = compiler.static_type_of(creation.element.id, span)?;
    let resolved = compiler.resolve(&element, span)?;
    let items = creation.initializer.unwrap_or(&[]);

    match creation.size {
        Some(size) => compiler.lower(size)?,
        None => {
            compiler.emitter().emit_i32(items.len() as i32);
        }
    }
    compiler.emitter().emit_type(OpCode::Newarr, resolved.expr.clone());

    let store = crate::type_resolver::store_element(&element, &resolved.expr);
    for (index, item) in items.iter().enumerate() {
        let emitter = compiler.emitter();
        emitter.emit(OpCode::Dup);
        emitter.emit_i32(index as i32);
        compiler.lower(item)?;
        store.emit(compiler.emitter());
    }
    Ok(())
}

/// `stackalloc T[n]`: `n * sizeof(T)` bytes from `localloc`.
pub fn compile_stackalloc(compiler: &mut ExprCompiler<'_, '_>, alloc: &StackAllocExpr<'_>) -> Result<()> {
    let span = alloc.span;
    let element = compiler.static_type_of(alloc.element.id, span)?;
    let resolved = compiler.resolve(&element, span)?;
    compiler.lower(alloc.size)?;
    let emitter = compiler.emitter();
    emitter.emit(OpCode::Conv_U);
    emitter.emit_type(OpCode::Sizeof, resolved.expr);
    emitter.emit(OpCode::Mul);
    emitter.emit(OpCode::Localloc);
    Ok(())
}
