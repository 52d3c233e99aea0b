//! Member access and element access.
//!
//! - `obj.Field` / `Type.Field`: `ldfld` / `ldsfld`, constants inlined
//! - `obj.Property`: getter call
//! - `array.Length`: `ldlen; conv.i4`
//! - `array[i]`: `ldelem.*` chosen from the element type
//! - `ptr[i]`: address arithmetic plus `ldind.*`
//! - `obj[i]` bound to an indexer: getter call with the index
//! - `obj[a..b]`: the slice protocol bound by the semantic model

use ilweave_core::{
    LoweringError, Operation, RangeSliceInfo, SemanticType, Span, Symbol, SymbolKind,
};
use ilweave_syntax::ast::{Expr, IndexExpr, MemberExpr, RangeExpr};

use crate::bytecode::OpCode;

use super::{call_opcode, identifiers, ExprCompiler};

type Result<T> = std::result::Result<T, LoweringError>;

// =============================================================================
// Member access
// =============================================================================

pub fn compile_member(compiler: &mut ExprCompiler<'_, '_>, m: &MemberExpr<'_>) -> Result<()> {
    let span = m.span;
    let what = format!("member '{}'", m.name.name);
    let symbol = compiler.ctx().referenced(m.id, &what, span)?;

    if is_array_length(compiler, m.object, symbol)? {
        compiler.lower(m.object)?;
        let emitter = compiler.emitter();
        emitter.emit(OpCode::Ldlen);
        emitter.emit(OpCode::Conv_I4);
        return Ok(());
    }

    identifiers::load_symbol(compiler, symbol, Some(m.object), m.id, span)
}

fn is_array_length(compiler: &ExprCompiler<'_, '_>, object: &Expr<'_>, symbol: &Symbol) -> Result<bool> {
    if symbol.from_source || symbol.name != "Length" || !matches!(symbol.kind, SymbolKind::Property(_)) {
        return Ok(false);
    }
    Ok(matches!(
        compiler.converted_type(object)?,
        SemanticType::Array { rank: 1, .. }
    ))
}

/// Load a field: inline its constant, `ldsfld` when static, otherwise the
/// receiver then `ldfld`.
pub(super) fn load_field(
    compiler: &mut ExprCompiler<'_, '_>,
    symbol: &Symbol,
    receiver: Option<&Expr<'_>>,
    span: Span,
) -> Result<()> {
    let Some(field) = symbol.as_field() else {
        return Err(LoweringError::UnresolvedSymbol {
            what: format!("field '{}'", symbol.name),
            span,
        });
    };
    if let Some(value) = &field.constant {
        compiler.emit_constant(value, &field.ty);
        return Ok(());
    }
    let target = compiler.ctx().field_ref(symbol, span)?;
    if field.is_static {
        compiler.emitter().emit_field(OpCode::Ldsfld, target);
    } else {
        compiler.lower_receiver(receiver, symbol, span)?;
        compiler.emitter().emit_field(OpCode::Ldfld, target);
    }
    Ok(())
}

/// Getter symbol of a property.
pub(super) fn getter_of<'m>(
    compiler: &ExprCompiler<'_, 'm>,
    property: &Symbol,
    span: Span,
) -> Result<&'m Symbol> {
    let getter = property
        .as_property()
        .and_then(|p| p.getter)
        .ok_or_else(|| LoweringError::other(format!("property '{}' has no getter", property.name), span))?;
    compiler.ctx.symbol(getter, span)
}

/// Setter symbol of a property.
pub(super) fn setter_of<'m>(
    compiler: &ExprCompiler<'_, 'm>,
    property: &Symbol,
    span: Span,
) -> Result<&'m Symbol> {
    let setter = property
        .as_property()
        .and_then(|p| p.setter)
        .ok_or_else(|| LoweringError::other(format!("property '{}' has no setter", property.name), span))?;
    compiler.ctx.symbol(setter, span)
}

/// Call the getter of `property` on `receiver`.
pub(super) fn load_property(
    compiler: &mut ExprCompiler<'_, '_>,
    property: &Symbol,
    receiver: Option<&Expr<'_>>,
    span: Span,
) -> Result<()> {
    let getter = getter_of(compiler, property, span)?;
    let by_address = compiler.lower_receiver(receiver, getter, span)?;
    let target = compiler.ctx().method_ref(getter, span)?;
    compiler.emitter().emit_method(call_opcode(getter, by_address), target);
    Ok(())
}

/// Read a field-like event through its backing field.
pub(super) fn load_event(
    compiler: &mut ExprCompiler<'_, '_>,
    event: &Symbol,
    receiver: Option<&Expr<'_>>,
    span: Span,
) -> Result<()> {
    let backing = event
        .as_event()
        .and_then(|e| e.backing_field)
        .ok_or_else(|| {
            LoweringError::other(format!("event '{}' has no backing field", event.name), span)
        })?;
    let field = compiler.ctx().symbol(backing, span)?;
    load_field(compiler, field, receiver, span)
}

// =============================================================================
// Element access
// =============================================================================

pub fn compile_index(compiler: &mut ExprCompiler<'_, '_>, index: &IndexExpr<'_>) -> Result<()> {
    let span = index.span;

    if let Some(Operation::RangeSlice(info)) = compiler.ctx().model().operation(index.id) {
        return compile_range_slice(compiler, index, info);
    }

    if let Some(symbol) = compiler.ctx().model().referenced_symbol(index.id)
        && matches!(symbol.kind, SymbolKind::Property(_))
    {
        let getter = getter_of(compiler, symbol, span)?;
        let by_address = compiler.lower_receiver(Some(index.object), getter, span)?;
        compiler.lower(index.index)?;
        let target = compiler.ctx().method_ref(getter, span)?;
        compiler.emitter().emit_method(call_opcode(getter, by_address), target);
        return Ok(());
    }

    let container = compiler.converted_type(index.object)?;
    match &container {
        SemanticType::Array { rank: 1, .. } => {
            let resolved = compiler.resolve(&container, span)?;
            compiler.lower(index.object)?;
            compiler.lower(index.index)?;
            let load = resolved.load_element().ok_or_else(|| {
                LoweringError::other(format!("no element type for '{container}'"), span)
            })?;
            load.emit(compiler.emitter());
            Ok(())
        }
        SemanticType::Array { .. } => Err(LoweringError::unsupported("multi-dimensional array access", span)),
        SemanticType::Pointer(element) => {
            let element = compiler.resolve(element, span)?;
            pointer_element_address(compiler, index, &element.expr)?;
            element.load_indirect().emit(compiler.emitter());
            Ok(())
        }
        _ => Err(LoweringError::UnresolvedSymbol {
            what: format!("indexer of '{container}'"),
            span,
        }),
    }
}

/// Whether `index` accesses a single-dimensional array or pointer element,
/// which has an address.
pub(super) fn is_array_access(compiler: &ExprCompiler<'_, '_>, index: &IndexExpr<'_>) -> Result<bool> {
    let model = compiler.ctx.model();
    if model.operation(index.id).is_some() || model.referenced_symbol(index.id).is_some() {
        return Ok(false);
    }
    Ok(matches!(
        compiler.converted_type(index.object)?,
        SemanticType::Array { rank: 1, .. } | SemanticType::Pointer(_)
    ))
}

/// Address of an array or pointer element.
pub(super) fn element_address(compiler: &mut ExprCompiler<'_, '_>, index: &IndexExpr<'_>) -> Result<()> {
    let span = index.span;
    let container = compiler.converted_type(index.object)?;
    let element = container.element_type().cloned().ok_or_else(|| {
        LoweringError::other(format!("no element type for '{container}'"), span)
    })?;
    let element = compiler.resolve(&element, span)?;
    if container.is_array() {
        compiler.lower(index.object)?;
        compiler.lower(index.index)?;
        compiler.emitter().emit_type(OpCode::Ldelema, element.expr);
        Ok(())
    } else {
        pointer_element_address(compiler, index, &element.expr)
    }
}

/// `ptr + (nint)i * sizeof(T)`.
fn pointer_element_address(
    compiler: &mut ExprCompiler<'_, '_>,
    index: &IndexExpr<'_>,
    element: &crate::type_resolver::TypeExpr,
) -> Result<()> {
    compiler.lower(index.object)?;
    compiler.lower(index.index)?;
    let emitter = compiler.emitter();
    emitter.emit(OpCode::Conv_I);
    emitter.emit_type(OpCode::Sizeof, element.clone());
    emitter.emit(OpCode::Mul);
    emitter.emit(OpCode::Add);
    Ok(())
}

// =============================================================================
// Range slicing
// =============================================================================

/// `container[start..end]`.
///
/// The container is evaluated once into a temporary and its length is
/// snapshotted before either bound is evaluated. From-the-end bounds are
/// resolved against that snapshot, then the slice member is called with the
/// start offset and the element count.
fn compile_range_slice(
    compiler: &mut ExprCompiler<'_, '_>,
    index: &IndexExpr<'_>,
    info: &RangeSliceInfo,
) -> Result<()> {
    let span = index.span;
    let Expr::Range(range) = index.index.unparenthesized() else {
        return Err(LoweringError::other("slice index is not a range expression", span));
    };
    let slice = compiler.ctx().symbol(info.slice, span)?;

    let container_ty = compiler.converted_type(index.object)?;
    let by_address = container_ty.is_value_type();
    compiler.lower(index.object)?;
    let container = compiler.temp("slice.container", &container_ty, span)?;
    compiler.emitter().stloc(container);

    // Length snapshot.
    match info.length {
        Some(length) => {
            let getter = compiler.ctx().symbol(length, span)?;
            load_container(compiler, container, by_address);
            let target = compiler.ctx().method_ref(getter, span)?;
            compiler.emitter().emit_method(call_opcode(getter, by_address), target);
        }
        None => {
            let emitter = compiler.emitter();
            emitter.ldloc(container);
            emitter.emit(OpCode::Ldlen);
            emitter.emit(OpCode::Conv_I4);
        }
    }
    let length = compiler.temp("slice.length", &SemanticType::INT32, span)?;
    compiler.emitter().stloc(length);

    let start = compiler.temp("slice.start", &SemanticType::INT32, span)?;
    lower_bound(compiler, range, true, length)?;
    compiler.emitter().stloc(start);

    lower_bound(compiler, range, false, length)?;
    let emitter = compiler.emitter();
    emitter.ldloc(start);
    emitter.emit(OpCode::Sub);
    let count = compiler.temp("slice.count", &SemanticType::INT32, span)?;
    compiler.emitter().stloc(count);

    if slice.is_static() {
        compiler.emitter().ldloc(container);
    } else {
        load_container(compiler, container, by_address);
    }
    let emitter = compiler.emitter();
    emitter.ldloc(start);
    emitter.ldloc(count);
    let target = compiler.ctx().method_ref(slice, span)?;
    compiler.emitter().emit_method(call_opcode(slice, by_address), target);
    Ok(())
}

fn load_container(compiler: &mut ExprCompiler<'_, '_>, container: u16, by_address: bool) {
    if by_address {
        compiler.emitter().ldloca(container);
    } else {
        compiler.emitter().ldloc(container);
    }
}

/// Offset of one bound: absent start is `0`, absent end is the length, a
/// from-the-end bound is `length - value`.
fn lower_bound(
    compiler: &mut ExprCompiler<'_, '_>,
    range: &RangeExpr<'_>,
    start: bool,
    length: u16,
) -> Result<()> {
    let (bound, from_end) = if start {
        (range.start, range.start_from_end)
    } else {
        (range.end, range.end_from_end)
    };
    match bound {
        None if start => {
            compiler.emitter().emit_i32(0);
        }
        None => {
            compiler.emitter().ldloc(length);
        }
        Some(value) if from_end => {
            compiler.emitter().ldloc(length);
            compiler.lower(value)?;
            compiler.emitter().emit(OpCode::Sub);
        }
        Some(value) => compiler.lower(value)?,
    }
    Ok(())
}
