//! Assignment, compound assignment and increments.
//!
//! Every assignable target is first turned into a [`Place`]: the operands
//! that locate it (receiver, array and index, address) are pushed, and the
//! place knows how to load from and store to the location they describe.
//!
//! Simple stores to places with operands go through the evaluation-order
//! fixer: the store instruction is emitted right after its operands, the
//! value is lowered after it, and the value's code is then moved in front of
//! the store. Compound forms need the operands twice (once for the load,
//! once for the store): one operand is duplicated with `dup`, several are
//! spilled to temporaries and reloaded.

use ilweave_core::{
    LoweringError, PrimitiveKind, RefKind, SemanticType, Span, Symbol, SymbolKind,
};
use ilweave_syntax::ast::{AssignExpr, AssignOp, BinaryOp, Expr};

use crate::bytecode::{FieldRef, InstrId, OpCode};
use crate::operators::{increment, resolve_binary, OperatorResolution};
use crate::type_resolver::{ResolvedType, TypeExpr};

use super::{binary, call_opcode, creation, identifiers, member, ExprCompiler};

type Result<T> = std::result::Result<T, LoweringError>;

// =============================================================================
// Places
// =============================================================================

/// A storage location whose operands are on the stack.
enum Place<'m> {
    Local(u16),
    Arg(u16),
    /// Address on the stack.
    Indirect(ResolvedType),
    StaticField(FieldRef),
    /// Receiver on the stack.
    InstanceField(FieldRef),
    /// Array and index on the stack; the type is the element type.
    Element(ResolvedType),
    /// Receiver (unless static) and index (for indexers) on the stack.
    Property {
        property: &'m Symbol,
        setter: &'m Symbol,
        by_address: bool,
    },
}

/// A place plus the types of the operands pushed for it, in push order.
struct Prepared<'m> {
    place: Place<'m>,
    operands: Vec<TypeExpr>,
    ty: SemanticType,
}

/// How the operands of a place are made available a second time.
enum Operands {
    None,
    /// A single operand, duplicated with `dup`.
    Stack,
    /// Temporaries holding the operands, in push order.
    Spilled(Vec<u16>),
}

impl<'m> Place<'m> {
    fn load(&self, compiler: &mut ExprCompiler<'_, 'm>, span: Span) -> Result<()> {
        match self {
            Place::Local(slot) => {
                compiler.emitter().ldloc(*slot);
            }
            Place::Arg(slot) => {
                compiler.emitter().ldarg(*slot);
            }
            Place::Indirect(ty) => {
                ty.load_indirect().emit(compiler.emitter());
            }
            Place::StaticField(field) => {
                compiler.emitter().emit_field(OpCode::Ldsfld, field.clone());
            }
            Place::InstanceField(field) => {
                compiler.emitter().emit_field(OpCode::Ldfld, field.clone());
            }
            Place::Element(element) => {
                crate::type_resolver::load_element(&element.semantic, &element.expr).emit(compiler.emitter());
            }
            Place::Property {
                property,
                by_address,
                ..
            } => {
                let getter = member::getter_of(compiler, property, span)?;
                let target = compiler.ctx().method_ref(getter, span)?;
                compiler.emitter().emit_method(call_opcode(getter, *by_address), target);
            }
        }
        Ok(())
    }

    fn store(&self, compiler: &mut ExprCompiler<'_, 'm>, span: Span) -> Result<InstrId> {
        let id = match self {
            Place::Local(slot) => compiler.emitter().stloc(*slot),
            Place::Arg(slot) => compiler.emitter().starg(*slot),
            Place::Indirect(ty) => ty.store_indirect().emit(compiler.emitter()),
            Place::StaticField(field) => compiler.emitter().emit_field(OpCode::Stsfld, field.clone()),
            Place::InstanceField(field) => compiler.emitter().emit_field(OpCode::Stfld, field.clone()),
            Place::Element(element) => {
                crate::type_resolver::store_element(&element.semantic, &element.expr).emit(compiler.emitter())
            }
            Place::Property {
                setter, by_address, ..
            } => {
                let target = compiler.ctx().method_ref(setter, span)?;
                compiler.emitter().emit_method(call_opcode(setter, *by_address), target)
            }
        };
        Ok(id)
    }
}

/// Push the operands of `target` and describe the location. With
/// `elements_by_address`, array elements become an address so that
/// read-modify-write forms need a single operand.
fn prepare<'m>(
    compiler: &mut ExprCompiler<'_, 'm>,
    target: &Expr<'_>,
    elements_by_address: bool,
) -> Result<Prepared<'m>> {
    let span = target.span();
    let ty = compiler.static_type(target)?;

    let (symbol, receiver) = match target {
        Expr::Paren(p) => return prepare(compiler, p.expr, elements_by_address),
        Expr::This(_) => {
            compiler.emitter().ldarg(0);
            let resolved = compiler.resolve(&ty, span)?;
            return Ok(Prepared {
                place: Place::Indirect(resolved.clone()),
                operands: vec![TypeExpr::by_ref(resolved.expr)],
                ty,
            });
        }
        Expr::Ident(ident) => {
            let what = format!("name '{}'", ident.name);
            (compiler.ctx().referenced(ident.id, &what, span)?, None)
        }
        Expr::Member(m) => {
            let what = format!("member '{}'", m.name.name);
            (compiler.ctx().referenced(m.id, &what, span)?, Some(m.object))
        }
        Expr::Index(index) => return prepare_index(compiler, index, ty, elements_by_address),
        other => {
            return Err(LoweringError::other(
                format!("{} is not assignable", other.kind_name()),
                span,
            ));
        }
    };

    prepare_symbol(compiler, symbol, receiver, ty, span)
}

fn prepare_symbol<'m>(
    compiler: &mut ExprCompiler<'_, 'm>,
    symbol: &'m Symbol,
    receiver: Option<&Expr<'_>>,
    ty: SemanticType,
    span: Span,
) -> Result<Prepared<'m>> {
    let mut operands = Vec::new();
    let place = match &symbol.kind {
        SymbolKind::Local { constant: None, .. } => Place::Local(compiler.local_slot(symbol, span)?),
        SymbolKind::Parameter {
            ref_kind: RefKind::None,
            ..
        } => Place::Arg(compiler.arg_slot(symbol, span)?),
        SymbolKind::Parameter { ty: param_ty, .. } => {
            let slot = compiler.arg_slot(symbol, span)?;
            compiler.emitter().ldarg(slot);
            let resolved = compiler.resolve(param_ty, span)?;
            operands.push(TypeExpr::by_ref(resolved.expr.clone()));
            Place::Indirect(resolved)
        }
        SymbolKind::Field(field) if field.constant.is_none() => {
            let target = compiler.ctx().field_ref(symbol, span)?;
            if field.is_static {
                Place::StaticField(target)
            } else {
                operands.push(receiver_type(compiler, symbol, receiver, span)?);
                compiler.lower_receiver(receiver, symbol, span)?;
                Place::InstanceField(target)
            }
        }
        SymbolKind::Event(event) => {
            let backing = event.backing_field.ok_or_else(|| {
                LoweringError::other(format!("event '{}' has no backing field", symbol.name), span)
            })?;
            let field = compiler.ctx().symbol(backing, span)?;
            return prepare_symbol(compiler, field, receiver, ty, span);
        }
        SymbolKind::Property(_) => {
            let setter = member::setter_of(compiler, symbol, span)?;
            let mut by_address = false;
            if !setter.is_static() {
                operands.push(receiver_type(compiler, setter, receiver, span)?);
                by_address = compiler.lower_receiver(receiver, setter, span)?;
            }
            Place::Property {
                property: symbol,
                setter,
                by_address,
            }
        }
        _ => {
            return Err(LoweringError::other(
                format!("'{}' is not assignable", symbol.name),
                span,
            ));
        }
    };
    Ok(Prepared { place, operands, ty })
}

fn prepare_index<'m>(
    compiler: &mut ExprCompiler<'_, 'm>,
    index: &ilweave_syntax::ast::IndexExpr<'_>,
    ty: SemanticType,
    elements_by_address: bool,
) -> Result<Prepared<'m>> {
    let span = index.span;

    if let Some(property) = compiler.ctx().model().referenced_symbol(index.id)
        && matches!(property.kind, SymbolKind::Property(_))
    {
        let setter = member::setter_of(compiler, property, span)?;
        let mut operands = Vec::new();
        let mut by_address = false;
        if !setter.is_static() {
            operands.push(receiver_type(compiler, setter, Some(index.object), span)?);
            by_address = compiler.lower_receiver(Some(index.object), setter, span)?;
        }
        let index_ty = compiler.converted_type(index.index)?;
        operands.push(compiler.resolve(&index_ty, span)?.expr);
        compiler.lower(index.index)?;
        return Ok(Prepared {
            place: Place::Property {
                property,
                setter,
                by_address,
            },
            operands,
            ty,
        });
    }

    if !member::is_array_access(compiler, index)? {
        return Err(LoweringError::other("element access is not assignable", span));
    }
    let container = compiler.converted_type(index.object)?;
    let element = compiler.resolve(&ty, span)?;

    if elements_by_address || !container.is_array() {
        member::element_address(compiler, index)?;
        return Ok(Prepared {
            operands: vec![TypeExpr::by_ref(element.expr.clone())],
            place: Place::Indirect(element),
            ty,
        });
    }

    let array = compiler.resolve(&container, span)?.expr;
    let index_ty = compiler.converted_type(index.index)?;
    let index_expr = compiler.resolve(&index_ty, span)?.expr;
    compiler.lower(index.object)?;
    compiler.lower(index.index)?;
    Ok(Prepared {
        place: Place::Element(element),
        operands: vec![array, index_expr],
        ty,
    })
}

/// Type of the receiver slot for `member`: a by-ref for value types.
fn receiver_type(
    compiler: &mut ExprCompiler<'_, '_>,
    member: &Symbol,
    receiver: Option<&Expr<'_>>,
    span: Span,
) -> Result<TypeExpr> {
    let ty = match receiver {
        Some(expr) => compiler.converted_type(expr)?,
        None => member.containing_type.clone().ok_or_else(|| LoweringError::UnresolvedSymbol {
            what: format!("declaring type of '{}'", member.name),
            span,
        })?,
    };
    let resolved = compiler.resolve(&ty, span)?;
    if resolved.is_value_type() && !matches!(ty, SemanticType::Pointer(_) | SemanticType::FunctionPointer { .. }) {
        Ok(TypeExpr::by_ref(resolved.expr))
    } else {
        Ok(resolved.expr)
    }
}

/// Make the operands of `prepared` available again: `dup` for one, spill
/// and reload for several. Returns how to reload them once more.
fn duplicate_operands(compiler: &mut ExprCompiler<'_, '_>, prepared: &Prepared<'_>) -> Operands {
    match prepared.operands.len() {
        0 => Operands::None,
        1 => {
            compiler.emitter().emit(OpCode::Dup);
            Operands::Stack
        }
        _ => {
            let temps: Vec<u16> = prepared
                .operands
                .iter()
                .map(|ty| compiler.temp_of("operand", ty.clone()))
                .collect();
            let emitter = compiler.emitter();
            for temp in temps.iter().rev() {
                emitter.stloc(*temp);
            }
            for _ in 0..2 {
                for temp in &temps {
                    emitter.ldloc(*temp);
                }
            }
            Operands::Spilled(temps)
        }
    }
}

// =============================================================================
// Assignment
// =============================================================================

/// Lower `target op= value`. With `keep` the assigned value is left on the
/// stack.
pub fn compile_assign(compiler: &mut ExprCompiler<'_, '_>, assign: &AssignExpr<'_>, keep: bool) -> Result<()> {
    let span = assign.span;
    match assign.op {
        AssignOp::Assign => compile_simple(compiler, assign.target, assign.value, keep, span),
        AssignOp::CoalesceAssign => compile_coalesce_assign(compiler, assign, keep),
        op => {
            let Some(bop) = op.binary_op() else {
                return Err(LoweringError::unsupported(format!("'{op}' assignment"), span));
            };
            if let Some(event) = event_target(compiler, assign.target)
                && matches!(bop, BinaryOp::Add | BinaryOp::Sub)
            {
                return compile_event_accessor(compiler, assign, event, bop == BinaryOp::Add, keep);
            }
            compile_compound(compiler, assign, bop, keep)
        }
    }
}

fn compile_simple(
    compiler: &mut ExprCompiler<'_, '_>,
    target: &Expr<'_>,
    value: &Expr<'_>,
    keep: bool,
    span: Span,
) -> Result<()> {
    if !keep
        && let Some(creation) = creation::is_default_construction(compiler, value)?
        && is_storage_location(compiler, target)?
    {
        compiler.lower_address(target)?;
        return creation::initialize_at_address(compiler, creation);
    }

    let prepared = prepare(compiler, target, false)?;
    if prepared.operands.is_empty() {
        compiler.lower(value)?;
        if keep {
            compiler.emitter().emit(OpCode::Dup);
        }
        prepared.place.store(compiler, span)?;
        return Ok(());
    }

    let store = prepared.place.store(compiler, span)?;
    let checkpoint = compiler.emitter().checkpoint();
    compiler.lower(value)?;
    let temp = if keep {
        let temp = compiler.temp("assign.value", &prepared.ty, span)?;
        let emitter = compiler.emitter();
        emitter.emit(OpCode::Dup);
        emitter.stloc(temp);
        Some(temp)
    } else {
        None
    };
    compiler.emitter().relocate_since(checkpoint, store);
    if let Some(temp) = temp {
        compiler.emitter().ldloc(temp);
    }
    Ok(())
}

/// Whether `target` names a location whose address can be taken directly.
fn is_storage_location(compiler: &ExprCompiler<'_, '_>, target: &Expr<'_>) -> Result<bool> {
    let model = compiler.ctx.model();
    Ok(match target.unparenthesized() {
        Expr::Ident(ident) => model
            .referenced_symbol(ident.id)
            .is_some_and(identifiers::is_addressable),
        Expr::Member(m) => model
            .referenced_symbol(m.id)
            .is_some_and(identifiers::is_addressable),
        Expr::Index(index) => member::is_array_access(compiler, index)?,
        Expr::This(_) => true,
        _ => false,
    })
}

fn compile_compound(
    compiler: &mut ExprCompiler<'_, '_>,
    assign: &AssignExpr<'_>,
    bop: BinaryOp,
    keep: bool,
) -> Result<()> {
    let span = assign.span;
    let prepared = prepare(compiler, assign.target, true)?;
    let operands = duplicate_operands(compiler, &prepared);
    prepared.place.load(compiler, span)?;

    let target_ty = prepared.ty.clone();
    let value_ty = compiler.converted_type(assign.value)?;
    let op_ty = operation_type(bop, &target_ty, &value_ty);
    if op_ty != target_ty {
        compiler.emit_conversion(&target_ty, &op_ty, span)?;
    }

    let is_shift = matches!(bop, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr);
    let widen_value = !is_shift && op_ty != value_ty && value_ty.numeric_kind().is_some();
    let resolution = if bop == BinaryOp::Add && target_ty.is_string() {
        let static_value = compiler.static_type(assign.value)?;
        resolve_binary(bop, &target_ty, &static_value, span)?
    } else if widen_value {
        resolve_binary(bop, &op_ty, &op_ty, span)?
    } else {
        resolve_binary(bop, &op_ty, &value_ty, span)?
    };
    compiler.lower(assign.value)?;
    if widen_value {
        compiler.emit_conversion(&value_ty, &op_ty, span)?;
    }
    if matches!(resolution, OperatorResolution::StringConcat { boxed: true }) {
        compiler.box_if_value(&value_ty, span)?;
    }
    binary::emit_operator(compiler, &resolution);

    if op_ty != target_ty {
        compiler.emit_conversion(&op_ty, &target_ty, span)?;
    }
    finish_store(compiler, &prepared, operands, keep, span)
}

/// Type the operation is carried out in: both sides promoted to at least
/// `int`, then the wider of the two. Shift counts never widen the target.
fn operation_type(bop: BinaryOp, target: &SemanticType, value: &SemanticType) -> SemanticType {
    let (Some(t), Some(v)) = (target.numeric_kind(), value.numeric_kind()) else {
        return target.clone();
    };
    if t == PrimitiveKind::Bool || target.is_enum() {
        return target.clone();
    }
    let promote = |k: PrimitiveKind| {
        if k.is_integral() && k.bits() < 32 {
            PrimitiveKind::Int32
        } else {
            k
        }
    };
    if matches!(bop, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr) {
        return SemanticType::Primitive(promote(t));
    }
    let (t, v) = (promote(t), promote(v));
    let wider = match (t.is_floating(), v.is_floating()) {
        (false, true) => v,
        (true, false) => t,
        _ if v.bits() > t.bits() => v,
        _ => t,
    };
    SemanticType::Primitive(wider)
}

/// Store the computed value on top of the stack to `prepared`, keeping a
/// copy when asked.
fn finish_store<'m>(
    compiler: &mut ExprCompiler<'_, 'm>,
    prepared: &Prepared<'m>,
    operands: Operands,
    keep: bool,
    span: Span,
) -> Result<()> {
    let temp = match (&operands, keep) {
        (_, false) => None,
        (Operands::None, true) => {
            compiler.emitter().emit(OpCode::Dup);
            None
        }
        (_, true) => {
            let temp = compiler.temp("assign.value", &prepared.ty, span)?;
            let emitter = compiler.emitter();
            emitter.emit(OpCode::Dup);
            emitter.stloc(temp);
            Some(temp)
        }
    };
    prepared.place.store(compiler, span)?;
    if let Some(temp) = temp {
        compiler.emitter().ldloc(temp);
    }
    Ok(())
}

/// `target ??= value`, for locals, parameters and static fields.
fn compile_coalesce_assign(compiler: &mut ExprCompiler<'_, '_>, assign: &AssignExpr<'_>, keep: bool) -> Result<()> {
    let span = assign.span;
    let checkpoint = compiler.emitter().checkpoint();
    let prepared = prepare(compiler, assign.target, false)?;
    if !prepared.operands.is_empty() {
        compiler.emitter().rollback(checkpoint);
        return Err(LoweringError::unsupported("null-coalescing assignment to a member", span));
    }

    let end = compiler.emitter().new_label("coalesce.end");
    prepared.place.load(compiler, span)?;
    if keep {
        compiler.emitter().emit(OpCode::Dup);
        compiler.emitter().emit_branch(OpCode::Brtrue, end);
        compiler.emitter().emit(OpCode::Pop);
        compiler.lower(assign.value)?;
        compiler.emitter().emit(OpCode::Dup);
    } else {
        compiler.emitter().emit_branch(OpCode::Brtrue, end);
        compiler.lower(assign.value)?;
    }
    prepared.place.store(compiler, span)?;
    compiler.emitter().place(end)?;
    Ok(())
}

// =============================================================================
// Events
// =============================================================================

fn event_target<'m>(compiler: &ExprCompiler<'_, 'm>, target: &Expr<'_>) -> Option<&'m Symbol> {
    let id = match target.unparenthesized() {
        Expr::Ident(ident) => ident.id,
        Expr::Member(m) => m.id,
        _ => return None,
    };
    compiler
        .ctx
        .model()
        .referenced_symbol(id)
        .filter(|s| matches!(s.kind, SymbolKind::Event(_)))
}

/// `event += handler` / `event -= handler`: a call to the add or remove
/// accessor.
fn compile_event_accessor(
    compiler: &mut ExprCompiler<'_, '_>,
    assign: &AssignExpr<'_>,
    event: &Symbol,
    add: bool,
    keep: bool,
) -> Result<()> {
    let span = assign.span;
    if keep {
        return Err(LoweringError::other(
            format!("event accessor '{}' used as a value", event.name),
            span,
        ));
    }
    let accessor = event
        .as_event()
        .and_then(|e| if add { e.add } else { e.remove })
        .ok_or_else(|| LoweringError::other(format!("event '{}' has no accessor", event.name), span))?;
    let accessor = compiler.ctx().symbol(accessor, span)?;

    let receiver = match assign.target.unparenthesized() {
        Expr::Member(m) => Some(m.object),
        _ => None,
    };
    let by_address = compiler.lower_receiver(receiver, accessor, span)?;
    compiler.lower(assign.value)?;
    let target = compiler.ctx().method_ref(accessor, span)?;
    compiler.emitter().emit_method(call_opcode(accessor, by_address), target);
    Ok(())
}

// =============================================================================
// Increments
// =============================================================================

/// `++x`, `x++`, `--x`, `x--` on any assignable target.
pub(super) fn compile_increment(
    compiler: &mut ExprCompiler<'_, '_>,
    operand: &Expr<'_>,
    decrement: bool,
    prefix: bool,
    keep: bool,
    span: Span,
) -> Result<()> {
    let ty = compiler.static_type(operand)?;
    let step = increment(&ty, decrement).ok_or_else(|| LoweringError::UnsupportedOperator {
        op: if decrement { "--" } else { "++" }.to_string(),
        left: ty.to_string(),
        right: String::new(),
        span,
    })?;

    let prepared = prepare(compiler, operand, true)?;
    let operands = duplicate_operands(compiler, &prepared);
    prepared.place.load(compiler, span)?;

    let spill = keep && !matches!(operands, Operands::None);
    let temp = if spill {
        Some(compiler.temp("inc.value", &ty, span)?)
    } else {
        None
    };

    let keep_copy = |compiler: &mut ExprCompiler<'_, '_>| {
        let emitter = compiler.emitter();
        emitter.emit(OpCode::Dup);
        if let Some(temp) = temp {
            emitter.stloc(temp);
        }
    };

    if keep && !prefix {
        keep_copy(compiler);
    }
    step.emit(compiler.emitter());
    if keep && prefix {
        keep_copy(compiler);
    }
    prepared.place.store(compiler, span)?;
    if let Some(temp) = temp {
        compiler.emitter().ldloc(temp);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::testing::{body_listing, declare_test_local};
    use bumpalo::Bump;
    use ilweave_core::{PrimitiveKind, SemanticType, TypeKind};
    use ilweave_syntax::ast::{AssignOp, PostfixOp};
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn field_store_value_follows_receiver() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let node = b.imported_type("Demo", "Node", TypeKind::Class);
        let value = b.field_symbol(&node, "Value", SemanticType::INT32, false);
        let n = b.local_symbol("n", node.clone());
        let read = b.ident(n);
        let target = b.member(read, value);
        let seven = b.int(7);
        let assign = b.assign(target, seven);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, n)?;
            c.lower_discard(assign)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc n",
                "ldc.i4.7",
                "stfld Import(Import(\"Demo.Node\"), \"Value\")",
                "ret"
            ]
        );
    }

    #[test]
    fn kept_property_assignment_reloads_value() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let node = b.imported_type("Demo", "Node", TypeKind::Class);
        let name = b.property_symbol(&node, "Name", SemanticType::STRING, false, false);
        let n = b.local_symbol("n", node.clone());
        let s = b.local_symbol("s", SemanticType::STRING);
        let read = b.ident(n);
        let target = b.member(read, name.member);
        let text = b.string("x");
        let inner = b.assign(target, text);
        let outer_target = b.ident(s);
        let outer = b.assign(outer_target, inner);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, n)?;
            declare_test_local(c, s)?;
            c.lower_discard(outer)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc n",
                "ldstr \"x\"",
                "dup",
                "stloc assign.value",
                "call Import(Import(\"Demo.Node\"), \"set_Name\")",
                "ldloc assign.value",
                "stloc s",
                "ret"
            ]
        );
    }

    #[test]
    fn compound_on_byte_widens_and_truncates() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let byte = SemanticType::Primitive(PrimitiveKind::UInt8);
        let x = b.local_symbol("x", byte);
        let target = b.ident(x);
        let three = b.int(3);
        let add = b.assign_op(AssignOp::AddAssign, target, three);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, x)?;
            c.lower_discard(add)
        });
        assert_eq!(
            listing,
            vec!["ldloc x", "ldc.i4.3", "add", "conv.u1", "stloc x", "ret"]
        );
    }

    #[test]
    fn kept_compound_on_field_parks_the_result() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let node = b.imported_type("Demo", "Node", TypeKind::Class);
        let value = b.field_symbol(&node, "Value", SemanticType::INT32, false);
        let n = b.local_symbol("n", node.clone());
        let total = b.local_symbol("total", SemanticType::INT32);
        let read = b.ident(n);
        let target = b.member(read, value);
        let two = b.int(2);
        let inner = b.assign_op(AssignOp::AddAssign, target, two);
        let outer_target = b.ident(total);
        let outer = b.assign(outer_target, inner);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, n)?;
            declare_test_local(c, total)?;
            c.lower_discard(outer)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc n",
                "dup",
                "ldfld Import(Import(\"Demo.Node\"), \"Value\")",
                "ldc.i4.2",
                "add",
                "dup",
                "stloc assign.value",
                "stfld Import(Import(\"Demo.Node\"), \"Value\")",
                "ldloc assign.value",
                "stloc total",
                "ret"
            ]
        );
    }

    #[test]
    fn compound_on_array_element_goes_through_address() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let xs = b.local_symbol("xs", SemanticType::array_of(SemanticType::INT32));
        let read = b.ident(xs);
        let zero = b.int(0);
        let element = b.index(read, zero, SemanticType::INT32);
        let two = b.int(2);
        let mul = b.assign_op(AssignOp::MulAssign, element, two);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, xs)?;
            c.lower_discard(mul)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc xs",
                "ldc.i4.0",
                "ldelema TypeSystem.Int32",
                "dup",
                "ldind.i4",
                "ldc.i4.2",
                "mul",
                "stind.i4",
                "ret"
            ]
        );
    }

    #[test]
    fn type_parameter_elements_use_typed_access() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let t = SemanticType::TypeParameter {
            name: "T".into(),
            ordinal: 0,
            method_owned: true,
        };
        let arr = b.local_symbol("arr", SemanticType::array_of(t.clone()));
        let v = b.local_symbol("v", t.clone());
        let read = b.ident(arr);
        let zero = b.int(0);
        let slot = b.index(read, zero, t.clone());
        let value = b.ident(v);
        let store = b.assign(slot, value);
        let read = b.ident(arr);
        let one = b.int(1);
        let element = b.index(read, one, t.clone());
        let target = b.ident(v);
        let load = b.assign(target, element);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, arr)?;
            declare_test_local(c, v)?;
            c.lower_discard(store)?;
            c.lower_discard(load)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc arr",
                "ldc.i4.0",
                "ldloc v",
                "stelem.any !!T",
                "ldloc arr",
                "ldc.i4.1",
                "ldelem.any !!T",
                "stloc v",
                "ret"
            ]
        );
    }

    #[test]
    fn string_append_concatenates() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let s = b.local_symbol("s", SemanticType::STRING);
        let target = b.ident(s);
        let tail = b.string("!");
        let append = b.assign_op(AssignOp::AddAssign, target, tail);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            declare_test_local(c, s)?;
            c.lower_discard(append)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc s",
                "ldstr \"!\"",
                "call Import(TypeSystem.String, \"Concat\")",
                "stloc s",
                "ret"
            ]
        );
    }

    #[test]
    fn postfix_on_indexer_spills_operands() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let list = b.imported_type("Demo", "Counter", TypeKind::Class);
        let item = b.property_symbol(&list, "Item", SemanticType::INT32, false, false);
        let c = b.local_symbol("c", list.clone());
        let read = b.ident(c);
        let zero = b.int(0);
        let element = b.indexer(read, zero, item.member);
        let inc = b.postfix(PostfixOp::PostInc, element);
        let model = b.finish();

        let listing = body_listing(&model, false, |comp| {
            declare_test_local(comp, c)?;
            comp.lower_discard(inc)
        });
        assert_eq!(
            listing,
            vec![
                "ldloc c",
                "ldc.i4.0",
                "stloc operand",
                "stloc operand",
                "ldloc operand",
                "ldloc operand",
                "ldloc operand",
                "ldloc operand",
                "call Import(Import(\"Demo.Counter\"), \"get_Item\")",
                "ldc.i4.1",
                "add",
                "call Import(Import(\"Demo.Counter\"), \"set_Item\")",
                "ret"
            ]
        );
    }

    #[test]
    fn coalesce_assignment_on_member_is_a_gap() {
        use crate::context::LoweringContext;
        use crate::emit::BodyEmitter;
        use crate::expr::ExprCompiler;
        use crate::options::LoweringOptions;

        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let node = b.imported_type("Demo", "Node", TypeKind::Class);
        let next = b.field_symbol(&node, "Next", node.clone(), false);
        let n = b.local_symbol("n", node.clone());
        let read = b.ident(n);
        let target = b.member(read, next);
        let fallback = b.null(node.clone());
        let assign = b.assign_op(AssignOp::CoalesceAssign, target, fallback);
        let model = b.finish();

        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let mut emitter = BodyEmitter::new("m", false);
        let mut compiler = ExprCompiler::new(&mut ctx, &mut emitter);
        crate::testing::declare_test_local(&mut compiler, n).unwrap();
        let err = compiler.lower_discard(assign).unwrap_err();
        assert!(err.is_gap());
        assert!(emitter.instructions().is_empty());
    }
}
