//! Expression lowering.
//!
//! The [`ExprCompiler`] walks a typed expression and appends the
//! stack-machine code that evaluates it. Every fact it needs (types, bound
//! symbols, conversions, bound operations) comes from the semantic model;
//! nothing is re-derived here.
//!
//! Three entry points cover the contexts an expression can appear in:
//! - [`lower`](ExprCompiler::lower) leaves the value on the stack, converted
//!   to the type the consuming context expects
//! - [`lower_discard`](ExprCompiler::lower_discard) leaves nothing
//!   (expression statements, `for` updates)
//! - [`lower_address`](ExprCompiler::lower_address) leaves the address of a
//!   storage location (`ref` arguments, value-type receivers)
//!
//! Each syntax kind has its own module:
//! - `literals`: constants and `default`
//! - `identifiers`: locals, parameters, `this` and simple-name members
//! - `binary`, `unary`: operators, including short-circuit and increments
//! - `assignment`: simple and compound assignment to every storage kind
//! - `calls`: invocations and the evaluation-order fixer
//! - `member`: member access, element access and range slicing
//! - `creation`: `new` for objects, arrays and `stackalloc`
//! - `cast`: casts, `is`, `as` and `typeof`
//! - `ternary`: `?:`
//! - `delegates`: method groups converted to delegates or function pointers

mod assignment;
mod binary;
mod calls;
mod cast;
mod creation;
mod delegates;
mod identifiers;
mod literals;
mod member;
mod ternary;
mod unary;

pub(crate) use creation::{initialize_at_address, is_default_construction};
pub(crate) use calls::lower_args;

use ilweave_core::{
    ConstantValue, LoweringError, MemberKind, NodeId, PrimitiveKind, SemanticType, Span, Symbol,
    SymbolKind, TypeKind,
};
use ilweave_syntax::ast::Expr;
use tracing::trace;

use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::conversion::{plan_conversion, ConversionStep};
use crate::definitions::DefinitionVariable;
use crate::emit::BodyEmitter;
use crate::type_resolver::{ResolvedType, TypeExpr};

type Result<T> = std::result::Result<T, LoweringError>;

/// Lowers expressions of one method body.
pub struct ExprCompiler<'a, 'm> {
    ctx: &'a mut LoweringContext<'m>,
    emitter: &'a mut BodyEmitter,
}

impl<'a, 'm> ExprCompiler<'a, 'm> {
    pub fn new(ctx: &'a mut LoweringContext<'m>, emitter: &'a mut BodyEmitter) -> Self {
        Self { ctx, emitter }
    }

    pub fn ctx(&mut self) -> &mut LoweringContext<'m> {
        self.ctx
    }

    pub fn emitter(&mut self) -> &mut BodyEmitter {
        self.emitter
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Lower `expr` and leave its value on the stack, converted to the type
    /// its context expects.
    pub fn lower(&mut self, expr: &Expr<'_>) -> Result<()> {
        self.lower_raw(expr)?;
        self.convert(expr)
    }

    /// Lower `expr` for its side effects only.
    pub fn lower_discard(&mut self, expr: &Expr<'_>) -> Result<()> {
        match expr {
            Expr::Assign(assign) => assignment::compile_assign(self, assign, false),
            Expr::Postfix(postfix) => unary::compile_postfix(self, postfix, false),
            Expr::Unary(un) if un.op.is_increment() => unary::compile_unary(self, un, false),
            Expr::Paren(p) => self.lower_discard(p.expr),
            _ => {
                self.lower(expr)?;
                if !self.converted_type(expr)?.is_void() {
                    self.emitter.emit(OpCode::Pop);
                }
                Ok(())
            }
        }
    }

    /// Lower `expr` as a storage location and leave its address on the
    /// stack. Expressions that are not locations are evaluated into a
    /// temporary whose address is taken.
    pub fn lower_address(&mut self, expr: &Expr<'_>) -> Result<()> {
        let span = expr.span();
        match expr {
            Expr::Paren(p) => self.lower_address(p.expr),
            Expr::This(_) => {
                self.emitter.ldarg(0);
                Ok(())
            }
            Expr::Ident(ident) => match self.ctx.model().referenced_symbol(ident.id) {
                Some(symbol) if identifiers::is_addressable(symbol) => {
                    identifiers::address_of(self, symbol, None, span)
                }
                _ => self.spill_address(expr),
            },
            Expr::Member(m) => match self.ctx.model().referenced_symbol(m.id) {
                Some(symbol) if identifiers::is_addressable(symbol) => {
                    identifiers::address_of(self, symbol, Some(m.object), span)
                }
                _ => self.spill_address(expr),
            },
            Expr::Index(index) if member::is_array_access(self, index)? => {
                member::element_address(self, index)
            }
            _ => self.spill_address(expr),
        }
    }

    fn spill_address(&mut self, expr: &Expr<'_>) -> Result<()> {
        let span = expr.span();
        let ty = self.converted_type(expr)?;
        self.lower(expr)?;
        let temp = self.temp("tmp", &ty, span)?;
        self.emitter.stloc(temp);
        self.emitter.ldloca(temp);
        Ok(())
    }

    /// Lower `expr` without the conversion its context applies.
    fn lower_raw(&mut self, expr: &Expr<'_>) -> Result<()> {
        let span = expr.span();
        match expr {
            Expr::Literal(lit) => literals::compile_literal(self, lit),
            Expr::Ident(ident) => identifiers::compile_ident(self, ident),
            Expr::This(this) => identifiers::compile_this(self, this),
            Expr::Binary(bin) => binary::compile_binary(self, bin),
            Expr::Unary(un) => unary::compile_unary(self, un, true),
            Expr::Postfix(postfix) => unary::compile_postfix(self, postfix, true),
            Expr::Assign(assign) => assignment::compile_assign(self, assign, true),
            Expr::Conditional(cond) => ternary::compile_conditional(self, cond),
            Expr::Call(call) => calls::compile_call(self, call),
            Expr::Member(m) => member::compile_member(self, m),
            Expr::Index(index) => member::compile_index(self, index),
            Expr::ObjectCreation(creation) => creation::compile_object_creation(self, creation),
            Expr::ArrayCreation(creation) => creation::compile_array_creation(self, creation),
            Expr::StackAlloc(alloc) => creation::compile_stackalloc(self, alloc),
            Expr::Cast(cast) => cast::compile_cast(self, cast),
            Expr::Is(test) => cast::compile_is(self, test),
            Expr::As(test) => cast::compile_as(self, test),
            Expr::TypeOf(type_of) => cast::compile_typeof(self, type_of),
            Expr::Default(default) => literals::compile_default(self, default),
            Expr::Paren(p) => self.lower(p.expr),
            Expr::Range(_) | Expr::Lambda(_) | Expr::Await(_) => {
                Err(LoweringError::unsupported(expr.kind_name(), span))
            }
        }
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    /// Inject the conversion from the static type of `expr` to the type its
    /// context converts it to.
    fn convert(&mut self, expr: &Expr<'_>) -> Result<()> {
        let Some(info) = self.ctx.model().type_info(expr.id()) else {
            return Ok(());
        };
        if !info.has_conversion() {
            return Ok(());
        }
        self.emit_conversion(&info.ty, &info.converted, expr.span())
    }

    /// Emit the conversion from `from` to `to` as classified by the model.
    pub fn emit_conversion(&mut self, from: &SemanticType, to: &SemanticType, span: Span) -> Result<()> {
        let conversion = self.ctx.model().classify_conversion(from, to);
        trace!(%from, %to, conversion = conversion.name(), "injecting conversion");
        match plan_conversion(conversion, from, to, span)? {
            ConversionStep::Nothing => {}
            ConversionStep::Numeric(ops) => {
                for op in ops {
                    self.emitter.emit(op);
                }
            }
            ConversionStep::Box => {
                let ty = self.ctx.resolve_type(from, span)?;
                self.emitter.emit_type(OpCode::Box, ty.expr);
            }
            ConversionStep::UnboxAny => {
                let ty = self.ctx.resolve_type(to, span)?;
                self.emitter.emit_type(OpCode::Unbox_Any, ty.expr);
            }
            ConversionStep::Castclass => {
                let ty = self.ctx.resolve_type(to, span)?;
                self.emitter.emit_type(OpCode::Castclass, ty.expr);
            }
            ConversionStep::Call(method) => {
                let target = self.ctx.method_ref_of(method, span)?;
                self.emitter.emit_method(OpCode::Call, target);
            }
        }
        Ok(())
    }

    /// `box T` when `ty` is a value type.
    pub(crate) fn box_if_value(&mut self, ty: &SemanticType, span: Span) -> Result<()> {
        let resolved = self.ctx.resolve_type(ty, span)?;
        if resolved.needs_boxing() {
            self.emitter.emit_type(OpCode::Box, resolved.expr);
        }
        Ok(())
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Static type of `expr`.
    pub fn static_type(&self, expr: &Expr<'_>) -> Result<SemanticType> {
        Ok(self.ctx.type_info(expr.id(), expr.span())?.ty)
    }

    /// Type of `expr` after its context's conversion.
    pub fn converted_type(&self, expr: &Expr<'_>) -> Result<SemanticType> {
        Ok(self.ctx.type_info(expr.id(), expr.span())?.converted)
    }

    /// Static type recorded for a node that is not an expression, such as
    /// type syntax.
    pub(crate) fn static_type_of(&self, node: NodeId, span: Span) -> Result<SemanticType> {
        Ok(self.ctx.type_info(node, span)?.ty)
    }

    pub(crate) fn resolve(&mut self, ty: &SemanticType, span: Span) -> Result<ResolvedType> {
        self.ctx.resolve_type(ty, span)
    }

    /// Whether `expr` names a type (the receiver of a static member access).
    pub(crate) fn is_type_name(&self, expr: &Expr<'_>) -> bool {
        match expr.unparenthesized() {
            Expr::Ident(ident) => match self.ctx.model().referenced_symbol(ident.id) {
                None => true,
                Some(symbol) => matches!(symbol.kind, SymbolKind::Type(_)),
            },
            _ => false,
        }
    }

    // =========================================================================
    // Locals, arguments and temporaries
    // =========================================================================

    /// Allocate a synthetic local of type `ty`.
    pub fn temp(&mut self, name: &str, ty: &SemanticType, span: Span) -> Result<u16> {
        let resolved = self.ctx.resolve_type(ty, span)?;
        Ok(self.emitter.declare_local(name, resolved.expr))
    }

    /// Allocate a synthetic local with an already resolved type.
    pub(crate) fn temp_of(&mut self, name: &str, ty: TypeExpr) -> u16 {
        self.emitter.declare_local(name, ty)
    }

    /// Declare the local `symbol` in the innermost scope and allocate its
    /// slot.
    pub fn declare_local(&mut self, symbol: &Symbol, span: Span) -> Result<u16> {
        let ty = symbol.ty().ok_or_else(|| LoweringError::UnresolvedSymbol {
            what: format!("type of local '{}'", symbol.name),
            span,
        })?;
        let resolved = self.ctx.resolve_type(ty, span)?;
        let slot = self.emitter.declare_local(symbol.name.clone(), resolved.expr);

        let scope = self.ctx.defs.frame_scope();
        let handle = format!("{}#{}", self.emitter.method(), slot);
        let id = self.ctx.defs.register(
            DefinitionVariable::new(MemberKind::LocalVariable, scope, symbol.name.clone(), handle)
                .with_ordinal(slot)
                .at(span),
        )?;
        self.ctx.defs.push_active(id);
        Ok(slot)
    }

    /// Body-local slot of the local `symbol`.
    pub(crate) fn local_slot(&self, symbol: &Symbol, span: Span) -> Result<u16> {
        self.active_slot(MemberKind::LocalVariable, symbol, span)
    }

    /// Argument slot of the parameter `symbol`, `this` included.
    pub(crate) fn arg_slot(&self, symbol: &Symbol, span: Span) -> Result<u16> {
        self.active_slot(MemberKind::Parameter, symbol, span)
    }

    fn active_slot(&self, kind: MemberKind, symbol: &Symbol, span: Span) -> Result<u16> {
        let def = self.ctx.defs.lookup_active(kind, &symbol.name);
        if def.is_some_and(|def| def.skipped) {
            return Err(LoweringError::unsupported(
                format!("use of '{}' after its initializer was skipped", symbol.name),
                span,
            ));
        }
        def.and_then(|def| def.ordinal)
            .ok_or_else(|| LoweringError::MissingDefinition {
                kind: kind.to_string(),
                name: symbol.name.clone(),
                scope: self.ctx.defs.frame_scope(),
                span,
            })
    }

    // =========================================================================
    // Constants
    // =========================================================================

    /// Load a compile-time constant of type `ty`.
    pub fn emit_constant(&mut self, value: &ConstantValue, ty: &SemanticType) {
        let kind = ty.numeric_kind();
        let wide = matches!(kind, Some(PrimitiveKind::Int64 | PrimitiveKind::UInt64));
        match value {
            ConstantValue::Bool(b) => {
                self.emitter.emit_bool(*b);
            }
            ConstantValue::Char(c) => {
                self.emitter.emit_i32(*c as i32);
            }
            ConstantValue::Int(v) => self.emit_integer(*v, kind, wide),
            ConstantValue::UInt(v) => self.emit_integer(*v as i64, kind, wide),
            ConstantValue::Float32(v) => {
                self.emitter.emit_f32(*v);
            }
            ConstantValue::Float64(v) => {
                if kind == Some(PrimitiveKind::Float32) {
                    self.emitter.emit_f32(*v as f32);
                } else {
                    self.emitter.emit_f64(*v);
                }
            }
            ConstantValue::String(s) => {
                self.emitter.emit_string(s);
            }
            ConstantValue::Null => {
                self.emitter.emit_null();
            }
        }
    }

    fn emit_integer(&mut self, value: i64, kind: Option<PrimitiveKind>, wide: bool) {
        match kind {
            _ if wide => {
                self.emitter.emit_i64(value);
            }
            Some(PrimitiveKind::Float32) => {
                self.emitter.emit_f32(value as f32);
            }
            Some(PrimitiveKind::Float64) => {
                self.emitter.emit_f64(value as f64);
            }
            _ => {
                self.emitter.emit_i32(value as i32);
            }
        }
    }

    // =========================================================================
    // Receivers and calls
    // =========================================================================

    /// Load the receiver for an access to `member`. Returns `true` when the
    /// receiver was loaded by address (value-type instance members).
    ///
    /// Static members load nothing. A missing receiver means `this`.
    pub(crate) fn lower_receiver(
        &mut self,
        receiver: Option<&Expr<'_>>,
        member: &Symbol,
        span: Span,
    ) -> Result<bool> {
        if member.is_static() {
            return Ok(false);
        }
        let Some(receiver) = receiver else {
            self.emitter.ldarg(0);
            return Ok(member
                .containing_type
                .as_ref()
                .is_some_and(|t| t.is_value_type()));
        };
        if self.is_type_name(receiver) {
            return Err(LoweringError::other(
                format!("instance member '{}' accessed through a type name", member.name),
                span,
            ));
        }
        let ty = self.converted_type(receiver)?;
        let by_value = matches!(ty, SemanticType::Pointer(_) | SemanticType::FunctionPointer { .. });
        if ty.is_value_type() && !by_value {
            self.lower_address(receiver)?;
            Ok(true)
        } else {
            self.lower(receiver)?;
            Ok(false)
        }
    }
}

/// The call instruction for `method`: `call` for static and non-virtual
/// methods and for receivers loaded by address, `callvirt` otherwise.
pub(crate) fn call_opcode(method: &Symbol, by_address: bool) -> OpCode {
    let Some(info) = method.as_method() else {
        return OpCode::Call;
    };
    if info.is_static || by_address {
        return OpCode::Call;
    }
    let on_interface = method
        .containing_type
        .as_ref()
        .is_some_and(|t| type_kind(t) == Some(TypeKind::Interface));
    if info.is_virtual || info.is_abstract || info.is_override || on_interface {
        OpCode::Callvirt
    } else {
        OpCode::Call
    }
}

/// Kind of a named or constructed type.
pub(crate) fn type_kind(ty: &SemanticType) -> Option<TypeKind> {
    match ty {
        SemanticType::Named(named) => Some(named.kind),
        SemanticType::Generic { definition, .. } => Some(definition.kind),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LoweringOptions;
    use crate::testing::{body_listing, declare_test_local};
    use bumpalo::Bump;
    use ilweave_core::{PrimitiveKind, SemanticType};
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn constants_follow_their_type() {
        let model = ilweave_core::SemanticTable::new();
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let mut emitter = BodyEmitter::new("m", false);
        let mut compiler = ExprCompiler::new(&mut ctx, &mut emitter);

        compiler.emit_constant(&ConstantValue::Int(3), &SemanticType::INT32);
        compiler.emit_constant(&ConstantValue::Int(3), &SemanticType::INT64);
        compiler.emit_constant(&ConstantValue::Char('A'), &SemanticType::Primitive(PrimitiveKind::Char));
        compiler.emit_constant(&ConstantValue::Null, &SemanticType::OBJECT);

        let listing: Vec<String> = emitter.instructions().iter().map(|(_, i)| i.to_string()).collect();
        assert_eq!(listing, vec!["ldc.i4.3", "ldc.i8 3", "ldc.i4.s 65", "ldnull"]);
    }

    #[test]
    fn discarded_call_result_is_popped() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let app = b.source_type("Demo", "App", TypeKind::Class);
        let next = b.method_symbol(&app, "Next", &[], SemanticType::INT32, true);
        let call = b.call(next, None, &[]);
        let model = b.finish();

        let listing = body_listing(&model, false, |compiler| compiler.lower_discard(call));
        assert_eq!(listing[1..], ["pop".to_string(), "ret".to_string()]);
        assert!(listing[0].starts_with("call "));
    }

    #[test]
    fn boxing_is_injected_from_converted_type() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let x = b.local_symbol("x", SemanticType::INT32);
        let read = b.ident(x);
        let boxed = b.convert(read, SemanticType::OBJECT);
        let model = b.finish();

        let listing = body_listing(&model, false, |compiler| {
            declare_test_local(compiler, x)?;
            compiler.lower(boxed)?;
            compiler.emitter().emit(OpCode::Pop);
            Ok(())
        });
        assert_eq!(listing, vec!["ldloc x", "box TypeSystem.Int32", "pop", "ret"]);
    }

    #[test]
    fn type_parameter_is_boxed_on_its_way_to_object() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let t = SemanticType::TypeParameter {
            name: "T".into(),
            ordinal: 0,
            method_owned: false,
        };
        let item = b.local_symbol("item", t);
        let read = b.ident(item);
        let boxed = b.convert(read, SemanticType::OBJECT);
        let model = b.finish();

        let listing = body_listing(&model, false, |compiler| {
            declare_test_local(compiler, item)?;
            compiler.lower(boxed)?;
            compiler.emitter().emit(OpCode::Pop);
            Ok(())
        });
        assert_eq!(listing, vec!["ldloc item", "box !T", "pop", "ret"]);
    }

    #[test]
    fn address_of_non_location_spills_to_temp() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let seven = b.int(7);
        let model = b.finish();

        let listing = body_listing(&model, false, |compiler| {
            compiler.lower_address(seven)?;
            compiler.emitter().emit(OpCode::Pop);
            Ok(())
        });
        assert_eq!(listing, vec!["ldc.i4.7", "stloc tmp", "ldloca tmp", "pop", "ret"]);
    }

    #[test]
    fn lambdas_are_gaps() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let body = b.int(1);
        let lambda = b.lambda(body, SemanticType::OBJECT);
        let model = b.finish();

        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let mut emitter = BodyEmitter::new("m", false);
        let err = ExprCompiler::new(&mut ctx, &mut emitter).lower(lambda).unwrap_err();
        assert!(err.is_gap());
        assert!(err.to_string().contains("lambda expression"));
    }
}
