//! Type declarations.
//!
//! A type is defined before its members so that they can name it as their
//! declaring type. A forward stub registered by an earlier reference is
//! filled and keeps its handle. After the members, the type gets the
//! constructors it did not declare but needs:
//!
//! - classes without an instance constructor get a public parameterless one
//!   running the instance field initializers and the base constructor
//! - types with static field initializers but no static constructor get a
//!   `.cctor` running them

use ilweave_core::{
    LoweringError, MemberKind, MethodKind, PrimitiveKind, SemanticType, Span, Symbol, TypeKind,
};
use ilweave_syntax::ast::{Member, TypeDecl, TypeDeclKind};
use tracing::debug;

use crate::attributes::{FieldAttributes, MethodAttributes, TypeAttributes};
use crate::bytecode::{verify_body, MethodBody, OpCode};
use crate::context::LoweringContext;
use crate::emit::BodyEmitter;
use crate::expr::ExprCompiler;
use crate::field_init::{collect_field_inits, compile_instance_inits, compile_static_inits};
use crate::output::BuilderCall;
use crate::type_resolver::{well_known, TypeExpr};

use super::{DeclLowerer, Result, TypeState};

fn kind_of(decl: TypeDeclKind) -> TypeKind {
    match decl {
        TypeDeclKind::Class => TypeKind::Class,
        TypeDeclKind::Struct => TypeKind::Struct,
        TypeDeclKind::Interface => TypeKind::Interface,
        TypeDeclKind::Enum => TypeKind::Enum,
    }
}

pub(super) fn is_static_constructor(symbol: &Symbol) -> bool {
    symbol
        .as_method()
        .is_some_and(|m| m.is_static || m.method_kind == MethodKind::StaticConstructor)
}

/// Finish a synthesized body, verifying it when configured.
pub(super) fn seal_body(ctx: &LoweringContext<'_>, emitter: BodyEmitter, span: Span) -> Result<MethodBody> {
    let name = emitter.method().to_string();
    let body = emitter.finish()?;
    if ctx.options.verify_bodies {
        verify_body(&body)
            .map_err(|error| LoweringError::other(format!("invalid body for '{name}': {error}"), span))?;
    }
    Ok(body)
}

impl<'a, 'm> DeclLowerer<'a, 'm> {
    /// Define `decl` and lower its members. `declaring` is the handle of
    /// the enclosing type for nested types.
    pub(super) fn lower_type<'ast>(&mut self, decl: &TypeDecl<'ast>, declaring: Option<&str>) -> Result<()> {
        let span = decl.span;
        let what = format!("type '{}'", decl.name.name);
        let symbol = self.ctx.declared(decl.id, &what, span)?;
        let type_symbol = symbol
            .as_type()
            .ok_or_else(|| LoweringError::UnresolvedSymbol { what, span })?;
        let named = type_symbol.ty.as_named();
        let kind = named.map_or_else(|| kind_of(decl.kind), |n| n.kind);

        let (def, handle) = self.ctx.define_symbol(symbol, span)?;
        let base = match kind {
            TypeKind::Interface => None,
            TypeKind::Struct => Some(well_known::value_type()),
            TypeKind::Enum => Some(well_known::enum_base()),
            TypeKind::Delegate => Some(TypeExpr::import("System.MulticastDelegate")),
            TypeKind::Class => match &type_symbol.base {
                Some(base) => Some(self.ctx.resolve_type(base, span)?.expr),
                None => Some(well_known::object()),
            },
        };
        self.ctx.emit_call(BuilderCall::DefineType {
            handle: handle.clone(),
            namespace: named.map(|n| n.namespace.clone()).unwrap_or_default(),
            name: named.map_or_else(|| symbol.name.clone(), |n| n.metadata_name()),
            attributes: TypeAttributes::for_symbol(kind, type_symbol, declaring.is_some()),
            base,
            declaring: declaring.map(str::to_string),
        });
        for interface in &type_symbol.interfaces {
            let interface = self.ctx.resolve_type(interface, span)?.expr;
            self.ctx.emit_call(BuilderCall::AddInterface {
                ty: handle.clone(),
                interface,
            });
        }
        debug!(ty = %type_symbol.ty, %handle, members = decl.members.len(), "defining type");

        let inits = collect_field_inits(&*self.ctx, decl)?;
        let mut has_constructor = false;
        let mut has_static_constructor = false;
        for member in decl.members {
            if let Member::Constructor(ctor) = member {
                let ctor = self.ctx.declared(ctor.id, "constructor", ctor.span)?;
                if is_static_constructor(ctor) {
                    has_static_constructor = true;
                } else {
                    has_constructor = true;
                }
            }
        }
        let mut state = TypeState {
            handle,
            symbol,
            kind,
            inits,
            has_constructor,
            has_static_constructor,
        };

        self.ctx.with_current(def, |ctx| {
            let mut lowerer = DeclLowerer::new(ctx);
            if kind == TypeKind::Enum {
                lowerer.define_enum_value_field(&state, named.and_then(|n| n.underlying), span)?;
            }
            for member in decl.members {
                lowerer.lower_member(member, &mut state)?;
            }
            lowerer.implicit_constructors(&state, span)
        })
    }

    /// The `value__` field holding the value of an enum instance.
    fn define_enum_value_field(
        &mut self,
        state: &TypeState<'_, 'm>,
        underlying: Option<PrimitiveKind>,
        span: Span,
    ) -> Result<()> {
        let underlying = underlying.map_or(SemanticType::INT32, SemanticType::Primitive);
        let scope = state.symbol.ty().map(ToString::to_string).unwrap_or_default();
        let (_, handle) = self.ctx.define(MemberKind::Field, &scope, "value__", "value__", span)?;
        let ty = self.ctx.resolve_type(&underlying, span)?.expr;
        self.ctx.emit_call(BuilderCall::DefineField {
            handle,
            declaring: state.handle.clone(),
            name: "value__".to_string(),
            ty,
            attributes: FieldAttributes::PUBLIC | FieldAttributes::SPECIAL_NAME | FieldAttributes::RT_SPECIAL_NAME,
            constant: None,
        });
        Ok(())
    }

    fn implicit_constructors(&mut self, state: &TypeState<'_, 'm>, span: Span) -> Result<()> {
        let is_static_class = state.symbol.is_static();
        if state.kind == TypeKind::Class && !state.has_constructor && !is_static_class {
            self.implicit_constructor(state, false, span)?;
        }
        if !state.inits.statics.is_empty() && !state.has_static_constructor {
            self.implicit_constructor(state, true, span)?;
        }
        Ok(())
    }

    fn implicit_constructor(&mut self, state: &TypeState<'_, 'm>, is_static: bool, span: Span) -> Result<()> {
        let Some(type_symbol) = state.symbol.as_type() else {
            return Ok(());
        };
        let name = if is_static { ".cctor" } else { ".ctor" };
        let scope = type_symbol.ty.to_string();
        let (def, handle) = self
            .ctx
            .define(MemberKind::Method, &scope, &format!("{name}()"), name, span)?;
        let return_type = self.ctx.resolve_type(&SemanticType::VOID, span)?.expr;
        self.ctx.emit_call(BuilderCall::DefineMethod {
            handle: handle.clone(),
            declaring: state.handle.clone(),
            name: name.to_string(),
            attributes: MethodAttributes::implicit_constructor(is_static),
            return_type,
        });
        debug!(ty = %scope, %handle, is_static, "synthesizing constructor");

        let base = type_symbol.base.clone().unwrap_or(SemanticType::OBJECT);
        let body = self.ctx.with_current(def, |ctx| {
            let mut emitter = BodyEmitter::new(handle.clone(), false).record_spans(ctx.options.record_spans);
            {
                let mut exprs = ExprCompiler::new(ctx, &mut emitter);
                if is_static {
                    compile_static_inits(&mut exprs, &state.inits.statics)?;
                } else {
                    compile_instance_inits(&mut exprs, &state.inits.instance)?;
                    let base_ctor = exprs.ctx().default_ctor_ref(&base, span)?;
                    let emitter = exprs.emitter();
                    emitter.ldarg(0);
                    emitter.emit_method(OpCode::Call, base_ctor);
                }
            }
            emitter.emit_return();
            seal_body(ctx, emitter, span)
        })?;
        self.ctx.emit_call(BuilderCall::SetBody { method: handle, body });
        Ok(())
    }
}
