//! Methods, operators, constructors and accessors.
//!
//! Every method is defined with `DefineMethod` followed by one
//! `DefineParameter` per parameter. Its body, if it has one, is lowered by a
//! [`FunctionCompiler`] inside the method's scope and attached with
//! `SetBody`. Abstract, extern and interface methods have no body.
//!
//! Constructor prologues, in order:
//!
//! 1. field initializers (instance ones unless the constructor chains to
//!    `this(...)`; static ones for the static constructor)
//! 2. the `base(...)` or `this(...)` call, or the implicit parameterless base
//!    constructor call for classes
//! 3. the declared body

use ilweave_core::{LoweringError, Span, Symbol};
use ilweave_syntax::ast::{Block, ConstructorDecl, CtorInitializer, CtorInitializerKind, MethodDecl};
use tracing::debug;

use crate::attributes::MethodAttributes;
use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::definitions::DefId;
use crate::expr::{lower_args, ExprCompiler};
use crate::field_init::{compile_instance_inits, compile_static_inits};
use crate::function_compiler::FunctionCompiler;
use crate::output::BuilderCall;
use crate::type_resolver::well_known;

use super::types::is_static_constructor;
use super::{DeclLowerer, Result, TypeState};

/// Body of an accessor that has none in source.
#[derive(Debug, Clone, Copy)]
pub(super) enum SynthesizedBody<'m> {
    /// Auto-property getter: return the backing field.
    Load(&'m Symbol),
    /// Auto-property setter: store `value` into the backing field.
    Store(&'m Symbol),
    /// Field-like event accessor: `field = (T)Delegate.<combine>(field, value)`.
    Combine { field: &'m Symbol, combine: &'static str },
}

impl SynthesizedBody<'_> {
    fn emit(self, exprs: &mut ExprCompiler<'_, '_>, span: Span) -> Result<()> {
        match self {
            SynthesizedBody::Load(field) => {
                let target = exprs.ctx().field_ref(field, span)?;
                let emitter = exprs.emitter();
                if target.is_static {
                    emitter.emit_field(OpCode::Ldsfld, target);
                } else {
                    emitter.ldarg(0);
                    emitter.emit_field(OpCode::Ldfld, target);
                }
                emitter.emit_return();
            }
            SynthesizedBody::Store(field) => {
                let target = exprs.ctx().field_ref(field, span)?;
                let emitter = exprs.emitter();
                if target.is_static {
                    emitter.ldarg(0);
                    emitter.emit_field(OpCode::Stsfld, target);
                } else {
                    emitter.ldarg(0);
                    emitter.ldarg(1);
                    emitter.emit_field(OpCode::Stfld, target);
                }
            }
            SynthesizedBody::Combine { field, combine } => {
                let target = exprs.ctx().field_ref(field, span)?;
                let delegate_type = match field.ty() {
                    Some(ty) => exprs.resolve(ty, span)?.expr,
                    None => well_known::delegate(),
                };
                let method = LoweringContext::runtime_method(
                    well_known::delegate(),
                    combine,
                    vec![well_known::delegate(), well_known::delegate()],
                    Some(well_known::delegate()),
                    false,
                );
                let value = if target.is_static { 0 } else { 1 };
                let emitter = exprs.emitter();
                if target.is_static {
                    emitter.emit_field(OpCode::Ldsfld, target.clone());
                } else {
                    emitter.ldarg(0);
                    emitter.ldarg(0);
                    emitter.emit_field(OpCode::Ldfld, target.clone());
                }
                emitter.ldarg(value);
                emitter.emit_method(OpCode::Call, method);
                emitter.emit_type(OpCode::Castclass, delegate_type);
                let store = if target.is_static { OpCode::Stsfld } else { OpCode::Stfld };
                emitter.emit_field(store, target);
            }
        }
        Ok(())
    }
}

impl<'a, 'm> DeclLowerer<'a, 'm> {
    /// `DefineMethod` and its `DefineParameter`s.
    pub(super) fn define_method(
        &mut self,
        symbol: &Symbol,
        state: &TypeState<'_, 'm>,
        span: Span,
    ) -> Result<(DefId, String)> {
        let method = symbol.as_method().ok_or_else(|| LoweringError::UnresolvedSymbol {
            what: format!("method '{}'", symbol.name),
            span,
        })?;
        let (def, handle) = self.ctx.define_symbol(symbol, span)?;
        let return_type = self.ctx.resolve_type(&method.return_type, span)?.expr;
        let mut attributes = MethodAttributes::for_method(method);
        if state.is_interface() && !method.is_static {
            attributes |= MethodAttributes::ABSTRACT | MethodAttributes::VIRTUAL | MethodAttributes::NEW_SLOT;
        }
        self.ctx.emit_call(BuilderCall::DefineMethod {
            handle: handle.clone(),
            declaring: state.handle.clone(),
            name: symbol.name.clone(),
            attributes,
            return_type,
        });
        for (index, param) in method.params.iter().enumerate() {
            let ty = self.ctx.resolve_type(&param.ty, span)?.expr;
            self.ctx.emit_call(BuilderCall::DefineParameter {
                method: handle.clone(),
                sequence: index as u16 + 1,
                name: param.name.clone(),
                ty,
                ref_kind: param.ref_kind,
            });
        }
        Ok((def, handle))
    }

    /// Lower a body inside the method's scope and attach it.
    fn lower_body(
        &mut self,
        def: DefId,
        symbol: &'m Symbol,
        handle: &str,
        span: Span,
        f: impl FnOnce(&mut FunctionCompiler<'_, 'm>) -> Result<()>,
    ) -> Result<()> {
        debug!(method = %symbol.name, %handle, "lowering body");
        let body = self.ctx.with_current(def, |ctx| {
            let mut compiler = FunctionCompiler::new(ctx, symbol, handle, span)?;
            f(&mut compiler)?;
            compiler.finish(span)
        })?;
        self.ctx.emit_call(BuilderCall::SetBody {
            method: handle.to_string(),
            body,
        });
        Ok(())
    }

    /// Methods and user-defined operators.
    pub(super) fn lower_method(&mut self, decl: &MethodDecl<'_>, state: &TypeState<'_, 'm>) -> Result<()> {
        let what = format!("method '{}'", decl.name.name);
        let symbol = self.ctx.declared(decl.id, &what, decl.span)?;
        let (def, handle) = self.define_method(symbol, state, decl.span)?;
        let Some(body) = &decl.body else {
            return Ok(());
        };
        self.lower_body(def, symbol, &handle, decl.span, |compiler| {
            compiler.setup_parameters(decl.params)?;
            compiler.compile_body(body)
        })
    }

    pub(super) fn lower_constructor(&mut self, decl: &ConstructorDecl<'_>, state: &TypeState<'_, 'm>) -> Result<()> {
        let span = decl.span;
        let symbol = self.ctx.declared(decl.id, "constructor", span)?;
        let (def, handle) = self.define_method(symbol, state, span)?;
        let Some(body) = &decl.body else {
            return Ok(());
        };
        let is_static = is_static_constructor(symbol);
        let chains_to_this = decl
            .initializer
            .is_some_and(|init| init.kind == CtorInitializerKind::This);
        let base = state
            .symbol
            .as_type()
            .and_then(|t| t.base.clone())
            .unwrap_or(ilweave_core::SemanticType::OBJECT);

        self.lower_body(def, symbol, &handle, span, |compiler| {
            compiler.setup_parameters(decl.params)?;
            {
                let mut exprs = compiler.exprs();
                if is_static {
                    compile_static_inits(&mut exprs, &state.inits.statics)?;
                } else {
                    if !chains_to_this {
                        compile_instance_inits(&mut exprs, &state.inits.instance)?;
                    }
                    match &decl.initializer {
                        Some(init) => chain_constructor(&mut exprs, init)?,
                        None if !state.is_value_type() => {
                            let base_ctor = exprs.ctx().default_ctor_ref(&base, span)?;
                            exprs.emitter().ldarg(0);
                            exprs.emitter().emit_method(OpCode::Call, base_ctor);
                        }
                        None => {}
                    }
                }
            }
            compiler.compile_body(body)
        })
    }

    /// Define an accessor method and lower its body: the declared one, the
    /// synthesized one, or none for abstract accessors. Returns its handle.
    pub(super) fn lower_accessor(
        &mut self,
        symbol: &'m Symbol,
        body: Option<&Block<'_>>,
        synthesized: Option<SynthesizedBody<'m>>,
        state: &TypeState<'_, 'm>,
        span: Span,
    ) -> Result<String> {
        let (def, handle) = self.define_method(symbol, state, span)?;
        match (body, synthesized) {
            (Some(body), _) => {
                let params = symbol.as_method().map(|m| m.params.as_slice()).unwrap_or_default();
                self.lower_body(def, symbol, &handle, span, |compiler| {
                    for (ordinal, param) in params.iter().enumerate() {
                        compiler.declare_parameter(&param.name, ordinal as u16, span)?;
                    }
                    compiler.compile_body(body)
                })?;
            }
            (None, Some(synthesized)) => {
                self.lower_body(def, symbol, &handle, span, |compiler| {
                    synthesized.emit(&mut compiler.exprs(), span)
                })?;
            }
            (None, None) => {}
        }
        Ok(handle)
    }
}

/// `base(args)` / `this(args)`: call the target constructor on `this`.
fn chain_constructor(exprs: &mut ExprCompiler<'_, '_>, init: &CtorInitializer<'_>) -> Result<()> {
    let target = exprs
        .ctx()
        .referenced(init.id, "constructor initializer target", init.span)?;
    let params = target.as_method().map(|m| m.params.as_slice()).unwrap_or_default();
    exprs.emitter().ldarg(0);
    lower_args(exprs, init.args, params)?;
    let method = exprs.ctx().method_ref(target, init.span)?;
    exprs.emitter().emit_method(OpCode::Call, method);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LoweringOptions;
    use bumpalo::Bump;
    use ilweave_core::{SemanticType, TypeKind};
    use ilweave_syntax::ast::{BinaryOp, Member, TypeDeclKind};
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    fn body_of(calls: &[BuilderCall], handle: &str) -> Vec<String> {
        calls
            .iter()
            .find_map(|c| match c {
                BuilderCall::SetBody { method, body } if method == handle => Some(body.listing()),
                _ => None,
            })
            .unwrap_or_default()
    }

    #[test]
    fn methods_define_parameters_and_bodies() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let calc = b.source_type("Demo", "Calc", TypeKind::Class);
        let class = b.type_symbol(calc.clone(), None);
        let add = b.method_symbol(
            &calc,
            "Add",
            &[("a", SemanticType::INT32), ("b", SemanticType::INT32)],
            SemanticType::INT32,
            true,
        );
        let params = b.param_symbols(add);
        let lhs = b.ident(params[0]);
        let rhs = b.ident(params[1]);
        let sum = b.binary(BinaryOp::Add, lhs, rhs, SemanticType::INT32);
        let ret = b.ret(Some(sum));
        let body = b.block_of(&[ret]);
        let members = [b.method_decl(add, &params, Some(body))];
        let decl = b.type_decl(class, TypeDeclKind::Class, &members);
        let unit = b.unit(&[decl]);
        let model = b.finish();

        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        DeclLowerer::new(&mut ctx).lower_unit(&unit).unwrap();
        let calls = ctx.calls();
        assert!(matches!(
            &calls[1],
            BuilderCall::DefineMethod { handle, declaring, name, attributes, .. }
                if handle == "m_Add_2"
                    && declaring == "t_Calc_1"
                    && name == "Add"
                    && attributes.to_string() == "Public | Static | HideBySig"
        ));
        let params: Vec<(u16, &str)> = calls
            .iter()
            .filter_map(|c| match c {
                BuilderCall::DefineParameter { sequence, name, .. } => Some((*sequence, name.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(params, vec![(1, "a"), (2, "b")]);
        assert_eq!(body_of(calls, "m_Add_2"), vec!["ldarg A_0", "ldarg A_1", "add", "ret"]);
    }

    #[test]
    fn abstract_methods_have_no_body() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let shape = b.source_type("Demo", "IShape", TypeKind::Interface);
        let ty = b.type_symbol(shape.clone(), None);
        let area = b.method_symbol(&shape, "Area", &[], SemanticType::FLOAT64, false);
        let members = [b.method_decl(area, &[], None)];
        let decl = b.type_decl(ty, TypeDeclKind::Interface, &members);
        let unit = b.unit(&[decl]);
        let model = b.finish();

        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        DeclLowerer::new(&mut ctx).lower_unit(&unit).unwrap();
        assert!(!ctx.calls().iter().any(|c| matches!(c, BuilderCall::SetBody { .. })));
        assert!(ctx.calls().iter().any(|c| matches!(
            c,
            BuilderCall::DefineMethod { attributes, .. } if attributes.contains(MethodAttributes::ABSTRACT)
        )));
    }

    #[test]
    fn constructors_run_initializers_unless_chaining_to_this() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let app = b.source_type("Demo", "App", TypeKind::Class);
        let class = b.type_symbol(app.clone(), None);
        let count = b.field_symbol(&app, "count", SemanticType::INT32, false);
        let full = b.ctor_symbol(&app, &[("n", SemanticType::INT32)]);
        let empty = b.ctor_symbol(&app, &[]);
        let full_params = b.param_symbols(full);

        let seven = b.int(7);
        let zero = b.int(0);
        let args: &[&ilweave_syntax::ast::Expr<'_>] = &[zero];
        let full_body = b.block_of(&[]);
        let empty_body = b.block_of(&[]);
        let members: [Member<'_>; 3] = [
            b.field_decl(count, Some(seven)),
            b.ctor_decl(full, &full_params, None, full_body),
            b.ctor_decl(empty, &[], Some((CtorInitializerKind::This, full, args)), empty_body),
        ];
        let decl = b.type_decl(class, TypeDeclKind::Class, &members);
        let unit = b.unit(&[decl]);
        let model = b.finish();

        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        DeclLowerer::new(&mut ctx).lower_unit(&unit).unwrap();
        let calls = ctx.calls();
        let ctors: Vec<&str> = calls
            .iter()
            .filter_map(|c| match c {
                BuilderCall::DefineMethod { handle, name, .. } if name == ".ctor" => Some(handle.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ctors, vec!["m_ctor_3", "m_ctor_4"]);
        assert_eq!(
            body_of(calls, "m_ctor_3"),
            vec![
                "ldarg A_0",
                "ldc.i4.7",
                "stfld f_count_2",
                "ldarg A_0",
                "call Import(TypeSystem.Object, \".ctor\")",
                "ret"
            ]
        );
        assert_eq!(
            body_of(calls, "m_ctor_4"),
            vec!["ldarg A_0", "ldc.i4.0", "call m_ctor_3", "ret"]
        );
    }

    #[test]
    fn struct_constructors_do_not_chain_to_a_base() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let point = b.source_type("Demo", "Point", TypeKind::Struct);
        let ty = b.type_symbol(point.clone(), None);
        let x = b.field_symbol(&point, "x", SemanticType::INT32, false);
        let ctor = b.ctor_symbol(&point, &[("x", SemanticType::INT32)]);
        let params = b.param_symbols(ctor);
        let this = b.this(point.clone());
        let target = b.member(this, x);
        let value = b.ident(params[0]);
        let assign = b.assign(target, value);
        let assign = b.expr_stmt(assign);
        let body = b.block_of(&[assign]);
        let members = [b.field_decl(x, None), b.ctor_decl(ctor, &params, None, body)];
        let decl = b.type_decl(ty, TypeDeclKind::Struct, &members);
        let unit = b.unit(&[decl]);
        let model = b.finish();

        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        DeclLowerer::new(&mut ctx).lower_unit(&unit).unwrap();
        let listing = body_of(ctx.calls(), "m_ctor_3");
        assert!(!listing.iter().any(|line| line.starts_with("call")));
        assert_eq!(listing.last().map(String::as_str), Some("ret"));
    }
}
