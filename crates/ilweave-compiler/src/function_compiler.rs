//! Function compiler for lowering one method body.
//!
//! [`FunctionCompiler`] owns the body emitter of a single method. It:
//!
//! - registers the parameters with their argument slots (`this` is slot 0
//!   for instance methods, so declared parameters start at 1)
//! - lowers the body statements through a [`StmtCompiler`]
//! - adds the implicit `ret` of void methods
//! - verifies the finished body when the options ask for it
//!
//! It must run inside [`LoweringContext::with_current`] for the method, so
//! the parameters land in the method's frame and disappear with it.
//!
//! # Example
//!
//! ```ignore
//! ctx.with_current(method_def, |ctx| {
//!     let mut compiler = FunctionCompiler::new(ctx, symbol, &handle, span)?;
//!     compiler.setup_parameters(decl.params)?;
//!     compiler.compile_body(&body)?;
//!     compiler.finish(span)
//! })
//! ```

use ilweave_core::{LoweringError, MemberKind, MethodSymbol, Span, Symbol, SymbolKind};
use ilweave_syntax::ast::{Block, Param};
use tracing::debug;

use crate::bytecode::{verify_body, MethodBody};
use crate::context::LoweringContext;
use crate::definitions::DefinitionVariable;
use crate::emit::BodyEmitter;
use crate::expr::ExprCompiler;
use crate::stmt::StmtCompiler;

type Result<T> = std::result::Result<T, LoweringError>;

/// Lowers a single method body.
pub struct FunctionCompiler<'a, 'm> {
    ctx: &'a mut LoweringContext<'m>,
    emitter: BodyEmitter,
    method: &'m Symbol,
    signature: &'m MethodSymbol,
    /// Diagnostics already reported when the body was started.
    gaps_before: usize,
}

impl<'a, 'm> FunctionCompiler<'a, 'm> {
    /// Start the body of `method`, defined under `handle`.
    pub fn new(ctx: &'a mut LoweringContext<'m>, method: &'m Symbol, handle: &str, span: Span) -> Result<Self> {
        let signature = method.as_method().ok_or_else(|| LoweringError::UnresolvedSymbol {
            what: format!("method '{}'", method.name),
            span,
        })?;
        let mut emitter =
            BodyEmitter::new(handle, signature.returns_value()).record_spans(ctx.options.record_spans);
        if signature.returns_value() {
            let ret = ctx.resolve_type(&signature.return_type, span)?;
            emitter = emitter.with_return_type(ret.expr);
        }
        let gaps_before = ctx.diagnostics().len();
        Ok(Self {
            ctx,
            emitter,
            method,
            signature,
            gaps_before,
        })
    }

    /// Make the declared parameters visible with their argument slots.
    pub fn setup_parameters(&mut self, params: &[Param<'_>]) -> Result<()> {
        for param in params {
            let what = format!("parameter '{}'", param.name.name);
            let symbol = self.ctx.declared(param.id, &what, param.span)?;
            let SymbolKind::Parameter { ordinal, .. } = symbol.kind else {
                return Err(LoweringError::other(format!("'{}' is not a parameter", symbol.name), param.span));
            };
            self.declare_parameter(&symbol.name, ordinal, param.span)?;
        }
        Ok(())
    }

    /// Make a parameter with no declaration node visible, such as the
    /// `value` of a setter.
    pub fn declare_parameter(&mut self, name: &str, ordinal: u16, span: Span) -> Result<u16> {
        let slot = if self.signature.is_static { ordinal } else { ordinal + 1 };
        let scope = self.ctx.defs.frame_scope();
        let handle = format!("{}.{}", self.emitter.method(), name);
        let id = self.ctx.defs.register(
            DefinitionVariable::new(MemberKind::Parameter, scope, name, handle)
                .with_ordinal(slot)
                .at(span),
        )?;
        self.ctx.defs.push_active(id);
        Ok(slot)
    }

    /// Expression compiler over this body, for prologue code.
    pub fn exprs(&mut self) -> ExprCompiler<'_, 'm> {
        ExprCompiler::new(self.ctx, &mut self.emitter)
    }

    pub fn emitter(&mut self) -> &mut BodyEmitter {
        &mut self.emitter
    }

    /// Lower the statements of the method body.
    pub fn compile_body(&mut self, body: &Block<'_>) -> Result<()> {
        let mut stmts = StmtCompiler::new(self.ctx, &mut self.emitter);
        stmts.compile_stmts(body)
    }

    /// Close the body: void methods get their implicit `ret`.
    ///
    /// A value-returning body that still falls off the end is only accepted
    /// as a gap, when something on its path was skipped.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn finish(mut self, span: Span) -> Result<MethodBody> {
        if !self.emitter.ends_with_terminator() {
            if self.signature.returns_value() {
                if self.ctx.diagnostics().len() > self.gaps_before {
                    return Err(LoweringError::unsupported(
                        format!("body of '{}' after skipped code on its return path", self.method.name),
                        span,
                    ));
                }
                return Err(LoweringError::other(
                    format!("not all code paths return a value in '{}'", self.method.name),
                    span,
                ));
            }
            self.emitter.restore_span(None);
            self.emitter.emit_return();
        }

        let name = self.emitter.method().to_string();
        let body = self.emitter.finish()?;
        if self.ctx.options.verify_bodies {
            let report = verify_body(&body)
                .map_err(|error| LoweringError::other(format!("invalid body for '{name}': {error}"), span))?;
            debug!(method = %name, max_stack = report.max_stack, "verified body");
        }
        Ok(body)
    }

    pub fn method(&self) -> &'m Symbol {
        self.method
    }

    pub fn is_static(&self) -> bool {
        self.signature.is_static
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LoweringOptions;
    use bumpalo::Bump;
    use ilweave_core::{SemanticType, TypeKind};
    use ilweave_syntax::ast::{BinaryOp, Member};
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    fn method_parts<'ast>(member: Member<'ast>) -> (ilweave_core::NodeId, &'ast [Param<'ast>], Block<'ast>) {
        match member {
            Member::Method(decl) => (decl.id, decl.params, decl.body.unwrap()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn instance_parameters_start_after_this() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let calc = b.source_type("Demo", "Calc", TypeKind::Class);
        let add = b.method_symbol(
            &calc,
            "Add",
            &[("a", SemanticType::INT32), ("b", SemanticType::INT32)],
            SemanticType::INT32,
            false,
        );
        let params = b.param_symbols(add);
        let lhs = b.ident(params[0]);
        let rhs = b.ident(params[1]);
        let sum = b.binary(BinaryOp::Add, lhs, rhs, SemanticType::INT32);
        let ret = b.ret(Some(sum));
        let body = b.block_of(&[ret]);
        let member = b.method_decl(add, &params, Some(body));
        let model = b.finish();

        let (_, decl_params, body) = method_parts(member);
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let symbol = ctx.symbol(add, Span::default()).unwrap();
        let (def, handle) = ctx.define_symbol(symbol, Span::default()).unwrap();
        let body = ctx
            .with_current(def, |ctx| {
                let mut compiler = FunctionCompiler::new(ctx, symbol, &handle, Span::default())?;
                compiler.setup_parameters(decl_params)?;
                compiler.compile_body(&body)?;
                compiler.finish(Span::default())
            })
            .unwrap();
        assert_eq!(body.listing(), vec!["ldarg A_1", "ldarg A_2", "add", "ret"]);
        assert!(ctx.defs.lookup_active(MemberKind::Parameter, "a").is_none());
    }

    #[test]
    fn void_bodies_get_an_implicit_return() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let app = b.source_type("Demo", "App", TypeKind::Class);
        let run = b.method_symbol(&app, "Run", &[("n", SemanticType::INT32)], SemanticType::VOID, true);
        let params = b.param_symbols(run);
        let body = b.block_of(&[]);
        let member = b.method_decl(run, &params, Some(body));
        let model = b.finish();

        let (_, decl_params, body) = method_parts(member);
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let symbol = ctx.symbol(run, Span::default()).unwrap();
        let (def, handle) = ctx.define_symbol(symbol, Span::default()).unwrap();
        let body = ctx
            .with_current(def, |ctx| {
                let mut compiler = FunctionCompiler::new(ctx, symbol, &handle, Span::default())?;
                compiler.setup_parameters(decl_params)?;
                compiler.compile_body(&body)?;
                compiler.finish(Span::default())
            })
            .unwrap();
        assert_eq!(body.listing(), vec!["ret"]);
    }

    #[test]
    fn missing_return_value_is_fatal() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let app = b.source_type("Demo", "App", TypeKind::Class);
        let get = b.method_symbol(&app, "Get", &[], SemanticType::INT32, true);
        let body = b.block_of(&[]);
        let member = b.method_decl(get, &[], Some(body));
        let model = b.finish();

        let (_, _, body) = method_parts(member);
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let symbol = ctx.symbol(get, Span::default()).unwrap();
        let (def, handle) = ctx.define_symbol(symbol, Span::default()).unwrap();
        let err = ctx
            .with_current(def, |ctx| {
                let mut compiler = FunctionCompiler::new(ctx, symbol, &handle, Span::default())?;
                compiler.compile_body(&body)?;
                compiler.finish(Span::default())
            })
            .unwrap_err();
        assert!(!err.is_gap());
        assert!(err.to_string().contains("not all code paths return a value"));
    }
}
