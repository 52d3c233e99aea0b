//! LoweringContext - shared state for lowering one compilation unit.
//!
//! Holds the semantic model, the definition table, the handle generator, the
//! options and the two output channels (builder calls and diagnostics).
//! Every compiler struct borrows it mutably for the duration of its work.

use ilweave_core::{
    Diagnostic, LoweringError, MemberKind, MethodKind, MethodSymbol, NodeId, SemanticModel,
    SemanticType, Span, Symbol, SymbolId, SymbolKind, TypeInfo,
};
use tracing::{trace, warn};

use crate::bytecode::{FieldRef, MemberRef, MethodRef};
use crate::definitions::{DefId, DefinitionTable, DefinitionVariable};
use crate::options::LoweringOptions;
use crate::output::BuilderCall;
use crate::type_resolver::{ResolvedType, TypeExpr, TypeResolver};

type Result<T> = std::result::Result<T, LoweringError>;

// ============================================================================
// Handles
// ============================================================================

/// Hands out unique, readable handles: `t_Point_1`, `m_Add_7`, ...
#[derive(Debug, Default)]
pub struct NameGenerator {
    counter: u32,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn prefix(kind: MemberKind) -> &'static str {
        match kind {
            MemberKind::Type => "t",
            MemberKind::Field => "f",
            MemberKind::Method => "m",
            MemberKind::Property => "p",
            MemberKind::Event => "e",
            MemberKind::Parameter => "a",
            MemberKind::LocalVariable => "l",
        }
    }

    /// A fresh handle for a declaration called `name`.
    pub fn handle(&mut self, kind: MemberKind, name: &str) -> String {
        self.counter += 1;
        let mut clean: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if clean.is_empty() {
            clean.push_str("anon");
        }
        format!("{}_{}_{}", Self::prefix(kind), clean, self.counter)
    }
}

/// Definition-table kind for a member symbol.
pub fn member_kind(symbol: &Symbol) -> MemberKind {
    match &symbol.kind {
        SymbolKind::Local { .. } => MemberKind::LocalVariable,
        SymbolKind::Parameter { .. } => MemberKind::Parameter,
        SymbolKind::Field(_) => MemberKind::Field,
        SymbolKind::Method(_) => MemberKind::Method,
        SymbolKind::Property(_) => MemberKind::Property,
        SymbolKind::Event(_) => MemberKind::Event,
        SymbolKind::Type(_) => MemberKind::Type,
    }
}

// ============================================================================
// Context
// ============================================================================

/// Shared state for lowering one unit.
pub struct LoweringContext<'m> {
    model: &'m dyn SemanticModel,
    pub defs: DefinitionTable,
    pub names: NameGenerator,
    pub options: LoweringOptions,
    diagnostics: Vec<Diagnostic>,
    calls: Vec<BuilderCall>,
}

impl<'m> LoweringContext<'m> {
    pub fn new(model: &'m dyn SemanticModel, options: LoweringOptions) -> Self {
        Self {
            model,
            defs: DefinitionTable::new(),
            names: NameGenerator::new(),
            options,
            diagnostics: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn model(&self) -> &'m dyn SemanticModel {
        self.model
    }

    // =========================================================================
    // Output channels
    // =========================================================================

    pub fn emit_call(&mut self, call: BuilderCall) {
        self.calls.push(call);
    }

    pub fn calls(&self) -> &[BuilderCall] {
        &self.calls
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Record a recovered gap. The caller is responsible for the inline
    /// marker, which depends on where the gap happened.
    pub fn record_gap(&mut self, error: &LoweringError) {
        warn!(%error, "skipping unsupported construct");
        self.diagnostics.push(Diagnostic::from_gap(error));
    }

    /// Decide what to do with the result of lowering one statement or
    /// member: gaps are recorded and swallowed unless configured fatal.
    /// Returns `Ok(Some(error))` for a recovered gap.
    pub fn recover(&mut self, result: Result<()>) -> Result<Option<LoweringError>> {
        match result {
            Err(error) if error.is_gap() && !self.options.gaps_are_fatal => {
                self.record_gap(&error);
                Ok(Some(error))
            }
            Err(error) => Err(error),
            Ok(()) => Ok(None),
        }
    }

    pub fn into_parts(self) -> (Vec<BuilderCall>, Vec<Diagnostic>) {
        (self.calls, self.diagnostics)
    }

    // =========================================================================
    // Ambient scope
    // =========================================================================

    /// Run `f` with `current` active as the innermost declaration. The
    /// active scope is restored on every exit path.
    pub fn with_current<T>(
        &mut self,
        current: DefId,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let mark = self.defs.push_frame();
        self.defs.push_active(current);
        let result = f(self);
        self.defs.restore(mark);
        result
    }

    /// Run `f` inside a fresh frame for locals.
    pub fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mark = self.defs.push_frame();
        let result = f(self);
        self.defs.restore(mark);
        result
    }

    pub fn current_method(&self, span: Span) -> Result<&DefinitionVariable> {
        self.defs
            .get_last_of_kind(MemberKind::Method)
            .ok_or_else(|| LoweringError::AmbientContextMissing {
                kind: "method".into(),
                span,
            })
    }

    pub fn current_type(&self, span: Span) -> Result<&DefinitionVariable> {
        self.defs
            .get_last_of_kind(MemberKind::Type)
            .ok_or_else(|| LoweringError::AmbientContextMissing {
                kind: "type".into(),
                span,
            })
    }

    // =========================================================================
    // Semantic queries
    // =========================================================================

    pub fn symbol(&self, id: SymbolId, span: Span) -> Result<&'m Symbol> {
        self.model
            .symbol(id)
            .ok_or_else(|| LoweringError::UnresolvedSymbol {
                what: format!("{id:?}"),
                span,
            })
    }

    /// Symbol a node refers to; `what` names the node in the error.
    pub fn referenced(&self, node: NodeId, what: &str, span: Span) -> Result<&'m Symbol> {
        self.model
            .referenced_symbol(node)
            .ok_or_else(|| LoweringError::UnresolvedSymbol {
                what: what.to_string(),
                span,
            })
    }

    /// Symbol a declaration node declares.
    pub fn declared(&self, node: NodeId, what: &str, span: Span) -> Result<&'m Symbol> {
        self.model
            .declared(node)
            .ok_or_else(|| LoweringError::UnresolvedSymbol {
                what: what.to_string(),
                span,
            })
    }

    pub fn type_info(&self, node: NodeId, span: Span) -> Result<TypeInfo> {
        self.model
            .type_info(node)
            .ok_or_else(|| LoweringError::UnresolvedSymbol {
                what: format!("type of expression {node:?}"),
                span,
            })
    }

    pub fn resolve_type(&mut self, ty: &SemanticType, span: Span) -> Result<ResolvedType> {
        TypeResolver::new(self).resolve(ty, span)
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    /// Register the declaration being visited. A forward stub for the same
    /// identity is filled and keeps its handle.
    pub fn define(
        &mut self,
        kind: MemberKind,
        scope: &str,
        name: &str,
        display_name: &str,
        span: Span,
    ) -> Result<(DefId, String)> {
        if let Some(id) = self.defs.try_lookup_id(kind, scope, name)? {
            self.defs.fill(id, span)?;
            let handle = self.defs.get(id).map(|d| d.handle.clone()).unwrap_or_default();
            return Ok((id, handle));
        }
        let handle = self.names.handle(kind, display_name);
        let id = self
            .defs
            .register(DefinitionVariable::new(kind, scope, name, handle.clone()).at(span))?;
        Ok((id, handle))
    }

    /// Register the declaration of a member symbol.
    pub fn define_symbol(&mut self, symbol: &Symbol, span: Span) -> Result<(DefId, String)> {
        self.define(
            member_kind(symbol),
            &symbol.scope_name(),
            &symbol.signature_name(),
            &symbol.name,
            span,
        )
    }

    /// Handle of a member declared in this unit, registering a forward stub
    /// when the declaration has not been visited yet.
    pub fn source_handle(&mut self, symbol: &Symbol, span: Span) -> Result<String> {
        let kind = member_kind(symbol);
        let scope = symbol.scope_name();
        let name = symbol.signature_name();
        if let Some(id) = self.defs.try_lookup_id(kind, &scope, &name)? {
            return Ok(self.defs.get(id).map(|d| d.handle.clone()).unwrap_or_default());
        }

        let handle = self.names.handle(kind, &symbol.name);
        trace!(%kind, %scope, %name, %handle, "forward-declaring member");
        self.defs.register_stub(
            DefinitionVariable::new(kind, scope.clone(), name.clone(), handle.clone()).at(span),
        )?;
        self.emit_call(BuilderCall::ForwardDeclare {
            kind,
            handle: handle.clone(),
            scope,
            name,
        });
        Ok(handle)
    }

    /// How emitted code refers to a member: by handle for source members,
    /// by declaring type and name for imported ones.
    pub fn member_target(&mut self, symbol: &Symbol, span: Span) -> Result<MemberRef> {
        if symbol.from_source {
            return self.source_handle(symbol, span).map(MemberRef::Defined);
        }
        let container = symbol
            .containing_type
            .as_ref()
            .ok_or_else(|| LoweringError::UnresolvedSymbol {
                what: format!("declaring type of '{}'", symbol.name),
                span,
            })?;
        let declaring = self.resolve_type(container, span)?.expr;

        let (params, ret) = match &symbol.kind {
            SymbolKind::Method(method) => {
                let mut params = Vec::with_capacity(method.params.len());
                for param in &method.params {
                    let ty = self.resolve_type(&param.ty, span)?.expr;
                    params.push(match param.ref_kind {
                        ilweave_core::RefKind::None => ty,
                        _ => TypeExpr::by_ref(ty),
                    });
                }
                let ret = if method.returns_value() {
                    Some(self.resolve_type(&method.return_type, span)?.expr)
                } else {
                    None
                };
                (params, ret)
            }
            _ => {
                let ret = match symbol.ty() {
                    Some(ty) => Some(self.resolve_type(ty, span)?.expr),
                    None => None,
                };
                (Vec::new(), ret)
            }
        };
        Ok(MemberRef::Imported {
            declaring,
            name: symbol.name.clone(),
            params,
            ret,
        })
    }

    /// Call operand for a method symbol.
    pub fn method_ref(&mut self, symbol: &Symbol, span: Span) -> Result<MethodRef> {
        let method = symbol.as_method().ok_or_else(|| LoweringError::UnresolvedSymbol {
            what: format!("method '{}'", symbol.name),
            span,
        })?;
        let target = self.member_target(symbol, span)?;
        Ok(MethodRef {
            target,
            has_this: !method.is_static,
            param_count: method.params.len() as u16,
            returns_value: method.returns_value(),
        })
    }

    /// Call operand for the method with id `id`.
    pub fn method_ref_of(&mut self, id: SymbolId, span: Span) -> Result<MethodRef> {
        let symbol = self.symbol(id, span)?;
        self.method_ref(symbol, span)
    }

    pub fn field_ref(&mut self, symbol: &Symbol, span: Span) -> Result<FieldRef> {
        let field = symbol.as_field().ok_or_else(|| LoweringError::UnresolvedSymbol {
            what: format!("field '{}'", symbol.name),
            span,
        })?;
        let target = self.member_target(symbol, span)?;
        Ok(FieldRef {
            target,
            is_static: field.is_static,
        })
    }

    /// The parameterless constructor of `ty`, which need not have a symbol in
    /// the model: the implicit base call of a constructor, for instance.
    pub fn default_ctor_ref(&mut self, ty: &SemanticType, span: Span) -> Result<MethodRef> {
        let from_source = ty.as_named().is_some_and(|n| n.from_source);
        let target = if from_source {
            let mut ctor = MethodSymbol::new(SemanticType::VOID, Vec::new());
            ctor.method_kind = MethodKind::Constructor;
            let symbol = Symbol {
                id: SymbolId(u32::MAX),
                name: ".ctor".to_string(),
                containing_type: Some(ty.clone()),
                from_source: true,
                kind: SymbolKind::Method(ctor),
            };
            MemberRef::Defined(self.source_handle(&symbol, span)?)
        } else {
            MemberRef::imported(self.resolve_type(ty, span)?.expr, ".ctor")
        };
        Ok(MethodRef {
            target,
            has_this: true,
            param_count: 0,
            returns_value: false,
        })
    }

    /// A method of an imported type that has no symbol in the model, such
    /// as `String.Concat` or `Delegate.Combine`.
    pub fn runtime_method(
        declaring: TypeExpr,
        name: &str,
        params: Vec<TypeExpr>,
        ret: Option<TypeExpr>,
        has_this: bool,
    ) -> MethodRef {
        MethodRef {
            param_count: params.len() as u16,
            returns_value: ret.is_some(),
            target: MemberRef::Imported {
                declaring,
                name: name.to_string(),
                params,
                ret,
            },
            has_this,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilweave_core::{NamedType, SemanticTable, TypeKind};

    #[test]
    fn handles_are_unique_and_sanitized() {
        let mut names = NameGenerator::new();
        assert_eq!(names.handle(MemberKind::Type, "Point"), "t_Point_1");
        assert_eq!(names.handle(MemberKind::Method, ".ctor"), "m_ctor_2");
        assert_eq!(names.handle(MemberKind::Field, "<X>k__BackingField"), "f_Xk__BackingField_3");
        assert_eq!(names.handle(MemberKind::LocalVariable, "$"), "l_anon_4");
    }

    #[test]
    fn with_current_restores_on_error() {
        let model = SemanticTable::new();
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let (ty, _) = ctx
            .define(MemberKind::Type, "Demo", "App", "App", Span::default())
            .unwrap();
        let (method, _) = ctx
            .define(MemberKind::Method, "Demo.App", "Run()", "Run", Span::default())
            .unwrap();

        let before = ctx.defs.mark();
        let result: Result<()> = ctx.with_current(ty, |ctx| {
            ctx.with_current(method, |ctx| {
                assert_eq!(ctx.current_method(Span::default()).unwrap().name, "Run()");
                assert_eq!(ctx.current_type(Span::default()).unwrap().name, "App");
                Err(LoweringError::unsupported("lock statement", Span::default()))
            })
        });
        assert!(result.is_err());
        assert_eq!(ctx.defs.mark(), before);
        assert!(matches!(
            ctx.current_method(Span::default()),
            Err(LoweringError::AmbientContextMissing { .. })
        ));
    }

    #[test]
    fn source_members_are_stubbed_then_filled() {
        let mut model = SemanticTable::new();
        let app = SemanticType::named(NamedType::new("Demo", "App", TypeKind::Class).in_source());
        let id = model.add_symbol(
            "Helper",
            Some(app.clone()),
            true,
            SymbolKind::Method(ilweave_core::MethodSymbol::new(SemanticType::VOID, Vec::new())),
        );
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let symbol = ctx.symbol(id, Span::default()).unwrap();

        let first = ctx.member_target(symbol, Span::default()).unwrap();
        let second = ctx.member_target(symbol, Span::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.defs.pending_stubs(), 1);

        let (_, handle) = ctx.define_symbol(symbol, Span::point(4, 1)).unwrap();
        assert_eq!(MemberRef::Defined(handle), first);
        assert_eq!(ctx.defs.pending_stubs(), 0);

        assert!(matches!(
            ctx.define_symbol(symbol, Span::point(9, 1)),
            Err(LoweringError::DuplicateDefinition { .. })
        ));
    }

    #[test]
    fn gaps_are_recovered_unless_fatal() {
        let model = SemanticTable::new();
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let gap = Err(LoweringError::unsupported("goto statement", Span::point(2, 3)));
        assert!(matches!(ctx.recover(gap), Ok(Some(_))));
        assert_eq!(ctx.diagnostics().len(), 1);

        let fatal = Err(LoweringError::other("boom", Span::default()));
        assert!(ctx.recover(fatal).is_err());

        let mut strict = LoweringContext::new(&model, LoweringOptions::default().fatal_gaps());
        let gap = Err(LoweringError::unsupported("goto statement", Span::point(2, 3)));
        assert!(strict.recover(gap).is_err());
    }
}
