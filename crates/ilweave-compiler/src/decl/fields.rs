//! Fields and enum members.
//!
//! Initializers are not lowered here; see [`field_init`](crate::field_init).

use ilweave_core::{LoweringError, Span, Symbol};
use ilweave_syntax::ast::{EnumMemberDecl, FieldDecl};
use tracing::trace;

use crate::attributes::FieldAttributes;
use crate::output::BuilderCall;

use super::{DeclLowerer, Result, TypeState};

impl<'a, 'm> DeclLowerer<'a, 'm> {
    pub(super) fn lower_field(&mut self, decl: &FieldDecl<'_>, state: &TypeState<'_, 'm>) -> Result<()> {
        for declarator in decl.declarators {
            let what = format!("field '{}'", declarator.name.name);
            let symbol = self.ctx.declared(declarator.id, &what, declarator.span)?;
            self.define_field(symbol, state, declarator.span)?;
        }
        Ok(())
    }

    pub(super) fn lower_enum_member(&mut self, decl: &EnumMemberDecl<'_>, state: &TypeState<'_, 'm>) -> Result<()> {
        let what = format!("enum member '{}'", decl.name.name);
        let symbol = self.ctx.declared(decl.id, &what, decl.span)?;
        if symbol.as_field().is_none_or(|f| f.constant.is_none()) {
            return Err(LoweringError::other(
                format!("enum member '{}' has no constant value", symbol.name),
                decl.span,
            ));
        }
        self.define_field(symbol, state, decl.span).map(drop)
    }

    /// `DefineField` for a field symbol; returns its handle.
    pub(super) fn define_field(&mut self, symbol: &Symbol, state: &TypeState<'_, 'm>, span: Span) -> Result<String> {
        let field = symbol.as_field().ok_or_else(|| LoweringError::UnresolvedSymbol {
            what: format!("field '{}'", symbol.name),
            span,
        })?;
        let (_, handle) = self.ctx.define_symbol(symbol, span)?;
        let ty = self.ctx.resolve_type(&field.ty, span)?.expr;
        trace!(field = %symbol.name, %handle, "defining field");
        self.ctx.emit_call(BuilderCall::DefineField {
            handle: handle.clone(),
            declaring: state.handle.clone(),
            name: symbol.name.clone(),
            ty,
            attributes: FieldAttributes::for_field(field),
            constant: field.constant.clone(),
        });
        Ok(handle)
    }
}
