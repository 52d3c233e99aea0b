//! Events.
//!
//! A field-like event stores its handlers in a backing field of the delegate
//! type; its `add`/`remove` accessors combine the incoming delegate into the
//! field with `Delegate.Combine`/`Delegate.Remove`. Events with explicit
//! accessors are lowered like properties.

use ilweave_core::{LoweringError, Span, SymbolId};
use ilweave_syntax::ast::{Accessor, EventDecl};
use tracing::trace;

use crate::output::BuilderCall;

use super::methods::SynthesizedBody;
use super::{DeclLowerer, Result, TypeState};

impl<'a, 'm> DeclLowerer<'a, 'm> {
    pub(super) fn lower_event(&mut self, decl: &EventDecl<'_>, state: &TypeState<'_, 'm>) -> Result<()> {
        let span = decl.span;
        let what = format!("event '{}'", decl.name.name);
        let symbol = self.ctx.declared(decl.id, &what, span)?;
        let event = symbol
            .as_event()
            .ok_or_else(|| LoweringError::UnresolvedSymbol { what, span })?;

        let backing = match event.backing_field {
            Some(id) if decl.is_field_like() && !state.is_interface() => {
                let field = self.ctx.symbol(id, span)?;
                self.define_field(field, state, span)?;
                Some(field)
            }
            _ => None,
        };

        let add = self.event_accessor(
            decl.add,
            event.add,
            backing.map(|field| SynthesizedBody::Combine { field, combine: "Combine" }),
            state,
            span,
        )?;
        let remove = self.event_accessor(
            decl.remove,
            event.remove,
            backing.map(|field| SynthesizedBody::Combine { field, combine: "Remove" }),
            state,
            span,
        )?;

        let (_, handle) = self.ctx.define_symbol(symbol, span)?;
        let ty = self.ctx.resolve_type(&event.ty, span)?.expr;
        trace!(event = %symbol.name, %handle, field_like = backing.is_some(), "defining event");
        self.ctx.emit_call(BuilderCall::DefineEvent {
            handle,
            declaring: state.handle.clone(),
            name: symbol.name.clone(),
            ty,
            add,
            remove,
        });
        Ok(())
    }

    /// A declared accessor, or the accessor symbol of a field-like event,
    /// which has no accessor node.
    fn event_accessor(
        &mut self,
        accessor: Option<Accessor<'_>>,
        symbol: Option<SymbolId>,
        synthesized: Option<SynthesizedBody<'m>>,
        state: &TypeState<'_, 'm>,
        span: Span,
    ) -> Result<Option<String>> {
        match accessor {
            Some(accessor) => {
                let symbol = self.ctx.declared(accessor.id, "event accessor", accessor.span)?;
                self.lower_accessor(symbol, accessor.body.as_ref(), None, state, accessor.span)
                    .map(Some)
            }
            None => {
                let Some(id) = symbol else {
                    return Ok(None);
                };
                let symbol = self.ctx.symbol(id, span)?;
                self.lower_accessor(symbol, None, synthesized, state, span).map(Some)
            }
        }
    }
}
