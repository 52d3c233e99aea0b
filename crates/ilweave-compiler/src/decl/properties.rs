//! Properties.
//!
//! An auto-property of a class or struct gets its backing field and
//! synthesized accessors. Accessors with a body are lowered as methods, with
//! the setter's `value` as its only parameter. `DefineProperty` comes last
//! and links the accessor handles.

use ilweave_core::LoweringError;
use ilweave_syntax::ast::{Accessor, PropertyDecl};
use tracing::trace;

use crate::output::BuilderCall;

use super::methods::SynthesizedBody;
use super::{DeclLowerer, Result, TypeState};

impl<'a, 'm> DeclLowerer<'a, 'm> {
    pub(super) fn lower_property(&mut self, decl: &PropertyDecl<'_>, state: &TypeState<'_, 'm>) -> Result<()> {
        let span = decl.span;
        let what = format!("property '{}'", decl.name.name);
        let symbol = self.ctx.declared(decl.id, &what, span)?;
        let property = symbol
            .as_property()
            .ok_or_else(|| LoweringError::UnresolvedSymbol { what, span })?;

        let backing = match property.backing_field {
            Some(id) if decl.is_auto() && !state.is_interface() => {
                let field = self.ctx.symbol(id, span)?;
                self.define_field(field, state, span)?;
                Some(field)
            }
            _ => None,
        };

        let getter = self.property_accessor(decl.getter, backing.map(SynthesizedBody::Load), state)?;
        let setter = self.property_accessor(decl.setter, backing.map(SynthesizedBody::Store), state)?;

        let (_, handle) = self.ctx.define_symbol(symbol, span)?;
        let ty = self.ctx.resolve_type(&property.ty, span)?.expr;
        trace!(property = %symbol.name, %handle, auto = backing.is_some(), "defining property");
        self.ctx.emit_call(BuilderCall::DefineProperty {
            handle,
            declaring: state.handle.clone(),
            name: symbol.name.clone(),
            ty,
            getter,
            setter,
        });
        Ok(())
    }

    fn property_accessor(
        &mut self,
        accessor: Option<Accessor<'_>>,
        synthesized: Option<SynthesizedBody<'m>>,
        state: &TypeState<'_, 'm>,
    ) -> Result<Option<String>> {
        let Some(accessor) = accessor else {
            return Ok(None);
        };
        let symbol = self.ctx.declared(accessor.id, "property accessor", accessor.span)?;
        let synthesized = if accessor.body.is_none() { synthesized } else { None };
        self.lower_accessor(symbol, accessor.body.as_ref(), synthesized, state, accessor.span)
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LoweringContext;
    use crate::options::LoweringOptions;
    use bumpalo::Bump;
    use ilweave_core::{SemanticType, TypeKind};
    use ilweave_syntax::ast::TypeDeclKind;
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    fn listing(calls: &[BuilderCall], handle: &str) -> Vec<String> {
        calls
            .iter()
            .find_map(|c| match c {
                BuilderCall::SetBody { method, body } if method == handle => Some(body.listing()),
                _ => None,
            })
            .unwrap_or_default()
    }

    #[test]
    fn auto_properties_get_a_backing_field_and_accessors() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let app = b.source_type("Demo", "App", TypeKind::Class);
        let class = b.type_symbol(app.clone(), None);
        let name = b.property_symbol(&app, "Name", SemanticType::STRING, false, true);
        let members = [b.auto_property(name, None)];
        let decl = b.type_decl(class, TypeDeclKind::Class, &members);
        let unit = b.unit(&[decl]);
        let model = b.finish();

        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        DeclLowerer::new(&mut ctx).lower_unit(&unit).unwrap();
        let calls = ctx.calls();

        // t_App_1, then backing field, getter, setter, property.
        assert!(matches!(
            &calls[1],
            BuilderCall::DefineField { handle, name, .. }
                if handle == "f_Namek__BackingField_2" && name == "<Name>k__BackingField"
        ));
        assert_eq!(
            listing(calls, "m_get_Name_3"),
            vec!["ldarg A_0", "ldfld f_Namek__BackingField_2", "ret"]
        );
        assert_eq!(
            listing(calls, "m_set_Name_4"),
            vec!["ldarg A_0", "ldarg A_1", "stfld f_Namek__BackingField_2", "ret"]
        );
        let property = calls
            .iter()
            .find_map(|c| match c {
                BuilderCall::DefineProperty { handle, getter, setter, ty, .. } => {
                    Some((handle.clone(), getter.clone(), setter.clone(), ty.to_string()))
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(
            property,
            (
                "p_Name_5".to_string(),
                Some("m_get_Name_3".to_string()),
                Some("m_set_Name_4".to_string()),
                "TypeSystem.String".to_string()
            )
        );
    }

    #[test]
    fn explicit_setters_see_value() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let app = b.source_type("Demo", "App", TypeKind::Class);
        let class = b.type_symbol(app.clone(), None);
        let size = b.field_symbol(&app, "size", SemanticType::INT32, false);
        let prop = b.property_symbol(&app, "Size", SemanticType::INT32, false, false);
        let setter = prop.second.unwrap();
        let value = b.param_symbols(setter)[0];

        let this = b.this(app.clone());
        let read = b.member(this, size);
        let get = b.ret(Some(read));
        let get = b.block_of(&[get]);
        let this = b.this(app.clone());
        let target = b.member(this, size);
        let incoming = b.ident(value);
        let store = b.assign(target, incoming);
        let store = b.expr_stmt(store);
        let set = b.block_of(&[store]);
        let members = [b.field_decl(size, None), b.property(prop, Some(get), Some(set))];
        let decl = b.type_decl(class, TypeDeclKind::Class, &members);
        let unit = b.unit(&[decl]);
        let model = b.finish();

        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        DeclLowerer::new(&mut ctx).lower_unit(&unit).unwrap();
        let calls = ctx.calls();
        assert_eq!(
            listing(calls, "m_set_Size_4"),
            vec!["ldarg A_0", "ldarg A_1", "stfld f_size_2", "ret"]
        );
        assert!(!calls.iter().any(|c| matches!(
            c,
            BuilderCall::DefineField { name, .. } if name.contains("BackingField")
        )));
    }

    #[test]
    fn interface_properties_have_abstract_accessors() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let shape = b.source_type("Demo", "IShape", TypeKind::Interface);
        let ty = b.type_symbol(shape.clone(), None);
        let area = b.property_symbol(&shape, "Area", SemanticType::FLOAT64, false, false);
        let members = [b.auto_property(area, None)];
        let decl = b.type_decl(ty, TypeDeclKind::Interface, &members);
        let unit = b.unit(&[decl]);
        let model = b.finish();

        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        DeclLowerer::new(&mut ctx).lower_unit(&unit).unwrap();
        assert!(!ctx.calls().iter().any(|c| matches!(c, BuilderCall::SetBody { .. })));
        let accessors = ctx
            .calls()
            .iter()
            .filter(|c| matches!(c, BuilderCall::DefineMethod { .. }))
            .count();
        assert_eq!(accessors, 2);
    }
}
