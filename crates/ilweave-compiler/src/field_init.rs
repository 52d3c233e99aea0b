//! Field initializers.
//!
//! Initializers written on field declarations (and on auto-properties, which
//! initialize their backing field) are not lowered where they appear. They
//! are collected per type and replayed:
//!
//! 1. instance initializers at the start of every constructor that does not
//!    chain to `this(...)`, before the base constructor call
//! 2. static initializers at the start of the static constructor
//!
//! Constants carry their value in metadata and have no initializer code.

use ilweave_core::{LoweringError, Span, Symbol};
use ilweave_syntax::ast::{Expr, Member, TypeDecl};
use tracing::trace;

use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::expr::{initialize_at_address, is_default_construction, ExprCompiler};

type Result<T> = std::result::Result<T, LoweringError>;

/// A field and the value it starts with.
#[derive(Debug, Clone, Copy)]
pub struct FieldInit<'ast, 'm> {
    pub field: &'m Symbol,
    pub value: &'ast Expr<'ast>,
    pub span: Span,
}

/// Initializers of one type, split by where they run.
#[derive(Debug, Default)]
pub struct FieldInits<'ast, 'm> {
    pub instance: Vec<FieldInit<'ast, 'm>>,
    pub statics: Vec<FieldInit<'ast, 'm>>,
}

impl<'ast, 'm> FieldInits<'ast, 'm> {
    fn push(&mut self, init: FieldInit<'ast, 'm>) {
        if init.field.is_static() {
            self.statics.push(init);
        } else {
            self.instance.push(init);
        }
    }
}

/// Collect the initializers of `decl` in declaration order.
pub fn collect_field_inits<'ast, 'm>(ctx: &LoweringContext<'m>, decl: &TypeDecl<'ast>) -> Result<FieldInits<'ast, 'm>> {
    let mut inits = FieldInits::default();
    for member in decl.members {
        match member {
            Member::Field(field) => {
                for declarator in field.declarators {
                    let Some(value) = declarator.init else {
                        continue;
                    };
                    let what = format!("field '{}'", declarator.name.name);
                    let symbol = ctx.declared(declarator.id, &what, declarator.span)?;
                    if symbol.as_field().is_some_and(|f| f.constant.is_some()) {
                        continue;
                    }
                    inits.push(FieldInit {
                        field: symbol,
                        value,
                        span: declarator.span,
                    });
                }
            }
            Member::Property(property) => {
                let Some(value) = property.initializer else {
                    continue;
                };
                let what = format!("property '{}'", property.name.name);
                let symbol = ctx.declared(property.id, &what, property.span)?;
                let Some(backing) = symbol.as_property().and_then(|p| p.backing_field) else {
                    continue;
                };
                inits.push(FieldInit {
                    field: ctx.symbol(backing, property.span)?,
                    value,
                    span: property.span,
                });
            }
            _ => {}
        }
    }
    trace!(
        ty = %decl.name.name,
        instance = inits.instance.len(),
        statics = inits.statics.len(),
        "collected field initializers"
    );
    Ok(inits)
}

/// Store each instance initializer into its field on `this`.
pub fn compile_instance_inits(compiler: &mut ExprCompiler<'_, '_>, inits: &[FieldInit<'_, '_>]) -> Result<()> {
    for init in inits {
        recover_init(compiler, init, |compiler| {
            let target = compiler.ctx().field_ref(init.field, init.span)?;
            compiler.emitter().ldarg(0);
            if let Some(creation) = is_default_construction(compiler, init.value)? {
                compiler.emitter().emit_field(OpCode::Ldflda, target);
                return initialize_at_address(compiler, creation);
            }
            compiler.lower(init.value)?;
            compiler.emitter().emit_field(OpCode::Stfld, target);
            Ok(())
        })?;
    }
    Ok(())
}

/// Store each static initializer into its field.
pub fn compile_static_inits(compiler: &mut ExprCompiler<'_, '_>, inits: &[FieldInit<'_, '_>]) -> Result<()> {
    for init in inits {
        recover_init(compiler, init, |compiler| {
            let target = compiler.ctx().field_ref(init.field, init.span)?;
            if let Some(creation) = is_default_construction(compiler, init.value)? {
                compiler.emitter().emit_field(OpCode::Ldsflda, target);
                return initialize_at_address(compiler, creation);
            }
            compiler.lower(init.value)?;
            compiler.emitter().emit_field(OpCode::Stsfld, target);
            Ok(())
        })?;
    }
    Ok(())
}

/// An unsupported initializer leaves its field at the default value.
fn recover_init(
    compiler: &mut ExprCompiler<'_, '_>,
    init: &FieldInit<'_, '_>,
    f: impl FnOnce(&mut ExprCompiler<'_, '_>) -> Result<()>,
) -> Result<()> {
    let checkpoint = compiler.emitter().checkpoint();
    let previous = compiler.emitter().set_span(init.span);
    let result = f(compiler);
    compiler.emitter().restore_span(previous);
    if let Some(gap) = compiler.ctx().recover(result)? {
        compiler.emitter().rollback(checkpoint);
        if compiler.ctx().options.inline_diagnostics {
            compiler.emitter().emit_comment(gap.to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::BodyEmitter;
    use crate::options::LoweringOptions;
    use bumpalo::Bump;
    use ilweave_core::{ConstantValue, SemanticType, TypeKind};
    use ilweave_syntax::ast::TypeDeclKind;
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn initializers_are_split_and_constants_skipped() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let app = b.source_type("Demo", "App", TypeKind::Class);
        let class = b.type_symbol(app.clone(), None);
        let count = b.field_symbol(&app, "count", SemanticType::INT32, false);
        let cache = b.field_symbol(&app, "cache", SemanticType::STRING, true);
        let limit = b.const_field_symbol(&app, "Limit", SemanticType::INT32, ConstantValue::Int(9));
        let name = b.property_symbol(&app, "Name", SemanticType::STRING, false, true);

        let one = b.int(1);
        let text = b.string("x");
        let nine = b.int(9);
        let anon = b.string("anon");
        let members = [
            b.field_decl(count, Some(one)),
            b.field_decl(cache, Some(text)),
            b.field_decl(limit, Some(nine)),
            b.auto_property(name, Some(anon)),
        ];
        let decl = b.type_decl(class, TypeDeclKind::Class, &members);
        let model = b.finish();

        let ctx = LoweringContext::new(&model, LoweringOptions::default());
        let inits = collect_field_inits(&ctx, decl).unwrap();
        let instance: Vec<&str> = inits.instance.iter().map(|i| i.field.name.as_str()).collect();
        let statics: Vec<&str> = inits.statics.iter().map(|i| i.field.name.as_str()).collect();
        assert_eq!(instance, vec!["count", "<Name>k__BackingField"]);
        assert_eq!(statics, vec!["cache"]);
    }

    #[test]
    fn instance_inits_store_through_this() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let app = b.imported_type("Demo", "App", TypeKind::Class);
        let class = b.type_symbol(app.clone(), None);
        let count = b.field_symbol(&app, "count", SemanticType::INT32, false);
        let five = b.int(5);
        let members = [b.field_decl(count, Some(five))];
        let decl = b.type_decl(class, TypeDeclKind::Class, &members);
        let model = b.finish();

        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let inits = collect_field_inits(&ctx, decl).unwrap();
        let mut emitter = BodyEmitter::new("m_ctor_1", false);
        {
            let mut compiler = ExprCompiler::new(&mut ctx, &mut emitter);
            compile_instance_inits(&mut compiler, &inits.instance).unwrap();
        }
        emitter.emit(OpCode::Ret);
        assert_eq!(
            emitter.finish().unwrap().listing(),
            vec![
                "ldarg A_0",
                "ldc.i4.5",
                "stfld Import(Import(\"Demo.App\"), \"count\")",
                "ret"
            ]
        );
    }
}
