//! Local variable declarations.
//!
//! Each declarator registers its local in the innermost frame before the
//! initializer is lowered. When the initializer turns out to be unsupported
//! the local stays visible but is flagged, so a later statement using it
//! becomes a gap of its own instead of reading an unassigned slot.

use ilweave_core::MemberKind;
use ilweave_syntax::ast::{Expr, LocalDeclStmt, VarDeclarator};

use crate::expr::{ExprCompiler, initialize_at_address, is_default_construction};

use super::{Result, StmtCompiler};

impl<'a, 'm> StmtCompiler<'a, 'm> {
    pub fn compile_local_decl(&mut self, decl: &LocalDeclStmt<'_>) -> Result<()> {
        for declarator in decl.declarators {
            self.compile_declarator(declarator)?;
        }
        Ok(())
    }

    fn compile_declarator(&mut self, declarator: &VarDeclarator<'_>) -> Result<()> {
        let span = declarator.span;
        let what = format!("local '{}'", declarator.name.name);
        let symbol = self.ctx.declared(declarator.id, &what, span)?;

        let result = {
            let mut exprs = self.expr_compiler();
            let slot = exprs.declare_local(symbol, span)?;
            let Some(init) = declarator.init else {
                return Ok(());
            };
            initialize(&mut exprs, init, slot)
        };
        if let Err(error) = &result
            && error.is_gap()
        {
            self.ctx.defs.skip_active(MemberKind::LocalVariable, &symbol.name);
        }
        result
    }
}

fn initialize(exprs: &mut ExprCompiler<'_, '_>, init: &Expr<'_>, slot: u16) -> Result<()> {
    // `S s = new S();` initializes the local in place.
    if let Some(creation) = is_default_construction(exprs, init)? {
        exprs.emitter().ldloca(slot);
        return initialize_at_address(exprs, creation);
    }
    exprs.lower(init)?;
    exprs.emitter().stloc(slot);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::context::LoweringContext;
    use crate::emit::BodyEmitter;
    use crate::options::LoweringOptions;
    use crate::stmt::StmtCompiler;
    use crate::testing::{stmt_body, stmt_listing};
    use bumpalo::Bump;
    use ilweave_core::{SemanticType, TypeKind};
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn declarators_store_their_initializers() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let x = b.local_symbol("x", SemanticType::INT32);
        let y = b.local_symbol("y", SemanticType::INT32);
        let five = b.int(5);
        let dx = b.declarator(x, Some(five));
        let dy = b.declarator(y, None);
        let decl = b.local_decl(&[dx, dy]);
        let stmt = ilweave_syntax::ast::Stmt::LocalDecl(decl);
        let model = b.finish();

        let body = stmt_body(&model, &[stmt]);
        assert_eq!(body.listing(), vec!["ldc.i4.5", "stloc x", "ret"]);
        assert_eq!(body.locals.len(), 2);
    }

    #[test]
    fn value_type_default_construction_is_initobj_on_the_local() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let point = b.imported_type("Demo", "Point", TypeKind::Struct);
        let p = b.local_symbol("p", point.clone());
        let create = b.new_object(point, None, &[], &[]);
        let decl = b.local(p, Some(create));
        let model = b.finish();

        let listing = stmt_listing(&model, &[decl]);
        assert_eq!(listing, vec!["ldloca p", "initobj Import(\"Demo.Point\")", "ret"]);
        assert!(!listing.iter().any(|line| line.starts_with("newobj") || line.starts_with("call")));
    }

    #[test]
    fn reading_a_local_whose_initializer_was_skipped_is_a_gap() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let f = b.local_symbol("f", SemanticType::OBJECT);
        let g = b.local_symbol("g", SemanticType::OBJECT);
        let zero = b.int(0);
        let lambda = b.lambda(zero, SemanticType::OBJECT);
        let decl_f = b.local(f, Some(lambda));
        let read = b.ident(f);
        let decl_g = b.local(g, Some(read));
        let model = b.finish();

        let options = LoweringOptions::default().with_inline_diagnostics(false);
        let mut ctx = LoweringContext::new(&model, options);
        ctx.defs.push_frame();
        let mut emitter = BodyEmitter::new("m_Test_0", false);
        {
            let mut compiler = StmtCompiler::new(&mut ctx, &mut emitter);
            compiler.compile(&decl_f).unwrap();
            compiler.compile(&decl_g).unwrap();
        }
        emitter.emit_return();
        assert_eq!(emitter.finish().unwrap().listing(), vec!["ret"]);

        let (_, diagnostics) = ctx.into_parts();
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[1].message.contains("use of 'f' after its initializer was skipped"));
    }

    #[test]
    fn stackalloc_initializer_uses_localloc() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let buffer = b.local_symbol("buffer", SemanticType::pointer_to(SemanticType::INT32));
        let eight = b.int(8);
        let alloc = b.stackalloc(SemanticType::INT32, eight);
        let decl = b.local(buffer, Some(alloc));
        let model = b.finish();

        assert_eq!(
            stmt_listing(&model, &[decl]),
            vec![
                "ldc.i4.8",
                "conv.u",
                "sizeof TypeSystem.Int32",
                "mul",
                "localloc",
                "stloc buffer",
                "ret"
            ]
        );
    }
}
