//! ilweave compiler
//!
//! Lowers a typed object-oriented syntax tree into an ordered log of
//! bytecode-builder calls.
//!
//! ## Architecture
//!
//! - **Declarations**: every type and member of a unit becomes a builder call
//!   (`DefineType`, `DefineField`, `DefineMethod`, ...). Members referenced
//!   before their declaration are forward-declared and filled later.
//! - **Bodies**: each method body is lowered into an instruction list with
//!   labels, exception regions and locals, then attached with `SetBody`.
//!
//! Unsupported constructs are recorded as diagnostics and skipped unless
//! [`LoweringOptions::gaps_are_fatal`] is set.
//!
//! ## Modules
//!
//! - [`attributes`]: type, field and method attribute flags
//! - [`bytecode`]: opcodes, instructions, method bodies and the stack verifier
//! - [`context`]: shared lowering state, handle generation and member lookup
//! - [`conversion`]: conversion plans between semantic types
//! - [`decl`]: declaration visitors
//! - [`definitions`]: the definition table and its scope frames
//! - [`emit`]: instruction list, labels and break/continue targets
//! - [`expr`]: expression compiler
//! - [`field_init`]: field initializers run by constructors
//! - [`function_compiler`]: lowering of one method body
//! - [`operators`]: operator emission rules
//! - [`options`]: configuration of a lowering run
//! - [`output`]: builder calls and the rendered program
//! - [`stmt`]: statement compiler
//! - [`type_resolver`]: semantic types to type expressions

pub mod attributes;
pub mod bytecode;
pub mod context;
pub mod conversion;
pub mod decl;
pub mod definitions;
pub mod emit;
pub mod expr;
pub mod field_init;
pub mod function_compiler;
pub mod operators;
pub mod options;
pub mod output;
pub mod stmt;
pub mod type_resolver;

#[cfg(test)]
mod testing;

pub use attributes::{FieldAttributes, MethodAttributes, TypeAttributes};
pub use bytecode::{Instruction, MethodBody, OpCode, VerifyError, verify_body};
pub use context::LoweringContext;
pub use decl::DeclLowerer;
pub use definitions::{DefId, DefinitionTable, DefinitionVariable};
pub use emit::BodyEmitter;
pub use expr::ExprCompiler;
pub use function_compiler::FunctionCompiler;
pub use options::LoweringOptions;
pub use output::{BuilderCall, LoweredUnit, RenderedProgram, SpanMapping};
pub use stmt::StmtCompiler;
pub use type_resolver::{TypeExpr, TypeResolver};

// Re-export the error types from core for convenience
pub use ilweave_core::{Diagnostic, LoweringError, LoweringFailure};

use ilweave_core::SemanticModel;
use ilweave_syntax::ast::CompilationUnit;
use tracing::{debug, warn};

/// Entry point: lowers one compilation unit against its semantic model.
///
/// ```ignore
/// let unit = Lowerer::new(&model, LoweringOptions::new("Demo")).lower(&unit)?;
/// println!("{}", unit.render().text);
/// ```
pub struct Lowerer<'m> {
    ctx: LoweringContext<'m>,
}

impl<'m> Lowerer<'m> {
    pub fn new(model: &'m dyn SemanticModel, options: LoweringOptions) -> Self {
        Self {
            ctx: LoweringContext::new(model, options),
        }
    }

    /// Lower `unit`. On a fatal error the diagnostics collected so far are
    /// returned with it.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn lower(mut self, unit: &CompilationUnit<'_>) -> Result<LoweredUnit, LoweringFailure> {
        if let Err(error) = DeclLowerer::new(&mut self.ctx).lower_unit(unit) {
            warn!(%error, "lowering failed");
            let (_, diagnostics) = self.ctx.into_parts();
            return Err(LoweringFailure { error, diagnostics });
        }
        self.report_unfilled_stubs();

        let module_name = self.ctx.options.module_name.clone();
        let (calls, diagnostics) = self.ctx.into_parts();
        debug!(
            module = %module_name,
            calls = calls.len(),
            diagnostics = diagnostics.len(),
            "lowered module"
        );
        Ok(LoweredUnit {
            module_name,
            calls,
            diagnostics,
        })
    }

    /// Forward stubs still unfilled name source members this unit referenced
    /// but never declared.
    fn report_unfilled_stubs(&mut self) {
        let missing: Vec<Diagnostic> = self
            .ctx
            .defs
            .iter()
            .filter(|(_, def)| def.is_stub())
            .map(|(_, def)| {
                let error = LoweringError::MissingDefinition {
                    kind: def.kind.to_string(),
                    name: def.name.clone(),
                    scope: def.scope.clone(),
                    span: def.span,
                };
                Diagnostic::warning(error.to_string(), def.span)
            })
            .collect();
        for diagnostic in missing {
            warn!(%diagnostic, "forward declaration never filled");
            self.ctx.report(diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;
    use ilweave_core::{SemanticType, Severity, TypeKind};
    use ilweave_syntax::AstBuilder;
    use ilweave_syntax::ast::TypeDeclKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn failures_carry_the_diagnostics_collected_before_them() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let color = b.source_type("Demo", "Color", TypeKind::Enum);
        let ty = b.type_symbol(color.clone(), None);
        let broken = b.field_symbol(&color, "Broken", color.clone(), true);
        let members = [b.destructor("Color"), b.enum_member(broken)];
        let decl = b.type_decl(ty, TypeDeclKind::Enum, &members);
        let unit = b.unit(&[decl]);
        let model = b.finish();

        let failure = Lowerer::new(&model, LoweringOptions::new("Demo"))
            .lower(&unit)
            .unwrap_err();
        assert!(failure.to_string().contains("'Broken' has no constant value"));
        assert_eq!(failure.diagnostics.len(), 1);
        assert!(failure.diagnostics[0].message.ends_with("unsupported destructor"));
    }

    #[test]
    fn referenced_but_undeclared_members_are_reported() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let app = b.source_type("Demo", "App", TypeKind::Class);
        let class = b.type_symbol(app.clone(), None);
        let helper = b.method_symbol(&app, "Helper", &[], SemanticType::VOID, true);
        let run = b.method_symbol(&app, "Run", &[], SemanticType::VOID, true);
        let call = b.call(helper, None, &[]);
        let call = b.expr_stmt(call);
        let body = b.block_of(&[call]);
        let members = [b.method_decl(run, &[], Some(body))];
        let decl = b.type_decl(class, TypeDeclKind::Class, &members);
        let unit = b.unit(&[decl]);
        let model = b.finish();

        let lowered = Lowerer::new(&model, LoweringOptions::new("Demo"))
            .lower(&unit)
            .unwrap();
        assert_eq!(lowered.module_name, "Demo");
        assert_eq!(lowered.diagnostics.len(), 1);
        assert_eq!(lowered.diagnostics[0].severity, Severity::Warning);
        assert!(lowered.diagnostics[0].message.contains("'Helper()' in 'Demo.App'"));
        assert!(lowered.method_handle("Run").is_some());
    }
}
