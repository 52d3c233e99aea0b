//! ilweave
//!
//! Lowers a typed object-oriented syntax tree into the ordered sequence of
//! bytecode-builder calls that reconstructs it: type and member definitions
//! with their attributes, and method bodies with labels, exception regions
//! and locals.
//!
//! The pipeline lives in three crates re-exported here:
//!
//! - [`ilweave_core`]: spans, node ids, the semantic model and the error types
//! - [`ilweave_syntax`]: the typed tree and a builder for constructing it
//! - [`ilweave_compiler`]: the lowering engine and its output
//!
//! ```ignore
//! use ilweave::prelude::*;
//!
//! let lowered = lower(&model, &unit, LoweringOptions::new("Demo"))?;
//! println!("{}", lowered.render().text);
//! ```

pub use ilweave_compiler;
pub use ilweave_core;
pub use ilweave_syntax;

pub use ilweave_compiler::{BuilderCall, LoweredUnit, Lowerer, LoweringOptions, RenderedProgram};
pub use ilweave_core::{Diagnostic, LoweringError, LoweringFailure, SemanticModel, Severity};

use ilweave_syntax::ast::CompilationUnit;

/// Lower `unit` against `model` in one call.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lower(
    model: &dyn SemanticModel,
    unit: &CompilationUnit<'_>,
    options: LoweringOptions,
) -> Result<LoweredUnit, LoweringFailure> {
    tracing::debug!(module = %options.module_name, types = unit.types.len(), "lowering unit");
    Lowerer::new(model, options).lower(unit)
}

pub mod prelude {
    pub use crate::lower;
    pub use ilweave_compiler::{
        BuilderCall, LoweredUnit, Lowerer, LoweringOptions, MethodBody, RenderedProgram,
    };
    pub use ilweave_core::{
        Diagnostic, LoweringError, LoweringFailure, SemanticModel, SemanticTable, SemanticType,
        Severity, Span, TypeKind,
    };
    pub use ilweave_syntax::ast::{CompilationUnit, TypeDeclKind};
    pub use ilweave_syntax::AstBuilder;
}
