//! Declaration lowering.
//!
//! The [`DeclLowerer`] walks the types of a compilation unit and turns every
//! declaration into builder calls: `DefineType` for the type, then one or
//! more calls per member. Method bodies go through a
//! [`FunctionCompiler`](crate::function_compiler::FunctionCompiler) and are
//! attached with `SetBody`.
//!
//! - `types`: types, nested types and the constructors a type gets implicitly
//! - `fields`: fields and enum members
//! - `methods`: methods, operators and constructors
//! - `properties`: properties, auto-properties included
//! - `events`: events, field-like events included
//!
//! Each member is lowered on its own: an unsupported member is recorded and
//! skipped, and its siblings are still lowered.

mod events;
mod fields;
mod methods;
mod properties;
mod types;

use ilweave_core::{LoweringError, Span, Symbol, TypeKind};
use ilweave_syntax::ast::{CompilationUnit, Member};
use tracing::debug;

use crate::context::LoweringContext;
use crate::field_init::FieldInits;
use crate::output::BuilderCall;

type Result<T> = std::result::Result<T, LoweringError>;

/// What the members of the type being lowered need to know about it.
pub(crate) struct TypeState<'ast, 'm> {
    pub handle: String,
    pub symbol: &'m Symbol,
    pub kind: TypeKind,
    pub inits: FieldInits<'ast, 'm>,
    /// An instance constructor was declared.
    pub has_constructor: bool,
    /// A static constructor was declared.
    pub has_static_constructor: bool,
}

impl TypeState<'_, '_> {
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Enum)
    }
}

/// Lowers the declarations of a unit.
pub struct DeclLowerer<'a, 'm> {
    ctx: &'a mut LoweringContext<'m>,
}

impl<'a, 'm> DeclLowerer<'a, 'm> {
    pub fn new(ctx: &'a mut LoweringContext<'m>) -> Self {
        Self { ctx }
    }

    /// Lower every top-level type of `unit`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn lower_unit(&mut self, unit: &CompilationUnit<'_>) -> Result<()> {
        for decl in unit.types {
            self.lower_type(decl, None)?;
        }
        debug!(
            types = unit.types.len(),
            pending_stubs = self.ctx.defs.pending_stubs(),
            "lowered unit"
        );
        Ok(())
    }

    /// Lower one member of the type in `state`, recording it as skipped when
    /// it is unsupported.
    fn lower_member<'ast>(&mut self, member: &Member<'ast>, state: &mut TypeState<'ast, 'm>) -> Result<()> {
        let span = member.span();
        let result = match member {
            Member::Field(field) => self.lower_field(field, state),
            Member::Method(method) => self.lower_method(method, state),
            Member::Operator(method) => self.lower_method(method, state),
            Member::Constructor(ctor) => self.lower_constructor(ctor, state),
            Member::Property(property) => self.lower_property(property, state),
            Member::Event(event) => self.lower_event(event, state),
            Member::EnumMember(value) => self.lower_enum_member(value, state),
            Member::NestedType(nested) => self.lower_type(nested, Some(state.handle.as_str())),
            Member::Destructor(_) | Member::Indexer(_) => {
                Err(LoweringError::unsupported(member.kind_name(), span))
            }
        };
        if let Some(gap) = self.ctx.recover(result)? {
            self.comment(gap.to_string(), span);
        }
        Ok(())
    }

    fn comment(&mut self, text: String, span: Span) {
        if self.ctx.options.inline_diagnostics {
            self.ctx.emit_call(BuilderCall::Comment { text, span });
        }
    }
}
