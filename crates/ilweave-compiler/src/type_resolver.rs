//! Type resolution from semantic types to target type expressions.
//!
//! This module provides [`TypeResolver`], which turns a [`SemanticType`]
//! reported by the front-end into a [`TypeExpr`]: the expression that
//! materializes the type in the generated program.
//!
//! ## Resolution order
//!
//! 1. Types declared in the unit, through the definition table. A source type
//!    referenced before its declaration is visited gets a forward stub, so a
//!    local type always shadows a same-named import.
//! 2. Built-in types through a fixed table (`TypeSystem.Int32`, ...).
//! 3. Arrays, wrapping the element.
//! 4. Generic instantiations: open definition, then each argument.
//! 5. Pointers and by-reference types, wrapping the element.
//! 6. Type parameters and function pointers.
//!
//! Nothing is cached between calls.

use std::fmt;

use ilweave_core::{LoweringError, MemberKind, NamedType, PrimitiveKind, SemanticType, Span};
use tracing::trace;

use crate::bytecode::{InstrId, OpCode};
use crate::context::LoweringContext;
use crate::definitions::DefinitionVariable;
use crate::emit::BodyEmitter;
use crate::output::BuilderCall;

type Result<T> = std::result::Result<T, LoweringError>;

// ============================================================================
// Type expressions
// ============================================================================

/// Target-side expression that materializes a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A built-in type: `TypeSystem.Int32`.
    TypeSystem(&'static str),
    /// An imported type by qualified name.
    Import(String),
    /// A type defined in this unit, by handle.
    Defined(String),
    Array(Box<TypeExpr>, u8),
    Generic(Box<TypeExpr>, Vec<TypeExpr>),
    Pointer(Box<TypeExpr>),
    ByRef(Box<TypeExpr>),
    GenericParameter {
        name: String,
        ordinal: u16,
        method_owned: bool,
    },
    FunctionPointer {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
    },
}

impl TypeExpr {
    pub fn import(qualified: impl Into<String>) -> Self {
        TypeExpr::Import(qualified.into())
    }

    pub fn array_of(element: TypeExpr) -> Self {
        TypeExpr::Array(Box::new(element), 1)
    }

    pub fn by_ref(element: TypeExpr) -> Self {
        TypeExpr::ByRef(Box::new(element))
    }

    /// Element of arrays, pointers and by-ref types.
    pub fn element(&self) -> Option<&TypeExpr> {
        match self {
            TypeExpr::Array(e, _) | TypeExpr::Pointer(e) | TypeExpr::ByRef(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::TypeSystem(name) => write!(f, "TypeSystem.{name}"),
            TypeExpr::Import(name) => write!(f, "Import(\"{name}\")"),
            TypeExpr::Defined(handle) => f.write_str(handle),
            TypeExpr::Array(element, 1) => write!(f, "{element}.MakeArrayType()"),
            TypeExpr::Array(element, rank) => write!(f, "{element}.MakeArrayType({rank})"),
            TypeExpr::Generic(definition, args) => {
                write!(f, "{definition}.MakeGenericInstanceType(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            TypeExpr::Pointer(element) => write!(f, "{element}.MakePointerType()"),
            TypeExpr::ByRef(element) => write!(f, "{element}.MakeByReferenceType()"),
            TypeExpr::GenericParameter {
                name, method_owned, ..
            } => {
                if *method_owned {
                    write!(f, "!!{name}")
                } else {
                    write!(f, "!{name}")
                }
            }
            TypeExpr::FunctionPointer { params, ret } => {
                f.write_str("FunctionPointer(")?;
                for param in params {
                    write!(f, "{param}, ")?;
                }
                write!(f, "{ret})")
            }
        }
    }
}

/// Well-known imported types the lowering refers to directly.
pub mod well_known {
    use super::TypeExpr;

    pub fn value_type() -> TypeExpr {
        TypeExpr::import("System.ValueType")
    }

    pub fn enum_base() -> TypeExpr {
        TypeExpr::import("System.Enum")
    }

    pub fn delegate() -> TypeExpr {
        TypeExpr::import("System.Delegate")
    }

    pub fn system_type() -> TypeExpr {
        TypeExpr::import("System.Type")
    }

    pub fn runtime_type_handle() -> TypeExpr {
        TypeExpr::import("System.RuntimeTypeHandle")
    }

    pub fn object() -> TypeExpr {
        TypeExpr::TypeSystem("Object")
    }

    pub fn string() -> TypeExpr {
        TypeExpr::TypeSystem("String")
    }

    pub fn boolean() -> TypeExpr {
        TypeExpr::TypeSystem("Boolean")
    }

    pub fn intptr() -> TypeExpr {
        TypeExpr::TypeSystem("IntPtr")
    }
}

// ============================================================================
// Resolved types and typed access opcodes
// ============================================================================

/// An opcode that may need a type operand (`ldelem.any`, `ldobj`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedOp {
    pub op: OpCode,
    pub ty: Option<TypeExpr>,
}

impl TypedOp {
    fn plain(op: OpCode) -> Self {
        Self { op, ty: None }
    }

    fn typed(op: OpCode, ty: &TypeExpr) -> Self {
        Self {
            op,
            ty: Some(ty.clone()),
        }
    }

    pub fn emit(&self, emitter: &mut BodyEmitter) -> InstrId {
        match &self.ty {
            Some(ty) => emitter.emit_type(self.op, ty.clone()),
            None => emitter.emit(self.op),
        }
    }
}

/// How values of a type are stored in slots of its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    I,
    R4,
    R8,
    Ref,
    /// A non-primitive value type, accessed with a type operand.
    Struct,
    /// A type parameter: either kind of value, so always the typed forms.
    Parameter,
}

fn slot_of(ty: &SemanticType) -> Slot {
    if let Some(kind) = ty.numeric_kind() {
        return match kind {
            PrimitiveKind::Bool | PrimitiveKind::UInt8 => Slot::U1,
            PrimitiveKind::Int8 => Slot::I1,
            PrimitiveKind::Int16 => Slot::I2,
            PrimitiveKind::UInt16 | PrimitiveKind::Char => Slot::U2,
            PrimitiveKind::Int32 => Slot::I4,
            PrimitiveKind::UInt32 => Slot::U4,
            PrimitiveKind::Int64 | PrimitiveKind::UInt64 => Slot::I8,
            PrimitiveKind::IntPtr | PrimitiveKind::UIntPtr => Slot::I,
            PrimitiveKind::Float32 => Slot::R4,
            PrimitiveKind::Float64 => Slot::R8,
            PrimitiveKind::Void | PrimitiveKind::String | PrimitiveKind::Object => Slot::Ref,
        };
    }
    match ty {
        SemanticType::Pointer(_) | SemanticType::FunctionPointer { .. } => Slot::I,
        SemanticType::TypeParameter { .. } => Slot::Parameter,
        t if t.is_value_type() => Slot::Struct,
        _ => Slot::Ref,
    }
}

/// Opcode that loads an array element of type `element`.
pub fn load_element(element: &SemanticType, expr: &TypeExpr) -> TypedOp {
    use OpCode::*;
    TypedOp::plain(match slot_of(element) {
        Slot::I1 => Ldelem_I1,
        Slot::U1 => Ldelem_U1,
        Slot::I2 => Ldelem_I2,
        Slot::U2 => Ldelem_U2,
        Slot::I4 => Ldelem_I4,
        Slot::U4 => Ldelem_U4,
        Slot::I8 => Ldelem_I8,
        Slot::I => Ldelem_I,
        Slot::R4 => Ldelem_R4,
        Slot::R8 => Ldelem_R8,
        Slot::Ref => Ldelem_Ref,
        Slot::Struct | Slot::Parameter => return TypedOp::typed(Ldelem_Any, expr),
    })
}

/// Opcode that stores an array element of type `element`.
pub fn store_element(element: &SemanticType, expr: &TypeExpr) -> TypedOp {
    use OpCode::*;
    TypedOp::plain(match slot_of(element) {
        Slot::I1 | Slot::U1 => Stelem_I1,
        Slot::I2 | Slot::U2 => Stelem_I2,
        Slot::I4 | Slot::U4 => Stelem_I4,
        Slot::I8 => Stelem_I8,
        Slot::I => Stelem_I,
        Slot::R4 => Stelem_R4,
        Slot::R8 => Stelem_R8,
        Slot::Ref => Stelem_Ref,
        Slot::Struct | Slot::Parameter => return TypedOp::typed(Stelem_Any, expr),
    })
}

/// Opcode that loads a value of type `ty` through an address.
pub fn load_indirect(ty: &SemanticType, expr: &TypeExpr) -> TypedOp {
    use OpCode::*;
    TypedOp::plain(match slot_of(ty) {
        Slot::I1 => Ldind_I1,
        Slot::U1 => Ldind_U1,
        Slot::I2 => Ldind_I2,
        Slot::U2 => Ldind_U2,
        Slot::I4 => Ldind_I4,
        Slot::U4 => Ldind_U4,
        Slot::I8 => Ldind_I8,
        Slot::I => Ldind_I,
        Slot::R4 => Ldind_R4,
        Slot::R8 => Ldind_R8,
        Slot::Ref => Ldind_Ref,
        Slot::Struct | Slot::Parameter => return TypedOp::typed(Ldobj, expr),
    })
}

/// Opcode that stores a value of type `ty` through an address.
pub fn store_indirect(ty: &SemanticType, expr: &TypeExpr) -> TypedOp {
    use OpCode::*;
    TypedOp::plain(match slot_of(ty) {
        Slot::I1 | Slot::U1 => Stind_I1,
        Slot::I2 | Slot::U2 => Stind_I2,
        Slot::I4 | Slot::U4 => Stind_I4,
        Slot::I8 => Stind_I8,
        Slot::I => Stind_I,
        Slot::R4 => Stind_R4,
        Slot::R8 => Stind_R8,
        Slot::Ref => Stind_Ref,
        Slot::Struct | Slot::Parameter => return TypedOp::typed(Stobj, expr),
    })
}

/// A resolved type: the target expression plus the semantic facts later
/// decisions need.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedType {
    pub expr: TypeExpr,
    pub semantic: SemanticType,
}

impl ResolvedType {
    pub fn is_value_type(&self) -> bool {
        self.semantic.is_value_type()
    }

    pub fn is_array(&self) -> bool {
        self.semantic.is_array()
    }

    pub fn is_generic(&self) -> bool {
        self.semantic.is_generic_instance()
    }

    /// Whether moving a value of this type to `object` needs `box`. Type
    /// parameters always do: `box` on a reference instantiation is a no-op.
    pub fn needs_boxing(&self) -> bool {
        self.semantic.is_type_parameter()
            || (self.semantic.is_value_type() && !matches!(self.semantic, SemanticType::Pointer(_)))
    }

    /// Element type of arrays, pointers and by-refs.
    pub fn element(&self) -> Option<ResolvedType> {
        let semantic = self.semantic.element_type()?.clone();
        let expr = self.expr.element()?.clone();
        Some(ResolvedType { expr, semantic })
    }

    pub fn load_element(&self) -> Option<TypedOp> {
        self.element().map(|e| load_element(&e.semantic, &e.expr))
    }

    pub fn store_element(&self) -> Option<TypedOp> {
        self.element().map(|e| store_element(&e.semantic, &e.expr))
    }

    /// Load a value of this type through an address.
    pub fn load_indirect(&self) -> TypedOp {
        load_indirect(&self.semantic, &self.expr)
    }

    pub fn store_indirect(&self) -> TypedOp {
        store_indirect(&self.semantic, &self.expr)
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.expr.fmt(f)
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves semantic types against the lowering context.
pub struct TypeResolver<'a, 'm> {
    ctx: &'a mut LoweringContext<'m>,
}

impl<'a, 'm> TypeResolver<'a, 'm> {
    pub fn new(ctx: &'a mut LoweringContext<'m>) -> Self {
        Self { ctx }
    }

    /// Resolve `ty`, stubbing source types that have not been declared yet.
    pub fn resolve(&mut self, ty: &SemanticType, span: Span) -> Result<ResolvedType> {
        let expr = self.resolve_expr(ty, span)?;
        Ok(ResolvedType {
            expr,
            semantic: ty.clone(),
        })
    }

    fn resolve_expr(&mut self, ty: &SemanticType, span: Span) -> Result<TypeExpr> {
        match ty {
            SemanticType::Named(named) if named.from_source => self.resolve_source(named, span),
            SemanticType::Primitive(kind) => Ok(TypeExpr::TypeSystem(kind.system_name())),
            SemanticType::Named(named) => Ok(TypeExpr::Import(named.qualified_name())),
            SemanticType::Array { element, rank } => {
                let element = self.resolve_expr(element, span)?;
                Ok(TypeExpr::Array(Box::new(element), *rank))
            }
            SemanticType::Generic { definition, args } => {
                let open = if definition.from_source {
                    self.resolve_source(definition, span)?
                } else {
                    TypeExpr::Import(definition.qualified_name())
                };
                let args = args
                    .iter()
                    .map(|arg| self.resolve_expr(arg, span))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TypeExpr::Generic(Box::new(open), args))
            }
            SemanticType::Pointer(element) => {
                let element = self.resolve_expr(element, span)?;
                Ok(TypeExpr::Pointer(Box::new(element)))
            }
            SemanticType::ByRef(element) => {
                let element = self.resolve_expr(element, span)?;
                Ok(TypeExpr::ByRef(Box::new(element)))
            }
            SemanticType::TypeParameter {
                name,
                ordinal,
                method_owned,
            } => Ok(TypeExpr::GenericParameter {
                name: name.clone(),
                ordinal: *ordinal,
                method_owned: *method_owned,
            }),
            SemanticType::FunctionPointer { params, ret } => {
                let params = params
                    .iter()
                    .map(|p| self.resolve_expr(p, span))
                    .collect::<Result<Vec<_>>>()?;
                let ret = self.resolve_expr(ret, span)?;
                Ok(TypeExpr::FunctionPointer {
                    params,
                    ret: Box::new(ret),
                })
            }
            SemanticType::Null => Ok(TypeExpr::TypeSystem(PrimitiveKind::Object.system_name())),
        }
    }

    /// A type declared in this unit: its registered handle, or a fresh
    /// forward stub.
    fn resolve_source(&mut self, named: &NamedType, span: Span) -> Result<TypeExpr> {
        let scope = named.scope_name();
        let name = named.metadata_name();
        let defs = &mut self.ctx.defs;
        if let Some(id) = defs.try_lookup_id(MemberKind::Type, &scope, &name)? {
            let handle = defs.get(id).map(|d| d.handle.clone()).unwrap_or_default();
            return Ok(TypeExpr::Defined(handle));
        }

        let handle = self.ctx.names.handle(MemberKind::Type, &named.name);
        trace!(%scope, %name, %handle, "forward-declaring type");
        self.ctx.defs.register_stub(
            DefinitionVariable::new(MemberKind::Type, scope.clone(), name.clone(), handle.clone())
                .at(span),
        )?;
        self.ctx.emit_call(BuilderCall::ForwardDeclare {
            kind: MemberKind::Type,
            handle: handle.clone(),
            scope,
            name,
        });
        Ok(TypeExpr::Defined(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LoweringOptions;
    use ilweave_core::{SemanticTable, TypeKind};

    fn point() -> NamedType {
        NamedType::new("Demo", "Point", TypeKind::Struct).in_source()
    }

    #[test]
    fn resolve_primitives() {
        let model = SemanticTable::new();
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let mut resolver = TypeResolver::new(&mut ctx);

        let int = resolver.resolve(&SemanticType::INT32, Span::default()).unwrap();
        assert_eq!(int.expr, TypeExpr::TypeSystem("Int32"));
        assert_eq!(int.to_string(), "TypeSystem.Int32");
        assert!(int.is_value_type());

        let string = resolver.resolve(&SemanticType::STRING, Span::default()).unwrap();
        assert_eq!(string.to_string(), "TypeSystem.String");
        assert!(!string.needs_boxing());
    }

    #[test]
    fn resolve_imported_named_and_generic() {
        let model = SemanticTable::new();
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let mut resolver = TypeResolver::new(&mut ctx);

        let list = NamedType::new("System.Collections.Generic", "List", TypeKind::Class).with_arity(1);
        let ty = SemanticType::generic(list, vec![SemanticType::INT32]);
        let resolved = resolver.resolve(&ty, Span::default()).unwrap();
        assert!(resolved.is_generic());
        assert_eq!(
            resolved.to_string(),
            "Import(\"System.Collections.Generic.List`1\").MakeGenericInstanceType(TypeSystem.Int32)"
        );
    }

    #[test]
    fn resolve_array_element_ops() {
        let model = SemanticTable::new();
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let mut resolver = TypeResolver::new(&mut ctx);

        let ints = resolver
            .resolve(&SemanticType::array_of(SemanticType::INT32), Span::default())
            .unwrap();
        assert_eq!(ints.to_string(), "TypeSystem.Int32.MakeArrayType()");
        assert_eq!(ints.load_element().map(|t| t.op), Some(OpCode::Ldelem_I4));
        assert_eq!(ints.store_element().map(|t| t.op), Some(OpCode::Stelem_I4));

        let strings = resolver
            .resolve(&SemanticType::array_of(SemanticType::STRING), Span::default())
            .unwrap();
        assert_eq!(strings.load_element().map(|t| t.op), Some(OpCode::Ldelem_Ref));
    }

    #[test]
    fn source_type_referenced_early_is_stubbed_once() {
        let model = SemanticTable::new();
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());

        let first = TypeResolver::new(&mut ctx)
            .resolve(&SemanticType::named(point()), Span::default())
            .unwrap();
        let second = TypeResolver::new(&mut ctx)
            .resolve(&SemanticType::named(point()), Span::default())
            .unwrap();
        assert_eq!(first.expr, second.expr);
        assert_eq!(ctx.defs.pending_stubs(), 1);

        let forward = ctx
            .calls()
            .iter()
            .filter(|c| matches!(c, BuilderCall::ForwardDeclare { .. }))
            .count();
        assert_eq!(forward, 1);
    }

    #[test]
    fn struct_elements_use_typed_access() {
        let model = SemanticTable::new();
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let arr = TypeResolver::new(&mut ctx)
            .resolve(&SemanticType::array_of(SemanticType::named(point())), Span::default())
            .unwrap();

        let load = arr.load_element().unwrap();
        assert_eq!(load.op, OpCode::Ldelem_Any);
        assert!(matches!(load.ty, Some(TypeExpr::Defined(_))));

        let element = arr.element().unwrap();
        assert_eq!(element.load_indirect().op, OpCode::Ldobj);
        assert_eq!(element.store_indirect().op, OpCode::Stobj);
    }

    #[test]
    fn type_parameters_use_typed_access_and_box() {
        let model = SemanticTable::new();
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let t = SemanticType::TypeParameter {
            name: "T".into(),
            ordinal: 0,
            method_owned: false,
        };
        let arr = TypeResolver::new(&mut ctx)
            .resolve(&SemanticType::array_of(t), Span::default())
            .unwrap();

        let store = arr.store_element().unwrap();
        assert_eq!(store.op, OpCode::Stelem_Any);
        assert_eq!(store.ty.map(|t| t.to_string()).as_deref(), Some("!T"));

        let element = arr.element().unwrap();
        assert!(element.needs_boxing());
        assert_eq!(element.load_indirect().op, OpCode::Ldobj);
        assert_eq!(element.store_indirect().op, OpCode::Stobj);
    }

    #[test]
    fn pointer_and_byref_wrap_element() {
        let model = SemanticTable::new();
        let mut ctx = LoweringContext::new(&model, LoweringOptions::default());
        let mut resolver = TypeResolver::new(&mut ctx);

        let ptr = resolver
            .resolve(&SemanticType::pointer_to(SemanticType::INT32), Span::default())
            .unwrap();
        assert_eq!(ptr.to_string(), "TypeSystem.Int32.MakePointerType()");
        assert!(!ptr.needs_boxing());

        let byref = resolver
            .resolve(&SemanticType::by_ref(SemanticType::FLOAT64), Span::default())
            .unwrap();
        assert_eq!(byref.load_indirect().op, OpCode::Ldind_Ref);
        assert_eq!(byref.element().unwrap().load_indirect().op, OpCode::Ldind_R8);
    }
}
