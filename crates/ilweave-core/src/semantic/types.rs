//! Semantic types as reported by the front-end.

use std::fmt;

/// Built-in types of the source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Void,
    Bool,
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    IntPtr,
    UIntPtr,
    String,
    Object,
}

impl PrimitiveKind {
    /// Source-level keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Int8 => "sbyte",
            PrimitiveKind::UInt8 => "byte",
            PrimitiveKind::Int16 => "short",
            PrimitiveKind::UInt16 => "ushort",
            PrimitiveKind::Int32 => "int",
            PrimitiveKind::UInt32 => "uint",
            PrimitiveKind::Int64 => "long",
            PrimitiveKind::UInt64 => "ulong",
            PrimitiveKind::Float32 => "float",
            PrimitiveKind::Float64 => "double",
            PrimitiveKind::IntPtr => "nint",
            PrimitiveKind::UIntPtr => "nuint",
            PrimitiveKind::String => "string",
            PrimitiveKind::Object => "object",
        }
    }

    /// Name of the runtime type backing this primitive (`System.<name>`).
    pub const fn system_name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "Void",
            PrimitiveKind::Bool => "Boolean",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::Int8 => "SByte",
            PrimitiveKind::UInt8 => "Byte",
            PrimitiveKind::Int16 => "Int16",
            PrimitiveKind::UInt16 => "UInt16",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::UInt32 => "UInt32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::UInt64 => "UInt64",
            PrimitiveKind::Float32 => "Single",
            PrimitiveKind::Float64 => "Double",
            PrimitiveKind::IntPtr => "IntPtr",
            PrimitiveKind::UIntPtr => "UIntPtr",
            PrimitiveKind::String => "String",
            PrimitiveKind::Object => "Object",
        }
    }

    /// Integral types, including `char` and the native-sized integers.
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Char
                | PrimitiveKind::Int8
                | PrimitiveKind::UInt8
                | PrimitiveKind::Int16
                | PrimitiveKind::UInt16
                | PrimitiveKind::Int32
                | PrimitiveKind::UInt32
                | PrimitiveKind::Int64
                | PrimitiveKind::UInt64
                | PrimitiveKind::IntPtr
                | PrimitiveKind::UIntPtr
        )
    }

    /// Unsigned integral types. `char` counts as unsigned.
    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Char
                | PrimitiveKind::UInt8
                | PrimitiveKind::UInt16
                | PrimitiveKind::UInt32
                | PrimitiveKind::UInt64
                | PrimitiveKind::UIntPtr
        )
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, PrimitiveKind::Float32 | PrimitiveKind::Float64)
    }

    pub const fn is_numeric(self) -> bool {
        self.is_integral() || self.is_floating()
    }

    /// Whether values of this type live on the stack rather than the heap.
    pub const fn is_value_type(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Void | PrimitiveKind::String | PrimitiveKind::Object
        )
    }

    /// Width in bits for numeric types; native-sized integers report 64.
    pub const fn bits(self) -> u8 {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::Int8 | PrimitiveKind::UInt8 => 8,
            PrimitiveKind::Char | PrimitiveKind::Int16 | PrimitiveKind::UInt16 => 16,
            PrimitiveKind::Int32 | PrimitiveKind::UInt32 | PrimitiveKind::Float32 => 32,
            PrimitiveKind::Int64
            | PrimitiveKind::UInt64
            | PrimitiveKind::Float64
            | PrimitiveKind::IntPtr
            | PrimitiveKind::UIntPtr => 64,
            PrimitiveKind::Void | PrimitiveKind::String | PrimitiveKind::Object => 0,
        }
    }
}

/// Category of a user-visible named type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
}

/// A named (non-primitive) type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedType {
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
    /// Declaring type for nested types.
    pub declaring: Option<Box<NamedType>>,
    /// Number of generic type parameters of the open definition.
    pub arity: u8,
    /// Underlying integral type of an enum.
    pub underlying: Option<PrimitiveKind>,
    /// Declared in the compilation unit being lowered (as opposed to imported).
    pub from_source: bool,
}

impl NamedType {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind,
            declaring: None,
            arity: 0,
            underlying: if kind == TypeKind::Enum {
                Some(PrimitiveKind::Int32)
            } else {
                None
            },
            from_source: false,
        }
    }

    /// Mark as declared in the unit being lowered.
    pub fn in_source(mut self) -> Self {
        self.from_source = true;
        self
    }

    pub fn nested_in(mut self, declaring: NamedType) -> Self {
        self.namespace = declaring.namespace.clone();
        self.declaring = Some(Box::new(declaring));
        self
    }

    pub fn with_arity(mut self, arity: u8) -> Self {
        self.arity = arity;
        self
    }

    pub fn with_underlying(mut self, underlying: PrimitiveKind) -> Self {
        self.underlying = Some(underlying);
        self
    }

    /// Metadata name: the simple name plus a `` `N`` arity suffix for generics.
    pub fn metadata_name(&self) -> String {
        if self.arity > 0 {
            format!("{}`{}", self.name, self.arity)
        } else {
            self.name.clone()
        }
    }

    /// Scope in which this type is declared: the declaring type for nested
    /// types, the namespace otherwise.
    pub fn scope_name(&self) -> String {
        match &self.declaring {
            Some(outer) => outer.qualified_name(),
            None => self.namespace.clone(),
        }
    }

    /// Fully qualified metadata name, nested types separated with `/`.
    pub fn qualified_name(&self) -> String {
        match &self.declaring {
            Some(outer) => format!("{}/{}", outer.qualified_name(), self.metadata_name()),
            None if self.namespace.is_empty() => self.metadata_name(),
            None => format!("{}.{}", self.namespace, self.metadata_name()),
        }
    }

    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Enum)
    }
}

/// A type as resolved by the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Primitive(PrimitiveKind),
    Named(NamedType),
    /// A constructed generic, e.g. `List<int>`.
    Generic {
        definition: NamedType,
        args: Vec<SemanticType>,
    },
    Array {
        element: Box<SemanticType>,
        rank: u8,
    },
    Pointer(Box<SemanticType>),
    ByRef(Box<SemanticType>),
    FunctionPointer {
        params: Vec<SemanticType>,
        ret: Box<SemanticType>,
    },
    TypeParameter {
        name: String,
        ordinal: u16,
        /// Declared on a method (`!!N`) rather than a type (`!N`).
        method_owned: bool,
    },
    /// Type of the `null` literal.
    Null,
}

impl SemanticType {
    pub const VOID: SemanticType = SemanticType::Primitive(PrimitiveKind::Void);
    pub const BOOL: SemanticType = SemanticType::Primitive(PrimitiveKind::Bool);
    pub const INT32: SemanticType = SemanticType::Primitive(PrimitiveKind::Int32);
    pub const INT64: SemanticType = SemanticType::Primitive(PrimitiveKind::Int64);
    pub const FLOAT64: SemanticType = SemanticType::Primitive(PrimitiveKind::Float64);
    pub const STRING: SemanticType = SemanticType::Primitive(PrimitiveKind::String);
    pub const OBJECT: SemanticType = SemanticType::Primitive(PrimitiveKind::Object);

    pub fn named(named: NamedType) -> Self {
        SemanticType::Named(named)
    }

    pub fn array_of(element: SemanticType) -> Self {
        SemanticType::Array {
            element: Box::new(element),
            rank: 1,
        }
    }

    pub fn pointer_to(element: SemanticType) -> Self {
        SemanticType::Pointer(Box::new(element))
    }

    pub fn by_ref(element: SemanticType) -> Self {
        SemanticType::ByRef(Box::new(element))
    }

    pub fn generic(definition: NamedType, args: Vec<SemanticType>) -> Self {
        SemanticType::Generic { definition, args }
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            SemanticType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_named(&self) -> Option<&NamedType> {
        match self {
            SemanticType::Named(n) => Some(n),
            SemanticType::Generic { definition, .. } => Some(definition),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, SemanticType::Primitive(PrimitiveKind::Void))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, SemanticType::Primitive(PrimitiveKind::String))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, SemanticType::Primitive(PrimitiveKind::Bool))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, SemanticType::Array { .. })
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, SemanticType::Named(n) if n.kind == TypeKind::Enum)
    }

    pub fn is_delegate(&self) -> bool {
        matches!(self.as_named(), Some(n) if n.kind == TypeKind::Delegate)
    }

    pub fn is_generic_instance(&self) -> bool {
        matches!(self, SemanticType::Generic { .. })
    }

    /// Value types: non-reference primitives, structs, enums and pointers.
    /// A type parameter is neither a value nor a reference type; see
    /// [`is_type_parameter`](Self::is_type_parameter).
    pub fn is_value_type(&self) -> bool {
        match self {
            SemanticType::Primitive(p) => p.is_value_type(),
            SemanticType::Named(n) => n.is_value_type(),
            SemanticType::Generic { definition, .. } => definition.is_value_type(),
            SemanticType::Pointer(_) | SemanticType::FunctionPointer { .. } => true,
            SemanticType::Array { .. }
            | SemanticType::ByRef(_)
            | SemanticType::TypeParameter { .. }
            | SemanticType::Null => false,
        }
    }

    pub fn is_reference_type(&self) -> bool {
        !self.is_value_type()
            && !self.is_void()
            && !matches!(self, SemanticType::ByRef(_) | SemanticType::TypeParameter { .. })
    }

    pub fn is_type_parameter(&self) -> bool {
        matches!(self, SemanticType::TypeParameter { .. })
    }

    /// The primitive that determines arithmetic and load/store behaviour:
    /// the type itself for primitives, the underlying type for enums.
    pub fn numeric_kind(&self) -> Option<PrimitiveKind> {
        match self {
            SemanticType::Primitive(p) if p.is_value_type() => Some(*p),
            SemanticType::Named(n) if n.kind == TypeKind::Enum => n.underlying,
            _ => None,
        }
    }

    /// Element type of arrays, pointers and by-ref types.
    pub fn element_type(&self) -> Option<&SemanticType> {
        match self {
            SemanticType::Array { element, .. }
            | SemanticType::Pointer(element)
            | SemanticType::ByRef(element) => Some(element),
            _ => None,
        }
    }
}

impl From<PrimitiveKind> for SemanticType {
    fn from(p: PrimitiveKind) -> Self {
        SemanticType::Primitive(p)
    }
}

impl From<NamedType> for SemanticType {
    fn from(n: NamedType) -> Self {
        SemanticType::Named(n)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Primitive(p) => f.write_str(p.keyword()),
            SemanticType::Named(n) => f.write_str(&n.qualified_name()),
            SemanticType::Generic { definition, args } => {
                write!(f, "{}<", definition.qualified_name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            SemanticType::Array { element, rank } => {
                write!(f, "{element}[")?;
                for _ in 1..*rank {
                    f.write_str(",")?;
                }
                f.write_str("]")
            }
            SemanticType::Pointer(e) => write!(f, "{e}*"),
            SemanticType::ByRef(e) => write!(f, "{e}&"),
            SemanticType::FunctionPointer { params, ret } => {
                f.write_str("delegate*<")?;
                for p in params {
                    write!(f, "{p},")?;
                }
                write!(f, "{ret}>")
            }
            SemanticType::TypeParameter { name, .. } => f.write_str(name),
            SemanticType::Null => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> NamedType {
        NamedType::new("Demo", "Point", TypeKind::Struct).in_source()
    }

    #[test]
    fn value_type_classification() {
        assert!(SemanticType::INT32.is_value_type());
        assert!(!SemanticType::STRING.is_value_type());
        assert!(SemanticType::named(point()).is_value_type());
        assert!(!SemanticType::array_of(SemanticType::INT32).is_value_type());
        assert!(SemanticType::array_of(SemanticType::INT32).is_reference_type());
        assert!(!SemanticType::VOID.is_reference_type());
        let t = SemanticType::TypeParameter {
            name: "T".into(),
            ordinal: 0,
            method_owned: false,
        };
        assert!(!t.is_value_type() && !t.is_reference_type());
    }

    #[test]
    fn enum_numeric_kind_is_underlying() {
        let color = NamedType::new("Demo", "Color", TypeKind::Enum).with_underlying(PrimitiveKind::UInt8);
        assert_eq!(SemanticType::named(color).numeric_kind(), Some(PrimitiveKind::UInt8));
        assert_eq!(SemanticType::STRING.numeric_kind(), None);
    }

    #[test]
    fn nested_qualified_name() {
        let inner = NamedType::new("", "Inner", TypeKind::Class).nested_in(point());
        assert_eq!(inner.qualified_name(), "Demo.Point/Inner");
        assert_eq!(inner.scope_name(), "Demo.Point");
    }

    #[test]
    fn display_generic_and_array() {
        let list = NamedType::new("System.Collections.Generic", "List", TypeKind::Class).with_arity(1);
        let ty = SemanticType::array_of(SemanticType::generic(list, vec![SemanticType::INT32]));
        assert_eq!(ty.to_string(), "System.Collections.Generic.List`1<int>[]");
    }

    #[test]
    fn unsigned_and_char() {
        assert!(PrimitiveKind::Char.is_unsigned());
        assert!(PrimitiveKind::Char.is_integral());
        assert!(!PrimitiveKind::Int64.is_unsigned());
        assert!(PrimitiveKind::Float32.is_floating());
    }
}
