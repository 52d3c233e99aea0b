//! Resolved declarations as reported by the front-end.
//!
//! Symbols are immutable inputs: the lowering engine only reads them and uses
//! their identity as a lookup key.

use std::fmt;

use crate::SymbolId;

use super::types::SemanticType;

/// Declared accessibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Accessibility {
    Public,
    Internal,
    Protected,
    ProtectedInternal,
    #[default]
    Private,
}

/// How a parameter is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RefKind {
    #[default]
    None,
    Ref,
    Out,
    In,
}

/// Compile-time constant values (literal fields, enum members, `const`).
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Bool(bool),
    Char(char),
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Null,
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Bool(b) => write!(f, "{b}"),
            ConstantValue::Char(c) => write!(f, "'{}'", c.escape_default()),
            ConstantValue::Int(i) => write!(f, "{i}"),
            ConstantValue::UInt(u) => write!(f, "{u}"),
            ConstantValue::Float32(v) => write!(f, "{v}f"),
            ConstantValue::Float64(v) => write!(f, "{v}"),
            ConstantValue::String(s) => write!(f, "{s:?}"),
            ConstantValue::Null => f.write_str("null"),
        }
    }
}

/// What flavour of method a method symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Ordinary,
    Constructor,
    StaticConstructor,
    PropertyGet,
    PropertySet,
    EventAdd,
    EventRemove,
    Operator,
    Conversion,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    pub ty: SemanticType,
    pub ref_kind: RefKind,
}

impl ParameterInfo {
    pub fn new(name: impl Into<String>, ty: SemanticType) -> Self {
        Self {
            name: name.into(),
            ty,
            ref_kind: RefKind::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSymbol {
    pub return_type: SemanticType,
    pub params: Vec<ParameterInfo>,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
    pub is_override: bool,
    pub is_extern: bool,
    pub method_kind: MethodKind,
    pub accessibility: Accessibility,
}

impl MethodSymbol {
    pub fn new(return_type: SemanticType, params: Vec<ParameterInfo>) -> Self {
        Self {
            return_type,
            params,
            is_static: false,
            is_virtual: false,
            is_abstract: false,
            is_override: false,
            is_extern: false,
            method_kind: MethodKind::Ordinary,
            accessibility: Accessibility::Public,
        }
    }

    pub fn is_constructor(&self) -> bool {
        matches!(
            self.method_kind,
            MethodKind::Constructor | MethodKind::StaticConstructor
        )
    }

    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSymbol {
    pub ty: SemanticType,
    pub is_static: bool,
    pub is_readonly: bool,
    /// Set for `const` fields and enum members.
    pub constant: Option<ConstantValue>,
    pub accessibility: Accessibility,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySymbol {
    pub ty: SemanticType,
    pub is_static: bool,
    pub getter: Option<SymbolId>,
    pub setter: Option<SymbolId>,
    /// Backing field of an auto-property.
    pub backing_field: Option<SymbolId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventSymbol {
    pub ty: SemanticType,
    pub is_static: bool,
    pub add: Option<SymbolId>,
    pub remove: Option<SymbolId>,
    /// Backing field of a field-like event.
    pub backing_field: Option<SymbolId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSymbol {
    pub ty: SemanticType,
    pub base: Option<SemanticType>,
    pub interfaces: Vec<SemanticType>,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub is_static: bool,
    pub accessibility: Accessibility,
}

/// Per-kind symbol payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Local {
        ty: SemanticType,
        constant: Option<ConstantValue>,
    },
    Parameter {
        ty: SemanticType,
        ordinal: u16,
        ref_kind: RefKind,
    },
    Field(FieldSymbol),
    Method(MethodSymbol),
    Property(PropertySymbol),
    Event(EventSymbol),
    Type(TypeSymbol),
}

/// A resolved declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    /// The type declaring this member, if it is a member.
    pub containing_type: Option<SemanticType>,
    /// Declared in the unit being lowered.
    pub from_source: bool,
    pub kind: SymbolKind,
}

impl Symbol {
    /// The value type of this symbol, when it has one.
    pub fn ty(&self) -> Option<&SemanticType> {
        match &self.kind {
            SymbolKind::Local { ty, .. } | SymbolKind::Parameter { ty, .. } => Some(ty),
            SymbolKind::Field(f) => Some(&f.ty),
            SymbolKind::Method(m) => Some(&m.return_type),
            SymbolKind::Property(p) => Some(&p.ty),
            SymbolKind::Event(e) => Some(&e.ty),
            SymbolKind::Type(t) => Some(&t.ty),
        }
    }

    pub fn as_method(&self) -> Option<&MethodSymbol> {
        match &self.kind {
            SymbolKind::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldSymbol> {
        match &self.kind {
            SymbolKind::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_property(&self) -> Option<&PropertySymbol> {
        match &self.kind {
            SymbolKind::Property(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_event(&self) -> Option<&EventSymbol> {
        match &self.kind {
            SymbolKind::Event(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeSymbol> {
        match &self.kind {
            SymbolKind::Type(t) => Some(t),
            _ => None,
        }
    }

    /// Whether the member belongs to the type rather than an instance.
    pub fn is_static(&self) -> bool {
        match &self.kind {
            SymbolKind::Field(f) => f.is_static,
            SymbolKind::Method(m) => m.is_static,
            SymbolKind::Property(p) => p.is_static,
            SymbolKind::Event(e) => e.is_static,
            SymbolKind::Type(t) => t.is_static,
            SymbolKind::Local { .. } | SymbolKind::Parameter { .. } => false,
        }
    }

    /// Qualified name of the declaring type, or empty for locals.
    pub fn scope_name(&self) -> String {
        match (&self.kind, &self.containing_type) {
            (SymbolKind::Type(t), _) => match t.ty.as_named() {
                Some(named) => named.scope_name(),
                None => String::new(),
            },
            (_, Some(container)) => container.to_string(),
            (_, None) => String::new(),
        }
    }

    /// Name including the parameter signature for methods, the arity suffix
    /// for generic types, the plain name otherwise.
    pub fn signature_name(&self) -> String {
        match &self.kind {
            SymbolKind::Method(m) => {
                let params: Vec<String> = m.params.iter().map(|p| p.ty.to_string()).collect();
                format!("{}({})", self.name, params.join(","))
            }
            SymbolKind::Type(t) => match t.ty.as_named() {
                Some(named) => named.metadata_name(),
                None => self.name.clone(),
            },
            _ => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::types::{NamedType, TypeKind};

    fn method(name: &str, params: Vec<ParameterInfo>) -> Symbol {
        Symbol {
            id: SymbolId(1),
            name: name.into(),
            containing_type: Some(SemanticType::named(NamedType::new(
                "Demo",
                "Calc",
                TypeKind::Class,
            ))),
            from_source: true,
            kind: SymbolKind::Method(MethodSymbol::new(SemanticType::INT32, params)),
        }
    }

    #[test]
    fn method_signature_name_includes_params() {
        let sym = method(
            "Add",
            vec![
                ParameterInfo::new("a", SemanticType::INT32),
                ParameterInfo::new("b", SemanticType::INT64),
            ],
        );
        assert_eq!(sym.signature_name(), "Add(int,long)");
        assert_eq!(sym.scope_name(), "Demo.Calc");
    }

    #[test]
    fn type_symbol_scope_is_namespace() {
        let ty = SemanticType::named(NamedType::new("Demo", "Calc", TypeKind::Class).with_arity(2));
        let sym = Symbol {
            id: SymbolId(2),
            name: "Calc".into(),
            containing_type: None,
            from_source: true,
            kind: SymbolKind::Type(TypeSymbol {
                ty,
                base: None,
                interfaces: vec![],
                is_abstract: false,
                is_sealed: false,
                is_static: false,
                accessibility: Accessibility::Public,
            }),
        };
        assert_eq!(sym.scope_name(), "Demo");
        assert_eq!(sym.signature_name(), "Calc`2");
    }
}
