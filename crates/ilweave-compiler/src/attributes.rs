//! Metadata attribute flags attached to defined types, fields and methods.
//!
//! Flags render with their builder-library names joined by `|`, e.g.
//! `Public | Static | HideBySig`.

use std::fmt;

use bitflags::bitflags;
use ilweave_core::{Accessibility, FieldSymbol, MethodKind, MethodSymbol, TypeKind, TypeSymbol};

bitflags! {
    /// Attributes of a defined type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeAttributes: u32 {
        const PUBLIC = 1 << 0;
        const NOT_PUBLIC = 1 << 1;
        const NESTED_PUBLIC = 1 << 2;
        const NESTED_PRIVATE = 1 << 3;
        const NESTED_FAMILY = 1 << 4;
        const NESTED_ASSEMBLY = 1 << 5;
        const INTERFACE = 1 << 6;
        const ABSTRACT = 1 << 7;
        const SEALED = 1 << 8;
        const SEQUENTIAL_LAYOUT = 1 << 9;
        const BEFORE_FIELD_INIT = 1 << 10;
    }
}

bitflags! {
    /// Attributes of a defined field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldAttributes: u32 {
        const PUBLIC = 1 << 0;
        const PRIVATE = 1 << 1;
        const FAMILY = 1 << 2;
        const ASSEMBLY = 1 << 3;
        const FAM_OR_ASSEM = 1 << 4;
        const STATIC = 1 << 5;
        const INIT_ONLY = 1 << 6;
        /// Compile-time constant; the value is stored in metadata.
        const LITERAL = 1 << 7;
        const HAS_DEFAULT = 1 << 8;
        const SPECIAL_NAME = 1 << 9;
        const RT_SPECIAL_NAME = 1 << 10;
    }
}

bitflags! {
    /// Attributes of a defined method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodAttributes: u32 {
        const PUBLIC = 1 << 0;
        const PRIVATE = 1 << 1;
        const FAMILY = 1 << 2;
        const ASSEMBLY = 1 << 3;
        const FAM_OR_ASSEM = 1 << 4;
        const STATIC = 1 << 5;
        const VIRTUAL = 1 << 6;
        const ABSTRACT = 1 << 7;
        const FINAL = 1 << 8;
        const HIDE_BY_SIG = 1 << 9;
        const NEW_SLOT = 1 << 10;
        const SPECIAL_NAME = 1 << 11;
        const RT_SPECIAL_NAME = 1 << 12;
        /// Implemented outside the module; no body.
        const PINVOKE_IMPL = 1 << 13;
    }
}

/// Builder-library spelling of a flag name: `SEQUENTIAL_LAYOUT` becomes
/// `SequentialLayout`.
fn pascal(name: &str) -> String {
    name.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_string() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect()
}

fn write_flags(f: &mut fmt::Formatter<'_>, names: impl Iterator<Item = &'static str>) -> fmt::Result {
    let mut first = true;
    for name in names {
        if !first {
            f.write_str(" | ")?;
        }
        first = false;
        f.write_str(&pascal(name))?;
    }
    if first {
        f.write_str("0")?;
    }
    Ok(())
}

impl fmt::Display for TypeAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self.iter_names().map(|(name, _)| name))
    }
}

impl fmt::Display for FieldAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self.iter_names().map(|(name, _)| name))
    }
}

impl fmt::Display for MethodAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flags(f, self.iter_names().map(|(name, _)| name))
    }
}

impl TypeAttributes {
    /// Visibility and kind flags for a type declaration.
    pub fn for_type(kind: TypeKind, accessibility: Accessibility, nested: bool) -> Self {
        let mut attrs = match (nested, accessibility) {
            (false, Accessibility::Public) => Self::PUBLIC,
            (false, _) => Self::NOT_PUBLIC,
            (true, Accessibility::Public) => Self::NESTED_PUBLIC,
            (true, Accessibility::Protected | Accessibility::ProtectedInternal) => {
                Self::NESTED_FAMILY
            }
            (true, Accessibility::Internal) => Self::NESTED_ASSEMBLY,
            (true, Accessibility::Private) => Self::NESTED_PRIVATE,
        };
        match kind {
            TypeKind::Interface => attrs |= Self::INTERFACE | Self::ABSTRACT,
            TypeKind::Struct | TypeKind::Enum => attrs |= Self::SEALED | Self::SEQUENTIAL_LAYOUT,
            TypeKind::Delegate => attrs |= Self::SEALED,
            TypeKind::Class => attrs |= Self::BEFORE_FIELD_INIT,
        }
        attrs
    }
}

impl FieldAttributes {
    pub fn from_accessibility(accessibility: Accessibility) -> Self {
        match accessibility {
            Accessibility::Public => Self::PUBLIC,
            Accessibility::Internal => Self::ASSEMBLY,
            Accessibility::Protected => Self::FAMILY,
            Accessibility::ProtectedInternal => Self::FAM_OR_ASSEM,
            Accessibility::Private => Self::PRIVATE,
        }
    }

    /// Flags for a declared field. Constants are static literals.
    pub fn for_field(field: &FieldSymbol) -> Self {
        let mut attrs = Self::from_accessibility(field.accessibility);
        if field.constant.is_some() {
            return attrs | Self::STATIC | Self::LITERAL | Self::HAS_DEFAULT;
        }
        if field.is_static {
            attrs |= Self::STATIC;
        }
        if field.is_readonly {
            attrs |= Self::INIT_ONLY;
        }
        attrs
    }
}

impl MethodAttributes {
    pub fn from_accessibility(accessibility: Accessibility) -> Self {
        let visibility = match accessibility {
            Accessibility::Public => Self::PUBLIC,
            Accessibility::Internal => Self::ASSEMBLY,
            Accessibility::Protected => Self::FAMILY,
            Accessibility::ProtectedInternal => Self::FAM_OR_ASSEM,
            Accessibility::Private => Self::PRIVATE,
        };
        visibility | Self::HIDE_BY_SIG
    }

    /// Flags for a declared method, accessor, operator or constructor.
    pub fn for_method(method: &MethodSymbol) -> Self {
        let mut attrs = Self::from_accessibility(method.accessibility);
        if method.is_static {
            attrs |= Self::STATIC;
        }
        if method.is_abstract {
            attrs |= Self::ABSTRACT | Self::VIRTUAL;
        }
        if method.is_virtual || method.is_override {
            attrs |= Self::VIRTUAL;
        }
        if attrs.contains(Self::VIRTUAL) && !method.is_override {
            attrs |= Self::NEW_SLOT;
        }
        if method.is_extern {
            attrs |= Self::PINVOKE_IMPL;
        }
        match method.method_kind {
            MethodKind::Ordinary => {}
            MethodKind::Constructor | MethodKind::StaticConstructor => {
                attrs |= Self::SPECIAL_NAME | Self::RT_SPECIAL_NAME;
            }
            MethodKind::PropertyGet
            | MethodKind::PropertySet
            | MethodKind::EventAdd
            | MethodKind::EventRemove
            | MethodKind::Operator
            | MethodKind::Conversion => attrs |= Self::SPECIAL_NAME,
        }
        attrs
    }

    /// Flags of a constructor the declaring type gets without declaring it.
    pub fn implicit_constructor(is_static: bool) -> Self {
        let base = Self::HIDE_BY_SIG | Self::SPECIAL_NAME | Self::RT_SPECIAL_NAME;
        if is_static {
            base | Self::PRIVATE | Self::STATIC
        } else {
            base | Self::PUBLIC
        }
    }
}

impl TypeAttributes {
    /// Flags for a declared type, modifiers included.
    pub fn for_symbol(kind: TypeKind, symbol: &TypeSymbol, nested: bool) -> Self {
        let mut attrs = Self::for_type(kind, symbol.accessibility, nested);
        if symbol.is_static {
            attrs |= Self::ABSTRACT | Self::SEALED;
        }
        if symbol.is_abstract {
            attrs |= Self::ABSTRACT;
        }
        if symbol.is_sealed {
            attrs |= Self::SEALED;
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_pascal_case_names() {
        let attrs = MethodAttributes::PUBLIC | MethodAttributes::STATIC | MethodAttributes::HIDE_BY_SIG;
        assert_eq!(attrs.to_string(), "Public | Static | HideBySig");
        assert_eq!(FieldAttributes::empty().to_string(), "0");
    }

    #[test]
    fn struct_types_are_sealed_sequential() {
        let attrs = TypeAttributes::for_type(TypeKind::Struct, Accessibility::Public, false);
        assert!(attrs.contains(TypeAttributes::SEALED | TypeAttributes::SEQUENTIAL_LAYOUT));
        assert!(attrs.contains(TypeAttributes::PUBLIC));

        let nested = TypeAttributes::for_type(TypeKind::Class, Accessibility::Private, true);
        assert!(nested.contains(TypeAttributes::NESTED_PRIVATE));
    }

    #[test]
    fn method_flags_follow_modifiers() {
        let mut getter = MethodSymbol::new(ilweave_core::SemanticType::INT32, Vec::new());
        getter.method_kind = MethodKind::PropertyGet;
        getter.is_virtual = true;
        assert_eq!(
            MethodAttributes::for_method(&getter).to_string(),
            "Public | Virtual | HideBySig | NewSlot | SpecialName"
        );

        getter.is_override = true;
        assert!(!MethodAttributes::for_method(&getter).contains(MethodAttributes::NEW_SLOT));

        let cctor = MethodAttributes::implicit_constructor(true);
        assert!(cctor.contains(MethodAttributes::STATIC | MethodAttributes::RT_SPECIAL_NAME));
    }

    #[test]
    fn constants_are_static_literals() {
        let field = FieldSymbol {
            ty: ilweave_core::SemanticType::INT32,
            is_static: false,
            is_readonly: false,
            constant: Some(ilweave_core::ConstantValue::Int(3)),
            accessibility: Accessibility::Public,
        };
        assert_eq!(
            FieldAttributes::for_field(&field).to_string(),
            "Public | Static | Literal | HasDefault"
        );
    }
}
