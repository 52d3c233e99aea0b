//! The query contract between the front-end and the lowering engine.

use rustc_hash::FxHashMap;

use crate::{NodeId, SymbolId};

use super::conversion::{self, Conversion};
use super::operation::Operation;
use super::symbols::{Symbol, SymbolKind};
use super::types::SemanticType;

/// Static type of an expression node and the type its context converts it to.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub ty: SemanticType,
    /// Type after the implicit conversion applied by the consuming context.
    pub converted: SemanticType,
}

impl TypeInfo {
    pub fn new(ty: SemanticType) -> Self {
        Self {
            converted: ty.clone(),
            ty,
        }
    }

    pub fn converted_to(ty: SemanticType, converted: SemanticType) -> Self {
        Self { ty, converted }
    }

    pub fn has_conversion(&self) -> bool {
        self.ty != self.converted
    }
}

/// Read-only semantic facts about a typed tree.
///
/// The lowering engine never re-derives any of these.
pub trait SemanticModel {
    /// Type of an expression (or type-syntax) node.
    fn type_info(&self, node: NodeId) -> Option<TypeInfo>;

    /// Symbol an expression refers to (identifier, member access, call target,
    /// constructor of an object creation).
    fn symbol_info(&self, node: NodeId) -> Option<SymbolId>;

    /// Symbol declared by a declaration node.
    fn declared_symbol(&self, node: NodeId) -> Option<SymbolId>;

    fn symbol(&self, id: SymbolId) -> Option<&Symbol>;

    fn classify_conversion(&self, from: &SemanticType, to: &SemanticType) -> Conversion;

    fn operation(&self, node: NodeId) -> Option<&Operation>;

    /// Convenience: resolve `symbol_info` straight to the symbol.
    fn referenced_symbol(&self, node: NodeId) -> Option<&Symbol> {
        self.symbol_info(node).and_then(|id| self.symbol(id))
    }

    /// Convenience: resolve `declared_symbol` straight to the symbol.
    fn declared(&self, node: NodeId) -> Option<&Symbol> {
        self.declared_symbol(node).and_then(|id| self.symbol(id))
    }
}

/// Map-backed [`SemanticModel`], filled in by a front-end or by tests.
#[derive(Debug, Default)]
pub struct SemanticTable {
    symbols: Vec<Symbol>,
    types: FxHashMap<NodeId, TypeInfo>,
    references: FxHashMap<NodeId, SymbolId>,
    declarations: FxHashMap<NodeId, SymbolId>,
    operations: FxHashMap<NodeId, Operation>,
    conversions: FxHashMap<(SemanticType, SemanticType), Conversion>,
}

impl SemanticTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol and return its id.
    pub fn add_symbol(
        &mut self,
        name: impl Into<String>,
        containing_type: Option<SemanticType>,
        from_source: bool,
        kind: SymbolKind,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            id,
            name: name.into(),
            containing_type,
            from_source,
            kind,
        });
        id
    }

    /// Mutable access for late fix-ups, e.g. linking accessors to a property.
    pub fn symbol_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(id.index())
    }

    pub fn set_type(&mut self, node: NodeId, info: TypeInfo) {
        self.types.insert(node, info);
    }

    pub fn bind(&mut self, node: NodeId, symbol: SymbolId) {
        self.references.insert(node, symbol);
    }

    pub fn declare(&mut self, node: NodeId, symbol: SymbolId) {
        self.declarations.insert(node, symbol);
    }

    pub fn set_operation(&mut self, node: NodeId, operation: Operation) {
        self.operations.insert(node, operation);
    }

    /// Override the classification for a pair of types.
    pub fn set_conversion(&mut self, from: SemanticType, to: SemanticType, conversion: Conversion) {
        self.conversions.insert((from, to), conversion);
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Find a member of `container` by name, first match in declaration order.
    pub fn member(&self, container: &SemanticType, name: &str) -> Option<&Symbol> {
        self.symbols
            .iter()
            .find(|s| s.name == name && s.containing_type.as_ref() == Some(container))
    }

    /// Type symbol declaring `ty`, if the table knows it.
    fn type_symbol(&self, ty: &SemanticType) -> Option<&Symbol> {
        self.symbols
            .iter()
            .find(|s| matches!(&s.kind, SymbolKind::Type(t) if &t.ty == ty))
    }

    /// Whether `from` is `to` or inherits from / implements it, following the
    /// base and interface lists of the type symbols in this table.
    pub fn derives_from(&self, from: &SemanticType, to: &SemanticType) -> bool {
        let mut pending = vec![from.clone()];
        let mut seen = 0usize;
        while let Some(current) = pending.pop() {
            if &current == to {
                return true;
            }
            seen += 1;
            if seen > self.symbols.len() + 1 {
                break;
            }
            if let Some(SymbolKind::Type(t)) = self.type_symbol(&current).map(|s| &s.kind) {
                pending.extend(t.base.iter().cloned());
                pending.extend(t.interfaces.iter().cloned());
            }
        }
        false
    }
}

impl SemanticModel for SemanticTable {
    fn type_info(&self, node: NodeId) -> Option<TypeInfo> {
        self.types.get(&node).cloned()
    }

    fn symbol_info(&self, node: NodeId) -> Option<SymbolId> {
        self.references.get(&node).copied()
    }

    fn declared_symbol(&self, node: NodeId) -> Option<SymbolId> {
        self.declarations.get(&node).copied()
    }

    fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    fn classify_conversion(&self, from: &SemanticType, to: &SemanticType) -> Conversion {
        if let Some(conv) = self.conversions.get(&(from.clone(), to.clone())) {
            return *conv;
        }
        if from != to && from.is_reference_type() && to.is_reference_type() && self.derives_from(from, to) {
            return Conversion::ImplicitReference;
        }
        if from.is_value_type() && to.is_reference_type() && self.derives_from(from, to) {
            return Conversion::Boxing;
        }
        conversion::classify(from, to)
    }

    fn operation(&self, node: NodeId) -> Option<&Operation> {
        self.operations.get(&node)
    }
}
