//! Programmatic front-end.
//!
//! [`AstBuilder`] allocates tree nodes in an arena and records the matching
//! semantic facts (types, bound symbols, declared symbols, operations) in a
//! [`SemanticTable`] as it goes, so a host or a test can produce a typed tree
//! without a parser or a type checker.
//!
//! ```
//! use bumpalo::Bump;
//! use ilweave_core::{SemanticModel, SemanticType};
//! use ilweave_syntax::AstBuilder;
//!
//! let arena = Bump::new();
//! let mut b = AstBuilder::new(&arena);
//! let x = b.local_symbol("x", SemanticType::INT32);
//! let zero = b.int(0);
//! let decl = b.local(x, Some(zero));
//! let model = b.finish();
//! assert!(model.symbol(x).is_some());
//! # let _ = decl;
//! ```

use bumpalo::Bump;

use ilweave_core::{
    Accessibility, ConstantValue, EventSymbol, FieldSymbol, ForEachInfo, MethodKind, MethodSymbol,
    NamedType, NodeId, Operation, ParameterInfo, PropertySymbol, RangeSliceInfo, RefKind,
    SemanticType, Span, SymbolId, SymbolKind, TypeInfo, TypeKind, TypeSymbol,
};
use ilweave_core::SemanticModel;
use ilweave_core::SemanticTable;

use crate::ast::*;

/// Accessor methods created alongside a property or event symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessorSymbols {
    pub member: SymbolId,
    /// Getter, or `add` for events.
    pub first: Option<SymbolId>,
    /// Setter, or `remove` for events.
    pub second: Option<SymbolId>,
    /// Backing field for auto-properties and field-like events.
    pub backing_field: Option<SymbolId>,
}

pub struct AstBuilder<'ast> {
    arena: &'ast Bump,
    model: SemanticTable,
    next_id: u32,
    span: Span,
}

impl<'ast> AstBuilder<'ast> {
    pub fn new(arena: &'ast Bump) -> Self {
        Self {
            arena,
            model: SemanticTable::new(),
            next_id: 1,
            span: Span::new(1, 1, 0),
        }
    }

    /// Set the span given to nodes created from now on.
    pub fn at(&mut self, line: u32, col: u32) -> &mut Self {
        self.span = Span::new(line, col, 1);
        self
    }

    pub fn model(&self) -> &SemanticTable {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut SemanticTable {
        &mut self.model
    }

    /// Hand over the semantic facts; the nodes stay alive in the arena.
    pub fn finish(self) -> SemanticTable {
        self.model
    }

    fn id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn alloc<T>(&self, value: T) -> &'ast T {
        self.arena.alloc(value)
    }

    pub fn slice<T: Copy>(&self, items: &[T]) -> &'ast [T] {
        self.arena.alloc_slice_copy(items)
    }

    fn str(&self, s: &str) -> &'ast str {
        self.arena.alloc_str(s)
    }

    fn ident_node(&self, name: &str) -> Ident<'ast> {
        Ident::new(self.str(name), self.span)
    }

    fn symbol_name(&self, sym: SymbolId) -> String {
        self.model.symbol(sym).map(|s| s.name.clone()).unwrap_or_default()
    }

    fn symbol_type(&self, sym: SymbolId) -> SemanticType {
        self.model
            .symbol(sym)
            .and_then(|s| s.ty().cloned())
            .unwrap_or(SemanticType::VOID)
    }

    fn typed(&mut self, id: NodeId, ty: SemanticType) {
        self.model.set_type(id, TypeInfo::new(ty));
    }

    /// Static type recorded for an expression.
    pub fn type_of_expr(&self, expr: &Expr<'_>) -> SemanticType {
        self.model
            .type_info(expr.id())
            .map(|t| t.ty)
            .unwrap_or(SemanticType::VOID)
    }

    // =========================================================================
    // Types and symbols
    // =========================================================================

    pub fn source_type(&self, namespace: &str, name: &str, kind: TypeKind) -> SemanticType {
        SemanticType::named(NamedType::new(namespace, name, kind).in_source())
    }

    pub fn imported_type(&self, namespace: &str, name: &str, kind: TypeKind) -> SemanticType {
        SemanticType::named(NamedType::new(namespace, name, kind))
    }

    pub fn type_symbol(&mut self, ty: SemanticType, base: Option<SemanticType>) -> SymbolId {
        let (name, containing) = match ty.as_named() {
            Some(n) => (
                n.name.clone(),
                n.declaring.as_ref().map(|d| SemanticType::named((**d).clone())),
            ),
            None => (ty.to_string(), None),
        };
        self.model.add_symbol(
            name,
            containing,
            true,
            SymbolKind::Type(TypeSymbol {
                ty,
                base,
                interfaces: Vec::new(),
                is_abstract: false,
                is_sealed: false,
                is_static: false,
                accessibility: Accessibility::Public,
            }),
        )
    }

    pub fn field_symbol(
        &mut self,
        container: &SemanticType,
        name: &str,
        ty: SemanticType,
        is_static: bool,
    ) -> SymbolId {
        let from_source = container.as_named().is_some_and(|n| n.from_source);
        self.model.add_symbol(
            name,
            Some(container.clone()),
            from_source,
            SymbolKind::Field(FieldSymbol {
                ty,
                is_static,
                is_readonly: false,
                constant: None,
                accessibility: Accessibility::Private,
            }),
        )
    }

    pub fn const_field_symbol(
        &mut self,
        container: &SemanticType,
        name: &str,
        ty: SemanticType,
        value: ConstantValue,
    ) -> SymbolId {
        let from_source = container.as_named().is_some_and(|n| n.from_source);
        self.model.add_symbol(
            name,
            Some(container.clone()),
            from_source,
            SymbolKind::Field(FieldSymbol {
                ty,
                is_static: true,
                is_readonly: false,
                constant: Some(value),
                accessibility: Accessibility::Public,
            }),
        )
    }

    /// Add a method symbol from a fully specified [`MethodSymbol`].
    pub fn method_symbol_with(
        &mut self,
        container: &SemanticType,
        name: &str,
        method: MethodSymbol,
    ) -> SymbolId {
        let from_source = container.as_named().is_some_and(|n| n.from_source);
        self.model.add_symbol(
            name,
            Some(container.clone()),
            from_source,
            SymbolKind::Method(method),
        )
    }

    pub fn method_symbol(
        &mut self,
        container: &SemanticType,
        name: &str,
        params: &[(&str, SemanticType)],
        ret: SemanticType,
        is_static: bool,
    ) -> SymbolId {
        let params = params
            .iter()
            .map(|(n, t)| ParameterInfo::new(*n, t.clone()))
            .collect();
        let mut method = MethodSymbol::new(ret, params);
        method.is_static = is_static;
        self.method_symbol_with(container, name, method)
    }

    pub fn virtual_method_symbol(
        &mut self,
        container: &SemanticType,
        name: &str,
        params: &[(&str, SemanticType)],
        ret: SemanticType,
    ) -> SymbolId {
        let params = params
            .iter()
            .map(|(n, t)| ParameterInfo::new(*n, t.clone()))
            .collect();
        let mut method = MethodSymbol::new(ret, params);
        method.is_virtual = true;
        self.method_symbol_with(container, name, method)
    }

    pub fn ctor_symbol(&mut self, container: &SemanticType, params: &[(&str, SemanticType)]) -> SymbolId {
        let params = params
            .iter()
            .map(|(n, t)| ParameterInfo::new(*n, t.clone()))
            .collect();
        let mut method = MethodSymbol::new(SemanticType::VOID, params);
        method.method_kind = MethodKind::Constructor;
        self.method_symbol_with(container, ".ctor", method)
    }

    /// A property with `get_`/`set_` accessor symbols. `auto` adds a backing
    /// field.
    pub fn property_symbol(
        &mut self,
        container: &SemanticType,
        name: &str,
        ty: SemanticType,
        is_static: bool,
        auto: bool,
    ) -> AccessorSymbols {
        let mut getter = MethodSymbol::new(ty.clone(), Vec::new());
        getter.is_static = is_static;
        getter.method_kind = MethodKind::PropertyGet;
        let getter = self.method_symbol_with(container, &format!("get_{name}"), getter);

        let mut setter = MethodSymbol::new(SemanticType::VOID, vec![ParameterInfo::new("value", ty.clone())]);
        setter.is_static = is_static;
        setter.method_kind = MethodKind::PropertySet;
        let setter = self.method_symbol_with(container, &format!("set_{name}"), setter);

        let backing_field = auto.then(|| {
            self.field_symbol(container, &format!("<{name}>k__BackingField"), ty.clone(), is_static)
        });

        let from_source = container.as_named().is_some_and(|n| n.from_source);
        let member = self.model.add_symbol(
            name,
            Some(container.clone()),
            from_source,
            SymbolKind::Property(PropertySymbol {
                ty,
                is_static,
                getter: Some(getter),
                setter: Some(setter),
                backing_field,
            }),
        );
        AccessorSymbols {
            member,
            first: Some(getter),
            second: Some(setter),
            backing_field,
        }
    }

    /// An event with `add_`/`remove_` accessor symbols and, when
    /// `field_like`, a backing field of the delegate type.
    pub fn event_symbol(
        &mut self,
        container: &SemanticType,
        name: &str,
        ty: SemanticType,
        field_like: bool,
    ) -> AccessorSymbols {
        let mut accessors = [None, None];
        for (slot, (prefix, kind)) in accessors.iter_mut().zip([
            ("add_", MethodKind::EventAdd),
            ("remove_", MethodKind::EventRemove),
        ]) {
            let mut method = MethodSymbol::new(SemanticType::VOID, vec![ParameterInfo::new("value", ty.clone())]);
            method.method_kind = kind;
            *slot = Some(self.method_symbol_with(container, &format!("{prefix}{name}"), method));
        }
        let backing_field = field_like.then(|| self.field_symbol(container, name, ty.clone(), false));
        let from_source = container.as_named().is_some_and(|n| n.from_source);
        let member = self.model.add_symbol(
            name,
            Some(container.clone()),
            from_source,
            SymbolKind::Event(EventSymbol {
                ty,
                is_static: false,
                add: accessors[0],
                remove: accessors[1],
                backing_field,
            }),
        );
        AccessorSymbols {
            member,
            first: accessors[0],
            second: accessors[1],
            backing_field,
        }
    }

    pub fn local_symbol(&mut self, name: &str, ty: SemanticType) -> SymbolId {
        self.model
            .add_symbol(name, None, true, SymbolKind::Local { ty, constant: None })
    }

    /// Parameter symbols for every parameter of `method`, in order.
    pub fn param_symbols(&mut self, method: SymbolId) -> Vec<SymbolId> {
        let params = self
            .model
            .symbol(method)
            .and_then(|s| s.as_method())
            .map(|m| m.params.clone())
            .unwrap_or_default();
        params
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                self.model.add_symbol(
                    p.name,
                    None,
                    true,
                    SymbolKind::Parameter {
                        ty: p.ty,
                        ordinal: i as u16,
                        ref_kind: p.ref_kind,
                    },
                )
            })
            .collect()
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn literal(&mut self, kind: LiteralKind<'ast>, ty: SemanticType) -> &'ast Expr<'ast> {
        let id = self.id();
        self.typed(id, ty);
        self.alloc(Expr::Literal(LiteralExpr {
            id,
            kind,
            span: self.span,
        }))
    }

    pub fn int(&mut self, value: i32) -> &'ast Expr<'ast> {
        self.literal(LiteralKind::Int(value as i64), SemanticType::INT32)
    }

    pub fn long(&mut self, value: i64) -> &'ast Expr<'ast> {
        self.literal(LiteralKind::Int(value), SemanticType::INT64)
    }

    pub fn double(&mut self, value: f64) -> &'ast Expr<'ast> {
        self.literal(LiteralKind::Double(value), SemanticType::FLOAT64)
    }

    pub fn float(&mut self, value: f32) -> &'ast Expr<'ast> {
        self.literal(
            LiteralKind::Float(value),
            SemanticType::Primitive(ilweave_core::PrimitiveKind::Float32),
        )
    }

    pub fn bool(&mut self, value: bool) -> &'ast Expr<'ast> {
        self.literal(LiteralKind::Bool(value), SemanticType::BOOL)
    }

    pub fn char(&mut self, value: char) -> &'ast Expr<'ast> {
        self.literal(
            LiteralKind::Char(value),
            SemanticType::Primitive(ilweave_core::PrimitiveKind::Char),
        )
    }

    pub fn string(&mut self, value: &str) -> &'ast Expr<'ast> {
        let s = self.str(value);
        self.literal(LiteralKind::String(s), SemanticType::STRING)
    }

    /// `null` converted to `ty`.
    pub fn null(&mut self, ty: SemanticType) -> &'ast Expr<'ast> {
        let e = self.literal(LiteralKind::Null, SemanticType::Null);
        self.convert(e, ty)
    }

    /// Record that the consuming context converts `expr` to `to`.
    pub fn convert(&mut self, expr: &'ast Expr<'ast>, to: SemanticType) -> &'ast Expr<'ast> {
        let ty = self.type_of_expr(expr);
        self.model.set_type(expr.id(), TypeInfo::converted_to(ty, to));
        expr
    }

    /// A simple name bound to `sym`.
    pub fn ident(&mut self, sym: SymbolId) -> &'ast Expr<'ast> {
        let id = self.id();
        let name = self.str(&self.symbol_name(sym));
        let ty = self.symbol_type(sym);
        self.typed(id, ty);
        self.model.bind(id, sym);
        self.alloc(Expr::Ident(IdentExpr {
            id,
            name,
            span: self.span,
        }))
    }

    /// A type name used as the receiver of a static member access.
    pub fn type_ref(&mut self, ty: SemanticType) -> &'ast Expr<'ast> {
        let id = self.id();
        let name = self.str(&ty.to_string());
        self.typed(id, ty);
        self.alloc(Expr::Ident(IdentExpr {
            id,
            name,
            span: self.span,
        }))
    }

    pub fn this(&mut self, ty: SemanticType) -> &'ast Expr<'ast> {
        let id = self.id();
        self.typed(id, ty);
        self.alloc(Expr::This(ThisExpr { id, span: self.span }))
    }

    pub fn binary(
        &mut self,
        op: BinaryOp,
        left: &'ast Expr<'ast>,
        right: &'ast Expr<'ast>,
        ty: SemanticType,
    ) -> &'ast Expr<'ast> {
        let id = self.id();
        self.typed(id, ty);
        self.alloc(Expr::Binary(self.alloc(BinaryExpr {
            id,
            left,
            op,
            right,
            span: self.span,
        })))
    }

    /// A binary operator bound to a user-defined operator method.
    pub fn user_binary(
        &mut self,
        op: BinaryOp,
        left: &'ast Expr<'ast>,
        right: &'ast Expr<'ast>,
        method: SymbolId,
    ) -> &'ast Expr<'ast> {
        let ty = self.symbol_type(method);
        let e = self.binary(op, left, right, ty);
        self.model
            .set_operation(e.id(), Operation::UserDefinedOperator { method });
        e
    }

    pub fn unary(&mut self, op: UnaryOp, operand: &'ast Expr<'ast>, ty: SemanticType) -> &'ast Expr<'ast> {
        let id = self.id();
        self.typed(id, ty);
        self.alloc(Expr::Unary(self.alloc(UnaryExpr {
            id,
            op,
            operand,
            span: self.span,
        })))
    }

    pub fn postfix(&mut self, op: PostfixOp, operand: &'ast Expr<'ast>) -> &'ast Expr<'ast> {
        let id = self.id();
        let ty = self.type_of_expr(operand);
        self.typed(id, ty);
        self.alloc(Expr::Postfix(self.alloc(PostfixExpr {
            id,
            operand,
            op,
            span: self.span,
        })))
    }

    pub fn assign_op(
        &mut self,
        op: AssignOp,
        target: &'ast Expr<'ast>,
        value: &'ast Expr<'ast>,
    ) -> &'ast Expr<'ast> {
        let id = self.id();
        let ty = self.type_of_expr(target);
        self.typed(id, ty);
        self.alloc(Expr::Assign(self.alloc(AssignExpr {
            id,
            target,
            op,
            value,
            span: self.span,
        })))
    }

    pub fn assign(&mut self, target: &'ast Expr<'ast>, value: &'ast Expr<'ast>) -> &'ast Expr<'ast> {
        self.assign_op(AssignOp::Assign, target, value)
    }

    pub fn conditional(
        &mut self,
        condition: &'ast Expr<'ast>,
        then_expr: &'ast Expr<'ast>,
        else_expr: &'ast Expr<'ast>,
        ty: SemanticType,
    ) -> &'ast Expr<'ast> {
        let id = self.id();
        self.typed(id, ty);
        self.alloc(Expr::Conditional(self.alloc(ConditionalExpr {
            id,
            condition,
            then_expr,
            else_expr,
            span: self.span,
        })))
    }

    /// `object.member`, typed from the member symbol.
    pub fn member(&mut self, object: &'ast Expr<'ast>, sym: SymbolId) -> &'ast Expr<'ast> {
        let id = self.id();
        let name = self.ident_node(&self.symbol_name(sym));
        let ty = self.symbol_type(sym);
        self.typed(id, ty);
        self.model.bind(id, sym);
        self.alloc(Expr::Member(self.alloc(MemberExpr {
            id,
            object,
            name,
            span: self.span,
        })))
    }

    fn args(&self, args: &[&'ast Expr<'ast>]) -> &'ast [Argument<'ast>] {
        let args: Vec<Argument<'ast>> = args
            .iter()
            .map(|value| Argument {
                value: *value,
                ref_kind: RefKind::None,
            })
            .collect();
        self.slice(&args)
    }

    /// A call to `method`: through `receiver.method(...)` when a receiver is
    /// given, through a simple name otherwise.
    pub fn call(
        &mut self,
        method: SymbolId,
        receiver: Option<&'ast Expr<'ast>>,
        args: &[&'ast Expr<'ast>],
    ) -> &'ast Expr<'ast> {
        let args: Vec<Argument<'ast>> = self.args(args).to_vec();
        self.call_with(method, receiver, &args)
    }

    /// An argument passed with `ref`, `out` or `in`.
    pub fn ref_arg(&self, value: &'ast Expr<'ast>, ref_kind: RefKind) -> Argument<'ast> {
        Argument { value, ref_kind }
    }

    /// A call whose arguments carry their own passing modes.
    pub fn call_with(
        &mut self,
        method: SymbolId,
        receiver: Option<&'ast Expr<'ast>>,
        args: &[Argument<'ast>],
    ) -> &'ast Expr<'ast> {
        let callee = match receiver {
            Some(r) => self.member(r, method),
            None => self.ident(method),
        };
        let id = self.id();
        let ty = self.symbol_type(method);
        self.typed(id, ty);
        self.model.bind(id, method);
        let args = self.slice(args);
        self.alloc(Expr::Call(self.alloc(CallExpr {
            id,
            callee,
            args,
            span: self.span,
        })))
    }

    /// Invoke a delegate value through its `Invoke` method.
    pub fn invoke(
        &mut self,
        delegate: &'ast Expr<'ast>,
        invoke_method: SymbolId,
        args: &[&'ast Expr<'ast>],
    ) -> &'ast Expr<'ast> {
        let id = self.id();
        let ty = self.symbol_type(invoke_method);
        self.typed(id, ty);
        self.model.bind(id, invoke_method);
        let args = self.args(args);
        self.alloc(Expr::Call(self.alloc(CallExpr {
            id,
            callee: delegate,
            args,
            span: self.span,
        })))
    }

    /// A method group converted to a delegate or function-pointer type.
    pub fn method_ref(
        &mut self,
        method: SymbolId,
        receiver: Option<&'ast Expr<'ast>>,
        target: SemanticType,
    ) -> &'ast Expr<'ast> {
        let e = match receiver {
            Some(r) => self.member(r, method),
            None => self.ident(method),
        };
        self.model
            .set_type(e.id(), TypeInfo::new(target));
        e
    }

    /// `object[index]` on an array, pointer or span with element type `ty`.
    pub fn index(
        &mut self,
        object: &'ast Expr<'ast>,
        index: &'ast Expr<'ast>,
        ty: SemanticType,
    ) -> &'ast Expr<'ast> {
        let id = self.id();
        self.typed(id, ty);
        self.alloc(Expr::Index(self.alloc(IndexExpr {
            id,
            object,
            index,
            span: self.span,
        })))
    }

    /// `object[index]` bound to an indexer property.
    pub fn indexer(
        &mut self,
        object: &'ast Expr<'ast>,
        index: &'ast Expr<'ast>,
        property: SymbolId,
    ) -> &'ast Expr<'ast> {
        let ty = self.symbol_type(property);
        let e = self.index(object, index, ty);
        self.model.bind(e.id(), property);
        e
    }

    pub fn range(
        &mut self,
        start: Option<&'ast Expr<'ast>>,
        start_from_end: bool,
        end: Option<&'ast Expr<'ast>>,
        end_from_end: bool,
    ) -> &'ast Expr<'ast> {
        let id = self.id();
        let range = SemanticType::named(NamedType::new("System", "Range", TypeKind::Struct));
        self.typed(id, range);
        self.alloc(Expr::Range(self.alloc(RangeExpr {
            id,
            start,
            start_from_end,
            end,
            end_from_end,
            span: self.span,
        })))
    }

    /// `object[range]` bound to a slice operation.
    pub fn slice_range(
        &mut self,
        object: &'ast Expr<'ast>,
        range: &'ast Expr<'ast>,
        info: RangeSliceInfo,
        ty: SemanticType,
    ) -> &'ast Expr<'ast> {
        let e = self.index(object, range, ty);
        self.model.set_operation(e.id(), Operation::RangeSlice(info));
        e
    }

    fn type_syntax(&mut self, ty: SemanticType) -> TypeSyntax<'ast> {
        let id = self.id();
        let name = self.str(&ty.to_string());
        self.typed(id, ty);
        TypeSyntax {
            id,
            name,
            span: self.span,
        }
    }

    /// `new T(args) { member = value, ... }`. `ctor` is `None` for the
    /// parameterless construction of a value type.
    pub fn new_object(
        &mut self,
        ty: SemanticType,
        ctor: Option<SymbolId>,
        args: &[&'ast Expr<'ast>],
        initializers: &[(SymbolId, &'ast Expr<'ast>)],
    ) -> &'ast Expr<'ast> {
        let syntax = self.type_syntax(ty.clone());
        let mut inits = Vec::with_capacity(initializers.len());
        for &(member, value) in initializers {
            let init_id = self.id();
            self.model.bind(init_id, member);
            let name = self.ident_node(&self.symbol_name(member));
            inits.push(MemberInit {
                id: init_id,
                name,
                value,
                span: self.span,
            });
        }
        let id = self.id();
        self.typed(id, ty);
        if let Some(ctor) = ctor {
            self.model.bind(id, ctor);
        }
        let args = self.args(args);
        let initializers = self.slice(&inits);
        self.alloc(Expr::ObjectCreation(self.alloc(ObjectCreationExpr {
            id,
            ty: syntax,
            args,
            initializers,
            span: self.span,
        })))
    }

    pub fn new_array(
        &mut self,
        element: SemanticType,
        size: Option<&'ast Expr<'ast>>,
        initializer: Option<&[&'ast Expr<'ast>]>,
    ) -> &'ast Expr<'ast> {
        let syntax = self.type_syntax(element.clone());
        let id = self.id();
        self.typed(id, SemanticType::array_of(element));
        let initializer = initializer.map(|items| self.slice(items));
        self.alloc(Expr::ArrayCreation(self.alloc(ArrayCreationExpr {
            id,
            element: syntax,
            size,
            initializer,
            span: self.span,
        })))
    }

    /// `stackalloc T[size]`, typed as a pointer to `T`.
    pub fn stackalloc(&mut self, element: SemanticType, size: &'ast Expr<'ast>) -> &'ast Expr<'ast> {
        let syntax = self.type_syntax(element.clone());
        let id = self.id();
        self.typed(id, SemanticType::pointer_to(element));
        self.alloc(Expr::StackAlloc(self.alloc(StackAllocExpr {
            id,
            element: syntax,
            size,
            span: self.span,
        })))
    }

    /// `(T)operand`; records the conversion on the operand.
    pub fn cast(&mut self, ty: SemanticType, operand: &'ast Expr<'ast>) -> &'ast Expr<'ast> {
        let syntax = self.type_syntax(ty.clone());
        let operand = self.convert(operand, ty.clone());
        let id = self.id();
        self.typed(id, ty);
        self.alloc(Expr::Cast(self.alloc(CastExpr {
            id,
            ty: syntax,
            operand,
            span: self.span,
        })))
    }

    pub fn is_type(&mut self, operand: &'ast Expr<'ast>, ty: SemanticType) -> &'ast Expr<'ast> {
        let syntax = self.type_syntax(ty);
        let id = self.id();
        self.typed(id, SemanticType::BOOL);
        self.alloc(Expr::Is(self.alloc(TypeTestExpr {
            id,
            operand,
            ty: syntax,
            span: self.span,
        })))
    }

    pub fn as_type(&mut self, operand: &'ast Expr<'ast>, ty: SemanticType) -> &'ast Expr<'ast> {
        let syntax = self.type_syntax(ty.clone());
        let id = self.id();
        self.typed(id, ty);
        self.alloc(Expr::As(self.alloc(TypeTestExpr {
            id,
            operand,
            ty: syntax,
            span: self.span,
        })))
    }

    pub fn type_of(&mut self, ty: SemanticType) -> &'ast Expr<'ast> {
        let syntax = self.type_syntax(ty);
        let id = self.id();
        self.typed(
            id,
            SemanticType::named(NamedType::new("System", "Type", TypeKind::Class)),
        );
        self.alloc(Expr::TypeOf(TypeOfExpr {
            id,
            ty: syntax,
            span: self.span,
        }))
    }

    pub fn default_of(&mut self, ty: SemanticType) -> &'ast Expr<'ast> {
        let id = self.id();
        self.typed(id, ty);
        self.alloc(Expr::Default(DefaultExpr { id, span: self.span }))
    }

    pub fn paren(&mut self, expr: &'ast Expr<'ast>) -> &'ast Expr<'ast> {
        let id = self.id();
        let ty = self.type_of_expr(expr);
        self.typed(id, ty);
        self.alloc(Expr::Paren(self.alloc(ParenExpr {
            id,
            expr,
            span: self.span,
        })))
    }

    pub fn lambda(&mut self, body: &'ast Expr<'ast>, ty: SemanticType) -> &'ast Expr<'ast> {
        let id = self.id();
        self.typed(id, ty);
        self.alloc(Expr::Lambda(self.alloc(LambdaExpr {
            id,
            params: &[],
            body,
            span: self.span,
        })))
    }

    pub fn await_(&mut self, operand: &'ast Expr<'ast>, ty: SemanticType) -> &'ast Expr<'ast> {
        let id = self.id();
        self.typed(id, ty);
        self.alloc(Expr::Await(self.alloc(AwaitExpr {
            id,
            operand,
            span: self.span,
        })))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub fn expr_stmt(&mut self, expr: &'ast Expr<'ast>) -> Stmt<'ast> {
        Stmt::Expr(ExprStmt {
            expr: Some(expr),
            span: self.span,
        })
    }

    pub fn empty_stmt(&mut self) -> Stmt<'ast> {
        Stmt::Expr(ExprStmt {
            expr: None,
            span: self.span,
        })
    }

    pub fn declarator(&mut self, sym: SymbolId, init: Option<&'ast Expr<'ast>>) -> VarDeclarator<'ast> {
        let id = self.id();
        self.model.declare(id, sym);
        VarDeclarator {
            id,
            name: self.ident_node(&self.symbol_name(sym)),
            init,
            span: self.span,
        }
    }

    pub fn local_decl(&mut self, declarators: &[VarDeclarator<'ast>]) -> &'ast LocalDeclStmt<'ast> {
        let declarators = self.slice(declarators);
        self.alloc(LocalDeclStmt {
            declarators,
            span: self.span,
        })
    }

    /// Declare a single local.
    pub fn local(&mut self, sym: SymbolId, init: Option<&'ast Expr<'ast>>) -> Stmt<'ast> {
        let d = self.declarator(sym, init);
        Stmt::LocalDecl(self.local_decl(&[d]))
    }

    pub fn ret(&mut self, value: Option<&'ast Expr<'ast>>) -> Stmt<'ast> {
        Stmt::Return(ReturnStmt {
            value,
            span: self.span,
        })
    }

    pub fn brk(&mut self) -> Stmt<'ast> {
        Stmt::Break(BreakStmt { span: self.span })
    }

    pub fn cont(&mut self) -> Stmt<'ast> {
        Stmt::Continue(ContinueStmt { span: self.span })
    }

    pub fn block_of(&mut self, stmts: &[Stmt<'ast>]) -> Block<'ast> {
        Block {
            stmts: self.slice(stmts),
            span: self.span,
        }
    }

    pub fn block(&mut self, stmts: &[Stmt<'ast>]) -> Stmt<'ast> {
        Stmt::Block(self.block_of(stmts))
    }

    fn stmt_ref(&self, stmt: Stmt<'ast>) -> &'ast Stmt<'ast> {
        self.alloc(stmt)
    }

    pub fn if_(
        &mut self,
        condition: &'ast Expr<'ast>,
        then_stmt: Stmt<'ast>,
        else_stmt: Option<Stmt<'ast>>,
    ) -> Stmt<'ast> {
        let then_stmt = self.stmt_ref(then_stmt);
        let else_stmt = else_stmt.map(|s| self.stmt_ref(s));
        Stmt::If(self.alloc(IfStmt {
            condition,
            then_stmt,
            else_stmt,
            span: self.span,
        }))
    }

    pub fn while_(&mut self, condition: &'ast Expr<'ast>, body: Stmt<'ast>) -> Stmt<'ast> {
        let body = self.stmt_ref(body);
        Stmt::While(self.alloc(WhileStmt {
            condition,
            body,
            span: self.span,
        }))
    }

    pub fn do_while(&mut self, body: Stmt<'ast>, condition: &'ast Expr<'ast>) -> Stmt<'ast> {
        let body = self.stmt_ref(body);
        Stmt::DoWhile(self.alloc(DoWhileStmt {
            body,
            condition,
            span: self.span,
        }))
    }

    pub fn for_(
        &mut self,
        init: Option<ForInit<'ast>>,
        condition: Option<&'ast Expr<'ast>>,
        update: &[&'ast Expr<'ast>],
        body: Stmt<'ast>,
    ) -> Stmt<'ast> {
        let update = self.slice(update);
        let body = self.stmt_ref(body);
        Stmt::For(self.alloc(ForStmt {
            init,
            condition,
            update,
            body,
            span: self.span,
        }))
    }

    /// `for (T sym = init; condition; update) body`
    pub fn for_local(
        &mut self,
        sym: SymbolId,
        init: &'ast Expr<'ast>,
        condition: Option<&'ast Expr<'ast>>,
        update: &[&'ast Expr<'ast>],
        body: Stmt<'ast>,
    ) -> Stmt<'ast> {
        let d = self.declarator(sym, Some(init));
        let decl = self.local_decl(&[d]);
        self.for_(Some(ForInit::LocalDecl(decl)), condition, update, body)
    }

    /// `foreach (var sym in collection) body`. `protocol` is required for
    /// non-array collections.
    pub fn foreach(
        &mut self,
        sym: SymbolId,
        collection: &'ast Expr<'ast>,
        body: Stmt<'ast>,
        protocol: Option<ForEachInfo>,
    ) -> Stmt<'ast> {
        let id = self.id();
        self.model.declare(id, sym);
        if let Some(info) = protocol {
            self.model.set_operation(id, Operation::ForEach(info));
        }
        let var = self.ident_node(&self.symbol_name(sym));
        let body = self.stmt_ref(body);
        Stmt::Foreach(self.alloc(ForeachStmt {
            id,
            var,
            collection,
            body,
            span: self.span,
        }))
    }

    pub fn case(&mut self, value: &'ast Expr<'ast>) -> CaseLabel<'ast> {
        CaseLabel::Case(value)
    }

    pub fn default_label(&mut self) -> CaseLabel<'ast> {
        CaseLabel::Default(self.span)
    }

    pub fn section(&mut self, labels: &[CaseLabel<'ast>], stmts: &[Stmt<'ast>]) -> SwitchSection<'ast> {
        SwitchSection {
            labels: self.slice(labels),
            stmts: self.slice(stmts),
            span: self.span,
        }
    }

    pub fn switch(&mut self, selector: &'ast Expr<'ast>, sections: &[SwitchSection<'ast>]) -> Stmt<'ast> {
        let sections = self.slice(sections);
        Stmt::Switch(self.alloc(SwitchStmt {
            selector,
            sections,
            span: self.span,
        }))
    }

    /// `catch (ty var) { body }`; both `ty` and `var` optional.
    pub fn catch(
        &mut self,
        ty: Option<SemanticType>,
        var: Option<SymbolId>,
        body: Block<'ast>,
    ) -> CatchClause<'ast> {
        let ty = ty.map(|t| self.type_syntax(t));
        let id = self.id();
        let var = var.map(|sym| {
            self.model.declare(id, sym);
            self.ident_node(&self.symbol_name(sym))
        });
        CatchClause {
            id,
            ty,
            var,
            filter: None,
            body,
            span: self.span,
        }
    }

    pub fn try_(
        &mut self,
        body: Block<'ast>,
        catches: &[CatchClause<'ast>],
        finally: Option<Block<'ast>>,
    ) -> Stmt<'ast> {
        let catches = self.slice(catches);
        Stmt::Try(self.alloc(TryStmt {
            body,
            catches,
            finally,
            span: self.span,
        }))
    }

    pub fn throw(&mut self, value: Option<&'ast Expr<'ast>>) -> Stmt<'ast> {
        Stmt::Throw(ThrowStmt {
            value,
            span: self.span,
        })
    }

    pub fn lock(&mut self, target: &'ast Expr<'ast>, body: Stmt<'ast>) -> Stmt<'ast> {
        let body = self.stmt_ref(body);
        Stmt::Lock(self.alloc(LockStmt {
            target,
            body,
            span: self.span,
        }))
    }

    pub fn yield_(&mut self, value: Option<&'ast Expr<'ast>>) -> Stmt<'ast> {
        Stmt::Yield(YieldStmt {
            value,
            span: self.span,
        })
    }

    pub fn goto(&mut self, label: &str) -> Stmt<'ast> {
        Stmt::Goto(GotoStmt {
            label: self.ident_node(label),
            span: self.span,
        })
    }

    pub fn local_function(&mut self, name: &str) -> Stmt<'ast> {
        Stmt::LocalFunction(LocalFunctionStmt {
            name: self.ident_node(name),
            span: self.span,
        })
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    pub fn field_decl(&mut self, sym: SymbolId, init: Option<&'ast Expr<'ast>>) -> Member<'ast> {
        let d = self.declarator(sym, init);
        let declarators = self.slice(&[d]);
        Member::Field(self.alloc(FieldDecl {
            declarators,
            span: self.span,
        }))
    }

    fn params(&mut self, params: &[SymbolId]) -> &'ast [Param<'ast>] {
        let nodes: Vec<Param<'ast>> = params
            .iter()
            .map(|sym| {
                let id = self.id();
                self.model.declare(id, *sym);
                Param {
                    id,
                    name: self.ident_node(&self.symbol_name(*sym)),
                    span: self.span,
                }
            })
            .collect();
        self.slice(&nodes)
    }

    fn method_node(
        &mut self,
        sym: SymbolId,
        params: &[SymbolId],
        body: Option<Block<'ast>>,
    ) -> &'ast MethodDecl<'ast> {
        let params = self.params(params);
        let id = self.id();
        self.model.declare(id, sym);
        let name = self.ident_node(&self.symbol_name(sym));
        self.alloc(MethodDecl {
            id,
            name,
            params,
            body,
            span: self.span,
        })
    }

    /// A method declaration; `params` come from [`param_symbols`](Self::param_symbols).
    pub fn method_decl(&mut self, sym: SymbolId, params: &[SymbolId], body: Option<Block<'ast>>) -> Member<'ast> {
        Member::Method(self.method_node(sym, params, body))
    }

    pub fn operator_decl(&mut self, sym: SymbolId, params: &[SymbolId], body: Block<'ast>) -> Member<'ast> {
        Member::Operator(self.method_node(sym, params, Some(body)))
    }

    pub fn ctor_decl(
        &mut self,
        sym: SymbolId,
        params: &[SymbolId],
        initializer: Option<(CtorInitializerKind, SymbolId, &[&'ast Expr<'ast>])>,
        body: Block<'ast>,
    ) -> Member<'ast> {
        let params = self.params(params);
        let initializer = initializer.map(|(kind, target, args)| {
            let init_id = self.id();
            self.model.bind(init_id, target);
            CtorInitializer {
                id: init_id,
                kind,
                args: self.args(args),
                span: self.span,
            }
        });
        let id = self.id();
        self.model.declare(id, sym);
        Member::Constructor(self.alloc(ConstructorDecl {
            id,
            params,
            initializer,
            body: Some(body),
            span: self.span,
        }))
    }

    fn accessor(&mut self, sym: Option<SymbolId>, body: Option<Block<'ast>>) -> Option<Accessor<'ast>> {
        sym.map(|sym| {
            let id = self.id();
            self.model.declare(id, sym);
            Accessor {
                id,
                body,
                span: self.span,
            }
        })
    }

    /// `T Name { get; set; } = init;`
    pub fn auto_property(&mut self, prop: AccessorSymbols, init: Option<&'ast Expr<'ast>>) -> Member<'ast> {
        let getter = self.accessor(prop.first, None);
        let setter = self.accessor(prop.second, None);
        let id = self.id();
        self.model.declare(id, prop.member);
        let name = self.ident_node(&self.symbol_name(prop.member));
        Member::Property(self.alloc(PropertyDecl {
            id,
            name,
            getter,
            setter,
            initializer: init,
            span: self.span,
        }))
    }

    /// A property with explicit accessor bodies; a `None` body omits the
    /// accessor.
    pub fn property(
        &mut self,
        prop: AccessorSymbols,
        getter: Option<Block<'ast>>,
        setter: Option<Block<'ast>>,
    ) -> Member<'ast> {
        let getter = match getter {
            Some(body) => self.accessor(prop.first, Some(body)),
            None => None,
        };
        let setter = match setter {
            Some(body) => self.accessor(prop.second, Some(body)),
            None => None,
        };
        let id = self.id();
        self.model.declare(id, prop.member);
        let name = self.ident_node(&self.symbol_name(prop.member));
        Member::Property(self.alloc(PropertyDecl {
            id,
            name,
            getter,
            setter,
            initializer: None,
            span: self.span,
        }))
    }

    /// `event T Name;`
    pub fn field_event(&mut self, event: AccessorSymbols) -> Member<'ast> {
        let id = self.id();
        self.model.declare(id, event.member);
        let name = self.ident_node(&self.symbol_name(event.member));
        Member::Event(self.alloc(EventDecl {
            id,
            name,
            add: None,
            remove: None,
            span: self.span,
        }))
    }

    pub fn event_with_accessors(
        &mut self,
        event: AccessorSymbols,
        add: Block<'ast>,
        remove: Block<'ast>,
    ) -> Member<'ast> {
        let add = self.accessor(event.first, Some(add));
        let remove = self.accessor(event.second, Some(remove));
        let id = self.id();
        self.model.declare(id, event.member);
        let name = self.ident_node(&self.symbol_name(event.member));
        Member::Event(self.alloc(EventDecl {
            id,
            name,
            add,
            remove,
            span: self.span,
        }))
    }

    pub fn enum_member(&mut self, sym: SymbolId) -> Member<'ast> {
        let id = self.id();
        self.model.declare(id, sym);
        Member::EnumMember(EnumMemberDecl {
            id,
            name: self.ident_node(&self.symbol_name(sym)),
            span: self.span,
        })
    }

    fn unsupported_member(&mut self, name: &str) -> UnsupportedMemberDecl<'ast> {
        UnsupportedMemberDecl {
            id: self.id(),
            name: self.ident_node(name),
            span: self.span,
        }
    }

    pub fn destructor(&mut self, name: &str) -> Member<'ast> {
        Member::Destructor(self.unsupported_member(name))
    }

    pub fn indexer_decl(&mut self) -> Member<'ast> {
        Member::Indexer(self.unsupported_member("this[]"))
    }

    pub fn type_decl(&mut self, sym: SymbolId, kind: TypeDeclKind, members: &[Member<'ast>]) -> &'ast TypeDecl<'ast> {
        let id = self.id();
        self.model.declare(id, sym);
        let name = self.ident_node(&self.symbol_name(sym));
        let members = self.slice(members);
        self.alloc(TypeDecl {
            id,
            kind,
            name,
            members,
            span: self.span,
        })
    }

    pub fn nested(&mut self, decl: &'ast TypeDecl<'ast>) -> Member<'ast> {
        Member::NestedType(decl)
    }

    pub fn unit(&mut self, types: &[&'ast TypeDecl<'ast>]) -> CompilationUnit<'ast> {
        CompilationUnit {
            types: self.slice(types),
            span: self.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique_and_facts_recorded() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let x = b.local_symbol("x", SemanticType::INT32);
        let lhs = b.ident(x);
        let rhs = b.int(1);
        let sum = b.binary(BinaryOp::Add, lhs, rhs, SemanticType::INT32);
        assert_ne!(lhs.id(), rhs.id());
        assert_ne!(sum.id(), lhs.id());
        let model = b.finish();
        assert_eq!(model.symbol_info(lhs.id()), Some(x));
        assert_eq!(model.type_info(sum.id()).map(|t| t.ty), Some(SemanticType::INT32));
    }

    #[test]
    fn convert_keeps_static_type() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let one = b.int(1);
        let one = b.convert(one, SemanticType::INT64);
        let info = b.model().type_info(one.id()).unwrap();
        assert_eq!(info.ty, SemanticType::INT32);
        assert_eq!(info.converted, SemanticType::INT64);
    }

    #[test]
    fn call_binds_callee_and_call() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let calc = b.source_type("Demo", "Calc", TypeKind::Class);
        let m = b.method_symbol(&calc, "Twice", &[("v", SemanticType::INT32)], SemanticType::INT32, true);
        let arg = b.int(4);
        let call = b.call(m, None, &[arg]);
        let Expr::Call(c) = call else {
            panic!("expected call");
        };
        assert_eq!(b.model().symbol_info(c.id), Some(m));
        assert_eq!(b.model().symbol_info(c.callee.id()), Some(m));
        assert_eq!(c.args.len(), 1);
    }

    #[test]
    fn auto_property_creates_accessors_and_backing_field() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let point = b.source_type("Demo", "Point", TypeKind::Class);
        let prop = b.property_symbol(&point, "X", SemanticType::INT32, false, true);
        assert!(prop.first.is_some() && prop.second.is_some());
        assert!(prop.backing_field.is_some());
        let Member::Property(decl) = b.auto_property(prop, None) else {
            panic!("expected property");
        };
        assert!(decl.is_auto());
    }

    #[test]
    fn param_symbols_follow_method_signature() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let calc = b.source_type("Demo", "Calc", TypeKind::Class);
        let m = b.method_symbol(
            &calc,
            "Add",
            &[("a", SemanticType::INT32), ("b", SemanticType::INT32)],
            SemanticType::INT32,
            false,
        );
        let params = b.param_symbols(m);
        assert_eq!(params.len(), 2);
        let second = b.model().symbol(params[1]).unwrap();
        assert_eq!(second.name, "b");
        assert!(matches!(second.kind, SymbolKind::Parameter { ordinal: 1, .. }));
    }
}
