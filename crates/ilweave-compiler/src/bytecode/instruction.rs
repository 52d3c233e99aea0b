//! Instructions and their operands.

use std::fmt;

use ilweave_core::Span;
use ordered_float::OrderedFloat;

use super::opcode::{OpCode, StackCount};
use crate::type_resolver::TypeExpr;

/// Stable identity of an instruction inside one method's instruction list.
///
/// Ids index the arena, not the final order, so they survive insertion and
/// relocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct InstrId(pub(crate) u32);

impl InstrId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// A branch target: the identity of a label placeholder instruction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Label(pub(crate) InstrId);

impl Label {
    pub fn instr(self) -> InstrId {
        self.0
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0.0)
    }
}

/// A member reachable from emitted code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRef {
    /// A member generated in this unit, by handle.
    Defined(String),
    /// A member of an imported type.
    Imported {
        declaring: TypeExpr,
        name: String,
        params: Vec<TypeExpr>,
        ret: Option<TypeExpr>,
    },
}

impl MemberRef {
    pub fn imported(declaring: TypeExpr, name: impl Into<String>) -> Self {
        MemberRef::Imported {
            declaring,
            name: name.into(),
            params: Vec::new(),
            ret: None,
        }
    }

    /// Simple name for defined members (the handle) and imported ones.
    pub fn name(&self) -> &str {
        match self {
            MemberRef::Defined(handle) => handle,
            MemberRef::Imported { name, .. } => name,
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberRef::Defined(handle) => f.write_str(handle),
            MemberRef::Imported { declaring, name, .. } => {
                write!(f, "Import({declaring}, \"{name}\")")
            }
        }
    }
}

/// Operand of `call`, `callvirt`, `newobj`, `ldftn` and `ldvirtftn`.
///
/// Carries the arity so that stack effects can be computed without
/// consulting the semantic model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub target: MemberRef,
    pub has_this: bool,
    pub param_count: u16,
    pub returns_value: bool,
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub target: MemberRef,
    pub is_static: bool,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Operand {
    #[default]
    None,
    Int32(i32),
    Int64(i64),
    Float32(OrderedFloat<f32>),
    Float64(OrderedFloat<f64>),
    String(String),
    Type(TypeExpr),
    Field(FieldRef),
    Method(MethodRef),
    Local(u16),
    Arg(u16),
    Label(Label),
}

impl Operand {
    pub fn as_label(&self) -> Option<Label> {
        match self {
            Operand::Label(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodRef> {
        match self {
            Operand::Method(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Int32(v) => write!(f, "{v}"),
            Operand::Int64(v) => write!(f, "{v}"),
            Operand::Float32(v) => write!(f, "{}", v.0),
            Operand::Float64(v) => write!(f, "{}", v.0),
            Operand::String(s) => write!(f, "{s:?}"),
            Operand::Type(t) => write!(f, "{t}"),
            Operand::Field(r) => write!(f, "{r}"),
            Operand::Method(r) => write!(f, "{r}"),
            Operand::Local(i) => write!(f, "V_{i}"),
            Operand::Arg(i) => write!(f, "A_{i}"),
            Operand::Label(l) => write!(f, "{l:?}"),
        }
    }
}

/// Non-executable annotation attached to a `nop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// Placeholder that a [`Label`] points at.
    Label,
    /// Inline comment, e.g. a recorded gap.
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: Operand,
    /// Source location, when debug spans are recorded.
    pub span: Option<Span>,
    pub marker: Option<Marker>,
}

impl Instruction {
    pub fn new(opcode: OpCode) -> Self {
        Self::with(opcode, Operand::None)
    }

    pub fn with(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand,
            span: None,
            marker: None,
        }
    }

    pub(crate) fn label_placeholder() -> Self {
        Self {
            marker: Some(Marker::Label),
            ..Self::new(OpCode::Nop)
        }
    }

    pub(crate) fn comment(text: impl Into<String>) -> Self {
        Self {
            marker: Some(Marker::Comment(text.into())),
            ..Self::new(OpCode::Nop)
        }
    }

    pub fn at(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }

    pub fn is_label(&self) -> bool {
        matches!(self.marker, Some(Marker::Label))
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.marker, Some(Marker::Comment(_)))
    }

    /// Label placeholders and comments: present in the list, never executed
    /// by the target.
    pub fn is_pseudo(&self) -> bool {
        self.marker.is_some()
    }

    /// Branch target, for branch opcodes.
    pub fn target(&self) -> Option<Label> {
        if self.opcode.is_branch() {
            self.operand.as_label()
        } else {
            None
        }
    }

    /// Values this instruction pops. `ret` is left to the caller, which knows
    /// whether the method returns a value.
    pub fn pops(&self) -> usize {
        match self.opcode.stack_pop() {
            StackCount::Fixed(n) => n as usize,
            StackCount::Varies => match (self.opcode, &self.operand) {
                (OpCode::Call | OpCode::Callvirt, Operand::Method(m)) => {
                    m.param_count as usize + usize::from(m.has_this)
                }
                (OpCode::Newobj, Operand::Method(m)) => m.param_count as usize,
                _ => 0,
            },
        }
    }

    pub fn pushes(&self) -> usize {
        match self.opcode.stack_push() {
            StackCount::Fixed(n) => n as usize,
            StackCount::Varies => match &self.operand {
                Operand::Method(m) => usize::from(m.returns_value),
                _ => 0,
            },
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.marker {
            Some(Marker::Comment(text)) => write!(f, "// {text}"),
            Some(Marker::Label) => f.write_str("nop"),
            None if self.operand == Operand::None => write!(f, "{}", self.opcode),
            None => write!(f, "{} {}", self.opcode, self.operand),
        }
    }
}
