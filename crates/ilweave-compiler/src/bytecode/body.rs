//! Finished method bodies.
//!
//! A [`MethodBody`] is what the emitter produces once a method has been fully
//! lowered: a linear instruction sequence in which every label has been
//! resolved to a position, plus the local-variable and exception-handler side
//! tables.

use std::fmt;

use rustc_hash::FxHashMap;

use super::instruction::{Instruction, Label, Marker, Operand};
use crate::type_resolver::TypeExpr;

/// A body local.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    pub index: u16,
    pub ty: TypeExpr,
    /// Source name; synthetic locals are named after their purpose.
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Catch,
    Finally,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandlerKind::Catch => "Catch",
            HandlerKind::Finally => "Finally",
        })
    }
}

/// One entry of the exception-handler table.
///
/// Bounds are instruction positions; ends are exclusive, so the end of the
/// protected block is the position where its handler starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    pub kind: HandlerKind,
    pub try_start: usize,
    pub try_end: usize,
    pub handler_start: usize,
    pub handler_end: usize,
    /// Caught type for catch handlers.
    pub catch_type: Option<TypeExpr>,
}

impl ExceptionHandler {
    /// `try_start <= try_end <= handler_start <= handler_end`.
    pub fn is_ordered(&self) -> bool {
        self.try_start <= self.try_end
            && self.try_end <= self.handler_start
            && self.handler_start <= self.handler_end
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodBody {
    pub instructions: Vec<Instruction>,
    pub locals: Vec<LocalVariable>,
    pub handlers: Vec<ExceptionHandler>,
    /// Position of each referenced label's placeholder.
    pub labels: FxHashMap<Label, usize>,
    /// Display names of labels, e.g. `else` or `loop_test`.
    pub label_names: FxHashMap<Label, String>,
    /// Whether `ret` carries a value.
    pub returns_value: bool,
}

impl MethodBody {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn position_of(&self, label: Label) -> Option<usize> {
        self.labels.get(&label).copied()
    }

    pub fn label_name(&self, label: Label) -> String {
        self.label_names
            .get(&label)
            .cloned()
            .unwrap_or_else(|| format!("{label:?}"))
    }

    /// Executable instructions only (no labels or comments).
    pub fn code(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().filter(|i| !i.is_pseudo())
    }

    /// One line per entry: `[name]` for label placeholders, `// text` for
    /// comments, otherwise the instruction with branch targets shown by
    /// label name.
    pub fn listing(&self) -> Vec<String> {
        self.instructions
            .iter()
            .enumerate()
            .map(|(pos, instr)| self.line_at(pos, instr))
            .collect()
    }

    fn label_at(&self, pos: usize) -> Option<Label> {
        self.labels
            .iter()
            .filter(|&(_, &p)| p == pos)
            .map(|(l, _)| *l)
            .min()
    }

    fn line_at(&self, pos: usize, instr: &Instruction) -> String {
        match (&instr.marker, &instr.operand) {
            (Some(Marker::Label), _) => match self.label_at(pos) {
                Some(label) => format!("[{}]", self.label_name(label)),
                None => "nop".to_string(),
            },
            (Some(Marker::Comment(text)), _) => format!("// {text}"),
            (None, Operand::Label(target)) => {
                format!("{} {}", instr.opcode, self.label_name(*target))
            }
            (None, Operand::Local(index)) => match self.locals.get(*index as usize) {
                Some(local) => format!("{} {}", instr.opcode, local.name),
                None => instr.to_string(),
            },
            _ => instr.to_string(),
        }
    }

    /// The listing joined with newlines.
    pub fn listing_text(&self) -> String {
        self.listing().join("\n")
    }
}
