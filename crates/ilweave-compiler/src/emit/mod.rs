//! Instruction emitter for one method body.
//!
//! The [`BodyEmitter`] provides a typed API for appending instructions and
//! owns everything a body accumulates while it is lowered:
//!
//! - the relocatable [`InstructionList`]
//! - the local-variable table
//! - exception handlers, as label-bounded entries until the body is finished
//! - breakable contexts ([`JumpManager`]) and the protected-region depth
//! - the lazily created return label and return local
//! - the current debug span
//!
//! Labels are placeholder instructions allocated detached and attached when
//! placed, so forward branches can be emitted before their target exists.
//! [`finish`](BodyEmitter::finish) linearizes the list and resolves labels to
//! positions.
//!
//! # Example
//!
//! ```
//! use ilweave_compiler::bytecode::OpCode;
//! use ilweave_compiler::emit::BodyEmitter;
//!
//! let mut emitter = BodyEmitter::new("m_Check_1", false);
//! let end = emitter.new_label("end");
//! emitter.ldarg(0);
//! emitter.emit_branch(OpCode::Brfalse, end);
//! emitter.emit_i32(7);
//! emitter.emit(OpCode::Pop);
//! emitter.place(end).unwrap();
//! emitter.emit(OpCode::Ret);
//!
//! let body = emitter.finish().unwrap();
//! assert_eq!(
//!     body.listing(),
//!     vec!["ldarg A_0", "brfalse end", "ldc.i4.7", "pop", "[end]", "ret"]
//! );
//! ```

mod jumps;
mod list;

pub use jumps::{BreakableKind, JumpManager, JumpTarget};
pub use list::InstructionList;

use ilweave_core::{LoweringError, Span};
use ordered_float::OrderedFloat;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::bytecode::{
    ExceptionHandler, FieldRef, HandlerKind, InstrId, Instruction, Label, LocalVariable,
    MethodBody, MethodRef, OpCode, Operand,
};
use crate::type_resolver::TypeExpr;

type Result<T> = std::result::Result<T, LoweringError>;

/// An exception handler whose bounds are still labels.
#[derive(Debug, Clone)]
pub struct PendingHandler {
    pub kind: HandlerKind,
    pub try_start: Label,
    pub try_end: Label,
    pub handler_start: Label,
    pub handler_end: Label,
    pub catch_type: Option<TypeExpr>,
}

/// Emitter state to roll back to when a statement turns out to be
/// unsupported halfway through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    tail: Option<InstrId>,
    handlers: usize,
    breakables: usize,
    region_depth: usize,
    return_label: Option<Label>,
}

/// Emits the instructions of a single method body.
#[derive(Debug)]
pub struct BodyEmitter {
    list: InstructionList,
    locals: Vec<LocalVariable>,
    handlers: Vec<PendingHandler>,
    jumps: JumpManager,
    /// Number of enclosing protected blocks (try, catch or finally).
    region_depth: usize,
    return_label: Option<Label>,
    return_local: Option<u16>,
    returns_value: bool,
    return_type: Option<TypeExpr>,
    current_span: Option<Span>,
    record_spans: bool,
    label_names: FxHashMap<Label, String>,
    method: String,
}

impl BodyEmitter {
    /// Create an emitter for the method with handle `method`.
    pub fn new(method: impl Into<String>, returns_value: bool) -> Self {
        Self {
            list: InstructionList::new(),
            locals: Vec::new(),
            handlers: Vec::new(),
            jumps: JumpManager::new(),
            region_depth: 0,
            return_label: None,
            return_local: None,
            returns_value,
            return_type: None,
            current_span: None,
            record_spans: true,
            label_names: FxHashMap::default(),
            method: method.into(),
        }
    }

    /// Type of the synthetic return local, for methods returning a value.
    pub fn with_return_type(mut self, ty: TypeExpr) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn record_spans(mut self, record: bool) -> Self {
        self.record_spans = record;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn returns_value(&self) -> bool {
        self.returns_value
    }

    /// Set the span attached to instructions emitted from now on.
    pub fn set_span(&mut self, span: Span) -> Option<Span> {
        let previous = self.current_span;
        if !span.is_unknown() {
            self.current_span = Some(span);
        }
        previous
    }

    pub fn restore_span(&mut self, span: Option<Span>) {
        self.current_span = span;
    }

    pub fn instructions(&self) -> &InstructionList {
        &self.list
    }

    // ==========================================================================
    // Basic Emission
    // ==========================================================================

    fn push(&mut self, instr: Instruction) -> InstrId {
        let span = if self.record_spans { self.current_span } else { None };
        self.list.push_back(instr.at(span))
    }

    /// Emit a single opcode with no operand.
    pub fn emit(&mut self, op: OpCode) -> InstrId {
        self.push(Instruction::new(op))
    }

    pub fn emit_with(&mut self, op: OpCode, operand: Operand) -> InstrId {
        self.push(Instruction::with(op, operand))
    }

    /// Emit an inline comment. Comments never execute.
    pub fn emit_comment(&mut self, text: impl Into<String>) -> InstrId {
        self.push(Instruction::comment(text))
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    /// Emit a 32-bit integer, using the short forms where they exist.
    pub fn emit_i32(&mut self, value: i32) -> InstrId {
        if let Some(op) = OpCode::ldc_i4_short(value) {
            return self.emit(op);
        }
        if (-128..=127).contains(&value) {
            self.emit_with(OpCode::Ldc_I4_S, Operand::Int32(value))
        } else {
            self.emit_with(OpCode::Ldc_I4, Operand::Int32(value))
        }
    }

    pub fn emit_i64(&mut self, value: i64) -> InstrId {
        self.emit_with(OpCode::Ldc_I8, Operand::Int64(value))
    }

    pub fn emit_f32(&mut self, value: f32) -> InstrId {
        self.emit_with(OpCode::Ldc_R4, Operand::Float32(OrderedFloat(value)))
    }

    pub fn emit_f64(&mut self, value: f64) -> InstrId {
        self.emit_with(OpCode::Ldc_R8, Operand::Float64(OrderedFloat(value)))
    }

    pub fn emit_string(&mut self, value: &str) -> InstrId {
        self.emit_with(OpCode::Ldstr, Operand::String(value.to_string()))
    }

    pub fn emit_null(&mut self) -> InstrId {
        self.emit(OpCode::Ldnull)
    }

    pub fn emit_bool(&mut self, value: bool) -> InstrId {
        self.emit(if value { OpCode::Ldc_I4_1 } else { OpCode::Ldc_I4_0 })
    }

    // ==========================================================================
    // Locals and Arguments
    // ==========================================================================

    /// Add a body local and return its index.
    pub fn declare_local(&mut self, name: impl Into<String>, ty: TypeExpr) -> u16 {
        let index = self.locals.len() as u16;
        self.locals.push(LocalVariable {
            index,
            ty,
            name: name.into(),
        });
        index
    }

    pub fn locals(&self) -> &[LocalVariable] {
        &self.locals
    }

    pub fn ldloc(&mut self, index: u16) -> InstrId {
        self.emit_with(OpCode::Ldloc, Operand::Local(index))
    }

    pub fn ldloca(&mut self, index: u16) -> InstrId {
        self.emit_with(OpCode::Ldloca, Operand::Local(index))
    }

    pub fn stloc(&mut self, index: u16) -> InstrId {
        self.emit_with(OpCode::Stloc, Operand::Local(index))
    }

    pub fn ldarg(&mut self, index: u16) -> InstrId {
        self.emit_with(OpCode::Ldarg, Operand::Arg(index))
    }

    pub fn ldarga(&mut self, index: u16) -> InstrId {
        self.emit_with(OpCode::Ldarga, Operand::Arg(index))
    }

    pub fn starg(&mut self, index: u16) -> InstrId {
        self.emit_with(OpCode::Starg, Operand::Arg(index))
    }

    // ==========================================================================
    // Members and Types
    // ==========================================================================

    /// Emit `call`, `callvirt`, `newobj`, `ldftn` or `ldvirtftn`.
    pub fn emit_method(&mut self, op: OpCode, method: MethodRef) -> InstrId {
        self.emit_with(op, Operand::Method(method))
    }

    pub fn emit_field(&mut self, op: OpCode, field: FieldRef) -> InstrId {
        self.emit_with(op, Operand::Field(field))
    }

    pub fn emit_type(&mut self, op: OpCode, ty: TypeExpr) -> InstrId {
        self.emit_with(op, Operand::Type(ty))
    }

    // ==========================================================================
    // Labels and Branches
    // ==========================================================================

    /// Allocate a label; it is placed later with [`place`](Self::place).
    pub fn new_label(&mut self, name: &str) -> Label {
        let id = self.list.alloc_detached(Instruction::label_placeholder());
        let label = Label(id);
        self.label_names.insert(label, name.to_string());
        label
    }

    /// Place `label` at the current end of the body.
    pub fn place(&mut self, label: Label) -> Result<()> {
        if self.list.is_attached(label.instr()) {
            return Err(LoweringError::other(
                format!("label '{}' placed twice in '{}'", self.label_name(label), self.method),
                self.current_span.unwrap_or_default(),
            ));
        }
        self.list.attach_back(label.instr());
        Ok(())
    }

    pub fn is_placed(&self, label: Label) -> bool {
        self.list.is_attached(label.instr())
    }

    pub fn label_name(&self, label: Label) -> String {
        self.label_names
            .get(&label)
            .cloned()
            .unwrap_or_else(|| format!("{label:?}"))
    }

    pub fn emit_branch(&mut self, op: OpCode, target: Label) -> InstrId {
        self.emit_with(op, Operand::Label(target))
    }

    /// Whether control cannot fall through the last emitted instruction.
    /// A trailing label counts as reachable when some branch targets it.
    pub fn ends_with_terminator(&self) -> bool {
        let mut cursor = self.list.tail();
        while let Some(id) = cursor {
            let Some(instr) = self.list.get(id) else {
                return false;
            };
            if instr.is_comment() || (instr.is_label() && !self.is_branch_target(Label(id))) {
                cursor = self.list.prev(id);
                continue;
            }
            return !instr.is_label()
                && matches!(
                    instr.opcode,
                    OpCode::Ret
                        | OpCode::Br
                        | OpCode::Leave
                        | OpCode::Throw
                        | OpCode::Rethrow
                        | OpCode::Endfinally
                );
        }
        false
    }

    fn is_branch_target(&self, label: Label) -> bool {
        self.list
            .iter()
            .any(|(_, instr)| instr.operand.as_label() == Some(label))
    }

    // ==========================================================================
    // Loop and Switch Control Flow
    // ==========================================================================

    pub fn enter_loop(&mut self, break_label: Label, continue_label: Label) {
        self.jumps
            .enter_loop(break_label, continue_label, self.region_depth);
    }

    pub fn enter_switch(&mut self, break_label: Label) {
        self.jumps.enter_switch(break_label, self.region_depth);
    }

    pub fn exit_breakable(&mut self) {
        self.jumps.exit();
    }

    pub fn in_loop(&self) -> bool {
        self.jumps.in_loop()
    }

    /// Jump instruction for a target entered at `target_depth`: `leave`
    /// when the jump crosses a protected-region boundary.
    fn jump_op(&self, target_depth: usize) -> OpCode {
        if self.region_depth > target_depth {
            OpCode::Leave
        } else {
            OpCode::Br
        }
    }

    pub fn emit_break(&mut self, span: Span) -> Result<InstrId> {
        let target = self.jumps.break_target().map_err(|e| LoweringError::InvalidJump {
            message: e.to_string(),
            span,
        })?;
        let op = self.jump_op(target.region_depth);
        Ok(self.emit_branch(op, target.label))
    }

    pub fn emit_continue(&mut self, span: Span) -> Result<InstrId> {
        let target = self.jumps.continue_target().map_err(|e| LoweringError::InvalidJump {
            message: e.to_string(),
            span,
        })?;
        let op = self.jump_op(target.region_depth);
        Ok(self.emit_branch(op, target.label))
    }

    // ==========================================================================
    // Protected Regions
    // ==========================================================================

    pub fn enter_region(&mut self) {
        self.region_depth += 1;
    }

    pub fn exit_region(&mut self) {
        self.region_depth = self.region_depth.saturating_sub(1);
    }

    pub fn region_depth(&self) -> usize {
        self.region_depth
    }

    /// Add a completed handler. Inner handlers are added before the
    /// handlers of the constructs enclosing them.
    pub fn add_handler(&mut self, handler: PendingHandler) {
        self.handlers.push(handler);
    }

    pub fn handlers(&self) -> &[PendingHandler] {
        &self.handlers
    }

    // ==========================================================================
    // Returns
    // ==========================================================================

    /// Emit a return; the value, if any, is already on the stack.
    ///
    /// Inside a protected region the value goes to the return local and
    /// control leaves to the shared return label placed by
    /// [`finish`](Self::finish).
    pub fn emit_return(&mut self) -> InstrId {
        if self.region_depth == 0 {
            return self.emit(OpCode::Ret);
        }
        if self.returns_value {
            let local = self.return_local();
            self.stloc(local);
        }
        let label = self.return_label();
        self.emit_branch(OpCode::Leave, label)
    }

    fn return_label(&mut self) -> Label {
        match self.return_label {
            Some(label) => label,
            None => {
                let label = self.new_label("return");
                self.return_label = Some(label);
                label
            }
        }
    }

    fn return_local(&mut self) -> u16 {
        match self.return_local {
            Some(local) => local,
            None => {
                let ty = self
                    .return_type
                    .clone()
                    .unwrap_or(TypeExpr::TypeSystem("Object"));
                let local = self.declare_local("ret", ty);
                self.return_local = Some(local);
                local
            }
        }
    }

    // ==========================================================================
    // Rollback and Relocation
    // ==========================================================================

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            tail: self.list.tail(),
            handlers: self.handlers.len(),
            breakables: self.jumps.depth(),
            region_depth: self.region_depth,
            return_label: self.return_label,
        }
    }

    /// Drop everything emitted since `checkpoint`, including a return
    /// epilogue first requested since then. Locals declared since then are
    /// kept; the return local is reused by a later return.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        trace!(method = %self.method, "rolling back partial statement");
        self.list.truncate_after(checkpoint.tail);
        self.handlers.truncate(checkpoint.handlers);
        self.jumps.truncate(checkpoint.breakables);
        self.region_depth = checkpoint.region_depth;
        self.return_label = checkpoint.return_label;
    }

    /// First and last instruction emitted since `checkpoint`.
    pub fn range_since(&self, checkpoint: Checkpoint) -> Option<(InstrId, InstrId)> {
        let first = match checkpoint.tail {
            Some(tail) => self.list.next(tail)?,
            None => self.list.head()?,
        };
        let last = self.list.tail()?;
        Some((first, last))
    }

    /// Move everything emitted since `checkpoint` to just before `anchor`.
    pub fn relocate_since(&mut self, checkpoint: Checkpoint, anchor: InstrId) {
        if let Some((first, last)) = self.range_since(checkpoint) {
            if first == anchor {
                return;
            }
            trace!(?first, ?last, ?anchor, "relocating instruction range");
            self.list.move_range_before(first, last, anchor);
        }
    }

    // ==========================================================================
    // Finalization
    // ==========================================================================

    /// Linearize the list and resolve labels.
    ///
    /// Label placeholders nothing refers to are dropped. Fails with
    /// [`LoweringError::UnplacedLabel`] when a branch or handler refers to a
    /// label that was never placed.
    pub fn finish(mut self) -> Result<MethodBody> {
        if let Some(label) = self.return_label {
            self.restore_span(None);
            self.place(label)?;
            if self.returns_value {
                let local = self.return_local();
                self.ldloc(local);
            }
            self.emit(OpCode::Ret);
        }

        let mut referenced: FxHashSet<Label> = self
            .list
            .iter()
            .filter_map(|(_, i)| i.operand.as_label())
            .collect();
        for h in &self.handlers {
            referenced.extend([h.try_start, h.try_end, h.handler_start, h.handler_end]);
        }

        let unplaced = referenced.iter().any(|l| !self.list.is_attached(l.instr()));
        if unplaced {
            return Err(LoweringError::UnplacedLabel {
                method: self.method,
            });
        }

        let mut instructions = Vec::with_capacity(self.list.len());
        let mut labels = FxHashMap::default();
        for (id, instr) in self.list.iter() {
            if instr.is_label() {
                if !referenced.contains(&Label(id)) {
                    continue;
                }
                labels.insert(Label(id), instructions.len());
            }
            instructions.push(instr.clone());
        }

        let mut handlers = Vec::with_capacity(self.handlers.len());
        for h in &self.handlers {
            let pos = |label: Label| labels.get(&label).copied().unwrap_or_default();
            handlers.push(ExceptionHandler {
                kind: h.kind,
                try_start: pos(h.try_start),
                try_end: pos(h.try_end),
                handler_start: pos(h.handler_start),
                handler_end: pos(h.handler_end),
                catch_type: h.catch_type.clone(),
            });
        }

        let label_names = self
            .label_names
            .into_iter()
            .filter(|(l, _)| labels.contains_key(l))
            .collect();

        Ok(MethodBody {
            instructions,
            locals: self.locals,
            handlers,
            labels,
            label_names,
            returns_value: self.returns_value,
        })
    }
}

/// Error from break/continue statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakError {
    /// Continue used outside of a loop (switches don't support continue).
    NotInLoop,
    /// Break used outside of a breakable context (loop or switch).
    NotInBreakable,
}

impl std::fmt::Display for BreakError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakError::NotInLoop => write!(f, "continue statement not inside a loop"),
            BreakError::NotInBreakable => {
                write!(f, "break statement not inside a loop or switch")
            }
        }
    }
}

impl std::error::Error for BreakError {}
