//! Instruction model of the target stack machine.
//!
//! - [`OpCode`]: the instruction set and each opcode's stack behaviour
//! - [`Instruction`], [`Operand`], [`Label`]: one entry of an instruction list
//! - [`MethodBody`]: a finished, linearized body with its side tables
//! - [`verify_body`]: operand-stack verification of a finished body

mod body;
mod instruction;
mod opcode;
mod verify;

pub use body::{ExceptionHandler, HandlerKind, LocalVariable, MethodBody};
pub use instruction::{FieldRef, InstrId, Instruction, Label, Marker, MemberRef, MethodRef, Operand};
pub use opcode::{FlowControl, OpCode, StackCount};
pub use verify::{verify_body, VerifyError, VerifyReport};
