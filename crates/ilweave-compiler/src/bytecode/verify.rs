//! Operand-stack verification of finished method bodies.
//!
//! Walks every path from the entry point and from each handler entry,
//! tracking stack depth per position. A body passes when:
//!
//! - no instruction pops more than is on the stack
//! - every position is reached with the same depth along all paths
//! - `leave`, `ret` and `endfinally` see an empty stack (after `ret` pops its
//!   value)
//! - every branch and handler bound refers to a placed label
//! - no path runs past the last instruction

use tracing::trace;

use super::body::{HandlerKind, MethodBody};
use super::opcode::{FlowControl, OpCode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("stack underflow at {position} ({opcode})")]
    StackUnderflow { position: usize, opcode: OpCode },

    #[error("stack depth mismatch at {position}: expected {expected}, found {found}")]
    DepthMismatch {
        position: usize,
        expected: usize,
        found: usize,
    },

    #[error("{opcode} at {position} with {depth} value(s) on the stack")]
    NonEmptyStack {
        position: usize,
        opcode: OpCode,
        depth: usize,
    },

    #[error("branch at {position} targets a label that is not placed")]
    UnresolvedLabel { position: usize },

    #[error("control falls off the end of the body with depth {depth}")]
    FallsOffEnd { depth: usize },
}

/// Result of a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    /// Highest stack depth reached.
    pub max_stack: usize,
    /// Positions reached from the entry point or a handler.
    pub reachable: usize,
}

/// Verify the stack discipline of `body`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn verify_body(body: &MethodBody) -> Result<VerifyReport, VerifyError> {
    let len = body.instructions.len();
    let mut depth_at: Vec<Option<usize>> = vec![None; len];
    let mut worklist: Vec<(usize, usize)> = vec![(0, 0)];
    for handler in &body.handlers {
        let entry = match handler.kind {
            HandlerKind::Catch => 1,
            HandlerKind::Finally => 0,
        };
        worklist.push((handler.handler_start, entry));
    }

    let mut max_stack = 0;
    while let Some((start, depth)) = worklist.pop() {
        let mut pos = start;
        let mut depth = depth;
        loop {
            if pos >= len {
                if len == 0 && depth == 0 {
                    break;
                }
                return Err(VerifyError::FallsOffEnd { depth });
            }
            match depth_at[pos] {
                Some(expected) if expected == depth => break,
                Some(expected) => {
                    return Err(VerifyError::DepthMismatch {
                        position: pos,
                        expected,
                        found: depth,
                    });
                }
                None => depth_at[pos] = Some(depth),
            }

            let instr = &body.instructions[pos];
            let opcode = instr.opcode;
            let pops = match opcode {
                OpCode::Ret => usize::from(body.returns_value),
                _ => instr.pops(),
            };
            if pops > depth {
                return Err(VerifyError::StackUnderflow {
                    position: pos,
                    opcode,
                });
            }
            depth = depth - pops + instr.pushes();
            max_stack = max_stack.max(depth);

            let flow = opcode.flow_control();
            if matches!(
                flow,
                FlowControl::Leave | FlowControl::Return | FlowControl::EndFinally
            ) && depth != 0
            {
                return Err(VerifyError::NonEmptyStack {
                    position: pos,
                    opcode,
                    depth,
                });
            }

            if opcode.is_branch() {
                let target = instr
                    .operand
                    .as_label()
                    .and_then(|l| body.position_of(l))
                    .ok_or(VerifyError::UnresolvedLabel { position: pos })?;
                match flow {
                    FlowControl::CondBranch => worklist.push((target, depth)),
                    _ => {
                        pos = target;
                        continue;
                    }
                }
            }

            match flow {
                FlowControl::Return | FlowControl::Throw | FlowControl::EndFinally => break,
                _ => pos += 1,
            }
        }
    }

    let reachable = depth_at.iter().filter(|d| d.is_some()).count();
    trace!(max_stack, reachable, "verified body");
    Ok(VerifyReport {
        max_stack,
        reachable,
    })
}
