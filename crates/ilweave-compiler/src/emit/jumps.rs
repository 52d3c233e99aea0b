//! Jump management for control flow.
//!
//! Tracks the stack of breakable constructs (loops and switches) so that
//! `break` and `continue` find their targets, and records the protected
//! region depth at which each construct was entered so that jumps leaving a
//! `try` block can be emitted as `leave`.

use super::BreakError;
use crate::bytecode::Label;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakableKind {
    Loop,
    Switch,
}

/// Context for a single breakable construct.
#[derive(Debug, Clone, Copy)]
struct BreakableContext {
    kind: BreakableKind,
    break_label: Label,
    /// Only loops accept `continue`.
    continue_label: Option<Label>,
    /// Protected-region depth when the construct was entered.
    region_depth: usize,
}

/// Resolved target of a `break` or `continue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpTarget {
    pub label: Label,
    pub region_depth: usize,
}

/// Manages jump targets for control flow.
#[derive(Debug, Default)]
pub struct JumpManager {
    /// Innermost last.
    stack: Vec<BreakableContext>,
}

impl JumpManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_loop(&mut self, break_label: Label, continue_label: Label, region_depth: usize) {
        self.stack.push(BreakableContext {
            kind: BreakableKind::Loop,
            break_label,
            continue_label: Some(continue_label),
            region_depth,
        });
    }

    pub fn enter_switch(&mut self, break_label: Label, region_depth: usize) {
        self.stack.push(BreakableContext {
            kind: BreakableKind::Switch,
            break_label,
            continue_label: None,
            region_depth,
        });
    }

    /// Leave the innermost construct.
    pub fn exit(&mut self) {
        self.stack.pop();
    }

    /// Target of `break`: the innermost loop or switch.
    pub fn break_target(&self) -> Result<JumpTarget, BreakError> {
        self.stack
            .last()
            .map(|ctx| JumpTarget {
                label: ctx.break_label,
                region_depth: ctx.region_depth,
            })
            .ok_or(BreakError::NotInBreakable)
    }

    /// Target of `continue`: the innermost loop, skipping switches.
    pub fn continue_target(&self) -> Result<JumpTarget, BreakError> {
        self.stack
            .iter()
            .rev()
            .find_map(|ctx| {
                ctx.continue_label.map(|label| JumpTarget {
                    label,
                    region_depth: ctx.region_depth,
                })
            })
            .ok_or(BreakError::NotInLoop)
    }

    pub fn in_loop(&self) -> bool {
        self.stack.iter().any(|c| c.kind == BreakableKind::Loop)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Drop contexts above `depth`, used when rolling back a statement.
    pub fn truncate(&mut self, depth: usize) {
        self.stack.truncate(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::InstrId;

    fn label(n: u32) -> Label {
        Label(InstrId(n))
    }

    #[test]
    fn new_manager_not_in_loop() {
        let manager = JumpManager::new();
        assert!(!manager.in_loop());
        assert_eq!(manager.depth(), 0);
        assert_eq!(manager.break_target(), Err(BreakError::NotInBreakable));
        assert_eq!(manager.continue_target(), Err(BreakError::NotInLoop));
    }

    #[test]
    fn nested_loops() {
        let mut manager = JumpManager::new();
        manager.enter_loop(label(1), label(2), 0);
        manager.enter_loop(label(3), label(4), 1);
        assert_eq!(manager.continue_target().map(|t| t.label), Ok(label(4)));
        assert_eq!(manager.break_target().map(|t| t.region_depth), Ok(1));

        manager.exit();
        assert_eq!(manager.continue_target().map(|t| t.label), Ok(label(2)));
    }

    #[test]
    fn continue_skips_switch() {
        let mut manager = JumpManager::new();
        manager.enter_loop(label(1), label(2), 0);
        manager.enter_switch(label(5), 0);
        assert_eq!(manager.break_target().map(|t| t.label), Ok(label(5)));
        assert_eq!(manager.continue_target().map(|t| t.label), Ok(label(2)));
    }

    #[test]
    fn continue_in_switch_outside_loop() {
        let mut manager = JumpManager::new();
        manager.enter_switch(label(5), 0);
        assert!(!manager.in_loop());
        assert_eq!(manager.continue_target(), Err(BreakError::NotInLoop));
    }

    #[test]
    fn truncate_restores_depth() {
        let mut manager = JumpManager::new();
        manager.enter_loop(label(1), label(2), 0);
        let depth = manager.depth();
        manager.enter_switch(label(3), 0);
        manager.enter_loop(label(4), label(5), 0);
        manager.truncate(depth);
        assert_eq!(manager.depth(), 1);
    }
}
