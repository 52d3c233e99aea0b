//! Active-scope frames and the guard that pops them.

use std::ops::{Deref, DerefMut};

use super::{DefId, DefinitionTable};

/// One lexical level of the active scope stack.
#[derive(Debug)]
pub(crate) struct Frame {
    /// Unique for the lifetime of the table; embedded in local scope names so
    /// that sibling blocks never share an identity.
    pub(crate) id: u32,
    pub(crate) entries: Vec<DefId>,
}

/// Depth of the active scope stack, used to restore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMark(pub(crate) usize);

/// Pops every frame pushed since its creation when dropped.
///
/// Dereferences to the table so registrations can go through the guard.
///
/// ```
/// use ilweave_compiler::definitions::{DefinitionTable, DefinitionVariable};
/// use ilweave_core::MemberKind;
///
/// let mut table = DefinitionTable::new();
/// {
///     let mut scope = table.enter_scope();
///     let frame = scope.frame_scope();
///     let id = scope
///         .register(DefinitionVariable::new(MemberKind::LocalVariable, frame, "i", "l_i_1"))
///         .unwrap();
///     scope.push_active(id);
///     assert!(scope.lookup_active(MemberKind::LocalVariable, "i").is_some());
/// }
/// assert!(table.lookup_active(MemberKind::LocalVariable, "i").is_none());
/// ```
pub struct ScopeGuard<'t> {
    table: &'t mut DefinitionTable,
    mark: FrameMark,
}

impl<'t> ScopeGuard<'t> {
    pub(crate) fn new(table: &'t mut DefinitionTable) -> Self {
        let mark = table.push_frame();
        Self { table, mark }
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = DefinitionTable;

    fn deref(&self) -> &DefinitionTable {
        self.table
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut DefinitionTable {
        self.table
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.table.restore(self.mark);
    }
}
