//! The definition table.
//!
//! Maps a declaration identity `(kind, scope, name)` to the handle under which
//! its generated artifact is reachable. It has two parts:
//!
//! - a permanent, append-only **ledger** indexed by [`DefHash`]; nothing is
//!   ever removed from it, so a definition stays resolvable after its lexical
//!   scope has been left;
//! - an **active scope stack** of frames, pushed and popped as types, methods
//!   and blocks are entered and left. Locals and parameters are found through
//!   it (innermost first), and so is the "current method / current type"
//!   context ([`get_last_of_kind`](DefinitionTable::get_last_of_kind)).
//!
//! Declarations referenced before they are visited get a forward stub
//! ([`register_stub`](DefinitionTable::register_stub)) which the visit later
//! fills exactly once.

mod scope;
mod variable;

pub use scope::{FrameMark, ScopeGuard};
pub use variable::{DefId, DefinitionVariable};

use ilweave_core::{DefHash, LoweringError, MemberKind, Span};
use rustc_hash::FxHashMap;
use tracing::trace;

use scope::Frame;

type Result<T> = std::result::Result<T, LoweringError>;

/// Ledger plus active scope stack. See the [module docs](self).
#[derive(Debug, Default)]
pub struct DefinitionTable {
    ledger: Vec<DefinitionVariable>,
    index: FxHashMap<DefHash, DefId>,
    frames: Vec<Frame>,
    next_frame: u32,
}

/// Hash key for an identity. Method names carry their parameter signature,
/// which is mixed in positionally.
fn key_of(kind: MemberKind, scope: &str, name: &str) -> DefHash {
    if kind == MemberKind::Method
        && let Some((base, rest)) = name.split_once('(')
    {
        let params = rest.strip_suffix(')').unwrap_or(rest);
        let params: Vec<&str> = if params.is_empty() {
            Vec::new()
        } else {
            params.split(',').collect()
        };
        return DefHash::of_method(scope, base, &params);
    }
    DefHash::of(kind, scope, name)
}

impl DefinitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    pub fn get(&self, id: DefId) -> Option<&DefinitionVariable> {
        self.ledger.get(id.index())
    }

    /// Every entry in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (DefId, &DefinitionVariable)> {
        self.ledger
            .iter()
            .enumerate()
            .map(|(i, def)| (DefId(i as u32), def))
    }

    /// Number of forward stubs not yet filled.
    pub fn pending_stubs(&self) -> usize {
        self.ledger.iter().filter(|d| d.is_stub()).count()
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    /// Find the ledger entry for an identity, checking the full identity on a
    /// hash hit.
    fn find(&self, kind: MemberKind, scope: &str, name: &str) -> Result<Option<DefId>> {
        let Some(&id) = self.index.get(&key_of(kind, scope, name)) else {
            return Ok(None);
        };
        let existing = &self.ledger[id.index()];
        if !existing.same_identity(kind, scope, name) {
            return Err(LoweringError::IdentityCollision {
                existing: existing.identity(),
                incoming: format!("{kind} {scope}::{name}"),
            });
        }
        Ok(Some(id))
    }

    fn insert(&mut self, def: DefinitionVariable) -> DefId {
        let id = DefId(self.ledger.len() as u32);
        self.index
            .insert(key_of(def.kind, &def.scope, &def.name), id);
        self.ledger.push(def);
        id
    }

    /// Register a definition permanently.
    ///
    /// Registering an identity again with the same handle returns the
    /// existing entry; an unfilled stub is filled; anything else is a
    /// duplicate.
    pub fn register(&mut self, def: DefinitionVariable) -> Result<DefId> {
        match self.find(def.kind, &def.scope, &def.name)? {
            None => Ok(self.insert(def)),
            Some(id) => {
                let existing = &mut self.ledger[id.index()];
                if existing.handle == def.handle && existing.valid {
                    return Ok(id);
                }
                if existing.is_stub() {
                    trace!(def = %existing, "filling forward stub");
                    existing.valid = true;
                    existing.ordinal = def.ordinal.or(existing.ordinal);
                    existing.span = def.span;
                    return Ok(id);
                }
                Err(LoweringError::DuplicateDefinition {
                    kind: def.kind.to_string(),
                    name: def.name,
                    span: def.span,
                })
            }
        }
    }

    /// Register a forward stub. A second stub for the same identity returns
    /// the first.
    pub fn register_stub(&mut self, mut def: DefinitionVariable) -> Result<DefId> {
        if let Some(id) = self.find(def.kind, &def.scope, &def.name)? {
            return Ok(id);
        }
        def.valid = false;
        trace!(def = %def, "registering forward stub");
        Ok(self.insert(def))
    }

    /// Attach the definition to a stub. Filling twice is an error.
    pub fn fill(&mut self, id: DefId, span: Span) -> Result<()> {
        let Some(def) = self.ledger.get_mut(id.index()) else {
            return Err(LoweringError::other(format!("unknown definition {id:?}"), span));
        };
        if def.valid {
            return Err(LoweringError::DuplicateDefinition {
                kind: def.kind.to_string(),
                name: def.name.clone(),
                span,
            });
        }
        def.valid = true;
        def.span = span;
        Ok(())
    }

    /// Exact lookup in the ledger. Never fails; a colliding identity simply
    /// reports no match.
    pub fn lookup(&self, kind: MemberKind, scope: &str, name: &str) -> Option<&DefinitionVariable> {
        self.lookup_id(kind, scope, name)
            .and_then(|id| self.get(id))
    }

    pub fn lookup_id(&self, kind: MemberKind, scope: &str, name: &str) -> Option<DefId> {
        self.find(kind, scope, name).ok().flatten()
    }

    /// Like [`lookup_id`](Self::lookup_id) but surfaces identity collisions.
    pub fn try_lookup_id(&self, kind: MemberKind, scope: &str, name: &str) -> Result<Option<DefId>> {
        self.find(kind, scope, name)
    }

    // =========================================================================
    // Active scope
    // =========================================================================

    /// Push a frame and return the mark that restores the stack to its
    /// previous depth.
    pub fn push_frame(&mut self) -> FrameMark {
        let mark = FrameMark(self.frames.len());
        self.next_frame += 1;
        self.frames.push(Frame {
            id: self.next_frame,
            entries: Vec::new(),
        });
        mark
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Drop every frame above `mark`.
    pub fn restore(&mut self, mark: FrameMark) {
        self.frames.truncate(mark.0);
    }

    /// Current depth of the active scope stack.
    pub fn mark(&self) -> FrameMark {
        FrameMark(self.frames.len())
    }

    /// Push a frame that is popped when the guard is dropped.
    pub fn enter_scope(&mut self) -> ScopeGuard<'_> {
        ScopeGuard::new(self)
    }

    /// Scope name for locals declared in the innermost frame.
    pub fn frame_scope(&self) -> String {
        match self.frames.last() {
            Some(frame) => format!("frame#{}", frame.id),
            None => "frame#0".to_string(),
        }
    }

    /// Make a registered entry visible in the innermost frame.
    pub fn push_active(&mut self, id: DefId) {
        if self.frames.is_empty() {
            self.push_frame();
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.entries.push(id);
        }
    }

    fn active(&self) -> impl Iterator<Item = &DefinitionVariable> {
        self.frames
            .iter()
            .rev()
            .flat_map(|f| f.entries.iter().rev())
            .filter_map(|id| self.get(*id))
    }

    /// Find an active entry by kind and name, innermost first.
    pub fn lookup_active(&self, kind: MemberKind, name: &str) -> Option<&DefinitionVariable> {
        self.active().find(|d| d.kind == kind && d.name == name)
    }

    /// Flag the innermost active entry named `name` as skipped. Returns
    /// whether one was found.
    pub fn skip_active(&mut self, kind: MemberKind, name: &str) -> bool {
        let found = self
            .frames
            .iter()
            .rev()
            .flat_map(|f| f.entries.iter().rev())
            .copied()
            .find(|id| self.get(*id).is_some_and(|d| d.kind == kind && d.name == name));
        match found.and_then(|id| self.ledger.get_mut(id.index())) {
            Some(def) => {
                def.skipped = true;
                true
            }
            None => false,
        }
    }

    /// The most recently activated entry of a kind.
    pub fn get_last_of_kind(&self, kind: MemberKind) -> Option<&DefinitionVariable> {
        self.active().find(|d| d.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, handle: &str) -> DefinitionVariable {
        DefinitionVariable::new(MemberKind::Field, "Demo.Point", name, handle)
    }

    #[test]
    fn register_and_lookup() {
        let mut table = DefinitionTable::new();
        let id = table.register(field("x", "f_x_1")).unwrap();
        let found = table.lookup(MemberKind::Field, "Demo.Point", "x").unwrap();
        assert_eq!(found.handle, "f_x_1");
        assert_eq!(table.lookup_id(MemberKind::Field, "Demo.Point", "x"), Some(id));
        assert!(table.lookup(MemberKind::Field, "Demo.Point", "y").is_none());
        assert!(table.lookup(MemberKind::Property, "Demo.Point", "x").is_none());
    }

    #[test]
    fn re_register_same_handle_is_noop() {
        let mut table = DefinitionTable::new();
        let a = table.register(field("x", "f_x_1")).unwrap();
        let b = table.register(field("x", "f_x_1")).unwrap();
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn re_register_different_handle_is_duplicate() {
        let mut table = DefinitionTable::new();
        table.register(field("x", "f_x_1")).unwrap();
        let err = table.register(field("x", "f_x_2")).unwrap_err();
        assert!(matches!(err, LoweringError::DuplicateDefinition { .. }));
    }

    #[test]
    fn stub_is_idempotent_and_filled_once() {
        let mut table = DefinitionTable::new();
        let method = || DefinitionVariable::new(MemberKind::Method, "Demo.Calc", "Run(int)", "m_Run_1");
        let a = table.register_stub(method()).unwrap();
        let b = table.register_stub(method()).unwrap();
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
        assert_eq!(table.pending_stubs(), 1);

        table.fill(a, Span::new(4, 1, 3)).unwrap();
        assert!(table.get(a).unwrap().valid);
        assert_eq!(table.pending_stubs(), 0);
        assert!(matches!(
            table.fill(a, Span::new(4, 1, 3)),
            Err(LoweringError::DuplicateDefinition { .. })
        ));
    }

    #[test]
    fn register_fills_stub_with_its_handle() {
        let mut table = DefinitionTable::new();
        let id = table.register_stub(field("x", "f_x_1")).unwrap();
        let again = table.register(field("x", "f_x_7")).unwrap();
        assert_eq!(id, again);
        assert!(table.get(id).unwrap().valid);
        assert_eq!(table.get(id).unwrap().handle, "f_x_1");
    }

    #[test]
    fn overloads_have_distinct_identities() {
        let mut table = DefinitionTable::new();
        let a = table
            .register(DefinitionVariable::new(MemberKind::Method, "Demo.M", "Add(int,int)", "m_1"))
            .unwrap();
        let b = table
            .register(DefinitionVariable::new(MemberKind::Method, "Demo.M", "Add(long,long)", "m_2"))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn active_lookup_is_innermost_first() {
        let mut table = DefinitionTable::new();
        let outer = table.push_frame();
        let scope = table.frame_scope();
        let a = table
            .register(DefinitionVariable::new(MemberKind::LocalVariable, scope, "i", "l_i_1").with_ordinal(0))
            .unwrap();
        table.push_active(a);

        let inner = table.push_frame();
        let scope = table.frame_scope();
        let b = table
            .register(DefinitionVariable::new(MemberKind::LocalVariable, scope, "i", "l_i_2").with_ordinal(1))
            .unwrap();
        table.push_active(b);
        assert_eq!(table.lookup_active(MemberKind::LocalVariable, "i").unwrap().ordinal, Some(1));

        table.restore(inner);
        assert_eq!(table.lookup_active(MemberKind::LocalVariable, "i").unwrap().ordinal, Some(0));
        table.restore(outer);
        assert!(table.lookup_active(MemberKind::LocalVariable, "i").is_none());
        // the ledger keeps both
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn skipping_marks_only_the_innermost_entry() {
        let mut table = DefinitionTable::new();
        table.push_frame();
        let scope = table.frame_scope();
        let a = table
            .register(DefinitionVariable::new(MemberKind::LocalVariable, scope, "v", "l_v_1").with_ordinal(0))
            .unwrap();
        table.push_active(a);
        table.push_frame();
        let scope = table.frame_scope();
        let b = table
            .register(DefinitionVariable::new(MemberKind::LocalVariable, scope, "v", "l_v_2").with_ordinal(1))
            .unwrap();
        table.push_active(b);

        assert!(table.skip_active(MemberKind::LocalVariable, "v"));
        assert!(table.get(b).unwrap().skipped);
        assert!(!table.get(a).unwrap().skipped);
        assert!(!table.skip_active(MemberKind::LocalVariable, "w"));
    }

    #[test]
    fn sibling_frames_get_distinct_scopes() {
        let mut table = DefinitionTable::new();
        let first = {
            let scope = table.enter_scope();
            scope.frame_scope()
        };
        let second = {
            let scope = table.enter_scope();
            scope.frame_scope()
        };
        assert_ne!(first, second);
    }

    #[test]
    fn last_of_kind_tracks_current_context() {
        let mut table = DefinitionTable::new();
        assert!(table.get_last_of_kind(MemberKind::Method).is_none());

        let ty = table
            .register(DefinitionVariable::new(MemberKind::Type, "Demo", "Calc", "t_Calc_1"))
            .unwrap();
        let m = table
            .register(DefinitionVariable::new(MemberKind::Method, "Demo.Calc", "Run()", "m_Run_2"))
            .unwrap();

        let mut scope = table.enter_scope();
        scope.push_active(ty);
        {
            let mut inner = scope.enter_scope();
            inner.push_active(m);
            assert_eq!(inner.get_last_of_kind(MemberKind::Method).unwrap().handle, "m_Run_2");
            assert_eq!(inner.get_last_of_kind(MemberKind::Type).unwrap().handle, "t_Calc_1");
        }
        assert!(scope.get_last_of_kind(MemberKind::Method).is_none());
        assert_eq!(scope.get_last_of_kind(MemberKind::Type).unwrap().handle, "t_Calc_1");
    }

    #[test]
    fn guard_restores_on_early_exit() {
        fn fails(table: &mut DefinitionTable) -> Result<()> {
            let mut scope = table.enter_scope();
            let id = scope.register(DefinitionVariable::new(MemberKind::Method, "T", "M()", "m_1"))?;
            scope.push_active(id);
            Err(LoweringError::unsupported("lock statement", Span::default()))
        }

        let mut table = DefinitionTable::new();
        let before = table.mark();
        assert!(fails(&mut table).is_err());
        assert_eq!(table.mark(), before);
        assert!(table.get_last_of_kind(MemberKind::Method).is_none());
    }
}
