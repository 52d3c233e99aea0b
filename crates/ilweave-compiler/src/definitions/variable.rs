//! A single entry of the definition ledger.

use std::fmt;

use ilweave_core::{MemberKind, Span};

/// Index of an entry in the definition ledger.
///
/// Ids are handed out in registration order and never reused, so they stay
/// valid for the whole lowering of a unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DefId(pub(crate) u32);

impl DefId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def{}", self.0)
    }
}

/// A declaration and the handle its generated artifact is reachable under.
///
/// Equality is by identity `(kind, scope, name)`; the handle is not part of
/// it.
#[derive(Debug, Clone)]
pub struct DefinitionVariable {
    pub kind: MemberKind,
    /// Member name; for methods this includes the parameter signature.
    pub name: String,
    /// Declaring scope: namespace, declaring type, method handle or local
    /// frame.
    pub scope: String,
    /// Name of the generated artifact in the output.
    pub handle: String,
    /// `false` while the entry is a forward stub.
    pub valid: bool,
    /// Argument or local slot for parameters and locals.
    pub ordinal: Option<u16>,
    /// Set on a local whose initializer was skipped as unsupported.
    pub skipped: bool,
    pub span: Span,
}

impl DefinitionVariable {
    pub fn new(
        kind: MemberKind,
        scope: impl Into<String>,
        name: impl Into<String>,
        handle: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            scope: scope.into(),
            handle: handle.into(),
            valid: true,
            ordinal: None,
            skipped: false,
            span: Span::default(),
        }
    }

    pub fn with_ordinal(mut self, ordinal: u16) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn is_stub(&self) -> bool {
        !self.valid
    }

    /// Whether `other` names the same declaration.
    pub fn same_identity(&self, kind: MemberKind, scope: &str, name: &str) -> bool {
        self.kind == kind && self.scope == scope && self.name == name
    }

    /// `kind scope::name`, used in error messages.
    pub fn identity(&self) -> String {
        format!("{} {}::{}", self.kind, self.scope, self.name)
    }
}

impl PartialEq for DefinitionVariable {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other.kind, &other.scope, &other.name)
    }
}

impl Eq for DefinitionVariable {}

impl fmt::Display for DefinitionVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.identity(), self.handle)?;
        if self.is_stub() {
            f.write_str(" (forward)")?;
        }
        Ok(())
    }
}
