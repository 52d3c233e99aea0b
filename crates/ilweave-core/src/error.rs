//! Error and diagnostic types for the lowering engine.
//!
//! ## Taxonomy
//!
//! ```text
//! LoweringError
//! ├── Unsupported          - expected gap: recovered locally, siblings continue
//! └── everything else      - internal/fatal: aborts lowering of the whole unit
//! ```
//!
//! Gaps are turned into [`Diagnostic`]s (and inline comments in the output) by
//! the statement and declaration lowering loops. Fatal errors propagate with
//! `?` up to the unit entry point, which wraps them in a [`LoweringFailure`]
//! together with the diagnostics collected so far.

use std::fmt;

use thiserror::Error;

use crate::Span;

/// Errors raised while lowering a typed tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoweringError {
    /// A syntax kind the translator does not handle. Not fatal.
    #[error("at {span}: unsupported {construct}")]
    Unsupported {
        /// Human readable name of the construct (e.g. "lock statement").
        construct: String,
        span: Span,
    },

    /// The semantic model had no symbol/type for a node that needs one.
    #[error("at {span}: unresolved {what}")]
    UnresolvedSymbol { what: String, span: Span },

    /// A definition that must exist (or be stubbed) was not found.
    #[error("at {span}: no definition for {kind} '{name}' in '{scope}'")]
    MissingDefinition {
        kind: String,
        name: String,
        scope: String,
        span: Span,
    },

    /// An ambient context (current method, current type, enclosing loop) was
    /// requested outside of the scope that provides it.
    #[error("at {span}: no enclosing {kind}")]
    AmbientContextMissing { kind: String, span: Span },

    /// No emission rule exists for this operator/operand combination.
    #[error("at {span}: no rule for operator '{op}' on '{left}' and '{right}'")]
    UnsupportedOperator {
        op: String,
        left: String,
        right: String,
        span: Span,
    },

    /// No emission rule exists for this conversion.
    #[error("at {span}: no rule for {kind} conversion from '{from}' to '{to}'")]
    UnsupportedConversion {
        kind: String,
        from: String,
        to: String,
        span: Span,
    },

    /// Constructor lookup produced more than one candidate.
    #[error("at {span}: ambiguous constructor for '{type_name}' ({candidates} candidates)")]
    AmbiguousConstructor {
        type_name: String,
        candidates: usize,
        span: Span,
    },

    /// The same identity was registered twice with different handles, or a
    /// forward stub was filled twice.
    #[error("at {span}: duplicate definition of {kind} '{name}'")]
    DuplicateDefinition { kind: String, name: String, span: Span },

    /// Two different identities hashed to the same definition key.
    #[error("definition key collision between '{existing}' and '{incoming}'")]
    IdentityCollision { existing: String, incoming: String },

    /// `break`/`continue` outside of a construct that accepts it.
    #[error("at {span}: {message}")]
    InvalidJump { message: String, span: Span },

    /// A branch or exception region refers to a label that was never placed.
    #[error("label referenced but never placed in method '{method}'")]
    UnplacedLabel { method: String },

    /// Catch-all for internal invariants.
    #[error("at {span}: {message}")]
    Other { message: String, span: Span },
}

impl LoweringError {
    /// Shorthand for an expected gap.
    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        LoweringError::Unsupported {
            construct: construct.into(),
            span,
        }
    }

    /// Shorthand for an internal error.
    pub fn other(message: impl Into<String>, span: Span) -> Self {
        LoweringError::Other {
            message: message.into(),
            span,
        }
    }

    /// Whether this is an expected gap rather than a fatal error.
    pub fn is_gap(&self) -> bool {
        matches!(self, LoweringError::Unsupported { .. })
    }

    /// The source location of this error, when it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            LoweringError::Unsupported { span, .. }
            | LoweringError::UnresolvedSymbol { span, .. }
            | LoweringError::MissingDefinition { span, .. }
            | LoweringError::AmbientContextMissing { span, .. }
            | LoweringError::UnsupportedOperator { span, .. }
            | LoweringError::UnsupportedConversion { span, .. }
            | LoweringError::AmbiguousConstructor { span, .. }
            | LoweringError::DuplicateDefinition { span, .. }
            | LoweringError::InvalidJump { span, .. }
            | LoweringError::Other { span, .. } => Some(*span),
            LoweringError::IdentityCollision { .. } | LoweringError::UnplacedLabel { .. } => None,
        }
    }
}

/// Severity of a collected diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// A message reported while lowering, kept in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity,
            message: message.into(),
            span,
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Warning, message, span)
    }

    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Error, message, span)
    }

    /// Build the diagnostic that records a recovered gap.
    pub fn from_gap(error: &LoweringError) -> Self {
        let span = error.span().unwrap_or_default();
        Self::warning(error.to_string(), span)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.severity, self.span, self.message)
    }
}

/// A fatal error together with every diagnostic collected before it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct LoweringFailure {
    #[source]
    pub error: LoweringError,
    pub diagnostics: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unsupported_is_a_gap() {
        let span = Span::new(3, 4, 5);
        assert!(LoweringError::unsupported("lock statement", span).is_gap());
        assert!(!LoweringError::other("boom", span).is_gap());
        assert!(
            !LoweringError::UnplacedLabel {
                method: "M".into()
            }
            .is_gap()
        );
    }

    #[test]
    fn gap_diagnostic_keeps_span_and_message() {
        let err = LoweringError::unsupported("yield statement", Span::new(9, 2, 5));
        let diag = Diagnostic::from_gap(&err);
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.span, Span::new(9, 2, 5));
        assert_eq!(diag.message, "at 9:2: unsupported yield statement");
    }

    #[test]
    fn operator_error_message() {
        let err = LoweringError::UnsupportedOperator {
            op: "<<".into(),
            left: "string".into(),
            right: "int".into(),
            span: Span::new(1, 1, 1),
        };
        assert_eq!(
            err.to_string(),
            "at 1:1: no rule for operator '<<' on 'string' and 'int'"
        );
    }
}
