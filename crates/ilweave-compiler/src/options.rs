//! Configuration for a lowering run.

/// Options passed to [`Lowerer::new`](crate::Lowerer::new).
///
/// ```
/// use ilweave_compiler::LoweringOptions;
///
/// let options = LoweringOptions::new("Demo").with_spans(false).fatal_gaps();
/// assert_eq!(options.module_name, "Demo");
/// assert!(!options.record_spans);
/// assert!(options.gaps_are_fatal);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweringOptions {
    /// Name of the generated module, used in the rendered program.
    pub module_name: String,
    /// Attach source spans to emitted instructions.
    pub record_spans: bool,
    /// Emit a comment marker in place of every recovered gap.
    pub inline_diagnostics: bool,
    /// Treat unsupported constructs as fatal instead of skipping them.
    pub gaps_are_fatal: bool,
    /// Run the stack verifier on every finished body.
    pub verify_bodies: bool,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            module_name: "Module".to_string(),
            record_spans: true,
            inline_diagnostics: true,
            gaps_are_fatal: false,
            verify_bodies: true,
        }
    }
}

impl LoweringOptions {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            ..Self::default()
        }
    }

    pub fn with_spans(mut self, record: bool) -> Self {
        self.record_spans = record;
        self
    }

    pub fn with_inline_diagnostics(mut self, inline: bool) -> Self {
        self.inline_diagnostics = inline;
        self
    }

    pub fn fatal_gaps(mut self) -> Self {
        self.gaps_are_fatal = true;
        self
    }

    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify_bodies = verify;
        self
    }
}
