//! Switch statements.
//!
//! The selector is evaluated once into a synthetic local. A chain of
//! compare-and-branch tests, one per case label, picks the section; the
//! sections follow the chain in source order, each behind its own label.

use ilweave_core::SemanticType;
use ilweave_syntax::ast::{CaseLabel, Expr, SwitchStmt};

use crate::bytecode::{Label, OpCode};
use crate::context::LoweringContext;
use crate::type_resolver::well_known;

use super::{Result, StmtCompiler};

impl<'a, 'm> StmtCompiler<'a, 'm> {
    /// Compile a switch statement.
    ///
    /// Layout:
    /// ```text
    /// [selector]
    /// stloc switch.value
    /// ldloc switch.value; [case value]; ceq; brtrue case    (per case label)
    /// br default      (br end without a default label)
    /// [case]
    /// [section statements]
    /// ...
    /// [end]           <- break
    /// ```
    pub fn compile_switch(&mut self, stmt: &SwitchStmt<'_>) -> Result<()> {
        let span = stmt.span;
        let selector_ty = {
            let mut exprs = self.expr_compiler();
            let ty = exprs.converted_type(stmt.selector)?;
            exprs.lower(stmt.selector)?;
            ty
        };
        let value = self.expr_compiler().temp("switch.value", &selector_ty, span)?;
        self.emitter.stloc(value);

        let end = self.emitter.new_label("end");
        let mut default = None;
        let mut section_labels = Vec::with_capacity(stmt.sections.len());
        for section in stmt.sections {
            let label = self.emitter.new_label("case");
            for case in section.labels {
                match case {
                    CaseLabel::Case(expr) => self.emit_case_test(value, &selector_ty, expr, label)?,
                    CaseLabel::Default(_) => default = Some(label),
                }
            }
            section_labels.push(label);
        }
        self.emitter.emit_branch(OpCode::Br, default.unwrap_or(end));

        self.emitter.enter_switch(end);
        let result = stmt
            .sections
            .iter()
            .zip(section_labels)
            .try_for_each(|(section, label)| {
                self.place(label)?;
                self.scoped(|this| {
                    for inner in section.stmts {
                        this.compile(inner)?;
                    }
                    Ok(())
                })
            });
        self.emitter.exit_breakable();
        result?;
        self.place(end)
    }

    /// `selector == value` followed by a branch to `target` when it holds.
    fn emit_case_test(&mut self, selector: u16, selector_ty: &SemanticType, value: &Expr<'_>, target: Label) -> Result<()> {
        self.emitter.ldloc(selector);
        self.expr_compiler().lower(value)?;
        if selector_ty.is_string() {
            let equality = LoweringContext::runtime_method(
                well_known::string(),
                "op_Equality",
                vec![well_known::string(), well_known::string()],
                Some(well_known::boolean()),
                false,
            );
            self.emitter.emit_method(OpCode::Call, equality);
        } else {
            self.emitter.emit(OpCode::Ceq);
        }
        self.emitter.emit_branch(OpCode::Brtrue, target);
        Ok(())
    }
}
