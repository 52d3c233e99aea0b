//! The lowering output: an ordered log of builder calls.
//!
//! Every declaration visited produces one or more [`BuilderCall`]s; method
//! bodies are attached with [`BuilderCall::SetBody`]. The log is the primary
//! artifact. [`LoweredUnit::render`] turns it into a textual program in the
//! builder library's style, together with a table mapping source spans to
//! output lines.

use std::fmt::Write as _;

use ilweave_core::{ConstantValue, Diagnostic, MemberKind, RefKind, Span};

use crate::attributes::{FieldAttributes, MethodAttributes, TypeAttributes};
use crate::bytecode::{Instruction, MethodBody, Operand};
use crate::type_resolver::TypeExpr;

/// One call against the target builder library.
#[derive(Debug, Clone, PartialEq)]
pub enum BuilderCall {
    /// A declaration referenced before it was visited.
    ForwardDeclare {
        kind: MemberKind,
        handle: String,
        scope: String,
        name: String,
    },
    DefineType {
        handle: String,
        namespace: String,
        name: String,
        attributes: TypeAttributes,
        base: Option<TypeExpr>,
        /// Handle of the declaring type for nested types.
        declaring: Option<String>,
    },
    AddInterface {
        ty: String,
        interface: TypeExpr,
    },
    DefineField {
        handle: String,
        declaring: String,
        name: String,
        ty: TypeExpr,
        attributes: FieldAttributes,
        constant: Option<ConstantValue>,
    },
    DefineMethod {
        handle: String,
        declaring: String,
        name: String,
        attributes: MethodAttributes,
        return_type: TypeExpr,
    },
    DefineParameter {
        method: String,
        /// 1-based, as in the builder library.
        sequence: u16,
        name: String,
        ty: TypeExpr,
        ref_kind: RefKind,
    },
    DefineProperty {
        handle: String,
        declaring: String,
        name: String,
        ty: TypeExpr,
        getter: Option<String>,
        setter: Option<String>,
    },
    DefineEvent {
        handle: String,
        declaring: String,
        name: String,
        ty: TypeExpr,
        add: Option<String>,
        remove: Option<String>,
    },
    SetBody {
        method: String,
        body: MethodBody,
    },
    /// A recovered gap or other note, placed where it happened.
    Comment {
        text: String,
        span: Span,
    },
}

impl BuilderCall {
    /// Handle of the artifact this call defines, if any.
    pub fn handle(&self) -> Option<&str> {
        match self {
            BuilderCall::ForwardDeclare { handle, .. }
            | BuilderCall::DefineType { handle, .. }
            | BuilderCall::DefineField { handle, .. }
            | BuilderCall::DefineMethod { handle, .. }
            | BuilderCall::DefineProperty { handle, .. }
            | BuilderCall::DefineEvent { handle, .. } => Some(handle),
            _ => None,
        }
    }
}

/// Result of lowering a compilation unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoweredUnit {
    pub module_name: String,
    pub calls: Vec<BuilderCall>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A source span and the output line its first instruction landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanMapping {
    pub span: Span,
    /// 1-based line in [`RenderedProgram::text`].
    pub line: usize,
}

/// Textual form of a [`LoweredUnit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedProgram {
    pub text: String,
    pub mappings: Vec<SpanMapping>,
}

impl RenderedProgram {
    /// Output lines produced from `span`.
    pub fn lines_for(&self, span: Span) -> impl Iterator<Item = usize> + '_ {
        self.mappings
            .iter()
            .filter(move |m| m.span == span)
            .map(|m| m.line)
    }
}

impl LoweredUnit {
    /// Every body set in the unit, by method handle.
    pub fn bodies(&self) -> impl Iterator<Item = (&str, &MethodBody)> {
        self.calls.iter().filter_map(|call| match call {
            BuilderCall::SetBody { method, body } => Some((method.as_str(), body)),
            _ => None,
        })
    }

    /// The body of the method with handle `method`.
    pub fn body(&self, method: &str) -> Option<&MethodBody> {
        self.bodies().find(|(m, _)| *m == method).map(|(_, b)| b)
    }

    /// Handle of the first defined method called `name`.
    pub fn method_handle(&self, name: &str) -> Option<&str> {
        self.calls.iter().find_map(|call| match call {
            BuilderCall::DefineMethod { handle, name: n, .. } if n == name => Some(handle.as_str()),
            _ => None,
        })
    }

    /// Handle of the first defined type called `name`.
    pub fn type_handle(&self, name: &str) -> Option<&str> {
        self.calls.iter().find_map(|call| match call {
            BuilderCall::DefineType { handle, name: n, .. } if n == name => Some(handle.as_str()),
            _ => None,
        })
    }

    /// Render the builder-call log as a program.
    pub fn render(&self) -> RenderedProgram {
        let mut out = Renderer::default();
        out.line(format!("var module = ModuleDefinition.CreateModule(\"{}\");", self.module_name));
        for diagnostic in &self.diagnostics {
            out.line(format!("// {diagnostic}"));
        }
        for call in &self.calls {
            out.call(call);
        }
        RenderedProgram {
            text: out.text,
            mappings: out.mappings,
        }
    }
}

#[derive(Default)]
struct Renderer {
    text: String,
    line: usize,
    mappings: Vec<SpanMapping>,
}

fn quoted(s: &str) -> String {
    format!("{s:?}")
}

fn opt(handle: &Option<String>) -> &str {
    handle.as_deref().unwrap_or("null")
}

impl Renderer {
    fn line(&mut self, text: impl AsRef<str>) {
        self.line += 1;
        let _ = writeln!(self.text, "{}", text.as_ref());
    }

    fn call(&mut self, call: &BuilderCall) {
        match call {
            BuilderCall::ForwardDeclare {
                kind,
                handle,
                scope,
                name,
            } => self.line(format!(
                "var {handle} = Forward({}, {}, {});",
                quoted(kind.as_str()),
                quoted(scope),
                quoted(name)
            )),
            BuilderCall::DefineType {
                handle,
                namespace,
                name,
                attributes,
                base,
                declaring,
            } => {
                let base = base.as_ref().map(|b| b.to_string()).unwrap_or_else(|| "null".into());
                self.line(format!(
                    "{handle} = module.DefineType({}, {}, {attributes}, {base});",
                    quoted(namespace),
                    quoted(name)
                ));
                if let Some(outer) = declaring {
                    self.line(format!("{outer}.NestedTypes.Add({handle});"));
                }
            }
            BuilderCall::AddInterface { ty, interface } => {
                self.line(format!("{ty}.Interfaces.Add({interface});"))
            }
            BuilderCall::DefineField {
                handle,
                declaring,
                name,
                ty,
                attributes,
                constant,
            } => {
                self.line(format!(
                    "{handle} = {declaring}.DefineField({}, {ty}, {attributes});",
                    quoted(name)
                ));
                if let Some(value) = constant {
                    self.line(format!("{handle}.Constant = {value};"));
                }
            }
            BuilderCall::DefineMethod {
                handle,
                declaring,
                name,
                attributes,
                return_type,
            } => self.line(format!(
                "{handle} = {declaring}.DefineMethod({}, {attributes}, {return_type});",
                quoted(name)
            )),
            BuilderCall::DefineParameter {
                method,
                sequence,
                name,
                ty,
                ref_kind,
            } => {
                let ty = match ref_kind {
                    RefKind::None => ty.to_string(),
                    _ => format!("{ty}.MakeByReferenceType()"),
                };
                self.line(format!("{method}.DefineParameter({sequence}, {}, {ty});", quoted(name)))
            }
            BuilderCall::DefineProperty {
                handle,
                declaring,
                name,
                ty,
                getter,
                setter,
            } => self.line(format!(
                "{handle} = {declaring}.DefineProperty({}, {ty}, {}, {});",
                quoted(name),
                opt(getter),
                opt(setter)
            )),
            BuilderCall::DefineEvent {
                handle,
                declaring,
                name,
                ty,
                add,
                remove,
            } => self.line(format!(
                "{handle} = {declaring}.DefineEvent({}, {ty}, {}, {});",
                quoted(name),
                opt(add),
                opt(remove)
            )),
            BuilderCall::SetBody { method, body } => self.body(method, body),
            BuilderCall::Comment { text, span } => self.line(format!("// {span}: {text}")),
        }
    }

    fn body(&mut self, method: &str, body: &MethodBody) {
        self.line(format!("var il_{method} = {method}.Body.GetILProcessor();"));
        for local in &body.locals {
            self.line(format!(
                "{method}.Body.Variables.Add(new VariableDefinition({})); // {}",
                local.ty, local.name
            ));
        }
        for (pos, instr) in body.instructions.iter().enumerate() {
            if let Some(span) = instr.span
                && !instr.is_pseudo()
            {
                self.mappings.push(SpanMapping {
                    span,
                    line: self.line + 1,
                });
            }
            let text = self.instruction(method, body, pos, instr);
            self.line(text);
        }
        for handler in &body.handlers {
            let catch_type = handler
                .catch_type
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "null".into());
            self.line(format!(
                "{method}.Body.ExceptionHandlers.Add(Handler({}, {}, {}, {}, {}, {catch_type}));",
                handler.kind,
                handler.try_start,
                handler.try_end,
                handler.handler_start,
                handler.handler_end
            ));
        }
    }

    fn instruction(&self, method: &str, body: &MethodBody, pos: usize, instr: &Instruction) -> String {
        if instr.is_comment() {
            return instr.to_string();
        }
        if instr.is_label() {
            return format!("// IL_{pos:04}:");
        }
        let op = format!("OpCodes.{:?}", instr.opcode);
        match &instr.operand {
            Operand::None => format!("il_{method}.Emit({op});"),
            Operand::Label(label) => {
                let target = body.position_of(*label).unwrap_or_default();
                format!("il_{method}.Emit({op}, IL_{target:04});")
            }
            other => format!("il_{method}.Emit({op}, {other});"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::OpCode;
    use crate::emit::BodyEmitter;

    fn unit_with_body() -> LoweredUnit {
        let mut emitter = BodyEmitter::new("m_Run_2", false);
        emitter.set_span(Span::new(3, 5, 4));
        emitter.emit_i32(1);
        emitter.emit(OpCode::Pop);
        emitter.emit(OpCode::Ret);
        let body = emitter.finish().unwrap();

        LoweredUnit {
            module_name: "Demo".into(),
            calls: vec![
                BuilderCall::DefineType {
                    handle: "t_App_1".into(),
                    namespace: "Demo".into(),
                    name: "App".into(),
                    attributes: TypeAttributes::PUBLIC,
                    base: Some(TypeExpr::TypeSystem("Object")),
                    declaring: None,
                },
                BuilderCall::DefineMethod {
                    handle: "m_Run_2".into(),
                    declaring: "t_App_1".into(),
                    name: "Run".into(),
                    attributes: MethodAttributes::PUBLIC | MethodAttributes::STATIC,
                    return_type: TypeExpr::TypeSystem("Void"),
                },
                BuilderCall::SetBody {
                    method: "m_Run_2".into(),
                    body,
                },
            ],
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn render_emits_one_line_per_instruction() {
        let unit = unit_with_body();
        let rendered = unit.render();
        let lines: Vec<&str> = rendered.text.lines().collect();
        assert_eq!(lines[0], "var module = ModuleDefinition.CreateModule(\"Demo\");");
        assert_eq!(
            lines[1],
            "t_App_1 = module.DefineType(\"Demo\", \"App\", Public, TypeSystem.Object);"
        );
        assert!(lines.contains(&"il_m_Run_2.Emit(OpCodes.Ldc_I4_1);"));
        assert!(lines.contains(&"il_m_Run_2.Emit(OpCodes.Ret);"));
    }

    #[test]
    fn span_mappings_point_at_rendered_lines() {
        let unit = unit_with_body();
        let rendered = unit.render();
        let lines: Vec<&str> = rendered.text.lines().collect();
        let mapped: Vec<usize> = rendered.lines_for(Span::new(3, 5, 4)).collect();
        assert_eq!(mapped.len(), 3);
        assert_eq!(lines[mapped[0] - 1], "il_m_Run_2.Emit(OpCodes.Ldc_I4_1);");
    }

    #[test]
    fn lookup_helpers() {
        let unit = unit_with_body();
        assert_eq!(unit.type_handle("App"), Some("t_App_1"));
        assert_eq!(unit.method_handle("Run"), Some("m_Run_2"));
        assert!(unit.body("m_Run_2").is_some());
        assert!(unit.body("m_Other_9").is_none());
    }
}
