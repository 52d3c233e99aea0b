//! Literal and `default` expressions.

use ilweave_core::{ConstantValue, LoweringError, PrimitiveKind, SemanticType};
use ilweave_syntax::ast::{DefaultExpr, LiteralExpr, LiteralKind};

use crate::bytecode::OpCode;

use super::ExprCompiler;

type Result<T> = std::result::Result<T, LoweringError>;

/// Load a literal. Integer literals take the width of their static type, so
/// `5L` loads with `ldc.i8` and `5` with the short `ldc.i4.5`.
pub fn compile_literal(compiler: &mut ExprCompiler<'_, '_>, lit: &LiteralExpr<'_>) -> Result<()> {
    let ty = compiler.ctx().type_info(lit.id, lit.span)?.ty;
    let value = match lit.kind {
        LiteralKind::Int(v) => ConstantValue::Int(v),
        LiteralKind::UInt(v) => ConstantValue::UInt(v),
        LiteralKind::Float(v) => ConstantValue::Float32(v),
        LiteralKind::Double(v) => ConstantValue::Float64(v),
        LiteralKind::Bool(b) => ConstantValue::Bool(b),
        LiteralKind::Char(c) => ConstantValue::Char(c),
        LiteralKind::String(s) => ConstantValue::String(s.to_string()),
        LiteralKind::Null => ConstantValue::Null,
    };
    compiler.emit_constant(&value, &ty);
    Ok(())
}

/// The zero value of the expression's type.
pub fn compile_default(compiler: &mut ExprCompiler<'_, '_>, default: &DefaultExpr) -> Result<()> {
    let span = default.span;
    let ty = compiler.ctx().type_info(default.id, span)?.ty;

    if let Some(kind) = ty.numeric_kind() {
        let emitter = compiler.emitter();
        match kind {
            PrimitiveKind::Int64 | PrimitiveKind::UInt64 => {
                emitter.emit_i64(0);
            }
            PrimitiveKind::Float32 => {
                emitter.emit_f32(0.0);
            }
            PrimitiveKind::Float64 => {
                emitter.emit_f64(0.0);
            }
            PrimitiveKind::IntPtr => {
                emitter.emit_i32(0);
                emitter.emit(OpCode::Conv_I);
            }
            PrimitiveKind::UIntPtr => {
                emitter.emit_i32(0);
                emitter.emit(OpCode::Conv_U);
            }
            _ => {
                emitter.emit_i32(0);
            }
        }
        return Ok(());
    }

    match &ty {
        SemanticType::Pointer(_) | SemanticType::FunctionPointer { .. } => {
            let emitter = compiler.emitter();
            emitter.emit_i32(0);
            emitter.emit(OpCode::Conv_U);
        }
        t if t.is_value_type() || t.is_type_parameter() => {
            let resolved = compiler.resolve(t, span)?;
            let temp = compiler.temp_of("default", resolved.expr.clone());
            let emitter = compiler.emitter();
            emitter.ldloca(temp);
            emitter.emit_type(OpCode::Initobj, resolved.expr);
            emitter.ldloc(temp);
        }
        _ => {
            compiler.emitter().emit_null();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::testing::body_listing;
    use bumpalo::Bump;
    use ilweave_core::{PrimitiveKind, SemanticType, TypeKind};
    use ilweave_syntax::AstBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn literal_widths_follow_static_type() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let small = b.int(5);
        let big = b.int(1000);
        let long = b.long(5);
        let text = b.string("hi");
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            for e in [small, big, long, text] {
                c.lower_discard(e)?;
            }
            Ok(())
        });
        assert_eq!(
            listing,
            vec![
                "ldc.i4.5", "pop", "ldc.i4 1000", "pop", "ldc.i8 5", "pop", "ldstr \"hi\"", "pop", "ret"
            ]
        );
    }

    #[test]
    fn null_converted_to_reference_emits_ldnull_only() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let null = b.null(SemanticType::STRING);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| c.lower_discard(null));
        assert_eq!(listing, vec!["ldnull", "pop", "ret"]);
    }

    #[test]
    fn default_of_struct_uses_initobj_temp() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let point = b.imported_type("Demo", "Point", TypeKind::Struct);
        let d = b.default_of(point);
        let model = b.finish();

        let listing = body_listing(&model, false, |c| c.lower_discard(d));
        assert_eq!(
            listing,
            vec![
                "ldloca default",
                "initobj Import(\"Demo.Point\")",
                "ldloc default",
                "pop",
                "ret"
            ]
        );
    }

    #[test]
    fn default_of_primitives_and_references() {
        let arena = Bump::new();
        let mut b = AstBuilder::new(&arena);
        let l = b.default_of(SemanticType::INT64);
        let f = b.default_of(SemanticType::Primitive(PrimitiveKind::Float32));
        let s = b.default_of(SemanticType::STRING);
        let p = b.default_of(SemanticType::pointer_to(SemanticType::INT32));
        let model = b.finish();

        let listing = body_listing(&model, false, |c| {
            for e in [l, f, s, p] {
                c.lower_discard(e)?;
            }
            Ok(())
        });
        assert_eq!(
            listing,
            vec![
                "ldc.i8 0", "pop", "ldc.r4 0", "pop", "ldnull", "pop", "ldc.i4.0", "conv.u", "pop", "ret"
            ]
        );
    }
}
