//! End-to-end tests: whole compilation units through the lowering pipeline.
//!
//! Every unit is built with the [`AstBuilder`], lowered with [`lower`] and
//! checked on the resulting builder-call log.

use bumpalo::Bump;
use ilweave::prelude::*;
use ilweave::ilweave_compiler::bytecode::verify_body;
use ilweave::ilweave_compiler::{DeclLowerer, LoweringContext};
use ilweave::ilweave_core::{MemberKind, NamedType};
use ilweave::ilweave_syntax::ast::{BinaryOp, PostfixOp};
use pretty_assertions::assert_eq;

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn lower_ok(model: &SemanticTable, unit: &CompilationUnit<'_>) -> LoweredUnit {
    init_test_logging();
    let options = LoweringOptions::new("Demo").with_verification(true);
    match lower(model, unit, options) {
        Ok(lowered) => lowered,
        Err(failure) => panic!("lowering failed: {failure} ({:?})", failure.diagnostics),
    }
}

fn listing_of(lowered: &LoweredUnit, method: &str) -> Vec<String> {
    let handle = lowered
        .method_handle(method)
        .unwrap_or_else(|| panic!("no method {method}"));
    let body = lowered
        .body(handle)
        .unwrap_or_else(|| panic!("no body for {method}"));
    verify_body(body).unwrap();
    body.listing()
}

// =============================================================================
// Control flow
// =============================================================================

#[test]
fn test_if_else_calls_each_arm() {
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let app = b.source_type("Demo", "App", TypeKind::Class);
    let class = b.type_symbol(app.clone(), None);
    let run = b.method_symbol(&app, "Run", &[("x", SemanticType::INT32)], SemanticType::VOID, true);
    let a = b.method_symbol(&app, "A", &[], SemanticType::VOID, true);
    let bm = b.method_symbol(&app, "B", &[], SemanticType::VOID, true);
    let x = b.param_symbols(run)[0];

    let read = b.ident(x);
    let zero = b.int(0);
    let cond = b.binary(BinaryOp::Gt, read, zero, SemanticType::BOOL);
    let call_a = b.call(a, None, &[]);
    let call_a = b.expr_stmt(call_a);
    let then_block = b.block(&[call_a]);
    let call_b = b.call(bm, None, &[]);
    let call_b = b.expr_stmt(call_b);
    let else_block = b.block(&[call_b]);
    let stmt = b.if_(cond, then_block, Some(else_block));
    let body = b.block_of(&[stmt]);
    let empty_a = b.block_of(&[]);
    let empty_b = b.block_of(&[]);
    let members = [
        b.method_decl(run, &[x], Some(body)),
        b.method_decl(a, &[], Some(empty_a)),
        b.method_decl(bm, &[], Some(empty_b)),
    ];
    let decl = b.type_decl(class, TypeDeclKind::Class, &members);
    let unit = b.unit(&[decl]);
    let model = b.finish();

    let lowered = lower_ok(&model, &unit);
    let a = lowered.method_handle("A").unwrap();
    let bm = lowered.method_handle("B").unwrap();
    assert_eq!(
        listing_of(&lowered, "Run"),
        vec![
            "ldarg A_0".to_string(),
            "ldc.i4.0".to_string(),
            "cgt".to_string(),
            "brfalse else".to_string(),
            format!("call {a}"),
            "br end".to_string(),
            "[else]".to_string(),
            format!("call {bm}"),
            "[end]".to_string(),
            "ret".to_string(),
        ]
    );
    assert!(lowered.diagnostics.is_empty());
}

#[test]
fn test_for_loop_tests_at_the_bottom() {
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let app = b.source_type("Demo", "App", TypeKind::Class);
    let class = b.type_symbol(app.clone(), None);
    let run = b.method_symbol(&app, "Run", &[("n", SemanticType::INT32)], SemanticType::VOID, true);
    let n = b.param_symbols(run)[0];
    let i = b.local_symbol("i", SemanticType::INT32);

    let zero = b.int(0);
    let read_i = b.ident(i);
    let read_n = b.ident(n);
    let cond = b.binary(BinaryOp::Lt, read_i, read_n, SemanticType::BOOL);
    let read_i = b.ident(i);
    let inc = b.postfix(PostfixOp::PostInc, read_i);
    let empty = b.empty_stmt();
    let stmt = b.for_local(i, zero, Some(cond), &[inc], empty);
    let body = b.block_of(&[stmt]);
    let members = [b.method_decl(run, &[n], Some(body))];
    let decl = b.type_decl(class, TypeDeclKind::Class, &members);
    let unit = b.unit(&[decl]);
    let model = b.finish();

    let lowered = lower_ok(&model, &unit);
    assert_eq!(
        listing_of(&lowered, "Run"),
        vec![
            "ldc.i4.0",
            "stloc i",
            "br test",
            "[body]",
            "ldloc i",
            "ldc.i4.1",
            "add",
            "stloc i",
            "[test]",
            "ldloc i",
            "ldarg A_0",
            "clt",
            "brtrue body",
            "ret"
        ]
    );
}

#[test]
fn test_switch_breaks_to_the_end() {
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let app = b.source_type("Demo", "App", TypeKind::Class);
    let class = b.type_symbol(app.clone(), None);
    let run = b.method_symbol(&app, "Run", &[("v", SemanticType::INT32)], SemanticType::VOID, true);
    let v = b.param_symbols(run)[0];
    let lib = b.imported_type("Demo", "Lib", TypeKind::Class);
    let a = b.method_symbol(&lib, "A", &[], SemanticType::VOID, true);
    let d = b.method_symbol(&lib, "D", &[], SemanticType::VOID, true);

    let selector = b.ident(v);
    let one = b.int(1);
    let case_one = b.case(one);
    let call_a = b.call(a, None, &[]);
    let call_a = b.expr_stmt(call_a);
    let brk = b.brk();
    let first = b.section(&[case_one], &[call_a, brk]);
    let default = b.default_label();
    let call_d = b.call(d, None, &[]);
    let call_d = b.expr_stmt(call_d);
    let second = b.section(&[default], &[call_d]);
    let stmt = b.switch(selector, &[first, second]);
    let body = b.block_of(&[stmt]);
    let members = [b.method_decl(run, &[v], Some(body))];
    let decl = b.type_decl(class, TypeDeclKind::Class, &members);
    let unit = b.unit(&[decl]);
    let model = b.finish();

    let lowered = lower_ok(&model, &unit);
    let listing = listing_of(&lowered, "Run");
    assert_eq!(listing.iter().filter(|l| *l == "ceq").count(), 1);
    assert_eq!(listing.iter().filter(|l| *l == "br case").count(), 1);
    assert_eq!(listing.iter().filter(|l| *l == "br end").count(), 1);
    assert_eq!(listing.last().map(String::as_str), Some("ret"));
}

// =============================================================================
// Declarations
// =============================================================================

#[test]
fn test_value_type_construction_needs_no_constructor_call() {
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let point = b.source_type("Demo", "Point", TypeKind::Struct);
    let point_decl = b.type_symbol(point.clone(), None);
    let app = b.source_type("Demo", "App", TypeKind::Class);
    let class = b.type_symbol(app.clone(), None);
    let run = b.method_symbol(&app, "Run", &[], SemanticType::VOID, true);
    let p = b.local_symbol("p", point.clone());

    let create = b.new_object(point, None, &[], &[]);
    let local = b.local(p, Some(create));
    let body = b.block_of(&[local]);
    let point_decl = b.type_decl(point_decl, TypeDeclKind::Struct, &[]);
    let members = [b.method_decl(run, &[], Some(body))];
    let app_decl = b.type_decl(class, TypeDeclKind::Class, &members);
    let unit = b.unit(&[point_decl, app_decl]);
    let model = b.finish();

    let lowered = lower_ok(&model, &unit);
    let point = lowered.type_handle("Point").unwrap();
    let listing = listing_of(&lowered, "Run");
    assert_eq!(
        listing,
        vec!["ldloca p".to_string(), format!("initobj {point}"), "ret".to_string()]
    );
    assert!(!listing.iter().any(|l| l.starts_with("call") || l.starts_with("newobj")));
}

#[test]
fn test_forward_references_register_one_stub() {
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let app = b.source_type("Demo", "App", TypeKind::Class);
    let class = b.type_symbol(app.clone(), None);
    let run = b.method_symbol(&app, "Run", &[], SemanticType::VOID, true);
    let later = b.method_symbol(&app, "Later", &[], SemanticType::VOID, true);

    let first = b.call(later, None, &[]);
    let first = b.expr_stmt(first);
    let second = b.call(later, None, &[]);
    let second = b.expr_stmt(second);
    let body = b.block_of(&[first, second]);
    let later_body = b.block_of(&[]);
    let members = [
        b.method_decl(run, &[], Some(body)),
        b.method_decl(later, &[], Some(later_body)),
    ];
    let decl = b.type_decl(class, TypeDeclKind::Class, &members);
    let unit = b.unit(&[decl]);
    let model = b.finish();

    let lowered = lower_ok(&model, &unit);
    let forwards: Vec<&str> = lowered
        .calls
        .iter()
        .filter_map(|c| match c {
            BuilderCall::ForwardDeclare { kind: MemberKind::Method, handle, .. } => Some(handle.as_str()),
            _ => None,
        })
        .collect();
    let later = lowered.method_handle("Later").unwrap();
    assert_eq!(forwards, vec![later]);
    assert_eq!(
        listing_of(&lowered, "Run"),
        vec![format!("call {later}"), format!("call {later}"), "ret".to_string()]
    );
    // Stub filled, so nothing is reported.
    assert!(lowered.diagnostics.is_empty());
}

#[test]
fn test_scope_is_restored_after_gaps_and_nested_types() {
    init_test_logging();
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let outer_type = NamedType::new("Demo", "Outer", TypeKind::Class).in_source();
    let inner = NamedType::new("Demo", "Inner", TypeKind::Class)
        .in_source()
        .nested_in(outer_type.clone());
    let outer = SemanticType::named(outer_type);
    let outer_decl = b.type_symbol(outer.clone(), None);
    let inner = b.type_symbol(SemanticType::named(inner), None);
    let run = b.method_symbol(&outer, "Run", &[], SemanticType::VOID, true);

    let goto = b.goto("out");
    let body = b.block_of(&[goto]);
    let inner_members = [b.destructor("Inner")];
    let inner_decl = b.type_decl(inner, TypeDeclKind::Class, &inner_members);
    let members = [b.method_decl(run, &[], Some(body)), b.nested(inner_decl)];
    let decl = b.type_decl(outer_decl, TypeDeclKind::Class, &members);
    let unit = b.unit(&[decl]);
    let model = b.finish();

    let mut ctx = LoweringContext::new(&model, LoweringOptions::new("Demo"));
    let before = ctx.defs.mark();
    DeclLowerer::new(&mut ctx).lower_unit(&unit).unwrap();
    assert_eq!(ctx.defs.mark(), before);
    assert_eq!(ctx.diagnostics().len(), 2);
    assert!(ctx.defs.lookup(MemberKind::Type, "Demo.Outer", "Inner").is_some());
}

// =============================================================================
// Output
// =============================================================================

#[test]
fn test_gaps_show_up_in_the_rendered_program() {
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let app = b.source_type("Demo", "App", TypeKind::Class);
    let class = b.type_symbol(app.clone(), None);
    let run = b.method_symbol(&app, "Run", &[], SemanticType::VOID, true);
    let count = b.field_symbol(&app, "count", SemanticType::INT32, true);

    let lock_target = b.string("gate");
    let target = b.ident(count);
    let one = b.int(1);
    let assign = b.assign(target, one);
    let assign = b.expr_stmt(assign);
    let lock = b.lock(lock_target, assign);
    let target = b.ident(count);
    let two = b.int(2);
    let after = b.assign(target, two);
    let after = b.expr_stmt(after);
    let body = b.block_of(&[lock, after]);
    let members = [b.field_decl(count, None), b.method_decl(run, &[], Some(body))];
    let decl = b.type_decl(class, TypeDeclKind::Class, &members);
    let unit = b.unit(&[decl]);
    let model = b.finish();

    let lowered = lower_ok(&model, &unit);
    assert_eq!(lowered.diagnostics.len(), 1);
    assert_eq!(lowered.diagnostics[0].severity, Severity::Warning);
    assert!(lowered.diagnostics[0].message.contains("unsupported"));

    // The statement after the gap is still lowered.
    let count = lowered
        .calls
        .iter()
        .find_map(|c| match c {
            BuilderCall::DefineField { handle, name, .. } if name == "count" => Some(handle.clone()),
            _ => None,
        })
        .unwrap();
    let listing = listing_of(&lowered, "Run");
    assert!(listing.contains(&format!("stsfld {count}")));

    let rendered = lowered.render();
    let first = rendered.text.lines().next().unwrap();
    assert_eq!(first, "var module = ModuleDefinition.CreateModule(\"Demo\");");
    assert!(rendered.text.contains("// warning"));
}

#[test]
fn test_fatal_errors_keep_earlier_diagnostics() {
    init_test_logging();
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let app = b.source_type("Demo", "App", TypeKind::Class);
    let class = b.type_symbol(app.clone(), None);
    let members = [b.destructor("App"), b.indexer_decl()];
    let decl = b.type_decl(class, TypeDeclKind::Class, &members);
    let unit = b.unit(&[decl]);
    let model = b.finish();

    let failure = lower(&model, &unit, LoweringOptions::new("Demo").fatal_gaps()).unwrap_err();
    assert!(failure.error.is_gap());
    assert!(failure.to_string().ends_with("unsupported destructor"));
    assert!(failure.diagnostics.is_empty());
}
