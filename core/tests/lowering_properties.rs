use jsir_core::ir::{Builtin, Const, Expr, Module, Stmt};
use jsir_core::{Collector, CodegenOptions, CompilationMode, ErrorKind, FailFast, Script, compile_script};

fn unoptimized() -> CodegenOptions {
    CodegenOptions {
        constant_propagation: false,
        dead_code_elimination: false,
        compress_temps: false,
        ..CodegenOptions::default()
    }
}

fn compile(src: &str) -> Module {
    let script = Script::from_source("lowering.js", src);
    let mut handler = FailFast::new();
    match compile_script(&script, CompilationMode::Global, &unoptimized(), &mut handler) {
        Ok(module) => module,
        Err(e) => panic!("compile failed: {:?} / first diagnostic: {:?}", e, handler.first()),
    }
}

fn collect_errors(src: &str) -> Vec<(ErrorKind, String)> {
    let script = Script::from_source("errors.js", src);
    let mut handler = Collector::new();
    let result = compile_script(&script, CompilationMode::Global, &unoptimized(), &mut handler);
    assert!(result.is_err(), "expected `{}` to fail", src);
    handler.errors().iter().map(|e| (e.kind(), e.message())).collect()
}

/// The value stored into the global `r` by `var r = <expr>;`.
fn folded(expr: &str) -> Expr {
    let module = compile(&format!("var r = {};", expr));
    let entry = module.root_function().expect("root");
    let stored = entry
        .statements()
        .find_map(|s| match s {
            Stmt::Move {
                target: Expr::Name(n),
                source,
                op: None,
            } if n.id == "r" => Some(source.clone()),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no store to r in\n{}", entry));
    // Anything but a constant reaches a name through a temp.
    match stored {
        Expr::Temp(t) => entry
            .statements()
            .find_map(|s| match s {
                Stmt::Move {
                    target: Expr::Temp(target),
                    source,
                    op: None,
                } if *target == t => Some(source.clone()),
                _ => None,
            })
            .unwrap_or_else(|| panic!("{} is never assigned in\n{}", t, entry)),
        other => other,
    }
}

fn int32(v: f64) -> i32 {
    v as i64 as i32
}

fn evaluate(op: &str, l: f64, r: f64) -> Const {
    let n = Const::Number;
    let shift = (r as u32) & 0x1f;
    match op {
        "+" => n(l + r),
        "-" => n(l - r),
        "*" => n(l * r),
        "/" => n(l / r),
        "%" => n(l % r),
        "&" => n(f64::from(int32(l) & int32(r))),
        "|" => n(f64::from(int32(l) | int32(r))),
        "^" => n(f64::from(int32(l) ^ int32(r))),
        "<<" => n(f64::from(int32(l).wrapping_shl(shift))),
        ">>" => n(f64::from(int32(l) >> shift)),
        ">>>" => n(f64::from((int32(l) as u32) >> shift)),
        "<" => Const::Bool(l < r),
        ">" => Const::Bool(l > r),
        "<=" => Const::Bool(l <= r),
        ">=" => Const::Bool(l >= r),
        "==" | "===" => Const::Bool(l == r),
        "!=" | "!==" => Const::Bool(l != r),
        _ => panic!("unknown operator {}", op),
    }
}

#[test]
fn numeric_literal_operators_fold_like_evaluation() {
    let ops = [
        "+", "-", "*", "/", "%", "&", "|", "^", "<<", ">>", ">>>", "<", ">", "<=", ">=", "==", "!=", "===", "!==",
    ];
    let pairs = [(7.0, 3.0), (1.0, 0.0), (0.0, 0.0), (5.0, 5.0), (2.0, 33.0), (0.5, 4.0)];
    for op in ops {
        for (l, r) in pairs {
            let got = folded(&format!("{} {} {}", l, op, r));
            let want = evaluate(op, l, r);
            match (&got, want) {
                (Expr::Const(Const::Number(g)), Const::Number(w)) if w.is_nan() => {
                    assert!(g.is_nan(), "{} {} {} folded to {}", l, op, r, g)
                }
                _ => assert_eq!(got, Expr::Const(want), "{} {} {}", l, op, r),
            }
        }
    }
}

#[test]
fn division_by_zero_folds_to_infinity_and_nan() {
    assert_eq!(folded("1 / 0"), Expr::Const(Const::Number(f64::INFINITY)));
    assert!(matches!(folded("0 / 0"), Expr::Const(Const::Number(n)) if n.is_nan()));
}

#[test]
fn string_literals_concatenate() {
    assert_eq!(folded("\"ab\" + \"cd\""), Expr::String("abcd".to_string()));
}

#[test]
fn non_references_are_rejected_as_assignment_targets() {
    let errors = collect_errors("1 = 2; \"s\" = 1; null = 1; f() = 1; (function () {}) = 1;");
    assert_eq!(errors.len(), 5, "{:?}", errors);
    for (kind, message) in &errors {
        assert_eq!(*kind, ErrorKind::Reference);
        assert_eq!(message, "left-hand side of assignment operator is not an lvalue");
    }
}

#[test]
fn update_and_inplace_targets_report_their_own_messages() {
    let errors = collect_errors("f()++; --g(); h() += 1;");
    assert_eq!(
        errors,
        vec![
            (
                ErrorKind::Reference,
                "Invalid left-hand side expression in postfix operation".to_string()
            ),
            (
                ErrorKind::Reference,
                "Invalid left-hand side expression in prefix operation".to_string()
            ),
            (
                ErrorKind::Syntax,
                "left-hand side of inplace operator is not an lvalue".to_string()
            ),
        ]
    );
}

#[test]
fn a_name_resolves_to_the_same_slot_every_time() {
    let module = compile("function f() { var a; g(a, a); }");
    let f = module.find_function("f").expect("f");
    let args = f
        .statements()
        .find_map(|s| match s {
            Stmt::Exp(Expr::Call { args, .. }) => Some(args.clone()),
            _ => None,
        })
        .expect("call to g");
    assert_eq!(args.len(), 2);
    assert!(args[0].is_temp());
    assert_eq!(args[0], args[1]);
}

#[test]
fn break_unwinds_every_enclosing_scope() {
    // Two `with` scopes and one `try`/`finally` between the break and its loop.
    let module = compile("function f(o) { for (;;) { with (o) { try { with (o) { break; } } finally { 3; } } } }");
    let f = module.find_function("f").expect("f");
    let count = |stmts: &[Stmt], b: Builtin| stmts.iter().filter(|s| s.as_builtin_call() == Some(b)).count();

    let breaking = f
        .blocks
        .iter()
        .find(|b| count(&b.statements, Builtin::PopScope) == 2)
        .unwrap_or_else(|| panic!("no block pops both scopes:\n{}", f));
    assert_eq!(count(&breaking.statements, Builtin::FinishTry), 1, "{}", f);
    let finally_copies = breaking
        .statements
        .iter()
        .filter(|s| matches!(s, Stmt::Move { source: Expr::Const(Const::Number(n)), .. } if *n == 3.0))
        .count();
    assert_eq!(finally_copies, 1, "{}", f);
    assert!(matches!(breaking.terminator(), Some(Stmt::Jump(_))), "{}", f);

    // Inner scope first: pop, finish the try and run its finally, pop.
    let order: Vec<Builtin> = breaking.statements.iter().filter_map(Stmt::as_builtin_call).collect();
    assert_eq!(
        order,
        vec![Builtin::PushWithScope, Builtin::PopScope, Builtin::FinishTry, Builtin::PopScope]
    );
}

#[test]
fn return_inside_finally_protected_code_copies_the_finally_body() {
    let module = compile("function f() { try { return 1; } finally { g(); } }");
    let f = module.find_function("f").expect("f");
    // Once for the return path and once for the normal path.
    assert_eq!(f.count_builtin_calls(Builtin::FinishTry), 2, "{}", f);
}

#[test]
fn continue_unwinds_with_scopes_inside_the_loop_only() {
    let module = compile("function f(o) { with (o) { while (x) { with (o) { continue; } } } }");
    let f = module.find_function("f").expect("f");
    let pops_in_continue_block = f
        .blocks
        .iter()
        .filter(|b| b.statements.iter().any(|s| s.as_builtin_call() == Some(Builtin::PushWithScope)))
        .map(|b| b.statements.iter().filter(|s| s.as_builtin_call() == Some(Builtin::PopScope)).count())
        .max();
    assert_eq!(pops_in_continue_block, Some(1), "{}", f);
}

#[test]
fn function_locals_start_undefined() {
    let module = compile("function f() { var a, b; }");
    let f = module.find_function("f").expect("f");
    assert_eq!(f.locals, vec!["a".to_string(), "b".to_string()]);
    for slot in 0..2 {
        assert!(f.statements().any(|s| *s
            == Stmt::Move {
                target: Expr::temp(slot),
                source: Expr::Const(Const::Undefined),
                op: None
            }));
    }
}

#[test]
fn global_code_declares_its_variables_at_runtime() {
    let module = compile("var a; function b() {}");
    let entry = module.root_function().expect("root");
    let declare = entry
        .statements()
        .find(|s| s.as_builtin_call() == Some(Builtin::DeclareVars))
        .expect("declare_vars call");
    let Stmt::Exp(Expr::Call { args, .. }) = declare else {
        panic!("unexpected shape {}", declare);
    };
    assert_eq!(args[0], Expr::Const(Const::Bool(false)));
    let names: Vec<String> = args[1..].iter().map(|a| a.to_string()).collect();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    // The declared function's closure is stored under its name.
    assert!(entry
        .statements()
        .any(|s| matches!(s, Stmt::Move { source: Expr::Closure(_), .. })));
    assert!(entry.statements().any(|s| matches!(
        s,
        Stmt::Move { target: Expr::Name(n), .. } if n.id == "b"
    )));
}

#[test]
fn object_literal_keys_split_into_named_and_indexed() {
    let module = compile("var o = { a: 1, 0: 2, get b() { return 3; } };");
    let entry = module.root_function().expect("root");
    assert_eq!(entry.count_builtin_calls(Builtin::DefineObjectLiteral), 1, "{}", entry);
    assert_eq!(entry.count_builtin_calls(Builtin::DefineProperty), 1, "{}", entry);
}

#[test]
fn duplicate_data_keys_are_fine_outside_strict_code() {
    compile("var o = { a: 1, a: 2 };");
    let errors = collect_errors("\"use strict\"; var o = { a: 1, a: 2 };");
    assert_eq!(
        errors,
        vec![(ErrorKind::Syntax, "Illegal duplicate key 'a' in object literal".to_string())]
    );
}

#[test]
fn for_in_walks_an_iterator_object() {
    let module = compile("for (var k in o) { g(k); }");
    let entry = module.root_function().expect("root");
    assert_eq!(entry.count_builtin_calls(Builtin::ForeachIteratorObject), 1);
    assert_eq!(entry.count_builtin_calls(Builtin::ForeachNextPropertyName), 1);
}

#[test]
fn misplaced_jumps_are_syntax_errors() {
    let errors = collect_errors("break; continue; return 1; a: while (x) { break b; }");
    let messages: Vec<&str> = errors.iter().map(|(_, m)| m.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Break outside of loop",
            "continue outside of loop",
            "Return statement outside of function",
            "Undefined label 'b'",
        ]
    );
    assert!(errors.iter().all(|(kind, _)| *kind == ErrorKind::Syntax));
}

#[test]
fn strict_delete_of_a_bare_name_is_an_error() {
    let errors = collect_errors("\"use strict\"; delete x;");
    assert_eq!(
        errors,
        vec![(ErrorKind::Syntax, "Delete of an unqualified identifier in strict mode.".to_string())]
    );
    let module = compile("delete o.p;");
    assert_eq!(module.root_function().expect("root").count_builtin_calls(Builtin::Delete), 1);
}

#[test]
fn postfix_increment_for_its_value_uses_the_builtin() {
    let module = compile("function f(a) { return a++; }");
    let f = module.find_function("f").expect("f");
    assert_eq!(f.count_builtin_calls(Builtin::PostIncrement), 1, "{}", f);
    let module = compile("function f(a) { a++; }");
    let f = module.find_function("f").expect("f");
    assert_eq!(f.count_builtin_calls(Builtin::PostIncrement), 0, "{}", f);
}

fn calls_name(module: &Module, function: &str, callee: &str) -> bool {
    let f = module.find_function(function).expect("function");
    let is_callee = |e: &Expr| matches!(e, Expr::Call { base, .. } if matches!(base.as_ref(), Expr::Name(n) if n.id == callee));
    f.statements().any(|s| match s {
        Stmt::Exp(e) => is_callee(e),
        Stmt::Move { source, .. } => is_callee(source),
        _ => false,
    })
}

#[test]
fn folded_conditions_jump_straight_to_the_taken_arm() {
    let module = compile("function f() { if (1 < 2) a(); else b(); while (\"\") c(); }");
    let f = module.find_function("f").expect("f");
    assert!(
        !f.statements().any(|s| matches!(s, Stmt::CJump { .. })),
        "{}",
        f
    );
    assert!(calls_name(&module, "f", "a"), "{}", f);
    // The untaken arms have no predecessor and are dropped on layout.
    assert!(!calls_name(&module, "f", "b"), "{}", f);
    assert!(!calls_name(&module, "f", "c"), "{}", f);
}
