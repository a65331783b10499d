use jsir_core::analyzers::scan_program;
use jsir_core::ast::StatementKind;
use jsir_core::ir::{Builtin, Const, Expr, Function, Module, Stmt, Temp};
use jsir_core::{Collector, CodegenOptions, CompilationMode, FailFast, Script, compile_script};

// Lowering exactly as produced: no rewriting passes, temps left as numbered.
fn unoptimized() -> CodegenOptions {
    CodegenOptions {
        constant_propagation: false,
        dead_code_elimination: false,
        compress_temps: false,
        ..CodegenOptions::default()
    }
}

fn compile(src: &str, options: CodegenOptions) -> Module {
    let script = Script::from_source("scenario.js", src);
    let mut handler = FailFast::new();
    match compile_script(&script, CompilationMode::Global, &options, &mut handler) {
        Ok(module) => module,
        Err(e) => panic!("compile failed: {:?} / first diagnostic: {:?}", e, handler.first()),
    }
}

fn root(module: &Module) -> &Function {
    module.root_function().expect("module has a root function")
}

fn builtin_calls_in(stmts: &[Stmt], builtin: Builtin) -> usize {
    stmts.iter().filter(|s| s.as_builtin_call() == Some(builtin)).count()
}

#[test]
fn global_var_initializer_is_folded_and_stored_by_name() {
    let module = compile("var x = 1 + 2;", unoptimized());
    let entry = root(&module);
    let stored = entry.statements().find_map(|s| match s {
        Stmt::Move {
            target: Expr::Name(name),
            source,
            op: None,
        } if name.id == "x" => Some(source.clone()),
        _ => None,
    });
    assert_eq!(stored, Some(Expr::Const(Const::Number(3.0))), "{}", entry);
    assert!(entry.locals.is_empty());
}

#[test]
fn function_with_one_formal_returns_the_sum_temp() {
    let src = "function f(a){ return a+1; }";
    let script = Script::from_source("f.js", src);
    let program = jsir_core::generate_ast_from_source(&script).expect("parse");
    let mut handler = FailFast::new();
    let envs = scan_program(&program, CompilationMode::Global, false, &mut handler).expect("scan");
    let StatementKind::FunctionDeclaration(f) = &program.body[0].kind else {
        panic!("expected a function declaration");
    };
    let env = envs.get(envs.for_node(f.get_id()).expect("f has an environment"));
    assert_eq!(env.formals, vec!["a".to_string()]);
    assert_eq!(env.find_argument("a"), Some(0));
    assert!(env.members.is_empty());

    let module = compile(src, unoptimized());
    let f = module.find_function("f").expect("f was compiled");
    let exit = &f.blocks[f.exit_block];
    let Some(Stmt::Ret(Expr::Temp(result))) = exit.statements.last() else {
        panic!("exit block does not return a temp:\n{}", f);
    };

    // Follow temp-to-temp copies back to the value the function computes.
    let source_of = |temp: &Temp| {
        f.statements().find_map(|s| match s {
            Stmt::Move {
                target: Expr::Temp(t),
                source,
                op: None,
            } if t == temp && *source != Expr::Const(Const::Undefined) => Some(source.clone()),
            _ => None,
        })
    };
    let mut value = source_of(result);
    while let Some(Expr::Temp(t)) = value {
        value = source_of(&t);
    }
    let Some(Expr::Binop { op, left, .. }) = value else {
        panic!("{} does not hold a binop:\n{}", result, f);
    };
    assert_eq!(op, jsir_core::ir::AluOp::Add);
    assert_eq!(*left, Expr::Temp(Temp::formal(0)));
}

#[test]
fn try_catch_finally_shape() {
    let module = compile("try { throw 1; } catch(e) { e; } finally { 2; }", unoptimized());
    let entry = root(&module);
    let listing = entry.to_string();

    let tries: Vec<&Stmt> = entry.statements().filter(|s| matches!(s, Stmt::Try { .. })).collect();
    assert_eq!(tries.len(), 1, "{}", listing);
    let Stmt::Try {
        exception_var_name,
        catch_block,
        ..
    } = tries[0]
    else {
        unreachable!()
    };
    assert_eq!(exception_var_name, "e");

    // The protected region's throw path lands in the catch block.
    let throw_path = entry.blocks.iter().any(|b| {
        builtin_calls_in(&b.statements, Builtin::Throw) == 1 && b.terminator() == Some(&Stmt::Jump(*catch_block))
    });
    assert!(throw_path, "{}", listing);

    // One finally body, entered from the try body and the catch paths.
    assert_eq!(entry.count_builtin_calls(Builtin::FinishTry), 1, "{}", listing);
    let finally = entry
        .blocks
        .iter()
        .find(|b| builtin_calls_in(&b.statements, Builtin::FinishTry) == 1)
        .expect("finally block");
    assert!(finally.incoming.len() >= 2, "{}", listing);
    let copies = entry
        .statements()
        .filter(|s| matches!(s, Stmt::Move { source: Expr::Const(Const::Number(n)), .. } if *n == 2.0))
        .count();
    assert_eq!(copies, 1, "{}", listing);

    // It ends by deciding whether to rethrow on the shared flag.
    let Some(Stmt::Exp(Expr::Call { args, .. })) = finally.statements.first() else {
        panic!("finally does not start with finish_try:\n{}", listing);
    };
    let flag = args[0].clone();
    assert!(
        matches!(finally.terminator(), Some(Stmt::CJump { cond, .. }) if *cond == flag),
        "{}",
        listing
    );
    let sets_flag = entry.statements().any(|s| {
        matches!(s, Stmt::Move { target, source: Expr::Const(Const::Bool(true)), .. } if *target == flag)
    });
    assert!(sets_flag, "{}", listing);

    // The catch body reads `e` by name through the catch scope.
    let reads_e = entry
        .statements()
        .any(|s| matches!(s, Stmt::Move { source: Expr::Name(n), .. } if n.id == "e"));
    assert!(reads_e, "{}", listing);
}

#[test]
fn bare_break_jumps_straight_to_the_loop_exit() {
    let module = compile("for (;;) { break; }", unoptimized());
    let entry = root(&module);
    assert_eq!(entry.count_builtin_calls(Builtin::PopScope), 0);
    assert_eq!(entry.count_builtin_calls(Builtin::FinishTry), 0);

    // The break block goes straight to the block after the loop, which
    // falls through to the exit.
    let exit = entry.exit_block;
    let after_loop = entry
        .blocks
        .iter()
        .position(|b| b.terminator() == Some(&Stmt::Jump(exit)) && b.statements.len() == 1)
        .expect("loop exit block");
    assert!(
        entry
            .blocks
            .iter()
            .any(|b| b.statements == vec![Stmt::Jump(after_loop)]),
        "{}",
        entry
    );
}

#[test]
fn loop_bodies_branch_back_to_the_condition() {
    let module = compile("for (;;) { if (x) break; }", unoptimized());
    let entry = root(&module);
    let back_edge = entry.blocks.iter().enumerate().any(|(id, b)| {
        b.terminator()
            .is_some_and(|t| t.targets().iter().any(|target| *target <= id))
    });
    assert!(back_edge, "{}", entry);
}

#[test]
fn strict_eval_declaration_is_rejected_before_lowering() {
    let script = Script::from_source("strict.js", "\"use strict\"; var eval = 1;");
    let mut handler = Collector::new();
    let result = compile_script(&script, CompilationMode::Global, &CodegenOptions::default(), &mut handler);
    assert!(result.is_err());
    let messages: Vec<String> = handler.errors().iter().map(|e| e.message()).collect();
    assert_eq!(messages, vec!["Variable name may not be eval or arguments in strict mode".to_string()]);
}

#[test]
fn propagated_literal_makes_the_local_store_dead() {
    let module = compile(
        "function f() { var x, y; x = 1; y = x; return y; }",
        CodegenOptions {
            compress_temps: false,
            ..CodegenOptions::default()
        },
    );
    let f = module.find_function("f").expect("f was compiled");
    let x = Expr::temp(0);
    assert_eq!(f.locals, vec!["x".to_string(), "y".to_string()]);

    assert!(
        !f.statements().any(|s| matches!(s, Stmt::Move { target, .. } if *target == x)),
        "store to x survived:\n{}",
        f
    );
    assert!(
        !f.statements().any(|s| matches!(s, Stmt::Move { source, .. } if *source == x)),
        "x is still read:\n{}",
        f
    );
    let returns_one = f.statements().any(|s| {
        matches!(s, Stmt::Move { source: Expr::Const(Const::Number(n)), op: None, .. } if *n == 1.0)
    });
    assert!(returns_one, "{}", f);
}

#[test]
fn catch_keeps_its_exception_flag_through_the_full_pipeline() {
    let module = compile(
        "function f(){ try { g(); } catch(e) { h(); } finally { k(); } }",
        CodegenOptions::default(),
    );
    let f = module.find_function("f").expect("f was compiled");
    assert_eq!(f.exception_slots.len(), 2, "{}", f);
    let flag = Expr::temp(f.exception_slots[0]);
    let exception = f.exception_slots[1];

    // Entering the handler raises the flag, so a throw from inside it goes
    // through the finally body and rethrows instead of re-running `h()`.
    let raises_flag = f.statements().any(|s| {
        matches!(s, Stmt::Move { target, source: Expr::Const(Const::Bool(true)), .. } if *target == flag)
    });
    assert!(raises_flag, "{}", f);

    // Nothing else is ever stored into the flag or the exception slot.
    for stmt in f.statements() {
        if let Stmt::Move { target, source, .. } = stmt
            && *target == flag
        {
            assert!(matches!(source, Expr::Const(Const::Bool(_))), "{}", f);
        }
        if let Stmt::Move { target, .. } = stmt {
            assert_ne!(*target, Expr::temp(exception), "{}", f);
        }
    }
    let Some(Stmt::Try { exception_var, .. }) = f.statements().find(|s| matches!(s, Stmt::Try { .. })) else {
        panic!("no try statement:\n{}", f);
    };
    assert_eq!(*exception_var, Temp::local(exception));
    assert_eq!(f.count_builtin_calls(Builtin::FinishTry), 1, "{}", f);
}
