use jsir_core::{
    Collector, CodegenOptions, CompilationMode, ErrorHandler, ErrorKind, FailFast, JsirErrorExt, Level, Script,
    compile_eval, compile_function_source, compile_script, generate_error_report,
};

const TWO_BAD_STATEMENTS: &str = "var ok = 1;\nbreak;\nf() = 2;\nvar fine = 3;\n";

fn run(src: &str, handler: &mut dyn ErrorHandler) -> Result<jsir_core::Module, Box<dyn JsirErrorExt>> {
    let script = Script::from_source("handlers.js", src);
    compile_script(&script, CompilationMode::Global, &CodegenOptions::default(), handler)
}

#[test]
fn fail_fast_stops_at_the_first_diagnostic() {
    let mut handler = FailFast::new();
    let err = run(TWO_BAD_STATEMENTS, &mut handler).unwrap_err();
    assert_eq!(handler.error_count(), 1);
    let first = handler.first().unwrap();
    assert_eq!(first.message(), "Break outside of loop");
    assert_eq!(first.kind(), ErrorKind::Syntax);
    let location = first.location().unwrap();
    assert_eq!((location.file.as_str(), location.line, location.column), ("handlers.js", 2, 1));
    assert_eq!(location.offset, "var ok = 1;\n".len());
    assert_eq!(err.message(), "compiling 'handlers.js' failed with 1 diagnostic(s)");
}

#[test]
fn collector_keeps_lowering_sibling_statements() {
    let mut handler = Collector::new();
    assert!(run(TWO_BAD_STATEMENTS, &mut handler).is_err());
    let kinds: Vec<ErrorKind> = handler.errors().iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec![ErrorKind::Syntax, ErrorKind::Reference]);
    let lines: Vec<usize> = handler
        .errors()
        .iter()
        .map(|e| e.location().map(|l| l.line).unwrap_or(0))
        .collect();
    assert_eq!(lines, vec![2, 3]);
}

#[test]
fn scan_errors_respect_the_handler_mode() {
    let src = "\"use strict\"; var eval; function g(a, a) {}";
    let mut fail_fast = FailFast::new();
    assert!(run(src, &mut fail_fast).is_err());
    assert_eq!(fail_fast.error_count(), 1);

    let mut collector = Collector::new();
    assert!(run(src, &mut collector).is_err());
    let messages: Vec<String> = collector.errors().iter().map(|e| e.message()).collect();
    assert_eq!(
        messages,
        vec![
            "Variable name may not be eval or arguments in strict mode".to_string(),
            "Duplicate parameter name 'a' is not allowed in strict mode".to_string(),
        ]
    );
}

#[test]
fn parse_failures_go_through_the_handler_too() {
    let mut handler = Collector::new();
    let err = run("var = ;", &mut handler).unwrap_err();
    assert_eq!(handler.errors().len(), 1);
    assert_eq!(handler.errors()[0].kind(), ErrorKind::Syntax);
    assert_eq!(err.level(), Level::Error);
}

#[test]
fn clean_sources_leave_the_handler_empty() {
    let mut handler = Collector::new();
    let module = run("var a = 1; function f(x) { return x * a; }", &mut handler).unwrap();
    assert!(handler.errors().is_empty());
    assert_eq!(module.functions.len(), 2);
}

#[test]
fn reports_render_on_one_line() {
    let mut handler = Collector::new();
    let _ = run("x = 1;\n1 = 2;", &mut handler);
    let report = generate_error_report(handler.errors()[0].as_ref());
    assert_eq!(
        report,
        "JSIR | ERROR | handlers.js:2:1 | left-hand side of assignment operator is not an lvalue"
    );
}

#[test]
fn strict_option_applies_strict_rules_to_sloppy_sources() {
    let script = Script::from_source("opt.js", "var arguments = 1;");
    let mut sloppy = Collector::new();
    assert!(compile_script(&script, CompilationMode::Global, &CodegenOptions::default(), &mut sloppy).is_ok());

    let strict = CodegenOptions {
        strict: true,
        ..CodegenOptions::default()
    };
    let mut handler = Collector::new();
    assert!(compile_script(&script, CompilationMode::Global, &strict, &mut handler).is_err());
    assert_eq!(handler.errors().len(), 1);
}

#[test]
fn eval_code_keeps_its_completion_value_and_inherited_locals() {
    let script = Script::from_source("eval.js", "x + 1;");
    let mut handler = FailFast::new();
    let module = compile_eval(&script, &["x".to_string()], &CodegenOptions::default(), &mut handler).unwrap();
    let entry = module.root_function().unwrap();
    assert_eq!(entry.locals, vec!["x".to_string()]);
    assert_eq!(entry.compilation_mode, CompilationMode::Eval);

    let mut handler = FailFast::new();
    let err = compile_script(
        &Script::from_source("eval.js", "return 1;"),
        CompilationMode::Eval,
        &CodegenOptions::default(),
        &mut handler,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Script);
    assert_eq!(handler.first().unwrap().message(), "Return statement outside of function");
}

#[test]
fn a_lone_function_compiles_with_its_own_environment() {
    let script = Script::from_source("fn.js", "function add(a, b) { var c = a + b; return c; }");
    let mut handler = FailFast::new();
    let module = compile_function_source(&script, &CodegenOptions::default(), &mut handler).unwrap();
    let add = module.root_function().unwrap();
    assert_eq!(add.name, "add");
    assert_eq!(add.formals, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(add.locals, vec!["c".to_string()]);
    assert_eq!(add.compilation_mode, CompilationMode::Function);
}
