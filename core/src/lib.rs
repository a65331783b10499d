pub mod analyzers;
pub mod ast;
pub mod error;
pub mod ir;
pub mod location;
pub mod script;

pub use analyzers::CompilationMode;
pub use ast::{RulesParser, generate_ast_from_source};
pub use error::{Abort, Collector, ErrorHandler, ErrorKind, FailFast, JsirErrorExt, Level};
pub use ir::{Codegen, CodegenOptions, Module};
pub use location::{Location, Span};
pub use script::Script;

use ast::{ExpressionKind, FunctionNode, Program, StatementKind};
use ir::lower::err::{CompileFailedError, NotAFunctionError};

pub fn generate_error_report(error: &dyn JsirErrorExt) -> String {
    let level = error.level();
    let location = match error.location() {
        Some(loc) => loc.to_string(),
        None => "unknown location".to_string(),
    };
    let message = error.message();

    format!("JSIR | {} | {} | {}", level, location, message)
}

/// Parses a script, handing a parse failure to `handler` like any other
/// diagnostic.
fn parse(script: &Script, handler: &mut dyn ErrorHandler) -> Result<Program, Box<dyn JsirErrorExt>> {
    generate_ast_from_source(script).map_err(|error| {
        handler.report(error);
        Box::new(CompileFailedError {
            file: script.name.clone(),
            count: 1,
        }) as Box<dyn JsirErrorExt>
    })
}

/// Compiles a whole script as global or eval code.
pub fn compile_script(
    script: &Script,
    mode: CompilationMode,
    options: &CodegenOptions,
    handler: &mut dyn ErrorHandler,
) -> Result<Module, Box<dyn JsirErrorExt>> {
    let program = parse(script, handler)?;
    Codegen::new(options.clone(), handler).compile_program(&program, mode, &[])
}

/// Compiles eval code that sees the caller's `inherited_locals`.
pub fn compile_eval(
    script: &Script,
    inherited_locals: &[String],
    options: &CodegenOptions,
    handler: &mut dyn ErrorHandler,
) -> Result<Module, Box<dyn JsirErrorExt>> {
    let program = parse(script, handler)?;
    Codegen::new(options.clone(), handler).compile_program(&program, CompilationMode::Eval, inherited_locals)
}

/// Compiles a script holding exactly one function, declared or as an
/// expression statement, on its own.
pub fn compile_function_source(
    script: &Script,
    options: &CodegenOptions,
    handler: &mut dyn ErrorHandler,
) -> Result<Module, Box<dyn JsirErrorExt>> {
    let program = parse(script, handler)?;
    let function = single_function(&program).ok_or_else(|| {
        Box::new(NotAFunctionError {
            file: script.name.clone(),
        }) as Box<dyn JsirErrorExt>
    })?;
    Codegen::new(options.clone(), handler).compile_function_expression(function)
}

fn single_function(program: &Program) -> Option<&FunctionNode> {
    let [statement] = program.body.as_slice() else {
        return None;
    };
    match &statement.kind {
        StatementKind::FunctionDeclaration(function) => Some(function),
        StatementKind::Expression(e) => match &e.kind {
            ExpressionKind::Function(function) => Some(function),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_report_has_level_location_and_message() {
        let script = Script::from_source("r.js", "var = 1;");
        let mut handler = FailFast::new();
        assert!(compile_script(&script, CompilationMode::Global, &CodegenOptions::default(), &mut handler).is_err());
        let report = generate_error_report(handler.first().unwrap());
        assert!(report.starts_with("JSIR | ERROR | r.js:1:"), "{}", report);
    }

    #[test]
    fn function_mode_needs_exactly_one_function() {
        let mut handler = Collector::new();
        let options = CodegenOptions::default();
        let two = Script::from_source("two.js", "function a() {} function b() {}");
        let err = compile_function_source(&two, &options, &mut handler).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Script);

        let one = Script::from_source("one.js", "function add(a, b) { return a + b; }");
        let module = compile_function_source(&one, &options, &mut handler).unwrap();
        assert_eq!(module.root_function().unwrap().name, "add");
        assert!(handler.errors().is_empty());
    }
}
