//! file: core/src/ast/mod.rs
//! description: the AST consumed by the codegen and the pest frontend that
//! builds it.
//!
//! `generate_ast_from_source` is the only entry point; the `parse_*_rule`
//! builders in `stmt` and `expr` turn the pest parse tree into the closed
//! `StatementKind`/`ExpressionKind` sum types.
//!
pub mod err;
pub mod expr;
pub mod kind;
pub mod node;
pub mod rules;
pub mod stmt;

pub use kind::*;
pub use node::*;
pub use rules::{Rule, RulesParser};

use pest::Parser;

use crate::error::{JsirErrorExt, Level};
use crate::location::{Location, Span};
use crate::script::Script;

pub fn generate_ast_from_source(script: &Script) -> Result<Program, Box<dyn JsirErrorExt>> {
    let mut pairs = RulesParser::parse(Rule::program, &script.content)
        .map_err(|e| pest_error_to_syntax_error(e, script))?;
    let program = match pairs.next() {
        Some(pair) => stmt::parse_program_rule(pair, script)?,
        None => Program::new(Vec::new(), Location::new(script.name.clone(), 1, 1, 0)),
    };
    log::debug!(
        "parsed '{}' into {} top-level statement(s)",
        script.name,
        program.body.len()
    );
    Ok(program)
}

fn pest_error_to_syntax_error(error: pest::error::Error<Rule>, script: &Script) -> Box<dyn JsirErrorExt> {
    let offset = match error.location {
        pest::error::InputLocation::Pos(pos) => pos,
        pest::error::InputLocation::Span((start, _)) => start,
    };
    let (line, column) = match error.line_col {
        pest::error::LineColLocation::Pos(lc) => lc,
        pest::error::LineColLocation::Span(lc, _) => lc,
    };
    let location = Location::new(script.name.clone(), line, column, offset);
    Box::new(err::SyntaxError::with(
        Level::Error,
        format!("Unexpected token: {}", error.variant.message()),
        "jsir.ast.generate_ast_from_source".to_string(),
        Some(location.clone()),
        Some(Span::new(location.clone(), location)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        let script = Script::from_source("test.js", src);
        match generate_ast_from_source(&script) {
            Ok(p) => p,
            Err(e) => panic!("parse failed: {}", e),
        }
    }

    #[test]
    fn distinct_functions_get_distinct_ids() {
        let program = parse("function a() {} var b = function () {};");
        let StatementKind::FunctionDeclaration(a) = &program.body[0].kind else {
            panic!("expected a declaration");
        };
        let StatementKind::Variable(decls) = &program.body[1].kind else {
            panic!("expected var");
        };
        let Some(Expression { kind: ExpressionKind::Function(b), .. }) = &decls[0].init else {
            panic!("expected function expression");
        };
        assert_ne!(a.get_id(), b.get_id());
        assert_ne!(a.get_id(), program.get_id());
    }

    #[test]
    fn syntax_error_carries_position() {
        let script = Script::from_source("bad.js", "var = ;");
        let err = generate_ast_from_source(&script).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Syntax);
        let loc = err.location().unwrap();
        assert_eq!(loc.line, 1);
        assert_eq!(loc.file, "bad.js");
    }

    #[test]
    fn keywords_are_not_identifiers() {
        let script = Script::from_source("kw.js", "var while = 1;");
        assert!(generate_ast_from_source(&script).is_err());
        let program = parse("var whilex = 1;");
        assert_eq!(program.body.len(), 1);
    }
}
