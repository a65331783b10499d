//! file: core/src/ast/stmt.rs
//! description: parsing helpers for the program, statements and function
//! bodies.
//!
//! Each `parse_*_rule` takes the pest pair of the matching grammar rule and
//! returns the AST node with its `Location` attached. Keyword tokens are
//! skipped by `rules::fetch_next_pair`/`rules::significant_pairs`.
//!
use pest::iterators::Pair;

use crate::ast::expr::{parse_expression_rule, parse_identifier_rule, parse_left_hand_side_rule};
use crate::ast::{
    CatchClause, FunctionKind, FunctionNode, Identifier, Program, Rule, Statement, StatementKind,
    SwitchClause, VariableDeclaration, rules,
};
use crate::error::JsirErrorExt;
use crate::script::Script;

type ParseResult<T> = Result<T, Box<dyn JsirErrorExt>>;

pub(crate) fn parse_program_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Program> {
    let location = rules::get_location_from_pair(&pair, script);
    let mut body = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::statement => body.push(parse_statement_rule(inner, script)?),
            Rule::EOI => break,
            _ => {}
        }
    }
    Ok(Program::new(body, location))
}

fn parse_statement_list<'a>(
    pairs: impl Iterator<Item = Pair<'a, Rule>>,
    script: &Script,
) -> ParseResult<Vec<Statement>> {
    pairs
        .filter(|p| p.as_rule() == Rule::statement)
        .map(|p| parse_statement_rule(p, script))
        .collect()
}

pub(crate) fn parse_statement_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Statement> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, script);
    let next_rule = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let kind = match next_rule.as_rule() {
        Rule::block => StatementKind::Block(parse_statement_list(next_rule.into_inner(), script)?),
        Rule::variable_statement => {
            let (mut inner, loc, span) = rules::get_data_from_rule(&next_rule, script);
            let list = rules::fetch_next_pair(&mut inner, &loc, &span)?;
            StatementKind::Variable(parse_variable_declaration_list_rule(list, script)?)
        }
        Rule::empty_statement => StatementKind::Empty,
        Rule::function_declaration => StatementKind::FunctionDeclaration(parse_function_rule(
            next_rule,
            FunctionKind::Declaration,
            script,
        )?),
        Rule::if_statement => parse_if_statement_rule(next_rule, script)?,
        Rule::do_while_statement => {
            let (mut inner, loc, span) = rules::get_data_from_rule(&next_rule, script);
            let body = parse_statement_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
            let condition = parse_expression_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
            StatementKind::DoWhile {
                body: Box::new(body),
                condition,
            }
        }
        Rule::while_statement => {
            let (mut inner, loc, span) = rules::get_data_from_rule(&next_rule, script);
            let condition = parse_expression_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
            let body = parse_statement_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
            StatementKind::While {
                condition,
                body: Box::new(body),
            }
        }
        Rule::for_in_statement => {
            let (mut inner, loc, span) = rules::get_data_from_rule(&next_rule, script);
            let target = parse_left_hand_side_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
            let object = parse_expression_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
            let body = parse_statement_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
            StatementKind::ForIn {
                target,
                object,
                body: Box::new(body),
            }
        }
        Rule::local_for_in_statement => {
            let (mut inner, loc, span) = rules::get_data_from_rule(&next_rule, script);
            let variable = rules::fetch_next_pair(&mut inner, &loc, &span)?;
            let (mut var_inner, var_loc, var_span) = rules::get_data_from_rule(&variable, script);
            let name = parse_identifier_rule(rules::fetch_next_pair(&mut var_inner, &var_loc, &var_span)?, script);
            let object = parse_expression_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
            let body = parse_statement_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
            StatementKind::LocalForIn {
                declaration: VariableDeclaration { name, init: None },
                object,
                body: Box::new(body),
            }
        }
        Rule::local_for_statement | Rule::for_statement => parse_for_statement_rule(next_rule, script)?,
        Rule::continue_statement => StatementKind::Continue(parse_optional_label(next_rule, script)),
        Rule::break_statement => StatementKind::Break(parse_optional_label(next_rule, script)),
        Rule::return_statement => {
            let value = rules::significant_pairs(&next_rule)
                .next()
                .map(|p| parse_expression_rule(p, script))
                .transpose()?;
            StatementKind::Return(value)
        }
        Rule::with_statement => {
            let (mut inner, loc, span) = rules::get_data_from_rule(&next_rule, script);
            let object = parse_expression_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
            let body = parse_statement_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
            StatementKind::With {
                object,
                body: Box::new(body),
            }
        }
        Rule::switch_statement => parse_switch_statement_rule(next_rule, script)?,
        Rule::throw_statement => {
            let (mut inner, loc, span) = rules::get_data_from_rule(&next_rule, script);
            StatementKind::Throw(parse_expression_rule(
                rules::fetch_next_pair(&mut inner, &loc, &span)?,
                script,
            )?)
        }
        Rule::try_statement => parse_try_statement_rule(next_rule, script)?,
        Rule::debugger_statement => StatementKind::Debugger,
        Rule::labelled_statement => {
            let (mut inner, loc, span) = rules::get_data_from_rule(&next_rule, script);
            let label = parse_identifier_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script);
            let body = parse_statement_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
            StatementKind::Labelled {
                label,
                body: Box::new(body),
            }
        }
        Rule::expression_statement => {
            let (mut inner, loc, span) = rules::get_data_from_rule(&next_rule, script);
            StatementKind::Expression(parse_expression_rule(
                rules::fetch_next_pair(&mut inner, &loc, &span)?,
                script,
            )?)
        }
        other => {
            return Err(rules::unexpected(
                &format!("Unexpected statement type: {:?}", other),
                "jsir.ast.stmt.parse_statement_rule",
                &location,
                &span,
            ));
        }
    };
    Ok(Statement::new(kind, location))
}

fn parse_optional_label(pair: Pair<Rule>, script: &Script) -> Option<Identifier> {
    rules::significant_pairs(&pair)
        .find(|p| p.as_rule() == Rule::identifier)
        .map(|p| parse_identifier_rule(p, script))
}

pub(crate) fn parse_variable_declaration_list_rule(
    pair: Pair<Rule>,
    script: &Script,
) -> ParseResult<Vec<VariableDeclaration>> {
    let mut declarations = Vec::new();
    for decl in pair.into_inner() {
        let (mut inner, loc, span) = rules::get_data_from_rule(&decl, script);
        let name = parse_identifier_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script);
        let init = inner.next().map(|p| parse_expression_rule(p, script)).transpose()?;
        declarations.push(VariableDeclaration { name, init });
    }
    Ok(declarations)
}

fn parse_if_statement_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<StatementKind> {
    let (mut inner, loc, span) = rules::get_data_from_rule(&pair, script);
    let condition = parse_expression_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
    let then_branch = parse_statement_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
    let else_branch = match rules::fetch_next_pair(&mut inner, &loc, &span) {
        Ok(p) => Some(Box::new(parse_statement_rule(p, script)?)),
        Err(_) => None,
    };
    Ok(StatementKind::If {
        condition,
        then_branch: Box::new(then_branch),
        else_branch,
    })
}

/// Handles both `for (init; cond; update)` and `for (var ...; cond; update)`.
fn parse_for_statement_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<StatementKind> {
    let location = rules::get_location_from_pair(&pair, script);
    let span = rules::get_span_from_pair(&pair, script);
    let is_local = pair.as_rule() == Rule::local_for_statement;

    let mut declarations = Vec::new();
    let mut init = None;
    let mut condition = None;
    let mut update = None;
    let mut body = None;
    for inner in rules::significant_pairs(&pair) {
        match inner.as_rule() {
            Rule::variable_declaration_list => {
                declarations = parse_variable_declaration_list_rule(inner, script)?;
            }
            Rule::for_init => init = Some(parse_wrapped_expression(inner, script)?),
            Rule::for_condition => condition = Some(parse_wrapped_expression(inner, script)?),
            Rule::for_update => update = Some(parse_wrapped_expression(inner, script)?),
            Rule::statement => body = Some(Box::new(parse_statement_rule(inner, script)?)),
            _ => {}
        }
    }
    let Some(body) = body else {
        return Err(rules::unexpected(
            "for statement without a body",
            "jsir.ast.stmt.parse_for_statement_rule",
            &location,
            &span,
        ));
    };

    if is_local {
        Ok(StatementKind::LocalFor {
            declarations,
            condition,
            update,
            body,
        })
    } else {
        Ok(StatementKind::For {
            init,
            condition,
            update,
            body,
        })
    }
}

fn parse_wrapped_expression(pair: Pair<Rule>, script: &Script) -> ParseResult<crate::ast::Expression> {
    let (mut inner, loc, span) = rules::get_data_from_rule(&pair, script);
    parse_expression_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)
}

fn parse_switch_statement_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<StatementKind> {
    let (mut inner, loc, span) = rules::get_data_from_rule(&pair, script);
    let discriminant = parse_expression_rule(rules::fetch_next_pair(&mut inner, &loc, &span)?, script)?;
    let mut clauses = Vec::new();
    for clause in inner.filter(|p| !rules::is_keyword(p.as_rule())) {
        let clause_location = rules::get_location_from_pair(&clause, script);
        let is_case = clause.as_rule() == Rule::case_clause;
        let mut parts = rules::significant_pairs(&clause).peekable();
        let test = match parts.peek() {
            Some(p) if is_case && p.as_rule() == Rule::expression => {
                let p = p.clone();
                parts.next();
                Some(parse_expression_rule(p, script)?)
            }
            _ => None,
        };
        clauses.push(SwitchClause {
            test,
            body: parse_statement_list(parts, script)?,
            location: clause_location,
        });
    }
    Ok(StatementKind::Switch { discriminant, clauses })
}

fn parse_try_statement_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<StatementKind> {
    let mut block = Vec::new();
    let mut handler = None;
    let mut finalizer = None;
    for inner in rules::significant_pairs(&pair) {
        match inner.as_rule() {
            Rule::block => block = parse_statement_list(inner.into_inner(), script)?,
            Rule::catch_clause => {
                let (mut parts, loc, span) = rules::get_data_from_rule(&inner, script);
                let param = parse_identifier_rule(rules::fetch_next_pair(&mut parts, &loc, &span)?, script);
                let body_pair = rules::fetch_next_pair(&mut parts, &loc, &span)?;
                handler = Some(CatchClause {
                    param,
                    body: parse_statement_list(body_pair.into_inner(), script)?,
                });
            }
            Rule::finally_clause => {
                let (mut parts, loc, span) = rules::get_data_from_rule(&inner, script);
                let body_pair = rules::fetch_next_pair(&mut parts, &loc, &span)?;
                finalizer = Some(parse_statement_list(body_pair.into_inner(), script)?);
            }
            _ => {}
        }
    }
    Ok(StatementKind::Try {
        block,
        handler,
        finalizer,
    })
}

/// Parses a `function_declaration` or `function_expression` rule.
pub(crate) fn parse_function_rule(
    pair: Pair<Rule>,
    kind: FunctionKind,
    script: &Script,
) -> ParseResult<FunctionNode> {
    let location = rules::get_location_from_pair(&pair, script);
    let mut name = None;
    let mut formals = Vec::new();
    let mut body = Vec::new();
    for inner in rules::significant_pairs(&pair) {
        match inner.as_rule() {
            Rule::identifier => name = Some(parse_identifier_rule(inner, script)),
            Rule::formal_parameter_list => {
                formals = inner.into_inner().map(|p| parse_identifier_rule(p, script)).collect();
            }
            Rule::function_body => body = parse_statement_list(inner.into_inner(), script)?,
            _ => {}
        }
    }
    Ok(FunctionNode::new(kind, name, formals, body, location))
}

/// Parses the body of a getter or setter. `formal` is the setter's parameter.
pub(crate) fn parse_accessor_body(
    body: Pair<Rule>,
    kind: FunctionKind,
    formal: Option<Identifier>,
    location: crate::location::Location,
    script: &Script,
) -> ParseResult<FunctionNode> {
    let statements = parse_statement_list(body.into_inner(), script)?;
    Ok(FunctionNode::new(kind, None, formal.into_iter().collect(), statements, location))
}
