use pest::iterators::{Pair, Pairs};
use pest_derive::Parser;

use crate::ast::err::SyntaxError;
use crate::error::{JsirErrorExt, Level};
use crate::location::{Location, Span};
use crate::script::Script;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct RulesParser;

/// Keyword tokens carry no information of their own once the surrounding
/// rule has matched.
pub(crate) fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::k_break
            | Rule::k_case
            | Rule::k_catch
            | Rule::k_continue
            | Rule::k_debugger
            | Rule::k_default
            | Rule::k_do
            | Rule::k_else
            | Rule::k_finally
            | Rule::k_for
            | Rule::k_function
            | Rule::k_get
            | Rule::k_if
            | Rule::k_in
            | Rule::k_new
            | Rule::k_return
            | Rule::k_set
            | Rule::k_switch
            | Rule::k_throw
            | Rule::k_try
            | Rule::k_var
            | Rule::k_while
            | Rule::k_with
    )
}

/// Inner pairs of `pair` with keyword tokens filtered out.
pub(crate) fn significant_pairs<'a>(pair: &Pair<'a, Rule>) -> impl Iterator<Item = Pair<'a, Rule>> {
    pair.clone().into_inner().filter(|p| !is_keyword(p.as_rule()))
}

pub(crate) fn fetch_next_pair<'a>(
    pairs: &mut Pairs<'a, Rule>,
    location: &Location,
    span: &Span,
) -> Result<Pair<'a, Rule>, Box<dyn JsirErrorExt>> {
    loop {
        match pairs.next() {
            Some(pair) if is_keyword(pair.as_rule()) => continue,
            Some(pair) => return Ok(pair),
            None => return Err(unexpected("Expected more inner pairs but found none.", "jsir.ast.rules.fetch_next_pair", location, span)),
        }
    }
}

pub(crate) fn get_data_from_rule<'a>(
    rule: &Pair<'a, Rule>,
    script: &Script,
) -> (Pairs<'a, Rule>, Location, Span) {
    let inner_rules = rule.clone().into_inner();
    let span = get_span_from_pair(rule, script);
    let location = span.start.clone();
    (inner_rules, location, span)
}

fn position_to_location(pos: pest::Position<'_>, script: &Script) -> Location {
    let (line, column) = pos.line_col();
    Location::new(script.name.clone(), line, column, pos.pos())
}

pub fn get_location_from_pair(rule: &Pair<Rule>, script: &Script) -> Location {
    position_to_location(rule.as_span().start_pos(), script)
}

pub fn get_span_from_pair(rule: &Pair<Rule>, script: &Script) -> Span {
    let span = rule.as_span();
    Span::new(
        position_to_location(span.start_pos(), script),
        position_to_location(span.end_pos(), script),
    )
}

/// Builds the boxed error every builder returns when the tree does not have
/// the shape the grammar promises.
pub(crate) fn unexpected(message: &str, issuer: &str, location: &Location, span: &Span) -> Box<dyn JsirErrorExt> {
    Box::new(SyntaxError::with(
        Level::Error,
        message.to_string(),
        issuer.to_string(),
        Some(location.clone()),
        Some(span.clone()),
    ))
}
