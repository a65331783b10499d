use pest::iterators::Pair;

use crate::ast::stmt::{parse_accessor_body, parse_function_rule};
use crate::ast::{
    BinaryOperator, Expression, ExpressionKind, FunctionKind, Identifier, LogicalOperator, Property,
    PropertyValue, Rule, UnaryOperator, UpdateOperator, rules,
};
use crate::error::JsirErrorExt;
use crate::ir::value::number_to_string;
use crate::script::Script;

type ParseResult<T> = Result<T, Box<dyn JsirErrorExt>>;

pub(crate) fn parse_identifier_rule(pair: Pair<Rule>, script: &Script) -> Identifier {
    Identifier::new(pair.as_str(), rules::get_location_from_pair(&pair, script))
}

/// Parses any rule of the expression ladder, from `expression` down to
/// `primary_expression`.
pub(crate) fn parse_expression_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Expression> {
    match pair.as_rule() {
        Rule::expression => parse_sequence_rule(pair, script),
        Rule::assignment_expression => parse_assignment_expression_rule(pair, script),
        Rule::conditional_expression => parse_conditional_expression_rule(pair, script),
        Rule::logical_or_expression
        | Rule::logical_and_expression
        | Rule::bit_or_expression
        | Rule::bit_xor_expression
        | Rule::bit_and_expression
        | Rule::equality_expression
        | Rule::relational_expression
        | Rule::shift_expression
        | Rule::additive_expression
        | Rule::multiplicative_expression => parse_binary_ladder_rule(pair, script),
        Rule::unary_expression => parse_unary_expression_rule(pair, script),
        Rule::postfix_expression => parse_postfix_expression_rule(pair, script),
        Rule::left_hand_side_expression => parse_left_hand_side_rule(pair, script),
        Rule::new_expression => parse_new_expression_rule(pair, script),
        Rule::primary_expression => parse_primary_expression_rule(pair, script),
        other => {
            let (_, location, span) = rules::get_data_from_rule(&pair, script);
            Err(rules::unexpected(
                &format!("Unexpected expression type: {:?}", other),
                "jsir.ast.expr.parse_expression_rule",
                &location,
                &span,
            ))
        }
    }
}

fn parse_sequence_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Expression> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, script);
    let first = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let mut node = parse_expression_rule(first, script)?;
    for right_pair in inner_pairs {
        let right = parse_expression_rule(right_pair, script)?;
        node = Expression::new(
            ExpressionKind::Sequence {
                left: Box::new(node),
                right: Box::new(right),
            },
            location.clone(),
        );
    }
    Ok(node)
}

fn parse_assignment_expression_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Expression> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, script);
    let first = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    if first.as_rule() != Rule::left_hand_side_expression {
        return parse_expression_rule(first, script);
    }

    let target = parse_left_hand_side_rule(first, script)?;
    let op_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let value = parse_expression_rule(rules::fetch_next_pair(&mut inner_pairs, &location, &span)?, script)?;
    let op = match op_pair.as_str() {
        "=" => None,
        token => match BinaryOperator::from_compound_assignment(token) {
            Some(op) => Some(op),
            None => {
                return Err(rules::unexpected(
                    "Invalid assignment operator.",
                    "jsir.ast.expr.parse_assignment_expression_rule",
                    &location,
                    &span,
                ));
            }
        },
    };
    Ok(Expression::new(
        ExpressionKind::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        },
        rules::get_location_from_pair(&op_pair, script),
    ))
}

fn parse_conditional_expression_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Expression> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, script);
    let test = parse_expression_rule(rules::fetch_next_pair(&mut inner_pairs, &location, &span)?, script)?;
    let Some(consequent_pair) = inner_pairs.next() else {
        return Ok(test);
    };
    let consequent = parse_expression_rule(consequent_pair, script)?;
    let alternate = parse_expression_rule(rules::fetch_next_pair(&mut inner_pairs, &location, &span)?, script)?;
    Ok(Expression::new(
        ExpressionKind::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        },
        location,
    ))
}

/// Left-associative `operand (operator operand)*` chains.
fn parse_binary_ladder_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Expression> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, script);
    let left_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let mut node = parse_expression_rule(left_pair, script)?;

    while let Some(op_pair) = inner_pairs.next() {
        let Some(right_pair) = inner_pairs.next() else {
            return Err(rules::unexpected(
                "Missing right-hand operand for binary operator.",
                "jsir.ast.expr.parse_binary_ladder_rule",
                &location,
                &span,
            ));
        };
        let right = Box::new(parse_expression_rule(right_pair, script)?);
        let left = Box::new(node);
        let op_location = rules::get_location_from_pair(&op_pair, script);
        let kind = match op_pair.as_rule() {
            Rule::and_operator => ExpressionKind::Logical {
                op: LogicalOperator::And,
                left,
                right,
            },
            Rule::or_operator => ExpressionKind::Logical {
                op: LogicalOperator::Or,
                left,
                right,
            },
            _ => match BinaryOperator::from_token(op_pair.as_str()) {
                Some(op) => ExpressionKind::Binary { op, left, right },
                None => {
                    return Err(rules::unexpected(
                        &format!("Invalid binary operator '{}'.", op_pair.as_str()),
                        "jsir.ast.expr.parse_binary_ladder_rule",
                        &op_location,
                        &span,
                    ));
                }
            },
        };
        node = Expression::new(kind, op_location);
    }

    Ok(node)
}

fn parse_unary_expression_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Expression> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, script);
    let first = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    if first.as_rule() != Rule::unary_operator {
        return parse_expression_rule(first, script);
    }
    let operand = Box::new(parse_expression_rule(
        rules::fetch_next_pair(&mut inner_pairs, &location, &span)?,
        script,
    )?);
    let kind = match first.as_str() {
        "++" => ExpressionKind::Update {
            op: UpdateOperator::Increment,
            prefix: true,
            operand,
        },
        "--" => ExpressionKind::Update {
            op: UpdateOperator::Decrement,
            prefix: true,
            operand,
        },
        token => {
            let op = match token {
                "delete" => UnaryOperator::Delete,
                "void" => UnaryOperator::Void,
                "typeof" => UnaryOperator::TypeOf,
                "+" => UnaryOperator::Plus,
                "-" => UnaryOperator::Minus,
                "~" => UnaryOperator::Tilde,
                "!" => UnaryOperator::Not,
                _ => {
                    return Err(rules::unexpected(
                        &format!("Invalid unary operator '{}'.", token),
                        "jsir.ast.expr.parse_unary_expression_rule",
                        &location,
                        &span,
                    ));
                }
            };
            ExpressionKind::Unary { op, operand }
        }
    };
    Ok(Expression::new(kind, location))
}

fn parse_postfix_expression_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Expression> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, script);
    let operand = parse_expression_rule(rules::fetch_next_pair(&mut inner_pairs, &location, &span)?, script)?;
    let Some(op_pair) = inner_pairs.next() else {
        return Ok(operand);
    };
    let op = if op_pair.as_str() == "++" {
        UpdateOperator::Increment
    } else {
        UpdateOperator::Decrement
    };
    Ok(Expression::new(
        ExpressionKind::Update {
            op,
            prefix: false,
            operand: Box::new(operand),
        },
        rules::get_location_from_pair(&op_pair, script),
    ))
}

/// `left_hand_side_expression` and `new_callee`: a head followed by call,
/// dot and subscript suffixes.
pub(crate) fn parse_left_hand_side_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Expression> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, script);
    let head = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let mut node = parse_expression_rule(head, script)?;

    for suffix in inner_pairs {
        let suffix_location = rules::get_location_from_pair(&suffix, script);
        let kind = match suffix.as_rule() {
            Rule::arguments => ExpressionKind::Call {
                callee: Box::new(node),
                arguments: parse_arguments_rule(suffix, script)?,
            },
            Rule::dot_member => ExpressionKind::Member {
                object: Box::new(node),
                property: suffix
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default(),
            },
            Rule::subscript_member => {
                let (mut idx_pairs, idx_loc, idx_span) = rules::get_data_from_rule(&suffix, script);
                let index = parse_expression_rule(rules::fetch_next_pair(&mut idx_pairs, &idx_loc, &idx_span)?, script)?;
                ExpressionKind::Subscript {
                    object: Box::new(node),
                    index: Box::new(index),
                }
            }
            other => {
                return Err(rules::unexpected(
                    &format!("Unexpected member suffix: {:?}", other),
                    "jsir.ast.expr.parse_left_hand_side_rule",
                    &suffix_location,
                    &span,
                ));
            }
        };
        node = Expression::new(kind, suffix_location);
    }
    Ok(node)
}

fn parse_arguments_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Vec<Expression>> {
    pair.into_inner().map(|p| parse_expression_rule(p, script)).collect()
}

fn parse_new_expression_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Expression> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, script);
    let callee = parse_left_hand_side_rule(rules::fetch_next_pair(&mut inner_pairs, &location, &span)?, script)?;
    let arguments = inner_pairs.next().map(|p| parse_arguments_rule(p, script)).transpose()?;
    Ok(Expression::new(
        ExpressionKind::New {
            callee: Box::new(callee),
            arguments,
        },
        location,
    ))
}

fn parse_primary_expression_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Expression> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, script);
    let Some(inner) = inner_pairs.next() else {
        return Err(rules::unexpected(
            "Empty primary expression.",
            "jsir.ast.expr.parse_primary_expression_rule",
            &location,
            &span,
        ));
    };
    let kind = match inner.as_rule() {
        Rule::k_this => ExpressionKind::This,
        Rule::function_expression => ExpressionKind::Function(Box::new(parse_function_rule(
            inner,
            FunctionKind::Expression,
            script,
        )?)),
        Rule::null_literal => ExpressionKind::Null,
        Rule::boolean_literal => ExpressionKind::Boolean(inner.as_str() == "true"),
        Rule::numeric_literal => ExpressionKind::Number(parse_number(inner.as_str())),
        Rule::string_literal => {
            let (value, raw) = unescape_string(inner.as_str());
            ExpressionKind::String { value, raw }
        }
        Rule::regexp_literal => {
            let text = inner.as_str();
            let close = text.rfind('/').unwrap_or(0);
            ExpressionKind::RegExp {
                pattern: text[1..close.max(1)].to_string(),
                flags: text[close + 1..].to_string(),
            }
        }
        Rule::identifier => ExpressionKind::Identifier(inner.as_str().to_string()),
        Rule::array_literal => ExpressionKind::Array(parse_array_literal_rule(inner, script)?),
        Rule::object_literal => ExpressionKind::Object(parse_object_literal_rule(inner, script)?),
        Rule::parenthesized => {
            let (mut paren, loc, span) = rules::get_data_from_rule(&inner, script);
            return parse_expression_rule(rules::fetch_next_pair(&mut paren, &loc, &span)?, script);
        }
        other => {
            return Err(rules::unexpected(
                &format!("Unexpected primary expression: {:?}", other),
                "jsir.ast.expr.parse_primary_expression_rule",
                &location,
                &span,
            ));
        }
    };
    Ok(Expression::new(kind, location))
}

fn parse_array_literal_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Vec<Option<Expression>>> {
    let mut items = Vec::new();
    for item in pair.into_inner() {
        let element = item.into_inner().next().map(|p| parse_expression_rule(p, script)).transpose()?;
        items.push(element);
    }
    // A trailing comma does not add a hole: `[a,]` has one element.
    if matches!(items.last(), Some(None)) {
        items.pop();
    }
    Ok(items)
}

fn parse_object_literal_rule(pair: Pair<Rule>, script: &Script) -> ParseResult<Vec<Property>> {
    let mut properties = Vec::new();
    for assignment in pair.into_inner() {
        let (mut inner_pairs, location, span) = rules::get_data_from_rule(&assignment, script);
        let first = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
        let property = match first.as_rule() {
            Rule::getter | Rule::setter => {
                let is_getter = first.as_rule() == Rule::getter;
                let accessor_location = rules::get_location_from_pair(&first, script);
                let (mut parts, loc, span) = rules::get_data_from_rule(&first, script);
                let key = parse_property_name(rules::fetch_next_pair(&mut parts, &loc, &span)?);
                let formal = if is_getter {
                    None
                } else {
                    Some(parse_identifier_rule(rules::fetch_next_pair(&mut parts, &loc, &span)?, script))
                };
                let body = rules::fetch_next_pair(&mut parts, &loc, &span)?;
                let kind = if is_getter {
                    FunctionKind::Getter
                } else {
                    FunctionKind::Setter
                };
                let function = parse_accessor_body(body, kind, formal, accessor_location, script)?;
                let value = if is_getter {
                    PropertyValue::Getter(function)
                } else {
                    PropertyValue::Setter(function)
                };
                Property { key, value, location }
            }
            Rule::property_name => {
                let key = parse_property_name(first);
                let value = parse_expression_rule(rules::fetch_next_pair(&mut inner_pairs, &location, &span)?, script)?;
                Property {
                    key,
                    value: PropertyValue::Value(value),
                    location,
                }
            }
            other => {
                return Err(rules::unexpected(
                    &format!("Unexpected property: {:?}", other),
                    "jsir.ast.expr.parse_object_literal_rule",
                    &location,
                    &span,
                ));
            }
        };
        properties.push(property);
    }
    Ok(properties)
}

/// Canonical key text of a `property_name`: identifiers verbatim, strings
/// unescaped, numbers in their string form (`0x10` is key `"16"`).
fn parse_property_name(pair: Pair<Rule>) -> String {
    let Some(inner) = pair.into_inner().next() else {
        return String::new();
    };
    match inner.as_rule() {
        Rule::string_literal => unescape_string(inner.as_str()).0,
        Rule::numeric_literal => number_to_string(parse_number(inner.as_str())),
        _ => inner.as_str().to_string(),
    }
}

pub(crate) fn parse_number(text: &str) -> f64 {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return hex
            .chars()
            .filter_map(|c| c.to_digit(16))
            .fold(0.0, |acc, d| acc * 16.0 + f64::from(d));
    }
    text.parse::<f64>().unwrap_or(f64::NAN)
}

/// Strips the quotes and resolves escapes. The flag is true when the literal
/// contained no escape sequence at all.
pub(crate) fn unescape_string(literal: &str) -> (String, bool) {
    let body = literal.get(1..literal.len().saturating_sub(1)).unwrap_or("");
    if !body.contains('\\') {
        return (body.to_string(), true);
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else { break };
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !chars.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
            'x' | 'u' => {
                let width = if escaped == 'x' { 2 } else { 4 };
                let digits: String = chars.clone().take(width).collect();
                match u32::from_str_radix(&digits, 16).ok().filter(|_| digits.len() == width).and_then(char::from_u32) {
                    Some(ch) => {
                        out.push(ch);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    None => out.push(escaped),
                }
            }
            // line continuation
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            other => out.push(other),
        }
    }
    (out, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{StatementKind, generate_ast_from_source};

    fn expr(src: &str) -> Expression {
        let script = Script::from_source("expr.js", &format!("{};", src));
        let program = match generate_ast_from_source(&script) {
            Ok(p) => p,
            Err(e) => panic!("parse failed: {}", e),
        };
        match program.body.into_iter().next().map(|s| s.kind) {
            Some(StatementKind::Expression(e)) => e,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn precedence_and_associativity() {
        let e = expr("1 + 2 * 3 - 4");
        let ExpressionKind::Binary { op: BinaryOperator::Sub, left, .. } = e.kind else {
            panic!("expected subtraction at the root");
        };
        let ExpressionKind::Binary { op: BinaryOperator::Add, right, .. } = left.kind else {
            panic!("expected addition on the left");
        };
        assert!(matches!(right.kind, ExpressionKind::Binary { op: BinaryOperator::Mul, .. }));
    }

    #[test]
    fn compound_assignment_keeps_operator() {
        let e = expr("a.b >>>= 2");
        let ExpressionKind::Assign { op, target, .. } = e.kind else {
            panic!("expected assignment");
        };
        assert_eq!(op, Some(BinaryOperator::URShift));
        assert!(matches!(target.kind, ExpressionKind::Member { .. }));
    }

    #[test]
    fn array_holes_and_trailing_comma() {
        let ExpressionKind::Array(items) = expr("[1,,2,]").kind else {
            panic!("expected array");
        };
        assert_eq!(items.len(), 3);
        assert!(items[1].is_none());
        let ExpressionKind::Array(items) = expr("[,]").kind else {
            panic!("expected array");
        };
        assert_eq!(items, vec![None]);
        let ExpressionKind::Array(items) = expr("[]").kind else {
            panic!("expected array");
        };
        assert!(items.is_empty());
    }

    #[test]
    fn object_keys_are_canonical() {
        let ExpressionKind::Object(props) = expr("({ a: 1, 'b': 2, 0x10: 3, get c() { return 1; }, set c(v) {} })").kind
        else {
            panic!("expected object");
        };
        let keys: Vec<&str> = props.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "16", "c", "c"]);
        assert!(matches!(props[3].value, PropertyValue::Getter(_)));
        let PropertyValue::Setter(f) = &props[4].value else {
            panic!("expected setter");
        };
        assert_eq!(f.formals.len(), 1);
    }

    #[test]
    fn string_escapes() {
        assert_eq!(unescape_string(r#""a\nb""#), ("a\nb".to_string(), false));
        assert_eq!(unescape_string(r#"'\x41B'"#), ("AB".to_string(), false));
        assert_eq!(unescape_string("'use strict'"), ("use strict".to_string(), true));
    }

    #[test]
    fn new_with_and_without_arguments() {
        assert!(matches!(expr("new F").kind, ExpressionKind::New { arguments: None, .. }));
        let ExpressionKind::New { arguments: Some(args), callee } = expr("new a.B(1, 2)").kind else {
            panic!("expected new with arguments");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(callee.kind, ExpressionKind::Member { .. }));
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_number("0xff"), 255.0);
        assert_eq!(parse_number("1.5e3"), 1500.0);
        assert_eq!(parse_number(".5"), 0.5);
    }
}
