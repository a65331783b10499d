//! file: core/src/analyzers/scan.rs
//! description: the environment scan run before lowering.
//!
//! Walks the whole unit once, creates an `Environment` per program and
//! function body, enters every declared name and records the facts the
//! codegen needs up front: strictness, direct `eval`, use of the
//! `arguments` object and the widest argument list of any call site.
//! Early errors found here go to the `ErrorHandler`; the walk carries on
//! when the handler asks it to.
//!
use std::collections::HashSet;

use lazy_static::lazy_static;

use crate::analyzers::environment::{
    CompilationMode, EnvId, Environment, Environments, MemberKind, UsesArguments,
};
use crate::ast::err::SyntaxError;
use crate::ast::{
    Expression, ExpressionKind, FunctionNode, NodeId, Program, PropertyValue, Statement, StatementKind,
    VariableDeclaration,
};
use crate::error::{Abort, ErrorHandler};
use crate::location::Location;

lazy_static! {
    static ref STRICT_RESERVED_WORDS: HashSet<&'static str> = [
        "implements",
        "interface",
        "let",
        "package",
        "private",
        "protected",
        "public",
        "static",
        "yield",
    ]
    .into_iter()
    .collect();
}

/// Node id used for the synthetic global environment that encloses a
/// function compiled on its own. Real nodes are numbered from 1.
pub const SYNTHETIC_GLOBAL_NODE: NodeId = 0;

pub fn scan_program<'a>(
    program: &'a Program,
    mode: CompilationMode,
    strict: bool,
    handler: &mut dyn ErrorHandler,
) -> Result<Environments<'a>, Abort> {
    let mut scan = ScanFunctions::new(handler, strict);
    scan.enter_environment(program.get_id(), mode);
    scan.check_directive_prologue(&program.body);
    scan.scan_source_elements(&program.body)?;
    scan.leave_environment();
    log::debug!("environment scan created {} environment(s)", scan.envs.len());
    Ok(scan.envs)
}

/// Scans a lone function under a fake, empty global environment so its own
/// locals resolve to temps.
pub fn scan_function_expression<'a>(
    function: &'a FunctionNode,
    strict: bool,
    handler: &mut dyn ErrorHandler,
) -> Result<Environments<'a>, Abort> {
    let mut scan = ScanFunctions::new(handler, strict);
    scan.enter_environment(SYNTHETIC_GLOBAL_NODE, CompilationMode::Global);
    scan.enter_function(function, false, true)?;
    scan.leave_environment();
    Ok(scan.envs)
}

struct ScanFunctions<'a, 'h> {
    envs: Environments<'a>,
    stack: Vec<EnvId>,
    handler: &'h mut dyn ErrorHandler,
    strict: bool,
    in_func_body: bool,
    allow_func_decls: bool,
}

impl<'a, 'h> ScanFunctions<'a, 'h> {
    fn new(handler: &'h mut dyn ErrorHandler, strict: bool) -> Self {
        ScanFunctions {
            envs: Environments::new(),
            stack: Vec::new(),
            handler,
            strict,
            in_func_body: false,
            allow_func_decls: true,
        }
    }

    fn enter_environment(&mut self, node: NodeId, mode: CompilationMode) -> EnvId {
        let parent = self.stack.last().copied();
        let mut env = Environment::new(parent, mode);
        env.is_strict = self.strict || parent.is_some_and(|p| self.envs.get(p).is_strict);
        let id = self.envs.alloc(node, env);
        self.stack.push(id);
        id
    }

    fn leave_environment(&mut self) {
        self.stack.pop();
    }

    fn env(&mut self) -> &mut Environment<'a> {
        let id = self.stack.last().copied().unwrap_or_default();
        self.envs.get_mut(id)
    }

    fn is_strict(&mut self) -> bool {
        self.env().is_strict
    }

    fn note_argument_count(&mut self, argc: usize) {
        let env = self.env();
        env.max_number_of_arguments = env.max_number_of_arguments.max(argc);
    }

    fn syntax_error(&mut self, message: impl Into<String>, location: &Location) -> Result<(), Abort> {
        let error = SyntaxError::new(message, "jsir.analyzers.scan", Some(location.clone()));
        if self.handler.report(Box::new(error)) {
            Ok(())
        } else {
            Err(Abort::Reported { resume: false })
        }
    }

    /// Runs `f` with the two statement-position flags temporarily replaced.
    fn with_flags<F>(&mut self, in_func_body: bool, allow_func_decls: bool, f: F) -> Result<(), Abort>
    where
        F: FnOnce(&mut Self) -> Result<(), Abort>,
    {
        let saved = (self.in_func_body, self.allow_func_decls);
        self.in_func_body = in_func_body;
        self.allow_func_decls = allow_func_decls;
        let result = f(self);
        (self.in_func_body, self.allow_func_decls) = saved;
        result
    }

    fn check_directive_prologue(&mut self, body: &[Statement]) {
        for statement in body {
            let StatementKind::Expression(Expression {
                kind: ExpressionKind::String { value, raw },
                location,
            }) = &statement.kind
            else {
                break;
            };
            if *raw && value == "use strict" {
                self.env().is_strict = true;
            } else {
                log::warn!("{}: ignoring unknown directive \"{}\"", location, value);
            }
        }
    }

    fn check_name(&mut self, name: &str, location: &Location) -> Result<(), Abort> {
        if self.is_strict() && STRICT_RESERVED_WORDS.contains(name) {
            self.syntax_error("Unexpected strict mode reserved word", location)?;
        }
        Ok(())
    }

    fn enter_function(&mut self, function: &'a FunctionNode, enter_name: bool, is_expression: bool) -> Result<(), Abort> {
        let name = function.name_str();
        let name_location = function
            .name
            .as_ref()
            .map(|n| n.location.clone())
            .unwrap_or_else(|| function.location.clone());
        if self.is_strict() && (name == "eval" || name == "arguments") {
            self.syntax_error("Function name may not be eval or arguments in strict mode", &name_location)?;
        }

        let was_strict = {
            let parent = self.env();
            parent.has_nested_functions = true;
            if enter_name {
                parent.enter(name, MemberKind::FunctionDefinition, Some(function));
            }
            if name == "arguments" {
                parent.uses_arguments_object = UsesArguments::NotUsed;
            }
            parent.is_strict
        };

        self.enter_environment(function.get_id(), CompilationMode::Function);
        {
            let env = self.env();
            env.formals = function.formals.iter().map(|f| f.name.clone()).collect();
            if env.formals.iter().any(|f| f == "arguments") {
                env.uses_arguments_object = UsesArguments::NotUsed;
            }
            env.is_named_function_expression = is_expression && !name.is_empty();
        }
        self.check_directive_prologue(&function.body);

        if was_strict || self.is_strict() {
            let mut seen: HashSet<&str> = HashSet::new();
            for formal in &function.formals {
                let arg = formal.name.as_str();
                if seen.contains(arg) {
                    self.syntax_error(
                        format!("Duplicate parameter name '{}' is not allowed in strict mode", arg),
                        &formal.location,
                    )?;
                }
                if arg == "eval" || arg == "arguments" {
                    self.syntax_error(
                        format!("'{}' cannot be used as parameter name in strict mode", arg),
                        &formal.location,
                    )?;
                }
                seen.insert(arg);
            }
        }

        let result = self.with_flags(true, true, |scan| scan.scan_source_elements(&function.body));
        self.leave_environment();
        result
    }

    /// Function declarations directly in a program or function body are the
    /// only ones hoisted without a position check.
    fn scan_source_elements(&mut self, body: &'a [Statement]) -> Result<(), Abort> {
        for statement in body {
            match &statement.kind {
                StatementKind::FunctionDeclaration(function) => self.enter_function(function, true, false)?,
                _ => self.scan_statement(statement)?,
            }
        }
        Ok(())
    }

    fn scan_statements(&mut self, body: &'a [Statement]) -> Result<(), Abort> {
        body.iter().try_for_each(|s| self.scan_statement(s))
    }

    fn scan_statement(&mut self, statement: &'a Statement) -> Result<(), Abort> {
        match &statement.kind {
            StatementKind::Block(body) => {
                let allow = if self.is_strict() { false } else { self.allow_func_decls };
                self.with_flags(self.in_func_body, allow, |scan| scan.scan_statements(body))
            }
            StatementKind::Variable(declarations) => self.scan_declarations(declarations),
            StatementKind::Empty
            | StatementKind::Debugger
            | StatementKind::Continue(_)
            | StatementKind::Break(_) => Ok(()),
            StatementKind::Expression(expr) | StatementKind::Throw(expr) => self.scan_expression(expr),
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.scan_expression(condition)?;
                let allow = !self.in_func_body;
                self.with_flags(self.in_func_body, allow, |scan| {
                    scan.scan_statement(then_branch)?;
                    match else_branch {
                        Some(stmt) => scan.scan_statement(stmt),
                        None => Ok(()),
                    }
                })
            }
            StatementKind::DoWhile { body, condition } => {
                let allow = !self.is_strict();
                self.with_flags(self.in_func_body, allow, |scan| scan.scan_statement(body))?;
                self.scan_expression(condition)
            }
            StatementKind::While { condition, body } => {
                self.scan_expression(condition)?;
                let allow = !self.in_func_body;
                self.with_flags(self.in_func_body, allow, |scan| scan.scan_statement(body))
            }
            StatementKind::For {
                init,
                condition,
                update,
                body,
            } => {
                for expr in [init, condition, update].into_iter().flatten() {
                    self.scan_expression(expr)?;
                }
                self.scan_loop_body(body)
            }
            StatementKind::LocalFor {
                declarations,
                condition,
                update,
                body,
            } => {
                self.scan_declarations(declarations)?;
                for expr in [condition, update].into_iter().flatten() {
                    self.scan_expression(expr)?;
                }
                self.scan_loop_body(body)
            }
            StatementKind::ForIn { target, object, body } => {
                self.scan_expression(target)?;
                self.scan_expression(object)?;
                self.scan_loop_body(body)
            }
            StatementKind::LocalForIn {
                declaration,
                object,
                body,
            } => {
                self.scan_declaration(declaration)?;
                self.scan_expression(object)?;
                self.scan_loop_body(body)
            }
            StatementKind::Return(value) => match value {
                Some(expr) => self.scan_expression(expr),
                None => Ok(()),
            },
            StatementKind::With { object, body } => {
                if self.is_strict() {
                    return self.syntax_error("'with' statement is not allowed in strict mode", &statement.location);
                }
                self.scan_expression(object)?;
                self.scan_statement(body)
            }
            StatementKind::Switch { discriminant, clauses } => {
                self.scan_expression(discriminant)?;
                for clause in clauses {
                    if let Some(test) = &clause.test {
                        self.scan_expression(test)?;
                    }
                    self.scan_statements(&clause.body)?;
                }
                Ok(())
            }
            StatementKind::Labelled { body, .. } => self.scan_statement(body),
            StatementKind::Try {
                block,
                handler,
                finalizer,
            } => {
                self.scan_statements(block)?;
                if let Some(catch) = handler {
                    self.scan_statements(&catch.body)?;
                }
                if let Some(finally) = finalizer {
                    self.scan_statements(finally)?;
                }
                Ok(())
            }
            StatementKind::FunctionDeclaration(function) => {
                if !self.allow_func_decls {
                    self.syntax_error("conditional function or closure declaration", &function.location)?;
                }
                self.enter_function(function, true, true)
            }
        }
    }

    fn scan_loop_body(&mut self, body: &'a Statement) -> Result<(), Abort> {
        let allow = !self.is_strict();
        self.with_flags(self.in_func_body, allow, |scan| scan.scan_statement(body))
    }

    fn scan_declarations(&mut self, declarations: &'a [VariableDeclaration]) -> Result<(), Abort> {
        declarations.iter().try_for_each(|d| self.scan_declaration(d))
    }

    fn scan_declaration(&mut self, declaration: &'a VariableDeclaration) -> Result<(), Abort> {
        let name = declaration.name.name.as_str();
        let location = &declaration.name.location;
        if self.is_strict() && (name == "eval" || name == "arguments") {
            self.syntax_error("Variable name may not be eval or arguments in strict mode", location)?;
        }
        self.check_name(name, location)?;
        let kind = if declaration.init.is_some() {
            MemberKind::VariableDefinition
        } else {
            MemberKind::VariableDeclaration
        };
        {
            let env = self.env();
            if name == "arguments" {
                env.uses_arguments_object = UsesArguments::NotUsed;
            }
            env.enter(name, kind, None);
        }
        match &declaration.init {
            Some(init) => self.scan_expression(init),
            None => Ok(()),
        }
    }

    fn scan_expressions(&mut self, exprs: impl IntoIterator<Item = &'a Expression>) -> Result<(), Abort> {
        for expr in exprs {
            self.scan_expression(expr)?;
        }
        Ok(())
    }

    fn scan_expression(&mut self, expr: &'a Expression) -> Result<(), Abort> {
        match &expr.kind {
            ExpressionKind::This
            | ExpressionKind::Null
            | ExpressionKind::Boolean(_)
            | ExpressionKind::Number(_)
            | ExpressionKind::String { .. }
            | ExpressionKind::RegExp { .. } => Ok(()),
            ExpressionKind::Identifier(name) => {
                self.check_name(name, &expr.location)?;
                let env = self.env();
                if env.uses_arguments_object == UsesArguments::Unknown && name == "arguments" {
                    env.uses_arguments_object = UsesArguments::Used;
                }
                Ok(())
            }
            ExpressionKind::Array(elements) => {
                self.note_argument_count(elements.len());
                self.scan_expressions(elements.iter().flatten())
            }
            ExpressionKind::Object(properties) => {
                let argc = properties
                    .iter()
                    .map(|p| if matches!(p.value, PropertyValue::Value(_)) { 1 } else { 2 })
                    .sum();
                self.note_argument_count(argc);
                self.with_flags(self.in_func_body, true, |scan| {
                    for property in properties {
                        match &property.value {
                            PropertyValue::Value(value) => scan.scan_expression(value)?,
                            PropertyValue::Getter(function) | PropertyValue::Setter(function) => {
                                scan.enter_function(function, false, false)?
                            }
                        }
                    }
                    Ok(())
                })
            }
            ExpressionKind::Function(function) => self.enter_function(function, false, true),
            ExpressionKind::Member { object, .. } => self.scan_expression(object),
            ExpressionKind::Subscript { object, index } => {
                self.scan_expression(object)?;
                self.scan_expression(index)
            }
            ExpressionKind::Call { callee, arguments } => {
                {
                    let env = self.env();
                    if !env.has_direct_eval
                        && matches!(&callee.kind, ExpressionKind::Identifier(name) if name == "eval")
                    {
                        if env.uses_arguments_object == UsesArguments::Unknown {
                            env.uses_arguments_object = UsesArguments::Used;
                        }
                        env.has_direct_eval = true;
                    }
                }
                self.note_argument_count(arguments.len());
                self.scan_expression(callee)?;
                self.scan_expressions(arguments)
            }
            ExpressionKind::New { callee, arguments } => {
                if let Some(args) = arguments {
                    self.note_argument_count(args.len());
                }
                self.scan_expression(callee)?;
                self.scan_expressions(arguments.iter().flatten())
            }
            ExpressionKind::Unary { operand, .. } | ExpressionKind::Update { operand, .. } => {
                self.scan_expression(operand)
            }
            ExpressionKind::Binary { left, right, .. }
            | ExpressionKind::Logical { left, right, .. }
            | ExpressionKind::Sequence { left, right } => {
                self.scan_expression(left)?;
                self.scan_expression(right)
            }
            ExpressionKind::Assign { target, value, .. } => {
                self.scan_expression(target)?;
                self.scan_expression(value)
            }
            ExpressionKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.scan_expression(test)?;
                self.scan_expression(consequent)?;
                self.scan_expression(alternate)
            }
        }
    }
}
