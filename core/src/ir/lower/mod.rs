//! file: core/src/ir/lower/mod.rs
//! description: the AST -> IR codegen.
//!
//! `Codegen` owns one compilation unit: it runs the environment scan,
//! lowers the program (or a lone function expression) into a `Module` of
//! CFG functions and hands every function to the optimizer. Expression
//! lowering lives in `lower_expr`, literals in `lower_objects` and
//! statements plus control flow in `lower_stmt`; this file holds the entry
//! points, function definition, identifier resolution and the small
//! operand helpers every lowering routine shares.
//!
pub mod err;
mod lower_expr;
mod lower_objects;
mod lower_stmt;
mod lowering_context;

use crate::analyzers::{
    CompilationMode, Environments, Member, MemberKind, UsesArguments, scan_function_expression, scan_program,
};
use crate::ast::err::SyntaxError;
use crate::ast::{FunctionNode, Identifier, NodeId, Program, Statement};
use crate::error::{Abort, ErrorHandler, JsirErrorExt};
use crate::ir::module::{BlockId, Expr, Function, FunctionId, Module, Name, NameKind, Stmt, Temp};
use crate::ir::op::{AluOp, Builtin};
use crate::ir::opt;
use crate::ir::options::CodegenOptions;
use crate::ir::value::{Const, fold_binop, fold_unop};
use crate::location::Location;

use err::{CompileFailedError, InternalError, ReferenceError};
pub(crate) use lowering_context::{LoweringContext, ScopeFrame};

const ISSUER: &str = "jsir.ir.lower";

/// The pieces of a program or function node `define_function` needs.
struct FunctionSource<'a> {
    name: String,
    node: NodeId,
    formals: &'a [Identifier],
    body: &'a [Statement],
    location: Location,
}

impl<'a> FunctionSource<'a> {
    fn of(function: &'a FunctionNode, name: impl Into<String>) -> Self {
        FunctionSource {
            name: name.into(),
            node: function.get_id(),
            formals: &function.formals,
            body: &function.body,
            location: function.location.clone(),
        }
    }
}

pub struct Codegen<'a, 'h> {
    module: Module,
    envs: Environments<'a>,
    handler: &'h mut dyn ErrorHandler,
    options: CodegenOptions,
    file: String,
}

impl<'a, 'h> Codegen<'a, 'h> {
    pub fn new(options: CodegenOptions, handler: &'h mut dyn ErrorHandler) -> Self {
        Codegen {
            module: Module::new(),
            envs: Environments::new(),
            handler,
            options,
            file: String::new(),
        }
    }

    /// Compiles a whole program. The root function is named `%entry`.
    ///
    /// `inherited_locals` only matters for non-strict eval code: the names
    /// become locals of the entry function and are declared at runtime.
    pub fn compile_program(
        mut self,
        program: &'a Program,
        mode: CompilationMode,
        inherited_locals: &[String],
    ) -> Result<Module, Box<dyn JsirErrorExt>> {
        self.file = program.location.file.clone();
        let before = self.handler.error_count();
        log::debug!("compiling '{}' as {:?} code", self.file, mode);

        self.envs = match scan_program(program, mode, self.options.strict, &mut *self.handler) {
            Ok(envs) => envs,
            Err(abort) => return Err(self.failure(abort, before)),
        };
        if self.handler.error_count() > before {
            return Err(self.failure(Abort::Reported { resume: false }, before));
        }

        let source = FunctionSource {
            name: "%entry".to_string(),
            node: program.get_id(),
            formals: &[],
            body: &program.body,
            location: program.location.clone(),
        };
        match self.define_function(source, mode, inherited_locals, None) {
            Ok(root) => self.module.root = Some(root),
            Err(abort) => return Err(self.failure(abort, before)),
        }
        self.finish(before)
    }

    /// Compiles a single function on its own, as if it were defined in an
    /// empty global scope.
    pub fn compile_function_expression(mut self, function: &'a FunctionNode) -> Result<Module, Box<dyn JsirErrorExt>> {
        self.file = function.location.file.clone();
        let before = self.handler.error_count();
        log::debug!("compiling function '{}' from '{}'", function.name_str(), self.file);

        self.envs = match scan_function_expression(function, self.options.strict, &mut *self.handler) {
            Ok(envs) => envs,
            Err(abort) => return Err(self.failure(abort, before)),
        };
        if self.handler.error_count() > before {
            return Err(self.failure(Abort::Reported { resume: false }, before));
        }

        let source = FunctionSource::of(function, function.name_str());
        match self.define_function(source, CompilationMode::Function, &[], None) {
            Ok(root) => self.module.root = Some(root),
            Err(abort) => return Err(self.failure(abort, before)),
        }
        self.finish(before)
    }

    fn finish(mut self, before: usize) -> Result<Module, Box<dyn JsirErrorExt>> {
        if self.handler.error_count() > before {
            return Err(self.failure(Abort::Reported { resume: false }, before));
        }
        opt::optimize_module(&mut self.module, &self.options);
        log::debug!(
            "'{}' compiled into {} function(s)",
            self.file,
            self.module.functions.len()
        );
        Ok(self.module)
    }

    fn failure(&self, abort: Abort, before: usize) -> Box<dyn JsirErrorExt> {
        match abort {
            Abort::Internal(message) => {
                log::error!("internal codegen error in '{}': {}", self.file, message);
                Box::new(InternalError::new(message, self.file.clone()))
            }
            Abort::Reported { .. } => Box::new(CompileFailedError {
                file: self.file.clone(),
                count: self.handler.error_count().saturating_sub(before),
            }),
        }
    }

    fn define_function(
        &mut self,
        source: FunctionSource<'a>,
        mode: CompilationMode,
        inherited_locals: &[String],
        outer: Option<FunctionId>,
    ) -> Result<FunctionId, Abort> {
        let env_id = self
            .envs
            .for_node(source.node)
            .ok_or_else(|| Abort::internal(format!("no environment for function '{}'", source.name)))?;
        let id = self.module.new_function(source.name.clone(), outer);

        let env = self.envs.get_mut(env_id);
        let function = &mut self.module.functions[id];
        let entry = function.new_block();
        let exit = function.new_block();
        let throw = function.new_block();
        function.exit_block = exit;
        function.compilation_mode = mode;
        function.has_direct_eval = env.has_direct_eval;
        function.uses_arguments_object = env.uses_arguments_object == UsesArguments::Used;
        function.max_number_of_arguments = env.max_number_of_arguments;
        function.is_strict = env.is_strict;
        function.is_named_expression = env.is_named_function_expression;
        function.has_nested_functions = env.has_nested_functions;
        function.formals = source.formals.iter().map(|f| f.name.clone()).collect();

        if mode == CompilationMode::Function {
            // Function variables are frame slots initialised to undefined.
            for (local, member) in env.members.iter_mut() {
                function.locals.push(local.clone());
                let t = function.new_temp();
                member.index = t as i32;
                function.emit_move(entry, Expr::temp(t), Expr::Const(Const::Undefined));
            }
        } else {
            // Global and eval variables are properties of the global or
            // calling context and are declared by the runtime.
            if !env.is_strict {
                for local in inherited_locals {
                    function.locals.push(local.clone());
                    let t = function.new_temp();
                    env.members.insert(
                        local.clone(),
                        Member {
                            kind: MemberKind::UndefinedMember,
                            index: t as i32,
                            function: None,
                        },
                    );
                }
            }
            if !env.members.is_empty() {
                let mut args = vec![Expr::Const(Const::Bool(mode == CompilationMode::Eval))];
                args.extend(env.members.keys().map(|name| Expr::name(name.clone(), 0, 0)));
                function.emit(entry, Stmt::Exp(Expr::builtin_call(Builtin::DeclareVars, args)));
            }
        }

        let return_address = function.new_temp();
        function.emit_move(entry, Expr::temp(return_address), Expr::Const(Const::Undefined));
        function.ret(exit, Expr::temp(return_address));
        function.emit(
            throw,
            Stmt::Exp(Expr::builtin_call(Builtin::Throw, vec![Expr::temp(return_address)])),
        );
        function.jump(throw, exit);

        let global_scope = env.parent.is_none();
        let nested: Vec<(&'a FunctionNode, i32)> = env
            .members
            .values()
            .filter_map(|m| m.function.map(|f| (f, m.index)))
            .collect();

        log::trace!(
            "defining '{}' ({} formal(s), {} local(s), {} nested declaration(s))",
            source.name,
            source.formals.len(),
            self.module.functions[id].locals.len(),
            nested.len()
        );

        let mut ctx = LoweringContext::new(id, env_id, mode, entry, exit, throw, return_address);
        for (node, index) in nested {
            let child = self.define_function(
                FunctionSource::of(node, node.name_str()),
                CompilationMode::Function,
                &[],
                Some(id),
            )?;
            let target = if global_scope {
                let location = node.name.as_ref().map(|n| &n.location).unwrap_or(&node.location);
                Expr::name(node.name_str(), location.line, location.column)
            } else if index >= 0 {
                Expr::temp(index as usize)
            } else {
                return Err(Abort::internal(format!(
                    "nested function '{}' has no slot in '{}'",
                    node.name_str(),
                    source.name
                )));
            };
            self.move_to(&ctx, target, Expr::Closure(child), None);
        }

        self.lower_source_elements(&mut ctx, source.body)?;

        let function = &mut self.module.functions[id];
        function.jump(ctx.block, exit);
        // The exit block goes last in layout order.
        let order: Vec<BlockId> = (0..function.blocks.len())
            .filter(|b| *b != exit)
            .chain(std::iter::once(exit))
            .collect();
        function.reorder_blocks(&order);
        if !function.block(function.exit_block).is_terminated() {
            return Err(Abort::internal(format!(
                "exit block of '{}' at {} is not terminated",
                source.name, source.location
            )));
        }
        Ok(id)
    }

    /// Lowers a list of sibling statements. A statement whose lowering was
    /// stopped by a reported diagnostic is dropped, and the next sibling is
    /// lowered when the handler asked to continue.
    fn lower_source_elements(&mut self, ctx: &mut LoweringContext<'a>, body: &'a [Statement]) -> Result<(), Abort> {
        for statement in body {
            let checkpoint = ctx.checkpoint();
            let depth = self.function(ctx).inside_with_or_catch;
            match self.statement(ctx, statement) {
                Ok(()) => {}
                Err(Abort::Reported { resume: true }) => {
                    log::trace!("skipping the rest of the statement at {}", statement.location);
                    ctx.restore(&checkpoint);
                    self.function_mut(ctx).inside_with_or_catch = depth;
                }
                Err(abort) => return Err(abort),
            }
        }
        Ok(())
    }

    /// Resolves a name to a frame slot when no dynamic scope can intercept
    /// the lookup, otherwise to a runtime name lookup.
    fn identifier(&self, ctx: &LoweringContext<'a>, name: &str, location: &Location) -> Expr {
        let mut scope = 0u32;
        let mut env_id = ctx.env;
        let mut current = Some(ctx.function);

        while let Some(function_id) = current {
            let env = self.envs.get(env_id);
            let Some(parent) = env.parent else {
                break;
            };
            let f = &self.module.functions[function_id];
            if (f.uses_arguments_object && name == "arguments")
                || (!f.is_strict && f.has_direct_eval)
                || f.inside_with_or_catch > 0
                || (f.is_named_expression && f.name == name)
            {
                break;
            }
            if let Some(index) = env.find_member(name) {
                return Expr::Temp(Temp::new(index, scope));
            }
            if let Some(position) = env.find_argument(name) {
                return Expr::Temp(Temp::new(-(position as i32) - 1, scope));
            }
            scope += 1;
            env_id = parent;
            current = f.outer;
        }

        let at_global_scope = self.envs.get(env_id).parent.is_none();
        let f = current.map(|id| &self.module.functions[id]);
        let kind = if at_global_scope
            && f.is_none_or(|f| f.inside_with_or_catch == 0)
            && ctx.mode != CompilationMode::Eval
            && f.is_none_or(|f| f.name != name)
        {
            NameKind::Global
        } else {
            NameKind::Identifier
        };
        Expr::Name(Name {
            id: name.to_string(),
            kind,
            line: location.line,
            column: location.column,
        })
    }

    fn report(&mut self, error: Box<dyn JsirErrorExt>) -> Abort {
        Abort::Reported {
            resume: self.handler.report(error),
        }
    }

    fn syntax_error(&mut self, message: impl Into<String>, location: &Location) -> Abort {
        self.report(Box::new(SyntaxError::new(message, ISSUER, Some(location.clone()))))
    }

    fn reference_error(&mut self, message: impl Into<String>, location: &Location) -> Abort {
        self.report(Box::new(ReferenceError::new(message, ISSUER, Some(location.clone()))))
    }

    /// Strict code may not assign to or update `eval` and `arguments`.
    fn check_eval_or_arguments(&mut self, ctx: &LoweringContext<'a>, expr: &Expr, location: &Location) -> Result<(), Abort> {
        if !self.envs.get(ctx.env).is_strict {
            return Ok(());
        }
        match expr {
            Expr::Name(n) if n.id == "eval" || n.id == "arguments" => {
                Err(self.syntax_error("Variable name may not be eval or arguments in strict mode", location))
            }
            _ => Ok(()),
        }
    }

    fn function(&self, ctx: &LoweringContext<'a>) -> &Function {
        &self.module.functions[ctx.function]
    }

    fn function_mut(&mut self, ctx: &LoweringContext<'a>) -> &mut Function {
        &mut self.module.functions[ctx.function]
    }

    fn new_temp(&mut self, ctx: &LoweringContext<'a>) -> usize {
        self.function_mut(ctx).new_temp()
    }

    fn new_block(&mut self, ctx: &LoweringContext<'a>) -> BlockId {
        self.function_mut(ctx).new_block()
    }

    fn emit(&mut self, ctx: &LoweringContext<'a>, stmt: Stmt) {
        let block = ctx.block;
        self.function_mut(ctx).emit(block, stmt);
    }

    fn emit_builtin(&mut self, ctx: &LoweringContext<'a>, builtin: Builtin, args: Vec<Expr>) {
        self.emit(ctx, Stmt::Exp(Expr::builtin_call(builtin, args)));
    }

    fn jump(&mut self, ctx: &LoweringContext<'a>, target: BlockId) {
        let block = ctx.block;
        self.function_mut(ctx).jump(block, target);
    }

    /// Evaluates `expr` into a fresh temp.
    fn pin(&mut self, ctx: &LoweringContext<'a>, expr: Expr) -> Expr {
        let t = self.new_temp(ctx);
        self.emit(
            ctx,
            Stmt::Move {
                target: Expr::temp(t),
                source: expr,
                op: None,
            },
        );
        Expr::temp(t)
    }

    fn pin_unless_temp(&mut self, ctx: &LoweringContext<'a>, expr: Expr) -> Expr {
        if expr.is_temp() { expr } else { self.pin(ctx, expr) }
    }

    /// Stores `source` into `target`. Only a temp target may take an
    /// arbitrary expression; anything else gets a temp or literal operand.
    fn move_to(&mut self, ctx: &LoweringContext<'a>, target: Expr, source: Expr, op: Option<AluOp>) {
        let needs_temp = if source.is_temp() {
            false
        } else if source.is_const() {
            op.is_some()
        } else {
            op.is_some() || !target.is_temp()
        };
        let source = if needs_temp { self.pin(ctx, source) } else { source };
        self.emit(ctx, Stmt::Move { target, source, op });
    }

    fn unop(&mut self, ctx: &LoweringContext<'a>, op: AluOp, expr: Expr) -> Expr {
        if let Expr::Const(Const::Number(value)) = expr {
            if op == AluOp::UPlus {
                return expr;
            }
            if let Some(folded) = fold_unop(op, value) {
                return Expr::Const(folded);
            }
        }
        let operand = self.pin_unless_temp(ctx, expr);
        Expr::Unop {
            op,
            expr: Box::new(operand),
        }
    }

    fn binop(&mut self, ctx: &LoweringContext<'a>, op: AluOp, left: Expr, right: Expr) -> Expr {
        match (&left, &right) {
            (Expr::Const(Const::Number(l)), Expr::Const(Const::Number(r))) => {
                if let Some(folded) = fold_binop(op, *l, *r) {
                    return Expr::Const(folded);
                }
            }
            (Expr::String(l), Expr::String(r)) if op == AluOp::Add => {
                return Expr::String(format!("{}{}", l, r));
            }
            _ => {}
        }
        let left = self.pin_unless_temp(ctx, left);
        let right = self.pin_unless_temp(ctx, right);
        Expr::Binop {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// A condition that folded to a literal becomes a plain jump to the
    /// taken arm.
    fn cjump(&mut self, ctx: &LoweringContext<'a>, cond: Expr, iftrue: BlockId, iffalse: BlockId) {
        let known = match &cond {
            Expr::Const(value) => Some(value.is_truthy()),
            Expr::String(text) => Some(!text.is_empty()),
            _ => None,
        };
        if let Some(truthy) = known {
            self.jump(ctx, if truthy { iftrue } else { iffalse });
            return;
        }
        let cond = match cond {
            Expr::Temp(_) | Expr::Binop { .. } => cond,
            other => self.pin(ctx, other),
        };
        let block = ctx.block;
        self.function_mut(ctx).cjump(block, cond, iftrue, iffalse);
    }

    fn member(&mut self, ctx: &LoweringContext<'a>, base: Expr, name: &str) -> Expr {
        let base = self.pin_unless_temp(ctx, base);
        Expr::Member {
            base: Box::new(base),
            name: name.to_string(),
        }
    }

    fn subscript(&mut self, ctx: &LoweringContext<'a>, base: Expr, index: Expr) -> Expr {
        let base = self.pin_unless_temp(ctx, base);
        let index = self.pin_unless_temp(ctx, index);
        Expr::Subscript {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    /// Keeps references intact so the callee sees the right `this`;
    /// everything else is evaluated into a temp.
    fn reference(&mut self, ctx: &LoweringContext<'a>, expr: Expr) -> Expr {
        if expr.is_lvalue() { expr } else { self.pin(ctx, expr) }
    }

    fn call(&mut self, ctx: &LoweringContext<'a>, base: Expr, args: Vec<Expr>) -> Expr {
        let base = self.reference(ctx, base);
        Expr::Call {
            base: Box::new(base),
            args,
        }
    }
}
