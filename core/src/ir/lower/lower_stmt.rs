//! file: core/src/ir/lower/lower_stmt.rs
//! description: statement lowering and structured control flow.
//!
//! Loops, `switch` and labelled statements push a `Loop` frame naming
//! their break and continue blocks. `with`, `catch` and `try` push a
//! `ScopeFrame`; any jump that leaves one of those regions early
//! (`break`, `continue`, `return`) first runs `unwind`, which pops dynamic
//! scopes and emits inline copies of pending `finally` bodies.
//!
use crate::analyzers::CompilationMode;
use crate::ast::{
    CatchClause, Expression, Identifier, Statement, StatementKind, SwitchClause, VariableDeclaration,
};
use crate::error::Abort;
use crate::ir::module::{BlockId, Expr, Stmt, Temp};
use crate::ir::op::{AluOp, Builtin};
use crate::ir::value::Const;
use crate::location::Location;

use super::{Codegen, LoweringContext, ScopeFrame};

impl<'a, 'h> Codegen<'a, 'h> {
    pub(super) fn statement(&mut self, ctx: &mut LoweringContext<'a>, s: &'a Statement) -> Result<(), Abort> {
        let location = &s.location;
        match &s.kind {
            StatementKind::Block(body) => self.statements(ctx, body),
            StatementKind::Variable(declarations) => self.variable_declarations(ctx, declarations),
            StatementKind::Empty | StatementKind::Debugger | StatementKind::FunctionDeclaration(_) => Ok(()),
            StatementKind::Expression(e) => {
                if ctx.mode == CompilationMode::Eval {
                    let value = self.expression(ctx, e)?;
                    self.move_to(ctx, Expr::temp(ctx.return_address), value, None);
                    Ok(())
                } else {
                    self.statement_expr(ctx, e)
                }
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.if_statement(ctx, condition, then_branch, else_branch.as_deref()),
            StatementKind::DoWhile { body, condition } => self.do_while(ctx, body, condition),
            StatementKind::While { condition, body } => self.while_loop(ctx, condition, body),
            StatementKind::For {
                init,
                condition,
                update,
                body,
            } => {
                let (cond, step, end) = self.enter_for(ctx);
                if let Some(init) = init {
                    self.statement_expr(ctx, init)?;
                }
                self.finish_for(ctx, (cond, step, end), condition.as_ref(), update.as_ref(), body)
            }
            StatementKind::LocalFor {
                declarations,
                condition,
                update,
                body,
            } => {
                let (cond, step, end) = self.enter_for(ctx);
                self.variable_declarations(ctx, declarations)?;
                self.finish_for(ctx, (cond, step, end), condition.as_ref(), update.as_ref(), body)
            }
            StatementKind::ForIn { target, object, body } => self.for_in(ctx, ForInTarget::Expression(target), object, body, location),
            StatementKind::LocalForIn {
                declaration,
                object,
                body,
            } => self.for_in(ctx, ForInTarget::Declaration(declaration), object, body, location),
            StatementKind::Continue(label) => self.continue_statement(ctx, label.as_ref(), location),
            StatementKind::Break(label) => self.break_statement(ctx, label.as_ref(), location),
            StatementKind::Return(value) => self.return_statement(ctx, value.as_ref(), location),
            StatementKind::With { object, body } => self.with_statement(ctx, object, body),
            StatementKind::Switch { discriminant, clauses } => self.switch_statement(ctx, discriminant, clauses),
            StatementKind::Labelled { label, body } => self.labelled(ctx, label, body),
            StatementKind::Throw(value) => {
                let value = self.expression(ctx, value)?;
                self.move_to(ctx, Expr::temp(ctx.return_address), value, None);
                let throw_block = ctx.throw_block;
                self.jump(ctx, throw_block);
                Ok(())
            }
            StatementKind::Try {
                block,
                handler,
                finalizer,
            } => self.try_statement(ctx, block, handler.as_ref(), finalizer.as_deref()),
        }
    }

    fn statements(&mut self, ctx: &mut LoweringContext<'a>, body: &'a [Statement]) -> Result<(), Abort> {
        for s in body {
            self.statement(ctx, s)?;
        }
        Ok(())
    }

    fn variable_declarations(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        declarations: &'a [VariableDeclaration],
    ) -> Result<(), Abort> {
        for declaration in declarations {
            self.variable_declaration(ctx, declaration)?;
        }
        Ok(())
    }

    fn variable_declaration(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        declaration: &'a VariableDeclaration,
    ) -> Result<(), Abort> {
        let Some(init) = &declaration.init else {
            return Ok(());
        };
        let value = self.expression(ctx, init)?;
        let name = &declaration.name;
        let env = self.envs.get(ctx.env);
        let target = if env.parent.is_none() || self.function(ctx).inside_with_or_catch > 0 {
            Expr::name(name.name.clone(), name.location.line, name.location.column)
        } else if let Some(index) = env.find_member(&name.name) {
            Expr::Temp(Temp::new(index, 0))
        } else if let Some(position) = env.find_argument(&name.name) {
            // `var` naming a formal rebinds the formal itself.
            Expr::Temp(Temp::formal(position))
        } else {
            return Err(Abort::internal(format!(
                "variable '{}' at {} has no slot",
                name.name, name.location
            )));
        };
        self.move_to(ctx, target, value, None);
        Ok(())
    }

    fn if_statement(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        condition: &'a Expression,
        then_branch: &'a Statement,
        else_branch: Option<&'a Statement>,
    ) -> Result<(), Abort> {
        let iftrue = self.new_block(ctx);
        let iffalse = else_branch.map(|_| self.new_block(ctx));
        let endif = self.new_block(ctx);
        self.condition(ctx, condition, iftrue, iffalse.unwrap_or(endif))?;

        ctx.block = iftrue;
        self.statement(ctx, then_branch)?;
        self.jump(ctx, endif);

        if let (Some(iffalse), Some(else_branch)) = (iffalse, else_branch) {
            ctx.block = iffalse;
            self.statement(ctx, else_branch)?;
            self.jump(ctx, endif);
        }

        ctx.block = endif;
        Ok(())
    }

    fn do_while(&mut self, ctx: &mut LoweringContext<'a>, body: &'a Statement, condition: &'a Expression) -> Result<(), Abort> {
        let loop_body = self.new_block(ctx);
        let loop_cond = self.new_block(ctx);
        let loop_end = self.new_block(ctx);
        ctx.enter_loop(loop_end, Some(loop_cond));

        self.jump(ctx, loop_body);
        ctx.block = loop_body;
        self.statement(ctx, body)?;
        self.jump(ctx, loop_cond);

        ctx.block = loop_cond;
        self.condition(ctx, condition, loop_body, loop_end)?;

        ctx.block = loop_end;
        ctx.leave_loop();
        Ok(())
    }

    fn while_loop(&mut self, ctx: &mut LoweringContext<'a>, condition: &'a Expression, body: &'a Statement) -> Result<(), Abort> {
        let while_cond = self.new_block(ctx);
        let while_body = self.new_block(ctx);
        let while_end = self.new_block(ctx);
        ctx.enter_loop(while_end, Some(while_cond));

        self.jump(ctx, while_cond);
        ctx.block = while_cond;
        self.condition(ctx, condition, while_body, while_end)?;

        ctx.block = while_body;
        self.statement(ctx, body)?;
        self.jump(ctx, while_cond);

        ctx.block = while_end;
        ctx.leave_loop();
        Ok(())
    }

    /// Allocates the `for` blocks, enters the loop and returns
    /// `(cond, step, end)`. The body block is allocated by `finish_for`.
    fn enter_for(&mut self, ctx: &mut LoweringContext<'a>) -> (BlockId, BlockId, BlockId) {
        let cond = self.new_block(ctx);
        let step = self.new_block(ctx);
        let end = self.new_block(ctx);
        ctx.enter_loop(end, Some(step));
        (cond, step, end)
    }

    fn finish_for(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        (cond, step, end): (BlockId, BlockId, BlockId),
        condition: Option<&'a Expression>,
        update: Option<&'a Expression>,
        body: &'a Statement,
    ) -> Result<(), Abort> {
        let for_body = self.new_block(ctx);
        self.jump(ctx, cond);

        ctx.block = cond;
        match condition {
            Some(condition) => self.condition(ctx, condition, for_body, end)?,
            None => self.jump(ctx, for_body),
        }

        ctx.block = for_body;
        self.statement(ctx, body)?;
        self.jump(ctx, step);

        ctx.block = step;
        if let Some(update) = update {
            self.statement_expr(ctx, update)?;
        }
        self.jump(ctx, cond);

        ctx.block = end;
        ctx.leave_loop();
        Ok(())
    }

    fn for_in(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        target: ForInTarget<'a>,
        object: &'a Expression,
        body: &'a Statement,
        location: &Location,
    ) -> Result<(), Abort> {
        let foreach_in = self.new_block(ctx);
        let foreach_body = self.new_block(ctx);
        let foreach_end = self.new_block(ctx);
        ctx.enter_loop(foreach_end, Some(foreach_in));

        if let ForInTarget::Declaration(declaration) = target {
            self.variable_declaration(ctx, declaration)?;
        }

        let object = self.expression(ctx, object)?;
        let iterated = self.new_temp(ctx);
        self.move_to(ctx, Expr::temp(iterated), object, None);
        let iterator = self.new_temp(ctx);
        self.move_to(
            ctx,
            Expr::temp(iterator),
            Expr::builtin_call(Builtin::ForeachIteratorObject, vec![Expr::temp(iterated)]),
            None,
        );
        self.jump(ctx, foreach_in);

        ctx.block = foreach_body;
        let key = self.new_temp(ctx);
        let binding = match target {
            ForInTarget::Declaration(declaration) => {
                self.identifier(ctx, &declaration.name.name, &declaration.name.location)
            }
            ForInTarget::Expression(target) => {
                let binding = self.expression(ctx, target)?;
                if !binding.is_lvalue() {
                    return Err(self.reference_error("Invalid left-hand side expression in for-in statement", location));
                }
                binding
            }
        };
        self.move_to(ctx, binding, Expr::temp(key), None);
        self.statement(ctx, body)?;
        self.jump(ctx, foreach_in);

        ctx.block = foreach_in;
        self.move_to(
            ctx,
            Expr::temp(key),
            Expr::builtin_call(Builtin::ForeachNextPropertyName, vec![Expr::temp(iterator)]),
            None,
        );
        let null = self.new_temp(ctx);
        self.move_to(ctx, Expr::temp(null), Expr::Const(Const::Null), None);
        let more = self.binop(ctx, AluOp::StrictNe, Expr::temp(key), Expr::temp(null));
        self.cjump(ctx, more, foreach_body, foreach_end);

        ctx.block = foreach_end;
        ctx.leave_loop();
        Ok(())
    }

    fn break_statement(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        label: Option<&'a Identifier>,
        location: &Location,
    ) -> Result<(), Abort> {
        if ctx.loops.is_empty() {
            return Err(self.syntax_error("Break outside of loop", location));
        }
        let target = match label {
            None => ctx.loops.last(),
            Some(label) => ctx.loops.iter().rev().find(|l| l.label.as_deref() == Some(label.name.as_str())),
        };
        let Some(target) = target.cloned() else {
            let name = label.map(|l| l.name.as_str()).unwrap_or_default();
            return Err(self.syntax_error(format!("Undefined label '{}'", name), location));
        };
        self.unwind(ctx, target.scope_depth)?;
        self.jump(ctx, target.break_block);
        Ok(())
    }

    fn continue_statement(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        label: Option<&'a Identifier>,
        location: &Location,
    ) -> Result<(), Abort> {
        let target = match label {
            None => ctx.loops.iter().rev().find(|l| l.continue_block.is_some()).cloned(),
            Some(label) => {
                let found = ctx
                    .loops
                    .iter()
                    .rev()
                    .find(|l| l.label.as_deref() == Some(label.name.as_str()))
                    .filter(|l| l.continue_block.is_some())
                    .cloned();
                if found.is_none() {
                    return Err(self.syntax_error(format!("Undefined label '{}'", label.name), location));
                }
                found
            }
        };
        let Some((continue_block, depth)) = target.and_then(|l| l.continue_block.map(|c| (c, l.scope_depth))) else {
            return Err(self.syntax_error("continue outside of loop", location));
        };
        self.unwind(ctx, depth)?;
        self.jump(ctx, continue_block);
        Ok(())
    }

    fn return_statement(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        value: Option<&'a Expression>,
        location: &Location,
    ) -> Result<(), Abort> {
        if ctx.mode != CompilationMode::Function {
            return Err(self.syntax_error("Return statement outside of function", location));
        }
        if let Some(value) = value {
            let value = self.expression(ctx, value)?;
            self.move_to(ctx, Expr::temp(ctx.return_address), value, None);
        }
        self.unwind(ctx, 0)?;
        let exit = ctx.exit_block;
        self.jump(ctx, exit);
        Ok(())
    }

    /// Tears down every scope frame above `outer_depth` on the current
    /// path. The frame stack and the with/catch depth are left as they were.
    fn unwind(&mut self, ctx: &mut LoweringContext<'a>, outer_depth: usize) -> Result<(), Abort> {
        let saved_scopes = ctx.scopes.clone();
        let saved_depth = self.function(ctx).inside_with_or_catch;
        let result = self.unwind_frames(ctx, outer_depth);
        ctx.scopes = saved_scopes;
        self.function_mut(ctx).inside_with_or_catch = saved_depth;
        result
    }

    fn unwind_frames(&mut self, ctx: &mut LoweringContext<'a>, outer_depth: usize) -> Result<(), Abort> {
        while ctx.scopes.len() > outer_depth {
            let Some(frame) = ctx.scopes.pop() else {
                break;
            };
            match frame {
                ScopeFrame::With => {
                    self.emit_builtin(ctx, Builtin::PopScope, Vec::new());
                    self.leave_with_or_catch(ctx);
                }
                ScopeFrame::Catch => self.leave_with_or_catch(ctx),
                ScopeFrame::Try {
                    finally,
                    has_exception,
                } => {
                    self.emit_builtin(ctx, Builtin::FinishTry, vec![Expr::temp(has_exception)]);
                    if let Some(finally) = finally {
                        self.statements(ctx, finally)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn leave_with_or_catch(&mut self, ctx: &LoweringContext<'a>) {
        let function = self.function_mut(ctx);
        function.inside_with_or_catch = function.inside_with_or_catch.saturating_sub(1);
    }

    fn with_statement(&mut self, ctx: &mut LoweringContext<'a>, object: &'a Expression, body: &'a Statement) -> Result<(), Abort> {
        self.function_mut(ctx).has_with = true;

        let with_block = self.new_block(ctx);
        self.jump(ctx, with_block);
        ctx.block = with_block;

        let object = self.expression(ctx, object)?;
        let with_object = self.pin(ctx, object);
        self.emit_builtin(ctx, Builtin::PushWithScope, vec![with_object]);

        self.function_mut(ctx).inside_with_or_catch += 1;
        ctx.scopes.push(ScopeFrame::With);
        self.statement(ctx, body)?;
        ctx.scopes.pop();
        self.leave_with_or_catch(ctx);
        self.emit_builtin(ctx, Builtin::PopScope, Vec::new());

        let next = self.new_block(ctx);
        self.jump(ctx, next);
        ctx.block = next;
        Ok(())
    }

    fn switch_statement(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        discriminant: &'a Expression,
        clauses: &'a [SwitchClause],
    ) -> Result<(), Abort> {
        let switch_end = self.new_block(ctx);
        let value = self.expression(ctx, discriminant)?;
        // Evaluated once; every case compares against the same value.
        let lhs = match value {
            Expr::Temp(_) | Expr::Const(_) => value,
            other => self.pin(ctx, other),
        };
        let switch_cond = ctx.block;

        ctx.enter_loop(switch_end, None);
        let mut clause_blocks = Vec::with_capacity(clauses.len());
        let mut previous: Option<BlockId> = None;
        for clause in clauses {
            let block = self.new_block(ctx);
            clause_blocks.push(block);
            if let Some(previous) = previous {
                // Fall through into the next clause.
                self.function_mut(ctx).jump(previous, block);
            }
            ctx.block = block;
            self.statements(ctx, &clause.body)?;
            previous = Some(ctx.block);
        }
        ctx.leave_loop();
        self.jump(ctx, switch_end);

        ctx.block = switch_cond;
        let mut default_block = None;
        for (clause, &body_block) in clauses.iter().zip(&clause_blocks) {
            let Some(test) = &clause.test else {
                default_block = Some(body_block);
                continue;
            };
            let rhs = self.expression(ctx, test)?;
            let matches = self.binop(ctx, AluOp::StrictEq, lhs.clone(), rhs);
            let next = self.new_block(ctx);
            self.cjump(ctx, matches, body_block, next);
            ctx.block = next;
        }
        if let Some(default_block) = default_block {
            self.jump(ctx, default_block);
        }
        self.jump(ctx, switch_end);

        ctx.block = switch_end;
        Ok(())
    }

    fn labelled(&mut self, ctx: &mut LoweringContext<'a>, label: &'a Identifier, body: &'a Statement) -> Result<(), Abort> {
        if ctx.has_label(&label.name) || ctx.pending_label.as_deref() == Some(label.name.as_str()) {
            return Err(self.syntax_error(format!("Label '{}' has already been declared", label.name), &label.location));
        }
        ctx.pending_label = Some(label.name.clone());
        if body.kind.consumes_label() {
            return self.statement(ctx, body);
        }

        let break_block = self.new_block(ctx);
        ctx.enter_loop(break_block, None);
        self.statement(ctx, body)?;
        self.jump(ctx, break_block);
        ctx.block = break_block;
        ctx.leave_loop();
        Ok(())
    }

    fn try_statement(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        block: &'a [Statement],
        handler: Option<&'a CatchClause>,
        finalizer: Option<&'a [Statement]>,
    ) -> Result<(), Abort> {
        self.function_mut(ctx).has_try = true;
        if let Some(handler) = handler {
            let name = handler.param.name.as_str();
            if self.function(ctx).is_strict && (name == "eval" || name == "arguments") {
                return Err(self.syntax_error(
                    "Catch variable name may not be eval or arguments in strict mode",
                    &handler.param.location,
                ));
            }
        }

        let try_body = self.new_block(ctx);
        let catch_body = self.new_block(ctx);
        // Always present so the handler gets cleaned up.
        let finally_body = self.new_block(ctx);

        // Throws inside the protected region land in the catch body.
        let region_throw = self.new_block(ctx);
        {
            let return_address = ctx.return_address;
            let function = self.function_mut(ctx);
            function.emit(
                region_throw,
                Stmt::Exp(Expr::builtin_call(Builtin::Throw, vec![Expr::temp(return_address)])),
            );
            function.jump(region_throw, catch_body);
        }
        let outer_throw = std::mem::replace(&mut ctx.throw_block, region_throw);

        let has_exception = self.new_temp(ctx);
        self.function_mut(ctx).exception_slots.push(has_exception);
        self.move_to(ctx, Expr::temp(has_exception), Expr::Const(Const::Bool(false)), None);

        ctx.scopes.push(ScopeFrame::Try {
            finally: finalizer,
            has_exception,
        });
        let try_depth = ctx.scopes.len();

        let exception = self.new_temp(ctx);
        self.function_mut(ctx).exception_slots.push(exception);
        let exception_name = handler.map(|h| h.param.name.clone()).unwrap_or_default();
        let current = ctx.block;
        self.function_mut(ctx)
            .try_(current, try_body, catch_body, exception_name, Temp::local(exception));

        ctx.block = try_body;
        self.statements(ctx, block)?;
        self.jump(ctx, finally_body);

        ctx.block = catch_body;
        if handler.is_some() {
            // A throw from inside the catch body comes back here with the
            // flag already set: run the finally body and rethrow.
            let handle = self.new_block(ctx);
            self.function_mut(ctx)
                .cjump(catch_body, Expr::temp(has_exception), finally_body, handle);
            ctx.block = handle;
        }
        self.move_to(ctx, Expr::temp(has_exception), Expr::Const(Const::Bool(true)), None);

        if let Some(handler) = handler {
            self.function_mut(ctx).inside_with_or_catch += 1;
            ctx.scopes.push(ScopeFrame::Catch);
            self.statements(ctx, &handler.body)?;
            ctx.scopes.pop();
            self.leave_with_or_catch(ctx);
            self.move_to(ctx, Expr::temp(has_exception), Expr::Const(Const::Bool(false)), None);
        }
        self.jump(ctx, finally_body);

        ctx.scopes.truncate(try_depth - 1);
        ctx.throw_block = outer_throw;

        let after = self.new_block(ctx);
        ctx.block = finally_body;
        self.emit_builtin(ctx, Builtin::FinishTry, vec![Expr::temp(has_exception)]);
        if let Some(finalizer) = finalizer {
            self.statements(ctx, finalizer)?;
        }

        let rethrow = self.new_block(ctx);
        let current = ctx.block;
        self.function_mut(ctx)
            .cjump(current, Expr::temp(has_exception), rethrow, after);
        ctx.block = rethrow;
        self.move_to(ctx, Expr::temp(ctx.return_address), Expr::temp(exception), None);
        let throw_block = ctx.throw_block;
        self.jump(ctx, throw_block);

        ctx.block = after;
        Ok(())
    }
}

/// The binding a `for-in` loop assigns each key to.
#[derive(Clone, Copy)]
enum ForInTarget<'a> {
    Expression(&'a Expression),
    Declaration(&'a VariableDeclaration),
}
