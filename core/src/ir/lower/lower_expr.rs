//! file: core/src/ir/lower/lower_expr.rs
//! description: expression lowering.
//!
//! Every expression is lowered in one of three moods. `Ex` wants a value
//! back, `Cx` wants control to land in one of two blocks and `Nx` only
//! cares about side effects. Literals and comparisons in `Cx` jump
//! directly; anything that still produces a value there is branched on by
//! `condition`.
//!
use crate::analyzers::CompilationMode;
use crate::ast::{
    BinaryOperator, Expression, ExpressionKind, LogicalOperator, UnaryOperator, UpdateOperator,
};
use crate::error::Abort;
use crate::ir::module::{BlockId, Expr, Stmt};
use crate::ir::op::{AluOp, Builtin};
use crate::ir::value::Const;

use super::{Codegen, FunctionSource, LoweringContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mood {
    Ex,
    Cx { iftrue: BlockId, iffalse: BlockId },
    Nx,
}

impl<'a, 'h> Codegen<'a, 'h> {
    /// Lowers `e` for its value.
    pub(super) fn expression(&mut self, ctx: &mut LoweringContext<'a>, e: &'a Expression) -> Result<Expr, Abort> {
        self.accept(ctx, e, Mood::Ex)?
            .ok_or_else(|| Abort::internal(format!("expression at {} produced no value", e.location)))
    }

    /// Lowers `e` as a branch.
    pub(super) fn condition(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        e: &'a Expression,
        iftrue: BlockId,
        iffalse: BlockId,
    ) -> Result<(), Abort> {
        if let Some(value) = self.accept(ctx, e, Mood::Cx { iftrue, iffalse })? {
            self.cjump(ctx, value, iftrue, iffalse);
        }
        Ok(())
    }

    /// Lowers `e` for its side effects.
    pub(super) fn statement_expr(&mut self, ctx: &mut LoweringContext<'a>, e: &'a Expression) -> Result<(), Abort> {
        match self.accept(ctx, e, Mood::Nx)? {
            None | Some(Expr::Temp(_)) => {}
            Some(call @ Expr::Call { .. }) => self.emit(ctx, Stmt::Exp(call)),
            Some(other) => {
                let t = self.new_temp(ctx);
                self.move_to(ctx, Expr::temp(t), other, None);
            }
        }
        Ok(())
    }

    /// Lowers a call or `new` argument list. Every argument ends up in a
    /// temp so later arguments cannot observe side effects out of order.
    fn argument_list(&mut self, ctx: &mut LoweringContext<'a>, arguments: &'a [Expression]) -> Result<Vec<Expr>, Abort> {
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let value = self.expression(ctx, argument)?;
            args.push(self.pin_unless_temp(ctx, value));
        }
        Ok(args)
    }

    fn jump_on_literal(&mut self, ctx: &mut LoweringContext<'a>, value: Const, mood: Mood) -> Option<Expr> {
        match mood {
            Mood::Cx { iftrue, iffalse } => {
                self.jump(ctx, if value.is_truthy() { iftrue } else { iffalse });
                None
            }
            _ => Some(Expr::Const(value)),
        }
    }

    pub(super) fn accept(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        e: &'a Expression,
        mood: Mood,
    ) -> Result<Option<Expr>, Abort> {
        let location = &e.location;
        match &e.kind {
            ExpressionKind::This => Ok(Some(Expr::name("this", location.line, location.column))),
            ExpressionKind::Identifier(name) => Ok(Some(self.identifier(ctx, name, location))),
            ExpressionKind::Null => Ok(self.jump_on_literal(ctx, Const::Null, mood)),
            ExpressionKind::Boolean(value) => Ok(self.jump_on_literal(ctx, Const::Bool(*value), mood)),
            ExpressionKind::Number(value) => Ok(self.jump_on_literal(ctx, Const::Number(*value), mood)),
            ExpressionKind::String { value, .. } => Ok(Some(Expr::String(value.clone()))),
            ExpressionKind::RegExp { pattern, flags } => Ok(Some(Expr::RegExp {
                pattern: pattern.clone(),
                flags: flags.clone(),
            })),
            ExpressionKind::Array(elements) => self.array_literal(ctx, elements).map(Some),
            ExpressionKind::Object(properties) => self.object_literal(ctx, properties).map(Some),
            ExpressionKind::Function(function) => {
                let id = self.define_function(
                    FunctionSource::of(function, function.name_str()),
                    CompilationMode::Function,
                    &[],
                    Some(ctx.function),
                )?;
                Ok(Some(Expr::Closure(id)))
            }
            ExpressionKind::Member { object, property } => {
                let base = self.expression(ctx, object)?;
                Ok(Some(self.member(ctx, base, property)))
            }
            ExpressionKind::Subscript { object, index } => {
                let base = self.expression(ctx, object)?;
                let index = self.expression(ctx, index)?;
                Ok(Some(self.subscript(ctx, base, index)))
            }
            ExpressionKind::Call { callee, arguments } => {
                let base = self.expression(ctx, callee)?;
                let args = self.argument_list(ctx, arguments)?;
                Ok(Some(self.call(ctx, base, args)))
            }
            ExpressionKind::New { callee, arguments } => {
                let base = self.expression(ctx, callee)?;
                let base = match base {
                    Expr::Temp(_) | Expr::Name(_) | Expr::Member { .. } => base,
                    other => self.pin(ctx, other),
                };
                match arguments {
                    None => Ok(Some(Expr::New {
                        base: Box::new(base),
                        args: Vec::new(),
                    })),
                    Some(arguments) => {
                        let args = self.argument_list(ctx, arguments)?;
                        let constructed = Expr::New {
                            base: Box::new(base),
                            args,
                        };
                        Ok(Some(self.pin(ctx, constructed)))
                    }
                }
            }
            ExpressionKind::Unary { op, operand } => self.unary(ctx, *op, operand, e),
            ExpressionKind::Update { op, prefix, operand } => self.update(ctx, *op, *prefix, operand, e, mood),
            ExpressionKind::Binary { op, left, right } => self.binary(ctx, *op, left, right, mood),
            ExpressionKind::Logical { op, left, right } => self.logical(ctx, *op, left, right, mood),
            ExpressionKind::Assign { op, target, value } => self.assignment(ctx, *op, target, value, e, mood),
            ExpressionKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let iftrue = self.new_block(ctx);
                let iffalse = self.new_block(ctx);
                let endif = self.new_block(ctx);
                let t = self.new_temp(ctx);

                self.condition(ctx, test, iftrue, iffalse)?;

                ctx.block = iftrue;
                let value = self.expression(ctx, consequent)?;
                self.move_to(ctx, Expr::temp(t), value, None);
                self.jump(ctx, endif);

                ctx.block = iffalse;
                let value = self.expression(ctx, alternate)?;
                self.move_to(ctx, Expr::temp(t), value, None);
                self.jump(ctx, endif);

                ctx.block = endif;
                Ok(Some(Expr::temp(t)))
            }
            ExpressionKind::Sequence { left, right } => {
                self.statement_expr(ctx, left)?;
                self.accept(ctx, right, mood)
            }
        }
    }

    fn unary(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        op: UnaryOperator,
        operand: &'a Expression,
        e: &'a Expression,
    ) -> Result<Option<Expr>, Abort> {
        match op {
            UnaryOperator::Delete => self.delete_expression(ctx, operand, &e.location).map(Some),
            UnaryOperator::Void => {
                self.statement_expr(ctx, operand)?;
                Ok(Some(Expr::Const(Const::Undefined)))
            }
            UnaryOperator::TypeOf => {
                let value = self.expression(ctx, operand)?;
                let value = self.reference(ctx, value);
                Ok(Some(Expr::builtin_call(Builtin::TypeOf, vec![value])))
            }
            UnaryOperator::Not | UnaryOperator::Minus | UnaryOperator::Plus | UnaryOperator::Tilde => {
                let alu = AluOp::from_unary(op)
                    .ok_or_else(|| Abort::internal(format!("no ALU operator for {:?}", op)))?;
                let value = self.expression(ctx, operand)?;
                let result = self.unop(ctx, alu, value);
                let t = self.new_temp(ctx);
                self.move_to(ctx, Expr::temp(t), result, None);
                Ok(Some(Expr::temp(t)))
            }
        }
    }

    fn update(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        op: UpdateOperator,
        prefix: bool,
        operand: &'a Expression,
        e: &'a Expression,
        mood: Mood,
    ) -> Result<Option<Expr>, Abort> {
        let value = self.expression(ctx, operand)?;
        if !value.is_lvalue() {
            let message = if prefix {
                "Invalid left-hand side expression in prefix operation"
            } else {
                "Invalid left-hand side expression in postfix operation"
            };
            return Err(self.reference_error(message, &e.location));
        }
        self.check_eval_or_arguments(ctx, &value, &e.location)?;

        let alu = match op {
            UpdateOperator::Increment => AluOp::Increment,
            UpdateOperator::Decrement => AluOp::Decrement,
        };
        if prefix || mood == Mood::Nx {
            let updated = self.unop(ctx, alu, value.clone());
            self.move_to(ctx, value.clone(), updated, None);
            return Ok(if mood == Mood::Nx { None } else { Some(value) });
        }

        let builtin = match op {
            UpdateOperator::Increment => Builtin::PostIncrement,
            UpdateOperator::Decrement => Builtin::PostDecrement,
        };
        Ok(Some(Expr::builtin_call(builtin, vec![value])))
    }

    fn binary(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        op: BinaryOperator,
        left: &'a Expression,
        right: &'a Expression,
        mood: Mood,
    ) -> Result<Option<Expr>, Abort> {
        let alu = AluOp::from_binary(op);
        let lhs = self.expression(ctx, left)?;
        // The left operand is evaluated before anything the right one does.
        let lhs = match lhs {
            Expr::Temp(_) | Expr::Const(_) => lhs,
            other => self.pin(ctx, other),
        };
        let rhs = self.expression(ctx, right)?;
        let value = self.binop(ctx, alu, lhs, rhs);

        if let (true, Mood::Cx { iftrue, iffalse }) = (alu.is_comparison(), mood) {
            self.cjump(ctx, value, iftrue, iffalse);
            return Ok(None);
        }
        match value {
            Expr::Temp(_) | Expr::Const(_) | Expr::String(_) => Ok(Some(value)),
            other => Ok(Some(self.pin(ctx, other))),
        }
    }

    fn logical(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        op: LogicalOperator,
        left: &'a Expression,
        right: &'a Expression,
        mood: Mood,
    ) -> Result<Option<Expr>, Abort> {
        if let Mood::Cx { iftrue, iffalse } = mood {
            let rhs_block = self.new_block(ctx);
            match op {
                LogicalOperator::And => self.condition(ctx, left, rhs_block, iffalse)?,
                LogicalOperator::Or => self.condition(ctx, left, iftrue, rhs_block)?,
            }
            ctx.block = rhs_block;
            self.condition(ctx, right, iftrue, iffalse)?;
            return Ok(None);
        }

        let r = self.new_temp(ctx);
        let lhs = self.expression(ctx, left)?;
        self.move_to(ctx, Expr::temp(r), lhs, None);
        let rhs_block = self.new_block(ctx);
        let endif = self.new_block(ctx);
        match op {
            LogicalOperator::And => self.cjump(ctx, Expr::temp(r), rhs_block, endif),
            LogicalOperator::Or => self.cjump(ctx, Expr::temp(r), endif, rhs_block),
        }
        ctx.block = rhs_block;
        let rhs = self.expression(ctx, right)?;
        self.move_to(ctx, Expr::temp(r), rhs, None);
        self.jump(ctx, endif);
        ctx.block = endif;
        Ok(Some(Expr::temp(r)))
    }

    fn assignment(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        op: Option<BinaryOperator>,
        target: &'a Expression,
        value: &'a Expression,
        e: &'a Expression,
        mood: Mood,
    ) -> Result<Option<Expr>, Abort> {
        let lhs = self.expression(ctx, target)?;
        if !lhs.is_lvalue() {
            return Err(match op {
                None => self.reference_error("left-hand side of assignment operator is not an lvalue", &e.location),
                Some(_) => self.syntax_error("left-hand side of inplace operator is not an lvalue", &e.location),
            });
        }
        self.check_eval_or_arguments(ctx, &lhs, &e.location)?;
        let rhs = self.expression(ctx, value)?;
        let alu = op.map(AluOp::from_binary);

        if mood == Mood::Nx {
            self.move_to(ctx, lhs, rhs, alu);
            return Ok(None);
        }
        let t = self.new_temp(ctx);
        self.move_to(ctx, Expr::temp(t), rhs, None);
        match alu {
            None => {
                self.move_to(ctx, lhs, Expr::temp(t), None);
                Ok(Some(Expr::temp(t)))
            }
            Some(alu) => {
                self.move_to(ctx, lhs.clone(), Expr::temp(t), Some(alu));
                Ok(Some(lhs))
            }
        }
    }
}
