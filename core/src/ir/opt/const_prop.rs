//! file: core/src/ir/opt/const_prop.rs
//! description: block-local sharing of temps that hold the same literal.
//!
//! When a temp is assigned a literal (or `this`) that another temp in the
//! same block already holds, later reads of the second temp are redirected
//! to the first. The stores themselves stay; dead-assignment elimination
//! removes the ones nobody reads any more. Functions with a `try` are left
//! alone because exception edges leave a block from the middle.
//!
use std::collections::HashMap;

use crate::ir::module::{Expr, Function, Name, Stmt, Temp};
use crate::ir::value::Const;

/// A literal value, keyed so that `+0`/`-0` differ and `NaN` never occurs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    This,
    String(String),
}

impl Literal {
    fn of_const(value: Const) -> Option<Literal> {
        match value {
            Const::Undefined => Some(Literal::Undefined),
            Const::Null => Some(Literal::Null),
            Const::Bool(b) => Some(Literal::Bool(b)),
            Const::Number(n) if n.is_nan() => None,
            Const::Number(n) => Some(Literal::Number(n.to_bits())),
            Const::Missing => None,
        }
    }

    /// The literal as an operand. `this` is not a literal operand.
    fn to_expr(&self) -> Option<Expr> {
        match self {
            Literal::Undefined => Some(Expr::Const(Const::Undefined)),
            Literal::Null => Some(Expr::Const(Const::Null)),
            Literal::Bool(b) => Some(Expr::Const(Const::Bool(*b))),
            Literal::Number(bits) => Some(Expr::Const(Const::Number(f64::from_bits(*bits)))),
            Literal::String(s) => Some(Expr::String(s.clone())),
            Literal::This => None,
        }
    }
}

#[derive(Default)]
struct BlockState {
    temp_for_value: HashMap<Literal, usize>,
    value_for_temp: HashMap<usize, Literal>,
    replacement: HashMap<usize, usize>,
}

impl BlockState {
    fn reset(&mut self, this_temp: Option<usize>) {
        self.temp_for_value.clear();
        self.value_for_temp.clear();
        self.replacement.clear();
        if let Some(t) = this_temp {
            self.temp_for_value.insert(Literal::This, t);
        }
    }

    /// Forgets whatever `t` held and every read redirected to or from it.
    fn invalidate(&mut self, t: usize) {
        if let Some(old) = self.value_for_temp.remove(&t)
            && self.temp_for_value.get(&old) == Some(&t)
        {
            self.temp_for_value.remove(&old);
        }
        self.temp_for_value.retain(|_, holder| *holder != t);
        self.replacement.remove(&t);
        self.replacement.retain(|_, target| *target != t);
    }

    /// Records that `t` now holds `value`.
    fn check(&mut self, t: usize, value: Literal) {
        if self.value_for_temp.get(&t) == Some(&value) {
            return;
        }
        self.invalidate(t);
        match self.temp_for_value.get(&value) {
            Some(&holder) if holder != t => {
                self.replacement.insert(t, holder);
            }
            _ => {
                self.temp_for_value.insert(value.clone(), t);
            }
        }
        self.value_for_temp.insert(t, value);
    }

    fn rewrite(&self, expr: &mut Expr) {
        expr.for_each_temp_mut(&mut |temp: &mut Temp| {
            if temp.scope != 0 || temp.index < 0 {
                return;
            }
            if let Some(&replacement) = self.replacement.get(&(temp.index as usize)) {
                temp.index = replacement as i32;
            }
        });
    }
}

pub fn propagate_constants(function: &mut Function) {
    if function.has_try || function.blocks.is_empty() {
        return;
    }
    let first_tracked = function.first_tracked_slot();

    let this_temp = if function.has_with {
        None
    } else {
        let t = function.new_temp();
        function.blocks[0].statements.insert(
            0,
            Stmt::Move {
                target: Expr::temp(t),
                source: Expr::name("this", 0, 0),
                op: None,
            },
        );
        Some(t)
    };

    let mut state = BlockState::default();
    let mut rewritten = 0usize;
    for block in &mut function.blocks {
        state.reset(this_temp);
        for stmt in &mut block.statements {
            match stmt {
                Stmt::Move { target, source, op } => {
                    state.rewrite(source);
                    let slot = target.as_temp().and_then(|t| t.slot()).filter(|s| *s >= first_tracked);
                    let Some(slot) = slot else {
                        state.rewrite(target);
                        continue;
                    };
                    let forwarded = match (&*source, op.is_none()) {
                        (Expr::Temp(t), true) => t
                            .slot()
                            .and_then(|s| state.value_for_temp.get(&s))
                            .and_then(Literal::to_expr),
                        _ => None,
                    };
                    if let Some(literal) = forwarded {
                        *source = literal;
                        rewritten += 1;
                    }
                    let literal = match (&*source, op.is_none()) {
                        (Expr::Name(Name { id, .. }), true) if id == "this" && this_temp.is_some() => Some(Literal::This),
                        (Expr::Const(c), true) => Literal::of_const(*c),
                        (Expr::String(s), true) => Some(Literal::String(s.clone())),
                        (Expr::Temp(t), true) => t.slot().and_then(|s| state.value_for_temp.get(&s).cloned()),
                        _ => None,
                    };
                    match literal {
                        Some(value) => {
                            if state.replacement.contains_key(&slot) || state.temp_for_value.contains_key(&value) {
                                rewritten += 1;
                            }
                            state.check(slot, value);
                        }
                        None => state.invalidate(slot),
                    }
                }
                Stmt::Exp(expr) | Stmt::Ret(expr) | Stmt::CJump { cond: expr, .. } => state.rewrite(expr),
                Stmt::Jump(_) | Stmt::Try { .. } => {}
            }
        }
    }
    log::trace!(
        "{}: constant propagation rewrote {} operand(s)",
        function.display_name(),
        rewritten
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(target: usize, source: Expr) -> Stmt {
        Stmt::Move {
            target: Expr::temp(target),
            source,
            op: None,
        }
    }

    fn single_block(statements: Vec<Stmt>, temps: usize) -> Function {
        let mut f = Function::new(0, "f", None);
        f.new_block();
        f.temp_count = temps;
        f.blocks[0].statements = statements;
        f
    }

    #[test]
    fn second_holder_of_a_literal_reads_the_first() {
        let mut f = single_block(
            vec![
                mv(0, Expr::Const(Const::Number(1.0))),
                mv(1, Expr::Const(Const::Number(1.0))),
                Stmt::Ret(Expr::temp(1)),
            ],
            2,
        );
        propagate_constants(&mut f);
        // this-temp prologue comes first.
        assert_eq!(f.blocks[0].statements[0], mv(2, Expr::name("this", 0, 0)));
        assert_eq!(f.blocks[0].statements[3], Stmt::Ret(Expr::temp(0)));
    }

    #[test]
    fn negative_zero_is_not_shared_with_zero() {
        let mut f = single_block(
            vec![
                mv(0, Expr::Const(Const::Number(0.0))),
                mv(1, Expr::Const(Const::Number(-0.0))),
                Stmt::Ret(Expr::temp(1)),
            ],
            2,
        );
        propagate_constants(&mut f);
        assert_eq!(f.blocks[0].statements[3], Stmt::Ret(Expr::temp(1)));
    }

    #[test]
    fn reassigning_the_holder_cancels_the_sharing() {
        let mut f = single_block(
            vec![
                mv(0, Expr::String("a".into())),
                mv(1, Expr::String("a".into())),
                mv(0, Expr::Call {
                    base: Box::new(Expr::name("f", 0, 0)),
                    args: Vec::new(),
                }),
                Stmt::Ret(Expr::temp(1)),
            ],
            2,
        );
        propagate_constants(&mut f);
        assert_eq!(f.blocks[0].statements[4], Stmt::Ret(Expr::temp(1)));
    }

    #[test]
    fn temp_copies_of_a_literal_read_the_literal() {
        let mut f = single_block(
            vec![
                mv(0, Expr::Const(Const::Number(1.0))),
                mv(1, Expr::temp(0)),
                Stmt::Ret(Expr::temp(1)),
            ],
            2,
        );
        propagate_constants(&mut f);
        assert_eq!(f.blocks[0].statements[2], mv(1, Expr::Const(Const::Number(1.0))));
        assert_eq!(f.blocks[0].statements[3], Stmt::Ret(Expr::temp(0)));
    }

    #[test]
    fn this_reads_share_the_prologue_temp() {
        let mut f = single_block(vec![mv(0, Expr::name("this", 0, 0)), Stmt::Ret(Expr::temp(0))], 1);
        propagate_constants(&mut f);
        assert_eq!(f.blocks[0].statements[2], Stmt::Ret(Expr::temp(1)));
    }

    #[test]
    fn functions_with_try_are_untouched() {
        let mut f = single_block(vec![mv(0, Expr::Const(Const::Null)), mv(1, Expr::Const(Const::Null))], 2);
        f.has_try = true;
        let before = f.blocks[0].statements.clone();
        propagate_constants(&mut f);
        assert_eq!(f.blocks[0].statements, before);
        assert_eq!(f.temp_count, 2);
    }
}
