//! file: core/src/ir/opt/dce.rs
//! description: dead-assignment elimination and unreachable-block removal.
//!
//! Both passes need the liveness data computed just before them. A store
//! is only deleted when its source cannot have a side effect.
//!
use crate::ir::module::{Expr, Function, Stmt, StmtLiveness};

fn is_dead_assignment(
    stmt: &Stmt,
    liveness: &StmtLiveness,
    first_tracked: usize,
    exception_slots: &[usize],
) -> bool {
    let Stmt::Move {
        target,
        source,
        op: None,
    } = stmt
    else {
        return false;
    };
    let Some(slot) = target.as_temp().and_then(|t| t.slot()) else {
        return false;
    };
    if slot < first_tracked || exception_slots.contains(&slot) {
        return false;
    }
    let pure_source = match source {
        Expr::Name(name) => name.is_this(),
        Expr::Const(_) | Expr::Temp(_) => true,
        _ => false,
    };
    pure_source && !liveness.live_out.contains(&slot)
}

/// Deletes stores nobody reads. Returns how many were removed.
pub fn remove_dead_assignments(function: &mut Function) -> usize {
    let first_tracked = function.first_tracked_slot();
    let exception_slots = &function.exception_slots;
    let mut removed = 0;
    for block in &mut function.blocks {
        let mut i = 0;
        while i < block.statements.len() {
            let dead = block
                .stmt_liveness
                .get(i)
                .is_some_and(|liveness| {
                    is_dead_assignment(&block.statements[i], liveness, first_tracked, exception_slots)
                });
            if dead {
                block.remove_statement(i);
                removed += 1;
            } else {
                i += 1;
            }
        }
    }
    removed
}

/// Repeatedly drops the first non-entry block without predecessors. The
/// exit block is kept even when nothing reaches it. Returns how many
/// blocks were dropped.
pub fn remove_unreachable_blocks(function: &mut Function) -> usize {
    let mut dropped = 0;
    loop {
        let exit = function.exit_block;
        let candidate = (1..function.blocks.len()).find(|&b| b != exit && function.blocks[b].incoming.is_empty());
        let Some(dead) = candidate else {
            break;
        };
        let order: Vec<usize> = (0..function.blocks.len()).filter(|&b| b != dead).collect();
        function.reorder_blocks(&order);
        dropped += 1;
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::opt::liveness::compute_liveness;
    use crate::ir::value::Const;

    #[test]
    fn unread_literal_stores_go_away() {
        let mut f = Function::new(0, "f", None);
        f.new_block();
        f.temp_count = 3;
        f.emit_move(0, Expr::temp(0), Expr::Const(Const::Number(1.0)));
        f.emit_move(0, Expr::temp(1), Expr::Const(Const::Number(2.0)));
        f.emit_move(0, Expr::temp(2), Expr::name("g", 0, 0));
        f.ret(0, Expr::temp(1));
        compute_liveness(&mut f);

        assert_eq!(remove_dead_assignments(&mut f), 1);
        // The name load may throw, so it stays even though %2 is dead.
        assert_eq!(f.blocks[0].statements.len(), 3);
        assert_eq!(f.blocks[0].statements[0].to_string(), "%1 = 2;");
    }

    #[test]
    fn declared_locals_keep_their_stores_outside_plain_functions() {
        let mut f = Function::new(0, "f", None);
        f.new_block();
        f.locals.push("x".to_string());
        f.temp_count = 1;
        f.emit_move(0, Expr::temp(0), Expr::Const(Const::Number(1.0)));
        f.ret(0, Expr::Const(Const::Undefined));
        compute_liveness(&mut f);
        assert_eq!(remove_dead_assignments(&mut f), 0);
    }

    #[test]
    fn exception_flag_stores_survive() {
        let mut f = Function::new(0, "f", None);
        f.new_block();
        f.temp_count = 1;
        f.exception_slots.push(0);
        // Read only when the runtime re-enters the catch block.
        f.emit_move(0, Expr::temp(0), Expr::Const(Const::Bool(true)));
        f.emit_move(0, Expr::temp(0), Expr::Const(Const::Bool(false)));
        f.ret(0, Expr::temp(0));
        compute_liveness(&mut f);

        assert_eq!(remove_dead_assignments(&mut f), 0);
        assert_eq!(f.blocks[0].statements[0].to_string(), "%0 = true;");
    }

    #[test]
    fn orphaned_blocks_are_dropped_but_exit_stays() {
        let mut f = Function::new(0, "f", None);
        for _ in 0..4 {
            f.new_block();
        }
        f.exit_block = 3;
        f.jump(0, 2);
        f.jump(1, 2);
        f.jump(2, 0);
        f.ret(3, Expr::Const(Const::Undefined));

        assert_eq!(remove_unreachable_blocks(&mut f), 1);
        assert_eq!(f.blocks.len(), 3);
        assert_eq!(f.exit_block, 2);
        assert!(f.blocks[2].incoming.is_empty());
    }
}
