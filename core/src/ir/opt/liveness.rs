//! file: core/src/ir/opt/liveness.rs
//! description: backward liveness over frame slots.
//!
//! Only unscoped, non-negative temps take part: formals and temps of
//! enclosing functions are never killed by a local store.
//!
use crate::ir::module::{BlockId, Expr, Function, Stmt, StmtLiveness, Temp, TempSet};

fn tracked(t: &Temp) -> Option<usize> {
    t.slot()
}

fn collect_uses(expr: &Expr, uses: &mut TempSet) {
    expr.for_each_temp(&mut |t| {
        if let Some(slot) = tracked(t) {
            uses.insert(slot);
        }
    });
}

/// `(uses, defs)` of one statement.
pub fn use_def(stmt: &Stmt) -> (TempSet, TempSet) {
    let mut uses = TempSet::new();
    let mut defs = TempSet::new();
    match stmt {
        Stmt::Move { target, source, op } => {
            match target.as_temp().and_then(|t| tracked(&t)) {
                Some(slot) => {
                    defs.insert(slot);
                    // `%t op= x` reads %t as well.
                    if op.is_some() {
                        uses.insert(slot);
                    }
                }
                None => collect_uses(target, &mut uses),
            }
            collect_uses(source, &mut uses);
        }
        Stmt::Exp(expr) | Stmt::Ret(expr) | Stmt::CJump { cond: expr, .. } => collect_uses(expr, &mut uses),
        Stmt::Jump(_) => {}
        Stmt::Try { exception_var, .. } => {
            if let Some(slot) = tracked(exception_var) {
                defs.insert(slot);
            }
        }
    }
    (uses, defs)
}

/// Post-order of the blocks reachable from the entry, followed by any
/// block the walk did not reach.
fn postorder(function: &Function) -> Vec<BlockId> {
    let count = function.blocks.len();
    let mut visited = vec![false; count];
    let mut order = Vec::with_capacity(count);
    let mut stack: Vec<(BlockId, usize)> = Vec::new();

    for root in 0..count {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        stack.push((root, 0));
        while let Some((block, next)) = stack.pop() {
            let outgoing = &function.blocks[block].outgoing;
            if let Some(&succ) = outgoing.get(next) {
                stack.push((block, next + 1));
                if !visited[succ] {
                    visited[succ] = true;
                    stack.push((succ, 0));
                }
            } else {
                order.push(block);
            }
        }
    }
    order
}

/// Fills `live_in`/`live_out` of every block and every statement.
pub fn compute_liveness(function: &mut Function) {
    let use_defs: Vec<Vec<(TempSet, TempSet)>> = function
        .blocks
        .iter()
        .map(|b| b.statements.iter().map(use_def).collect())
        .collect();
    let order = postorder(function);

    for block in &mut function.blocks {
        block.live_in.clear();
        block.live_out.clear();
        block.stmt_liveness = vec![StmtLiveness::default(); block.statements.len()];
    }

    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut changed = false;
        for &id in &order {
            let mut live = TempSet::new();
            for &succ in &function.blocks[id].outgoing {
                live.extend(function.blocks[succ].live_in.iter().copied());
            }

            let block = &mut function.blocks[id];
            let previous_in = std::mem::take(&mut block.live_in);
            let previous_out = std::mem::replace(&mut block.live_out, live.clone());
            for (i, (uses, defs)) in use_defs[id].iter().enumerate().rev() {
                block.stmt_liveness[i].live_out = live.clone();
                for d in defs {
                    live.remove(d);
                }
                live.extend(uses.iter().copied());
                block.stmt_liveness[i].live_in = live.clone();
            }
            block.live_in = live;

            if previous_in != block.live_in || previous_out != block.live_out {
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    log::trace!("{}: liveness reached a fixed point after {} round(s)", function.display_name(), rounds);
}

/// Drops all liveness data. Used once a pass has invalidated it.
pub fn clear_liveness(function: &mut Function) {
    for block in &mut function.blocks {
        block.live_in.clear();
        block.live_out.clear();
        block.stmt_liveness.clear();
    }
}
