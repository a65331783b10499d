//! file: core/src/ir/opt/compress.rs
//! description: temp slot compression.
//!
//! A linear scan over the laid-out statements. Compiler temps live across
//! a block boundary are pinned to the lowest slots up front; every other
//! temp gets the lowest slot not held by a temp that is still live at the
//! statement being rewritten. Exception slots are pinned as well, since the
//! runtime reaches them on an edge liveness does not see. Declared locals, formals and scoped temps
//! keep their numbers.
//!
use crate::ir::module::{Function, Stmt, StmtLiveness, Temp};

struct Compressor {
    local_count: usize,
    /// `(temp - local_count, slot)`, most recent first.
    active: Vec<(usize, usize)>,
    next_free: usize,
    pinned_count: usize,
}

impl Compressor {
    fn add(&mut self, temp: usize, slot: usize) {
        if self.next_free <= slot {
            self.next_free = slot + 1;
        }
        self.active.insert(0, (temp, slot));
    }

    /// Drops temps that are dead at `liveness` and returns the lowest slot
    /// nobody holds.
    fn expire_old(&mut self, liveness: &StmtLiveness) -> usize {
        let mut in_use = vec![false; self.next_free];
        let local_count = self.local_count;
        let pinned_count = self.pinned_count;
        self.active.retain(|&(temp, slot)| {
            let keep = slot < pinned_count || liveness.live_in.contains(&(temp + local_count));
            if keep {
                in_use[slot] = true;
            }
            keep
        });
        in_use.iter().position(|used| !used).unwrap_or(self.next_free)
    }

    fn remap(&mut self, temp: usize, liveness: &StmtLiveness) -> usize {
        if let Some(&(_, slot)) = self.active.iter().find(|(t, _)| *t == temp) {
            return slot;
        }
        let slot = self.expire_old(liveness);
        self.add(temp, slot);
        slot
    }

    fn rewrite_temp(&mut self, t: &mut Temp, liveness: &StmtLiveness) {
        if t.scope != 0 || t.index < 0 || (t.index as usize) < self.local_count {
            return;
        }
        let slot = self.remap(t.index as usize - self.local_count, liveness);
        t.index = (slot + self.local_count) as i32;
    }

    fn rewrite(&mut self, stmt: &mut Stmt, liveness: &StmtLiveness) {
        match stmt {
            Stmt::Move { target, source, .. } => {
                target.for_each_temp_mut(&mut |t| self.rewrite_temp(t, liveness));
                source.for_each_temp_mut(&mut |t| self.rewrite_temp(t, liveness));
            }
            Stmt::Exp(expr) | Stmt::Ret(expr) | Stmt::CJump { cond: expr, .. } => {
                expr.for_each_temp_mut(&mut |t| self.rewrite_temp(t, liveness));
            }
            Stmt::Try { exception_var, .. } => self.rewrite_temp(exception_var, liveness),
            Stmt::Jump(_) => {}
        }
    }
}

/// Renumbers compiler temps and shrinks `temp_count`. Needs liveness.
pub fn compress_temps(function: &mut Function) {
    let local_count = function.local_count();
    let mut compressor = Compressor {
        local_count,
        active: Vec::new(),
        next_free: 0,
        pinned_count: 0,
    };

    let mut pinned: Vec<usize> = Vec::new();
    for &temp in &function.exception_slots {
        if temp >= local_count && !pinned.contains(&temp) {
            pinned.push(temp);
            let slot = compressor.next_free;
            compressor.add(temp - local_count, slot);
        }
    }
    for block in &function.blocks {
        let Some(last) = block.statements.len().checked_sub(1) else {
            continue;
        };
        if !block.statements[last].is_terminator() {
            continue;
        }
        let Some(liveness) = block.stmt_liveness.get(last) else {
            continue;
        };
        for &temp in liveness.live_out.range(local_count..) {
            if !pinned.contains(&temp) {
                pinned.push(temp);
                let slot = compressor.next_free;
                compressor.add(temp - local_count, slot);
            }
        }
    }
    compressor.pinned_count = compressor.next_free;

    let before = function.temp_count;
    let mut max_used = compressor.next_free;
    for block in &mut function.blocks {
        for (i, stmt) in block.statements.iter_mut().enumerate() {
            let Some(liveness) = block.stmt_liveness.get(i) else {
                continue;
            };
            if i == 0 {
                compressor.expire_old(liveness);
            }
            compressor.rewrite(stmt, liveness);
        }
        max_used = max_used.max(compressor.next_free);
    }
    function.temp_count = max_used + local_count;
    for temp in &mut function.exception_slots {
        if let Some(&(_, slot)) = compressor.active.iter().find(|(t, _)| *t + local_count == *temp) {
            *temp = slot + local_count;
        }
    }
    log::trace!(
        "{}: compressed {} temp(s) into {} ({} pinned)",
        function.display_name(),
        before,
        function.temp_count,
        compressor.pinned_count
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::module::Expr;
    use crate::ir::opt::liveness::compute_liveness;
    use crate::ir::value::Const;

    #[test]
    fn short_lived_temps_share_a_slot() {
        let mut f = Function::new(0, "f", None);
        f.new_block();
        f.temp_count = 4;
        // %0 and %2 never overlap, nor do %1 and %3.
        f.emit_move(0, Expr::temp(0), Expr::Const(Const::Number(1.0)));
        f.emit_move(0, Expr::temp(1), Expr::temp(0));
        f.emit(0, Stmt::Exp(Expr::builtin_call(crate::ir::op::Builtin::Throw, vec![Expr::temp(1)])));
        f.emit_move(0, Expr::temp(2), Expr::Const(Const::Number(2.0)));
        f.emit_move(0, Expr::temp(3), Expr::temp(2));
        f.ret(0, Expr::temp(3));
        compute_liveness(&mut f);

        compress_temps(&mut f);

        assert!(f.temp_count <= 2, "temp_count = {}", f.temp_count);
        let listing = f.to_string();
        assert!(!listing.contains("%2") && !listing.contains("%3"), "{}", listing);
    }

    #[test]
    fn exception_slots_are_never_shared() {
        let mut f = Function::new(0, "f", None);
        f.new_block();
        f.temp_count = 3;
        f.exception_slots.push(2);
        f.emit_move(0, Expr::temp(2), Expr::Const(Const::Bool(true)));
        f.emit_move(0, Expr::temp(0), Expr::Const(Const::Number(1.0)));
        f.emit(0, Stmt::Exp(Expr::builtin_call(crate::ir::op::Builtin::Throw, vec![Expr::temp(0)])));
        f.emit_move(0, Expr::temp(1), Expr::Const(Const::Number(2.0)));
        f.ret(0, Expr::temp(1));
        compute_liveness(&mut f);

        compress_temps(&mut f);

        // %2 is dead after its store, yet keeps a slot of its own.
        let flag = f.exception_slots[0];
        assert_eq!(f.blocks[0].statements[0].to_string(), format!("%{} = true;", flag));
        for stmt in &f.blocks[0].statements[1..] {
            assert!(!stmt.to_string().contains(&format!("%{}", flag)), "{}", f);
        }
        assert_eq!(f.temp_count, 2);
    }

    #[test]
    fn locals_keep_their_slots() {
        let mut f = Function::new(0, "f", None);
        f.new_block();
        f.locals = vec!["a".into(), "b".into()];
        f.temp_count = 5;
        f.emit_move(0, Expr::temp(4), Expr::Const(Const::Number(1.0)));
        f.emit_move(0, Expr::temp(1), Expr::temp(4));
        f.ret(0, Expr::temp(1));
        compute_liveness(&mut f);

        compress_temps(&mut f);

        assert_eq!(f.temp_count, 3);
        assert_eq!(f.blocks[0].statements[0].to_string(), "%2 = 1;");
        assert_eq!(f.blocks[0].statements[1].to_string(), "%1 = %2;");
    }
}
