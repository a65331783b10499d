//! file: core/src/ir/opt/linearize.rs
//! description: block layout.
//!
//! Makes every fallthrough explicit, lays the blocks out in trace order
//! from the entry block and forces the exit block to the end. Blocks the
//! trace never reaches are dropped.
//!
use crate::ir::module::{BlockId, Function, Stmt};

pub fn linearize(function: &mut Function) {
    if function.blocks.is_empty() {
        return;
    }
    let exit = function.exit_block;

    for id in 0..function.blocks.len().saturating_sub(1) {
        if !function.blocks[id].is_terminated() {
            function.jump(id, id + 1);
        }
    }

    let mut visited = vec![false; function.blocks.len()];
    visited[exit] = true;
    let mut order = Vec::with_capacity(function.blocks.len());
    trace(function, 0, &mut visited, &mut order);
    order.push(exit);

    let dropped = function.blocks.len() - order.len();
    if dropped > 0 {
        log::trace!("linearize: dropping {} unreachable block(s)", dropped);
    }
    function.reorder_blocks(&order);
}

fn trace(function: &Function, start: BlockId, visited: &mut [bool], order: &mut Vec<BlockId>) {
    // Explicit stack so deep block chains cannot overflow the call stack.
    // Each entry resumes a block after its preferred successor has been
    // traced.
    enum Step {
        Enter(BlockId),
        Rest(BlockId),
    }

    let mut stack = vec![Step::Enter(start)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(block) => {
                if visited[block] {
                    continue;
                }
                visited[block] = true;
                order.push(block);

                let preferred: Vec<BlockId> = match function.blocks[block].terminator() {
                    Some(Stmt::Jump(target)) => vec![*target],
                    Some(Stmt::CJump { iftrue, iffalse, .. }) => {
                        if !visited[*iffalse] {
                            vec![*iffalse]
                        } else {
                            vec![*iftrue]
                        }
                    }
                    Some(Stmt::Try {
                        try_block,
                        catch_block,
                        ..
                    }) => vec![*try_block, *catch_block],
                    _ => Vec::new(),
                };

                stack.push(Step::Rest(block));
                for target in preferred.into_iter().rev() {
                    stack.push(Step::Enter(target));
                }
            }
            Step::Rest(block) => {
                for &target in function.blocks[block].outgoing.iter().rev() {
                    if !visited[target] {
                        stack.push(Step::Enter(target));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::module::Expr;

    fn function_with_blocks(count: usize) -> Function {
        let mut f = Function::new(0, "f", None);
        for _ in 0..count {
            f.new_block();
        }
        f
    }

    #[test]
    fn exit_goes_last_and_dead_blocks_disappear() {
        // 0 -> 2 -> 1(exit); 3 is unreachable.
        let mut f = function_with_blocks(4);
        f.exit_block = 1;
        f.jump(0, 2);
        f.jump(2, 1);
        f.ret(1, Expr::temp(0));
        f.jump(3, 1);

        linearize(&mut f);

        assert_eq!(f.blocks.len(), 3);
        assert_eq!(f.exit_block, 2);
        assert_eq!(f.blocks[0].statements, vec![Stmt::Jump(1)]);
        assert_eq!(f.blocks[1].statements, vec![Stmt::Jump(2)]);
        assert_eq!(f.blocks[2].incoming, vec![1]);
    }

    #[test]
    fn cjump_prefers_the_false_side() {
        let mut f = function_with_blocks(4);
        f.exit_block = 3;
        f.cjump(0, Expr::temp(0), 1, 2);
        f.jump(1, 3);
        f.jump(2, 3);
        f.ret(3, Expr::temp(0));

        linearize(&mut f);

        // The false successor is laid out right after the branch.
        match &f.blocks[0].statements[0] {
            Stmt::CJump { iftrue, iffalse, .. } => {
                assert_eq!(*iffalse, 1);
                assert_eq!(*iftrue, 2);
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn fallthrough_gets_an_explicit_jump() {
        let mut f = function_with_blocks(2);
        f.exit_block = 1;
        f.ret(1, Expr::temp(0));
        linearize(&mut f);
        assert_eq!(f.blocks[0].statements, vec![Stmt::Jump(1)]);
        assert_eq!(f.blocks[1].incoming, vec![0]);
    }
}
