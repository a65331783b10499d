//! file: core/src/ir/lower/lowering_context.rs
//! description: per-function state threaded through AST->IR lowering.
//!
//! One `LoweringContext` exists for every function being lowered. Nested
//! functions get a fresh one, so nothing has to be swapped back by hand
//! when the recursion returns.
//!
use crate::analyzers::{CompilationMode, EnvId};
use crate::ast::Statement;
use crate::ir::module::{BlockId, FunctionId};

/// Break/continue targets of an enclosing loop, `switch` or labelled
/// statement.
#[derive(Debug, Clone)]
pub(crate) struct Loop {
    pub label: Option<String>,
    pub break_block: BlockId,
    /// `None` for `switch` and plain labelled statements.
    pub continue_block: Option<BlockId>,
    /// Number of scope frames active when the loop was entered.
    pub scope_depth: usize,
}

/// A region that has to be torn down when control leaves it early.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ScopeFrame<'a> {
    With,
    Catch,
    Try {
        finally: Option<&'a [Statement]>,
        has_exception: usize,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct LoweringContext<'a> {
    pub function: FunctionId,
    pub env: EnvId,
    pub mode: CompilationMode,
    /// Block that receives the next statement.
    pub block: BlockId,
    pub exit_block: BlockId,
    pub throw_block: BlockId,
    /// Temp holding the completion value; also carries thrown values.
    pub return_address: usize,
    pub loops: Vec<Loop>,
    pub scopes: Vec<ScopeFrame<'a>>,
    /// Label waiting to be claimed by the loop or `switch` it names.
    pub pending_label: Option<String>,
}

impl<'a> LoweringContext<'a> {
    pub fn new(
        function: FunctionId,
        env: EnvId,
        mode: CompilationMode,
        entry: BlockId,
        exit_block: BlockId,
        throw_block: BlockId,
        return_address: usize,
    ) -> Self {
        LoweringContext {
            function,
            env,
            mode,
            block: entry,
            exit_block,
            throw_block,
            return_address,
            loops: Vec::new(),
            scopes: Vec::new(),
            pending_label: None,
        }
    }

    pub fn enter_loop(&mut self, break_block: BlockId, continue_block: Option<BlockId>) {
        let label = self.pending_label.take();
        self.loops.push(Loop {
            label,
            break_block,
            continue_block,
            scope_depth: self.scopes.len(),
        });
    }

    pub fn leave_loop(&mut self) {
        self.loops.pop();
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.loops.iter().any(|l| l.label.as_deref() == Some(label))
    }

    /// Snapshot of the stacks a failed statement may leave half-pushed.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            throw_block: self.throw_block,
            loops: self.loops.len(),
            scopes: self.scopes.len(),
        }
    }

    pub fn restore(&mut self, checkpoint: &Checkpoint) {
        self.throw_block = checkpoint.throw_block;
        self.loops.truncate(checkpoint.loops);
        self.scopes.truncate(checkpoint.scopes);
        self.pending_label = None;
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    pub throw_block: BlockId,
    pub loops: usize,
    pub scopes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loops_claim_the_pending_label() {
        let mut ctx = LoweringContext::new(0, 0, CompilationMode::Function, 0, 1, 2, 0);
        ctx.pending_label = Some("outer".to_string());
        ctx.enter_loop(5, Some(4));
        assert!(ctx.pending_label.is_none());
        assert!(ctx.has_label("outer"));
        ctx.enter_loop(7, None);
        assert_eq!(ctx.loops[1].label, None);
        ctx.leave_loop();
        ctx.leave_loop();
        assert!(!ctx.has_label("outer"));
    }

    #[test]
    fn restore_drops_frames_pushed_after_the_checkpoint() {
        let mut ctx = LoweringContext::new(0, 0, CompilationMode::Function, 0, 1, 2, 0);
        let checkpoint = ctx.checkpoint();
        ctx.scopes.push(ScopeFrame::With);
        ctx.enter_loop(3, None);
        ctx.throw_block = 9;
        ctx.restore(&checkpoint);
        assert!(ctx.scopes.is_empty());
        assert!(ctx.loops.is_empty());
        assert_eq!(ctx.throw_block, 2);
    }
}
