//! file: core/src/ir/module.rs
//! description: the IR data model produced by the codegen.
//!
//! A `Module` owns every `Function` of one compilation unit. Functions own
//! their basic blocks in a `Vec`; a `BlockId` is a position in that vector
//! and stays stable until linearization renumbers the blocks into their
//! final order. Expression trees are owned by the statement that holds them.
//!
use std::collections::BTreeSet;
use std::fmt::{self, Write as _};

use crate::analyzers::CompilationMode;
use crate::ir::op::{AluOp, Builtin};
use crate::ir::value::Const;

pub type FunctionId = usize;
pub type BlockId = usize;
pub type TempSet = BTreeSet<usize>;

/// A slot reference. Non-negative indices are locals and compiler temps;
/// formal `i` is `-(i + 1)`. `scope` counts enclosing functions to hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Temp {
    pub index: i32,
    pub scope: u32,
}

impl Temp {
    pub fn new(index: i32, scope: u32) -> Self {
        Temp { index, scope }
    }

    pub fn local(index: usize) -> Self {
        Temp {
            index: index as i32,
            scope: 0,
        }
    }

    pub fn formal(position: usize) -> Self {
        Temp {
            index: -(position as i32 + 1),
            scope: 0,
        }
    }

    /// The slot this temp occupies in the current function's frame, if any.
    pub fn slot(&self) -> Option<usize> {
        (self.index >= 0 && self.scope == 0).then_some(self.index as usize)
    }
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index < 0 {
            write!(f, "#{}", -(self.index + 1))?;
        } else {
            write!(f, "%{}", self.index)?;
        }
        if self.scope > 0 {
            write!(f, "@{}", self.scope)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// Looked up through the scope chain at runtime.
    Identifier,
    /// Looked up directly on the global object.
    Global,
    Builtin(Builtin),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub id: String,
    pub kind: NameKind,
    pub line: usize,
    pub column: usize,
}

impl Name {
    pub fn builtin(builtin: Builtin) -> Self {
        Name {
            id: builtin.name().to_string(),
            kind: NameKind::Builtin(builtin),
            line: 0,
            column: 0,
        }
    }

    pub fn is_this(&self) -> bool {
        self.kind == NameKind::Identifier && self.id == "this"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Const),
    String(String),
    RegExp { pattern: String, flags: String },
    Name(Name),
    Temp(Temp),
    Closure(FunctionId),
    Unop { op: AluOp, expr: Box<Expr> },
    Binop { op: AluOp, left: Box<Expr>, right: Box<Expr> },
    Call { base: Box<Expr>, args: Vec<Expr> },
    New { base: Box<Expr>, args: Vec<Expr> },
    Member { base: Box<Expr>, name: String },
    Subscript { base: Box<Expr>, index: Box<Expr> },
}

impl Expr {
    pub fn temp(index: usize) -> Self {
        Expr::Temp(Temp::local(index))
    }

    pub fn name(id: impl Into<String>, line: usize, column: usize) -> Self {
        Expr::Name(Name {
            id: id.into(),
            kind: NameKind::Identifier,
            line,
            column,
        })
    }

    pub fn builtin_call(builtin: Builtin, args: Vec<Expr>) -> Self {
        Expr::Call {
            base: Box::new(Expr::Name(Name::builtin(builtin))),
            args,
        }
    }

    pub fn as_temp(&self) -> Option<Temp> {
        match self {
            Expr::Temp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, Expr::Temp(_))
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Expr::Const(_))
    }

    /// The builtin this expression calls, if it is a builtin call.
    pub fn called_builtin(&self) -> Option<Builtin> {
        match self {
            Expr::Call { base, .. } => match base.as_ref() {
                Expr::Name(Name {
                    kind: NameKind::Builtin(b),
                    ..
                }) => Some(*b),
                _ => None,
            },
            _ => None,
        }
    }

    /// Temp, Name, Member and Subscript can be stored to.
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self,
            Expr::Temp(_) | Expr::Name(_) | Expr::Member { .. } | Expr::Subscript { .. }
        )
    }

    /// Calls `f` on every temp this expression reads.
    pub fn for_each_temp(&self, f: &mut impl FnMut(&Temp)) {
        match self {
            Expr::Temp(t) => f(t),
            Expr::Const(_) | Expr::String(_) | Expr::RegExp { .. } | Expr::Name(_) | Expr::Closure(_) => {}
            Expr::Unop { expr, .. } => expr.for_each_temp(f),
            Expr::Binop { left, right, .. } => {
                left.for_each_temp(f);
                right.for_each_temp(f);
            }
            Expr::Call { base, args } | Expr::New { base, args } => {
                base.for_each_temp(f);
                args.iter().for_each(|a| a.for_each_temp(f));
            }
            Expr::Member { base, .. } => base.for_each_temp(f),
            Expr::Subscript { base, index } => {
                base.for_each_temp(f);
                index.for_each_temp(f);
            }
        }
    }

    /// Calls `f` on every temp this expression reads, mutably.
    pub fn for_each_temp_mut(&mut self, f: &mut impl FnMut(&mut Temp)) {
        match self {
            Expr::Temp(t) => f(t),
            Expr::Const(_) | Expr::String(_) | Expr::RegExp { .. } | Expr::Name(_) | Expr::Closure(_) => {}
            Expr::Unop { expr, .. } => expr.for_each_temp_mut(f),
            Expr::Binop { left, right, .. } => {
                left.for_each_temp_mut(f);
                right.for_each_temp_mut(f);
            }
            Expr::Call { base, args } | Expr::New { base, args } => {
                base.for_each_temp_mut(f);
                args.iter_mut().for_each(|a| a.for_each_temp_mut(f));
            }
            Expr::Member { base, .. } => base.for_each_temp_mut(f),
            Expr::Subscript { base, index } => {
                base.for_each_temp_mut(f);
                index.for_each_temp_mut(f);
            }
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    f.write_char('(')?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", arg)?;
    }
    f.write_char(')')
}

fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{}", c),
            Expr::String(s) => write!(f, "\"{}\"", escape_string(s)),
            Expr::RegExp { pattern, flags } => write!(f, "/{}/{}", pattern, flags),
            Expr::Name(n) => f.write_str(&n.id),
            Expr::Temp(t) => write!(f, "{}", t),
            Expr::Closure(id) => write!(f, "closure({})", id),
            Expr::Unop { op, expr } => write!(f, "{}{}", op, expr),
            Expr::Binop { op, left, right } => write!(f, "{} {} {}", left, op, right),
            Expr::Call { base, args } => {
                write!(f, "{}", base)?;
                write_args(f, args)
            }
            Expr::New { base, args } => {
                write!(f, "new {}", base)?;
                write_args(f, args)
            }
            Expr::Member { base, name } => write!(f, "{}.{}", base, name),
            Expr::Subscript { base, index } => write!(f, "{}[{}]", base, index),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `op` is set for compound assignments (`target op= source`).
    Move {
        target: Expr,
        source: Expr,
        op: Option<AluOp>,
    },
    Exp(Expr),
    Jump(BlockId),
    CJump {
        cond: Expr,
        iftrue: BlockId,
        iffalse: BlockId,
    },
    Ret(Expr),
    /// Enters a protected region. The thrown value lands in `exception_var`.
    Try {
        try_block: BlockId,
        catch_block: BlockId,
        exception_var_name: String,
        exception_var: Temp,
    },
}

impl Stmt {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Stmt::Jump(_) | Stmt::CJump { .. } | Stmt::Ret(_) | Stmt::Try { .. })
    }

    /// Successor blocks named by a terminator, in trace order.
    pub fn targets(&self) -> Vec<BlockId> {
        match self {
            Stmt::Jump(target) => vec![*target],
            Stmt::CJump { iftrue, iffalse, .. } => vec![*iftrue, *iffalse],
            Stmt::Try {
                try_block,
                catch_block,
                ..
            } => vec![*try_block, *catch_block],
            _ => Vec::new(),
        }
    }

    pub fn remap_targets(&mut self, map: impl Fn(BlockId) -> BlockId) {
        match self {
            Stmt::Jump(target) => *target = map(*target),
            Stmt::CJump { iftrue, iffalse, .. } => {
                *iftrue = map(*iftrue);
                *iffalse = map(*iffalse);
            }
            Stmt::Try {
                try_block,
                catch_block,
                ..
            } => {
                *try_block = map(*try_block);
                *catch_block = map(*catch_block);
            }
            _ => {}
        }
    }

    pub fn as_builtin_call(&self) -> Option<Builtin> {
        match self {
            Stmt::Exp(e) => e.called_builtin(),
            Stmt::Move { source, .. } => source.called_builtin(),
            _ => None,
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Move {
                target,
                source,
                op: Some(op),
            } => write!(f, "{} {}= {};", target, op, source),
            Stmt::Move { target, source, op: None } => write!(f, "{} = {};", target, source),
            Stmt::Exp(expr) => write!(f, "(void) {};", expr),
            Stmt::Jump(target) => write!(f, "goto L{};", target),
            Stmt::CJump { cond, iftrue, iffalse } => {
                write!(f, "if ({}) goto L{}; else goto L{};", cond, iftrue, iffalse)
            }
            Stmt::Ret(expr) => write!(f, "return {};", expr),
            Stmt::Try {
                try_block,
                catch_block,
                exception_var_name,
                exception_var,
            } => write!(
                f,
                "try goto L{}; catch ({}: {}) goto L{};",
                try_block, exception_var_name, exception_var, catch_block
            ),
        }
    }
}

/// Liveness of the program points around one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StmtLiveness {
    pub live_in: TempSet,
    pub live_out: TempSet,
}

#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub statements: Vec<Stmt>,
    pub incoming: Vec<BlockId>,
    pub outgoing: Vec<BlockId>,
    pub live_in: TempSet,
    pub live_out: TempSet,
    /// Parallel to `statements` once liveness has run; empty before.
    pub stmt_liveness: Vec<StmtLiveness>,
}

impl BasicBlock {
    pub fn is_terminated(&self) -> bool {
        self.statements.last().is_some_and(Stmt::is_terminator)
    }

    pub fn terminator(&self) -> Option<&Stmt> {
        self.statements.last().filter(|s| s.is_terminator())
    }

    pub fn remove_statement(&mut self, index: usize) -> Stmt {
        if index < self.stmt_liveness.len() {
            self.stmt_liveness.remove(index);
        }
        self.statements.remove(index)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    pub formals: Vec<String>,
    pub locals: Vec<String>,
    pub blocks: Vec<BasicBlock>,
    pub exit_block: BlockId,
    pub compilation_mode: CompilationMode,
    pub temp_count: usize,
    pub max_number_of_arguments: usize,
    pub is_strict: bool,
    pub has_direct_eval: bool,
    pub uses_arguments_object: bool,
    pub has_try: bool,
    pub has_with: bool,
    pub has_nested_functions: bool,
    pub is_named_expression: bool,
    /// Depth of `with` and `catch` scopes enclosing the point being lowered.
    pub inside_with_or_catch: u32,
    pub outer: Option<FunctionId>,
    pub nested: Vec<FunctionId>,
    /// Slots the runtime reads or writes when it enters a catch block: the
    /// try statements' exception flags and exception values. That edge is
    /// not in the CFG, so these stores are never dead and the slots are
    /// never shared.
    pub exception_slots: Vec<usize>,
    /// Text listing captured when intermediate output is enabled.
    pub listing: Option<String>,
}

impl Function {
    pub fn new(id: FunctionId, name: impl Into<String>, outer: Option<FunctionId>) -> Self {
        Function {
            id,
            name: name.into(),
            outer,
            ..Default::default()
        }
    }

    pub fn new_block(&mut self) -> BlockId {
        self.blocks.push(BasicBlock::default());
        self.blocks.len() - 1
    }

    pub fn new_temp(&mut self) -> usize {
        let t = self.temp_count;
        self.temp_count += 1;
        t
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    /// Lowest slot the optimizer may rewrite or delete stores to.
    ///
    /// Declared locals are normally off limits because closures, `eval`,
    /// `with` scopes and exception handlers can read them behind the IR's
    /// back. Plain function code with none of those keeps them private.
    pub fn first_tracked_slot(&self) -> usize {
        let private_locals = self.compilation_mode == CompilationMode::Function
            && !self.has_nested_functions
            && !self.has_direct_eval
            && !self.has_with
            && !self.has_try;
        if private_locals { 0 } else { self.locals.len() }
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    fn link(&mut self, from: BlockId, to: BlockId) {
        if !self.blocks[from].outgoing.contains(&to) {
            self.blocks[from].outgoing.push(to);
        }
        if !self.blocks[to].incoming.contains(&from) {
            self.blocks[to].incoming.push(from);
        }
    }

    /// Appends a `Move` or `Exp`. Statements after a terminator are dropped.
    pub fn emit(&mut self, block: BlockId, stmt: Stmt) {
        let bb = &mut self.blocks[block];
        if !bb.is_terminated() {
            bb.statements.push(stmt);
        }
    }

    pub fn emit_move(&mut self, block: BlockId, target: Expr, source: Expr) {
        self.emit(block, Stmt::Move { target, source, op: None });
    }

    pub fn jump(&mut self, block: BlockId, target: BlockId) {
        if self.blocks[block].is_terminated() {
            return;
        }
        self.blocks[block].statements.push(Stmt::Jump(target));
        self.link(block, target);
    }

    /// Appends a conditional jump. Identical targets degrade to evaluating
    /// the condition into a fresh temp followed by a plain jump.
    pub fn cjump(&mut self, block: BlockId, cond: Expr, iftrue: BlockId, iffalse: BlockId) {
        if self.blocks[block].is_terminated() {
            return;
        }
        if iftrue == iffalse {
            let t = self.new_temp();
            self.emit_move(block, Expr::temp(t), cond);
            self.jump(block, iftrue);
            return;
        }
        self.blocks[block].statements.push(Stmt::CJump { cond, iftrue, iffalse });
        self.link(block, iftrue);
        self.link(block, iffalse);
    }

    pub fn ret(&mut self, block: BlockId, expr: Expr) {
        if self.blocks[block].is_terminated() {
            return;
        }
        self.blocks[block].statements.push(Stmt::Ret(expr));
    }

    pub fn try_(&mut self, block: BlockId, try_block: BlockId, catch_block: BlockId, name: String, var: Temp) {
        if self.blocks[block].is_terminated() {
            return;
        }
        self.blocks[block].statements.push(Stmt::Try {
            try_block,
            catch_block,
            exception_var_name: name,
            exception_var: var,
        });
        self.link(block, try_block);
        self.link(block, catch_block);
    }

    /// Keeps the blocks listed in `order`, in that order, and renumbers
    /// every block reference. Edges into dropped blocks disappear.
    pub fn reorder_blocks(&mut self, order: &[BlockId]) {
        let mut new_id = vec![None; self.blocks.len()];
        for (position, &old) in order.iter().enumerate() {
            new_id[old] = Some(position);
        }
        let map = |old: BlockId| new_id[old].unwrap_or(usize::MAX);
        let mut old_blocks: Vec<Option<BasicBlock>> = std::mem::take(&mut self.blocks).into_iter().map(Some).collect();
        for &old in order {
            let Some(mut block) = old_blocks[old].take() else {
                continue;
            };
            for stmt in &mut block.statements {
                stmt.remap_targets(map);
            }
            block.incoming = block.incoming.iter().filter_map(|b| new_id[*b]).collect();
            block.outgoing = block.outgoing.iter().filter_map(|b| new_id[*b]).collect();
            self.blocks.push(block);
        }
        self.exit_block = map(self.exit_block);
    }

    /// Every statement of every block, in block order.
    pub fn statements(&self) -> impl Iterator<Item = &Stmt> {
        self.blocks.iter().flat_map(|b| b.statements.iter())
    }

    pub fn count_builtin_calls(&self, builtin: Builtin) -> usize {
        self.statements().filter(|s| s.as_builtin_call() == Some(builtin)).count()
    }

    /// Textual form with per-statement live-out sets, once liveness has run.
    pub fn listing_with_liveness(&self) -> String {
        let mut out = String::new();
        let _ = self.write_header(&mut out);
        for (id, block) in self.blocks.iter().enumerate() {
            let _ = self.write_label(&mut out, id, block);
            for (i, stmt) in block.statements.iter().enumerate() {
                if *stmt == Stmt::Jump(id + 1) && i + 1 == block.statements.len() {
                    continue;
                }
                let text = stmt.to_string();
                match block.stmt_liveness.get(i) {
                    Some(liveness) if !liveness.live_out.is_empty() => {
                        let temps: Vec<String> = liveness.live_out.iter().map(|t| format!("%{}", t)).collect();
                        let _ = writeln!(out, "    {:<60} // lives out: {}", text, temps.join(" "));
                    }
                    _ => {
                        let _ = writeln!(out, "    {}", text);
                    }
                }
            }
        }
        out.push_str("}\n");
        out
    }

    fn write_header(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "function {}({})", self.display_name(), self.formals.join(", "))?;
        writeln!(out, "{{")?;
        for local in &self.locals {
            writeln!(out, "    var {};", local)?;
        }
        Ok(())
    }

    fn write_label(&self, out: &mut impl fmt::Write, id: BlockId, block: &BasicBlock) -> fmt::Result {
        writeln!(out)?;
        let label = format!("L{}:", id);
        write!(out, "{:<66}// predecessor blocks:", label)?;
        for pred in &block.incoming {
            write!(out, " L{}", pred)?;
        }
        writeln!(out)
    }

    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("<anonymous#{}>", self.id)
        } else {
            self.name.clone()
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_header(f)?;
        for (id, block) in self.blocks.iter().enumerate() {
            self.write_label(f, id, block)?;
            for stmt in &block.statements {
                writeln!(f, "    {}", stmt)?;
            }
        }
        writeln!(f, "}}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub functions: Vec<Function>,
    pub root: Option<FunctionId>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_function(&mut self, name: impl Into<String>, outer: Option<FunctionId>) -> FunctionId {
        let id = self.functions.len();
        self.functions.push(Function::new(id, name, outer));
        if let Some(parent) = outer {
            self.functions[parent].nested.push(id);
        }
        id
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id]
    }

    pub fn root_function(&self) -> Option<&Function> {
        self.root.map(|id| &self.functions[id])
    }

    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, function) in self.functions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", function)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temps_display_with_formals_and_scopes() {
        assert_eq!(Temp::local(3).to_string(), "%3");
        assert_eq!(Temp::formal(0).to_string(), "#0");
        assert_eq!(Temp::new(-2, 1).to_string(), "#1@1");
        assert_eq!(Temp::new(4, 2).to_string(), "%4@2");
        assert_eq!(Temp::new(4, 2).slot(), None);
    }

    #[test]
    fn terminated_blocks_ignore_further_statements() {
        let mut f = Function::new(0, "f", None);
        let a = f.new_block();
        let b = f.new_block();
        f.jump(a, b);
        f.emit_move(a, Expr::temp(0), Expr::Const(Const::Null));
        f.jump(a, a);
        assert_eq!(f.block(a).statements, vec![Stmt::Jump(b)]);
        assert_eq!(f.block(b).incoming, vec![a]);
    }

    #[test]
    fn cjump_with_equal_targets_becomes_a_jump() {
        let mut f = Function::new(0, "f", None);
        let a = f.new_block();
        let b = f.new_block();
        f.cjump(a, Expr::temp(9), b, b);
        assert_eq!(f.block(a).statements.len(), 2);
        assert_eq!(f.block(a).terminator(), Some(&Stmt::Jump(b)));
        assert_eq!(f.temp_count, 1);
    }

    #[test]
    fn reorder_renumbers_targets_and_edges() {
        let mut f = Function::new(0, "f", None);
        let entry = f.new_block();
        let dead = f.new_block();
        let exit = f.new_block();
        f.exit_block = exit;
        f.jump(entry, exit);
        f.jump(dead, exit);
        f.ret(exit, Expr::temp(0));
        f.reorder_blocks(&[entry, exit]);
        assert_eq!(f.blocks.len(), 2);
        assert_eq!(f.exit_block, 1);
        assert_eq!(f.block(0).statements, vec![Stmt::Jump(1)]);
        assert_eq!(f.block(1).incoming, vec![0]);
    }

    #[test]
    fn statements_print_in_listing_form() {
        let cjump = Stmt::CJump {
            cond: Expr::temp(1),
            iftrue: 2,
            iffalse: 3,
        };
        assert_eq!(cjump.to_string(), "if (%1) goto L2; else goto L3;");
        let call = Stmt::Exp(Expr::builtin_call(Builtin::Throw, vec![Expr::temp(0)]));
        assert_eq!(call.to_string(), "(void) builtin_throw(%0);");
        let compound = Stmt::Move {
            target: Expr::name("x", 1, 1),
            source: Expr::Const(Const::Number(2.0)),
            op: Some(AluOp::Add),
        };
        assert_eq!(compound.to_string(), "x += 2;");
    }
}
