//! file: core/src/ast/kind.rs
//! description: statement/expression kinds and operator enums.
//!
//! Statements and expressions are closed sum types so every pass that walks
//! them (environment scan, lowering) is checked for exhaustiveness.
//!
use crate::location::Location;

use super::node::{FunctionNode, Identifier};

/// Binary operators that are neither logical nor assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,        // +
    Sub,        // -
    Mul,        // *
    Div,        // /
    Mod,        // %
    LShift,     // <<
    RShift,     // >>
    URShift,    // >>>
    BitAnd,     // &
    BitOr,      // |
    BitXor,     // ^
    Eq,         // ==
    Ne,         // !=
    StrictEq,   // ===
    StrictNe,   // !==
    Lt,         // <
    Gt,         // >
    Le,         // <=
    Ge,         // >=
    In,         // in
    InstanceOf, // instanceof
}

impl BinaryOperator {
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Sub,
            "*" => BinaryOperator::Mul,
            "/" => BinaryOperator::Div,
            "%" => BinaryOperator::Mod,
            "<<" => BinaryOperator::LShift,
            ">>" => BinaryOperator::RShift,
            ">>>" => BinaryOperator::URShift,
            "&" => BinaryOperator::BitAnd,
            "|" => BinaryOperator::BitOr,
            "^" => BinaryOperator::BitXor,
            "==" => BinaryOperator::Eq,
            "!=" => BinaryOperator::Ne,
            "===" => BinaryOperator::StrictEq,
            "!==" => BinaryOperator::StrictNe,
            "<" => BinaryOperator::Lt,
            ">" => BinaryOperator::Gt,
            "<=" => BinaryOperator::Le,
            ">=" => BinaryOperator::Ge,
            "in" => BinaryOperator::In,
            "instanceof" => BinaryOperator::InstanceOf,
            _ => return None,
        };
        Some(op)
    }

    /// Maps a compound assignment token (`+=`, `>>>=`, ...) to its base operator.
    pub fn from_compound_assignment(token: &str) -> Option<Self> {
        token.strip_suffix('=').and_then(Self::from_token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And, // &&
    Or,  // ||
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Delete, // delete
    Void,   // void
    TypeOf, // typeof
    Plus,   // +
    Minus,  // -
    Tilde,  // ~
    Not,    // !
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    Increment, // ++
    Decrement, // --
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub location: Location,
}

impl Statement {
    pub fn new(kind: StatementKind, location: Location) -> Self {
        Statement { kind, location }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub name: Identifier,
    pub init: Option<Expression>,
}

/// One `case` (with a test) or the `default` clause (without one), in
/// source order.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchClause {
    pub test: Option<Expression>,
    pub body: Vec<Statement>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Identifier,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Block(Vec<Statement>),
    Variable(Vec<VariableDeclaration>),
    Empty,
    Expression(Expression),
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    DoWhile {
        body: Box<Statement>,
        condition: Expression,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    For {
        init: Option<Expression>,
        condition: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
    },
    LocalFor {
        declarations: Vec<VariableDeclaration>,
        condition: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
    },
    ForIn {
        target: Expression,
        object: Expression,
        body: Box<Statement>,
    },
    LocalForIn {
        declaration: VariableDeclaration,
        object: Expression,
        body: Box<Statement>,
    },
    Continue(Option<Identifier>),
    Break(Option<Identifier>),
    Return(Option<Expression>),
    With {
        object: Expression,
        body: Box<Statement>,
    },
    Switch {
        discriminant: Expression,
        clauses: Vec<SwitchClause>,
    },
    Labelled {
        label: Identifier,
        body: Box<Statement>,
    },
    Throw(Expression),
    Try {
        block: Vec<Statement>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Statement>>,
    },
    Debugger,
    FunctionDeclaration(FunctionNode),
}

impl StatementKind {
    /// Loops and `switch` consume an enclosing label themselves.
    pub fn consumes_label(&self) -> bool {
        matches!(
            self,
            StatementKind::Switch { .. }
                | StatementKind::While { .. }
                | StatementKind::DoWhile { .. }
                | StatementKind::For { .. }
                | StatementKind::LocalFor { .. }
                | StatementKind::ForIn { .. }
                | StatementKind::LocalForIn { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub location: Location,
}

impl Expression {
    pub fn new(kind: ExpressionKind, location: Location) -> Self {
        Expression { kind, location }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Value(Expression),
    Getter(FunctionNode),
    Setter(FunctionNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Canonical key text; numeric keys are already in their string form.
    pub key: String,
    pub value: PropertyValue,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    This,
    Identifier(String),
    Null,
    Boolean(bool),
    Number(f64),
    /// `raw` is true when the literal was written without escape sequences,
    /// which is what the directive prologue check looks at.
    String {
        value: String,
        raw: bool,
    },
    RegExp {
        pattern: String,
        flags: String,
    },
    /// `None` marks a hole (elision).
    Array(Vec<Option<Expression>>),
    Object(Vec<Property>),
    Function(Box<FunctionNode>),
    Member {
        object: Box<Expression>,
        property: String,
    },
    Subscript {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    /// `arguments` is `None` for `new X` without a parenthesised list.
    New {
        callee: Box<Expression>,
        arguments: Option<Vec<Expression>>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Update {
        op: UpdateOperator,
        prefix: bool,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logical {
        op: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `op` is `None` for plain `=`.
    Assign {
        op: Option<BinaryOperator>,
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    Sequence {
        left: Box<Expression>,
        right: Box<Expression>,
    },
}
