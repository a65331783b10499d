use crate::location::Location;

use super::kind::Statement;

/// Identity of a scope-introducing node (program or function).
pub type NodeId = usize;

pub(crate) fn create_id() -> NodeId {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static COUNTER: AtomicUsize = AtomicUsize::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub location: Location,
}

impl Identifier {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Identifier {
            name: name.into(),
            location,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    id: NodeId,
    pub body: Vec<Statement>,
    pub location: Location,
}

impl Program {
    pub fn new(body: Vec<Statement>, location: Location) -> Self {
        Program {
            id: create_id(),
            body,
            location,
        }
    }

    pub fn get_id(&self) -> NodeId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Declaration,
    Expression,
    Getter,
    Setter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionNode {
    id: NodeId,
    pub kind: FunctionKind,
    pub name: Option<Identifier>,
    pub formals: Vec<Identifier>,
    pub body: Vec<Statement>,
    pub location: Location,
}

impl FunctionNode {
    pub fn new(
        kind: FunctionKind,
        name: Option<Identifier>,
        formals: Vec<Identifier>,
        body: Vec<Statement>,
        location: Location,
    ) -> Self {
        FunctionNode {
            id: create_id(),
            kind,
            name,
            formals,
            body,
            location,
        }
    }

    pub fn get_id(&self) -> NodeId {
        self.id
    }

    /// The binding name, or the empty string for anonymous functions.
    pub fn name_str(&self) -> &str {
        self.name.as_ref().map(|n| n.name.as_str()).unwrap_or("")
    }
}
