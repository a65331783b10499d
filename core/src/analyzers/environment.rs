//! file: core/src/analyzers/environment.rs
//! description: per-scope symbol tables built by the environment scan.
//!
//! Every program and function body gets one `Environment`. They live in an
//! `Environments` arena and refer to their parent by `EnvId`, so the whole
//! tree is dropped together once the unit has been lowered.
//!
use std::collections::HashMap;

use indexmap::IndexMap;

use crate::ast::{FunctionNode, NodeId};

pub type EnvId = usize;

/// What kind of code an environment was compiled as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilationMode {
    #[default]
    Global,
    Eval,
    Function,
}

/// Ordered so that re-entering a name can only upgrade it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemberKind {
    UndefinedMember,
    VariableDefinition,
    VariableDeclaration,
    FunctionDefinition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsesArguments {
    Unknown,
    Used,
    NotUsed,
}

#[derive(Debug, Clone)]
pub struct Member<'a> {
    pub kind: MemberKind,
    /// Slot assigned by the codegen; `-1` until then.
    pub index: i32,
    pub function: Option<&'a FunctionNode>,
}

#[derive(Debug, Clone)]
pub struct Environment<'a> {
    pub parent: Option<EnvId>,
    pub members: IndexMap<String, Member<'a>>,
    pub formals: Vec<String>,
    pub has_direct_eval: bool,
    pub has_nested_functions: bool,
    pub is_strict: bool,
    pub is_named_function_expression: bool,
    pub uses_arguments_object: UsesArguments,
    pub max_number_of_arguments: usize,
    pub compilation_mode: CompilationMode,
}

impl<'a> Environment<'a> {
    pub fn new(parent: Option<EnvId>, mode: CompilationMode) -> Self {
        Environment {
            parent,
            members: IndexMap::new(),
            formals: Vec::new(),
            has_direct_eval: false,
            has_nested_functions: false,
            is_strict: false,
            is_named_function_expression: false,
            uses_arguments_object: UsesArguments::Unknown,
            max_number_of_arguments: 0,
            compilation_mode: mode,
        }
    }

    /// Slot of a declared member, if it has been assigned one.
    pub fn find_member(&self, name: &str) -> Option<i32> {
        self.members.get(name).map(|m| m.index).filter(|index| *index >= 0)
    }

    /// Position of a formal; the last duplicate wins, as it does at runtime.
    pub fn find_argument(&self, name: &str) -> Option<usize> {
        self.formals.iter().rposition(|f| f == name)
    }

    pub fn member_kind(&self, name: &str) -> Option<MemberKind> {
        self.members.get(name).map(|m| m.kind)
    }

    /// Enters `name`, upgrading an existing entry when `kind` is not lower.
    ///
    /// Plain variables that shadow a formal are dropped: the formal already
    /// owns the binding.
    pub fn enter(&mut self, name: &str, kind: MemberKind, function: Option<&'a FunctionNode>) {
        if name.is_empty() {
            return;
        }
        if kind != MemberKind::FunctionDefinition && self.formals.iter().any(|f| f == name) {
            return;
        }
        match self.members.get_mut(name) {
            None => {
                self.members.insert(
                    name.to_string(),
                    Member {
                        kind,
                        index: -1,
                        function,
                    },
                );
            }
            Some(existing) if existing.kind <= kind => {
                existing.kind = kind;
                existing.function = function;
            }
            Some(_) => {}
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Arena of every environment in one compilation unit.
#[derive(Debug, Default)]
pub struct Environments<'a> {
    envs: Vec<Environment<'a>>,
    by_node: HashMap<NodeId, EnvId>,
}

impl<'a> Environments<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: NodeId, env: Environment<'a>) -> EnvId {
        let id = self.envs.len();
        self.envs.push(env);
        self.by_node.insert(node, id);
        id
    }

    pub fn for_node(&self, node: NodeId) -> Option<EnvId> {
        self.by_node.get(&node).copied()
    }

    pub fn get(&self, id: EnvId) -> &Environment<'a> {
        &self.envs[id]
    }

    pub fn get_mut(&mut self, id: EnvId) -> &mut Environment<'a> {
        &mut self.envs[id]
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EnvId, &Environment<'a>)> {
        self.envs.iter().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_kinds_only_upgrade() {
        let mut env = Environment::new(None, CompilationMode::Function);
        env.enter("x", MemberKind::VariableDeclaration, None);
        env.enter("x", MemberKind::VariableDefinition, None);
        assert_eq!(env.member_kind("x"), Some(MemberKind::VariableDeclaration));
        env.enter("x", MemberKind::FunctionDefinition, None);
        assert_eq!(env.member_kind("x"), Some(MemberKind::FunctionDefinition));
    }

    #[test]
    fn variables_named_like_formals_are_ignored() {
        let mut env = Environment::new(None, CompilationMode::Function);
        env.formals = vec!["a".to_string()];
        env.enter("a", MemberKind::VariableDefinition, None);
        env.enter("", MemberKind::VariableDefinition, None);
        assert_eq!(env.member_count(), 0);
        env.enter("a", MemberKind::FunctionDefinition, None);
        assert_eq!(env.member_count(), 1);
    }

    #[test]
    fn members_keep_declaration_order() {
        let mut env = Environment::new(None, CompilationMode::Global);
        for name in ["z", "a", "m", "a"] {
            env.enter(name, MemberKind::VariableDeclaration, None);
        }
        let names: Vec<&str> = env.members.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn arena_maps_nodes_to_environments() {
        let mut envs = Environments::new();
        let root = envs.alloc(7, Environment::new(None, CompilationMode::Global));
        let child = envs.alloc(9, Environment::new(Some(root), CompilationMode::Function));
        assert_eq!(envs.for_node(9), Some(child));
        assert_eq!(envs.get(child).parent, Some(root));
        assert_eq!(envs.len(), 2);
    }
}
