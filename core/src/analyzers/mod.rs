pub mod environment;
pub mod scan;

pub use environment::{CompilationMode, EnvId, Environment, Environments, Member, MemberKind, UsesArguments};
pub use scan::{scan_function_expression, scan_program};
