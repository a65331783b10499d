pub mod lower;
pub mod module;
pub mod op;
pub mod opt;
pub mod options;
pub mod value;

pub use lower::Codegen;
pub use lower::err::{CompileFailedError, InternalError, NotAFunctionError, ReferenceError};
pub use module::{BasicBlock, BlockId, Expr, Function, FunctionId, Module, Name, NameKind, Stmt, Temp};
pub use op::{AluOp, Builtin};
pub use options::CodegenOptions;
pub use value::Const;
