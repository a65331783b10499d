use crate::error::{ErrorKind, JsirErrorExt, Level};
use crate::location::{Location, Span};

/// An expression used where a reference is required, e.g. `1 = x` or `f()++`.
#[derive(Debug, Clone)]
pub struct ReferenceError {
    message: String,
    issuer: String,
    location: Option<Location>,
}

impl ReferenceError {
    pub fn new(message: impl Into<String>, issuer: impl Into<String>, location: Option<Location>) -> Self {
        ReferenceError {
            message: message.into(),
            issuer: issuer.into(),
            location,
        }
    }
}

impl std::fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} (at {})", self.message, loc),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ReferenceError {}

impl JsirErrorExt for ReferenceError {
    fn level(&self) -> Level {
        Level::Error
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Reference
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn issuer(&self) -> String {
        self.issuer.clone()
    }

    fn span(&self) -> Option<Span> {
        None
    }

    fn location(&self) -> Option<Location> {
        self.location.clone()
    }
}

/// A broken lowering invariant. Never routed through the error handler.
#[derive(Debug, Clone)]
pub struct InternalError {
    message: String,
    file: String,
}

impl InternalError {
    pub fn new(message: impl Into<String>, file: impl Into<String>) -> Self {
        InternalError {
            message: message.into(),
            file: file.into(),
        }
    }
}

impl std::fmt::Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "internal codegen error in {}: {}", self.file, self.message)
    }
}

impl std::error::Error for InternalError {}

impl JsirErrorExt for InternalError {
    fn level(&self) -> Level {
        Level::Critical
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn issuer(&self) -> String {
        "jsir.ir.lower".to_string()
    }

    fn span(&self) -> Option<Span> {
        None
    }

    fn location(&self) -> Option<Location> {
        None
    }
}

/// Returned by the compile entry points once diagnostics have been handed
/// to the error handler. The diagnostics themselves stay with the handler.
#[derive(Debug, Clone)]
pub struct CompileFailedError {
    pub file: String,
    pub count: usize,
}

impl std::fmt::Display for CompileFailedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "compiling '{}' failed with {} diagnostic(s)", self.file, self.count)
    }
}

impl std::error::Error for CompileFailedError {}

impl JsirErrorExt for CompileFailedError {
    fn level(&self) -> Level {
        Level::Error
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Script
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn issuer(&self) -> String {
        "jsir.ir.lower.Codegen".to_string()
    }

    fn span(&self) -> Option<Span> {
        None
    }

    fn location(&self) -> Option<Location> {
        None
    }
}

/// `--mode function` input that is not a single function.
#[derive(Debug, Clone)]
pub struct NotAFunctionError {
    pub file: String,
}

impl std::fmt::Display for NotAFunctionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' must contain exactly one function", self.file)
    }
}

impl std::error::Error for NotAFunctionError {}

impl JsirErrorExt for NotAFunctionError {
    fn level(&self) -> Level {
        Level::Error
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Script
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn issuer(&self) -> String {
        "jsir.compile_function_source".to_string()
    }

    fn span(&self) -> Option<Span> {
        None
    }

    fn location(&self) -> Option<Location> {
        None
    }
}
