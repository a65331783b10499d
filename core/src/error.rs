use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level_str = match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        };
        write!(f, "{}", level_str)
    }
}

/// Broad classification of a diagnostic.
///
/// `Reference` is kept apart from `Syntax` so callers can tell an invalid
/// assignment target from any other malformed construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Syntax,
    Reference,
    Script,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind_str = match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Reference => "ReferenceError",
            ErrorKind::Script => "ScriptError",
            ErrorKind::Internal => "InternalError",
        };
        write!(f, "{}", kind_str)
    }
}

pub trait JsirErrorExt {
    fn level(&self) -> Level;
    fn kind(&self) -> ErrorKind;
    fn message(&self) -> String;
    fn issuer(&self) -> String;
    fn span(&self) -> Option<crate::location::Span>;
    fn location(&self) -> Option<crate::location::Location>;
}

impl fmt::Debug for dyn JsirErrorExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loc_str = match self.location() {
            Some(loc) => format!("{}:{}:{}", loc.file, loc.line, loc.column),
            None => "unknown".to_string(),
        };

        let span_str = match self.span() {
            Some(span) => span.to_string(),
            None => "span:none".to_string(),
        };

        write!(
            f,
            "JSIR | {} | {} | {} | {} | {} | {}",
            self.level(),
            self.kind(),
            loc_str,
            self.issuer(),
            span_str,
            self.message()
        )
    }
}

impl fmt::Display for dyn JsirErrorExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Receives every user-facing diagnostic produced while compiling a unit.
///
/// The return value of [`ErrorHandler::report`] decides what happens next:
/// `false` aborts the whole compilation unit, `true` lets the codegen carry
/// on with the next top-level statement so more diagnostics can be found.
/// Either way the statement that produced the diagnostic is not lowered any
/// further and the unit does not produce IR.
pub trait ErrorHandler {
    fn report(&mut self, error: Box<dyn JsirErrorExt>) -> bool;

    /// Number of diagnostics received so far.
    fn error_count(&self) -> usize;
}

/// Stops at the first diagnostic.
#[derive(Default)]
pub struct FailFast {
    first: Option<Box<dyn JsirErrorExt>>,
}

impl FailFast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first(&self) -> Option<&(dyn JsirErrorExt + 'static)> {
        self.first.as_deref()
    }

    pub fn into_error(self) -> Option<Box<dyn JsirErrorExt>> {
        self.first
    }
}

impl ErrorHandler for FailFast {
    fn report(&mut self, error: Box<dyn JsirErrorExt>) -> bool {
        if self.first.is_none() {
            self.first = Some(error);
        }
        false
    }

    fn error_count(&self) -> usize {
        usize::from(self.first.is_some())
    }
}

/// Records every diagnostic and asks the codegen to keep going.
#[derive(Default)]
pub struct Collector {
    errors: Vec<Box<dyn JsirErrorExt>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> &[Box<dyn JsirErrorExt>] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Box<dyn JsirErrorExt>> {
        self.errors
    }
}

impl ErrorHandler for Collector {
    fn report(&mut self, error: Box<dyn JsirErrorExt>) -> bool {
        log::trace!("collected diagnostic: {}", error.message());
        self.errors.push(error);
        true
    }

    fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Why a scan or lowering step stopped before finishing its node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Abort {
    /// A diagnostic was handed to the [`ErrorHandler`]; `resume` carries its
    /// answer.
    Reported { resume: bool },
    /// A lowering invariant did not hold.
    Internal(String),
}

impl Abort {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Abort::Internal(message.into())
    }
}
