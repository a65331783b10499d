use crate::error::{ErrorKind, JsirErrorExt, Level};
use crate::location::{Location, Span};

#[derive(Debug, Clone)]
pub struct SyntaxError {
    level: Level,
    message: String,
    issuer: String,
    location: Option<Location>,
    span: Option<Span>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, issuer: impl Into<String>, location: Option<Location>) -> Self {
        SyntaxError {
            level: Level::Error,
            message: message.into(),
            issuer: issuer.into(),
            location,
            span: None,
        }
    }

    pub fn with(
        level: Level,
        message: String,
        issuer: String,
        location: Option<Location>,
        span: Option<Span>,
    ) -> Self {
        SyntaxError {
            level,
            message,
            issuer,
            location,
            span,
        }
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} (at {})", self.message, loc),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for SyntaxError {}

impl JsirErrorExt for SyntaxError {
    fn level(&self) -> Level {
        self.level
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Syntax
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn issuer(&self) -> String {
        self.issuer.clone()
    }

    fn span(&self) -> Option<Span> {
        self.span.clone()
    }

    fn location(&self) -> Option<Location> {
        self.location.clone()
    }
}
