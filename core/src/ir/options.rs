//! file: core/src/ir/options.rs
//! description: switches threaded into the codegen by its caller.
//!
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, JsirErrorExt, Level};
use crate::location::{Location, Span};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodegenOptions {
    pub constant_propagation: bool,
    /// Gates both dead-assignment elimination and unreachable-block removal.
    pub dead_code_elimination: bool,
    /// Keep a textual listing of every function on `Function::listing`.
    pub show_intermediate_output: bool,
    pub compress_temps: bool,
    /// Compile as if the caller were strict code.
    pub strict: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions {
            constant_propagation: true,
            dead_code_elimination: true,
            show_intermediate_output: false,
            compress_temps: true,
            strict: false,
        }
    }
}

impl CodegenOptions {
    pub fn from_json_str(text: &str) -> Result<Self, Box<dyn JsirErrorExt>> {
        serde_json::from_str(text).map_err(|e| {
            Box::new(ConfigError {
                source_name: "<inline>".to_string(),
                reason: e.to_string(),
                line: e.line(),
                column: e.column(),
            }) as Box<dyn JsirErrorExt>
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn JsirErrorExt>> {
        let source_name = path.to_string_lossy().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Box::new(ConfigError {
                source_name: source_name.clone(),
                reason: e.to_string(),
                line: 0,
                column: 0,
            }) as Box<dyn JsirErrorExt>
        })?;
        serde_json::from_str(&text).map_err(|e| {
            Box::new(ConfigError {
                source_name,
                reason: e.to_string(),
                line: e.line(),
                column: e.column(),
            }) as Box<dyn JsirErrorExt>
        })
    }
}

/// A codegen options document that could not be read or parsed.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub source_name: String,
    pub reason: String,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid codegen options in {}: {}", self.source_name, self.reason)
    }
}

impl std::error::Error for ConfigError {}

impl JsirErrorExt for ConfigError {
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
        "jsir.ir.options".to_string()
    }

    fn span(&self) -> Option<Span> {
        None
    }

    fn location(&self) -> Option<Location> {
        (self.line > 0).then(|| Location::new(self.source_name.clone(), self.line, self.column, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let options = CodegenOptions::from_json_str(r#"{ "constant_propagation": false }"#).unwrap();
        assert!(!options.constant_propagation);
        assert!(options.dead_code_elimination);
        assert!(options.compress_temps);
        assert!(!options.show_intermediate_output);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = CodegenOptions::from_json_str(r#"{ "inline_everything": true }"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Script);
        assert!(err.message().contains("inline_everything"));
    }

    #[test]
    fn options_load_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codegen.json");
        std::fs::write(&path, r#"{ "strict": true, "compress_temps": false }"#).unwrap();
        let options = CodegenOptions::from_json_file(&path).unwrap();
        assert!(options.strict);
        assert!(!options.compress_temps);
        assert!(CodegenOptions::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
