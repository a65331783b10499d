use std::path::{Path, PathBuf};

use crate::JsirErrorExt;

#[derive(Debug, Clone)]
pub struct Script {
    pub name: String,
    pub path: PathBuf,
    pub content: String,
}

impl Script {
    pub fn new(path: PathBuf) -> Result<Self, Box<dyn JsirErrorExt>> {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let content = std::fs::read_to_string(&path).map_err(|_| {
            Box::new(MissingScriptError { path: path.clone() }) as Box<dyn JsirErrorExt>
        })?;
        Ok(Script {
            name,
            path,
            content,
        })
    }

    /// Wraps in-memory source text, e.g. a snippet handed over by an embedder.
    pub fn from_source(name: &str, content: &str) -> Self {
        Script {
            name: name.to_string(),
            path: PathBuf::from(name),
            content: content.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Fails with a warning-level diagnostic when there is nothing to compile.
    pub fn ensure_not_empty(&self) -> Result<(), Box<dyn JsirErrorExt>> {
        if self.is_empty() {
            return Err(Box::new(EmptyScriptError {
                name: self.name.clone(),
            }));
        }
        Ok(())
    }
}

impl std::fmt::Display for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Script: {} at {:?}", self.name, self.path)
    }
}

/// Expands file arguments that may contain glob patterns.
///
/// Plain paths are passed through untouched (so a missing file is reported
/// by `Script::new`); patterns are expanded relative to `base` when they are
/// not absolute. Results keep argument order, each pattern sorted.
pub fn expand_script_patterns(
    patterns: &[String],
    base: &Path,
) -> Result<Vec<PathBuf>, Box<dyn JsirErrorExt>> {
    let mut out = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let full = if Path::new(pattern).is_absolute() {
            pattern.clone()
        } else {
            base.join(pattern).to_string_lossy().to_string()
        };
        let paths = glob::glob(&full).map_err(|e| {
            Box::new(ScriptPatternError {
                pattern: pattern.clone(),
                reason: e.to_string(),
            }) as Box<dyn JsirErrorExt>
        })?;
        let mut matched: Vec<PathBuf> = paths.filter_map(Result::ok).filter(|p| p.is_file()).collect();
        matched.sort();
        log::debug!("pattern '{}' matched {} script(s)", pattern, matched.len());
        out.extend(matched);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct MissingScriptError {
    pub path: PathBuf,
}

impl std::fmt::Display for MissingScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Missing script at {:?}", self.path)
    }
}

impl std::error::Error for MissingScriptError {}

impl JsirErrorExt for MissingScriptError {
    fn level(&self) -> crate::Level {
        crate::Level::Error
    }

    fn kind(&self) -> crate::ErrorKind {
        crate::ErrorKind::Script
    }

    fn message(&self) -> String {
        format!("Missing script at {:?}", self.path)
    }

    fn issuer(&self) -> String {
        "jsir.script".to_string()
    }

    fn span(&self) -> Option<crate::location::Span> {
        None
    }

    fn location(&self) -> Option<crate::location::Location> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct EmptyScriptError {
    pub name: String,
}

impl std::fmt::Display for EmptyScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Script '{}' is empty", self.name)
    }
}

impl std::error::Error for EmptyScriptError {}

impl JsirErrorExt for EmptyScriptError {
    fn level(&self) -> crate::Level {
        crate::Level::Warning
    }

    fn kind(&self) -> crate::ErrorKind {
        crate::ErrorKind::Script
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn issuer(&self) -> String {
        "jsir.script".to_string()
    }

    fn span(&self) -> Option<crate::location::Span> {
        None
    }

    fn location(&self) -> Option<crate::location::Location> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct ScriptPatternError {
    pub pattern: String,
    pub reason: String,
}

impl std::fmt::Display for ScriptPatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid script pattern '{}': {}", self.pattern, self.reason)
    }
}

impl std::error::Error for ScriptPatternError {}

impl JsirErrorExt for ScriptPatternError {
    fn level(&self) -> crate::Level {
        crate::Level::Error
    }

    fn kind(&self) -> crate::ErrorKind {
        crate::ErrorKind::Script
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn issuer(&self) -> String {
        "jsir.script.expand_script_patterns".to_string()
    }

    fn span(&self) -> Option<crate::location::Span> {
        None
    }

    fn location(&self) -> Option<crate::location::Location> {
        None
    }
}
