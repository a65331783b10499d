//! file: cli/src/output.rs
//! description: rendering helpers for the driver: styled diagnostics,
//! per-function statistics and machine-readable reports.
//!
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL};
use console::Style;
use serde::Serialize;

use jsir_core::ir::Function;
use jsir_core::{ErrorKind, JsirErrorExt, Level, Module, generate_error_report};

/// Styles for different output elements.
pub struct FormatStyle {
    pub title: Style,
    pub warning: Style,
    pub error: Style,
    pub success: Style,
}

impl Default for FormatStyle {
    fn default() -> Self {
        FormatStyle {
            title: Style::new().bold().underlined(),
            warning: Style::new().yellow(),
            error: Style::new().red().bold(),
            success: Style::new().green().bold(),
        }
    }
}

impl FormatStyle {
    pub fn for_level(&self, level: Level) -> &Style {
        match level {
            Level::Info => &self.title,
            Level::Warning => &self.warning,
            Level::Error | Level::Critical => &self.error,
        }
    }

    /// One styled line per diagnostic. Styling drops out when stderr is not
    /// a terminal, so the plain report text is what pipes and tests see.
    pub fn diagnostic(&self, error: &dyn JsirErrorExt) -> String {
        self.for_level(error.level())
            .apply_to(generate_error_report(error))
            .for_stderr()
            .to_string()
    }
}

/// A diagnostic flattened for `--json` output.
#[derive(Debug, Serialize)]
pub struct DiagnosticRecord {
    pub file: String,
    pub level: String,
    pub kind: ErrorKind,
    pub message: String,
    pub issuer: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl DiagnosticRecord {
    pub fn new(file: &str, error: &dyn JsirErrorExt) -> Self {
        let location = error.location();
        DiagnosticRecord {
            file: location
                .as_ref()
                .map(|l| l.file.clone())
                .unwrap_or_else(|| file.to_string()),
            level: error.level().to_string(),
            kind: error.kind(),
            message: error.message(),
            issuer: error.issuer(),
            line: location.as_ref().map(|l| l.line),
            column: location.as_ref().map(|l| l.column),
        }
    }
}

fn flags(function: &Function) -> String {
    let mut flags = Vec::new();
    if function.is_strict {
        flags.push("strict");
    }
    if function.has_try {
        flags.push("try");
    }
    if function.has_with {
        flags.push("with");
    }
    if function.has_direct_eval {
        flags.push("eval");
    }
    if function.uses_arguments_object {
        flags.push("arguments");
    }
    if function.has_nested_functions {
        flags.push("nested");
    }
    flags.join(",")
}

/// A table with one row per compiled function.
pub fn stats_table(script: &str, module: &Module) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "script", "function", "blocks", "temps", "locals", "formals", "flags",
        ]);
    for function in &module.functions {
        table.add_row(vec![
            Cell::new(script),
            Cell::new(function.display_name()),
            Cell::new(function.blocks.len()),
            Cell::new(function.temp_count),
            Cell::new(function.local_count()),
            Cell::new(function.formals.len()),
            Cell::new(flags(function)),
        ]);
    }
    table
}

/// The IR of every function, preceded by its intermediate listing when one
/// was captured.
pub fn render_ir(module: &Module) -> String {
    let mut out = String::new();
    for function in &module.functions {
        if let Some(listing) = &function.listing {
            out.push_str("// before temp compression\n");
            out.push_str(listing);
            if !listing.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(&function.to_string());
        out.push('\n');
    }
    out
}
