mod output;

use clap::{Arg, ArgAction, ArgMatches, Command};
use jsir_core::script::expand_script_patterns;
use jsir_core::{
    Collector, CodegenOptions, CompilationMode, ErrorHandler, FailFast, JsirErrorExt, Module, Script,
    compile_function_source, compile_script, generate_ast_from_source,
};
use output::{DiagnosticRecord, FormatStyle};
use std::path::{Path, PathBuf};

fn main() {
    let cli = Command::new("jsir")
        .version("0.1.0")
        .about("Lowers JavaScript sources into a block-structured three-address IR");

    let cli = setup_cli(cli);
    let matches = cli.get_matches();
    std::process::exit(dispatch_commands(&matches));
}

/// Arguments shared by every subcommand that compiles scripts.
fn compile_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("files")
            .help("Script files or glob patterns")
            .required(true)
            .num_args(1..)
            .index(1),
    )
    .arg(
        Arg::new("mode")
            .help("How each script is compiled")
            .short('m')
            .long("mode")
            .value_parser(["global", "eval", "function"])
            .default_value("global")
            .value_name("MODE"),
    )
    .arg(
        Arg::new("config")
            .help("JSON file with codegen options")
            .short('c')
            .long("config")
            .value_parser(clap::value_parser!(PathBuf))
            .value_name("FILE"),
    )
    .arg(
        Arg::new("no-const-prop")
            .help("Skip constant propagation")
            .long("no-const-prop")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("no-dce")
            .help("Skip dead-assignment and unreachable-block removal")
            .long("no-dce")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("no-compress")
            .help("Keep one slot per temporary")
            .long("no-compress")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("strict")
            .help("Compile as strict code")
            .long("strict")
            .action(ArgAction::SetTrue),
    )
}

/// Sets up the CLI with subcommands and arguments.
fn setup_cli(cli: Command) -> Command {
    cli.subcommand_required(true)
        .subcommand(
            compile_args(Command::new("build").about("Compile scripts and print their IR or statistics"))
                .arg(
                    Arg::new("dump")
                        .help("What to print for each script")
                        .short('d')
                        .long("dump")
                        .value_parser(["ir", "stats", "ast"])
                        .value_name("STAGE"),
                )
                .arg(
                    Arg::new("output")
                        .help("Write the dump to a file instead of stdout")
                        .short('o')
                        .long("output")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_name("FILE"),
                )
                .arg(
                    Arg::new("show-code")
                        .help("Include the listing taken before temp compression")
                        .long("show-code")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            compile_args(Command::new("check").about("Report every diagnostic without printing IR")).arg(
                Arg::new("json")
                    .help("Print diagnostics as a JSON array")
                    .long("json")
                    .action(ArgAction::SetTrue),
            ),
        )
}

/// Dispatches the subcommand and returns the process exit status.
fn dispatch_commands(matches: &ArgMatches) -> i32 {
    let style = FormatStyle::default();
    let result = match matches.subcommand() {
        Some(("build", sub_m)) => run_build(sub_m, &style),
        Some(("check", sub_m)) => run_check(sub_m, &style),
        _ => {
            eprintln!("No valid subcommand was used. Use --help for more information.");
            return 2;
        }
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", style.diagnostic(e.as_ref()));
            1
        }
    }
}

fn compilation_mode(matches: &ArgMatches) -> CompilationMode {
    match matches.get_one::<String>("mode").map(String::as_str) {
        Some("eval") => CompilationMode::Eval,
        Some("function") => CompilationMode::Function,
        _ => CompilationMode::Global,
    }
}

/// The config file, if any, with the command-line switches layered on top.
fn resolve_options(matches: &ArgMatches) -> Result<CodegenOptions, Box<dyn JsirErrorExt>> {
    let mut options = match matches.get_one::<PathBuf>("config") {
        Some(path) => CodegenOptions::from_json_file(path)?,
        None => CodegenOptions::default(),
    };
    if matches.get_flag("no-const-prop") {
        options.constant_propagation = false;
    }
    if matches.get_flag("no-dce") {
        options.dead_code_elimination = false;
    }
    if matches.get_flag("no-compress") {
        options.compress_temps = false;
    }
    if matches.get_flag("strict") {
        options.strict = true;
    }
    if matches.try_get_one::<bool>("show-code").ok().flatten() == Some(&true) {
        options.show_intermediate_output = true;
    }
    Ok(options)
}

fn script_paths(matches: &ArgMatches) -> Result<Vec<PathBuf>, Box<dyn JsirErrorExt>> {
    let patterns: Vec<String> = matches
        .get_many::<String>("files")
        .map(|files| files.cloned().collect())
        .unwrap_or_default();
    expand_script_patterns(&patterns, Path::new("."))
}

fn compile(
    script: &Script,
    mode: CompilationMode,
    options: &CodegenOptions,
    handler: &mut dyn ErrorHandler,
) -> Result<Module, Box<dyn JsirErrorExt>> {
    match mode {
        CompilationMode::Function => compile_function_source(script, options, handler),
        _ => compile_script(script, mode, options, handler),
    }
}

fn run_build(matches: &ArgMatches, style: &FormatStyle) -> Result<i32, Box<dyn JsirErrorExt>> {
    let options = resolve_options(matches)?;
    let mode = compilation_mode(matches);
    let output = matches.get_one::<PathBuf>("output");
    // Writing to a file with no explicit stage dumps the IR.
    let dump = matches
        .get_one::<String>("dump")
        .map(String::as_str)
        .or(output.map(|_| "ir"));

    let mut rendered = String::new();
    let mut failed = 0usize;
    let mut compiled = 0usize;
    for path in script_paths(matches)? {
        let script = match Script::new(path) {
            Ok(script) => script,
            Err(e) => {
                eprintln!("{}", style.diagnostic(e.as_ref()));
                failed += 1;
                continue;
            }
        };

        if let Err(e) = script.ensure_not_empty() {
            eprintln!("{}", style.diagnostic(e.as_ref()));
            continue;
        }

        if dump == Some("ast") {
            match generate_ast_from_source(&script) {
                Ok(program) => rendered.push_str(&format!("// {}\n{:#?}\n", script.name, program)),
                Err(e) => {
                    eprintln!("{}", style.diagnostic(e.as_ref()));
                    failed += 1;
                }
            }
            continue;
        }

        let mut handler = FailFast::new();
        let module = match compile(&script, mode, &options, &mut handler) {
            Ok(module) => module,
            Err(e) => {
                let reported = handler.into_error().unwrap_or(e);
                eprintln!("{}", style.diagnostic(reported.as_ref()));
                failed += 1;
                continue;
            }
        };
        compiled += 1;

        match dump {
            Some("ir") => {
                rendered.push_str(&format!("// {}\n", script.name));
                rendered.push_str(&output::render_ir(&module));
            }
            Some("stats") => {
                rendered.push_str(&output::stats_table(&script.name, &module).to_string());
                rendered.push('\n');
            }
            _ => println!(
                "{} {} ({} function(s))",
                style.success.apply_to("compiled"),
                script.name,
                module.functions.len()
            ),
        }
    }

    if !rendered.is_empty() {
        match output {
            Some(file) => std::fs::write(file, &rendered).map_err(|e| {
                Box::new(OutputError {
                    path: file.clone(),
                    reason: e.to_string(),
                }) as Box<dyn JsirErrorExt>
            })?,
            None => print!("{}", rendered),
        }
    }

    if failed > 0 {
        eprintln!(
            "{}",
            style
                .error
                .apply_to(format!("{} script(s) failed, {} compiled", failed, compiled))
                .for_stderr()
        );
        return Ok(1);
    }
    Ok(0)
}

fn run_check(matches: &ArgMatches, style: &FormatStyle) -> Result<i32, Box<dyn JsirErrorExt>> {
    let options = resolve_options(matches)?;
    let mode = compilation_mode(matches);
    let json = matches.get_flag("json");

    let mut records = Vec::new();
    let mut diagnostics = 0usize;
    for path in script_paths(matches)? {
        let script = match Script::new(path.clone()) {
            Ok(script) => script,
            Err(e) => {
                diagnostics += 1;
                if json {
                    records.push(DiagnosticRecord::new(&path.to_string_lossy(), e.as_ref()));
                } else {
                    eprintln!("{}", style.diagnostic(e.as_ref()));
                }
                continue;
            }
        };

        let mut handler = Collector::new();
        let result = compile(&script, mode, &options, &mut handler);
        let errors = handler.into_errors();
        diagnostics += errors.len();
        for error in &errors {
            if json {
                records.push(DiagnosticRecord::new(&script.name, error.as_ref()));
            } else {
                eprintln!("{}", style.diagnostic(error.as_ref()));
            }
        }
        // A failure with nothing collected is internal; surface it as is.
        if let Err(e) = result
            && errors.is_empty()
        {
            diagnostics += 1;
            if json {
                records.push(DiagnosticRecord::new(&script.name, e.as_ref()));
            } else {
                eprintln!("{}", style.diagnostic(e.as_ref()));
            }
        }
    }

    if json {
        match serde_json::to_string_pretty(&records) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("{}", style.error.apply_to(e.to_string()).for_stderr()),
        }
    } else if diagnostics == 0 {
        println!("{}", style.success.apply_to("no diagnostics"));
    }
    Ok(if diagnostics > 0 { 1 } else { 0 })
}

/// The build output file could not be written.
#[derive(Debug)]
struct OutputError {
    path: PathBuf,
    reason: String,
}

impl JsirErrorExt for OutputError {
    fn level(&self) -> jsir_core::Level {
        jsir_core::Level::Error
    }

    fn kind(&self) -> jsir_core::ErrorKind {
        jsir_core::ErrorKind::Script
    }

    fn message(&self) -> String {
        format!("cannot write {:?}: {}", self.path, self.reason)
    }

    fn issuer(&self) -> String {
        "jsir.build".to_string()
    }

    fn span(&self) -> Option<jsir_core::Span> {
        None
    }

    fn location(&self) -> Option<jsir_core::Location> {
        None
    }
}
