use std::fs;

use jsir_core::script::expand_script_patterns;
use jsir_core::{CodegenOptions, CompilationMode, ErrorKind, FailFast, Script, compile_script};

#[test]
fn globs_expand_relative_to_the_base_directory() {
    let td = tempfile::tempdir().expect("tempdir");
    let dir = td.path();
    fs::create_dir(dir.join("lib")).expect("mkdir");
    fs::write(dir.join("lib/b.js"), "var b = 2;").expect("write");
    fs::write(dir.join("lib/a.js"), "var a = 1;").expect("write");
    fs::write(dir.join("lib/notes.txt"), "not a script").expect("write");

    let paths = expand_script_patterns(&["lib/*.js".to_string()], dir).expect("expand");
    let names: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["a.js".to_string(), "b.js".to_string()]);

    for path in paths {
        let script = Script::new(path).expect("load");
        let mut handler = FailFast::new();
        let module = compile_script(&script, CompilationMode::Global, &CodegenOptions::default(), &mut handler)
            .expect("compile");
        assert_eq!(module.root_function().expect("root").name, "%entry");
    }
}

#[test]
fn plain_paths_pass_through_and_missing_files_fail_to_load() {
    let td = tempfile::tempdir().expect("tempdir");
    let missing = "does-not-exist.js".to_string();
    let paths = expand_script_patterns(std::slice::from_ref(&missing), td.path()).expect("expand");
    assert_eq!(paths, vec![std::path::PathBuf::from(&missing)]);

    let err = Script::new(td.path().join(&missing)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Script);
}

#[test]
fn diagnostics_name_the_loaded_file() {
    let td = tempfile::tempdir().expect("tempdir");
    let path = td.path().join("broken.js");
    fs::write(&path, "var x = 1;\n\ncontinue;\n").expect("write");
    let script = Script::new(path).expect("load");
    assert_eq!(script.name, "broken.js");

    let mut handler = FailFast::new();
    assert!(compile_script(&script, CompilationMode::Global, &CodegenOptions::default(), &mut handler).is_err());
    let location = handler.first().and_then(|e| e.location()).expect("location");
    assert_eq!((location.file.as_str(), location.line), ("broken.js", 3));
}

#[test]
fn options_files_feed_the_codegen() {
    let td = tempfile::tempdir().expect("tempdir");
    let path = td.path().join("jsir.json");
    fs::write(&path, r#"{ "compress_temps": false, "show_intermediate_output": true }"#).expect("write");
    let options = CodegenOptions::from_json_file(&path).expect("options");

    let script = Script::from_source("opts.js", "function f(a) { return a; }");
    let mut handler = FailFast::new();
    let module = compile_script(&script, CompilationMode::Global, &options, &mut handler).expect("compile");
    assert!(module.functions.iter().all(|f| f.listing.is_some()));
}
