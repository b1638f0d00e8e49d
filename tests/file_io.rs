//! Exercises the file-facing parts of the crate -- `open-input-file`,
//! `read-char`, and `repl::run_file` -- against real temporary files rather
//! than stdin/stdout, since those are the port kinds the in-process
//! `Interpreter` tests never touch.

use std::io::Write;

use rusp::value::Value;
use rusp::{repl, Interpreter};

#[test]
fn reads_characters_back_from_an_open_input_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "hi").unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let src = format!(
        "(define p (open-input-file \"{path}\"))
         (list (read-char p) (read-char p) (read-char p))"
    );

    let mut interp = Interpreter::new();
    let v = interp.eval_str(&src).unwrap();
    assert_eq!(interp.write_string(v), "(#\\h #\\i #f)");
}

#[test]
fn run_file_executes_every_top_level_form_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let script_path = dir.path().join("script.scm");
    std::fs::write(&script_path, "(define x 1) (define y (+ x 1)) (define z (+ y 1))").unwrap();

    let mut interp = Interpreter::new();
    repl::run_file(&mut interp, &script_path).unwrap();

    let z = interp.eval_str("z").unwrap();
    assert_eq!(z, Value::Int(3));
}

#[test]
fn run_file_reports_a_missing_file_as_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.scm");

    let mut interp = Interpreter::new();
    assert!(repl::run_file(&mut interp, &missing).is_err());
}
