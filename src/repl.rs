//! The external collaborators the evaluation engine itself never touches:
//! file execution, the interactive read-eval-print loop, and running
//! standard input as a script. None of this participates in Scheme
//! semantics -- it only drives an [`Interpreter`] and renders its results.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use log::info;

use crate::Interpreter;

/// Reads and evaluates every top-level form in `path`, in order. Used for
/// both the bootstrap `stdlib.scm` load and command-line file arguments.
pub fn run_file(interp: &mut Interpreter, path: &std::path::Path) -> Result<()> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("could not read `{}`", path.display()))?;
    info!("executing {}", path.display());
    interp
        .eval_str(&source)
        .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
    Ok(())
}

/// Executes all of standard input as a single script, for the "no
/// arguments, non-interactive stdin" CLI mode.
pub fn run_stdin_script(interp: &mut Interpreter) -> Result<()> {
    let mut source = String::new();
    io::stdin()
        .lock()
        .read_to_string(&mut source)
        .context("failed reading standard input")?;
    interp
        .eval_str(&source)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(())
}

/// Runs an interactive loop: prompt, read one (possibly multi-line) form,
/// evaluate it, echo its written form. Prints `bye` and returns at EOF.
/// A form-level error is reported to stderr and does not end the session --
/// only EOF does, matching the REPL's role as a forgiving outer shell
/// around a core that itself treats every error as fatal.
pub fn run_repl(interp: &mut Interpreter) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        match read_one_form(&stdin)? {
            None => {
                println!("bye");
                return Ok(());
            }
            Some(source) => match interp.eval_str(&source) {
                Ok(v) => println!("{}", interp.write_string(v)),
                Err(e) => eprintln!("error: {e}"),
            },
        }
    }
}

/// Accumulates lines from `stdin` until parentheses balance (outside string
/// literals and `;` comments), or EOF is reached. Returns `None` only when
/// EOF arrives with nothing but whitespace buffered.
fn read_one_form(stdin: &io::Stdin) -> Result<Option<String>> {
    let mut buf = String::new();
    loop {
        let mut line = String::new();
        let bytes_read = stdin.lock().read_line(&mut line)?;
        if bytes_read == 0 {
            return Ok(if buf.trim().is_empty() { None } else { Some(buf) });
        }
        buf.push_str(&line);
        if is_balanced(&buf) {
            return Ok(Some(buf));
        }
    }
}

/// Whether `text` has balanced top-level parens outside of string literals
/// and `;`-to-end-of-line comments; a non-positive running depth after any
/// unbalanced close counts as balanced too, since the parser will report
/// that as its own parse error rather than have the REPL hang for more
/// input.
fn is_balanced(text: &str) -> bool {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            ';' => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
    }
    depth <= 0 && !in_string
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balances_simple_forms() {
        assert!(is_balanced("(+ 1 2)"));
        assert!(!is_balanced("(+ 1 (* 2 3)"));
        assert!(is_balanced("(+ 1 (* 2 3))"));
    }

    #[test]
    fn ignores_parens_in_strings_and_comments() {
        assert!(is_balanced("(display \"(\")"));
        assert!(is_balanced("(display 1) ; (unbalanced comment"));
    }

    #[test]
    fn multiple_top_level_forms_still_balance() {
        assert!(is_balanced("(define x 1) (+ x 1)"));
    }
}
