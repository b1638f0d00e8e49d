use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use rusp::repl;
use rusp::Interpreter;

const BOOTSTRAP_FILE: &str = "stdlib.scm";

#[derive(Parser)]
#[command(name = "rusp", about = "A small Scheme interpreter", long_about = None)]
struct Cli {
    /// Source files to execute in order. With none given, runs a REPL on
    /// an interactive terminal or executes standard input as a script
    /// otherwise.
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut interp = Interpreter::new();
    repl::run_file(&mut interp, std::path::Path::new(BOOTSTRAP_FILE))?;

    if !cli.files.is_empty() {
        for path in &cli.files {
            repl::run_file(&mut interp, path)?;
        }
        return Ok(());
    }

    if std::io::stdin().is_terminal() {
        repl::run_repl(&mut interp)
    } else {
        repl::run_stdin_script(&mut interp)
    }
}
