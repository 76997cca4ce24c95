use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::io::{self, BufRead};
use std::path::PathBuf;

use loxide as lox;

use clap::Parser as ClapParser;

use lox::lox::Lox;

/// Tree-walking interpreter for the Lox language.
///
/// With a script argument, executes the file; without one, starts an
/// interactive session.
#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Script to execute.
    script: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let _ = simple_logger::init();

    let args: Cli = Cli::parse();

    match args.script.as_slice() {
        [] => run_prompt()?,

        [script] => run_file(script)?,

        _ => {
            eprintln!("Usage: loxide [script]");
            std::process::exit(64);
        }
    }

    Ok(())
}

fn run_file(path: &PathBuf) -> anyhow::Result<()> {
    let mut buf: Vec<u8> = Vec::new();
    let mut reader: BufReader<File> = BufReader::new(File::open(path)?);
    reader.read_to_end(&mut buf)?;

    let mut lox: Lox<io::Stdout> = Lox::new(io::stdout());

    lox.run(&buf);

    if lox.had_error() {
        std::process::exit(65);
    }

    if lox.had_runtime_error() {
        std::process::exit(70);
    }

    Ok(())
}

fn run_prompt() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut lox: Lox<io::Stdout> = Lox::new(io::stdout());

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();

        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF ends the session.
            break;
        }

        lox.run(line.as_bytes());

        // Both flags reset between prompts; a bad line never poisons the
        // next one.
        lox.reset_errors();
    }

    Ok(())
}
