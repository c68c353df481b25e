use std::{
    fs,
    io::{self, IsTerminal, Read, Write},
    path::PathBuf,
    process,
};

use clap::Parser;
use lambref::{interpreter, parser, Interpreter, TypeStore};

#[derive(Parser)]
#[command(version, about = "Interpreter for a typed lambda calculus with \
references and subtyping")]
struct Args {
    /// Program file; reads standard input when omitted.
    file: Option<PathBuf>,

    /// Advisory evaluation step budget.
    #[arg(long)]
    max_steps: Option<usize>,
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(code) => process::exit(code),
        Err(error) => {
            eprintln!("error: {error}");
            process::exit(1);
        }
    }
}

fn run(args: &Args) -> io::Result<i32> {
    if let Some(path) = &args.file {
        let source = fs::read_to_string(path)?;
        return Ok(pipeline(&source, args.max_steps));
    }

    let stdin = io::stdin();
    if !stdin.is_terminal() {
        let mut source = String::new();
        stdin.lock().read_to_string(&mut source)?;
        return Ok(pipeline(&source, args.max_steps));
    }

    repl(args.max_steps)
}

/// Interactive mode: an empty line evaluates the accumulated input,
/// Ctrl+D exits.
fn repl(max_steps: Option<usize>) -> io::Result<i32> {
    println!("Enter a program, finish with an empty line; Ctrl+D exits.");
    let mut buffer = String::new();
    loop {
        if buffer.is_empty() {
            print!("> ");
        } else {
            print!("| ");
        }
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            println!();
            if !buffer.trim().is_empty() {
                pipeline(&buffer, max_steps);
            }
            return Ok(0);
        }

        if line.trim().is_empty() {
            if !buffer.trim().is_empty() {
                pipeline(&buffer, max_steps);
                buffer.clear();
            }
        } else {
            buffer.push_str(&line);
        }
    }
}

/// Runs parse → typecheck → eval on one program and prints the outcome.
/// The returned exit code is 0 for a value, 1 for a parse (or lex) error,
/// 2 for a type error, and 3 when evaluation got stuck or ran out of
/// budget.
fn pipeline(source: &str, max_steps: Option<usize>) -> i32 {
    let mut types = TypeStore::new();

    let term = match parser::parse(source, &mut types) {
        Ok(term) => term,
        Err(error) => {
            println!("parse error: {error}");
            return 1;
        }
    };

    match Interpreter::new(&mut types, max_steps).interpret(&term) {
        Ok((rendered, ty)) if ty.is_ill() => {
            println!("type error: {rendered} : {ty}");
            2
        }
        Ok((rendered, ty)) => {
            println!("{rendered} : {ty}");
            0
        }
        Err(interpreter::Error::Stuck(residual)) => {
            println!("runtime: stuck");
            println!("{residual}");
            3
        }
        Err(interpreter::Error::StepLimitExceeded(_)) => {
            println!("step_limit_exceeded");
            3
        }
    }
}
