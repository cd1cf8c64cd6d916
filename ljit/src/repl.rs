use std::io::{self, BufRead, Write};
use std::str::FromStr;
use ljit::{Compilation, Config, Hex, RunFailure};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Eval,
    Asm,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Mode, String> {
        match s {
            "eval" => Ok(Mode::Eval),
            "asm" => Ok(Mode::Asm),
            _ => Err(format!("unknown mode `{}`", s)),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Response {
    Printed(String),
    Failed(&'static str, ljit::Error),
}

pub fn repl(mode: Mode, config: &Config) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "lisp> ")?;
        stdout.flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => {
                writeln!(stdout, "Goodbye.")?;
                return Ok(());
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match respond(&line, mode, config) {
            Response::Printed(text) => writeln!(stdout, "{}", text)?,
            Response::Failed(summary, error) => {
                ljit::diagnostics::print_errors("<repl>", &line, std::iter::once(error))?;
                writeln!(stdout, "{}", summary)?;
            }
        }
    }
}

fn respond(line: &str, mode: Mode, config: &Config) -> Response {
    let mut compilation = Compilation::from_source(line);
    let node = match compilation.read() {
        Ok(node) => node,
        Err(error) => return Response::Failed("Parse error.", error),
    };
    match mode {
        Mode::Asm => {
            // `labels` only exists at the top of an entry
            let arena = compilation.arena();
            let entry = node.is_pair() && arena.is_symbol_named(arena.car(node), "labels");
            let code = if entry {
                compilation.assemble(config.buffer_capacity)
            } else {
                compilation.assemble_expr(config.buffer_capacity)
            };
            match code {
                Ok(code) => Response::Printed(Hex(code.bytes()).to_string()),
                Err(error) => Response::Failed("Compile error.", error),
            }
        }
        // SAFETY: same contract as `ljit run`
        Mode::Eval => match unsafe { compilation.run(config) } {
            Ok(value) => Response::Printed(value.to_string()),
            Err(RunFailure::Diagnostic(error)) => Response::Failed("Compile error.", error),
            Err(RunFailure::Runtime(error)) => Response::Printed(format!("Runtime error: {}.", error)),
        },
    }
}
