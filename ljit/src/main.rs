use std::path::{Path, PathBuf};
use structopt::StructOpt;
use tracing::Level;
use ljit::{Compilation, Config, Hex, RunFailure};

mod repl;

type Error = Box<dyn std::error::Error>;
type Result<T, E = Error> = std::result::Result<T, E>;

/// A small Lisp compiled straight to x86-64 machine code.
#[derive(Debug, StructOpt)]
#[structopt(name = "ljit")]
struct Opt {
    /// Heap size in 8-byte words; a program that allocates more corrupts memory
    #[structopt(long, default_value = "65536", global = true)]
    heap_words: usize,
    /// Log more; repeat for more detail
    #[structopt(short, long, parse(from_occurrences), global = true)]
    verbose: u8,
    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Compile and run a program, then print its value
    Run {
        #[structopt(parse(from_os_str))]
        file: PathBuf,
    },
    /// Print the machine code of a program
    Asm {
        #[structopt(parse(from_os_str))]
        file: PathBuf,
        /// Also print the decoded instructions
        #[structopt(long)]
        disasm: bool,
    },
    /// Read, compile and evaluate expressions one line at a time
    Repl {
        /// `eval` runs each line, `asm` prints its machine code
        #[structopt(long, default_value = "eval", possible_values = &["eval", "asm"])]
        mode: repl::Mode,
    },
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    init_tracing(match opt.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    });
    let config = Config {
        heap_words: opt.heap_words,
        ..Config::default()
    };
    match opt.command {
        Command::Run { file } => run(&file, &config),
        Command::Asm { file, disasm } => asm(&file, disasm, &config),
        Command::Repl { mode } => repl::repl(mode, &config),
    }
}

fn init_tracing(level: Level) {
    let _ = tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(path: &Path, config: &Config) -> Result<()> {
    let source = std::fs::read_to_string(path)?;
    let mut compilation = Compilation::from_source(&source);
    // SAFETY: none for programs that outgrow --heap-words; their extra pairs
    // are written past the heap into whatever this process has mapped there
    match unsafe { compilation.run(config) } {
        Ok(value) => {
            println!("{}", value);
            Ok(())
        }
        Err(RunFailure::Diagnostic(error)) => {
            ljit::diagnostics::print_errors(&path.to_string_lossy(), &source, std::iter::once(error))?;
            std::process::exit(1);
        }
        Err(RunFailure::Runtime(error)) => Err(error.into()),
    }
}

fn asm(path: &Path, disasm: bool, config: &Config) -> Result<()> {
    let source = std::fs::read_to_string(path)?;
    let mut compilation = Compilation::from_source(&source);
    match compilation.assemble(config.buffer_capacity) {
        Ok(code) => {
            println!("{}", Hex(code.bytes()));
            if disasm {
                print!("{}", ljit::disassemble(code.bytes()));
            }
            Ok(())
        }
        Err(error) => {
            ljit::diagnostics::print_errors(&path.to_string_lossy(), &source, std::iter::once(error))?;
            std::process::exit(1);
        }
    }
}
