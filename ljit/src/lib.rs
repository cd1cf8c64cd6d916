pub mod diagnostics;

use ljit_core::{object::WORD_SIZE, Arena, Node, Reader};
use ljit_eval::{CodeBuffer, CompileError, Heap, RunError};

pub use ljit_eval::{disassemble, Hex, Value};
pub use ljit_syntax::{Pos, Span};

/// Runtime knobs for [`Compilation::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Size of the pair heap in 8-byte words.
    pub heap_words: usize,
    /// Initial code buffer size in bytes; the buffer grows as needed.
    pub buffer_capacity: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            heap_words: 65536,
            buffer_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub span: Span,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RunFailure {
    #[error("{}", .0.message)]
    Diagnostic(Error),
    #[error(transparent)]
    Runtime(#[from] RunError),
}

/// One program: a single expression read from `src`.
pub struct Compilation {
    src: String,
    arena: Arena,
    root: Option<Result<Node, Error>>,
}

impl Compilation {
    pub fn from_source(src: &str) -> Compilation {
        Compilation {
            src: src.to_owned(),
            arena: Arena::new(),
            root: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.src
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Reads the program's expression. Text after it, other than
    /// whitespace and comments, is an error.
    pub fn read(&mut self) -> Result<Node, Error> {
        if let Some(root) = &self.root {
            return root.clone();
        }
        let root = read_program(&self.src, &mut self.arena);
        self.root = Some(root.clone());
        root
    }

    pub fn errors(&mut self) -> impl Iterator<Item = Error> {
        self.assemble(Config::default().buffer_capacity).err().into_iter()
    }

    /// Compiles the program as an entry procedure.
    pub fn assemble(&mut self, capacity: usize) -> Result<CodeBuffer, Error> {
        let node = self.read()?;
        let mut buf = CodeBuffer::with_capacity(capacity);
        ljit_eval::compile_entry(&mut buf, &self.arena, node).map_err(|e| compile_error(&self.src, e))?;
        Ok(buf)
    }

    /// Compiles the bare expression, without prologue or `ret`.
    pub fn assemble_expr(&mut self, capacity: usize) -> Result<CodeBuffer, Error> {
        let node = self.read()?;
        let mut buf = CodeBuffer::with_capacity(capacity);
        ljit_eval::compile_expr(&mut buf, &self.arena, node, -WORD_SIZE, None, None)
            .map_err(|e| compile_error(&self.src, e))?;
        Ok(buf)
    }

    /// Compiles and runs the program on a fresh heap of `config.heap_words`.
    ///
    /// # Safety
    ///
    /// Allocation is not bounds checked. The heap must be large enough for
    /// every pair the program allocates, since pairs past its end are
    /// written over the memory that follows it.
    pub unsafe fn run(&mut self, config: &Config) -> Result<Value, RunFailure> {
        let code = self.assemble(config.buffer_capacity).map_err(RunFailure::Diagnostic)?;
        let mut heap = Heap::new(config.heap_words);
        Ok(ljit_eval::run(code, &mut heap)?)
    }
}

fn read_program(src: &str, arena: &mut Arena) -> Result<Node, Error> {
    let mut reader = Reader::new(src);
    let node = reader.read(arena);
    if let Some((span, error)) = reader.error() {
        return Err(Error {
            span,
            message: error.to_string(),
        });
    }
    if !reader.at_end() {
        return Err(Error {
            span: Span::new(reader.pos(), end_of(src)),
            message: "expected a single expression".to_owned(),
        });
    }
    Ok(node)
}

fn compile_error(src: &str, error: CompileError) -> Error {
    Error {
        span: error.span().unwrap_or_else(|| Span::point(end_of(src))),
        message: error.to_string(),
    }
}

fn end_of(src: &str) -> Pos {
    Pos::new(src.len() as u32)
}
