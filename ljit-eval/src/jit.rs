use std::{fmt, io};
use ljit_core::{Arena, Node};
use thiserror::Error;
use crate::{buffer::CodeBuffer, compile::{self, CompileError}, heap::Heap};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to map code as executable: {0}")]
    Map(#[from] io::Error),
    #[error("result {word:#x} points outside of the heap")]
    Dangling { word: u64 },
    #[error("result {word:#x} is not a value")]
    Undecodable { word: u64 },
}

/// A result copied out of the runtime heap.
#[derive(Debug)]
pub struct Value {
    pub arena: Arena,
    pub node: Node,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.arena.display(self.node))
    }
}

/// Makes `code` executable, runs it on a freshly zeroed `heap` and decodes
/// the returned word.
///
/// # Safety
///
/// `code` must have been produced by [`compile::compile_entry`], or by
/// [`compile::compile_entry_with`] with `rdi` as the argument register, and
/// `heap` must have room for every pair the program allocates. Allocating
/// past its end overwrites whatever memory follows it.
pub unsafe fn run(code: CodeBuffer, heap: &mut Heap) -> Result<Value, RunError> {
    let code = code.make_executable()?;
    heap.reset();
    let word = code.invoke(heap.as_mut_ptr());
    tracing::debug!("entry returned {:#x}", word);
    let (arena, node) = heap.decode(word)?;
    Ok(Value { arena, node })
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Run(#[from] RunError),
}

/// Compiles and runs `node` in one go.
///
/// # Safety
///
/// Same heap requirement as [`run`].
pub unsafe fn eval(arena: &Arena, node: Node, heap: &mut Heap) -> Result<Value, EvalError> {
    let mut code = CodeBuffer::with_capacity(64);
    compile::compile_entry(&mut code, arena, node)?;
    Ok(run(code, heap)?)
}
