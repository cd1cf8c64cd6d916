pub mod asm;
pub mod buffer;
pub mod compile;
pub mod disasm;
pub mod heap;
pub mod jit;

pub use crate::buffer::{CodeBuffer, ExecutableBuffer, Hex, Patch};
pub use crate::compile::{compile_code, compile_entry, compile_entry_with, compile_expr, CallingConvention, CompileError};
pub use crate::disasm::disassemble;
pub use crate::heap::Heap;
pub use crate::jit::{eval, run, EvalError, RunError, Value};
