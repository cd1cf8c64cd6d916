pub mod ast;
pub mod env;
pub mod object;
mod print;
pub mod reader;

pub use crate::ast::{Arena, Node, PairId, SymbolId};
pub use crate::env::Env;
pub use crate::print::NodeDisplay;
pub use crate::reader::{read, ReadError, Reader};
