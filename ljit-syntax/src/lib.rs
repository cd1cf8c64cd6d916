pub mod cursor;
mod pos;

pub use crate::cursor::Cursor;
pub use crate::pos::{Pos, Span};
