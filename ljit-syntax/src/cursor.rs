use crate::{Pos, Span};

/// Byte-level cursor over source text.
///
/// The reader only deals with ASCII tokens, so the cursor never needs to
/// decode characters; non-ASCII bytes are simply bytes that match no token.
#[derive(Clone)]
pub struct Cursor<'a> {
    source: &'a str,
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str) -> Cursor<'a> {
        Cursor { source, offset: 0 }
    }

    pub fn pos(&self) -> Pos {
        Pos::new(self.offset as u32)
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.source.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.peek_nth(0)
    }

    pub fn peek_nth(&self, n: usize) -> Option<u8> {
        self.source.as_bytes().get(self.offset + n).copied()
    }

    pub fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.offset += 1;
        Some(byte)
    }

    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.offset += 1;
            true
        } else {
            false
        }
    }

    /// Consumes bytes while `pred` holds, stopping after `limit` bytes.
    pub fn eat_while(&mut self, limit: usize, mut pred: impl FnMut(u8) -> bool) -> Span {
        let start = self.pos();
        let mut taken = 0;
        while taken < limit {
            match self.peek() {
                Some(b) if pred(b) => {
                    self.offset += 1;
                    taken += 1;
                }
                _ => break,
            }
        }
        self.span_from(start)
    }

    pub fn span_from(&self, start: Pos) -> Span {
        Span::new(start, self.pos())
    }

    pub fn text(&self, span: Span) -> &'a str {
        &self.source[span.source_range()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peeks_without_consuming() {
        let cursor = Cursor::new("ab");
        assert_eq!(cursor.peek(), Some(b'a'));
        assert_eq!(cursor.peek_nth(1), Some(b'b'));
        assert_eq!(cursor.peek_nth(2), None);
        assert_eq!(cursor.pos(), Pos::new(0));
    }

    #[test]
    fn eat_while_respects_limit() {
        let mut cursor = Cursor::new("aaaaab");
        let span = cursor.eat_while(3, |b| b == b'a');
        assert_eq!(cursor.text(span), "aaa");
        let span = cursor.eat_while(usize::MAX, |b| b == b'a');
        assert_eq!(cursor.text(span), "aa");
        assert_eq!(cursor.bump(), Some(b'b'));
        assert!(cursor.is_eof());
        assert_eq!(cursor.bump(), None);
    }

    #[test]
    fn eat_only_matching_byte() {
        let mut cursor = Cursor::new("#t");
        assert!(!cursor.eat(b't'));
        assert!(cursor.eat(b'#'));
        assert_eq!(cursor.span_from(Pos::new(0)).source_len(), 1);
    }
}
