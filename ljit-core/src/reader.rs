use std::fmt;
use ljit_syntax::{Cursor, Pos, Span};
use crate::{object, Arena, Node};

/// Longest symbol the reader produces; longer runs are split.
pub const ATOM_MAX: usize = 32;

/// Reads the first datum of `source` into `arena`, ignoring whatever
/// follows it. Malformed input gives [`Node::Error`].
pub fn read(source: &str, arena: &mut Arena) -> Node {
    Reader::new(source).read(arena)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    UnexpectedEnd,
    UnclosedList,
    IntegerOutOfRange,
    BadChar,
    BadBool,
    UnexpectedChar,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadError::UnexpectedEnd => "expected an expression",
            ReadError::UnclosedList => "list is never closed",
            ReadError::IntegerOutOfRange => "integer literal does not fit in 62 bits",
            ReadError::BadChar => "malformed character literal",
            ReadError::BadBool => "expected `#t` or `#f`",
            ReadError::UnexpectedChar => "unexpected character",
        })
    }
}

pub struct Reader<'s> {
    cursor: Cursor<'s>,
    error: Option<(Span, ReadError)>,
}

impl<'s> Reader<'s> {
    pub fn new(source: &'s str) -> Reader<'s> {
        Reader {
            cursor: Cursor::new(source),
            error: None,
        }
    }

    pub fn read(&mut self, arena: &mut Arena) -> Node {
        let node = self.datum(arena);
        if node.is_error() && self.error.is_none() {
            self.error = Some((Span::point(self.cursor.pos()), ReadError::UnexpectedEnd));
        }
        node
    }

    /// The first malformed construct and what was wrong with it.
    pub fn error(&self) -> Option<(Span, ReadError)> {
        self.error
    }

    pub fn error_span(&self) -> Option<Span> {
        self.error.map(|(span, _)| span)
    }

    pub fn pos(&self) -> Pos {
        self.cursor.pos()
    }

    /// Whether only whitespace and comments remain after the last datum.
    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.cursor.is_eof()
    }

    fn fail(&mut self, span: Span, error: ReadError) -> Node {
        if self.error.is_none() {
            self.error = Some((span, error));
        }
        Node::Error
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.cursor.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.cursor.bump();
                }
                Some(b';') => {
                    self.cursor.eat_while(usize::MAX, |b| b != b'\n');
                }
                _ => break,
            }
        }
    }

    fn datum(&mut self, arena: &mut Arena) -> Node {
        self.skip_whitespace();
        let start = self.cursor.pos();
        let next_is_digit = self.cursor.peek_nth(1).map_or(false, |b| b.is_ascii_digit());
        match self.cursor.peek() {
            Some(b) if b.is_ascii_digit() => self.integer(false),
            Some(b'-') if next_is_digit => {
                self.cursor.bump();
                self.integer(true)
            }
            Some(b'+') if next_is_digit => {
                self.cursor.bump();
                self.integer(false)
            }
            Some(b) if starts_symbol(b) => {
                let span = self.cursor.eat_while(ATOM_MAX, is_symbol_char);
                arena.symbol(self.cursor.text(span), Some(span))
            }
            Some(b'\'') => {
                self.cursor.bump();
                self.character(start)
            }
            Some(b'#') => {
                self.cursor.bump();
                match self.cursor.bump() {
                    Some(b't') => Node::Bool(true),
                    Some(b'f') => Node::Bool(false),
                    _ => {
                        let span = self.cursor.span_from(start);
                        self.fail(span, ReadError::BadBool)
                    }
                }
            }
            Some(b'(') => {
                self.cursor.bump();
                self.list(start, arena)
            }
            None => self.fail(Span::point(start), ReadError::UnexpectedEnd),
            Some(_) => {
                self.cursor.bump();
                let span = self.cursor.span_from(start);
                self.fail(span, ReadError::UnexpectedChar)
            }
        }
    }

    fn integer(&mut self, negative: bool) -> Node {
        let start = self.cursor.pos();
        let span = self.cursor.eat_while(usize::MAX, |b| b.is_ascii_digit());
        let mut value: i64 = 0;
        for digit in self.cursor.text(span).bytes() {
            let digit = i64::from(digit - b'0');
            let next = value.checked_mul(10).and_then(|v| {
                if negative {
                    v.checked_sub(digit)
                } else {
                    v.checked_add(digit)
                }
            });
            value = match next {
                Some(v) => v,
                None => {
                    let span = self.cursor.span_from(start);
                    return self.fail(span, ReadError::IntegerOutOfRange);
                }
            };
        }
        if object::try_encode_integer(value).is_none() {
            let span = self.cursor.span_from(start);
            return self.fail(span, ReadError::IntegerOutOfRange);
        }
        Node::Integer(value)
    }

    fn character(&mut self, start: Pos) -> Node {
        match self.cursor.peek() {
            None | Some(b'\'') => {
                self.cursor.bump();
                let span = self.cursor.span_from(start);
                return self.fail(span, ReadError::BadChar);
            }
            Some(_) => {}
        }
        let value = self.cursor.bump().unwrap_or_default();
        if !self.cursor.eat(b'\'') {
            let span = self.cursor.span_from(start);
            return self.fail(span, ReadError::BadChar);
        }
        Node::Char(value)
    }

    fn list(&mut self, start: Pos, arena: &mut Arena) -> Node {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.cursor.peek() {
                Some(b')') => {
                    self.cursor.bump();
                    return arena.list(&items);
                }
                None => {
                    let span = self.cursor.span_from(start);
                    return self.fail(span, ReadError::UnclosedList);
                }
                Some(_) => {
                    let item = self.datum(arena);
                    if item.is_error() {
                        return item;
                    }
                    items.push(item);
                }
            }
        }
    }
}

fn starts_symbol(b: u8) -> bool {
    matches!(b, b'+' | b'-' | b'*' | b'<' | b'>' | b'=' | b'?') || b.is_ascii_alphabetic()
}

fn is_symbol_char(b: u8) -> bool {
    starts_symbol(b) || b.is_ascii_digit()
}
