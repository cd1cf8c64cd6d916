#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Clone, Copy)]
pub struct Pos {
    offset: u32,
}

impl Pos {
    pub fn new(offset: u32) -> Pos {
        Pos { offset }
    }

    pub fn source_pos(self) -> usize {
        self.offset as usize
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Copy)]
pub struct Span {
    start: Pos,
    end: Pos,
}

impl Span {
    pub fn new(start: Pos, end: Pos) -> Span {
        debug_assert!(start <= end, "span ends before it starts");
        Span { start, end }
    }

    /// Zero-length span at `pos`.
    pub fn point(pos: Pos) -> Span {
        Span { start: pos, end: pos }
    }

    pub fn start(self) -> Pos {
        self.start
    }

    pub fn source_range(self) -> std::ops::Range<usize> {
        self.start.source_pos()..self.end.source_pos()
    }

    pub fn source_len(self) -> usize {
        self.end.source_pos() - self.start.source_pos()
    }
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start.offset, self.end.offset)
    }
}
