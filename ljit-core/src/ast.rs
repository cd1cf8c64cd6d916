use ljit_syntax::Span;
use crate::object;

/// A reader datum or a decoded runtime value.
///
/// Immediates are stored inline; pairs and symbols live in an [`Arena`] and
/// are referred to by index, so a node is only meaningful together with the
/// arena that created it.
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum Node {
    Integer(i64),
    Char(u8),
    Bool(bool),
    Nil,
    Error,
    Pair(PairId),
    Symbol(SymbolId),
}

#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub struct PairId(u32);

#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub struct SymbolId(u32);

#[derive(Debug, Clone)]
struct Pair {
    car: Node,
    cdr: Node,
}

#[derive(Debug, Clone)]
struct Symbol {
    name: Box<str>,
    span: Option<Span>,
}

#[derive(Debug, Clone, Default)]
pub struct Arena {
    pairs: Vec<Pair>,
    symbols: Vec<Symbol>,
}

impl Node {
    pub fn is_pair(self) -> bool {
        matches!(self, Node::Pair(_))
    }

    pub fn is_symbol(self) -> bool {
        matches!(self, Node::Symbol(_))
    }

    pub fn is_error(self) -> bool {
        self == Node::Error
    }

    /// The encoded word of an immediate node. Heap nodes only have an
    /// encoding inside a runtime heap.
    ///
    /// Panics if an integer is outside of the encodable range.
    pub fn immediate_word(self) -> Option<u64> {
        match self {
            Node::Integer(value) => Some(object::encode_integer(value)),
            Node::Char(value) => Some(object::encode_char(value)),
            Node::Bool(value) => Some(object::encode_bool(value)),
            Node::Nil => Some(object::NIL),
            Node::Error => Some(object::ERROR),
            Node::Pair(_) | Node::Symbol(_) => None,
        }
    }

    /// Decodes an immediate word; heap-tagged words give `None`.
    pub fn from_immediate_word(word: u64) -> Option<Node> {
        if object::is_integer(word) {
            Some(Node::Integer(object::decode_integer(word)))
        } else if object::is_char(word) {
            Some(Node::Char(object::decode_char(word)))
        } else if object::is_bool(word) {
            Some(Node::Bool(object::decode_bool(word)))
        } else if object::is_nil(word) {
            Some(Node::Nil)
        } else if object::is_error(word) {
            Some(Node::Error)
        } else {
            None
        }
    }
}

impl Arena {
    pub fn new() -> Arena {
        Arena::default()
    }

    pub fn cons(&mut self, car: Node, cdr: Node) -> Node {
        let id = PairId(self.pairs.len() as u32);
        self.pairs.push(Pair { car, cdr });
        Node::Pair(id)
    }

    pub fn symbol(&mut self, name: &str, span: Option<Span>) -> Node {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol { name: name.into(), span });
        Node::Symbol(id)
    }

    /// Builds a proper list ending in nil.
    pub fn list(&mut self, items: &[Node]) -> Node {
        items.iter().rev().fold(Node::Nil, |tail, &item| self.cons(item, tail))
    }

    pub fn car(&self, node: Node) -> Node {
        self.pair(node).car
    }

    pub fn cdr(&self, node: Node) -> Node {
        self.pair(node).cdr
    }

    pub fn set_car(&mut self, node: Node, value: Node) {
        self.pair_mut(node).car = value;
    }

    pub fn set_cdr(&mut self, node: Node, value: Node) {
        self.pair_mut(node).cdr = value;
    }

    pub fn symbol_name(&self, node: Node) -> &str {
        &self.sym(node).name
    }

    pub fn symbol_span(&self, node: Node) -> Option<Span> {
        self.sym(node).span
    }

    pub fn is_symbol_named(&self, node: Node, name: &str) -> bool {
        match node {
            Node::Symbol(_) => self.symbol_name(node) == name,
            _ => false,
        }
    }

    /// Iterates over the elements of a list. A non-nil, non-pair tail ends
    /// the iteration without being yielded.
    pub fn list_items(&self, node: Node) -> ListItems<'_> {
        ListItems { arena: self, rest: node }
    }

    /// Length of a proper list. Panics on an improper one.
    pub fn list_len(&self, mut node: Node) -> usize {
        let mut len = 0;
        while node != Node::Nil {
            assert!(node.is_pair(), "expected a proper list");
            len += 1;
            node = self.cdr(node);
        }
        len
    }

    /// The `n`-th element of a list. Panics if the list is too short.
    pub fn nth(&self, node: Node, n: usize) -> Node {
        let mut rest = node;
        for _ in 0..n {
            rest = self.cdr(rest);
        }
        self.car(rest)
    }

    fn pair(&self, node: Node) -> &Pair {
        match node {
            Node::Pair(PairId(id)) => &self.pairs[id as usize],
            other => panic!("expected a pair, got {:?}", other),
        }
    }

    fn pair_mut(&mut self, node: Node) -> &mut Pair {
        match node {
            Node::Pair(PairId(id)) => &mut self.pairs[id as usize],
            other => panic!("expected a pair, got {:?}", other),
        }
    }

    fn sym(&self, node: Node) -> &Symbol {
        match node {
            Node::Symbol(SymbolId(id)) => &self.symbols[id as usize],
            other => panic!("expected a symbol, got {:?}", other),
        }
    }
}

pub struct ListItems<'a> {
    arena: &'a Arena,
    rest: Node,
}

impl Iterator for ListItems<'_> {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        if !self.rest.is_pair() {
            return None;
        }
        let item = self.arena.car(self.rest);
        self.rest = self.arena.cdr(self.rest);
        Some(item)
    }
}
