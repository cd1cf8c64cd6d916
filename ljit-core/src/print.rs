use std::fmt;
use crate::{Arena, Node};

pub struct NodeDisplay<'a> {
    arena: &'a Arena,
    node: Node,
}

impl Arena {
    pub fn display(&self, node: Node) -> NodeDisplay<'_> {
        NodeDisplay { arena: self, node }
    }
}

impl fmt::Display for NodeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Node::Integer(value) => write!(f, "{}", value),
            Node::Char(value) => write!(f, "'{}'", value as char),
            Node::Bool(true) => f.write_str("#t"),
            Node::Bool(false) => f.write_str("#f"),
            Node::Nil => f.write_str("()"),
            Node::Error => f.write_str("#<error>"),
            Node::Symbol(_) => f.write_str(self.arena.symbol_name(self.node)),
            Node::Pair(_) => {
                f.write_str("(")?;
                let mut rest = self.node;
                let mut first = true;
                while rest.is_pair() {
                    if !first {
                        f.write_str(" ")?;
                    }
                    first = false;
                    write!(f, "{}", self.arena.display(self.arena.car(rest)))?;
                    rest = self.arena.cdr(rest);
                }
                if rest != Node::Nil {
                    write!(f, " . {}", self.arena.display(rest))?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(arena: &Arena, node: Node) -> String {
        arena.display(node).to_string()
    }

    #[test]
    fn immediates() {
        let arena = Arena::new();
        assert_eq!(show(&arena, Node::Integer(-13)), "-13");
        assert_eq!(show(&arena, Node::Char(b'a')), "'a'");
        assert_eq!(show(&arena, Node::Bool(true)), "#t");
        assert_eq!(show(&arena, Node::Bool(false)), "#f");
        assert_eq!(show(&arena, Node::Nil), "()");
        assert_eq!(show(&arena, Node::Error), "#<error>");
    }

    #[test]
    fn lists() {
        let mut arena = Arena::new();
        let plus = arena.symbol("+", None);
        let inner = arena.list(&[Node::Integer(2), Node::Integer(3)]);
        let list = arena.list(&[plus, Node::Integer(1), inner]);
        assert_eq!(show(&arena, list), "(+ 1 (2 3))");
    }

    #[test]
    fn improper_tail() {
        let mut arena = Arena::new();
        let tail = arena.cons(Node::Integer(2), Node::Integer(3));
        let pair = arena.cons(Node::Integer(1), tail);
        assert_eq!(show(&arena, pair), "(1 2 . 3)");
    }
}
