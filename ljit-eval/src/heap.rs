use ljit_core::{object, Arena, Node};
use crate::RunError;

/// Bump-allocated pair storage handed to compiled code.
///
/// Compiled code only ever sees the base pointer; afterwards the Rust side
/// reads pairs back by turning addresses into word indices.
pub struct Heap {
    words: Vec<u64>,
}

impl Heap {
    pub fn new(words: usize) -> Heap {
        Heap {
            words: vec![0; words],
        }
    }

    pub fn with_pairs(pairs: usize) -> Heap {
        Heap::new(pairs * (object::PAIR_SIZE / object::WORD_SIZE) as usize)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn reset(&mut self) {
        for word in &mut self.words {
            *word = 0;
        }
    }

    pub fn as_mut_ptr(&mut self) -> *mut u64 {
        self.words.as_mut_ptr()
    }

    /// Index of the two-word cell at `address`, if it is inside the heap.
    fn cell_index(&self, address: u64) -> Option<usize> {
        let base = self.words.as_ptr() as u64;
        let offset = address.checked_sub(base)?;
        if offset % object::WORD_SIZE as u64 != 0 {
            return None;
        }
        let index = (offset / object::WORD_SIZE as u64) as usize;
        if index + 1 < self.words.len() {
            Some(index)
        } else {
            None
        }
    }

    /// Copies the value `word` refers to out of the heap.
    pub fn decode(&self, word: u64) -> Result<(Arena, Node), RunError> {
        let mut arena = Arena::new();
        let node = self.decode_into(word, &mut arena)?;
        Ok((arena, node))
    }

    fn decode_into(&self, word: u64, arena: &mut Arena) -> Result<Node, RunError> {
        // walk the cdr chain iteratively so long lists don't recurse
        let mut cars = Vec::new();
        let mut rest = word;
        while object::is_pair(rest) {
            let index = self.cell_index(object::address(rest)).ok_or(RunError::Dangling { word: rest })?;
            cars.push(self.words[index]);
            rest = self.words[index + 1];
        }
        let mut node = self.decode_immediate(rest)?;
        for &car in cars.iter().rev() {
            let car = self.decode_into(car, arena)?;
            node = arena.cons(car, node);
        }
        Ok(node)
    }

    fn decode_immediate(&self, word: u64) -> Result<Node, RunError> {
        match Node::from_immediate_word(word) {
            Some(node) => Ok(node),
            None => Err(RunError::Undecodable { word }),
        }
    }
}
