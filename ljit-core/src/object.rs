//! Word-level encoding shared by the reader, the code generator and the
//! values compiled code returns.
//!
//! ```text
//! integer  ...nnnnnnnn00        (shift 2)
//! char     ...cccccccc00001111  (shift 8)
//! bool     ...b0011111          (payload bit 7)
//! nil      00101111
//! error    00111111
//! pair     ...aaaa001           (16-byte cell: car, cdr)
//! symbol   ...aaaa101
//! ```

pub const WORD_SIZE: i32 = 8;
pub const BITS_PER_WORD: u32 = 64;

pub const INTEGER_TAG: u64 = 0x0;
pub const INTEGER_TAG_MASK: u64 = 0x3;
pub const INTEGER_SHIFT: u32 = 2;
pub const INTEGER_BITS: u32 = BITS_PER_WORD - INTEGER_SHIFT;
pub const INTEGER_MAX: i64 = (1 << (INTEGER_BITS - 1)) - 1;
pub const INTEGER_MIN: i64 = -(1 << (INTEGER_BITS - 1));

pub const IMMEDIATE_TAG_MASK: u64 = 0x3f;

pub const CHAR_TAG: u64 = 0x0f;
pub const CHAR_MASK: u64 = 0xff;
pub const CHAR_SHIFT: u32 = 8;

pub const BOOL_TAG: u64 = 0x1f;
pub const BOOL_MASK: u64 = 0x80;
pub const BOOL_SHIFT: u32 = 7;

pub const NIL: u64 = 0x2f;
pub const ERROR: u64 = 0x3f;

pub const PAIR_TAG: u64 = 0x1;
pub const SYMBOL_TAG: u64 = 0x5;
pub const HEAP_TAG_MASK: u64 = 0x7;
pub const HEAP_PTR_MASK: u64 = !HEAP_TAG_MASK;

pub const CAR_OFFSET: i32 = 0;
pub const CDR_OFFSET: i32 = CAR_OFFSET + WORD_SIZE;
pub const PAIR_SIZE: i32 = CDR_OFFSET + WORD_SIZE;

pub fn try_encode_integer(value: i64) -> Option<u64> {
    if (INTEGER_MIN..=INTEGER_MAX).contains(&value) {
        Some((value << INTEGER_SHIFT) as u64)
    } else {
        None
    }
}

pub fn encode_integer(value: i64) -> u64 {
    match try_encode_integer(value) {
        Some(word) => word,
        None => panic!("integer {} does not fit in {} bits", value, INTEGER_BITS),
    }
}

pub fn decode_integer(word: u64) -> i64 {
    (word as i64) >> INTEGER_SHIFT
}

pub fn is_integer(word: u64) -> bool {
    word & INTEGER_TAG_MASK == INTEGER_TAG
}

pub fn encode_char(value: u8) -> u64 {
    ((value as u64) << CHAR_SHIFT) | CHAR_TAG
}

pub fn decode_char(word: u64) -> u8 {
    ((word >> CHAR_SHIFT) & CHAR_MASK) as u8
}

pub fn is_char(word: u64) -> bool {
    word & IMMEDIATE_TAG_MASK == CHAR_TAG
}

pub fn encode_bool(value: bool) -> u64 {
    ((value as u64) << BOOL_SHIFT) | BOOL_TAG
}

pub fn decode_bool(word: u64) -> bool {
    word & BOOL_MASK != 0
}

pub fn is_bool(word: u64) -> bool {
    word & IMMEDIATE_TAG_MASK == BOOL_TAG
}

pub const TRUE: u64 = BOOL_TAG | BOOL_MASK;
pub const FALSE: u64 = BOOL_TAG;

pub fn is_nil(word: u64) -> bool {
    word == NIL
}

pub fn is_error(word: u64) -> bool {
    word == ERROR
}

/// Integers end in `00` and every other immediate ends in `11`.
pub fn is_heap_object(word: u64) -> bool {
    word & 0b11 == 0b01
}

pub fn is_pair(word: u64) -> bool {
    word & HEAP_TAG_MASK == PAIR_TAG
}

pub fn is_symbol(word: u64) -> bool {
    word & HEAP_TAG_MASK == SYMBOL_TAG
}

pub fn address(word: u64) -> u64 {
    word & HEAP_PTR_MASK
}

/// Reads the car of a pair word.
///
/// # Safety
///
/// `word` must be a pair whose masked address points at a live, readable
/// two-word cell.
pub unsafe fn pair_car(word: u64) -> u64 {
    assert!(is_pair(word), "{:#x} is not a pair", word);
    (address(word) as *const u64).read()
}

/// # Safety
///
/// Same as [`pair_car`].
pub unsafe fn pair_cdr(word: u64) -> u64 {
    assert!(is_pair(word), "{:#x} is not a pair", word);
    (address(word) as *const u64).add(1).read()
}

/// # Safety
///
/// `word` must be a pair whose masked address points at a live, writable
/// two-word cell.
pub unsafe fn set_pair_car(word: u64, value: u64) {
    assert!(is_pair(word), "{:#x} is not a pair", word);
    (address(word) as *mut u64).write(value)
}

/// # Safety
///
/// Same as [`set_pair_car`].
pub unsafe fn set_pair_cdr(word: u64, value: u64) {
    assert!(is_pair(word), "{:#x} is not a pair", word);
    (address(word) as *mut u64).add(1).write(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(word: u64) -> Vec<&'static str> {
        let checks: [(&str, fn(u64) -> bool); 6] = [
            ("integer", is_integer),
            ("char", is_char),
            ("bool", is_bool),
            ("nil", is_nil),
            ("error", is_error),
            ("heap", is_heap_object),
        ];
        checks.iter().filter(|(_, check)| check(word)).map(|(name, _)| *name).collect()
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode_integer(123), 0x1ec);
        assert_eq!(encode_integer(-123) as i64, -492);
        assert_eq!(encode_char(b'a'), 0x610f);
        assert_eq!(encode_bool(true), 0x9f);
        assert_eq!(encode_bool(false), 0x1f);
        assert_eq!(TRUE, 0x9f);
        assert_eq!(FALSE, 0x1f);
    }

    #[test]
    fn integer_range_is_inclusive() {
        assert_eq!(decode_integer(encode_integer(INTEGER_MAX)), INTEGER_MAX);
        assert_eq!(decode_integer(encode_integer(INTEGER_MIN)), INTEGER_MIN);
        assert_eq!(try_encode_integer(INTEGER_MAX + 1), None);
        assert_eq!(try_encode_integer(INTEGER_MIN - 1), None);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn encoding_too_large_integer_panics() {
        encode_integer(i64::MAX);
    }

    #[test]
    fn sentinels_are_single_kind() {
        assert_eq!(kinds(NIL), ["nil"]);
        assert_eq!(kinds(ERROR), ["error"]);
        assert_eq!(kinds(TRUE), ["bool"]);
        assert_eq!(kinds(FALSE), ["bool"]);
    }

    #[test]
    fn heap_tags() {
        let cell = [encode_integer(1), encode_integer(2)];
        let word = cell.as_ptr() as u64 | PAIR_TAG;
        assert!(is_pair(word));
        assert!(!is_symbol(word));
        assert_eq!(kinds(word), ["heap"]);
        assert_eq!(address(word), cell.as_ptr() as u64);
        assert_eq!(unsafe { pair_car(word) }, encode_integer(1));
        assert_eq!(unsafe { pair_cdr(word) }, encode_integer(2));
        assert!(is_symbol(0x1000 | SYMBOL_TAG));
        assert_eq!(kinds(0x1000 | SYMBOL_TAG), ["heap"]);
    }

    #[test]
    fn pair_setters_write_through_the_address() {
        let mut cell = [0u64; 2];
        let word = cell.as_mut_ptr() as u64 | PAIR_TAG;
        unsafe {
            set_pair_car(word, encode_char(b'x'));
            set_pair_cdr(word, NIL);
        }
        assert_eq!(cell, [encode_char(b'x'), NIL]);
    }

    proptest! {
        #[test]
        fn integer_round_trip(n in INTEGER_MIN..=INTEGER_MAX) {
            let word = encode_integer(n);
            prop_assert_eq!(decode_integer(word), n);
            prop_assert_eq!(kinds(word), vec!["integer"]);
        }

        #[test]
        fn char_round_trip(c in any::<u8>()) {
            let word = encode_char(c);
            prop_assert_eq!(decode_char(word), c);
            prop_assert_eq!(kinds(word), vec!["char"]);
        }

        #[test]
        fn bool_round_trip(b in any::<bool>()) {
            let word = encode_bool(b);
            prop_assert_eq!(decode_bool(word), b);
            prop_assert_eq!(kinds(word), vec!["bool"]);
        }
    }
}
