//! Fixed-width integer encoding shared with the settlement ledger.
//!
//! Every integer is written as a 32-byte big-endian word, the same layout the
//! ledger uses when it hashes arguments, so off-chain and on-chain hashes agree
//! bit for bit.

pub const WORD_SIZE: usize = 32;

/// Encode an unsigned integer as a left-padded 32-byte word.
pub fn u256_word(value: u128) -> [u8; WORD_SIZE] {
    let mut word = [0u8; WORD_SIZE];
    word[WORD_SIZE - 16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Append each value as a word, in the given order.
pub fn append_words<I>(out: &mut Vec<u8>, values: I)
where
    I: IntoIterator<Item = u128>,
{
    for value in values {
        out.extend_from_slice(&u256_word(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_big_endian_and_left_padded() {
        let word = u256_word(0x0102);
        assert!(word[..30].iter().all(|b| *b == 0));
        assert_eq!(word[30], 0x01);
        assert_eq!(word[31], 0x02);
    }

    #[test]
    fn append_keeps_order() {
        let mut out = Vec::new();
        append_words(&mut out, [2u128, 1u128]);
        assert_eq!(out.len(), 64);
        assert_eq!(out[31], 2);
        assert_eq!(out[63], 1);
    }
}
