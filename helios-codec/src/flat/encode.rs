use bitvec::prelude::{BitVec, Msb0};
use num_bigint::BigUint;
use num_traits::ToPrimitive;

use super::{MAX_BLOCK_LEN, WORD_CHUNK_BITS};

/// Bit-level writer for the flat wire format.
///
/// Bits are emitted most-significant first. The stream is only
/// byte-aligned where the format demands it (byte-string blocks and the
/// final filler).
#[derive(Default)]
pub struct FlatEncoder {
    buffer: BitVec<u8, Msb0>,
}

impl FlatEncoder {
    pub fn new() -> Self {
        FlatEncoder::default()
    }

    pub fn bit(&mut self, value: bool) {
        self.buffer.push(value);
    }

    /// Writes the low `n` bits of `value`, high bit first.
    pub fn bits(&mut self, n: u32, value: u8) {
        for i in (0..n).rev() {
            self.buffer.push((value >> i) & 1 == 1);
        }
    }

    /// Variable-length word: 7-bit chunks, least-significant first, with
    /// a continuation bit on every chunk but the last.
    pub fn word(&mut self, mut value: u64) {
        loop {
            let chunk = (value & 0x7f) as u8;
            value >>= WORD_CHUNK_BITS;

            if value > 0 {
                self.bits(8, chunk | 0x80);
            } else {
                self.bits(8, chunk);
                break;
            }
        }
    }

    /// Same chunking as [`Self::word`] without a width limit.
    pub fn big_word(&mut self, value: &BigUint) {
        let mask = BigUint::from(0x7fu8);
        let mut value = value.clone();

        loop {
            let chunk = (&value & &mask).to_u8().expect("masked to 7 bits");
            value >>= WORD_CHUNK_BITS;

            if value > BigUint::from(0u8) {
                self.bits(8, chunk | 0x80);
            } else {
                self.bits(8, chunk);
                break;
            }
        }
    }

    /// Byte string: aligned to the next byte boundary, then written as
    /// blocks of at most 255 bytes, each prefixed by its length, with a
    /// zero length byte closing the sequence.
    pub fn bytes(&mut self, xs: &[u8]) {
        self.filler();

        for block in xs.chunks(MAX_BLOCK_LEN) {
            self.bits(8, block.len() as u8);

            for b in block {
                self.bits(8, *b);
            }
        }

        self.bits(8, 0);
    }

    /// Zero bits up to the next byte boundary, closed with a set bit.
    pub fn filler(&mut self) {
        while self.buffer.len() % 8 != 7 {
            self.buffer.push(false);
        }

        self.buffer.push(true);
    }

    /// Final padding plus the accumulated bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.filler();
        self.buffer.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_single_chunk() {
        let mut e = FlatEncoder::new();
        e.word(5);
        assert_eq!(e.finish(), vec![0x05, 0x01]);
    }

    #[test]
    fn word_multi_chunk() {
        let mut e = FlatEncoder::new();
        e.word(300);
        // 300 = 0b10_0101100 -> chunks 0x2c | 0x80, then 0x02
        assert_eq!(e.finish(), vec![0xac, 0x02, 0x01]);
    }

    #[test]
    fn filler_completes_byte() {
        let mut e = FlatEncoder::new();
        e.bits(3, 0b101);
        let out = e.finish();
        assert_eq!(out, vec![0b1010_0001]);
    }
}
