use bitvec::prelude::{BitSlice, Msb0};
use num_bigint::BigUint;

use super::{Error, WORD_CHUNK_BITS};

/// Bit-level reader mirroring [`super::FlatEncoder`].
pub struct FlatDecoder<'b> {
    bits: &'b BitSlice<u8, Msb0>,
    pos: usize,
}

impl<'b> FlatDecoder<'b> {
    pub fn new(bytes: &'b [u8]) -> Self {
        FlatDecoder {
            bits: BitSlice::from_slice(bytes),
            pos: 0,
        }
    }

    pub fn bit(&mut self) -> Result<bool, Error> {
        if self.pos >= self.bits.len() {
            return Err(Error::UnexpectedEnd(1));
        }

        let value = self.bits[self.pos];
        self.pos += 1;

        Ok(value)
    }

    pub fn bits(&mut self, n: u32) -> Result<u8, Error> {
        let mut value = 0u8;

        for _ in 0..n {
            value = (value << 1) | self.bit()? as u8;
        }

        Ok(value)
    }

    pub fn word(&mut self) -> Result<u64, Error> {
        let mut value = 0u64;
        let mut shift = 0u32;

        loop {
            let chunk = self.bits(8)?;

            if shift >= 64 {
                return Err(Error::WordOverflow);
            }

            value |= ((chunk & 0x7f) as u64) << shift;

            if chunk & 0x80 == 0 {
                break;
            }

            shift += WORD_CHUNK_BITS;
        }

        Ok(value)
    }

    pub fn big_word(&mut self) -> Result<BigUint, Error> {
        let mut value = BigUint::from(0u8);
        let mut shift = 0u64;

        loop {
            let chunk = self.bits(8)?;

            value |= BigUint::from(chunk & 0x7f) << shift;

            if chunk & 0x80 == 0 {
                break;
            }

            shift += WORD_CHUNK_BITS as u64;
        }

        Ok(value)
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, Error> {
        self.filler()?;

        if self.pos % 8 != 0 {
            return Err(Error::BufferNotByteAligned);
        }

        let mut out = Vec::new();

        loop {
            let len = self.bits(8)? as usize;

            if len == 0 {
                break;
            }

            for _ in 0..len {
                out.push(self.bits(8)?);
            }
        }

        Ok(out)
    }

    /// Consumes zero bits up to and including the set terminator bit.
    pub fn filler(&mut self) -> Result<(), Error> {
        loop {
            match self.bit() {
                Ok(true) => return Ok(()),
                Ok(false) => continue,
                Err(_) => return Err(Error::BadFiller),
            }
        }
    }

    /// True once only trailing padding could remain.
    pub fn remaining_bits(&self) -> usize {
        self.bits.len().saturating_sub(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::super::FlatEncoder;
    use super::*;

    #[test]
    fn word_round_trip() {
        for value in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX / 3] {
            let mut e = FlatEncoder::new();
            e.word(value);
            let out = e.finish();

            let mut d = FlatDecoder::new(&out);
            assert_eq!(d.word().unwrap(), value);
        }
    }

    #[test]
    fn big_word_round_trip() {
        let value = BigUint::parse_bytes(b"123456789012345678901234567890", 10).unwrap();

        let mut e = FlatEncoder::new();
        e.big_word(&value);
        let out = e.finish();

        let mut d = FlatDecoder::new(&out);
        assert_eq!(d.big_word().unwrap(), value);
    }

    #[test]
    fn bytes_round_trip_across_block_boundary() {
        let value: Vec<u8> = (0..=255u8).cycle().take(600).collect();

        let mut e = FlatEncoder::new();
        e.bits(4, 0b1010); // leave the stream unaligned on purpose
        e.bytes(&value);
        let out = e.finish();

        let mut d = FlatDecoder::new(&out);
        assert_eq!(d.bits(4).unwrap(), 0b1010);
        assert_eq!(d.bytes().unwrap(), value);
    }
}
