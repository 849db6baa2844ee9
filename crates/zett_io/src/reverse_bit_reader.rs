use crate::Error;

/// Reads a bitstream backwards: last byte first, and within the register,
/// highest positions first. The starting point is the 1-bit end marker in
/// the final byte; the bits immediately below it are returned first.
///
/// A field of `n` bits written forward by [`crate::BitWriter::add_bits`]
/// comes back as the same value; successive fields come back in reverse
/// write order.
#[derive(Debug)]
pub struct ReverseBitReader<'src> {
    src: &'src [u8],
    buf: u64,
    bit_count: u8,
}

impl<'src> ReverseBitReader<'src> {
    pub fn new(src: &'src [u8]) -> Result<Self, Error> {
        if src.is_empty() {
            return Err(Error::EmptyStream);
        }

        let last = src[src.len() - 1];
        if last == 0 {
            return Err(Error::MissingSentinel);
        }

        let src = &src[..src.len() - 1];
        let bit_count = (u8::BITS - last.leading_zeros() - 1) as u8;
        let buf = (last as u64) & ((1 << bit_count) - 1);

        Ok(Self {
            src,
            buf,
            bit_count,
        })
    }

    #[inline(always)]
    pub fn ensure_bits(&mut self, n_bits: u8) -> Result<(), Error> {
        if self.bit_count < n_bits {
            self.refill();
            if self.bit_count < n_bits {
                return Err(Error::NotEnoughBits {
                    requested: n_bits as usize,
                    remaining: self.bits_remaining(),
                });
            }
        }
        Ok(())
    }

    #[inline(always)]
    pub fn read(&mut self, n_bits: u8) -> Result<u64, Error> {
        assert!(n_bits <= 56);

        if n_bits == 0 {
            return Ok(0);
        }

        self.ensure_bits(n_bits)?;
        let ret = self.peek(n_bits);
        self.consume_unchecked(n_bits);

        Ok(ret)
    }

    /// Like [`ReverseBitReader::read`], but once the stream origin is
    /// reached the missing low bits are zero-filled instead of failing.
    /// The tail of a Huffman stream relies on this.
    #[inline(always)]
    pub fn read_padded(&mut self, n_bits: u8) -> u64 {
        assert!(n_bits <= 56);

        if self.bit_count < n_bits {
            self.refill();
        }

        let to_read = self.bit_count.min(n_bits);
        let ret = self.peek(to_read) << (n_bits - to_read);
        self.consume_unchecked(to_read);

        ret
    }

    #[inline(always)]
    pub fn bits_remaining(&self) -> usize {
        self.bit_count as usize + self.src.len() * 8
    }

    /// The next `n_bits` of the stream, highest position as MSB.
    #[inline(always)]
    pub fn peek(&self, n_bits: u8) -> u64 {
        assert!(n_bits <= self.bit_count);

        if n_bits == 0 {
            return 0;
        }

        (self.buf >> (self.bit_count - n_bits)) & ((1u64 << n_bits) - 1)
    }

    #[inline(always)]
    pub fn consume(&mut self, n_bits: u8) {
        assert!(n_bits <= self.bit_count);
        self.consume_unchecked(n_bits)
    }

    #[inline(always)]
    fn consume_unchecked(&mut self, n_bits: u8) {
        self.bit_count -= n_bits;
    }

    #[cold]
    fn refill(&mut self) {
        debug_assert!(self.bit_count < 64);

        let count = ((64 - self.bit_count) / 8) as usize;
        if count == 0 {
            return;
        }

        let to_read = count.min(self.src.len());
        if to_read < 8 {
            return self.refill_cold(to_read);
        }

        debug_assert_eq!(self.bit_count, 0);

        let start = self.src.len() - 8;
        let buf = {
            let bytes = self.src[start..start + 8]
                .try_into()
                .expect("slice length is guaranteed to be 8");
            // Little-endian: the byte nearest the stream end becomes the
            // most significant, i.e. the next to be read.
            u64::from_le_bytes(bytes)
        };

        self.buf = buf;
        self.bit_count = 64;
        self.src = &self.src[..start];
    }

    #[cold]
    fn refill_cold(&mut self, to_read: usize) {
        let start = self.src.len() - to_read;

        let mut chunk = 0u64;
        for (idx, &byte) in self.src[start..].iter().enumerate() {
            chunk |= (byte as u64) << (8 * idx);
        }

        self.buf = (self.buf << (8 * to_read)) | chunk;
        self.bit_count += (to_read * 8) as u8;
        self.src = &self.src[..start];
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_sentinel_and_bit_order() -> Result<(), Error> {
        // 0x1D = 0b0001_1101: sentinel at bit 4, data bits 3..0 read
        // downwards from just below the sentinel.
        let data = [0x1D];

        let mut br = ReverseBitReader::new(&data)?;

        assert_eq!(br.read(1)?, 1, "Bit below sentinel should be 1");
        assert_eq!(br.read(1)?, 1);
        assert_eq!(br.read(1)?, 0);
        assert_eq!(br.read(1)?, 1);

        assert!(matches!(br.read(1), Err(Error::NotEnoughBits { .. })));

        Ok(())
    }

    #[test]
    fn test_field_values_survive_the_reversal() -> Result<(), Error> {
        // Fields 0b01 then 0b11 written forward land as 0b0001_1101.
        let data = [0b0001_1101];
        let mut br = ReverseBitReader::new(&data)?;

        assert_eq!(br.read(2)?, 0b11, "last-written field comes first");
        assert_eq!(br.read(2)?, 0b01);

        Ok(())
    }

    #[test]
    fn test_refill_cold_byte_order() -> Result<(), Error> {
        let data = [0xAA, 0xBB, 0x01];
        let mut br = ReverseBitReader::new(&data)?;

        assert_eq!(br.read(8)?, 0xBB);
        assert_eq!(br.read(8)?, 0xAA);

        Ok(())
    }

    #[test]
    fn test_refill_hot_path() -> Result<(), Error> {
        let data = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x01];
        let mut br = ReverseBitReader::new(&data)?;

        assert_eq!(br.read(8)?, 0x88);
        assert_eq!(br.read(8)?, 0x77);
        assert_eq!(br.read(16)?, 0x6655);
        assert_eq!(br.read(32)?, 0x4433_2211);

        Ok(())
    }

    #[test]
    fn test_read_padded_zero_fills_low_bits() -> Result<(), Error> {
        // Two data bits (0b10), then the stream origin.
        let data = [0b0000_0110];
        let mut br = ReverseBitReader::new(&data)?;

        assert_eq!(br.read_padded(4), 0b1000);
        assert_eq!(br.bits_remaining(), 0);
        assert_eq!(br.read_padded(4), 0);

        Ok(())
    }

    #[test]
    fn test_constructor_edge_cases() -> Result<(), Error> {
        assert!(matches!(
            ReverseBitReader::new(&[]).err(),
            Some(Error::EmptyStream)
        ));

        assert!(matches!(
            ReverseBitReader::new(&[0]).err(),
            Some(Error::MissingSentinel)
        ));

        let mut br = ReverseBitReader::new(&[0x01])?;
        assert!(matches!(br.read(1).err(), Some(Error::NotEnoughBits { .. })));

        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(5000))]

        #[test]
        fn test_fuzz_reads_mirror_writes(
            fields in proptest::collection::vec((any::<u64>(), 1u8..=56), 0..500)
        ) {
            let mut stream = Vec::new();
            let mut w = crate::BitWriter::new(&mut stream);
            for &(value, n_bits) in &fields {
                w.add_bits(value, n_bits);
                w.flush();
            }
            w.close();

            let mut br = ReverseBitReader::new(&stream)?;

            let total: usize = fields.iter().map(|&(_, n)| n as usize).sum();
            prop_assert_eq!(br.bits_remaining(), total);

            for &(value, n_bits) in fields.iter().rev() {
                let expected = value & ((1u64 << n_bits) - 1);
                prop_assert_eq!(br.read(n_bits)?, expected);
            }

            prop_assert_eq!(br.bits_remaining(), 0);
        }
    }
}
