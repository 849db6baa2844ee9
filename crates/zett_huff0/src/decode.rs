use zett_io::{BitReader, ReverseBitReader};

use crate::{Error, MAX_BITS, MAX_SYMBOLS, WEIGHTS_ACCURACY_LOG};

#[repr(align(2))]
#[derive(Debug, Clone, Copy)]
struct Entry {
    symbol: u8,
    n_bits: u8,
}

/// Flat lookup table: the next `max_bits` of the stream index straight
/// into `entries`; the entry tells how many of those bits the symbol
/// actually used.
#[derive(Debug)]
pub struct DecodingTable {
    entries: Box<[Entry]>,
    max_bits: u8,
}

impl DecodingTable {
    /// Parse a serialized tree description. Returns the table and the
    /// number of header bytes consumed.
    pub fn read(src: &[u8]) -> Result<(Self, usize), Error> {
        let mut weights = [0u8; MAX_SYMBOLS];
        let (weights_count, consumed) = read_weights(src, &mut weights)?;

        for &w in &weights[..weights_count] {
            if w > MAX_BITS {
                return Err(Error::WeightTooLarge(w, MAX_BITS));
            }
        }

        let table = Self::from_weights(&weights[..weights_count])?;
        tracing::trace!(weights_count, consumed, max_bits = table.max_bits, "tree read");
        Ok((table, consumed))
    }

    /// Build the canonical table from explicit weights; the final present
    /// symbol's weight is inferred from the power-of-two completion.
    pub fn from_weights(weights: &[u8]) -> Result<Self, Error> {
        let mut sum = 0u32;
        let mut bit_rank = [0u32; (MAX_BITS + 1) as usize];

        for &w in weights {
            if w == 0 {
                continue;
            }

            sum += 1 << (w - 1);
            bit_rank[w as usize] += 1;
        }

        if sum == 0 {
            return Err(Error::ZeroWeightSum);
        }

        let max_bits = sum.ilog2() as u8 + 1;
        if max_bits > MAX_BITS {
            return Err(Error::TableLogTooLarge(max_bits, MAX_BITS));
        }

        let target = 1u32 << max_bits;
        let remainder = target - sum;

        if remainder == 0 || !remainder.is_power_of_two() {
            return Err(Error::InvalidInferredWeight(remainder));
        }

        let inferred_weight = remainder.ilog2() as u8 + 1;
        bit_rank[inferred_weight as usize] += 1;

        // First table slot of each weight class, lowest weights (longest
        // codes) first.
        let mut next_code = [0u32; (MAX_BITS + 1) as usize];
        let mut curr = 0u32;
        for w in 1..=max_bits as usize {
            next_code[w] = curr;
            curr += bit_rank[w] << (w - 1);
        }

        if curr != target {
            return Err(Error::TableUnderflow);
        }

        let mut entries = vec![
            Entry {
                symbol: 0,
                n_bits: 0,
            };
            target as usize
        ]
        .into_boxed_slice();

        for (sym, &w) in weights
            .iter()
            .chain(std::iter::once(&inferred_weight))
            .enumerate()
        {
            if w == 0 {
                continue;
            }

            let code_start = next_code[w as usize] as usize;
            let n_bits = max_bits - (w - 1);
            let num_slots = 1usize << (w - 1);

            for entry in &mut entries[code_start..code_start + num_slots] {
                *entry = Entry {
                    symbol: sym as u8,
                    n_bits,
                };
            }

            next_code[w as usize] += num_slots as u32;
        }

        Ok(Self { entries, max_bits })
    }

    #[inline(always)]
    pub const fn max_bits(&self) -> u8 {
        self.max_bits
    }
}

/// Sliding-window decoder: the state is the next `max_bits` of the
/// stream; each symbol consumes its own length and shifts fresh bits in.
pub struct Decoder<'t> {
    state: u64,
    table: &'t DecodingTable,
}

impl<'t> Decoder<'t> {
    pub fn new(table: &'t DecodingTable, r: &mut ReverseBitReader) -> Self {
        let state = r.read_padded(table.max_bits);
        Self { state, table }
    }

    #[inline(always)]
    pub fn decode(&mut self, r: &mut ReverseBitReader) -> u8 {
        debug_assert!((self.state as usize) < self.table.entries.len());
        let entry = self.table.entries[self.state as usize];
        let new_bits = r.read_padded(entry.n_bits);

        self.state <<= entry.n_bits;
        self.state &= self.table.entries.len() as u64 - 1;
        self.state |= new_bits;

        entry.symbol
    }

    #[inline(always)]
    pub fn decode4(&mut self, r: &mut ReverseBitReader) -> [u8; 4] {
        [
            self.decode(r),
            self.decode(r),
            self.decode(r),
            self.decode(r),
        ]
    }
}

fn read_weights(src: &[u8], out: &mut [u8; MAX_SYMBOLS]) -> Result<(usize, usize), Error> {
    let header = *src.first().ok_or(Error::Corruption)?;
    let src = &src[1..];

    if header >= 128 {
        // Raw nibbles, high half first.
        let count = (header - 127) as usize;
        let n_bytes = count.div_ceil(2);
        if src.len() < n_bytes {
            return Err(Error::Corruption);
        }

        for (idx, slot) in out[..count].iter_mut().enumerate() {
            let byte = src[idx / 2];
            *slot = if idx % 2 == 0 { byte >> 4 } else { byte & 0xF };
        }

        Ok((count, n_bytes + 1))
    } else {
        let count = read_weights_fse(src, out, header as usize)?;
        Ok((count, header as usize + 1))
    }
}

/// FSE-compressed weights: a table description followed by a reverse
/// stream drained by two alternating states. The weight count is implied
/// by stream exhaustion.
fn read_weights_fse(
    src: &[u8],
    out: &mut [u8; MAX_SYMBOLS],
    compressed_size: usize,
) -> Result<usize, Error> {
    if src.len() < compressed_size {
        return Err(Error::Corruption);
    }
    let src = &src[..compressed_size];

    let mut table_reader = BitReader::new(src)?;
    let table =
        zett_fse::DecodingTable::read(&mut table_reader, WEIGHTS_ACCURACY_LOG, 255)?;

    let mut br = ReverseBitReader::new(&src[table_reader.bytes_consumed()..])?;

    let mut dec1 = zett_fse::Decoder::new(&table, &mut br)?;
    let mut dec2 = zett_fse::Decoder::new(&table, &mut br)?;

    // At most 255 explicit weights; the 256th symbol's weight is always
    // the inferred one.
    let limit = MAX_SYMBOLS - 1;
    let mut idx = 0;

    while idx < limit {
        out[idx] = dec1.peek();
        idx += 1;

        if dec1.bits_required() as usize > br.bits_remaining() {
            if idx < limit {
                out[idx] = dec2.peek();
                idx += 1;
            }
            break;
        }
        dec1.update(&mut br)?;

        if idx >= limit {
            break;
        }

        out[idx] = dec2.peek();
        idx += 1;

        if dec2.bits_required() as usize > br.bits_remaining() {
            if idx < limit {
                out[idx] = dec1.peek();
                idx += 1;
            }
            break;
        }
        dec2.update(&mut br)?;
    }

    if br.bits_remaining() > 0 {
        return Err(Error::Corruption);
    }

    Ok(idx)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_canonical_layout() -> Result<(), Error> {
        // Weights [4, 3, 2, 0, 1] plus inferred weight 1 for symbol 5:
        // sum = 8+4+2+1 = 15, table size 16, max_bits 4.
        let weights = [4, 3, 2, 0, 1];
        let table = DecodingTable::from_weights(&weights)?;

        assert_eq!(table.max_bits, 4);

        let expected: [(usize, u8, u8); 5] = [
            (0, 4, 4),  // symbol 4 (weight 1): slot 0, 4 bits
            (1, 5, 4),  // inferred symbol 5: slot 1
            (2, 2, 3),  // symbol 2 (weight 2): slots 2..4
            (4, 1, 2),  // symbol 1 (weight 3): slots 4..8
            (8, 0, 1),  // symbol 0 (weight 4): slots 8..16
        ];
        for (slot, symbol, n_bits) in expected {
            assert_eq!(table.entries[slot].symbol, symbol, "slot {slot}");
            assert_eq!(table.entries[slot].n_bits, n_bits, "slot {slot}");
        }

        Ok(())
    }

    #[test]
    fn test_simple_inferred_weight() -> Result<(), Error> {
        let weights = [1u8];
        let table = DecodingTable::from_weights(&weights)?;

        assert_eq!(table.max_bits, 1);
        assert_eq!(table.entries[0].symbol, 0);
        assert_eq!(table.entries[1].symbol, 1);

        Ok(())
    }

    #[test]
    fn test_invalid_weight_sum() {
        let weights = [3, 2];
        assert!(DecodingTable::from_weights(&weights).is_ok());

        let weights_bad = [3, 3, 2];
        assert!(DecodingTable::from_weights(&weights_bad).is_err());
    }

    #[test]
    fn test_read_direct() -> Result<(), Error> {
        // Header 129 = two raw weights, nibbles 4 and 3; inferred
        // completes 8+4=12 to 16 with weight 3.
        let data = [129, 0x43];
        let (table, consumed) = DecodingTable::read(&data)?;

        assert_eq!(consumed, 2);
        assert_eq!(table.max_bits, 4);

        Ok(())
    }

    #[test]
    fn test_inferred_weight_boundaries() {
        let w1 = [1, 1, 1];
        let t1 = DecodingTable::from_weights(&w1).expect("valid");
        assert_eq!(t1.max_bits, 2);

        let w_max = [11, 11];
        assert!(
            DecodingTable::from_weights(&w_max).is_err(),
            "no room for an inferred weight"
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn test_fuzz_from_weights(
            weights in proptest::collection::vec(0u8..=MAX_BITS, 2..100)
        ) {
            if let Ok(table) = DecodingTable::from_weights(&weights) {
                prop_assert!(table.max_bits <= MAX_BITS);

                // A successful build always fills every slot.
                for (i, entry) in table.entries.iter().enumerate() {
                    prop_assert!(entry.n_bits > 0, "empty slot at index {}", i);
                }
            }
        }

        #[test]
        fn test_fuzz_read_direct_never_panics(
            count in 1u8..128,
            payload in proptest::collection::vec(any::<u8>(), 0..100)
        ) {
            let header = 127 + count;
            let mut buf = vec![header];
            buf.extend(payload);

            let _ = DecodingTable::read(&buf);
        }
    }
}
