use zett_foundation::{const_assert, highbit32};
use zett_io::{BitReader, ReverseBitReader};

use crate::{Error, NormalizedCounts};

#[derive(Debug, Clone, Copy)]
#[repr(C, align(4))]
pub struct Entry {
    symbol: u8,
    n_bits: u8,
    baseline: u16,
}

const_assert!(std::mem::size_of::<Entry>() == 4);
const_assert!(std::mem::align_of::<Entry>() == 4);

/// Per-state decode records: emit `symbol`, then
/// `state = baseline + read(n_bits)`.
#[derive(Debug)]
pub struct DecodingTable {
    entries: Box<[Entry]>,
    table_log: u8,
    fast_mode: bool,
}

impl DecodingTable {
    /// Parse a serialized table description and build the table.
    pub fn read(
        src: &mut BitReader,
        max_accuracy_log: u8,
        max_symbol: u8,
    ) -> Result<Self, Error> {
        let dist = NormalizedCounts::read(src, max_accuracy_log, max_symbol)?;
        Self::from_counts(&dist)
    }

    pub fn from_counts(dist: &NormalizedCounts) -> Result<Self, Error> {
        let table_log = dist.table_log();
        let size = dist.table_size();
        let cells = dist.spread()?;

        let mut symbol_next = [0u16; crate::MAX_SYMBOLS];
        for (s, &count) in dist.counts().iter().enumerate() {
            symbol_next[s] = if count == -1 { 1 } else { count as u16 };
        }

        let entries = cells
            .iter()
            .map(|&symbol| {
                let next = symbol_next[symbol as usize];
                debug_assert!(next > 0);
                symbol_next[symbol as usize] += 1;

                let n_bits = table_log - highbit32(next as u32) as u8;
                let baseline = ((next as u32) << n_bits).wrapping_sub(size as u32);

                Entry {
                    symbol,
                    n_bits,
                    baseline: baseline as u16,
                }
            })
            .collect();

        Ok(Self {
            entries,
            table_log,
            fast_mode: dist.fast_mode(),
        })
    }

    /// Degenerate single-symbol table: zero-bit states, log 0. The stream
    /// spends no bits on this channel at all.
    pub fn rle(symbol: u8) -> Self {
        Self {
            entries: Box::new([Entry {
                symbol,
                n_bits: 0,
                baseline: 0,
            }]),
            table_log: 0,
            fast_mode: false,
        }
    }

    #[inline(always)]
    pub const fn table_log(&self) -> u8 {
        self.table_log
    }

    /// True when no symbol owns half the table; every transition then
    /// reads at least one bit.
    #[inline(always)]
    pub const fn fast_mode(&self) -> bool {
        self.fast_mode
    }
}

/// One decoding state walking a [`DecodingTable`] forward.
pub struct Decoder<'t> {
    state: u16,
    table: &'t DecodingTable,
}

impl<'t> Decoder<'t> {
    pub fn new(
        table: &'t DecodingTable,
        src: &mut ReverseBitReader,
    ) -> Result<Self, Error> {
        let state = src.read(table.table_log)? as u16;
        Ok(Self { state, table })
    }

    /// Symbol the current state denotes, without advancing.
    #[inline(always)]
    pub fn peek(&self) -> u8 {
        self.table.entries[self.state as usize].symbol
    }

    /// Bits the next [`Decoder::update`] will consume.
    #[inline(always)]
    pub fn bits_required(&self) -> u8 {
        self.table.entries[self.state as usize].n_bits
    }

    #[inline(always)]
    pub fn update(&mut self, src: &mut ReverseBitReader) -> Result<(), Error> {
        let entry = &self.table.entries[self.state as usize];
        let bits = src.read(entry.n_bits)?;
        self.state = entry.baseline + bits as u16;
        Ok(())
    }

    #[inline(always)]
    pub fn decode(&mut self, src: &mut ReverseBitReader) -> Result<u8, Error> {
        let symbol = self.peek();
        self.update(src)?;
        Ok(symbol)
    }

    /// Zero-padding transition for the stream tail. Only sound on
    /// [`DecodingTable::fast_mode`] tables, where `n_bits >= 1` always.
    #[inline(always)]
    pub fn decode_padded(&mut self, src: &mut ReverseBitReader) -> u8 {
        let entry = &self.table.entries[self.state as usize];
        let bits = src.read_padded(entry.n_bits);
        self.state = entry.baseline + bits as u16;
        entry.symbol
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_rfc_appendix_a() -> Result<(), Error> {
        // RFC 8878 Appendix A: the predefined Literal Length table at
        // accuracy log 6.
        let counts: &'static [i16] = &[
            4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3,
            2, 1, 1, 1, 1, 1, -1, -1, -1, -1,
        ];

        let dist = NormalizedCounts::from_predefined(counts, 6);
        let table = DecodingTable::from_counts(&dist)?;

        // State | Symbol | Number_Of_Bits | Base
        let expected = [
            (0, 0, 4, 0),
            (1, 0, 4, 16),
            (2, 1, 5, 32),
            (3, 3, 5, 0),
            (4, 4, 5, 0),
            (5, 6, 5, 0),
            (60, 35, 6, 0),
            (63, 32, 6, 0),
        ];

        for (state, symbol, n_bits, baseline) in expected {
            let entry = table.entries[state];
            assert_eq!(entry.symbol, symbol, "State {state}: symbol mismatch");
            assert_eq!(entry.n_bits, n_bits, "State {state}: bits mismatch");
            assert_eq!(entry.baseline, baseline, "State {state}: base mismatch");
        }

        assert!(table.fast_mode());
        Ok(())
    }

    #[test]
    fn test_rle_table_costs_nothing() -> Result<(), Error> {
        let table = DecodingTable::rle(42);
        assert_eq!(table.table_log(), 0);

        // A lone sentinel byte: zero data bits.
        let mut r = ReverseBitReader::new(&[0x01])?;
        let mut dec = Decoder::new(&table, &mut r)?;

        for _ in 0..100 {
            assert_eq!(dec.decode(&mut r)?, 42);
        }
        assert_eq!(r.bits_remaining(), 0);

        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        #[test]
        fn test_fuzz_table_states_stay_in_bounds(
            raw in proptest::collection::vec(0u32..1000, 2..100),
            table_log in 6u8..=9,
        ) {
            if raw.iter().filter(|&&c| c > 0).count() < 2 {
                return Ok(());
            }

            let dist = match NormalizedCounts::from_counts(&raw, table_log) {
                Ok(it) => it,
                Err(_) => return Ok(()),
            };
            let table = DecodingTable::from_counts(&dist)?;

            let size = 1usize << table_log;
            for entry in &table.entries {
                prop_assert!(entry.n_bits <= table_log);
                let upper = entry.baseline as usize + (1 << entry.n_bits);
                prop_assert!(upper <= size, "state transition escapes the table");
            }
        }
    }
}
