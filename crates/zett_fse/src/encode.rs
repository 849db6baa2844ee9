use zett_io::BitWriter;

use crate::{Error, NormalizedCounts};

#[derive(Debug, Clone, Copy, Default)]
struct SymbolTransform {
    delta_find_state: i32,
    delta_nb_bits: u32,
}

/// Encoding tables: a shared `state_table` holding next-states in
/// `[size, 2*size)`, plus per-symbol transforms driving the constant-time
/// transition
/// `n_bits = (state + delta_nb_bits) >> 16`,
/// `state' = state_table[(state >> n_bits) + delta_find_state]`.
#[derive(Debug)]
pub struct EncodingTable {
    state_table: Box<[u16]>,
    symbols: Box<[SymbolTransform]>,
    table_log: u8,
}

impl EncodingTable {
    pub fn from_counts(dist: &NormalizedCounts) -> Result<Self, Error> {
        let table_log = dist.table_log();
        let size = dist.table_size();
        let cells = dist.spread()?;

        let alphabet = dist.max_symbol() as usize + 1;

        // First state index of each symbol's run inside `state_table`.
        let mut cumul = [0u32; crate::MAX_SYMBOLS + 1];
        for (s, &count) in dist.counts().iter().enumerate() {
            let cells_of = if count == -1 { 1 } else { count as u32 };
            cumul[s + 1] = cumul[s] + cells_of;
        }
        debug_assert_eq!(cumul[alphabet] as usize, size);

        let mut state_table = vec![0u16; size].into_boxed_slice();
        for (u, &symbol) in cells.iter().enumerate() {
            let slot = &mut cumul[symbol as usize];
            state_table[*slot as usize] = (size + u) as u16;
            *slot += 1;
        }

        let mut symbols = vec![SymbolTransform::default(); alphabet].into_boxed_slice();
        let mut total = 0i32;
        for (s, &count) in dist.counts().iter().enumerate() {
            symbols[s] = match count {
                0 => SymbolTransform {
                    // Never encoded; kept harmless for a hypothetical
                    // init-state query.
                    delta_nb_bits: (((table_log as u32) + 1) << 16) - (1 << table_log),
                    delta_find_state: 0,
                },
                -1 | 1 => {
                    let transform = SymbolTransform {
                        delta_nb_bits: ((table_log as u32) << 16) - (1 << table_log),
                        delta_find_state: total - 1,
                    };
                    total += 1;
                    transform
                }
                _ => {
                    let count = count as u32;
                    let max_bits_out =
                        table_log as u32 - zett_foundation::highbit32(count - 1);
                    let min_state_plus = count << max_bits_out;
                    let transform = SymbolTransform {
                        delta_nb_bits: (max_bits_out << 16) - min_state_plus,
                        delta_find_state: total - count as i32,
                    };
                    total += count as i32;
                    transform
                }
            };
        }

        Ok(Self {
            state_table,
            symbols,
            table_log,
        })
    }

    /// Single-symbol table: log 0, every transition free.
    pub fn rle(symbol: u8) -> Self {
        let mut symbols =
            vec![SymbolTransform::default(); symbol as usize + 1].into_boxed_slice();
        symbols[symbol as usize] = SymbolTransform {
            delta_nb_bits: 0,
            delta_find_state: 0,
        };

        Self {
            state_table: vec![0u16; 2].into_boxed_slice(),
            symbols,
            table_log: 0,
        }
    }

    #[inline(always)]
    pub const fn table_log(&self) -> u8 {
        self.table_log
    }
}

/// One encoding state. Symbols go in back to front so the decoder walks
/// them forward; interleaving several states is the caller's emit order.
pub struct Encoder<'t> {
    value: u32,
    table: &'t EncodingTable,
}

impl<'t> Encoder<'t> {
    pub fn new(table: &'t EncodingTable) -> Self {
        Self {
            value: 1 << table.table_log,
            table,
        }
    }

    /// Start from the cheapest state denoting `symbol`, spending no bits
    /// on it. Only correct when `symbol` is provably the one the decoder
    /// reads out of this state's final value, i.e. the stream's first
    /// decoded symbol for this channel.
    pub fn new_with_first(table: &'t EncodingTable, symbol: u8) -> Self {
        let tt = table.symbols[symbol as usize];
        let n_bits = (tt.delta_nb_bits + (1 << 15)) >> 16;

        let value = (n_bits << 16).wrapping_sub(tt.delta_nb_bits);
        let idx = ((value >> n_bits) as i32 + tt.delta_find_state) as usize;

        Self {
            value: table.state_table[idx] as u32,
            table,
        }
    }

    #[inline(always)]
    pub fn encode(&mut self, w: &mut BitWriter, symbol: u8) {
        let tt = self.table.symbols[symbol as usize];
        let n_bits = (self.value.wrapping_add(tt.delta_nb_bits) >> 16) as u8;

        w.add_bits(self.value as u64, n_bits);

        let idx = ((self.value >> n_bits) as i32 + tt.delta_find_state) as usize;
        self.value = self.table.state_table[idx] as u32;
    }

    /// Write out the final state (`table_log` bits); the decoder reads it
    /// first.
    #[inline(always)]
    pub fn flush(&self, w: &mut BitWriter) {
        w.add_bits(self.value as u64, self.table.table_log);
        w.flush();
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use zett_io::ReverseBitReader;

    use super::*;
    use crate::{Decoder, DecodingTable};

    /// Dual-state codec over a byte slice, the way weight streams are
    /// compressed: two states alternate, flushed second-state-first.
    fn encode_alternating(table: &EncodingTable, src: &[u8], dst: &mut Vec<u8>) {
        assert!(src.len() >= 2);

        let mut w = BitWriter::new(dst);
        let mut ip = src.len();

        let (mut c1, mut c2);
        if src.len() % 2 != 0 {
            c1 = Encoder::new_with_first(table, src[ip - 1]);
            c2 = Encoder::new_with_first(table, src[ip - 2]);
            ip -= 2;
            c1.encode(&mut w, src[ip - 1]);
            ip -= 1;
            w.flush();
        } else {
            c2 = Encoder::new_with_first(table, src[ip - 1]);
            c1 = Encoder::new_with_first(table, src[ip - 2]);
            ip -= 2;
        }

        while ip > 0 {
            c2.encode(&mut w, src[ip - 1]);
            c1.encode(&mut w, src[ip - 2]);
            ip -= 2;
            w.flush();
        }

        c2.flush(&mut w);
        c1.flush(&mut w);
        w.close();
    }

    fn decode_alternating(
        table: &DecodingTable,
        src: &[u8],
        max_len: usize,
    ) -> Result<Vec<u8>, Error> {
        let mut r = ReverseBitReader::new(src)?;
        let mut d1 = Decoder::new(table, &mut r)?;
        let mut d2 = Decoder::new(table, &mut r)?;

        let mut out = Vec::new();
        while out.len() < max_len {
            out.push(d1.peek());
            if d1.bits_required() as usize > r.bits_remaining() {
                out.push(d2.peek());
                break;
            }
            d1.update(&mut r)?;

            out.push(d2.peek());
            if d2.bits_required() as usize > r.bits_remaining() {
                out.push(d1.peek());
                break;
            }
            d2.update(&mut r)?;
        }

        Ok(out)
    }

    #[test]
    fn test_uniform_identity() -> Result<(), Error> {
        // Four equiprobable symbols on a 16-cell table: two bits each, and
        // no reload path since no symbol reaches half the table.
        let dist = NormalizedCounts::from_predefined(&[4, 4, 4, 4], 4);
        assert!(dist.fast_mode());

        let ct = EncodingTable::from_counts(&dist)?;
        let dt = DecodingTable::from_counts(&dist)?;

        let src: Vec<u8> = (0..4000u32).map(|i| (i % 4) as u8).collect();

        let mut compressed = Vec::new();
        encode_alternating(&ct, &src, &mut compressed);

        let decoded = decode_alternating(&dt, &compressed, src.len())?;
        assert_eq!(decoded, src);

        Ok(())
    }

    #[test]
    fn test_rle_channel_is_free() -> Result<(), Error> {
        let ct = EncodingTable::rle(7);
        let mut dst = Vec::new();
        let mut w = BitWriter::new(&mut dst);

        let mut state = Encoder::new_with_first(&ct, 7);
        for _ in 0..50 {
            state.encode(&mut w, 7);
        }
        state.flush(&mut w);
        let written = w.close();

        // Nothing but the sentinel byte.
        assert_eq!(written, 1);

        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn test_fuzz_round_trip(
            src in proptest::collection::vec(0u8..20, 8..600),
            table_log in 6u8..=9,
        ) {
            let mut counts = [0u32; 20];
            for &b in &src {
                counts[b as usize] += 1;
            }
            if counts.iter().filter(|&&c| c > 0).count() < 2 {
                return Ok(());
            }

            let dist = match NormalizedCounts::from_counts(&counts, table_log) {
                Ok(it) => it,
                Err(_) => return Ok(()),
            };

            let ct = EncodingTable::from_counts(&dist)?;
            let dt = DecodingTable::from_counts(&dist)?;

            let mut compressed = Vec::new();
            encode_alternating(&ct, &src, &mut compressed);

            let decoded = decode_alternating(&dt, &compressed, src.len())?;
            prop_assert_eq!(decoded, src);
        }
    }
}
