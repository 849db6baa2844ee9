use zett_format::{
    DefaultDistribution, LL_DIST, LL_EXTRA_BITS, ML_DIST, ML_EXTRA_BITS, OF_DIST,
    ll_code, ml_code, of_code,
};
use zett_io::BitWriter;

use crate::{Error, seq_store::SequenceStore};

/// Two-bit per-stream table mode, packed into the section's mode byte.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SymbolMode {
    Predefined = 0,
    Rle = 1,
    Compressed = 2,
    Repeat = 3,
}

/// Sequence counts below this always take the predefined tables.
const MIN_SEQ_FOR_DYNAMIC_FSE: usize = 64;
/// Above this, repeating the previous table stops paying off.
const MAX_SEQ_FOR_STATIC_FSE: usize = 1000;

/// What the decoder's table for one stream currently decodes.
enum Coverage {
    Rle(u8),
    Counts(Vec<i16>),
}

struct StreamTable {
    ctable: zett_fse::EncodingTable,
    coverage: Coverage,
}

impl StreamTable {
    fn covers(&self, counts: &[u32]) -> bool {
        match &self.coverage {
            Coverage::Rle(sym) => counts
                .iter()
                .enumerate()
                .all(|(code, &c)| c == 0 || code == *sym as usize),
            Coverage::Counts(dist) => counts
                .iter()
                .enumerate()
                .all(|(code, &c)| c == 0 || dist.get(code).is_some_and(|&d| d != 0)),
        }
    }
}

/// Per-frame entropy state: the tables the decoder currently holds, one
/// per stream, enabling `Repeat` mode across blocks.
#[derive(Default)]
pub(crate) struct EntropyTables {
    ll: Option<StreamTable>,
    of: Option<StreamTable>,
    ml: Option<StreamTable>,
}

impl EntropyTables {
    pub fn reset(&mut self) {
        self.ll = None;
        self.of = None;
        self.ml = None;
    }
}

/// Decide a stream's mode, build its encoding table, and collect the
/// table description bytes to embed in the section header.
fn plan_stream(
    codes: &[u8],
    dist: &DefaultDistribution,
    prev: &mut Option<StreamTable>,
) -> Result<(SymbolMode, Vec<u8>), Error> {
    let n = codes.len();
    debug_assert!(n > 0);

    let max_code = *codes.iter().max().expect("at least one sequence") as usize;
    let mut counts = vec![0u32; max_code + 1];
    for &c in codes {
        counts[c as usize] += 1;
    }
    let most_frequent = *counts.iter().max().expect("non-empty") as usize;

    if most_frequent == n && n > 2 {
        let symbol = codes[0];
        *prev = Some(StreamTable {
            ctable: zett_fse::EncodingTable::rle(symbol),
            coverage: Coverage::Rle(symbol),
        });
        return Ok((SymbolMode::Rle, vec![symbol]));
    }

    if n < MAX_SEQ_FOR_STATIC_FSE
        && prev.as_ref().is_some_and(|table| table.covers(&counts))
    {
        return Ok((SymbolMode::Repeat, Vec::new()));
    }

    if n < MIN_SEQ_FOR_DYNAMIC_FSE
        || most_frequent < n >> (dist.predefined_accuracy_log() - 1)
    {
        debug_assert!(max_code <= dist.max_symbol() as usize);
        let norm = zett_fse::NormalizedCounts::from_predefined(
            dist.counts(),
            dist.predefined_accuracy_log(),
        );
        *prev = Some(StreamTable {
            ctable: zett_fse::EncodingTable::from_counts(&norm)?,
            coverage: Coverage::Counts(dist.counts().to_vec()),
        });
        return Ok((SymbolMode::Predefined, Vec::new()));
    }

    let table_log =
        zett_fse::optimal_table_log(dist.max_accuracy_log(), n, max_code as u8);
    let norm = zett_fse::NormalizedCounts::from_counts(&counts, table_log)?;

    let mut payload = Vec::new();
    norm.write(&mut payload)?;

    *prev = Some(StreamTable {
        ctable: zett_fse::EncodingTable::from_counts(&norm)?,
        coverage: Coverage::Counts(norm.counts().to_vec()),
    });
    Ok((SymbolMode::Compressed, payload))
}

/// Serialize the sequences section: count, mode byte, table
/// descriptions, then the interleaved FSE bitstream written back to
/// front so the decoder walks it forward.
pub(crate) fn write_sequences_section(
    store: &SequenceStore,
    entropy: &mut EntropyTables,
    dst: &mut Vec<u8>,
) -> Result<(), Error> {
    let n = store.seqs.len();

    if n < 128 {
        dst.push(n as u8);
    } else if n < 0x7F00 {
        dst.push(((n >> 8) + 0x80) as u8);
        dst.push(n as u8);
    } else {
        dst.push(0xFF);
        dst.extend_from_slice(&((n - 0x7F00) as u16).to_le_bytes());
    }

    if n == 0 {
        return Ok(());
    }

    let ll_codes: Vec<u8> = store.seqs.iter().map(|s| ll_code(s.lit_len)).collect();
    let of_codes: Vec<u8> = store.seqs.iter().map(|s| of_code(s.offset)).collect();
    let ml_codes: Vec<u8> = store
        .seqs
        .iter()
        .map(|s| ml_code(s.match_len - zett_format::MIN_MATCH))
        .collect();

    let (ll_mode, ll_payload) = plan_stream(&ll_codes, &LL_DIST, &mut entropy.ll)?;
    let (of_mode, of_payload) = plan_stream(&of_codes, &OF_DIST, &mut entropy.of)?;
    let (ml_mode, ml_payload) = plan_stream(&ml_codes, &ML_DIST, &mut entropy.ml)?;

    dst.push(
        ((ll_mode as u8) << 6) | ((of_mode as u8) << 4) | ((ml_mode as u8) << 2),
    );
    dst.extend_from_slice(&ll_payload);
    dst.extend_from_slice(&of_payload);
    dst.extend_from_slice(&ml_payload);

    let ll_table = &entropy.ll.as_ref().expect("planned above").ctable;
    let of_table = &entropy.of.as_ref().expect("planned above").ctable;
    let ml_table = &entropy.ml.as_ref().expect("planned above").ctable;

    let mut w = BitWriter::new(dst);

    // The final sequence's codes are baked into the initial states; its
    // extra bits open the stream.
    let last = store.seqs[n - 1];
    let mut ml_state = zett_fse::Encoder::new_with_first(ml_table, ml_codes[n - 1]);
    let mut of_state = zett_fse::Encoder::new_with_first(of_table, of_codes[n - 1]);
    let mut ll_state = zett_fse::Encoder::new_with_first(ll_table, ll_codes[n - 1]);

    w.add_bits(
        last.lit_len as u64,
        LL_EXTRA_BITS[ll_codes[n - 1] as usize],
    );
    w.add_bits(
        (last.match_len - zett_format::MIN_MATCH) as u64,
        ML_EXTRA_BITS[ml_codes[n - 1] as usize],
    );
    w.add_bits(last.offset as u64, of_codes[n - 1]);
    w.flush();

    for i in (0..n - 1).rev() {
        let seq = store.seqs[i];
        let (llc, ofc, mlc) = (ll_codes[i], of_codes[i], ml_codes[i]);

        of_state.encode(&mut w, ofc);
        ml_state.encode(&mut w, mlc);
        ll_state.encode(&mut w, llc);
        w.flush();

        w.add_bits(seq.lit_len as u64, LL_EXTRA_BITS[llc as usize]);
        w.add_bits(
            (seq.match_len - zett_format::MIN_MATCH) as u64,
            ML_EXTRA_BITS[mlc as usize],
        );
        w.flush();
        w.add_bits(seq.offset as u64, ofc);
        w.flush();
    }

    ml_state.flush(&mut w);
    of_state.flush(&mut w);
    ll_state.flush(&mut w);
    w.close();

    Ok(())
}

#[cfg(test)]
mod tests {
    use zett_format::Sequence;

    use super::*;

    fn store_of(seqs: &[(u32, u32, u32)]) -> SequenceStore {
        let mut store = SequenceStore::default();
        store.seqs = seqs
            .iter()
            .map(|&(lit_len, offset, match_len)| Sequence {
                lit_len,
                offset,
                match_len,
            })
            .collect();
        store
    }

    #[test]
    fn test_zero_sequences_is_one_byte() -> Result<(), Error> {
        let store = SequenceStore::default();
        let mut entropy = EntropyTables::default();

        let mut dst = Vec::new();
        write_sequences_section(&store, &mut entropy, &mut dst)?;
        assert_eq!(dst, [0x00]);
        Ok(())
    }

    #[test]
    fn test_small_counts_use_predefined_tables() -> Result<(), Error> {
        let store = store_of(&[(4, 8, 10), (0, 1, 5), (3, 20, 4)]);
        let mut entropy = EntropyTables::default();

        let mut dst = Vec::new();
        write_sequences_section(&store, &mut entropy, &mut dst)?;

        assert_eq!(dst[0], 3, "sequence count");
        assert_eq!(dst[1], 0, "all three streams predefined");
        assert!(dst.len() > 2, "bitstream follows");
        Ok(())
    }

    #[test]
    fn test_degenerate_streams_use_rle_mode() -> Result<(), Error> {
        // Many sequences, all with identical codes on every stream.
        let store = store_of(&[(1, 9, 5); 20]);
        let mut entropy = EntropyTables::default();

        let mut dst = Vec::new();
        write_sequences_section(&store, &mut entropy, &mut dst)?;

        assert_eq!(dst[0], 20);
        let mode = dst[1];
        assert_eq!(mode >> 6, SymbolMode::Rle as u8, "ll mode");
        assert_eq!((mode >> 4) & 3, SymbolMode::Rle as u8, "of mode");
        assert_eq!((mode >> 2) & 3, SymbolMode::Rle as u8, "ml mode");

        // Three RLE symbol bytes follow the mode byte.
        assert_eq!(dst[2], ll_code(1));
        assert_eq!(dst[3], of_code(9));
        assert_eq!(dst[4], ml_code(5 - 3));
        Ok(())
    }

    #[test]
    fn test_repeat_mode_after_identical_block() -> Result<(), Error> {
        // Enough sequences that the first block emits fresh FSE tables.
        let seqs: Vec<(u32, u32, u32)> =
            (0..200).map(|i| (i % 3, 4 + i % 5, 3 + i % 11)).collect();
        let mut entropy = EntropyTables::default();

        let mut first = Vec::new();
        write_sequences_section(&store_of(&seqs), &mut entropy, &mut first)?;

        let mut second = Vec::new();
        write_sequences_section(&store_of(&seqs), &mut entropy, &mut second)?;

        let mode = second[1];
        assert_eq!(mode >> 6, SymbolMode::Repeat as u8);
        assert_eq!((mode >> 4) & 3, SymbolMode::Repeat as u8);
        assert_eq!((mode >> 2) & 3, SymbolMode::Repeat as u8);
        assert!(
            second.len() < first.len(),
            "repeating tables must not re-emit them"
        );
        Ok(())
    }
}
