use zett_foundation::highbit32;
use zett_io::BitWriter;

use crate::{Error, MAX_BITS, MAX_SYMBOLS, WEIGHTS_ACCURACY_LOG};

#[derive(Debug, Clone, Copy, Default)]
struct Code {
    value: u16,
    n_bits: u8,
}

/// Canonical codes plus the weights that describe them on the wire.
#[derive(Debug)]
pub struct EncodingTable {
    codes: [Code; MAX_SYMBOLS],
    weights: [u8; MAX_SYMBOLS],
    max_symbol: u8,
    max_bits: u8,
}

/// Outcome of a successful literals compression.
#[derive(Debug, Clone, Copy)]
pub struct CompressedLiterals {
    /// Bytes appended to the destination, table description included.
    pub written: usize,
    pub four_streams: bool,
}

/// Huffman-compress `src`, appending the tree description and stream(s).
/// Returns `None` when the input cannot profit from entropy coding (too
/// short, single-symbol, or the result would not be smaller); the
/// destination is left untouched in that case.
pub fn compress(src: &[u8], dst: &mut Vec<u8>) -> Result<Option<CompressedLiterals>, Error> {
    if src.len() < 2 {
        return Ok(None);
    }

    let mut counts = [0u32; MAX_SYMBOLS];
    for &b in src {
        counts[b as usize] += 1;
    }
    if counts.iter().filter(|&&c| c > 0).count() < 2 {
        return Ok(None);
    }

    let table = EncodingTable::from_counts(&counts, src.len())?;

    let start = dst.len();
    table.write(dst)?;

    let four_streams = src.len() >= 256;
    if four_streams {
        // Three u16 sizes; the fourth stream runs to the end.
        let jump_table_at = dst.len();
        dst.extend_from_slice(&[0u8; 6]);

        let segment = src.len().div_ceil(4);
        let mut sizes = [0usize; 3];
        for (i, chunk) in src.chunks(segment).enumerate() {
            let written = compress_stream(chunk, &table, dst);
            if i < 3 {
                if written > u16::MAX as usize {
                    dst.truncate(start);
                    return Ok(None);
                }
                sizes[i] = written;
            }
        }

        for (i, &size) in sizes.iter().enumerate() {
            dst[jump_table_at + 2 * i..jump_table_at + 2 * i + 2]
                .copy_from_slice(&(size as u16).to_le_bytes());
        }
    } else {
        compress_stream(src, &table, dst);
    }

    let written = dst.len() - start;
    if written >= src.len() {
        dst.truncate(start);
        return Ok(None);
    }

    Ok(Some(CompressedLiterals {
        written,
        four_streams,
    }))
}

/// Encode one stream back to front so the decoder reads it forward, and
/// close it with the end marker.
fn compress_stream(src: &[u8], table: &EncodingTable, dst: &mut Vec<u8>) -> usize {
    let mut w = BitWriter::new(dst);

    for chunk in src.rchunks(4) {
        for &byte in chunk.iter().rev() {
            let code = table.codes[byte as usize];
            w.add_bits(code.value as u64, code.n_bits);
        }
        w.flush();
    }

    w.close()
}

impl EncodingTable {
    /// Build length-limited canonical codes from occurrence counts.
    /// At least two symbols must be present.
    pub fn from_counts(counts: &[u32], total: usize) -> Result<Self, Error> {
        assert!(counts.len() <= MAX_SYMBOLS);
        debug_assert!(total >= 2);

        let max_symbol = counts
            .iter()
            .rposition(|&c| c != 0)
            .ok_or(Error::ZeroWeightSum)? as u8;

        let mut leaves: Vec<(u64, u8)> = counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c > 0)
            .map(|(s, &c)| (c as u64, s as u8))
            .collect();
        if leaves.len() < 2 {
            return Err(Error::ZeroWeightSum);
        }
        leaves.sort_unstable();

        let limit = optimal_max_bits(total, max_symbol);
        let lengths = package_merge(&leaves, limit);

        // The deepest code actually used defines the table; weights are
        // depths biased off it.
        let max_bits = lengths.iter().copied().max().expect("lengths is non-empty");
        debug_assert!(max_bits <= limit);

        let mut weights = [0u8; MAX_SYMBOLS];
        let mut bit_rank = [0u32; (MAX_BITS + 2) as usize];
        for (&(_, sym), &len) in leaves.iter().zip(&lengths) {
            let w = max_bits + 1 - len;
            weights[sym as usize] = w;
            bit_rank[w as usize] += 1;
        }

        // Same slot assignment the decode table performs, projected down
        // to code values.
        let mut next_code = [0u32; (MAX_BITS + 2) as usize];
        let mut curr = 0u32;
        for w in 1..=max_bits as usize {
            next_code[w] = curr;
            curr += bit_rank[w] << (w - 1);
        }
        debug_assert_eq!(curr, 1 << max_bits);

        let mut codes = [Code::default(); MAX_SYMBOLS];
        for sym in 0..=max_symbol as usize {
            let w = weights[sym];
            if w == 0 {
                continue;
            }

            let slot = next_code[w as usize];
            codes[sym] = Code {
                value: (slot >> (w - 1)) as u16,
                n_bits: max_bits + 1 - w,
            };
            next_code[w as usize] += 1 << (w - 1);
        }

        Ok(Self {
            codes,
            weights,
            max_symbol,
            max_bits,
        })
    }

    #[inline(always)]
    pub const fn max_bits(&self) -> u8 {
        self.max_bits
    }

    /// Serialize the tree description: FSE-compressed weights when that
    /// pays for itself, raw nibbles otherwise. The last present symbol's
    /// weight stays implicit.
    pub fn write(&self, dst: &mut Vec<u8>) -> Result<usize, Error> {
        let n_weights = self.max_symbol as usize;
        let start = dst.len();

        let mut fse_buf = Vec::new();
        let compressed = compress_weights(&self.weights[..n_weights], &mut fse_buf);

        if compressed && fse_buf.len() > 1 && fse_buf.len() < n_weights / 2 {
            debug_assert!(fse_buf.len() < 128);
            dst.push(fse_buf.len() as u8);
            dst.extend_from_slice(&fse_buf);
            return Ok(dst.len() - start);
        }

        if n_weights > 128 {
            return Err(Error::TooManyWeights(n_weights));
        }

        dst.push(127 + n_weights as u8);
        for pair in self.weights[..n_weights].chunks(2) {
            let hi = pair[0] << 4;
            let lo = if pair.len() == 2 { pair[1] } else { 0 };
            dst.push(hi | lo);
        }

        Ok(dst.len() - start)
    }
}

/// Depth cap for this input, mirroring the optimal-table-log rule with a
/// one-bit discount.
fn optimal_max_bits(total: usize, max_symbol: u8) -> u8 {
    let max_bits_src = highbit32((total - 1) as u32).saturating_sub(1) as u8;
    let min_bits_src = highbit32((total - 1) as u32) as u8 + 1;
    let min_bits_symbols = highbit32(max_symbol.max(1) as u32) as u8 + 2;
    let min_bits = min_bits_src.min(min_bits_symbols);

    MAX_BITS.min(max_bits_src).max(min_bits).clamp(5, MAX_BITS)
}

/// Package-merge over pre-sorted leaves: optimal code lengths capped at
/// `max_len`. Returns one length per leaf, in leaf order.
fn package_merge(leaves: &[(u64, u8)], max_len: u8) -> Vec<u8> {
    #[derive(Clone)]
    struct Package {
        weight: u64,
        // Leaf indices, with multiplicity across merge levels.
        leaves: Vec<u16>,
    }

    let singletons: Vec<Package> = leaves
        .iter()
        .enumerate()
        .map(|(i, &(weight, _))| Package {
            weight,
            leaves: vec![i as u16],
        })
        .collect();

    let mut list = singletons.clone();
    for _ in 1..max_len {
        let mut merged: Vec<Package> = Vec::with_capacity(list.len() / 2);
        for pair in list.chunks_exact(2) {
            let mut leaves = pair[0].leaves.clone();
            leaves.extend_from_slice(&pair[1].leaves);
            merged.push(Package {
                weight: pair[0].weight + pair[1].weight,
                leaves,
            });
        }

        // Stable two-way merge keeps leaves ahead of equal-weight
        // packages, which keeps the solution canonical-friendly.
        let mut next = Vec::with_capacity(singletons.len() + merged.len());
        let (mut a, mut b) = (0, 0);
        while a < singletons.len() && b < merged.len() {
            if singletons[a].weight <= merged[b].weight {
                next.push(singletons[a].clone());
                a += 1;
            } else {
                next.push(merged[b].clone());
                b += 1;
            }
        }
        next.extend_from_slice(&singletons[a..]);
        next.extend_from_slice(&merged[b..]);

        list = next;
    }

    let mut lengths = vec![0u8; leaves.len()];
    for package in list.iter().take(2 * leaves.len() - 2) {
        for &leaf in &package.leaves {
            lengths[leaf as usize] += 1;
        }
    }

    debug_assert_eq!(
        lengths
            .iter()
            .map(|&l| 1u64 << (max_len - l))
            .sum::<u64>(),
        1u64 << max_len,
        "lengths must satisfy Kraft equality"
    );

    lengths
}

/// FSE-compress a weight stream with two alternating states. Returns
/// false when the stream is too short, single-symbol, or grows.
fn compress_weights(weights: &[u8], dst: &mut Vec<u8>) -> bool {
    if weights.len() < 2 {
        return false;
    }

    let mut counts = [0u32; (MAX_BITS + 2) as usize];
    for &w in weights {
        counts[w as usize] += 1;
    }

    let max_weight = weights.iter().copied().max().unwrap_or(0);
    let table_log = zett_fse::optimal_table_log(
        WEIGHTS_ACCURACY_LOG,
        weights.len(),
        max_weight,
    );

    let Ok(dist) = zett_fse::NormalizedCounts::from_counts(
        &counts[..=max_weight as usize],
        table_log,
    ) else {
        return false;
    };
    let Ok(ct) = zett_fse::EncodingTable::from_counts(&dist) else {
        return false;
    };

    if dist.write(dst).is_err() {
        dst.clear();
        return false;
    }

    let mut w = BitWriter::new(dst);
    let mut ip = weights.len();

    let (mut c1, mut c2);
    if weights.len() % 2 != 0 {
        c1 = zett_fse::Encoder::new_with_first(&ct, weights[ip - 1]);
        c2 = zett_fse::Encoder::new_with_first(&ct, weights[ip - 2]);
        ip -= 2;
        c1.encode(&mut w, weights[ip - 1]);
        ip -= 1;
        w.flush();
    } else {
        c2 = zett_fse::Encoder::new_with_first(&ct, weights[ip - 1]);
        c1 = zett_fse::Encoder::new_with_first(&ct, weights[ip - 2]);
        ip -= 2;
    }

    while ip > 0 {
        c2.encode(&mut w, weights[ip - 1]);
        c1.encode(&mut w, weights[ip - 2]);
        ip -= 2;
        w.flush();
    }

    c2.flush(&mut w);
    c1.flush(&mut w);
    w.close();

    true
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use zett_io::ReverseBitReader;

    use super::*;
    use crate::{Decoder, DecodingTable};

    fn decompress(
        src: &[u8],
        regenerated: usize,
        four_streams: bool,
    ) -> Result<Vec<u8>, Error> {
        let (table, consumed) = DecodingTable::read(src)?;
        let src = &src[consumed..];

        let mut out = vec![0u8; regenerated];

        if !four_streams {
            let mut r = ReverseBitReader::new(src)?;
            let mut dec = Decoder::new(&table, &mut r);
            for slot in &mut out {
                *slot = dec.decode(&mut r);
            }
            if r.bits_remaining() > 0 {
                return Err(Error::Corruption);
            }
            return Ok(out);
        }

        let s0 = u16::from_le_bytes([src[0], src[1]]) as usize;
        let s1 = u16::from_le_bytes([src[2], src[3]]) as usize;
        let s2 = u16::from_le_bytes([src[4], src[5]]) as usize;
        let payload = &src[6..];

        let segment = regenerated.div_ceil(4);
        let bounds = [0, s0, s0 + s1, s0 + s1 + s2, payload.len()];

        for (i, chunk) in out.chunks_mut(segment).enumerate() {
            let mut r = ReverseBitReader::new(&payload[bounds[i]..bounds[i + 1]])?;
            let mut dec = Decoder::new(&table, &mut r);
            for slot in chunk.iter_mut() {
                *slot = dec.decode(&mut r);
            }
            if r.bits_remaining() > 0 {
                return Err(Error::Corruption);
            }
        }

        Ok(out)
    }

    #[test]
    fn test_round_trip_single_stream() -> Result<(), Error> {
        let src: Vec<u8> = b"the quick brown fox jumps over the lazy dog, twice over"
            .repeat(2)
            .into_iter()
            .take(200)
            .collect();

        let mut dst = Vec::new();
        let lits = compress(&src, &mut dst)?.expect("text compresses");

        assert!(!lits.four_streams);
        assert!(lits.written < src.len());

        let back = decompress(&dst, src.len(), false)?;
        assert_eq!(back, src);

        Ok(())
    }

    #[test]
    fn test_round_trip_four_streams() -> Result<(), Error> {
        let src: Vec<u8> = (0..4096u32)
            .map(|i| b"abbcccddddeeeee"[(i % 15) as usize])
            .collect();

        let mut dst = Vec::new();
        let lits = compress(&src, &mut dst)?.expect("runs compress");

        assert!(lits.four_streams);

        let back = decompress(&dst, src.len(), true)?;
        assert_eq!(back, src);

        Ok(())
    }

    #[test]
    fn test_incompressible_input_is_refused() -> Result<(), Error> {
        // A full byte ramp has no slack at 8 bits a symbol.
        let src: Vec<u8> = (0..=255u8).collect::<Vec<_>>().repeat(4);

        let mut dst = Vec::new();
        assert!(compress(&src, &mut dst)?.is_none());
        assert!(dst.is_empty(), "refusal must not leave partial output");

        Ok(())
    }

    #[test]
    fn test_single_symbol_is_refused() -> Result<(), Error> {
        let src = [0x41u8; 300];
        let mut dst = Vec::new();
        assert!(compress(&src, &mut dst)?.is_none());
        Ok(())
    }

    #[test]
    fn test_package_merge_respects_limit() {
        // Counts engineered to want a depth beyond the cap.
        let leaves: Vec<(u64, u8)> = (0..20u8)
            .map(|i| (1u64 << i.min(14), i))
            .collect();
        let mut sorted = leaves.clone();
        sorted.sort_unstable();

        let lengths = package_merge(&sorted, MAX_BITS);
        assert!(lengths.iter().all(|&l| (1..=MAX_BITS).contains(&l)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn test_fuzz_round_trip(
            src in proptest::collection::vec(any::<u8>(), 2..2000),
            skew in 1u8..32,
        ) {
            // Skew the bytes so most inputs are actually compressible.
            let src: Vec<u8> = src.iter().map(|&b| b % skew.max(2)).collect();

            let mut dst = Vec::new();
            if let Some(lits) = compress(&src, &mut dst)? {
                let back = decompress(&dst, src.len(), lits.four_streams)?;
                prop_assert_eq!(back, src);
            }
        }
    }
}
