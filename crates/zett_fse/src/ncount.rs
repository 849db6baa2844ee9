use zett_foundation::highbit32;
use zett_io::{BitReader, BitWriter};

use crate::Error;

pub const MAX_SYMBOLS: usize = 256;
pub const MIN_TABLE_LOG: u8 = 5;
pub const MAX_TABLE_LOG: u8 = 15;

/// Accuracy logs a serialized table description may declare.
pub const ACCURACY_LOG_RANGE: std::ops::RangeInclusive<u8> =
    MIN_TABLE_LOG..=MAX_TABLE_LOG;

/// Safe upper bound for a serialized NCount, in bytes.
#[must_use]
pub const fn ncount_write_bound(max_symbol: u8) -> usize {
    (max_symbol as usize + 1) * 2 + 8
}

/// A probability distribution scaled to sum to `1 << table_log`.
///
/// Per symbol: `-1` marks a present-but-rare symbol (one cell, laid out at
/// the top of the table), `0` absence, `k >= 1` the number of table cells.
#[derive(Clone, PartialEq)]
pub struct NormalizedCounts {
    counts: [i16; MAX_SYMBOLS],
    max_symbol: u8,
    table_log: u8,
}

impl std::fmt::Debug for NormalizedCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedCounts")
            .field("table_log", &self.table_log)
            .field("counts", &self.counts())
            .finish()
    }
}

impl NormalizedCounts {
    #[inline(always)]
    pub const fn table_log(&self) -> u8 {
        self.table_log
    }

    #[inline(always)]
    pub const fn table_size(&self) -> usize {
        1 << self.table_log
    }

    #[inline(always)]
    pub const fn max_symbol(&self) -> u8 {
        self.max_symbol
    }

    /// Counts for symbols `0..=max_symbol`.
    #[inline(always)]
    pub fn counts(&self) -> &[i16] {
        &self.counts[..=self.max_symbol as usize]
    }

    pub fn has_low_prob(&self) -> bool {
        self.counts().iter().any(|&c| c == -1)
    }

    /// No symbol owns half the table or more; the decoder may then skip
    /// the zero-bit reload path.
    pub fn fast_mode(&self) -> bool {
        let half = (self.table_size() / 2) as i16;
        self.counts().iter().all(|&c| c < half)
    }

    pub fn from_predefined(counts: &'static [i16], table_log: u8) -> Self {
        assert!(!counts.is_empty() && counts.len() <= MAX_SYMBOLS);
        debug_assert_eq!(
            counts.iter().map(|&c| c.unsigned_abs() as usize).sum::<usize>(),
            1 << table_log,
        );

        let mut ret = Self {
            counts: [0; MAX_SYMBOLS],
            max_symbol: (counts.len() - 1) as u8,
            table_log,
        };
        ret.counts[..counts.len()].copy_from_slice(counts);
        ret
    }

    /// Decode a table description (RFC 8878 §4.1.1).
    ///
    /// `max_accuracy_log` and `max_symbol` bound what the surrounding
    /// stream permits; exceeding either is an error, not a clamp.
    pub fn read(
        src: &mut BitReader,
        max_accuracy_log: u8,
        max_symbol: u8,
    ) -> Result<Self, Error> {
        let table_log = 5 + src.read(4)? as u8;

        if table_log > MAX_TABLE_LOG {
            return Err(Error::InvalidAccuracyLog(table_log));
        }
        if table_log > max_accuracy_log {
            return Err(Error::AccuracyLogMismatch(max_accuracy_log, table_log));
        }

        let mut counts = [0i16; MAX_SYMBOLS];
        let mut symbol: usize = 0;
        let limit = max_symbol as usize;

        let mut remaining: i32 = 1 << table_log;
        while remaining > 0 {
            if symbol > limit {
                return Err(Error::MaxSymbolValueTooLarge(symbol as u16, max_symbol));
            }

            let n_bits = (remaining + 1).ilog2() as u8;

            let mut val = src.read(n_bits)? as i32;
            let threshold = (1 << (n_bits + 1)) - (remaining + 2);

            if val >= threshold {
                let extra = src.read(1)? as i32;
                val += extra * ((1 << n_bits) - threshold);
            }

            let prob = (val - 1) as i16;
            counts[symbol] = prob;
            symbol += 1;

            if prob != 0 {
                remaining -= prob.unsigned_abs() as i32;
            } else {
                // A zero count is followed by a run length of further
                // zeros, 2 bits at a time; 3 means "keep reading".
                loop {
                    let repeat = src.read(2)? as usize;

                    if symbol + repeat > limit + 1 {
                        return Err(Error::MaxSymbolValueTooLarge(
                            (symbol + repeat) as u16,
                            max_symbol,
                        ));
                    }

                    symbol += repeat;

                    if repeat != 3 {
                        break;
                    }
                }
            }
        }

        if remaining != 0 {
            return Err(Error::SumMismatch(remaining));
        }
        if symbol == 0 {
            return Err(Error::Corruption);
        }

        tracing::trace!(table_log, alphabet = symbol, "table description read");

        Ok(Self {
            counts,
            max_symbol: (symbol - 1) as u8,
            table_log,
        })
    }

    /// Serialize the table description; inverse of [`NormalizedCounts::read`].
    /// Returns the number of bytes appended.
    pub fn write(&self, dst: &mut Vec<u8>) -> Result<usize, Error> {
        if !ACCURACY_LOG_RANGE.contains(&self.table_log) {
            return Err(Error::InvalidAccuracyLog(self.table_log));
        }

        let mut w = BitWriter::new(dst);
        w.add_bits((self.table_log - MIN_TABLE_LOG) as u64, 4);

        let table_size = 1i32 << self.table_log;
        let mut remaining = table_size + 1;
        let mut threshold = table_size;
        let mut n_bits = self.table_log + 1;
        let mut previous_is_0 = false;

        let alphabet = self.max_symbol as usize + 1;
        let mut symbol = 0usize;

        while symbol < alphabet && remaining > 1 {
            if previous_is_0 {
                let mut start = symbol;
                while symbol < alphabet && self.counts[symbol] == 0 {
                    symbol += 1;
                }
                if symbol == alphabet {
                    break;
                }
                while symbol >= start + 24 {
                    start += 24;
                    w.add_bits(0xFFFF, 16);
                    w.flush();
                }
                while symbol >= start + 3 {
                    start += 3;
                    w.add_bits(3, 2);
                }
                w.add_bits((symbol - start) as u64, 2);
                w.flush();
            }

            let count = self.counts[symbol] as i32;
            symbol += 1;

            let max = (2 * threshold - 1) - remaining;
            remaining -= count.abs();

            let mut enc = count + 1;
            if enc >= threshold {
                enc += max;
            }

            let field_bits = if enc < max { n_bits - 1 } else { n_bits };
            w.add_bits(enc as u64, field_bits);

            previous_is_0 = enc == 1;
            if remaining < 1 {
                return Err(Error::SumMismatch(remaining));
            }
            while remaining < threshold {
                n_bits -= 1;
                threshold >>= 1;
            }
            w.flush();
        }

        if remaining != 1 {
            return Err(Error::SumMismatch(remaining - 1));
        }

        Ok(w.finish())
    }

    /// Scale raw occurrence counts down to `1 << table_log` total, keeping
    /// at least one cell for every observed symbol.
    pub fn from_counts(counts: &[u32], table_log: u8) -> Result<Self, Error> {
        assert!(!counts.is_empty() && counts.len() <= MAX_SYMBOLS);

        let total: u64 = counts.iter().map(|&c| c as u64).sum();
        if total == 0 {
            return Err(Error::Corruption);
        }

        let max_symbol = counts
            .iter()
            .rposition(|&c| c != 0)
            .map_or(0, |p| p as u8);

        if total == 1 {
            // A one-occurrence stream is degenerate by definition.
            return Err(Error::RleDistribution(max_symbol));
        }

        if table_log > MAX_TABLE_LOG {
            return Err(Error::InvalidAccuracyLog(table_log));
        }
        if table_log < min_table_log(total as usize, max_symbol) {
            return Err(Error::AccuracyLogTooSmall(table_log));
        }

        // Rounding thresholds for small probabilities, scaled by 2^20.
        const RTB: [u64; 8] =
            [0, 473195, 504333, 520860, 550000, 700000, 750000, 830000];

        let scale: u64 = 62 - table_log as u64;
        let step: u64 = (1u64 << 62) / total;
        let v_step: u64 = 1 << (scale - 20);

        let mut still_to_distribute: i32 = 1 << table_log;
        let low_threshold = (total >> table_log) as u32;

        let mut norm = [0i16; MAX_SYMBOLS];
        let mut largest = 0usize;
        let mut largest_p: i16 = 0;

        for (s, &count) in counts.iter().enumerate().take(max_symbol as usize + 1) {
            if count as u64 == total {
                return Err(Error::RleDistribution(s as u8));
            }
            if count == 0 {
                continue;
            }
            if count <= low_threshold {
                norm[s] = -1;
                still_to_distribute -= 1;
                continue;
            }

            let scaled = count as u64 * step;
            let mut proba = (scaled >> scale) as i16;
            if proba < 8 {
                let rest_to_beat = v_step * RTB[proba as usize];
                proba += (scaled - ((proba as u64) << scale) > rest_to_beat) as i16;
            }

            if proba > largest_p {
                largest_p = proba;
                largest = s;
            }
            norm[s] = proba;
            still_to_distribute -= proba as i32;
        }

        if -still_to_distribute >= (norm[largest] >> 1) as i32 {
            // The dominant symbol would absorb too much of the rounding
            // debt; fall back to the corner-case normalizer.
            normalize_m2(&mut norm, table_log, counts, total, max_symbol)?;
        } else {
            norm[largest] += still_to_distribute as i16;
        }

        Ok(Self {
            counts: norm,
            max_symbol,
            table_log,
        })
    }

    /// Assign each table cell its symbol using the spreading step
    /// `(size/2) + (size/8) + 3`; low-probability symbols descend from the
    /// table's top. The walk must land back on position 0.
    pub(crate) fn spread(&self) -> Result<Vec<u8>, Error> {
        let size = self.table_size();
        let step = (size >> 1) + (size >> 3) + 3;
        let mask = size - 1;

        let mut cells = vec![0u8; size];

        if !self.has_low_prob() {
            self.spread_fast(&mut cells, step, mask)?;
        } else {
            self.spread_low_prob(&mut cells, step, mask)?;
        }

        Ok(cells)
    }

    fn spread_fast(
        &self,
        cells: &mut [u8],
        step: usize,
        mask: usize,
    ) -> Result<(), Error> {
        let mut pos = 0;

        for (sym, &count) in self.counts().iter().enumerate() {
            if count <= 0 {
                continue;
            }

            let sym = sym as u8;
            let mut remaining = count as usize;
            while remaining >= 4 {
                cells[pos] = sym;
                cells[(pos + step) & mask] = sym;
                cells[(pos + step * 2) & mask] = sym;
                cells[(pos + step * 3) & mask] = sym;

                pos = (pos + step * 4) & mask;
                remaining -= 4;
            }

            while remaining > 0 {
                cells[pos] = sym;
                pos = (pos + step) & mask;
                remaining -= 1;
            }
        }

        if pos != 0 {
            return Err(Error::SpreadAlignmentError(pos));
        }

        Ok(())
    }

    #[cold]
    fn spread_low_prob(
        &self,
        cells: &mut [u8],
        step: usize,
        mask: usize,
    ) -> Result<(), Error> {
        let mut high_threshold = cells.len() - 1;

        for (sym, &count) in self.counts().iter().enumerate() {
            if count == -1 {
                cells[high_threshold] = sym as u8;
                high_threshold = high_threshold.wrapping_sub(1);
            }
        }

        let mut pos = 0;
        for (sym, &count) in self.counts().iter().enumerate() {
            if count <= 0 {
                continue;
            }

            for _ in 0..count {
                cells[pos] = sym as u8;

                pos = (pos + step) & mask;
                while pos > high_threshold {
                    // Cell belongs to a low-probability symbol; step over.
                    pos = (pos + step) & mask;
                }
            }
        }

        if pos != 0 {
            return Err(Error::SpreadAlignmentError(pos));
        }

        Ok(())
    }
}

/// Smallest accuracy log that can represent `src_size` occurrences over an
/// alphabet reaching `max_symbol`.
fn min_table_log(src_size: usize, max_symbol: u8) -> u8 {
    debug_assert!(src_size > 1);

    let min_bits_src = highbit32((src_size - 1) as u32) as u8 + 1;
    let min_bits_symbols = highbit32(max_symbol.max(1) as u32) as u8 + 2;
    min_bits_src.min(min_bits_symbols)
}

/// Table log giving the best size/precision trade-off for `src_size`
/// symbols, capped at `max_table_log`.
#[must_use]
pub fn optimal_table_log(max_table_log: u8, src_size: usize, max_symbol: u8) -> u8 {
    if src_size <= 1 {
        return MIN_TABLE_LOG;
    }

    let max_bits_src = (highbit32((src_size - 1) as u32) as u8).saturating_sub(2);
    let min_bits = min_table_log(src_size, max_symbol);

    let mut table_log = max_table_log;
    table_log = table_log.min(max_bits_src);
    table_log = table_log.max(min_bits);
    table_log.clamp(MIN_TABLE_LOG, MAX_TABLE_LOG)
}

/// Corner-case normalizer: hands every low-count symbol one cell first,
/// then distributes the rest proportionally among what remains.
#[cold]
fn normalize_m2(
    norm: &mut [i16; MAX_SYMBOLS],
    table_log: u8,
    counts: &[u32],
    mut total: u64,
    max_symbol: u8,
) -> Result<(), Error> {
    const NOT_YET_ASSIGNED: i16 = -2;

    let low_threshold = (total >> table_log) as u32;
    let mut low_one = ((total * 3) >> (table_log + 1)) as u32;
    let mut distributed = 0u32;

    for (s, &count) in counts.iter().enumerate().take(max_symbol as usize + 1) {
        if count == 0 {
            norm[s] = 0;
            continue;
        }
        if count <= low_threshold {
            norm[s] = -1;
            distributed += 1;
            total -= count as u64;
            continue;
        }
        if count <= low_one {
            norm[s] = 1;
            distributed += 1;
            total -= count as u64;
            continue;
        }
        norm[s] = NOT_YET_ASSIGNED;
    }

    let mut to_distribute = (1u32 << table_log) - distributed;
    if to_distribute == 0 {
        return Ok(());
    }

    if total / to_distribute as u64 > low_one as u64 {
        // One cell per symbol would still round to zero; widen the
        // one-cell bucket and retry.
        low_one = ((total * 3) / (to_distribute as u64 * 2)) as u32;
        for (s, &count) in counts.iter().enumerate().take(max_symbol as usize + 1) {
            if norm[s] == NOT_YET_ASSIGNED && count <= low_one {
                norm[s] = 1;
                distributed += 1;
                total -= count as u64;
            }
        }
        to_distribute = (1u32 << table_log) - distributed;
    }

    if distributed as usize == max_symbol as usize + 1 {
        // Every symbol is rare; give the whole remainder to the largest.
        let mut max_v = 0usize;
        let mut max_c = 0u32;
        for (s, &count) in counts.iter().enumerate().take(max_symbol as usize + 1) {
            if count > max_c {
                max_v = s;
                max_c = count;
            }
        }
        norm[max_v] += to_distribute as i16;
        return Ok(());
    }

    if total == 0 {
        // Everything was absorbed by the low buckets; hand out the rest
        // round-robin.
        let mut s = 0usize;
        while to_distribute > 0 {
            if norm[s] > 0 {
                to_distribute -= 1;
                norm[s] += 1;
            }
            s = (s + 1) % (max_symbol as usize + 1);
        }
        return Ok(());
    }

    let v_step_log = 62 - table_log as u64;
    let mid = (1u64 << (v_step_log - 1)) - 1;
    let r_step = (((1u64 << v_step_log) * to_distribute as u64) + mid) / total;
    let mut tmp_total = mid;

    for (s, &count) in counts.iter().enumerate().take(max_symbol as usize + 1) {
        if norm[s] == NOT_YET_ASSIGNED {
            let end = tmp_total + count as u64 * r_step;
            let s_start = (tmp_total >> v_step_log) as u32;
            let s_end = (end >> v_step_log) as u32;
            let weight = s_end - s_start;

            if weight < 1 {
                return Err(Error::NormalizationFailed);
            }
            norm[s] = weight as i16;
            tmp_total = end;
        }
    }

    Ok(())
}
