//! Shared Zstandard format vocabulary: magic numbers, size limits, the
//! literal-length / match-length / offset code spaces and their predefined
//! FSE distributions (RFC 8878 §3.1.1.3.2.2).
//!
//! Both halves of the codec speak in these terms; neither owns them.

use zett_foundation::{const_assert, highbit32};

mod seq_codes;

pub use seq_codes::{
    LL_BASELINES, LL_EXTRA_BITS, MAX_LL_CODE, MAX_ML_CODE, MAX_OF_CODE, ML_BASELINES,
    ML_EXTRA_BITS, ll_code, ml_code, of_code,
};

pub const MAGIC_NUM: u32 = 0xFD2F_B528;

/// Skippable frames use 16 magic values; the low nibble is free.
pub const SKIPPABLE_MAGIC_MIN: u32 = 0x184D_2A50;
pub const SKIPPABLE_MAGIC_MASK: u32 = 0xFFFF_FFF0;

pub const MIN_WINDOW_SIZE: u64 = 0x400;
pub const MAX_WINDOW_SIZE: u64 = 128 * 1024 * 1024;
pub const WINDOW_SIZE_RANGE: std::ops::RangeInclusive<u64> =
    MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE;

pub const MAX_BLOCK_SIZE: u32 = 128 * 1024;

/// Matches shorter than this are never emitted.
pub const MIN_MATCH: u32 = 3;

/// One literal run followed by one back-reference.
///
/// `offset` is the decoded offset value: `1..=3` select a repeat offset
/// (possibly shifted when `lit_len == 0`), larger values mean
/// `distance + 3`.
#[derive(Clone, Copy, Default)]
pub struct Sequence {
    pub lit_len: u32,
    pub offset: u32,
    pub match_len: u32,
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("ll", &self.lit_len)
            .field("ml", &self.match_len)
            .field("of", &self.offset)
            .finish()
    }
}

/// Offset history at the start of every frame.
pub const REP_INIT: [u32; 3] = [1, 4, 8];

pub struct DefaultDistribution {
    max_accuracy_log: u8,
    predefined_accuracy_log: u8,
    counts: &'static [i16],
}

impl DefaultDistribution {
    /// Largest accuracy log an `FSE_Compressed` table description may use
    /// for this code space.
    pub const fn max_accuracy_log(&self) -> u8 {
        self.max_accuracy_log
    }

    /// Accuracy log of the predefined distribution.
    pub const fn predefined_accuracy_log(&self) -> u8 {
        self.predefined_accuracy_log
    }

    pub const fn counts(&self) -> &'static [i16] {
        self.counts
    }

    pub const fn max_symbol(&self) -> u8 {
        (self.counts.len() - 1) as u8
    }
}

pub const LL_DIST: DefaultDistribution = DefaultDistribution {
    max_accuracy_log: 9,
    predefined_accuracy_log: 6,
    counts: &[
        4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 2,
        1, 1, 1, 1, 1, -1, -1, -1, -1,
    ],
};
const_assert!(LL_DIST.counts().len() == 36);

pub const ML_DIST: DefaultDistribution = DefaultDistribution {
    max_accuracy_log: 9,
    predefined_accuracy_log: 6,
    counts: &[
        1, 4, 3, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1,
        -1,
    ],
};
const_assert!(ML_DIST.counts().len() == 53);

pub const OF_DIST: DefaultDistribution = DefaultDistribution {
    max_accuracy_log: 8,
    predefined_accuracy_log: 5,
    counts: &[
        1, 1, 1, 1, 1, 1, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1,
        -1, -1, -1,
    ],
};
const_assert!(OF_DIST.counts().len() == 29);

/// Exact window size a `{exponent, mantissa}` descriptor denotes.
#[must_use]
pub const fn window_size_from_descriptor(exponent: u8, mantissa: u8) -> u64 {
    let window_log = 10 + exponent as u64;
    let window_base = 1u64 << window_log;
    let window_add = (window_base >> 3) * mantissa as u64;
    window_base + window_add
}

/// Smallest `{exponent, mantissa}` descriptor whose denoted size covers
/// `window_size`. Inverse of [`window_size_from_descriptor`], rounding up.
#[must_use]
pub fn window_descriptor_for(window_size: u64) -> (u8, u8) {
    let window_size = window_size.clamp(MIN_WINDOW_SIZE, MAX_WINDOW_SIZE);

    let mut exponent = highbit32(window_size.min(u32::MAX as u64) as u32) as u64;
    if (1u64 << exponent) < window_size {
        exponent += 1;
    }
    let exponent = (exponent - 10) as u8;

    let base = 1u64 << (exponent as u64 + 10);
    if base >= window_size {
        return (exponent, 0);
    }

    let eighth = base >> 3;
    let mantissa = window_size.saturating_sub(base).div_ceil(eighth) as u8;
    debug_assert!(mantissa < 8);
    (exponent, mantissa)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_descriptor_round_trip() {
        for exponent in 0..=17 {
            for mantissa in 0..8 {
                let size = window_size_from_descriptor(exponent, mantissa);
                if !WINDOW_SIZE_RANGE.contains(&size) {
                    continue;
                }
                let (e, m) = window_descriptor_for(size);
                assert_eq!(
                    window_size_from_descriptor(e, m),
                    size,
                    "descriptor for {size} must denote it exactly"
                );
            }
        }
    }

    #[test]
    fn test_window_descriptor_rounds_up() {
        let (e, m) = window_descriptor_for(MIN_WINDOW_SIZE + 1);
        assert!(window_size_from_descriptor(e, m) >= MIN_WINDOW_SIZE + 1);

        let (e, m) = window_descriptor_for(100_000);
        assert!(window_size_from_descriptor(e, m) >= 100_000);
    }
}
