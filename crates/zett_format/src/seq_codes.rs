//! The three sequence code spaces.
//!
//! Lengths and offsets are split into a code (FSE-coded) plus extra raw
//! bits. Baselines are aligned to their extra-bit count, so the encoder
//! can emit the raw value masked to the code's bit width and the decoder
//! adds the baseline back.

use zett_foundation::{const_assert, highbit32};

pub const MAX_LL_CODE: u8 = 35;
pub const MAX_ML_CODE: u8 = 52;

/// Codes above this cannot appear with a 128 MiB window; the format itself
/// stops at 31.
pub const MAX_OF_CODE: u8 = 31;

pub const LL_BASELINES: [u32; 36] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 18, 20, 22, 24, 28, 32,
    40, 48, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536,
];

pub const LL_EXTRA_BITS: [u8; 36] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 3, 3, 4, 6, 7, 8,
    9, 10, 11, 12, 13, 14, 15, 16,
];

pub const ML_BASELINES: [u32; 53] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
    26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 37, 39, 41, 43, 47, 51, 59, 67, 83, 99, 131,
    259, 515, 1027, 2051, 4099, 8195, 16387, 32771, 65539,
];

pub const ML_EXTRA_BITS: [u8; 53] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 3, 3, 4, 4, 5, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16,
];

const LL_CODES: [u8; 64] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 16, 17, 17, 18, 18, 19,
    19, 20, 20, 20, 20, 21, 21, 21, 21, 22, 22, 22, 22, 22, 22, 22, 22, 23, 23, 23, 23,
    23, 23, 23, 23, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24,
];

const ML_CODES: [u8; 128] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22,
    23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 32, 33, 33, 34, 34, 35, 35, 36, 36, 36, 36,
    37, 37, 37, 37, 38, 38, 38, 38, 38, 38, 38, 38, 39, 39, 39, 39, 39, 39, 39, 39, 40,
    40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 41, 41, 41, 41, 41, 41,
    41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42,
    42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42,
];

const_assert!(LL_CODES.len() == 64);
const_assert!(ML_CODES.len() == 128);

const LL_DELTA_CODE: u32 = 19;
const ML_DELTA_CODE: u32 = 36;

/// Code for a literal-run length.
#[inline(always)]
#[must_use]
pub fn ll_code(lit_len: u32) -> u8 {
    if lit_len > 63 {
        (highbit32(lit_len) + LL_DELTA_CODE) as u8
    } else {
        LL_CODES[lit_len as usize]
    }
}

/// Code for a match length, taken as `match_len - MIN_MATCH`.
#[inline(always)]
#[must_use]
pub fn ml_code(ml_base: u32) -> u8 {
    if ml_base > 127 {
        (highbit32(ml_base) + ML_DELTA_CODE) as u8
    } else {
        ML_CODES[ml_base as usize]
    }
}

/// Code for a decoded offset value; the code doubles as the extra-bit
/// count, with `1 << code` as the implicit baseline.
#[inline(always)]
#[must_use]
pub fn of_code(offset: u32) -> u8 {
    highbit32(offset) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ll_code_matches_baselines() {
        for code in 0..=MAX_LL_CODE {
            let base = LL_BASELINES[code as usize];
            let bits = LL_EXTRA_BITS[code as usize];
            let top = base + (1u32 << bits) - 1;

            for ll in [base, top] {
                assert_eq!(ll_code(ll), code, "lit_len {ll}");
                // Baselines are bit-aligned: masking reconstructs the delta.
                assert_eq!(ll & ((1 << bits) - 1), ll - base, "lit_len {ll}");
            }
        }
    }

    #[test]
    fn test_ml_code_matches_baselines() {
        for code in 0..=MAX_ML_CODE {
            let base = ML_BASELINES[code as usize];
            let bits = ML_EXTRA_BITS[code as usize];
            let top = base + (1u32 << bits) - 1;

            for ml in [base, top] {
                let ml_base = ml - crate::MIN_MATCH;
                assert_eq!(ml_code(ml_base), code, "match_len {ml}");
                assert_eq!(ml_base & ((1 << bits) - 1), ml - base, "match_len {ml}");
            }
        }
    }

    #[test]
    fn test_of_code_round_trip() {
        for offset in [1u32, 2, 3, 4, 5, 8, 100, 1 << 10, (1 << 27) + 5] {
            let code = of_code(offset);
            let extra = offset & ((1 << code) - 1);
            assert_eq!((1u32 << code) + extra, offset);
        }
    }
}
