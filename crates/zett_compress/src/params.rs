use zett_foundation::highbit32;

use crate::Error;

pub const MIN_LEVEL: i32 = 1;
pub const MAX_LEVEL: i32 = 22;
pub const DEFAULT_LEVEL: i32 = 3;

pub const MIN_WINDOW_LOG: u8 = 10;
pub const MAX_WINDOW_LOG: u8 = 27;

/// Tuning knobs for one compression job. Every level funnels into the
/// binary-tree optimal parser; the level mostly scales how much history
/// is indexed and how hard the search works.
#[derive(Debug, Clone, Copy)]
pub struct CompressionParams {
    pub window_log: u8,
    pub chain_log: u8,
    pub hash_log: u8,
    pub search_log: u8,
    /// Hash key width; 3 enables the short-match table.
    pub search_length: u8,
    /// Match length considered good enough to stop optimizing.
    pub target_length: u32,
    /// 0 selects the btopt cost model, 2 btultra.
    pub opt_level: u8,
}

/// Per-level defaults, following the reference ladder; the strategy
/// column collapses to the opt-level flag.
const LEVELS: [CompressionParams; (MAX_LEVEL + 1) as usize] = [
    p(18, 12, 12, 1, 7, 16, 0), // 0, never used directly
    p(19, 13, 14, 1, 7, 16, 0),
    p(19, 15, 16, 1, 6, 16, 0),
    p(20, 16, 17, 1, 5, 16, 0),
    p(20, 17, 18, 1, 5, 16, 0),
    p(20, 17, 18, 2, 5, 16, 0),
    p(21, 17, 19, 2, 5, 16, 0),
    p(21, 18, 19, 3, 5, 16, 0),
    p(21, 18, 20, 3, 5, 16, 0),
    p(21, 19, 20, 3, 5, 16, 0),
    p(21, 19, 21, 4, 5, 16, 0),
    p(22, 20, 22, 4, 5, 16, 0),
    p(22, 20, 22, 5, 5, 16, 0),
    p(22, 21, 22, 4, 5, 16, 0),
    p(22, 21, 22, 5, 5, 16, 0),
    p(22, 22, 22, 6, 5, 16, 0),
    p(22, 21, 22, 4, 5, 48, 0),
    p(23, 22, 22, 4, 4, 48, 0),
    p(23, 22, 22, 5, 3, 64, 0),
    p(23, 23, 22, 7, 3, 128, 0),
    p(25, 25, 23, 7, 3, 128, 2),
    p(26, 26, 24, 7, 3, 256, 2),
    p(27, 27, 25, 9, 3, 512, 2),
];

const fn p(
    window_log: u8,
    chain_log: u8,
    hash_log: u8,
    search_log: u8,
    search_length: u8,
    target_length: u32,
    opt_level: u8,
) -> CompressionParams {
    CompressionParams {
        window_log,
        chain_log,
        hash_log,
        search_log,
        search_length,
        target_length,
        opt_level,
    }
}

impl CompressionParams {
    pub fn for_level(level: i32) -> Result<Self, Error> {
        if level == 0 {
            return Self::for_level(DEFAULT_LEVEL);
        }
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
            return Err(Error::LevelOutOfBound(level));
        }

        let mut params = LEVELS[level as usize];
        params.window_log = params.window_log.min(MAX_WINDOW_LOG);
        params.chain_log = params.chain_log.min(params.window_log + 1);
        Ok(params)
    }

    /// Shrink the indexing structures when the whole input is known and
    /// smaller than the configured window.
    pub fn adjusted_for(mut self, src_size: Option<u64>) -> Self {
        let Some(src_size) = src_size else {
            return self;
        };

        let needed_log = if src_size <= 1 {
            MIN_WINDOW_LOG
        } else {
            let bits = highbit32((src_size - 1).min(u32::MAX as u64) as u32) as u8 + 1;
            bits.clamp(MIN_WINDOW_LOG, MAX_WINDOW_LOG)
        };

        if needed_log < self.window_log {
            self.window_log = needed_log;
            self.chain_log = self.chain_log.min(self.window_log + 1);
            self.hash_log = self.hash_log.min(self.window_log + 1);
        }
        self
    }

    #[inline(always)]
    pub const fn window_size(&self) -> usize {
        1 << self.window_log
    }

    #[inline(always)]
    pub const fn min_match(&self) -> u32 {
        if self.search_length == 3 { 3 } else { 4 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_resolve() {
        for level in MIN_LEVEL..=MAX_LEVEL {
            let params = CompressionParams::for_level(level).expect("valid level");
            assert!(params.window_log <= MAX_WINDOW_LOG);
            assert!(params.chain_log <= params.window_log + 1);
        }

        assert!(CompressionParams::for_level(23).is_err());
        assert!(CompressionParams::for_level(-1).is_err());
    }

    #[test]
    fn test_small_inputs_shrink_the_window() {
        let params = CompressionParams::for_level(19)
            .expect("valid level")
            .adjusted_for(Some(4096));
        assert_eq!(params.window_log, 12);

        let params = CompressionParams::for_level(19)
            .expect("valid level")
            .adjusted_for(Some(0));
        assert_eq!(params.window_log, MIN_WINDOW_LOG);
    }
}
