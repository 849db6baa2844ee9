use crate::{OPT_NUM, REP_MOVE, params::CompressionParams, window::SegmentedInput};

/// A candidate at one position: `off < 3` is a repcode index (already
/// skewed by `ll0`), otherwise `off - 2` is the distance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MatchCandidate {
    pub off: u32,
    pub len: u32,
}

const HASH3_MAX_LOG: u32 = 17;

/// Long matches repeat; past this length the inserter hands back a skip
/// hint instead of indexing every position of the run.
const REPEAT_SKIP_THRESHOLD: u32 = 384;

/// Hash heads plus a binary tree ordered by suffix, stored as a rolling
/// arena of child pairs. Each position appears in at most one live tree;
/// positions older than `current - (1 << bt_log)` are evicted by the
/// rolling mask.
pub(crate) struct MatchFinder {
    hash: Vec<u32>,
    hash3: Vec<u32>,
    bt: Vec<u32>,
    hash_log: u32,
    hash3_log: u32,
    bt_log: u32,
    search_log: u32,
    mls: u32,
    sufficient_len: u32,
    next_to_update: u32,
    next_to_update3: u32,
}

impl MatchFinder {
    pub fn new(params: &CompressionParams) -> Self {
        let bt_log = (params.chain_log - 1) as u32;
        let hash3_log = if params.search_length == 3 {
            HASH3_MAX_LOG.min(params.window_log as u32)
        } else {
            0
        };

        Self {
            hash: vec![0; 1 << params.hash_log],
            hash3: vec![0; if hash3_log > 0 { 1 << hash3_log } else { 0 }],
            // One scratch slot past the pairs; severed trails write there.
            bt: vec![0; (2 << bt_log) + 1],
            hash_log: params.hash_log as u32,
            hash3_log,
            bt_log,
            search_log: params.search_log as u32,
            mls: params.search_length as u32,
            sufficient_len: params.target_length.min(OPT_NUM - 1),
            next_to_update: 0,
            next_to_update3: 0,
        }
    }

    pub fn reset(&mut self, base: u32) {
        self.hash.fill(0);
        self.hash3.fill(0);
        self.bt.fill(0);
        self.next_to_update = base;
        self.next_to_update3 = base;
    }

    #[inline(always)]
    pub const fn sufficient_len(&self) -> u32 {
        self.sufficient_len
    }

    #[inline(always)]
    pub const fn min_match(&self) -> u32 {
        if self.mls == 3 { 3 } else { 4 }
    }

    /// The physical segment changed: positions below `base` can no
    /// longer be hashed for insertion, only matched against.
    pub fn skip_to(&mut self, base: u32) {
        self.next_to_update = self.next_to_update.max(base);
        self.next_to_update3 = self.next_to_update3.max(base);
    }

    /// Uniformly shift every stored position down by `delta`; entries
    /// falling below zero become empty.
    pub fn reduce_indices(&mut self, delta: u32) {
        for table in [&mut self.hash, &mut self.hash3, &mut self.bt] {
            for entry in table.iter_mut() {
                *entry = entry.saturating_sub(delta);
            }
        }
        self.next_to_update = self.next_to_update.saturating_sub(delta);
        self.next_to_update3 = self.next_to_update3.saturating_sub(delta);
    }

    /// All matches at `pos`, strictly increasing in length: repcodes
    /// first, a 3-byte hash probe when configured, then the tree walk.
    /// Inserts `pos` (and any skipped positions before it) into the tree.
    pub fn get_all_matches(
        &mut self,
        input: &SegmentedInput,
        pos: u32,
        iend: u32,
        ext_dict: bool,
        reps: &[u32; 3],
        ll0: bool,
        length_to_beat: u32,
        out: &mut Vec<MatchCandidate>,
    ) -> usize {
        out.clear();

        if pos < self.next_to_update {
            // Inside a stretch the repeat-skip heuristic jumped over.
            return 0;
        }

        if ext_dict {
            self.update_tree::<true>(input, pos, iend);
            match self.mls {
                3 => self.collect::<true, 3>(input, pos, iend, reps, ll0, length_to_beat, out),
                5 => self.collect::<true, 5>(input, pos, iend, reps, ll0, length_to_beat, out),
                6 | 7 => {
                    self.collect::<true, 6>(input, pos, iend, reps, ll0, length_to_beat, out)
                }
                _ => self.collect::<true, 4>(input, pos, iend, reps, ll0, length_to_beat, out),
            }
        } else {
            self.update_tree::<false>(input, pos, iend);
            match self.mls {
                3 => self.collect::<false, 3>(input, pos, iend, reps, ll0, length_to_beat, out),
                5 => self.collect::<false, 5>(input, pos, iend, reps, ll0, length_to_beat, out),
                6 | 7 => {
                    self.collect::<false, 6>(input, pos, iend, reps, ll0, length_to_beat, out)
                }
                _ => self.collect::<false, 4>(input, pos, iend, reps, ll0, length_to_beat, out),
            }
        }

        out.len()
    }

    fn update_tree<const EXT: bool>(&mut self, input: &SegmentedInput, target: u32, iend: u32) {
        let mut idx = self.next_to_update;
        while idx < target {
            idx += self.insert_position::<EXT>(input, idx, iend);
        }
        self.next_to_update = target;
    }

    /// Add one position to the tree without collecting matches.
    /// Returns how many positions the caller may skip (>1 only inside
    /// long repetitive runs).
    fn insert_position<const EXT: bool>(
        &mut self,
        input: &SegmentedInput,
        pos: u32,
        iend: u32,
    ) -> u32 {
        debug_assert!(pos + 8 <= iend);

        let current = pos;
        let h = self.hash_at(input, pos);
        let mut match_index = self.hash[h];
        self.hash[h] = current;

        let bt_mask = (1u32 << self.bt_log) - 1;
        let dummy = self.bt.len() - 1;
        let mut smaller_idx = (2 * (current & bt_mask)) as usize;
        let mut larger_idx = smaller_idx + 1;

        let bt_low = if bt_mask >= current { 0 } else { current - bt_mask };
        let window_low = input.low_limit;

        let mut common_smaller = 0u32;
        let mut common_larger = 0u32;
        let mut match_end_idx = current + 8 + 1;
        let mut best_length = 8u32;
        let mut nb_compares = 1u32 << self.search_log;

        while nb_compares > 0 && match_index > window_low {
            nb_compares -= 1;
            let next_idx = (2 * (match_index & bt_mask)) as usize;
            let known = common_smaller.min(common_larger);
            debug_assert!(match_index < current);

            let match_length =
                known + input.count_match(pos + known, match_index + known, iend);

            if match_length > best_length {
                best_length = match_length;
                if match_length > match_end_idx - match_index {
                    match_end_idx = match_index + match_length;
                }
            }

            if pos + match_length == iend {
                // Tie against the input end: ordering is unknowable, so
                // stop here rather than corrupt the tree.
                break;
            }

            let cur_byte = input.live[(pos + match_length - input.buf_base) as usize];
            if self.byte_at(input, match_index + match_length) < cur_byte {
                self.bt[smaller_idx] = match_index;
                common_smaller = match_length;
                if match_index <= bt_low {
                    smaller_idx = dummy;
                    break;
                }
                smaller_idx = next_idx + 1;
                match_index = self.bt[next_idx + 1];
            } else {
                self.bt[larger_idx] = match_index;
                common_larger = match_length;
                if match_index <= bt_low {
                    larger_idx = dummy;
                    break;
                }
                larger_idx = next_idx;
                match_index = self.bt[next_idx];
            }
        }

        self.bt[smaller_idx] = 0;
        self.bt[larger_idx] = 0;

        if best_length > REPEAT_SKIP_THRESHOLD {
            return 192.min(best_length - REPEAT_SKIP_THRESHOLD);
        }
        debug_assert!(match_end_idx > current + 8);
        match_end_idx - (current + 8)
    }

    #[allow(clippy::too_many_arguments)]
    fn collect<const EXT: bool, const MLS: u32>(
        &mut self,
        input: &SegmentedInput,
        pos: u32,
        iend: u32,
        reps: &[u32; 3],
        ll0: bool,
        length_to_beat: u32,
        out: &mut Vec<MatchCandidate>,
    ) {
        let current = pos;
        let min_match: u32 = if MLS == 3 { 3 } else { 4 };
        let ll0 = ll0 as u32;
        let window_low = input.low_limit;
        let mut best_length = length_to_beat - 1;
        let mut match_end_idx = current + 8 + 1;

        // Repcodes come first; they are the cheapest offsets.
        for rep_code in ll0..(3 + ll0) {
            let rep_offset = if rep_code == 3 {
                reps[0] - 1
            } else {
                reps[rep_code as usize]
            };
            let mut rep_len = 0u32;

            if rep_offset >= 1 && rep_offset <= current - input.dict_limit {
                let rep_pos = current - rep_offset;
                if input.bytes_at(current, min_match as usize)
                    == input.bytes_at(rep_pos, min_match as usize)
                {
                    rep_len = min_match
                        + input.count_match(
                            current + min_match,
                            rep_pos + min_match,
                            iend,
                        );
                }
            } else if EXT
                && rep_offset >= 1
                && rep_offset <= current - window_low
                && current - rep_offset + 4 <= input.buf_base
            {
                let rep_pos = current - rep_offset;
                if input.bytes_at(current, min_match as usize)
                    == input.bytes_at(rep_pos, min_match as usize)
                {
                    rep_len = min_match
                        + input.count_match(
                            current + min_match,
                            rep_pos + min_match,
                            iend,
                        );
                }
            }

            if rep_len > best_length {
                best_length = rep_len;
                out.push(MatchCandidate {
                    off: rep_code - ll0,
                    len: rep_len,
                });
                if rep_len > self.sufficient_len || pos + rep_len == iend {
                    return;
                }
            }
        }

        // Short-match probe, worthwhile only within a modest distance.
        if MLS == 3 && best_length < 3 {
            let match3 = self.insert_and_probe_hash3(input, pos);
            if match3 > window_low && current - match3 < (1 << 18) {
                let mlen = input.count_match(current, match3, iend);
                if mlen >= 3 {
                    best_length = mlen;
                    debug_assert!(out.is_empty());
                    out.push(MatchCandidate {
                        off: (current - match3) + REP_MOVE,
                        len: mlen,
                    });
                    if mlen > self.sufficient_len || pos + mlen == iend {
                        self.next_to_update = current + 1;
                        return;
                    }
                }
            }
        }

        let h = self.hash_at(input, pos);
        let mut match_index = self.hash[h];
        self.hash[h] = current;

        let bt_mask = (1u32 << self.bt_log) - 1;
        let dummy = self.bt.len() - 1;
        let mut smaller_idx = (2 * (current & bt_mask)) as usize;
        let mut larger_idx = smaller_idx + 1;
        let bt_low = if bt_mask >= current { 0 } else { current - bt_mask };

        let mut common_smaller = 0u32;
        let mut common_larger = 0u32;
        let mut nb_compares = 1u32 << self.search_log;

        while nb_compares > 0 && match_index > window_low {
            nb_compares -= 1;
            let next_idx = (2 * (match_index & bt_mask)) as usize;
            let known = common_smaller.min(common_larger);
            debug_assert!(match_index < current);

            let match_length =
                known + input.count_match(pos + known, match_index + known, iend);

            if match_length > best_length {
                if match_length > match_end_idx - match_index {
                    match_end_idx = match_index + match_length;
                }
                best_length = match_length;
                out.push(MatchCandidate {
                    off: (current - match_index) + REP_MOVE,
                    len: match_length,
                });
                if match_length > OPT_NUM {
                    break;
                }
            }

            if pos + match_length == iend {
                // Tie against the input end: ordering is unknowable, so
                // stop rather than corrupt the tree.
                break;
            }

            let cur_byte = input.live[(pos + match_length - input.buf_base) as usize];
            if self.byte_at(input, match_index + match_length) < cur_byte {
                self.bt[smaller_idx] = match_index;
                common_smaller = match_length;
                if match_index <= bt_low {
                    smaller_idx = dummy;
                    break;
                }
                smaller_idx = next_idx + 1;
                match_index = self.bt[next_idx + 1];
            } else {
                self.bt[larger_idx] = match_index;
                common_larger = match_length;
                if match_index <= bt_low {
                    larger_idx = dummy;
                    break;
                }
                larger_idx = next_idx;
                match_index = self.bt[next_idx];
            }
        }

        self.bt[smaller_idx] = 0;
        self.bt[larger_idx] = 0;

        debug_assert!(match_end_idx > current + 8);
        self.next_to_update = match_end_idx - 8;
    }

    fn insert_and_probe_hash3(&mut self, input: &SegmentedInput, pos: u32) -> u32 {
        debug_assert!(self.hash3_log > 0);

        let target = pos;
        let mut idx = self.next_to_update3;
        while idx < target {
            let h = hash3(self.read4(input, idx), self.hash3_log);
            self.hash3[h] = idx;
            idx += 1;
        }
        self.next_to_update3 = target;

        self.hash3[hash3(self.read4(input, pos), self.hash3_log)]
    }

    #[inline(always)]
    fn read4(&self, input: &SegmentedInput, pos: u32) -> u32 {
        let idx = (pos - input.buf_base) as usize;
        u32::from_le_bytes(input.live[idx..idx + 4].try_into().expect("4 bytes"))
    }

    #[inline(always)]
    fn hash_at(&self, input: &SegmentedInput, pos: u32) -> usize {
        let idx = (pos - input.buf_base) as usize;
        let v64 = u64::from_le_bytes(input.live[idx..idx + 8].try_into().expect("8 bytes"));
        hash_min_match(v64, self.hash_log, self.mls)
    }

    #[inline(always)]
    fn byte_at(&self, input: &SegmentedInput, pos: u32) -> u8 {
        if pos >= input.buf_base {
            input.live[(pos - input.buf_base) as usize]
        } else {
            input.ext[(pos - input.ext_base()) as usize]
        }
    }
}

const PRIME_3: u32 = 506_832_829;
const PRIME_4: u32 = 2_654_435_761;
const PRIME_5: u64 = 889_523_592_379;
const PRIME_6: u64 = 227_718_039_650_203;

#[inline(always)]
fn hash3(v: u32, log: u32) -> usize {
    ((v << 8).wrapping_mul(PRIME_3) >> (32 - log)) as usize
}

#[inline(always)]
fn hash_min_match(v64: u64, log: u32, mls: u32) -> usize {
    match mls {
        5 => ((v64 << 24).wrapping_mul(PRIME_5) >> (64 - log)) as usize,
        6 | 7 => ((v64 << 16).wrapping_mul(PRIME_6) >> (64 - log)) as usize,
        // 3-byte search still indexes on 4 bytes; the dedicated table
        // covers the short matches.
        _ => ((v64 as u32).wrapping_mul(PRIME_4) >> (32 - log)) as usize,
    }
}
