use zett_format::{LL_EXTRA_BITS, MIN_MATCH, ML_EXTRA_BITS, ll_code, ml_code};
use zett_foundation::highbit32;

use crate::{
    OPT_NUM, REP_MOVE,
    match_finder::{MatchCandidate, MatchFinder},
    seq_store::SequenceStore,
    window::SegmentedInput,
};

const MAX_PRICE: i32 = 1 << 30;

/// Literal frequencies adapt faster than the length/offset ones.
const LIT_FREQ_ADD: u32 = 2;
const FREQ_DIV: u32 = 4;

const MAX_LL_SYMBOLS: usize = 36;
const MAX_ML_SYMBOLS: usize = 53;
const MAX_OFF_SYMBOLS: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
struct OptEntry {
    mlen: u32,
    off: u32,
    litlen: u32,
    price: i32,
    rep: [u32; 3],
}

/// Price model: per-symbol frequencies of the current block family,
/// costs approximated as `log2(sum) - log2(freq)` plus raw bits.
pub(crate) struct OptState {
    lit_freq: Box<[u32; 256]>,
    lit_length_freq: [u32; MAX_LL_SYMBOLS],
    match_length_freq: [u32; MAX_ML_SYMBOLS],
    off_code_freq: [u32; MAX_OFF_SYMBOLS],
    lit_sum: u32,
    lit_length_sum: u32,
    match_length_sum: u32,
    off_code_sum: u32,
    log2_lit_sum: u32,
    log2_lit_length_sum: u32,
    log2_match_length_sum: u32,
    log2_off_code_sum: u32,
    static_prices: bool,
}

impl OptState {
    pub fn new() -> Self {
        Self {
            lit_freq: Box::new([0; 256]),
            lit_length_freq: [0; MAX_LL_SYMBOLS],
            match_length_freq: [0; MAX_ML_SYMBOLS],
            off_code_freq: [0; MAX_OFF_SYMBOLS],
            lit_sum: 0,
            lit_length_sum: 0,
            match_length_sum: 0,
            off_code_sum: 0,
            log2_lit_sum: 0,
            log2_lit_length_sum: 0,
            log2_match_length_sum: 0,
            log2_off_code_sum: 0,
            static_prices: false,
        }
    }

    pub fn reset(&mut self) {
        self.lit_length_sum = 0;
        self.static_prices = false;
    }

    /// First block seeds from the raw bytes; later blocks carry the
    /// previous statistics divided down so they can still adapt.
    fn rescale(&mut self, src: &[u8]) {
        self.static_prices = false;

        if self.lit_length_sum == 0 {
            if src.len() <= 1024 {
                self.static_prices = true;
            }

            self.lit_freq.fill(0);
            for &b in src {
                self.lit_freq[b as usize] += 1;
            }
            self.lit_sum = 0;
            for freq in self.lit_freq.iter_mut() {
                *freq = 1 + (*freq >> FREQ_DIV);
                self.lit_sum += *freq;
            }

            self.lit_length_freq.fill(1);
            self.lit_length_sum = MAX_LL_SYMBOLS as u32;
            self.match_length_freq.fill(1);
            self.match_length_sum = MAX_ML_SYMBOLS as u32;
            self.off_code_freq.fill(1);
            self.off_code_sum = MAX_OFF_SYMBOLS as u32;
        } else {
            self.lit_sum = 0;
            for freq in self.lit_freq.iter_mut() {
                *freq = 1 + (*freq >> (FREQ_DIV + 1));
                self.lit_sum += *freq;
            }
            self.lit_length_sum = 0;
            for freq in &mut self.lit_length_freq {
                *freq = 1 + (*freq >> (FREQ_DIV + 1));
                self.lit_length_sum += *freq;
            }
            self.match_length_sum = 0;
            for freq in &mut self.match_length_freq {
                *freq = 1 + (*freq >> FREQ_DIV);
                self.match_length_sum += *freq;
            }
            self.off_code_sum = 0;
            for freq in &mut self.off_code_freq {
                *freq = 1 + (*freq >> FREQ_DIV);
                self.off_code_sum += *freq;
            }
        }

        self.set_log2_prices();
    }

    fn set_log2_prices(&mut self) {
        self.log2_lit_sum = highbit32(self.lit_sum + 1);
        self.log2_lit_length_sum = highbit32(self.lit_length_sum + 1);
        self.log2_match_length_sum = highbit32(self.match_length_sum + 1);
        self.log2_off_code_sum = highbit32(self.off_code_sum + 1);
    }

    /// Cost of the literal bytes alone, length symbol excluded.
    fn raw_literals_cost(&self, literals: &[u8]) -> i32 {
        if self.static_prices {
            return literals.len() as i32 * 6;
        }
        if literals.is_empty() {
            return 0;
        }

        let mut cost = literals.len() as i32 * self.log2_lit_sum as i32;
        for &b in literals {
            cost -= highbit32(self.lit_freq[b as usize] + 1) as i32;
        }
        cost
    }

    fn lit_length_price(&self, lit_len: u32) -> i32 {
        if self.static_prices {
            return highbit32(lit_len + 1) as i32;
        }

        let code = ll_code(lit_len) as usize;
        LL_EXTRA_BITS[code] as i32 + self.log2_lit_length_sum as i32
            - highbit32(self.lit_length_freq[code] + 1) as i32
    }

    fn full_literals_cost(&self, literals: &[u8]) -> i32 {
        self.raw_literals_cost(literals) + self.lit_length_price(literals.len() as u32)
    }

    /// `cost(litlen) - cost(0)`: comparable to a match price ending at
    /// the same position. Can be negative.
    fn lit_length_contribution(&self, lit_len: u32) -> i32 {
        if self.static_prices {
            return highbit32(lit_len + 1) as i32;
        }

        let code = ll_code(lit_len) as usize;
        LL_EXTRA_BITS[code] as i32 + highbit32(self.lit_length_freq[0] + 1) as i32
            - highbit32(self.lit_length_freq[code] + 1) as i32
    }

    fn literals_contribution(&self, literals: &[u8]) -> i32 {
        self.raw_literals_cost(literals)
            + self.lit_length_contribution(literals.len() as u32)
    }

    /// Cost of the match half of a sequence. Below opt level 2, long
    /// offsets carry a handicap to keep decompression cache-friendly.
    fn match_price(&self, off_code: u32, match_length: u32, opt_level: u8) -> i32 {
        debug_assert!(match_length >= MIN_MATCH);
        let of_code = highbit32(off_code + 1);
        let ml_base = match_length - MIN_MATCH;

        if self.static_prices {
            return highbit32(ml_base + 1) as i32 + 16 + of_code as i32;
        }

        let mut price = of_code as i32 + self.log2_off_code_sum as i32
            - highbit32(self.off_code_freq[of_code as usize] + 1) as i32;
        if opt_level < 2 && of_code >= 20 {
            price += ((of_code - 19) * 2) as i32;
        }

        let ml = ml_code(ml_base) as usize;
        price += ML_EXTRA_BITS[ml] as i32 + self.log2_match_length_sum as i32
            - highbit32(self.match_length_freq[ml] + 1) as i32;

        price
    }

    fn update_stats(&mut self, literals: &[u8], off_code: u32, match_length: u32) {
        for &b in literals {
            self.lit_freq[b as usize] += LIT_FREQ_ADD;
        }
        self.lit_sum += literals.len() as u32 * LIT_FREQ_ADD;

        let llc = ll_code(literals.len() as u32) as usize;
        self.lit_length_freq[llc] += 1;
        self.lit_length_sum += 1;

        let ofc = highbit32(off_code + 1) as usize;
        debug_assert!(ofc < MAX_OFF_SYMBOLS);
        self.off_code_freq[ofc] += 1;
        self.off_code_sum += 1;

        let mlc = ml_code(match_length - MIN_MATCH) as usize;
        self.match_length_freq[mlc] += 1;
        self.match_length_sum += 1;
    }
}

/// Reusable DP scratch, sized once.
pub(crate) struct OptBuffers {
    opt: Vec<OptEntry>,
    matches: Vec<MatchCandidate>,
}

impl OptBuffers {
    pub fn new() -> Self {
        Self {
            opt: vec![OptEntry::default(); OPT_NUM as usize + 1],
            matches: Vec::with_capacity(256),
        }
    }
}

/// Offset history after emitting `off_code` with the given
/// zero-literal-length flag; repcode 0 leaves history untouched.
pub(crate) fn update_rep(rep: [u32; 3], off_code: u32, ll0: bool) -> [u32; 3] {
    if off_code >= 3 {
        return [off_code - REP_MOVE, rep[0], rep[1]];
    }

    let rep_code = off_code + ll0 as u32;
    if rep_code == 0 {
        return rep;
    }

    let current = if rep_code == 3 {
        rep[0] - 1
    } else {
        rep[rep_code as usize]
    };
    [
        current,
        rep[0],
        if rep_code >= 2 { rep[1] } else { rep[2] },
    ]
}

/// Literal-run price cache anchored to the current run start; extending
/// the run only prices the fresh bytes.
#[derive(Default)]
struct CachedLitPrice {
    anchor: Option<u32>,
    lit_len: u32,
    raw_cost: i32,
}

impl CachedLitPrice {
    fn raw_cost(
        &mut self,
        input: &SegmentedInput,
        anchor: u32,
        lit_len: u32,
        state: &OptState,
    ) -> i32 {
        let (start_cost, start, remaining) = if self.anchor == Some(anchor) {
            debug_assert!(lit_len >= self.lit_len);
            (self.raw_cost, anchor + self.lit_len, lit_len - self.lit_len)
        } else {
            (0, anchor, lit_len)
        };

        let fresh = &input.live_suffix(start)[..remaining as usize];
        let cost = start_cost + state.raw_literals_cost(fresh);

        self.anchor = Some(anchor);
        self.lit_len = lit_len;
        self.raw_cost = cost;
        cost
    }

    fn full_cost(
        &mut self,
        input: &SegmentedInput,
        anchor: u32,
        lit_len: u32,
        state: &OptState,
    ) -> i32 {
        self.raw_cost(input, anchor, lit_len, state) + state.lit_length_price(lit_len)
    }

    fn contribution(
        &mut self,
        input: &SegmentedInput,
        anchor: u32,
        lit_len: u32,
        state: &OptState,
    ) -> i32 {
        self.raw_cost(input, anchor, lit_len, state)
            + state.lit_length_contribution(lit_len)
    }
}

/// Dynamic-programming parse of `[block_start, block_end)`: enumerate
/// candidate matches per position, keep the cheapest path in bits, then
/// trace it back and emit the chosen sequences in input order.
#[allow(clippy::too_many_arguments)]
pub(crate) fn compress_block_opt(
    state: &mut OptState,
    buffers: &mut OptBuffers,
    finder: &mut MatchFinder,
    seq_store: &mut SequenceStore,
    reps: &mut [u32; 3],
    input: &SegmentedInput,
    block_start: u32,
    block_end: u32,
    opt_level: u8,
    ext_dict: bool,
) {
    let istart = block_start;
    let iend = block_end;
    let ilimit = iend.saturating_sub(8);

    let sufficient_len = finder.sufficient_len();
    let min_match = finder.min_match();

    let opt = &mut buffers.opt;
    let matches = &mut buffers.matches;

    let block = {
        let lo = (istart - input.buf_base) as usize;
        let hi = (iend - input.buf_base) as usize;
        &input.live[lo..hi]
    };
    state.rescale(block);

    let mut ip = istart;
    let mut anchor = istart;
    // The first prefix position doubles as the empty table slot.
    ip += (ip == input.dict_limit) as u32;

    let mut cached = CachedLitPrice::default();

    while ip < ilimit {
        let litlen = ip - anchor;
        let ll0 = litlen == 0;

        let nb_matches = finder.get_all_matches(
            input, ip, iend, ext_dict, reps, ll0, min_match, matches,
        );
        if nb_matches == 0 {
            ip += 1;
            continue;
        }

        opt[0].rep = *reps;
        opt[0].mlen = 1;
        opt[0].litlen = litlen;

        let best_mlen;
        let best_off;
        let mut cur = 0u32;
        let mut last_pos;

        let max_ml = matches.last().expect("non-empty").len;
        let max_off = matches.last().expect("non-empty").off;

        if max_ml > sufficient_len {
            // Large match: take it without optimizing.
            best_mlen = max_ml;
            best_off = max_off;
            last_pos = 1;
        } else {
            let literals_price = cached.full_cost(input, anchor, litlen, state);
            for entry in opt.iter_mut().take(min_match as usize) {
                entry.mlen = 1;
                entry.price = MAX_PRICE;
            }

            let mut pos = min_match;
            for m in matches.iter() {
                let rep_history = update_rep(*reps, m.off, ll0);
                while pos <= m.len {
                    let price = literals_price + state.match_price(m.off, pos, opt_level);
                    opt[pos as usize] = OptEntry {
                        mlen: pos,
                        off: m.off,
                        litlen,
                        price,
                        rep: rep_history,
                    };
                    pos += 1;
                }
            }
            last_pos = pos - 1;

            let mut found_big = None;

            cur = 1;
            while cur <= last_pos {
                let inr = ip + cur;
                let cur_idx = cur as usize;

                // Fix the current position with one more literal when
                // that is cheaper.
                {
                    let run = if opt[cur_idx - 1].mlen == 1 {
                        opt[cur_idx - 1].litlen + 1
                    } else {
                        1
                    };
                    let price = if cur > run {
                        let span_start = (inr - run - input.buf_base) as usize;
                        opt[(cur - run) as usize].price
                            + state.literals_contribution(
                                &input.live[span_start..span_start + run as usize],
                            )
                    } else {
                        cached.contribution(input, anchor, run, state)
                    };

                    if price <= opt[cur_idx].price {
                        opt[cur_idx] = OptEntry {
                            mlen: 1,
                            off: 0,
                            litlen: run,
                            price,
                            rep: opt[cur_idx - 1].rep,
                        };
                    }
                }

                // The final match must keep a safety margin from the end.
                if inr > ilimit {
                    cur += 1;
                    continue;
                }
                if cur == last_pos {
                    break;
                }

                if opt_level == 0 && opt[cur_idx + 1].price <= opt[cur_idx].price {
                    // Unpromising position; skipping buys speed for a
                    // sliver of ratio.
                    cur += 1;
                    continue;
                }

                let ll0_here = opt[cur_idx].mlen != 1;
                let run_here = if opt[cur_idx].mlen == 1 {
                    opt[cur_idx].litlen
                } else {
                    0
                };
                let previous_price = if cur > run_here {
                    opt[(cur - run_here) as usize].price
                } else {
                    0
                };
                let base_price = {
                    let span_start = (inr - run_here - input.buf_base) as usize;
                    previous_price
                        + state.full_literals_cost(
                            &input.live[span_start..span_start + run_here as usize],
                        )
                };

                let reps_here = opt[cur_idx].rep;
                let nb = finder.get_all_matches(
                    input, inr, iend, ext_dict, &reps_here, ll0_here, min_match, matches,
                );
                if nb == 0 {
                    cur += 1;
                    continue;
                }

                let deep_ml = matches.last().expect("non-empty").len;
                if deep_ml > sufficient_len || cur + deep_ml >= OPT_NUM {
                    found_big = Some((deep_ml, matches.last().expect("non-empty").off));
                    last_pos = cur + 1;
                    break;
                }

                for match_nb in 0..matches.len() {
                    let m = matches[match_nb];
                    let rep_history = update_rep(reps_here, m.off, ll0_here);
                    let start_ml = if match_nb > 0 {
                        matches[match_nb - 1].len + 1
                    } else {
                        min_match
                    };

                    let mut mlen = m.len;
                    while mlen >= start_ml {
                        let pos = cur + mlen;
                        let price = base_price + state.match_price(m.off, mlen, opt_level);

                        if pos > last_pos || price < opt[pos as usize].price {
                            while last_pos < pos {
                                opt[(last_pos + 1) as usize].price = MAX_PRICE;
                                last_pos += 1;
                            }
                            opt[pos as usize] = OptEntry {
                                mlen,
                                off: m.off,
                                litlen: run_here,
                                price,
                                rep: rep_history,
                            };
                        } else if opt_level == 0 {
                            break;
                        }
                        mlen -= 1;
                    }
                }

                cur += 1;
            }

            if let Some((ml, off)) = found_big {
                best_mlen = ml;
                best_off = off;
            } else {
                best_mlen = opt[last_pos as usize].mlen;
                best_off = opt[last_pos as usize].off;
                cur = last_pos - best_mlen;
            }
        }

        // Reverse the chosen path in place so emission runs forward.
        debug_assert_eq!(opt[0].mlen, 1);
        {
            let mut selected_mlen = best_mlen;
            let mut selected_off = best_off;
            let mut pos = cur;
            loop {
                let mlen = opt[pos as usize].mlen;
                let off = opt[pos as usize].off;
                opt[pos as usize].mlen = selected_mlen;
                opt[pos as usize].off = selected_off;
                selected_mlen = mlen;
                selected_off = off;
                if mlen > pos {
                    break;
                }
                pos -= mlen;
            }
        }

        let mut pos = 0u32;
        while pos < last_pos {
            let llen = ip - anchor;
            let mlen = opt[pos as usize].mlen;
            let off = opt[pos as usize].off;

            if mlen == 1 {
                ip += 1;
                pos += 1;
                continue;
            }
            pos += mlen;
            ip += mlen;

            *reps = update_rep(*reps, off, llen == 0);

            let literals = {
                let lo = (anchor - input.buf_base) as usize;
                &input.live[lo..lo + llen as usize]
            };
            state.update_stats(literals, off, mlen);
            seq_store.push(literals, off, mlen);
            anchor = ip;
        }
        state.set_log2_prices();
    }

    let tail = {
        let lo = (anchor - input.buf_base) as usize;
        let hi = (iend - input.buf_base) as usize;
        &input.live[lo..hi]
    };
    seq_store.push_last_literals(tail);
}
