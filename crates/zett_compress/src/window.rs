/// One block's view of the referenceable history.
///
/// Positions are virtual u32 indices. The live segment holds
/// `[buf_base, buf_base + live.len())`; an optional older segment sits
/// virtually just below `buf_base` in separate memory (the extDict case
/// after a streaming window rollover). `low_limit` is the oldest
/// referenceable position; anything below `buf_base` must be resolved
/// through `ext`.
#[derive(Clone, Copy)]
pub(crate) struct SegmentedInput<'a> {
    pub ext: &'a [u8],
    pub live: &'a [u8],
    pub buf_base: u32,
    /// Prefix boundary for validity decisions:
    /// `low_limit <= dict_limit <= current` at all times. Usually equal
    /// to `buf_base`; max-distance enforcement can push both limits into
    /// the live segment.
    pub dict_limit: u32,
    pub low_limit: u32,
}

impl<'a> SegmentedInput<'a> {
    pub fn contiguous(src: &'a [u8]) -> Self {
        Self {
            ext: &[],
            live: src,
            buf_base: 0,
            dict_limit: 0,
            low_limit: 0,
        }
    }

    #[inline(always)]
    pub fn end_pos(&self) -> u32 {
        self.buf_base + self.live.len() as u32
    }

    #[inline(always)]
    pub fn ext_base(&self) -> u32 {
        self.buf_base - self.ext.len() as u32
    }

    #[inline(always)]
    pub fn live_suffix(&self, pos: u32) -> &'a [u8] {
        debug_assert!(pos >= self.buf_base);
        &self.live[(pos - self.buf_base) as usize..]
    }

    /// `n` contiguous bytes starting at `pos`, if they fit inside one
    /// physical segment.
    #[inline(always)]
    pub fn bytes_at(&self, pos: u32, n: usize) -> Option<&'a [u8]> {
        if pos >= self.buf_base {
            let idx = (pos - self.buf_base) as usize;
            self.live.get(idx..idx + n)
        } else {
            let idx = (pos - self.ext_base()) as usize;
            let slice = self.ext.get(idx..)?;
            // Reads straddling the segment boundary are not served.
            slice.get(..n)
        }
    }

    /// Length of the common prefix of the suffixes at `cur` and
    /// `match_pos`, capped by `limit` (an exclusive live position).
    /// `match_pos` may live in the older segment, in which case counting
    /// continues virtually into the live one.
    pub fn count_match(&self, cur: u32, match_pos: u32, limit: u32) -> u32 {
        debug_assert!(cur >= self.buf_base && cur < limit);
        debug_assert!(match_pos < cur);

        let a = self.live_suffix(cur);
        let a = &a[..(limit - cur) as usize];

        if match_pos >= self.buf_base {
            return count_common(a, self.live_suffix(match_pos));
        }

        let ext_idx = (match_pos - self.ext_base()) as usize;
        let head = count_common(a, &self.ext[ext_idx..]);

        if ext_idx + head as usize == self.ext.len() {
            // Ran off the old segment; the match continues at the start
            // of the live one.
            return head + count_common(&a[head as usize..], self.live);
        }

        head
    }
}

#[inline(always)]
fn count_common(a: &[u8], b: &[u8]) -> u32 {
    let n = a.len().min(b.len());
    let mut count = 0usize;

    // Word-at-a-time until the first difference.
    while count + 8 <= n {
        let x = u64::from_le_bytes(a[count..count + 8].try_into().expect("8 bytes"));
        let y = u64::from_le_bytes(b[count..count + 8].try_into().expect("8 bytes"));
        let diff = x ^ y;
        if diff != 0 {
            return (count + (diff.trailing_zeros() / 8) as usize) as u32;
        }
        count += 8;
    }

    while count < n && a[count] == b[count] {
        count += 1;
    }
    count as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_common() {
        assert_eq!(count_common(b"abcdef", b"abcxef"), 3);
        assert_eq!(count_common(b"same prefix same", b"same prefix diff"), 12);
        assert_eq!(count_common(b"", b"abc"), 0);
        assert_eq!(count_common(b"aaaaaaaaaaaaaaaaaa", b"aaaaaaaaaaaaaaaaaa"), 18);
    }

    #[test]
    fn test_two_segment_count_continues_into_live() {
        // Old segment holds "abcd", live starts with "abxx...": a match
        // at the segment tail must keep counting into live bytes.
        let input = SegmentedInput {
            ext: b"zzabcd",
            live: b"abcdabyy",
            buf_base: 6,
            dict_limit: 6,
            low_limit: 0,
        };

        // cur = position 10 ("abyy"), match at position 2 ("abcd" + "ab").
        let count = input.count_match(10, 2, input.end_pos());
        assert_eq!(count, 2, "abcd vs abyy shares ab");

        // cur = position 10, match at position 6 (live "abcd...") caps at 2.
        assert_eq!(input.count_match(10, 6, input.end_pos()), 2);

        let input = SegmentedInput {
            ext: b"abcd",
            live: b"abefabcdab",
            buf_base: 4,
            dict_limit: 4,
            low_limit: 0,
        };
        // cur = 8 ("abcdab"), match at ext pos 0 ("abcd" then live "abef").
        assert_eq!(input.count_match(8, 0, input.end_pos()), 6);
    }

    #[test]
    fn test_bytes_at_refuses_straddles() {
        let input = SegmentedInput {
            ext: b"0123",
            live: b"4567",
            buf_base: 4,
            dict_limit: 4,
            low_limit: 0,
        };

        assert_eq!(input.bytes_at(0, 4), Some(&b"0123"[..]));
        assert_eq!(input.bytes_at(2, 2), Some(&b"23"[..]));
        assert_eq!(input.bytes_at(2, 3), None, "would straddle the boundary");
        assert_eq!(input.bytes_at(4, 4), Some(&b"4567"[..]));
    }
}
