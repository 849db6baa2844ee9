use zett_format::{MAX_BLOCK_SIZE, REP_INIT};

use crate::{
    Error,
    literals::write_literals_section,
    match_finder::MatchFinder,
    optimal::{OptBuffers, OptState, compress_block_opt},
    params::CompressionParams,
    seq_store::SequenceStore,
    sequences::{EntropyTables, write_sequences_section},
    window::SegmentedInput,
};

const RAW_BLOCK: u8 = 0;
const RLE_BLOCK: u8 = 1;
const COMPRESSED_BLOCK: u8 = 2;

/// One compression job's mutable state: indexing structures, price
/// statistics, entropy tables, and the offset history. Reset per frame,
/// mutated per block. Not shareable across threads mid-job.
pub(crate) struct Context {
    pub params: CompressionParams,
    pub finder: MatchFinder,
    opt: OptState,
    opt_buffers: OptBuffers,
    seq_store: SequenceStore,
    entropy: EntropyTables,
    reps: [u32; 3],
    scratch: Vec<u8>,
}

impl Context {
    pub fn new(params: CompressionParams) -> Self {
        Self {
            params,
            finder: MatchFinder::new(&params),
            opt: OptState::new(),
            opt_buffers: OptBuffers::new(),
            seq_store: SequenceStore::default(),
            entropy: EntropyTables::default(),
            reps: REP_INIT,
            scratch: Vec::with_capacity(MAX_BLOCK_SIZE as usize),
        }
    }

    /// Frame boundary: history, statistics and tables all restart.
    pub fn reset(&mut self, base: u32) {
        self.finder.reset(base);
        self.opt.reset();
        self.entropy.reset();
        self.reps = REP_INIT;
    }

    pub const fn block_size(&self) -> usize {
        let window = self.params.window_size();
        if window < MAX_BLOCK_SIZE as usize {
            window
        } else {
            MAX_BLOCK_SIZE as usize
        }
    }

    /// Compress `[start, end)` of the window into one block, header
    /// included. Falls back to an RLE or raw block when entropy coding
    /// does not pay.
    pub fn compress_block(
        &mut self,
        input: &SegmentedInput,
        start: u32,
        end: u32,
        last: bool,
        dst: &mut Vec<u8>,
    ) -> Result<(), Error> {
        let len = (end - start) as usize;
        debug_assert!(len <= self.block_size());

        let block = {
            let lo = (start - input.buf_base) as usize;
            &input.live[lo..lo + len]
        };

        if len == 0 {
            write_block_header(dst, RAW_BLOCK, 0, last);
            return Ok(());
        }

        if len > 1 && block.iter().all(|&b| b == block[0]) {
            write_block_header(dst, RLE_BLOCK, len, last);
            dst.push(block[0]);
            // The run is left unindexed; the tree catches up lazily on
            // the next block's first query.
            return Ok(());
        }

        self.seq_store.reset();
        let ext_dict = input.low_limit < input.buf_base;
        compress_block_opt(
            &mut self.opt,
            &mut self.opt_buffers,
            &mut self.finder,
            &mut self.seq_store,
            &mut self.reps,
            input,
            start,
            end,
            self.params.opt_level,
            ext_dict,
        );

        self.scratch.clear();
        write_literals_section(&self.seq_store.lit, &mut self.scratch)?;
        write_sequences_section(&self.seq_store, &mut self.entropy, &mut self.scratch)?;

        tracing::trace!(
            block_len = len,
            sequences = self.seq_store.seqs.len(),
            literals = self.seq_store.lit.len(),
            compressed = self.scratch.len(),
            "block parsed"
        );

        let min_gain = (len >> 6) + 2;
        let compressed_fits = len
            .checked_sub(min_gain)
            .is_some_and(|max_c_size| self.scratch.len() < max_c_size);

        if compressed_fits {
            write_block_header(dst, COMPRESSED_BLOCK, self.scratch.len(), last);
            dst.extend_from_slice(&self.scratch);
        } else {
            // Emitting raw, the decoder never sees the tables this block
            // planned; forget them so no later block repeats a table the
            // decoder does not hold.
            self.entropy.reset();
            write_block_header(dst, RAW_BLOCK, len, last);
            dst.extend_from_slice(block);
        }

        Ok(())
    }
}

fn write_block_header(dst: &mut Vec<u8>, block_type: u8, size: usize, last: bool) {
    debug_assert!(size < 1 << 21);
    let header = (size as u32) << 3 | (block_type as u32) << 1 | last as u32;
    dst.extend_from_slice(&header.to_le_bytes()[..3]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_for(src_len: usize, level: i32) -> Context {
        let params = CompressionParams::for_level(level)
            .expect("valid level")
            .adjusted_for(Some(src_len as u64));
        Context::new(params)
    }

    #[test]
    fn test_empty_block_is_header_only() -> Result<(), Error> {
        let mut ctx = ctx_for(0, 3);
        ctx.reset(0);

        let mut dst = Vec::new();
        let input = SegmentedInput::contiguous(&[]);
        ctx.compress_block(&input, 0, 0, true, &mut dst)?;

        assert_eq!(dst, [0x01, 0x00, 0x00]);
        Ok(())
    }

    #[test]
    fn test_run_becomes_rle_block() -> Result<(), Error> {
        let src = [0x41u8; 256];
        let mut ctx = ctx_for(src.len(), 1);
        ctx.reset(0);

        let mut dst = Vec::new();
        let input = SegmentedInput::contiguous(&src);
        ctx.compress_block(&input, 0, 256, true, &mut dst)?;

        assert_eq!(dst.len(), 4, "3-byte header + 1 repeated byte");
        let header = u32::from_le_bytes([dst[0], dst[1], dst[2], 0]);
        assert_eq!(header & 1, 1, "last block");
        assert_eq!((header >> 1) & 3, RLE_BLOCK as u32);
        assert_eq!(header >> 3, 256);
        assert_eq!(dst[3], 0x41);
        Ok(())
    }

    #[test]
    fn test_incompressible_block_goes_raw() -> Result<(), Error> {
        // LCG noise: no repeats to match, flat literal histogram.
        let mut noise = Vec::with_capacity(1000);
        let mut state = 0x1234_5678u32;
        for _ in 0..1000 {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            noise.push((state >> 24) as u8);
        }

        let mut ctx = ctx_for(noise.len(), 3);
        ctx.reset(0);

        let mut dst = Vec::new();
        let input = SegmentedInput::contiguous(&noise);
        ctx.compress_block(&input, 0, noise.len() as u32, true, &mut dst)?;

        let header = u32::from_le_bytes([dst[0], dst[1], dst[2], 0]);
        assert_eq!((header >> 1) & 3, RAW_BLOCK as u32);
        assert_eq!(header >> 3, noise.len() as u32);
        assert_eq!(&dst[3..], &noise[..]);
        Ok(())
    }

    #[test]
    fn test_repetitive_block_compresses() -> Result<(), Error> {
        let src = b"abcdefgh".repeat(1024);
        let mut ctx = ctx_for(src.len(), 19);
        ctx.reset(0);

        let mut dst = Vec::new();
        let input = SegmentedInput::contiguous(&src);
        ctx.compress_block(&input, 0, src.len() as u32, true, &mut dst)?;

        let header = u32::from_le_bytes([dst[0], dst[1], dst[2], 0]);
        assert_eq!((header >> 1) & 3, COMPRESSED_BLOCK as u32);
        assert!(dst.len() <= 40, "period-8 data collapses: {} bytes", dst.len());
        Ok(())
    }
}
