use xxhash_rust::xxh64::Xxh64;

use crate::{
    Error,
    context::Context,
    frame::{FrameParams, write_frame_header},
    params::CompressionParams,
    window::SegmentedInput,
};

/// What the caller wants from this `compress_stream` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndDirective {
    /// Buffer freely; emit blocks only as they fill.
    Continue,
    /// Emit everything buffered so far as a (non-final) block.
    Flush,
    /// Finish the frame: final block, checksum, done.
    End,
}

/// Caller-provided input with a consumption cursor.
#[derive(Debug)]
pub struct InBuffer<'a> {
    pub src: &'a [u8],
    pub pos: usize,
}

impl<'a> InBuffer<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self { src, pos: 0 }
    }
}

/// Caller-provided output with a fill cursor.
#[derive(Debug)]
pub struct OutBuffer<'a> {
    pub dst: &'a mut [u8],
    pub pos: usize,
}

impl<'a> OutBuffer<'a> {
    pub fn new(dst: &'a mut [u8]) -> Self {
        Self { dst, pos: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Init,
    Running,
    Done,
}

/// Index normalization threshold; far below u32 wrap-around so block
/// positions can never overflow mid-block.
const INDEX_OVERFLOW_MARGIN: u32 = 3 << 29;

/// Streaming compressor: buffers input into a rolling window, emits one
/// frame across calls. Progress is monotone: every call consumes input
/// or produces output unless it errors.
pub struct Compressor {
    ctx: Context,
    checksum: bool,

    /// Live window bytes, bounded by `capacity`.
    window: Vec<u8>,
    /// Logical window buffer size: `window_size + block_size`, a
    /// multiple of the block size so rollovers land on block edges.
    capacity: usize,
    /// Previous live buffer after a rollover, still referenceable.
    ext: Vec<u8>,
    /// Virtual position of `window[0]`.
    buf_base: u32,
    /// Bytes of `window` already emitted as blocks.
    parsed: usize,
    low_limit: u32,

    pending: Vec<u8>,
    flushed: usize,

    stage: Stage,
    hasher: Xxh64,
}

impl Compressor {
    pub fn new(level: i32) -> Result<Self, Error> {
        Self::with_options(level, true)
    }

    pub fn with_options(level: i32, checksum: bool) -> Result<Self, Error> {
        let params = CompressionParams::for_level(level)?;
        let capacity = params.window_size() + zett_format::MAX_BLOCK_SIZE as usize;

        Ok(Self {
            ctx: Context::new(params),
            checksum,
            window: Vec::with_capacity(capacity),
            capacity,
            ext: Vec::new(),
            buf_base: 0,
            parsed: 0,
            low_limit: 0,
            pending: Vec::new(),
            flushed: 0,
            stage: Stage::Init,
            hasher: Xxh64::new(0),
        })
    }

    /// Restart for a new frame, keeping allocations.
    pub fn reset(&mut self) {
        self.ctx.reset(0);
        self.window.clear();
        self.ext.clear();
        self.buf_base = 0;
        self.parsed = 0;
        self.low_limit = 0;
        self.pending.clear();
        self.flushed = 0;
        self.stage = Stage::Init;
        self.hasher.reset(0);
    }

    /// One streaming step. Returns a hint of the bytes still held
    /// internally; 0 together with `End` means the frame is complete.
    pub fn compress_stream(
        &mut self,
        input: &mut InBuffer<'_>,
        output: &mut OutBuffer<'_>,
        directive: EndDirective,
    ) -> Result<usize, Error> {
        if self.stage == Stage::Done {
            // A finished frame may still have bytes waiting for room in
            // the caller's buffer; anything else is misuse.
            if self.pending.len() > self.flushed {
                self.drain(output);
                return Ok(self.pending.len() - self.flushed);
            }
            return Err(Error::StageWrong);
        }

        if self.stage == Stage::Init {
            write_frame_header(
                &mut self.pending,
                &FrameParams {
                    window_log: self.ctx.params.window_log,
                    content_size: None,
                    checksum: self.checksum,
                },
            );
            self.stage = Stage::Running;
        }

        let block_size = self.ctx.block_size();

        while input.pos < input.src.len() {
            if self.window.len() == self.capacity {
                // An earlier flush may have left a partial block pending;
                // a rollover needs the live buffer fully parsed.
                if self.parsed < self.window.len() {
                    self.emit_block(self.window.len(), false)?;
                }
                self.rollover();
            }

            let take =
                (input.src.len() - input.pos).min(self.capacity - self.window.len());
            let chunk = &input.src[input.pos..input.pos + take];
            self.window.extend_from_slice(chunk);
            self.hasher.update(chunk);
            input.pos += take;

            while self.window.len() - self.parsed >= block_size {
                let end = self.parsed + block_size;
                self.emit_block(end, false)?;
            }
        }

        match directive {
            EndDirective::Continue => {}
            EndDirective::Flush => {
                if self.parsed < self.window.len() {
                    self.emit_block(self.window.len(), false)?;
                }
            }
            EndDirective::End => {
                self.emit_block(self.window.len(), true)?;
                if self.checksum {
                    let digest = self.hasher.digest() as u32;
                    self.pending.extend_from_slice(&digest.to_le_bytes());
                }
                self.stage = Stage::Done;
            }
        }

        self.drain(output);
        Ok(self.pending.len() - self.flushed)
    }

    /// Compress `[parsed, end)` of the window as one block.
    fn emit_block(&mut self, end: usize, last: bool) -> Result<(), Error> {
        let window_size = self.ctx.params.window_size() as u32;

        let start_pos = self.buf_base + self.parsed as u32;
        let end_pos = self.buf_base + end as u32;

        // Expire references beyond the window distance.
        self.low_limit = self.low_limit.max(end_pos.saturating_sub(window_size));
        let dict_limit = self.buf_base.max(self.low_limit);

        let input = SegmentedInput {
            ext: &self.ext,
            live: &self.window,
            buf_base: self.buf_base,
            dict_limit,
            low_limit: self.low_limit,
        };

        self.ctx
            .compress_block(&input, start_pos, end_pos, last, &mut self.pending)?;
        self.parsed = end;
        Ok(())
    }

    /// The live buffer is full and fully parsed: it becomes the old
    /// segment and a fresh live buffer starts at the same virtual
    /// position the old one ended.
    fn rollover(&mut self) {
        debug_assert_eq!(self.parsed, self.window.len());

        std::mem::swap(&mut self.window, &mut self.ext);
        self.buf_base += self.ext.len() as u32;
        self.window.clear();
        self.window.reserve(self.capacity);
        self.parsed = 0;
        self.ctx.finder.skip_to(self.buf_base);

        if self.buf_base >= INDEX_OVERFLOW_MARGIN {
            // Uniform index reduction: drop everything below low_limit
            // and slide all positions down.
            let delta = self.low_limit;
            self.ctx.finder.reduce_indices(delta);
            self.buf_base -= delta;
            self.low_limit = 0;
        }
    }

    fn drain(&mut self, output: &mut OutBuffer<'_>) {
        let available = self.pending.len() - self.flushed;
        let room = output.dst.len() - output.pos;
        let take = available.min(room);

        output.dst[output.pos..output.pos + take]
            .copy_from_slice(&self.pending[self.flushed..self.flushed + take]);
        output.pos += take;
        self.flushed += take;

        if self.flushed == self.pending.len() {
            self.pending.clear();
            self.flushed = 0;
        }
    }

    pub const fn is_done(&self) -> bool {
        matches!(self.stage, Stage::Done)
    }
}
