use xxhash_rust::xxh64::Xxh64;
use zett_format::{MAGIC_NUM, SKIPPABLE_MAGIC_MASK, SKIPPABLE_MAGIC_MIN};
use zett_io::Reader;

use crate::{context::Context, errors::Error, frame};

/// Decodes a concatenation of Zstandard and skippable frames from a
/// byte reader into a writer.
pub struct Decoder<R: Reader> {
    ctx: Context<R>,
}

impl<R: Reader> Decoder<R> {
    pub fn new(src: R) -> Self {
        Decoder {
            ctx: Context::new(src),
        }
    }

    /// Decode until the source is exhausted.
    pub fn decode(&mut self, mut writer: impl std::io::Write) -> Result<(), Error> {
        while self.decode_frame(&mut writer)? {}
        Ok(())
    }

    fn decode_frame(&mut self, writer: &mut impl std::io::Write) -> Result<bool, Error> {
        let magic_num = match self.ctx.src.read_u32() {
            Ok(it) => it,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(false),
            Err(e) => return Err(Error::from(e)),
        };

        if magic_num & SKIPPABLE_MAGIC_MASK == SKIPPABLE_MAGIC_MIN {
            self.skip_frame()?;
            return Ok(true);
        }

        if magic_num != MAGIC_NUM {
            return Err(Error::InvalidMagicNum(magic_num));
        }

        let header = frame::Header::read(&mut self.ctx.src)?;
        let window_size = header.window_size()?;
        if window_size > zett_format::MAX_WINDOW_SIZE {
            return Err(Error::WindowSizeOutOfBounds(window_size));
        }
        let window_size = window_size as usize;

        tracing::debug!(
            window_size,
            content_size = ?header.content_size(),
            checksum = header.has_checksum(),
            "decoding frame"
        );

        self.ctx.reset(window_size);

        let mut hasher = header.has_checksum().then(|| Xxh64::new(0));

        loop {
            let last = self.ctx.block()?;

            // Flushing per block keeps the window free to recycle its
            // buffer; decoded bytes never sit unflushed across a shift.
            let pending = self.ctx.window.pending();
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(pending);
            }
            writer.write_all(pending).map_err(Error::from)?;
            self.ctx.window.mark_flushed();

            if last {
                break;
            }
        }

        if let Some(hasher) = hasher {
            let expected = self.ctx.src.read_u32()?;
            let actual = hasher.digest() as u32;
            if expected != actual {
                return Err(Error::ChecksumMismatch { expected, actual });
            }
        }

        Ok(true)
    }

    /// Skippable frame: 4-byte little-endian length, then opaque bytes.
    fn skip_frame(&mut self) -> Result<(), Error> {
        let size = self.ctx.src.read_u32()? as u64;
        let copied = std::io::copy(
            &mut std::io::Read::take(&mut self.ctx.src, size),
            &mut std::io::sink(),
        )?;
        if copied != size {
            return Err(Error::Corruption);
        }
        Ok(())
    }
}
