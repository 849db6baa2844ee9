//! The compression half of the codec: binary-tree match finding, optimal
//! (price-driven) parsing, FSE/Huffman entropy coding, and RFC 8878
//! frame assembly.

mod context;
mod errors;
mod frame;
mod literals;
mod match_finder;
mod optimal;
mod params;
mod seq_store;
mod sequences;
mod streaming;
mod window;

pub use errors::Error;
pub use params::{CompressionParams, DEFAULT_LEVEL, MAX_LEVEL, MIN_LEVEL};
pub use streaming::{Compressor, EndDirective, InBuffer, OutBuffer};

use context::Context;

/// Parser offsets above 2 are `distance + REP_MOVE`.
pub(crate) const REP_MOVE: u32 = 2;

/// Optimal-parser horizon: prices are tracked this many positions ahead.
pub(crate) const OPT_NUM: u32 = 1 << 12;

/// Inputs beyond this are compressed through the streaming path so
/// window indices stay clear of u32 wrap-around.
const ONE_SHOT_LIMIT: usize = (3 << 29) - (1 << 20);

/// Worst-case frame size for `src_len` input bytes.
#[must_use]
pub const fn max_compressed_len(src_len: usize) -> usize {
    let margin = if src_len < (1 << 17) {
        ((1 << 17) - src_len) >> 11
    } else {
        0
    };
    // Frame + per-block headers, plus the incompressible-data overhead.
    src_len + (src_len >> 8) + margin + 22
}

/// Compress `src` into a fresh buffer at the given level (1..=22; 0
/// selects the default).
pub fn compress_to_vec(src: &[u8], level: i32) -> Result<Vec<u8>, Error> {
    compress_to_vec_with(src, level, false)
}

/// Like [`compress_to_vec`], optionally appending an xxh64 content
/// checksum to the frame.
pub fn compress_to_vec_with(
    src: &[u8],
    level: i32,
    checksum: bool,
) -> Result<Vec<u8>, Error> {
    let mut dst = Vec::with_capacity(max_compressed_len(src.len()).min(1 << 22));

    if src.len() > ONE_SHOT_LIMIT {
        let mut compressor = Compressor::with_options(level, checksum)?;
        let mut input = InBuffer::new(src);
        let mut scratch = vec![0u8; 1 << 17];
        loop {
            let mut output = OutBuffer::new(&mut scratch);
            let remaining =
                compressor.compress_stream(&mut input, &mut output, EndDirective::End)?;
            dst.extend_from_slice(&output.dst[..output.pos]);
            if remaining == 0 && input.pos == src.len() {
                break;
            }
        }
        return Ok(dst);
    }

    let params = CompressionParams::for_level(level)?.adjusted_for(Some(src.len() as u64));
    let mut ctx = Context::new(params);
    frame::compress_frame(&mut ctx, src, checksum, &mut dst)?;
    Ok(dst)
}

/// Compress into a caller-provided buffer; fails with
/// [`Error::DstSizeTooSmall`] when the frame does not fit.
pub fn compress(dst: &mut [u8], src: &[u8], level: i32) -> Result<usize, Error> {
    let frame = compress_to_vec(src, level)?;
    if frame.len() > dst.len() {
        return Err(Error::DstSizeTooSmall {
            needed: frame.len(),
            capacity: dst.len(),
        });
    }
    dst[..frame.len()].copy_from_slice(&frame);
    Ok(frame.len())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn test_fuzz_output_stays_within_bound(
            src in proptest::collection::vec(any::<u8>(), 0..10_000),
            level in prop_oneof![Just(1), Just(3), Just(19)],
        ) {
            let frame = compress_to_vec(&src, level)?;
            prop_assert!(frame.len() <= max_compressed_len(src.len()));
            prop_assert_eq!(&frame[..4], &zett_format::MAGIC_NUM.to_le_bytes());
        }
    }

    #[test]
    fn test_compress_into_slice() -> Result<(), Error> {
        let src = b"fits comfortably".repeat(8);

        let mut dst = vec![0u8; max_compressed_len(src.len())];
        let written = compress(&mut dst, &src, 3)?;
        assert!(written > 8);
        assert_eq!(&dst[..4], &zett_format::MAGIC_NUM.to_le_bytes());

        let mut tiny = [0u8; 4];
        assert!(matches!(
            compress(&mut tiny, &src, 3),
            Err(Error::DstSizeTooSmall { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_bound_covers_incompressible_extremes() {
        for len in [0usize, 1, 31, 1 << 10, 1 << 17, 1 << 20] {
            assert!(max_compressed_len(len) > len + 6 + 3 * len.div_ceil(1 << 17));
        }
    }
}
