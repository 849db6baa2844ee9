//! The decompression half of the codec: frame and block parsing,
//! literals and sequences decoding, window-backed sequence execution,
//! and content-checksum verification.

mod block;
mod context;
mod decoder;
mod errors;
mod frame;
mod literals_section;
mod prelude;
mod sequence_execution;
mod sequences_section;
mod window;

pub use decoder::Decoder;
pub use errors::Error;

/// Decompress every frame in `src` into a fresh buffer.
pub fn decompress_to_vec(src: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut decoder = Decoder::new(src);
    decoder.decode(&mut out)?;
    Ok(out)
}

/// Decompress into a caller-provided buffer, returning the number of
/// bytes written.
pub fn decompress(dst: &mut [u8], src: &[u8]) -> Result<usize, Error> {
    let out = decompress_to_vec(src)?;
    if out.len() > dst.len() {
        return Err(Error::DstBufferTooSmall {
            needed: out.len(),
            capacity: dst.len(),
        });
    }
    dst[..out.len()].copy_from_slice(&out);
    Ok(out.len())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        /// Garbage must error, never panic or loop.
        #[test]
        fn test_fuzz_garbage_input_never_panics(
            data in proptest::collection::vec(any::<u8>(), 0..4000)
        ) {
            let _ = decompress_to_vec(&data);
        }

        /// Same, but with a valid magic number in front so parsing gets
        /// deep into the frame machinery.
        #[test]
        fn test_fuzz_magic_plus_garbage_never_panics(
            data in proptest::collection::vec(any::<u8>(), 0..4000)
        ) {
            let mut framed = zett_format::MAGIC_NUM.to_le_bytes().to_vec();
            framed.extend_from_slice(&data);
            let _ = decompress_to_vec(&framed);
        }
    }
}
