use xxhash_rust::xxh64::xxh64;
use zett_format::MAGIC_NUM;

use crate::{Error, context::Context, window::SegmentedInput};

pub(crate) struct FrameParams {
    pub window_log: u8,
    pub content_size: Option<u64>,
    pub checksum: bool,
}

/// Write the frame header: magic, descriptor byte, optional window
/// descriptor, optional content size (RFC 8878 §3.1.1.1).
pub(crate) fn write_frame_header(dst: &mut Vec<u8>, params: &FrameParams) {
    dst.extend_from_slice(&MAGIC_NUM.to_le_bytes());

    let single_segment = params
        .content_size
        .is_some_and(|size| size <= 1u64 << params.window_log);

    let fcs_code: u8 = match params.content_size {
        None => 0,
        Some(size) => {
            (size >= 256) as u8
                + (size >= 65536 + 256) as u8
                + (size > u32::MAX as u64) as u8
        }
    };

    let descriptor = (fcs_code << 6)
        | ((single_segment as u8) << 5)
        | ((params.checksum as u8) << 2);
    dst.push(descriptor);

    if !single_segment {
        let (exponent, mantissa) =
            zett_format::window_descriptor_for(1u64 << params.window_log);
        dst.push((exponent << 3) | mantissa);
    }

    match (fcs_code, params.content_size) {
        (0, Some(size)) if single_segment => dst.push(size as u8),
        (0, _) => {}
        (1, Some(size)) => {
            dst.extend_from_slice(&(((size - 256) as u16).to_le_bytes()))
        }
        (2, Some(size)) => dst.extend_from_slice(&((size as u32).to_le_bytes())),
        (_, Some(size)) => dst.extend_from_slice(&size.to_le_bytes()),
        _ => unreachable!("fcs_code is 0 when the size is unknown"),
    }
}

/// One-shot frame: header, blocks over the whole input, optional
/// checksum. The input itself serves as the match window.
pub(crate) fn compress_frame(
    ctx: &mut Context,
    src: &[u8],
    checksum: bool,
    dst: &mut Vec<u8>,
) -> Result<(), Error> {
    ctx.reset(0);

    write_frame_header(
        dst,
        &FrameParams {
            window_log: ctx.params.window_log,
            content_size: Some(src.len() as u64),
            checksum,
        },
    );

    let window_size = ctx.params.window_size() as u32;
    let block_size = ctx.block_size();

    if src.is_empty() {
        let input = SegmentedInput::contiguous(src);
        ctx.compress_block(&input, 0, 0, true, dst)?;
    } else {
        let mut start = 0usize;
        while start < src.len() {
            let end = (start + block_size).min(src.len());
            let last = end == src.len();

            // References older than the window expire as the frame walks
            // forward.
            let low_limit = (end as u32).saturating_sub(window_size);
            let input = SegmentedInput {
                ext: &[],
                live: src,
                buf_base: 0,
                dict_limit: low_limit,
                low_limit,
            };

            ctx.compress_block(&input, start as u32, end as u32, last, dst)?;
            start = end;
        }
    }

    if checksum {
        let digest = xxh64(src, 0) as u32;
        dst.extend_from_slice(&digest.to_le_bytes());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CompressionParams;

    fn compress(src: &[u8], level: i32, checksum: bool) -> Vec<u8> {
        let params = CompressionParams::for_level(level)
            .expect("valid level")
            .adjusted_for(Some(src.len() as u64));
        let mut ctx = Context::new(params);

        let mut dst = Vec::new();
        compress_frame(&mut ctx, src, checksum, &mut dst).expect("compression");
        dst
    }

    #[test]
    fn test_empty_input_frame_layout() {
        let frame = compress(b"", 3, false);

        assert_eq!(&frame[..4], &MAGIC_NUM.to_le_bytes());
        // Single segment with a 1-byte content size of zero.
        assert_eq!(frame[4], 0x20);
        assert_eq!(frame[5], 0x00);
        // Empty raw last block.
        assert_eq!(&frame[6..], &[0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_run_input_is_tiny() {
        let frame = compress(&[0x41u8; 256], 1, false);
        assert!(frame.len() <= 20, "256-byte run: {} bytes", frame.len());
    }

    #[test]
    fn test_content_size_field_sizes() {
        // 300 bytes needs the 2-byte biased field.
        let frame = compress(&[7u8; 300], 3, false);
        assert_eq!(frame[4] >> 6, 1, "fcs code 1");
        assert_eq!(
            u16::from_le_bytes([frame[5], frame[6]]),
            300 - 256,
            "biased 16-bit content size"
        );
    }

    #[test]
    fn test_checksum_is_appended() {
        let src = b"checksummed payload, long enough to be its own thing";
        let with = compress(src, 3, true);
        let without = compress(src, 3, false);

        assert_eq!(with.len(), without.len() + 4);
        assert_eq!(with[4] & 0x04, 0x04, "checksum flag set");

        let expected = (xxh64(src, 0) as u32).to_le_bytes();
        assert_eq!(&with[with.len() - 4..], &expected);
    }
}
