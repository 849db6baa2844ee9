//! Whole-codec properties: round trips at every level, the boundary
//! inputs that select special paths, and interop with the reference
//! implementation in both directions.

use proptest::prelude::*;

fn round_trip(src: &[u8], level: i32) -> Vec<u8> {
    let frame = zett::compress_to_vec(src, level)
        .unwrap_or_else(|e| panic!("compress at level {level}: {e}"));
    let back = zett::decompress_to_vec(&frame)
        .unwrap_or_else(|e| panic!("decompress at level {level}: {e}"));
    assert_eq!(back, src, "round trip at level {level}");
    frame
}

/// Deterministic pseudo-random bytes.
fn noise(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 56) as u8
        })
        .collect()
}

#[test]
fn test_empty_input_every_level() {
    for level in [1, 3, 9, 19, 22] {
        let frame = round_trip(b"", level);
        assert_eq!(&frame[..4], &[0x28, 0xB5, 0x2F, 0xFD]);
    }
}

#[test]
fn test_single_byte_input() {
    for level in [1, 3, 19] {
        round_trip(b"z", level);
    }
}

#[test]
fn test_run_input_is_rle_and_tiny() {
    let src = vec![0x41u8; 256];
    let frame = round_trip(&src, 1);
    assert!(frame.len() <= 20, "run frame: {} bytes", frame.len());
}

#[test]
fn test_periodic_input_collapses() {
    let src = b"abcdefgh".repeat(1024);
    let frame = round_trip(&src, 19);
    assert!(frame.len() <= 40, "period-8 frame: {} bytes", frame.len());
}

#[test]
fn test_text_like_input_all_bt_levels() {
    let src = b"It was the best of times, it was the worst of times, it was the \
        age of wisdom, it was the age of foolishness, it was the epoch of belief."
        .repeat(40);

    for level in [16, 17, 18, 19, 20, 21, 22] {
        let frame = round_trip(&src, level);
        assert!(frame.len() < src.len() / 3, "level {level}: {}", frame.len());
    }
}

#[test]
fn test_noise_round_trips_and_stays_near_raw() {
    let src = noise(42, 1 << 20);
    let frame = round_trip(&src, 3);

    // Incompressible data should cost little more than raw.
    assert!(frame.len() < src.len() + src.len() / 100 + 64);
}

#[test]
fn test_multi_block_input() {
    // Several 128 KiB blocks with long-range repetition across them.
    let unit = noise(7, 64 * 1024);
    let mut src = Vec::new();
    for _ in 0..9 {
        src.extend_from_slice(&unit);
    }

    let frame = round_trip(&src, 19);
    assert!(
        frame.len() < src.len() / 4,
        "cross-block matches missed: {} bytes",
        frame.len()
    );
}

#[test]
fn test_mixed_structure_input() {
    let mut src = Vec::new();
    src.extend_from_slice(&noise(1, 10_000));
    src.extend_from_slice(&b"structured|".repeat(2000));
    src.extend_from_slice(&vec![0u8; 5000]);
    src.extend_from_slice(&noise(2, 10_000));

    for level in [1, 3, 12, 19] {
        round_trip(&src, level);
    }
}

#[test]
fn test_checksummed_frame_round_trips() {
    let src = b"verify me".repeat(100);
    let frame = zett::compress_to_vec_with(&src, 3, true).expect("compress");
    assert_eq!(frame[4] & 0x04, 0x04);

    let back = zett::decompress_to_vec(&frame).expect("checksum verifies");
    assert_eq!(back, src);

    // Flip one content byte: the checksum must catch it... unless the
    // frame parser does first, which is just as acceptable.
    let mut bad = frame.clone();
    let target = bad.len() - 6;
    bad[target] ^= 0x10;
    assert!(zett::decompress_to_vec(&bad).is_err());
}

#[test]
fn test_streaming_matches_one_shot_output_semantics() {
    let src = b"stream me in small pieces, please, and do it repeatedly "
        .repeat(10_000);

    let mut compressor = zett::Compressor::with_options(6, false).expect("level");
    let mut frame = Vec::new();
    let mut chunk = vec![0u8; 8192];

    for piece in src.chunks(1013) {
        let mut input = zett::InBuffer::new(piece);
        while input.pos < piece.len() {
            let mut output = zett::OutBuffer::new(&mut chunk);
            compressor
                .compress_stream(&mut input, &mut output, zett::EndDirective::Continue)
                .expect("stream step");
            frame.extend_from_slice(&output.dst[..output.pos]);
        }
    }
    loop {
        let mut input = zett::InBuffer::new(&[]);
        let mut output = zett::OutBuffer::new(&mut chunk);
        let remaining = compressor
            .compress_stream(&mut input, &mut output, zett::EndDirective::End)
            .expect("end step");
        frame.extend_from_slice(&output.dst[..output.pos]);
        if remaining == 0 {
            break;
        }
    }

    let back = zett::decompress_to_vec(&frame).expect("streamed frame decodes");
    assert_eq!(back, src);
}

#[test]
fn test_streaming_rollover_exercises_old_segment() {
    // Level 1 has a 512 KiB window; push several windows through with
    // matches that reach back across the rollover boundary.
    let unit = b"rollover-unit-0123456789-abcdefghijklmnopqrstuvwxyz-";
    let src: Vec<u8> = unit.iter().copied().cycle().take(3 << 20).collect();

    let mut compressor = zett::Compressor::with_options(1, true).expect("level");
    let mut frame = Vec::new();
    let mut chunk = vec![0u8; 1 << 16];

    let mut input = zett::InBuffer::new(&src);
    loop {
        let mut output = zett::OutBuffer::new(&mut chunk);
        let remaining = compressor
            .compress_stream(&mut input, &mut output, zett::EndDirective::End)
            .expect("stream step");
        frame.extend_from_slice(&output.dst[..output.pos]);
        if remaining == 0 && input.pos == src.len() {
            break;
        }
    }

    let back = zett::decompress_to_vec(&frame).expect("rollover frame decodes");
    assert_eq!(back, src);
}

#[test]
fn test_reference_decoder_reads_our_frames() {
    let corpus: [(&str, Vec<u8>); 5] = [
        ("empty", Vec::new()),
        ("tiny", b"abc".to_vec()),
        ("run", vec![0x55; 1000]),
        ("text", b"interoperability is the entire point of a format".repeat(64)),
        ("noise", noise(9, 100_000)),
    ];

    for level in [1, 3, 19] {
        for (name, src) in &corpus {
            let frame = zett::compress_to_vec(src, level).expect("compress");
            let back = zstd::stream::decode_all(&frame[..])
                .unwrap_or_else(|e| panic!("reference decode of {name}/{level}: {e}"));
            assert_eq!(&back, src, "{name} at level {level}");
        }
    }
}

#[test]
fn test_we_read_reference_frames() {
    let corpus: [Vec<u8>; 4] = [
        Vec::new(),
        b"the reference encoder made this".repeat(100),
        noise(11, 200_000),
        b"abcdefgh".repeat(4096),
    ];

    for level in [1, 3, 19] {
        for src in &corpus {
            let frame = zstd::stream::encode_all(&src[..], level).expect("reference");
            let back = zett::decompress_to_vec(&frame).expect("our decode");
            assert_eq!(&back, src);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_fuzz_round_trip(
        src in proptest::collection::vec(any::<u8>(), 0..20_000),
        level in prop_oneof![Just(1), Just(3), Just(9), Just(19)],
        skew in 1u8..=255,
    ) {
        // Mix of raw and modulo-skewed bytes covers both compressible
        // and incompressible shapes.
        let src: Vec<u8> = src.iter().map(|&b| b % skew.max(1)).collect();
        round_trip(&src, level);
    }
}
