use criterion::{Criterion, Throughput, criterion_group, criterion_main};

fn sample(len: usize) -> Vec<u8> {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    (0..len)
        .map(|i| {
            state = state.wrapping_mul(0x5851_F42D_4C95_7F2D).wrapping_add(1);
            if i % 7 < 4 {
                b"lorem ipsum dolor sit amet "[i % 27]
            } else {
                (state >> 56) as u8
            }
        })
        .collect()
}

fn bench_compress(c: &mut Criterion) {
    let src = sample(1 << 20);

    let mut group = c.benchmark_group("compress");
    group.throughput(Throughput::Bytes(src.len() as u64));

    for level in [1i32, 3, 19] {
        group.bench_function(format!("level_{level}"), |b| {
            b.iter(|| zett::compress_to_vec(&src, level).expect("compress"));
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let src = sample(1 << 20);
    let frame = zett::compress_to_vec(&src, 19).expect("compress");

    let mut group = c.benchmark_group("decompress");
    group.throughput(Throughput::Bytes(src.len() as u64));

    group.bench_function("zett", |b| {
        b.iter(|| zett::decompress_to_vec(&frame).expect("decode"));
    });
    group.bench_function("zstd", |b| {
        b.iter(|| zstd::stream::decode_all(&frame[..]).expect("decode"));
    });
    group.bench_function("ruzstd", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            let mut dec = ruzstd::decoding::StreamingDecoder::new(&frame[..])
                .expect("decoder");
            std::io::Read::read_to_end(&mut dec, &mut out).expect("decode");
            out
        });
    });
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);
