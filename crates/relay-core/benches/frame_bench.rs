//! Criterion benchmarks for the frame codec.
//!
//! Run with:
//! ```bash
//! cargo bench --package relay-core --bench frame_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relay_core::FrameLayout;

const PAYLOAD_SIZES: &[usize] = &[0, 64, 1024, 16 * 1024, 65531];

fn bench_encode(c: &mut Criterion) {
    let layout = FrameLayout::default();
    let mut group = c.benchmark_group("encode");
    for &size in PAYLOAD_SIZES {
        let payload = vec![0xA5u8; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, p| {
            b.iter(|| layout.encode(black_box(p)).unwrap())
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let layout = FrameLayout::default();
    let mut group = c.benchmark_group("decode");
    for &size in PAYLOAD_SIZES {
        let frame = layout.encode(&vec![0xA5u8; size]).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, f| {
            b.iter(|| layout.decode(black_box(f)).unwrap().len())
        });
    }
    group.finish();
}

fn bench_split_stream(c: &mut Criterion) {
    // 256 small frames back to back, as a chatty backend would send them.
    let layout = FrameLayout::default();
    let mut stream = Vec::new();
    for i in 0..256u32 {
        stream.extend_from_slice(&layout.encode(&i.to_le_bytes()).unwrap());
    }

    c.bench_function("split_256_frames", |b| {
        b.iter(|| {
            let mut rest = black_box(stream.as_slice());
            let mut count = 0usize;
            while !rest.is_empty() {
                let frame = layout.decode(rest).unwrap();
                rest = &rest[frame.len()..];
                count += 1;
            }
            count
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_split_stream);
criterion_main!(benches);
