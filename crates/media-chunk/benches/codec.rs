//! Throughput of the chunk codec for typical 100ms slices.

#![allow(clippy::unwrap_used, clippy::cast_possible_truncation)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use media_chunk::{decode, encode};

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_codec");

    // Opus audio slice, SD video slice, HD video slice
    for size in [2_048usize, 64 * 1024, 512 * 1024] {
        let data: Vec<u8> = (0..size).map(|i| (i * 7) as u8).collect();
        let text = encode(&data);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &data, |b, data| {
            b.iter(|| encode(black_box(data)));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &text, |b, text| {
            b.iter(|| decode(black_box(text)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
