//! Performance benchmarks for hecomp-lzx
//!
//! Measures framed compression and decompression throughput for a few data
//! patterns at the default XCompress window (2^17).

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hecomp_lzx::{decode_framed, encode_framed};
use std::hint::black_box;

const WINDOW_BITS: u32 = 17;

/// Type alias for pattern generator functions
type PatternGenerator = fn(usize) -> Vec<u8>;

mod test_data {
    /// All bytes the same
    pub fn uniform(size: usize) -> Vec<u8> {
        vec![0xAA; size]
    }

    /// Linear congruential noise
    pub fn random(size: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(size);
        let mut seed: u64 = 0x123456789ABCDEF0;
        for _ in 0..size {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            data.push((seed >> 32) as u8);
        }
        data
    }

    /// Repeated English text
    pub fn text_like(size: usize) -> Vec<u8> {
        let text = b"The quick brown fox jumps over the lazy dog. \
                     Pack my box with five dozen liquor jugs. ";
        text.iter().copied().cycle().take(size).collect()
    }
}

const PATTERNS: [(&str, PatternGenerator); 3] = [
    ("uniform", test_data::uniform),
    ("random", test_data::random),
    ("text", test_data::text_like),
];

const SIZES: [usize; 2] = [64 * 1024, 1024 * 1024];

fn bench_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("lzx_compress");
    for (name, generator) in PATTERNS {
        for size in SIZES {
            let data = generator(size);
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(name, size), &data, |b, data| {
                b.iter(|| encode_framed(black_box(data), WINDOW_BITS));
            });
        }
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("lzx_decompress");
    for (name, generator) in PATTERNS {
        for size in SIZES {
            let data = generator(size);
            let Ok(framed) = encode_framed(&data, WINDOW_BITS) else {
                continue;
            };
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(name, size), &framed, |b, framed| {
                b.iter(|| {
                    let mut output = Vec::with_capacity(size);
                    decode_framed(black_box(framed), WINDOW_BITS, 0, size, &mut output)
                        .map(|_| output.len())
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);
