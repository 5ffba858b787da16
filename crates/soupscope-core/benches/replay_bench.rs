//! # Replay and Scan Benchmarks
//!
//! Interpreter throughput and whole-soup scans on both backends.
//!
//! Run with: `cargo bench -p soupscope-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use soupscope_core::primitives::{DEFAULT_HALF_LEN, MAX_STEPS, OPS};
use soupscope_core::search::find_matching;
use soupscope_core::{ParallelBackend, ScalarBackend, ScanBackend, Soup, Token, compute_stats, replay};
use std::hint::black_box;

/// Deterministic pseudo-random soup, roughly one cell in three an
/// instruction.
fn synthetic_soup(tapes: usize) -> Soup {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let cells = (0..tapes * DEFAULT_HALF_LEN)
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let ch = if state % 3 == 0 {
                OPS[(state >> 8) as usize % OPS.len()]
            } else {
                (state >> 16) as u8
            };
            Token::new(ch, (state >> 32) as u32 % 64, (i % 7) as u16)
        })
        .collect();
    Soup::from_tokens(0, DEFAULT_HALF_LEN, cells).expect("soup")
}

/// Copy loop that runs to the step cap: `[` `,` `]` with head0 on a
/// non-zero cell.
fn busy_pair() -> (Vec<Token>, Vec<Token>) {
    let mut a = vec![Token::new(b'a', 1, 0); DEFAULT_HALF_LEN];
    a[0] = Token::new(10, 1, 0);
    a[1] = Token::new(70, 1, 0);
    a[2] = Token::new(b'[', 1, 0);
    a[3] = Token::new(b',', 1, 0);
    a[4] = Token::new(b']', 1, 0);
    let b = vec![Token::new(0, 2, 0); DEFAULT_HALF_LEN];
    (a, b)
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    let (a, b) = busy_pair();

    for steps in [200u32, 2000, MAX_STEPS].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(steps), steps, |bench, &steps| {
            bench.iter(|| black_box(replay(&a, &b, steps, false)));
        });
    }

    group.finish();
}

fn bench_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_stats");
    let soup = synthetic_soup(8192);
    let backends: [Box<dyn ScanBackend>; 2] = [Box::new(ScalarBackend), Box::new(ParallelBackend)];

    for backend in &backends {
        group.bench_function(backend.name(), |bench| {
            bench.iter(|| black_box(compute_stats(backend.as_ref(), &soup)));
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_matching");
    let soup = synthetic_soup(8192);
    let backends: [Box<dyn ScanBackend>; 2] = [Box::new(ScalarBackend), Box::new(ParallelBackend)];

    for backend in &backends {
        group.bench_function(backend.name(), |bench| {
            bench.iter(|| black_box(find_matching(backend.as_ref(), &soup, "[,]")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_replay, bench_stats, bench_search);
criterion_main!(benches);
