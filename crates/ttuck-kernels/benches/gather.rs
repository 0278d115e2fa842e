//! Performance benchmarks for ttuck-kernels
//!
//! Run with: cargo bench -p ttuck-kernels
//!
//! Benchmarks cover:
//! - Batched evaluation (sequential & parallel)
//! - Chain gradients (sequential & parallel)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scirs2_core::ndarray_ext::{Array1, Array2};
use ttuck_core::{CoreInit, FactorKind, TtTucker};
use ttuck_kernels::{chain_gradient, evaluate_batch_with, ParallelConfig};

fn model(ndim: usize, grid: usize, rank: usize) -> TtTucker<f64> {
    TtTucker::<f64>::builder(&vec![grid; ndim])
        .uniform_rank(rank)
        .embedding_rank(4)
        .factor_kind(FactorKind::Legendre)
        .init(CoreInit::random_normal(0.3))
        .build()
        .unwrap()
}

fn indices(batch: usize, ndim: usize, grid: usize) -> Array2<usize> {
    Array2::from_shape_fn((batch, ndim), |(s, n)| (s * 31 + n * 17) % grid)
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_batch");
    let t = model(10, 32, 4);
    let sequential = ParallelConfig::sequential();
    #[cfg(feature = "parallel")]
    let parallel = ParallelConfig::default().with_min_parallel_batch(1);

    for &batch in [64, 1_024, 16_384].iter() {
        let idx = indices(batch, 10, 32);
        group.throughput(Throughput::Elements(batch as u64));

        group.bench_with_input(BenchmarkId::new("sequential", batch), &batch, |bencher, _| {
            bencher.iter(|| {
                black_box(evaluate_batch_with(&t, idx.view(), &sequential).unwrap());
            });
        });

        #[cfg(feature = "parallel")]
        group.bench_with_input(BenchmarkId::new("parallel", batch), &batch, |bencher, _| {
            bencher.iter(|| {
                black_box(evaluate_batch_with(&t, idx.view(), &parallel).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_gradient");
    let sequential = ParallelConfig::sequential();
    #[cfg(feature = "parallel")]
    let parallel = ParallelConfig::default();

    for &rank in [2, 4, 8].iter() {
        let t = model(8, 16, rank);
        let idx = indices(4_096, 8, 16);
        let w = Array1::from_elem(4_096, 1.0 / 4_096.0);
        group.throughput(Throughput::Elements(4_096));

        group.bench_with_input(BenchmarkId::new("sequential", rank), &rank, |bencher, _| {
            bencher.iter(|| {
                black_box(chain_gradient(&t, idx.view(), w.view(), &sequential).unwrap());
            });
        });

        #[cfg(feature = "parallel")]
        group.bench_with_input(BenchmarkId::new("parallel", rank), &rank, |bencher, _| {
            bencher.iter(|| {
                black_box(chain_gradient(&t, idx.view(), w.view(), &parallel).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_gradient);
criterion_main!(benches);
