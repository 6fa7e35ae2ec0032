//! Benchmarks for row projection
//!
//! Measures dense versus sparse projection across input sizes, and the cost
//! of a full fit including the bandwidth pass.
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tabkit_rff::{
    ColumnSpec, FeatureVector, HostEnv, InMemoryDataView, KernelSpec, RffConfig, RffEstimator,
    RowMapper, TransformInfo,
};

/// Deterministic dense rows
fn generate_rows(dim: usize, count: usize) -> Vec<FeatureVector> {
    (0..count)
        .map(|i| FeatureVector::dense((0..dim).map(|j| ((i * dim + j) as f32).sin()).collect()))
        .collect()
}

/// Sparse row with every `step`-th slot set
fn sparse_row(dim: usize, step: usize) -> FeatureVector {
    let indices: Vec<usize> = (0..dim).step_by(step).collect();
    let values = indices.iter().map(|&i| (i as f32).cos()).collect();
    FeatureVector::sparse(dim, indices, values).unwrap()
}

fn build_info(src_dim: usize, new_dim: usize) -> TransformInfo {
    let column = ColumnSpec::new("x", "z")
        .with_new_dim(new_dim)
        .with_seed(42)
        .with_kernel(KernelSpec::gaussian(1.0));
    TransformInfo::build(&mut HostEnv::with_seed(0), &column, src_dim, 1.0).unwrap()
}

/// Benchmark dense projection
fn bench_dense_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_projection");

    for src_dim in [16, 128, 1024].iter() {
        let info = build_info(*src_dim, 256);
        let row = generate_rows(*src_dim, 1).remove(0);
        let mut mapper = RowMapper::new(&info);
        let mut out = Vec::new();

        group.throughput(Throughput::Elements((*src_dim * 256) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(src_dim), src_dim, |b, _| {
            b.iter(|| {
                mapper.map(black_box(&row), &mut out).unwrap();
                black_box(&out);
            });
        });
    }

    group.finish();
}

/// Benchmark sparse projection at 1% density
fn bench_sparse_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse_projection");

    for src_dim in [128, 1024, 8192].iter() {
        let info = build_info(*src_dim, 256);
        let row = sparse_row(*src_dim, 100);
        let mut mapper = RowMapper::new(&info);
        let mut out = Vec::new();

        group.throughput(Throughput::Elements(row.stored_len() as u64 * 256));
        group.bench_with_input(BenchmarkId::from_parameter(src_dim), src_dim, |b, _| {
            b.iter(|| {
                mapper.map(black_box(&row), &mut out).unwrap();
                black_box(&out);
            });
        });
    }

    group.finish();
}

/// Benchmark fitting, dominated by the bandwidth pass
fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    for rows in [1_000, 10_000].iter() {
        let data = InMemoryDataView::from_vectors("x", 32, generate_rows(32, *rows)).unwrap();
        let config = RffConfig::new(vec![ColumnSpec::new("x", "x_rff").with_new_dim(128)])
            .with_seed(1);
        let estimator = RffEstimator::new(config).unwrap();

        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, _| {
            b.iter(|| black_box(estimator.fit(&data).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_dense_projection,
    bench_sparse_projection,
    bench_fit
);
criterion_main!(benches);
