//! Benchmarks for the packing engine.
//!
//! Measures exact overlap, indexed overlap totals and annealing throughput
//! at various scales.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use treepack_d2::{anneal, overlap_area, scoring, seed, AnnealConfig, Placement};

fn bench_overlap_area(c: &mut Criterion) {
    let a = Placement::new(0, 0.0, 0.0, 0.0);
    let touching = Placement::new(1, 0.35, 0.8, 180.0);
    let crossing = Placement::new(1, 0.2, 0.1, 37.0);

    c.bench_function("overlap_area_touching", |b| {
        b.iter(|| overlap_area(black_box(&a), black_box(&touching)))
    });
    c.bench_function("overlap_area_crossing", |b| {
        b.iter(|| overlap_area(black_box(&a), black_box(&crossing)))
    });
}

fn bench_total_overlap(c: &mut Criterion) {
    let mut group = c.benchmark_group("total_overlap");

    for &n in &[10, 50, 200] {
        let config = seed::lattice(n);
        group.bench_with_input(BenchmarkId::new("lattice", n), &config, |b, cfg| {
            b.iter(|| scoring::total_overlap(black_box(cfg)))
        });
    }
    group.finish();
}

fn bench_annealing(c: &mut Criterion) {
    let mut group = c.benchmark_group("annealing");
    group.sample_size(10);

    let config = AnnealConfig::default()
        .with_temperatures(0.01, 0.0005)
        .with_steps(5, 200)
        .with_log_freq(0);

    for &n in &[10, 30] {
        let initial = seed::lattice(n);
        group.bench_with_input(BenchmarkId::new("strict", n), &initial, |b, init| {
            b.iter(|| anneal::solve_strict(black_box(init), &config))
        });
        group.bench_with_input(BenchmarkId::new("penalty", n), &initial, |b, init| {
            b.iter(|| anneal::solve_penalty(black_box(init), &config))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_overlap_area, bench_total_overlap, bench_annealing);
criterion_main!(benches);
