//! # Level Curve Benchmarks
//!
//! Run with: `cargo bench -p stride-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use stride_core::{LevelCurve, ProfileId, ProgressionService};

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_resolve");

    for xp in [0u64, 812, 1_000_000, u64::MAX].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(xp), xp, |b, &xp| {
            b.iter(|| black_box(LevelCurve::resolve(black_box(xp))));
        });
    }

    group.finish();
}

fn bench_threshold(c: &mut Criterion) {
    c.bench_function("level_threshold_50", |b| {
        b.iter(|| black_box(LevelCurve::threshold(black_box(50))));
    });
}

fn bench_save_sequence(c: &mut Criterion) {
    c.bench_function("save_100_opportunities", |b| {
        b.iter(|| {
            let mut svc = ProgressionService::new(ProfileId::new("bench").expect("id"));
            for i in 0..100 {
                let _ = svc.save(&format!("opp-{i}"));
            }
            black_box(svc.state().xp())
        });
    });
}

criterion_group!(benches, bench_resolve, bench_threshold, bench_save_sequence);
criterion_main!(benches);
