//! Performance benchmarks for Voronoi construction
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pairvor::core::CancelToken;
use pairvor::voronoi::{BoundingRegion, Point, Rectangle, Voronoi};

/// Deterministic pseudo-random points in the unit square
fn scatter(count: usize) -> Vec<Point> {
    let mut state = 0x2545f4914f6cdd1du64;
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..count).map(|_| Point::new(next(), next())).collect()
}

fn bench_cell_construction(c: &mut Criterion) {
    let region = BoundingRegion::Rect(Rectangle::new(0.0, 0.0, 1.0, 1.0));
    let normalization = Rectangle::new(0.0, 0.0, 1.0, 1.0);
    let cancel = CancelToken::new();

    let mut group = c.benchmark_group("voronoi_build");
    for count in [100usize, 1_000, 10_000] {
        let points = scatter(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &points, |b, points| {
            b.iter(|| {
                Voronoi::from_points(black_box(points), &region, normalization, 0, &cancel)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_lloyd_relaxation(c: &mut Criterion) {
    let region = BoundingRegion::Rect(Rectangle::new(0.0, 0.0, 1.0, 1.0));
    let normalization = Rectangle::new(0.0, 0.0, 1.0, 1.0);
    let cancel = CancelToken::new();
    let points = scatter(1_000);

    let mut group = c.benchmark_group("lloyd_relaxation");
    for iterations in [1usize, 3, 5] {
        group.bench_with_input(
            BenchmarkId::from_parameter(iterations),
            &iterations,
            |b, &iterations| {
                b.iter(|| {
                    Voronoi::from_points(
                        black_box(&points),
                        &region,
                        normalization,
                        iterations,
                        &cancel,
                    )
                    .unwrap()
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_cell_construction, bench_lloyd_relaxation);
criterion_main!(benches);
