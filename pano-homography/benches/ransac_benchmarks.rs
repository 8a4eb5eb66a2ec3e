use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Point2;
use pano_core::{Correspondence, Homography, RansacParams};
use pano_homography::{dlt, HomographyValidator, LmedsEstimator, RansacEstimator};

/// Deterministic correspondence set: a grid mapped through `h` with every
/// `outlier_every`-th destination pushed far off
fn create_pairs(h: &Homography, n: usize, outlier_every: usize) -> Vec<Correspondence> {
    let cols = (n as f64).sqrt().ceil() as usize;
    (0..n)
        .map(|i| {
            let src = Point2::new((i % cols) as f64 * 11.3, (i / cols) as f64 * 9.7);
            let mut dst = h.project(&src).unwrap();
            if outlier_every > 0 && i % outlier_every == 0 {
                dst.x += 97.0 + (i % 13) as f64 * 7.0;
                dst.y -= 41.0 + (i % 5) as f64 * 3.0;
            }
            Correspondence::new(src, dst)
        })
        .collect()
}

fn reference() -> Homography {
    Homography::from_row_slice(&[0.98, 0.02, -180.0, -0.03, 1.01, 6.0, 2e-5, -1e-5, 1.0])
}

/// Benchmark RANSAC over growing inputs and outlier rates
fn bench_ransac(c: &mut Criterion) {
    let mut group = c.benchmark_group("ransac");
    let h = reference();
    let estimator = RansacEstimator::new(RansacParams::default()).with_seed(42);

    for &n in &[100usize, 500, 2000] {
        for &(label, every) in &[("clean", 0usize), ("25pct", 4), ("50pct", 2)] {
            let pairs = create_pairs(&h, n, every);
            group.bench_with_input(BenchmarkId::new(label, n), &pairs, |b, pairs| {
                b.iter(|| black_box(estimator.estimate(black_box(pairs))))
            });
        }
    }

    group.finish();
}

/// Benchmark the estimator building blocks
fn bench_stages(c: &mut Criterion) {
    let h = reference();
    let pairs = create_pairs(&h, 500, 0);
    let sample: [Correspondence; 4] = [pairs[0], pairs[21], pairs[470], pairs[499]];
    let mut group = c.benchmark_group("stages");

    group.bench_function("solve_minimal", |b| {
        b.iter(|| black_box(dlt::solve_minimal(black_box(&sample))))
    });

    group.bench_function("solve_least_squares_500", |b| {
        b.iter(|| black_box(dlt::solve_least_squares(black_box(&pairs))))
    });

    group.bench_function("lmeds_500", |b| {
        let lmeds = LmedsEstimator::new(RansacParams { max_iterations: 200, ..Default::default() }).with_seed(42);
        b.iter(|| black_box(lmeds.estimate(black_box(&pairs))))
    });

    let result = RansacEstimator::default().with_seed(1).estimate(&pairs);
    let validator = HomographyValidator::default();
    group.bench_function("validate", |b| {
        b.iter(|| black_box(validator.validate(black_box(&result))))
    });

    group.finish();
}

criterion_group!(benches, bench_ransac, bench_stages);
criterion_main!(benches);
