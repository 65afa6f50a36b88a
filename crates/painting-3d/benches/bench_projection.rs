use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use painting_3d::{project_points, RawPoint};
use painting_calib::CalibrationMatrices;
use rand::Rng;

fn kitti_calibration() -> CalibrationMatrices {
    CalibrationMatrices::new(
        [
            [721.5377, 0.0, 609.5593, 44.85728],
            [0.0, 721.5377, 172.854, 0.2163791],
            [0.0, 0.0, 1.0, 0.002745884],
        ],
        [
            [0.9999239, 0.00983776, -0.007445048],
            [-0.009869795, 0.9999421, -0.004278459],
            [0.007402527, 0.004351614, 0.9999631],
        ],
        [
            [0.007533745, -0.9999714, -0.000616602, -0.004069766],
            [0.01480249, 0.0007280733, -0.9998902, -0.07631618],
            [0.9998621, 0.00752379, 0.01480755, -0.2717806],
        ],
    )
}

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("project_points");
    let calib = kitti_calibration();
    let mut rng = rand::rng();

    for num_points in [10_000, 60_000, 120_000].iter() {
        let points: Vec<RawPoint> = (0..*num_points)
            .map(|_| {
                RawPoint::new(
                    rng.random_range(-80.0..80.0),
                    rng.random_range(-80.0..80.0),
                    rng.random_range(-3.0..3.0),
                    rng.random_range(0.0..1.0),
                )
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::new("composite", num_points),
            &points,
            |b, points| b.iter(|| black_box(project_points(black_box(points), &calib))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_projection);
criterion_main!(benches);
