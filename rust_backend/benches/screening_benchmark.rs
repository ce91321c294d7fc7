use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use gfcat_rust::algorithms::dedup::dbscan;
use gfcat_rust::algorithms::flares::FlareCharacterizer;
use gfcat_rust::algorithms::stats::anderson_darling;
use gfcat_rust::config::PipelineConfig;
use gfcat_rust::core::domain::{Band, ExposureTable, LightCurve, ObjectId, SourcePosition, VisitId};
use gfcat_rust::preprocessing::pipeline::VisitPipeline;

/// Deterministic pseudo-noise in [-0.5, 0.5)
fn noise(i: usize) -> f64 {
    ((i.wrapping_mul(2_654_435_761) % 1000) as f64) / 1000.0 - 0.5
}

fn synthetic_curve(id: usize, n_bins: usize) -> LightCurve {
    let base = 0.5 + (id % 50) as f64 * 0.2;
    let mut cps: Vec<f64> = (0..n_bins).map(|i| base + 0.1 * noise(id * n_bins + i)).collect();
    if id % 10 == 0 {
        for c in cps.iter_mut().skip(n_bins / 2).take(3) {
            *c += 5.0;
        }
    }
    let err = cps.iter().map(|c| (c.abs() * 29.0).sqrt() / 29.0).collect();
    let x = (id % 40) as f64 * 75.0;
    let y = (id / 40) as f64 * 75.0;
    LightCurve::new(ObjectId(id as i64), SourcePosition::pixel(x, y), cps, err).unwrap()
}

fn bench_visit_screening(c: &mut Criterion) {
    let mut group = c.benchmark_group("visit_screening");
    let exposure = ExposureTable::uniform(0.0, 30.0, 29.0, 60).unwrap();
    let pipeline = VisitPipeline::new();

    for &n_objects in &[100usize, 1000, 5000] {
        let curves: Vec<LightCurve> = (0..n_objects).map(|i| synthetic_curve(i, 60)).collect();
        group.bench_with_input(BenchmarkId::new("screen", n_objects), &curves, |b, curves| {
            b.iter(|| {
                pipeline.screen_light_curves(
                    VisitId(1),
                    Band::Nuv,
                    black_box(curves),
                    &exposure,
                )
            });
        });
    }

    group.finish();
}

fn bench_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");

    let sample: Vec<f64> = (0..200).map(noise).collect();
    group.bench_function("anderson_darling_200", |b| {
        b.iter(|| anderson_darling(black_box(&sample)));
    });

    let points: Vec<(f64, f64)> = (0..2000)
        .map(|i| ((i % 50) as f64 * 30.0, (i / 50) as f64 * 30.0))
        .collect();
    group.bench_function("dbscan_2000", |b| {
        b.iter(|| dbscan(black_box(&points), 40.0, 1));
    });

    group.finish();
}

fn bench_flares(c: &mut Criterion) {
    let mut group = c.benchmark_group("flares");
    let config = PipelineConfig::default();
    let characterizer = FlareCharacterizer::new(config.flare.clone(), config.photometry.clone());
    let exposure = ExposureTable::uniform(0.0, 30.0, 29.0, 120).unwrap();
    let lc = synthetic_curve(0, 120)
        .with_aperture_correction(12.8, Band::Nuv)
        .unwrap();

    group.bench_function("characterize_120", |b| {
        b.iter(|| characterizer.characterize(black_box(&lc), &exposure, Some(10.0)));
    });

    group.finish();
}

criterion_group!(benches, bench_visit_screening, bench_statistics, bench_flares);
criterion_main!(benches);
