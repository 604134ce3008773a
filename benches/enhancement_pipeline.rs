use beamform_core::processing::noise_reduction::{NoiseTracker, NoiseTrackerParams, NoiseTrackerState};
use beamform_core::processing::segmentation::{framing, overlap_add};
use beamform_core::processing::MatrixCache;
use beamform_core::{ArrayGeometry, EnhancementPipeline, FixedDirectionEstimator, SessionConfig, Window};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const CHANNEL_COUNTS: &[usize] = &[1, 2, 4, 8];
const WINDOW_SIZES: &[usize] = &[1024, 4096];
const FRAME_SIZES: &[usize] = &[256, 512, 1024];

fn noise(len: usize, seed: u64) -> Vec<i16> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-4000..4000)).collect()
}

fn benchmark_enhance_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("enhance_window");

    for &window_size in WINDOW_SIZES {
        for &channels in CHANNEL_COUNTS {
            group.throughput(Throughput::Elements((window_size * channels) as u64));
            group.bench_with_input(
                BenchmarkId::new("beamform", format!("{}ch_{}win", channels, window_size)),
                &(channels, window_size),
                |b, &(channels, window_size)| {
                    let config = SessionConfig {
                        channel_count: channels,
                        window_size,
                        ..SessionConfig::default()
                    };
                    let mut pipeline = EnhancementPipeline::new(
                        &config,
                        Arc::new(FixedDirectionEstimator::new(30.0, 0.0)),
                        ArrayGeometry::linear(channels, 0.05),
                        None,
                    )
                    .unwrap();
                    let window = Window::from_interleaved(0, &noise(window_size * channels, 1), channels, false);

                    b.iter(|| pipeline.enhance_window(black_box(&window)).unwrap());
                },
            );
        }
    }

    // Post-filter on top of the default four channel array
    group.bench_function("beamform_post_filter_4ch_4096win", |b| {
        let mut config = SessionConfig::default();
        config.post_filter.enabled = true;
        let mut pipeline = EnhancementPipeline::new(
            &config,
            Arc::new(FixedDirectionEstimator::default()),
            ArrayGeometry::default(),
            None,
        )
        .unwrap();
        let window = Window::from_interleaved(0, &noise(4096 * 4, 2), 4, false);

        b.iter(|| pipeline.enhance_window(black_box(&window)).unwrap());
    });

    group.finish();
}

fn benchmark_noise_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("noise_tracker");

    for &frame_size in FRAME_SIZES {
        let bins = frame_size;
        group.bench_with_input(BenchmarkId::new("track", bins), &bins, |b, &bins| {
            let tracker = NoiseTracker::new(NoiseTrackerParams::default(), Arc::new(MatrixCache::new()));
            let mut rng = StdRng::seed_from_u64(3);
            let pyy: Vec<f64> = (0..bins).map(|_| rng.gen_range(0.1..10.0)).collect();
            let (_, warm) = tracker.track(&pyy, NoiseTrackerState::default());

            b.iter(|| tracker.track(black_box(&pyy), warm.clone()));
        });
    }

    group.finish();
}

fn benchmark_segmentation(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation");
    let signal: Vec<f64> = noise(4096, 4).into_iter().map(f64::from).collect();

    for &frame_size in FRAME_SIZES {
        group.bench_with_input(BenchmarkId::new("framing", frame_size), &frame_size, |b, &frame_size| {
            b.iter(|| framing(black_box(&signal), frame_size, 0.5));
        });

        let frames = framing(&signal, frame_size, 0.5);
        group.bench_with_input(BenchmarkId::new("overlap_add", frame_size), &frames, |b, frames| {
            b.iter(|| overlap_add(black_box(frames), 0.5));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_enhance_window,
    benchmark_noise_tracker,
    benchmark_segmentation
);
criterion_main!(benches);
