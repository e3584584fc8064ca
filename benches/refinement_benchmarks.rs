use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bgcutout::{
    builders::heuristic_builder,
    refine::{gaussian, median, open, BorderMode},
    BackgroundRemovalProcessor, Mask, PixelBuffer, RefinementPlan, RemovalConfig, Strategy,
};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

const SIZES: [u32; 3] = [128, 512, 1024];

fn synthetic_image(size: u32) -> PixelBuffer {
    let radius = (size / 3) as i64;
    let center = (size / 2) as i64;
    PixelBuffer::from_fn(size, size, |x, y| {
        let dx = x as i64 - center;
        let dy = y as i64 - center;
        if dx * dx + dy * dy < radius * radius {
            [40, 90 + (x % 7) as u8 * 10, 200, 255]
        } else {
            [245, 245 - (y % 5) as u8, 240, 255]
        }
    })
    .unwrap()
}

fn soft_mask(size: u32) -> Mask {
    let center = size as f32 / 2.0;
    Mask::from_fn(size, size, |x, y| {
        let d = ((x as f32 - center).powi(2) + (y as f32 - center).powi(2)).sqrt();
        (1.0 - d / center).clamp(0.0, 1.0)
    })
}

fn benchmark_refinement_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("refinement_primitives");

    for size in SIZES {
        let mask = soft_mask(size);
        group.bench_with_input(BenchmarkId::new("open_r2", size), &mask, |b, mask| {
            b.iter(|| black_box(open(mask, 2, BorderMode::Clamp)));
        });
        group.bench_with_input(BenchmarkId::new("median_x2", size), &mask, |b, mask| {
            b.iter(|| black_box(median(mask, 2, BorderMode::Retain)));
        });
        group.bench_with_input(BenchmarkId::new("gaussian_r3", size), &mask, |b, mask| {
            b.iter(|| black_box(gaussian(mask, 3, BorderMode::Clamp)));
        });
    }

    group.finish();
}

fn benchmark_learned_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("learned_refinement_plan");
    let config = RemovalConfig::builder().hair_protection(true).build().unwrap();

    for size in SIZES {
        let pixels = synthetic_image(size);
        let mask = soft_mask(size);
        let plan = RefinementPlan::for_strategy(Strategy::External, &config, (size, size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &(pixels, mask), |b, (pixels, mask)| {
            b.iter(|| black_box(plan.apply(mask, pixels).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_mask_builders(c: &mut Criterion) {
    let mut group = c.benchmark_group("mask_builders");
    group.sample_size(20);
    let config = RemovalConfig::default();
    let pixels = synthetic_image(512);

    for strategy in [
        Strategy::BorderColor,
        Strategy::FloodFill,
        Strategy::RegionGrowing,
        Strategy::ColorRange,
        Strategy::GrabCut,
    ] {
        let builder = heuristic_builder(strategy, &config).unwrap();
        group.bench_function(strategy.to_string(), |b| {
            b.iter(|| black_box(builder.build(&pixels).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_end_to_end(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let processor = BackgroundRemovalProcessor::new(RemovalConfig::default()).unwrap();
    let token = CancellationToken::new();
    let mut group = c.benchmark_group("end_to_end_auto");
    group.sample_size(10);

    for size in [256, 1024] {
        let pixels = synthetic_image(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &pixels, |b, pixels| {
            b.iter(|| {
                rt.block_on(async { black_box(processor.process_pixels(pixels, &token).await.unwrap()) })
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_refinement_primitives,
    benchmark_learned_plan,
    benchmark_mask_builders,
    benchmark_end_to_end
);
criterion_main!(benches);
