#[path = "../util/util.rs"]
mod util;

use util::images;

use std::time::Duration;

use criterion::{
    criterion_group, criterion_main, measurement::WallTime, Bencher, BenchmarkId, Criterion,
    SamplingMode,
};
use quantbench::{
    score, Benchmark, IndexedColorCounts, KmeansOptions, PaletteSize, PixelGrid, QuantizeMethod,
    Quantizer,
};

fn bench(
    c: &mut Criterion,
    group: &str,
    mut f: impl FnMut(&mut Bencher<WallTime>, &(PaletteSize, &PixelGrid)),
) {
    let mut group = c.benchmark_group(group);
    group
        .sample_size(20)
        .noise_threshold(0.05)
        .sampling_mode(SamplingMode::Flat)
        .warm_up_time(Duration::from_millis(500));

    for (k, secs) in [
        (PaletteSize::MAX, 4),
        (PaletteSize::from_clamped(64), 3),
        (PaletteSize::from_clamped(16), 2),
        (PaletteSize::from_clamped(8), 2),
    ] {
        group.measurement_time(Duration::from_secs(secs));
        for (name, image) in images() {
            group.bench_with_input(BenchmarkId::new(k.to_string(), name), &(k, image), &mut f);
        }
    }
}

fn color_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("color_counts");
    for (name, image) in images() {
        group.bench_with_input(BenchmarkId::new("single", name), image, |b, image| {
            b.iter(|| IndexedColorCounts::new(image));
        });

        #[cfg(feature = "threads")]
        group.bench_with_input(BenchmarkId::new("par", name), image, |b, image| {
            b.iter(|| IndexedColorCounts::new_par(image));
        });
    }
}

fn kmeans(c: &mut Criterion) {
    let method = QuantizeMethod::from(KmeansOptions::new().trials(1));
    bench(c, "kmeans", |b, &(k, image)| {
        b.iter(|| method.quantize(image, k));
    });
}

fn max_coverage(c: &mut Criterion) {
    bench(c, "max_coverage", |b, &(k, image)| {
        b.iter(|| QuantizeMethod::MaxCoverage.quantize(image, k));
    });
}

fn median_cut(c: &mut Criterion) {
    bench(c, "median_cut", |b, &(k, image)| {
        b.iter(|| QuantizeMethod::MedianCut.quantize(image, k));
    });
}

fn most_frequent(c: &mut Criterion) {
    bench(c, "most_frequent", |b, &(k, image)| {
        b.iter(|| QuantizeMethod::MostFrequent.quantize(image, k));
    });
}

fn scorer(c: &mut Criterion) {
    let mut group = c.benchmark_group("score");
    for (name, image) in images() {
        let quantized = QuantizeMethod::MedianCut
            .quantize(image, PaletteSize::from_clamped(16))
            .expect("median cut does not fail")
            .image;

        for size in [100, score::COMPARISON_SIZE, 400] {
            group.bench_with_input(
                BenchmarkId::new(size.to_string(), name),
                &(image, &quantized),
                |b, &(image, quantized)| {
                    b.iter(|| score::compare(image, quantized, size));
                },
            );
        }
    }
}

fn benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("benchmark");
    group.sample_size(10).measurement_time(Duration::from_secs(10));

    for (name, image) in images() {
        for parallel in [false, true] {
            let runner = Benchmark::new().parallel(parallel);
            let id = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(BenchmarkId::new(id, name), image, |b, image| {
                b.iter(|| runner.run(image, 16));
            });
        }
    }
}

criterion_group!(
    benches,
    color_counts,
    kmeans,
    max_coverage,
    median_cut,
    most_frequent,
    scorer,
    benchmark
);
criterion_main!(benches);
