//! Detector throughput benchmark
//!
//! Measures the per-tick cost of the analysis stages on synthetic layouts:
//!
//! 1. `QuadTree::update` - normalize and rebuild the index
//! 2. `HoughTransform::detect_patterns` - vote, peak search, line members
//! 3. `SequenceDetector::detect` - predictor fit over one window
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench hough_transform
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memlens::hough::HoughTransform;
use memlens::platform::{PlatformAdapter, SyntheticAdapter, SyntheticLayout};
use memlens::quadtree::QuadTree;
use memlens::region::{normalize_regions, MemoryRegion};
use memlens::sequence::SequenceDetector;

fn regions(layout: SyntheticLayout) -> Vec<MemoryRegion> {
    let mut regions = SyntheticAdapter::new(layout)
        .memory_regions()
        .unwrap_or_default();
    normalize_regions(&mut regions);
    regions
}

fn bench_hough(c: &mut Criterion) {
    let mut group = c.benchmark_group("hough_detect_patterns");
    let hough = HoughTransform::default();

    for count in [100, 1_000, 10_000] {
        let sequential = regions(SyntheticLayout::Sequential {
            count,
            block_size: 4096,
        });
        group.bench_with_input(BenchmarkId::new("sequential", count), &sequential, |b, r| {
            b.iter(|| black_box(hough.detect_patterns(black_box(r))));
        });

        let random = regions(SyntheticLayout::Random { count, seed: 42 });
        group.bench_with_input(BenchmarkId::new("random", count), &random, |b, r| {
            b.iter(|| black_box(hough.detect_patterns(black_box(r))));
        });
    }
    group.finish();
}

fn bench_quadtree_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("quadtree_update");

    for count in [1_000, 10_000, 100_000] {
        let batch = regions(SyntheticLayout::Random { count, seed: 7 });
        let mut tree = QuadTree::default();
        group.bench_with_input(BenchmarkId::from_parameter(count), &batch, |b, batch| {
            b.iter(|| {
                let mut batch = batch.clone();
                tree.update(&mut batch);
                black_box(tree.len())
            });
        });
    }
    group.finish();
}

fn bench_sequence(c: &mut Criterion) {
    let detector = SequenceDetector::default();
    let cyclic = regions(SyntheticLayout::Cyclic {
        count: 1_000,
        slots: 8,
        block_size: 4096,
    });

    c.bench_function("sequence_detect_cyclic", |b| {
        b.iter(|| black_box(detector.detect(black_box(&cyclic))));
    });
}

criterion_group!(benches, bench_hough, bench_quadtree_update, bench_sequence);
criterion_main!(benches);
