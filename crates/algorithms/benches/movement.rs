//! Benchmarks for cost accumulation and viewsheds

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use archterra_algorithms::movement::{
    accumulate, build_cost_surface, CostPreset, CostSurfaceOptions, SearchDirection,
};
use archterra_algorithms::visibility::{viewshed, Viewpoint, ViewshedOptions};
use archterra_core::{Cell, ElevationGrid, GeoTransform, Monitor};

fn create_dem(size: usize) -> ElevationGrid {
    // Rolling terrain: a tilted plane with a repeating pattern on top
    let values = (0..size * size)
        .map(|i| {
            let (row, col) = (i / size, i % size);
            let base = (row + col) as f64;
            let variation = ((row * 7 + col * 13) % 100) as f64 / 10.0;
            base + variation
        })
        .collect();
    let transform = GeoTransform::new(0.0, size as f64 * 10.0, 10.0, -10.0);
    ElevationGrid::from_vec(values, size, size, transform, None).unwrap()
}

fn bench_accumulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulate");
    let model = CostPreset::default();

    for size in [128, 256, 512].iter() {
        let dem = create_dem(*size);
        let surface = build_cost_surface(&dem, &model, None, &CostSurfaceOptions::default()).unwrap();
        let source = Cell::new(size / 2, size / 2);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                accumulate(black_box(&surface), &[source], SearchDirection::Outbound, &Monitor::new())
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_viewshed(c: &mut Criterion) {
    let mut group = c.benchmark_group("viewshed");
    group.sample_size(10);

    for size in [64, 128, 256].iter() {
        let dem = create_dem(*size);
        let (x, y) = dem.cell_center(Cell::new(size / 2, size / 2));
        let viewpoint = Viewpoint::new(x, y);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                viewshed(black_box(&dem), &viewpoint, &ViewshedOptions::default(), &Monitor::new())
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_accumulate, bench_viewshed);
criterion_main!(benches);
