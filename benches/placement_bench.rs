//! Placement benchmarks: sampling, height-field queries, and the full chain.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use noise::Perlin;
use std::sync::Arc;

use bevy::math::Vec2;
use meadow::gpu::HostBackend;
use meadow::placement::place_blades;
use meadow::query::QueryExecutor;
use meadow::sampler::sample_queries;
use meadow::{GrassConfig, HeightField, PlacementPipeline};

fn config(density: u32) -> GrassConfig {
    GrassConfig { bounds: [0, 64], density, ..Default::default() }
}

fn terrain() -> HeightField {
    HeightField::from_noise(Vec2::ZERO, 1.0, 65, 65, 7, 0.0, 4.0).unwrap()
}

fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_queries");
    for density in [1, 2, 4] {
        let cfg = config(density);
        let cells = cfg.cell_count().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(cells), &cells, |b, &cells| {
            b.iter(|| sample_queries(black_box(&cfg), cells).unwrap())
        });
    }
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let cfg = config(2);
    let queries = sample_queries(&cfg, cfg.cell_count().unwrap()).unwrap();
    let field = terrain();
    c.bench_function("heightfield_execute_16k", |b| b.iter(|| field.execute(black_box(&queries))));
}

fn bench_filter(c: &mut Criterion) {
    let cfg = config(2);
    let queries = sample_queries(&cfg, cfg.cell_count().unwrap()).unwrap();
    let hits = terrain().execute(&queries);
    let noise = Perlin::new(0);
    c.bench_function("place_blades_16k", |b| b.iter(|| place_blades(black_box(&hits), &noise).unwrap()));
}

fn bench_pipeline(c: &mut Criterion) {
    let field = terrain();
    let noise = Perlin::new(0);
    c.bench_function("pipeline_end_to_end_16k", |b| {
        b.iter(|| {
            let mut pipeline = PlacementPipeline::new(config(2));
            pipeline.run(&field, &noise, Arc::new(HostBackend::new())).unwrap()
        })
    });
}

criterion_group!(benches, bench_sampling, bench_queries, bench_filter, bench_pipeline);
criterion_main!(benches);
