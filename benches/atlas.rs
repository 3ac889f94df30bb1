use criterion::{criterion_group, criterion_main, Criterion, black_box};

use sdfatlas::grid::{
    build_grid, classify_bricks, fill_atlas, AtlasLayout, BuildConfig, GridDescriptor,
    PackingMode, SampleFormat,
};

use glam::Vec3;

fn sphere(p: Vec3) -> f32 {
    p.length() - 1.5
}

fn descriptor(cell_count: u32) -> GridDescriptor {
    GridDescriptor::new(Vec3::ZERO, 4.0 / cell_count as f32, cell_count).unwrap()
}

fn bench_classify_64(c: &mut Criterion) {
    let desc = descriptor(64);
    let mut brick_map = vec![0u16; desc.total_bricks() as usize];

    c.bench_function("classify_64", |b| {
        b.iter(|| classify_bricks(black_box(&desc), &sphere, &mut brick_map).unwrap());
    });
}

fn bench_classify_256(c: &mut Criterion) {
    let desc = descriptor(256);
    let mut brick_map = vec![0u16; desc.total_bricks() as usize];

    c.bench_function("classify_256", |b| {
        b.iter(|| classify_bricks(black_box(&desc), &sphere, &mut brick_map).unwrap());
    });
}

fn bench_fill_128(c: &mut Criterion) {
    let desc = descriptor(128);
    let mut classified = vec![0u16; desc.total_bricks() as usize];
    let report = classify_bricks(&desc, &sphere, &mut classified).unwrap();
    let layout = AtlasLayout::row_column(report.active);
    let mut atlas = vec![0u8; layout.atlas_bytes()];

    c.bench_function("fill_128", |b| {
        b.iter(|| {
            let mut brick_map = classified.clone();
            fill_atlas(
                black_box(&desc),
                &sphere,
                &layout,
                SampleFormat::Unorm8,
                &mut brick_map,
                &mut atlas,
                None,
            )
            .unwrap()
        });
    });
}

fn bench_build_row_column_128(c: &mut Criterion) {
    let config = BuildConfig {
        cell_count: 128,
        cell_size: 4.0 / 128.0,
        ..Default::default()
    };

    c.bench_function("build_row_column_128", |b| {
        b.iter(|| build_grid(black_box(&config), &sphere).unwrap());
    });
}

fn bench_build_cube_refined_128(c: &mut Criterion) {
    let config = BuildConfig {
        cell_count: 128,
        cell_size: 4.0 / 128.0,
        packing: PackingMode::Cube { bricks_per_side: None },
        refine_active_bricks: true,
        ..Default::default()
    };

    c.bench_function("build_cube_refined_128", |b| {
        b.iter(|| build_grid(black_box(&config), &sphere).unwrap());
    });
}

criterion_group!(
    benches,
    bench_classify_64,
    bench_classify_256,
    bench_fill_128,
    bench_build_row_column_128,
    bench_build_cube_refined_128,
);
criterion_main!(benches);
