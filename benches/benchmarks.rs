use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use std::{collections::HashMap, hint::black_box};

use sensorio::{
    components::{Grid, GeoTransform},
    evaluate, merge, Band, Crs, MaskedBand, Resampling, SpectralIndex,
};

const SIZE: (usize, usize) = (1830, 1830);

fn band(value: f32) -> MaskedBand {
    let grid = Grid::new(
        GeoTransform::new(600000., 60., 5000040., -60.),
        Crs::from_epsg(32633),
        SIZE,
    );
    let data = Array2::from_shape_fn(SIZE, |(row, col)| value + ((row * col) % 100) as f32 * 1e-3);
    let mask = Array2::from_shape_fn(SIZE, |(row, col)| row < 10 && col < 10);
    MaskedBand::new(data, mask, grid).unwrap()
}

fn bands() -> HashMap<Band, MaskedBand> {
    [
        (Band::Blue, band(0.04)),
        (Band::Green, band(0.05)),
        (Band::Red, band(0.1)),
        (Band::Nir, band(0.3)),
        (Band::Swir1, band(0.2)),
    ]
    .into_iter()
    .collect()
}

fn bench_indices(c: &mut Criterion) {
    let bands = bands();
    for index in [SpectralIndex::Ndvi, SpectralIndex::Evi, SpectralIndex::Bsi] {
        c.bench_function(&format!("evaluate_{index}"), |b| {
            b.iter(|| evaluate(black_box(index), &bands))
        });
    }
}

fn bench_merge(c: &mut Criterion) {
    let bands = bands();
    c.bench_function("merge", |b| {
        b.iter(|| {
            merge(
                bands
                    .iter()
                    .map(|(band, raster)| (band.to_string(), raster.clone()))
                    .collect(),
            )
        })
    });
}

fn bench_resample(c: &mut Criterion) {
    let red = band(0.1);
    c.bench_function("resample_bilinear", |b| {
        b.iter(|| red.resample(black_box(20.), Resampling::Bilinear))
    });
}

criterion_group!(benches, bench_indices, bench_merge, bench_resample);
criterion_main!(benches);
