use log::{debug, info, warn};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};
use std::{fmt::Debug, path::Path};

use crate::{
    bands::{Band, BandKind},
    components::{backends::gdal_backend, bounds::Grid, raster::MaskedBand},
    errors::{Result, SensorioError},
    indices::SpectralIndex,
};

/// Reflectance like layers are stored as `value * SCALE` in `u16`.
pub const UINT16_SCALE: f32 = 10_000.;
/// Valid values below this refuse the `u16` encoding.
const UINT16_MIN_VALUE: f32 = -0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackEncoding {
    #[default]
    Float32,
    ScaledUint16,
}

/// Layers on one grid with a single shared validity mask.
#[derive(Clone, PartialEq)]
pub struct MaskedStack {
    data: Array3<f32>,
    mask: Array3<bool>,
    grid: Grid,
    labels: Vec<String>,
}

impl Debug for MaskedStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskedStack")
            .field("labels", &self.labels)
            .field("shape", &self.grid.shape)
            .field("resolution", &self.grid.resolution())
            .field("crs", &self.grid.crs)
            .finish()
    }
}

/// Concatenates `rasters` in the given order.
///
/// Any layer being invalid at a cell invalidates the whole stack there.
pub fn merge(rasters: Vec<(String, MaskedBand)>) -> Result<MaskedStack> {
    let grid = rasters
        .first()
        .map(|(_, band)| band.grid().clone())
        .ok_or(SensorioError::EmptyStack)?;
    for (label, band) in rasters.iter() {
        grid.ensure_matches(band.grid()).map_err(|err| match err {
            SensorioError::GridMismatch(reason) => {
                SensorioError::GridMismatch(format!("layer {label}: {reason}"))
            }
            err => err,
        })?;
    }

    let union = rasters
        .iter()
        .fold(Array2::from_elem(grid.shape, false), |mut union, (_, band)| {
            Zip::from(&mut union)
                .and(band.mask())
                .for_each(|masked, band_masked| *masked |= *band_masked);
            union
        });
    let views: Vec<ArrayView2<f32>> = rasters.iter().map(|(_, band)| band.data()).collect();
    let data = ndarray::stack(Axis(0), &views)?;
    let mask = Array3::from_shape_fn(data.dim(), |(_, row, col)| union[[row, col]]);
    let labels = rasters.into_iter().map(|(label, _)| label).collect();

    let stack = MaskedStack {
        data,
        mask,
        grid,
        labels,
    };
    info!("new {stack:?}");
    Ok(stack)
}

impl MaskedStack {
    pub fn data(&self) -> ArrayView3<f32> {
        self.data.view()
    }

    pub fn mask(&self) -> ArrayView3<bool> {
        self.mask.view()
    }

    /// Mask shared by every layer.
    pub fn layer_mask(&self) -> ArrayView2<bool> {
        self.mask.index_axis(Axis(0), 0)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn num_layers(&self) -> usize {
        self.labels.len()
    }

    pub fn layer(&self, label: &str) -> Option<ArrayView2<f32>> {
        self.labels
            .iter()
            .position(|layer| layer == label)
            .map(|index| self.data.index_axis(Axis(0), index))
    }

    /// Values with masked cells set to the export nodata value 0.
    pub fn to_export(&self) -> Array3<f32> {
        Zip::from(&self.data)
            .and(&self.mask)
            .map_collect(|value, masked| if *masked { 0. } else { *value })
    }

    /// `u16` values, `None` when the valid values do not fit.
    ///
    /// Satellite bands and indices whose valid values stay below
    /// 6.5535 are multiplied by [UINT16_SCALE], other layers are only
    /// rounded. Small negatives down to -0.1 are clipped to 0.
    pub fn to_scaled_u16(&self) -> Option<Array3<u16>> {
        let mask = self.layer_mask();
        let ranges: Vec<(f32, f32)> = self
            .data
            .axis_iter(Axis(0))
            .map(|layer| valid_range(layer, mask))
            .collect();
        if ranges.iter().any(|(min, _)| *min < UINT16_MIN_VALUE) {
            return None;
        }
        let scales = self
            .labels
            .iter()
            .zip(&ranges)
            .map(|(label, (_, max))| {
                if is_reflectance_like(label) && max * UINT16_SCALE <= u16::MAX as f32 {
                    Some(UINT16_SCALE)
                } else if *max <= u16::MAX as f32 {
                    Some(1.)
                } else {
                    None
                }
            })
            .collect::<Option<Vec<f32>>>()?;
        debug!("u16 scales of {:?}: {scales:?}", self.labels);
        Some(Array3::from_shape_fn(
            self.data.dim(),
            |(layer, row, col)| {
                if self.mask[[layer, row, col]] {
                    0
                } else {
                    (self.data[[layer, row, col]].max(0.) * scales[layer]).round() as u16
                }
            },
        ))
    }

    /// Writes a GeoTIFF, one layer per label, nodata declared as 0.
    pub fn write(&self, path: impl AsRef<Path>, encoding: StackEncoding) -> Result<StackEncoding> {
        match encoding {
            StackEncoding::ScaledUint16 => match self.to_scaled_u16() {
                Some(scaled) => {
                    gdal_backend::write_layers(path, &scaled, &self.grid, &self.labels)?;
                    Ok(StackEncoding::ScaledUint16)
                }
                None => {
                    warn!("{self:?} does not fit scaled u16, writing float32");
                    self.write(path, StackEncoding::Float32)
                }
            },
            StackEncoding::Float32 => {
                gdal_backend::write_layers(path, &self.to_export(), &self.grid, &self.labels)?;
                Ok(StackEncoding::Float32)
            }
        }
    }
}

/// `(min, max)` of the valid cells of `layer`.
fn valid_range(layer: ArrayView2<f32>, mask: ArrayView2<bool>) -> (f32, f32) {
    Zip::from(&layer).and(&mask).fold(
        (f32::INFINITY, f32::NEG_INFINITY),
        |(min, max), value, masked| {
            if *masked {
                (min, max)
            } else {
                (min.min(*value), max.max(*value))
            }
        },
    )
}

/// Satellite bands and spectral indices, elevation and flags are not.
fn is_reflectance_like(label: &str) -> bool {
    match label.parse::<Band>() {
        Ok(band) => matches!(band.kind(), BandKind::Optical | BandKind::Sar),
        Err(_) => label.parse::<SpectralIndex>().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{components::transforms::GeoTransform, crs_geo::Crs};
    use ndarray::array;
    use rstest::{fixture, rstest};

    #[fixture]
    fn grid() -> Grid {
        Grid::new(
            GeoTransform::new(0., 10., 30., -10.),
            Crs::from_epsg(32631),
            (3, 3),
        )
    }

    fn band(grid: &Grid, value: f32, mask: Array2<bool>) -> MaskedBand {
        MaskedBand::new(Array2::from_elem(grid.shape, value), mask, grid.clone()).unwrap()
    }

    #[rstest]
    fn mask_is_union_and_order_is_kept(grid: Grid) {
        let m1 = array![[true, false, false], [false, false, false], [false, false, true]];
        let m2 = array![[false, false, false], [false, true, false], [false, false, true]];
        let stack = merge(vec![
            ("NDVI".into(), band(&grid, 0.5, m1.clone())),
            ("GREEN".into(), band(&grid, 0.1, m2.clone())),
        ])
        .unwrap();

        assert_eq!(stack.labels(), ["NDVI", "GREEN"]);
        assert_eq!(stack.layer("GREEN").unwrap()[[0, 0]], 0.1);
        let expected = Zip::from(&m1).and(&m2).map_collect(|a, b| *a | *b);
        for layer in stack.mask().axis_iter(Axis(0)) {
            assert_eq!(layer, expected);
        }
    }

    #[test]
    fn empty_merge() {
        assert!(matches!(merge(Vec::new()), Err(SensorioError::EmptyStack)));
    }

    #[rstest]
    fn mismatched_layers(grid: Grid) {
        let mut other = grid.clone();
        other.shape = (3, 4);
        let result = merge(vec![
            ("RED".into(), MaskedBand::constant(0.1, grid)),
            ("NIR".into(), MaskedBand::constant(0.3, other)),
        ]);
        assert!(matches!(
            result,
            Err(SensorioError::GridMismatch(reason)) if reason.starts_with("layer NIR")
        ));
    }

    #[rstest]
    fn scaled_u16_clips_small_negatives(grid: Grid) {
        let data = array![[-0.05, 0.1, 0.2], [0.3, 0.4, 0.5], [0.6, 0.7, 6.5]];
        let stack = merge(vec![(
            "RED".into(),
            MaskedBand::new(data, Array2::from_elem((3, 3), false), grid).unwrap(),
        )])
        .unwrap();
        let scaled = stack.to_scaled_u16().unwrap();
        assert_eq!(scaled[[0, 0, 0]], 0);
        assert_eq!(scaled[[0, 0, 1]], 1000);
        assert_eq!(scaled[[0, 2, 2]], 65000);
    }

    #[rstest]
    fn scaled_u16_refuses_negatives(grid: Grid) {
        let stack = merge(vec![
            ("NDVI".into(), MaskedBand::constant(-0.2, grid.clone())),
            ("DEM".into(), MaskedBand::constant(120., grid)),
        ])
        .unwrap();
        assert!(stack.to_scaled_u16().is_none());
    }

    #[rstest]
    fn scaling_is_decided_per_layer(grid: Grid) {
        let stack = merge(vec![
            ("NDVI".into(), MaskedBand::constant(0.5, grid.clone())),
            ("RED".into(), MaskedBand::constant(7., grid.clone())),
            ("DEM".into(), MaskedBand::constant(350.4, grid.clone())),
            ("HILLSHADE".into(), MaskedBand::constant(180., grid.clone())),
            ("CLOUDS".into(), MaskedBand::constant(1., grid)),
        ])
        .unwrap();
        let scaled = stack.to_scaled_u16().unwrap();
        let values: Vec<u16> = (0..5).map(|layer| scaled[[layer, 1, 1]]).collect();
        assert_eq!(values, vec![5000, 7, 350, 180, 1]);
    }

    #[rstest]
    fn unscaled_layer_beyond_u16(grid: Grid) {
        let stack = merge(vec![
            ("RED".into(), MaskedBand::constant(0.1, grid.clone())),
            ("DEM".into(), MaskedBand::constant(70_000., grid)),
        ])
        .unwrap();
        assert!(stack.to_scaled_u16().is_none());
    }
}
