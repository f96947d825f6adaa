pub mod resample;
pub mod speckle;
pub mod stack;
pub mod terrain;

use log::debug;
use ndarray::{Array2, ArrayView2, Zip};
use std::fmt::Debug;

use crate::{
    components::bounds::Grid,
    errors::{Result, SensorioError},
};

pub use resample::Resampling;
pub use stack::{merge, MaskedStack, StackEncoding};

/// Georeferenced band with an explicit validity mask.
///
/// `mask` is `true` where the sample is nodata. Values under the mask
/// carry no meaning, the 0 nodata convention only applies on export.
#[derive(Clone, PartialEq)]
pub struct MaskedBand {
    data: Array2<f32>,
    mask: Array2<bool>,
    grid: Grid,
}

impl Debug for MaskedBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskedBand")
            .field("shape", &self.grid.shape)
            .field("resolution", &self.grid.resolution())
            .field("crs", &self.grid.crs)
            .field("masked", &self.masked_count())
            .finish()
    }
}

impl MaskedBand {
    pub fn new(data: Array2<f32>, mask: Array2<bool>, grid: Grid) -> Result<Self> {
        if data.dim() != grid.shape || mask.dim() != grid.shape {
            return Err(SensorioError::GridMismatch(format!(
                "data {:?} and mask {:?} must have grid shape {:?}",
                data.dim(),
                mask.dim(),
                grid.shape
            )));
        }
        Ok(Self { data, mask, grid })
    }

    /// Masks non finite samples and, when given, samples equal to `nodata`.
    pub fn from_raw(data: Array2<f32>, nodata: Option<f32>, grid: Grid) -> Result<Self> {
        let mask = data.mapv(|value| !value.is_finite() || Some(value) == nodata);
        Self::new(data, mask, grid)
    }

    /// Band with every cell valid and equal to `value`.
    pub fn constant(value: f32, grid: Grid) -> Self {
        Self {
            data: Array2::from_elem(grid.shape, value),
            mask: Array2::from_elem(grid.shape, false),
            grid,
        }
    }

    pub fn data(&self) -> ArrayView2<f32> {
        self.data.view()
    }

    pub fn mask(&self) -> ArrayView2<bool> {
        self.mask.view()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn shape(&self) -> (usize, usize) {
        self.grid.shape
    }

    pub fn into_parts(self) -> (Array2<f32>, Array2<bool>, Grid) {
        (self.data, self.mask, self.grid)
    }

    pub fn masked_count(&self) -> usize {
        self.mask.iter().filter(|masked| **masked).count()
    }

    /// Valid values, in row major order.
    pub fn valid_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data
            .iter()
            .zip(self.mask.iter())
            .filter_map(|(value, masked)| (!masked).then_some(*value))
    }

    /// Further masks cells where `mask` is set.
    pub fn with_mask(mut self, mask: ArrayView2<bool>) -> Result<Self> {
        if mask.dim() != self.grid.shape {
            return Err(SensorioError::GridMismatch(format!(
                "mask {:?} does not match band {:?}",
                mask.dim(),
                self.grid.shape
            )));
        }
        Zip::from(&mut self.mask)
            .and(&mask)
            .for_each(|masked, extra| *masked |= *extra);
        Ok(self)
    }

    /// Elementwise map over values, non finite results are masked.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        let data = self.data.mapv(f);
        let mut mask = self.mask.clone();
        Zip::from(&mut mask)
            .and(&data)
            .for_each(|masked, value| *masked |= !value.is_finite());
        Self {
            data,
            mask,
            grid: self.grid.clone(),
        }
    }

    /// Elementwise binary operation.
    ///
    /// The result is invalid where either input is invalid
    /// or where `f` yields a non finite value.
    pub fn zip_with(&self, rhs: &MaskedBand, f: impl Fn(f32, f32) -> f32) -> Result<Self> {
        self.grid.ensure_matches(&rhs.grid)?;
        let data = Zip::from(&self.data).and(&rhs.data).map_collect(|l, r| f(*l, *r));
        let mask = Zip::from(&self.mask)
            .and(&rhs.mask)
            .and(&data)
            .map_collect(|l, r, value| *l | *r | !value.is_finite());
        Ok(Self {
            data,
            mask,
            grid: self.grid.clone(),
        })
    }

    /// Values with masked cells set to the export nodata value 0.
    pub fn to_export(&self) -> Array2<f32> {
        debug!("export {self:?}");
        Zip::from(&self.data)
            .and(&self.mask)
            .map_collect(|value, masked| if *masked { 0. } else { *value })
    }
}
