use ndarray::Array2;
use std::{collections::HashMap, fmt::Debug, path::Path};

use crate::{
    components::{bounds::Grid, transforms::GeoTransform},
    crs_geo::Crs,
    errors::Result,
};

/// Raster file on disk, bands indexed from 0.
pub trait File: Debug + Sized {
    fn open<P: AsRef<Path>>(path: P) -> Result<Self>;
    fn description(&self) -> Result<String>;
    /// `(rows, cols)`
    fn shape(&self) -> (usize, usize);
    fn crs(&self) -> Crs;
    fn transform(&self) -> Result<GeoTransform>;
    fn num_bands(&self) -> usize;
    fn band_description(&self, index: usize) -> Result<String>;
    fn nodata(&self, index: usize) -> Result<Option<f64>>;
    fn read_band(&self, index: usize) -> Result<Array2<f32>>;
    fn metadata(&self) -> HashMap<String, String>;

    fn grid(&self) -> Result<Grid> {
        Ok(Grid::new(self.transform()?, self.crs(), self.shape()))
    }

    /// Index of the first band whose description contains `pattern`, ignoring case.
    fn find_band(&self, pattern: &str) -> Result<Option<usize>> {
        let pattern = pattern.to_ascii_lowercase();
        for index in 0..self.num_bands() {
            if self
                .band_description(index)?
                .to_ascii_lowercase()
                .contains(&pattern)
            {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}
