//! The contract every opened product fulfils.
//!
//! Variants only describe how to read their native bands; loading,
//! index evaluation, stacking and elevation warping are shared.

use itertools::Itertools;
use log::{debug, info};
use rayon::prelude::*;
use std::{collections::HashMap, fmt::Debug, path::Path, path::PathBuf};

use crate::{
    bands::{Band, BandKind},
    components::{
        backends::gdal_backend::GdalFile,
        bounds::Grid,
        file::File,
        metadata::{ProductMetadata, RasterMetadata},
        raster::{merge, speckle::lee_filter, terrain, MaskedBand, MaskedStack, Resampling},
    },
    crs_geo::{Crs, Extent, Footprint},
    errors::{Result, SensorioError},
    indices::{evaluate, missing_band, SpectralIndex},
    intersection::Intersection,
    sensors::Context,
};

/// Bands and indices of one `load` call.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub indices: HashMap<SpectralIndex, MaskedBand>,
    pub bands: HashMap<Band, MaskedBand>,
    pub metadata: RasterMetadata,
}

pub trait Product: Debug + Send + Sync {
    fn metadata(&self) -> &ProductMetadata;
    fn path(&self) -> &Path;
    fn context(&self) -> &Context;
    /// Bands read straight from the product files.
    fn native_bands(&self) -> Vec<Band>;
    /// Resolution of the reference band.
    fn default_resolution(&self) -> f64;
    fn resampling(&self) -> Resampling;
    /// Geometry of the actually imaged, valid area.
    fn footprint(&self) -> Result<Footprint>;
    /// Envelope of the full raster grid.
    fn extent(&self) -> Result<Extent>;
    /// Grid every band is loaded on at `resolution`.
    fn grid(&self, resolution: f64) -> Result<Grid>;
    /// One native band on [Product::grid] at `resolution`.
    fn read_band(&self, band: Band, resolution: f64) -> Result<MaskedBand>;

    fn condensed_name(&self) -> String {
        self.metadata().condensed_name()
    }

    fn crs(&self) -> Result<Crs> {
        Ok(self.extent()?.crs().clone())
    }

    /// Native bands, their despeckled versions, and elevation
    /// bands when an elevation provider is configured.
    fn supported_bands(&self) -> Vec<Band> {
        let native = self.native_bands();
        Band::ALL
            .into_iter()
            .filter(|band| match (band.kind(), band.speckled()) {
                (BandKind::Dem, _) => self.context().dem.is_some(),
                (_, Some(speckled)) => native.contains(&speckled),
                _ => native.contains(band),
            })
            .collect()
    }

    fn has_band(&self, band: Band) -> bool {
        self.supported_bands().contains(&band)
    }

    fn has_index(&self, index: SpectralIndex) -> bool {
        let supported = self.supported_bands();
        missing_band(index, |band| supported.contains(band)).is_none()
    }

    /// Loads `bands` and evaluates `indices` at `resolution`.
    ///
    /// Every request is checked before any data is read.
    fn load(&self, bands: &[Band], indices: &[SpectralIndex], resolution: f64) -> Result<Loaded> {
        if !(resolution > 0.) || !resolution.is_finite() {
            return Err(SensorioError::InvalidResolution(resolution));
        }
        let supported = self.supported_bands();
        if let Some(band) = bands.iter().find(|band| !supported.contains(band)) {
            return Err(SensorioError::UnsupportedBand {
                band: *band,
                product: self.condensed_name(),
            });
        }
        for index in indices {
            if let Some(band) = missing_band(*index, |band| supported.contains(band)) {
                return Err(SensorioError::MissingBandForIndex {
                    index: *index,
                    band,
                });
            }
        }

        let needed: Vec<Band> = bands
            .iter()
            .copied()
            .chain(indices.iter().flat_map(SpectralIndex::required_bands))
            .unique()
            .collect();
        let grid = self.grid(resolution)?;
        info!(
            "load {needed:?} of {} at {resolution}",
            self.condensed_name()
        );

        let dem = if needed.iter().any(|band| band.kind() == BandKind::Dem) {
            Some(dem_on_grid(self, &grid, resolution)?)
        } else {
            None
        };
        let resolve = |band: &Band| -> Result<(Band, MaskedBand)> {
            let masked = match (band, band.speckled(), dem.as_ref()) {
                (Band::Dem, _, Some(dem)) => dem.clone(),
                (Band::Slope, _, Some(dem)) => terrain::slope(dem)?,
                (Band::Hillshade, _, Some(dem)) => terrain::hillshade(dem)?,
                (_, Some(speckled), _) => lee_filter(
                    &self.read_band(speckled, resolution)?,
                    self.context().config.despeckle_window,
                )?,
                _ => self.read_band(*band, resolution)?,
            };
            grid.ensure_matches(masked.grid())?;
            Ok((*band, masked))
        };
        let read: Vec<(Band, MaskedBand)> = if self.context().config.parallel {
            needed.par_iter().map(resolve).collect::<Result<_>>()?
        } else {
            needed.iter().map(resolve).collect::<Result<_>>()?
        };
        let mut available: HashMap<Band, MaskedBand> = read.into_iter().collect();

        let indices = indices
            .iter()
            .unique()
            .map(|index| evaluate(*index, &available).map(|raster| (*index, raster)))
            .collect::<Result<HashMap<_, _>>>()?;
        available.retain(|band, _| bands.contains(band));

        Ok(Loaded {
            indices,
            bands: available,
            metadata: RasterMetadata::new(self.metadata(), &grid),
        })
    }

    /// Like [Product::load], at the resolution giving `size` pixels as
    /// `(width, height)`.
    fn load_size(
        &self,
        bands: &[Band],
        indices: &[SpectralIndex],
        size: (usize, usize),
    ) -> Result<Loaded> {
        self.load(bands, indices, self.resolution_for_size(size)?)
    }

    /// Square pixel size covering [Product::extent] with `(width, height)` pixels.
    fn resolution_for_size(&self, size: (usize, usize)) -> Result<f64> {
        let (width, height) = size;
        let resolution = self.extent()?.width() / width as f64;
        let grid = self.grid(resolution)?;
        if grid.shape != (height, width) {
            return Err(SensorioError::GridMismatch(format!(
                "{width}x{height} pixels need non square pixels, {resolution} gives {:?}",
                grid.shape
            )));
        }
        Ok(resolution)
    }

    /// Deletes the intermediate files this product wrote.
    fn clear(&self) -> Result<()> {
        Ok(())
    }

    /// Loads and merges into one stack, indices first then bands,
    /// each in requested order.
    fn stack(
        &self,
        bands: &[Band],
        indices: &[SpectralIndex],
        resolution: f64,
    ) -> Result<(MaskedStack, RasterMetadata)> {
        let Loaded {
            indices: mut loaded_indices,
            bands: mut loaded_bands,
            metadata,
        } = self.load(bands, indices, resolution)?;

        let mut layers = Vec::new();
        for index in indices.iter().unique() {
            if let Some(raster) = loaded_indices.remove(index) {
                layers.push((index.to_string(), raster));
            }
        }
        for band in bands.iter().unique() {
            if let Some(raster) = loaded_bands.remove(band) {
                layers.push((band.to_string(), raster));
            }
        }
        let stack = merge(layers)?;
        let labels = stack.labels().to_vec();
        Ok((stack, metadata.with_labels(labels)))
    }

    /// Elevation raster on this product's grid at `resolution`.
    ///
    /// The raster returned by the provider must share the product crs
    /// and pixel size, and cover the product grid.
    fn warp_dem(&self, resolution: f64) -> Result<PathBuf> {
        let grid = self.grid(resolution)?;
        let provider = self.context().dem.as_ref().ok_or_else(|| {
            SensorioError::MissingAuxiliaryFile("no elevation provider configured".into())
        })?;
        let path = provider.warp(&grid.extent(), resolution)?;
        debug!("validate elevation raster {path:?} against {grid:?}");
        let dem_grid = GdalFile::open(&path)?.grid()?;
        if !dem_grid.extent().covers(&grid.extent()) {
            return Err(SensorioError::GridMismatch(format!(
                "elevation raster {path:?} in {} does not cover the product extent",
                dem_grid.crs
            )));
        }
        grid.window_in(&dem_grid)?;
        Ok(path)
    }
}

/// Elevation of `product` windowed onto `grid`.
fn dem_on_grid<P: Product + ?Sized>(
    product: &P,
    grid: &Grid,
    resolution: f64,
) -> Result<MaskedBand> {
    let file = GdalFile::open(product.warp_dem(resolution)?)?;
    let window = grid.window_in(&file.grid()?)?;
    let (row, col) = window.offset;
    let data = file
        .read_band(0)?
        .slice(ndarray::s![
            row..row + window.shape.0,
            col..col + window.shape.1
        ])
        .to_owned();
    let nodata = file.nodata(0)?.map(|nodata| nodata as f32);
    MaskedBand::from_raw(data, nodata, grid.clone())
}
