use geo::{ConvexHull, MultiPoint, Point};
use log::{debug, info};
use ndarray::Zip;
use std::{collections::BTreeMap, fmt::Debug, marker::PhantomData, path::Path};

use crate::{
    bands::{Band, BandKind},
    components::{
        archive::ProductTree,
        backends::gdal_backend::GdalFile,
        bounds::Grid,
        file::File,
        metadata::ProductMetadata,
        raster::{MaskedBand, Resampling},
    },
    crs_geo::{Extent, Footprint},
    errors::{Result, SensorioError},
    product::Product,
    sensors::{Context, Sensor},
};

/// How nodata is flagged in an optical band.
#[derive(Debug, Clone, PartialEq)]
pub enum NodataRule {
    /// Raw digital number marking nodata.
    Fill(f32),
    /// Separate raster, non zero where there is no data.
    MaskLayer(String),
    FillAndMaskLayer(f32, String),
    /// Every cell is valid.
    Never,
}

/// Which raw values of a vendor quality layer flag a cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CloudFlag {
    /// Cloud probability at or above the threshold.
    AtLeast(f32),
    /// Any of these bits set.
    AnyBit(u32),
    NonZero,
}

impl CloudFlag {
    pub fn is_cloud(&self, raw: f32) -> bool {
        match self {
            CloudFlag::AtLeast(threshold) => raw >= *threshold,
            CloudFlag::AnyBit(bits) => raw >= 0. && (raw as u32) & bits != 0,
            CloudFlag::NonZero => raw != 0.,
        }
    }
}

/// Where a band lives on disk and how its digital numbers become reflectance.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSource {
    /// Entry of the product tree.
    pub entry: String,
    /// 0 based band index inside the file.
    pub index: usize,
    pub scale: f32,
    pub offset: f32,
    pub nodata: NodataRule,
    /// Set for quality layers read as a 0 / 1 cloud mask.
    pub clouds: Option<CloudFlag>,
}

impl BandSource {
    pub fn new(entry: impl Into<String>, scale: f32, offset: f32, nodata: NodataRule) -> Self {
        Self {
            entry: entry.into(),
            index: 0,
            scale,
            offset,
            nodata,
            clouds: None,
        }
    }

    /// Quality layer turned into 1 where `flag` holds and 0 elsewhere.
    pub fn cloud_mask(entry: impl Into<String>, flag: CloudFlag, nodata: NodataRule) -> Self {
        Self {
            clouds: Some(flag),
            ..Self::new(entry, 1., 0., nodata)
        }
    }

    /// Reflectance at native resolution.
    pub fn read(&self, tree: &ProductTree) -> Result<MaskedBand> {
        let file = GdalFile::open(tree.gdal_path(&self.entry))?;
        let grid = file.grid()?;
        let raw = file.read_band(self.index)?;

        let mut mask = raw.mapv(|value| !value.is_finite());
        let (fill, layer) = match &self.nodata {
            NodataRule::Fill(fill) => (Some(*fill), None),
            NodataRule::MaskLayer(layer) => (None, Some(layer)),
            NodataRule::FillAndMaskLayer(fill, layer) => (Some(*fill), Some(layer)),
            NodataRule::Never => (None, None),
        };
        if let Some(fill) = fill {
            Zip::from(&mut mask)
                .and(&raw)
                .for_each(|masked, value| *masked |= *value == fill);
        }
        if let Some(layer) = layer {
            let layer_file = GdalFile::open(tree.gdal_path(layer))?;
            grid.ensure_matches(&layer_file.grid()?)?;
            let layer = layer_file.read_band(0)?;
            Zip::from(&mut mask)
                .and(&layer)
                .for_each(|masked, flag| *masked |= *flag != 0.);
        }

        let values = match self.clouds {
            Some(flag) => raw.mapv(|value| if flag.is_cloud(value) { 1. } else { 0. }),
            None => {
                let (scale, offset) = (self.scale, self.offset);
                raw.mapv(|value| value * scale + offset)
            }
        };
        MaskedBand::new(values, mask, grid)
    }
}

/// Everything an optical product needs from its sensor.
#[derive(Debug, Clone)]
pub struct OpticalLayout {
    pub metadata: ProductMetadata,
    pub sources: BTreeMap<Band, BandSource>,
    /// Band whose grid defines extent, footprint and output grids.
    pub reference: Band,
    pub default_resolution: f64,
}

/// Optical product, reflectance read from vendor rasters.
pub struct OpticalProduct<S: Sensor<Layout = OpticalLayout>> {
    tree: ProductTree,
    layout: OpticalLayout,
    reference_grid: Grid,
    context: Context,
    sensor: PhantomData<S>,
}

impl<S: Sensor<Layout = OpticalLayout>> Debug for OpticalProduct<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpticalProduct")
            .field("name", &self.layout.metadata.condensed_name())
            .field("path", &self.tree.path())
            .field("bands", &self.layout.sources.keys().collect::<Vec<_>>())
            .field("grid", &self.reference_grid)
            .finish()
    }
}

impl<S: Sensor<Layout = OpticalLayout>> OpticalProduct<S> {
    /// Bilinear for continuous reflectance.
    pub const RESAMPLING: Resampling = Resampling::Bilinear;

    pub fn open(tree: ProductTree, context: Context) -> Result<Self> {
        let layout = S::layout(&tree, &context)?;
        let reference = layout.sources.get(&layout.reference).ok_or_else(|| {
            SensorioError::InvalidProduct(format!(
                "reference band {} has no source",
                layout.reference
            ))
        })?;
        let reference_grid = GdalFile::open(tree.gdal_path(&reference.entry))?.grid()?;
        let product = Self {
            tree,
            layout,
            reference_grid,
            context,
            sensor: PhantomData,
        };
        info!("new {product:?}");
        Ok(product)
    }

    pub fn layout(&self) -> &OpticalLayout {
        &self.layout
    }

    fn source(&self, band: Band) -> Result<&BandSource> {
        self.layout
            .sources
            .get(&band)
            .ok_or_else(|| SensorioError::UnsupportedBand {
                band,
                product: self.layout.metadata.condensed_name(),
            })
    }
}

/// Convex hull of the corners of the first and last valid cell of every row.
pub fn valid_footprint(band: &MaskedBand) -> Result<Footprint> {
    let grid = band.grid();
    let mut corners = Vec::new();
    for (row, mask_row) in band.mask().outer_iter().enumerate() {
        let first = mask_row.iter().position(|masked| !masked);
        let last = mask_row.iter().rposition(|masked| !masked);
        if let (Some(first), Some(last)) = (first, last) {
            for col in [first, last + 1] {
                for edge in [row, row + 1] {
                    let coord = grid.transform.pixel_to_geo(col as f64, edge as f64);
                    corners.push(Point::from(coord));
                }
            }
        }
    }
    if corners.is_empty() {
        return Err(SensorioError::InvalidProduct(
            "reference band has no valid pixel".into(),
        ));
    }
    Ok(Footprint::new(
        grid.crs.clone(),
        MultiPoint::from(corners).convex_hull(),
    ))
}

impl<S: Sensor<Layout = OpticalLayout> + Send + Sync> Product for OpticalProduct<S> {
    fn metadata(&self) -> &ProductMetadata {
        &self.layout.metadata
    }

    fn path(&self) -> &Path {
        self.tree.path()
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn native_bands(&self) -> Vec<Band> {
        self.layout.sources.keys().copied().collect()
    }

    fn default_resolution(&self) -> f64 {
        self.layout.default_resolution
    }

    fn resampling(&self) -> Resampling {
        Self::RESAMPLING
    }

    fn footprint(&self) -> Result<Footprint> {
        let reference = self.source(self.layout.reference)?.read(&self.tree)?;
        valid_footprint(&reference)
    }

    fn extent(&self) -> Result<Extent> {
        Ok(self.reference_grid.extent())
    }

    fn grid(&self, resolution: f64) -> Result<Grid> {
        self.reference_grid.with_resolution(resolution)
    }

    fn read_band(&self, band: Band, resolution: f64) -> Result<MaskedBand> {
        debug!("read {band} of {}", self.layout.metadata.condensed_name());
        let resampling = match band.kind() {
            BandKind::Mask => Resampling::Nearest,
            _ => self.resampling(),
        };
        self.source(band)?
            .read(&self.tree)?
            .resample(resolution, resampling)
    }
}
