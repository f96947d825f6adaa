use std::path::PathBuf;

use crate::{bands::Band, indices::SpectralIndex, reader::Variant};

pub type Result<T> = std::result::Result<T, SensorioError>;

#[derive(thiserror::Error, Debug)]
pub enum SensorioError {
    #[error("No product variant recognizes {0:?}")]
    UnrecognizedProduct(PathBuf),
    #[error("{path:?} is claimed by more than one product variant: {variants:?}")]
    AmbiguousProduct { path: PathBuf, variants: Vec<Variant> },
    #[error("Band {band} is not supported by {product}")]
    UnsupportedBand { band: Band, product: String },
    #[error("Index {index} needs band {band}, which is not available")]
    MissingBandForIndex { index: SpectralIndex, band: Band },
    #[error("Resolution must be strictly positive, got {0}")]
    InvalidResolution(f64),
    #[error("Missing auxiliary file: {0}")]
    MissingAuxiliaryFile(String),
    #[error("Raster grids do not match: {0}")]
    GridMismatch(String),
    #[error("External processing failed: {0}")]
    ExternalProcessingFailed(String),
    #[error("Invalid product: {0}")]
    InvalidProduct(String),
    #[error("Key {key} not found in metadata of {object_desc}")]
    MetadataKeyNotFound { object_desc: String, key: String },
    #[error("Can not stack an empty list of rasters")]
    EmptyStack,
    #[error("There is no intersection between geometries")]
    NoIntersection,
    #[error(transparent)]
    GdalError(#[from] gdal::errors::GdalError),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    ZipError(#[from] zip::result::ZipError),
    #[error(transparent)]
    XmlError(#[from] quick_xml::Error),
    #[error(transparent)]
    NdarrayError(#[from] ndarray::ShapeError),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    TimeError(#[from] chrono::ParseError),
    #[error(transparent)]
    RegexError(#[from] regex::Error),
}
