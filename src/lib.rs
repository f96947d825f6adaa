pub mod bands;
pub mod components;
pub mod config;
pub mod crs_geo;
pub mod dem;
pub mod errors;
pub mod indices;
pub mod intersection;
pub mod product;
pub mod reader;
pub mod sensors;

pub use bands::Band;
pub use components::raster::{merge, MaskedBand, MaskedStack, Resampling, StackEncoding};
pub use config::Config;
pub use crs_geo::{Crs, CrsGeometry, Extent, Footprint};
pub use dem::{DemFile, DemProvider};
pub use errors::{Result, SensorioError};
pub use indices::{evaluate, SpectralIndex};
pub use product::{Loaded, Product};
pub use reader::{CheckMethod, Reader, Rule, Variant};
pub use sensors::{SarJob, SarProcessor};
