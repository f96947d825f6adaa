use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc};

use crate::{
    components::archive::ProductTree,
    config::Config,
    dem::DemProvider,
    errors::{Result, SensorioError},
};

pub mod landsat;
pub mod optical;
pub mod radarsat2;
pub mod sar;
pub mod sentinel1;
pub mod sentinel2;
pub mod sentinel2_theia;
pub mod terrasar;

pub use landsat::Landsat;
pub use optical::{BandSource, CloudFlag, NodataRule, OpticalLayout, OpticalProduct};
pub use radarsat2::Radarsat2;
pub use sar::{GptProcessor, SarJob, SarLayout, SarProcessor, SarProduct};
pub use sentinel1::Sentinel1;
pub use sentinel2::Sentinel2;
pub use sentinel2_theia::Sentinel2Theia;
pub use terrasar::TerraSarX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    Optical,
    Sar,
}

/// A satellite family and the way its products are laid out on disk.
pub trait Sensor: Debug {
    type Layout;

    const SENSOR_TYPE: SensorType;
    /// Matched against the product name.
    const NAME_PATTERN: &'static str;
    /// Matched against the entries of the product tree.
    const METADATA_PATTERN: &'static str;

    /// Reads the product metadata and resolves its on-disk sources.
    fn layout(tree: &ProductTree, context: &Context) -> Result<Self::Layout>;
}

/// Collaborators and settings shared by every product a reader opens.
#[derive(Clone)]
pub struct Context {
    pub config: Arc<Config>,
    pub dem: Option<Arc<dyn DemProvider>>,
    pub sar_processor: Arc<dyn SarProcessor>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("dem", &self.dem.is_some())
            .finish()
    }
}

impl Context {
    pub fn new(config: Config) -> Self {
        let sar_processor = Arc::new(GptProcessor::from_config(&config));
        let dem = config
            .dem_path
            .clone()
            .map(|path| Arc::new(crate::dem::DemFile::new(path)) as Arc<dyn DemProvider>);
        Self {
            config: Arc::new(config),
            dem,
            sar_processor,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Captures of `pattern` on `name`, which must match.
pub(crate) fn name_captures<'a>(pattern: &str, name: &'a str) -> Result<Captures<'a>> {
    Regex::new(pattern)?
        .captures(name)
        .ok_or_else(|| SensorioError::InvalidProduct(format!("{name} does not match {pattern}")))
}

/// Captured group `index`, which the pattern guarantees.
pub(crate) fn group<'a>(captures: &Captures<'a>, index: usize) -> Result<&'a str> {
    captures
        .get(index)
        .map(|group| group.as_str())
        .ok_or_else(|| SensorioError::InvalidProduct(format!("missing group {index}")))
}
