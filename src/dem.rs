//! Elevation collaborator.
//!
//! A [DemProvider] hands out a local elevation raster already warped to a
//! requested extent, crs and resolution. Fetching and caching tiles is the
//! provider's business, products only validate what they receive.

use std::path::{Path, PathBuf};

use crate::{
    crs_geo::Extent,
    errors::{Result, SensorioError},
};

pub trait DemProvider: Send + Sync {
    /// Path of an elevation raster in the crs of `extent`, with pixel size
    /// `resolution`, covering at least `extent`.
    fn warp(&self, extent: &Extent, resolution: f64) -> Result<PathBuf>;
}

impl<F> DemProvider for F
where
    F: Fn(&Extent, f64) -> Result<PathBuf> + Send + Sync,
{
    fn warp(&self, extent: &Extent, resolution: f64) -> Result<PathBuf> {
        self(extent, resolution)
    }
}

/// Serves one elevation raster that was warped beforehand.
#[derive(Debug, Clone)]
pub struct DemFile {
    path: PathBuf,
}

impl DemFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DemProvider for DemFile {
    fn warp(&self, _extent: &Extent, _resolution: f64) -> Result<PathBuf> {
        if !self.path.is_file() {
            return Err(SensorioError::MissingAuxiliaryFile(format!(
                "elevation raster {:?}",
                self.path
            )));
        }
        Ok(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs_geo::Crs;
    use geo::Rect;

    fn extent() -> Extent {
        Extent::new(Crs::from_epsg(32631), Rect::new((0., 0.), (100., 100.)))
    }

    #[test]
    fn missing_file() {
        let provider = DemFile::new("/nonexistent/dem.tif");
        assert!(matches!(
            provider.warp(&extent(), 10.),
            Err(SensorioError::MissingAuxiliaryFile(_))
        ));
    }

    #[test]
    fn closures_are_providers() {
        let provider = |extent: &Extent, resolution: f64| -> Result<PathBuf> {
            Ok(PathBuf::from(format!("{}_{resolution}.tif", extent.crs())))
        };
        let path = DemProvider::warp(&provider, &extent(), 20.).unwrap();
        assert!(path.to_string_lossy().ends_with("_20.tif"));
    }
}
