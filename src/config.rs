//! Runtime configuration.
//!
//! Settings come from the defaults, a JSON file, or `SENSORIO_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{
    errors::{Result, SensorioError},
    reader::CheckMethod,
};

pub const ENV_OUTPUT_DIR: &str = "SENSORIO_OUTPUT_DIR";
pub const ENV_GPT: &str = "SENSORIO_GPT";
pub const ENV_SAR_RESOLUTION: &str = "SENSORIO_SAR_RESOLUTION";
pub const ENV_DEM_PATH: &str = "SENSORIO_DEM_PATH";
pub const ENV_PARALLEL: &str = "SENSORIO_PARALLEL";
pub const ENV_CHECK_METHOD: &str = "SENSORIO_CHECK_METHOD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SAR intermediates and processing graphs are written here.
    pub output_dir: PathBuf,
    /// SAR graph processing executable, looked up on `PATH` when not a path.
    pub gpt_executable: String,
    /// Pixel spacing of SAR processing, the requested resolution when unset.
    pub sar_resolution: Option<f64>,
    /// Already warped elevation raster served by [crate::dem::DemFile].
    pub dem_path: Option<PathBuf>,
    /// Load independent bands on the rayon pool.
    pub parallel: bool,
    pub check_method: CheckMethod,
    /// Odd window size of the Lee speckle filter.
    pub despeckle_window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("sensorio"),
            gpt_executable: "gpt".to_string(),
            sar_resolution: None,
            dem_path: None,
            parallel: true,
            check_method: CheckMethod::Both,
            despeckle_window: 7,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: Config = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validated()
    }

    /// Defaults overridden by the `SENSORIO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();
        if let Some(output_dir) = lookup(ENV_OUTPUT_DIR) {
            config.output_dir = PathBuf::from(output_dir);
        }
        if let Some(gpt) = lookup(ENV_GPT) {
            config.gpt_executable = gpt;
        }
        if let Some(resolution) = lookup(ENV_SAR_RESOLUTION) {
            let resolution = resolution
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid(ENV_SAR_RESOLUTION, &resolution))?;
            config.sar_resolution = Some(resolution);
        }
        if let Some(dem_path) = lookup(ENV_DEM_PATH) {
            config.dem_path = Some(PathBuf::from(dem_path));
        }
        if let Some(parallel) = lookup(ENV_PARALLEL) {
            config.parallel = match parallel.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(invalid(ENV_PARALLEL, &parallel)),
            };
        }
        if let Some(method) = lookup(ENV_CHECK_METHOD) {
            config.check_method = method.parse()?;
        }
        config.validated()
    }

    /// Checks values that would only fail deep inside a load.
    pub fn validated(self) -> Result<Self> {
        if let Some(resolution) = self.sar_resolution {
            if !(resolution > 0.) {
                return Err(SensorioError::InvalidResolution(resolution));
            }
        }
        if self.despeckle_window % 2 == 0 || self.despeckle_window < 3 {
            return Err(invalid("despeckle_window", &self.despeckle_window.to_string()));
        }
        Ok(self)
    }
}

fn invalid(key: &str, value: &str) -> SensorioError {
    SensorioError::InvalidProduct(format!("invalid configuration {key} = {value:?}"))
}
