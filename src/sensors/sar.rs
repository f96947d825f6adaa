//! SAR products.
//!
//! Vendor SAR data is not read directly: an external [SarProcessor]
//! calibrates and geocodes the product into one GeoTIFF, which is then read
//! like any other raster.

use geo::{ConvexHull, MultiPoint, Point};
use log::{debug, info, warn};
use std::{
    fmt::Debug,
    fs,
    marker::PhantomData,
    path::{Path, PathBuf},
    process::Command,
    sync::Mutex,
};

use crate::{
    bands::Band,
    components::{
        archive::ProductTree,
        backends::gdal_backend::GdalFile,
        bounds::Grid,
        file::File,
        metadata::ProductMetadata,
        raster::{MaskedBand, Resampling},
    },
    config::Config,
    crs_geo::{Crs, Extent, Footprint},
    errors::{Result, SensorioError},
    product::Product,
    sensors::{Context, Sensor},
};

/// Value of the processed output outside the swath.
const FILL: f32 = 0.;

/// What the processor is asked to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct SarJob {
    pub input: PathBuf,
    /// GeoTIFF to write, one layer per polarisation.
    pub output: PathBuf,
    /// Pixel spacing in meters.
    pub resolution: f64,
    pub polarisations: Vec<Band>,
    pub product_name: String,
}

/// Calibrates and geocodes a raw SAR product.
pub trait SarProcessor: Send + Sync {
    fn process(&self, job: &SarJob) -> Result<()>;
}

impl<F> SarProcessor for F
where
    F: Fn(&SarJob) -> Result<()> + Send + Sync,
{
    fn process(&self, job: &SarJob) -> Result<()> {
        self(job)
    }
}

/// Runs a Read, Calibration, Terrain-Correction, Write graph through the
/// SNAP `gpt` command line tool.
#[derive(Debug, Clone)]
pub struct GptProcessor {
    executable: String,
    graph_dir: PathBuf,
}

impl GptProcessor {
    pub fn new(executable: impl Into<String>, graph_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            graph_dir: graph_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.gpt_executable.clone(), &config.output_dir)
    }

    pub fn graph(job: &SarJob) -> String {
        let escape = |path: &Path| quick_xml::escape::escape(&path.to_string_lossy()).into_owned();
        let polarisations = job
            .polarisations
            .iter()
            .map(Band::name)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            r#"<graph id="{name}">
  <version>1.0</version>
  <node id="Read">
    <operator>Read</operator>
    <sources/>
    <parameters>
      <file>{input}</file>
    </parameters>
  </node>
  <node id="Calibration">
    <operator>Calibration</operator>
    <sources>
      <sourceProduct refid="Read"/>
    </sources>
    <parameters>
      <selectedPolarisations>{polarisations}</selectedPolarisations>
      <outputSigmaBand>true</outputSigmaBand>
    </parameters>
  </node>
  <node id="Terrain-Correction">
    <operator>Terrain-Correction</operator>
    <sources>
      <sourceProduct refid="Calibration"/>
    </sources>
    <parameters>
      <demName>SRTM 1Sec HGT</demName>
      <pixelSpacingInMeter>{resolution}</pixelSpacingInMeter>
      <nodataValueAtSea>false</nodataValueAtSea>
    </parameters>
  </node>
  <node id="Write">
    <operator>Write</operator>
    <sources>
      <sourceProduct refid="Terrain-Correction"/>
    </sources>
    <parameters>
      <file>{output}</file>
      <formatName>GeoTIFF-BigTIFF</formatName>
    </parameters>
  </node>
</graph>
"#,
            name = quick_xml::escape::escape(&job.product_name),
            input = escape(&job.input),
            output = escape(&job.output),
            resolution = job.resolution,
        )
    }
}

impl SarProcessor for GptProcessor {
    fn process(&self, job: &SarJob) -> Result<()> {
        fs::create_dir_all(&self.graph_dir)?;
        let graph_path = self.graph_dir.join(format!("{}_graph.xml", job.product_name));
        fs::write(&graph_path, Self::graph(job))?;

        info!("run {} on {graph_path:?}", self.executable);
        let status = Command::new(&self.executable)
            .arg(&graph_path)
            .status()
            .map_err(|error| {
                SensorioError::ExternalProcessingFailed(format!(
                    "{} could not be started: {error}",
                    self.executable
                ))
            })?;
        if !status.success() {
            return Err(SensorioError::ExternalProcessingFailed(format!(
                "{} exited with {status} on {}",
                self.executable, job.product_name
            )));
        }
        Ok(())
    }
}

/// Everything a SAR product needs from its sensor.
#[derive(Debug, Clone)]
pub struct SarLayout {
    pub metadata: ProductMetadata,
    pub polarisations: Vec<Band>,
    /// Vendor scene polygon, geographic coordinates.
    pub footprint: Footprint,
    pub default_resolution: f64,
}

/// Convex hull of `(lon, lat)` scene corners or tie points.
pub fn scene_footprint(points: impl IntoIterator<Item = (f64, f64)>) -> Result<Footprint> {
    let points: Vec<Point> = points.into_iter().map(Point::from).collect();
    if points.len() < 3 {
        return Err(SensorioError::InvalidProduct(format!(
            "a scene polygon needs 3 points, got {}",
            points.len()
        )));
    }
    Ok(Footprint::new(Crs::wgs84(), MultiPoint::from(points).convex_hull()))
}

pub struct SarProduct<S: Sensor<Layout = SarLayout>> {
    tree: ProductTree,
    layout: SarLayout,
    context: Context,
    /// Held while the processor runs, one run per output.
    processing: Mutex<()>,
    sensor: PhantomData<S>,
}

impl<S: Sensor<Layout = SarLayout>> Debug for SarProduct<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SarProduct")
            .field("name", &self.layout.metadata.condensed_name())
            .field("path", &self.tree.path())
            .field("polarisations", &self.layout.polarisations)
            .finish()
    }
}

impl<S: Sensor<Layout = SarLayout>> SarProduct<S> {
    /// Nearest to keep calibrated backscatter values untouched.
    pub const RESAMPLING: Resampling = Resampling::Nearest;

    pub fn open(tree: ProductTree, context: Context) -> Result<Self> {
        let layout = S::layout(&tree, &context)?;
        let product = Self {
            tree,
            layout,
            context,
            processing: Mutex::new(()),
            sensor: PhantomData,
        };
        info!("new {product:?}");
        Ok(product)
    }

    pub fn layout(&self) -> &SarLayout {
        &self.layout
    }

    /// Pixel spacing the processor runs at for a request at `resolution`.
    pub fn processing_resolution(&self, resolution: f64) -> f64 {
        self.context.config.sar_resolution.unwrap_or(resolution)
    }

    pub fn output_path(&self, processing_resolution: f64) -> PathBuf {
        self.context.config.output_dir.join(format!(
            "{}_{processing_resolution}m.tif",
            self.layout.metadata.condensed_name()
        ))
    }

    /// Calibrated, geocoded raster for a request at `resolution`, produced
    /// on first use and reused afterwards.
    ///
    /// The processor writes next to the final path, which only appears
    /// once the run succeeded, so a failed run leaves nothing to reuse.
    pub fn processed(&self, resolution: f64) -> Result<PathBuf> {
        let processing_resolution = self.processing_resolution(resolution);
        let output = self.output_path(processing_resolution);
        let _guard = self
            .processing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if output.is_file() {
            debug!("reuse {output:?}");
            return Ok(output);
        }

        fs::create_dir_all(&self.context.config.output_dir)?;
        let partial = output.with_extension("part.tif");
        remove_if_exists(&partial)?;
        let job = SarJob {
            input: self.tree.path().to_path_buf(),
            output: partial.clone(),
            resolution: processing_resolution,
            polarisations: self.layout.polarisations.clone(),
            product_name: self.layout.metadata.condensed_name(),
        };
        let run = self.context.sar_processor.process(&job).and_then(|()| {
            if partial.is_file() {
                Ok(())
            } else {
                Err(SensorioError::ExternalProcessingFailed(format!(
                    "expected output {partial:?} was not written"
                )))
            }
        });
        if let Err(err) = run {
            warn!("processing {} failed, discard {partial:?}", job.product_name);
            remove_if_exists(&partial)?;
            return Err(err);
        }
        fs::rename(&partial, &output)?;
        info!("processed {output:?}");
        Ok(output)
    }

    /// Removes the processed rasters and graphs of this product from the
    /// output directory.
    pub fn clear_outputs(&self) -> Result<()> {
        let _guard = self
            .processing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let output_dir = &self.context.config.output_dir;
        if !output_dir.is_dir() {
            return Ok(());
        }
        let prefix = format!("{}_", self.layout.metadata.condensed_name());
        for entry in fs::read_dir(output_dir)? {
            let path = entry?.path();
            let is_output = path
                .file_name()
                .map(|name| name.to_string_lossy())
                .is_some_and(|name| {
                    name.starts_with(&prefix)
                        && (name.ends_with(".tif") || name.ends_with("_graph.xml"))
                });
            if is_output && path.is_file() {
                debug!("remove {path:?}");
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

impl<S: Sensor<Layout = SarLayout> + Send + Sync> Product for SarProduct<S> {
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
        self.layout.polarisations.clone()
    }

    fn default_resolution(&self) -> f64 {
        self.layout.default_resolution
    }

    fn resampling(&self) -> Resampling {
        Self::RESAMPLING
    }

    fn footprint(&self) -> Result<Footprint> {
        Ok(self.layout.footprint.clone())
    }

    fn extent(&self) -> Result<Extent> {
        Ok(self.grid(self.default_resolution())?.extent())
    }

    fn clear(&self) -> Result<()> {
        self.clear_outputs()
    }

    fn grid(&self, resolution: f64) -> Result<Grid> {
        let processed = GdalFile::open(self.processed(resolution)?)?.grid()?;
        processed.with_resolution(resolution)
    }

    fn read_band(&self, band: Band, resolution: f64) -> Result<MaskedBand> {
        if !self.layout.polarisations.contains(&band) {
            return Err(SensorioError::UnsupportedBand {
                band,
                product: self.condensed_name(),
            });
        }
        let path = self.processed(resolution)?;
        let file = GdalFile::open(&path)?;
        let index = file.find_band(band.name())?.ok_or_else(|| {
            SensorioError::ExternalProcessingFailed(format!("{path:?} has no {band} layer"))
        })?;
        debug!("read {band} from layer {index} of {path:?}");
        MaskedBand::from_raw(file.read_band(index)?, Some(FILL), file.grid()?)?
            .resample(resolution, self.resampling())
    }
}
