#![allow(dead_code)]

use ndarray::{Array2, Array3};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use walkdir::WalkDir;
use zip::{write::SimpleFileOptions, ZipWriter};

use sensorio::{
    components::{
        backends::gdal_backend::{write_band, write_layers},
        Grid, GeoTransform,
    },
    Crs, Result, SarJob, SarProcessor, SensorioError,
};

pub const S2_NAME: &str = "S2B_MSIL2A_20241126T093239_N0511_R136_T33PTM_20241126T120342";
pub const THEIA_NAME: &str = "SENTINEL2B_20200101-105844-123_L2A_T31TCJ_C_V2-2";
pub const LANDSAT_NAME: &str = "LC08_L2SP_198030_20200101_20200113_02_T1";
pub const S1_NAME: &str = "S1A_IW_GRDH_1SDV_20200101T054123_20200101T054148_030622_038245_1A2B";

pub const ORIGIN: (f64, f64) = (600_000., 5_000_000.);
/// Side of every synthetic product, in meters.
pub const SIDE: f64 = 80.;

/// Grid covering the synthetic product area at `resolution`.
pub fn grid(resolution: f64) -> Grid {
    let cells = (SIDE / resolution).round() as usize;
    Grid::new(
        GeoTransform::new(ORIGIN.0, resolution, ORIGIN.1, -resolution),
        Crs::from_epsg(32633),
        (cells, cells),
    )
}

/// `value` everywhere except a `corner` x `corner` block of `fill` at the top left.
pub fn with_corner(value: f32, fill: f32, resolution: f64, corner: usize) -> Array2<f32> {
    let shape = grid(resolution).shape;
    Array2::from_shape_fn(shape, |(row, col)| {
        if row < corner && col < corner {
            fill
        } else {
            value
        }
    })
}

pub fn constant(value: f32, resolution: f64) -> Array2<f32> {
    Array2::from_elem(grid(resolution).shape, value)
}

fn write_text(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn write_tif(path: &Path, data: &Array2<f32>, resolution: f64) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    write_band(path, data, &grid(resolution), "").unwrap();
}

/// Sentinel-2 L2A SAFE directory, reflectance `(DN - 1000) / 10000`.
///
/// RED is 0.1 with a 2x2 nodata corner, NIR 0.3, GREEN 0.05 and SWIR_1
/// 0.2 at 20 m. There is no SWIR_2.
pub fn sentinel2(dir: &Path) -> PathBuf {
    let root = dir.join(format!("{S2_NAME}.SAFE"));
    let offsets: String = (0..13)
        .map(|band_id| format!("<BOA_ADD_OFFSET band_id=\"{band_id}\">-1000</BOA_ADD_OFFSET>"))
        .collect();
    write_text(
        &root.join("MTD_MSIL2A.xml"),
        &format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<n1:Level-2A_User_Product xmlns:n1="https://psd-14.sentinel2.eo.esa.int/PSD/User_Product_Level-2A.xsd">
  <n1:General_Info>
    <Product_Info>
      <PRODUCT_START_TIME>2024-11-26T09:32:39.024Z</PRODUCT_START_TIME>
      <PRODUCT_URI>{S2_NAME}.SAFE</PRODUCT_URI>
    </Product_Info>
    <Product_Image_Characteristics>
      <QUANTIFICATION_VALUES_LIST>
        <BOA_QUANTIFICATION_VALUE unit="none">10000</BOA_QUANTIFICATION_VALUE>
      </QUANTIFICATION_VALUES_LIST>
      <BOA_ADD_OFFSET_VALUES_LIST>{offsets}</BOA_ADD_OFFSET_VALUES_LIST>
    </Product_Image_Characteristics>
  </n1:General_Info>
</n1:Level-2A_User_Product>
"#
        ),
    );
    let image = |resolution: u32, code: &str| {
        root.join(format!(
            "GRANULE/L2A_T33PTM_A040239_20241126T093825/IMG_DATA/R{resolution}m/T33PTM_20241126T093239_{code}_{resolution}m.tif"
        ))
    };
    write_tif(&image(10, "B04"), &with_corner(2000., 0., 10., 2), 10.);
    write_tif(&image(10, "B08"), &constant(4000., 10.), 10.);
    write_tif(&image(10, "B03"), &constant(1500., 10.), 10.);
    write_tif(&image(20, "B11"), &constant(3000., 20.), 20.);
    root
}

/// THEIA L2A directory, GREEN 0.05 and RED 0.1 with one edge pixel
/// flagged by the mask layer only and one fill pixel.
pub fn theia(dir: &Path) -> PathBuf {
    let root = dir.join(THEIA_NAME);
    write_text(&root.join(format!("{THEIA_NAME}_MTD_ALL.xml")), "<Muscate_Metadata_Document/>");

    let mut red = constant(1000., 10.);
    red[[7, 7]] = -10_000.;
    write_tif(&root.join(format!("{THEIA_NAME}_FRE_B4.tif")), &red, 10.);
    write_tif(&root.join(format!("{THEIA_NAME}_FRE_B3.tif")), &constant(500., 10.), 10.);
    let mut edge = constant(0., 10.);
    edge[[0, 0]] = 1.;
    write_tif(&root.join(format!("MASKS/{THEIA_NAME}_EDG_R1.tif")), &edge, 10.);
    root
}

/// Landsat 8 Collection 2 L2 directory at 20 m, with `DN` values giving
/// RED 0.075 and NIR 0.2.
pub fn landsat(dir: &Path) -> PathBuf {
    let root = dir.join(LANDSAT_NAME);
    write_text(
        &root.join(format!("{LANDSAT_NAME}_MTL.txt")),
        "GROUP = LANDSAT_METADATA_FILE\n  GROUP = IMAGE_ATTRIBUTES\n    SPACECRAFT_ID = \"LANDSAT_8\"\n    \
         DATE_ACQUIRED = 2020-01-01\n    SCENE_CENTER_TIME = \"10:32:15.1234560Z\"\n  END_GROUP = IMAGE_ATTRIBUTES\n\
         END_GROUP = LANDSAT_METADATA_FILE\nEND\n",
    );
    // (0.075 + 0.2) / 2.75e-5 = 10000
    write_tif(&root.join(format!("{LANDSAT_NAME}_SR_B4.TIF")), &constant(10_000., 20.), 20.);
    write_tif(&root.join(format!("{LANDSAT_NAME}_SR_B5.TIF")), &constant(14_545.455, 20.), 20.);
    root
}

/// Sentinel-1 GRD SAFE directory, VV and VH.
pub fn sentinel1(dir: &Path) -> PathBuf {
    let root = dir.join(format!("{S1_NAME}.SAFE"));
    write_text(
        &root.join("manifest.safe"),
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xfdu:XFDU xmlns:xfdu="urn:ccsds:schema:xfdu:1" xmlns:gml="http://www.opengis.net/gml" xmlns:safe="http://www.esa.int/safe/sentinel-1.0">
  <metadataSection>
    <metadataObject ID="measurementFrameSet">
      <metadataWrap><xmlData><safe:frameSet><safe:frame><safe:footPrint srsName="http://www.opengis.net/gml/srs/epsg.xml#4326">
        <gml:coordinates>45.0,7.0 45.0,8.0 46.0,8.0 46.0,7.0</gml:coordinates>
      </safe:footPrint></safe:frame></safe:frameSet></xmlData></metadataWrap>
    </metadataObject>
  </metadataSection>
</xfdu:XFDU>
"#,
    );
    write_text(
        &root.join("annotation/s1a-iw-grd-vv-20200101t054123-20200101t054148-030622-038245-001.xml"),
        "<product/>",
    );
    write_text(
        &root.join("annotation/s1a-iw-grd-vh-20200101t054123-20200101t054148-030622-038245-002.xml"),
        "<product/>",
    );
    root
}

/// Zips `root` into `<root>.zip`, entries prefixed by the root directory name.
pub fn zip_dir(root: &Path) -> PathBuf {
    let name = root.file_name().unwrap().to_string_lossy().into_owned();
    let path = root.with_file_name(format!("{name}.zip"));
    let mut writer = ZipWriter::new(fs::File::create(&path).unwrap());
    for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap();
        let entry_name = format!("{name}/{}", relative.to_string_lossy().replace('\\', "/"));
        writer
            .start_file(entry_name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&fs::read(entry.path()).unwrap()).unwrap();
    }
    writer.finish().unwrap();
    path
}

/// Tars the files of `root` into `<root>.tar`, entries at the archive root
/// as USGS delivers them.
pub fn tar_dir(root: &Path) -> PathBuf {
    let name = root.file_name().unwrap().to_string_lossy().into_owned();
    let path = root.with_file_name(format!("{name}.tar"));
    let mut builder = tar::Builder::new(fs::File::create(&path).unwrap());
    for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        if entry.file_type().is_file() {
            let relative = entry.path().strip_prefix(root).unwrap();
            builder.append_path_with_name(entry.path(), relative).unwrap();
        }
    }
    builder.finish().unwrap();
    path
}

/// Adds a QA_PIXEL layer to the Landsat product at `root`: fill in the top
/// left pixel, cloud in the right half, clear land elsewhere.
pub fn landsat_clouds(root: &Path) {
    let qa = Array2::from_shape_fn(grid(20.).shape, |(row, col)| match (row, col) {
        (0, 0) => 1.,
        (_, 2..) => 22280.,
        _ => 21824.,
    });
    write_tif(&root.join(format!("{LANDSAT_NAME}_QA_PIXEL.TIF")), &qa, 20.);
}

/// Writes a partial output then fails, like an aborted SNAP run.
pub fn aborted_processor(job: &SarJob) -> Result<()> {
    FakeProcessor::default().process(job)?;
    Err(SensorioError::ExternalProcessingFailed(format!(
        "{} aborted",
        job.product_name
    )))
}

/// Stands in for SNAP: writes `Sigma0_<POL>` layers over the synthetic
/// area, VV 0.2 and VH 0.05, a 0 border marks no data.
#[derive(Debug, Default)]
pub struct FakeProcessor {
    pub runs: AtomicUsize,
}

impl FakeProcessor {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl SarProcessor for FakeProcessor {
    fn process(&self, job: &SarJob) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let grid = grid(job.resolution);
        let (rows, cols) = grid.shape;
        let mut layers = Array3::<f32>::zeros((job.polarisations.len(), rows, cols));
        let mut labels = Vec::new();
        for (index, polarisation) in job.polarisations.iter().enumerate() {
            let value = if polarisation.name() == "VV" { 0.2 } else { 0.05 };
            layers
                .index_axis_mut(ndarray::Axis(0), index)
                .slice_mut(ndarray::s![1..rows - 1, 1..cols - 1])
                .fill(value);
            labels.push(format!("Sigma0_{polarisation}"));
        }
        write_layers(&job.output, &layers, &grid, &labels)
    }
}

/// Elevation raster covering the synthetic area with a 20 m margin,
/// a plane rising 1 m per meter eastwards.
pub fn dem(dir: &Path, resolution: f64) -> PathBuf {
    let margin = 20.;
    let cells = ((SIDE + 2. * margin) / resolution).round() as usize;
    let grid = Grid::new(
        GeoTransform::new(ORIGIN.0 - margin, resolution, ORIGIN.1 + margin, -resolution),
        Crs::from_epsg(32633),
        (cells, cells),
    );
    let data =
        Array2::from_shape_fn((cells, cells), |(_, col)| 100. + (col as f64 * resolution) as f32);
    let path = dir.join(format!("dem_{resolution}m.tif"));
    write_band(&path, &data, &grid, "DEM").unwrap();
    path
}
