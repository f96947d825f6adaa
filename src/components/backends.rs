use ndarray::{Array2, Array3, Axis};
use std::{collections::HashMap, path::Path};

use crate::{
    components::{bounds::Grid, file::File, transforms::GeoTransform},
    crs_geo::Crs,
    errors::Result,
};

/// Implementations for gdal
pub mod gdal_backend {
    use super::*;
    use gdal::{
        raster::{Buffer, GdalType},
        Dataset as GdalDataset, DriverManager, Metadata as GdalMetadata,
        MetadataEntry as GdalMetadataEntry,
    };
    use log::debug;
    use std::path::PathBuf;

    const GTIFF_DRIVER_NAME: &str = "GTiff";

    fn filter_metadata_gdal(metadata: &impl GdalMetadata) -> HashMap<String, String> {
        GdalMetadata::metadata(metadata)
            .filter_map(|GdalMetadataEntry { domain, key, value }| {
                if domain.eq("") {
                    Some((key, value))
                } else {
                    None
                }
            })
            .collect()
    }

    #[derive(Debug)]
    pub struct GdalFile {
        path: PathBuf,
        dataset: GdalDataset,
    }

    impl GdalFile {
        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl File for GdalFile {
        fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
            Ok(GdalFile {
                path: path.as_ref().to_path_buf(),
                dataset: GdalDataset::open(&path)?,
            })
        }
        fn description(&self) -> Result<String> {
            Ok(GdalMetadata::description(&self.dataset)?)
        }
        fn shape(&self) -> (usize, usize) {
            let (cols, rows) = self.dataset.raster_size();
            (rows, cols)
        }
        fn crs(&self) -> Crs {
            Crs::new(&self.dataset.projection())
        }
        fn transform(&self) -> Result<GeoTransform> {
            Ok(GeoTransform::from_gdal(self.dataset.geo_transform()?))
        }
        fn num_bands(&self) -> usize {
            self.dataset.raster_count()
        }
        fn band_description(&self, index: usize) -> Result<String> {
            Ok(self.dataset.rasterband(index + 1)?.description()?)
        }
        fn nodata(&self, index: usize) -> Result<Option<f64>> {
            Ok(self.dataset.rasterband(index + 1)?.no_data_value())
        }
        fn read_band(&self, index: usize) -> Result<Array2<f32>> {
            debug!("read band {} of {:?}", index + 1, self.path);
            let (rows, cols) = self.shape();
            let buffer = self.dataset.rasterband(index + 1)?.read_as::<f32>(
                (0, 0),
                (cols, rows),
                (cols, rows),
                None,
            )?;
            Ok(Array2::from_shape_vec((rows, cols), buffer.data().to_vec())?)
        }
        fn metadata(&self) -> HashMap<String, String> {
            filter_metadata_gdal(&self.dataset)
        }
    }

    /// Writes `layers` as a GeoTIFF on `grid`, one band per label.
    pub fn write_layers<T: GdalType + Copy>(
        path: impl AsRef<Path>,
        layers: &Array3<T>,
        grid: &Grid,
        labels: &[String],
    ) -> Result<()> {
        let (count, rows, cols) = layers.dim();
        debug!("write {count} layers of {:?} to {:?}", (rows, cols), path.as_ref());
        let driver = DriverManager::get_driver_by_name(GTIFF_DRIVER_NAME)?;
        let mut dataset = driver.create_with_band_type::<T, _>(path.as_ref(), cols, rows, count)?;
        dataset.set_geo_transform(&grid.transform.to_gdal())?;
        dataset.set_spatial_ref(&grid.crs.spatial_ref()?)?;

        for (index, layer) in layers.axis_iter(Axis(0)).enumerate() {
            let mut band = dataset.rasterband(index + 1)?;
            if let Some(label) = labels.get(index) {
                band.set_description(label)?;
            }
            band.set_no_data_value(Some(0.))?;
            let mut buffer = Buffer::new((cols, rows), layer.iter().copied().collect());
            band.write((0, 0), (cols, rows), &mut buffer)?;
        }
        Ok(())
    }

    /// Single band float GeoTIFF.
    pub fn write_band(
        path: impl AsRef<Path>,
        data: &Array2<f32>,
        grid: &Grid,
        label: &str,
    ) -> Result<()> {
        let layers = data.clone().insert_axis(Axis(0));
        write_layers(path, &layers, grid, &[label.to_string()])
    }
}
