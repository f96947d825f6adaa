pub mod archive;
pub mod backends;
pub mod bounds;
pub mod file;
pub mod metadata;
pub mod raster;
pub mod transforms;

pub use archive::ProductTree;
pub use backends::gdal_backend::GdalFile;
pub use bounds::Grid;
pub use file::File;
pub use transforms::GeoTransform;
