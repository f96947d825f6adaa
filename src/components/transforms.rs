use geo::{AffineTransform, Coord};
use shrinkwraprs::Shrinkwrap;

/// Pixel to geo affine transform of a north up raster.
///
/// Pixel coordinates are `(col, row)` with origin at the top left
/// corner of the top left pixel.
#[derive(Shrinkwrap, Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(AffineTransform);

impl GeoTransform {
    pub fn new(xoff: f64, x_res: f64, yoff: f64, y_res: f64) -> Self {
        Self(AffineTransform::new(x_res, 0., xoff, 0., y_res, yoff))
    }

    pub fn from_gdal(gdal_transform: [f64; 6]) -> Self {
        Self(AffineTransform::new(
            gdal_transform[1],
            gdal_transform[2],
            gdal_transform[0],
            gdal_transform[4],
            gdal_transform[5],
            gdal_transform[3],
        ))
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.0.xoff(),
            self.0.a(),
            self.0.b(),
            self.0.yoff(),
            self.0.d(),
            self.0.e(),
        ]
    }

    pub fn origin(&self) -> Coord {
        Coord {
            x: self.0.xoff(),
            y: self.0.yoff(),
        }
    }

    /// Absolute pixel size along x and y.
    pub fn resolution(&self) -> (f64, f64) {
        (self.0.a().abs(), self.0.e().abs())
    }

    /// Same origin and axis directions, pixel size `resolution`.
    pub fn with_resolution(&self, resolution: f64) -> Self {
        Self(AffineTransform::new(
            resolution.copysign(self.0.a()),
            0.,
            self.0.xoff(),
            0.,
            resolution.copysign(self.0.e()),
            self.0.yoff(),
        ))
    }

    pub fn pixel_to_geo(&self, col: f64, row: f64) -> Coord {
        self.0.apply(Coord { x: col, y: row })
    }

    /// Fractional `(col, row)` of a geo coordinate.
    pub fn geo_to_pixel(&self, coord: Coord) -> Option<(f64, f64)> {
        self.0
            .inverse()
            .map(|inverse| inverse.apply(coord))
            .map(|pixel| (pixel.x, pixel.y))
    }

    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.to_gdal()
            .iter()
            .zip(other.to_gdal())
            .all(|(lhs, rhs)| (lhs - rhs).abs() <= tolerance)
    }
}
