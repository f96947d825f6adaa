use geo::{Coord, Rect};

use crate::{
    components::transforms::GeoTransform,
    crs_geo::{Crs, Extent},
    errors::{Result, SensorioError},
};

/// Tolerance, in pixels, when comparing grid origins.
const PIXEL_TOLERANCE: f64 = 1e-6;

/// Georeferenced raster grid.
///
/// `shape` is `(rows, cols)`, the same order as the `Array2` it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub transform: GeoTransform,
    pub crs: Crs,
    pub shape: (usize, usize),
}

/// Pixel window of one grid inside another.
///
/// `offset` is `(row, col)` of the top left pixel, `shape` is `(rows, cols)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub offset: (usize, usize),
    pub shape: (usize, usize),
}

impl Grid {
    pub fn new(transform: GeoTransform, crs: Crs, shape: (usize, usize)) -> Self {
        Self {
            transform,
            crs,
            shape,
        }
    }

    pub fn rows(&self) -> usize {
        self.shape.0
    }

    pub fn cols(&self) -> usize {
        self.shape.1
    }

    /// Pixel size, assuming square pixels.
    pub fn resolution(&self) -> f64 {
        self.transform.resolution().0
    }

    pub fn extent(&self) -> Extent {
        let first = self.transform.pixel_to_geo(0., 0.);
        let last = self
            .transform
            .pixel_to_geo(self.cols() as f64, self.rows() as f64);
        Extent::new(self.crs.clone(), Rect::new(first, last))
    }

    /// Grid over the same area with pixel size `resolution`.
    ///
    /// Each axis keeps at least one pixel.
    pub fn with_resolution(&self, resolution: f64) -> Result<Grid> {
        if !(resolution > 0.) || !resolution.is_finite() {
            return Err(SensorioError::InvalidResolution(resolution));
        }
        let (x_res, y_res) = self.transform.resolution();
        let rows = ((self.rows() as f64 * y_res) / resolution).round().max(1.) as usize;
        let cols = ((self.cols() as f64 * x_res) / resolution).round().max(1.) as usize;
        Ok(Grid::new(
            self.transform.with_resolution(resolution),
            self.crs.clone(),
            (rows, cols),
        ))
    }

    /// Checks that `other` describes the very same pixels.
    pub fn ensure_matches(&self, other: &Grid) -> Result<()> {
        if self.shape != other.shape {
            return Err(SensorioError::GridMismatch(format!(
                "shape {:?} differs from {:?}",
                other.shape, self.shape
            )));
        }
        let tolerance = self.resolution() * PIXEL_TOLERANCE;
        if !self.transform.approx_eq(&other.transform, tolerance) {
            return Err(SensorioError::GridMismatch(format!(
                "transform {:?} differs from {:?}",
                other.transform.to_gdal(),
                self.transform.to_gdal()
            )));
        }
        if !self.crs.same_as(&other.crs) {
            return Err(SensorioError::GridMismatch(format!(
                "crs {} differs from {}",
                other.crs, self.crs
            )));
        }
        Ok(())
    }

    /// Window of `self` read from the larger grid `outer`.
    ///
    /// Both grids must share crs and pixel size, and `outer` must be
    /// pixel aligned with `self` and cover it.
    pub fn window_in(&self, outer: &Grid) -> Result<PixelWindow> {
        if !self.crs.same_as(&outer.crs) {
            return Err(SensorioError::GridMismatch(format!(
                "crs {} differs from {}",
                outer.crs, self.crs
            )));
        }
        let (x_res, y_res) = self.transform.resolution();
        let (outer_x_res, outer_y_res) = outer.transform.resolution();
        let tolerance = x_res * PIXEL_TOLERANCE;
        if (x_res - outer_x_res).abs() > tolerance || (y_res - outer_y_res).abs() > tolerance {
            return Err(SensorioError::GridMismatch(format!(
                "resolution {outer_x_res}x{outer_y_res} differs from {x_res}x{y_res}"
            )));
        }

        let Coord { x, y } = self.transform.origin();
        let (col, row) = outer
            .transform
            .geo_to_pixel(Coord { x, y })
            .ok_or_else(|| SensorioError::GridMismatch("singular transform".into()))?;
        let (col_off, row_off) = (col.round(), row.round());
        if (col - col_off).abs() > 1e-3 || (row - row_off).abs() > 1e-3 {
            return Err(SensorioError::GridMismatch(format!(
                "grids are not pixel aligned, offset ({row}, {col})"
            )));
        }
        if col_off < 0.
            || row_off < 0.
            || row_off as usize + self.rows() > outer.rows()
            || col_off as usize + self.cols() > outer.cols()
        {
            return Err(SensorioError::GridMismatch(format!(
                "grid of shape {:?} at ({row_off}, {col_off}) is not covered by grid of shape {:?}",
                self.shape, outer.shape
            )));
        }
        Ok(PixelWindow {
            offset: (row_off as usize, col_off as usize),
            shape: self.shape,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn grid() -> Grid {
        Grid::new(
            GeoTransform::new(300000., 10., 5000000., -10.),
            Crs::from_epsg(32633),
            (6, 4),
        )
    }

    #[rstest]
    fn extent_spans_all_pixels(grid: Grid) {
        let extent = grid.extent();
        assert_eq!(extent.min(), Coord { x: 300000., y: 4999940. });
        assert_eq!(extent.max(), Coord { x: 300040., y: 5000000. });
    }

    #[rstest]
    #[case(20., (3, 2))]
    #[case(5., (12, 8))]
    #[case(60., (1, 1))]
    fn resolution_change_scales_shape(
        grid: Grid,
        #[case] resolution: f64,
        #[case] shape: (usize, usize),
    ) {
        let resampled = grid.with_resolution(resolution).unwrap();
        assert_eq!(resampled.shape, shape);
        assert_eq!(resampled.resolution(), resolution);
    }

    #[rstest]
    #[case(0.)]
    #[case(-10.)]
    #[case(f64::NAN)]
    fn non_positive_resolution(grid: Grid, #[case] resolution: f64) {
        assert!(matches!(
            grid.with_resolution(resolution),
            Err(SensorioError::InvalidResolution(_))
        ));
    }

    #[rstest]
    fn shape_mismatch(grid: Grid) {
        let mut other = grid.clone();
        other.shape = (6, 5);
        assert!(matches!(
            grid.ensure_matches(&other),
            Err(SensorioError::GridMismatch(_))
        ));
        assert!(grid.ensure_matches(&grid.clone()).is_ok());
    }

    #[rstest]
    fn window_inside_outer_grid(grid: Grid) {
        let outer = Grid::new(
            GeoTransform::new(299980., 10., 5000030., -10.),
            Crs::from_epsg(32633),
            (20, 20),
        );
        let window = grid.window_in(&outer).unwrap();
        assert_eq!(window.offset, (3, 2));
        assert_eq!(window.shape, (6, 4));
    }

    #[rstest]
    fn window_not_covered(grid: Grid) {
        let outer = Grid::new(
            GeoTransform::new(300010., 10., 5000000., -10.),
            Crs::from_epsg(32633),
            (20, 20),
        );
        assert!(matches!(
            grid.window_in(&outer),
            Err(SensorioError::GridMismatch(_))
        ));
    }
}
