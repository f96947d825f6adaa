use log::debug;
use ndarray::{s, Array2};

use crate::{
    components::raster::MaskedBand,
    errors::{Result, SensorioError},
};

/// Lee filter over single look intensity.
///
/// Local statistics only use valid cells of the `window` x `window`
/// neighbourhood. The mask is unchanged.
pub fn lee_filter(band: &MaskedBand, window: usize) -> Result<MaskedBand> {
    if window % 2 == 0 || window < 3 {
        return Err(SensorioError::InvalidProduct(format!(
            "speckle filter window must be odd and at least 3, got {window}"
        )));
    }
    debug!("lee filter {band:?} with window {window}");

    let half = window / 2;
    let (rows, cols) = band.shape();
    let (data, mask) = (band.data(), band.mask());
    // Coefficient of variation of fully developed speckle for one look.
    let cu: f64 = 1.;

    let filtered = Array2::from_shape_fn((rows, cols), |(row, col)| {
        let center = data[[row, col]];
        if mask[[row, col]] {
            return center;
        }
        let rows_range = row.saturating_sub(half)..(row + half + 1).min(rows);
        let cols_range = col.saturating_sub(half)..(col + half + 1).min(cols);
        let (count, sum, sum_sq) = data
            .slice(s![rows_range.clone(), cols_range.clone()])
            .iter()
            .zip(mask.slice(s![rows_range, cols_range]).iter())
            .filter(|(_, masked)| !**masked)
            .fold((0usize, 0f64, 0f64), |(count, sum, sum_sq), (value, _)| {
                let value = *value as f64;
                (count + 1, sum + value, sum_sq + value * value)
            });

        let mean = sum / count as f64;
        if mean <= 0. {
            return center;
        }
        let variance = (sum_sq / count as f64 - mean * mean).max(0.);
        let cv = variance.sqrt() / mean;
        let weight = if cv > cu {
            (cv * cv - cu * cu) / (cv * cv * (1. + cu * cu))
        } else {
            0.
        };
        (mean + weight * (center as f64 - mean)) as f32
    });

    MaskedBand::new(filtered, band.mask().to_owned(), band.grid().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::{bounds::Grid, transforms::GeoTransform},
        crs_geo::Crs,
    };
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn band(data: Array2<f32>, mask: Array2<bool>) -> MaskedBand {
        let grid = Grid::new(
            GeoTransform::new(0., 10., 0., -10.),
            Crs::from_epsg(32631),
            data.dim(),
        );
        MaskedBand::new(data, mask, grid).unwrap()
    }

    #[test]
    fn homogeneous_area_is_smoothed_to_mean() {
        let mut data = Array2::from_elem((5, 5), 0.1f32);
        data[[2, 2]] = 0.13;
        let filtered = lee_filter(&band(data, Array2::from_elem((5, 5), false)), 3).unwrap();
        let expected = (0.1 * 8. + 0.13) / 9.;
        assert_relative_eq!(filtered.data()[[2, 2]], expected, epsilon = 1e-6);
    }

    #[test]
    fn masked_cells_do_not_contribute() {
        let mut data = Array2::from_elem((3, 3), 0.2f32);
        data[[0, 0]] = 1000.;
        let mut mask = Array2::from_elem((3, 3), false);
        mask[[0, 0]] = true;
        let filtered = lee_filter(&band(data, mask.clone()), 3).unwrap();
        assert_relative_eq!(filtered.data()[[1, 1]], 0.2, epsilon = 1e-6);
        assert_eq!(filtered.mask(), mask);
    }

    #[rstest]
    #[case(4)]
    #[case(1)]
    fn invalid_window(#[case] window: usize) {
        let source = band(Array2::zeros((3, 3)), Array2::from_elem((3, 3), false));
        assert!(lee_filter(&source, window).is_err());
    }
}
