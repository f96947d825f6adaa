use ndarray::Array2;
use std::f64::consts::PI;

use crate::{components::raster::MaskedBand, errors::Result};

pub const HILLSHADE_AZIMUTH: f64 = 315.;
pub const HILLSHADE_ALTITUDE: f64 = 45.;

/// Horn gradients `(dz/dx, dz/dy)` of every cell with a full valid 3x3
/// neighbourhood, `None` on borders and next to masked cells.
fn horn_gradients(dem: &MaskedBand) -> Array2<Option<(f64, f64)>> {
    let (rows, cols) = dem.shape();
    let (x_res, y_res) = dem.grid().transform.resolution();
    let (data, mask) = (dem.data(), dem.mask());

    Array2::from_shape_fn((rows, cols), |(row, col)| {
        if row == 0 || col == 0 || row + 1 >= rows || col + 1 >= cols {
            return None;
        }
        let mut window = [[0f64; 3]; 3];
        for (i, window_row) in window.iter_mut().enumerate() {
            for (j, value) in window_row.iter_mut().enumerate() {
                let index = [row + i - 1, col + j - 1];
                if mask[index] {
                    return None;
                }
                *value = data[index] as f64;
            }
        }
        let [[a, b, c], [d, _, f], [g, h, i]] = window;
        let dz_dx = ((c + 2. * f + i) - (a + 2. * d + g)) / (8. * x_res);
        let dz_dy = ((g + 2. * h + i) - (a + 2. * b + c)) / (8. * y_res);
        Some((dz_dx, dz_dy))
    })
}

fn from_gradients(
    dem: &MaskedBand,
    f: impl Fn(f64, f64) -> f64,
) -> Result<MaskedBand> {
    let gradients = horn_gradients(dem);
    let data = gradients.mapv(|gradient| gradient.map_or(0., |(dx, dy)| f(dx, dy)) as f32);
    let mask = gradients.mapv(|gradient| gradient.is_none());
    MaskedBand::new(data, mask, dem.grid().clone())
}

/// Slope in degrees.
pub fn slope(dem: &MaskedBand) -> Result<MaskedBand> {
    from_gradients(dem, |dz_dx, dz_dy| {
        (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees()
    })
}

/// Shaded relief in `[0, 255]`, lit from [HILLSHADE_AZIMUTH] at [HILLSHADE_ALTITUDE].
pub fn hillshade(dem: &MaskedBand) -> Result<MaskedBand> {
    let azimuth = (360. - HILLSHADE_AZIMUTH + 90.).to_radians();
    let zenith = (90. - HILLSHADE_ALTITUDE).to_radians();
    from_gradients(dem, |dz_dx, dz_dy| {
        let slope = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan();
        let aspect = if dz_dx.abs() < 1e-10 && dz_dy.abs() < 1e-10 {
            0.
        } else {
            let aspect = (-dz_dy).atan2(-dz_dx);
            if aspect < 0. {
                2. * PI + aspect
            } else {
                aspect
            }
        };
        let shade =
            zenith.cos() * slope.cos() + zenith.sin() * slope.sin() * (azimuth - aspect).cos();
        (shade.clamp(0., 1.) * 255.).round()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::{bounds::Grid, transforms::GeoTransform},
        crs_geo::Crs,
    };
    use approx::assert_relative_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn tilted() -> MaskedBand {
        // Rises 10 m per 10 m pixel eastwards.
        let data = Array2::from_shape_fn((5, 5), |(_, col)| col as f32 * 10.);
        let grid = Grid::new(
            GeoTransform::new(0., 10., 50., -10.),
            Crs::from_epsg(32631),
            (5, 5),
        );
        MaskedBand::new(data, Array2::from_elem((5, 5), false), grid).unwrap()
    }

    #[rstest]
    fn slope_of_tilted_plane(tilted: MaskedBand) {
        let slope = slope(&tilted).unwrap();
        assert_relative_eq!(slope.data()[[2, 2]], 45., epsilon = 1e-4);
        assert!(slope.mask()[[0, 2]]);
        assert!(!slope.mask()[[1, 1]]);
    }

    #[rstest]
    fn hillshade_range_and_flat(tilted: MaskedBand) {
        let shade = hillshade(&tilted).unwrap();
        assert!(shade.valid_values().all(|value| (0. ..=255.).contains(&value)));

        let flat = MaskedBand::constant(100., tilted.grid().clone());
        let shade = hillshade(&flat).unwrap();
        // cos(45°) * 255
        assert_relative_eq!(shade.data()[[2, 2]], 180.);
    }

    #[rstest]
    fn masked_neighbours_mask_derivatives(tilted: MaskedBand) {
        let mut mask = Array2::from_elem((5, 5), false);
        mask[[1, 1]] = true;
        let dem = tilted.with_mask(mask.view()).unwrap();
        let slope = slope(&dem).unwrap();
        assert!(slope.mask()[[2, 2]]);
        assert!(!slope.mask()[[3, 3]]);
    }
}
