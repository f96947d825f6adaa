use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{components::raster::MaskedBand, errors::Result};

/// Resampling rule used when a band is brought to a requested resolution.
///
/// The mask always follows nearest neighbour, so a resampled cell is
/// valid exactly when its nearest source cell is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resampling {
    Nearest,
    /// Weighted over the valid cells of the 2x2 neighbourhood.
    Bilinear,
}

/// Source pixel coordinate of the centre of destination pixel `index`.
fn source_coord(index: usize, scale: f64) -> f64 {
    (index as f64 + 0.5) * scale - 0.5
}

fn nearest_index(coord: f64, len: usize) -> usize {
    (coord.round().max(0.) as usize).min(len - 1)
}

impl MaskedBand {
    /// Band on a grid over the same area with pixel size `resolution`.
    pub fn resample(&self, resolution: f64, rule: Resampling) -> Result<MaskedBand> {
        let grid = self.grid().with_resolution(resolution)?;
        if grid.shape == self.shape() && grid.transform == self.grid().transform {
            return Ok(self.clone());
        }
        debug!(
            "resample {self:?} to {resolution} with {rule:?}, new shape {:?}",
            grid.shape
        );

        let (src_rows, src_cols) = self.shape();
        let row_scale = src_rows as f64 / grid.rows() as f64;
        let col_scale = src_cols as f64 / grid.cols() as f64;
        let (data, mask) = (self.data(), self.mask());

        let nearest = |row: usize, col: usize| {
            (
                nearest_index(source_coord(row, row_scale), src_rows),
                nearest_index(source_coord(col, col_scale), src_cols),
            )
        };

        let new_mask = Array2::from_shape_fn(grid.shape, |(row, col)| mask[nearest(row, col)]);
        let new_data = match rule {
            Resampling::Nearest => {
                Array2::from_shape_fn(grid.shape, |(row, col)| data[nearest(row, col)])
            }
            Resampling::Bilinear => Array2::from_shape_fn(grid.shape, |(row, col)| {
                if new_mask[[row, col]] {
                    return 0.;
                }
                let y = source_coord(row, row_scale).clamp(0., (src_rows - 1) as f64);
                let x = source_coord(col, col_scale).clamp(0., (src_cols - 1) as f64);
                let (y0, x0) = (y.floor() as usize, x.floor() as usize);
                let (y1, x1) = ((y0 + 1).min(src_rows - 1), (x0 + 1).min(src_cols - 1));
                let (dy, dx) = (y - y0 as f64, x - x0 as f64);

                let neighbours = [
                    ((y0, x0), (1. - dy) * (1. - dx)),
                    ((y0, x1), (1. - dy) * dx),
                    ((y1, x0), dy * (1. - dx)),
                    ((y1, x1), dy * dx),
                ];
                let (sum, weight) = neighbours
                    .into_iter()
                    .filter(|(index, weight)| !mask[*index] && *weight > 0.)
                    .fold((0., 0.), |(sum, total), (index, weight)| {
                        (sum + data[index] as f64 * weight, total + weight)
                    });
                if weight > 0. {
                    (sum / weight) as f32
                } else {
                    data[nearest(row, col)]
                }
            }),
        };

        MaskedBand::new(new_data, new_mask, grid)
    }
}
