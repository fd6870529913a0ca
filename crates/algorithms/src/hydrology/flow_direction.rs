//! D8 flow direction
//!
//! Each valid cell drains to the neighbor with the steepest downhill drop
//! per unit ground distance. Diagonal distances come from the grid
//! transform, so square cells weigh diagonals by √2.
//!
//! Ties resolve to the first neighbor in scan order, clockwise from east:
//! ```text
//!   6  7  8
//!   5  .  1
//!   4  3  2
//! ```
//! Cells without a downhill valid neighbor become [`FlowDir::Outlet`].

use super::{neighbor, neighbor_distances, valid_mask};
use crate::maybe_rayon::*;
use basinflow_core::raster::{FlowDir, Raster};
use basinflow_core::{Error, Result};
use ndarray::Array2;

/// Compute D8 flow directions from a (conditioned) DEM.
///
/// No-data cells map to [`FlowDir::NoData`], which is also the output's
/// no-data value.
///
/// # Errors
/// `InvalidInput` for an empty grid, a degenerate transform or a grid with
/// no valid cells.
pub fn flow_direction(dem: &Raster<f64>) -> Result<Raster<FlowDir>> {
    dem.validate()?;

    let (rows, cols) = dem.shape();
    let valid = valid_mask(dem);
    let dist = neighbor_distances(dem);
    let z = dem.data();

    let output_data: Vec<FlowDir> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![FlowDir::NoData; cols];

            for col in 0..cols {
                if !valid[(row, col)] {
                    continue;
                }
                let center = z[(row, col)];

                let mut max_drop = 0.0_f64;
                let mut best = FlowDir::Outlet;

                for (k, dir) in FlowDir::ALL.iter().enumerate() {
                    let Some(n) = neighbor(row, col, k, rows, cols) else {
                        continue;
                    };
                    if !valid[n] {
                        continue;
                    }
                    let drop = (center - z[n]) / dist[k];
                    if drop > max_drop {
                        max_drop = drop;
                        best = *dir;
                    }
                }

                row_data[col] = best;
            }

            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    dem.derive(data, Some(FlowDir::NoData))
}
