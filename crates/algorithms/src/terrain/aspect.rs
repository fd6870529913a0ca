//! Aspect calculation from DEMs
//!
//! Compass bearing of the steepest downslope direction, in degrees
//! clockwise from north (0 = N, 90 = E, 180 = S, 270 = W).

use super::{cell_steps, horn_gradient, window3};
use crate::maybe_rayon::*;
use basinflow_core::raster::Raster;
use basinflow_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Aspect value of cells without a gradient
pub const FLAT_ASPECT: f64 = -1.0;

/// Gradient magnitude below which a cell counts as flat
const FLAT_THRESHOLD: f64 = 1e-10;

/// Aspect algorithm
#[derive(Debug, Clone, Default)]
pub struct Aspect;

impl Algorithm for Aspect {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Aspect"
    }

    fn description(&self) -> &'static str {
        "Calculate downslope direction in degrees clockwise from north"
    }

    fn execute(&self, input: &Self::Input, _params: Self::Params) -> Result<Self::Output> {
        aspect(input)
    }
}

/// Calculate aspect from a DEM.
///
/// Flat cells get [`FLAT_ASPECT`]; no-data cells stay no-data (`NaN`).
pub fn aspect(dem: &Raster<f64>) -> Result<Raster<f64>> {
    dem.validate()?;
    let (rows, cols) = dem.shape();
    let (dx, dy) = cell_steps(dem);

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let Some(w) = window3(dem, row, col) else {
                    continue;
                };
                let (dz_dx, dz_dy) = horn_gradient(&w, dx, dy);

                if dz_dx.abs() < FLAT_THRESHOLD && dz_dy.abs() < FLAT_THRESHOLD {
                    row_data[col] = FLAT_ASPECT;
                    continue;
                }

                // Descent direction: east component -dz/dx, north component
                // +dz/dy (dz/dy is taken southward)
                let bearing = (-dz_dx).atan2(dz_dy).to_degrees();
                row_data[col] = if bearing < 0.0 { bearing + 360.0 } else { bearing };
            }
            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    dem.derive(data, Some(f64::NAN))
}
