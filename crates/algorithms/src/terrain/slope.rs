//! Slope calculation from DEMs
//!
//! Rate of change of elevation from Horn's (1981) 3x3 kernel:
//! ```text
//! dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * cell_width)
//! dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * cell_height)
//! slope = atan(sqrt(dz/dx² + dz/dy²))
//! ```

use super::{cell_steps, horn_gradient, window3};
use crate::maybe_rayon::*;
use basinflow_core::raster::Raster;
use basinflow_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlopeUnits {
    /// Degrees (0-90)
    #[default]
    Degrees,
    /// Percent rise (0-infinity)
    Percent,
    /// Radians (0-π/2)
    Radians,
}

/// Parameters for slope calculation
#[derive(Debug, Clone)]
pub struct SlopeParams {
    /// Output units
    pub units: SlopeUnits,
    /// Multiplier converting elevation units to ground units
    pub z_factor: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            units: SlopeUnits::Degrees,
            z_factor: 1.0,
        }
    }
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Calculate slope from a DEM using Horn's method"
    }

    fn execute(&self, input: &Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(input, params)
    }
}

/// Calculate slope from a DEM.
///
/// No-data cells stay no-data (`NaN`); every valid cell, edges included,
/// gets a value.
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    dem.validate()?;
    let (rows, cols) = dem.shape();
    let (dx, dy) = cell_steps(dem);
    let z_factor = params.z_factor;

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let Some(w) = window3(dem, row, col) else {
                    continue;
                };
                let (gx, gy) = horn_gradient(&w, dx, dy);
                let slope_rad = (z_factor * gx.hypot(gy)).atan();

                row_data[col] = match params.units {
                    SlopeUnits::Degrees => slope_rad.to_degrees(),
                    SlopeUnits::Percent => slope_rad.tan() * 100.0,
                    SlopeUnits::Radians => slope_rad,
                };
            }
            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    dem.derive(data, Some(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use basinflow_core::GeoTransform;

    fn create_tilted_plane() -> Raster<f64> {
        // Rises 1 m per 1 m cell eastward: 45°
        let mut dem = Raster::new(5, 5);
        dem.set_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0));
        for row in 0..5 {
            for col in 0..5 {
                dem.set(row, col, col as f64).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_slope_45_degrees() {
        let result = slope(&create_tilted_plane(), SlopeParams::default()).unwrap();
        assert_relative_eq!(result.get(2, 2).unwrap(), 45.0, epsilon = 1e-10);
        assert_relative_eq!(result.get(0, 2).unwrap(), 45.0, epsilon = 1e-10);
    }

    #[test]
    fn test_slope_units() {
        let dem = create_tilted_plane();
        let pct = slope(&dem, SlopeParams { units: SlopeUnits::Percent, ..Default::default() }).unwrap();
        assert_relative_eq!(pct.get(2, 2).unwrap(), 100.0, epsilon = 1e-8);
        let rad = slope(&dem, SlopeParams { units: SlopeUnits::Radians, ..Default::default() }).unwrap();
        assert_relative_eq!(rad.get(2, 2).unwrap(), std::f64::consts::FRAC_PI_4, epsilon = 1e-10);
    }

    #[test]
    fn test_slope_flat_and_nodata() {
        let mut dem = Raster::filled(4, 4, 100.0);
        dem.set_nodata(Some(-9999.0));
        dem.set(1, 1, -9999.0).unwrap();
        let result = slope(&dem, SlopeParams::default()).unwrap();
        assert!(result.get(1, 1).unwrap().is_nan());
        assert_relative_eq!(result.get(2, 2).unwrap(), 0.0);
    }
}
