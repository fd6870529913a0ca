//! Hillshade (shaded relief) calculation
//!
//! Illumination of each cell by a distant light source, from the Horn
//! gradient and the sun's azimuth and altitude:
//! ```text
//! shade = cos(zenith) * cos(slope) + sin(zenith) * sin(slope) * cos(azimuth - aspect)
//! ```

use super::{cell_steps, horn_gradient, window3};
use crate::maybe_rayon::*;
use basinflow_core::raster::Raster;
use basinflow_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Parameters for hillshade calculation
#[derive(Debug, Clone)]
pub struct HillshadeParams {
    /// Sun azimuth in degrees (0 = North, clockwise)
    pub azimuth: f64,
    /// Sun altitude in degrees above horizon (0-90)
    pub altitude: f64,
    /// Z-factor for vertical exaggeration
    pub z_factor: f64,
    /// Output range: false = 0-255, true = 0.0-1.0
    pub normalized: bool,
}

impl Default for HillshadeParams {
    fn default() -> Self {
        Self {
            azimuth: 315.0,
            altitude: 45.0,
            z_factor: 1.0,
            normalized: false,
        }
    }
}

/// Hillshade algorithm
#[derive(Debug, Clone, Default)]
pub struct Hillshade;

impl Algorithm for Hillshade {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = HillshadeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Hillshade"
    }

    fn description(&self) -> &'static str {
        "Calculate shaded relief from a DEM"
    }

    fn execute(&self, input: &Self::Input, params: Self::Params) -> Result<Self::Output> {
        hillshade(input, params)
    }
}

/// Calculate hillshade from a DEM.
///
/// Values are in 0-255, or 0.0-1.0 when `normalized`. No-data cells stay
/// no-data (`NaN`).
pub fn hillshade(dem: &Raster<f64>, params: HillshadeParams) -> Result<Raster<f64>> {
    dem.validate()?;
    if !(0.0..=90.0).contains(&params.altitude) {
        return Err(Error::InvalidInput(format!(
            "sun altitude must be within 0-90 degrees, got {}",
            params.altitude
        )));
    }

    let (rows, cols) = dem.shape();
    let (dx, dy) = cell_steps(dem);

    let azimuth_rad = params.azimuth.to_radians();
    let zenith_rad = (90.0 - params.altitude).to_radians();
    let (sin_zenith, cos_zenith) = zenith_rad.sin_cos();
    let scale = if params.normalized { 1.0 } else { 255.0 };

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let Some(w) = window3(dem, row, col) else {
                    continue;
                };
                let (dz_dx, dz_dy) = horn_gradient(&w, dx, dy);
                let (gx, gy) = (dz_dx * params.z_factor, dz_dy * params.z_factor);

                let slope_rad = gx.hypot(gy).atan();
                // Downslope bearing, clockwise from north
                let aspect_rad = (-gx).atan2(gy);

                let shade = cos_zenith * slope_rad.cos()
                    + sin_zenith * slope_rad.sin() * (azimuth_rad - aspect_rad).cos();

                row_data[col] = shade.clamp(0.0, 1.0) * scale;
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

    fn slope_facing(east: bool) -> Raster<f64> {
        let mut dem = Raster::new(5, 5);
        dem.set_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0));
        for row in 0..5 {
            for col in 0..5 {
                let z = if east { 10.0 - col as f64 } else { col as f64 };
                dem.set(row, col, z).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_flat_surface() {
        let dem = Raster::filled(5, 5, 100.0);
        let result = hillshade(&dem, HillshadeParams::default()).unwrap();
        // cos(45°) * 255
        assert_relative_eq!(result.get(2, 2).unwrap(), 45.0_f64.to_radians().cos() * 255.0, epsilon = 1e-9);
    }

    #[test]
    fn test_lit_side_is_brighter() {
        let params = HillshadeParams { azimuth: 270.0, ..Default::default() };
        let west_facing = hillshade(&slope_facing(false), params.clone()).unwrap();
        let east_facing = hillshade(&slope_facing(true), params).unwrap();
        assert!(west_facing.get(2, 2).unwrap() > east_facing.get(2, 2).unwrap());
    }

    #[test]
    fn test_normalized_range() {
        let params = HillshadeParams { normalized: true, ..Default::default() };
        let result = hillshade(&slope_facing(true), params).unwrap();
        for &v in result.data().iter() {
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
