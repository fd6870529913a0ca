//! Topographic Wetness Index (TWI)
//!
//! TWI = ln(a / tan(β))
//! where a = specific catchment area (contributing area per unit contour
//! width) and β = local slope. Slope is clamped to a minimum so flat cells
//! get a large finite index instead of infinity.
//!
//! High TWI values indicate areas prone to saturation.

use crate::maybe_rayon::*;
use basinflow_core::raster::Raster;
use basinflow_core::{Error, RasterElement, Result};
use ndarray::Array2;

/// Parameters for TWI calculation
#[derive(Debug, Clone)]
pub struct TwiParams {
    /// Slope floor in degrees
    pub min_slope: f64,
}

impl Default for TwiParams {
    fn default() -> Self {
        Self { min_slope: 0.1 }
    }
}

/// Compute the Topographic Wetness Index.
///
/// # Arguments
/// * `accumulation` - Contributing cell counts (self included)
/// * `slope_deg` - Slope in degrees on the same grid
///
/// Specific catchment area is `count * cell_area / cell_width`. Cells that
/// are no-data in either input are no-data (`NaN`) in the output.
///
/// # Errors
/// - `GridMismatch` when the grids differ in shape, transform or CRS
/// - `InvalidInput` for a non-positive or non-finite `min_slope`
pub fn twi(accumulation: &Raster<u32>, slope_deg: &Raster<f64>, params: TwiParams) -> Result<Raster<f64>> {
    accumulation.ensure_same_grid(slope_deg)?;
    if !params.min_slope.is_finite() || params.min_slope <= 0.0 || params.min_slope >= 90.0 {
        return Err(Error::InvalidInput(format!(
            "minimum slope must be within (0, 90) degrees, got {}",
            params.min_slope
        )));
    }

    let (rows, cols) = accumulation.shape();
    let gt = accumulation.transform();
    let contour_width = gt.cell_size();
    let cell_area = gt.cell_area();
    let min_tan = params.min_slope.to_radians().tan();
    let acc_nodata = accumulation.nodata();
    let acc = accumulation.data();
    let slope = slope_deg.data();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let count = acc[(row, col)];
                let beta = slope[(row, col)];
                if count.is_nodata(acc_nodata) || slope_deg.is_nodata(beta) {
                    continue;
                }

                let sca = count as f64 * cell_area / contour_width;
                let tan_beta = beta.to_radians().tan().max(min_tan);
                row_data[col] = (sca / tan_beta).ln();
            }
            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    accumulation.derive(data, Some(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use basinflow_core::GeoTransform;

    fn grids(acc: u32, slope: f64) -> (Raster<u32>, Raster<f64>) {
        let gt = GeoTransform::new(0.0, 50.0, 10.0, -10.0);
        let mut a = Raster::filled(5, 5, acc);
        a.set_transform(gt);
        let mut s = Raster::filled(5, 5, slope);
        s.set_transform(gt);
        (a, s)
    }

    #[test]
    fn test_twi_basic() {
        let (acc, slope) = grids(10, 45.0);
        let result = twi(&acc, &slope, TwiParams::default()).unwrap();
        // a = 10 cells * 100 m² / 10 m = 100, tan 45° = 1
        assert_relative_eq!(result.get(2, 2).unwrap(), 100.0_f64.ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_twi_clamps_flat_slope() {
        let (acc, slope) = grids(1, 0.0);
        let result = twi(&acc, &slope, TwiParams { min_slope: 0.1 }).unwrap();
        let expected = (10.0 / 0.1_f64.to_radians().tan()).ln();
        let v = result.get(0, 0).unwrap();
        assert!(v.is_finite());
        assert_relative_eq!(v, expected, epsilon = 1e-10);
    }

    #[test]
    fn test_twi_grid_mismatch() {
        let (acc, _) = grids(1, 1.0);
        let other = Raster::filled(5, 5, 1.0);
        assert!(matches!(
            twi(&acc, &other, TwiParams::default()),
            Err(Error::GridMismatch(_))
        ));
    }

    #[test]
    fn test_twi_nodata_propagates() {
        let (mut acc, mut slope) = grids(4, 10.0);
        acc.set_nodata(Some(0));
        acc.set(0, 0, 0).unwrap();
        slope.set(1, 1, f64::NAN).unwrap();
        let result = twi(&acc, &slope, TwiParams::default()).unwrap();
        assert!(result.get(0, 0).unwrap().is_nan());
        assert!(result.get(1, 1).unwrap().is_nan());
        assert!(result.get(2, 2).unwrap().is_finite());
    }
}
