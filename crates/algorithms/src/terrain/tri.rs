//! Terrain Ruggedness Index (TRI)
//!
//! Elevation heterogeneity around each cell (Riley et al. 1999):
//! ```text
//! TRI = sqrt( sum( (z_neighbor - z_center)² ) / n )
//! ```
//! over the valid neighbors of a square window. High values mean rugged
//! terrain, values near zero smooth terrain.
//!
//! Reference: Riley, S.J., DeGloria, S.D., Elliot, R. (1999)

use crate::maybe_rayon::*;
use basinflow_core::raster::Raster;
use basinflow_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Parameters for TRI calculation
#[derive(Debug, Clone)]
pub struct TriParams {
    /// Neighborhood radius in cells (default 1 → 3x3)
    pub radius: usize,
}

impl Default for TriParams {
    fn default() -> Self {
        Self { radius: 1 }
    }
}

/// TRI algorithm
#[derive(Debug, Clone, Default)]
pub struct Tri;

impl Algorithm for Tri {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = TriParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "TRI"
    }

    fn description(&self) -> &'static str {
        "Terrain Ruggedness Index: elevation variability in a neighborhood"
    }

    fn execute(&self, input: &Self::Input, params: Self::Params) -> Result<Self::Output> {
        tri(input, params)
    }
}

/// Calculate the Terrain Ruggedness Index of a DEM.
///
/// Window cells off the grid or on no-data are left out of the mean; a
/// cell without valid neighbors gets 0.
pub fn tri(dem: &Raster<f64>, params: TriParams) -> Result<Raster<f64>> {
    dem.validate()?;
    if params.radius == 0 {
        return Err(Error::InvalidInput(
            "ruggedness radius must be at least 1".to_string(),
        ));
    }

    let (rows, cols) = dem.shape();
    let r = params.radius as isize;
    let z = dem.data();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let center = z[(row, col)];
                if dem.is_nodata(center) {
                    continue;
                }

                let mut sum_sq = 0.0;
                let mut count = 0usize;
                for dr in -r..=r {
                    for dc in -r..=r {
                        if dr == 0 && dc == 0 {
                            continue;
                        }
                        let nr = row as isize + dr;
                        let nc = col as isize + dc;
                        if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                            continue;
                        }
                        let v = z[(nr as usize, nc as usize)];
                        if dem.is_nodata(v) {
                            continue;
                        }
                        sum_sq += (v - center) * (v - center);
                        count += 1;
                    }
                }

                row_data[col] = if count > 0 {
                    (sum_sq / count as f64).sqrt()
                } else {
                    0.0
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

    #[test]
    fn test_tri_flat_is_zero() {
        let dem = Raster::filled(5, 5, 100.0);
        let result = tri(&dem, TriParams::default()).unwrap();
        for &v in result.data().iter() {
            assert_relative_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_tri_spike() {
        let mut dem = Raster::filled(5, 5, 0.0);
        dem.set(2, 2, 8.0).unwrap();
        let result = tri(&dem, TriParams::default()).unwrap();
        assert_relative_eq!(result.get(2, 2).unwrap(), 8.0, epsilon = 1e-10);
        // (1, 1) has one differing neighbor among eight
        assert_relative_eq!(result.get(1, 1).unwrap(), (64.0_f64 / 8.0).sqrt(), epsilon = 1e-10);
        // (0, 0) sees three neighbors, none of them the spike
        assert_relative_eq!(result.get(0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_tri_radius_widens_window() {
        let mut dem = Raster::filled(5, 5, 0.0);
        dem.set(0, 0, 24.0).unwrap();
        let r1 = tri(&dem, TriParams { radius: 1 }).unwrap();
        let r2 = tri(&dem, TriParams { radius: 2 }).unwrap();
        assert_relative_eq!(r1.get(2, 2).unwrap(), 0.0);
        assert_relative_eq!(r2.get(2, 2).unwrap(), (576.0_f64 / 24.0).sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn test_tri_rejects_zero_radius() {
        let dem = Raster::filled(3, 3, 1.0);
        assert!(tri(&dem, TriParams { radius: 0 }).is_err());
    }
}
