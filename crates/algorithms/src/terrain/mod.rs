//! Terrain metrics derived from elevation and flow accumulation
//!
//! - [`slope`]: steepest gradient, degrees by default
//! - [`aspect`]: downslope bearing clockwise from north, -1 on flats
//! - [`tri`]: Terrain Ruggedness Index (Riley et al. 1999)
//! - [`twi`]: Topographic Wetness Index ln(a / tan β)
//! - [`hillshade`]: shaded relief
//!
//! Gradients use Horn's (1981) 3x3 kernel. Neighbors that fall off the grid
//! or on no-data are extrapolated from the opposite side, so edge cells get
//! a one-sided estimate instead of no-data.

mod aspect;
mod hillshade;
mod slope;
mod tri;
mod twi;

pub use aspect::{aspect, Aspect, FLAT_ASPECT};
pub use hillshade::{hillshade, Hillshade, HillshadeParams};
pub use slope::{slope, Slope, SlopeParams, SlopeUnits};
pub use tri::{tri, Tri, TriParams};
pub use twi::{twi, TwiParams};

use basinflow_core::raster::Raster;
use basinflow_core::Result;

/// Per-cell terrain metric grids of one DEM
#[derive(Debug, Clone)]
pub struct TerrainMetrics {
    /// Slope in degrees
    pub slope: Raster<f64>,
    /// Aspect in degrees clockwise from north, [`FLAT_ASPECT`] on flats
    pub aspect: Raster<f64>,
    /// Terrain Ruggedness Index
    pub ruggedness: Raster<f64>,
    /// Topographic Wetness Index
    pub wetness: Raster<f64>,
}

/// Compute slope, aspect, ruggedness and wetness for a conditioned DEM and
/// its flow accumulation.
///
/// # Errors
/// `GridMismatch` when the two grids differ in shape, transform or CRS.
pub fn terrain_metrics(
    dem: &Raster<f64>,
    accumulation: &Raster<u32>,
    tri_params: TriParams,
    twi_params: TwiParams,
) -> Result<TerrainMetrics> {
    dem.ensure_same_grid(accumulation)?;
    let slope = slope(dem, SlopeParams::default())?;
    let aspect = aspect(dem)?;
    let ruggedness = tri(dem, tri_params)?;
    let wetness = twi(accumulation, &slope, twi_params)?;
    Ok(TerrainMetrics {
        slope,
        aspect,
        ruggedness,
        wetness,
    })
}

/// 3x3 window `[a, b, c, d, e, f, g, h, i]` centered on (row, col):
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
/// `None` when the center is no-data. An off-grid or no-data neighbor is
/// extrapolated linearly through the center from its opposite neighbor, or
/// takes the center value when that one is missing too.
pub(crate) fn window3(dem: &Raster<f64>, row: usize, col: usize) -> Option<[f64; 9]> {
    let (rows, cols) = dem.shape();
    let z = dem.data();
    let e = z[(row, col)];
    if dem.is_nodata(e) {
        return None;
    }

    let sample = |dr: isize, dc: isize| -> Option<f64> {
        let r = row as isize + dr;
        let c = col as isize + dc;
        if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
            return None;
        }
        let v = z[(r as usize, c as usize)];
        (!dem.is_nodata(v)).then_some(v)
    };

    let mut w = [e; 9];
    for dr in -1isize..=1 {
        for dc in -1isize..=1 {
            w[((dr + 1) * 3 + dc + 1) as usize] = sample(dr, dc)
                .or_else(|| sample(-dr, -dc).map(|opposite| 2.0 * e - opposite))
                .unwrap_or(e);
        }
    }
    Some(w)
}

/// Horn gradient of a window as (dz/dx eastward, dz/dy southward)
pub(crate) fn horn_gradient(w: &[f64; 9], dx: f64, dy: f64) -> (f64, f64) {
    let [a, b, c, d, _, f, g, h, i] = *w;
    let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx);
    let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * dy);
    (dz_dx, dz_dy)
}

/// Ground steps (east per column, south per row) of a grid; the row step is
/// negative for south-up grids so gradients keep their geographic sign
pub(crate) fn cell_steps(dem: &Raster<f64>) -> (f64, f64) {
    let gt = dem.transform();
    (gt.pixel_width, -gt.pixel_height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use basinflow_core::{Error, GeoTransform};

    #[test]
    fn test_window_fills_missing_neighbors() {
        let mut dem = Raster::filled(3, 3, 1.0);
        dem.set_nodata(Some(-9999.0));
        dem.set(0, 0, 7.0).unwrap();
        dem.set(1, 0, -9999.0).unwrap();
        let w = window3(&dem, 0, 1).unwrap();
        assert_eq!(w, [1.0, 1.0, 1.0, 7.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        assert!(window3(&dem, 1, 0).is_none());

        // Linear extrapolation across the frame
        let mut ramp = Raster::new(2, 2);
        ramp.set(0, 1, 3.0).unwrap();
        ramp.set(1, 1, 3.0).unwrap();
        let w = window3(&ramp, 0, 0).unwrap();
        assert_eq!(w[3], -3.0);
        assert_eq!(w[5], 3.0);
    }

    #[test]
    fn test_horn_gradient_plane() {
        // z = 2 * x - 3 * y_south with 10 m cells
        let mut dem = Raster::new(3, 3);
        dem.set_transform(GeoTransform::new(0.0, 30.0, 10.0, -10.0));
        for row in 0..3 {
            for col in 0..3 {
                dem.set(row, col, 20.0 * col as f64 - 30.0 * row as f64).unwrap();
            }
        }
        let (dx, dy) = cell_steps(&dem);
        let (gx, gy) = horn_gradient(&window3(&dem, 1, 1).unwrap(), dx, dy);
        assert_relative_eq!(gx, 2.0, epsilon = 1e-12);
        assert_relative_eq!(gy, -3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_terrain_metrics_require_same_grid() {
        let dem = Raster::filled(4, 4, 1.0);
        let acc: Raster<u32> = Raster::filled(4, 5, 1);
        assert!(matches!(
            terrain_metrics(&dem, &acc, TriParams::default(), TwiParams::default()),
            Err(Error::GridMismatch(_))
        ));
    }
}
