//! Hydrological analysis
//!
//! Stages in pipeline order:
//! - [`resolve`]: least-cost breaching followed by priority-flood fill
//! - [`route`]: D8 flow direction and flow accumulation
//! - [`extract_streams`]: accumulation threshold
//! - [`snap_pour_point`]: move an outlet onto the nearest stream cell
//! - [`delineate`]: upstream traversal from an outlet
//!
//! Valid cells on the grid frame or next to a no-data cell are *edge* cells:
//! they drain out of the domain, seed the fill, and never count as pits.

mod breach;
mod depression;
mod flow_accumulation;
mod flow_direction;
mod priority_flood;
mod routing;
mod snap;
mod stream_network;
mod watershed;

pub use breach::{breach_depressions, BreachParams};
pub use depression::{find_pits, resolve, DepressionResolver, ResolveParams};
pub use flow_accumulation::flow_accumulation;
pub use flow_direction::flow_direction;
pub use priority_flood::{priority_flood, PriorityFloodParams};
pub use routing::{route, FlowRouter, FlowRouting};
pub use snap::{snap_pour_point, snap_to_stream, SnapParams};
pub use stream_network::{extract_streams, StreamExtractor, StreamParams};
pub use watershed::{delineate, delineate_pour_point, label_basins, label_watersheds};

use basinflow_core::raster::{Raster, D8_OFFSETS};
use ndarray::Array2;

/// Valid-cell mask of an elevation grid
pub(crate) fn valid_mask(dem: &Raster<f64>) -> Array2<bool> {
    dem.data().mapv(|z| !dem.is_nodata(z))
}

/// Valid cells on the grid frame or with at least one no-data neighbor
pub(crate) fn edge_mask(valid: &Array2<bool>) -> Array2<bool> {
    let (rows, cols) = valid.dim();
    let mut edge = Array2::from_elem((rows, cols), false);
    for row in 0..rows {
        for col in 0..cols {
            if !valid[(row, col)] {
                continue;
            }
            edge[(row, col)] = (0..8).any(|k| match neighbor(row, col, k, rows, cols) {
                Some(n) => !valid[n],
                None => true,
            });
        }
    }
    edge
}

/// Neighbor of (row, col) in direction `k` of [`D8_OFFSETS`], `None` off-grid
#[inline]
pub(crate) fn neighbor(row: usize, col: usize, k: usize, rows: usize, cols: usize) -> Option<(usize, usize)> {
    let (dr, dc) = D8_OFFSETS[k];
    let nr = row as isize + dr;
    let nc = col as isize + dc;
    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
        None
    } else {
        Some((nr as usize, nc as usize))
    }
}

/// Ground distance to the neighbor in direction `k`, from the grid's transform
pub(crate) fn neighbor_distances<T: basinflow_core::RasterElement>(grid: &Raster<T>) -> [f64; 8] {
    let gt = grid.transform();
    let mut dist = [0.0; 8];
    for (k, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
        let dx = dc as f64 * gt.pixel_width + dr as f64 * gt.row_rotation;
        let dy = dc as f64 * gt.col_rotation + dr as f64 * gt.pixel_height;
        dist[k] = dx.hypot(dy);
    }
    dist
}
