//! Least-cost depression breaching
//!
//! Removes pits by carving a descending channel from the pit to the nearest
//! cheap escape, instead of raising the pit. Breaching preserves more of
//! the original surface than filling.
//!
//! Algorithm:
//! 1. Find every pit (a non-edge cell strictly lower than all 8 neighbors)
//! 2. For each pit, lowest first, run Dijkstra outward up to `max_length`
//!    cells. Entering a cell costs its height above the pit times the step
//!    distance, so the search prefers short, shallow cuts.
//! 3. The search stops at the first cell lower than the pit. The path is
//!    lowered to a strictly decreasing profile from the pit to that cell.
//!    Reaching the edge of the valid domain is not an escape by itself: a
//!    pit whose only outlets sit at or above its level is left for the fill.
//!
//! Reference:
//! Lindsay, J.B. (2016). Efficient hybrid breaching-filling sink removal
//! methods for flow path enforcement in digital elevation models.
//! *Hydrological Processes*, 30(6), 846–857.

use super::depression::pits_in;
use super::{edge_mask, neighbor, valid_mask};
use basinflow_core::raster::{Raster, D8_DISTANCES};
use basinflow_core::{Error, Result};
use ndarray::Array2;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};

/// Parameters for breaching
#[derive(Debug, Clone)]
pub struct BreachParams {
    /// Longest channel, in cells, the search may carve from a pit.
    /// Pits with no escape within this distance are left in place.
    pub max_length: usize,
    /// Deepest cut allowed at any cell of a channel. A breach that would
    /// cut deeper is skipped entirely.
    pub max_depth: f64,
}

impl Default for BreachParams {
    fn default() -> Self {
        Self {
            max_length: 100,
            max_depth: f64::INFINITY,
        }
    }
}

/// Dijkstra node: accumulated cost, path length in cells, cell
#[derive(Debug, Clone, Copy)]
struct Node {
    cost: f64,
    len: usize,
    row: usize,
    col: usize,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on (cost, len, row-major index)
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.len.cmp(&self.len))
            .then_with(|| (other.row, other.col).cmp(&(self.row, self.col)))
    }
}

/// Breach the pits of a DEM along least-cost channels.
///
/// Elevations are only ever lowered. Pits that cannot be breached within
/// `max_length` cells or `max_depth` are left unresolved; use
/// [`resolve`](super::resolve) to fill them afterwards.
///
/// # Errors
/// `InvalidInput` for an empty grid, a degenerate transform, a grid with no
/// valid cells or a negative `max_depth`.
pub fn breach_depressions(dem: &Raster<f64>, params: BreachParams) -> Result<Raster<f64>> {
    dem.validate()?;
    if params.max_depth.is_nan() || params.max_depth < 0.0 {
        return Err(Error::InvalidInput(format!(
            "maximum breach depth must be non-negative, got {}",
            params.max_depth
        )));
    }

    let valid = valid_mask(dem);
    let edge = edge_mask(&valid);
    let mut z = dem.data().clone();

    let mut pits = pits_in(&z, &valid, &edge);
    pits.sort_by(|a, b| z[*a].total_cmp(&z[*b]).then_with(|| a.cmp(b)));

    for pit in pits {
        // An earlier channel may already drain this cell
        if !is_pit(&z, &valid, &edge, pit) {
            continue;
        }
        if let Some(path) = least_cost_path(&z, &valid, pit, params.max_length) {
            carve(&mut z, &path, params.max_depth);
        }
    }

    dem.derive(z, dem.nodata())
}

pub(crate) fn is_pit(z: &Array2<f64>, valid: &Array2<bool>, edge: &Array2<bool>, (row, col): (usize, usize)) -> bool {
    if !valid[(row, col)] || edge[(row, col)] {
        return false;
    }
    let (rows, cols) = z.dim();
    let center = z[(row, col)];
    (0..8).all(|k| match neighbor(row, col, k, rows, cols) {
        Some(n) => z[n] > center,
        None => false,
    })
}

/// Cells from the pit (first) to the nearest cheap cell lower than the pit
/// (last), or `None` when no such cell lies within `max_length` cells
fn least_cost_path(
    z: &Array2<f64>,
    valid: &Array2<bool>,
    pit: (usize, usize),
    max_length: usize,
) -> Option<Vec<(usize, usize)>> {
    let (rows, cols) = z.dim();
    let pit_z = z[pit];

    let mut best: HashMap<(usize, usize), f64> = HashMap::new();
    let mut parent: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
    let mut heap = BinaryHeap::new();

    best.insert(pit, 0.0);
    heap.push(Node {
        cost: 0.0,
        len: 0,
        row: pit.0,
        col: pit.1,
    });

    while let Some(node) = heap.pop() {
        let cell = (node.row, node.col);
        if best.get(&cell).map_or(false, |&c| node.cost > c) {
            continue;
        }

        if z[cell] < pit_z {
            let mut path = vec![cell];
            let mut cur = cell;
            while let Some(&prev) = parent.get(&cur) {
                path.push(prev);
                cur = prev;
            }
            path.reverse();
            return Some(path);
        }

        if node.len >= max_length {
            continue;
        }

        for k in 0..8 {
            let Some(n) = neighbor(node.row, node.col, k, rows, cols) else {
                continue;
            };
            if !valid[n] || n == pit {
                continue;
            }
            let cost = node.cost + (z[n] - pit_z).max(0.0) * D8_DISTANCES[k];
            let improved = match best.entry(n) {
                Entry::Occupied(mut e) if cost < *e.get() => {
                    e.insert(cost);
                    true
                }
                Entry::Occupied(_) => false,
                Entry::Vacant(e) => {
                    e.insert(cost);
                    true
                }
            };
            if improved {
                parent.insert(n, cell);
                heap.push(Node {
                    cost,
                    len: node.len + 1,
                    row: n.0,
                    col: n.1,
                });
            }
        }
    }

    None
}

/// Lower `path` to a strictly decreasing profile starting at the pit.
/// Leaves the surface untouched when any cut would exceed `max_depth`.
fn carve(z: &mut Array2<f64>, path: &[(usize, usize)], max_depth: f64) {
    let n = path.len() - 1;
    let pit_z = z[path[0]];
    let step = (pit_z - z[path[n]]) / n as f64;

    // The target keeps its elevation; cells between are cut to the line
    let cut = |i: usize| pit_z - i as f64 * step;
    if (1..n).any(|i| z[path[i]] - cut(i) > max_depth) {
        return;
    }
    for i in 1..n {
        let lowered = cut(i);
        let cell = &mut z[path[i]];
        if lowered < *cell {
            *cell = lowered;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::find_pits;
    use approx::assert_relative_eq;
    use basinflow_core::GeoTransform;

    /// Plane falling east, z = 20 - col, with a one-cell pit at (3, 2)
    fn plane_with_pit(pit_z: f64) -> Raster<f64> {
        let mut dem = Raster::new(7, 7);
        dem.set_transform(GeoTransform::new(0.0, 7.0, 1.0, -1.0));
        for row in 0..7 {
            for col in 0..7 {
                dem.set(row, col, 20.0 - col as f64).unwrap();
            }
        }
        dem.set(3, 2, pit_z).unwrap();
        dem
    }

    /// Pit above the east columns, so a lower cell lies three steps away
    fn create_dem_with_pit() -> Raster<f64> {
        plane_with_pit(15.5)
    }

    #[test]
    fn test_breach_removes_pit() {
        let dem = create_dem_with_pit();
        assert_eq!(find_pits(&dem).unwrap(), vec![(3, 2)]);

        let breached = breach_depressions(&dem, BreachParams::default()).unwrap();
        assert!(find_pits(&breached).unwrap().is_empty());
    }

    #[test]
    fn test_breach_never_raises() {
        let dem = create_dem_with_pit();
        let breached = breach_depressions(&dem, BreachParams::default()).unwrap();
        for ((r, c), &z) in dem.data().indexed_iter() {
            assert!(breached.get(r, c).unwrap() <= z);
        }
        // The pit itself keeps its elevation
        assert_eq!(breached.get(3, 2).unwrap(), 15.5);
    }

    #[test]
    fn test_breach_channel_descends() {
        let dem = create_dem_with_pit();
        let breached = breach_depressions(&dem, BreachParams::default()).unwrap();
        let changed: Vec<(usize, usize)> = dem
            .data()
            .indexed_iter()
            .filter(|(idx, &z)| breached.data()[*idx] != z)
            .map(|(idx, _)| idx)
            .collect();
        assert!(!changed.is_empty());
        for cell in changed {
            assert!(breached.data()[cell] < 15.5);
        }
    }

    #[test]
    fn test_breach_channel_reaches_lower_cell() {
        let dem = create_dem_with_pit();
        let breached = breach_depressions(&dem, BreachParams::default()).unwrap();
        // East along row 3, then into column 5 (z = 15) at an even gradient
        assert_relative_eq!(breached.get(3, 3).unwrap(), 15.5 - 0.5 / 3.0);
        assert_relative_eq!(breached.get(3, 4).unwrap(), 15.5 - 1.0 / 3.0);
        assert_eq!(breached.get(3, 5).unwrap(), 15.0);
    }

    #[test]
    fn test_pit_below_every_escape_is_left_for_fill() {
        // Every cell of the grid, frame included, is above the pit
        let dem = plane_with_pit(10.0);
        let breached = breach_depressions(&dem, BreachParams::default()).unwrap();
        assert_eq!(breached.data(), dem.data());
        assert_eq!(find_pits(&breached).unwrap(), vec![(3, 2)]);
    }

    #[test]
    fn test_breach_no_change_on_clean_dem() {
        let mut dem = Raster::new(5, 5);
        for row in 0..5 {
            for col in 0..5 {
                dem.set(row, col, (row + col) as f64).unwrap();
            }
        }
        let breached = breach_depressions(&dem, BreachParams::default()).unwrap();
        assert_eq!(breached.data(), dem.data());
    }

    #[test]
    fn test_breach_respects_length_budget() {
        let dem = create_dem_with_pit();
        let breached = breach_depressions(
            &dem,
            BreachParams {
                max_length: 0,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(breached.data(), dem.data());
    }

    #[test]
    fn test_breach_respects_depth_budget() {
        let dem = create_dem_with_pit();
        let breached = breach_depressions(
            &dem,
            BreachParams {
                max_depth: 0.5,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(find_pits(&breached).unwrap(), vec![(3, 2)]);
    }
}
