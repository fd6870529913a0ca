//! Watershed delineation and basin labelling
//!
//! A watershed is every cell whose chain of D8 successors reaches the
//! outlet. It is found by a breadth-first search up the reversed direction
//! graph: a neighbor belongs to the watershed iff it points at a cell
//! already in it.

use super::neighbor;
use basinflow_core::raster::{FlowDir, Raster};
use basinflow_core::{Error, PourPoint, Result};
use ndarray::Array2;
use std::collections::VecDeque;

/// Label of cells not yet resolved while labelling basins
const UNRESOLVED: u32 = u32::MAX;

/// Delineate the watershed draining to the outlet at map coordinate (x, y).
///
/// The returned mask is `true` on the outlet and every cell upstream of it,
/// `false` elsewhere. It has no no-data value.
///
/// # Errors
/// `InvalidOutlet` when (x, y) is off the grid or on a no-data cell.
pub fn delineate(flow_dir: &Raster<FlowDir>, x: f64, y: f64) -> Result<Raster<bool>> {
    let outlet = outlet_cell(flow_dir, x, y)?;
    let (rows, cols) = flow_dir.shape();
    let dirs = flow_dir.data();

    let mut mask = Array2::from_elem((rows, cols), false);
    let mut queue = VecDeque::new();
    mask[outlet] = true;
    queue.push_back(outlet);

    while let Some((row, col)) = queue.pop_front() {
        for (k, dir) in FlowDir::ALL.iter().enumerate() {
            let Some(n) = neighbor(row, col, k, rows, cols) else {
                continue;
            };
            // The neighbor in direction k drains here iff it points back
            if !mask[n] && dirs[n] == dir.opposite() {
                mask[n] = true;
                queue.push_back(n);
            }
        }
    }

    flow_dir.derive(mask, None)
}

/// Delineate the watershed of a (snapped) pour point
pub fn delineate_pour_point(flow_dir: &Raster<FlowDir>, point: &PourPoint) -> Result<Raster<bool>> {
    delineate(flow_dir, point.x(), point.y())
}

fn outlet_cell(flow_dir: &Raster<FlowDir>, x: f64, y: f64) -> Result<(usize, usize)> {
    let cell = flow_dir.cell_at(x, y).ok_or_else(|| Error::InvalidOutlet {
        x,
        y,
        reason: "outside the flow direction grid".to_string(),
    })?;
    if flow_dir.data()[cell] == FlowDir::NoData {
        return Err(Error::InvalidOutlet {
            x,
            y,
            reason: "on a no-data cell".to_string(),
        });
    }
    Ok(cell)
}

/// Label every drainage basin of the grid.
///
/// Each terminal cell (an outlet, or a cell flowing off the grid or into
/// no-data) starts a basin; basins are numbered from 1 in row-major order
/// of their terminal cell. No-data cells get 0, the output's no-data value.
pub fn label_basins(flow_dir: &Raster<FlowDir>) -> Result<Raster<u32>> {
    let (rows, cols) = flow_dir.shape();
    let dirs = flow_dir.data();

    let mut labels = Array2::from_elem((rows, cols), UNRESOLVED);
    let mut next = 1u32;
    for ((row, col), &d) in dirs.indexed_iter() {
        if d == FlowDir::NoData {
            labels[(row, col)] = 0;
        } else if downstream(dirs, row, col).is_none() {
            labels[(row, col)] = next;
            next += 1;
        }
    }

    propagate_labels(flow_dir, labels)
}

/// Label the watersheds of several pour points at once.
///
/// Cells draining to the i-th point get label `i + 1`. Nested points split
/// the basin: a cell belongs to the first pour point met going downstream.
/// Cells draining to none of the points, and no-data cells, get 0.
///
/// # Errors
/// `InvalidOutlet` when a point is off the grid or on a no-data cell.
pub fn label_watersheds(flow_dir: &Raster<FlowDir>, points: &[PourPoint]) -> Result<Raster<u32>> {
    let (rows, cols) = flow_dir.shape();
    let dirs = flow_dir.data();

    let mut labels = Array2::from_elem((rows, cols), UNRESOLVED);
    for (i, point) in points.iter().enumerate() {
        let cell = outlet_cell(flow_dir, point.x(), point.y())?;
        labels[cell] = i as u32 + 1;
    }
    for ((row, col), &d) in dirs.indexed_iter() {
        if labels[(row, col)] != UNRESOLVED {
            continue;
        }
        if d == FlowDir::NoData || downstream(dirs, row, col).is_none() {
            labels[(row, col)] = 0;
        }
    }

    propagate_labels(flow_dir, labels)
}

fn downstream(dirs: &Array2<FlowDir>, row: usize, col: usize) -> Option<(usize, usize)> {
    let (rows, cols) = dirs.dim();
    let n = dirs[(row, col)].downstream(row, col, rows, cols)?;
    (dirs[n] != FlowDir::NoData).then_some(n)
}

/// Resolve every `UNRESOLVED` cell to the label of the first labelled cell
/// down its flow path
fn propagate_labels(flow_dir: &Raster<FlowDir>, mut labels: Array2<u32>) -> Result<Raster<u32>> {
    let (rows, cols) = labels.dim();
    let dirs = flow_dir.data();
    let mut path = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if labels[(row, col)] != UNRESOLVED {
                continue;
            }
            path.clear();
            let mut cur = (row, col);
            let label = loop {
                if labels[cur] != UNRESOLVED {
                    break labels[cur];
                }
                if path.len() > rows * cols {
                    return Err(Error::InvalidInput(
                        "flow directions contain a cycle".to_string(),
                    ));
                }
                path.push(cur);
                match downstream(dirs, cur.0, cur.1) {
                    Some(n) => cur = n,
                    None => break 0,
                }
            };
            for &cell in &path {
                labels[cell] = label;
            }
        }
    }

    flow_dir.derive(labels, Some(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use basinflow_core::raster::FlowDir::*;
    use basinflow_core::GeoTransform;

    /// Two basins: left half drains to (2, 0), right half to (2, 3)
    fn two_basins() -> Raster<FlowDir> {
        #[rustfmt::skip]
        let dirs = vec![
            South, South,     SouthEast, South,
            South, West,      East,      South,
            Outlet, West,     East,      Outlet,
        ];
        let mut fdir = Raster::from_vec(dirs, 3, 4).unwrap();
        fdir.set_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        fdir.set_nodata(Some(NoData));
        fdir
    }

    #[test]
    fn test_delineate_left_basin() {
        let fdir = two_basins();
        let (x, y) = fdir.pixel_to_geo(0, 2);
        let ws = delineate(&fdir, x, y).unwrap();
        for row in 0..3 {
            for col in 0..4 {
                assert_eq!(ws.get(row, col).unwrap(), col < 2, "cell ({}, {})", row, col);
            }
        }
    }

    #[test]
    fn test_delineate_interior_outlet() {
        let fdir = two_basins();
        let (x, y) = fdir.pixel_to_geo(1, 1);
        let ws = delineate(&fdir, x, y).unwrap();
        let marked: Vec<_> = ws.data().indexed_iter().filter(|(_, &m)| m).map(|(i, _)| i).collect();
        assert_eq!(marked, vec![(0, 1), (1, 1)]);
    }

    #[test]
    fn test_delineate_is_idempotent() {
        let fdir = two_basins();
        let (x, y) = fdir.pixel_to_geo(3, 2);
        let a = delineate(&fdir, x, y).unwrap();
        let b = delineate(&fdir, x, y).unwrap();
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_invalid_outlets() {
        let mut fdir = two_basins();
        assert!(matches!(
            delineate(&fdir, -5.0, 1.0),
            Err(Error::InvalidOutlet { .. })
        ));
        fdir.set(0, 0, NoData).unwrap();
        let (x, y) = fdir.pixel_to_geo(0, 0);
        assert!(matches!(delineate(&fdir, x, y), Err(Error::InvalidOutlet { .. })));
    }

    #[test]
    fn test_label_basins() {
        let labels = label_basins(&two_basins()).unwrap();
        for row in 0..3 {
            for col in 0..4 {
                let expected = if col < 2 { 1 } else { 2 };
                assert_eq!(labels.get(row, col).unwrap(), expected);
            }
        }
    }

    #[test]
    fn test_label_nested_watersheds() {
        let fdir = two_basins();
        let (x0, y0) = fdir.pixel_to_geo(0, 2);
        let (x1, y1) = fdir.pixel_to_geo(1, 1);
        let points = vec![PourPoint::new("lower", x0, y0), PourPoint::new("upper", x1, y1)];
        let labels = label_watersheds(&fdir, &points).unwrap();

        assert_eq!(labels.get(0, 1).unwrap(), 2);
        assert_eq!(labels.get(1, 1).unwrap(), 2);
        assert_eq!(labels.get(2, 1).unwrap(), 1);
        assert_eq!(labels.get(0, 0).unwrap(), 1);
        assert_eq!(labels.get(2, 0).unwrap(), 1);
        assert_eq!(labels.get(1, 3).unwrap(), 0);
    }
}
