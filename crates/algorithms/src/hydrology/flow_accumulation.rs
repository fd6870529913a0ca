//! D8 flow accumulation
//!
//! Counts, for every cell, the cells that drain through it (itself
//! included). The D8 direction grid is a forest rooted at outlets, so one
//! topological pass from the sources downstream settles every count.

use super::neighbor;
use basinflow_core::raster::{FlowDir, Raster};
use basinflow_core::{Error, Result};
use ndarray::Array2;
use std::collections::VecDeque;

/// Compute flow accumulation from a D8 flow direction grid.
///
/// Valid cells start at 1 and pass their total to their downstream cell,
/// processed in Kahn topological order. No-data cells hold 0, which is also
/// the output's no-data value. Flow into a no-data cell or off the grid
/// leaves the domain.
///
/// # Errors
/// - `InvalidInput` for an empty grid or a grid without valid cells
/// - `InvalidInput` when the directions contain a cycle
pub fn flow_accumulation(flow_dir: &Raster<FlowDir>) -> Result<Raster<u32>> {
    if flow_dir.is_empty() || flow_dir.valid_count() == 0 {
        return Err(Error::InvalidInput(
            "flow direction grid has no valid cells".to_string(),
        ));
    }

    let (rows, cols) = flow_dir.shape();
    let dirs = flow_dir.data();

    let downstream = |row: usize, col: usize| -> Option<(usize, usize)> {
        let k = dirs[(row, col)].index()?;
        let n = neighbor(row, col, k, rows, cols)?;
        (dirs[n] != FlowDir::NoData).then_some(n)
    };

    let mut in_degree = Array2::<u8>::zeros((rows, cols));
    let mut acc = Array2::<u32>::zeros((rows, cols));
    let mut valid = 0usize;

    for row in 0..rows {
        for col in 0..cols {
            if dirs[(row, col)] == FlowDir::NoData {
                continue;
            }
            valid += 1;
            acc[(row, col)] = 1;
            if let Some(n) = downstream(row, col) {
                in_degree[n] += 1;
            }
        }
    }

    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    for row in 0..rows {
        for col in 0..cols {
            if dirs[(row, col)] != FlowDir::NoData && in_degree[(row, col)] == 0 {
                queue.push_back((row, col));
            }
        }
    }

    let mut processed = 0usize;
    while let Some((row, col)) = queue.pop_front() {
        processed += 1;
        if let Some(n) = downstream(row, col) {
            acc[n] += acc[(row, col)];
            in_degree[n] -= 1;
            if in_degree[n] == 0 {
                queue.push_back(n);
            }
        }
    }

    if processed < valid {
        return Err(Error::InvalidInput(format!(
            "flow directions contain a cycle through {} cells",
            valid - processed
        )));
    }

    flow_dir.derive(acc, Some(0))
}
