//! Zonal statistics
//!
//! Reduces a metric grid over the cells selected by a watershed mask, or
//! over every zone of a basin label grid. No-data cells of the metric are
//! skipped.

use basinflow_core::raster::Raster;
use basinflow_core::{Error, RasterElement, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Summary of the valid metric cells inside a zone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskedStatistics {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

/// Running sums for one zone
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    count: usize,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn push(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.sum_sq += v * v;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    fn finish(self) -> Option<MaskedStatistics> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        Some(MaskedStatistics {
            count: self.count,
            mean,
            min: self.min,
            max: self.max,
            std_dev: variance.sqrt(),
        })
    }
}

/// Statistics of `values` over the cells where `mask` is true.
///
/// # Errors
/// - `GridMismatch` when the grids differ in shape, transform or CRS
/// - `EmptyMask` when no masked cell holds a valid value
pub fn masked_statistics(values: &Raster<f64>, mask: &Raster<bool>) -> Result<MaskedStatistics> {
    values.ensure_same_grid(mask)?;
    let mask_nodata = mask.nodata();

    let mut acc = Accumulator::new();
    for (&v, &m) in values.data().iter().zip(mask.data().iter()) {
        if m && !m.is_nodata(mask_nodata) && !values.is_nodata(v) {
            acc.push(v);
        }
    }
    acc.finish().ok_or(Error::EmptyMask)
}

/// Arithmetic mean of `values` over the cells where `mask` is true.
///
/// # Errors
/// Same as [`masked_statistics`].
pub fn masked_mean(values: &Raster<f64>, mask: &Raster<bool>) -> Result<f64> {
    masked_statistics(values, mask).map(|s| s.mean)
}

/// Statistics of `values` for every zone of a label grid.
///
/// Zones without valid values and the label grid's no-data zone are left
/// out of the result.
///
/// # Errors
/// `GridMismatch` when the grids differ in shape, transform or CRS.
pub fn zonal_statistics(values: &Raster<f64>, zones: &Raster<u32>) -> Result<BTreeMap<u32, MaskedStatistics>> {
    values.ensure_same_grid(zones)?;
    let zone_nodata = zones.nodata();

    let mut zone_acc: BTreeMap<u32, Accumulator> = BTreeMap::new();
    for (&v, &z) in values.data().iter().zip(zones.data().iter()) {
        if z.is_nodata(zone_nodata) || values.is_nodata(v) {
            continue;
        }
        zone_acc.entry(z).or_insert_with(Accumulator::new).push(v);
    }

    Ok(zone_acc
        .into_iter()
        .filter_map(|(zone, acc)| acc.finish().map(|s| (zone, s)))
        .collect())
}
