//! Zonal reductions of metric grids
//!
//! - **zonal**: statistics over a boolean mask (a watershed) or over the
//!   zones of a basin label grid

pub mod zonal;

pub use zonal::{masked_mean, masked_statistics, zonal_statistics, MaskedStatistics};
