//! # basinflow core
//!
//! Core types and persistence for the basinflow watershed engine.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid shared by every analysis stage
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS`: coordinate reference system identifier
//! - `FlowDir`: D8 flow direction cell value
//! - `PourPoint`: labelled outlet coordinate
//! - GeoTIFF I/O that preserves grid metadata on round-trip

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{FlowDir, GeoTransform, Raster, RasterElement};
pub use vector::PourPoint;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{FlowDir, GeoTransform, Raster, RasterElement};
    pub use crate::vector::PourPoint;
    pub use crate::Algorithm;
}

/// Core trait for grid-to-grid analysis stages.
///
/// Stages are pure functions: they borrow their input grid read-only and
/// return a freshly owned output.
pub trait Algorithm {
    /// Input type for the stage
    type Input;
    /// Output type for the stage
    type Output;
    /// Parameters controlling stage behavior
    type Params: Default;
    /// Error type for stage execution
    type Error: std::error::Error;

    /// Returns the stage name
    fn name(&self) -> &'static str;

    /// Returns a description of what the stage does
    fn description(&self) -> &'static str;

    /// Execute the stage
    fn execute(&self, input: &Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: &Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
