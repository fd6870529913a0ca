//! Error types for basinflow

use thiserror::Error;

/// Main error type for basinflow operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("No stream cell within {max_distance} of ({x}, {y})")]
    NoStreamWithinRadius { x: f64, y: f64, max_distance: f64 },

    #[error("Invalid outlet at ({x}, {y}): {reason}")]
    InvalidOutlet { x: f64, y: f64, reason: String },

    #[error("Mask selects no valid cells")]
    EmptyMask,

    #[error("{count} depression(s) could not be resolved")]
    UnresolvableDepression { count: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),
}

/// Result type alias for basinflow operations
pub type Result<T> = std::result::Result<T, Error>;
