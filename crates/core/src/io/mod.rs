//! Reading and writing grids as GeoTIFF
//!
//! The adapter is lossless for every grid the engine produces: cell values,
//! transform, CRS and no-data value survive a write/read round-trip.

mod native;

pub use native::{read_geotiff, write_geotiff};

// Buffer-based I/O (no filesystem dependency)
pub use native::{read_geotiff_from_buffer, write_geotiff_to_buffer};
