//! # basinflow algorithms
//!
//! Analysis stages of the basinflow watershed engine.
//!
//! ## Stages
//!
//! - **hydrology**: depression resolution (breach + fill), D8 flow routing,
//!   stream extraction, pour point snapping, watershed delineation
//! - **terrain**: slope, aspect, ruggedness, wetness index, hillshade
//! - **statistics**: masked (zonal) reductions over a watershed mask
//!
//! Every stage borrows its input grids and returns new ones; no stage
//! mutates a grid it did not produce.

pub mod hydrology;
pub mod statistics;
pub mod terrain;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{
        breach_depressions, delineate, extract_streams, flow_accumulation, flow_direction,
        label_basins, priority_flood, resolve, route, snap_pour_point, BreachParams,
        DepressionResolver, FlowRouter, FlowRouting, PriorityFloodParams, ResolveParams,
        SnapParams, StreamExtractor, StreamParams,
    };
    pub use crate::statistics::{masked_mean, masked_statistics, zonal_statistics, MaskedStatistics};
    pub use crate::terrain::{
        aspect, hillshade, slope, terrain_metrics, tri, twi, Aspect, Hillshade,
        HillshadeParams, Slope, SlopeParams, SlopeUnits, TerrainMetrics, Tri, TriParams,
        TwiParams, FLAT_ASPECT,
    };
    pub use basinflow_core::prelude::*;
}
