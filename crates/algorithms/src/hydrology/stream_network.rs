//! Stream network extraction
//!
//! Thresholds a flow accumulation grid: cells with accumulation at or above
//! the threshold are stream cells. No smoothing or thinning is applied.

use basinflow_core::raster::Raster;
use basinflow_core::{Algorithm, Error, RasterElement, Result};

/// Parameters for stream extraction
#[derive(Debug, Clone)]
pub struct StreamParams {
    /// Minimum contributing cell count of a stream cell.
    /// Default: 1000
    pub threshold: u32,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self { threshold: 1000 }
    }
}

/// Stream extractor stage
#[derive(Debug, Clone, Default)]
pub struct StreamExtractor;

impl Algorithm for StreamExtractor {
    type Input = Raster<u32>;
    type Output = Raster<bool>;
    type Params = StreamParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "StreamExtractor"
    }

    fn description(&self) -> &'static str {
        "Threshold flow accumulation into a binary stream grid"
    }

    fn execute(&self, input: &Self::Input, params: Self::Params) -> Result<Self::Output> {
        extract_streams(input, params)
    }
}

/// Extract the stream grid from flow accumulation.
///
/// A cell is a stream cell iff it is not no-data and its accumulation is
/// `>= threshold`. The output has no no-data value; no-data input cells are
/// `false`.
pub fn extract_streams(flow_acc: &Raster<u32>, params: StreamParams) -> Result<Raster<bool>> {
    if flow_acc.is_empty() {
        return Err(Error::InvalidInput(
            "flow accumulation grid has no cells".to_string(),
        ));
    }

    let threshold = params.threshold;
    let nodata = flow_acc.nodata();
    Ok(flow_acc.map(None, |acc| !acc.is_nodata(nodata) && acc >= threshold))
}
