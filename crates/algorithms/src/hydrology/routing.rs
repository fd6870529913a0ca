//! D8 flow routing: directions and accumulation in one stage

use super::{flow_accumulation, flow_direction};
use basinflow_core::raster::{FlowDir, Raster};
use basinflow_core::{Algorithm, Error, Result};

/// Output of the flow router
#[derive(Debug, Clone)]
pub struct FlowRouting {
    /// D8 direction per cell
    pub direction: Raster<FlowDir>,
    /// Contributing cell count per cell, itself included
    pub accumulation: Raster<u32>,
}

impl FlowRouting {
    /// Cells that drain out of the domain: explicit outlets, plus cells
    /// flowing off the grid or into no-data
    pub fn outlets(&self) -> Vec<(usize, usize)> {
        let (rows, cols) = self.direction.shape();
        let dirs = self.direction.data();
        dirs.indexed_iter()
            .filter(|(_, &d)| d != FlowDir::NoData)
            .filter(|&((row, col), &d)| match d.downstream(row, col, rows, cols) {
                Some(n) => dirs[n] == FlowDir::NoData,
                None => true,
            })
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// Flow router stage (D8)
#[derive(Debug, Clone, Default)]
pub struct FlowRouter;

impl Algorithm for FlowRouter {
    type Input = Raster<f64>;
    type Output = FlowRouting;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "FlowRouter"
    }

    fn description(&self) -> &'static str {
        "Route flow over a conditioned DEM with D8 and accumulate contributing cells"
    }

    fn execute(&self, input: &Self::Input, _params: Self::Params) -> Result<Self::Output> {
        route(input)
    }
}

/// D8 flow direction and accumulation of a conditioned DEM
pub fn route(conditioned: &Raster<f64>) -> Result<FlowRouting> {
    let direction = flow_direction(conditioned)?;
    let accumulation = flow_accumulation(&direction)?;
    Ok(FlowRouting {
        direction,
        accumulation,
    })
}
