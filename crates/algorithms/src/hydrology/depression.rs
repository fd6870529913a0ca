//! Depression resolution: breach first, then fill what is left
//!
//! Produces a hydrologically conditioned DEM in which no interior cell is
//! lower than all of its neighbors, so every cell has a non-ascending path
//! to the edge of the valid domain.

use super::breach::{breach_depressions, is_pit, BreachParams};
use super::priority_flood::{priority_flood, PriorityFloodParams};
use super::{edge_mask, valid_mask};
use basinflow_core::raster::Raster;
use basinflow_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Parameters for depression resolution
#[derive(Debug, Clone)]
pub struct ResolveParams {
    /// Longest breach channel searched from a pit, in cells
    pub max_breach_length: usize,
    /// Deepest cut a breach may make at any cell
    pub max_breach_depth: f64,
    /// Increment enforced across filled depressions (0 = flat fill)
    pub flat_increment: f64,
    /// Fill depressions that breaching could not remove. When false, any
    /// remaining pit makes resolution fail with `UnresolvableDepression`.
    pub fill_remaining: bool,
}

impl Default for ResolveParams {
    fn default() -> Self {
        let breach = BreachParams::default();
        Self {
            max_breach_length: breach.max_length,
            max_breach_depth: breach.max_depth,
            flat_increment: PriorityFloodParams::default().flat_increment,
            fill_remaining: true,
        }
    }
}

/// Depression resolver stage
#[derive(Debug, Clone, Default)]
pub struct DepressionResolver;

impl Algorithm for DepressionResolver {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = ResolveParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "DepressionResolver"
    }

    fn description(&self) -> &'static str {
        "Condition a DEM by least-cost breaching followed by priority-flood fill"
    }

    fn execute(&self, input: &Self::Input, params: Self::Params) -> Result<Self::Output> {
        resolve(input, params)
    }
}

/// Condition a DEM so that no interior pits remain.
///
/// Pits are first breached along least-cost channels of at most
/// `max_breach_length` cells; whatever survives is raised to its spill
/// elevation by Priority-Flood.
///
/// # Errors
/// - `InvalidInput` for an empty grid, a degenerate transform or a grid
///   with no valid cells
/// - `UnresolvableDepression` when pits remain and `fill_remaining` is off
pub fn resolve(dem: &Raster<f64>, params: ResolveParams) -> Result<Raster<f64>> {
    let breached = breach_depressions(
        dem,
        BreachParams {
            max_length: params.max_breach_length,
            max_depth: params.max_breach_depth,
        },
    )?;

    if params.fill_remaining {
        return priority_flood(
            &breached,
            PriorityFloodParams {
                flat_increment: params.flat_increment,
            },
        );
    }

    let remaining = find_pits(&breached)?.len();
    if remaining > 0 {
        return Err(Error::UnresolvableDepression { count: remaining });
    }
    Ok(breached)
}

/// Interior valid cells strictly lower than all 8 neighbors, in row-major order
pub fn find_pits(dem: &Raster<f64>) -> Result<Vec<(usize, usize)>> {
    dem.validate()?;
    let valid = valid_mask(dem);
    let edge = edge_mask(&valid);
    Ok(pits_in(dem.data(), &valid, &edge))
}

pub(crate) fn pits_in(z: &Array2<f64>, valid: &Array2<bool>, edge: &Array2<bool>) -> Vec<(usize, usize)> {
    let (rows, cols) = z.dim();
    let mut pits = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if is_pit(z, valid, edge, (row, col)) {
                pits.push((row, col));
            }
        }
    }
    pits
}
