//! Per-site task graph
//!
//! ```text
//! DepressionResolver -> FlowRouter -> { StreamExtractor, TerrainMetrics, Hillshade }
//!     -> SnapPourPoint -> Delineate -> zonal means
//! ```
//!
//! Stages run in data-dependency order; the cancellation token is checked
//! before each one.

use crate::cancel::CancellationToken;
use crate::error::Result;
use basinflow_algorithms::hydrology::{
    delineate_pour_point, snap_pour_point, DepressionResolver, FlowRouter, StreamExtractor,
};
use basinflow_algorithms::statistics::masked_mean;
use basinflow_algorithms::terrain::{terrain_metrics, Hillshade, TerrainMetrics, FLAT_ASPECT};
use basinflow_core::io::write_geotiff;
use basinflow_core::raster::{FlowDir, Raster, RasterElement};
use basinflow_core::{Algorithm, Error, PourPoint};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::AnalysisConfig;

/// Inputs of one site: its DEM and the unsnapped outlet
#[derive(Debug, Clone)]
pub struct SiteJob {
    pub label: String,
    pub dem: Arc<Raster<f64>>,
    pub outlet: PourPoint,
}

impl SiteJob {
    pub fn new(label: impl Into<String>, dem: Arc<Raster<f64>>, x: f64, y: f64) -> Self {
        let label = label.into();
        Self {
            outlet: PourPoint::new(label.clone(), x, y),
            label,
            dem,
        }
    }
}

/// Scalar results of one site, keyed by its label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteReport {
    pub label: String,
    /// Snapped outlet coordinate
    pub outlet_x: f64,
    pub outlet_y: f64,
    /// Distance the outlet moved when snapped
    pub snap_distance: f64,
    pub watershed_cells: usize,
    /// Watershed area in squared map units
    pub watershed_area: f64,
    /// Zonal means over the watershed; `None` when no cell has a value
    pub mean_slope: Option<f64>,
    pub mean_aspect: Option<f64>,
    pub mean_ruggedness: Option<f64>,
    pub mean_wetness: Option<f64>,
}

/// Every grid produced for a site
#[derive(Debug, Clone)]
pub struct SiteProducts {
    pub conditioned: Raster<f64>,
    pub direction: Raster<FlowDir>,
    pub accumulation: Raster<u32>,
    pub streams: Raster<bool>,
    pub watershed: Raster<bool>,
    pub metrics: TerrainMetrics,
    pub hillshade: Raster<f64>,
}

impl SiteProducts {
    /// Write each grid as `<label>_<product>.tif` under `dir`
    pub fn write_all(&self, label: &str, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let path = |name: &str| dir.join(format!("{}_{}.tif", label, name));

        write_geotiff(&self.conditioned, path("conditioned"))?;
        write_geotiff(&self.direction, path("flow_direction"))?;
        write_geotiff(&self.accumulation, path("flow_accumulation"))?;
        write_geotiff(&self.streams, path("streams"))?;
        write_geotiff(&self.watershed, path("watershed"))?;
        write_geotiff(&self.metrics.slope, path("slope"))?;
        write_geotiff(&self.metrics.aspect, path("aspect"))?;
        write_geotiff(&self.metrics.ruggedness, path("ruggedness"))?;
        write_geotiff(&self.metrics.wetness, path("wetness"))?;
        write_geotiff(&self.hillshade, path("hillshade"))?;
        Ok(())
    }
}

/// Report and grids of a finished site
#[derive(Debug, Clone)]
pub struct SiteAnalysis {
    pub report: SiteReport,
    pub products: SiteProducts,
}

/// Run one stage after checking for cancellation, logging its timing
fn run_stage<T>(
    site: &str,
    stage: &str,
    token: &CancellationToken,
    f: impl FnOnce() -> basinflow_core::Result<T>,
) -> Result<T> {
    token.check()?;
    let start = Instant::now();
    let output = f()?;
    debug!(site, stage, elapsed_ms = start.elapsed().as_millis() as u64, "stage finished");
    Ok(output)
}

/// Run the full task graph for one site.
///
/// # Errors
/// `Cancelled` when the token is cancelled before a stage starts, or the
/// first stage error otherwise.
pub fn analyze_site(
    job: &SiteJob,
    analysis: &AnalysisConfig,
    token: &CancellationToken,
) -> Result<SiteAnalysis> {
    let site = job.label.as_str();
    let started = Instant::now();
    info!(site, "analyzing site");

    let resolver = DepressionResolver;
    let conditioned = run_stage(site, resolver.name(), token, || {
        resolver.execute(&job.dem, analysis.resolve_params())
    })?;

    let router = FlowRouter;
    let routing = run_stage(site, router.name(), token, || router.execute(&conditioned, ()))?;

    let extractor = StreamExtractor;
    let streams = run_stage(site, extractor.name(), token, || {
        extractor.execute(&routing.accumulation, analysis.stream_params())
    })?;

    let metrics = run_stage(site, "TerrainMetrics", token, || {
        terrain_metrics(
            &conditioned,
            &routing.accumulation,
            analysis.tri_params(),
            analysis.twi_params(),
        )
    })?;

    let shader = Hillshade;
    let hillshade = run_stage(site, shader.name(), token, || shader.execute_default(&conditioned))?;

    let outlet = run_stage(site, "SnapPourPoint", token, || {
        snap_pour_point(job.outlet.clone(), &streams, analysis.snap_params())
    })?;

    let watershed = run_stage(site, "Delineate", token, || {
        delineate_pour_point(&routing.direction, &outlet)
    })?;

    token.check()?;
    let report = summarize(site, &outlet, &watershed, &metrics)?;
    info!(
        site,
        cells = report.watershed_cells,
        snap_distance = report.snap_distance,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "site finished"
    );

    Ok(SiteAnalysis {
        report,
        products: SiteProducts {
            conditioned,
            direction: routing.direction,
            accumulation: routing.accumulation,
            streams,
            watershed,
            metrics,
            hillshade,
        },
    })
}

/// Zonal means of every metric over the watershed mask
fn summarize(
    label: &str,
    outlet: &PourPoint,
    watershed: &Raster<bool>,
    metrics: &TerrainMetrics,
) -> Result<SiteReport> {
    let mask_nodata = watershed.nodata();
    let cells = watershed
        .data()
        .iter()
        .filter(|&&m| m && !m.is_nodata(mask_nodata))
        .count();

    // Flat cells carry no direction
    let aspect = metrics.aspect.map(Some(f64::NAN), |v| if v == FLAT_ASPECT { f64::NAN } else { v });

    Ok(SiteReport {
        label: label.to_string(),
        outlet_x: outlet.x(),
        outlet_y: outlet.y(),
        snap_distance: outlet.snap_distance.unwrap_or(0.0),
        watershed_cells: cells,
        watershed_area: cells as f64 * watershed.transform().cell_area(),
        mean_slope: zonal_mean(&metrics.slope, watershed)?,
        mean_aspect: zonal_mean(&aspect, watershed)?,
        mean_ruggedness: zonal_mean(&metrics.ruggedness, watershed)?,
        mean_wetness: zonal_mean(&metrics.wetness, watershed)?,
    })
}

fn zonal_mean(values: &Raster<f64>, mask: &Raster<bool>) -> Result<Option<f64>> {
    match masked_mean(values, mask) {
        Ok(mean) => Ok(Some(mean)),
        Err(Error::EmptyMask) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
