//! Multi-site execution
//!
//! Sites are independent: each runs the full task graph on its own worker,
//! sharing only the read-only DEM when several sites use the same file.

use crate::cancel::CancellationToken;
use crate::config::{AnalysisConfig, PipelineConfig};
use crate::error::Result;
use crate::site::{analyze_site, SiteAnalysis, SiteJob};
use crate::strategy::{ParallelStrategy, ProcessingMode};
use basinflow_core::io::read_geotiff;
use basinflow_core::Raster;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one site, successful or not
#[derive(Debug)]
pub struct SiteOutcome {
    pub label: String,
    pub result: Result<SiteAnalysis>,
}

/// Read the DEM of every configured site, loading each distinct file once
pub fn load_jobs(config: &PipelineConfig) -> Result<Vec<SiteJob>> {
    let mut dems: HashMap<PathBuf, Arc<Raster<f64>>> = HashMap::new();
    let mut jobs = Vec::with_capacity(config.sites.len());

    for site in &config.sites {
        let dem = match dems.get(&site.dem) {
            Some(dem) => Arc::clone(dem),
            None => {
                let dem: Arc<Raster<f64>> = Arc::new(read_geotiff(&site.dem)?);
                info!(path = %site.dem.display(), rows = dem.rows(), cols = dem.cols(), "loaded DEM");
                dems.insert(site.dem.clone(), Arc::clone(&dem));
                dem
            }
        };
        jobs.push(SiteJob::new(site.label.clone(), dem, site.x, site.y));
    }
    Ok(jobs)
}

/// Analyze every job under `mode`, returning outcomes in job order.
///
/// A failing site does not stop the others. The outer error is reserved
/// for worker pool construction.
pub fn run_sites(
    jobs: &[SiteJob],
    analysis: &AnalysisConfig,
    mode: ProcessingMode,
    token: &CancellationToken,
) -> Result<Vec<SiteOutcome>> {
    info!(sites = jobs.len(), ?mode, "running sites");
    mode.par_map(0..jobs.len(), |i| {
        let job = &jobs[i];
        let result = analyze_site(job, analysis, token);
        if let Err(e) = &result {
            warn!(site = %job.label, error = %e, "site failed");
        }
        SiteOutcome {
            label: job.label.clone(),
            result,
        }
    })
}

/// Load and analyze every site of a configuration
pub fn run(config: &PipelineConfig, token: &CancellationToken) -> Result<Vec<SiteOutcome>> {
    let jobs = load_jobs(config)?;
    run_sites(&jobs, &config.analysis, config.execution.mode(), token)
}
