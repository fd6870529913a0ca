//! TOML run configuration
//!
//! ```toml
//! [analysis]
//! stream_threshold = 500
//! snap_distance = 150.0
//!
//! [execution]
//! threads = 4
//!
//! [[sites]]
//! label = "upper-creek"
//! dem = "dem/upper.tif"
//! x = 512340.0
//! y = 4123870.0
//! ```
//!
//! Every key of `[analysis]` and `[execution]` is optional.

use crate::error::{PipelineError, Result};
use crate::strategy::ProcessingMode;
use basinflow_algorithms::hydrology::{ResolveParams, SnapParams, StreamParams};
use basinflow_algorithms::terrain::{TriParams, TwiParams};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Flat increment used when filling residual depressions, so that filled
/// areas still route
pub const DEFAULT_FLAT_INCREMENT: f64 = 1e-5;

/// Stage parameters shared by every site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Longest breach channel, in cells
    pub max_breach_length: usize,
    /// Deepest breach cut, unlimited when absent
    pub max_breach_depth: Option<f64>,
    /// Increment enforced across filled depressions
    pub flat_increment: f64,
    /// Minimum accumulation (cells) of a stream cell
    pub stream_threshold: u32,
    /// Snapping radius in map units
    pub snap_distance: f64,
    /// Ruggedness window radius in cells
    pub ruggedness_radius: usize,
    /// Wetness index slope floor in degrees
    pub min_slope: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let resolve = ResolveParams::default();
        Self {
            max_breach_length: resolve.max_breach_length,
            max_breach_depth: None,
            flat_increment: DEFAULT_FLAT_INCREMENT,
            stream_threshold: StreamParams::default().threshold,
            snap_distance: SnapParams::default().max_distance,
            ruggedness_radius: TriParams::default().radius,
            min_slope: TwiParams::default().min_slope,
        }
    }
}

impl AnalysisConfig {
    pub fn resolve_params(&self) -> ResolveParams {
        ResolveParams {
            max_breach_length: self.max_breach_length,
            max_breach_depth: self.max_breach_depth.unwrap_or(f64::INFINITY),
            flat_increment: self.flat_increment,
            fill_remaining: true,
        }
    }

    pub fn stream_params(&self) -> StreamParams {
        StreamParams {
            threshold: self.stream_threshold,
        }
    }

    pub fn snap_params(&self) -> SnapParams {
        SnapParams {
            max_distance: self.snap_distance,
        }
    }

    pub fn tri_params(&self) -> TriParams {
        TriParams {
            radius: self.ruggedness_radius,
        }
    }

    pub fn twi_params(&self) -> TwiParams {
        TwiParams {
            min_slope: self.min_slope,
        }
    }
}

/// Worker settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Worker threads across sites, 0 = all cores
    pub threads: usize,
}

impl ExecutionConfig {
    pub fn mode(&self) -> ProcessingMode {
        ProcessingMode::from_threads(self.threads)
    }
}

/// One pour point to analyze.
///
/// Coordinates are never reprojected: `x`/`y` must be given in the CRS of
/// the site's DEM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Report key, unique within a run
    pub label: String,
    /// Elevation grid for this site
    pub dem: PathBuf,
    /// Outlet easting in the DEM's CRS
    pub x: f64,
    /// Outlet northing in the DEM's CRS
    pub y: f64,
}

/// A complete run: shared analysis settings and the sites to process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

impl PipelineConfig {
    /// Parse and validate a configuration document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file. Relative DEM paths are taken relative to
    /// the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            for site in &mut config.sites {
                if site.dem.is_relative() {
                    site.dem = base.join(&site.dem);
                }
            }
        }
        Ok(config)
    }

    /// Check site labels and coordinates and the analysis ranges
    pub fn validate(&self) -> Result<()> {
        let mut labels = HashSet::new();
        for site in &self.sites {
            if site.label.trim().is_empty() {
                return Err(PipelineError::InvalidConfig("site label is empty".to_string()));
            }
            if !labels.insert(site.label.as_str()) {
                return Err(PipelineError::InvalidConfig(format!(
                    "duplicate site label '{}'",
                    site.label
                )));
            }
            if !site.x.is_finite() || !site.y.is_finite() {
                return Err(PipelineError::InvalidConfig(format!(
                    "site '{}' has a non-finite coordinate",
                    site.label
                )));
            }
        }

        let a = &self.analysis;
        if !a.snap_distance.is_finite() || a.snap_distance < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "snap_distance must be a non-negative number, got {}",
                a.snap_distance
            )));
        }
        if a.flat_increment < 0.0 || !a.flat_increment.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "flat_increment must be a non-negative number, got {}",
                a.flat_increment
            )));
        }
        if a.max_breach_depth.is_some_and(|d| d.is_nan() || d < 0.0) {
            return Err(PipelineError::InvalidConfig(
                "max_breach_depth must be non-negative".to_string(),
            ));
        }
        if a.ruggedness_radius == 0 {
            return Err(PipelineError::InvalidConfig(
                "ruggedness_radius must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_tables() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [[sites]]
            label = "a"
            dem = "a.tif"
            x = 10.0
            y = 20.0
            "#,
        )
        .unwrap();
        assert_eq!(config.analysis, AnalysisConfig::default());
        assert_eq!(config.execution.mode(), ProcessingMode::Parallel);
        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.analysis.resolve_params().max_breach_depth, f64::INFINITY);
    }

    #[test]
    fn test_full_document() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [analysis]
            stream_threshold = 250
            max_breach_depth = 2.5

            [execution]
            threads = 2

            [[sites]]
            label = "gauge"
            dem = "utm19s.tif"
            x = 265830.0
            y = 6344170.0
            "#,
        )
        .unwrap();
        assert_eq!(config.sites[0].x, 265830.0);
        assert_eq!(config.sites[0].y, 6344170.0);
        assert_eq!(config.analysis.stream_params().threshold, 250);
        assert_eq!(config.analysis.resolve_params().max_breach_depth, 2.5);
        assert_eq!(config.execution.mode(), ProcessingMode::ParallelWith(2));
    }

    #[test]
    fn test_geographic_keys_are_not_coordinates() {
        // Nothing reprojects, so lon/lat must not pass for DEM coordinates
        let result = PipelineConfig::from_toml_str(
            r#"
            [[sites]]
            label = "gauge"
            dem = "utm19s.tif"
            lon = -71.6
            lat = -33.0
            "#,
        );
        match result {
            Err(PipelineError::Config(e)) => assert!(e.to_string().contains("lon")),
            other => panic!("expected a config error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_duplicate_labels() {
        let result = PipelineConfig::from_toml_str(
            r#"
            [[sites]]
            label = "a"
            dem = "a.tif"
            x = 0.0
            y = 0.0

            [[sites]]
            label = "a"
            dem = "b.tif"
            x = 1.0
            y = 1.0
            "#,
        );
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let result = PipelineConfig::from_toml_str("[analysis\nsnap_distance = 1");
        assert!(matches!(result, Err(PipelineError::Config(_))));

        let result = PipelineConfig::from_toml_str("[analysis]\nsnap_distance = -1.0");
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }
}
