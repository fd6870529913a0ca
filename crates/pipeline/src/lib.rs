//! # basinflow pipeline
//!
//! Runs the watershed task graph for many sites.
//!
//! This crate provides:
//! - TOML run configuration (analysis settings, worker count, sites)
//! - The per-site stage sequence with structured `tracing` events
//! - Site-parallel execution on a Rayon pool
//! - Cooperative cancellation checked between stages

pub mod cancel;
pub mod config;
pub mod error;
pub mod runner;
pub mod site;
pub mod strategy;

pub use cancel::CancellationToken;
pub use config::{AnalysisConfig, ExecutionConfig, PipelineConfig, SiteConfig};
pub use error::{PipelineError, Result};
pub use runner::{load_jobs, run, run_sites, SiteOutcome};
pub use site::{analyze_site, SiteAnalysis, SiteJob, SiteProducts, SiteReport};
pub use strategy::{num_cpus, ParallelStrategy, ProcessingMode};
