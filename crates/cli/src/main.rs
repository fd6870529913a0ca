//! basinflow CLI - watershed delineation and terrain analysis

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use geo_types::Coord;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use basinflow_algorithms::hydrology::{
    delineate, extract_streams, flow_accumulation, flow_direction, label_basins,
    label_watersheds, resolve, snap_to_stream, ResolveParams, StreamParams,
};
use basinflow_algorithms::terrain::{
    aspect, hillshade, slope, tri, twi, HillshadeParams, SlopeParams, SlopeUnits, TriParams,
    TwiParams,
};
use basinflow_core::io::{read_geotiff, write_geotiff};
use basinflow_core::{FlowDir, PourPoint, Raster, RasterElement};
use basinflow_pipeline::{CancellationToken, PipelineConfig, SiteReport};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "basinflow")]
#[command(author, version, about = "Raster watershed delineation and terrain analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Hydrology stages
    Hydrology {
        #[command(subcommand)]
        algorithm: HydrologyCommands,
    },
    /// Terrain metrics
    Terrain {
        #[command(subcommand)]
        algorithm: TerrainCommands,
    },
    /// Run every site of a TOML configuration and report per-site statistics
    Run {
        /// Configuration file
        config: PathBuf,
        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        report: Option<PathBuf>,
        /// Directory receiving every product grid of every site
        #[arg(long)]
        products: Option<PathBuf>,
        /// Override the configured worker count (0 = all cores)
        #[arg(short, long)]
        threads: Option<usize>,
    },
}

// ─── Hydrology subcommands ──────────────────────────────────────────────

#[derive(Subcommand)]
enum HydrologyCommands {
    /// Resolve depressions: least-cost breaching, then priority-flood fill
    Condition {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Longest breach channel in cells (0 disables breaching)
        #[arg(long, default_value = "100")]
        max_breach_length: usize,
        /// Deepest breach cut, unlimited when omitted
        #[arg(long)]
        max_breach_depth: Option<f64>,
        /// Increment enforced across filled depressions
        #[arg(long, default_value = "0.00001")]
        flat_increment: f64,
        /// Fail instead of filling depressions that breaching left behind
        #[arg(long)]
        no_fill: bool,
    },
    /// D8 flow direction from a conditioned DEM
    FlowDirection {
        /// Conditioned DEM file
        input: PathBuf,
        /// Output file (codes 1-8 counter-clockwise from east, 0 outlet)
        output: PathBuf,
    },
    /// Flow accumulation from a flow direction raster
    FlowAccumulation {
        /// Input flow direction raster
        input: PathBuf,
        /// Output file (contributing cell count)
        output: PathBuf,
    },
    /// Threshold a flow accumulation raster into a stream mask
    Streams {
        /// Input flow accumulation raster
        input: PathBuf,
        /// Output file (1 = stream)
        output: PathBuf,
        /// Minimum contributing cells of a stream cell
        #[arg(short, long, default_value = "1000")]
        threshold: u32,
    },
    /// Move a point onto the nearest stream cell
    Snap {
        /// Input stream mask
        streams: PathBuf,
        /// X coordinate in the raster CRS
        #[arg(short, allow_hyphen_values = true)]
        x: f64,
        /// Y coordinate in the raster CRS
        #[arg(short, allow_hyphen_values = true)]
        y: f64,
        /// Search radius in map units
        #[arg(short, long, default_value = "100")]
        max_distance: f64,
    },
    /// Watershed mask upstream of an outlet
    Watershed {
        /// Input flow direction raster
        input: PathBuf,
        /// Output file (1 = inside the watershed)
        output: PathBuf,
        /// Outlet X coordinate
        #[arg(short, allow_hyphen_values = true)]
        x: f64,
        /// Outlet Y coordinate
        #[arg(short, allow_hyphen_values = true)]
        y: f64,
    },
    /// Label drainage basins
    Basins {
        /// Input flow direction raster
        input: PathBuf,
        /// Output file (basin IDs, 0 = unassigned)
        output: PathBuf,
        /// Pour points as "x,y;x,y;..." (every terminal basin when omitted)
        #[arg(long, allow_hyphen_values = true)]
        pour_points: Option<String>,
    },
}

// ─── Terrain subcommands ────────────────────────────────────────────────

#[derive(Clone, Copy, ValueEnum)]
enum Units {
    Degrees,
    Percent,
    Radians,
}

impl From<Units> for SlopeUnits {
    fn from(units: Units) -> Self {
        match units {
            Units::Degrees => SlopeUnits::Degrees,
            Units::Percent => SlopeUnits::Percent,
            Units::Radians => SlopeUnits::Radians,
        }
    }
}

#[derive(Subcommand)]
enum TerrainCommands {
    /// Calculate slope from DEM
    Slope {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Output units
        #[arg(short, long, value_enum, default_value = "degrees")]
        units: Units,
        /// Z-factor for unit conversion
        #[arg(short, long, default_value = "1.0")]
        z_factor: f64,
    },
    /// Calculate aspect from DEM (-1 on flat cells)
    Aspect {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Calculate Terrain Ruggedness Index
    Ruggedness {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Neighborhood radius in cells
        #[arg(short, long, default_value = "1")]
        radius: usize,
    },
    /// Calculate Topographic Wetness Index
    Wetness {
        /// Conditioned DEM file
        dem: PathBuf,
        /// Flow accumulation raster on the same grid
        accumulation: PathBuf,
        /// Output file
        output: PathBuf,
        /// Slope floor in degrees
        #[arg(long, default_value = "0.1")]
        min_slope: f64,
    },
    /// Calculate hillshade from DEM
    Hillshade {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Sun azimuth in degrees (0=North, clockwise)
        #[arg(short, long, default_value = "315")]
        azimuth: f64,
        /// Sun altitude in degrees above horizon
        #[arg(short = 'l', long, default_value = "45")]
        altitude: f64,
        /// Z-factor for vertical exaggeration
        #[arg(short, long, default_value = "1.0")]
        z_factor: f64,
    },
}

// ─── Reports ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SnapReport {
    x: f64,
    y: f64,
    snapped_x: f64,
    snapped_y: f64,
    distance: f64,
}

#[derive(Serialize)]
struct SiteFailure {
    label: String,
    error: String,
}

#[derive(Serialize)]
struct RunReport {
    sites: Vec<SiteReport>,
    failures: Vec<SiteFailure>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster<T: RasterElement>(path: &Path) -> Result<Raster<T>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<T> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result<T: RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_pour_points(s: &str) -> Result<Vec<PourPoint>> {
    s.split(';')
        .enumerate()
        .map(|(i, pair)| {
            let parts: Vec<&str> = pair.trim().split(',').collect();
            if parts.len() != 2 {
                anyhow::bail!("Pour point must be 'x,y', got: {}", pair);
            }
            let x: f64 = parts[0].trim().parse().context("Invalid x")?;
            let y: f64 = parts[1].trim().parse().context("Invalid y")?;
            Ok(PourPoint::new(format!("{}", i + 1), x, y))
        })
        .collect()
}

fn print_info(input: &Path) -> Result<()> {
    let raster: Raster<f64> = read_raster(input)?;
    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {}", raster.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = raster.crs() {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        stats.valid_count,
        100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
    );
    Ok(())
}

fn run_config(
    config_path: &Path,
    report: Option<PathBuf>,
    products: Option<PathBuf>,
    threads: Option<usize>,
) -> Result<()> {
    let mut config = PipelineConfig::from_file(config_path)
        .with_context(|| format!("Failed to load configuration {}", config_path.display()))?;
    if let Some(threads) = threads {
        config.execution.threads = threads;
    }
    info!("Sites: {}", config.sites.len());

    let start = Instant::now();
    let pb = spinner("Analyzing sites...");
    let outcomes = basinflow_pipeline::run(&config, &CancellationToken::new());
    pb.finish_and_clear();
    let outcomes = outcomes.context("Failed to run sites")?;

    let mut run_report = RunReport {
        sites: Vec::new(),
        failures: Vec::new(),
    };
    for outcome in outcomes {
        match outcome.result {
            Ok(analysis) => {
                if let Some(dir) = &products {
                    analysis
                        .products
                        .write_all(&outcome.label, dir)
                        .with_context(|| format!("Failed to write products of {}", outcome.label))?;
                }
                run_report.sites.push(analysis.report);
            }
            Err(e) => run_report.failures.push(SiteFailure {
                label: outcome.label,
                error: e.to_string(),
            }),
        }
    }

    let json = serde_json::to_string_pretty(&run_report).context("Failed to serialize report")?;
    match &report {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            done("Report", path, start.elapsed());
        }
        None => println!("{}", json),
    }

    if run_report.sites.is_empty() && !run_report.failures.is_empty() {
        anyhow::bail!("All {} site(s) failed", run_report.failures.len());
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => print_info(&input)?,

        // ── Hydrology ────────────────────────────────────────────────
        Commands::Hydrology { algorithm } => match algorithm {
            HydrologyCommands::Condition {
                input,
                output,
                max_breach_length,
                max_breach_depth,
                flat_increment,
                no_fill,
            } => {
                let dem: Raster<f64> = read_raster(&input)?;
                let start = Instant::now();
                let params = ResolveParams {
                    max_breach_length,
                    max_breach_depth: max_breach_depth.unwrap_or(f64::INFINITY),
                    flat_increment,
                    fill_remaining: !no_fill,
                };
                let result = resolve(&dem, params).context("Failed to condition DEM")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("Conditioned DEM", &output, elapsed);
            }

            HydrologyCommands::FlowDirection { input, output } => {
                let dem: Raster<f64> = read_raster(&input)?;
                let start = Instant::now();
                let result = flow_direction(&dem).context("Failed to calculate flow direction")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("Flow direction", &output, elapsed);
            }

            HydrologyCommands::FlowAccumulation { input, output } => {
                let fdir: Raster<FlowDir> = read_raster(&input)?;
                let start = Instant::now();
                let result =
                    flow_accumulation(&fdir).context("Failed to calculate flow accumulation")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("Flow accumulation", &output, elapsed);
            }

            HydrologyCommands::Streams {
                input,
                output,
                threshold,
            } => {
                let acc: Raster<u32> = read_raster(&input)?;
                let start = Instant::now();
                let result = extract_streams(&acc, StreamParams { threshold })
                    .context("Failed to extract streams")?;
                let elapsed = start.elapsed();
                let count = result.data().iter().filter(|&&s| s).count();
                write_result(&result, &output)?;
                done("Streams", &output, elapsed);
                println!("  Stream cells: {}", count);
            }

            HydrologyCommands::Snap {
                streams,
                x,
                y,
                max_distance,
            } => {
                let streams: Raster<bool> = read_raster(&streams)?;
                let snapped = snap_to_stream(Coord { x, y }, &streams, max_distance)
                    .context("Failed to snap pour point")?;
                let report = SnapReport {
                    x,
                    y,
                    snapped_x: snapped.x,
                    snapped_y: snapped.y,
                    distance: (snapped.x - x).hypot(snapped.y - y),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            }

            HydrologyCommands::Watershed {
                input,
                output,
                x,
                y,
            } => {
                let fdir: Raster<FlowDir> = read_raster(&input)?;
                let start = Instant::now();
                let result = delineate(&fdir, x, y).context("Failed to delineate watershed")?;
                let elapsed = start.elapsed();
                let cells = result.data().iter().filter(|&&m| m).count();
                write_result(&result, &output)?;
                done("Watershed", &output, elapsed);
                println!(
                    "  Cells: {} (area {:.2})",
                    cells,
                    cells as f64 * fdir.transform().cell_area()
                );
            }

            HydrologyCommands::Basins {
                input,
                output,
                pour_points,
            } => {
                let fdir: Raster<FlowDir> = read_raster(&input)?;
                let points = pour_points.as_deref().map(parse_pour_points).transpose()?;
                let start = Instant::now();
                let result = match points {
                    Some(points) => label_watersheds(&fdir, &points),
                    None => label_basins(&fdir),
                }
                .context("Failed to label basins")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("Basins", &output, elapsed);
            }
        },

        // ── Terrain ──────────────────────────────────────────────────
        Commands::Terrain { algorithm } => match algorithm {
            TerrainCommands::Slope {
                input,
                output,
                units,
                z_factor,
            } => {
                let dem: Raster<f64> = read_raster(&input)?;
                let start = Instant::now();
                let result = slope(
                    &dem,
                    SlopeParams {
                        units: units.into(),
                        z_factor,
                    },
                )
                .context("Failed to calculate slope")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("Slope", &output, elapsed);
            }

            TerrainCommands::Aspect { input, output } => {
                let dem: Raster<f64> = read_raster(&input)?;
                let start = Instant::now();
                let result = aspect(&dem).context("Failed to calculate aspect")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("Aspect", &output, elapsed);
            }

            TerrainCommands::Ruggedness {
                input,
                output,
                radius,
            } => {
                let dem: Raster<f64> = read_raster(&input)?;
                let start = Instant::now();
                let result =
                    tri(&dem, TriParams { radius }).context("Failed to calculate ruggedness")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("TRI", &output, elapsed);
            }

            TerrainCommands::Wetness {
                dem,
                accumulation,
                output,
                min_slope,
            } => {
                let dem: Raster<f64> = read_raster(&dem)?;
                let acc: Raster<u32> = read_raster(&accumulation)?;
                let start = Instant::now();
                let slope_deg =
                    slope(&dem, SlopeParams::default()).context("Failed to calculate slope")?;
                let result = twi(&acc, &slope_deg, TwiParams { min_slope })
                    .context("Failed to calculate wetness index")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("TWI", &output, elapsed);
            }

            TerrainCommands::Hillshade {
                input,
                output,
                azimuth,
                altitude,
                z_factor,
            } => {
                let dem: Raster<f64> = read_raster(&input)?;
                let start = Instant::now();
                let result = hillshade(
                    &dem,
                    HillshadeParams {
                        azimuth,
                        altitude,
                        z_factor,
                        normalized: false,
                    },
                )
                .context("Failed to calculate hillshade")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("Hillshade", &output, elapsed);
            }
        },

        // ── Run ──────────────────────────────────────────────────────
        Commands::Run {
            config,
            report,
            products,
            threads,
        } => run_config(&config, report, products, threads)?,
    }

    Ok(())
}
