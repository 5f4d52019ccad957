//! ArchTerra CLI - movement and visibility analysis over elevation grids

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use archterra_algorithms::movement::{
    accumulate, build_cost_surface, extract_corridor, extract_path, isochrones, path_cost,
    straight_line_cost, CostPreset, CostSurfaceOptions, IsochroneParams, SearchDirection,
    SlopeCost,
};
use archterra_algorithms::network::{
    build_hub, build_knn, build_mst, build_network_set, centrality, edge_paths,
    intervisibility_graph, pairwise_least_cost, proximity_graph, CentralityOptions, CostMatrix,
    EdgePath, HubOptions, HubSelection, IntervisibilityOptions, NetworkGraph, NetworkSetOptions,
    NodeCentrality, ProximityOptions, ProximityRule, Site, SiteFailure, Symmetry, VisibilityRule,
};
use archterra_algorithms::terrain::{aspect, slope, SlopeParams, SlopeUnits};
use archterra_algorithms::visibility::{
    compute_viewshed, profile, ring_visibility, visibility_stats, LosOptions, RingOptions,
    SightLine, Viewpoint, ViewshedMode, ViewshedOptions, VisibilityField,
};
use archterra_core::{Cell, ElevationGrid, GeoTransform, Monitor, Raster, RasterElement, RunTagger, CRS};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "archterra")]
#[command(author, version, about = "Movement and visibility analysis for archaeological landscapes", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON job file with per-analysis parameter sections
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about an elevation grid
    Info {
        /// Input grid document
        dem: PathBuf,
    },
    /// Slope or aspect raster
    Slope {
        dem: PathBuf,
        output: PathBuf,
        #[arg(short, long, value_enum, default_value = "degrees")]
        units: UnitsArg,
        #[arg(short, long, default_value = "1.0")]
        z_factor: f64,
        /// Write aspect instead of slope
        #[arg(long)]
        aspect: bool,
    },
    /// Elevation profile and line of sight between two points
    Profile {
        dem: PathBuf,
        output: PathBuf,
        /// Observer position 'x,y'
        #[arg(long)]
        from: String,
        /// Target position 'x,y'
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "1.7")]
        observer_height: f64,
        #[arg(long, default_value = "0.0")]
        target_height: f64,
    },
    /// Viewshed in single, cumulative, inverse, linear or observers mode
    Viewshed {
        dem: PathBuf,
        output: PathBuf,
        #[arg(short, long, value_enum, default_value = "single")]
        mode: ModeArg,
        /// Points 'x,y;x,y;...' (viewpoints, targets or path vertices)
        #[arg(short, long)]
        points: String,
        /// Maximum viewing distance
        #[arg(short, long)]
        radius: Option<f64>,
        #[arg(long)]
        observer_height: Option<f64>,
        #[arg(long)]
        target_height: Option<f64>,
        /// Viewpoint spacing along the path (linear mode)
        #[arg(long, default_value = "50.0")]
        interval: f64,
        /// Treat the path as a closed ring (linear mode)
        #[arg(long)]
        closed: bool,
        /// Area-of-interest mask for the statistics
        #[arg(long)]
        aoi: Option<PathBuf>,
    },
    /// Observers on a ring around a centre, each tested against the centre
    Ring {
        dem: PathBuf,
        output: PathBuf,
        /// Centre position 'x,y'
        #[arg(long)]
        center: String,
        #[arg(short, long)]
        radius: Option<f64>,
        /// Observer spacing along the ring
        #[arg(long)]
        interval: Option<f64>,
        #[arg(long)]
        observer_height: Option<f64>,
        #[arg(long)]
        target_height: Option<f64>,
    },
    /// Accumulated cost, least-cost paths and isochrones
    Cost {
        #[command(subcommand)]
        analysis: CostCommands,
    },
    /// Least-cost corridor between two places
    Corridor {
        #[command(flatten)]
        surface: SurfaceArgs,
        output: PathBuf,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Detour budget in cost units
        #[arg(short, long, default_value = "0.0")]
        budget: f64,
    },
    /// Least-cost site networks
    Network {
        #[command(subcommand)]
        kind: NetworkCommands,
    },
    /// Planar proximity graph between sites
    Proximity {
        /// Site list document
        sites: PathBuf,
        output: PathBuf,
        #[arg(short, long, value_enum, default_value = "gabriel")]
        rule: RuleArg,
        /// Distance threshold (threshold rule)
        #[arg(long)]
        radius: Option<f64>,
        /// Neighbours per site (knn rule)
        #[arg(short, default_value = "3")]
        k: usize,
        #[arg(long)]
        mutual: bool,
        #[arg(long)]
        max_edge_length: Option<f64>,
    },
    /// Intervisibility graph between sites
    Intervisibility {
        dem: PathBuf,
        sites: PathBuf,
        output: PathBuf,
        #[arg(long, value_enum)]
        rule: Option<VisibilityRuleArg>,
        #[arg(long)]
        max_distance: Option<f64>,
        #[arg(long)]
        observer_height: Option<f64>,
        #[arg(long)]
        target_height: Option<f64>,
    },
}

#[derive(Args)]
struct SurfaceArgs {
    /// Input grid document
    dem: PathBuf,
    /// Cost model name; parameters come from the job file
    #[arg(short, long)]
    model: Option<String>,
    /// Friction raster document
    #[arg(long)]
    friction: Option<PathBuf>,
    /// Cardinal moves only
    #[arg(long)]
    no_diagonal: bool,
}

#[derive(Subcommand)]
enum CostCommands {
    /// Accumulated cost from sources
    Accumulate {
        #[command(flatten)]
        surface: SurfaceArgs,
        output: PathBuf,
        /// Sources 'x,y;x,y;...'
        #[arg(short, long)]
        sources: String,
        /// Cost of reaching the sources instead of leaving them
        #[arg(long)]
        inbound: bool,
    },
    /// Least-cost path between two points
    Path {
        #[command(flatten)]
        surface: SurfaceArgs,
        output: PathBuf,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Keep only turning points
        #[arg(long)]
        simplify: bool,
    },
    /// Travel-time bands and isolines
    Isochrones {
        #[command(flatten)]
        surface: SurfaceArgs,
        output: PathBuf,
        #[arg(short, long)]
        sources: String,
        /// Comma-separated levels in seconds
        #[arg(short, long)]
        levels: Option<String>,
    },
}

#[derive(Args)]
struct NetworkArgs {
    #[command(flatten)]
    surface: SurfaceArgs,
    /// Site list document
    sites: PathBuf,
    output: PathBuf,
    #[arg(long, value_enum, default_value = "average")]
    symmetry: SymmetryArg,
    /// Trace the least-cost route of every edge
    #[arg(long)]
    routes: bool,
    /// Add degree, closeness and betweenness per site
    #[arg(long)]
    centrality: bool,
}

#[derive(Subcommand)]
enum NetworkCommands {
    /// Minimum spanning tree
    Mst {
        #[command(flatten)]
        args: NetworkArgs,
    },
    /// k nearest neighbours by cost
    Knn {
        #[command(flatten)]
        args: NetworkArgs,
        #[arg(short, default_value = "3")]
        k: usize,
        #[arg(long)]
        mutual: bool,
    },
    /// Sites linked to their nearest hubs
    Hub {
        #[command(flatten)]
        args: NetworkArgs,
        /// Hub indices 'i,j,...'; flagged sites otherwise
        #[arg(long)]
        hubs: Option<String>,
        #[arg(long)]
        hubs_per_node: Option<usize>,
    },
    /// Spanning tree, k nearest and hub networks from one cost matrix
    All {
        #[command(flatten)]
        args: NetworkArgs,
        #[arg(short, default_value = "3")]
        k: usize,
        #[arg(long)]
        mutual: bool,
        #[arg(long)]
        hubs: Option<String>,
        #[arg(long)]
        hubs_per_node: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitsArg {
    Degrees,
    Percent,
    Radians,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Single,
    Cumulative,
    Inverse,
    Linear,
    Observers,
}

#[derive(Clone, Copy, ValueEnum)]
enum RuleArg {
    Threshold,
    Knn,
    Delaunay,
    Gabriel,
    Rng,
}

#[derive(Clone, Copy, ValueEnum)]
enum VisibilityRuleArg {
    Mutual,
    Either,
}

#[derive(Clone, Copy, ValueEnum)]
enum SymmetryArg {
    Average,
    Min,
    Max,
}

impl From<SymmetryArg> for Symmetry {
    fn from(arg: SymmetryArg) -> Self {
        match arg {
            SymmetryArg::Average => Symmetry::Average,
            SymmetryArg::Min => Symmetry::Min,
            SymmetryArg::Max => Symmetry::Max,
        }
    }
}

// ─── Documents ──────────────────────────────────────────────────────────

/// Parameter sections of a job file; absent sections use defaults
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobFile {
    cost: Option<CostPreset>,
    surface: Option<CostSurfaceOptions>,
    viewshed: Option<ViewshedOptions>,
    los: Option<LosOptions>,
    ring: Option<RingOptions>,
    isochrones: Option<IsochroneParams>,
    hub: Option<HubOptions>,
    centrality: Option<CentralityOptions>,
    proximity: Option<ProximityOptions>,
    intervisibility: Option<IntervisibilityOptions>,
}

/// Grid exchanged as JSON; `null` values are no-data
#[derive(Debug, Serialize, Deserialize)]
struct GridDocument<T> {
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    #[serde(default)]
    nodata: Option<T>,
    #[serde(default)]
    crs_epsg: Option<u32>,
    values: Vec<Option<T>>,
}

impl<T: RasterElement + Serialize> GridDocument<T> {
    fn from_raster(raster: &Raster<T>) -> Self {
        let values = raster
            .data()
            .iter()
            .map(|&v| {
                let finite = v.to_f64().is_some_and(f64::is_finite);
                (finite && !raster.is_nodata(v)).then_some(v)
            })
            .collect();
        Self {
            rows: raster.rows(),
            cols: raster.cols(),
            transform: *raster.transform(),
            nodata: raster.nodata().filter(|nd| nd.to_f64().is_some_and(f64::is_finite)),
            crs_epsg: raster.crs().and_then(CRS::epsg),
            values,
        }
    }

    fn into_raster(self) -> Result<Raster<T>> {
        let fill = self.nodata.unwrap_or_else(T::default_nodata);
        let values = self.values.into_iter().map(|v| v.unwrap_or(fill)).collect();
        let mut raster = Raster::from_vec(values, self.rows, self.cols)
            .context("Grid values do not match rows x cols")?;
        raster.set_transform(self.transform);
        raster.set_crs(self.crs_epsg.map(CRS::from_epsg));
        raster.set_nodata(Some(fill));
        Ok(raster)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

/// Progress bar driven by the monitor callback
fn progress(msg: &str) -> Result<(ProgressBar, Monitor)> {
    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {percent}% ({elapsed})")?
            .progress_chars("=> "),
    );
    pb.set_message(msg.to_string());
    let bar = pb.clone();
    let monitor = Monitor::new().with_progress(move |f| bar.set_position((f * 1000.0) as u64));
    Ok((pb, monitor))
}

fn read_json<T: DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(value: &T, path: &PathBuf) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).context("Failed to write output")
}

fn read_job(path: Option<&PathBuf>) -> Result<JobFile> {
    match path {
        Some(path) => read_json(path),
        None => Ok(JobFile::default()),
    }
}

fn read_dem(path: &PathBuf) -> Result<ElevationGrid> {
    let pb = spinner("Reading grid...")?;
    let doc: GridDocument<f64> = read_json(path)?;
    let grid = ElevationGrid::new(doc.into_raster()?).context("Invalid elevation grid")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", grid.cols(), grid.rows());
    Ok(grid)
}

fn read_sites(path: &PathBuf) -> Result<Vec<Site>> {
    let sites: Vec<Site> = read_json(path)?;
    info!("Sites: {}", sites.len());
    Ok(sites)
}

fn grid_doc<T: RasterElement + Serialize>(raster: &Raster<T>) -> GridDocument<T> {
    GridDocument::from_raster(raster)
}

fn hub_options(
    job: &JobFile,
    symmetry: Symmetry,
    hubs: Option<&str>,
    hubs_per_node: Option<usize>,
) -> Result<HubOptions> {
    let mut options = job.hub.clone().unwrap_or_default();
    options.symmetry = symmetry;
    if let Some(hubs) = hubs {
        options.selection = HubSelection::Indices(parse_list(hubs)?);
    }
    if let Some(n) = hubs_per_node {
        options.hubs_per_node = n;
    }
    Ok(options)
}

fn done(name: &str, path: &PathBuf, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_point(s: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = s.trim().split(',').collect();
    if parts.len() != 2 {
        anyhow::bail!("Point must be 'x,y', got: {}", s);
    }
    let x: f64 = parts[0].trim().parse().context("Invalid x")?;
    let y: f64 = parts[1].trim().parse().context("Invalid y")?;
    Ok((x, y))
}

fn parse_points(s: &str) -> Result<Vec<(f64, f64)>> {
    s.split(';').filter(|p| !p.trim().is_empty()).map(parse_point).collect()
}

fn parse_list<T: std::str::FromStr>(s: &str) -> Result<Vec<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    s.split(',')
        .map(|v| v.trim().parse::<T>().with_context(|| format!("Invalid value: {}", v)))
        .collect()
}

/// Model from `--model`, else the job file, else Tobler
fn cost_model(name: Option<&str>, job: &JobFile) -> Result<CostPreset> {
    let preset = match (name, job.cost) {
        (Some(name), Some(preset)) if serde_json::to_value(preset)?["model"] == name => preset,
        (Some(name), _) => serde_json::from_value(serde_json::json!({ "model": name }))
            .with_context(|| format!("Unknown cost model: {}", name))?,
        (None, Some(preset)) => preset,
        (None, None) => CostPreset::default(),
    };
    preset.validate().context("Invalid cost model parameters")?;
    debug!("cost model: {:?}", preset);
    Ok(preset)
}

fn surface_options(args: &SurfaceArgs, job: &JobFile) -> CostSurfaceOptions {
    let mut options = job.surface.unwrap_or_default();
    if args.no_diagonal {
        options.allow_diagonal = false;
    }
    options
}

fn read_friction(args: &SurfaceArgs) -> Result<Option<Raster<f64>>> {
    args.friction
        .as_ref()
        .map(|path| read_json::<GridDocument<f64>>(path)?.into_raster())
        .transpose()
}

fn cells_at(grid: &ElevationGrid, points: &[(f64, f64)]) -> Result<Vec<Cell>> {
    points
        .iter()
        .map(|&(x, y)| grid.cell_at(x, y).with_context(|| format!("Point ({}, {}) is off the grid", x, y)))
        .collect()
}

#[derive(Serialize)]
struct NetworkReport<'a> {
    graph: &'a NetworkGraph,
    matrix: &'a CostMatrix,
    components: usize,
    failures: &'a [SiteFailure],
    #[serde(skip_serializing_if = "Option::is_none")]
    centrality: Option<Vec<NodeCentrality>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    routes: Option<Vec<EdgePath>>,
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let job = read_job(cli.config.as_ref())?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { dem } => {
            let grid = read_dem(&dem)?;
            let raster = grid.raster();
            let stats = raster.statistics();
            let (min_x, min_y, max_x, max_y) = grid.extent();
            let (sx, sy) = grid.cell_size();

            println!("File: {}", dem.display());
            println!("Dimensions: {} x {} ({} cells)", grid.cols(), grid.rows(), raster.len());
            println!("Cell size: {} x {}", sx, sy);
            println!("Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})", min_x, min_y, max_x, max_y);
            if let Some(crs) = grid.crs() {
                println!("CRS: {}", crs.identifier());
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
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }

        // ── Slope ────────────────────────────────────────────────────
        Commands::Slope {
            dem,
            output,
            units,
            z_factor,
            aspect: want_aspect,
        } => {
            let grid = read_dem(&dem)?;
            let tagger = RunTagger::new("slope");
            let start = Instant::now();
            let tagged = if want_aspect {
                let result = aspect(&grid).context("Failed to calculate aspect")?;
                tagger.tag(grid_doc(&result), "aspect", "degrees", &())?
            } else {
                let units = match units {
                    UnitsArg::Degrees => SlopeUnits::Degrees,
                    UnitsArg::Percent => SlopeUnits::Percent,
                    UnitsArg::Radians => SlopeUnits::Radians,
                };
                let params = SlopeParams { units, z_factor };
                let result = slope(&grid, &params).context("Failed to calculate slope")?;
                let label = serde_json::to_value(units)?;
                tagger.tag(grid_doc(&result), "slope", label.as_str().unwrap_or("degrees"), &params)?
            };
            let elapsed = start.elapsed();
            write_json(&tagged, &output)?;
            done("Slope", &output, elapsed);
        }

        // ── Profile ──────────────────────────────────────────────────
        Commands::Profile {
            dem,
            output,
            from,
            to,
            observer_height,
            target_height,
        } => {
            let grid = read_dem(&dem)?;
            let line = SightLine::new(parse_point(&from)?, parse_point(&to)?)
                .with_heights(observer_height, target_height);
            let los = job.los.unwrap_or_default();
            let start = Instant::now();
            let result = profile(&grid, &line, &los).context("Failed to sample profile")?;
            let elapsed = start.elapsed();
            match result.first_obstruction() {
                Some(d) => println!("Line of sight blocked at {:.1} m", d),
                None => println!("Line of sight: {:?}", result.line_of_sight),
            }
            let tagged = RunTagger::new("profile").tag(&result, "profile", "m", &(line, los))?;
            write_json(&tagged, &output)?;
            done("Profile", &output, elapsed);
        }

        // ── Viewshed ─────────────────────────────────────────────────
        Commands::Viewshed {
            dem,
            output,
            mode,
            points,
            radius,
            observer_height,
            target_height,
            interval,
            closed,
            aoi,
        } => {
            let grid = read_dem(&dem)?;
            let mut options = job.viewshed.clone().unwrap_or_default();
            if let Some(los) = job.los {
                options.los = los;
            }
            options.radius = radius.or(options.radius);
            options.observer_height = observer_height.unwrap_or(options.observer_height);
            options.target_height = target_height.unwrap_or(options.target_height);

            let points = parse_points(&points)?;
            let viewpoints = || -> Vec<Viewpoint> {
                points
                    .iter()
                    .map(|&(x, y)| Viewpoint::new(x, y).with_observer_height(options.observer_height))
                    .collect()
            };
            let mode = match mode {
                ModeArg::Single => ViewshedMode::Single {
                    viewpoint: viewpoints()
                        .into_iter()
                        .next()
                        .context("Single mode needs one viewpoint")?,
                },
                ModeArg::Cumulative => ViewshedMode::Cumulative { viewpoints: viewpoints() },
                ModeArg::Inverse => ViewshedMode::Inverse { targets: viewpoints() },
                ModeArg::Linear => ViewshedMode::Linear {
                    path: points.clone(),
                    interval,
                    closed,
                },
                ModeArg::Observers => ViewshedMode::Observers { viewpoints: viewpoints() },
            };
            let aoi = aoi
                .as_ref()
                .map(|path| read_json::<GridDocument<u8>>(path)?.into_raster())
                .transpose()?;

            let (pb, monitor) = progress("Viewshed")?;
            let start = Instant::now();
            let result = compute_viewshed(&grid, &mode, &options, &monitor)
                .context("Failed to compute viewshed")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();
            for f in &result.failures {
                warn!("viewpoint {} ({}, {}) skipped: {}", f.index, f.x, f.y, f.reason);
            }

            let stats = visibility_stats(&result.field, aoi.as_ref())?;
            println!(
                "Visible: {} cells, {:.1} m2 ({:.1}%)",
                stats.visible_cells,
                stats.visible_area,
                100.0 * stats.visible_ratio
            );

            let tagger = RunTagger::new("viewshed");
            let params = (&mode, &options);
            let report = match &result.field {
                VisibilityField::Binary(codes) => serde_json::json!({
                    "field": tagger.tag(grid_doc(codes), "viewshed", "binary", &params)?,
                    "stats": tagger.tag(stats, "visibility_stats", "m2", &params)?,
                    "evaluated": result.evaluated,
                    "failures": result.failures,
                }),
                VisibilityField::Score { value, percent } => serde_json::json!({
                    "field": tagger.tag(grid_doc(value), "visibility_score", "weight", &params)?,
                    "percent": tagger.tag(grid_doc(percent), "visibility_percent", "%", &params)?,
                    "stats": tagger.tag(stats, "visibility_stats", "m2", &params)?,
                    "evaluated": result.evaluated,
                    "failures": result.failures,
                }),
                VisibilityField::Observers(flags) => serde_json::json!({
                    "field": tagger.tag(grid_doc(flags), "observer_flags", "bitmask", &params)?,
                    "stats": tagger.tag(stats, "visibility_stats", "m2", &params)?,
                    "evaluated": result.evaluated,
                    "failures": result.failures,
                }),
            };
            write_json(&report, &output)?;
            done("Viewshed", &output, elapsed);
        }

        // ── Ring ─────────────────────────────────────────────────────
        Commands::Ring {
            dem,
            output,
            center,
            radius,
            interval,
            observer_height,
            target_height,
        } => {
            let grid = read_dem(&dem)?;
            let mut options = job.viewshed.clone().unwrap_or_default();
            if let Some(los) = job.los {
                options.los = los;
            }
            options.observer_height = observer_height.unwrap_or(options.observer_height);
            options.target_height = target_height.unwrap_or(options.target_height);
            let mut ring = job.ring.unwrap_or_default();
            ring.radius = radius.unwrap_or(ring.radius);
            ring.interval = interval.unwrap_or(ring.interval);

            let (pb, monitor) = progress("Ring")?;
            let start = Instant::now();
            let result = ring_visibility(&grid, parse_point(&center)?, &ring, &options, &monitor)
                .context("Failed to evaluate ring visibility")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();
            println!(
                "Ring: {} of {} observers see the centre ({:.1}%)",
                result.visible, result.evaluated, result.surveillance_percent
            );

            let tagger = RunTagger::new("ring");
            let params = (&ring, &options);
            let report = serde_json::json!({
                "ring": tagger.tag(&result, "ring_visibility", "%", &params)?,
                "segments": result.segments(),
            });
            write_json(&report, &output)?;
            done("Ring visibility", &output, elapsed);
        }

        // ── Cost ─────────────────────────────────────────────────────
        Commands::Cost { analysis } => match analysis {
            CostCommands::Accumulate {
                surface: args,
                output,
                sources,
                inbound,
            } => {
                let grid = read_dem(&args.dem)?;
                let friction = read_friction(&args)?;
                let model = cost_model(args.model.as_deref(), &job)?;
                let options = surface_options(&args, &job);
                let surface = build_cost_surface(&grid, &model, friction.as_ref(), &options)
                    .context("Failed to build cost surface")?;
                let sources = cells_at(&grid, &parse_points(&sources)?)?;
                let direction = if inbound {
                    SearchDirection::Inbound
                } else {
                    SearchDirection::Outbound
                };

                let (pb, monitor) = progress("Accumulating")?;
                let start = Instant::now();
                let field = accumulate(&surface, &sources, direction, &monitor)
                    .context("Failed to accumulate cost")?;
                let elapsed = start.elapsed();
                pb.finish_and_clear();

                let tagger = RunTagger::new("cost_distance");
                let units = model.units().symbol();
                let params = (&model, &options, direction);
                let report = serde_json::json!({
                    "cost": tagger.tag(grid_doc(field.cost()), "accumulated_cost", units, &params)?,
                    "predecessor": tagger.tag(grid_doc(field.predecessor()), "predecessor", "d8", &params)?,
                    "nearest_source": tagger.tag(grid_doc(field.nearest_source()), "nearest_source", "index", &params)?,
                    "skipped": field.skipped(),
                });
                write_json(&report, &output)?;
                done("Accumulated cost", &output, elapsed);
            }

            CostCommands::Path {
                surface: args,
                output,
                from,
                to,
                simplify,
            } => {
                let grid = read_dem(&args.dem)?;
                let friction = read_friction(&args)?;
                let model = cost_model(args.model.as_deref(), &job)?;
                let options = surface_options(&args, &job);
                let surface = build_cost_surface(&grid, &model, friction.as_ref(), &options)
                    .context("Failed to build cost surface")?;
                let (a, b) = (parse_point(&from)?, parse_point(&to)?);
                let cells = cells_at(&grid, &[a, b])?;

                let (pb, monitor) = progress("Least-cost path")?;
                let start = Instant::now();
                let field = accumulate(&surface, &cells[..1], SearchDirection::Outbound, &monitor)
                    .context("Failed to accumulate cost")?;
                let path = extract_path(&field, cells[1]).context("No path to destination")?;
                let elapsed = start.elapsed();
                pb.finish_and_clear();

                let check = path_cost(&surface, &path)?;
                debug!("path cost {} (accumulated {})", check, path.cost);
                let baseline = straight_line_cost(&grid, &model, a, b, grid.min_cell_size()).ok();
                let length = path.length(&grid);
                let (display, unit) = model.units().to_display(path.cost);
                println!("Path: {} cells, {:.1} m, cost {:.2} {}", path.len(), length, display, unit);
                let turns: Option<Vec<(f64, f64)>> = simplify.then(|| {
                    path.simplify_turns()
                        .into_iter()
                        .map(|c| grid.cell_center(c))
                        .collect()
                });

                let tagger = RunTagger::new("least_cost_path");
                let params = (&model, &options);
                let report = serde_json::json!({
                    "path": tagger.tag(&path, "least_cost_path", model.units().symbol(), &params)?,
                    "coordinates": path.to_coords(&grid),
                    "turns": turns,
                    "length": length,
                    "straight_line_cost": baseline,
                });
                write_json(&report, &output)?;
                done("Path", &output, elapsed);
            }

            CostCommands::Isochrones {
                surface: args,
                output,
                sources,
                levels,
            } => {
                let grid = read_dem(&args.dem)?;
                let friction = read_friction(&args)?;
                let model = cost_model(args.model.as_deref(), &job)?;
                let options = surface_options(&args, &job);
                let surface = build_cost_surface(&grid, &model, friction.as_ref(), &options)
                    .context("Failed to build cost surface")?;
                let sources = cells_at(&grid, &parse_points(&sources)?)?;
                let mut params = job.isochrones.clone().unwrap_or_default();
                if let Some(levels) = levels {
                    params.levels = parse_list(&levels)?;
                }

                let (pb, monitor) = progress("Isochrones")?;
                let start = Instant::now();
                let field = accumulate(&surface, &sources, SearchDirection::Outbound, &monitor)
                    .context("Failed to accumulate cost")?;
                let result = isochrones(&field, &params).context("Failed to trace isochrones")?;
                let elapsed = start.elapsed();
                pb.finish_and_clear();

                let tagger = RunTagger::new("isochrones");
                let report = serde_json::json!({
                    "levels": result.levels,
                    "bands": tagger.tag(grid_doc(&result.bands), "isochrone_bands", "band", &params)?,
                    "lines": tagger.tag(&result.lines, "isochrones", model.units().symbol(), &params)?,
                });
                write_json(&report, &output)?;
                done("Isochrones", &output, elapsed);
            }
        },

        // ── Corridor ─────────────────────────────────────────────────
        Commands::Corridor {
            surface: args,
            output,
            from,
            to,
            budget,
        } => {
            let grid = read_dem(&args.dem)?;
            let friction = read_friction(&args)?;
            let model = cost_model(args.model.as_deref(), &job)?;
            let options = surface_options(&args, &job);
            let surface = build_cost_surface(&grid, &model, friction.as_ref(), &options)
                .context("Failed to build cost surface")?;
            let cells = cells_at(&grid, &[parse_point(&from)?, parse_point(&to)?])?;

            let (pb, monitor) = progress("Corridor")?;
            let start = Instant::now();
            let from_a = accumulate(&surface, &cells[..1], SearchDirection::Outbound, &monitor)?;
            let to_b = accumulate(&surface, &cells[1..], SearchDirection::Inbound, &monitor)?;
            let corridor = extract_corridor(&from_a, &to_b).context("Failed to extract corridor")?;
            let mask = corridor.mask(budget)?;
            let summary = corridor.summary(budget)?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();
            println!(
                "Corridor: {} cells, {:.1} m2 (least cost {:.2})",
                summary.cells,
                summary.area,
                corridor.lcp_cost()
            );

            let tagger = RunTagger::new("corridor");
            let units = model.units().symbol();
            let params = (&model, &options, budget);
            let report = serde_json::json!({
                "detour": tagger.tag(grid_doc(corridor.detour()), "corridor_detour", units, &params)?,
                "mask": tagger.tag(grid_doc(&mask), "corridor", "mask", &params)?,
                "summary": summary,
                "lcp_cost": corridor.lcp_cost(),
            });
            write_json(&report, &output)?;
            done("Corridor", &output, elapsed);
        }

        // ── Network ──────────────────────────────────────────────────
        Commands::Network { kind } => {
            let args = match &kind {
                NetworkCommands::Mst { args }
                | NetworkCommands::Knn { args, .. }
                | NetworkCommands::Hub { args, .. }
                | NetworkCommands::All { args, .. } => args,
            };
            let grid = read_dem(&args.surface.dem)?;
            let sites = read_sites(&args.sites)?;
            let friction = read_friction(&args.surface)?;
            let model = cost_model(args.surface.model.as_deref(), &job)?;
            let options = surface_options(&args.surface, &job);
            let surface = build_cost_surface(&grid, &model, friction.as_ref(), &options)
                .context("Failed to build cost surface")?;
            let symmetry = Symmetry::from(args.symmetry);

            let (pb, monitor) = progress("Cost matrix")?;
            let start = Instant::now();
            let costs = pairwise_least_cost(&surface, &sites, &monitor)
                .context("Failed to compute cost matrix")?;
            pb.finish_and_clear();

            let graphs: Vec<(&str, NetworkGraph)> = match &kind {
                NetworkCommands::Mst { .. } => vec![("mst", build_mst(&costs.matrix, &sites, symmetry)?)],
                NetworkCommands::Knn { k, mutual, .. } => {
                    vec![("knn", build_knn(&costs.matrix, &sites, *k, *mutual)?)]
                }
                NetworkCommands::Hub {
                    hubs,
                    hubs_per_node,
                    ..
                } => {
                    let hub = hub_options(&job, symmetry, hubs.as_deref(), *hubs_per_node)?;
                    vec![("hub", build_hub(&costs.matrix, &sites, &hub)?)]
                }
                NetworkCommands::All {
                    k,
                    mutual,
                    hubs,
                    hubs_per_node,
                    ..
                } => {
                    let set_options = NetworkSetOptions {
                        k: *k,
                        mutual_only: *mutual,
                        hub: hub_options(&job, symmetry, hubs.as_deref(), *hubs_per_node)?,
                    };
                    let set = build_network_set(&costs.matrix, &sites, &set_options)?;
                    let mut graphs = vec![("mst", set.mst), ("knn", set.knn)];
                    graphs.extend(set.hub.map(|g| ("hub", g)));
                    graphs
                }
            };

            let tagger = RunTagger::new("network");
            let mut reports = serde_json::Map::new();
            for (label, graph) in &graphs {
                let scores = if args.centrality {
                    let options = job.centrality.unwrap_or_default();
                    Some(centrality(graph, &options).context("Failed to compute centrality")?)
                } else {
                    None
                };
                let routes = if args.routes {
                    let (pb, monitor) = progress("Edge routes")?;
                    let routes = edge_paths(&surface, graph, &monitor)?;
                    pb.finish_and_clear();
                    Some(routes)
                } else {
                    None
                };
                let (total, unit) = model.units().to_display(graph.total_weight());
                println!(
                    "Network {}: {} sites, {} edges, total cost {:.2} {}",
                    label,
                    graph.node_count(),
                    graph.edge_count(),
                    total,
                    unit
                );

                let report = NetworkReport {
                    graph,
                    matrix: &costs.matrix,
                    components: graph.components().len(),
                    failures: &costs.failures,
                    centrality: scores,
                    routes,
                };
                let tagged = tagger.tag(report, label, model.units().symbol(), &(&model, symmetry))?;
                reports.insert(label.to_string(), serde_json::to_value(tagged)?);
            }
            let elapsed = start.elapsed();

            let document = match graphs.as_slice() {
                [(label, _)] => reports.remove(*label).unwrap_or_default(),
                _ => serde_json::Value::Object(reports),
            };
            write_json(&document, &args.output)?;
            done("Network", &args.output, elapsed);
        }

        // ── Proximity ────────────────────────────────────────────────
        Commands::Proximity {
            sites,
            output,
            rule,
            radius,
            k,
            mutual,
            max_edge_length,
        } => {
            let sites = read_sites(&sites)?;
            let options = match (job.proximity, rule) {
                (Some(options), _) => options,
                (None, RuleArg::Threshold) => ProximityOptions::new(ProximityRule::Threshold {
                    radius: radius.context("Threshold rule needs --radius")?,
                }),
                (None, RuleArg::Knn) => ProximityOptions::new(ProximityRule::Knn { k, mutual }),
                (None, RuleArg::Delaunay) => ProximityOptions::new(ProximityRule::Delaunay),
                (None, RuleArg::Gabriel) => ProximityOptions::new(ProximityRule::Gabriel),
                (None, RuleArg::Rng) => ProximityOptions::new(ProximityRule::RelativeNeighborhood),
            };
            let options = match max_edge_length {
                Some(l) => options.with_max_edge_length(l),
                None => options,
            };

            let start = Instant::now();
            let graph = proximity_graph(&sites, &options).context("Failed to build proximity graph")?;
            let elapsed = start.elapsed();
            println!("Proximity graph: {} edges", graph.edge_count());

            let tagged = RunTagger::new("proximity").tag(&graph, "proximity_graph", "m", &options)?;
            write_json(&tagged, &output)?;
            done("Proximity graph", &output, elapsed);
        }

        // ── Intervisibility ──────────────────────────────────────────
        Commands::Intervisibility {
            dem,
            sites,
            output,
            rule,
            max_distance,
            observer_height,
            target_height,
        } => {
            let grid = read_dem(&dem)?;
            let sites = read_sites(&sites)?;
            let mut options = job.intervisibility.unwrap_or_default();
            if let Some(los) = job.los {
                options.los = los;
            }
            if let Some(rule) = rule {
                options.rule = match rule {
                    VisibilityRuleArg::Mutual => VisibilityRule::Mutual,
                    VisibilityRuleArg::Either => VisibilityRule::Either,
                };
            }
            options.max_distance = max_distance.or(options.max_distance);
            options.observer_height = observer_height.unwrap_or(options.observer_height);
            options.target_height = target_height.unwrap_or(options.target_height);

            let (pb, monitor) = progress("Intervisibility")?;
            let start = Instant::now();
            let result = intervisibility_graph(&grid, &sites, &options, &monitor)
                .context("Failed to build intervisibility graph")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();
            println!(
                "Intervisibility: {} pairs tested, {} edges",
                result.evaluated,
                result.graph.edge_count()
            );

            let tagger = RunTagger::new("intervisibility");
            let report = serde_json::json!({
                "graph": tagger.tag(&result.graph, "intervisibility_graph", "m", &options)?,
                "evaluated": result.evaluated,
                "failures": result.failures,
            });
            write_json(&report, &output)?;
            done("Intervisibility graph", &output, elapsed);
        }
    }

    Ok(())
}
