//! GIBS dataset generator CLI
//!
//! Command-line interface over the download, augmentation, and
//! segmentation drivers.

use super::config::{build_augment_config, build_download_config, load_catalog};
use crate::{
    augment::augment_directory,
    download::{plan, Downloader},
    segment,
    tracing_config::{TracingConfig, TracingFormat},
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// GIBS satellite-imagery dataset generator
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "gibs-datagen")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Download imagery for a range of dates into a dated directory tree
    Download(DownloadArgs),
    /// Write six derived images (rotations, flips, transpose) per stored image
    Augment(AugmentArgs),
    /// Cluster image pixels with k-means or mean shift
    Segment(SegmentArgs),
    /// List the known layers
    Layers(LayersArgs),
}

#[derive(Args)]
pub struct DownloadArgs {
    /// Layer name to download (repeatable)
    #[arg(short, long = "layer", value_name = "NAME", required = true)]
    pub layers: Vec<String>,

    /// First date to download (inclusive), e.g. 2020-01-01
    #[arg(long, value_name = "DATE")]
    pub start_date: NaiveDate,

    /// End of the date range (exclusive) [default: the day after start]
    #[arg(long, value_name = "DATE")]
    pub end_date: Option<NaiveDate>,

    /// Target projection, e.g. 4326 or EPSG:3413
    #[arg(short, long, default_value = "4326")]
    pub projection: String,

    /// Split each day into a grid of 512px tiles instead of one image
    #[arg(long)]
    pub tiled: bool,

    /// Imagery resolution (8km, 4km, 2km, 1km, 500m, 250m)
    #[arg(short, long, default_value = "2km")]
    pub resolution: String,

    /// Number of parallel translate jobs
    #[arg(short, long, default_value_t = crate::download::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Root of the output directory tree
    #[arg(short, long, default_value = "downloads", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Path of the translator executable
    #[arg(long, default_value = crate::download::DEFAULT_TOOL, value_name = "PATH")]
    pub tool_path: PathBuf,

    /// Skip jobs whose output file already exists
    #[arg(long)]
    pub skip_existing: bool,

    /// Extra layer catalog file (JSON array of layer descriptors)
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Print the planned commands without running anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct AugmentArgs {
    /// Directory scanned for source images
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Extensions treated as source images
    #[arg(long, value_delimiter = ',', default_values_t = default_extensions())]
    pub extensions: Vec<String>,

    /// Rewrite derived files that already exist
    #[arg(long)]
    pub overwrite: bool,
}

fn default_extensions() -> Vec<String> {
    crate::augment::IMAGE_EXTENSIONS
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[derive(Args)]
pub struct SegmentArgs {
    /// Input image files or glob patterns (e.g. "downloads/**/*.tif")
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<String>,

    /// Clustering method
    #[arg(short, long, value_enum, default_value_t = SegmentMethod::Kmeans)]
    pub method: SegmentMethod,

    /// Number of clusters (k-means)
    #[arg(short, long, default_value_t = 5)]
    pub clusters: usize,

    /// Window radius in normalized feature space (mean shift)
    #[arg(short, long, default_value_t = 0.3)]
    pub bandwidth: f64,

    /// RNG seed for reproducible clustering
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Iteration cap for k-means
    #[arg(long, default_value_t = 200)]
    pub max_iters: usize,

    /// Directory for cluster maps [default: next to each input]
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SegmentMethod {
    Kmeans,
    Meanshift,
}

#[derive(Args)]
pub struct LayersArgs {
    /// Print the catalog as JSON
    #[arg(long)]
    pub json: bool,

    /// Extra layer catalog file to merge before listing
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
}

/// CLI entry point
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Command::Download(args) => run_download(args).await,
        Command::Augment(args) => run_augment(&args),
        Command::Segment(args) => run_segment(&args),
        Command::Layers(args) => run_layers(&args),
    }
}

/// Initialize tracing based on verbosity level
fn init_tracing(verbose_count: u8) -> Result<()> {
    TracingConfig::new()
        .with_verbosity(verbose_count)
        .with_format(TracingFormat::Console)
        .init()
        .context("Failed to initialize tracing subscriber")?;
    if verbose_count > 0 {
        debug!(verbosity = verbose_count, "Tracing initialized");
    }
    Ok(())
}

async fn run_download(args: DownloadArgs) -> Result<()> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    let config = build_download_config(&args)?;
    let jobs = plan(&config, &catalog)?;

    info!(
        jobs = jobs.len(),
        workers = config.workers,
        "planned download"
    );

    if args.dry_run {
        for job in &jobs {
            println!("{}", job.command_line(&config.tool_path));
        }
        println!("🔍 dry run: {} jobs planned, nothing executed", jobs.len());
        return Ok(());
    }

    let downloader = Downloader::new(config);
    let report = downloader
        .run(jobs, true)
        .await
        .context("Download run failed")?;

    if report.failed > 0 {
        warn!(failed = report.failed, "some jobs failed");
        for failure in &report.failures {
            warn!("{}", failure);
        }
    }
    println!(
        "✅ download finished: {} completed, {} skipped, {} failed",
        report.completed, report.skipped, report.failed
    );
    Ok(())
}

fn run_augment(args: &AugmentArgs) -> Result<()> {
    let config = build_augment_config(args);
    let report = augment_directory(&config).context("Augmentation run failed")?;
    println!(
        "✅ augmented {} source images: {} files written, {} skipped",
        report.sources, report.written, report.skipped
    );
    Ok(())
}

fn run_segment(args: &SegmentArgs) -> Result<()> {
    let inputs = expand_inputs(&args.inputs)?;
    if inputs.is_empty() {
        anyhow::bail!("No input images matched");
    }

    for input in &inputs {
        let image = image::open(input)
            .with_context(|| format!("Failed to load '{}'", input.display()))?
            .to_rgb8();
        let features = segment::pixel_features(&image);

        let labels = match args.method {
            SegmentMethod::Kmeans => {
                segment::kmeans(&features, args.clusters, args.seed, args.max_iters)?
            },
            SegmentMethod::Meanshift => {
                segment::mean_shift(&features, args.bandwidth, args.seed)?
            },
        };
        let clusters = labels.iter().max().map_or(0, |m| m + 1);
        let rendered = segment::draw_clusters(&image, &labels)?;

        let output = segmented_path(input, args.output_dir.as_deref())?;
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create '{}'", parent.display()))?;
            }
        }
        rendered
            .save(&output)
            .with_context(|| format!("Failed to write '{}'", output.display()))?;
        info!(
            input = %input.display(),
            clusters,
            output = %output.display(),
            "segmented image"
        );
        println!(
            "✅ {} -> {} ({} clusters)",
            input.display(),
            output.display(),
            clusters
        );
    }
    Ok(())
}

fn run_layers(args: &LayersArgs) -> Result<()> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    if args.json {
        let layers: Vec<_> = catalog.layers().collect();
        println!("{}", serde_json::to_string_pretty(&layers)?);
    } else {
        for layer in catalog.layers() {
            println!(
                "{:<50} since {}  {:>4}  {}",
                layer.name,
                layer.start_date,
                layer.format.extension(),
                layer.title
            );
        }
    }
    Ok(())
}

/// Expand glob patterns and plain paths into a sorted file list
fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.chars().any(|c| matches!(c, '*' | '?' | '[')) {
            let matches =
                glob::glob(input).with_context(|| format!("Invalid glob pattern '{input}'"))?;
            for entry in matches {
                let path = entry.context("Failed to read glob entry")?;
                if path.is_file() {
                    paths.push(path);
                }
            }
        } else {
            paths.push(PathBuf::from(input));
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

/// Output path of a cluster map: `{stem}_seg.png`
fn segmented_path(input: &Path, output_dir: Option<&Path>) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("Input '{}' has no usable file stem", input.display()))?;
    let file_name = format!("{stem}_seg.png");
    Ok(match output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_download_args_parse() {
        let cli = Cli::parse_from([
            "gibs-datagen",
            "download",
            "--layer",
            "MODIS_Terra_CorrectedReflectance_TrueColor",
            "--start-date",
            "2020-01-01",
            "--end-date",
            "2020-01-08",
            "--tiled",
            "--resolution",
            "8km",
            "-w",
            "8",
        ]);
        match cli.command {
            Command::Download(args) => {
                assert_eq!(args.layers.len(), 1);
                assert_eq!(
                    args.start_date,
                    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
                );
                assert!(args.tiled);
                assert_eq!(args.workers, 8);
            },
            _ => panic!("expected download subcommand"),
        }
    }

    #[test]
    fn test_segmented_path_naming() {
        let p = segmented_path(Path::new("/data/scene.tif"), None).unwrap();
        assert_eq!(p, PathBuf::from("/data/scene_seg.png"));

        let p = segmented_path(Path::new("/data/scene.tif"), Some(Path::new("/out"))).unwrap();
        assert_eq!(p, PathBuf::from("/out/scene_seg.png"));
    }

    #[test]
    fn test_expand_inputs_plain_paths() {
        let paths = expand_inputs(&["b.tif".into(), "a.tif".into(), "a.tif".into()]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.tif"), PathBuf::from("b.tif")]);
    }
}
