//! Download driver for GIBS imagery
//!
//! This module turns a (layers, date range, projection, resolution)
//! request into a plan of external `gdal_translate` invocations, then
//! executes the plan through a bounded worker pool. Each job renders a
//! `GDAL_WMS` service description to a scratch file and asks the
//! translator tool to materialize one GeoTIFF — either the whole
//! projection extent or a single tile of it. All network transfer is
//! performed by the tool itself.

use crate::catalog::{wms_xml, Extent, LayerCatalog, Projection};
use crate::daterange::DateRange;
use crate::error::{DatagenError, Result};
use crate::grid::{Resolution, TileGrid};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Default name of the external translator tool
pub const DEFAULT_TOOL: &str = "gdal_translate";

/// Default worker pool size for translate jobs
pub const DEFAULT_WORKERS: usize = 4;

/// Configuration for one download run
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// GIBS layer names to download
    pub layers: Vec<String>,
    /// Days to download, start inclusive, end exclusive
    pub dates: DateRange,
    /// Target projection
    pub projection: Projection,
    /// Split each day into a grid of tiles instead of one image
    pub tiled: bool,
    /// Imagery resolution
    pub resolution: Resolution,
    /// Bounded worker pool size
    pub workers: usize,
    /// Root of the output directory tree
    pub output_dir: PathBuf,
    /// Path or name of the translator executable
    pub tool_path: PathBuf,
    /// Skip jobs whose output file already exists
    pub skip_existing: bool,
}

impl DownloadConfig {
    /// Create a configuration builder
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder::default()
    }
}

/// Builder for [`DownloadConfig`]
#[derive(Debug, Clone)]
pub struct DownloadConfigBuilder {
    layers: Vec<String>,
    dates: Option<DateRange>,
    projection: Projection,
    tiled: bool,
    resolution: Resolution,
    workers: usize,
    output_dir: PathBuf,
    tool_path: PathBuf,
    skip_existing: bool,
}

impl Default for DownloadConfigBuilder {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            dates: None,
            projection: Projection::Geographic,
            tiled: false,
            resolution: Resolution::R2km,
            workers: DEFAULT_WORKERS,
            output_dir: PathBuf::from("downloads"),
            tool_path: PathBuf::from(DEFAULT_TOOL),
            skip_existing: false,
        }
    }
}

impl DownloadConfigBuilder {
    /// Add a layer to download
    pub fn layer<S: Into<String>>(mut self, name: S) -> Self {
        self.layers.push(name.into());
        self
    }

    /// Set all layers to download
    pub fn layers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layers = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the date range
    pub fn dates(mut self, dates: DateRange) -> Self {
        self.dates = Some(dates);
        self
    }

    /// Set the target projection
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Request tiled output instead of one image per day
    pub fn tiled(mut self, tiled: bool) -> Self {
        self.tiled = tiled;
        self
    }

    /// Set the imagery resolution
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the worker pool size
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the output directory root
    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Override the translator executable
    pub fn tool_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.tool_path = path.into();
        self
    }

    /// Skip jobs whose output already exists
    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    /// - No layers requested
    /// - No date range set
    /// - Zero workers
    pub fn build(self) -> Result<DownloadConfig> {
        if self.layers.is_empty() {
            return Err(DatagenError::invalid_config(
                "At least one layer must be requested",
            ));
        }
        let dates = self
            .dates
            .ok_or_else(|| DatagenError::invalid_config("A date range must be set"))?;
        if self.workers == 0 {
            return Err(DatagenError::invalid_config(
                "Worker count must be at least 1",
            ));
        }
        Ok(DownloadConfig {
            layers: self.layers,
            dates,
            projection: self.projection,
            tiled: self.tiled,
            resolution: self.resolution,
            workers: self.workers,
            output_dir: self.output_dir,
            tool_path: self.tool_path,
            skip_existing: self.skip_existing,
        })
    }
}

/// Deterministic path of a whole-extent image:
/// `{out}/{epsg}/{YYYY-MM-DD}/{layer}.tif`
pub fn artifact_path(
    output_dir: &Path,
    projection: Projection,
    date: NaiveDate,
    layer: &str,
) -> PathBuf {
    output_dir
        .join(projection.epsg_code().to_string())
        .join(date.format("%Y-%m-%d").to_string())
        .join(format!("{layer}.tif"))
}

/// Deterministic path of one tile:
/// `{out}/{epsg}/{YYYY-MM-DD}/{layer}/r{row:03}_c{col:03}.tif`
pub fn tile_path(
    output_dir: &Path,
    projection: Projection,
    date: NaiveDate,
    layer: &str,
    row: u32,
    col: u32,
) -> PathBuf {
    output_dir
        .join(projection.epsg_code().to_string())
        .join(date.format("%Y-%m-%d").to_string())
        .join(layer)
        .join(format!("r{row:03}_c{col:03}.tif"))
}

/// One planned invocation of the translator tool
#[derive(Debug, Clone)]
pub struct TranslateJob {
    /// Layer the job belongs to
    pub layer: String,
    /// Imagery date
    pub date: NaiveDate,
    /// Rendered `GDAL_WMS` service description
    pub xml: String,
    /// Projection-space window passed as `-projwin`
    pub window: Extent,
    /// Output pixel size passed as `-outsize`
    pub outsize: (u32, u32),
    /// Destination file
    pub output_path: PathBuf,
}

impl TranslateJob {
    /// Argument vector for the tool, excluding the source and
    /// destination paths
    pub fn translate_args(&self) -> Vec<String> {
        vec![
            "-of".into(),
            "GTiff".into(),
            "-outsize".into(),
            self.outsize.0.to_string(),
            self.outsize.1.to_string(),
            "-projwin".into(),
            self.window.ulx.to_string(),
            self.window.uly.to_string(),
            self.window.lrx.to_string(),
            self.window.lry.to_string(),
        ]
    }

    /// Human-readable command line, for `--dry-run` output
    pub fn command_line(&self, tool: &Path) -> String {
        let mut parts = vec![tool.display().to_string()];
        parts.extend(self.translate_args());
        parts.push("<service.xml>".into());
        parts.push(self.output_path.display().to_string());
        parts.join(" ")
    }
}

/// Expand a configuration into the full list of translate jobs.
///
/// Order is deterministic: date, then layer (in request order), then
/// row-major tiles. Layer names, layer start dates, and the resolution
/// are validated here, before any command runs.
///
/// # Errors
/// - Unknown layer name
/// - Range starts before a layer's mission start date
/// - Resolution finer than a layer's native resolution
pub fn plan(config: &DownloadConfig, catalog: &LayerCatalog) -> Result<Vec<TranslateJob>> {
    let grid = TileGrid::for_resolution(config.projection, config.resolution);
    let mut jobs = Vec::new();

    for name in &config.layers {
        let layer = catalog.get(name)?;
        if !layer.available_on(config.dates.start()) {
            return Err(DatagenError::invalid_config(format!(
                "Layer '{}' has no imagery before {}; requested range starts {}",
                layer.name,
                layer.start_date,
                config.dates.start()
            )));
        }
        if config.resolution > layer.native_resolution {
            return Err(DatagenError::invalid_config(format!(
                "Layer '{}' is served at {} at finest; {} requested",
                layer.name, layer.native_resolution, config.resolution
            )));
        }
    }

    for date in &config.dates {
        for name in &config.layers {
            let layer = catalog.get(name)?;
            let xml = wms_xml(layer, config.projection, config.resolution, date);

            if config.tiled {
                for (row, col) in grid.tiles() {
                    jobs.push(TranslateJob {
                        layer: layer.name.clone(),
                        date,
                        xml: xml.clone(),
                        window: grid.tile_window(row, col),
                        outsize: (grid.tile_size, grid.tile_size),
                        output_path: tile_path(
                            &config.output_dir,
                            config.projection,
                            date,
                            &layer.name,
                            row,
                            col,
                        ),
                    });
                }
            } else {
                jobs.push(TranslateJob {
                    layer: layer.name.clone(),
                    date,
                    xml,
                    window: config.projection.extent(),
                    outsize: (grid.image_width(), grid.image_height()),
                    output_path: artifact_path(
                        &config.output_dir,
                        config.projection,
                        date,
                        &layer.name,
                    ),
                });
            }
        }
    }

    log::debug!(
        "planned {} translate jobs ({} days x {} layers{})",
        jobs.len(),
        config.dates.len(),
        config.layers.len(),
        if config.tiled {
            format!(" x {} tiles", grid.tile_count())
        } else {
            String::new()
        }
    );
    Ok(jobs)
}

/// Outcome of one translate job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Skipped,
    Failed(String),
}

/// Summary of a download run. Failures are collected, never retried.
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// One message per failed job
    pub failures: Vec<String>,
}

impl DownloadReport {
    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Completed => self.completed += 1,
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::Failed(msg) => {
                self.failed += 1;
                self.failures.push(msg);
            },
        }
    }

    /// Total number of jobs the report covers
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    fn new(len: u64, show: bool) -> Self {
        #[cfg(feature = "cli")]
        {
            if show {
                let pb = ProgressBar::new(len);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                        )
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                return Self::Indicatif(pb);
            }
        }
        let _ = (len, show);
        Self::NoOp
    }

    fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {},
        }
    }

    fn inc(&self) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.inc(1),
            Self::NoOp => {},
        }
    }

    fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {},
        }
    }
}

/// Executes translate jobs through a bounded worker pool
#[derive(Debug)]
pub struct Downloader {
    config: DownloadConfig,
}

impl Downloader {
    /// Create a downloader for a validated configuration
    pub fn new(config: DownloadConfig) -> Self {
        Self { config }
    }

    /// The configuration this downloader runs with
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Run all jobs, at most `workers` at a time.
    ///
    /// Jobs are independent: no shared state, no ordering requirement,
    /// and no retry. Per-job failures are collected into the report;
    /// the run itself errors only when every job failed.
    ///
    /// # Errors
    /// - Every job failed (typically a missing or broken tool)
    pub async fn run(&self, jobs: Vec<TranslateJob>, show_progress: bool) -> Result<DownloadReport> {
        if jobs.is_empty() {
            return Ok(DownloadReport::default());
        }

        let total = jobs.len();
        let progress = ProgressIndicator::new(total as u64, show_progress);
        log::info!(
            "running {} translate jobs with {} workers",
            total,
            self.config.workers
        );

        let outcomes: Vec<JobOutcome> = stream::iter(jobs)
            .map(|job| {
                let progress = &progress;
                async move {
                    progress.set_message(format!(
                        "{} {}",
                        job.date.format("%Y-%m-%d"),
                        job.layer
                    ));
                    let outcome = self.run_job(&job).await;
                    progress.inc();
                    outcome
                }
            })
            .buffer_unordered(self.config.workers)
            .collect()
            .await;

        let mut report = DownloadReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }

        if report.failed == report.total() {
            progress.finish_with_message("❌ all jobs failed".to_string());
            return Err(DatagenError::tool(format!(
                "All {} jobs failed; first failure: {}",
                report.failed,
                report
                    .failures
                    .first()
                    .map_or("<none>", String::as_str)
            )));
        }

        progress.finish_with_message(format!(
            "✅ {} completed, {} skipped, {} failed",
            report.completed, report.skipped, report.failed
        ));
        Ok(report)
    }

    async fn run_job(&self, job: &TranslateJob) -> JobOutcome {
        if self.config.skip_existing && job.output_path.exists() {
            log::debug!("skipping existing {}", job.output_path.display());
            return JobOutcome::Skipped;
        }

        match self.execute(job).await {
            Ok(()) => {
                log::debug!("wrote {}", job.output_path.display());
                JobOutcome::Completed
            },
            Err(e) => {
                log::warn!("job failed for {}: {}", job.output_path.display(), e);
                JobOutcome::Failed(format!("{}: {}", job.output_path.display(), e))
            },
        }
    }

    async fn execute(&self, job: &TranslateJob) -> Result<()> {
        if let Some(parent) = job.output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DatagenError::file_io_error("create output directory", parent, &e))?;
        }

        // The service description lives in a scratch file for the
        // lifetime of the tool invocation.
        let xml_file = tempfile::Builder::new()
            .prefix("gibs-datagen-")
            .suffix(".xml")
            .tempfile()
            .map_err(|e| DatagenError::file_io_error("create scratch file", "tmp", &e))?;
        std::fs::write(xml_file.path(), &job.xml)
            .map_err(|e| DatagenError::file_io_error("write scratch file", xml_file.path(), &e))?;

        let output = Command::new(&self.config.tool_path)
            .args(job.translate_args())
            .arg(xml_file.path())
            .arg(&job.output_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DatagenError::tool(format!(
                        "Translator tool '{}' not found. Is GDAL installed and on PATH?",
                        self.config.tool_path.display()
                    ))
                } else {
                    DatagenError::tool(format!(
                        "Failed to spawn '{}': {}",
                        self.config.tool_path.display(),
                        e
                    ))
                }
            })?;

        if !output.status.success() {
            return Err(DatagenError::tool_failure(
                &self.config.tool_path.display().to_string(),
                output.status.code(),
                &String::from_utf8_lossy(&output.stderr),
            ));
        }

        if !job.output_path.exists() {
            return Err(DatagenError::tool(format!(
                "Tool reported success but '{}' was not written",
                job.output_path.display()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config_for(layers: &[&str], tiled: bool) -> DownloadConfig {
        DownloadConfig::builder()
            .layers(layers.iter().copied())
            .dates(DateRange::new(date(2020, 1, 1), date(2020, 1, 3)).unwrap())
            .resolution(Resolution::R8km)
            .tiled(tiled)
            .output_dir("/data/out")
            .build()
            .unwrap()
    }

    #[test]
    fn test_artifact_path_is_deterministic() {
        let p1 = artifact_path(
            Path::new("/data/out"),
            Projection::Geographic,
            date(2020, 1, 1),
            "MODIS_Terra_CorrectedReflectance_TrueColor",
        );
        let p2 = artifact_path(
            Path::new("/data/out"),
            Projection::Geographic,
            date(2020, 1, 1),
            "MODIS_Terra_CorrectedReflectance_TrueColor",
        );
        assert_eq!(p1, p2);
        assert_eq!(
            p1,
            PathBuf::from(
                "/data/out/4326/2020-01-01/MODIS_Terra_CorrectedReflectance_TrueColor.tif"
            )
        );
    }

    #[test]
    fn test_tile_path_layout() {
        let p = tile_path(
            Path::new("out"),
            Projection::Arctic,
            date(2021, 12, 31),
            "VIIRS_SNPP_CorrectedReflectance_TrueColor",
            3,
            12,
        );
        assert_eq!(
            p,
            PathBuf::from("out/3413/2021-12-31/VIIRS_SNPP_CorrectedReflectance_TrueColor/r003_c012.tif")
        );
    }

    #[test]
    fn test_builder_validation() {
        assert!(DownloadConfig::builder().build().is_err());

        let err = DownloadConfig::builder()
            .layer("MODIS_Terra_CorrectedReflectance_TrueColor")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("date range"));

        let err = DownloadConfig::builder()
            .layer("MODIS_Terra_CorrectedReflectance_TrueColor")
            .dates(DateRange::new(date(2020, 1, 1), date(2020, 1, 2)).unwrap())
            .workers(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Worker count"));
    }

    #[test]
    fn test_plan_single_image_jobs() {
        let config = config_for(&["MODIS_Terra_CorrectedReflectance_TrueColor"], false);
        let catalog = LayerCatalog::builtin();
        let jobs = plan(&config, &catalog).unwrap();

        // 2 days x 1 layer
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].date, date(2020, 1, 1));
        assert_eq!(jobs[1].date, date(2020, 1, 2));
        assert_eq!(jobs[0].outsize, (5120, 2560));
        assert_eq!(jobs[0].window, Projection::Geographic.extent());
        assert!(jobs[0].xml.contains("2020-01-01"));
        assert!(jobs[1].xml.contains("2020-01-02"));
    }

    #[test]
    fn test_plan_tiled_jobs_row_major() {
        let config = config_for(&["MODIS_Terra_CorrectedReflectance_TrueColor"], true);
        let catalog = LayerCatalog::builtin();
        let jobs = plan(&config, &catalog).unwrap();

        // 2 days x 1 layer x 10x5 tiles at 8km
        assert_eq!(jobs.len(), 2 * 50);
        assert_eq!(jobs[0].outsize, (512, 512));
        assert!(jobs[0]
            .output_path
            .to_string_lossy()
            .ends_with("r000_c000.tif"));
        assert!(jobs[1]
            .output_path
            .to_string_lossy()
            .ends_with("r000_c001.tif"));
        // planning twice yields the same plan
        let again = plan(&config, &catalog).unwrap();
        assert_eq!(
            jobs.iter().map(|j| j.output_path.clone()).collect::<Vec<_>>(),
            again.iter().map(|j| j.output_path.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_plan_rejects_unknown_layer() {
        let config = config_for(&["Not_A_Layer"], false);
        let catalog = LayerCatalog::builtin();
        assert!(plan(&config, &catalog).is_err());
    }

    #[test]
    fn test_plan_rejects_date_before_mission_start() {
        let config = DownloadConfig::builder()
            .layer("MODIS_Aqua_CorrectedReflectance_TrueColor")
            .dates(DateRange::new(date(2001, 1, 1), date(2001, 1, 2)).unwrap())
            .build()
            .unwrap();
        let catalog = LayerCatalog::builtin();
        let err = plan(&config, &catalog).unwrap_err();
        assert!(err.to_string().contains("no imagery before"));
    }

    #[test]
    fn test_plan_rejects_resolution_finer_than_native() {
        let config = DownloadConfig::builder()
            .layer("MODIS_Terra_Snow_Cover")
            .dates(DateRange::new(date(2020, 1, 1), date(2020, 1, 2)).unwrap())
            .resolution(Resolution::R250m)
            .build()
            .unwrap();
        let catalog = LayerCatalog::builtin();
        let err = plan(&config, &catalog).unwrap_err();
        assert!(err.to_string().contains("at finest"));
    }

    #[test]
    fn test_translate_args_shape() {
        let config = config_for(&["MODIS_Terra_CorrectedReflectance_TrueColor"], false);
        let catalog = LayerCatalog::builtin();
        let jobs = plan(&config, &catalog).unwrap();
        let args = jobs[0].translate_args();
        assert_eq!(args[0], "-of");
        assert_eq!(args[1], "GTiff");
        assert_eq!(args[2], "-outsize");
        assert_eq!(args[3], "5120");
        assert_eq!(args[5], "-projwin");
        assert_eq!(args[6], "-180");
        assert_eq!(args[7], "90");

        let line = jobs[0].command_line(Path::new("gdal_translate"));
        assert!(line.starts_with("gdal_translate -of GTiff"));
        assert!(line.ends_with(".tif"));
    }

    #[tokio::test]
    async fn test_run_with_empty_plan() {
        let config = config_for(&["MODIS_Terra_CorrectedReflectance_TrueColor"], false);
        let report = Downloader::new(config).run(Vec::new(), false).await.unwrap();
        assert_eq!(report.total(), 0);
    }

    #[tokio::test]
    async fn test_run_missing_tool_fails_all_jobs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = DownloadConfig::builder()
            .layer("MODIS_Terra_CorrectedReflectance_TrueColor")
            .dates(DateRange::new(date(2020, 1, 1), date(2020, 1, 2)).unwrap())
            .resolution(Resolution::R8km)
            .output_dir(tmp.path())
            .tool_path("/nonexistent/gdal_translate")
            .build()
            .unwrap();
        let catalog = LayerCatalog::builtin();
        let jobs = plan(&config, &catalog).unwrap();

        let err = Downloader::new(config).run(jobs, false).await.unwrap_err();
        assert!(err.to_string().contains("All 1 jobs failed"));
    }

    #[tokio::test]
    async fn test_skip_existing_outputs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = DownloadConfig::builder()
            .layer("MODIS_Terra_CorrectedReflectance_TrueColor")
            .dates(DateRange::new(date(2020, 1, 1), date(2020, 1, 2)).unwrap())
            .resolution(Resolution::R8km)
            .output_dir(tmp.path())
            .tool_path("/nonexistent/gdal_translate")
            .skip_existing(true)
            .build()
            .unwrap();
        let catalog = LayerCatalog::builtin();
        let jobs = plan(&config, &catalog).unwrap();

        // Pre-create the output so the job is skipped without spawning.
        let out = &jobs[0].output_path;
        std::fs::create_dir_all(out.parent().unwrap()).unwrap();
        std::fs::write(out, b"existing").unwrap();

        let report = Downloader::new(config).run(jobs, false).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
    }
}
