//! Conversion from CLI arguments to library configurations

use crate::cli::main_impl::{AugmentArgs, DownloadArgs};
use crate::{
    augment::AugmentConfig,
    catalog::{LayerCatalog, Projection},
    daterange::DateRange,
    download::DownloadConfig,
    grid::Resolution,
};
use anyhow::{Context, Result};
use std::path::Path;

/// Builtin catalog, optionally extended from a user-supplied JSON file
pub(crate) fn load_catalog(extra: Option<&Path>) -> Result<LayerCatalog> {
    let mut catalog = LayerCatalog::builtin();
    if let Some(path) = extra {
        let merged = catalog
            .merge_file(path)
            .with_context(|| format!("Failed to merge catalog '{}'", path.display()))?;
        tracing::debug!(merged, path = %path.display(), "merged extra catalog");
    }
    Ok(catalog)
}

/// Build a validated [`DownloadConfig`] from CLI arguments
pub(crate) fn build_download_config(args: &DownloadArgs) -> Result<DownloadConfig> {
    let projection: Projection = args
        .projection
        .parse()
        .context("Invalid --projection value")?;
    let resolution: Resolution = args
        .resolution
        .parse()
        .context("Invalid --resolution value")?;

    let end = args.end_date.map_or_else(
        || {
            args.start_date
                .succ_opt()
                .context("Start date has no following day")
        },
        Ok,
    )?;
    let dates = DateRange::new(args.start_date, end)?;

    let config = DownloadConfig::builder()
        .layers(args.layers.iter().cloned())
        .dates(dates)
        .projection(projection)
        .tiled(args.tiled)
        .resolution(resolution)
        .workers(args.workers)
        .output_dir(args.output_dir.clone())
        .tool_path(args.tool_path.clone())
        .skip_existing(args.skip_existing)
        .build()?;
    Ok(config)
}

/// Build an [`AugmentConfig`] from CLI arguments
pub(crate) fn build_augment_config(args: &AugmentArgs) -> AugmentConfig {
    let mut config = AugmentConfig::new(args.input_dir.clone());
    config.recursive = args.recursive;
    config.overwrite = args.overwrite;
    config.extensions = args
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();
    config
}
