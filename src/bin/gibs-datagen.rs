//! GIBS dataset generator CLI
//!
//! Command-line interface for downloading GIBS satellite imagery and
//! preparing training datasets with the gibs-datagen library.

#[cfg(feature = "cli")]
use gibs_datagen::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
