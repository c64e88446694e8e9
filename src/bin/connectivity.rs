use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use yeofc::{connectivity, ConnectivityConfig, DataVariant};

#[derive(Parser)]
#[command(name = "connectivity", about = "Yeo 7-network functional connectivity per participant")]
struct Args {
    /// Dataset root holding the sub-* directories (default: flux-data/)
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Derivatives path relative to the base directory (default: derivatives/fmriprep-23.1.3)
    #[arg(long)]
    derivatives: Option<PathBuf>,

    /// Output directory for matrices and the group table (default: output/)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Which BOLD derivative to read
    #[arg(long, value_enum, default_value_t = DataVariant::Denoised)]
    variant: DataVariant,

    /// Yeo 7-network label volume
    #[arg(long)]
    atlas: Option<PathBuf>,

    /// Glob of the confound table inside func/ (interpolated only)
    #[arg(long)]
    confounds_pattern: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut cfg = ConnectivityConfig { variant: args.variant, ..ConnectivityConfig::default() };
    if let Some(dir) = args.base_dir {
        cfg.base_dir = dir;
    }
    if let Some(dir) = args.derivatives {
        cfg.derivatives_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        cfg.output_dir = dir;
    }
    if let Some(atlas) = args.atlas {
        cfg.atlas_path = atlas;
    }
    if let Some(pattern) = args.confounds_pattern {
        cfg.confounds_pattern = pattern;
    }

    let report = connectivity::run(&cfg)?;

    info!(
        "{} computed, {} reused, {} missing inputs, {} failed",
        report.computed(),
        report.reused(),
        report.missing_inputs(),
        report.failed().len()
    );
    for (id, reason) in report.failed() {
        warn!("  {id}: {reason}");
    }

    println!("Written → {}", cfg.group_path().display());
    Ok(())
}
