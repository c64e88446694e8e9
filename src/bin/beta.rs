use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use yeofc::{beta, BetaConfig};

#[derive(Parser)]
#[command(name = "beta", about = "Mean of each Yeo 7 network per subject map")]
struct Args {
    /// Directory searched recursively for subject maps (default: flux-data/)
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// File-name glob of the subject maps (default: *_conn.nii.gz)
    #[arg(long)]
    pattern: Option<String>,

    /// Group CSV output path (default: beta_network_matrix.csv)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Yeo 7-network label volume
    #[arg(long)]
    atlas: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut cfg = BetaConfig::default();
    if let Some(dir) = args.input_dir {
        cfg.input_dir = dir;
    }
    if let Some(pattern) = args.pattern {
        cfg.file_pattern = pattern;
    }
    if let Some(out) = args.output {
        cfg.output_file = out;
    }
    if let Some(atlas) = args.atlas {
        cfg.atlas_path = atlas;
    }

    let report = beta::run(&cfg)?;

    info!("Processed {} subjects, {} failed", report.rows.len(), report.failed.len());
    for f in &report.failed {
        warn!("  {}: {}", f.file, f.reason);
    }
    for s in report.summaries() {
        let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
        info!(
            "{:<18} n={:<4} mean={} std={} min={} max={}",
            s.name,
            s.count,
            fmt(s.mean),
            fmt(s.std),
            fmt(s.min),
            fmt(s.max)
        );
        if s.missing > 0 {
            warn!("{}: {} subjects without a value", s.name, s.missing);
        }
    }

    println!("Written → {}", cfg.output_file.display());
    Ok(())
}
