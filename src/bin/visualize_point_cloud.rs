//! Loads a saved map (and its unscaled variant), filters both and republishes
//! them with the alignment transform until Ctrl-C.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::bounded;
use tracing::{error, info};

use vslam_bridge::cloud::{run_publish_loop, PointCloudAligner, StatisticalOutlierFilter};
use vslam_bridge::config::VisualizerConfig;
use vslam_bridge::geometry::AlignmentMode;
use vslam_bridge::io::MapLoader;
use vslam_bridge::viz::{RerunOutput, RerunSink};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AlignmentArg {
    Fixed,
    Gravity,
}

impl From<AlignmentArg> for AlignmentMode {
    fn from(arg: AlignmentArg) -> Self {
        match arg {
            AlignmentArg::Fixed => AlignmentMode::Fixed,
            AlignmentArg::Gravity => AlignmentMode::Gravity,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "visualize_point_cloud", about = "Republish a saved sparse map")]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,
    /// File name looked up in both map directories.
    #[arg(long)]
    map_file_name: Option<String>,
    #[arg(long)]
    project_root: Option<PathBuf>,
    #[arg(long)]
    map_dir: Option<PathBuf>,
    #[arg(long)]
    unscaled_map_dir: Option<PathBuf>,
    #[arg(long)]
    publish_period_ms: Option<u64>,
    #[arg(long, value_enum)]
    alignment: Option<AlignmentArg>,
    /// Save to an .rrd file instead of spawning a viewer.
    #[arg(long)]
    save_rrd: Option<PathBuf>,
}

impl Args {
    fn apply(self, config: &mut VisualizerConfig) {
        if let Some(v) = self.map_file_name {
            config.map_file_name = v;
        }
        if let Some(v) = self.project_root {
            config.project_root = v;
        }
        if self.map_dir.is_some() {
            config.map_dir = self.map_dir;
        }
        if self.unscaled_map_dir.is_some() {
            config.unscaled_map_dir = self.unscaled_map_dir;
        }
        if let Some(v) = self.publish_period_ms {
            config.publish_period_ms = v;
        }
        if let Some(v) = self.alignment {
            config.alignment.mode = v.into();
        }
        if self.save_rrd.is_some() {
            config.save_rrd = self.save_rrd;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = Args::parse();
    let config_path = args.config.take();
    let mut config = VisualizerConfig::load(config_path.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    // Nothing to publish without both maps.
    let primary_path = config.map_path();
    let primary = MapLoader::load(&primary_path).map_err(|e| {
        error!("{}", e);
        e
    })?;
    let unscaled_path = config.unscaled_map_path();
    let unscaled = MapLoader::load(&unscaled_path).map_err(|e| {
        error!("{}", e);
        e
    })?;

    let filter = StatisticalOutlierFilter::new(config.outlier);
    let mut aligner = PointCloudAligner::new(&primary, &unscaled, &config.alignment, &filter);

    let output = config
        .save_rrd
        .clone()
        .map(RerunOutput::Save)
        .unwrap_or(RerunOutput::Spawn);
    let mut sink = RerunSink::open("vslam-bridge-point-cloud", &output)
        .context("Failed to open viewer output")?;

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        info!("Received Ctrl-C, stopping...");
        let _ = shutdown_tx.try_send(());
    })?;

    run_publish_loop(&mut aligner, &mut sink, config.publish_period(), &shutdown_rx);
    Ok(())
}
