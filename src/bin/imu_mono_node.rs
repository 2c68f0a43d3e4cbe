//! Tracking node: replays (or waits on) camera and IMU streams, tracks every
//! frame and exports the map on shutdown.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use tracing::{error, info, warn};

use vslam_bridge::config::NodeConfig;
use vslam_bridge::io::euroc::{spawn_replay, EurocDataset};
use vslam_bridge::system::{SlamNode, StopMode};
use vslam_bridge::tracking::{InertialOdometryEngine, TrackingEngine};

#[derive(Parser, Debug)]
#[command(name = "imu_mono_node", about = "Monocular / monocular-inertial tracking node")]
struct Args {
    /// YAML config file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// `monocular` or `imu-monocular`
    #[arg(long)]
    sensor_type: Option<String>,
    #[arg(long)]
    use_viewer: Option<bool>,
    #[arg(long)]
    use_live_feed: Option<bool>,
    #[arg(long)]
    video_name: Option<String>,
    #[arg(long)]
    project_root: Option<PathBuf>,
    #[arg(long)]
    map_dir: Option<PathBuf>,
    /// EuRoC `mav0` directory to replay.
    #[arg(long)]
    dataset: Option<PathBuf>,
    #[arg(long)]
    replay_rate: Option<f64>,
    /// Force map export on or off (default: only for live feeds).
    #[arg(long)]
    export_map: Option<bool>,
}

impl Args {
    fn apply(self, config: &mut NodeConfig) {
        if let Some(v) = self.sensor_type {
            config.sensor_type = v;
        }
        if let Some(v) = self.use_viewer {
            config.use_viewer = v;
        }
        if let Some(v) = self.use_live_feed {
            config.use_live_feed = v;
        }
        if let Some(v) = self.video_name {
            config.video_name = v;
        }
        if let Some(v) = self.project_root {
            config.project_root = v;
        }
        if self.map_dir.is_some() {
            config.map_dir = self.map_dir;
        }
        if self.dataset.is_some() {
            config.dataset = self.dataset;
        }
        if let Some(v) = self.replay_rate {
            config.replay_rate = v;
        }
        if self.export_map.is_some() {
            config.export_map = self.export_map;
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
    let mut config = NodeConfig::load(config_path.as_deref())?;
    args.apply(&mut config);

    // Refuse to start with an unknown sensor mode.
    let settings = config.engine_settings().map_err(|e| {
        error!("{}", e);
        e
    })?;
    info!(
        "Sensor: {}, viewer: {}, live feed: {}, video: {}",
        settings.sensor_mode, settings.enable_viewer, config.use_live_feed, config.video_name
    );

    let engine = InertialOdometryEngine::initialize(&settings)?;
    let mut node = SlamNode::start(engine, settings.sensor_mode, config.exporter());

    let stop = Arc::new(AtomicBool::new(false));
    let (signal_tx, signal_rx) = bounded::<()>(1);
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            info!("Received Ctrl-C, stopping...");
            stop.store(true, Ordering::SeqCst);
            let _ = signal_tx.try_send(());
        })?;
    }

    match &config.dataset {
        Some(path) => {
            let dataset = Arc::new(
                EurocDataset::new(path)
                    .with_context(|| format!("Failed to load dataset {}", path.display()))?,
            );
            info!(
                "Replaying {} frames, {} IMU samples at {}x",
                dataset.len(),
                dataset.imu_entries.len(),
                config.replay_rate
            );
            let image_tx = node.image_sender().context("node is not running")?;
            let replay = spawn_replay(
                dataset,
                image_tx,
                node.imu_sender(),
                config.replay_rate,
                Arc::clone(&stop),
            );
            let stats = replay.join();
            info!(
                "Replay done: {} frames sent, {} skipped, {} IMU samples",
                stats.frames_sent, stats.frames_skipped, stats.imu_sent
            );
        }
        None => {
            warn!("No dataset given and no live transport linked; waiting for Ctrl-C");
            let _ = signal_rx.recv();
        }
    }

    let mode = if stop.load(Ordering::SeqCst) {
        StopMode::Immediate
    } else {
        StopMode::Drain
    };
    let report = node.shutdown(mode)?;
    match report.map_file {
        Some(path) => info!("Map written to {}", path.display()),
        None if config.export_enabled() => warn!("No map file was written"),
        None => {}
    }
    Ok(())
}
