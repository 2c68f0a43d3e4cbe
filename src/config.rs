//! Process configuration.
//!
//! Both processes read an optional YAML file; every field has a default so a
//! missing file or a partial one is fine. Command-line flags are applied on
//! top by the binaries.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::cloud::{AlignmentConfig, OutlierFilterConfig};
use crate::error::ConfigError;
use crate::io::MapExporter;
use crate::tracking::{EngineSettings, SensorMode};

/// Camera settings file name inside each sensor-mode directory.
const CAMERA_SETTINGS_FILE: &str = "RealSense_D435i.yaml";

fn load_yaml<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T, ConfigError> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Configuration of the tracking node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// `monocular` or `imu-monocular`. Validated by [`NodeConfig::sensor_mode`].
    /// Default: "imu-monocular"
    pub sensor_type: String,

    /// Passed through to the engine.
    /// Default: true
    pub use_viewer: bool,

    /// Frames come from a live sensor rather than a recording.
    /// Default: false
    pub use_live_feed: bool,

    /// Session name the map file name is derived from.
    /// Default: "output.mp4"
    pub video_name: String,

    /// Base for every relative default path.
    /// Default: "."
    pub project_root: PathBuf,

    /// Default: `<project_root>/orb_slam3/Vocabulary/ORBvoc.txt.bin`
    pub vocabulary_path: Option<PathBuf>,

    /// Default: `<project_root>/maps`
    pub map_dir: Option<PathBuf>,

    /// EuRoC-layout directory to replay instead of live topics.
    pub dataset: Option<PathBuf>,

    /// Replay speed multiplier; 0 or less replays as fast as possible.
    /// Default: 1.0
    pub replay_rate: f64,

    /// Write the map at shutdown. Unset means "only for live feeds".
    pub export_map: Option<bool>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sensor_type: SensorMode::ImuMonocular.as_str().to_string(),
            use_viewer: true,
            use_live_feed: false,
            video_name: "output.mp4".to_string(),
            project_root: PathBuf::from("."),
            vocabulary_path: None,
            map_dir: None,
            dataset: None,
            replay_rate: 1.0,
            export_map: None,
        }
    }
}

impl NodeConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        load_yaml(path)
    }

    pub fn sensor_mode(&self) -> Result<SensorMode, ConfigError> {
        self.sensor_type.parse()
    }

    pub fn vocabulary_path(&self) -> PathBuf {
        self.vocabulary_path.clone().unwrap_or_else(|| {
            self.project_root
                .join("orb_slam3")
                .join("Vocabulary")
                .join("ORBvoc.txt.bin")
        })
    }

    pub fn settings_path(&self, mode: SensorMode) -> PathBuf {
        self.project_root
            .join("orb_slam3")
            .join("config")
            .join(mode.settings_dir())
            .join(CAMERA_SETTINGS_FILE)
    }

    pub fn map_dir(&self) -> PathBuf {
        self.map_dir
            .clone()
            .unwrap_or_else(|| self.project_root.join("maps"))
    }

    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let sensor_mode = self.sensor_mode()?;
        Ok(EngineSettings {
            vocabulary_path: self.vocabulary_path(),
            settings_path: self.settings_path(sensor_mode),
            sensor_mode,
            enable_viewer: self.use_viewer,
        })
    }

    pub fn export_enabled(&self) -> bool {
        self.export_map.unwrap_or(self.use_live_feed)
    }

    pub fn exporter(&self) -> Option<MapExporter> {
        self.export_enabled()
            .then(|| MapExporter::new(self.map_dir(), self.video_name.clone(), self.use_live_feed))
    }
}

/// Configuration of the map visualizer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// File name looked up in both map directories. Required.
    pub map_file_name: String,

    /// Default: "."
    pub project_root: PathBuf,

    /// Default: `<project_root>/maps`
    pub map_dir: Option<PathBuf>,

    /// Default: `<project_root>/unscaled_maps`
    pub unscaled_map_dir: Option<PathBuf>,

    /// Default: 500
    pub publish_period_ms: u64,

    pub outlier: OutlierFilterConfig,

    pub alignment: AlignmentConfig,

    /// Write the recording to this `.rrd` file instead of spawning a viewer.
    pub save_rrd: Option<PathBuf>,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            map_file_name: String::new(),
            project_root: PathBuf::from("."),
            map_dir: None,
            unscaled_map_dir: None,
            publish_period_ms: 500,
            outlier: OutlierFilterConfig::default(),
            alignment: AlignmentConfig::default(),
            save_rrd: None,
        }
    }
}

impl VisualizerConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        load_yaml(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_file_name.trim().is_empty() {
            return Err(ConfigError::Missing("map_file_name"));
        }
        Ok(())
    }

    pub fn map_path(&self) -> PathBuf {
        self.map_dir
            .clone()
            .unwrap_or_else(|| self.project_root.join("maps"))
            .join(&self.map_file_name)
    }

    pub fn unscaled_map_path(&self) -> PathBuf {
        self.unscaled_map_dir
            .clone()
            .unwrap_or_else(|| self.project_root.join("unscaled_maps"))
            .join(&self.map_file_name)
    }

    pub fn publish_period(&self) -> Duration {
        Duration::from_millis(self.publish_period_ms.max(1))
    }
}
