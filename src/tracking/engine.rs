//! Contract of the external visual-inertial tracking engine.
//!
//! The engine does pose estimation, mapping and loop closing. This crate only
//! drives it frame by frame and reads its map back at shutdown.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use image::GrayImage;

use crate::atlas::MapPoint;
use crate::error::ConfigError;
use crate::imu::ImuSample;

use super::result::FramePose;

/// Sensor configuration the engine runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorMode {
    Monocular,
    ImuMonocular,
}

impl SensorMode {
    pub fn uses_imu(&self) -> bool {
        matches!(self, SensorMode::ImuMonocular)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorMode::Monocular => "monocular",
            SensorMode::ImuMonocular => "imu-monocular",
        }
    }

    /// Directory (under the engine config root) holding the camera settings.
    pub fn settings_dir(&self) -> &'static str {
        match self {
            SensorMode::Monocular => "Monocular",
            SensorMode::ImuMonocular => "Monocular-Inertial",
        }
    }
}

impl FromStr for SensorMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monocular" => Ok(SensorMode::Monocular),
            "imu-monocular" => Ok(SensorMode::ImuMonocular),
            other => Err(ConfigError::UnknownSensorMode(other.to_string())),
        }
    }
}

impl fmt::Display for SensorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments of the engine's `initialize` call.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub vocabulary_path: PathBuf,
    pub settings_path: PathBuf,
    pub sensor_mode: SensorMode,
    pub enable_viewer: bool,
}

/// A tracking engine the [`FrameTracker`](super::FrameTracker) can drive.
///
/// `track` is blocking and is never called concurrently with itself.
pub trait TrackingEngine: Send {
    fn initialize(settings: &EngineSettings) -> Result<Self>
    where
        Self: Sized;

    /// Scale factor frames must be resized by before `track`. Read once.
    fn image_scale(&self) -> f32;

    /// Track one frame. `imu` holds the samples gathered since the previous
    /// frame and may be empty.
    fn track(&mut self, image: &GrayImage, timestamp_s: f64, imu: &[ImuSample])
        -> Result<FramePose>;

    /// Snapshot of the currently tracked map points, in engine order.
    fn tracked_map_points(&self) -> Vec<MapPoint>;

    fn shutdown(&mut self);
}
