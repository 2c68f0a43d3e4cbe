//! Rerun output for the map visualizer.
//!
//! Entity hierarchy:
//!     map                              - parent frame (FLU)
//!         point_cloud                  - alignment transform
//!             orb_point_cloud2         - primary cloud (white)
//!             orb_unscaled_point_cloud2 - unscaled cloud (orange)

use std::path::Path;

use anyhow::{Context, Result};
use rerun::{external::glam, RecordingStream};

use crate::cloud::publisher::UNSCALED_POINT_CLOUD_TOPIC;
use crate::cloud::{CloudSink, PointCloud, StampedTransform};
use crate::system::messages::Stamp;

/// Where the recording goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RerunOutput {
    /// Spawn a viewer process and stream to it.
    Spawn,
    /// Write an `.rrd` file.
    Save(std::path::PathBuf),
}

pub struct RerunSink {
    rec: RecordingStream,
    parent_frame: String,
    child_frame: String,
    start: Option<Stamp>,
}

impl RerunSink {
    pub fn spawn(app_name: &str) -> Result<Self> {
        // Runs rerun viewer in a separate process
        let rec = rerun::RecordingStreamBuilder::new(app_name)
            .spawn()
            .context("Failed to spawn rerun viewer")?;
        Self::with_stream(rec)
    }

    pub fn save(app_name: &str, path: &Path) -> Result<Self> {
        let rec = rerun::RecordingStreamBuilder::new(app_name)
            .save(path)
            .with_context(|| format!("Failed to create recording {}", path.display()))?;
        Self::with_stream(rec)
    }

    pub fn open(app_name: &str, output: &RerunOutput) -> Result<Self> {
        match output {
            RerunOutput::Spawn => Self::spawn(app_name),
            RerunOutput::Save(path) => Self::save(app_name, path),
        }
    }

    fn with_stream(rec: RecordingStream) -> Result<Self> {
        // Map frame is x forward, y left, z up
        rec.log_static("map", &rerun::ViewCoordinates::FLU())?;
        Ok(Self {
            rec,
            parent_frame: "map".to_string(),
            child_frame: "point_cloud".to_string(),
            start: None,
        })
    }

    fn set_time(&mut self, stamp: Stamp) {
        let start = *self.start.get_or_insert(stamp);
        let relative = (stamp.to_seconds() - start.to_seconds()).max(0.0);
        self.rec.set_duration_secs("time", relative);
    }

    fn cloud_entity(&self, topic: &str) -> String {
        format!("{}/{}/{}", self.parent_frame, self.child_frame, topic)
    }
}

impl CloudSink for RerunSink {
    fn publish_cloud(&mut self, topic: &str, cloud: &PointCloud) -> Result<()> {
        self.set_time(cloud.stamp);
        let pts: Vec<[f32; 3]> = cloud.points().map(|p| [p.x, p.y, p.z]).collect();
        let color = if topic == UNSCALED_POINT_CLOUD_TOPIC {
            [255u8, 140, 0]
        } else {
            [255u8, 255, 255]
        };
        self.rec.log(
            self.cloud_entity(topic),
            &rerun::Points3D::new(pts)
                .with_colors([color])
                .with_radii([0.02f32]),
        )?;
        Ok(())
    }

    fn send_transform(&mut self, transform: &StampedTransform) -> Result<()> {
        self.set_time(transform.stamp);
        self.parent_frame = transform.parent_frame_id.clone();
        self.child_frame = transform.child_frame_id.clone();

        let translation = glam::Vec3::new(
            transform.translation.x as f32,
            transform.translation.y as f32,
            transform.translation.z as f32,
        );
        let rotation = glam::Quat::from_xyzw(
            transform.rotation.coords.x as f32,
            transform.rotation.coords.y as f32,
            transform.rotation.coords.z as f32,
            transform.rotation.w as f32,
        );
        self.rec.log(
            format!("{}/{}", self.parent_frame, self.child_frame),
            &rerun::Transform3D::from_translation_rotation(translation, rotation),
        )?;
        Ok(())
    }
}
