//! Turns persisted maps into display-ready clouds plus the transform that
//! places them under the map frame.

use anyhow::Result;
use nalgebra::{UnitQuaternion, Vector3};
use serde::Deserialize;
use tracing::info;

use super::outlier::StatisticalOutlierFilter;
use super::point_cloud::PointCloud;
use super::publisher::{CloudSink, POINT_CLOUD_TOPIC, UNSCALED_POINT_CLOUD_TOPIC};
use crate::geometry::frames::{DEFAULT_MOUNT_HEIGHT_M, FIXED_DISPLAY_ROLL_RAD};
use crate::geometry::{compute_display_transform, AlignmentMode};
use crate::io::PersistedMap;
use crate::system::messages::Stamp;

/// How the clouds are placed in the display frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Frame the clouds are expressed in.
    /// Default: "point_cloud"
    pub frame_id: String,

    /// Parent frame of the published transform.
    /// Default: "map"
    pub parent_frame_id: String,

    /// Default: fixed
    pub mode: AlignmentMode,

    /// Roll applied in fixed mode.
    /// Default: 4.7124 (3π/2)
    pub fixed_roll_rad: f64,

    /// Vertical offset of the cloud frame above the parent.
    /// Default: 1.5
    pub mount_height_m: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            frame_id: "point_cloud".to_string(),
            parent_frame_id: "map".to_string(),
            mode: AlignmentMode::Fixed,
            fixed_roll_rad: FIXED_DISPLAY_ROLL_RAD,
            mount_height_m: DEFAULT_MOUNT_HEIGHT_M,
        }
    }
}

/// Rigid transform from `parent_frame_id` to `child_frame_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct StampedTransform {
    pub stamp: Stamp,
    pub parent_frame_id: String,
    pub child_frame_id: String,
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

/// Builds an unfiltered cloud from map coordinates.
pub fn build_cloud(points: &[Vector3<f64>], frame_id: &str, stamp: Stamp) -> PointCloud {
    let points: Vec<Vector3<f32>> = points.iter().map(|p| p.cast::<f32>()).collect();
    PointCloud::from_points(&points, frame_id, stamp)
}

/// Holds the filtered primary and unscaled clouds and republishes them on
/// every tick.
pub struct PointCloudAligner {
    cloud: PointCloud,
    unscaled_cloud: PointCloud,
    transform: StampedTransform,
    ticks: u64,
}

impl PointCloudAligner {
    pub fn new(
        primary: &PersistedMap,
        unscaled: &PersistedMap,
        alignment: &AlignmentConfig,
        filter: &StatisticalOutlierFilter,
    ) -> Self {
        let stamp = Stamp::now();

        let raw = build_cloud(&primary.points, &alignment.frame_id, stamp);
        let cloud = filter.apply(&raw);
        info!(
            "Primary cloud: {} points, {} after outlier removal",
            raw.width, cloud.width
        );

        let raw_unscaled = build_cloud(&unscaled.points, &alignment.frame_id, stamp);
        let unscaled_cloud = filter.apply(&raw_unscaled);
        info!(
            "Unscaled cloud: {} points, {} after outlier removal",
            raw_unscaled.width, unscaled_cloud.width
        );

        let display = compute_display_transform(
            &primary.initial_orientation,
            alignment.mode,
            alignment.fixed_roll_rad,
            alignment.mount_height_m,
        );

        Self {
            cloud,
            unscaled_cloud,
            transform: StampedTransform {
                stamp,
                parent_frame_id: alignment.parent_frame_id.clone(),
                child_frame_id: alignment.frame_id.clone(),
                rotation: display.rotation,
                translation: display.translation,
            },
            ticks: 0,
        }
    }

    pub fn cloud(&self) -> &PointCloud {
        &self.cloud
    }

    pub fn unscaled_cloud(&self) -> &PointCloud {
        &self.unscaled_cloud
    }

    pub fn transform(&self) -> &StampedTransform {
        &self.transform
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Restamps the transform and both clouds with `now` and hands them to
    /// `sink`. Publishes every tick whether or not anything changed.
    pub fn publish_tick(&mut self, sink: &mut dyn CloudSink, now: Stamp) -> Result<()> {
        self.ticks += 1;
        self.transform.stamp = now;
        self.cloud.stamp = now;
        self.unscaled_cloud.stamp = now;

        sink.send_transform(&self.transform)?;
        sink.publish_cloud(POINT_CLOUD_TOPIC, &self.cloud)?;
        sink.publish_cloud(UNSCALED_POINT_CLOUD_TOPIC, &self.unscaled_cloud)?;
        Ok(())
    }
}
