//! Inertial-only stand-in for the visual-inertial engine.
//!
//! Dead-reckons the rig from IMU windows so the node can be exercised end to
//! end without the native engine. It never builds a map, so exported sessions
//! contain only the orientation record.

use anyhow::Result;
use image::GrayImage;
use nalgebra::{UnitQuaternion, Vector3};
use tracing::{info, warn};

use crate::atlas::MapPoint;
use crate::geometry::SE3;
use crate::imu::{ImuBias, ImuSample, Preintegrator};

use super::engine::{EngineSettings, SensorMode, TrackingEngine};
use super::result::FramePose;

/// Samples averaged to estimate the gravity direction before reporting poses.
const MIN_GRAVITY_SAMPLES: usize = 20;

pub struct InertialOdometryEngine {
    sensor_mode: SensorMode,
    preintegrator: Preintegrator,

    /// Body-to-world rotation, position and velocity once initialized.
    rotation: UnitQuaternion<f64>,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    initialized: bool,

    /// Accelerometer readings collected before initialization.
    gravity_samples: Vec<Vector3<f64>>,

    /// Last sample of the previous window, integrated against the next one.
    last_sample: Option<ImuSample>,
}

impl InertialOdometryEngine {
    fn world_pose(&self) -> SE3 {
        SE3::from_rt(self.rotation, self.position)
    }

    fn try_initialize(&mut self, imu: &[ImuSample]) {
        self.gravity_samples.extend(imu.iter().map(|s| s.accel));
        if self.gravity_samples.len() < MIN_GRAVITY_SAMPLES {
            return;
        }
        let count = self.gravity_samples.len();
        let mean = self.gravity_samples.iter().copied().sum::<Vector3<f64>>() / count as f64;
        // A reading exactly opposite to +Z has no unique shortest rotation.
        self.rotation = UnitQuaternion::rotation_between(&mean, &Vector3::z()).unwrap_or_else(|| {
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI)
        });
        self.initialized = true;
        self.gravity_samples.clear();
        info!(
            "Inertial engine initialized from {} samples (|g|={:.3})",
            count,
            mean.norm()
        );
    }
}

impl TrackingEngine for InertialOdometryEngine {
    fn initialize(settings: &EngineSettings) -> Result<Self> {
        if !settings.sensor_mode.uses_imu() {
            warn!("Inertial engine running in {} mode: poses will never converge", settings.sensor_mode);
        }
        info!(
            "Inertial engine (vocabulary {:?} and settings {:?} unused, viewer={})",
            settings.vocabulary_path, settings.settings_path, settings.enable_viewer
        );
        Ok(Self {
            sensor_mode: settings.sensor_mode,
            preintegrator: Preintegrator::new(ImuBias::zero()),
            rotation: UnitQuaternion::identity(),
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            initialized: false,
            gravity_samples: Vec::new(),
            last_sample: None,
        })
    }

    fn image_scale(&self) -> f32 {
        1.0
    }

    fn track(&mut self, _image: &GrayImage, _timestamp_s: f64, imu: &[ImuSample]) -> Result<FramePose> {
        if !self.sensor_mode.uses_imu() {
            return Ok(FramePose::NotInitialized);
        }
        if imu.is_empty() {
            return Ok(if self.initialized {
                FramePose::from_engine_pose(self.world_pose().inverse())
            } else {
                FramePose::NotInitialized
            });
        }

        if !self.initialized {
            self.try_initialize(imu);
            self.last_sample = imu.last().copied();
            return Ok(FramePose::NotInitialized);
        }

        self.preintegrator.reset();
        if let Some(prev) = self.last_sample {
            self.preintegrator.integrate(prev, imu[0]);
        }
        self.preintegrator.integrate_window(imu);
        self.last_sample = imu.last().copied();

        let (rotation, position, velocity) =
            self.preintegrator
                .propagate(self.rotation, self.position, self.velocity);
        self.rotation = rotation;
        self.position = position;
        self.velocity = velocity;

        Ok(FramePose::from_engine_pose(self.world_pose().inverse()))
    }

    fn tracked_map_points(&self) -> Vec<MapPoint> {
        Vec::new()
    }

    fn shutdown(&mut self) {
        info!(
            "Inertial engine shutdown at p=[{:.3}, {:.3}, {:.3}]",
            self.position.x, self.position.y, self.position.z
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::path::PathBuf;

    fn settings(mode: SensorMode) -> EngineSettings {
        EngineSettings {
            vocabulary_path: PathBuf::from("voc.bin"),
            settings_path: PathBuf::from("cam.yaml"),
            sensor_mode: mode,
            enable_viewer: false,
        }
    }

    fn window(t0: f64, n: usize, accel: Vector3<f64>) -> Vec<ImuSample> {
        (0..n)
            .map(|i| ImuSample::new(accel, Vector3::zeros(), t0 + i as f64 * 0.005))
            .collect()
    }

    #[test]
    fn test_not_initialized_until_gravity_known() {
        let mut engine = InertialOdometryEngine::initialize(&settings(SensorMode::ImuMonocular)).unwrap();
        let img = GrayImage::new(2, 2);
        let g = Vector3::new(0.0, 0.0, 9.81);

        let pose = engine.track(&img, 0.05, &window(0.0, 10, g)).unwrap();
        assert_eq!(pose, FramePose::NotInitialized);
        let pose = engine.track(&img, 0.10, &window(0.05, 10, g)).unwrap();
        assert_eq!(pose, FramePose::NotInitialized);
        assert!(engine.initialized);
    }

    #[test]
    fn test_constant_acceleration_moves_rig() {
        let mut engine = InertialOdometryEngine::initialize(&settings(SensorMode::ImuMonocular)).unwrap();
        let img = GrayImage::new(2, 2);
        engine.track(&img, 0.1, &window(0.0, 20, Vector3::new(0.0, 0.0, 9.81))).unwrap();

        // 1 m/s^2 along body x for 0.5 s.
        let pose = engine
            .track(&img, 0.6, &window(0.1, 101, Vector3::new(1.0, 0.0, 9.81)))
            .unwrap();
        let t_cw = *pose.pose().expect("converged");
        let position = t_cw.inverse().translation;
        // s = 0.5 * a * t^2 over the 0.5 s window plus the 0.005 s bridge step.
        assert_relative_eq!(position.x, 0.5 * 1.0 * 0.505_f64.powi(2), epsilon = 0.01);
        assert_relative_eq!(position.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_monocular_never_converges() {
        let mut engine = InertialOdometryEngine::initialize(&settings(SensorMode::Monocular)).unwrap();
        let pose = engine
            .track(&GrayImage::new(2, 2), 0.1, &window(0.0, 50, Vector3::z()))
            .unwrap();
        assert_eq!(pose, FramePose::NotInitialized);
        assert!(engine.tracked_map_points().is_empty());
    }
}
