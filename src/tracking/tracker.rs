//! Frame tracker: feeds each camera frame plus its inertial window to the
//! tracking engine.
//!
//! One `FrameTracker` lives on the camera worker thread, so frames are tracked
//! strictly in arrival order and the engine is never entered concurrently.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use image::imageops::{self, FilterType};
use image::GrayImage;
use nalgebra::Vector3;
use tracing::{debug, info};

use crate::geometry::InitialOrientation;
use crate::imu::{ImuSample, ImuWindow};

use super::engine::{SensorMode, TrackingEngine};
use super::result::{FramePose, TrackingResult};

/// Per-frame driver around a [`TrackingEngine`].
pub struct FrameTracker<E: TrackingEngine> {
    engine: E,

    /// Window filled by the IMU worker.
    window: Arc<ImuWindow>,

    sensor_mode: SensorMode,

    /// Read from the engine once at construction.
    image_scale: f32,

    /// Frames handed to the engine so far.
    frame_count: u64,

    /// Attitude captured on the first converged frame.
    initial_orientation: Option<InitialOrientation>,
}

impl<E: TrackingEngine> FrameTracker<E> {
    pub fn new(engine: E, window: Arc<ImuWindow>, sensor_mode: SensorMode) -> Self {
        let image_scale = engine.image_scale();
        info!(
            "Frame tracker ready: sensor={}, image_scale={}",
            sensor_mode, image_scale
        );
        Self {
            engine,
            window,
            sensor_mode,
            image_scale,
            frame_count: 0,
            initial_orientation: None,
        }
    }

    /// Track one frame.
    ///
    /// The window is read without clearing it; only after the engine returns
    /// are the samples it received acknowledged. If the engine fails, nothing
    /// is acknowledged and the samples carry over to the next frame.
    pub fn on_frame(&mut self, image: &GrayImage, timestamp_s: f64) -> Result<TrackingResult> {
        let imu = self.window.snapshot();
        let frame = self.rescale(image);

        let t_start = Instant::now();
        let frame_index = self.frame_count;
        self.frame_count += 1;
        let pose = self.engine.track(&frame, timestamp_s, &imu)?;
        let track_ms = t_start.elapsed().as_secs_f64() * 1e3;

        self.window.acknowledge(imu.len());

        match &pose {
            FramePose::Tracked(t_cw) => {
                info!(
                    "Frame {} (t={:.6}): Tcw t=[{:.3}, {:.3}, {:.3}] rot={:.2}deg",
                    frame_index,
                    timestamp_s,
                    t_cw.translation.x,
                    t_cw.translation.y,
                    t_cw.translation.z,
                    t_cw.rotation.angle().to_degrees()
                );
                if self.initial_orientation.is_none() {
                    self.initial_orientation = Some(self.capture_orientation(&imu));
                }
            }
            FramePose::NotInitialized => {
                info!("Frame {} (t={:.6}): tracking not initialized", frame_index, timestamp_s);
            }
        }
        debug!("Frame {}: {} IMU samples, {:.2} ms", frame_index, imu.len(), track_ms);

        Ok(TrackingResult {
            frame_index,
            timestamp_s,
            pose,
            imu_samples: imu.len(),
            track_ms,
        })
    }

    fn rescale<'a>(&self, image: &'a GrayImage) -> Cow<'a, GrayImage> {
        if (self.image_scale - 1.0).abs() <= f32::EPSILON {
            return Cow::Borrowed(image);
        }
        let width = ((image.width() as f32) * self.image_scale).round().max(1.0) as u32;
        let height = ((image.height() as f32) * self.image_scale).round().max(1.0) as u32;
        Cow::Owned(imageops::resize(image, width, height, FilterType::Triangle))
    }

    /// Gravity attitude from the mean accelerometer reading of the window
    /// that produced the first converged pose.
    fn capture_orientation(&self, imu: &[ImuSample]) -> InitialOrientation {
        if !self.sensor_mode.uses_imu() || imu.is_empty() {
            return InitialOrientation::identity();
        }
        let sum: Vector3<f64> = imu.iter().map(|s| s.accel).sum();
        InitialOrientation::from_accel(&(sum / imu.len() as f64))
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn image_scale(&self) -> f32 {
        self.image_scale
    }

    /// Orientation to persist with the map (identity if tracking never converged).
    pub fn initial_orientation(&self) -> InitialOrientation {
        self.initial_orientation.unwrap_or_default()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::MapPoint;
    use crate::geometry::SE3;
    use crate::tracking::engine::EngineSettings;
    use anyhow::bail;
    use nalgebra::UnitQuaternion;

    /// Records what it is given and converges from the third frame on.
    struct ScriptedEngine {
        scale: f32,
        calls: Vec<(u32, u32, f64, Vec<ImuSample>)>,
        fail_next: bool,
    }

    impl TrackingEngine for ScriptedEngine {
        fn initialize(_settings: &EngineSettings) -> Result<Self> {
            Ok(Self {
                scale: 1.0,
                calls: Vec::new(),
                fail_next: false,
            })
        }

        fn image_scale(&self) -> f32 {
            self.scale
        }

        fn track(
            &mut self,
            image: &GrayImage,
            timestamp_s: f64,
            imu: &[ImuSample],
        ) -> Result<FramePose> {
            if std::mem::take(&mut self.fail_next) {
                bail!("engine hiccup");
            }
            self.calls
                .push((image.width(), image.height(), timestamp_s, imu.to_vec()));
            if self.calls.len() < 3 {
                return Ok(FramePose::from_engine_pose(SE3::identity()));
            }
            Ok(FramePose::Tracked(SE3::from_rt(
                UnitQuaternion::identity(),
                Vector3::new(self.calls.len() as f64, 0.0, 0.0),
            )))
        }

        fn tracked_map_points(&self) -> Vec<MapPoint> {
            Vec::new()
        }

        fn shutdown(&mut self) {}
    }

    fn engine(scale: f32) -> ScriptedEngine {
        ScriptedEngine {
            scale,
            calls: Vec::new(),
            fail_next: false,
        }
    }

    fn imu(t: f64, accel: Vector3<f64>) -> ImuSample {
        ImuSample::new(accel, Vector3::zeros(), t)
    }

    #[test]
    fn test_frame_receives_exactly_prior_window() {
        let window = Arc::new(ImuWindow::new());
        let mut tracker = FrameTracker::new(engine(1.0), window.clone(), SensorMode::ImuMonocular);

        window.add(imu(1.0, Vector3::new(0.0, 0.0, 9.8)));
        let result = tracker.on_frame(&GrayImage::new(8, 6), 1.1).unwrap();

        assert_eq!(result.imu_samples, 1);
        assert_eq!(result.pose, FramePose::NotInitialized);
        let calls = &tracker.engine().calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].2, 1.1);
        assert_eq!(calls[0].3, vec![imu(1.0, Vector3::new(0.0, 0.0, 9.8))]);
        assert!(window.is_empty());

        // No new samples: next frame gets an empty window.
        tracker.on_frame(&GrayImage::new(8, 6), 1.2).unwrap();
        assert!(tracker.engine().calls[1].3.is_empty());
        assert_eq!(tracker.frame_count(), 2);
    }

    #[test]
    fn test_failed_track_keeps_window() {
        let window = Arc::new(ImuWindow::new());
        let mut tracker = FrameTracker::new(engine(1.0), window.clone(), SensorMode::ImuMonocular);

        window.add(imu(1.0, Vector3::z()));
        tracker.engine_mut().fail_next = true;
        assert!(tracker.on_frame(&GrayImage::new(4, 4), 1.1).is_err());
        assert_eq!(window.len(), 1);

        window.add(imu(1.15, Vector3::z()));
        let result = tracker.on_frame(&GrayImage::new(4, 4), 1.2).unwrap();
        assert_eq!(result.imu_samples, 2);
        assert_eq!(result.frame_index, 1);
    }

    #[test]
    fn test_image_is_rescaled() {
        let window = Arc::new(ImuWindow::new());
        let mut tracker = FrameTracker::new(engine(0.5), window, SensorMode::Monocular);
        tracker.on_frame(&GrayImage::new(640, 480), 0.0).unwrap();
        let (w, h, _, _) = &tracker.engine().calls[0];
        assert_eq!((*w, *h), (320, 240));
    }

    #[test]
    fn test_initial_orientation_from_first_converged_window() {
        let window = Arc::new(ImuWindow::new());
        let mut tracker = FrameTracker::new(engine(1.0), window.clone(), SensorMode::ImuMonocular);

        assert_eq!(tracker.initial_orientation(), InitialOrientation::identity());

        let mut tracked = Vec::new();
        for (i, t) in [0.1, 0.2, 0.3].iter().enumerate() {
            // Level until the converging frame, tilted afterwards.
            let accel = if i < 2 {
                Vector3::new(0.0, 0.0, 9.81)
            } else {
                Vector3::new(0.0, 9.81, 9.81)
            };
            window.add(imu(*t - 0.05, accel));
            let result = tracker.on_frame(&GrayImage::new(4, 4), *t).unwrap();
            tracked.push(result.pose.is_tracked());
        }

        let expected = InitialOrientation::from_accel(&Vector3::new(0.0, 9.81, 9.81));
        assert_eq!(tracker.initial_orientation(), expected);
        assert_eq!(tracked, vec![false, false, true]);
    }
}
