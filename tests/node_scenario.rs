//! End-to-end node runs with a scripted engine.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use image::GrayImage;
use nalgebra::{UnitQuaternion, Vector3};
use parking_lot::Mutex;

use vslam_bridge::atlas::MapPoint;
use vslam_bridge::geometry::SE3;
use vslam_bridge::imu::ImuSample;
use vslam_bridge::io::{MapExporter, MapLoader};
use vslam_bridge::system::{ImageMsg, ImuMsg, SlamNode, Stamp, StopMode};
use vslam_bridge::tracking::{EngineSettings, FramePose, SensorMode, TrackingEngine};

type CallLog = Arc<Mutex<Vec<(f64, Vec<ImuSample>)>>>;

/// Converges on its second frame and reports a fixed set of map points.
struct MockEngine {
    calls: CallLog,
}

impl TrackingEngine for MockEngine {
    fn initialize(_settings: &EngineSettings) -> Result<Self> {
        Ok(Self {
            calls: Arc::default(),
        })
    }

    fn image_scale(&self) -> f32 {
        1.0
    }

    fn track(&mut self, _image: &GrayImage, t: f64, imu: &[ImuSample]) -> Result<FramePose> {
        let mut calls = self.calls.lock();
        calls.push((t, imu.to_vec()));
        if calls.len() < 2 {
            return Ok(FramePose::from_engine_pose(SE3::identity()));
        }
        Ok(FramePose::Tracked(SE3::from_rt(
            UnitQuaternion::identity(),
            Vector3::new(0.0, 0.0, 0.1 * calls.len() as f64),
        )))
    }

    fn tracked_map_points(&self) -> Vec<MapPoint> {
        vec![
            MapPoint::new(Vector3::new(1.0, 0.0, 2.0)),
            MapPoint::new(Vector3::new(-1.0, 0.5, 3.0)),
        ]
    }

    fn shutdown(&mut self) {}
}

fn imu_msg(sec: i32, nanosec: u32, accel: Vector3<f64>) -> ImuMsg {
    ImuMsg {
        stamp: Stamp::new(sec, nanosec),
        linear_acceleration: accel,
        angular_velocity: Vector3::zeros(),
    }
}

fn image_msg(sec: i32, nanosec: u32) -> ImageMsg {
    ImageMsg {
        stamp: Stamp::new(sec, nanosec),
        image: GrayImage::new(16, 12),
    }
}

fn wait_until(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_single_sample_reaches_first_frame() {
    let calls: CallLog = Arc::default();
    let mut node = SlamNode::start(
        MockEngine {
            calls: Arc::clone(&calls),
        },
        SensorMode::ImuMonocular,
        None,
    );
    let shared = Arc::clone(node.shared_state());

    let imu_tx = node.imu_sender().unwrap();
    imu_tx
        .send(imu_msg(1, 0, Vector3::new(0.0, 0.0, 9.8)))
        .unwrap();
    wait_until(|| shared.imu_received() == 1);

    let image_tx = node.image_sender().unwrap();
    image_tx.send(image_msg(1, 100_000_000)).unwrap();
    drop(image_tx);
    drop(imu_tx);

    let report = node.shutdown(StopMode::Drain).unwrap();
    assert_eq!(report.frames_tracked, 1);

    let calls = calls.lock();
    assert_eq!(calls.len(), 1);
    let (t, window) = &calls[0];
    assert!((t - 1.1).abs() < 1e-9);
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].accel, Vector3::new(0.0, 0.0, 9.8));
    assert_eq!(window[0].timestamp_s, 1.0);
}

#[test]
fn test_session_exports_map_with_captured_orientation() {
    let dir = tempfile::tempdir().unwrap();
    let calls: CallLog = Arc::default();
    let mut node = SlamNode::start(
        MockEngine {
            calls: Arc::clone(&calls),
        },
        SensorMode::ImuMonocular,
        Some(MapExporter::new(dir.path(), "desk.mp4", false)),
    );
    let shared = Arc::clone(node.shared_state());
    let imu_tx = node.imu_sender().unwrap();
    let image_tx = node.image_sender().unwrap();

    // Rig rolled so gravity shows up on +y and +z.
    let accel = Vector3::new(0.0, 9.81 * 0.5f64.sqrt(), 9.81 * 0.5f64.sqrt());
    for frame in 0..3u32 {
        for k in 0..4u32 {
            imu_tx
                .send(imu_msg(2, frame * 100_000_000 + k * 20_000_000, accel))
                .unwrap();
        }
        let expected = u64::from(4 * (frame + 1));
        wait_until(|| shared.imu_received() == expected);
        image_tx
            .send(image_msg(2, frame * 100_000_000 + 90_000_000))
            .unwrap();
        let done = u64::from(frame + 1);
        wait_until(|| shared.frames_tracked() == done);
    }
    drop(image_tx);
    drop(imu_tx);

    let report = node.shutdown(StopMode::Drain).unwrap();
    assert_eq!(report.frames_tracked, 3);
    for (_, window) in calls.lock().iter() {
        assert_eq!(window.len(), 4);
    }

    let map = MapLoader::load(report.map_file.unwrap()).unwrap();
    assert_eq!(
        map.points,
        vec![Vector3::new(1.0, 0.0, 2.0), Vector3::new(-1.0, 0.5, 3.0)]
    );
    let tilt = map.initial_orientation.rotation().angle();
    assert!((tilt - std::f64::consts::FRAC_PI_4).abs() < 1e-6);
}
