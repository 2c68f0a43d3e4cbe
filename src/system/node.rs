//! Tracking node: camera and IMU workers around one `FrameTracker`.
//!
//! The IMU worker appends every sample to the shared window. The camera worker
//! owns the tracker, so the engine is only ever entered from that thread, one
//! frame at a time. On shutdown the camera worker finishes its current frame,
//! hands the tracker back, and the map is exported from the engine's final
//! state.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{info, warn};

use crate::io::MapExporter;
use crate::tracking::{FrameTracker, SensorMode, TrackingEngine};

use super::messages::{ImageMsg, ImuMsg};
use super::shared_state::SharedState;

/// Queue depth for both subscriptions.
const CHANNEL_CAPACITY: usize = 10;

/// Workers wake at least this often to check the shutdown flag.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// How queued messages are treated on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Process everything already queued. Waits until every sender clone,
    /// including ones handed out by `image_sender`/`imu_sender`, is dropped.
    Drain,
    /// Stop after the frame currently being tracked; drop the rest.
    Immediate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownReport {
    pub frames_tracked: u64,
    pub frames_failed: u64,
    pub imu_received: u64,
    /// Written map file, if export was enabled and succeeded.
    pub map_file: Option<PathBuf>,
}

pub struct SlamNode<E: TrackingEngine + 'static> {
    shared: Arc<SharedState>,
    sensor_mode: SensorMode,
    image_tx: Option<Sender<ImageMsg>>,
    imu_tx: Option<Sender<ImuMsg>>,
    camera_handle: Option<JoinHandle<FrameTracker<E>>>,
    imu_handle: Option<JoinHandle<()>>,
    exporter: Option<MapExporter>,
}

impl<E: TrackingEngine + 'static> SlamNode<E> {
    /// Spawn the workers. The IMU worker only runs for inertial sensor modes.
    pub fn start(engine: E, sensor_mode: SensorMode, exporter: Option<MapExporter>) -> Self {
        let shared = SharedState::new();
        let tracker = FrameTracker::new(engine, Arc::clone(&shared.imu_window), sensor_mode);

        let (image_tx, image_rx) = bounded::<ImageMsg>(CHANNEL_CAPACITY);
        let camera_handle = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || run_camera_worker(tracker, image_rx, shared))
        };

        let (imu_tx, imu_handle) = if sensor_mode.uses_imu() {
            let (tx, rx) = bounded::<ImuMsg>(CHANNEL_CAPACITY);
            let shared = Arc::clone(&shared);
            (Some(tx), Some(thread::spawn(move || run_imu_worker(rx, shared))))
        } else {
            (None, None)
        };

        info!(
            "Node started: sensor={}, export={}",
            sensor_mode,
            exporter.is_some()
        );

        Self {
            shared,
            sensor_mode,
            image_tx: Some(image_tx),
            imu_tx,
            camera_handle: Some(camera_handle),
            imu_handle,
            exporter,
        }
    }

    pub fn image_sender(&self) -> Option<Sender<ImageMsg>> {
        self.image_tx.clone()
    }

    /// `None` in monocular mode.
    pub fn imu_sender(&self) -> Option<Sender<ImuMsg>> {
        self.imu_tx.clone()
    }

    pub fn shared_state(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn sensor_mode(&self) -> SensorMode {
        self.sensor_mode
    }

    pub fn is_running(&self) -> bool {
        self.camera_handle.is_some()
    }

    /// Stop both workers, export the map (if enabled) and shut the engine down.
    ///
    /// Export failures are logged and reported as `map_file: None`; they do not
    /// fail the shutdown.
    pub fn shutdown(&mut self, mode: StopMode) -> Result<ShutdownReport> {
        let camera_handle = self
            .camera_handle
            .take()
            .ok_or_else(|| anyhow!("node already shut down"))?;

        if mode == StopMode::Immediate {
            self.shared.request_shutdown();
        }
        self.image_tx.take();
        self.imu_tx.take();

        // Returns once the in-flight frame (if any) has been tracked.
        let tracker = camera_handle
            .join()
            .map_err(|_| anyhow!("camera worker panicked"))?;

        self.shared.request_shutdown();
        if let Some(handle) = self.imu_handle.take() {
            if handle.join().is_err() {
                warn!("IMU worker panicked");
            }
        }

        let map_file = self.exporter.as_ref().and_then(|exporter| {
            let points = tracker.engine().tracked_map_points();
            exporter
                .export(&points, &tracker.initial_orientation())
                .ok()
        });

        let frames = tracker.frame_count();
        let mut engine = tracker.into_engine();
        engine.shutdown();

        let report = ShutdownReport {
            frames_tracked: self.shared.frames_tracked(),
            frames_failed: self.shared.frames_failed(),
            imu_received: self.shared.imu_received(),
            map_file,
        };
        info!(
            "Node stopped: {} frames ({} tracked, {} failed), {} IMU samples",
            frames, report.frames_tracked, report.frames_failed, report.imu_received
        );
        Ok(report)
    }
}

impl<E: TrackingEngine + 'static> Drop for SlamNode<E> {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.shutdown(StopMode::Immediate) {
                warn!("Shutdown on drop failed: {}", e);
            }
        }
    }
}

fn run_camera_worker<E: TrackingEngine>(
    mut tracker: FrameTracker<E>,
    image_rx: Receiver<ImageMsg>,
    shared: Arc<SharedState>,
) -> FrameTracker<E> {
    loop {
        if shared.is_shutdown_requested() {
            break;
        }

        match image_rx.recv_timeout(RECV_TIMEOUT) {
            Ok(msg) => {
                let timestamp_s = msg.stamp.to_seconds();
                match tracker.on_frame(&msg.image, timestamp_s) {
                    Ok(_) => {
                        shared.frames_tracked.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        // A bad frame does not stop the stream.
                        shared.frames_failed.fetch_add(1, Ordering::SeqCst);
                        warn!("Tracking failed at t={:.6}: {:#}", timestamp_s, e);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    tracker
}

fn run_imu_worker(imu_rx: Receiver<ImuMsg>, shared: Arc<SharedState>) {
    loop {
        if shared.is_shutdown_requested() {
            break;
        }

        match imu_rx.recv_timeout(RECV_TIMEOUT) {
            Ok(msg) => {
                shared.imu_window.add(msg.to_sample());
                shared.imu_received.fetch_add(1, Ordering::SeqCst);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
