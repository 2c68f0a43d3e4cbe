//! State shared between the camera and IMU workers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::imu::ImuWindow;

/// Shared state accessible by both workers.
pub struct SharedState {
    /// Filled by the IMU worker, read and acknowledged by the camera worker.
    pub imu_window: Arc<ImuWindow>,

    /// Request both workers to stop at their next loop iteration.
    pub shutdown_requested: AtomicBool,

    /// Frames for which the engine returned a pose.
    pub frames_tracked: AtomicU64,

    /// Frames for which the engine returned an error.
    pub frames_failed: AtomicU64,

    /// IMU samples added to the window.
    pub imu_received: AtomicU64,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn frames_tracked(&self) -> u64 {
        self.frames_tracked.load(Ordering::SeqCst)
    }

    pub fn frames_failed(&self) -> u64 {
        self.frames_failed.load(Ordering::SeqCst)
    }

    pub fn imu_received(&self) -> u64 {
        self.imu_received.load(Ordering::SeqCst)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            imu_window: Arc::new(ImuWindow::new()),
            shutdown_requested: AtomicBool::new(false),
            frames_tracked: AtomicU64::new(0),
            frames_failed: AtomicU64::new(0),
            imu_received: AtomicU64::new(0),
        }
    }
}
