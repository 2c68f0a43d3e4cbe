//! Per-frame tracking results.

use crate::geometry::SE3;

/// Outcome of tracking one frame.
///
/// The engine signals "not converged yet" with an identity pose; that case is
/// surfaced as [`FramePose::NotInitialized`] so it cannot be mistaken for a
/// camera sitting at the world origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FramePose {
    NotInitialized,
    /// Camera-from-world transform (`T_cw`).
    Tracked(SE3),
}

impl FramePose {
    /// Interpret a raw engine pose, mapping the identity sentinel.
    pub fn from_engine_pose(t_cw: SE3) -> Self {
        if t_cw.is_identity() {
            FramePose::NotInitialized
        } else {
            FramePose::Tracked(t_cw)
        }
    }

    pub fn is_tracked(&self) -> bool {
        matches!(self, FramePose::Tracked(_))
    }

    pub fn pose(&self) -> Option<&SE3> {
        match self {
            FramePose::Tracked(p) => Some(p),
            FramePose::NotInitialized => None,
        }
    }
}

/// Summary of one `on_frame` call.
#[derive(Debug, Clone)]
pub struct TrackingResult {
    /// Zero-based index of the frame in arrival order.
    pub frame_index: u64,
    pub timestamp_s: f64,
    pub pose: FramePose,
    /// Number of inertial samples handed to the engine with this frame.
    pub imu_samples: usize,
    pub track_ms: f64,
}
