//! MapPoint - A 3D landmark read back from the tracking engine.

use nalgebra::Vector3;

/// Snapshot of one reconstructed landmark.
///
/// The engine owns the live map; this is the value copied out of it when the
/// session ends and the map is exported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapPoint {
    /// 3D position in the engine's world frame (meters).
    pub position: Vector3<f64>,
}

impl MapPoint {
    pub fn new(position: Vector3<f64>) -> Self {
        Self { position }
    }
}
