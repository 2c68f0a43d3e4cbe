//! Rigid body transform (rotation + translation).

use nalgebra::{UnitQuaternion, Vector3};

/// Tolerance used when deciding whether a pose is the identity sentinel.
const IDENTITY_EPS: f64 = 1e-9;

/// A rigid transform in SE(3).
///
/// Poses reported by the tracking engine are camera-from-world (`T_cw`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn from_rt(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn inverse(&self) -> SE3 {
        let rotation = self.rotation.inverse();
        SE3 {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// True when this is (numerically) the identity transform.
    pub fn is_identity(&self) -> bool {
        self.rotation.angle() < IDENTITY_EPS && self.translation.norm() < IDENTITY_EPS
    }
}
