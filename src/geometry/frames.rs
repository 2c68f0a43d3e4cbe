//! Attitude and display-frame helpers.
//!
//! The persisted map is shown in a `map` frame with Z up. The rotation that
//! places the sparse cloud in that frame is either a fixed roll (the mounting
//! used when the maps were recorded) or the gravity attitude captured when the
//! map was first initialized.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::Deserialize;

/// Assumed height of the sensor above the floor, in meters.
pub const DEFAULT_MOUNT_HEIGHT_M: f64 = 1.5;

/// Fixed display roll (270 degrees) used by [`AlignmentMode::Fixed`].
pub const FIXED_DISPLAY_ROLL_RAD: f64 = 4.7124;

/// Reference orientation of the rig when the map was first initialized.
///
/// Stored as a raw quaternion so the four persisted fields survive a
/// write/read cycle bit for bit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialOrientation {
    pub quaternion: Quaternion<f64>,
}

impl InitialOrientation {
    pub fn identity() -> Self {
        Self {
            quaternion: Quaternion::identity(),
        }
    }

    pub fn from_xyzw(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self {
            quaternion: Quaternion::new(w, x, y, z),
        }
    }

    /// Attitude implied by a gravity reading (yaw is unobservable and set to 0).
    pub fn from_accel(accel: &Vector3<f64>) -> Self {
        Self {
            quaternion: attitude_from_accel(accel).into_inner(),
        }
    }

    pub fn from_rotation(rotation: UnitQuaternion<f64>) -> Self {
        Self {
            quaternion: rotation.into_inner(),
        }
    }

    /// `[x, y, z, w]`, the persisted field order.
    pub fn xyzw(&self) -> [f64; 4] {
        let q = &self.quaternion;
        [q.i, q.j, q.k, q.w]
    }

    /// Normalized rotation. A degenerate (zero) quaternion maps to identity.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::try_new(self.quaternion, f64::EPSILON)
            .unwrap_or_else(UnitQuaternion::identity)
    }
}

impl Default for InitialOrientation {
    fn default() -> Self {
        Self::identity()
    }
}

/// Pitch and roll (radians) from a specific-force reading.
///
/// `pitch = atan2(ay, sqrt(ax² + az²))`, `roll = atan2(-ax, az)`.
pub fn pitch_roll_from_accel(accel: &Vector3<f64>) -> (f64, f64) {
    let a = accel.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::z);
    let pitch = a.y.atan2((a.x * a.x + a.z * a.z).sqrt());
    let roll = (-a.x).atan2(a.z);
    (pitch, roll)
}

pub fn attitude_from_accel(accel: &Vector3<f64>) -> UnitQuaternion<f64> {
    let (pitch, roll) = pitch_roll_from_accel(accel);
    UnitQuaternion::from_euler_angles(roll, pitch, 0.0)
}

/// How the display rotation is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentMode {
    /// Constant roll, independent of the map file.
    #[default]
    Fixed,
    /// Use the orientation stored in the map file.
    Gravity,
}

/// Rotation and offset placing the point cloud frame inside the map frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

/// Derive the display transform. Only the vertical offset is non-zero and it
/// is the configured mount height, not something read from the data.
pub fn compute_display_transform(
    orientation: &InitialOrientation,
    mode: AlignmentMode,
    fixed_roll_rad: f64,
    mount_height_m: f64,
) -> DisplayTransform {
    let rotation = match mode {
        AlignmentMode::Fixed => UnitQuaternion::from_euler_angles(fixed_roll_rad, 0.0, 0.0),
        AlignmentMode::Gravity => orientation.rotation(),
    };
    DisplayTransform {
        rotation,
        translation: Vector3::new(0.0, 0.0, mount_height_m),
    }
}
