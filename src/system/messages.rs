//! Transport message types.
//!
//! These mirror the camera and IMU topics the node subscribes to. Header
//! stamps are integer seconds plus nanoseconds.

use std::time::{SystemTime, UNIX_EPOCH};

use image::GrayImage;
use nalgebra::Vector3;

use crate::imu::ImuSample;

/// Message header stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Stamp {
    pub sec: i32,
    pub nanosec: u32,
}

impl Stamp {
    pub fn new(sec: i32, nanosec: u32) -> Self {
        Self { sec, nanosec }
    }

    pub fn from_nanos(ns: u64) -> Self {
        Self {
            sec: (ns / 1_000_000_000) as i32,
            nanosec: (ns % 1_000_000_000) as u32,
        }
    }

    /// Wall-clock now.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: since_epoch.as_secs() as i32,
            nanosec: since_epoch.subsec_nanos(),
        }
    }

    /// `sec + nanosec * 1e-9`
    pub fn to_seconds(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 * 1e-9
    }
}

/// Grayscale camera frame.
#[derive(Debug, Clone)]
pub struct ImageMsg {
    pub stamp: Stamp,
    pub image: GrayImage,
}

/// One inertial reading.
#[derive(Debug, Clone, Copy)]
pub struct ImuMsg {
    pub stamp: Stamp,
    pub linear_acceleration: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
}

impl ImuMsg {
    pub fn to_sample(&self) -> ImuSample {
        ImuSample::new(
            self.linear_acceleration,
            self.angular_velocity,
            self.stamp.to_seconds(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stamp_to_seconds() {
        let stamp = Stamp::new(12, 500_000_000);
        assert_relative_eq!(stamp.to_seconds(), 12.5, epsilon = 1e-12);
    }

    #[test]
    fn test_stamp_from_nanos() {
        let stamp = Stamp::from_nanos(1_403_636_579_763_555_584);
        assert_eq!(stamp.sec, 1_403_636_579);
        assert_eq!(stamp.nanosec, 763_555_584);
    }

    #[test]
    fn test_imu_msg_to_sample() {
        let msg = ImuMsg {
            stamp: Stamp::new(1, 0),
            linear_acceleration: Vector3::new(0.0, 0.0, 9.8),
            angular_velocity: Vector3::new(0.1, 0.0, 0.0),
        };
        let s = msg.to_sample();
        assert_eq!(s.timestamp_s, 1.0);
        assert_eq!(s.accel.z, 9.8);
        assert_eq!(s.gyro.x, 0.1);
    }
}
