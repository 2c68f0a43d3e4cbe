use nalgebra::Vector3;

/// Gravity vector in world frame (m/s^2).
pub const GRAVITY: Vector3<f64> = Vector3::new(0.0, 0.0, -9.81);

/// IMU biases.
#[derive(Debug, Clone, Copy)]
pub struct ImuBias {
    pub gyro: Vector3<f64>,
    pub accel: Vector3<f64>,
}

impl ImuBias {
    pub fn zero() -> Self {
        Self {
            gyro: Vector3::zeros(),
            accel: Vector3::zeros(),
        }
    }
}

/// Single IMU measurement.
///
/// `accel` is the measured specific force, so a rig at rest reads roughly
/// `+9.81` along the axis pointing away from the ground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    pub timestamp_s: f64,
    pub accel: Vector3<f64>,
    pub gyro: Vector3<f64>,
}

impl ImuSample {
    pub fn new(accel: Vector3<f64>, gyro: Vector3<f64>, timestamp_s: f64) -> Self {
        Self {
            timestamp_s,
            accel,
            gyro,
        }
    }
}
