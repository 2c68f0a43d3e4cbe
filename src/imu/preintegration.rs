use nalgebra::{UnitQuaternion, Vector3};

use super::sample::{ImuBias, ImuSample, GRAVITY};

/// Preintegrated motion between two frames, expressed in the body frame at
/// the start of the interval (gravity not yet applied).
#[derive(Debug, Clone, Copy)]
pub struct PreintegratedState {
    pub delta_rot: UnitQuaternion<f64>,
    pub delta_vel: Vector3<f64>,
    pub delta_pos: Vector3<f64>,
    pub dt: f64,
}

impl PreintegratedState {
    pub fn identity() -> Self {
        Self {
            delta_rot: UnitQuaternion::identity(),
            delta_vel: Vector3::zeros(),
            delta_pos: Vector3::zeros(),
            dt: 0.0,
        }
    }
}

/// IMU preintegrator: integrates high-rate IMU into a relative motion prior.
pub struct Preintegrator {
    pub bias: ImuBias,
    pub state: PreintegratedState,
}

impl Preintegrator {
    pub fn new(bias: ImuBias) -> Self {
        Self {
            bias,
            state: PreintegratedState::identity(),
        }
    }

    pub fn reset(&mut self) {
        self.state = PreintegratedState::identity();
    }

    /// Integrate a single time step using midpoint integration.
    pub fn integrate(&mut self, prev: ImuSample, curr: ImuSample) {
        let dt = curr.timestamp_s - prev.timestamp_s;
        if dt <= 0.0 {
            return;
        }

        let omega = 0.5 * ((prev.gyro - self.bias.gyro) + (curr.gyro - self.bias.gyro));
        let accel_body = 0.5 * ((prev.accel - self.bias.accel) + (curr.accel - self.bias.accel));

        // Position and velocity use the rotation at the start of the step.
        let accel = self.state.delta_rot * accel_body;
        self.state.delta_pos += self.state.delta_vel * dt + 0.5 * accel * dt * dt;
        self.state.delta_vel += accel * dt;
        self.state.delta_rot = self.state.delta_rot * UnitQuaternion::from_scaled_axis(omega * dt);
        self.state.dt += dt;
    }

    /// Integrate every consecutive pair of a window.
    pub fn integrate_window(&mut self, samples: &[ImuSample]) {
        for pair in samples.windows(2) {
            self.integrate(pair[0], pair[1]);
        }
    }

    /// Predict world pose/velocity from a previous state.
    pub fn propagate(
        &self,
        prev_rot: UnitQuaternion<f64>,
        prev_pos: Vector3<f64>,
        prev_vel: Vector3<f64>,
    ) -> (UnitQuaternion<f64>, Vector3<f64>, Vector3<f64>) {
        let dt = self.state.dt;
        let rot = prev_rot * self.state.delta_rot;
        let vel = prev_vel + GRAVITY * dt + prev_rot * self.state.delta_vel;
        let pos = prev_pos
            + prev_vel * dt
            + 0.5 * GRAVITY * dt * dt
            + prev_rot * self.state.delta_pos;
        (rot, pos, vel)
    }
}
