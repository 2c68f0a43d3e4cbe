//! Camera/IMU bridge for a visual-inertial tracking engine.
//!
//! - [`imu`] and [`tracking`] pair camera frames with the inertial samples
//!   gathered since the previous frame and drive the engine.
//! - [`system`] runs the camera and IMU workers and exports the map on shutdown.
//! - [`io`] reads and writes persisted maps and replays EuRoC recordings.
//! - [`cloud`] and [`viz`] filter, align and periodically republish saved maps.

pub mod atlas;
pub mod cloud;
pub mod config;
pub mod error;
pub mod geometry;
pub mod imu;
pub mod io;
pub mod system;
pub mod tracking;
pub mod viz;
