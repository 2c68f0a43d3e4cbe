//! Tracking: per-frame invocation of the tracking engine.
//!
//! - [`engine`] - the engine contract and sensor configuration
//! - [`tracker`] - `FrameTracker`, pairing frames with inertial windows
//! - [`result`] - pose sentinel handling and per-frame results
//! - [`inertial_engine`] - IMU-only engine used when no native engine is linked

pub mod engine;
pub mod inertial_engine;
pub mod result;
pub mod tracker;

pub use engine::{EngineSettings, SensorMode, TrackingEngine};
pub use inertial_engine::InertialOdometryEngine;
pub use result::{FramePose, TrackingResult};
pub use tracker::FrameTracker;
