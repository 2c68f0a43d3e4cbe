//! Geometry utilities: SE3 transforms and display-frame alignment.

pub mod frames;
pub mod se3;

pub use frames::{
    AlignmentMode, DisplayTransform, InitialOrientation, attitude_from_accel,
    compute_display_transform,
};
pub use se3::SE3;
