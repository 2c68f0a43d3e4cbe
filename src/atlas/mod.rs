//! Map data read back from the tracking engine.

pub mod map_point;

pub use map_point::MapPoint;
