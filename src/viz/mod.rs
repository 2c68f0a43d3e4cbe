//! Viewer output.

pub mod rerun;

pub use self::rerun::{RerunOutput, RerunSink};
