//! Offline map visualization: filtering, alignment and periodic publishing.

pub mod aligner;
pub mod outlier;
pub mod point_cloud;
pub mod publisher;

pub use aligner::{AlignmentConfig, PointCloudAligner, StampedTransform};
pub use outlier::{OutlierFilterConfig, StatisticalOutlierFilter};
pub use point_cloud::{PointCloud, PointField};
pub use publisher::{run_publish_loop, ChannelSink, CloudSink, Published};
