//! Periodic republishing of aligned clouds.

use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::{select, tick, unbounded, Receiver, Sender};
use tracing::{info, warn};

use super::aligner::{PointCloudAligner, StampedTransform};
use super::point_cloud::PointCloud;
use crate::system::messages::Stamp;

pub const POINT_CLOUD_TOPIC: &str = "orb_point_cloud2";
pub const UNSCALED_POINT_CLOUD_TOPIC: &str = "orb_unscaled_point_cloud2";

/// Destination for published clouds and transforms.
pub trait CloudSink: Send {
    fn publish_cloud(&mut self, topic: &str, cloud: &PointCloud) -> Result<()>;
    fn send_transform(&mut self, transform: &StampedTransform) -> Result<()>;
}

/// Everything a `ChannelSink` forwards.
#[derive(Debug, Clone)]
pub enum Published {
    Cloud { topic: String, cloud: PointCloud },
    Transform(StampedTransform),
}

/// In-process sink; receivers see each message in publish order.
pub struct ChannelSink {
    tx: Sender<Published>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<Published>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl CloudSink for ChannelSink {
    fn publish_cloud(&mut self, topic: &str, cloud: &PointCloud) -> Result<()> {
        self.tx
            .send(Published::Cloud {
                topic: topic.to_string(),
                cloud: cloud.clone(),
            })
            .map_err(|_| anyhow!("cloud receiver dropped"))
    }

    fn send_transform(&mut self, transform: &StampedTransform) -> Result<()> {
        self.tx
            .send(Published::Transform(transform.clone()))
            .map_err(|_| anyhow!("transform receiver dropped"))
    }
}

/// Publishes once per `period` until `shutdown` receives a message or its
/// sender is dropped. Returns the number of ticks run.
pub fn run_publish_loop(
    aligner: &mut PointCloudAligner,
    sink: &mut dyn CloudSink,
    period: Duration,
    shutdown: &Receiver<()>,
) -> u64 {
    let ticker = tick(period);
    let mut ticks = 0u64;

    info!("Publishing clouds every {:?}", period);
    loop {
        select! {
            recv(ticker) -> _ => {
                if let Err(e) = aligner.publish_tick(sink, Stamp::now()) {
                    warn!("Publish failed: {}", e);
                }
                ticks += 1;
            }
            recv(shutdown) -> _ => break,
        }
    }

    info!("Publisher stopped after {} ticks", ticks);
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::aligner::AlignmentConfig;
    use crate::cloud::outlier::StatisticalOutlierFilter;
    use crate::geometry::InitialOrientation;
    use crate::io::PersistedMap;
    use nalgebra::Vector3;
    use std::thread;

    fn aligner() -> PointCloudAligner {
        let map = PersistedMap {
            initial_orientation: InitialOrientation::identity(),
            points: vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.1, 0.0, 0.0)],
        };
        PointCloudAligner::new(
            &map,
            &map,
            &AlignmentConfig::default(),
            &StatisticalOutlierFilter::default(),
        )
    }

    #[test]
    fn test_loop_publishes_until_shutdown() {
        let (mut sink, rx) = ChannelSink::new();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let handle = thread::spawn(move || {
            let mut aligner = aligner();
            run_publish_loop(&mut aligner, &mut sink, Duration::from_millis(5), &stop_rx)
        });

        let first: Vec<Published> = (0..6)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        drop(stop_tx);
        let ticks = handle.join().unwrap();

        assert!(ticks >= 2);
        assert!(matches!(first[0], Published::Transform(_)));
        let topics: Vec<&str> = first
            .iter()
            .filter_map(|m| match m {
                Published::Cloud { topic, .. } => Some(topic.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            topics,
            vec![
                POINT_CLOUD_TOPIC,
                UNSCALED_POINT_CLOUD_TOPIC,
                POINT_CLOUD_TOPIC,
                UNSCALED_POINT_CLOUD_TOPIC
            ]
        );
    }

    #[test]
    fn test_sink_errors_do_not_stop_loop() {
        let (mut sink, rx) = ChannelSink::new();
        drop(rx);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let handle = thread::spawn(move || {
            let mut aligner = aligner();
            run_publish_loop(&mut aligner, &mut sink, Duration::from_millis(2), &stop_rx)
        });
        thread::sleep(Duration::from_millis(30));
        stop_tx.send(()).unwrap();
        assert!(handle.join().unwrap() >= 1);
    }
}
