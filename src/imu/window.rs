//! Inertial sample window shared between the IMU and camera workers.
//!
//! The IMU worker appends samples as they arrive. The camera worker reads the
//! window for the next frame, hands it to the tracking engine, and then
//! acknowledges exactly the samples it used. Samples that arrive while the
//! engine is busy stay queued for the following frame.

use parking_lot::Mutex;

use super::sample::ImuSample;

/// Samples accumulated since the frame side last acknowledged a window.
#[derive(Debug, Default)]
pub struct ImuWindow {
    samples: Mutex<Vec<ImuSample>>,
}

impl ImuWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample in arrival order.
    pub fn add(&self, sample: ImuSample) {
        self.samples.lock().push(sample);
    }

    /// Copy of the current window. Does not clear anything.
    pub fn snapshot(&self) -> Vec<ImuSample> {
        self.samples.lock().clone()
    }

    /// Take every accumulated sample and leave the window empty.
    pub fn consume(&self) -> Vec<ImuSample> {
        std::mem::take(&mut *self.samples.lock())
    }

    /// Drop the first `count` samples, i.e. the ones a previous
    /// [`snapshot`](Self::snapshot) handed to the engine.
    ///
    /// Returns how many samples were actually removed.
    pub fn acknowledge(&self, count: usize) -> usize {
        let mut samples = self.samples.lock();
        let n = count.min(samples.len());
        samples.drain(..n);
        n
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use std::sync::Arc;
    use std::thread;

    fn sample(t: f64) -> ImuSample {
        ImuSample::new(Vector3::new(0.0, 0.0, 9.8), Vector3::zeros(), t)
    }

    #[test]
    fn test_consume_returns_arrival_order_then_empty() {
        let window = ImuWindow::new();
        for i in 0..5 {
            window.add(sample(i as f64));
        }

        let taken = window.consume();
        let stamps: Vec<f64> = taken.iter().map(|s| s.timestamp_s).collect();
        assert_eq!(stamps, vec![0.0, 1.0, 2.0, 3.0, 4.0]);

        assert!(window.consume().is_empty());
        assert!(window.is_empty());
    }

    #[test]
    fn test_acknowledge_keeps_late_arrivals() {
        let window = ImuWindow::new();
        window.add(sample(1.0));
        window.add(sample(2.0));

        let handed = window.snapshot();
        assert_eq!(handed.len(), 2);

        // Arrives while the engine is busy with `handed`.
        window.add(sample(3.0));

        assert_eq!(window.acknowledge(handed.len()), 2);
        let rest = window.consume();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].timestamp_s, 3.0);
    }

    #[test]
    fn test_acknowledge_more_than_available() {
        let window = ImuWindow::new();
        window.add(sample(1.0));
        assert_eq!(window.acknowledge(10), 1);
        assert!(window.is_empty());
    }

    #[test]
    fn test_concurrent_add_and_consume_loses_nothing() {
        const N: usize = 20_000;
        let window = Arc::new(ImuWindow::new());

        let producer = {
            let window = Arc::clone(&window);
            thread::spawn(move || {
                for i in 0..N {
                    window.add(sample(i as f64));
                }
            })
        };

        let mut collected = Vec::with_capacity(N);
        while collected.len() < N {
            collected.extend(window.consume());
        }
        producer.join().unwrap();
        collected.extend(window.consume());

        assert_eq!(collected.len(), N);
        for (i, s) in collected.iter().enumerate() {
            assert_eq!(s.timestamp_s, i as f64);
        }
    }

    #[test]
    fn test_concurrent_snapshot_acknowledge_loses_nothing() {
        const N: usize = 10_000;
        let window = Arc::new(ImuWindow::new());

        let producer = {
            let window = Arc::clone(&window);
            thread::spawn(move || {
                for i in 0..N {
                    window.add(sample(i as f64));
                }
            })
        };

        let mut collected = Vec::with_capacity(N);
        while collected.len() < N {
            let handed = window.snapshot();
            window.acknowledge(handed.len());
            collected.extend(handed);
        }
        producer.join().unwrap();

        assert_eq!(collected.len(), N);
        assert!(collected
            .windows(2)
            .all(|w| w[1].timestamp_s == w[0].timestamp_s + 1.0));
    }
}
