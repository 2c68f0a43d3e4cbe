//! EuRoC-layout dataset replay.
//!
//! Reads `cam0/data.csv` (+ images under `cam0/data/`) and `imu0/data.csv`,
//! then plays both streams back on two producer threads, paced by their
//! timestamps, the same way live camera and IMU drivers would publish them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use csv::ReaderBuilder;
use image::GrayImage;
use nalgebra::Vector3;
use tracing::{info, warn};

use crate::system::messages::{ImageMsg, ImuMsg, Stamp};

#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub timestamp_ns: u64,
    pub filename: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ImuEntry {
    pub timestamp_ns: u64,
    pub gyro: Vector3<f64>,
    pub accel: Vector3<f64>,
}

impl ImuEntry {
    pub fn to_msg(&self) -> ImuMsg {
        ImuMsg {
            stamp: Stamp::from_nanos(self.timestamp_ns),
            linear_acceleration: self.accel,
            angular_velocity: self.gyro,
        }
    }
}

#[derive(Debug)]
pub struct EurocDataset {
    dataset_path: PathBuf,
    pub cam0_entries: Vec<ImageEntry>,
    pub imu_entries: Vec<ImuEntry>,
}

impl EurocDataset {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let cam0_entries = load_image_list(root.join("cam0/data.csv"))?;
        let imu_entries = load_imu_list(root.join("imu0/data.csv"))?;

        Ok(Self {
            dataset_path: root,
            cam0_entries,
            imu_entries,
        })
    }

    pub fn len(&self) -> usize {
        self.cam0_entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cam0_entries.is_empty()
    }

    pub fn image(&self, idx: usize) -> Result<GrayImage> {
        let entry = self
            .cam0_entries
            .get(idx)
            .with_context(|| format!("No frame at index {}", idx))?;
        let path = self.dataset_path.join("cam0/data").join(&entry.filename);
        let image = image::open(&path)
            .with_context(|| format!("Failed to read image {:?}", path))?
            .to_luma8();
        Ok(image)
    }

    /// Earliest timestamp over both streams.
    fn start_ns(&self) -> u64 {
        let cam = self.cam0_entries.first().map(|e| e.timestamp_ns);
        let imu = self.imu_entries.first().map(|e| e.timestamp_ns);
        cam.into_iter().chain(imu).min().unwrap_or(0)
    }
}

/// Counts of messages actually delivered by a replay.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayStats {
    pub frames_sent: usize,
    pub frames_skipped: usize,
    pub imu_sent: usize,
}

pub struct ReplayHandle {
    camera: JoinHandle<(usize, usize)>,
    imu: Option<JoinHandle<usize>>,
}

impl ReplayHandle {
    /// Wait for both producers to finish.
    pub fn join(self) -> ReplayStats {
        let (frames_sent, frames_skipped) = self.camera.join().unwrap_or_default();
        let imu_sent = self
            .imu
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();
        ReplayStats {
            frames_sent,
            frames_skipped,
            imu_sent,
        }
    }
}

/// Start replaying `dataset`. `rate` scales playback speed; `rate <= 0` sends
/// as fast as the consumers accept. `imu_tx` is `None` for camera-only runs.
pub fn spawn_replay(
    dataset: Arc<EurocDataset>,
    image_tx: Sender<ImageMsg>,
    imu_tx: Option<Sender<ImuMsg>>,
    rate: f64,
    stop: Arc<AtomicBool>,
) -> ReplayHandle {
    let clock = Arc::new(ReplayClock {
        start: Instant::now(),
        t0_ns: dataset.start_ns(),
        rate,
    });

    let imu = imu_tx.map(|tx| {
        let dataset = Arc::clone(&dataset);
        let clock = Arc::clone(&clock);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut sent = 0;
            for entry in &dataset.imu_entries {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                clock.wait_until(entry.timestamp_ns);
                if tx.send(entry.to_msg()).is_err() {
                    break;
                }
                sent += 1;
            }
            sent
        })
    });

    let camera = thread::spawn(move || {
        let (mut sent, mut skipped) = (0, 0);
        for (idx, entry) in dataset.cam0_entries.iter().enumerate() {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            clock.wait_until(entry.timestamp_ns);
            let image = match dataset.image(idx) {
                Ok(image) => image,
                Err(e) => {
                    warn!("Skipping frame {}: {:#}", idx, e);
                    skipped += 1;
                    continue;
                }
            };
            let msg = ImageMsg {
                stamp: Stamp::from_nanos(entry.timestamp_ns),
                image,
            };
            if image_tx.send(msg).is_err() {
                break;
            }
            sent += 1;
        }
        info!("Camera replay finished: {} frames sent, {} skipped", sent, skipped);
        (sent, skipped)
    });

    ReplayHandle { camera, imu }
}

struct ReplayClock {
    start: Instant,
    t0_ns: u64,
    rate: f64,
}

impl ReplayClock {
    fn wait_until(&self, timestamp_ns: u64) {
        if self.rate <= 0.0 {
            return;
        }
        let offset_s = timestamp_ns.saturating_sub(self.t0_ns) as f64 * 1e-9 / self.rate;
        let due = self.start + Duration::from_secs_f64(offset_s);
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
    }
}

fn load_image_list(csv_path: PathBuf) -> Result<Vec<ImageEntry>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .from_path(&csv_path)
        .with_context(|| format!("Failed to open {}", csv_path.display()))?;

    let mut entries = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        if rec.len() < 2 {
            continue;
        }
        let ts: u64 = rec[0].trim().parse()?;
        let filename = rec[1].trim().to_string();
        entries.push(ImageEntry {
            timestamp_ns: ts,
            filename,
        });
    }
    Ok(entries)
}

fn load_imu_list(csv_path: PathBuf) -> Result<Vec<ImuEntry>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .from_path(&csv_path)
        .with_context(|| format!("Failed to open {}", csv_path.display()))?;

    let mut entries = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        // timestamp, w_x, w_y, w_z, a_x, a_y, a_z
        if rec.len() < 7 {
            continue;
        }
        let ts: u64 = rec[0].trim().parse()?;
        let gyro = Vector3::new(
            rec[1].trim().parse()?,
            rec[2].trim().parse()?,
            rec[3].trim().parse()?,
        );
        let accel = Vector3::new(
            rec[4].trim().parse()?,
            rec[5].trim().parse()?,
            rec[6].trim().parse()?,
        );
        entries.push(ImuEntry {
            timestamp_ns: ts,
            gyro,
            accel,
        });
    }
    Ok(entries)
}
