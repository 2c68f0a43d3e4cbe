//! Persisted sparse map: export at shutdown, reload for visualization.
//!
//! Plain comma-separated text, one record per line, no header row:
//!
//! ```text
//! qx,qy,qz,qw          <- record 0: initial orientation (or ax,ay,az,wx,wy,wz)
//! x,y,z                <- records 1..: one map point each, meters
//! ```

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use nalgebra::Vector3;
use tracing::{error, info};

use crate::atlas::MapPoint;
use crate::error::MapFileError;
use crate::geometry::InitialOrientation;

use super::naming::map_file_name;

/// Contents of a map file.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedMap {
    pub initial_orientation: InitialOrientation,
    pub points: Vec<Vector3<f64>>,
}

impl PersistedMap {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Writes the session map into `map_dir` when the node shuts down.
#[derive(Debug, Clone)]
pub struct MapExporter {
    map_dir: PathBuf,
    video_name: String,
    use_live_feed: bool,
}

impl MapExporter {
    pub fn new(map_dir: impl Into<PathBuf>, video_name: impl Into<String>, use_live_feed: bool) -> Self {
        Self {
            map_dir: map_dir.into(),
            video_name: video_name.into(),
            use_live_feed,
        }
    }

    /// Target path for a session ending at `now`.
    pub fn destination(&self, now: NaiveDateTime) -> PathBuf {
        let capture_time = self.use_live_feed.then_some(now);
        self.map_dir.join(map_file_name(&self.video_name, capture_time))
    }

    /// Export `points` (engine order) and the initial orientation.
    ///
    /// Failure is logged and returned; nothing is left at the destination.
    pub fn export(
        &self,
        points: &[MapPoint],
        orientation: &InitialOrientation,
    ) -> Result<PathBuf, MapFileError> {
        let path = self.destination(Local::now().naive_local());
        match write_map(&path, points, orientation) {
            Ok(()) => {
                info!("Saved {} map points to {}", points.len(), path.display());
                Ok(path)
            }
            Err(e) => {
                error!("Map export abandoned: {}", e);
                Err(e)
            }
        }
    }
}

/// Write a map file. Data goes to `<path>.tmp` first and is renamed into place
/// once complete.
pub fn write_map(
    path: &Path,
    points: &[MapPoint],
    orientation: &InitialOrientation,
) -> Result<(), MapFileError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| MapFileError::Create {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let file = File::create(&tmp).map_err(|source| MapFileError::Create {
        path: path.to_path_buf(),
        source,
    })?;

    let result = write_records(file, points, orientation)
        .and_then(|()| fs::rename(&tmp, path))
        .map_err(|source| MapFileError::Write {
            path: path.to_path_buf(),
            source,
        });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_records(
    file: File,
    points: &[MapPoint],
    orientation: &InitialOrientation,
) -> std::io::Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(file);

    writer.write_record(orientation.xyzw().iter().map(|v| v.to_string()))?;
    for mp in points {
        let p = mp.position;
        writer.write_record([p.x.to_string(), p.y.to_string(), p.z.to_string()])?;
    }
    writer.flush()
}

/// Reads map files written by [`MapExporter`] (or the older six-field header).
pub struct MapLoader;

impl MapLoader {
    pub fn load(path: impl AsRef<Path>) -> Result<PersistedMap, MapFileError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| MapFileError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(file);

        let mut initial_orientation = None;
        let mut points = Vec::new();
        for rec in reader.records() {
            let rec = rec.map_err(|source| MapFileError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            let line = rec.position().map(|p| p.line()).unwrap_or_default();
            let values = parse_fields(&rec, path, line)?;

            if initial_orientation.is_none() {
                initial_orientation = Some(parse_orientation(&values, path, line)?);
                continue;
            }
            if values.len() != 3 {
                return Err(MapFileError::FieldCount {
                    path: path.to_path_buf(),
                    line,
                    expected: "3",
                    found: values.len(),
                });
            }
            points.push(Vector3::new(values[0], values[1], values[2]));
        }

        let initial_orientation = initial_orientation.ok_or_else(|| MapFileError::MissingHeader {
            path: path.to_path_buf(),
        })?;

        info!("Loaded point cloud with {} points from {}", points.len(), path.display());
        Ok(PersistedMap {
            initial_orientation,
            points,
        })
    }
}

fn parse_fields(rec: &StringRecord, path: &Path, line: u64) -> Result<Vec<f64>, MapFileError> {
    rec.iter()
        .enumerate()
        .map(|(field, value)| {
            value.parse::<f64>().map_err(|_| MapFileError::Parse {
                path: path.to_path_buf(),
                line,
                field,
                value: value.to_string(),
            })
        })
        .collect()
}

/// Record 0 is either the quaternion `x,y,z,w` or raw inertial readings
/// `ax,ay,az,wx,wy,wz`, of which only the accelerometer matters.
fn parse_orientation(
    values: &[f64],
    path: &Path,
    line: u64,
) -> Result<InitialOrientation, MapFileError> {
    match values {
        [x, y, z, w] => Ok(InitialOrientation::from_xyzw(*x, *y, *z, *w)),
        [ax, ay, az, _wx, _wy, _wz] => Ok(InitialOrientation::from_accel(&Vector3::new(*ax, *ay, *az))),
        _ => Err(MapFileError::FieldCount {
            path: path.to_path_buf(),
            line,
            expected: "4 or 6",
            found: values.len(),
        }),
    }
}
