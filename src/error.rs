//! Error types for configuration and map file handling.
//!
//! Orchestration code wraps these in `anyhow::Error`; they stay typed here so
//! callers can tell a fatal configuration problem from a recoverable I/O one.

use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration problems. Any of these stops the process before a
/// single stream is opened.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sensor type not recognized: {0:?} (expected \"monocular\" or \"imu-monocular\")")]
    UnknownSensorMode(String),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Failures reading or writing a persisted map.
#[derive(Debug, Error)]
pub enum MapFileError {
    #[error("failed to open map file {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not open map file {path} for writing")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed writing map file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("map file {path} is empty (missing orientation record)")]
    MissingHeader { path: PathBuf },

    #[error("{path}:{line}: expected {expected} fields, found {found}")]
    FieldCount {
        path: PathBuf,
        line: u64,
        expected: &'static str,
        found: usize,
    },

    #[error("{path}:{line}: field {field} is not a number: {value:?}")]
    Parse {
        path: PathBuf,
        line: u64,
        field: usize,
        value: String,
    },
}
