//! Error types for memlens
//!
//! Adapter failures are recoverable per tick; the examiner wraps them in
//! [`ExaminerError`] and surfaces them as events instead of stopping.
//! Detector failures stay inside the tick.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a platform adapter while taking a snapshot
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Process {0} not found")]
    ProcessNotFound(i64),

    #[error("Permission denied reading {0}")]
    PermissionDenied(String),

    #[error("Failed to parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("Platform '{0}' is not supported")]
    Unsupported(String),

    #[error("Adapter thread panicked")]
    Panicked,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised inside a pattern detector
///
/// These never leave a tick: the examiner logs them and the failing
/// detector contributes no patterns.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Numerical failure: {0}")]
    Numerical(String),
}

/// Top-level error for the examiner and its configuration
#[derive(Error, Debug)]
pub enum ExaminerError {
    #[error("Adapter failure: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Adapter did not respond within {0:?}")]
    AdapterTimeout(Duration),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read configuration file: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Scan thread failed to start: {0}")]
    Spawn(String),
}

pub type Result<T> = std::result::Result<T, ExaminerError>;
