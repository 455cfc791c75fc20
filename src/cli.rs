//! CLI argument parsing for memlens

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for scan reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// Pretty-printed JSON, one document per scan
    Json,
}

/// Built-in synthetic layouts for running without OS access
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyntheticKind {
    /// Bump allocation at a constant stride
    Sequential,
    /// Ring buffer cycling through a fixed set of slots
    Cyclic,
    /// Scattered blocks at seeded random addresses
    Random,
}

#[derive(Parser, Debug)]
#[command(name = "memlens")]
#[command(version)]
#[command(about = "Memory layout examiner with pattern and anomaly detection", long_about = None)]
pub struct Cli {
    /// Examine a single process by PID instead of the whole system
    #[arg(short = 'p', long = "pid", value_name = "PID")]
    pub pid: Option<i64>,

    /// Number of scans to run before exiting
    #[arg(short = 'n', long = "scans", value_name = "N", default_value = "1")]
    pub scans: u64,

    /// Scan interval in milliseconds (overrides the config file)
    #[arg(short = 'i', long = "interval-ms", value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use a synthetic adapter instead of the platform one
    #[arg(long = "synthetic", value_enum, value_name = "LAYOUT")]
    pub synthetic: Option<SyntheticKind>,

    /// Number of regions generated by --synthetic
    #[arg(long = "count", value_name = "N", default_value = "256")]
    pub count: usize,

    /// Block size in bytes for sequential and cyclic layouts
    #[arg(long = "block-size", value_name = "BYTES", default_value = "4096")]
    pub block_size: u64,

    /// Number of ring slots for the cyclic layout
    #[arg(long = "slots", value_name = "N", default_value = "8")]
    pub slots: usize,

    /// Seed for the random layout
    #[arg(long = "seed", value_name = "SEED", default_value = "0")]
    pub seed: u64,

    /// Access count stamped on every synthetic region
    #[arg(long = "access-count", value_name = "N", default_value = "0")]
    pub access_count: u64,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
