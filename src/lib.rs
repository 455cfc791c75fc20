//! memlens - memory layout examiner with pattern and anomaly detection
//!
//! A scan loop takes periodic snapshots of memory regions from a platform
//! adapter, indexes them in a quad-tree over normalized
//! `(address, size)` space, and runs two detectors side by side:
//!
//! - a sequence predictor over the ordered address stream ([`sequence`])
//! - a Hough line detector over region points ([`hough`])
//!
//! Their patterns are merged ([`pattern::combine_patterns`]) and checked
//! against anomaly rules ([`anomaly`]). Each tick produces an
//! [`analysis::AnalysisResult`].

pub mod analysis;
pub mod anomaly;
pub mod cli;
pub mod config;
pub mod error;
pub mod examiner;
pub mod hough;
pub mod output;
pub mod pattern;
pub mod platform;
pub mod quadtree;
pub mod region;
pub mod sequence;
pub mod stats;
