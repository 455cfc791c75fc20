//! The per-tick result handed to consumers

use crate::anomaly::Anomaly;
use crate::pattern::MemoryPattern;
use crate::quadtree::QuadTreeState;
use crate::region::MemoryInfo;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of change reported by an external file watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    Created,
    Modified,
    Removed,
}

/// A file-system change attached to the next analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: FileChangeKind,
    pub timestamp_ms: u64,
}

impl FileChange {
    pub fn now(path: impl Into<PathBuf>, kind: FileChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp_ms: now_ms(),
        }
    }
}

/// Output of one scan tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Monotonic tick counter of the producing examiner
    pub tick: u64,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    pub memory_info: MemoryInfo,
    pub patterns: Vec<MemoryPattern>,
    pub anomalies: Vec<Anomaly>,
    pub file_changes: Vec<FileChange>,
    pub quad_tree_state: QuadTreeState,
}

impl AnalysisResult {
    /// Regions the quad-tree could not place this tick
    pub fn dropped_regions(&self) -> usize {
        self.quad_tree_state.dropped
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
