//! Platform adapters: the only code that talks to the operating system
//!
//! An adapter turns whatever the OS exposes into [`MemoryInfo`] snapshots. It
//! reports raw addresses and sizes; normalization happens downstream. Process
//! enumeration is best-effort: processes that vanish or cannot be read are
//! skipped rather than failing the snapshot.

#[cfg(target_os = "linux")]
pub mod linux;
pub mod synthetic;

use crate::error::AdapterError;
use crate::region::{MemoryInfo, MemoryRegion};
use std::sync::Arc;

pub use synthetic::{SyntheticAdapter, SyntheticLayout};

/// Source of memory snapshots
pub trait PlatformAdapter: Send + Sync {
    /// Short platform name for logs
    fn name(&self) -> &'static str;

    /// System-wide snapshot
    fn memory_info(&self) -> Result<MemoryInfo, AdapterError>;

    /// Snapshot scoped to one process
    fn process_memory_info(&self, pid: i64) -> Result<MemoryInfo, AdapterError>;

    fn memory_regions(&self) -> Result<Vec<MemoryRegion>, AdapterError> {
        Ok(self.memory_info()?.regions)
    }

    fn process_memory_regions(&self, pid: i64) -> Result<Vec<MemoryRegion>, AdapterError> {
        Ok(self.process_memory_info(pid)?.regions)
    }
}

/// Adapter for targets without an implementation
#[derive(Debug, Clone, Default)]
pub struct UnsupportedAdapter;

impl PlatformAdapter for UnsupportedAdapter {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn memory_info(&self) -> Result<MemoryInfo, AdapterError> {
        Err(AdapterError::Unsupported(std::env::consts::OS.to_string()))
    }

    fn process_memory_info(&self, _pid: i64) -> Result<MemoryInfo, AdapterError> {
        Err(AdapterError::Unsupported(std::env::consts::OS.to_string()))
    }
}

/// The adapter for the platform this binary was built for
#[cfg(target_os = "linux")]
pub fn native() -> Arc<dyn PlatformAdapter> {
    Arc::new(linux::ProcfsAdapter::default())
}

/// The adapter for the platform this binary was built for
#[cfg(not(target_os = "linux"))]
pub fn native() -> Arc<dyn PlatformAdapter> {
    Arc::new(UnsupportedAdapter)
}
