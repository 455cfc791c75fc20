//! Linux adapter reading `/proc`
//!
//! - `/proc/meminfo` for system totals
//! - `/proc/<pid>/comm` for the process name
//! - `/proc/<pid>/statm` for resident pages
//! - `/proc/<pid>/maps` for regions
//!
//! Processes that exit mid-scan or deny access to their maps are skipped in
//! system-wide snapshots.

use crate::error::AdapterError;
use crate::platform::PlatformAdapter;
use crate::region::{MemoryInfo, MemoryRegion, ProcessInfo, RegionType};
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// `start-end perms offset dev inode [path]`
fn maps_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9a-fA-F]+)-([0-9a-fA-F]+)\s+(\S{4})\s+([0-9a-fA-F]+)\s+\S+\s+\d+\s*(.*)$")
            .expect("maps regex is valid")
    })
}

fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions and only reads a constant
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

/// Reads memory layout from a procfs mount
#[derive(Debug, Clone)]
pub struct ProcfsAdapter {
    root: PathBuf,
    max_processes: usize,
    page_size: u64,
}

impl Default for ProcfsAdapter {
    fn default() -> Self {
        Self::with_root("/proc")
    }
}

impl ProcfsAdapter {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_processes: 64,
            page_size: page_size(),
        }
    }

    /// Cap on processes with mapped regions per system-wide snapshot
    pub fn with_max_processes(mut self, max_processes: usize) -> Self {
        self.max_processes = max_processes;
        self
    }

    fn read(&self, path: &Path) -> Result<String, AdapterError> {
        std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => AdapterError::PermissionDenied(path.display().to_string()),
            _ => AdapterError::Io(e),
        })
    }

    /// `(total, free)` in bytes from meminfo
    fn totals(&self) -> Result<(u64, u64), AdapterError> {
        let path = self.root.join("meminfo");
        let text = self.read(&path)?;
        let field = |name: &str| -> Option<u64> {
            text.lines()
                .find(|l| l.starts_with(name))
                .and_then(|l| l.split_whitespace().nth(1))
                .and_then(|v| v.parse::<u64>().ok())
                .map(|kb| kb * 1024)
        };

        let total = field("MemTotal:").ok_or_else(|| AdapterError::Parse {
            source_name: path.display().to_string(),
            message: "missing MemTotal".to_string(),
        })?;
        let free = field("MemAvailable:")
            .or_else(|| field("MemFree:"))
            .unwrap_or(0)
            .min(total);
        Ok((total, free))
    }

    fn pids(&self) -> Result<Vec<i64>, AdapterError> {
        let mut pids: Vec<i64> = std::fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<i64>().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn process(&self, pid: i64) -> Result<ProcessInfo, AdapterError> {
        let dir = self.root.join(pid.to_string());
        if !dir.is_dir() {
            return Err(AdapterError::ProcessNotFound(pid));
        }

        let name = self
            .read(&dir.join("comm"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| format!("pid-{}", pid));

        let memory_usage = self
            .read(&dir.join("statm"))
            .ok()
            .and_then(|s| s.split_whitespace().nth(1)?.parse::<u64>().ok())
            .map_or(0, |pages| pages * self.page_size);

        let maps_path = dir.join("maps");
        let maps = self.read(&maps_path).map_err(|e| match e {
            AdapterError::Io(io) if io.kind() == ErrorKind::NotFound => {
                AdapterError::ProcessNotFound(pid)
            }
            other => other,
        })?;
        let regions = parse_maps(&maps, pid, &name);

        Ok(ProcessInfo {
            id: pid,
            name,
            memory_usage,
            regions,
        })
    }
}

/// Parse `/proc/<pid>/maps` text; malformed lines are skipped
pub fn parse_maps(text: &str, pid: i64, process_name: &str) -> Vec<MemoryRegion> {
    let re = maps_line_regex();
    text.lines()
        .filter_map(|line| {
            let caps = re.captures(line.trim())?;
            let start = u64::from_str_radix(&caps[1], 16).ok()?;
            let end = u64::from_str_radix(&caps[2], 16).ok()?;
            if end < start {
                return None;
            }
            let perms = &caps[3];
            let path = caps[5].trim();

            let mut region = MemoryRegion::new(start, end - start, classify(perms, path), pid)
                .with_process_name(process_name)
                .with_permissions(perms);
            if !path.is_empty() {
                region
                    .metadata
                    .extra
                    .insert("path".to_string(), serde_json::Value::from(path));
            }
            if let Ok(offset) = u64::from_str_radix(&caps[4], 16) {
                if offset > 0 {
                    region
                        .metadata
                        .extra
                        .insert("offset".to_string(), serde_json::Value::from(offset));
                }
            }
            Some(region)
        })
        .collect()
}

fn classify(perms: &str, path: &str) -> RegionType {
    if path == "[heap]" {
        return RegionType::Heap;
    }
    if path == "[stack]" || path.starts_with("[stack:") {
        return RegionType::Stack;
    }
    let bytes = perms.as_bytes();
    if bytes.get(2) == Some(&b'x') {
        RegionType::Code
    } else if bytes.first() == Some(&b'r') || bytes.get(1) == Some(&b'w') {
        RegionType::Data
    } else {
        RegionType::Unknown
    }
}

impl PlatformAdapter for ProcfsAdapter {
    fn name(&self) -> &'static str {
        "linux-procfs"
    }

    fn memory_info(&self) -> Result<MemoryInfo, AdapterError> {
        let (total, free) = self.totals()?;

        let mut processes = Vec::new();
        for pid in self.pids()? {
            if processes.len() >= self.max_processes {
                break;
            }
            match self.process(pid) {
                // Kernel threads have an empty maps file
                Ok(process) if process.regions.is_empty() => {
                    tracing::trace!(pid, "Skipping process without mapped regions")
                }
                Ok(process) => processes.push(process),
                Err(e) => tracing::debug!(pid, error = %e, "Skipping unreadable process"),
            }
        }

        let regions = processes
            .iter()
            .flat_map(|p| p.regions.iter().cloned())
            .collect();

        Ok(MemoryInfo {
            total,
            used: total - free,
            free,
            processes,
            regions,
        })
    }

    fn process_memory_info(&self, pid: i64) -> Result<MemoryInfo, AdapterError> {
        let (total, free) = self.totals()?;
        let process = self.process(pid)?;
        let regions = process.regions.clone();
        Ok(MemoryInfo {
            total,
            used: total - free,
            free,
            processes: vec![process],
            regions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MAPS: &str = "\
55d4c8a00000-55d4c8a21000 r-xp 00000000 08:01 1311 /usr/bin/cat
55d4c8c21000-55d4c8c22000 rw-p 00021000 08:01 1311 /usr/bin/cat
55d4ca5e1000-55d4ca602000 rw-p 00000000 00:00 0 [heap]
7ffd1c2e0000-7ffd1c301000 rw-p 00000000 00:00 0 [stack]
7f0000000000-7f0000001000 ---p 00000000 00:00 0
not a maps line
";

    fn fake_proc() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("meminfo"),
            "MemTotal:       16000 kB\nMemFree:         2000 kB\nMemAvailable:    6000 kB\n",
        )
        .unwrap();
        for (pid, name) in [(42, "cat"), (7, "init")] {
            let p = dir.path().join(pid.to_string());
            fs::create_dir(&p).unwrap();
            fs::write(p.join("comm"), format!("{}\n", name)).unwrap();
            fs::write(p.join("statm"), "100 25 10 1 0 20 0\n").unwrap();
            fs::write(p.join("maps"), MAPS).unwrap();
        }
        fs::create_dir(dir.path().join("self")).unwrap();
        dir
    }

    #[test]
    fn test_parse_maps_classifies_regions() {
        let regions = parse_maps(MAPS, 42, "cat");
        assert_eq!(regions.len(), 5);

        let types: Vec<RegionType> = regions.iter().map(|r| r.region_type).collect();
        assert_eq!(
            types,
            vec![
                RegionType::Code,
                RegionType::Data,
                RegionType::Heap,
                RegionType::Stack,
                RegionType::Unknown
            ]
        );
        assert_eq!(regions[0].address, 0x55d4c8a00000);
        assert_eq!(regions[0].size, 0x21000);
        assert_eq!(regions[0].metadata.permissions.as_deref(), Some("r-xp"));
        assert_eq!(regions[0].metadata.extra["path"], "/usr/bin/cat");
        assert_eq!(regions[1].metadata.extra["offset"], 0x21000);
        assert!(regions[4].metadata.extra.is_empty());
    }

    #[test]
    fn test_system_snapshot_from_fake_proc() {
        let dir = fake_proc();
        let adapter = ProcfsAdapter::with_root(dir.path());
        let info = adapter.memory_info().unwrap();

        assert_eq!(info.total, 16000 * 1024);
        assert_eq!(info.free, 6000 * 1024);
        assert_eq!(info.used, 10000 * 1024);
        let pids: Vec<i64> = info.processes.iter().map(|p| p.id).collect();
        assert_eq!(pids, vec![7, 42]);
        assert_eq!(info.regions.len(), 10);
        assert_eq!(info.processes[1].name, "cat");
        assert_eq!(info.processes[1].memory_usage, 25 * adapter.page_size);
    }

    #[test]
    fn test_max_processes_cap() {
        let dir = fake_proc();
        let adapter = ProcfsAdapter::with_root(dir.path()).with_max_processes(1);
        assert_eq!(adapter.memory_info().unwrap().processes.len(), 1);
    }

    #[test]
    fn test_kernel_threads_do_not_fill_cap() {
        let dir = fake_proc();
        for pid in 2..80 {
            let p = dir.path().join(pid.to_string());
            if p.exists() {
                continue;
            }
            fs::create_dir(&p).unwrap();
            fs::write(p.join("comm"), "kworker/0:0\n").unwrap();
            fs::write(p.join("statm"), "0 0 0 0 0 0 0\n").unwrap();
            fs::write(p.join("maps"), "").unwrap();
        }
        let p = dir.path().join("1000");
        fs::create_dir(&p).unwrap();
        fs::write(p.join("comm"), "app\n").unwrap();
        fs::write(
            p.join("maps"),
            "55d4ca5e1000-55d4ca602000 rw-p 00000000 00:00 0 [heap]\n",
        )
        .unwrap();

        let info = ProcfsAdapter::with_root(dir.path()).memory_info().unwrap();
        let pids: Vec<i64> = info.processes.iter().map(|p| p.id).collect();
        assert_eq!(pids, vec![7, 42, 1000]);
        assert_eq!(info.regions.len(), 11);
        assert!(info.processes.iter().all(|p| !p.regions.is_empty()));
    }

    #[test]
    fn test_process_snapshot() {
        let dir = fake_proc();
        let adapter = ProcfsAdapter::with_root(dir.path());
        let info = adapter.process_memory_info(42).unwrap();
        assert_eq!(info.processes.len(), 1);
        assert!(info.regions.iter().all(|r| r.process_id == 42));
    }

    #[test]
    fn test_missing_process() {
        let dir = fake_proc();
        let adapter = ProcfsAdapter::with_root(dir.path());
        assert!(matches!(
            adapter.process_memory_info(999),
            Err(AdapterError::ProcessNotFound(999))
        ));
    }

    #[test]
    fn test_missing_meminfo_is_error() {
        let dir = TempDir::new().unwrap();
        let adapter = ProcfsAdapter::with_root(dir.path());
        assert!(adapter.memory_info().is_err());
    }
}
