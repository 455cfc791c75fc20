//! Deterministic synthetic memory layouts
//!
//! Used by the `--synthetic` CLI mode, tests and benchmarks to drive the
//! pipeline without touching the OS. Random layouts are seeded so every
//! snapshot of the same adapter is identical.

use crate::error::AdapterError;
use crate::platform::PlatformAdapter;
use crate::region::{MemoryInfo, MemoryRegion, ProcessInfo, RegionType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SYNTHETIC_PID: i64 = 1;
const BASE_ADDRESS: u64 = 0x1000;

/// Shape of the generated region list
#[derive(Debug, Clone, PartialEq)]
pub enum SyntheticLayout {
    /// Bump allocation: `count` blocks at a constant stride
    Sequential { count: usize, block_size: u64 },
    /// Ring buffer: `count` allocations cycling through `slots` blocks
    Cyclic {
        count: usize,
        slots: usize,
        block_size: u64,
    },
    /// Scattered blocks of random size at random addresses
    Random { count: usize, seed: u64 },
}

#[derive(Debug, Clone)]
pub struct SyntheticAdapter {
    layout: SyntheticLayout,
    access_count: u64,
    total: u64,
}

impl SyntheticAdapter {
    pub fn new(layout: SyntheticLayout) -> Self {
        Self {
            layout,
            access_count: 0,
            total: 1 << 34,
        }
    }

    /// Stamp every generated region with `access_count`
    pub fn with_access_count(mut self, access_count: u64) -> Self {
        self.access_count = access_count;
        self
    }

    pub fn layout(&self) -> &SyntheticLayout {
        &self.layout
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        let mut regions: Vec<MemoryRegion> = match &self.layout {
            SyntheticLayout::Sequential { count, block_size } => (0..*count as u64)
                .map(|i| block(offset(i, *block_size), *block_size))
                .collect(),
            SyntheticLayout::Cyclic {
                count,
                slots,
                block_size,
            } => {
                let slots = (*slots).max(1) as u64;
                (0..*count as u64)
                    .map(|i| block(offset(i % slots, *block_size), *block_size))
                    .collect()
            }
            SyntheticLayout::Random { count, seed } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                (0..*count)
                    .map(|_| {
                        let address = rng.gen_range(BASE_ADDRESS..1 << 32);
                        let size = rng.gen_range(1..=64u64) * 4096;
                        block(address, size)
                    })
                    .collect()
            }
        };
        for region in &mut regions {
            region.metadata.access_count = self.access_count;
        }
        regions
    }
}

/// Address of block `index`; saturates at the top of the address space
fn offset(index: u64, block_size: u64) -> u64 {
    BASE_ADDRESS.saturating_add(index.saturating_mul(block_size))
}

fn block(address: u64, size: u64) -> MemoryRegion {
    MemoryRegion::new(address, size, RegionType::Heap, SYNTHETIC_PID)
        .with_process_name("synthetic")
        .with_permissions("rw-p")
}

impl PlatformAdapter for SyntheticAdapter {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn memory_info(&self) -> Result<MemoryInfo, AdapterError> {
        let regions = self.regions();
        let used = regions
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.size))
            .min(self.total);
        Ok(MemoryInfo {
            total: self.total,
            used,
            free: self.total - used,
            processes: vec![ProcessInfo {
                id: SYNTHETIC_PID,
                name: "synthetic".to_string(),
                memory_usage: used,
                regions: regions.clone(),
            }],
            regions,
        })
    }

    fn process_memory_info(&self, pid: i64) -> Result<MemoryInfo, AdapterError> {
        if pid != SYNTHETIC_PID {
            return Err(AdapterError::ProcessNotFound(pid));
        }
        self.memory_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_layout() {
        let adapter = SyntheticAdapter::new(SyntheticLayout::Sequential {
            count: 4,
            block_size: 4096,
        });
        let info = adapter.memory_info().unwrap();
        let addresses: Vec<u64> = info.regions.iter().map(|r| r.address).collect();
        assert_eq!(addresses, vec![0x1000, 0x2000, 0x3000, 0x4000]);
        assert_eq!(info.used, 4 * 4096);
        assert_eq!(info.total, info.used + info.free);
    }

    #[test]
    fn test_cyclic_layout_reuses_slots() {
        let adapter = SyntheticAdapter::new(SyntheticLayout::Cyclic {
            count: 6,
            slots: 3,
            block_size: 100,
        });
        let regions = adapter.memory_info().unwrap().regions;
        assert_eq!(regions[0].address, regions[3].address);
        assert_eq!(regions[2].address, regions[5].address);
    }

    #[test]
    fn test_random_layout_is_seeded() {
        let a = SyntheticAdapter::new(SyntheticLayout::Random { count: 16, seed: 3 });
        let b = SyntheticAdapter::new(SyntheticLayout::Random { count: 16, seed: 3 });
        assert_eq!(
            a.memory_info().unwrap().regions,
            b.memory_info().unwrap().regions
        );
    }

    #[test]
    fn test_huge_blocks_saturate() {
        let adapter = SyntheticAdapter::new(SyntheticLayout::Sequential {
            count: 4,
            block_size: u64::MAX / 2,
        });
        let info = adapter.memory_info().unwrap();
        let addresses: Vec<u64> = info.regions.iter().map(|r| r.address).collect();
        assert_eq!(addresses[0], 0x1000);
        assert_eq!(addresses[1], 0x1000 + u64::MAX / 2);
        assert_eq!(addresses[2], u64::MAX);
        assert_eq!(addresses[3], u64::MAX);
        assert_eq!(info.used, info.total);
    }

    #[test]
    fn test_unknown_pid() {
        let adapter = SyntheticAdapter::new(SyntheticLayout::Random { count: 1, seed: 0 });
        assert!(matches!(
            adapter.process_memory_info(99),
            Err(AdapterError::ProcessNotFound(99))
        ));
    }

    #[test]
    fn test_access_count_stamped() {
        let adapter = SyntheticAdapter::new(SyntheticLayout::Sequential {
            count: 3,
            block_size: 64,
        })
        .with_access_count(1500);
        assert!(adapter
            .memory_regions()
            .unwrap()
            .iter()
            .all(|r| r.metadata.access_count == 1500));
    }
}
