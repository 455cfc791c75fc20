//! Memory region model and per-snapshot normalization
//!
//! Adapters report raw addresses and sizes. Before anything downstream sees a
//! region, its address and size are divided by the largest `address + size`
//! observed in the same batch, mapping both into `[0, 1]`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of memory backing a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegionType {
    Code,
    Data,
    Heap,
    Stack,
    #[default]
    Unknown,
}

/// Known metadata keys plus an open map for adapter-specific extras
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionMetadata {
    /// Number of observed accesses (0 when the adapter does not track it)
    #[serde(default)]
    pub access_count: u64,
    /// Last access time in milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access: Option<u64>,
    /// Permission string as reported by the platform (e.g. "r-xp")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Identity of a region across scans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionKey {
    pub address: u64,
    pub process_id: i64,
}

/// A contiguous span of address space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub address: u64,
    pub size: u64,
    pub region_type: RegionType,
    pub process_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    /// `address / span`, recomputed every snapshot
    #[serde(default)]
    pub normalized_address: f64,
    /// `size / span`, recomputed every snapshot
    #[serde(default)]
    pub normalized_size: f64,
    #[serde(default)]
    pub metadata: RegionMetadata,
}

impl MemoryRegion {
    pub fn new(address: u64, size: u64, region_type: RegionType, process_id: i64) -> Self {
        Self {
            address,
            size,
            region_type,
            process_id,
            process_name: None,
            normalized_address: 0.0,
            normalized_size: 0.0,
            metadata: RegionMetadata::default(),
        }
    }

    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = Some(name.into());
        self
    }

    pub fn with_access_count(mut self, access_count: u64) -> Self {
        self.metadata.access_count = access_count;
        self
    }

    pub fn with_permissions(mut self, permissions: impl Into<String>) -> Self {
        self.metadata.permissions = Some(permissions.into());
        self
    }

    pub fn key(&self) -> RegionKey {
        RegionKey {
            address: self.address,
            process_id: self.process_id,
        }
    }

    /// Exclusive end of the region in raw units (saturating)
    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }

    /// The region as a point in the unit square
    pub fn point(&self) -> (f64, f64) {
        (self.normalized_address, self.normalized_size)
    }
}

/// Per-process memory usage within one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub id: i64,
    pub name: String,
    /// Resident memory in bytes
    pub memory_usage: u64,
    #[serde(default)]
    pub regions: Vec<MemoryRegion>,
}

/// One snapshot from a platform adapter
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub processes: Vec<ProcessInfo>,
    pub regions: Vec<MemoryRegion>,
}

/// Scale factor applied to raw coordinates of one batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    span: f64,
}

impl Normalizer {
    /// Build a normalizer from the largest `address + size` in the batch
    pub fn for_batch(regions: &[MemoryRegion]) -> Self {
        let span = regions.iter().map(MemoryRegion::end).max().unwrap_or(0);
        Self::with_span(span as f64)
    }

    pub fn with_span(span: f64) -> Self {
        Self { span }
    }

    pub fn span(&self) -> f64 {
        self.span
    }

    /// True when the span cannot produce finite coordinates
    pub fn is_degenerate(&self) -> bool {
        !(self.span.is_finite() && self.span > 0.0)
    }

    /// Map a raw value into `[0, 1]`; a degenerate span clamps to 0.0
    pub fn scale(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        (value / self.span).clamp(0.0, 1.0)
    }

    pub fn apply(&self, region: &mut MemoryRegion) {
        region.normalized_address = self.scale(region.address as f64);
        region.normalized_size = self.scale(region.size as f64);
    }
}

/// Normalize a batch in place and return the normalizer that was used
///
/// A non-empty batch whose span is zero (every region at address 0 with size
/// 0) is clamped to the origin instead of producing NaN.
pub fn normalize_regions(regions: &mut [MemoryRegion]) -> Normalizer {
    let normalizer = Normalizer::for_batch(regions);
    if normalizer.is_degenerate() && !regions.is_empty() {
        tracing::warn!(
            count = regions.len(),
            "Memory regions have zero total span; clamping normalized coordinates to 0"
        );
    }
    for region in regions.iter_mut() {
        normalizer.apply(region);
    }
    normalizer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(address: u64, size: u64) -> MemoryRegion {
        MemoryRegion::new(address, size, RegionType::Heap, 1)
    }

    #[test]
    fn test_normalize_against_batch_span() {
        let mut regions = vec![region(0, 100), region(100, 100), region(300, 100)];
        let normalizer = normalize_regions(&mut regions);

        assert_eq!(normalizer.span(), 400.0);
        assert_eq!(regions[1].normalized_address, 0.25);
        assert_eq!(regions[2].normalized_address, 0.75);
        assert_eq!(regions[2].normalized_size, 0.25);
    }

    #[test]
    fn test_unit_span_is_noop() {
        let normalizer = Normalizer::with_span(1.0);
        for value in [0.0, 0.125, 0.5, 0.999, 1.0] {
            assert_eq!(normalizer.scale(value), value);
        }
    }

    #[test]
    fn test_renormalization_is_stable() {
        let mut regions = vec![region(4096, 4096), region(16384, 8192)];
        normalize_regions(&mut regions);
        let first: Vec<_> = regions.iter().map(MemoryRegion::point).collect();

        normalize_regions(&mut regions);
        let second: Vec<_> = regions.iter().map(MemoryRegion::point).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_span_clamps_to_origin() {
        let mut regions = vec![region(0, 0), region(0, 0)];
        let normalizer = normalize_regions(&mut regions);

        assert!(normalizer.is_degenerate());
        for r in &regions {
            assert_eq!(r.point(), (0.0, 0.0));
            assert!(r.normalized_address.is_finite());
        }
    }

    #[test]
    fn test_end_saturates() {
        let r = region(u64::MAX - 1, 10);
        assert_eq!(r.end(), u64::MAX);
    }

    #[test]
    fn test_region_key_identity() {
        let a = region(4096, 10);
        let b = region(4096, 20).with_access_count(5);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_metadata_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&RegionMetadata::default()).unwrap();
        assert_eq!(json, r#"{"access_count":0}"#);
    }
}
