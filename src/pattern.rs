//! Detected memory patterns and the combiner that merges detector output

use crate::region::MemoryRegion;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Shape of a recurring access pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Sequential,
    Random,
    Cyclic,
    Unknown,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Sequential => "sequential",
            PatternType::Random => "random",
            PatternType::Cyclic => "cyclic",
            PatternType::Unknown => "unknown",
        }
    }
}

/// Which detector produced a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSource {
    /// Sequence predictor over the ordered region stream
    Sequence,
    /// Hough line detector over region points
    Geometric,
}

/// Series statistics attached to a pattern
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternMetadata {
    /// Autocorrelation period (0 if none)
    pub period: usize,
    /// Normalized Shannon entropy in `[0, 1]`; only the sequence detector
    /// measures it
    pub entropy: f64,
    pub correlation: f64,
}

/// A pattern found in one scan; never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPattern {
    pub pattern_type: PatternType,
    /// In `[0, 1]`
    pub confidence: f64,
    pub regions: Vec<MemoryRegion>,
    pub metadata: PatternMetadata,
    pub source: PatternSource,
}

impl MemoryPattern {
    /// Confidence is clamped into `[0, 1]`; NaN becomes 0
    pub fn new(
        pattern_type: PatternType,
        confidence: f64,
        regions: Vec<MemoryRegion>,
        metadata: PatternMetadata,
        source: PatternSource,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            pattern_type,
            confidence,
            regions,
            metadata,
            source,
        }
    }

    /// Combiner identity: type, member count and period
    pub fn dedup_key(&self) -> (PatternType, usize, usize) {
        (self.pattern_type, self.regions.len(), self.metadata.period)
    }
}

/// Union sequence and geometric patterns, keeping the first of each
/// `(type, region count, period)` key
///
/// # Example
/// ```
/// use memlens::pattern::{combine_patterns, MemoryPattern, PatternMetadata, PatternSource, PatternType};
///
/// let a = MemoryPattern::new(PatternType::Cyclic, 0.9, vec![], PatternMetadata::default(), PatternSource::Sequence);
/// let b = MemoryPattern::new(PatternType::Cyclic, 0.4, vec![], PatternMetadata::default(), PatternSource::Geometric);
///
/// let combined = combine_patterns(vec![a], vec![b]);
/// assert_eq!(combined.len(), 1);
/// assert_eq!(combined[0].confidence, 0.9);
/// ```
pub fn combine_patterns(
    sequence: Vec<MemoryPattern>,
    geometric: Vec<MemoryPattern>,
) -> Vec<MemoryPattern> {
    let mut seen = HashSet::new();
    sequence
        .into_iter()
        .chain(geometric)
        .filter(|p| seen.insert(p.dedup_key()))
        .collect()
}
