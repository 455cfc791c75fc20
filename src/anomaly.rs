//! Anomaly detection over the patterns of a single scan
//!
//! Two policy rules, both driven by [`AnomalyConfig`]:
//!
//! - a pattern below `low_confidence_threshold` is an *unusual access*
//!   (severity high, confidence `1 - pattern.confidence`);
//! - any pattern member accessed more than `leak_access_count_threshold`
//!   times raises one aggregated *memory leak* (severity critical).
//!
//! Rules look only at the current scan. With `suppress_repeats` enabled the
//! detector remembers the previous scan's anomaly fingerprints and drops
//! exact repeats.

use crate::config::AnomalyConfig;
use crate::pattern::MemoryPattern;
use crate::region::{MemoryRegion, RegionKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    UnusualAccess,
    MemoryLeak,
    Corruption,
    Unknown,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::UnusualAccess => "unusual_access",
            AnomalyType::MemoryLeak => "memory_leak",
            AnomalyType::Corruption => "corruption",
            AnomalyType::Unknown => "unknown",
        }
    }
}

/// Ordered so that `Critical` sorts highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Detected anomaly with the regions it concerns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub description: String,
    pub affected_regions: Vec<MemoryRegion>,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    pub confidence: f64,
}

impl Anomaly {
    fn fingerprint(&self) -> (AnomalyType, Vec<RegionKey>) {
        let mut keys: Vec<RegionKey> = self.affected_regions.iter().map(|r| r.key()).collect();
        keys.sort();
        (self.anomaly_type, keys)
    }
}

/// Per-scan anomaly rules
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
    previous: HashSet<(AnomalyType, Vec<RegionKey>)>,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        Self {
            config,
            previous: HashSet::new(),
        }
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Evaluate the rules against one scan's patterns
    pub fn detect(&mut self, patterns: &[MemoryPattern], timestamp_ms: u64) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        for pattern in patterns {
            if pattern.confidence < self.config.low_confidence_threshold {
                anomalies.push(Anomaly {
                    anomaly_type: AnomalyType::UnusualAccess,
                    severity: Severity::High,
                    description: format!(
                        "Unusual {} access pattern (confidence {:.2}) across {} regions",
                        pattern.pattern_type.as_str(),
                        pattern.confidence,
                        pattern.regions.len()
                    ),
                    affected_regions: pattern.regions.clone(),
                    timestamp_ms,
                    confidence: 1.0 - pattern.confidence,
                });
            }
        }

        if let Some(leak) = self.detect_leak(patterns, timestamp_ms) {
            anomalies.push(leak);
        }

        if self.config.suppress_repeats {
            let current: HashSet<_> = anomalies.iter().map(Anomaly::fingerprint).collect();
            let before = anomalies.len();
            anomalies.retain(|a| !self.previous.contains(&a.fingerprint()));
            if anomalies.len() < before {
                tracing::debug!(
                    suppressed = before - anomalies.len(),
                    "Suppressed anomalies repeated from the previous scan"
                );
            }
            self.previous = current;
        }

        anomalies.sort_by(|a, b| b.severity.cmp(&a.severity));
        anomalies
    }

    /// One aggregated leak covering every pattern with a hot region
    fn detect_leak(&self, patterns: &[MemoryPattern], timestamp_ms: u64) -> Option<Anomaly> {
        let threshold = self.config.leak_access_count_threshold;
        let mut seen = HashSet::new();
        let mut affected = Vec::new();
        let mut hottest = 0u64;

        for pattern in patterns {
            let pattern_hottest = pattern
                .regions
                .iter()
                .map(|r| r.metadata.access_count)
                .max()
                .unwrap_or(0);
            if pattern_hottest <= threshold {
                continue;
            }
            hottest = hottest.max(pattern_hottest);
            for region in &pattern.regions {
                if seen.insert(region.key()) {
                    affected.push(region.clone());
                }
            }
        }

        if affected.is_empty() {
            return None;
        }

        Some(Anomaly {
            anomaly_type: AnomalyType::MemoryLeak,
            severity: Severity::Critical,
            description: format!(
                "Possible memory leak: {} regions in patterns with access counts up to {} (threshold {})",
                affected.len(),
                hottest,
                threshold
            ),
            affected_regions: affected,
            timestamp_ms,
            confidence: self.config.leak_confidence,
        })
    }
}
