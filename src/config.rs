//! Examiner configuration
//!
//! Every threshold used by the pipeline lives here. Values can be loaded from
//! a TOML file; missing keys fall back to the defaults documented below.
//!
//! # Example
//! ```
//! use memlens::config::ExaminerConfig;
//!
//! let config = ExaminerConfig::from_toml_str("scan_interval_ms = 250").unwrap();
//! assert_eq!(config.scan_interval_ms, 250);
//! assert_eq!(config.anomaly.leak_access_count_threshold, 1000);
//! ```

use crate::error::{ExaminerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Finest accepted angular resolution, bounding the accumulator's theta bins
const MIN_THETA_STEP_DEG: f64 = 0.01;

/// Finest accepted rho resolution, bounding the accumulator's rho bins
const MIN_RHO_STEP: f64 = 1e-4;

/// Quad-tree capacity limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadTreeConfig {
    /// Deepest level a node may split to; occupied leaves at this level drop
    /// further inserts
    pub max_level: u32,

    /// Maximum number of regions stored per update
    pub max_items: usize,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            max_level: 12,
            max_items: 100_000,
        }
    }
}

/// Hough transform parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughConfig {
    /// Angular resolution in degrees over `[0, 180)`
    pub theta_step_deg: f64,

    /// Distance resolution over `[-√2, √2]`
    pub rho_step: f64,

    /// Fraction of the accumulator maximum a peak must exceed
    pub peak_threshold: f64,

    /// Distance within which a region belongs to a detected line
    pub line_tolerance: f64,

    /// Autocorrelation a lag must reach to count as a period
    pub min_autocorrelation: f64,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            theta_step_deg: 1.0,
            rho_step: 0.01,
            peak_threshold: 0.5,
            line_tolerance: 0.02,
            min_autocorrelation: 0.3,
        }
    }
}

/// Sequence detector parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Number of `(address, size)` pairs fed to the predictor
    pub window_size: usize,

    /// Autoregressive order of the predictor
    pub order: usize,

    /// Prediction confidence required before classifying
    pub confidence_threshold: f64,

    /// Relative std-dev of address steps tolerated for "sequential"
    pub sequential_tolerance: f64,

    /// Normalized entropy above which a sequence is "random"
    pub entropy_threshold: f64,

    /// Number of fixed-width bins for entropy
    pub entropy_bins: usize,

    /// Autocorrelation a lag must reach to count as a period
    pub min_autocorrelation: f64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            window_size: 64,
            order: 3,
            confidence_threshold: 0.8,
            sequential_tolerance: 0.1,
            entropy_threshold: 0.8,
            entropy_bins: 16,
            min_autocorrelation: 0.3,
        }
    }
}

/// Anomaly policy constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Patterns below this confidence are reported as unusual access
    pub low_confidence_threshold: f64,

    /// Regions accessed more often than this are leak suspects
    pub leak_access_count_threshold: u64,

    /// Confidence attached to memory-leak anomalies
    pub leak_confidence: f64,

    /// Drop anomalies already reported on the previous scan
    pub suppress_repeats: bool,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.3,
            leak_access_count_threshold: 1000,
            leak_confidence: 0.8,
            suppress_repeats: false,
        }
    }
}

/// Top-level examiner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExaminerConfig {
    /// Interval between scan ticks
    pub scan_interval_ms: u64,

    /// Upper bound on a single adapter snapshot
    pub adapter_timeout_ms: u64,

    pub quad_tree: QuadTreeConfig,
    pub hough: HoughConfig,
    pub sequence: SequenceConfig,
    pub anomaly: AnomalyConfig,
}

impl Default for ExaminerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 1000,
            adapter_timeout_ms: 5000,
            quad_tree: QuadTreeConfig::default(),
            hough: HoughConfig::default(),
            sequence: SequenceConfig::default(),
            anomaly: AnomalyConfig::default(),
        }
    }
}

impl ExaminerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_ms == 0 {
            return Err(invalid("scan_interval_ms must be > 0".to_string()));
        }
        if self.adapter_timeout_ms == 0 {
            return Err(invalid("adapter_timeout_ms must be > 0".to_string()));
        }
        if self.quad_tree.max_level == 0 || self.quad_tree.max_level > 32 {
            return Err(invalid(format!(
                "quad_tree.max_level must be in [1, 32], got {}",
                self.quad_tree.max_level
            )));
        }

        let hough = &self.hough;
        if !(MIN_THETA_STEP_DEG..=90.0).contains(&hough.theta_step_deg) {
            return Err(invalid(format!(
                "hough.theta_step_deg must be in [{}, 90], got {}",
                MIN_THETA_STEP_DEG, hough.theta_step_deg
            )));
        }
        if !(MIN_RHO_STEP..=1.0).contains(&hough.rho_step) {
            return Err(invalid(format!(
                "hough.rho_step must be in [{}, 1], got {}",
                MIN_RHO_STEP, hough.rho_step
            )));
        }
        check_unit("hough.peak_threshold", hough.peak_threshold)?;
        check_unit("hough.min_autocorrelation", hough.min_autocorrelation)?;
        if hough.line_tolerance <= 0.0 {
            return Err(invalid(format!(
                "hough.line_tolerance must be positive, got {}",
                hough.line_tolerance
            )));
        }

        let seq = &self.sequence;
        if seq.order == 0 || seq.window_size <= seq.order + 1 {
            return Err(invalid(format!(
                "sequence.window_size ({}) must exceed sequence.order ({}) + 1, order >= 1",
                seq.window_size, seq.order
            )));
        }
        if seq.entropy_bins < 2 {
            return Err(invalid(format!(
                "sequence.entropy_bins must be >= 2, got {}",
                seq.entropy_bins
            )));
        }
        check_unit("sequence.confidence_threshold", seq.confidence_threshold)?;
        check_unit("sequence.entropy_threshold", seq.entropy_threshold)?;
        check_unit("sequence.min_autocorrelation", seq.min_autocorrelation)?;
        if seq.sequential_tolerance < 0.0 {
            return Err(invalid(format!(
                "sequence.sequential_tolerance must be non-negative, got {}",
                seq.sequential_tolerance
            )));
        }

        check_unit(
            "anomaly.low_confidence_threshold",
            self.anomaly.low_confidence_threshold,
        )?;
        check_unit("anomaly.leak_confidence", self.anomaly.leak_confidence)?;

        Ok(())
    }
}

fn invalid(message: String) -> ExaminerError {
    ExaminerError::InvalidConfig(message)
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{} must be in [0, 1], got {}", name, value)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExaminerConfig::default();
        assert_eq!(config.scan_interval_ms, 1000);
        assert_eq!(config.hough.theta_step_deg, 1.0);
        assert_eq!(config.sequence.confidence_threshold, 0.8);
        assert_eq!(config.anomaly.low_confidence_threshold, 0.3);
        assert_eq!(config.anomaly.leak_access_count_threshold, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ExaminerConfig::from_toml_str(
            r#"
            scan_interval_ms = 500

            [hough]
            peak_threshold = 0.7

            [anomaly]
            suppress_repeats = true
            "#,
        )
        .unwrap();

        assert_eq!(config.scan_interval_ms, 500);
        assert_eq!(config.hough.peak_threshold, 0.7);
        assert_eq!(config.hough.rho_step, 0.01);
        assert!(config.anomaly.suppress_repeats);
        assert_eq!(config.quad_tree, QuadTreeConfig::default());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = ExaminerConfig::from_toml_str("scan_interval_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, ExaminerError::ConfigParse(_)));
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_interval() {
        let mut config = ExaminerConfig::default();
        config.scan_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_window_for_order() {
        let mut config = ExaminerConfig::default();
        config.sequence.window_size = 4;
        config.sequence.order = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_peak_threshold() {
        let mut config = ExaminerConfig::default();
        config.hough.peak_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ExaminerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_tiny_hough_steps_rejected() {
        for text in [
            "[hough]\ntheta_step_deg = 1e-9",
            "[hough]\nrho_step = 1e-9",
            "[hough]\ntheta_step_deg = 0.0",
        ] {
            assert!(matches!(
                ExaminerConfig::from_toml_str(text),
                Err(ExaminerError::InvalidConfig(_))
            ));
        }

        let finest = ExaminerConfig::from_toml_str("[hough]\ntheta_step_deg = 0.01\nrho_step = 1e-4");
        assert!(finest.is_ok());
    }
}
