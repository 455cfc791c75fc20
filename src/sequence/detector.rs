use crate::config::SequenceConfig;
use crate::error::DetectorError;
use crate::pattern::{MemoryPattern, PatternMetadata, PatternSource, PatternType};
use crate::region::MemoryRegion;
use crate::sequence::predictor::LinearPredictor;
use crate::stats;

/// Fixed-length view of the region stream fed to the predictor
#[derive(Debug, Clone)]
pub struct SequenceWindow {
    /// Normalized addresses, zero-padded to the window length
    pub addresses: Vec<f64>,
    /// Normalized sizes, zero-padded to the window length
    pub sizes: Vec<f64>,
    /// Number of real (unpadded) entries
    pub filled: usize,
}

impl SequenceWindow {
    /// Truncate `regions` to `length` entries, or pad with zeros
    pub fn from_regions(regions: &[MemoryRegion], length: usize) -> Self {
        let filled = regions.len().min(length);
        let mut addresses = vec![0.0; length];
        let mut sizes = vec![0.0; length];
        for (i, region) in regions.iter().take(filled).enumerate() {
            addresses[i] = region.normalized_address;
            sizes[i] = region.normalized_size;
        }
        Self {
            addresses,
            sizes,
            filled,
        }
    }

    pub fn real_addresses(&self) -> &[f64] {
        &self.addresses[..self.filled]
    }
}

/// Outcome of scoring one window, before it becomes a pattern
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceScore {
    pub confidence: f64,
    pub mean_absolute_error: f64,
    pub pattern_type: PatternType,
    pub metadata: PatternMetadata,
}

/// Predictor-driven classifier over the ordered region stream
#[derive(Debug, Clone)]
pub struct SequenceDetector {
    config: SequenceConfig,
}

impl SequenceDetector {
    pub fn new(config: SequenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Score the window and classify it
    ///
    /// Confidence is `max(0, 1 - MAE)` of one-step-ahead predictions over both
    /// channels. Windows at or below the confidence threshold are `Unknown`.
    pub fn score(&self, window: &SequenceWindow) -> Result<SequenceScore, DetectorError> {
        let mae = self.prediction_error(window)?;
        let confidence = (1.0 - mae).max(0.0);

        let addresses = window.real_addresses();
        let metadata = PatternMetadata {
            period: stats::detect_period(addresses, self.config.min_autocorrelation),
            entropy: stats::normalized_entropy(addresses, self.config.entropy_bins),
            correlation: stats::lag_one_correlation(addresses),
        };

        let pattern_type = if confidence > self.config.confidence_threshold {
            self.classify(addresses, &metadata)
        } else {
            PatternType::Unknown
        };

        Ok(SequenceScore {
            confidence,
            mean_absolute_error: mae,
            pattern_type,
            metadata,
        })
    }

    /// Detect the stream's pattern; sequence patterns carry the analyzed
    /// window regions as members
    pub fn detect(&self, regions: &[MemoryRegion]) -> Result<Vec<MemoryPattern>, DetectorError> {
        if regions.len() <= self.config.order + 1 {
            return Ok(Vec::new());
        }

        let window = SequenceWindow::from_regions(regions, self.config.window_size);
        let score = self.score(&window)?;
        tracing::debug!(
            confidence = score.confidence,
            mae = score.mean_absolute_error,
            pattern = score.pattern_type.as_str(),
            "Sequence window scored"
        );

        Ok(vec![MemoryPattern::new(
            score.pattern_type,
            score.confidence,
            regions[..window.filled].to_vec(),
            score.metadata,
            PatternSource::Sequence,
        )])
    }

    fn prediction_error(&self, window: &SequenceWindow) -> Result<f64, DetectorError> {
        let mut total = 0.0;
        let mut count = 0usize;

        for channel in [&window.addresses, &window.sizes] {
            let mut predictor = LinearPredictor::new(self.config.order);
            predictor.fit(channel)?;
            let predicted = predictor.predict_series(channel);
            for (actual, guess) in channel[self.config.order..].iter().zip(&predicted) {
                total += (actual - guess).abs();
                count += 1;
            }
        }

        if count == 0 {
            return Err(DetectorError::InsufficientData {
                required: self.config.order + 1,
                actual: window.addresses.len(),
            });
        }
        let mae = total / count as f64;
        if !mae.is_finite() {
            return Err(DetectorError::Numerical(
                "prediction error is not finite".to_string(),
            ));
        }
        Ok(mae)
    }

    /// Sequential, then cyclic, then random, else unknown
    fn classify(&self, addresses: &[f64], metadata: &PatternMetadata) -> PatternType {
        if is_sequential(addresses, self.config.sequential_tolerance) {
            PatternType::Sequential
        } else if metadata.period > 0 {
            PatternType::Cyclic
        } else if metadata.entropy > self.config.entropy_threshold {
            PatternType::Random
        } else {
            PatternType::Unknown
        }
    }
}

impl Default for SequenceDetector {
    fn default() -> Self {
        Self::new(SequenceConfig::default())
    }
}

/// Successive differences are nearly constant and non-zero
pub fn is_sequential(values: &[f64], tolerance: f64) -> bool {
    let steps = stats::differences(values);
    if steps.len() < 2 {
        return false;
    }
    let mean_step = stats::mean(&steps);
    if mean_step.abs() <= f64::EPSILON {
        return false;
    }
    stats::std_dev(&steps) <= tolerance * mean_step.abs()
}
