//! Series statistics shared by the pattern detectors
//!
//! Means and standard deviations go through trueno's SIMD `Vector`; the
//! remaining helpers (autocorrelation, Pearson, entropy) are small loops over
//! `f64` slices.

use trueno::Vector;

/// Arithmetic mean (0.0 for an empty slice)
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let samples: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    Vector::from_slice(&samples).mean().unwrap_or(0.0) as f64
}

/// Population standard deviation (0.0 for fewer than two samples)
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let samples: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    Vector::from_slice(&samples).stddev().unwrap_or(0.0) as f64
}

/// Successive differences `x[i+1] - x[i]`
pub fn differences(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Pearson correlation coefficient over the common prefix of `a` and `b`
///
/// Returns 0.0 when either side has zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return 0.0;
    }
    (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0)
}

/// Correlation between consecutive values
pub fn lag_one_correlation(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    pearson(&values[..values.len() - 1], &values[1..])
}

/// Normalized autocorrelation at `lag` (1.0 at lag 0 for non-constant input)
pub fn autocorrelation(values: &[f64], lag: usize) -> f64 {
    let n = values.len();
    if n == 0 || lag >= n {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / n as f64;
    let denom: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    let num: f64 = (0..n - lag)
        .map(|i| (values[i] - m) * (values[i + lag] - m))
        .sum();
    num / denom
}

/// First non-trivial autocorrelation peak, or 0 when the series is aperiodic
///
/// A lag is a peak when its autocorrelation reaches `min_correlation`, rises
/// from the previous lag and is not exceeded by the next one. Lags up to half
/// the series length are examined.
pub fn detect_period(values: &[f64], min_correlation: f64) -> usize {
    let n = values.len();
    if n < 4 {
        return 0;
    }
    let max_lag = n / 2;
    let ac: Vec<f64> = (0..=max_lag + 1)
        .map(|lag| autocorrelation(values, lag))
        .collect();

    (2..=max_lag)
        .find(|&lag| {
            ac[lag] >= min_correlation && ac[lag] > ac[lag - 1] && ac[lag] >= ac[lag + 1]
        })
        .unwrap_or(0)
}

/// Shannon entropy in bits of `values` binned into `bins` fixed-width buckets
/// spanning the value range
pub fn shannon_entropy(values: &[f64], bins: usize) -> f64 {
    if values.is_empty() || bins == 0 {
        return 0.0;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return 0.0;
    }

    let mut counts = vec![0usize; bins];
    for &v in values {
        let index = (((v - min) / range) * bins as f64) as usize;
        counts[index.min(bins - 1)] += 1;
    }

    let total = values.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Entropy scaled into `[0, 1]` by the maximum `log2(bins)`
pub fn normalized_entropy(values: &[f64], bins: usize) -> f64 {
    if bins < 2 {
        return 0.0;
    }
    (shannon_entropy(values, bins) / (bins as f64).log2()).clamp(0.0, 1.0)
}
