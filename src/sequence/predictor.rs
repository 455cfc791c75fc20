//! Autoregressive linear predictor
//!
//! Predicts `x[t]` from the previous `order` values plus a bias:
//!
//! ```text
//! x[t] ≈ w1·x[t-1] + w2·x[t-2] + ... + wp·x[t-p] + b
//! ```
//!
//! Weights are fitted by ridge-regularized least squares (normal equations
//! solved with partial-pivot Gaussian elimination). A sequential series
//! (constant step) and any fixed-period series are fitted exactly once the
//! order covers them, so their one-step prediction error is close to zero.

use crate::error::DetectorError;

/// Ridge term added to the lag weights' diagonal
const DEFAULT_RIDGE: f64 = 1e-6;

/// Pivots smaller than this make the system singular
const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct LinearPredictor {
    order: usize,
    ridge: f64,
    /// `order` lag weights followed by the bias
    weights: Vec<f64>,
}

impl LinearPredictor {
    pub fn new(order: usize) -> Self {
        Self {
            order,
            ridge: DEFAULT_RIDGE,
            weights: vec![0.0; order + 1],
        }
    }

    pub fn with_ridge(mut self, ridge: f64) -> Self {
        self.ridge = ridge;
        self
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn features(&self, series: &[f64], t: usize) -> Vec<f64> {
        let mut row: Vec<f64> = (1..=self.order).map(|lag| series[t - lag]).collect();
        row.push(1.0);
        row
    }

    /// Fit the weights to `series`
    pub fn fit(&mut self, series: &[f64]) -> Result<(), DetectorError> {
        let required = self.order + 1;
        if series.len() < required {
            return Err(DetectorError::InsufficientData {
                required,
                actual: series.len(),
            });
        }

        let dim = self.order + 1;
        let mut gram = vec![vec![0.0; dim]; dim];
        let mut rhs = vec![0.0; dim];

        for t in self.order..series.len() {
            let row = self.features(series, t);
            for i in 0..dim {
                rhs[i] += row[i] * series[t];
                for j in 0..dim {
                    gram[i][j] += row[i] * row[j];
                }
            }
        }
        for (i, gram_row) in gram.iter_mut().enumerate().take(self.order) {
            gram_row[i] += self.ridge;
        }

        let weights = solve(gram, rhs)?;
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(DetectorError::Numerical(
                "predictor weights are not finite".to_string(),
            ));
        }
        self.weights = weights;
        Ok(())
    }

    /// One-step-ahead prediction from the last `order` values of `history`
    pub fn predict_next(&self, history: &[f64]) -> f64 {
        if history.len() < self.order {
            return 0.0;
        }
        let t = history.len();
        let row = self.features(history, t);
        row.iter().zip(&self.weights).map(|(x, w)| x * w).sum()
    }

    /// Predictions for `series[order..]`, each made from its true history
    pub fn predict_series(&self, series: &[f64]) -> Vec<f64> {
        (self.order..series.len())
            .map(|t| self.predict_next(&series[..t]))
            .collect()
    }
}

/// Solve `a·x = b` by Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, DetectorError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(DetectorError::Numerical(format!(
                "singular system at column {}",
                col
            )));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}
