//! Hough-transform line detection over normalized region points
//!
//! Regions allocated in a structured way (a slab allocator handing out evenly
//! spaced blocks of the same size, for instance) line up in
//! `(normalized_address, normalized_size)` space. Voting in polar
//! `(rho, theta)` space finds such lines without assuming a starting point or
//! exact spacing, and tolerates unrelated regions scattered around them.
//!
//! # Algorithm
//!
//! 1. Every point votes once per theta bucket at `rho = x·cos θ + y·sin θ`.
//! 2. A cell is a peak when it exceeds `peak_threshold × max` and is a local
//!    maximum of its 8-neighbourhood. On a plateau of equal cells only the
//!    first one in scan order is kept.
//! 3. The peak's rho is refined to the mean rho of its voters.
//! 4. Each line reports `confidence = votes / points`, the period of its
//!    members' projections and a distance-based correlation.

use crate::config::HoughConfig;
use crate::pattern::{MemoryPattern, PatternMetadata, PatternSource, PatternType};
use crate::region::MemoryRegion;
use crate::stats;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, SQRT_2};

/// Below this `|sin θ|` a line is treated as vertical
const VERTICAL_EPSILON: f64 = 1e-9;

/// Line equation in Cartesian form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LineEquation {
    /// `y = slope·x + intercept`
    Sloped { slope: f64, intercept: f64 },
    /// `x = x`
    Vertical { x: f64 },
}

/// A line found in the accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLine {
    pub rho: f64,
    /// Normal angle in radians, in `[0, π)`
    pub theta: f64,
    pub equation: LineEquation,
    /// Accumulator votes at the peak
    pub votes: usize,
    /// `votes / total points`
    pub confidence: f64,
    /// Autocorrelation period of member projections (0 if aperiodic)
    pub period: usize,
    /// How tightly members cluster to the line, in `[0, 1]`
    pub correlation: f64,
}

impl DetectedLine {
    /// Slope, or `None` for vertical lines
    pub fn slope(&self) -> Option<f64> {
        match self.equation {
            LineEquation::Sloped { slope, .. } => Some(slope),
            LineEquation::Vertical { .. } => None,
        }
    }

    pub fn intercept(&self) -> Option<f64> {
        match self.equation {
            LineEquation::Sloped { intercept, .. } => Some(intercept),
            LineEquation::Vertical { .. } => None,
        }
    }

    /// Perpendicular distance from `(x, y)` to the line
    pub fn distance(&self, x: f64, y: f64) -> f64 {
        (x * self.theta.cos() + y * self.theta.sin() - self.rho).abs()
    }

    /// Position of `(x, y)` along the line direction
    fn projection(&self, x: f64, y: f64) -> f64 {
        -x * self.theta.sin() + y * self.theta.cos()
    }
}

fn equation_from_polar(rho: f64, theta: f64) -> LineEquation {
    let sin = theta.sin();
    if sin.abs() < VERTICAL_EPSILON {
        LineEquation::Vertical { x: rho / theta.cos() }
    } else {
        LineEquation::Sloped {
            slope: -theta.cos() / sin,
            intercept: rho / sin,
        }
    }
}

/// Polar vote accumulator
#[derive(Debug, Clone)]
struct Accumulator {
    thetas: Vec<f64>,
    rho_step: f64,
    rho_bins: usize,
    cells: Vec<usize>,
}

impl Accumulator {
    fn new(theta_step_deg: f64, rho_step: f64) -> Self {
        let theta_bins = ((180.0 / theta_step_deg).round() as usize).max(1);
        let step = theta_step_deg.to_radians();
        let thetas: Vec<f64> = (0..theta_bins)
            .map(|i| i as f64 * step)
            .filter(|&t| t < PI)
            .collect();
        let rho_bins = ((2.0 * SQRT_2) / rho_step).ceil() as usize + 1;
        let cells = vec![0; thetas.len() * rho_bins];
        Self {
            thetas,
            rho_step,
            rho_bins,
            cells,
        }
    }

    fn rho_index(&self, rho: f64) -> usize {
        let index = ((rho + SQRT_2) / self.rho_step).round();
        (index.max(0.0) as usize).min(self.rho_bins - 1)
    }

    fn rho_value(&self, index: usize) -> f64 {
        index as f64 * self.rho_step - SQRT_2
    }

    fn get(&self, t: usize, r: usize) -> usize {
        self.cells[t * self.rho_bins + r]
    }

    fn vote(&mut self, x: f64, y: f64) {
        for t in 0..self.thetas.len() {
            let theta = self.thetas[t];
            let r = self.rho_index(x * theta.cos() + y * theta.sin());
            self.cells[t * self.rho_bins + r] += 1;
        }
    }

    fn max(&self) -> usize {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    /// Local maximum of the 8-neighbourhood; equal neighbours earlier in scan
    /// order win the tie
    fn is_peak(&self, t: usize, r: usize) -> bool {
        let value = self.get(t, r);
        let here = t * self.rho_bins + r;
        for dt in -1i64..=1 {
            for dr in -1i64..=1 {
                if dt == 0 && dr == 0 {
                    continue;
                }
                let nt = t as i64 + dt;
                let nr = r as i64 + dr;
                if nt < 0 || nr < 0 || nt >= self.thetas.len() as i64 || nr >= self.rho_bins as i64
                {
                    continue;
                }
                let (nt, nr) = (nt as usize, nr as usize);
                let neighbour = self.get(nt, nr);
                if neighbour > value {
                    return false;
                }
                if neighbour == value && nt * self.rho_bins + nr < here {
                    return false;
                }
            }
        }
        true
    }
}

/// Hough line detector
#[derive(Debug, Clone)]
pub struct HoughTransform {
    config: HoughConfig,
}

impl HoughTransform {
    pub fn new(config: HoughConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HoughConfig {
        &self.config
    }

    /// Detect lines through `points`, strongest first
    pub fn detect_lines(&self, points: &[(f64, f64)]) -> Vec<DetectedLine> {
        if points.len() < 2 {
            return Vec::new();
        }

        if let Some(line) = self.coincident_line(points) {
            return vec![line];
        }

        let mut acc = Accumulator::new(self.config.theta_step_deg, self.config.rho_step);
        for &(x, y) in points {
            acc.vote(x, y);
        }

        let max = acc.max();
        if max == 0 {
            return Vec::new();
        }
        let floor = self.config.peak_threshold * max as f64;

        let mut lines = Vec::new();
        for t in 0..acc.thetas.len() {
            for r in 0..acc.rho_bins {
                let votes = acc.get(t, r);
                if (votes as f64) <= floor || votes < 2 || !acc.is_peak(t, r) {
                    continue;
                }
                let theta = acc.thetas[t];
                let rho = self.refine_rho(&acc, points, theta, r);
                lines.push(self.describe(points, rho, theta, votes));
            }
        }

        lines.sort_by(|a, b| b.votes.cmp(&a.votes));
        tracing::debug!(
            points = points.len(),
            peak = max,
            lines = lines.len(),
            "Hough transform finished"
        );
        lines
    }

    /// Lines through `regions`' points turned into geometric patterns
    pub fn detect_patterns(&self, regions: &[MemoryRegion]) -> Vec<MemoryPattern> {
        let points: Vec<(f64, f64)> = regions.iter().map(MemoryRegion::point).collect();
        self.detect_lines(&points)
            .into_iter()
            .map(|line| {
                let members = find_regions_in_line(regions, &line, self.config.line_tolerance);
                MemoryPattern::new(
                    classify_line(&line),
                    line.confidence,
                    members,
                    PatternMetadata {
                        period: line.period,
                        entropy: 0.0,
                        correlation: line.correlation,
                    },
                    PatternSource::Geometric,
                )
            })
            .collect()
    }

    /// All points identical: every theta peaks, so report one horizontal line
    fn coincident_line(&self, points: &[(f64, f64)]) -> Option<DetectedLine> {
        let (x0, y0) = points[0];
        let coincident = points
            .iter()
            .all(|&(x, y)| (x - x0).abs() <= f64::EPSILON && (y - y0).abs() <= f64::EPSILON);
        if !coincident {
            return None;
        }
        let theta = PI / 2.0;
        Some(DetectedLine {
            rho: y0,
            theta,
            equation: equation_from_polar(y0, theta),
            votes: points.len(),
            confidence: 1.0,
            period: 0,
            correlation: 1.0,
        })
    }

    fn refine_rho(&self, acc: &Accumulator, points: &[(f64, f64)], theta: f64, r: usize) -> f64 {
        let (cos, sin) = (theta.cos(), theta.sin());
        let voters: Vec<f64> = points
            .iter()
            .map(|&(x, y)| x * cos + y * sin)
            .filter(|&rho| acc.rho_index(rho) == r)
            .collect();
        if voters.is_empty() {
            acc.rho_value(r)
        } else {
            voters.iter().sum::<f64>() / voters.len() as f64
        }
    }

    fn describe(&self, points: &[(f64, f64)], rho: f64, theta: f64, votes: usize) -> DetectedLine {
        let mut line = DetectedLine {
            rho,
            theta,
            equation: equation_from_polar(rho, theta),
            votes,
            confidence: (votes as f64 / points.len() as f64).min(1.0),
            period: 0,
            correlation: 0.0,
        };

        let tolerance = self.config.line_tolerance;
        let members: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .filter(|&(x, y)| line.distance(x, y) <= tolerance)
            .collect();

        let projections: Vec<f64> = members.iter().map(|&(x, y)| line.projection(x, y)).collect();
        line.period = stats::detect_period(&projections, self.config.min_autocorrelation);

        let distances: Vec<f64> = members.iter().map(|&(x, y)| line.distance(x, y)).collect();
        line.correlation = if distances.is_empty() {
            0.0
        } else {
            (1.0 - stats::mean(&distances) / tolerance).clamp(0.0, 1.0)
        };

        line
    }
}

impl Default for HoughTransform {
    fn default() -> Self {
        Self::new(HoughConfig::default())
    }
}

/// Regions whose point lies within `tolerance` of `line`
pub fn find_regions_in_line(
    regions: &[MemoryRegion],
    line: &DetectedLine,
    tolerance: f64,
) -> Vec<MemoryRegion> {
    regions
        .iter()
        .filter(|r| {
            let (x, y) = r.point();
            line.distance(x, y) <= tolerance
        })
        .cloned()
        .collect()
}

/// Periodic lines are cyclic, tight aperiodic lines are sequential
fn classify_line(line: &DetectedLine) -> PatternType {
    if line.period > 0 {
        PatternType::Cyclic
    } else if line.correlation >= 0.5 {
        PatternType::Sequential
    } else {
        PatternType::Unknown
    }
}
