//! Score calibration
//!
//! Maps raw ensemble output onto probabilities so that routing thresholds
//! keep their meaning across retraining.

use serde::{Deserialize, Serialize};

use super::classifier::sigmoid;

/// Fitted calibration map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Calibration {
    /// Platt scaling: `sigmoid(a * raw + b)`
    Sigmoid { a: f64, b: f64 },
    /// Piecewise-linear interpolation through fitted isotonic points
    Isotonic { xs: Vec<f64>, ys: Vec<f64> },
}

impl Calibration {
    /// Calibrated probability, clamped to [0, 1]
    pub fn apply(&self, raw: f64) -> f64 {
        let p = match self {
            Calibration::Sigmoid { a, b } => sigmoid(a * raw + b),
            Calibration::Isotonic { xs, ys } => interpolate(xs, ys, raw),
        };
        p.clamp(0.0, 1.0)
    }

    /// Platt scaling fitted by gradient descent on log loss
    pub fn fit_sigmoid(raw: &[f64], labels: &[bool], iterations: usize, learning_rate: f64) -> Self {
        let (mut a, mut b) = (1.0, 0.0);
        let n = raw.len().max(1) as f64;
        for _ in 0..iterations {
            let (mut grad_a, mut grad_b) = (0.0, 0.0);
            for (&s, &y) in raw.iter().zip(labels) {
                let residual = sigmoid(a * s + b) - if y { 1.0 } else { 0.0 };
                grad_a += residual * s;
                grad_b += residual;
            }
            a -= learning_rate * grad_a / n;
            b -= learning_rate * grad_b / n;
        }
        // A non-increasing map would invert the ranking
        Calibration::Sigmoid { a: a.max(1e-6), b }
    }

    /// Isotonic regression by pool-adjacent-violators
    pub fn fit_isotonic(raw: &[f64], labels: &[bool]) -> Self {
        let mut pairs: Vec<(f64, f64)> = raw
            .iter()
            .zip(labels)
            .map(|(&s, &y)| (s, if y { 1.0 } else { 0.0 }))
            .collect();
        pairs.sort_by(|l, r| l.0.total_cmp(&r.0));

        // Blocks of (sum_x, sum_y, count), merged while their means decrease
        let mut blocks: Vec<(f64, f64, f64)> = Vec::with_capacity(pairs.len());
        for (x, y) in pairs {
            blocks.push((x, y, 1.0));
            while blocks.len() >= 2 {
                let last = blocks[blocks.len() - 1];
                let prev = blocks[blocks.len() - 2];
                if prev.1 / prev.2 <= last.1 / last.2 {
                    break;
                }
                blocks.pop();
                if let Some(merged) = blocks.last_mut() {
                    merged.0 += last.0;
                    merged.1 += last.1;
                    merged.2 += last.2;
                }
            }
        }

        let mut xs = Vec::with_capacity(blocks.len());
        let mut ys = Vec::with_capacity(blocks.len());
        for (sx, sy, c) in blocks {
            let x = sx / c;
            // Equal block centres can only come from ties; keep the later, larger mean
            if xs.last().map_or(false, |&last: &f64| x <= last) {
                xs.pop();
                ys.pop();
            }
            xs.push(x);
            ys.push(sy / c);
        }
        if xs.len() < 2 {
            let y = ys.first().copied().unwrap_or(0.5);
            return Calibration::Isotonic {
                xs: vec![0.0, 1.0],
                ys: vec![y, y],
            };
        }
        Calibration::Isotonic { xs, ys }
    }

    /// Checks that the map is finite and non-decreasing
    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            Calibration::Sigmoid { a, b } => {
                if !a.is_finite() || !b.is_finite() || *a <= 0.0 {
                    return Err(format!("sigmoid calibration requires finite a > 0, got a={a}, b={b}"));
                }
            }
            Calibration::Isotonic { xs, ys } => {
                if xs.len() < 2 || xs.len() != ys.len() {
                    return Err("isotonic calibration needs at least two matching points".to_string());
                }
                if xs.windows(2).any(|w| !(w[0] < w[1])) {
                    return Err("isotonic calibration xs must be strictly increasing".to_string());
                }
                if ys.windows(2).any(|w| w[0] > w[1]) || ys.iter().any(|y| !(0.0..=1.0).contains(y)) {
                    return Err("isotonic calibration ys must be non-decreasing within [0, 1]".to_string());
                }
            }
        }
        Ok(())
    }
}

fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    match (xs.first(), xs.last()) {
        (Some(&lo), Some(&hi)) => {
            if x <= lo {
                return ys[0];
            }
            if x >= hi {
                return ys[ys.len() - 1];
            }
        }
        _ => return 0.5,
    }
    let upper = xs.partition_point(|&v| v <= x);
    let (x0, x1) = (xs[upper - 1], xs[upper]);
    let (y0, y1) = (ys[upper - 1], ys[upper]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}
