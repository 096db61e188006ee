//! Forecast accuracy metrics.
//!
//! Every function compares `actual` against `predicted` element-wise and
//! returns NaN when the slices are empty or of different lengths.

use std::fmt;

/// Mean absolute error, in units of the series.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    sum / actual.len() as f64
}

/// Mean squared error.
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    sum / actual.len() as f64
}

/// Root mean squared error.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mse(actual, predicted).sqrt()
}

/// Mean absolute percentage error over the points whose actual is non-zero,
/// as a percentage. Zero when every actual is zero.
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    let (sum, count) = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .fold((0.0, 0usize), |(s, c), (a, p)| (s + ((a - p) / a).abs(), c + 1));
    if count == 0 {
        return 0.0;
    }
    sum / count as f64 * 100.0
}

/// Coefficient of determination.
///
/// For a constant `actual` the score is 1.0 on a perfect prediction and 0.0
/// otherwise.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

// ── EvaluationReport ──────────────────────────────────────────────────────────

/// Held-out scores of the evaluation fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationReport {
    pub mae: f64,
    pub rmse: f64,
    /// Percent.
    pub mape: f64,
    pub r2: f64,
    /// Number of held-out points scored.
    pub samples: usize,
}

impl EvaluationReport {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        Self {
            mae: mae(actual, predicted),
            rmse: rmse(actual, predicted),
            mape: mape(actual, predicted),
            r2: r_squared(actual, predicted),
            samples: actual.len(),
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE {:.2} rides, RMSE {:.2} rides, MAPE {:.2}%, R² {:.2} over {} hours",
            self.mae, self.rmse, self.mape, self.r2, self.samples
        )
    }
}
