//! Additive trend + seasonality forecaster.
//!
//! `y(t) = trend(t) + weekly(t) + daily(t)`
//!
//! The trend is piecewise linear in scaled time with changepoints over the
//! early part of the history. Both seasonal components are Fourier series on
//! absolute time in days, so a fitted model extrapolates them to any
//! timestamp. Coefficients are the MAP estimate under independent Gaussian
//! priors, i.e. a ridge regression with a per-column penalty.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use demand_core::models::HourlyDemandPoint;
use demand_core::persist::write_atomic;
use demand_core::time_utils::{hourly_range, naive_datetime};
use demand_core::{DemandError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

use crate::linalg::cholesky_solve;

const SECONDS_PER_DAY: f64 = 86_400.0;
const WEEK_DAYS: f64 = 7.0;
const DAY_DAYS: f64 = 1.0;

/// Penalty on intercept and base slope; keeps the system definite without
/// shrinking them in practice.
const UNPENALISED: f64 = 1e-8;
/// Lower bound on the scaled-y variance used to derive penalties.
const MIN_NOISE_VARIANCE: f64 = 1e-6;

// ── ModelConfig ───────────────────────────────────────────────────────────────

/// Fixed hyper-parameters, shared by the evaluation and final fits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Fourier order of the 7-day component.
    pub weekly_order: usize,
    /// Fourier order of the 1-day component.
    pub daily_order: usize,
    /// Maximum number of trend changepoints.
    pub n_changepoints: usize,
    /// Leading fraction of the history eligible for changepoints.
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    /// Coverage of the `yhat_lower..yhat_upper` interval.
    pub interval_width: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weekly_order: 3,
            daily_order: 4,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            interval_width: 0.8,
        }
    }
}

impl ModelConfig {
    fn weekly_terms(&self) -> usize {
        2 * self.weekly_order
    }

    fn daily_terms(&self) -> usize {
        2 * self.daily_order
    }
}

// ── Forecast ──────────────────────────────────────────────────────────────────

/// Prediction at one timestamp. `yhat = trend + weekly + daily`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(with = "naive_datetime")]
    pub ds: NaiveDateTime,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub trend: f64,
    pub weekly: f64,
    pub daily: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forecast {
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn yhat(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.yhat).collect()
    }

    /// Write the forecast as CSV
    /// (`ds,yhat,yhat_lower,yhat_upper,trend,weekly,daily`).
    pub fn write_csv<W: Write>(&self, w: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(w);
        for p in &self.points {
            wtr.serialize(p)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

// ── ForecastModel ─────────────────────────────────────────────────────────────

/// A fitted model. Immutable once built; persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastModel {
    config: ModelConfig,
    #[serde(with = "naive_datetime")]
    history_start: NaiveDateTime,
    #[serde(with = "naive_datetime")]
    history_end: NaiveDateTime,
    history_len: usize,
    /// Divisor applied to `y` before fitting.
    y_scale: f64,
    /// Changepoint locations in scaled time.
    changepoints: Vec<f64>,
    /// Base slope.
    k: f64,
    /// Intercept.
    m: f64,
    /// Slope adjustments at each changepoint.
    deltas: Vec<f64>,
    weekly: Vec<f64>,
    daily: Vec<f64>,
    /// In-sample residual standard deviation, in units of `y`.
    sigma: f64,
    /// Normal quantile matching `config.interval_width`.
    interval_z: f64,
}

impl ForecastModel {
    /// Fit `config` to `history` (chronological hourly points).
    pub fn fit(history: &[HourlyDemandPoint], config: ModelConfig) -> Result<Self> {
        let n = history.len();
        let interval_z = interval_z(config.interval_width)?;
        if n < 2 {
            return Err(DemandError::DegenerateInput(format!(
                "need at least 2 points to fit, got {n}"
            )));
        }
        let (start, end) = (history[0].ds, history[n - 1].ds);
        if end <= start {
            return Err(DemandError::DegenerateInput(
                "history must span a positive time range".to_string(),
            ));
        }

        let y_max = history.iter().map(|p| p.y).max().unwrap_or(0) as f64;
        let y_scale = if y_max > 0.0 { y_max } else { 1.0 };
        let y: Vec<f64> = history.iter().map(|p| p.y as f64 / y_scale).collect();
        let span = (end - start).num_seconds() as f64;
        let t: Vec<f64> = history
            .iter()
            .map(|p| (p.ds - start).num_seconds() as f64 / span)
            .collect();

        let changepoints = place_changepoints(&t, &config);
        let design = Design {
            config: &config,
            changepoints: &changepoints,
        };
        let p = design.width();

        // Accumulate XᵀX and Xᵀy row by row.
        let mut xtx = vec![0.0; p * p];
        let mut xty = vec![0.0; p];
        let mut row = Vec::with_capacity(p);
        for (i, point) in history.iter().enumerate() {
            design.row(t[i], absolute_days(point.ds), &mut row);
            for a in 0..p {
                xty[a] += row[a] * y[i];
                for b in a..p {
                    xtx[a * p + b] += row[a] * row[b];
                }
            }
        }
        for a in 0..p {
            for b in 0..a {
                xtx[a * p + b] = xtx[b * p + a];
            }
        }

        // Gaussian prior N(0, τ²) on a coefficient adds σ²/τ² to its diagonal.
        let mean = y.iter().sum::<f64>() / n as f64;
        let noise = (y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64)
            .max(MIN_NOISE_VARIANCE);
        for (j, scale) in design.prior_scales().into_iter().enumerate() {
            xtx[j * p + j] += match scale {
                Some(tau) => noise / (tau * tau),
                None => UNPENALISED,
            };
        }

        let beta = cholesky_solve(&xtx, &xty, p)?;

        let mut sse = 0.0;
        for (i, point) in history.iter().enumerate() {
            design.row(t[i], absolute_days(point.ds), &mut row);
            let fitted: f64 = row.iter().zip(&beta).map(|(x, b)| x * b).sum();
            sse += (y[i] - fitted).powi(2);
        }
        let sigma = (sse / n as f64).sqrt() * y_scale;

        let n_cp = changepoints.len();
        let weekly_end = 2 + n_cp + config.weekly_terms();
        let model = Self {
            config,
            history_start: start,
            history_end: end,
            history_len: n,
            y_scale,
            m: beta[0],
            k: beta[1],
            deltas: beta[2..2 + n_cp].to_vec(),
            weekly: beta[2 + n_cp..weekly_end].to_vec(),
            daily: beta[weekly_end..].to_vec(),
            changepoints,
            sigma,
            interval_z,
        };
        debug!(
            points = n,
            changepoints = n_cp,
            sigma = model.sigma,
            "forecast model fitted"
        );
        Ok(model)
    }

    pub fn history_start(&self) -> NaiveDateTime {
        self.history_start
    }

    pub fn history_end(&self) -> NaiveDateTime {
        self.history_end
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Hourly timestamps for a forecast: `periods` hours after the last
    /// fitted one, optionally preceded by the hourly grid of the history.
    pub fn make_future_timestamps(&self, periods: usize, include_history: bool) -> Vec<NaiveDateTime> {
        let mut out = Vec::new();
        if include_history {
            out.extend(hourly_range(self.history_start, self.history_end));
        }
        out.extend((1..=periods as i64).map(|h| self.history_end + Duration::hours(h)));
        out
    }

    /// Predict every timestamp in `timestamps`.
    pub fn predict(&self, timestamps: &[NaiveDateTime]) -> Forecast {
        let span = (self.history_end - self.history_start).num_seconds() as f64;
        let band = self.interval_z * self.sigma;

        let points = timestamps
            .iter()
            .map(|&ds| {
                let t = (ds - self.history_start).num_seconds() as f64 / span;
                let days = absolute_days(ds);

                let mut trend = self.m + self.k * t;
                for (s, d) in self.changepoints.iter().zip(&self.deltas) {
                    if t > *s {
                        trend += d * (t - s);
                    }
                }
                let weekly = fourier_sum(days, WEEK_DAYS, &self.weekly);
                let daily = fourier_sum(days, DAY_DAYS, &self.daily);

                let (trend, weekly, daily) = (
                    trend * self.y_scale,
                    weekly * self.y_scale,
                    daily * self.y_scale,
                );
                let yhat = trend + weekly + daily;
                ForecastPoint {
                    ds,
                    yhat,
                    yhat_lower: yhat - band,
                    yhat_upper: yhat + band,
                    trend,
                    weekly,
                    daily,
                }
            })
            .collect();

        Forecast { points }
    }

    /// Persist the model as JSON, atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, |w| {
            serde_json::to_writer_pretty(&mut *w, self)?;
            w.write_all(b"\n")?;
            Ok(())
        })
    }

    /// Load a model saved with [`ForecastModel::save`].
    ///
    /// Fails with [`DemandError::MissingPrerequisite`] when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DemandError::missing(
                format!("model artifact {}", path.display()),
                "train",
            ));
        }
        let model: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        model.check_shape()?;
        Ok(model)
    }

    fn check_shape(&self) -> Result<()> {
        let consistent = self.deltas.len() == self.changepoints.len()
            && self.weekly.len() == self.config.weekly_terms()
            && self.daily.len() == self.config.daily_terms()
            && self.history_end > self.history_start
            && self.y_scale > 0.0
            && self.interval_z.is_finite()
            && self.interval_z > 0.0;
        if consistent {
            Ok(())
        } else {
            Err(DemandError::ModelFit(
                "model artifact is inconsistent with its configuration".to_string(),
            ))
        }
    }
}

// ── Design matrix ─────────────────────────────────────────────────────────────

/// Column layout: intercept, slope, one hinge per changepoint, weekly
/// sin/cos pairs, daily sin/cos pairs.
struct Design<'a> {
    config: &'a ModelConfig,
    changepoints: &'a [f64],
}

impl Design<'_> {
    fn width(&self) -> usize {
        2 + self.changepoints.len() + self.config.weekly_terms() + self.config.daily_terms()
    }

    fn row(&self, t: f64, days: f64, out: &mut Vec<f64>) {
        out.clear();
        out.push(1.0);
        out.push(t);
        out.extend(self.changepoints.iter().map(|s| (t - s).max(0.0)));
        fourier_terms(days, WEEK_DAYS, self.config.weekly_order, out);
        fourier_terms(days, DAY_DAYS, self.config.daily_order, out);
    }

    /// Prior scale per column; `None` for the unpenalised base trend.
    fn prior_scales(&self) -> Vec<Option<f64>> {
        let mut scales = vec![None, None];
        scales.extend(std::iter::repeat(Some(self.config.changepoint_prior_scale)).take(self.changepoints.len()));
        scales.extend(
            std::iter::repeat(Some(self.config.seasonality_prior_scale))
                .take(self.config.weekly_terms() + self.config.daily_terms()),
        );
        scales
    }
}

/// Changepoints at evenly spaced history indices within the leading
/// `changepoint_range` fraction, excluding the first point.
fn place_changepoints(t: &[f64], config: &ModelConfig) -> Vec<f64> {
    let hist = ((t.len() as f64) * config.changepoint_range).floor() as usize;
    let count = config.n_changepoints.min(hist.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }
    let last = (hist - 1) as f64;
    (1..=count)
        .map(|i| {
            let idx = (last * i as f64 / count as f64).round() as usize;
            t[idx]
        })
        .collect()
}

fn absolute_days(ds: NaiveDateTime) -> f64 {
    ds.and_utc().timestamp() as f64 / SECONDS_PER_DAY
}

fn fourier_terms(days: f64, period: f64, order: usize, out: &mut Vec<f64>) {
    for i in 1..=order {
        let x = 2.0 * PI * i as f64 * days / period;
        out.push(x.sin());
        out.push(x.cos());
    }
}

fn fourier_sum(days: f64, period: f64, coefs: &[f64]) -> f64 {
    coefs
        .chunks_exact(2)
        .enumerate()
        .map(|(i, c)| {
            let x = 2.0 * PI * (i + 1) as f64 * days / period;
            c[0] * x.sin() + c[1] * x.cos()
        })
        .sum()
}

/// Two-sided standard normal quantile for an interval of coverage `width`.
fn interval_z(width: f64) -> Result<f64> {
    if !(width > 0.0 && width < 1.0) {
        return Err(DemandError::Config(format!(
            "interval width must lie strictly between 0 and 1, got {width}"
        )));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| DemandError::ModelFit(e.to_string()))?;
    Ok(normal.inverse_cdf(0.5 + width / 2.0))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
