//! Chronological hold-out evaluation.

use demand_core::models::HourlyDemandPoint;
use demand_core::{DemandError, Result};
use tracing::debug;

use crate::metrics::EvaluationReport;
use crate::model::{ForecastModel, ModelConfig};

/// Leading share of the series used for the evaluation fit.
pub const TRAIN_FRACTION: f64 = 0.9;

/// Split `series` at `floor(len × fraction)` into a training prefix and a
/// held-out suffix. Never shuffles.
///
/// Fails with [`DegenerateInput`](DemandError::DegenerateInput) when the
/// prefix has fewer than two points or the suffix is empty.
pub fn chronological_split(
    series: &[HourlyDemandPoint],
    fraction: f64,
) -> Result<(&[HourlyDemandPoint], &[HourlyDemandPoint])> {
    let split = (series.len() as f64 * fraction).floor() as usize;
    let split = split.min(series.len());
    let (train, test) = series.split_at(split);
    if train.len() < 2 || test.is_empty() {
        return Err(DemandError::DegenerateInput(format!(
            "a {}-point series splits into {} training and {} held-out points",
            series.len(),
            train.len(),
            test.len()
        )));
    }
    Ok((train, test))
}

/// Fit `config` on the training prefix and score it on the held-out suffix.
pub fn evaluate(series: &[HourlyDemandPoint], config: ModelConfig) -> Result<EvaluationReport> {
    let (train, test) = chronological_split(series, TRAIN_FRACTION)?;
    debug!(train = train.len(), test = test.len(), "evaluation split");

    let model = ForecastModel::fit(train, config)?;
    let horizon: Vec<_> = test.iter().map(|p| p.ds).collect();
    let predicted = model.predict(&horizon).yhat();
    let actual: Vec<f64> = test.iter().map(|p| p.y as f64).collect();

    Ok(EvaluationReport::compute(&actual, &predicted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use demand_core::time_utils::parse_timestamp;

    fn series(values: &[u64]) -> Vec<HourlyDemandPoint> {
        let start = parse_timestamp("2016-03-14 00:00:00").unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &y)| HourlyDemandPoint {
                ds: start + Duration::hours(i as i64),
                y,
            })
            .collect()
    }

    #[test]
    fn test_split_at_ninety_percent() {
        let s = series(&[1; 100]);
        let (train, test) = chronological_split(&s, TRAIN_FRACTION).unwrap();
        assert_eq!(train.len(), 90);
        assert_eq!(test.len(), 10);
        assert!(train.last().unwrap().ds < test[0].ds);
    }

    #[test]
    fn test_split_floors() {
        let s = series(&[1; 25]);
        let (train, test) = chronological_split(&s, TRAIN_FRACTION).unwrap();
        assert_eq!((train.len(), test.len()), (22, 3));
    }

    #[test]
    fn test_split_degenerate() {
        // floor(2 × 0.9) = 1 training point
        assert!(matches!(
            chronological_split(&series(&[1, 2]), TRAIN_FRACTION),
            Err(DemandError::DegenerateInput(_))
        ));
        assert!(chronological_split(&series(&[]), TRAIN_FRACTION).is_err());
        assert!(chronological_split(&series(&[1, 2, 3]), 1.0).is_err());
    }

    #[test]
    fn test_evaluate_all_zero_heldout_has_zero_mape() {
        let report = evaluate(&series(&[0; 40]), ModelConfig::default()).unwrap();
        assert_eq!(report.samples, 4);
        assert_eq!(report.mape, 0.0);
        assert!(report.mae.is_finite());
    }

    #[test]
    fn test_evaluate_periodic_series_scores_well() {
        let values: Vec<u64> = (0..14 * 24).map(|h| if h % 24 < 12 { 30 } else { 10 }).collect();
        let report = evaluate(&series(&values), ModelConfig::default()).unwrap();
        assert!(report.mae < 5.0, "{report}");
        assert!(report.r2 > 0.5, "{report}");
    }
}
