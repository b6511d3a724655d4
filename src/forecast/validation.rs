//! Forecast validation and model performance
//!
//! A forecast is checked against the attacks logged in
//! `[predicted_for - 24h, predicted_for + 24h]` once that window has fully
//! elapsed. Scoring is binary: 100 when the level agreed with reality
//! (Moderate/High with an attack, Low without one), 0 otherwise. Keeping it
//! binary keeps historical performance numbers comparable.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{trailing_since, AnalyzerOutcome, RiskForecast};
use crate::attack::AttackEvent;

const CORRECT_ACCURACY: f64 = 100.0;
const INCORRECT_ACCURACY: f64 = 0.0;

/// Outcome fields written back onto a forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutcome {
    pub actual_occurred: bool,
    /// Highest severity among attacks in the window
    pub actual_severity: Option<u8>,
    /// 0 or 100
    pub accuracy: f64,
    pub correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// The window is still open
    Pending { eligible_at: DateTime<Utc> },
    Validated(ForecastOutcome),
}

impl ValidationOutcome {
    pub fn outcome(&self) -> Option<&ForecastOutcome> {
        match self {
            ValidationOutcome::Validated(outcome) => Some(outcome),
            ValidationOutcome::Pending { .. } => None,
        }
    }
}

/// Compare a forecast to the attacks around its `predicted_for`.
///
/// `attacks` may be any superset of the window; only those inside the
/// inclusive window are considered. Pure, so repeated calls on the same
/// inputs agree.
pub fn validate_forecast(
    forecast: &RiskForecast,
    attacks: &[AttackEvent],
    now: DateTime<Utc>,
) -> ValidationOutcome {
    if forecast.is_pending(now) {
        return ValidationOutcome::Pending {
            eligible_at: forecast.window_end(),
        };
    }

    let start = forecast.window_start();
    let end = forecast.window_end();
    let actual_severity = attacks
        .iter()
        .filter(|a| a.user_id == forecast.user_id)
        .filter(|a| a.timestamp >= start && a.timestamp <= end)
        .map(|a| a.severity)
        .max();
    let actual_occurred = actual_severity.is_some();

    let correct = forecast.risk_level.predicts_attack() == actual_occurred;
    ValidationOutcome::Validated(ForecastOutcome {
        actual_occurred,
        actual_severity,
        accuracy: if correct { CORRECT_ACCURACY } else { INCORRECT_ACCURACY },
        correct,
    })
}

/// Aggregate accuracy over validated forecasts in a trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub total_predictions: usize,
    /// Mean accuracy, 0-100
    pub average_accuracy: f64,
    /// Correct share of Moderate/High forecasts, percent
    pub sensitivity: f64,
    /// Correct share of Low forecasts, percent
    pub specificity: f64,
    pub days_analyzed: u32,
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Summarize validated forecasts created within the last `window_days`.
///
/// Unvalidated forecasts are ignored; none validated is a soft shortfall.
pub fn model_performance(
    forecasts: &[RiskForecast],
    now: DateTime<Utc>,
    window_days: u32,
) -> AnalyzerOutcome<ModelPerformance> {
    let since = trailing_since(now, Duration::days(i64::from(window_days)));
    let validated: Vec<(&RiskForecast, bool, f64)> = forecasts
        .iter()
        .filter(|f| f.created_at >= since)
        .filter_map(|f| match (f.actual_occurred, f.accuracy) {
            (Some(occurred), Some(accuracy)) => Some((f, occurred, accuracy)),
            _ => None,
        })
        .collect();

    if validated.is_empty() {
        return AnalyzerOutcome::InsufficientData;
    }

    let average_accuracy =
        validated.iter().map(|(_, _, acc)| acc).sum::<f64>() / validated.len() as f64;

    let (positives, negatives): (Vec<_>, Vec<_>) = validated
        .iter()
        .partition(|(f, _, _)| f.risk_level.predicts_attack());
    let true_positives = positives.iter().filter(|(_, occurred, _)| *occurred).count();
    let true_negatives = negatives.iter().filter(|(_, occurred, _)| !*occurred).count();

    AnalyzerOutcome::Ready(ModelPerformance {
        total_predictions: validated.len(),
        average_accuracy,
        sensitivity: percent(true_positives, positives.len()),
        specificity: percent(true_negatives, negatives.len()),
        days_analyzed: window_days,
    })
}
