//! Predictive Risk Module
//!
//! Fuses historical attack timing, environmental conditions and recent vocal
//! biomarkers into a bounded-horizon migraine risk forecast, and later checks
//! that forecast against what actually happened.
//!
//! ## Components
//!
//! - **Temporal** - hour/weekday distribution of past attacks, recency clustering
//! - **Environmental** - barometric pressure at past attacks vs the current reading
//! - **Physiological** - stress, tremor, deviation and HRV over the last 24h
//! - **Fusion** - weighted blend (30/25/45), data-volume confidence, risk level
//! - **Validation** - binary accuracy once the 48h window has elapsed, model performance
//!
//! ```text
//!  AttackEvents ──> temporal ──────┐
//!        │                         │
//!        └────────> environmental ─┼──> fusion ──> RiskForecast ──> validation
//!                                  │                                    ^
//!  VoiceSessions ─> physiological ─┘              AttackEvents (later) ─┘
//! ```

pub mod environmental;
pub mod fusion;
pub mod physiological;
pub mod temporal;
pub mod validation;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use environmental::{analyze_environmental, EnvironmentalFactors};
pub use fusion::{forecast_confidence, fuse_probability, ConfidenceInputs};
pub use physiological::{analyze_physiological, PhysiologicalFactors};
pub use temporal::{analyze_temporal, TemporalFactors};
pub use validation::{model_performance, validate_forecast, ForecastOutcome, ModelPerformance, ValidationOutcome};

/// Tag stored on every forecast so historical records stay comparable
pub const MODEL_VERSION: &str = "v1.0";

/// Default distance from creation to the forecast midpoint
pub const DEFAULT_HORIZON_HOURS: i64 = 24;

/// Half-width of the validation window around `predicted_for`
pub const VALIDATION_HALF_WINDOW_HOURS: i64 = 24;

/// Start of the trailing window of `length` that ends at `now`.
///
/// Saturates at the earliest representable instant instead of overflowing.
pub fn trailing_since(now: DateTime<Utc>, length: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(length).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Result of one analyzer: either its factors or a soft shortfall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyzerOutcome<T> {
    Ready(T),
    InsufficientData,
}

impl<T> AnalyzerOutcome<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            AnalyzerOutcome::Ready(t) => Some(t),
            AnalyzerOutcome::InsufficientData => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, AnalyzerOutcome::Ready(_))
    }
}

/// Discrete risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub const HIGH_THRESHOLD: f64 = 70.0;
    pub const MODERATE_THRESHOLD: f64 = 40.0;

    pub fn from_probability(probability: f64) -> Self {
        if probability >= Self::HIGH_THRESHOLD {
            RiskLevel::High
        } else if probability >= Self::MODERATE_THRESHOLD {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    /// Moderate and High both predict an attack
    pub fn predicts_attack(&self) -> bool {
        matches!(self, RiskLevel::Moderate | RiskLevel::High)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
        }
    }
}

/// A persisted forecast. Factors are frozen snapshots taken at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskForecast {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    /// Midpoint of the 48h forecast window
    pub predicted_for: DateTime<Utc>,
    pub risk_level: RiskLevel,
    /// 0-100
    pub probability: f64,
    /// 0-100
    pub confidence: f64,
    pub temporal_factors: AnalyzerOutcome<TemporalFactors>,
    pub environmental_factors: AnalyzerOutcome<EnvironmentalFactors>,
    pub physiological_factors: AnalyzerOutcome<PhysiologicalFactors>,
    pub model_version: String,
    #[serde(default)]
    pub actual_occurred: Option<bool>,
    #[serde(default)]
    pub actual_severity: Option<u8>,
    /// 0 or 100 once validated
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl RiskForecast {
    /// Start of the window checked during validation
    pub fn window_start(&self) -> DateTime<Utc> {
        self.predicted_for - Duration::hours(VALIDATION_HALF_WINDOW_HOURS)
    }

    /// End of the window; validation is allowed from this instant on
    pub fn window_end(&self) -> DateTime<Utc> {
        self.predicted_for + Duration::hours(VALIDATION_HALF_WINDOW_HOURS)
    }

    /// Still waiting for its window to elapse
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        now < self.window_end()
    }

    pub fn is_validated(&self) -> bool {
        self.accuracy.is_some()
    }

    /// Apply a validation result to the outcome fields
    pub fn apply_outcome(&mut self, outcome: &ForecastOutcome) {
        self.actual_occurred = Some(outcome.actual_occurred);
        self.actual_severity = outcome.actual_severity;
        self.accuracy = Some(outcome.accuracy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(RiskLevel::from_probability(70.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_probability(69.999), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_probability(40.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_probability(39.999), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(100.0), RiskLevel::High);
    }

    #[test]
    fn test_predicts_attack() {
        assert!(!RiskLevel::Low.predicts_attack());
        assert!(RiskLevel::Moderate.predicts_attack());
        assert!(RiskLevel::High.predicts_attack());
    }

    #[test]
    fn test_analyzer_outcome_serialization() {
        let outcome: AnalyzerOutcome<TemporalFactors> = AnalyzerOutcome::InsufficientData;
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"status":"insufficient_data"}"#);

        let back: AnalyzerOutcome<TemporalFactors> = serde_json::from_str(&json).unwrap();
        assert!(!back.is_ready());
        assert!(back.ready().is_none());
    }

    #[test]
    fn test_trailing_since_saturates() {
        let now = Utc::now();
        assert_eq!(trailing_since(now, Duration::days(2)), now - Duration::days(2));
        assert_eq!(
            trailing_since(now, Duration::days(i64::from(u32::MAX))),
            DateTime::<Utc>::MIN_UTC
        );
    }

    #[test]
    fn test_risk_level_serialization() {
        assert_eq!(serde_json::to_string(&RiskLevel::Moderate).unwrap(), "\"Moderate\"");
        assert_eq!(RiskLevel::High.as_str(), "High");
    }
}
