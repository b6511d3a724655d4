//! Risk fusion and confidence
//!
//! Probability is a fixed-weight blend of the analyzer sub-scores:
//! temporal 30%, environmental 25%, physiological 45% (the most proximate
//! signal). An analyzer without data contributes 0 instead of aborting.
//!
//! Confidence is independent of the probability and reflects data volume only:
//! 5 points per logged attack (max 50), 2 per voice session (max 30), and 20
//! for an established baseline.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{
    AnalyzerOutcome, EnvironmentalFactors, PhysiologicalFactors, RiskForecast, RiskLevel,
    TemporalFactors, MODEL_VERSION,
};

const TEMPORAL_WEIGHT: f64 = 0.30;
const ENVIRONMENTAL_WEIGHT: f64 = 0.25;
const PHYSIOLOGICAL_WEIGHT: f64 = 0.45;

const POINTS_PER_ATTACK: f64 = 5.0;
const MAX_ATTACK_POINTS: f64 = 50.0;
const POINTS_PER_SESSION: f64 = 2.0;
const MAX_SESSION_POINTS: f64 = 30.0;
const BASELINE_POINTS: f64 = 20.0;

/// Data volume behind a forecast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfidenceInputs {
    pub attack_count: usize,
    pub session_count: usize,
    pub has_baseline: bool,
}

/// Weighted probability (0-100) from the three analyzer outcomes
pub fn fuse_probability(
    temporal: &AnalyzerOutcome<TemporalFactors>,
    environmental: &AnalyzerOutcome<EnvironmentalFactors>,
    physiological: &AnalyzerOutcome<PhysiologicalFactors>,
) -> f64 {
    let temporal_score = temporal.ready().map_or(0.0, TemporalFactors::score);
    let environmental_score = environmental.ready().map_or(0.0, EnvironmentalFactors::score);
    let physiological_score = physiological.ready().map_or(0.0, PhysiologicalFactors::score);

    let probability = temporal_score * TEMPORAL_WEIGHT
        + environmental_score * ENVIRONMENTAL_WEIGHT
        + physiological_score * PHYSIOLOGICAL_WEIGHT;

    if probability.is_finite() {
        probability.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Confidence (0-100) from data volume alone
pub fn forecast_confidence(inputs: ConfidenceInputs) -> f64 {
    let attack_points = (inputs.attack_count as f64 * POINTS_PER_ATTACK).min(MAX_ATTACK_POINTS);
    let session_points = (inputs.session_count as f64 * POINTS_PER_SESSION).min(MAX_SESSION_POINTS);
    let baseline_points = if inputs.has_baseline { BASELINE_POINTS } else { 0.0 };
    (attack_points + session_points + baseline_points).clamp(0.0, 100.0)
}

impl RiskForecast {
    /// Fuse analyzer outcomes into a new, unvalidated forecast.
    pub fn fuse(
        user_id: &str,
        created_at: DateTime<Utc>,
        horizon: Duration,
        temporal: AnalyzerOutcome<TemporalFactors>,
        environmental: AnalyzerOutcome<EnvironmentalFactors>,
        physiological: AnalyzerOutcome<PhysiologicalFactors>,
        confidence_inputs: ConfidenceInputs,
    ) -> Self {
        let probability = fuse_probability(&temporal, &environmental, &physiological);
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            created_at,
            predicted_for: created_at + horizon,
            risk_level: RiskLevel::from_probability(probability),
            probability,
            confidence: forecast_confidence(confidence_inputs),
            temporal_factors: temporal,
            environmental_factors: environmental,
            physiological_factors: physiological,
            model_version: MODEL_VERSION.to_string(),
            actual_occurred: None,
            actual_severity: None,
            accuracy: None,
        }
    }
}
