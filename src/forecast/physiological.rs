//! Prodromal indicators from recent voice sessions and HRV
//!
//! A prodrome is flagged when at least two of four conditions hold:
//! average stress > 60, tremor rate > 20%, average deviation > 25%, HRV risk > 30.

use serde::{Deserialize, Serialize};

use super::AnalyzerOutcome;
use crate::biomarkers::VoiceSessionRecord;

/// HRV (ms) below which risk starts to accrue
const HRV_REFERENCE_MS: f64 = 55.0;

const STRESS_INDICATOR: f64 = 60.0;
const TREMOR_RATE_INDICATOR: f64 = 20.0;
const DEVIATION_INDICATOR: f64 = 25.0;
const HRV_RISK_INDICATOR: f64 = 30.0;

/// Indicators needed before a prodrome is reported
const PRODROMAL_MIN_INDICATORS: usize = 2;
const PRODROMAL_TOTAL_INDICATORS: usize = 4;

const STRESS_WEIGHT: f64 = 0.4;
const TREMOR_WEIGHT: f64 = 0.3;
const DEVIATION_WEIGHT: f64 = 0.2;
const HRV_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysiologicalFactors {
    pub avg_stress_score: f64,
    /// Percent of sessions with tremor
    pub tremor_rate: f64,
    /// Mean baseline deviation, percent
    pub baseline_deviation: f64,
    pub hrv_ms: u32,
    pub hrv_risk: f64,
    pub prodromal_detected: bool,
    /// Satisfied indicators / 4, percent
    pub prodromal_confidence: f64,
    pub session_count: usize,
}

impl PhysiologicalFactors {
    /// Analyzer sub-score. Deviation is uncapped, so this can exceed 100.
    pub fn score(&self) -> f64 {
        self.avg_stress_score * STRESS_WEIGHT
            + self.tremor_rate * TREMOR_WEIGHT
            + self.baseline_deviation * DEVIATION_WEIGHT
            + self.hrv_risk * HRV_WEIGHT
    }
}

/// `(55 - hrv) / 55 * 100` below the reference, else 0
pub fn hrv_risk(hrv_ms: u32) -> f64 {
    let hrv = hrv_ms as f64;
    if hrv < HRV_REFERENCE_MS {
        ((HRV_REFERENCE_MS - hrv) / HRV_REFERENCE_MS * 100.0).max(0.0)
    } else {
        0.0
    }
}

/// Analyze sessions already restricted to the recent window.
pub fn analyze_physiological(
    sessions: &[VoiceSessionRecord],
    current_hrv_ms: u32,
) -> AnalyzerOutcome<PhysiologicalFactors> {
    if sessions.is_empty() {
        return AnalyzerOutcome::InsufficientData;
    }

    let n = sessions.len() as f64;
    let avg_stress_score = sessions.iter().map(|s| s.stress_score).sum::<f64>() / n;
    let avg_deviation = sessions.iter().map(|s| s.baseline_deviation_pct).sum::<f64>() / n;
    let tremor_count = sessions.iter().filter(|s| s.tremor_detected).count();
    let tremor_rate = tremor_count as f64 / n * 100.0;
    let hrv_risk = hrv_risk(current_hrv_ms);

    let indicators = [
        avg_stress_score > STRESS_INDICATOR,
        tremor_rate > TREMOR_RATE_INDICATOR,
        avg_deviation > DEVIATION_INDICATOR,
        hrv_risk > HRV_RISK_INDICATOR,
    ]
    .iter()
    .filter(|&&hit| hit)
    .count();

    AnalyzerOutcome::Ready(PhysiologicalFactors {
        avg_stress_score,
        tremor_rate,
        baseline_deviation: avg_deviation,
        hrv_ms: current_hrv_ms,
        hrv_risk,
        prodromal_detected: indicators >= PRODROMAL_MIN_INDICATORS,
        prodromal_confidence: indicators as f64 / PRODROMAL_TOTAL_INDICATORS as f64 * 100.0,
        session_count: sessions.len(),
    })
}
