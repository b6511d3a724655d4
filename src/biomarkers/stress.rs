//! Stress score and baseline deviation
//!
//! Four capped sub-scores are summed:
//!
//! | Component | Rule                                   | Cap |
//! |-----------|----------------------------------------|-----|
//! | Pitch     | relative increase x 100                | 30  |
//! | Jitter    | relative increase x 100                | 30  |
//! | Tempo     | absolute relative change x 50          | 20  |
//! | Shimmer   | relative increase x 100                | 20  |
//!
//! Pitch, jitter and shimmer only count upward; tempo counts either way.
//! A component whose baseline field is missing or zero contributes nothing,
//! and without an established baseline both outputs are 0.

use serde::{Deserialize, Serialize};

use super::baseline::BaselineProfile;
use super::BiomarkerVector;

const PITCH_CAP: f64 = 30.0;
const JITTER_CAP: f64 = 30.0;
const TEMPO_CAP: f64 = 20.0;
const SHIMMER_CAP: f64 = 20.0;

const TEMPO_SCALE: f64 = 50.0;

/// Stress score (0-100) and unsigned baseline deviation (percent, uncapped)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StressAssessment {
    pub stress_score: f64,
    pub baseline_deviation_pct: f64,
}

/// Usable positive reference value
fn reference(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Relative change of `current` over `base`, 0 for non-finite input
fn relative_change(current: f64, base: f64) -> f64 {
    let change = (current - base) / base;
    if change.is_finite() {
        change
    } else {
        0.0
    }
}

/// Capped contribution of an increase over baseline
fn elevation(current: f64, base: Option<f64>, scale: f64, cap: f64) -> f64 {
    match reference(base) {
        Some(b) => (relative_change(current, b) * scale).clamp(0.0, cap),
        None => 0.0,
    }
}

/// Capped stress score, 0 when no baseline pitch is on record
pub fn stress_score(vector: &BiomarkerVector, baseline: &BaselineProfile) -> f64 {
    if !baseline.is_established() {
        return 0.0;
    }

    let pitch = elevation(vector.pitch_mean, baseline.pitch_mean, 100.0, PITCH_CAP);
    let jitter = elevation(vector.jitter, baseline.jitter, 100.0, JITTER_CAP);
    let shimmer = elevation(vector.shimmer, baseline.shimmer, 100.0, SHIMMER_CAP);
    let tempo = match reference(baseline.tempo) {
        Some(b) => (relative_change(vector.tempo, b).abs() * TEMPO_SCALE).clamp(0.0, TEMPO_CAP),
        None => 0.0,
    };

    (pitch + jitter + tempo + shimmer).clamp(0.0, 100.0)
}

/// Mean unsigned relative deviation (percent) over pitch, tempo and energy.
///
/// Only fields with a positive baseline take part; 0 when none do.
pub fn baseline_deviation(vector: &BiomarkerVector, baseline: &BaselineProfile) -> f64 {
    if !baseline.is_established() {
        return 0.0;
    }

    let deviations: Vec<f64> = [
        (vector.pitch_mean, baseline.pitch_mean),
        (vector.tempo, baseline.tempo),
        (vector.energy_mean, baseline.energy_mean),
    ]
    .iter()
    .filter_map(|&(current, base)| {
        reference(base).map(|b| relative_change(current, b).abs() * 100.0)
    })
    .collect();

    if deviations.is_empty() {
        0.0
    } else {
        deviations.iter().sum::<f64>() / deviations.len() as f64
    }
}

/// Score a fresh vector against the user's baseline, if any.
pub fn score_stress(vector: &BiomarkerVector, baseline: Option<&BaselineProfile>) -> StressAssessment {
    match baseline {
        Some(b) => StressAssessment {
            stress_score: stress_score(vector, b),
            baseline_deviation_pct: baseline_deviation(vector, b),
        },
        None => StressAssessment::default(),
    }
}
