//! Vocal Biomarker Module
//!
//! Turns raw voice audio into a fixed biomarker vector and compares it against
//! the user's personal calibration baseline.
//!
//! ## Components
//!
//! - **Feature extraction** - energy, zero-crossing pitch proxy, jitter, shimmer, tempo proxy
//! - **Tremor detection** - 4-12 Hz band power of the amplitude envelope
//! - **Baseline** - field-wise mean of at least 3 relaxed-state calibration samples
//! - **Stress scoring** - capped, asymmetric elevation over baseline
//! - **Trend** - stress score slope across recent sessions
//!
//! ## Data flow
//!
//! ```text
//!   24kHz mono buffer
//!          |
//!    +-----+------------------+
//!    |                        |
//!    v                        v
//! extract_biomarkers     detect_tremor
//!    |                        |
//!    v                        |
//! score_stress <- baseline    |
//!    |                        |
//!    v                        v
//!        VoiceSessionRecord
//! ```

pub mod baseline;
pub mod features;
mod signal;
pub mod stress;
pub mod tremor;
pub mod trend;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use baseline::{establish_baseline, BaselineProfile};
pub use features::extract_biomarkers;
pub use stress::{score_stress, StressAssessment};
pub use tremor::detect_tremor;
pub use trend::{stress_trend, StressTrend, TrendDirection};

/// Sample rate every biomarker routine assumes (Hz)
pub const SAMPLE_RATE: usize = 24_000;

/// Minimum buffer duration accepted for analysis
pub const MIN_SPEECH_SECS: f64 = 2.0;

/// Deviation (percent) above which a session is flagged
pub const DEVIATION_FLAG_PCT: f64 = 30.0;

/// Stress score above which a session is flagged
pub const STRESS_FLAG_SCORE: f64 = 70.0;

/// Per-chunk vocal biomarkers. All fields are non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerVector {
    /// Zero-crossing pitch estimate (Hz), clamped to a fallback outside 80-300 Hz
    pub pitch_mean: f64,
    /// Spread of per-frame pitch estimates (Hz)
    pub pitch_variance: f64,
    /// Envelope peaks per minute (syllable-rate proxy)
    pub tempo: f64,
    /// RMS amplitude over the whole buffer
    pub energy_mean: f64,
    /// Standard deviation of per-frame pitch estimates (Hz)
    pub jitter: f64,
    /// Standard deviation of per-frame RMS energies
    pub shimmer: f64,
}

/// Coarse per-session flag derived from stress and deviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProdromalFlag {
    Low,
    High,
}

impl ProdromalFlag {
    pub fn from_scores(stress_score: f64, baseline_deviation_pct: f64) -> Self {
        if stress_score > STRESS_FLAG_SCORE || baseline_deviation_pct > DEVIATION_FLAG_PCT {
            ProdromalFlag::High
        } else {
            ProdromalFlag::Low
        }
    }
}

/// Stored result of one analyzed voice chunk. Append-only, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSessionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub biomarkers: BiomarkerVector,
    /// 0-100
    pub stress_score: f64,
    /// Unsigned mean relative deviation from baseline, percent (uncapped)
    pub baseline_deviation_pct: f64,
    pub tremor_detected: bool,
}

impl VoiceSessionRecord {
    pub fn new(
        user_id: &str,
        timestamp: DateTime<Utc>,
        biomarkers: BiomarkerVector,
        assessment: StressAssessment,
        tremor_detected: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            timestamp,
            biomarkers,
            stress_score: assessment.stress_score,
            baseline_deviation_pct: assessment.baseline_deviation_pct,
            tremor_detected,
        }
    }
}

/// Result handed back to callers after a voice chunk is analyzed and stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceAnalysis {
    pub session_id: Uuid,
    pub biomarkers: BiomarkerVector,
    pub stress_score: f64,
    pub baseline_deviation_pct: f64,
    pub tremor_detected: bool,
    pub prodromal_flag: ProdromalFlag,
}

impl From<&VoiceSessionRecord> for VoiceAnalysis {
    fn from(record: &VoiceSessionRecord) -> Self {
        Self {
            session_id: record.id,
            biomarkers: record.biomarkers,
            stress_score: record.stress_score,
            baseline_deviation_pct: record.baseline_deviation_pct,
            tremor_detected: record.tremor_detected,
            prodromal_flag: ProdromalFlag::from_scores(
                record.stress_score,
                record.baseline_deviation_pct,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_biomarker_vector_default() {
        let v = BiomarkerVector::default();
        assert_eq!(v.pitch_mean, 0.0);
        assert_eq!(v.shimmer, 0.0);
    }

    #[test]
    fn test_prodromal_flag_thresholds() {
        assert_eq!(ProdromalFlag::from_scores(70.0, 30.0), ProdromalFlag::Low);
        assert_eq!(ProdromalFlag::from_scores(70.1, 0.0), ProdromalFlag::High);
        assert_eq!(ProdromalFlag::from_scores(0.0, 30.5), ProdromalFlag::High);
    }

    #[test]
    fn test_voice_analysis_from_record() {
        let record = VoiceSessionRecord::new(
            "user-1",
            Utc::now(),
            BiomarkerVector::default(),
            StressAssessment {
                stress_score: 80.0,
                baseline_deviation_pct: 5.0,
            },
            true,
        );
        let analysis = VoiceAnalysis::from(&record);
        assert_eq!(analysis.session_id, record.id);
        assert!(analysis.tremor_detected);
        assert_eq!(analysis.prodromal_flag, ProdromalFlag::High);
    }

    #[test]
    fn test_biomarker_vector_field_names() {
        let json = serde_json::to_value(BiomarkerVector::default()).unwrap();
        assert!(json.get("pitch_mean").is_some());
        assert!(json.get("energy_mean").is_some());
    }
}
