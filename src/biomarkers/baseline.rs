//! Personal calibration baseline
//!
//! The baseline is the field-wise mean of biomarker vectors extracted from a
//! handful of relaxed-state recordings. Every field stays `None` until a
//! calibration succeeds, and downstream scoring treats a missing field as
//! "no reference" rather than as zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::features::extract_biomarkers;
use super::BiomarkerVector;
use crate::error::{EngineError, EngineResult};

/// Minimum number of valid calibration recordings
pub const MIN_CALIBRATION_SAMPLES: usize = 3;

/// Per-user reference biomarker vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineProfile {
    pub pitch_mean: Option<f64>,
    pub pitch_variance: Option<f64>,
    pub tempo: Option<f64>,
    pub energy_mean: Option<f64>,
    pub jitter: Option<f64>,
    pub shimmer: Option<f64>,
    /// Number of recordings averaged into this baseline
    #[serde(default)]
    pub sample_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub established_at: Option<DateTime<Utc>>,
}

impl BaselineProfile {
    /// Baseline holding exactly the given vector
    pub fn from_vector(vector: &BiomarkerVector) -> Self {
        Self {
            pitch_mean: Some(vector.pitch_mean),
            pitch_variance: Some(vector.pitch_variance),
            tempo: Some(vector.tempo),
            energy_mean: Some(vector.energy_mean),
            jitter: Some(vector.jitter),
            shimmer: Some(vector.shimmer),
            sample_count: 1,
            established_at: None,
        }
    }

    /// Field-wise arithmetic mean of the vectors. `None` for an empty slice.
    pub fn from_mean(vectors: &[BiomarkerVector]) -> Option<Self> {
        if vectors.is_empty() {
            return None;
        }
        let n = vectors.len() as f64;
        let mean = |f: fn(&BiomarkerVector) -> f64| vectors.iter().map(f).sum::<f64>() / n;

        Some(Self {
            pitch_mean: Some(mean(|v| v.pitch_mean)),
            pitch_variance: Some(mean(|v| v.pitch_variance)),
            tempo: Some(mean(|v| v.tempo)),
            energy_mean: Some(mean(|v| v.energy_mean)),
            jitter: Some(mean(|v| v.jitter)),
            shimmer: Some(mean(|v| v.shimmer)),
            sample_count: vectors.len(),
            established_at: None,
        })
    }

    /// A baseline counts as established once its pitch reference exists
    pub fn is_established(&self) -> bool {
        self.pitch_mean.is_some()
    }
}

/// Build a baseline from calibration recordings.
///
/// Buffers shorter than the analysis minimum are skipped. Fails with
/// `InsufficientCalibrationData` when fewer than `min_samples` remain.
pub fn establish_baseline(
    buffers: &[Vec<f32>],
    sample_rate: usize,
    min_samples: usize,
) -> EngineResult<BaselineProfile> {
    let required = min_samples.max(1);
    let mut vectors = Vec::with_capacity(buffers.len());

    for (i, buffer) in buffers.iter().enumerate() {
        match extract_biomarkers(buffer, sample_rate) {
            Ok(v) => vectors.push(v),
            Err(EngineError::InsufficientData(reason)) => {
                debug!(sample = i, reason = %reason, "Skipping calibration sample");
            }
            Err(e) => return Err(e),
        }
    }

    if vectors.len() < required {
        return Err(EngineError::InsufficientCalibrationData {
            valid: vectors.len(),
            required,
        });
    }

    BaselineProfile::from_mean(&vectors).ok_or(EngineError::InsufficientCalibrationData {
        valid: 0,
        required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biomarkers::SAMPLE_RATE;
    use crate::synthetic::{generate_sine, generate_voice_like};

    fn assert_close(a: Option<f64>, b: f64) {
        let a = a.expect("field should be set");
        assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
    }

    #[test]
    fn test_default_is_not_established() {
        let baseline = BaselineProfile::default();
        assert!(!baseline.is_established());
        assert!(baseline.tempo.is_none());
    }

    #[test]
    fn test_two_valid_samples_fail() {
        let buffers = vec![
            generate_voice_like(150.0, SAMPLE_RATE, 2500, 1),
            generate_voice_like(155.0, SAMPLE_RATE, 2500, 2),
        ];
        let err = establish_baseline(&buffers, SAMPLE_RATE, MIN_CALIBRATION_SAMPLES).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientCalibrationData { valid: 2, required: 3 }
        ));
    }

    #[test]
    fn test_short_buffers_do_not_count() {
        let buffers = vec![
            generate_voice_like(150.0, SAMPLE_RATE, 2500, 1),
            generate_voice_like(155.0, SAMPLE_RATE, 2500, 2),
            generate_sine(150.0, SAMPLE_RATE, 500),
        ];
        let err = establish_baseline(&buffers, SAMPLE_RATE, MIN_CALIBRATION_SAMPLES).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientCalibrationData { valid: 2, .. }
        ));
    }

    #[test]
    fn test_three_samples_average_fieldwise() {
        let buffers = vec![
            generate_voice_like(140.0, SAMPLE_RATE, 2500, 1),
            generate_voice_like(160.0, SAMPLE_RATE, 3000, 2),
            generate_voice_like(180.0, SAMPLE_RATE, 3500, 3),
        ];
        let vectors: Vec<BiomarkerVector> = buffers
            .iter()
            .map(|b| extract_biomarkers(b, SAMPLE_RATE).unwrap())
            .collect();

        let baseline = establish_baseline(&buffers, SAMPLE_RATE, MIN_CALIBRATION_SAMPLES).unwrap();
        assert!(baseline.is_established());
        assert_eq!(baseline.sample_count, 3);

        let mean = |f: fn(&BiomarkerVector) -> f64| vectors.iter().map(f).sum::<f64>() / 3.0;
        assert_close(baseline.pitch_mean, mean(|v| v.pitch_mean));
        assert_close(baseline.pitch_variance, mean(|v| v.pitch_variance));
        assert_close(baseline.tempo, mean(|v| v.tempo));
        assert_close(baseline.energy_mean, mean(|v| v.energy_mean));
        assert_close(baseline.jitter, mean(|v| v.jitter));
        assert_close(baseline.shimmer, mean(|v| v.shimmer));
    }

    #[test]
    fn test_invalid_buffer_aborts() {
        let mut bad = generate_sine(150.0, SAMPLE_RATE, 2500);
        bad[0] = f32::INFINITY;
        let buffers = vec![
            generate_sine(150.0, SAMPLE_RATE, 2500),
            generate_sine(150.0, SAMPLE_RATE, 2500),
            bad,
        ];
        let err = establish_baseline(&buffers, SAMPLE_RATE, MIN_CALIBRATION_SAMPLES).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_from_mean_empty() {
        assert!(BaselineProfile::from_mean(&[]).is_none());
    }

    #[test]
    fn test_from_vector() {
        let v = BiomarkerVector {
            pitch_mean: 150.0,
            jitter: 5.0,
            ..Default::default()
        };
        let baseline = BaselineProfile::from_vector(&v);
        assert_eq!(baseline.pitch_mean, Some(150.0));
        assert_eq!(baseline.jitter, Some(5.0));
        assert_eq!(baseline.sample_count, 1);
    }
}
