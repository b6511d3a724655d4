//! Biomarker extraction from a raw voice buffer
//!
//! ## Algorithm
//! 1. Energy: RMS over the whole buffer
//! 2. Pitch: zero-crossing rate per second, halved; outside 80-300 Hz falls back to 150 Hz
//! 3. Segment into non-overlapping 30ms frames
//! 4. Jitter: std dev of per-frame pitch estimates; shimmer: std dev of per-frame RMS
//! 5. Tempo: local maxima of the 100ms-smoothed envelope, per minute
//!
//! The zero-crossing estimator is coarse, so implausible pitch is replaced
//! rather than discarded. Extraction is stateless and deterministic.

use super::signal::{count_peaks, rms, sign_changes, smoothed_envelope, std_dev};
use super::{BiomarkerVector, MIN_SPEECH_SECS};
use crate::error::{EngineError, EngineResult};

/// Frame length for jitter/shimmer (seconds)
const FRAME_SECS: f64 = 0.030;

/// Envelope smoothing window for the tempo proxy (seconds)
const TEMPO_SMOOTHING_SECS: f64 = 0.100;

/// Plausible human voice band for the pitch estimate (Hz)
const MIN_PITCH_HZ: f64 = 80.0;
const MAX_PITCH_HZ: f64 = 300.0;

/// Pitch reported when the estimate leaves the voice band
const FALLBACK_PITCH_HZ: f64 = 150.0;

/// Zero-crossing pitch estimate of a slice: crossings per second, halved
fn zcr_pitch(samples: &[f32], sample_rate: usize) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let crossings = sign_changes(samples) as f64;
    crossings / samples.len() as f64 * sample_rate as f64 / 2.0
}

/// Reject buffers the analyzers cannot use.
///
/// Too-short audio is `InsufficientData`; a zero rate or non-finite samples are `InvalidInput`.
pub(crate) fn check_buffer(samples: &[f32], sample_rate: usize) -> EngineResult<()> {
    if sample_rate == 0 {
        return Err(EngineError::InvalidInput("sample rate must be positive".into()));
    }
    let min_samples = (sample_rate as f64 * MIN_SPEECH_SECS).ceil() as usize;
    if samples.len() < min_samples {
        return Err(EngineError::InsufficientData(format!(
            "audio too short for analysis: {} samples, {} required",
            samples.len(),
            min_samples
        )));
    }
    if samples.iter().any(|s| !s.is_finite()) {
        return Err(EngineError::InvalidInput("audio buffer contains non-finite samples".into()));
    }
    Ok(())
}

/// Extract the six-field biomarker vector from a mono buffer.
///
/// Returns `InsufficientData` for buffers shorter than 2 seconds.
pub fn extract_biomarkers(samples: &[f32], sample_rate: usize) -> EngineResult<BiomarkerVector> {
    check_buffer(samples, sample_rate)?;

    let energy_mean = rms(samples);

    let raw_pitch = zcr_pitch(samples, sample_rate);
    let pitch_mean = if (MIN_PITCH_HZ..=MAX_PITCH_HZ).contains(&raw_pitch) {
        raw_pitch
    } else {
        FALLBACK_PITCH_HZ
    };

    // Trailing partial frame (and an exactly-fitting last frame) is dropped
    let frame_len = ((FRAME_SECS * sample_rate as f64) as usize).max(1);
    let mut frame_pitches = Vec::new();
    let mut frame_energies = Vec::new();
    let mut start = 0;
    while start + frame_len < samples.len() {
        let frame = &samples[start..start + frame_len];
        frame_pitches.push(zcr_pitch(frame, sample_rate));
        frame_energies.push(rms(frame));
        start += frame_len;
    }

    let jitter = std_dev(&frame_pitches);
    let shimmer = std_dev(&frame_energies);

    let window = ((TEMPO_SMOOTHING_SECS * sample_rate as f64) as usize).max(1);
    let envelope = smoothed_envelope(samples, window);
    let peaks = count_peaks(&envelope) as f64;
    let duration_secs = samples.len() as f64 / sample_rate as f64;
    let tempo = peaks / duration_secs * 60.0;

    Ok(BiomarkerVector {
        pitch_mean,
        pitch_variance: jitter,
        tempo,
        energy_mean,
        jitter,
        shimmer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biomarkers::SAMPLE_RATE;
    use crate::synthetic::{generate_sine, generate_voice_like};
    use proptest::prelude::*;

    #[test]
    fn test_short_buffer_is_insufficient() {
        let samples = generate_sine(150.0, SAMPLE_RATE, 1999);
        let err = extract_biomarkers(&samples, SAMPLE_RATE).unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_exactly_two_seconds_is_accepted() {
        let samples = generate_sine(150.0, SAMPLE_RATE, 2000);
        assert_eq!(samples.len(), 2 * SAMPLE_RATE);
        assert!(extract_biomarkers(&samples, SAMPLE_RATE).is_ok());
    }

    #[test]
    fn test_zero_sample_rate_is_invalid() {
        let err = extract_biomarkers(&[0.0; 10], 0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_nan_sample_is_invalid() {
        let mut samples = generate_sine(150.0, SAMPLE_RATE, 2500);
        samples[100] = f32::NAN;
        let err = extract_biomarkers(&samples, SAMPLE_RATE).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_sine_pitch_in_voice_band() {
        let samples = generate_sine(180.0, SAMPLE_RATE, 3000);
        let v = extract_biomarkers(&samples, SAMPLE_RATE).unwrap();
        assert!((v.pitch_mean - 180.0).abs() < 2.0, "got {}", v.pitch_mean);
        // 0.5 amplitude sine has RMS 0.5/sqrt(2)
        assert!((v.energy_mean - 0.5 / 2f64.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn test_high_frequency_falls_back() {
        let samples = generate_sine(1000.0, SAMPLE_RATE, 2500);
        let v = extract_biomarkers(&samples, SAMPLE_RATE).unwrap();
        assert_eq!(v.pitch_mean, FALLBACK_PITCH_HZ);
    }

    #[test]
    fn test_silence_falls_back_with_zero_energy() {
        let samples = vec![0.0f32; SAMPLE_RATE * 3];
        let v = extract_biomarkers(&samples, SAMPLE_RATE).unwrap();
        assert_eq!(v.pitch_mean, FALLBACK_PITCH_HZ);
        assert_eq!(v.energy_mean, 0.0);
        assert_eq!(v.jitter, 0.0);
        assert_eq!(v.shimmer, 0.0);
        assert_eq!(v.tempo, 0.0);
    }

    #[test]
    fn test_steady_tone_has_low_shimmer() {
        let samples = generate_sine(200.0, SAMPLE_RATE, 3000);
        let v = extract_biomarkers(&samples, SAMPLE_RATE).unwrap();
        assert!(v.shimmer < 0.01, "got {}", v.shimmer);
        assert_eq!(v.pitch_variance, v.jitter);
    }

    #[test]
    fn test_deterministic() {
        let samples = generate_voice_like(160.0, SAMPLE_RATE, 2500, 7);
        let a = extract_biomarkers(&samples, SAMPLE_RATE).unwrap();
        let b = extract_biomarkers(&samples, SAMPLE_RATE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_modulated_voice_has_tempo_and_shimmer() {
        let samples = generate_voice_like(160.0, SAMPLE_RATE, 4000, 11);
        let v = extract_biomarkers(&samples, SAMPLE_RATE).unwrap();
        assert!(v.tempo > 0.0);
        assert!(v.shimmer > 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_extraction_is_finite_and_non_negative(
            samples in proptest::collection::vec(-1.0f32..1.0, 48_000..50_000)
        ) {
            let v = extract_biomarkers(&samples, SAMPLE_RATE).unwrap();
            for field in [v.pitch_mean, v.pitch_variance, v.tempo, v.energy_mean, v.jitter, v.shimmer] {
                prop_assert!(field.is_finite());
                prop_assert!(field >= 0.0);
            }
            prop_assert!(v.pitch_mean >= MIN_PITCH_HZ && v.pitch_mean <= MAX_PITCH_HZ);
        }
    }
}
