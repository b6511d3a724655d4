//! Tremor detection: 4-12 Hz amplitude modulation
//!
//! ## Concept
//! Physiological micro-tremor shows up as slow modulation of vocal loudness.
//! The amplitude envelope is smoothed to strip the pitch ripple, and the share
//! of envelope power that falls in the tremor band decides the flag.
//!
//! ## Algorithm
//! 1. Absolute-value envelope, smoothed with a 50ms moving average
//! 2. Forward FFT of the envelope (one-sided spectrum)
//! 3. Power in 4-12 Hz divided by total power
//! 4. Tremor if that fraction exceeds 0.10; silence is never tremor

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::signal::smoothed_envelope;

/// Envelope smoothing window (seconds)
const ENVELOPE_SMOOTHING_SECS: f64 = 0.050;

/// Physiological tremor band (Hz, inclusive)
const TREMOR_BAND_MIN_HZ: f64 = 4.0;
const TREMOR_BAND_MAX_HZ: f64 = 12.0;

/// Fraction of envelope power in the band above which tremor is reported
const TREMOR_POWER_THRESHOLD: f64 = 0.10;

/// Fraction of one-sided envelope power in the tremor band.
///
/// Returns 0.0 when the envelope carries no power at all.
pub fn tremor_band_fraction(samples: &[f32], sample_rate: usize) -> f64 {
    if samples.is_empty() || sample_rate == 0 {
        return 0.0;
    }

    let window = ((ENVELOPE_SMOOTHING_SECS * sample_rate as f64) as usize).max(1);
    let envelope = smoothed_envelope(samples, window);
    let n = envelope.len();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let mut spectrum: Vec<Complex<f64>> = envelope.iter().map(|&e| Complex::new(e, 0.0)).collect();
    fft.process(&mut spectrum);

    // One-sided spectrum: bins 0..=n/2, bin k sits at k * sample_rate / n Hz
    let bin_hz = sample_rate as f64 / n as f64;
    let mut band_power = 0.0f64;
    let mut total_power = 0.0f64;
    for (k, c) in spectrum.iter().take(n / 2 + 1).enumerate() {
        let power = c.norm_sqr();
        total_power += power;
        let freq = k as f64 * bin_hz;
        if (TREMOR_BAND_MIN_HZ..=TREMOR_BAND_MAX_HZ).contains(&freq) {
            band_power += power;
        }
    }

    if total_power <= 0.0 || !total_power.is_finite() {
        return 0.0;
    }
    band_power / total_power
}

/// Detect vocal micro-tremor in a raw buffer.
pub fn detect_tremor(samples: &[f32], sample_rate: usize) -> bool {
    tremor_band_fraction(samples, sample_rate) > TREMOR_POWER_THRESHOLD
}
