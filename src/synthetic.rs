//! Seeded synthetic inputs
//!
//! Deterministic voice-like buffers and attack histories for the `demo`
//! command, benchmarks and tests. Nothing here is used on real user data.

use chrono::{DateTime, Duration, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::attack::{AttackEvent, EnvironmentalContext};
use crate::error::EngineResult;

/// Peak amplitude of generated tones
const TONE_AMPLITUDE: f64 = 0.5;

/// Loudness swell rate of voice-like buffers (Hz), below the tremor band
const SYLLABLE_RATE_HZ: f64 = 3.0;

const WEATHER_CONDITIONS: [&str; 5] = ["Clear", "Cloudy", "Rain", "Storm", "Humid"];

fn sample_count(sample_rate: usize, duration_ms: u32) -> usize {
    sample_rate * duration_ms as usize / 1000
}

/// Pure sine at `freq` Hz, amplitude 0.5
pub fn generate_sine(freq: f64, sample_rate: usize, duration_ms: u32) -> Vec<f32> {
    let n = sample_count(sample_rate, duration_ms);
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (TONE_AMPLITUDE * (2.0 * PI * freq * t).sin()) as f32
        })
        .collect()
}

/// Tone whose loudness is modulated at `tremor_hz` by `(1 + sin) / 2`
pub fn generate_tremor(f0: f64, tremor_hz: f64, sample_rate: usize, duration_ms: u32) -> Vec<f32> {
    let n = sample_count(sample_rate, duration_ms);
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let modulation = (1.0 + (2.0 * PI * tremor_hz * t).sin()) / 2.0;
            (TONE_AMPLITUDE * modulation * (2.0 * PI * f0 * t).sin()) as f32
        })
        .collect()
}

/// Voice-like buffer: fundamental plus second harmonic, a slow syllable
/// swell and a little seeded noise.
pub fn generate_voice_like(f0: f64, sample_rate: usize, duration_ms: u32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = sample_count(sample_rate, duration_ms);
    let phase: f64 = rng.gen_range(0.0..1.0);
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let swell = 0.7 + 0.3 * (2.0 * PI * (SYLLABLE_RATE_HZ * t + phase)).sin();
            let theta = 2.0 * PI * f0 * t;
            let voiced = theta.sin() + 0.3 * (2.0 * theta).sin();
            let noise: f64 = rng.gen_range(-0.0005..0.0005);
            (0.4 * swell * voiced + noise) as f32
        })
        .collect()
}

/// Attack history over the `days` before `now`.
///
/// Roughly two thirds of attacks cluster in the mid-afternoon so the temporal
/// analyzer has a pattern to find; pressure sits a little below standard.
pub fn generate_attack_history(
    user_id: &str,
    now: DateTime<Utc>,
    days: u32,
    count: usize,
    seed: u64,
) -> EngineResult<Vec<AttackEvent>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut attacks = Vec::with_capacity(count);

    for _ in 0..count {
        let days_ago = rng.gen_range(0..days.max(1)) as i64;
        let day = now - Duration::days(days_ago);
        let hour = if rng.gen_bool(0.65) {
            rng.gen_range(14..17)
        } else {
            rng.gen_range(0..24)
        };
        let minute = rng.gen_range(0..60);
        let timestamp = day
            .with_hour(hour)
            .and_then(|d| d.with_minute(minute))
            .unwrap_or(day);
        // Keep the history strictly in the past
        let timestamp = if timestamp > now {
            timestamp - Duration::days(1)
        } else {
            timestamp
        };

        let environment = EnvironmentalContext {
            weather_condition: Some(WEATHER_CONDITIONS[rng.gen_range(0..WEATHER_CONDITIONS.len())].to_string()),
            barometric_pressure: Some(1003.0 + rng.gen_range(-8.0..8.0)),
            temperature: Some(rng.gen_range(5.0..28.0)),
        };
        let severity = rng.gen_range(3..=9);
        attacks.push(AttackEvent::new(user_id, timestamp, severity, Vec::new(), environment)?);
    }

    attacks.sort_by_key(|a| a.timestamp);
    Ok(attacks)
}
