//! Environmental correlation
//!
//! Compares the current barometric pressure (supplied by the caller; the engine
//! never fetches weather) with the mean pressure at past attacks, and tallies
//! the weather conditions attacks were logged under.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::AnalyzerOutcome;
use crate::attack::{AttackEvent, EnvironmentalContext};

/// Pressure risk is doubled into the analyzer sub-score, then capped
const PRESSURE_RISK_GAIN: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalFactors {
    /// Mean hPa across attacks that recorded pressure
    pub mean_attack_pressure: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_pressure: Option<f64>,
    /// Relative deviation of current from mean attack pressure, percent (0-100)
    pub pressure_risk: f64,
    /// Most frequent condition among attacks (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_risk_weather: Option<String>,
    pub weather_correlation: BTreeMap<String, u32>,
    pub attacks_with_pressure: usize,
}

impl EnvironmentalFactors {
    /// Analyzer sub-score (0-100)
    pub fn score(&self) -> f64 {
        (self.pressure_risk * PRESSURE_RISK_GAIN).min(100.0)
    }
}

/// Analyze attacks already restricted to the lookback window.
///
/// Attacks without a recorded pressure are ignored; none left is a soft shortfall.
pub fn analyze_environmental(
    attacks: &[AttackEvent],
    current: &EnvironmentalContext,
) -> AnalyzerOutcome<EnvironmentalFactors> {
    let with_pressure: Vec<(&AttackEvent, f64)> = attacks
        .iter()
        .filter_map(|a| a.environment.barometric_pressure.map(|p| (a, p)))
        .filter(|(_, p)| p.is_finite() && *p > 0.0)
        .collect();

    if with_pressure.is_empty() {
        return AnalyzerOutcome::InsufficientData;
    }

    let mean_attack_pressure =
        with_pressure.iter().map(|(_, p)| p).sum::<f64>() / with_pressure.len() as f64;

    let current_pressure = current.barometric_pressure.filter(|p| p.is_finite());
    let pressure_risk = match current_pressure {
        Some(now_p) if mean_attack_pressure > 0.0 => {
            ((now_p - mean_attack_pressure).abs() / mean_attack_pressure * 100.0).min(100.0)
        }
        _ => 0.0,
    };

    let mut weather_correlation: BTreeMap<String, u32> = BTreeMap::new();
    for (attack, _) in &with_pressure {
        if let Some(condition) = attack.environment.weather_condition.as_deref() {
            if !condition.is_empty() {
                *weather_correlation.entry(condition.to_string()).or_insert(0) += 1;
            }
        }
    }

    // BTreeMap order makes the alphabetically first condition win a tie
    let mut high_risk_weather: Option<(&String, u32)> = None;
    for (condition, &count) in &weather_correlation {
        if high_risk_weather.map_or(true, |(_, best)| count > best) {
            high_risk_weather = Some((condition, count));
        }
    }
    let high_risk_weather = high_risk_weather.map(|(c, _)| c.clone());

    AnalyzerOutcome::Ready(EnvironmentalFactors {
        mean_attack_pressure,
        current_pressure,
        pressure_risk,
        high_risk_weather,
        weather_correlation,
        attacks_with_pressure: with_pressure.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn attack(pressure: Option<f64>, weather: Option<&str>) -> AttackEvent {
        AttackEvent::new(
            "user-1",
            Utc::now(),
            6,
            Vec::new(),
            EnvironmentalContext {
                weather_condition: weather.map(str::to_string),
                barometric_pressure: pressure,
                temperature: None,
            },
        )
        .unwrap()
    }

    fn reading(pressure: Option<f64>) -> EnvironmentalContext {
        EnvironmentalContext {
            barometric_pressure: pressure,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_pressure_is_insufficient() {
        let attacks = vec![attack(None, Some("Rain"))];
        assert_eq!(
            analyze_environmental(&attacks, &reading(Some(1013.25))),
            AnalyzerOutcome::InsufficientData
        );
        assert_eq!(
            analyze_environmental(&[], &reading(Some(1013.25))),
            AnalyzerOutcome::InsufficientData
        );
    }

    #[test]
    fn test_pressure_risk() {
        let attacks = vec![attack(Some(990.0), Some("Rain")), attack(Some(1010.0), Some("Clear"))];
        let factors = analyze_environmental(&attacks, &reading(Some(1050.0)))
            .ready()
            .cloned()
            .unwrap();
        assert_eq!(factors.mean_attack_pressure, 1000.0);
        assert!((factors.pressure_risk - 5.0).abs() < 1e-9);
        assert!((factors.score() - 10.0).abs() < 1e-9);
        assert_eq!(factors.attacks_with_pressure, 2);
    }

    #[test]
    fn test_score_is_capped() {
        let attacks = vec![attack(Some(500.0), None)];
        let factors = analyze_environmental(&attacks, &reading(Some(1000.0)))
            .ready()
            .cloned()
            .unwrap();
        assert_eq!(factors.pressure_risk, 100.0);
        assert_eq!(factors.score(), 100.0);
    }

    #[test]
    fn test_pressure_risk_is_clamped() {
        // 3000 against a 1000 mean is a 200% deviation
        let attacks = vec![attack(Some(1000.0), None)];
        let factors = analyze_environmental(&attacks, &reading(Some(3000.0)))
            .ready()
            .cloned()
            .unwrap();
        assert_eq!(factors.pressure_risk, 100.0);
        assert_eq!(factors.score(), 100.0);
    }

    #[test]
    fn test_missing_current_pressure_is_zero_risk() {
        let attacks = vec![attack(Some(1000.0), Some("Storm"))];
        let factors = analyze_environmental(&attacks, &reading(None)).ready().cloned().unwrap();
        assert_eq!(factors.pressure_risk, 0.0);
        assert_eq!(factors.high_risk_weather.as_deref(), Some("Storm"));
    }

    #[test]
    fn test_weather_tally_and_tie_break() {
        let attacks = vec![
            attack(Some(1000.0), Some("Rain")),
            attack(Some(1000.0), Some("Cloudy")),
            attack(Some(1000.0), Some("Rain")),
            attack(Some(1000.0), Some("Cloudy")),
            attack(None, Some("Snow")),
        ];
        let factors = analyze_environmental(&attacks, &reading(Some(1000.0)))
            .ready()
            .cloned()
            .unwrap();
        assert_eq!(factors.weather_correlation.get("Rain"), Some(&2));
        assert!(factors.weather_correlation.get("Snow").is_none());
        assert_eq!(factors.high_risk_weather.as_deref(), Some("Cloudy"));
    }
}
