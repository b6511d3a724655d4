//! Stress trend across recent voice sessions
//!
//! Least-squares slope of stress score against elapsed time, in points per day.

use serde::{Deserialize, Serialize};

use super::VoiceSessionRecord;

/// Slope (points/day) beyond which the trend is no longer "stable"
const TREND_SLOPE_THRESHOLD: f64 = 1.0;

/// Minimum number of sessions needed to fit a slope
const MIN_TREND_SESSIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTrend {
    pub direction: TrendDirection,
    /// Stress points per day
    pub slope_per_day: f64,
    pub current_score: f64,
    pub average_score: f64,
    pub session_count: usize,
}

/// Fit a trend to sessions ordered by timestamp.
///
/// Returns `None` with fewer than two sessions.
pub fn stress_trend(sessions: &[VoiceSessionRecord]) -> Option<StressTrend> {
    if sessions.len() < MIN_TREND_SESSIONS {
        return None;
    }

    let origin = sessions.iter().map(|s| s.timestamp).min()?;
    let points: Vec<(f64, f64)> = sessions
        .iter()
        .map(|s| {
            let days = (s.timestamp - origin).num_milliseconds() as f64 / 86_400_000.0;
            (days, s.stress_score)
        })
        .collect();

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    let sxy: f64 = points.iter().map(|p| (p.0 - mean_x) * (p.1 - mean_y)).sum();

    // All sessions at the same instant: no time axis to fit
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    let direction = if slope > TREND_SLOPE_THRESHOLD {
        TrendDirection::Increasing
    } else if slope < -TREND_SLOPE_THRESHOLD {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    let current_score = sessions
        .iter()
        .max_by_key(|s| s.timestamp)
        .map(|s| s.stress_score)
        .unwrap_or(0.0);

    Some(StressTrend {
        direction,
        slope_per_day: slope,
        current_score,
        average_score: mean_y,
        session_count: sessions.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biomarkers::{BiomarkerVector, StressAssessment};
    use chrono::{Duration, TimeZone, Utc};

    fn session(day: i64, score: f64) -> VoiceSessionRecord {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        VoiceSessionRecord::new(
            "user-1",
            t0 + Duration::days(day),
            BiomarkerVector::default(),
            StressAssessment {
                stress_score: score,
                baseline_deviation_pct: 0.0,
            },
            false,
        )
    }

    #[test]
    fn test_needs_two_sessions() {
        assert!(stress_trend(&[]).is_none());
        assert!(stress_trend(&[session(0, 40.0)]).is_none());
    }

    #[test]
    fn test_increasing() {
        let sessions = vec![session(0, 10.0), session(1, 20.0), session(2, 30.0)];
        let trend = stress_trend(&sessions).unwrap();
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!((trend.slope_per_day - 10.0).abs() < 1e-9);
        assert_eq!(trend.current_score, 30.0);
        assert!((trend.average_score - 20.0).abs() < 1e-9);
        assert_eq!(trend.session_count, 3);
    }

    #[test]
    fn test_decreasing() {
        let sessions = vec![session(0, 60.0), session(2, 40.0)];
        let trend = stress_trend(&sessions).unwrap();
        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert_eq!(trend.current_score, 40.0);
    }

    #[test]
    fn test_flat_is_stable() {
        let sessions = vec![session(0, 50.0), session(3, 50.5), session(6, 50.0)];
        let trend = stress_trend(&sessions).unwrap();
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_same_instant_is_stable() {
        let sessions = vec![session(0, 10.0), session(0, 90.0)];
        let trend = stress_trend(&sessions).unwrap();
        assert_eq!(trend.slope_per_day, 0.0);
        assert_eq!(trend.direction, TrendDirection::Stable);
    }
}
