//! Temporal attack patterns
//!
//! Hour-of-day and weekday histograms over the lookback window, the share of
//! past attacks that fell in the current hour/weekday, and a crude
//! burstiness signal from the last seven days.
//!
//! Peak ties resolve to the lowest bucket index. Hours are UTC; weekday 0 is Monday.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::AnalyzerOutcome;
use crate::attack::AttackEvent;

const HOURS_PER_DAY: usize = 24;
const DAYS_PER_WEEK: usize = 7;

/// Days examined for the recency cluster signal
const CLUSTER_WINDOW_DAYS: i64 = 7;

const HOUR_WEIGHT: f64 = 0.4;
const WEEKDAY_WEIGHT: f64 = 0.3;
const CLUSTER_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalFactors {
    pub peak_hour: u32,
    pub peak_weekday: u32,
    /// Percent of analyzed attacks that fell in the current hour
    pub current_hour_risk: f64,
    /// Percent of analyzed attacks that fell on the current weekday
    pub current_weekday_risk: f64,
    /// Percent of the last 7 days holding at least one attack
    pub recent_cluster_risk: f64,
    pub total_attacks_analyzed: usize,
    pub hour_distribution: Vec<u32>,
    pub weekday_distribution: Vec<u32>,
}

impl TemporalFactors {
    /// Analyzer sub-score (0-100)
    pub fn score(&self) -> f64 {
        self.current_hour_risk * HOUR_WEIGHT
            + self.current_weekday_risk * WEEKDAY_WEIGHT
            + self.recent_cluster_risk * CLUSTER_WEIGHT
    }
}

/// Index of the largest bucket; the first one wins a tie
fn peak_index(buckets: &[u32]) -> usize {
    let mut best = 0;
    for (i, &count) in buckets.iter().enumerate() {
        if count > buckets[best] {
            best = i;
        }
    }
    best
}

fn percent(part: u32, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Share of the seven 24h buckets before `now` holding an attack
fn cluster_risk(attacks: &[AttackEvent], now: DateTime<Utc>) -> f64 {
    let mut days_hit = [false; CLUSTER_WINDOW_DAYS as usize];
    for attack in attacks {
        let age = now - attack.timestamp;
        if age < Duration::zero() || age >= Duration::days(CLUSTER_WINDOW_DAYS) {
            continue;
        }
        let bucket = age.num_days() as usize;
        if let Some(slot) = days_hit.get_mut(bucket) {
            *slot = true;
        }
    }
    let hit = days_hit.iter().filter(|&&d| d).count();
    hit as f64 / CLUSTER_WINDOW_DAYS as f64 * 100.0
}

/// Analyze attacks already restricted to the lookback window.
pub fn analyze_temporal(attacks: &[AttackEvent], now: DateTime<Utc>) -> AnalyzerOutcome<TemporalFactors> {
    if attacks.is_empty() {
        return AnalyzerOutcome::InsufficientData;
    }

    let mut hours = vec![0u32; HOURS_PER_DAY];
    let mut weekdays = vec![0u32; DAYS_PER_WEEK];
    for attack in attacks {
        hours[attack.timestamp.hour() as usize] += 1;
        weekdays[attack.timestamp.weekday().num_days_from_monday() as usize] += 1;
    }

    let total = attacks.len();
    let current_hour = now.hour() as usize;
    let current_weekday = now.weekday().num_days_from_monday() as usize;

    AnalyzerOutcome::Ready(TemporalFactors {
        peak_hour: peak_index(&hours) as u32,
        peak_weekday: peak_index(&weekdays) as u32,
        current_hour_risk: percent(hours[current_hour], total),
        current_weekday_risk: percent(weekdays[current_weekday], total),
        recent_cluster_risk: cluster_risk(attacks, now),
        total_attacks_analyzed: total,
        hour_distribution: hours,
        weekday_distribution: weekdays,
    })
}
