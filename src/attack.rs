//! Logged migraine attacks
//!
//! Attacks are created by the logging collaborator and never edited. The
//! forecast analyzers only read their timestamps, severity and environment.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

pub const MIN_SEVERITY: u8 = 1;
pub const MAX_SEVERITY: u8 = 10;

/// Width of the early and recent windows compared by [`attack_frequency`]
pub const FREQUENCY_WINDOW_DAYS: i64 = 30;

/// Environmental conditions recorded with an attack, or supplied as the
/// "current" reading when forecasting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_condition: Option<String>,
    /// hPa
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barometric_pressure: Option<f64>,
    /// Degrees Celsius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl EnvironmentalContext {
    /// Reject non-finite or non-positive pressure and non-finite temperature
    pub fn validate(&self) -> EngineResult<()> {
        if let Some(p) = self.barometric_pressure {
            if !p.is_finite() || p <= 0.0 {
                return Err(EngineError::InvalidInput(format!(
                    "barometric pressure must be positive, got {}",
                    p
                )));
            }
        }
        if let Some(t) = self.temperature {
            if !t.is_finite() {
                return Err(EngineError::InvalidInput("temperature must be finite".into()));
            }
        }
        Ok(())
    }
}

/// One logged attack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackEvent {
    pub id: Uuid,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    /// 1-10
    pub severity: u8,
    #[serde(default)]
    pub symptoms: BTreeSet<String>,
    #[serde(default)]
    pub environment: EnvironmentalContext,
}

impl AttackEvent {
    /// Build a validated attack record.
    ///
    /// Severity outside 1-10 or a malformed environment is `InvalidInput`.
    pub fn new(
        user_id: &str,
        timestamp: DateTime<Utc>,
        severity: u8,
        symptoms: impl IntoIterator<Item = String>,
        environment: EnvironmentalContext,
    ) -> EngineResult<Self> {
        if !(MIN_SEVERITY..=MAX_SEVERITY).contains(&severity) {
            return Err(EngineError::InvalidInput(format!(
                "severity must be between {} and {}, got {}",
                MIN_SEVERITY, MAX_SEVERITY, severity
            )));
        }
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("user id must not be empty".into()));
        }
        environment.validate()?;

        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            timestamp,
            severity,
            symptoms: symptoms.into_iter().collect(),
            environment,
        })
    }
}

/// Attack counts early in tracking versus the most recent window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackFrequency {
    /// First logged attack; start of the early window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_since: Option<DateTime<Utc>>,
    /// Attacks in the 30 days after `tracking_since`
    pub first_window_attacks: usize,
    /// Attacks in the 30 days before `now`
    pub recent_window_attacks: usize,
    /// Drop from the early to the recent count, percent (0-100)
    pub reduction_pct: f64,
    pub total_attacks: usize,
}

/// Compare the first 30 days of a user's attack log with the last 30.
///
/// Attacks after `now` are ignored. An increase reports 0 reduction.
pub fn attack_frequency(attacks: &[AttackEvent], now: DateTime<Utc>) -> AttackFrequency {
    let window = Duration::days(FREQUENCY_WINDOW_DAYS);
    let logged: Vec<DateTime<Utc>> = attacks
        .iter()
        .map(|a| a.timestamp)
        .filter(|ts| *ts <= now)
        .collect();

    let tracking_since = logged.iter().min().copied();
    let first_window_attacks = tracking_since.map_or(0, |start| {
        let end = start.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC);
        logged.iter().filter(|ts| **ts <= end).count()
    });
    let recent_start = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let recent_window_attacks = logged.iter().filter(|ts| **ts >= recent_start).count();

    let reduction_pct = if first_window_attacks > 0 {
        let first = first_window_attacks as f64;
        ((first - recent_window_attacks as f64) / first * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    AttackFrequency {
        tracking_since,
        first_window_attacks,
        recent_window_attacks,
        reduction_pct,
        total_attacks: logged.len(),
    }
}
