//! Record persistence
//!
//! The engine reads and writes everything through [`RecordStore`], a small
//! keyed-record interface the caller supplies. Two implementations ship with
//! the crate:
//!
//! - [`InMemoryStore`] - process-local, for tests and embedding
//! - [`JsonFileStore`] - one schema-versioned JSON document, rewritten atomically
//!
//! Both keep their data in a [`RecordSet`] behind a mutex.

mod json_file;
mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::attack::AttackEvent;
use crate::biomarkers::{BaselineProfile, VoiceSessionRecord};
use crate::error::StoreError;
use crate::forecast::{ForecastOutcome, RiskForecast};

pub use json_file::JsonFileStore;
pub use memory::InMemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence interface consumed by [`crate::engine::RiskEngine`].
///
/// Sequences are returned in ascending timestamp order and include records at
/// exactly `since`.
pub trait RecordStore: Send + Sync {
    fn read_baseline(&self, user_id: &str) -> StoreResult<Option<BaselineProfile>>;
    fn write_baseline(&self, user_id: &str, baseline: &BaselineProfile) -> StoreResult<()>;

    fn append_voice_session(&self, record: &VoiceSessionRecord) -> StoreResult<Uuid>;
    fn read_voice_sessions(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<VoiceSessionRecord>>;

    fn append_attack_event(&self, event: &AttackEvent) -> StoreResult<Uuid>;
    fn read_attack_events(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<AttackEvent>>;

    /// Latest heart-rate-variability reading (ms), if any was recorded
    fn read_current_hrv(&self, user_id: &str) -> StoreResult<Option<u32>>;
    fn write_current_hrv(&self, user_id: &str, hrv_ms: u32) -> StoreResult<()>;

    fn write_forecast(&self, forecast: &RiskForecast) -> StoreResult<Uuid>;
    /// `StoreError::NotFound` for an unknown id
    fn read_forecast(&self, id: Uuid) -> StoreResult<RiskForecast>;
    /// Forecasts created at or after `since`, oldest first
    fn read_forecasts(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<RiskForecast>>;
    fn update_forecast_outcome(&self, id: Uuid, outcome: &ForecastOutcome) -> StoreResult<()>;
}

/// Everything stored for one user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRecords {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineProfile>,
    #[serde(default)]
    pub voice_sessions: Vec<VoiceSessionRecord>,
    #[serde(default)]
    pub attack_events: Vec<AttackEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_hrv_ms: Option<u32>,
}

/// Shared in-memory representation behind both store implementations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    pub users: BTreeMap<String, UserRecords>,
    #[serde(default)]
    pub forecasts: Vec<RiskForecast>,
}

impl RecordSet {
    fn user_mut(&mut self, user_id: &str) -> &mut UserRecords {
        self.users.entry(user_id.to_string()).or_default()
    }

    pub fn baseline(&self, user_id: &str) -> Option<BaselineProfile> {
        self.users.get(user_id).and_then(|u| u.baseline.clone())
    }

    pub fn set_baseline(&mut self, user_id: &str, baseline: &BaselineProfile) {
        self.user_mut(user_id).baseline = Some(baseline.clone());
    }

    pub fn push_voice_session(&mut self, record: &VoiceSessionRecord) -> Uuid {
        self.user_mut(&record.user_id).voice_sessions.push(record.clone());
        record.id
    }

    pub fn voice_sessions(&self, user_id: &str, since: DateTime<Utc>) -> Vec<VoiceSessionRecord> {
        let mut sessions: Vec<VoiceSessionRecord> = self
            .users
            .get(user_id)
            .map(|u| {
                u.voice_sessions
                    .iter()
                    .filter(|s| s.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sessions.sort_by_key(|s| s.timestamp);
        sessions
    }

    pub fn push_attack_event(&mut self, event: &AttackEvent) -> Uuid {
        self.user_mut(&event.user_id).attack_events.push(event.clone());
        event.id
    }

    pub fn attack_events(&self, user_id: &str, since: DateTime<Utc>) -> Vec<AttackEvent> {
        let mut events: Vec<AttackEvent> = self
            .users
            .get(user_id)
            .map(|u| {
                u.attack_events
                    .iter()
                    .filter(|a| a.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        events.sort_by_key(|a| a.timestamp);
        events
    }

    pub fn current_hrv(&self, user_id: &str) -> Option<u32> {
        self.users.get(user_id).and_then(|u| u.current_hrv_ms)
    }

    pub fn set_current_hrv(&mut self, user_id: &str, hrv_ms: u32) {
        self.user_mut(user_id).current_hrv_ms = Some(hrv_ms);
    }

    pub fn push_forecast(&mut self, forecast: &RiskForecast) -> Uuid {
        self.forecasts.push(forecast.clone());
        forecast.id
    }

    pub fn forecast(&self, id: Uuid) -> StoreResult<RiskForecast> {
        self.forecasts
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("forecast {}", id)))
    }

    pub fn forecasts(&self, user_id: &str, since: DateTime<Utc>) -> Vec<RiskForecast> {
        let mut forecasts: Vec<RiskForecast> = self
            .forecasts
            .iter()
            .filter(|f| f.user_id == user_id && f.created_at >= since)
            .cloned()
            .collect();
        forecasts.sort_by_key(|f| f.created_at);
        forecasts
    }

    pub fn apply_forecast_outcome(&mut self, id: Uuid, outcome: &ForecastOutcome) -> StoreResult<()> {
        let forecast = self
            .forecasts
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("forecast {}", id)))?;
        forecast.apply_outcome(outcome);
        Ok(())
    }

    /// Totals for log lines: (users, voice sessions, attacks, forecasts)
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let sessions = self.users.values().map(|u| u.voice_sessions.len()).sum();
        let attacks = self.users.values().map(|u| u.attack_events.len()).sum();
        (self.users.len(), sessions, attacks, self.forecasts.len())
    }
}
