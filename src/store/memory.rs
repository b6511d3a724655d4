//! Process-local record store

use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{RecordSet, RecordStore, StoreResult};
use crate::attack::AttackEvent;
use crate::biomarkers::{BaselineProfile, VoiceSessionRecord};
use crate::error::StoreError;
use crate::forecast::{ForecastOutcome, RiskForecast};

/// [`RecordStore`] that keeps everything in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<RecordSet>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record set
    pub fn from_records(records: RecordSet) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, RecordSet>> {
        self.records.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl RecordStore for InMemoryStore {
    fn read_baseline(&self, user_id: &str) -> StoreResult<Option<BaselineProfile>> {
        Ok(self.lock()?.baseline(user_id))
    }

    fn write_baseline(&self, user_id: &str, baseline: &BaselineProfile) -> StoreResult<()> {
        self.lock()?.set_baseline(user_id, baseline);
        Ok(())
    }

    fn append_voice_session(&self, record: &VoiceSessionRecord) -> StoreResult<Uuid> {
        Ok(self.lock()?.push_voice_session(record))
    }

    fn read_voice_sessions(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<VoiceSessionRecord>> {
        Ok(self.lock()?.voice_sessions(user_id, since))
    }

    fn append_attack_event(&self, event: &AttackEvent) -> StoreResult<Uuid> {
        Ok(self.lock()?.push_attack_event(event))
    }

    fn read_attack_events(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<AttackEvent>> {
        Ok(self.lock()?.attack_events(user_id, since))
    }

    fn read_current_hrv(&self, user_id: &str) -> StoreResult<Option<u32>> {
        Ok(self.lock()?.current_hrv(user_id))
    }

    fn write_current_hrv(&self, user_id: &str, hrv_ms: u32) -> StoreResult<()> {
        self.lock()?.set_current_hrv(user_id, hrv_ms);
        Ok(())
    }

    fn write_forecast(&self, forecast: &RiskForecast) -> StoreResult<Uuid> {
        Ok(self.lock()?.push_forecast(forecast))
    }

    fn read_forecast(&self, id: Uuid) -> StoreResult<RiskForecast> {
        self.lock()?.forecast(id)
    }

    fn read_forecasts(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<RiskForecast>> {
        Ok(self.lock()?.forecasts(user_id, since))
    }

    fn update_forecast_outcome(&self, id: Uuid, outcome: &ForecastOutcome) -> StoreResult<()> {
        self.lock()?.apply_forecast_outcome(id, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::EnvironmentalContext;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_round_trip_hrv() {
        let store = InMemoryStore::new();
        assert_eq!(store.read_current_hrv("u").unwrap(), None);
        store.write_current_hrv("u", 52).unwrap();
        store.write_current_hrv("u", 58).unwrap();
        assert_eq!(store.read_current_hrv("u").unwrap(), Some(58));
    }

    #[test]
    fn test_concurrent_appends() {
        let store = Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let user = format!("user-{}", i % 2);
                    for _ in 0..25 {
                        let event = AttackEvent::new(&user, Utc::now(), 5, Vec::new(), EnvironmentalContext::default())
                            .unwrap();
                        store.append_attack_event(&event).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let since = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(store.read_attack_events("user-0", since).unwrap().len(), 100);
        assert_eq!(store.read_attack_events("user-1", since).unwrap().len(), 100);
    }
}
