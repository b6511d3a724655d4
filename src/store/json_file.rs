//! File-backed record store
//!
//! All users' records live in one JSON document, loaded when the store is
//! opened and rewritten atomically after every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{RecordSet, RecordStore, StoreResult};
use crate::attack::AttackEvent;
use crate::biomarkers::{BaselineProfile, VoiceSessionRecord};
use crate::error::StoreError;
use crate::forecast::{ForecastOutcome, RiskForecast};

/// Current schema version of the records file
const SCHEMA_VERSION: u32 = 1;

/// On-disk container with schema versioning
#[derive(Debug, Serialize, Deserialize)]
struct RecordsFile {
    schema_version: u32,
    #[serde(flatten)]
    records: RecordSet,
}

/// Borrowed view of [`RecordsFile`] for writing
#[derive(Serialize)]
struct RecordsFileRef<'a> {
    schema_version: u32,
    #[serde(flatten)]
    records: &'a RecordSet,
}

/// [`RecordStore`] persisted to a single JSON file
#[derive(Debug)]
pub struct JsonFileStore {
    records: Mutex<RecordSet>,
    path: PathBuf,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty when the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let records = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: RecordsFile = serde_json::from_str(&content)?;

            if file.schema_version != SCHEMA_VERSION {
                warn!(
                    "Records schema version mismatch: {} vs {}, may need migration",
                    file.schema_version, SCHEMA_VERSION
                );
            }

            let (users, sessions, attacks, forecasts) = file.records.counts();
            info!(users, sessions, attacks, forecasts, "Loaded records from {:?}", path);
            file.records
        } else {
            debug!("No records file found at {:?}, using empty store", path);
            RecordSet::default()
        };

        Ok(Self {
            records: Mutex::new(records),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, RecordSet>> {
        self.records.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Write the whole record set: temp file, 0600 on Unix, then rename
    fn persist(&self, records: &RecordSet) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = RecordsFileRef {
            schema_version: SCHEMA_VERSION,
            records,
        };
        let content = serde_json::to_string_pretty(&file)?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)?;

        // Records hold health data
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&temp_path, &self.path)?;
        debug!("Saved records to {:?}", self.path);
        Ok(())
    }

    /// Apply a mutation to a copy, persist it, then publish it, all under the lock.
    ///
    /// A failed write leaves the in-memory records as they were on disk.
    fn mutate<T>(&self, f: impl FnOnce(&mut RecordSet) -> StoreResult<T>) -> StoreResult<T> {
        let mut records = self.lock()?;
        let mut next = records.clone();
        let value = f(&mut next)?;
        if let Err(e) = self.persist(&next) {
            warn!("Failed to save records to {:?}: {}", self.path, e);
            return Err(e);
        }
        *records = next;
        Ok(value)
    }
}

impl RecordStore for JsonFileStore {
    fn read_baseline(&self, user_id: &str) -> StoreResult<Option<BaselineProfile>> {
        Ok(self.lock()?.baseline(user_id))
    }

    fn write_baseline(&self, user_id: &str, baseline: &BaselineProfile) -> StoreResult<()> {
        self.mutate(|r| {
            r.set_baseline(user_id, baseline);
            Ok(())
        })
    }

    fn append_voice_session(&self, record: &VoiceSessionRecord) -> StoreResult<Uuid> {
        self.mutate(|r| Ok(r.push_voice_session(record)))
    }

    fn read_voice_sessions(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<VoiceSessionRecord>> {
        Ok(self.lock()?.voice_sessions(user_id, since))
    }

    fn append_attack_event(&self, event: &AttackEvent) -> StoreResult<Uuid> {
        self.mutate(|r| Ok(r.push_attack_event(event)))
    }

    fn read_attack_events(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<AttackEvent>> {
        Ok(self.lock()?.attack_events(user_id, since))
    }

    fn read_current_hrv(&self, user_id: &str) -> StoreResult<Option<u32>> {
        Ok(self.lock()?.current_hrv(user_id))
    }

    fn write_current_hrv(&self, user_id: &str, hrv_ms: u32) -> StoreResult<()> {
        self.mutate(|r| {
            r.set_current_hrv(user_id, hrv_ms);
            Ok(())
        })
    }

    fn write_forecast(&self, forecast: &RiskForecast) -> StoreResult<Uuid> {
        self.mutate(|r| Ok(r.push_forecast(forecast)))
    }

    fn read_forecast(&self, id: Uuid) -> StoreResult<RiskForecast> {
        self.lock()?.forecast(id)
    }

    fn read_forecasts(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<RiskForecast>> {
        Ok(self.lock()?.forecasts(user_id, since))
    }

    fn update_forecast_outcome(&self, id: Uuid, outcome: &ForecastOutcome) -> StoreResult<()> {
        self.mutate(|r| r.apply_forecast_outcome(id, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::EnvironmentalContext;
    use crate::biomarkers::{BiomarkerVector, StressAssessment};
    use crate::forecast::{AnalyzerOutcome, ConfidenceInputs};
    use chrono::Duration;
    use tempfile::TempDir;

    fn forecast(user: &str) -> RiskForecast {
        RiskForecast::fuse(
            user,
            Utc::now(),
            Duration::hours(24),
            AnalyzerOutcome::InsufficientData,
            AnalyzerOutcome::InsufficientData,
            AnalyzerOutcome::InsufficientData,
            ConfidenceInputs::default(),
        )
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("records.json")).unwrap();
        assert!(store.read_baseline("u").unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("records.json");
        let since = Utc::now() - Duration::hours(1);

        let f = forecast("u");
        {
            let store = JsonFileStore::open(&path).unwrap();
            let baseline = BaselineProfile::from_vector(&BiomarkerVector {
                pitch_mean: 150.0,
                ..Default::default()
            });
            store.write_baseline("u", &baseline).unwrap();
            store
                .append_voice_session(&VoiceSessionRecord::new(
                    "u",
                    Utc::now(),
                    BiomarkerVector::default(),
                    StressAssessment::default(),
                    true,
                ))
                .unwrap();
            store
                .append_attack_event(
                    &AttackEvent::new("u", Utc::now(), 6, vec!["Aura".to_string()], EnvironmentalContext::default())
                        .unwrap(),
                )
                .unwrap();
            store.write_current_hrv("u", 47).unwrap();
            store.write_forecast(&f).unwrap();
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.read_baseline("u").unwrap().unwrap().pitch_mean, Some(150.0));
        assert_eq!(store.read_voice_sessions("u", since).unwrap().len(), 1);
        assert_eq!(store.read_attack_events("u", since).unwrap().len(), 1);
        assert_eq!(store.read_current_hrv("u").unwrap(), Some(47));
        assert_eq!(store.read_forecast(f.id).unwrap(), f);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_outcome_update_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.json");
        let f = forecast("u");
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.write_forecast(&f).unwrap();
            let outcome = ForecastOutcome {
                actual_occurred: true,
                actual_severity: Some(9),
                accuracy: 0.0,
                correct: false,
            };
            store.update_forecast_outcome(f.id, &outcome).unwrap();
        }
        let reloaded = JsonFileStore::open(&path).unwrap().read_forecast(f.id).unwrap();
        assert_eq!(reloaded.actual_occurred, Some(true));
        assert_eq!(reloaded.actual_severity, Some(9));
        assert_eq!(reloaded.accuracy, Some(0.0));
    }

    #[test]
    fn test_schema_version_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.write_current_hrv("u", 60).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["schema_version"], 1);
        assert!(raw["users"]["u"].is_object());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.write_current_hrv("u", 60).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    /// A directory squatting on the temp path makes every write fail
    fn block_writes(path: &Path) -> PathBuf {
        let temp_path = path.with_extension("json.tmp");
        std::fs::create_dir(&temp_path).unwrap();
        temp_path
    }

    #[test]
    fn test_failed_write_leaves_records_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.json");
        let store = JsonFileStore::open(&path).unwrap();
        let f = forecast("u");
        store.write_forecast(&f).unwrap();

        let blocker = block_writes(&path);
        let outcome = ForecastOutcome {
            actual_occurred: false,
            actual_severity: None,
            accuracy: 100.0,
            correct: true,
        };
        assert!(matches!(
            store.update_forecast_outcome(f.id, &outcome),
            Err(StoreError::Io(_))
        ));
        assert!(store.append_attack_event(
            &AttackEvent::new("u", Utc::now(), 5, Vec::new(), EnvironmentalContext::default()).unwrap()
        )
        .is_err());
        assert!(store.write_current_hrv("u", 40).is_err());

        // Memory still matches the file
        assert!(!store.read_forecast(f.id).unwrap().is_validated());
        assert!(store.read_attack_events("u", DateTime::<Utc>::MIN_UTC).unwrap().is_empty());
        assert_eq!(store.read_current_hrv("u").unwrap(), None);

        // Once the disk recovers the same update goes through
        std::fs::remove_dir(&blocker).unwrap();
        store.update_forecast_outcome(f.id, &outcome).unwrap();
        let reloaded = JsonFileStore::open(&path).unwrap().read_forecast(f.id).unwrap();
        assert!(reloaded.is_validated());
        assert_eq!(reloaded.accuracy, Some(100.0));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Serialization(_))));
    }
}
