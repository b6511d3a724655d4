//! Risk engine facade
//!
//! [`RiskEngine`] wires the biomarker extractors and forecast analyzers to a
//! caller-supplied [`RecordStore`]. Every operation is synchronous. The only
//! read-modify-write operations, calibration and forecast validation, run
//! inside a per-user exclusive section so two concurrent calls for the same
//! user cannot interleave. Different users never contend.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

use crate::activity_log;
use crate::attack::{attack_frequency, AttackEvent, AttackFrequency, EnvironmentalContext};
use crate::biomarkers::{
    self, stress_trend, BaselineProfile, BiomarkerVector, StressAssessment, StressTrend, VoiceAnalysis,
    VoiceSessionRecord,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, StoreError};
use crate::forecast::{
    analyze_environmental, analyze_physiological, analyze_temporal, model_performance, trailing_since,
    validate_forecast, AnalyzerOutcome, ConfidenceInputs, ForecastOutcome, ModelPerformance, RiskForecast, ValidationOutcome,
};
use crate::store::RecordStore;

/// One exclusive section per user id
#[derive(Debug, Default)]
struct UserLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    fn for_user(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }

    /// Forget the user's lock once no caller holds or waits on it
    fn release(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks.get(user_id).map_or(false, |l| Arc::strong_count(l) == 1) {
            locks.remove(user_id);
        }
    }

    /// Run `f` inside the user's exclusive section
    fn run<T>(&self, user_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.for_user(user_id);
        let result = {
            let _section = enter(&lock);
            f()
        };
        self.release(user_id, lock);
        result
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Hold a user's section; a panic in a previous holder does not poison the data
fn enter(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

fn require_user(user_id: &str) -> EngineResult<()> {
    if user_id.trim().is_empty() {
        return Err(EngineError::InvalidInput("user id must not be empty".into()));
    }
    Ok(())
}

/// Map a store miss to the caller-facing `NotFound`
fn not_found(err: StoreError) -> EngineError {
    match err {
        StoreError::NotFound(what) => EngineError::NotFound(what),
        other => EngineError::Store(other),
    }
}

pub struct RiskEngine<S: RecordStore> {
    store: S,
    config: EngineConfig,
    locks: UserLocks,
}

impl<S: RecordStore> RiskEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            locks: UserLocks::default(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Biomarkers
    // ------------------------------------------------------------------

    pub fn extract_biomarkers(&self, samples: &[f32]) -> EngineResult<BiomarkerVector> {
        biomarkers::extract_biomarkers(samples, self.config.sample_rate)
    }

    pub fn detect_tremor(&self, samples: &[f32]) -> bool {
        biomarkers::detect_tremor(samples, self.config.sample_rate)
    }

    pub fn score_stress(&self, vector: &BiomarkerVector, baseline: Option<&BaselineProfile>) -> StressAssessment {
        biomarkers::score_stress(vector, baseline)
    }

    /// Analyze one voice chunk and append it to the user's history.
    ///
    /// Audio that fails extraction is rejected before anything is stored.
    pub fn analyze_voice(&self, user_id: &str, samples: &[f32], now: DateTime<Utc>) -> EngineResult<VoiceAnalysis> {
        require_user(user_id)?;

        let vector = match self.extract_biomarkers(samples) {
            Ok(v) => v,
            Err(e) => {
                if e.is_insufficient_data() {
                    activity_log::log_insufficient_data(user_id, "analyze_voice", &e.to_string());
                }
                return Err(e);
            }
        };
        let tremor_detected = self.detect_tremor(samples);
        let baseline = self.store.read_baseline(user_id)?;
        let assessment = self.score_stress(&vector, baseline.as_ref());

        let record = VoiceSessionRecord::new(user_id, now, vector, assessment, tremor_detected);
        self.store.append_voice_session(&record)?;

        activity_log::log_voice_analyzed(
            user_id,
            record.id,
            record.stress_score,
            record.baseline_deviation_pct,
            record.tremor_detected,
        );
        Ok(VoiceAnalysis::from(&record))
    }

    /// Calibrate (or recalibrate) the user's baseline from relaxed recordings.
    ///
    /// Overwrites any previous baseline; callers gate this behind an explicit
    /// user action.
    pub fn establish_baseline(
        &self,
        user_id: &str,
        buffers: &[Vec<f32>],
        now: DateTime<Utc>,
    ) -> EngineResult<BaselineProfile> {
        require_user(user_id)?;
        let baseline = self.locks.run(user_id, || -> EngineResult<BaselineProfile> {
            let mut baseline = biomarkers::establish_baseline(
                buffers,
                self.config.sample_rate,
                self.config.min_calibration_samples,
            )?;
            baseline.established_at = Some(now);
            self.store.write_baseline(user_id, &baseline)?;
            Ok(baseline)
        })?;

        activity_log::log_baseline_established(
            user_id,
            baseline.sample_count,
            buffers.len().saturating_sub(baseline.sample_count),
        );
        Ok(baseline)
    }

    pub fn baseline(&self, user_id: &str) -> EngineResult<Option<BaselineProfile>> {
        Ok(self.store.read_baseline(user_id)?)
    }

    /// Stress trend over voice sessions in the last `days`
    pub fn voice_trend(&self, user_id: &str, days: u32, now: DateTime<Utc>) -> EngineResult<AnalyzerOutcome<StressTrend>> {
        let sessions = self
            .store
            .read_voice_sessions(user_id, trailing_since(now, Duration::days(i64::from(days))))?;
        match stress_trend(&sessions) {
            Some(trend) => Ok(AnalyzerOutcome::Ready(trend)),
            None => {
                activity_log::log_insufficient_data(user_id, "voice_trend", "fewer than 2 voice sessions");
                Ok(AnalyzerOutcome::InsufficientData)
            }
        }
    }

    // ------------------------------------------------------------------
    // Attacks and readings
    // ------------------------------------------------------------------

    /// Validate and store an attack
    pub fn log_attack(
        &self,
        user_id: &str,
        timestamp: DateTime<Utc>,
        severity: u8,
        symptoms: impl IntoIterator<Item = String>,
        environment: EnvironmentalContext,
    ) -> EngineResult<AttackEvent> {
        let event = AttackEvent::new(user_id, timestamp, severity, symptoms, environment)?;
        self.store.append_attack_event(&event)?;
        activity_log::log_attack_logged(user_id, event.id, event.severity, event.symptoms.len());
        Ok(event)
    }

    /// The user's most recent attacks, newest first
    pub fn recent_attacks(&self, user_id: &str, limit: usize) -> EngineResult<Vec<AttackEvent>> {
        let mut attacks = self.store.read_attack_events(user_id, DateTime::<Utc>::MIN_UTC)?;
        attacks.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        attacks.truncate(limit);
        Ok(attacks)
    }

    /// Attack counts in the first and the latest 30 days of the user's log
    pub fn attack_frequency(&self, user_id: &str, now: DateTime<Utc>) -> EngineResult<AttackFrequency> {
        let attacks = self.store.read_attack_events(user_id, DateTime::<Utc>::MIN_UTC)?;
        let frequency = attack_frequency(&attacks, now);
        debug!(
            user_id = %user_id,
            recent = frequency.recent_window_attacks,
            reduction_pct = frequency.reduction_pct,
            "Attack frequency computed"
        );
        Ok(frequency)
    }

    /// Record the user's latest HRV reading (ms)
    pub fn set_hrv(&self, user_id: &str, hrv_ms: u32) -> EngineResult<()> {
        require_user(user_id)?;
        if hrv_ms == 0 {
            return Err(EngineError::InvalidInput("HRV must be positive".into()));
        }
        self.store.write_current_hrv(user_id, hrv_ms)?;
        debug!(user_id = %user_id, hrv_ms, "HRV reading stored");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Forecasting
    // ------------------------------------------------------------------

    /// Fuse history and the caller's current environmental reading into a
    /// forecast, and persist it. A forecast is produced even with no data.
    pub fn generate_forecast(
        &self,
        user_id: &str,
        current: &EnvironmentalContext,
        now: DateTime<Utc>,
    ) -> EngineResult<RiskForecast> {
        require_user(user_id)?;
        current.validate()?;

        let lookback_start = trailing_since(now, Duration::days(i64::from(self.config.lookback_days)));
        let physiological_start =
            trailing_since(now, Duration::hours(i64::from(self.config.physiological_window_hours)));

        let attacks: Vec<AttackEvent> = self
            .store
            .read_attack_events(user_id, lookback_start)?
            .into_iter()
            .filter(|a| a.timestamp <= now)
            .collect();
        let sessions: Vec<VoiceSessionRecord> = self
            .store
            .read_voice_sessions(user_id, lookback_start)?
            .into_iter()
            .filter(|s| s.timestamp <= now)
            .collect();
        let recent_sessions: Vec<VoiceSessionRecord> = sessions
            .iter()
            .filter(|s| s.timestamp >= physiological_start)
            .cloned()
            .collect();
        let hrv_ms = self
            .store
            .read_current_hrv(user_id)?
            .unwrap_or(self.config.default_hrv_ms);
        let has_baseline = self
            .store
            .read_baseline(user_id)?
            .map_or(false, |b| b.is_established());

        let temporal = analyze_temporal(&attacks, now);
        let environmental = analyze_environmental(&attacks, current);
        let physiological = analyze_physiological(&recent_sessions, hrv_ms);

        for (name, ready) in [
            ("temporal", temporal.is_ready()),
            ("environmental", environmental.is_ready()),
            ("physiological", physiological.is_ready()),
        ] {
            if !ready {
                activity_log::log_insufficient_data(user_id, name, "analyzer contributed 0");
            }
        }
        let analyzers_ready =
            [temporal.is_ready(), environmental.is_ready(), physiological.is_ready()]
                .iter()
                .filter(|&&r| r)
                .count();

        let forecast = RiskForecast::fuse(
            user_id,
            now,
            Duration::hours(i64::from(self.config.forecast_horizon_hours)),
            temporal,
            environmental,
            physiological,
            ConfidenceInputs {
                attack_count: attacks.len(),
                session_count: sessions.len(),
                has_baseline,
            },
        );
        self.store.write_forecast(&forecast)?;

        activity_log::log_forecast_generated(
            user_id,
            forecast.id,
            forecast.risk_level,
            forecast.probability,
            forecast.confidence,
            analyzers_ready,
        );
        Ok(forecast)
    }

    pub fn forecast(&self, forecast_id: Uuid) -> EngineResult<RiskForecast> {
        self.store.read_forecast(forecast_id).map_err(not_found)
    }

    /// Reconcile a forecast with the attacks logged around it.
    ///
    /// Returns `Pending` while the window is open. A forecast is written at
    /// most once; validating it again returns the stored outcome.
    pub fn validate_forecast(&self, forecast_id: Uuid, now: DateTime<Utc>) -> EngineResult<ValidationOutcome> {
        let user_id = self.forecast(forecast_id)?.user_id;
        self.locks
            .run(&user_id, || self.validate_in_section(forecast_id, &user_id, now))
    }

    fn validate_in_section(
        &self,
        forecast_id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<ValidationOutcome> {
        // Re-read inside the section: a concurrent call may have just validated it
        let forecast = self.forecast(forecast_id)?;
        if let (Some(actual_occurred), Some(accuracy)) = (forecast.actual_occurred, forecast.accuracy) {
            let outcome = ForecastOutcome {
                actual_occurred,
                actual_severity: forecast.actual_severity,
                accuracy,
                correct: forecast.risk_level.predicts_attack() == actual_occurred,
            };
            activity_log::log_forecast_validated(forecast_id, actual_occurred, accuracy, true);
            return Ok(ValidationOutcome::Validated(outcome));
        }

        let attacks = self.store.read_attack_events(user_id, forecast.window_start())?;
        let result = validate_forecast(&forecast, &attacks, now);
        match result {
            ValidationOutcome::Pending { eligible_at } => {
                debug!(forecast_id = %forecast_id, eligible_at = %eligible_at, "Forecast window still open");
            }
            ValidationOutcome::Validated(ref outcome) => {
                self.store
                    .update_forecast_outcome(forecast_id, outcome)
                    .map_err(not_found)?;
                activity_log::log_forecast_validated(forecast_id, outcome.actual_occurred, outcome.accuracy, false);
            }
        }
        Ok(result)
    }

    /// Validate every eligible, unvalidated forecast of a user. Returns how many were written.
    pub fn validate_due_forecasts(&self, user_id: &str, now: DateTime<Utc>) -> EngineResult<usize> {
        let forecasts = self.store.read_forecasts(user_id, DateTime::<Utc>::MIN_UTC)?;
        let mut validated = 0;
        for forecast in forecasts.iter().filter(|f| !f.is_validated() && !f.is_pending(now)) {
            if let ValidationOutcome::Validated(_) = self.validate_forecast(forecast.id, now)? {
                validated += 1;
            }
        }
        if validated > 0 {
            info!(user_id = %user_id, validated, "Validated due forecasts");
        }
        Ok(validated)
    }

    /// Accuracy, sensitivity and specificity over the trailing `window_days`
    pub fn get_model_performance(
        &self,
        user_id: &str,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> EngineResult<AnalyzerOutcome<ModelPerformance>> {
        let since = trailing_since(now, Duration::days(i64::from(window_days)));
        let forecasts = self.store.read_forecasts(user_id, since)?;
        let performance = model_performance(&forecasts, now, window_days);
        if !performance.is_ready() {
            activity_log::log_insufficient_data(user_id, "model_performance", "no validated forecasts in window");
        }
        Ok(performance)
    }
}
