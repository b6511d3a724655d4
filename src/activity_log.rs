//! Activity Logging Module
//!
//! Structured logging for auditing engine operations.
//! IMPORTANT: This module must NEVER log health content.
//!
//! What IS logged:
//! - User, session and forecast IDs
//! - Counts, scores, risk levels and timings
//! - Outcome of validation
//!
//! What is NOT logged:
//! - Audio samples
//! - Attack symptoms or free-text notes
//! - Raw biomarker vectors

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};
use uuid::Uuid;

use crate::forecast::RiskLevel;

/// Keeps the non-blocking file writer alive so logs flush before exit
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize logging
///
/// - Console output (human-readable), `info` unless `RUST_LOG` or `verbose` says otherwise
/// - File output (JSON, RFC 3339 UTC timestamps) under `log_dir`, rotated daily
pub fn init_logging(log_dir: &Path, verbose: bool) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "activity.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD.set(guard).ok();

    let file_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(non_blocking)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let default_level = if verbose { "debug" } else { "info" };
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        );

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    info!(
        event = "logging_initialized",
        log_dir = %log_dir.display(),
        "Activity logging initialized"
    );
    Ok(())
}

// ============================================================================
// Biomarker Events
// ============================================================================

/// Log a stored voice analysis (scores only)
pub fn log_voice_analyzed(
    user_id: &str,
    session_id: Uuid,
    stress_score: f64,
    baseline_deviation_pct: f64,
    tremor_detected: bool,
) {
    info!(
        event = "voice_analyzed",
        user_id = %user_id,
        session_id = %session_id,
        stress_score = stress_score,
        baseline_deviation_pct = baseline_deviation_pct,
        tremor_detected = tremor_detected,
        "Voice session analyzed"
    );
}

pub fn log_baseline_established(user_id: &str, sample_count: usize, skipped: usize) {
    info!(
        event = "baseline_established",
        user_id = %user_id,
        sample_count = sample_count,
        skipped = skipped,
        "Calibration baseline established"
    );
}

// ============================================================================
// Forecast Events
// ============================================================================

pub fn log_forecast_generated(
    user_id: &str,
    forecast_id: Uuid,
    risk_level: RiskLevel,
    probability: f64,
    confidence: f64,
    analyzers_ready: usize,
) {
    info!(
        event = "forecast_generated",
        user_id = %user_id,
        forecast_id = %forecast_id,
        risk_level = risk_level.as_str(),
        probability = probability,
        confidence = confidence,
        analyzers_ready = analyzers_ready,
        "Risk forecast generated"
    );
}

pub fn log_forecast_validated(
    forecast_id: Uuid,
    actual_occurred: bool,
    accuracy: f64,
    already_validated: bool,
) {
    info!(
        event = "forecast_validated",
        forecast_id = %forecast_id,
        actual_occurred = actual_occurred,
        accuracy = accuracy,
        already_validated = already_validated,
        "Forecast validated"
    );
}

pub fn log_attack_logged(user_id: &str, attack_id: Uuid, severity: u8, symptom_count: usize) {
    info!(
        event = "attack_logged",
        user_id = %user_id,
        attack_id = %attack_id,
        severity = severity,
        symptom_count = symptom_count,
        "Attack logged"
    );
}

/// Log a soft shortfall (not an error)
pub fn log_insufficient_data(user_id: &str, operation: &str, reason: &str) {
    debug!(
        event = "insufficient_data",
        user_id = %user_id,
        operation = %operation,
        reason = %reason,
        "Not enough data"
    );
}
