//! Error types for the engine and its record stores.
//!
//! Analyzer-level shortfalls are not errors: they are reported as
//! [`crate::forecast::AnalyzerOutcome::InsufficientData`] and absorbed by fusion.
//! Only buffer extraction and calibration fail hard on missing data.

use thiserror::Error;

/// Errors surfaced by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Insufficient calibration data: {valid} valid samples, {required} required")]
    InsufficientCalibrationData { valid: usize, required: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by [`crate::store::RecordStore`] implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl EngineError {
    /// True for the recoverable "not enough data yet" family
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientData(_) | EngineError::InsufficientCalibrationData { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
