//! Vocal biomarker extraction and migraine risk forecasting.
//!
//! Raw voice audio becomes a [`biomarkers::BiomarkerVector`], is scored
//! against a personal calibration baseline, and is fused with attack timing
//! and environmental history into a 48h [`forecast::RiskForecast`] that is
//! later checked against what actually happened.
//!
//! [`engine::RiskEngine`] is the entry point; persistence is supplied through
//! [`store::RecordStore`].

pub mod activity_log;
pub mod attack;
pub mod audio;
pub mod biomarkers;
pub mod config;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod store;
pub mod synthetic;


pub use attack::{AttackEvent, AttackFrequency, EnvironmentalContext};
pub use config::EngineConfig;
pub use engine::RiskEngine;
pub use error::{EngineError, EngineResult, StoreError};
pub use forecast::{RiskForecast, RiskLevel};
pub use store::{InMemoryStore, JsonFileStore, RecordStore};
