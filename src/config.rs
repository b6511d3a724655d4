use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::biomarkers::baseline::MIN_CALIBRATION_SAMPLES;
use crate::biomarkers::SAMPLE_RATE;
use crate::error::{EngineError, EngineResult};
use crate::forecast::DEFAULT_HORIZON_HOURS;

/// Longest attack/forecast lookback accepted from config
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// Longest physiological window or forecast horizon accepted from config
pub const MAX_WINDOW_HOURS: u32 = 24 * 365;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub schema_version: u32,

    /// Rate all analyzed audio is expected at (Hz)
    pub sample_rate: usize,
    /// Valid recordings required to establish a baseline
    pub min_calibration_samples: usize,

    // Analysis windows
    pub lookback_days: u32,
    pub physiological_window_hours: u32,
    pub forecast_horizon_hours: u32,

    /// HRV assumed when the user has no reading on record (ms)
    pub default_hrv_ms: u32,

    /// Records file override
    pub data_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            sample_rate: SAMPLE_RATE,
            min_calibration_samples: MIN_CALIBRATION_SAMPLES,
            lookback_days: 90,
            physiological_window_hours: 24,
            forecast_horizon_hours: DEFAULT_HORIZON_HOURS as u32,
            default_hrv_ms: 65,
            data_dir: None,
        }
    }
}

impl EngineConfig {
    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".prodrome"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Directory for rotating log files
    pub fn log_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("logs"))
    }

    /// Records file used by the file-backed store
    pub fn data_path(&self) -> Result<PathBuf> {
        match self.data_dir {
            Some(ref dir) => Ok(dir.join("records.json")),
            None => Ok(Self::config_dir()?.join("records.json")),
        }
    }

    /// Load config from the default path or return default
    pub fn load_or_default() -> Self {
        let loaded = Self::config_path().and_then(|path| Self::load(&path));
        match loaded {
            Ok(config) => config,
            Err(e) => {
                debug!("Failed to load config, using default: {}", e);
                Self::default()
            }
        }
    }

    /// Load config from file, or default when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            let config: EngineConfig =
                serde_json::from_str(&content).context("Failed to parse config file")?;
            config.validate().context("Invalid config file")?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.sample_rate == 0 {
            return Err(EngineError::InvalidInput("sample_rate must be positive".into()));
        }
        if self.min_calibration_samples < 1 {
            return Err(EngineError::InvalidInput(
                "min_calibration_samples must be at least 1".into(),
            ));
        }
        if self.lookback_days == 0 || self.physiological_window_hours == 0 {
            return Err(EngineError::InvalidInput("analysis windows must be non-empty".into()));
        }
        if self.forecast_horizon_hours == 0 {
            return Err(EngineError::InvalidInput(
                "forecast_horizon_hours must be positive".into(),
            ));
        }
        if self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(EngineError::InvalidInput(format!(
                "lookback_days must be at most {}",
                MAX_LOOKBACK_DAYS
            )));
        }
        if self.physiological_window_hours > MAX_WINDOW_HOURS || self.forecast_horizon_hours > MAX_WINDOW_HOURS {
            return Err(EngineError::InvalidInput(format!(
                "physiological_window_hours and forecast_horizon_hours must be at most {}",
                MAX_WINDOW_HOURS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 24_000);
        assert_eq!(config.min_calibration_samples, 3);
        assert_eq!(config.lookback_days, 90);
        assert_eq!(config.physiological_window_hours, 24);
        assert_eq!(config.forecast_horizon_hours, 24);
        assert_eq!(config.default_hrv_ms, 65);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_dir() {
        let path = EngineConfig::config_dir().unwrap();
        assert!(path.to_string_lossy().contains(".prodrome"));
        assert!(EngineConfig::config_path()
            .unwrap()
            .to_string_lossy()
            .ends_with("config.json"));
    }

    #[test]
    fn test_data_path_override() {
        let mut config = EngineConfig::default();
        assert!(config.data_path().unwrap().ends_with("records.json"));
        config.data_dir = Some(PathBuf::from("/tmp/prodrome-data"));
        assert_eq!(
            config.data_path().unwrap(),
            PathBuf::from("/tmp/prodrome-data/records.json")
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("config.json");
        let mut config = EngineConfig::default();
        config.lookback_days = 30;
        config.default_hrv_ms = 58;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"lookback_days": 14}"#).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.lookback_days, 14);
        assert_eq!(loaded.sample_rate, 24_000);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let loaded = EngineConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, EngineConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"sample_rate": 0}"#).unwrap();
        assert!(EngineConfig::load(&path).is_err());

        let config = EngineConfig {
            min_calibration_samples: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_oversized_windows_rejected() {
        for config in [
            EngineConfig {
                lookback_days: u32::MAX,
                ..Default::default()
            },
            EngineConfig {
                physiological_window_hours: u32::MAX,
                ..Default::default()
            },
            EngineConfig {
                forecast_horizon_hours: MAX_WINDOW_HOURS + 1,
                ..Default::default()
            },
        ] {
            assert!(matches!(config.validate(), Err(EngineError::InvalidInput(_))));
        }

        let widest = EngineConfig {
            lookback_days: MAX_LOOKBACK_DAYS,
            physiological_window_hours: MAX_WINDOW_HOURS,
            forecast_horizon_hours: MAX_WINDOW_HOURS,
            ..Default::default()
        };
        assert!(widest.validate().is_ok());
    }
}
