//! Application configuration.
//!
//! Stored as JSON. Missing fields fall back to their defaults, so a config
//! file only needs the values it changes. Command line flags override
//! whatever is loaded here.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::explain::DEFAULT_ALPHA;
use crate::history::DEFAULT_MIN_LIKELIHOOD;
use crate::inference::AnalysisConfig;
use crate::model::MODEL_INPUT_SIZE;
use crate::utils::error::{MangoError, Result};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Model location and input resolution
    pub model: ModelSettings,
    /// Heatmap generation
    pub heatmap: HeatmapSettings,
    /// Prediction history
    pub history: HistorySettings,
    /// Log level name (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            heatmap: HeatmapSettings::default(),
            history: HistorySettings::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Path to the trained weights (CompactRecorder file)
    pub path: PathBuf,
    /// Square input resolution
    pub input_size: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/mango_leaf_model.mpk"),
            input_size: MODEL_INPUT_SIZE,
        }
    }
}

/// Heatmap settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapSettings {
    pub enabled: bool,
    /// Overlay opacity in `[0, 1]`
    pub alpha: f32,
}

impl Default for HeatmapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            alpha: DEFAULT_ALPHA,
        }
    }
}

/// History settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub path: PathBuf,
    /// Diseases at or below this likelihood are hidden from listings
    pub min_likelihood: f32,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/history.json"),
            min_likelihood: DEFAULT_MIN_LIKELIHOOD,
        }
    }
}

impl AppConfig {
    /// Load from a JSON file and validate
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MangoError::PathNotFound(path.to_path_buf()));
        }

        let json = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&json)
            .map_err(|e| MangoError::Config(format!("Failed to parse {:?}: {}", path, e)))?;
        config.validate()?;

        info!("Configuration loaded from {:?}", path);
        Ok(config)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.model.input_size == 0 {
            return Err(MangoError::Config("model.input_size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.heatmap.alpha) {
            return Err(MangoError::Config(format!(
                "heatmap.alpha must be within [0, 1], got {}",
                self.heatmap.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.history.min_likelihood) {
            return Err(MangoError::Config(format!(
                "history.min_likelihood must be within [0, 1], got {}",
                self.history.min_likelihood
            )));
        }
        Ok(())
    }

    /// Pipeline switches derived from the heatmap settings
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            heatmap: self.heatmap.enabled,
            alpha: self.heatmap.alpha,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.input_size, 224);
        assert_eq!(config.analysis_config(), AnalysisConfig::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf").join("mango.json");

        let mut config = AppConfig::default();
        config.heatmap.alpha = 0.3;
        config.history.path = PathBuf::from("/tmp/elsewhere.json");
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mango.json");
        fs::write(&path, r#"{ "heatmap": { "enabled": false } }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert!(!config.heatmap.enabled);
        assert_eq!(config.heatmap.alpha, DEFAULT_ALPHA);
        assert_eq!(config.history, HistorySettings::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.heatmap.alpha = 1.5;
        assert!(matches!(config.validate(), Err(MangoError::Config(_))));

        let mut config = AppConfig::default();
        config.model.input_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.history.min_likelihood = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            AppConfig::load(&missing),
            Err(MangoError::PathNotFound(_))
        ));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "[1, 2").unwrap();
        assert!(matches!(AppConfig::load(&bad), Err(MangoError::Config(_))));
    }
}
