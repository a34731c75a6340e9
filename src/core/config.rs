use crate::core::capture_session::CaptureTimings;
use crate::core::dataset::{SplitBoundary, DEFAULT_TRAIN_FRACTION};
use crate::models::pose::POSE_LANDMARK_COUNT;
use crate::models::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine home directory")]
    NoHomeDirectory,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Delay between selecting a label and the first sample (ms)
    pub countdown_ms: u64,
    /// Time between two samples while collecting (ms)
    pub sample_interval_ms: u64,
    /// Length of the collection window (ms)
    pub collection_duration_ms: u64,
    /// Delay before the single frame of a test detection (ms)
    pub test_delay_ms: u64,
    /// Landmarks per detected pose
    pub landmark_count: usize,
    /// Share of shuffled samples used for training (0.0-1.0, exclusive)
    pub train_fraction: f64,
    /// Where the test partition starts relative to the split index
    pub split_boundary: SplitBoundary,
    /// Fixed shuffle seed; `None` seeds from entropy
    pub shuffle_seed: Option<u64>,
    /// Passes over the training set
    pub epochs: u32,
    pub learning_rate: f32,
    /// Dense layer widths for network backends
    pub hidden_layers: Vec<u32>,
    /// Where exported datasets are written
    pub export_dir: PathBuf,
    pub export_file_name: String,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());

        let mut export_dir = PathBuf::from(home);
        export_dir.push(".pose_trainer");
        export_dir.push("datasets");

        let timings = CaptureTimings::default();
        let training = TrainingConfig::default();

        Self {
            countdown_ms: timings.countdown_ms,
            sample_interval_ms: timings.sample_interval_ms,
            collection_duration_ms: timings.collection_duration_ms,
            test_delay_ms: timings.test_delay_ms,
            landmark_count: POSE_LANDMARK_COUNT,
            train_fraction: DEFAULT_TRAIN_FRACTION,
            split_boundary: SplitBoundary::default(),
            shuffle_seed: None,
            epochs: training.epochs,
            learning_rate: training.learning_rate,
            hidden_layers: training.hidden_layers,
            export_dir,
            export_file_name: "trainingData.json".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating with defaults if it doesn't exist
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            log::info!("Created default configuration at {}", path.display());
            Ok(config)
        }
    }

    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        self.timings()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.landmark_count == 0 {
            return Err(ConfigError::Invalid("Landmark count must be greater than zero".to_string()));
        }

        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "Invalid train fraction: {}. Must be between 0.0 and 1.0 (exclusive)",
                self.train_fraction
            )));
        }

        if self.epochs == 0 {
            return Err(ConfigError::Invalid("Epochs must be greater than zero".to_string()));
        }

        if !(self.learning_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "Invalid learning rate: {}. Must be positive",
                self.learning_rate
            )));
        }

        if self.export_file_name.trim().is_empty() {
            return Err(ConfigError::Invalid("Export file name cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> ConfigResult<Self> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    pub fn timings(&self) -> CaptureTimings {
        CaptureTimings {
            countdown_ms: self.countdown_ms,
            sample_interval_ms: self.sample_interval_ms,
            collection_duration_ms: self.collection_duration_ms,
            test_delay_ms: self.test_delay_ms,
        }
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            hidden_layers: self.hidden_layers.clone(),
        }
    }

    pub fn export_path(&self) -> PathBuf {
        self.export_dir.join(&self.export_file_name)
    }

    /// Get the configuration file path
    pub fn get_config_path() -> ConfigResult<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| ConfigError::NoHomeDirectory)?;

        let mut path = PathBuf::from(home);
        path.push(".pose_trainer");
        path.push("config");
        path.push("settings.json");

        Ok(path)
    }
}
