//! Configuration file support for the weight planner.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/weightplan/config.toml`.
//! Every threshold used by the estimator, projector and correction generator
//! lives here so it can be overridden without touching code.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Energy density of body mass change (kcal per kg).
pub const KCAL_PER_KG: f64 = 7700.0;

/// Weight assumed when nothing has ever been logged (kg).
pub const DEFAULT_WEIGHT_KG: f64 = 70.0;

/// Longest window or span any threshold may name (days).
pub const MAX_DAYS: i64 = 3650;

static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(Config::default);

/// Shared default configuration
pub fn defaults() -> &'static Config {
    &DEFAULT_CONFIG
}

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub estimator: EstimatorConfig,

    #[serde(default)]
    pub projection: ProjectionConfig,

    #[serde(default)]
    pub correction: CorrectionConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Maintenance estimator parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub window_days: i64,
    pub min_entries: usize,
    pub min_span_days: i64,
    pub kcal_per_kg: f64,
    pub plausible_min_kcal: i64,
    pub plausible_max_kcal: i64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            window_days: 14,
            min_entries: 2,
            min_span_days: 7,
            kcal_per_kg: KCAL_PER_KG,
            plausible_min_kcal: 1000,
            plausible_max_kcal: 6000,
        }
    }
}

/// Goal projector parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub kcal_per_kg: f64,
    pub default_weight_kg: f64,
    pub rolling_average_days: i64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            kcal_per_kg: KCAL_PER_KG,
            default_weight_kg: DEFAULT_WEIGHT_KG,
            rolling_average_days: 7,
        }
    }
}

/// Correction segment generator parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Minimum span of post-baseline data before any correction
    pub min_span_days: i64,
    /// Minimum time since the baseline (goal start or last correction)
    pub cooldown_days: i64,
    pub window_days: i64,
    pub window_max_entries: usize,
    pub window_min_span_days: i64,
    /// Relative deviation from the planned rate that is tolerated
    pub deviation_tolerance: f64,
    pub min_target_kcal: i64,
    pub max_target_kcal: i64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            min_span_days: 14,
            cooldown_days: 7,
            window_days: 14,
            window_max_entries: 14,
            window_min_span_days: 7,
            deviation_tolerance: 0.10,
            min_target_kcal: 1200,
            max_target_kcal: 6000,
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|_| PathBuf::from("."))
    });
    base.join("weightplan")
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|_| PathBuf::from("."))
        });
        base.join("weightplan").join("config.toml")
    }

    /// Reject thresholds that would make the calculations meaningless
    pub fn validate(&self) -> Result<()> {
        if self.estimator.kcal_per_kg <= 0.0 || self.projection.kcal_per_kg <= 0.0 {
            return Err(Error::Config("kcal_per_kg must be positive".into()));
        }
        if self.estimator.plausible_min_kcal > self.estimator.plausible_max_kcal {
            return Err(Error::Config(
                "estimator plausible range is inverted".into(),
            ));
        }
        if self.correction.min_target_kcal > self.correction.max_target_kcal {
            return Err(Error::Config(
                "correction target range is inverted".into(),
            ));
        }
        if self.correction.deviation_tolerance < 0.0 {
            return Err(Error::Config(
                "deviation_tolerance must not be negative".into(),
            ));
        }
        let day_counts = [
            ("estimator.window_days", self.estimator.window_days, 1),
            ("estimator.min_span_days", self.estimator.min_span_days, 0),
            ("projection.rolling_average_days", self.projection.rolling_average_days, 1),
            ("correction.min_span_days", self.correction.min_span_days, 0),
            ("correction.cooldown_days", self.correction.cooldown_days, 0),
            ("correction.window_days", self.correction.window_days, 1),
            ("correction.window_min_span_days", self.correction.window_min_span_days, 0),
        ];
        for (name, days, min) in day_counts {
            if !(min..=MAX_DAYS).contains(&days) {
                return Err(Error::Config(format!(
                    "{} must be between {} and {} days, got {}",
                    name, min, MAX_DAYS, days
                )));
            }
        }
        if self.estimator.min_entries < 2 {
            return Err(Error::Config(
                "estimator needs at least 2 entries to fit a trend".into(),
            ));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
