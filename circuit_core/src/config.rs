//! Configuration file support for Circuit.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/circuit/config.toml`.

use crate::{Error, Result, WorkoutFocus};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub profile: ProfileConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub selection: SelectionConfig,
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

/// Exercise catalog source
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    /// JSON catalog file; the built-in catalog is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// First-run defaults for the user's settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "default_body_weight_kg")]
    pub body_weight_kg: f64,

    #[serde(default)]
    pub focus: WorkoutFocus,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            body_weight_kg: default_body_weight_kg(),
            focus: WorkoutFocus::FullBody,
        }
    }
}

/// Fixed phase durations for the session runner
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_warmup_seconds")]
    pub warmup_seconds: u32,

    #[serde(default = "default_work_seconds")]
    pub work_seconds: u32,

    #[serde(default = "default_rest_seconds")]
    pub rest_seconds: u32,

    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            warmup_seconds: default_warmup_seconds(),
            work_seconds: default_work_seconds(),
            rest_seconds: default_rest_seconds(),
            tick_millis: default_tick_millis(),
        }
    }
}

impl SessionConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

/// Exercise selection parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "default_warmup_count")]
    pub warmup_count: usize,

    #[serde(default = "default_main_count")]
    pub main_count: usize,

    /// Maximum distance between effective and target difficulty
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Upper bound of the uniform jitter added to ranking distances
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Smallest matching pool a session may start with
    #[serde(default = "default_min_pool")]
    pub min_pool: usize,

    #[serde(default)]
    pub quotas: BucketQuotas,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            warmup_count: default_warmup_count(),
            main_count: default_main_count(),
            tolerance: default_tolerance(),
            jitter: default_jitter(),
            min_pool: default_min_pool(),
            quotas: BucketQuotas::default(),
        }
    }
}

/// Per-bucket quotas for balanced selection
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketQuotas {
    #[serde(default = "default_upper_quota")]
    pub upper_body: usize,

    #[serde(default = "default_lower_quota")]
    pub lower_body: usize,

    #[serde(default = "default_core_quota")]
    pub core: usize,

    #[serde(default = "default_cardio_quota")]
    pub cardio: usize,
}

impl Default for BucketQuotas {
    fn default() -> Self {
        Self {
            upper_body: default_upper_quota(),
            lower_body: default_lower_quota(),
            core: default_core_quota(),
            cardio: default_cardio_quota(),
        }
    }
}

impl BucketQuotas {
    pub fn for_group(&self, group: crate::MuscleGroup) -> usize {
        match group {
            crate::MuscleGroup::UpperBody => self.upper_body,
            crate::MuscleGroup::LowerBody => self.lower_body,
            crate::MuscleGroup::Core => self.core,
            crate::MuscleGroup::Cardio => self.cardio,
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_dir().join(".local/share"));
    base.join("circuit")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn default_body_weight_kg() -> f64 {
    70.0
}

fn default_warmup_seconds() -> u32 {
    20
}

fn default_work_seconds() -> u32 {
    30
}

fn default_rest_seconds() -> u32 {
    10
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_warmup_count() -> usize {
    3
}

fn default_main_count() -> usize {
    12
}

fn default_tolerance() -> f64 {
    3.0
}

fn default_jitter() -> f64 {
    1.0
}

fn default_min_pool() -> usize {
    6
}

fn default_upper_quota() -> usize {
    4
}

fn default_lower_quota() -> usize {
    4
}

fn default_core_quota() -> usize {
    2
}

fn default_cardio_quota() -> usize {
    2
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
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
        let base = dirs::config_dir().unwrap_or_else(|| home_dir().join(".config"));
        base.join("circuit").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
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

    /// Reject values the runner or selector cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.profile.body_weight_kg <= 0.0 {
            return Err(Error::Config("body_weight_kg must be positive".into()));
        }
        if self.session.warmup_seconds == 0
            || self.session.work_seconds == 0
            || self.session.rest_seconds == 0
        {
            return Err(Error::Config("phase durations must be at least 1 second".into()));
        }
        if self.session.tick_millis == 0 {
            return Err(Error::Config("tick_millis must be positive".into()));
        }
        if self.selection.tolerance < 0.0 || self.selection.jitter < 0.0 {
            return Err(Error::Config(
                "tolerance and jitter must not be negative".into(),
            ));
        }
        Ok(())
    }
}
