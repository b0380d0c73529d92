//! Configuration management
//!
//! Provides persistent settings storage with schema versioning and
//! migrations. Configuration is stored in `~/.mudra/config.json` and
//! cached in memory after first access.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::alphabet::Alphabet;
use crate::dataset::DataPaths;
use crate::landmarks::DetectorConfig;

/// Current config schema version
const CURRENT_VERSION: u32 = 1;

/// Global config instance for caching
static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Target alphabet and collection volume
    pub collection: CollectionConfig,
    /// Per-stage detector tuning
    pub detector: DetectorStages,
    /// Live recognition settings
    pub recognition: RecognitionConfig,
    /// Storage locations
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            collection: CollectionConfig::default(),
            detector: DetectorStages::default(),
            recognition: RecognitionConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Alphabet and sample-count settings for dataset collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Letters to collect, in label-index order
    pub letters: Vec<String>,
    /// Samples gathered per letter before auto-completion
    pub samples_per_letter: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            letters: Alphabet::default().iter().map(str::to_string).collect(),
            samples_per_letter: 100,
        }
    }
}

impl CollectionConfig {
    pub fn alphabet(&self) -> Alphabet {
        Alphabet::new(self.letters.clone())
    }
}

/// Detector configuration per pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorStages {
    pub collection: DetectorConfig,
    pub preprocessing: DetectorConfig,
    pub recognition: DetectorConfig,
}

impl Default for DetectorStages {
    fn default() -> Self {
        Self {
            collection: DetectorConfig::for_collection(),
            preprocessing: DetectorConfig::for_preprocessing(),
            recognition: DetectorConfig::for_recognition(),
        }
    }
}

/// Live recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Minimum elapsed time between two accepted predictions, in
    /// milliseconds
    pub cooldown_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self { cooldown_ms: 2000 }
    }
}

impl RecognitionConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Storage locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Override for the data root; `None` means `~/.mudra`
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn data_paths(&self) -> DataPaths {
        match &self.data_dir {
            Some(dir) => DataPaths::new(dir.clone()),
            None => DataPaths::default_root(),
        }
    }
}

/// Get the path to the config file (~/.mudra/config.json)
pub fn get_config_path() -> PathBuf {
    home_dir_or_fallback().join(".mudra").join("config.json")
}

/// Get the path to the config directory (~/.mudra)
fn get_config_dir() -> PathBuf {
    home_dir_or_fallback().join(".mudra")
}

/// Get the home directory, falling back to /tmp if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::error!("Could not determine home directory, using /tmp");
        PathBuf::from("/tmp")
    })
}

/// Ensure the config directory exists
fn ensure_config_dir() -> Result<(), String> {
    let dir = get_config_dir();
    if !dir.exists() {
        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    Ok(())
}

/// Load configuration from disk
fn load_from_disk() -> Result<Config, String> {
    let path = get_config_path();

    if !path.exists() {
        tracing::info!("Config file not found, using defaults");
        return Ok(Config::default());
    }

    let contents =
        fs::read_to_string(&path).map_err(|e| format!("Failed to read config file: {}", e))?;

    let config: Config =
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse config: {}", e))?;

    // Run migrations if needed
    let migrated = migrate_config(config)?;

    Ok(migrated)
}

/// Save configuration to disk
fn save_to_disk(config: &Config) -> Result<(), String> {
    ensure_config_dir()?;

    let path = get_config_path();
    let contents = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialise config: {}", e))?;

    fs::write(&path, contents).map_err(|e| format!("Failed to write config file: {}", e))?;

    tracing::info!("Config saved to {}", path.display());
    Ok(())
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: Config) -> Result<Config, String> {
    let original_version = config.version;

    // Apply migrations sequentially
    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }

    if config.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            config.version
        );
        // Save the migrated config
        save_to_disk(&config)?;
    }

    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config, String> {
    match config.version {
        // Version 0 -> 1: Initial migration (add any new fields)
        0 => {
            let mut migrated = config;
            migrated.version = 1;
            Ok(migrated)
        }
        v => Err(format!("Unknown config version: {}", v)),
    }
}

/// Get the global config instance
fn get_config_instance() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| {
        let config = load_from_disk().unwrap_or_else(|e| {
            tracing::error!("Failed to load config, using defaults: {}", e);
            Config::default()
        });
        RwLock::new(config)
    })
}

/// Get the current configuration
///
/// The config is cached in memory and loaded from disk on first access.
pub fn get_config() -> Result<Config, String> {
    let config = get_config_instance().read().clone();
    Ok(config)
}

/// Update the configuration
///
/// Replaces the current configuration with the provided config and
/// persists it to disk. The version field is automatically updated to the
/// current schema.
pub fn set_config(mut config: Config) -> Result<(), String> {
    // Ensure version is current
    config.version = CURRENT_VERSION;

    // Save to disk first
    save_to_disk(&config)?;

    // Update cached config
    let mut cached = get_config_instance().write();
    *cached = config;

    tracing::info!("Configuration updated");
    Ok(())
}

/// Reset configuration to defaults
pub fn reset_config() -> Result<Config, String> {
    let default_config = Config::default();

    save_to_disk(&default_config)?;

    let mut cached = get_config_instance().write();
    *cached = default_config.clone();

    tracing::info!("Configuration reset to defaults");
    Ok(default_config)
}
