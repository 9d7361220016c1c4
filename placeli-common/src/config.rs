//! Configuration loading and root folder resolution
//!
//! Settings come from, in priority order:
//! 1. Command-line arguments (`--root`, `--db`)
//! 2. Environment variable (`PLACELI_ROOT`)
//! 3. TOML config file
//! 4. OS-dependent compiled defaults
//!
//! A missing or unreadable config file never stops startup: a warning is
//! logged and defaults are used.

use crate::fields::{SystemFieldRules, DEFAULT_SYSTEM_NAMES, DEFAULT_SYSTEM_PREFIXES};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_ENV_VAR: &str = "PLACELI_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "places.db";

/// Configuration loaded from `config.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database
    ///
    /// If not specified, falls back to the OS default
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Import and merge settings (optional)
    #[serde(default)]
    pub import: ImportConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Import configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    /// Custom-field prefixes treated as provider-written
    #[serde(default = "default_system_field_prefixes")]
    pub system_field_prefixes: Vec<String>,

    /// Exact custom-field names treated as provider-written
    #[serde(default = "default_system_field_names")]
    pub system_field_names: Vec<String>,

    /// Pause between enrichment provider calls
    #[serde(default = "default_enrichment_delay_ms")]
    pub enrichment_delay_ms: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            system_field_prefixes: default_system_field_prefixes(),
            system_field_names: default_system_field_names(),
            enrichment_delay_ms: default_enrichment_delay_ms(),
        }
    }
}

impl ImportConfig {
    pub fn system_field_rules(&self) -> SystemFieldRules {
        SystemFieldRules::new(
            self.system_field_prefixes.clone(),
            self.system_field_names.clone(),
        )
    }

    pub fn enrichment_delay(&self) -> Duration {
        Duration::from_millis(self.enrichment_delay_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_system_field_prefixes() -> Vec<String> {
    DEFAULT_SYSTEM_PREFIXES.iter().map(|s| s.to_string()).collect()
}

fn default_system_field_names() -> Vec<String> {
    DEFAULT_SYSTEM_NAMES.iter().map(|s| s.to_string()).collect()
}

fn default_enrichment_delay_ms() -> u64 {
    100
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
}

/// Config file contents plus any problem found while reading it
///
/// The warning is returned rather than logged so the caller can report it
/// once logging is set up (the log level itself comes from this file).
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub warning: Option<String>,
}

/// Load the config file, falling back to defaults
///
/// **Algorithm:**
/// 1. Use `explicit` if given, otherwise the platform config path
/// 2. Missing file → defaults (a warning only when the path was requested)
/// 3. Unreadable or invalid file → warning + defaults
pub fn load_config(explicit: Option<&Path>) -> LoadedConfig {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => return LoadedConfig::default(),
        },
    };

    if !path.exists() {
        return LoadedConfig {
            config: TomlConfig::default(),
            warning: explicit
                .is_some()
                .then(|| format!("Config file {} not found, using defaults", path.display())),
        };
    }

    match load_toml_config(&path) {
        Ok(config) => {
            debug!(path = %path.display(), "Loaded config file");
            LoadedConfig { config, warning: None }
        }
        Err(e) => LoadedConfig {
            config: TomlConfig::default(),
            warning: Some(format!("Ignoring unreadable config file: {}", e)),
        },
    }
}

/// [`load_config`], logging any warning straight away
pub fn load_config_or_default(explicit: Option<&Path>) -> TomlConfig {
    let loaded = load_config(explicit);
    if let Some(warning) = &loaded.warning {
        warn!("{}", warning);
    }
    loaded.config
}

/// `<config dir>/placeli/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("placeli").join("config.toml"))
}

/// Root folder resolution:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("placeli"))
        .unwrap_or_else(|| PathBuf::from("./placeli_data"))
}

/// Create the root folder if needed and return the database path inside it
pub fn prepare_root_folder(root: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root).map_err(|e| {
        Error::Config(format!("Cannot create root folder {}: {}", root.display(), e))
    })?;
    Ok(root.join(DATABASE_FILE_NAME))
}
