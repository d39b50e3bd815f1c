//! Configuration for the template registry.
//!
//! Layered the usual way:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `FILE_TEMPLATES_` and use double
//! underscores to separate nested levels:
//! - `FILE_TEMPLATES_TEMPLATES__WATCH=false` sets `templates.watch`
//! - `FILE_TEMPLATES_LOGGING__DEFAULT=debug` sets `logging.default`

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const ENV_PREFIX: &str = "FILE_TEMPLATES_";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    /// Template directory discovery and watching
    #[serde(default)]
    pub templates: TemplatesConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TemplatesConfig {
    /// Override for the XDG Templates directory (highest priority)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_templates_dir: Option<PathBuf>,

    /// Override for the user data directory; `templates` is appended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<PathBuf>,

    /// Override for the system data directories (`XDG_DATA_DIRS`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_data_dirs: Option<Vec<PathBuf>>,

    /// Create the XDG Templates directory when it is missing
    #[serde(default = "default_true")]
    pub create_user_templates_dir: bool,

    /// Keep the registry live-updated through directory watches
    #[serde(default = "default_true")]
    pub watch: bool,
}

/// Logging levels: a default plus per-module overrides.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            user_templates_dir: None,
            user_data_dir: None,
            system_data_dirs: None,
            create_user_templates_dir: true,
            watch: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// The file is `<config dir>/file-templates/settings.toml`; a missing file
    /// is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path().unwrap_or_else(|| PathBuf::from("settings.toml"));
        Self::load_from(path)
    }

    /// Load configuration layered on top of a specific file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".") // Double underscore becomes dot
                    .into()
            }))
            .extract()
            .map_err(|e| ConfigError::Figment(Box::new(e)))
    }

    /// Default location of the settings file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("file-templates").join("settings.toml"))
    }

    /// Save current configuration to file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }
}
