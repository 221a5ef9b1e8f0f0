//! Runtime configuration.
//!
//! Each setting is taken from `config.toml` first, then the environment
//! (including a `.env` file), then the built-in default.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracker_core::scheduler::{SchedulePolicy, SchedulerError, ToggleMode};

pub const CONFIG_FILE: &str = "config.toml";

pub const ENV_DB_URL: &str = "REVIEW_DB_URL";
pub const ENV_BACKEND: &str = "REVIEW_BACKEND";
pub const ENV_TOGGLE_MODE: &str = "REVIEW_TOGGLE_MODE";

pub const DEFAULT_SQLITE_URL: &str = "sqlite://reviews.sqlite3";
pub const DEFAULT_JSON_PATH: &str = "reviews.json";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("cannot read config.toml: {0}")]
    Read(#[from] std::io::Error),
    #[error("invalid config.toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown storage backend: {0:?} (expected sqlite, json or memory)")]
    UnknownBackend(String),
    #[error(transparent)]
    ToggleMode(#[from] SchedulerError),
}

/// Where problems are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Sqlite,
    Json,
    Memory,
}

impl Backend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Json => "json",
            Backend::Memory => "memory",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "json" => Ok(Backend::Json),
            "memory" => Ok(Backend::Memory),
            _ => Err(ConfigError::UnknownBackend(s.to_owned())),
        }
    }
}

/// Shape of `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    storage: StorageSection,
    reviews: ReviewsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageSection {
    backend: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReviewsSection {
    toggle_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: Backend,
    /// Database URL or JSON file path; `None` picks the backend's default.
    pub location: Option<String>,
    pub toggle_mode: ToggleMode,
}

impl AppConfig {
    /// Load from `config.toml` in the working directory and the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed,
    /// or if a setting holds an unknown value.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env is fine.
        let _ = dotenvy::dotenv();

        let file = if Path::new(CONFIG_FILE).exists() {
            Some(std::fs::read_to_string(CONFIG_FILE)?)
        } else {
            None
        };
        let config = Self::resolve(file.as_deref(), |key| std::env::var(key).ok())?;
        tracing::debug!(
            backend = %config.backend,
            location = config.location(),
            toggle = %config.toggle_mode,
            "resolved configuration"
        );
        Ok(config)
    }

    /// Merge `file` contents, `env` lookups and defaults, in that order of priority.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed TOML or unknown values.
    pub fn resolve(
        file: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file: FileConfig = match file {
            Some(raw) => toml::from_str(raw)?,
            None => FileConfig::default(),
        };
        let pick = |from_file: Option<String>, key: &str| {
            from_file
                .or_else(|| env(key))
                .filter(|value| !value.trim().is_empty())
        };

        let backend = pick(file.storage.backend, ENV_BACKEND)
            .map(|raw| raw.parse::<Backend>())
            .transpose()?
            .unwrap_or_default();
        let location = pick(file.storage.url, ENV_DB_URL);
        let toggle_mode = pick(file.reviews.toggle_mode, ENV_TOGGLE_MODE)
            .map(|raw| raw.parse::<ToggleMode>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            backend,
            location,
            toggle_mode,
        })
    }

    /// The configured location, or the default for the backend.
    #[must_use]
    pub fn location(&self) -> &str {
        match (&self.location, self.backend) {
            (Some(location), _) => location,
            (None, Backend::Json) => DEFAULT_JSON_PATH,
            (None, Backend::Sqlite | Backend::Memory) => DEFAULT_SQLITE_URL,
        }
    }

    #[must_use]
    pub fn policy(&self) -> SchedulePolicy {
        SchedulePolicy::for_toggle(self.toggle_mode)
    }
}
