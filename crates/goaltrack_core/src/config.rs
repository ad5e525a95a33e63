//! TOML-based core configuration.
//!
//! # Responsibility
//! - Load `goaltrack.toml` (storage, logging and streak settings).
//! - Apply `GOALTRACK_*` environment overrides on top of file values.
//! - Resolve the time zone used for streak day boundaries.
//!
//! # Invariants
//! - A missing config file yields defaults; a malformed one is an error.
//! - `utc_offset_minutes`, when set, stays within +/- 18 hours.

use crate::logging::default_log_level;
use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "goaltrack.toml";
const DB_FILE_NAME: &str = "goaltrack.sqlite3";
const DB_PATH_ENV: &str = "GOALTRACK_DB_PATH";
const LOG_LEVEL_ENV: &str = "GOALTRACK_LOG_LEVEL";
const MAX_OFFSET_MINUTES: i32 = 18 * 60;

/// Storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file path. Defaults to the platform data dir.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Absolute log directory. Defaults to `<data dir>/logs`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Streak settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
    /// Fixed day-boundary offset from UTC. `None` follows the host zone.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub streak: StreakConfig,
}

fn default_level() -> String {
    default_log_level().to_string()
}

fn default_history_limit() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: None,
        }
    }
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            utc_offset_minutes: None,
        }
    }
}

/// Configuration load/save errors.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Serialize(toml::ser::Error),
    InvalidUtcOffset(i32),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "config io error at `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
            Self::Serialize(err) => write!(f, "config serialize failed: {err}"),
            Self::InvalidUtcOffset(minutes) => write!(
                f,
                "utc_offset_minutes must be within +/-{MAX_OFFSET_MINUTES}, got {minutes}"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::InvalidUtcOffset(_) => None,
        }
    }
}

impl CoreConfig {
    /// Loads config from `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads config from `path` and applies process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Writes config as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `GOALTRACK_DB_PATH` / `GOALTRACK_LOG_LEVEL` from `lookup`.
    /// Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = non_blank(lookup(DB_PATH_ENV)) {
            self.storage.db_path = Some(PathBuf::from(value));
        }
        if let Some(value) = non_blank(lookup(LOG_LEVEL_ENV)) {
            self.logging.level = value;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(minutes) = self.streak.utc_offset_minutes {
            if minutes.abs() > MAX_OFFSET_MINUTES {
                return Err(ConfigError::InvalidUtcOffset(minutes));
            }
        }
        Ok(())
    }

    /// Database path, defaulting to `<data dir>/goaltrack.sqlite3`.
    pub fn resolved_db_path(&self) -> PathBuf {
        self.storage
            .db_path
            .clone()
            .unwrap_or_else(|| data_dir().join(DB_FILE_NAME))
    }

    /// Log directory, defaulting to `<data dir>/logs`.
    pub fn resolved_log_dir(&self) -> PathBuf {
        self.logging
            .dir
            .clone()
            .unwrap_or_else(|| data_dir().join("logs"))
    }

    /// Expresses `now` in the zone whose calendar dates drive streaks.
    pub fn day_zone_now(&self, now: DateTime<Utc>) -> Result<DateTime<FixedOffset>, ConfigError> {
        match self.streak.utc_offset_minutes {
            Some(minutes) => {
                let offset = FixedOffset::east_opt(minutes * 60)
                    .ok_or(ConfigError::InvalidUtcOffset(minutes))?;
                Ok(now.with_timezone(&offset))
            }
            None => Ok(now.with_timezone(&Local).fixed_offset()),
        }
    }
}

/// Platform data directory for goaltrack files.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("goaltrack")
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    data_dir().join(CONFIG_FILE_NAME)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}
