//! Core configuration object.
//!
//! # Responsibility
//! - Describe every externally supplied setting the core needs.
//! - Load settings from an optional TOML file overridden by environment.
//!
//! # Invariants
//! - Components receive settings through constructors; nothing here is a
//!   process-wide singleton.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "COMMITTEE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CoreConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Root of the attachment tree: `{upload_root}/{year}/{file}.pdf`.
    #[serde(default = "default_upload_root")]
    pub upload_root: PathBuf,
    #[serde(default = "default_delete_delay_secs")]
    pub delete_delay_secs: u64,
    #[serde(default = "default_delete_max_attempts")]
    pub delete_max_attempts: u32,
    #[serde(default = "default_delete_retry_backoff_ms")]
    pub delete_retry_backoff_ms: u64,
    /// Files younger than this are never treated as orphans.
    #[serde(default = "default_orphan_grace_secs")]
    pub orphan_grace_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            upload_root: default_upload_root(),
            delete_delay_secs: default_delete_delay_secs(),
            delete_max_attempts: default_delete_max_attempts(),
            delete_retry_backoff_ms: default_delete_retry_backoff_ms(),
            orphan_grace_secs: default_orphan_grace_secs(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Loads settings from `path` (optional file) and `COMMITTEE__*` env vars.
    ///
    /// Environment values win over the file, e.g.
    /// `COMMITTEE__UPLOAD_ROOT=/srv/pdf`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: CoreConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Message("database_path must not be empty".to_string()));
        }
        if self.upload_root.as_os_str().is_empty() {
            return Err(ConfigError::Message("upload_root must not be empty".to_string()));
        }
        if self.delete_max_attempts == 0 {
            return Err(ConfigError::Message(
                "delete_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn delete_delay(&self) -> Duration {
        Duration::from_secs(self.delete_delay_secs)
    }

    pub fn delete_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.delete_retry_backoff_ms)
    }

    pub fn orphan_grace(&self) -> Duration {
        Duration::from_secs(self.orphan_grace_secs)
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("committees.sqlite3")
}

fn default_upload_root() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_delete_delay_secs() -> u64 {
    3
}

fn default_delete_max_attempts() -> u32 {
    3
}

fn default_delete_retry_backoff_ms() -> u64 {
    500
}

fn default_orphan_grace_secs() -> u64 {
    24 * 60 * 60
}

fn default_log_level() -> String {
    crate::logging::default_log_level().to_string()
}
