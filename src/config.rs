//! Configuration for Appraise
//!
//! TOML file, by default `<config dir>/appraise/config.toml`:
//!
//! ```toml
//! [storage]
//! path = "/var/lib/appraise/appraise.db"
//! records_key = "interviews"
//! draft_key = "interviewDraft"
//!
//! [autosave]
//! debounce_ms = 1000
//!
//! [dashboard]
//! refresh_interval_secs = 30
//!
//! [session]
//! ttl_hours = 4
//! ```
//!
//! Every section and field is optional; missing values take the defaults.

use crate::error::{AppraiseError, Result};
use crate::storage::{DRAFT_KEY, RECORDS_KEY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppraiseConfig {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub autosave: AutosaveSettings,

    #[serde(default)]
    pub dashboard: DashboardSettings,

    #[serde(default)]
    pub session: SessionSettings,
}

/// Where and under which keys data is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Database file; `None` uses the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_records_key")]
    pub records_key: String,

    #[serde(default = "default_draft_key")]
    pub draft_key: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: None,
            records_key: default_records_key(),
            draft_key: default_draft_key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutosaveSettings {
    /// Quiet period before a draft is written
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSettings {
    /// Poll interval for picking up records written elsewhere
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
        }
    }
}

fn default_records_key() -> String {
    RECORDS_KEY.to_string()
}

fn default_draft_key() -> String {
    DRAFT_KEY.to_string()
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_ttl_hours() -> u64 {
    4
}

impl AppraiseConfig {
    /// Load configuration from file, or defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Config file not found, using defaults: {:?}", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppraiseError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file: {}", e),
            ))
        })?;

        let config: AppraiseConfig = toml::from_str(&content)
            .map_err(|e| AppraiseError::Config(format!("Failed to parse config file: {}", e)))?;
        config.check()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppraiseError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppraiseError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create config directory: {}", e),
                ))
            })?;
        }

        std::fs::write(path, content)?;
        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    fn check(&self) -> Result<()> {
        if self.storage.records_key == self.storage.draft_key {
            return Err(AppraiseError::Config(
                "records_key and draft_key must differ".to_string(),
            ));
        }
        if self.dashboard.refresh_interval_secs == 0 {
            return Err(AppraiseError::Config(
                "refresh_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.autosave.debounce_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.dashboard.refresh_interval_secs)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session.ttl_hours as i64)
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("appraise")
            .join("config.toml")
    }

    /// Database file from config, or the platform data directory
    pub fn database_path(&self) -> PathBuf {
        self.storage.path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("appraise")
                .join("appraise.db")
        })
    }
}
