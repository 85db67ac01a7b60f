// Configuration constants and settings for the S.I. Multi-Tool
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{MultiToolError, Result};

// Sentinels and placeholders
pub const NOT_AVAILABLE: &str = "N/A";
pub const COULD_NOT_OPEN_TEXT: &str = "could not open";
pub const NO_SYSTEM_TEXT: &str = "no system found in file name";
pub const NO_OVERSIZED_SENTINEL: &str = "NO OVERSIZED PDF FILES";

// Size policy
pub const SPLIT_THRESHOLD_KB: f64 = 1400.0;
pub const PAGES_PER_PART: usize = 5;
pub const MIN_SAVINGS_BYTES: u64 = 1024;

// Retry policy
pub const RETRY_MAX_ATTEMPTS: u32 = 3;
pub const RETRY_BACKOFF_MS: u64 = 1000;

pub const DOCUMENT_EXTENSION: &str = "pdf";
pub const HIGHLIGHT_REPORT_NAME: &str = "Extracted Highlights.csv";
pub const OVERSIZED_REPORT_NAME: &str = "oversized_files_report.csv";

pub const CONFIG_ENV_VAR: &str = "SI_MULTITOOL_CONFIG";

/// How identity fields are read from a document path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataPolicy {
    /// Structural when the path is deep enough, pattern otherwise.
    #[default]
    Auto,
    Structural,
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SizeSettings {
    #[serde(default = "default_split_threshold_kb")]
    pub split_threshold_kb: f64,
    #[serde(default = "default_pages_per_part")]
    pub pages_per_part: usize,
    #[serde(default = "default_min_savings_bytes")]
    pub min_savings_bytes: u64,
}

impl Default for SizeSettings {
    fn default() -> Self {
        Self {
            split_threshold_kb: default_split_threshold_kb(),
            pages_per_part: default_pages_per_part(),
            min_savings_bytes: default_min_savings_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetrySettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportSettings {
    #[serde(default = "default_highlight_report")]
    pub highlight_file: String,
    #[serde(default = "default_oversized_report")]
    pub oversized_file: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            highlight_file: default_highlight_report(),
            oversized_file: default_oversized_report(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MetadataSettings {
    #[serde(default)]
    pub policy: MetadataPolicy,
}

/// Everything a pass needs to know, loadable from TOML.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub size: SizeSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub reports: ReportSettings,
    #[serde(default)]
    pub metadata: MetadataSettings,
}

fn default_split_threshold_kb() -> f64 { SPLIT_THRESHOLD_KB }
fn default_pages_per_part() -> usize { PAGES_PER_PART }
fn default_min_savings_bytes() -> u64 { MIN_SAVINGS_BYTES }
fn default_max_attempts() -> u32 { RETRY_MAX_ATTEMPTS }
fn default_backoff_ms() -> u64 { RETRY_BACKOFF_MS }
fn default_highlight_report() -> String { HIGHLIGHT_REPORT_NAME.to_string() }
fn default_oversized_report() -> String { OVERSIZED_REPORT_NAME.to_string() }

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| MultiToolError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MultiToolError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Explicit path, then `$SI_MULTITOOL_CONFIG`, then the user config
    /// file if one exists, then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::load_from(Path::new(&path));
        }
        match user_config_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.size.pages_per_part == 0 {
            return Err(MultiToolError::Config("pages_per_part must be at least 1".into()));
        }
        if !(self.size.split_threshold_kb > 0.0) {
            return Err(MultiToolError::Config("split_threshold_kb must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(MultiToolError::Config("max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| MultiToolError::Config(e.to_string()))
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("si-multitool").join("config.toml"))
}
