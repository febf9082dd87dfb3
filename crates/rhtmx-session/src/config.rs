// File: src/config.rs
// Purpose: Session configuration parsing from rhtmx.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Layout of `rhtmx.toml` as far as sessions are concerned
///
/// Other tables in the file are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    session: SessionConfig,
}

/// Session bootstrap settings (`[session]` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Language used when the client sends no usable preference
    #[serde(default = "default_language")]
    pub default_language: String,

    /// strftime format used when the client's format fails validation
    #[serde(default = "default_date_format")]
    pub default_date_format: String,

    /// Guard redirects one navigation may follow
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// `on_session_start` hooks slower than this are reported
    #[serde(default = "default_start_warning_secs")]
    pub start_warning_secs: u64,

    /// Fallback filter for `logging::init` when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default values
fn default_language() -> String {
    "en-US".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_max_redirects() -> usize {
    rhtmx_router::DEFAULT_MAX_REDIRECTS
}

fn default_start_warning_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            default_date_format: default_date_format(),
            max_redirects: default_max_redirects(),
            start_warning_secs: default_start_warning_secs(),
            log_level: default_log_level(),
        }
    }
}

impl SessionConfig {
    pub fn start_warning_threshold(&self) -> Duration {
        Duration::from_secs(self.start_warning_secs)
    }

    /// Load the `[session]` table from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Missing file means defaults
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load configuration from default path (./rhtmx.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("rhtmx.toml")
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.session)
    }
}
