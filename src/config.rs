//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `waterlog.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - SourceConfig: Where the device log lives on the remote store.
//!     - PollingConfig: How often the store is read.
//!     - DashboardConfig: How many rows to show, page auto-refresh.
//!     - ServerConfig: Where the dashboard listens.
//!     - LoggingConfig: Log level and per-row logging.
//!
//! every section has defaults, so a file only needs the keys it changes.
//!
//! ==============================================================================

use crate::domain::DEFAULT_MAX_ROWS;

use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WaterlogConfig {
    pub source: SourceConfig,
    pub polling: PollingConfig,
    pub dashboard: DashboardConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    /// database root, e.g. https://<project>.firebaseio.com
    pub base_url: String,
    pub collection: String,
    pub device_id: String,
    /// per-request timeout; 0 leaves the transport default (none).
    /// deactivation never waits on a request, so 0 is safe.
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub max_rows: usize,
    /// browser meta refresh; 0 disables it
    pub page_refresh_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hallo-esp-default-rtdb.firebaseio.com".to_string(),
            collection: "sensorLogs".to_string(),
            device_id: "device1".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 10_000 }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            page_refresh_seconds: 10,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: false,
        }
    }
}

impl SourceConfig {
    /// full resource locator of the device log collection
    pub fn resource_url(&self) -> String {
        format!(
            "{}/{}/{}.json",
            self.base_url.trim_end_matches('/'),
            self.collection.trim_matches('/'),
            self.device_id
        )
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        let secs = self.request_timeout_seconds;
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl WaterlogConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: WaterlogConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load with default fallback.
    ///
    /// runs before the log subscriber exists, so it prints directly.
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("waterlog.toml"),
            PathBuf::from("..").join("config").join("waterlog.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {:#}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// reject values the poller cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.polling.interval_ms == 0 {
            bail!("polling.interval_ms must be greater than zero");
        }
        if self.dashboard.max_rows == 0 {
            bail!("dashboard.max_rows must be greater than zero");
        }
        let base_url = &self.source.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            bail!("source.base_url must be an http(s) URL, got `{}`", base_url);
        }
        if self.source.device_id.is_empty() {
            bail!("source.device_id must not be empty");
        }
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│         WATERLOG CONFIGURATION          │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Source: {}", self.source.resource_url());
        println!("│ Poll Interval: {}ms", self.polling.interval_ms);
        println!("│ Rows Shown: {}", self.dashboard.max_rows);
        println!("│ Dashboard: http://{}", self.server.bind_addr);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
