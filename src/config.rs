//! Configuration loading from TOML files and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the VeSync account e-mail.
pub const EMAIL_ENV: &str = "VESYNC_EMAIL";
/// Environment variable holding the VeSync account password.
pub const PASSWORD_ENV: &str = "VESYNC_PASSWORD";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub vesync: VeSyncConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Busy detection and polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds to sleep between polling cycles.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    /// New keypresses per polling cycle required to be considered busy.
    #[serde(default = "default_min_new_keypress_count")]
    pub min_new_keypress_count: u64,
    /// Process whose presence marks the user as busy. Empty disables the check.
    #[serde(default = "default_process_name")]
    pub process_name: String,
    /// Upper bound for a single light switch call, in seconds.
    #[serde(default = "default_actuator_timeout_seconds")]
    pub actuator_timeout_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval_seconds(),
            min_new_keypress_count: default_min_new_keypress_count(),
            process_name: default_process_name(),
            actuator_timeout_seconds: default_actuator_timeout_seconds(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn actuator_timeout(&self) -> Duration {
        Duration::from_secs(self.actuator_timeout_seconds)
    }
}

/// VeSync cloud configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VeSyncConfig {
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Time zone reported to the API.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// Display name of the outlet to switch. The first outlet is used when unset.
    #[serde(default)]
    pub outlet_name: Option<String>,
}

impl Default for VeSyncConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            time_zone: default_time_zone(),
            outlet_name: None,
        }
    }
}

/// Control surface configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Which control surface to run on the main thread.
    #[serde(default)]
    pub surface: SurfaceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    /// Status bar menu (macOS only).
    Menu,
    /// Line commands on stdin.
    Console,
    /// No control surface; stop with Ctrl-C or SIGINT.
    Headless,
}

impl Default for SurfaceKind {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            SurfaceKind::Menu
        } else {
            SurfaceKind::Console
        }
    }
}

impl std::str::FromStr for SurfaceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "menu" => Ok(SurfaceKind::Menu),
            "console" => Ok(SurfaceKind::Console),
            "headless" | "none" => Ok(SurfaceKind::Headless),
            other => anyhow::bail!("Unknown control surface: {}", other),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

// Default value functions
fn default_poll_interval_seconds() -> u64 {
    10
}

fn default_min_new_keypress_count() -> u64 {
    40
}

fn default_process_name() -> String {
    "zoom.us".to_string()
}

fn default_actuator_timeout_seconds() -> u64 {
    30
}

fn default_base_url() -> String {
    "https://smartapi.vesync.com".to_string()
}

fn default_time_zone() -> String {
    "America/New_York".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            let default_paths = [
                PathBuf::from("config/default.toml"),
                dirs::config_dir()
                    .map(|d| d.join("busylight/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.is_file() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BUSYLIGHT_POLL_INTERVAL").and_then(|v| v.parse().ok()) {
            self.monitor.poll_interval_seconds = v;
        }
        if let Some(v) = lookup("BUSYLIGHT_KEYPRESS_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.monitor.min_new_keypress_count = v;
        }
        if let Some(val) = lookup("BUSYLIGHT_PROCESS_NAME") {
            self.monitor.process_name = val;
        }
        if let Some(v) = lookup("BUSYLIGHT_ACTUATOR_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.monitor.actuator_timeout_seconds = v;
        }
        if let Some(val) = lookup("BUSYLIGHT_VESYNC_URL") {
            self.vesync.base_url = val;
        }
        if let Some(val) = lookup("BUSYLIGHT_OUTLET_NAME") {
            self.vesync.outlet_name = Some(val).filter(|v| !v.is_empty());
        }
        if let Some(v) = lookup("BUSYLIGHT_CONTROL_SURFACE").and_then(|v| v.parse().ok()) {
            self.control.surface = v;
        }
        if let Some(val) = lookup("BUSYLIGHT_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("BUSYLIGHT_LOG_FORMAT") {
            match val.to_ascii_lowercase().as_str() {
                "json" => self.logging.format = LogFormat::Json,
                "text" => self.logging.format = LogFormat::Text,
                _ => {}
            }
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.poll_interval_seconds == 0 {
            anyhow::bail!("Poll interval must be greater than 0");
        }
        if self.monitor.min_new_keypress_count == 0 {
            anyhow::bail!("Keypress threshold must be greater than 0");
        }
        if self.monitor.actuator_timeout_seconds == 0 {
            anyhow::bail!("Actuator timeout must be greater than 0");
        }
        if self.vesync.base_url.trim().is_empty() {
            anyhow::bail!("VeSync base URL cannot be empty");
        }
        Ok(())
    }
}

/// VeSync account credentials.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Read credentials from `VESYNC_EMAIL` and `VESYNC_PASSWORD`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} is not set; export it before starting", key))
        };

        Ok(Self {
            email: read(EMAIL_ENV)?,
            password: read(PASSWORD_ENV)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
