//! Configuration loading and resolution
//!
//! Settings come from an optional `config.toml` and are then overridden by
//! command-line flags.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Address of the capture device's HTTP server
pub const DEFAULT_HOST: &str = "127.0.0.1:18327";

/// Path of the frame stream on the device
pub const STREAM_PATH: &str = "/frames.ws";

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// `address:port` of the capture device
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Full WebSocket URL, overrides the one derived from the host
    pub url: Option<String>,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

/// What to do after the frame stream drops
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ReconnectPolicy {
    /// Retry at once, forever
    #[default]
    Immediate,
    /// Retry with exponentially growing pauses between failed attempts
    Backoff {
        #[serde(default = "default_backoff_initial")]
        initial_ms: u64,
        #[serde(default = "default_backoff_max")]
        max_ms: u64,
    },
}

fn default_backoff_initial() -> u64 {
    100
}

fn default_backoff_max() -> u64 {
    5000
}

impl ReconnectPolicy {
    /// Pause before the next attempt, given consecutive failed attempts
    pub fn delay(&self, failures: u32) -> Duration {
        match self {
            ReconnectPolicy::Immediate => Duration::ZERO,
            ReconnectPolicy::Backoff { initial_ms, max_ms } => {
                if failures == 0 {
                    return Duration::ZERO;
                }
                let factor = 1u64.checked_shl(failures - 1).unwrap_or(u64::MAX);
                Duration::from_millis(initial_ms.saturating_mul(factor).min(*max_ms))
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the filter API, overrides the one derived from the host
    pub base_url: Option<String>,
    /// Per-request timeout; requests wait indefinitely when unset
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default = "default_refresh")]
    pub refresh_ms: u64,
    #[serde(default = "default_true")]
    pub show_status: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh(),
            show_status: true,
        }
    }
}

fn default_refresh() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub stream_url: Option<String>,
    pub api_url: Option<String>,
    pub refresh_ms: Option<u64>,
}

/// Fully resolved runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub stream_url: Url,
    pub api_base: Url,
    pub reconnect: ReconnectPolicy,
    pub request_timeout: Option<Duration>,
    pub refresh: Duration,
    pub show_status: bool,
}

impl Settings {
    /// Merge file configuration and command-line overrides
    pub fn resolve(config: &AppConfig, overrides: &Overrides) -> Result<Self> {
        let host = overrides
            .host
            .as_deref()
            .or(config.device.host.as_deref())
            .unwrap_or(DEFAULT_HOST);

        let stream_url = match overrides.stream_url.as_ref().or(config.stream.url.as_ref()) {
            Some(url) => url.clone(),
            None => format!("ws://{}{}", host, STREAM_PATH),
        };
        let stream_url = parse_url(&stream_url, &["ws"])
            .with_context(|| format!("Invalid stream URL: {}", stream_url))?;

        let api_base = match overrides.api_url.as_ref().or(config.api.base_url.as_ref()) {
            Some(url) => url.clone(),
            None => format!("http://{}", host),
        };
        let api_base = parse_url(&api_base, &["http", "https"])
            .with_context(|| format!("Invalid API URL: {}", api_base))?;

        let refresh_ms = overrides.refresh_ms.unwrap_or(config.display.refresh_ms);
        if refresh_ms == 0 {
            bail!("Refresh interval must be greater than 0 ms");
        }

        Ok(Self {
            stream_url,
            api_base,
            reconnect: config.stream.reconnect.clone(),
            request_timeout: config.api.request_timeout_ms.map(Duration::from_millis),
            refresh: Duration::from_millis(refresh_ms),
            show_status: config.display.show_status,
        })
    }
}

fn parse_url(text: &str, schemes: &[&str]) -> Result<Url> {
    let url = Url::parse(text)?;
    if !schemes.contains(&url.scheme()) {
        bail!("scheme must be one of {:?}, got {:?}", schemes, url.scheme());
    }
    Ok(url)
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
