//! Configuration loading and validation
//!
//! Handles TOML configuration parsing with strict validation.
//! Every field has a default, so running without a file reproduces the
//! stock setup: control port 9051, Privoxy on 8118, httpbin as checker.

pub mod file;
mod validation;

pub use file::{load_config, load_from_path};
pub use validation::validate;

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tor: TorConfig,
    pub proxy: ProxyConfig,
    pub check: CheckConfig,
    pub schedule: ScheduleConfig,
}

/// Tor daemon connection
#[derive(Debug, Clone, Deserialize)]
pub struct TorConfig {
    #[serde(default = "default_control_host")]
    pub control_host: String,
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    /// Plain-text password matching Tor's HashedControlPassword
    pub control_password: Option<String>,
    /// Cookie file to try when PROTOCOLINFO does not name one
    pub cookie_path: Option<PathBuf>,
    /// Seconds to wait for a control reply
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_secs: u64,
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            control_host: default_control_host(),
            control_port: default_control_port(),
            control_password: None,
            cookie_path: None,
            reply_timeout_secs: default_reply_timeout(),
        }
    }
}

impl TorConfig {
    /// `host:port` of the control listener
    pub fn control_addr(&self) -> String {
        if self.control_host.contains(':') && !self.control_host.starts_with('[') {
            format!("[{}]:{}", self.control_host, self.control_port)
        } else {
            format!("{}:{}", self.control_host, self.control_port)
        }
    }
}

fn default_control_host() -> String {
    "127.0.0.1".to_string()
}
fn default_control_port() -> u16 {
    9051
}
fn default_reply_timeout() -> u64 {
    30
}

/// Scheme to proxy mapping. Both entries point at Privoxy by default.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_url")]
    pub http: String,
    #[serde(default = "default_proxy_url")]
    pub https: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            http: default_proxy_url(),
            https: default_proxy_url(),
        }
    }
}

impl ProxyConfig {
    /// Same proxy for both schemes
    pub fn single(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            http: url.clone(),
            https: url,
        }
    }
}

fn default_proxy_url() -> String {
    "http://localhost:8118".to_string()
}

/// IP-check endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    /// Endpoint answering with `{"origin": "<ip>"}`
    #[serde(default = "default_check_url")]
    pub url: String,
    /// Whole-request timeout
    #[serde(default = "default_check_timeout")]
    pub timeout_secs: u64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            url: default_check_url(),
            timeout_secs: default_check_timeout(),
        }
    }
}

fn default_check_url() -> String {
    "http://httpbin.org/ip".to_string()
}
fn default_check_timeout() -> u64 {
    30
}

/// Rotation timing
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Wait between NEWNYM and the IP check
    #[serde(default = "default_settle")]
    pub settle_secs: u64,
    /// Wait between the report and the next NEWNYM
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Random extra wait added to the interval, upper bound
    #[serde(default)]
    pub interval_jitter_secs: u64,
    /// Stop after this many rotations (unbounded when unset)
    pub max_rotations: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            settle_secs: default_settle(),
            interval_secs: default_interval(),
            interval_jitter_secs: 0,
            max_rotations: None,
        }
    }
}

impl ScheduleConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_settle() -> u64 {
    3
}
fn default_interval() -> u64 {
    7
}
