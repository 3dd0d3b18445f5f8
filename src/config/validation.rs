//! Configuration validation
//!
//! Fail-fast validation of configuration invariants.

use super::Config;
use anyhow::{bail, Context, Result};
use reqwest::Url;

/// Validate configuration invariants
pub fn validate(config: &Config) -> Result<()> {
    validate_tor(config)?;
    validate_proxy(config)?;
    validate_check(config)?;
    validate_schedule(config)?;
    Ok(())
}

fn validate_tor(config: &Config) -> Result<()> {
    if config.tor.control_host.is_empty() {
        bail!("tor.control_host cannot be empty");
    }
    if config.tor.control_port == 0 {
        bail!("tor.control_port cannot be 0");
    }
    if config.tor.reply_timeout_secs == 0 {
        bail!("tor.reply_timeout_secs must be at least 1");
    }
    Ok(())
}

fn validate_proxy(config: &Config) -> Result<()> {
    for (name, url) in [("proxy.http", &config.proxy.http), ("proxy.https", &config.proxy.https)] {
        validate_url(name, url, &["http", "https"])?;
    }
    Ok(())
}

fn validate_check(config: &Config) -> Result<()> {
    validate_url("check.url", &config.check.url, &["http", "https"])?;
    if config.check.timeout_secs == 0 {
        bail!("check.timeout_secs must be at least 1");
    }
    Ok(())
}

fn validate_schedule(config: &Config) -> Result<()> {
    if config.schedule.max_rotations == Some(0) {
        bail!("schedule.max_rotations must be at least 1 when set");
    }
    Ok(())
}

fn validate_url(name: &str, url: &str, schemes: &[&str]) -> Result<()> {
    if url.is_empty() {
        bail!("{} cannot be empty", name);
    }
    let parsed =
        Url::parse(url).with_context(|| format!("{} is not a valid URL: {}", name, url))?;
    if !schemes.contains(&parsed.scheme()) {
        bail!(
            "{} has unsupported scheme '{}' (use one of {:?})",
            name,
            parsed.scheme(),
            schemes
        );
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        bail!("{} is missing a host: {}", name, url);
    }
    Ok(())
}
