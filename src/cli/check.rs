//! One-shot egress check

use crate::config::Config;
use crate::egress::{report_value, IpChecker};
use anyhow::{bail, Result};

/// Print the current egress IP; fails if the check fails
pub async fn run_check(config: &Config) -> Result<String> {
    let checker = IpChecker::new(&config.check, &config.proxy)?;
    let result = checker.check().await;

    println!("Current Tor IP: {}", report_value(&result));

    match result {
        Ok(ip) => Ok(ip),
        Err(e) => bail!("Egress check via {} failed: {}", checker.url(), e),
    }
}
