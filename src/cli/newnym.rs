//! One-shot identity rotation

use crate::config::Config;
use crate::tor::{Signal, TorController};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Connect, send one NEWNYM, and close
pub async fn run_newnym(config: &Config) -> Result<()> {
    let mut tor = TorController::connect(&config.tor).await?;

    match tor.is_bootstrapped().await {
        Ok(true) => info!("Tor is fully bootstrapped"),
        Ok(false) => warn!("Tor is still bootstrapping; new circuits may be slow"),
        Err(e) => warn!("Could not read bootstrap status: {}", e),
    }

    let result = tor
        .signal(Signal::Newnym)
        .await
        .context("Tor refused NEWNYM");

    if result.is_ok() {
        match tor.get_circuit_status().await {
            Ok(circuits) => info!("{} circuits open", circuits.lines().count()),
            Err(e) => warn!("Could not read circuit status: {}", e),
        }
        println!("New identity requested");
    }

    if let Err(e) = tor.quit().await {
        warn!("Error closing control connection: {}", e);
    }

    result
}
