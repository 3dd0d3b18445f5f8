//! Rotation daemon

use crate::config::Config;
use crate::egress::IpChecker;
use crate::scheduler::{self, RunSummary, Schedule};
use crate::tor::TorController;
use anyhow::Result;
use tracing::{info, warn};

/// Authenticate once, then rotate until stopped
///
/// Authentication failure aborts before anything is printed. The control
/// connection is closed with QUIT on every return path out of the loop.
pub async fn run_rotator(config: &Config) -> Result<RunSummary> {
    info!("torrotate v{} starting", env!("CARGO_PKG_VERSION"));

    let checker = IpChecker::new(&config.check, &config.proxy)?;
    let mut tor = TorController::connect(&config.tor).await?;

    let schedule = Schedule::from(&config.schedule);
    let shutdown = scheduler::stop_on_ctrl_c();
    let mut stdout = std::io::stdout();

    let result = scheduler::run(&mut tor, &checker, &schedule, &mut stdout, shutdown).await;

    if let Err(e) = tor.quit().await {
        warn!("Error closing control connection: {}", e);
    }

    result
}
