//! Task scheduling and main loop
//!
//! Drives the rotation loop and owns the stop signal.
//! All tokio::spawn calls live here.

mod loops;

pub use loops::{run, RunSummary, Schedule};

use tokio::sync::watch;
use tracing::{info, warn};

/// Stop channel that flips to `true` on Ctrl-C
pub fn stop_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping");
                let _ = tx.send(true);
            },
            Err(e) => {
                warn!("Cannot listen for Ctrl-C, kill the process to stop: {}", e);
            },
        }
    });

    rx
}
