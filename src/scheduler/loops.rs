//! The rotation loop
//!
//! rotate -> settle -> check -> report -> wait, until told to stop.

use crate::config::ScheduleConfig;
use crate::egress::{report_line, EgressProbe};
use crate::tor::CircuitControl;
use crate::util::{rand::jitter, time::format_duration};
use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Timing for the rotation loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Wait between NEWNYM and the IP check
    pub settle: Duration,
    /// Wait between the report and the next NEWNYM
    pub interval: Duration,
    pub interval_jitter_secs: u64,
    /// `None` runs until stopped
    pub max_rotations: Option<u64>,
}

impl From<&ScheduleConfig> for Schedule {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            settle: config.settle(),
            interval: config.interval(),
            interval_jitter_secs: config.interval_jitter_secs,
            max_rotations: config.max_rotations,
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::from(&ScheduleConfig::default())
    }
}

/// What happened while the loop ran
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// NEWNYM requests sent
    pub rotations: u64,
    pub successes: u64,
    pub failures: u64,
    /// NEWNYM requests Tor refused
    pub rejected_signals: u64,
}

/// Run the rotation loop
///
/// Returns when `shutdown` flips to `true` or `max_rotations` is reached.
/// A stop request also abandons an IP check that is still in flight.
/// Failed IP checks are reported and the loop carries on. A NEWNYM that
/// Tor refuses skips that iteration's check; losing the control
/// connection ends the loop with an error.
pub async fn run<C, P, W>(
    control: &mut C,
    probe: &P,
    schedule: &Schedule,
    out: &mut W,
    mut shutdown: watch::Receiver<bool>,
) -> Result<RunSummary>
where
    C: CircuitControl,
    P: EgressProbe,
    W: Write,
{
    let mut summary = RunSummary::default();

    info!(
        "Rotating circuits: settle {}, interval {}{}",
        format_duration(schedule.settle),
        format_duration(schedule.interval),
        match schedule.max_rotations {
            Some(max) => format!(", {} rotations", max),
            None => String::new(),
        }
    );

    loop {
        if *shutdown.borrow() || bound_reached(schedule, &summary) {
            break;
        }

        summary.rotations += 1;
        debug!("Rotation {}: requesting new identity", summary.rotations);

        match control.new_identity().await {
            Ok(()) => {},
            Err(e) if e.is_rejection() => {
                summary.rejected_signals += 1;
                warn!("Tor refused NEWNYM, skipping IP check: {}", e);
                if bound_reached(schedule, &summary) {
                    break;
                }
                if !pause(next_interval(schedule), &mut shutdown).await {
                    break;
                }
                continue;
            },
            Err(e) => return Err(e).context("Failed to request a new Tor circuit"),
        }

        debug!("Waiting {} for the circuit", format_duration(schedule.settle));
        if !pause(schedule.settle, &mut shutdown).await {
            break;
        }

        let result = tokio::select! {
            result = probe.egress_ip() => result,
            _ = stop_requested(&mut shutdown) => break,
        };
        match &result {
            Ok(ip) => {
                summary.successes += 1;
                debug!("Egress check succeeded: {}", ip);
            },
            Err(e) => {
                summary.failures += 1;
                warn!("Egress check failed: {}", e);
            },
        }

        writeln!(out, "{}", report_line(&result)).context("Failed to write report")?;
        out.flush().context("Failed to write report")?;

        if bound_reached(schedule, &summary) {
            break;
        }

        if !pause(next_interval(schedule), &mut shutdown).await {
            break;
        }
    }

    info!(
        "Stopped after {} rotations ({} ok, {} failed, {} refused)",
        summary.rotations, summary.successes, summary.failures, summary.rejected_signals
    );
    Ok(summary)
}

fn bound_reached(schedule: &Schedule, summary: &RunSummary) -> bool {
    schedule
        .max_rotations
        .is_some_and(|max| summary.rotations >= max)
}

fn next_interval(schedule: &Schedule) -> Duration {
    jitter(schedule.interval, schedule.interval_jitter_secs)
}

/// Sleep for `duration`; false if a stop was requested first
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = stop_requested(shutdown) => false,
    }
}

async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender can never ask us to stop
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
