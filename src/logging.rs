//! Logging configuration
//!
//! Structured logging with tracing. Logs go to stderr so stdout carries
//! nothing but the per-rotation report lines.

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Initialize logging with environment-based filtering
///
/// `RUST_LOG` wins when set; otherwise `torrotate=info`, or debug when
/// `verbose` is on.
pub fn init(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("torrotate={}", level)));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
