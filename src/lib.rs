//! torrotate library crate
//!
//! Rotates Tor circuits on a timer and reports the egress IP seen
//! through a local HTTP proxy such as Privoxy.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface (run, check, newnym)
//! - [`config`] - Configuration loading and validation
//! - [`tor`] - Tor control port client
//! - [`egress`] - IP check through the proxy and report lines
//! - [`scheduler`] - The rotation loop and its stop signal
//! - [`util`] - Time formatting, jitter

#![allow(async_fn_in_trait)] // Static dispatch only
#![allow(clippy::doc_markdown)] // Doc formatting is secondary
#![allow(clippy::uninlined_format_args)] // Format string style preference
#![allow(clippy::module_name_repetitions)] // ControlError in tor::control reads fine

pub mod cli;
pub mod config;
pub mod egress;
pub mod logging;
pub mod scheduler;
pub mod tor;
pub mod util;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
