//! Command-line interface for torrotate
//!
//! Provides commands:
//! - `run` - Rotate circuits and report the egress IP (default)
//! - `check` - Report the current egress IP once
//! - `newnym` - Request one new identity and exit

mod check;
mod newnym;
mod run;

pub use check::run_check;
pub use newnym::run_newnym;
pub use run::run_rotator;

use crate::config::{self, Config, ProxyConfig};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// torrotate - Rotate Tor circuits and watch the exit IP change
#[derive(Parser, Debug)]
#[command(name = "torrotate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Tor control port (overrides config)
    #[arg(long, global = true)]
    pub control_port: Option<u16>,

    /// Proxy URL for both http and https (overrides config)
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rotate circuits on a timer and report the egress IP
    Run(RunArgs),

    /// Report the current egress IP once, without rotating
    Check,

    /// Request a new identity once and exit
    Newnym,
}

/// Arguments for run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Stop after this many rotations
    #[arg(long)]
    pub count: Option<u64>,

    /// Seconds to wait after NEWNYM before checking
    #[arg(long)]
    pub settle: Option<u64>,

    /// Seconds to wait between rotations
    #[arg(long)]
    pub interval: Option<u64>,
}

impl Cli {
    /// Load the config file (or defaults) and apply command-line overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut config = config::load_config(self.config.as_deref())?;
        self.apply_overrides(&mut config);
        config::validate(&config)?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(port) = self.control_port {
            config.tor.control_port = port;
        }
        if let Some(proxy) = &self.proxy {
            config.proxy = ProxyConfig::single(proxy.clone());
        }
        if let Some(Commands::Run(args)) = &self.command {
            if let Some(count) = args.count {
                config.schedule.max_rotations = Some(count);
            }
            if let Some(settle) = args.settle {
                config.schedule.settle_secs = settle;
            }
            if let Some(interval) = args.interval {
                config.schedule.interval_secs = interval;
            }
        }
    }
}

/// Parse command line arguments
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["torrotate"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "torrotate",
            "--control-port",
            "9151",
            "--proxy",
            "http://127.0.0.1:3128",
            "run",
            "--count",
            "4",
            "--interval",
            "30",
        ])
        .unwrap();

        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.tor.control_port, 9151);
        assert_eq!(config.proxy.http, "http://127.0.0.1:3128");
        assert_eq!(config.proxy.https, "http://127.0.0.1:3128");
        assert_eq!(config.schedule.max_rotations, Some(4));
        assert_eq!(config.schedule.interval_secs, 30);
        assert_eq!(config.schedule.settle_secs, 3);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["torrotate", "check", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Check)));
    }
}
