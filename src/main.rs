//! # Usage
//!
//! ```bash
//! # Rotate forever with the stock setup (control port 9051, Privoxy on 8118)
//! torrotate
//!
//! # Ten rotations, one minute apart
//! torrotate run --count 10 --interval 60
//!
//! # One-off checks
//! torrotate check
//! torrotate newnym
//! ```

use anyhow::Result;
use torrotate::cli::{self, Commands, RunArgs};
use torrotate::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::parse();

    logging::init(cli.verbose);

    let config = cli.load_config()?;

    match cli.command.as_ref().unwrap_or(&Commands::Run(RunArgs::default())) {
        Commands::Run(_) => {
            cli::run_rotator(&config).await?;
        },
        Commands::Check => {
            cli::run_check(&config).await?;
        },
        Commands::Newnym => {
            cli::run_newnym(&config).await?;
        },
    }

    Ok(())
}
