//! CLI module for s3probe
//!
//! Cluster health commands built on the admin API, with text and JSON output.
//!
//! # Usage
//!
//! ```bash
//! # Probe one endpoint five times
//! s3probe ping myminio --count 5
//!
//! # Probe every node, stop after three consecutive failures on any of them
//! s3probe ping myminio --distributed --error-count 3 --interval 500ms
//!
//! # Network throughput between nodes, JSON output
//! s3probe --json netperf myminio --duration 20s
//! ```

pub mod args;
pub mod commands;
pub mod output;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config;
use crate::core::Core;
use crate::probe::ShutdownSignal;
use args::{Cli, Commands};
use commands::{cmd_netperf, cmd_ping, CmdPing, GlobalFlags};

/// Run one parsed command to completion
pub async fn run(cli: Cli, shutdown: ShutdownSignal) -> Result<()> {
    debug!("CLI arguments: {:?}", cli);

    let config = config::load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let core = Core::new(config);
    let flags = GlobalFlags {
        insecure: cli.insecure,
        debug: cli.debug,
        json: cli.json,
    };

    match cli.command {
        Commands::Ping {
            target,
            count,
            error_count,
            interval,
            distributed,
        } => {
            let cmd = CmdPing {
                target,
                count,
                error_count,
                interval,
                distributed,
            };
            cmd_ping(&core, &cmd, flags, shutdown).await
        }

        Commands::Netperf { target, duration } => {
            cmd_netperf(&core, &target, duration, flags, shutdown).await
        }
    }
}

/// Initialize logging: RUST_LOG wins, then `--debug`, then `--log-level`
pub fn init_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_filter()))
        .context("Invalid log level")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(cli.debug))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}
