use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::admin::{AliveOptions, NetperfResult};
use crate::cli::output::{write_netperf, write_netperf_error, JsonPresenter, TextPresenter};
use crate::core::Core;
use crate::probe::{
    run_netperf, PingOptions, Presenter, ProbeError, ProbeSession, ShutdownSignal, StopReason,
    TerminationPolicy,
};

/// Flags shared by every command
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalFlags {
    pub insecure: bool,
    pub debug: bool,
    pub json: bool,
}

/// Ping command arguments
#[derive(Debug, Clone)]
pub struct CmdPing {
    pub target: String,
    pub count: Option<u64>,
    pub error_count: Option<u32>,
    pub interval: Duration,
    pub distributed: bool,
}

impl CmdPing {
    pub fn options(&self) -> Result<PingOptions> {
        let policy = TerminationPolicy::new(self.count, self.error_count)
            .with_context(|| format!("invalid arguments for `{}`", self.target))?;
        Ok(PingOptions {
            interval: self.interval,
            distributed: self.distributed,
            policy,
            alive: AliveOptions::default(),
        })
    }
}

/// Ping command
///
/// Runs until the round count or error ceiling is reached, or until Ctrl-C.
/// Every one of those is a clean exit; only setup failures are errors.
pub async fn cmd_ping(core: &Core, cmd: &CmdPing, flags: GlobalFlags, shutdown: ShutdownSignal) -> Result<()> {
    let options = cmd.options()?;
    let client = core.admin_client(&cmd.target, flags.insecure, flags.debug)?;
    let session = ProbeSession::new(client.as_ref(), options, shutdown);

    let stdout = std::io::stdout();
    let outcome = if flags.json {
        run_session(&session, &mut JsonPresenter::new(stdout.lock())).await
    } else {
        run_session(&session, &mut TextPresenter::new(stdout.lock())).await
    };
    let outcome = match outcome {
        Ok(reason) => reason,
        Err(ProbeError::TopologyCancelled { endpoint }) => {
            debug!(%endpoint, "interrupted before the first round");
            StopReason::Cancelled
        }
        Err(e) => return Err(e).with_context(|| format!("unable to ping `{}`", cmd.target)),
    };

    match outcome {
        StopReason::Cancelled => {
            info!("ping interrupted");
            Ok(())
        }
        StopReason::ErrorCeiling { endpoint, errors } => {
            warn!(%endpoint, errors, "ping stopped after consecutive errors");
            Ok(())
        }
        StopReason::CountReached { rounds } => {
            info!(rounds, "ping finished");
            Ok(())
        }
    }
}

async fn run_session<A, P>(session: &ProbeSession<'_, A>, presenter: &mut P) -> Result<StopReason, ProbeError>
where
    A: crate::admin::AdminApi,
    P: Presenter,
{
    let outcome = session.run(presenter).await?;
    Ok(outcome.reason)
}

/// Netperf command
///
/// A test the cluster could not complete is reported as the final message and
/// exits cleanly. An invalid duration or Ctrl-C produces no output and fails.
pub async fn cmd_netperf(
    core: &Core,
    target: &str,
    duration: Duration,
    flags: GlobalFlags,
    shutdown: ShutdownSignal,
) -> Result<()> {
    let client = core.admin_client(target, flags.insecure, flags.debug)?;

    let spinner = if flags.json {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {msg}")?);
        pb.set_message(format!("Running network test against {} for {}", target, humantime::format_duration(duration)));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    };

    let result = run_netperf(client.as_ref(), duration, &shutdown).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let mut stdout = std::io::stdout().lock();
    report_netperf(&mut stdout, target, result, flags.json)
}

fn report_netperf<W: Write>(
    out: &mut W,
    target: &str,
    outcome: Result<NetperfResult, ProbeError>,
    json: bool,
) -> Result<()> {
    match outcome {
        Ok(result) => write_netperf(out, &result, json).context("unable to write netperf result"),
        Err(err @ ProbeError::Netperf { .. }) => {
            let message = format!("{:#}", anyhow::Error::new(err));
            warn!(alias = %target, error = %message, "network test failed");
            write_netperf_error(out, &message, json).context("unable to write netperf result")
        }
        Err(err) => Err(err).with_context(|| format!("unable to run netperf on `{}`", target)),
    }
}
