//! Probe session: rounds of liveness checks folded into running statistics

use super::endpoint::{Endpoint, ProbeResult};
use super::policy::{SessionState, StopReason, TerminationPolicy};
use super::shutdown::ShutdownSignal;
use super::snapshot::{EndpointSnapshot, RoundSnapshot};
use super::stats::{EndpointStats, StatsTable};
use super::ProbeError;
use crate::admin::{AdminApi, AliveOptions};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-attempt bound on the topology lookup
pub const TOPOLOGY_TIMEOUT: Duration = Duration::from_secs(3);

/// Pause between failed topology lookups
pub const TOPOLOGY_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Receives one snapshot per completed round
pub trait Presenter {
    fn present(&mut self, snapshot: &RoundSnapshot) -> std::io::Result<()>;
}

/// Knobs for a ping session
#[derive(Debug, Clone)]
pub struct PingOptions {
    /// Pause between rounds
    pub interval: Duration,
    /// Probe every node of the cluster instead of the target alone
    pub distributed: bool,
    pub policy: TerminationPolicy,
    pub alive: AliveOptions,
}

impl Default for PingOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            distributed: false,
            policy: TerminationPolicy::unbounded(),
            alive: AliveOptions::default(),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Snapshots emitted
    pub rounds: u64,
    pub reason: StopReason,
}

/// One endpoint's contribution to a round
#[derive(Debug)]
struct RoundEntry {
    position: usize,
    endpoint: Endpoint,
    stats: EndpointStats,
    roundtrip: Duration,
}

/// Drives probe rounds against one cluster until the policy or the shutdown
/// signal ends the session
pub struct ProbeSession<'a, A: AdminApi> {
    api: &'a A,
    options: PingOptions,
    shutdown: ShutdownSignal,
}

impl<'a, A: AdminApi> ProbeSession<'a, A> {
    pub fn new(api: &'a A, options: PingOptions, shutdown: ShutdownSignal) -> Self {
        Self {
            api,
            options,
            shutdown,
        }
    }

    /// Run rounds until a stop condition, handing each snapshot to `presenter`.
    ///
    /// A round that is in flight when the shutdown fires is drained and then
    /// dropped without a snapshot.
    pub async fn run<P: Presenter>(&self, presenter: &mut P) -> Result<SessionOutcome, ProbeError> {
        let targets = self.resolve_targets().await?;
        info!(
            endpoint = %self.api.endpoint(),
            targets = targets.len(),
            distributed = self.options.distributed,
            "probe session started"
        );

        let mut table = StatsTable::new();
        let mut round: u64 = 0;

        loop {
            if self.shutdown.is_cancelled() {
                return Ok(self.finish(round, StopReason::Cancelled));
            }

            let entries = self.probe_round(&targets, &mut table).await;
            if self.shutdown.is_cancelled() {
                debug!(round = round + 1, "discarding round interrupted by shutdown");
                return Ok(self.finish(round, StopReason::Cancelled));
            }

            round += 1;
            let snapshot = RoundSnapshot::new(
                round,
                entries
                    .iter()
                    .map(|e| EndpointSnapshot::new(e.endpoint.clone(), &e.stats, e.roundtrip))
                    .collect(),
            );
            presenter.present(&snapshot)?;

            let state = self
                .options
                .policy
                .evaluate(round, entries.iter().map(|e| (&e.endpoint, &e.stats)));
            if let SessionState::Stopped(reason) = state {
                return Ok(self.finish(round, reason));
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.interval) => {}
                _ = self.shutdown.cancelled() => {
                    return Ok(self.finish(round, StopReason::Cancelled));
                }
            }
        }
    }

    fn finish(&self, rounds: u64, reason: StopReason) -> SessionOutcome {
        info!(rounds, reason = %reason, "probe session finished");
        SessionOutcome { rounds, reason }
    }

    /// Issue one round and consume its stream to the end
    async fn probe_round(&self, targets: &[Endpoint], table: &mut StatsTable) -> Vec<RoundEntry> {
        let mut stream = self.api.alive(targets, &self.options.alive, &self.shutdown);
        let mut entries = Vec::with_capacity(targets.len());

        while let Some(result) = stream.recv().await {
            entries.push(Self::fold(targets, table, result));
        }

        // Stable output order regardless of which probe answered first.
        entries.sort_by_key(|e| e.position);
        entries
    }

    fn fold(targets: &[Endpoint], table: &mut StatsTable, result: ProbeResult) -> RoundEntry {
        let stats = table.record(&result).clone();
        if let Some(error) = &result.error {
            debug!(
                endpoint = %result.endpoint,
                consecutive_errors = stats.consecutive_errors,
                error = %error,
                "probe failed"
            );
        }
        RoundEntry {
            position: targets
                .iter()
                .position(|t| t == &result.endpoint)
                .unwrap_or(targets.len()),
            roundtrip: result.response_time,
            endpoint: result.endpoint,
            stats,
        }
    }

    async fn resolve_targets(&self) -> Result<Vec<Endpoint>, ProbeError> {
        let own = self.api.endpoint().clone();
        if !self.options.distributed {
            return Ok(vec![own]);
        }

        let info = self.fetch_topology().await?;
        let mut targets: Vec<Endpoint> = Vec::with_capacity(info.servers.len());
        for server in &info.servers {
            match Endpoint::parse(&server.endpoint, &own.scheme) {
                Ok(endpoint) if !targets.contains(&endpoint) => targets.push(endpoint),
                Ok(_) => {}
                Err(e) => warn!(server = %server.endpoint, error = %e, "skipping unparseable server"),
            }
        }

        if targets.is_empty() {
            warn!(endpoint = %own, "topology listed no servers, probing the target only");
            targets.push(own);
        }
        Ok(targets)
    }

    /// Fetch the topology, retrying once per interval until success or shutdown
    async fn fetch_topology(&self) -> Result<crate::admin::ClusterInfo, ProbeError> {
        let endpoint = self.api.endpoint();
        let mut attempt: u32 = 1;

        loop {
            let outcome = tokio::select! {
                outcome = self.api.server_info(TOPOLOGY_TIMEOUT) => outcome,
                _ = self.shutdown.cancelled() => {
                    return Err(ProbeError::TopologyCancelled { endpoint: endpoint.to_string() });
                }
            };

            match outcome {
                Ok(info) => {
                    debug!(endpoint = %endpoint, servers = info.servers.len(), attempt, "topology fetched");
                    return Ok(info);
                }
                Err(e) => warn!(endpoint = %endpoint, attempt, error = %e, "topology fetch failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(TOPOLOGY_RETRY_INTERVAL) => {}
                _ = self.shutdown.cancelled() => {
                    return Err(ProbeError::TopologyCancelled { endpoint: endpoint.to_string() });
                }
            }
            attempt += 1;
        }
    }
}
