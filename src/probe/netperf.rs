//! Network throughput test runner
//!
//! Shares the session discipline of ping: the same client handle, the same
//! shutdown signal, a bounded wait.

use super::shutdown::ShutdownSignal;
use super::ProbeError;
use crate::admin::{AdminApi, NetperfResult};
use std::time::Duration;
use tracing::info;

/// Run a throughput test for `duration`, abandoning it if `shutdown` fires
pub async fn run_netperf<A: AdminApi>(
    api: &A,
    duration: Duration,
    shutdown: &ShutdownSignal,
) -> Result<NetperfResult, ProbeError> {
    if duration.is_zero() {
        return Err(ProbeError::InvalidDuration);
    }

    let endpoint = api.endpoint().to_string();
    info!(endpoint = %endpoint, duration_secs = duration.as_secs_f64(), "network test started");

    let result = tokio::select! {
        result = api.netperf(duration) => result,
        _ = shutdown.cancelled() => return Err(ProbeError::Cancelled),
    };

    let result = result.map_err(|source| ProbeError::Netperf { endpoint, source })?;
    info!(nodes = result.node_results.len(), "network test finished");
    Ok(result)
}
