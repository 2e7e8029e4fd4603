//! Liveness probing and latency statistics
//!
//! This module provides:
//! - [`Endpoint`] identity and host/port extraction
//! - [`EndpointStats`]: constant-size running min/max/average per endpoint
//! - [`RoundSnapshot`]: display-ready view of one round
//! - [`TerminationPolicy`]: round count and consecutive-error ceiling
//! - [`Shutdown`] / [`ShutdownSignal`]: session-scoped cancellation
//! - [`ProbeSession`]: the round loop tying them together
//! - [`run_netperf`]: the throughput test under the same cancellation rules
//!
//! # Session flow
//!
//! 1. In distributed mode the cluster topology is fetched once, retrying
//!    every second until it succeeds or the session is cancelled.
//! 2. Each round probes every target concurrently and folds each result into
//!    that endpoint's statistics as it arrives.
//! 3. Once the round's stream closes a snapshot goes to the presenter and the
//!    policy decides whether another round follows.

pub mod endpoint;
pub mod netperf;
pub mod policy;
pub mod session;
pub mod shutdown;
pub mod snapshot;
pub mod stats;

pub use endpoint::{extract_host_port, AddressError, Endpoint, ProbeResult};
pub use netperf::run_netperf;
pub use policy::{SessionState, StopReason, TerminationPolicy};
pub use session::{PingOptions, Presenter, ProbeSession, SessionOutcome};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use snapshot::{format_duration, EndpointSnapshot, RoundSnapshot};
pub use stats::{EndpointStats, StatsTable};

use crate::admin::AdminError;
use thiserror::Error;

/// Session-level failures. Per-endpoint probe errors never surface here.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ping count cannot be less than 1")]
    InvalidCount,

    #[error("duration cannot be 0 or negative")]
    InvalidDuration,

    #[error("cancelled while fetching cluster topology from {endpoint}")]
    TopologyCancelled { endpoint: String },

    #[error("network test against {endpoint} failed")]
    Netperf {
        endpoint: String,
        #[source]
        source: AdminError,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to write round output")]
    Output(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_chain_names_cause_once() {
        let err = anyhow::Error::new(ProbeError::Netperf {
            endpoint: "node1:9000".to_string(),
            source: AdminError::Timeout {
                url: "http://node1:9000/minio/admin/v3/speedtest/net".to_string(),
                timeout: Duration::from_secs(1),
            },
        });
        let rendered = format!("{:#}", err);
        assert!(rendered.starts_with("network test against node1:9000 failed: "));
        assert_eq!(rendered.matches("timed out").count(), 1);

        let output = anyhow::Error::new(ProbeError::from(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        )));
        assert_eq!(format!("{:#}", output).matches("pipe closed").count(), 1);
    }
}
