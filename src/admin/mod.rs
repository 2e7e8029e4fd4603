//! Admin API access for S3-compatible clusters
//!
//! This module provides:
//! - AWS Signature V4 signing for admin requests
//! - A pooled, TLS-configured HTTP client per cluster endpoint
//! - Topology lookup, anonymous liveness probes and network throughput tests
//!
//! Probe sessions talk to the cluster through the [`AdminApi`] trait so the
//! orchestration logic can run against a scripted implementation in tests.

pub mod client;
pub mod signer;
pub mod types;

pub use client::{AdminClient, AdminError, Result, TransportConfig};
pub use signer::RequestSigner;
pub use types::{AliveOptions, ClusterInfo, NetperfNodeResult, NetperfResult, ServerProperties};

use crate::probe::{Endpoint, ProbeResult, ShutdownSignal};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

/// Operations a probe session consumes from the admin layer
pub trait AdminApi: Send + Sync {
    /// Endpoint this handle was built for
    fn endpoint(&self) -> &Endpoint;

    /// Fetch the cluster topology, giving up after `timeout`
    fn server_info(&self, timeout: Duration) -> impl Future<Output = Result<ClusterInfo>> + Send;

    /// Probe every target concurrently.
    ///
    /// Results arrive as they complete; the channel closes once every target
    /// has reported. Probes still running when `shutdown` fires report nothing.
    fn alive(
        &self,
        targets: &[Endpoint],
        options: &AliveOptions,
        shutdown: &ShutdownSignal,
    ) -> mpsc::Receiver<ProbeResult>;

    /// Run a cluster-wide network throughput test for `duration`
    fn netperf(&self, duration: Duration) -> impl Future<Output = Result<NetperfResult>> + Send;
}
