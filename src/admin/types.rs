//! Admin API payloads

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cluster topology returned by the server info call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default)]
    pub servers: Vec<ServerProperties>,
}

/// One node of the cluster as reported by the server info call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProperties {
    /// `online` / `offline`
    #[serde(default)]
    pub state: String,

    /// `host:port` of the node
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub uptime: Option<u64>,
}

/// Per-node outcome of a network throughput test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetperfNodeResult {
    pub endpoint: String,

    /// Transmit throughput, bytes per second
    #[serde(default)]
    pub tx: u64,

    /// Receive throughput, bytes per second
    #[serde(default)]
    pub rx: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Network throughput test result for the whole cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetperfResult {
    #[serde(rename = "nodeResults", default)]
    pub node_results: Vec<NetperfNodeResult>,
}

/// Options for one round of liveness probes
#[derive(Debug, Clone)]
pub struct AliveOptions {
    /// Upper bound for a single probe, connect included
    pub timeout: Duration,
}

impl Default for AliveOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}
