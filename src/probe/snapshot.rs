//! Per-round snapshots handed to presenters

use super::endpoint::Endpoint;
use super::stats::EndpointStats;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// One endpoint's line in a round snapshot, durations pre-rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointSnapshot {
    pub endpoint: Endpoint,
    pub min: String,
    pub max: String,
    pub average: String,
    #[serde(rename = "error-count", serialize_with = "as_string")]
    pub error_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub roundtrip: String,
}

impl EndpointSnapshot {
    pub fn new(endpoint: Endpoint, stats: &EndpointStats, roundtrip: Duration) -> Self {
        Self {
            endpoint,
            min: format_duration(stats.min_or_zero()),
            max: format_duration(stats.max),
            average: format_duration(stats.average),
            error_count: stats.consecutive_errors,
            error: stats.last_error.clone(),
            roundtrip: format_duration(roundtrip),
        }
    }

    pub fn is_failing(&self) -> bool {
        self.error_count > 0
    }
}

/// Everything observed in one probe round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundSnapshot {
    pub status: &'static str,
    #[serde(serialize_with = "as_string")]
    pub counter: u64,
    #[serde(rename = "servers")]
    pub endpoints: Vec<EndpointSnapshot>,
}

impl RoundSnapshot {
    pub fn new(counter: u64, endpoints: Vec<EndpointSnapshot>) -> Self {
        Self {
            status: "success",
            counter,
            endpoints,
        }
    }

    /// More than one endpoint means the round covered a whole cluster
    pub fn is_distributed(&self) -> bool {
        self.endpoints.len() > 1
    }
}

/// Counters serialize as JSON strings
fn as_string<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Round half away from zero to whole microseconds
pub fn round_to_micros(d: Duration) -> Duration {
    let nanos = d.as_nanos();
    let rem = nanos % 1_000;
    let rounded = if rem >= 500 { nanos - rem + 1_000 } else { nanos - rem };
    Duration::from_nanos(u64::try_from(rounded).unwrap_or(u64::MAX))
}

/// Render a duration at microsecond resolution: `0s`, `250µs`, `1.5ms`, `2.25s`, `1m30s`.
pub fn format_duration(d: Duration) -> String {
    let nanos = round_to_micros(d).as_nanos();

    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos, 1_000));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", decimal(nanos, 1_000_000));
    }

    let total_secs = nanos / 1_000_000_000;
    let subsec = nanos % 1_000_000_000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = decimal((total_secs % 60) * 1_000_000_000 + subsec, 1_000_000_000);

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// `value / unit` as a decimal with trailing zeros trimmed
fn decimal(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let width = unit.to_string().len() - 1;
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
