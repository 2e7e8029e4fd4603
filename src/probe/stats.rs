//! Online latency statistics per endpoint
//!
//! Each endpoint keeps a constant-size aggregate that is folded forward one
//! [`ProbeResult`] at a time. Nothing about individual samples is retained.

use super::endpoint::ProbeResult;
use std::collections::HashMap;
use std::time::Duration;

/// Running aggregate for one endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointStats {
    /// Fastest successful round trip; `None` until the first success
    pub min: Option<Duration>,
    pub max: Duration,
    pub sum: Duration,
    pub average: Duration,
    /// Failures since the last success
    pub consecutive_errors: u32,
    /// Message of the latest probe, if it failed
    pub last_error: Option<String>,
    /// Successful samples folded into `sum`
    pub samples: u64,
}

impl EndpointStats {
    /// Fold one probe result into the prior aggregate.
    ///
    /// Failures only move the error counter. Successes reset it and update the
    /// latency figures with exact integer arithmetic.
    pub fn update(prior: Option<&EndpointStats>, result: &ProbeResult) -> EndpointStats {
        match &result.error {
            Some(message) => {
                let mut next = prior.cloned().unwrap_or_default();
                next.consecutive_errors = prior.map_or(1, |p| p.consecutive_errors.saturating_add(1));
                next.last_error = Some(message.clone());
                next
            }
            None => {
                let sample = result.response_time;
                let prior = prior.cloned().unwrap_or_default();

                // A zero minimum carries no information; start over from this sample.
                let min = match prior.min.filter(|m| !m.is_zero()) {
                    Some(min) => min.min(sample),
                    None => sample,
                };
                let sum = prior.sum.saturating_add(sample);
                let samples = prior.samples + 1;

                EndpointStats {
                    min: Some(min),
                    max: prior.max.max(sample),
                    sum,
                    average: average(sum, samples),
                    consecutive_errors: 0,
                    last_error: None,
                    samples,
                }
            }
        }
    }

    /// Minimum as displayed: zero while no successful sample exists
    pub fn min_or_zero(&self) -> Duration {
        self.min.unwrap_or(Duration::ZERO)
    }

    pub fn has_samples(&self) -> bool {
        self.samples > 0
    }
}

fn average(sum: Duration, samples: u64) -> Duration {
    if samples == 0 {
        return Duration::ZERO;
    }
    let nanos = sum.as_nanos() / u128::from(samples);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Per-session statistics keyed by endpoint authority (`host:port`)
///
/// Owned by the session's consumption loop, so it needs no locking.
#[derive(Debug, Default)]
pub struct StatsTable {
    entries: HashMap<String, EndpointStats>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `result` into its endpoint's aggregate and return the new value
    pub fn record(&mut self, result: &ProbeResult) -> &EndpointStats {
        let key = result.endpoint.authority();
        let next = EndpointStats::update(self.entries.get(&key), result);
        self.entries.insert(key.clone(), next);
        &self.entries[&key]
    }

    pub fn get(&self, authority: &str) -> Option<&EndpointStats> {
        self.entries.get(authority)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
