//! When a probe session stops
//!
//! The policy is consulted once per completed round and answers with the
//! session's next state. Stopping is a returned value; nothing else in the
//! session carries a stop flag.

use super::endpoint::Endpoint;
use super::stats::EndpointStats;
use super::ProbeError;
use std::fmt;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The configured number of rounds completed
    CountReached { rounds: u64 },
    /// An endpoint hit the consecutive-error ceiling
    ErrorCeiling { endpoint: Endpoint, errors: u32 },
    /// The session's shutdown signal fired
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::CountReached { rounds } => write!(f, "completed {} rounds", rounds),
            StopReason::ErrorCeiling { endpoint, errors } => {
                write!(f, "{} failed {} consecutive probes", endpoint, errors)
            }
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Session state after a round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Stopped(StopReason),
}

/// Round count and consecutive-error ceiling; either may be absent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminationPolicy {
    count: Option<u64>,
    error_ceiling: Option<u32>,
}

impl TerminationPolicy {
    /// Run until cancelled
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Build a policy, rejecting a round count below one
    pub fn new(count: Option<u64>, error_ceiling: Option<u32>) -> Result<Self, ProbeError> {
        if count == Some(0) {
            return Err(ProbeError::InvalidCount);
        }
        Ok(Self {
            count,
            error_ceiling,
        })
    }

    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn error_ceiling(&self) -> Option<u32> {
        self.error_ceiling
    }

    /// Decide whether round `round` (1-based) was the last one.
    ///
    /// `reported` holds the endpoints that answered in this round with their
    /// updated statistics. The error ceiling wins over the round count when
    /// both trigger on the same round.
    pub fn evaluate<'a, I>(&self, round: u64, reported: I) -> SessionState
    where
        I: IntoIterator<Item = (&'a Endpoint, &'a EndpointStats)>,
    {
        if let Some(ceiling) = self.error_ceiling {
            let breached = reported
                .into_iter()
                .find(|(_, stats)| stats.consecutive_errors > 0 && stats.consecutive_errors >= ceiling);
            if let Some((endpoint, stats)) = breached {
                return SessionState::Stopped(StopReason::ErrorCeiling {
                    endpoint: endpoint.clone(),
                    errors: stats.consecutive_errors,
                });
            }
        }

        match self.count {
            Some(count) if round >= count => {
                SessionState::Stopped(StopReason::CountReached { rounds: round })
            }
            _ => SessionState::Running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::parse("node1:9000", "http").unwrap()
    }

    fn errors(n: u32) -> EndpointStats {
        EndpointStats {
            consecutive_errors: n,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_count_rejected() {
        assert!(matches!(
            TerminationPolicy::new(Some(0), None),
            Err(ProbeError::InvalidCount)
        ));
        assert!(TerminationPolicy::new(Some(1), None).is_ok());
    }

    #[test]
    fn test_count_reached() {
        let policy = TerminationPolicy::new(Some(3), None).unwrap();
        let ep = endpoint();
        let stats = errors(0);

        assert_eq!(policy.evaluate(2, [(&ep, &stats)]), SessionState::Running);
        assert_eq!(
            policy.evaluate(3, [(&ep, &stats)]),
            SessionState::Stopped(StopReason::CountReached { rounds: 3 })
        );
    }

    #[test]
    fn test_error_ceiling_any_endpoint() {
        let policy = TerminationPolicy::new(None, Some(2)).unwrap();
        let healthy = Endpoint::parse("node1:9000", "http").unwrap();
        let failing = Endpoint::parse("node2:9000", "http").unwrap();
        let ok = errors(0);
        let one = errors(1);
        let two = errors(2);

        assert_eq!(
            policy.evaluate(1, [(&healthy, &ok), (&failing, &one)]),
            SessionState::Running
        );
        assert_eq!(
            policy.evaluate(2, [(&healthy, &ok), (&failing, &two)]),
            SessionState::Stopped(StopReason::ErrorCeiling {
                endpoint: failing.clone(),
                errors: 2
            })
        );
    }

    #[test]
    fn test_zero_ceiling_stops_on_first_failure() {
        let policy = TerminationPolicy::new(None, Some(0)).unwrap();
        let ep = endpoint();
        assert_eq!(policy.evaluate(1, [(&ep, &errors(0))]), SessionState::Running);
        assert!(matches!(
            policy.evaluate(1, [(&ep, &errors(1))]),
            SessionState::Stopped(StopReason::ErrorCeiling { .. })
        ));
    }

    #[test]
    fn test_unbounded_never_stops() {
        let policy = TerminationPolicy::unbounded();
        let ep = endpoint();
        assert_eq!(policy.evaluate(10_000, [(&ep, &errors(500))]), SessionState::Running);
    }
}
