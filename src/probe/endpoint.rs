//! Endpoint identity and address parsing
//!
//! Liveness results and statistics are keyed by endpoint, so every address the
//! tool touches (alias URLs, server entries reported by the cluster topology)
//! is normalized into an [`Endpoint`] with an explicit scheme, host and port.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while splitting an address into host and port
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("unable to process empty address")]
    Empty,

    #[error("invalid address {address}: {reason}")]
    Invalid { address: String, reason: String },

    #[error("unable to guess port from scheme for {0}")]
    UnknownPort(String),
}

/// A probed server: scheme, host and port as they appear on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: String,
}

impl Endpoint {
    /// Parse an address, falling back to `default_scheme` when it has none.
    pub fn parse(address: &str, default_scheme: &str) -> Result<Self, AddressError> {
        if address.is_empty() {
            return Err(AddressError::Empty);
        }

        let url = if address.contains("://") {
            address.to_string()
        } else {
            format!("{}://{}", default_scheme, address)
        };
        let scheme = url.split("://").next().unwrap_or(default_scheme).to_string();
        let (host, port) = extract_host_port(&url)?;

        Ok(Self { scheme, host, port })
    }

    /// `host:port`, bracketing IPv6 literals
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// `scheme://host:port` without a trailing slash
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.authority())
    }

    pub fn is_secure(&self) -> bool {
        self.scheme != "http"
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority())
    }
}

/// Outcome of one liveness probe against one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub endpoint: Endpoint,
    pub response_time: Duration,
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn success(endpoint: Endpoint, response_time: Duration) -> Self {
        Self {
            endpoint,
            response_time,
            error: None,
        }
    }

    pub fn failure(endpoint: Endpoint, response_time: Duration, error: impl Into<String>) -> Self {
        Self {
            endpoint,
            response_time,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Extract host and port from the address formats users and servers hand us:
/// `":9000"`, `"localhost:9000"`, `"http://localhost:9000/"`, `"https://example.com"`.
///
/// Addresses without an explicit port take the default port of an `http` or
/// `https` scheme; anything else without a port is an error.
pub fn extract_host_port(address: &str) -> Result<(String, String), AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }

    if address.starts_with("http://") || address.starts_with("https://") {
        let url = url::Url::parse(address).map_err(|e| AddressError::Invalid {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        let host = url
            .host_str()
            .unwrap_or_default()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| AddressError::UnknownPort(address.to_string()))?;
        return Ok((host, port.to_string()));
    }

    // Scheme-less: the authority runs up to the first path, query or fragment delimiter.
    let authority = address
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    if authority.is_empty() {
        return Err(AddressError::Invalid {
            address: address.to_string(),
            reason: "missing host".to_string(),
        });
    }

    match split_host_port(authority) {
        Ok(Some((host, port))) => Ok((host.to_string(), port.to_string())),
        Ok(None) => Err(AddressError::UnknownPort(address.to_string())),
        Err(reason) => Err(AddressError::Invalid {
            address: address.to_string(),
            reason: reason.to_string(),
        }),
    }
}

/// Split `host:port` / `[v6]:port`. `Ok(None)` means the port is missing.
fn split_host_port(authority: &str) -> Result<Option<(&str, &str)>, &'static str> {
    let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
        let close = rest.find(']').ok_or("missing ']' in address")?;
        let host = &rest[..close];
        match &rest[close + 1..] {
            "" => return Ok(None),
            tail => match tail.strip_prefix(':') {
                Some(port) => (host, port),
                None => return Err("unexpected characters after ']'"),
            },
        }
    } else {
        match authority.rfind(':') {
            None => return Ok(None),
            Some(idx) => {
                let host = &authority[..idx];
                if host.contains(':') {
                    return Err("too many colons in address");
                }
                (host, &authority[idx + 1..])
            }
        }
    };

    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err("invalid port");
    }
    Ok(Some((host, port)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hp(host: &str, port: &str) -> (String, String) {
        (host.to_string(), port.to_string())
    }

    #[test]
    fn test_extract_host_port_formats() {
        assert_eq!(extract_host_port("localhost:9000").unwrap(), hp("localhost", "9000"));
        assert_eq!(extract_host_port("https://example.com").unwrap(), hp("example.com", "443"));
        assert_eq!(extract_host_port("http://example.com").unwrap(), hp("example.com", "80"));
        assert_eq!(extract_host_port(":9000").unwrap(), hp("", "9000"));
        assert_eq!(
            extract_host_port("http://localhost:9000/").unwrap(),
            hp("localhost", "9000")
        );
        assert_eq!(extract_host_port("[::1]:9000").unwrap(), hp("::1", "9000"));
        assert_eq!(extract_host_port("https://[::1]:9443").unwrap(), hp("::1", "9443"));
    }

    #[test]
    fn test_extract_host_port_errors() {
        assert_eq!(extract_host_port(""), Err(AddressError::Empty));
        assert!(matches!(
            extract_host_port("localhost"),
            Err(AddressError::UnknownPort(_))
        ));
        assert!(extract_host_port("ftp://storage").is_err());
        assert!(extract_host_port("a:b:9000").is_err());
        assert!(extract_host_port("localhost:port").is_err());
    }

    #[test]
    fn test_endpoint_parse_default_scheme() {
        let ep = Endpoint::parse("node1:9000", "https").unwrap();
        assert_eq!(ep.scheme, "https");
        assert_eq!(ep.authority(), "node1:9000");
        assert_eq!(ep.to_string(), "https://node1:9000");

        let ep = Endpoint::parse("http://minio.local", "https").unwrap();
        assert_eq!(ep.scheme, "http");
        assert_eq!(ep.port, "80");
        assert!(!ep.is_secure());
    }

    #[test]
    fn test_endpoint_ipv6_authority() {
        let ep = Endpoint::parse("[fd00::1]:9000", "http").unwrap();
        assert_eq!(ep.host, "fd00::1");
        assert_eq!(ep.base_url(), "http://[fd00::1]:9000");
    }
}
