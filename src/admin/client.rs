//! Admin client for S3-compatible storage clusters
//!
//! Transport tuned for short admin exchanges against a handful of nodes:
//! - HTTP/1.1 pool, 256 idle connections per host, 90s idle timeout
//! - 10s dial timeout, 15s TCP keepalive, TCP_NODELAY
//! - native-tls with TLS 1.2 as the minimum protocol version
//! - Every exchange, TLS handshake included, bounded by a per-call timeout
//! - Bodies are returned exactly as sent; no Accept-Encoding is advertised
//!   and nothing is decompressed

use super::signer::RequestSigner;
use super::types::{AliveOptions, ClusterInfo, NetperfResult};
use super::AdminApi;
use crate::config::TargetConfig;
use crate::probe::snapshot::format_duration;
use crate::probe::{Endpoint, ProbeResult, ShutdownSignal};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use native_tls::{Protocol, TlsConnector};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

/// Extra time granted to a throughput test beyond its nominal duration
const NETPERF_GRACE: Duration = Duration::from_secs(60);

/// Admin client errors
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("TLS setup failed")]
    Tls(#[from] native_tls::Error),

    #[error("failed to build HTTP request")]
    Http(#[from] hyper::http::Error),

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} returned {status}: {message}")]
    Status {
        url: String,
        status: StatusCode,
        message: String,
    },

    #[error("invalid response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

pub type Result<T> = std::result::Result<T, AdminError>;

/// Connection pool and timeout settings shared by every client a cache builds
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    pub keepalive: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 256,
            idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(10),
            keepalive: Duration::from_secs(15),
        }
    }
}

type HttpClient = HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Authenticated, TLS-configured handle to one cluster endpoint
///
/// Clone is cheap: the pool and signer are shared.
#[derive(Clone)]
pub struct AdminClient {
    http: HttpClient,
    signer: Arc<RequestSigner>,
    endpoint: Endpoint,
    user_agent: String,
    trace: bool,
}

impl fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminClient")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.signer.access_key())
            .field("user_agent", &self.user_agent)
            .field("trace", &self.trace)
            .finish()
    }
}

impl AdminClient {
    /// Build a client for `target`. Performs no network I/O.
    pub fn new(target: &TargetConfig, transport: &TransportConfig) -> Result<Self> {
        let endpoint =
            Endpoint::parse(&target.host_url, "https").map_err(|e| AdminError::InvalidUrl {
                url: target.host_url.clone(),
                reason: e.to_string(),
            })?;

        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(transport.connect_timeout));
        http.set_keepalive(Some(transport.keepalive));

        let mut tls = TlsConnector::builder();
        tls.min_protocol_version(Some(Protocol::Tlsv12));
        if target.insecure {
            warn!(endpoint = %endpoint, "certificate verification disabled");
            tls.danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let tls = tls.build()?;

        let https = HttpsConnector::from((http, tls.into()));
        let http = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(transport.idle_timeout)
            .pool_max_idle_per_host(transport.max_idle_per_host)
            .pool_timer(TokioTimer::new())
            .build(https);

        debug!(
            endpoint = %endpoint,
            access_key = %target.access_key,
            trace = target.debug,
            "admin client constructed"
        );

        Ok(Self {
            http,
            signer: Arc::new(RequestSigner::new(
                &target.access_key,
                &target.secret_key,
                target.session_token.as_deref(),
            )),
            endpoint,
            user_agent: format!("{}/{}", target.app_name, target.app_version),
            trace: target.debug,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn is_tracing(&self) -> bool {
        self.trace
    }

    fn admin_url(&self, api: &str, query: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}/minio/admin/v3/{}", self.endpoint.base_url(), api);
        let mut url = Url::parse(&raw).map_err(|e| AdminError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn liveness_url(target: &Endpoint) -> Result<Url> {
        let raw = format!("{}/minio/health/live", target.base_url());
        Url::parse(&raw).map_err(|e| AdminError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }

    /// One HTTP exchange bounded by `timeout`; signs when `signed`.
    async fn send(
        &self,
        method: Method,
        url: &Url,
        body: Bytes,
        signed: bool,
        timeout: Duration,
    ) -> Result<(StatusCode, Bytes)> {
        let mut builder = Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .header("user-agent", &self.user_agent);
        if signed {
            for (name, value) in self.signer.sign(method.as_str(), url, &body) {
                builder = builder.header(name, value);
            }
        }
        let request = builder.body(Full::new(body))?;

        let started = Instant::now();
        let exchange = async {
            let response = self
                .http
                .request(request)
                .await
                .map_err(|e| AdminError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| AdminError::Request {
                    url: url.to_string(),
                    reason: format!("body error: {}", e),
                })?
                .to_bytes();
            Ok::<_, AdminError>((status, body))
        };

        let outcome = match tokio::time::timeout(timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AdminError::Timeout {
                url: url.to_string(),
                timeout,
            }),
        };

        if self.trace {
            match &outcome {
                Ok((status, body)) => debug!(
                    target: "s3probe::trace",
                    method = %method,
                    url = %url,
                    status = status.as_u16(),
                    bytes = body.len(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "admin request"
                ),
                Err(e) => debug!(
                    target: "s3probe::trace",
                    method = %method,
                    url = %url,
                    error = %e,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "admin request failed"
                ),
            }
        }

        outcome
    }

    /// Signed JSON call; non-2xx statuses become [`AdminError::Status`].
    async fn call_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        timeout: Duration,
    ) -> Result<T> {
        let (status, body) = self.send(method, &url, Bytes::new(), true, timeout).await?;
        if !status.is_success() {
            return Err(AdminError::Status {
                url: url.to_string(),
                status,
                message: error_message(&body),
            });
        }
        serde_json::from_slice(&body).map_err(|source| AdminError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn probe_live(&self, target: &Endpoint, timeout: Duration) -> Result<()> {
        let url = Self::liveness_url(target)?;
        let (status, _) = self
            .send(Method::HEAD, &url, Bytes::new(), false, timeout)
            .await?;
        if status != StatusCode::OK {
            return Err(AdminError::Status {
                url: url.to_string(),
                status,
                message: "liveness check failed".to_string(),
            });
        }
        Ok(())
    }
}

impl AdminApi for AdminClient {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn server_info(&self, timeout: Duration) -> Result<ClusterInfo> {
        let url = self.admin_url("info", &[])?;
        self.call_json(Method::GET, url, timeout).await
    }

    fn alive(
        &self,
        targets: &[Endpoint],
        options: &AliveOptions,
        shutdown: &ShutdownSignal,
    ) -> mpsc::Receiver<ProbeResult> {
        let (tx, rx) = mpsc::channel(targets.len().max(1));

        for target in targets.iter().cloned() {
            let client = self.clone();
            let tx = tx.clone();
            let shutdown = shutdown.clone();
            let timeout = options.timeout;

            tokio::spawn(async move {
                let started = Instant::now();
                let outcome = tokio::select! {
                    outcome = client.probe_live(&target, timeout) => outcome,
                    _ = shutdown.cancelled() => {
                        debug!(endpoint = %target, "probe abandoned on shutdown");
                        return;
                    }
                };
                let elapsed = started.elapsed();
                let result = match outcome {
                    Ok(()) => ProbeResult::success(target, elapsed),
                    Err(e) => ProbeResult::failure(target, elapsed, e.to_string()),
                };
                // The receiver only goes away when the session is torn down.
                let _ = tx.send(result).await;
            });
        }

        rx
    }

    async fn netperf(&self, duration: Duration) -> Result<NetperfResult> {
        let rendered = format_duration(duration);
        let url = self.admin_url("speedtest/net", &[("duration", rendered.as_str())])?;
        self.call_json(Method::POST, url, duration + NETPERF_GRACE)
            .await
    }
}

fn error_message(body: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        #[serde(rename = "Message", alias = "message")]
        message: String,
    }

    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            text.chars().take(256).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str) -> TargetConfig {
        TargetConfig {
            alias: "local".to_string(),
            host_url: url.to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            session_token: None,
            insecure: false,
            debug: false,
            app_name: "s3probe".to_string(),
            app_version: "test".to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        let client = AdminClient::new(&target("http://localhost:9000"), &TransportConfig::default())
            .unwrap();
        assert_eq!(client.endpoint().scheme, "http");
        assert_eq!(client.endpoint().authority(), "localhost:9000");
        assert_eq!(client.user_agent(), "s3probe/test");
        assert!(!client.is_tracing());
    }

    #[test]
    fn test_insecure_tls_client() {
        let mut t = target("https://minio.internal");
        t.insecure = true;
        t.debug = true;
        let client = AdminClient::new(&t, &TransportConfig::default()).unwrap();
        assert!(client.endpoint().is_secure());
        assert_eq!(client.endpoint().port, "443");
        assert!(client.is_tracing());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = AdminClient::new(&target("http://[::1"), &TransportConfig::default())
            .unwrap_err();
        assert!(matches!(err, AdminError::InvalidUrl { .. }));
    }

    #[test]
    fn test_admin_urls() {
        let client = AdminClient::new(&target("http://localhost:9000"), &TransportConfig::default())
            .unwrap();
        let info = client.admin_url("info", &[]).unwrap();
        assert_eq!(info.as_str(), "http://localhost:9000/minio/admin/v3/info");

        let net = client.admin_url("speedtest/net", &[("duration", "10s")]).unwrap();
        assert_eq!(
            net.as_str(),
            "http://localhost:9000/minio/admin/v3/speedtest/net?duration=10s"
        );

        let node = Endpoint::parse("node2:9000", "https").unwrap();
        assert_eq!(
            AdminClient::liveness_url(&node).unwrap().as_str(),
            "https://node2:9000/minio/health/live"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(br#"{"Code":"AccessDenied","Message":"Access Denied."}"#),
            "Access Denied."
        );
        assert_eq!(error_message(b"plain failure"), "plain failure");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_failure() {
        let client = AdminClient::new(&target("http://127.0.0.1:1"), &TransportConfig::default())
            .unwrap();
        let options = AliveOptions {
            timeout: Duration::from_secs(2),
        };
        let targets = vec![client.endpoint().clone()];

        let mut stream = client.alive(&targets, &options, &ShutdownSignal::never());
        let result = stream.recv().await.expect("one result per target");
        assert!(!result.is_success());
        assert_eq!(result.endpoint, targets[0]);
        assert!(stream.recv().await.is_none());
    }
}
