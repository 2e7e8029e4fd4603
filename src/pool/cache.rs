//! Admin client cache
//!
//! Building a client is not free (TLS context, connection pool), so every
//! caller asking for the same server with the same credentials gets the same
//! handle and therefore the same pooled connections.

use crate::admin::{AdminClient, AdminError, TransportConfig};
use crate::config::TargetConfig;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;
use url::{Position, Url};

/// Errors returned while looking up or building a cached client
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid target url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("target url {0} has no host")]
    MissingHost(String),

    #[error("failed to build admin client for {host}")]
    Construction {
        host: String,
        #[source]
        source: AdminError,
    },
}

/// Identity of a client: the server's `host[:port]` plus both credentials.
///
/// Scheme, path, TLS settings and tracing do not take part, so a later caller
/// with different flags still receives the first caller's handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientFingerprint(u64);

impl ClientFingerprint {
    pub fn of(target: &TargetConfig) -> Result<Self, CacheError> {
        let host = host_authority(&target.host_url)?;

        let mut hasher = DefaultHasher::new();
        (host.as_str(), target.access_key.as_str(), target.secret_key.as_str()).hash(&mut hasher);
        Ok(Self(hasher.finish()))
    }
}

impl fmt::Display for ClientFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// `host[:port]` exactly as written in the URL
fn host_authority(host_url: &str) -> Result<String, CacheError> {
    let url = Url::parse(host_url).map_err(|e| CacheError::InvalidUrl {
        url: host_url.to_string(),
        reason: e.to_string(),
    })?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(CacheError::MissingHost(host_url.to_string()));
    }
    Ok(url[Position::BeforeHost..Position::AfterPort].to_string())
}

/// Process-wide map from fingerprint to shared client handle
#[derive(Debug, Default)]
pub struct ClientCache {
    clients: Mutex<HashMap<ClientFingerprint, Arc<AdminClient>>>,
    transport: TransportConfig,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the client for `target`, building it on first use.
    ///
    /// Construction happens under the lock so two concurrent callers with the
    /// same fingerprint never build two clients. A failed construction leaves
    /// nothing behind.
    pub fn get(&self, target: &TargetConfig) -> Result<Arc<AdminClient>, CacheError> {
        let fingerprint = ClientFingerprint::of(target)?;

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&fingerprint) {
            debug!(%fingerprint, alias = %target.alias, "admin client cache hit");
            return Ok(Arc::clone(client));
        }

        let client = AdminClient::new(target, &self.transport).map_err(|source| {
            CacheError::Construction {
                host: target.host_url.clone(),
                source,
            }
        })?;
        let client = Arc::new(client);
        clients.insert(fingerprint, Arc::clone(&client));
        debug!(%fingerprint, alias = %target.alias, cached = clients.len(), "admin client cached");

        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(host_url: &str, access_key: &str, secret_key: &str) -> TargetConfig {
        TargetConfig {
            alias: "test".to_string(),
            host_url: host_url.to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            session_token: None,
            insecure: false,
            debug: false,
            app_name: "s3probe".to_string(),
            app_version: "0.1.0".to_string(),
        }
    }

    #[test]
    fn test_same_triple_shares_handle() {
        let cache = ClientCache::new();
        let a = cache.get(&target("http://localhost:9000", "ak", "sk")).unwrap();
        let b = cache.get(&target("http://localhost:9000", "ak", "sk")).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_any_field_change_gives_new_handle() {
        let cache = ClientCache::new();
        let base = cache.get(&target("http://localhost:9000", "ak", "sk")).unwrap();
        let other_port = cache.get(&target("http://localhost:9001", "ak", "sk")).unwrap();
        let other_ak = cache.get(&target("http://localhost:9000", "ak2", "sk")).unwrap();
        let other_sk = cache.get(&target("http://localhost:9000", "ak", "sk2")).unwrap();

        assert!(!Arc::ptr_eq(&base, &other_port));
        assert!(!Arc::ptr_eq(&base, &other_ak));
        assert!(!Arc::ptr_eq(&base, &other_sk));
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_flags_do_not_split_cache() {
        let cache = ClientCache::new();
        let plain = cache.get(&target("http://localhost:9000", "ak", "sk")).unwrap();

        let mut traced = target("http://localhost:9000/some/path", "ak", "sk");
        traced.debug = true;
        traced.insecure = true;
        let again = cache.get(&traced).unwrap();

        assert!(Arc::ptr_eq(&plain, &again));
        assert!(!again.is_tracing());
    }

    #[test]
    fn test_invalid_url_not_cached() {
        let cache = ClientCache::new();
        assert!(matches!(
            cache.get(&target("not a url", "ak", "sk")),
            Err(CacheError::InvalidUrl { .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fingerprint_uses_written_authority() {
        let a = ClientFingerprint::of(&target("https://minio:9000", "ak", "sk")).unwrap();
        let b = ClientFingerprint::of(&target("http://minio:9000/", "ak", "sk")).unwrap();
        let c = ClientFingerprint::of(&target("https://minio", "ak", "sk")).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string().len(), 16);
    }

    #[test]
    fn test_concurrent_callers_share_one_client() {
        let cache = Arc::new(ClientCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.get(&target("http://10.0.0.1:9000", "ak", "sk")).unwrap()
                })
            })
            .collect();

        let clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(clients.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.len(), 1);
    }
}
