use anyhow::{Context, Result};
use std::sync::Arc;
use crate::admin::AdminClient;
use crate::config::Config;
use crate::pool::ClientCache;

/// State shared by every command of one invocation
///
/// Holds the resolved alias configuration and the client cache, so every
/// lookup for the same server and credentials reuses one admin client and
/// its connection pool.
#[derive(Clone)]
pub struct Core {
    pub config: Arc<Config>,
    clients: Arc<ClientCache>,
}

impl Core {
    pub fn new(config: Config) -> Self {
        Self::with_cache(config, ClientCache::new())
    }

    pub fn with_cache(config: Config, clients: ClientCache) -> Self {
        Self {
            config: Arc::new(config),
            clients: Arc::new(clients),
        }
    }

    /// Resolve `alias[/path]` and return the shared admin client for it
    ///
    /// `insecure` only adds to an alias-level setting; `debug` turns on
    /// request tracing for a client built by this call.
    pub fn admin_client(&self, aliased_url: &str, insecure: bool, debug: bool) -> Result<Arc<AdminClient>> {
        let target = self
            .config
            .expand_alias(aliased_url)
            .with_context(|| format!("unable to resolve `{}`", aliased_url))?
            .with_insecure(insecure)
            .with_debug(debug);

        let client = self
            .clients
            .get(&target)
            .with_context(|| format!("unable to initialize admin client for `{}`", target.alias))?;

        tracing::debug!(alias = %target.alias, endpoint = %target.host_url, "admin client ready");
        Ok(client)
    }

    pub fn cached_clients(&self) -> usize {
        self.clients.len()
    }
}
