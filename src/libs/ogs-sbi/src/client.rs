//! SBI Client registry
//!
//! Transport-client descriptors keyed by (scheme, fqdn, port, addresses).
//! Connections themselves belong to the transport layer; this registry only
//! decides whether two endpoints share one client and how long it lives.

use std::fmt;
use std::net::SocketAddr;

use ogs_core::{OgsPool, OgsPoolId};

use crate::error::{SbiError, SbiResult};
use crate::types::UriScheme;

/// Handle of a client in a [`ClientFactory`]
pub type ClientId = OgsPoolId;

/// Identity of a transport client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SbiClientKey {
    pub scheme: UriScheme,
    pub fqdn: Option<String>,
    pub port: u16,
    pub ipv4: Option<SocketAddr>,
    pub ipv6: Option<SocketAddr>,
}

impl SbiClientKey {
    /// Port 0 selects the default port of `scheme`
    pub fn new(
        scheme: UriScheme,
        fqdn: Option<String>,
        port: u16,
        ipv4: Option<SocketAddr>,
        ipv6: Option<SocketAddr>,
    ) -> Self {
        let port = if port == 0 {
            scheme.default_port()
        } else {
            port
        };
        Self {
            scheme,
            fqdn,
            port,
            ipv4,
            ipv6,
        }
    }

    /// A key needs at least an FQDN or one address to be reachable
    pub fn is_reachable(&self) -> bool {
        self.fqdn.is_some() || self.ipv4.is_some() || self.ipv6.is_some()
    }

    /// Base URI, preferring the FQDN over IPv4 over IPv6
    pub fn base_uri(&self) -> Option<String> {
        let host = match (&self.fqdn, self.ipv4, self.ipv6) {
            (Some(fqdn), _, _) => fqdn.clone(),
            (None, Some(addr), _) => addr.ip().to_string(),
            (None, None, Some(addr)) => format!("[{}]", addr.ip()),
            (None, None, None) => return None,
        };
        Some(format!("{}://{}:{}", self.scheme, host, self.port))
    }
}

impl fmt::Display for SbiClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base_uri() {
            Some(uri) => f.write_str(&uri),
            None => write!(f, "{}://<unreachable>:{}", self.scheme, self.port),
        }
    }
}

/// Transport client descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct SbiClient {
    key: SbiClientKey,
    holders: usize,
}

impl SbiClient {
    pub fn key(&self) -> &SbiClientKey {
        &self.key
    }

    /// Number of entities bound to this client
    pub fn holders(&self) -> usize {
        self.holders
    }
}

/// Transport-client factory
///
/// `add` and `hold` each register one holder; `remove` drops one and frees
/// the client when none is left.
pub trait ClientFactory {
    fn add(&mut self, key: SbiClientKey) -> SbiResult<ClientId>;
    fn find(&self, key: &SbiClientKey) -> Option<ClientId>;
    fn hold(&mut self, id: ClientId) -> bool;
    fn remove(&mut self, id: ClientId);
    fn get(&self, id: ClientId) -> Option<&SbiClient>;
    fn count(&self) -> usize;

    /// Find a client with this identity or create it; the caller becomes a holder
    fn obtain(&mut self, key: SbiClientKey) -> SbiResult<ClientId> {
        if let Some(id) = self.find(&key) {
            if self.hold(id) {
                return Ok(id);
            }
        }
        self.add(key)
    }

    /// Point `slot` at `id`, releasing whatever it held before
    fn bind(&mut self, slot: &mut Option<ClientId>, id: ClientId) {
        if let Some(old) = slot.replace(id) {
            self.remove(old);
        }
    }

    /// Empty `slot`, releasing its client
    fn release(&mut self, slot: &mut Option<ClientId>) {
        if let Some(old) = slot.take() {
            self.remove(old);
        }
    }
}

/// In-memory client registry backed by a fixed-capacity pool
#[derive(Debug)]
pub struct SbiClientRegistry {
    pool: OgsPool<SbiClient>,
}

impl SbiClientRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: OgsPool::new("sbi_client", capacity),
        }
    }
}

impl ClientFactory for SbiClientRegistry {
    fn add(&mut self, key: SbiClientKey) -> SbiResult<ClientId> {
        log::debug!("[{}] client add", key);
        self.pool
            .alloc(SbiClient { key, holders: 1 })
            .ok_or(SbiError::PoolExhausted("sbi_client"))
    }

    fn find(&self, key: &SbiClientKey) -> Option<ClientId> {
        self.pool
            .iter()
            .find(|(_, client)| &client.key == key)
            .map(|(id, _)| id)
    }

    fn hold(&mut self, id: ClientId) -> bool {
        match self.pool.find_mut(id) {
            Some(client) => {
                client.holders += 1;
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, id: ClientId) {
        let Some(client) = self.pool.find_mut(id) else {
            log::warn!("client {} already released", id);
            return;
        };
        client.holders = client.holders.saturating_sub(1);
        if client.holders == 0 {
            if let Some(client) = self.pool.free(id) {
                log::debug!("[{}] client remove", client.key);
            }
        }
    }

    fn get(&self, id: ClientId) -> Option<&SbiClient> {
        self.pool.find(id)
    }

    fn count(&self) -> usize {
        self.pool.allocated()
    }
}
