//! Backend address registry
//!
//! The registry hands out two views of its addresses:
//! - `snapshot()`: the live list, read-locked until the snapshot is dropped.
//!   Fan-outs hold it for their whole duration, so a reconfiguration waits
//!   for in-flight fan-outs and never tears the list under them.
//! - `addresses()`: a copy taken under the lock and released immediately.

use crate::common::{Address, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::ops::Deref;
use tokio::sync::{RwLock, RwLockReadGuard};

/// Read-locked view of a registry's addresses.
pub struct Snapshot<'a> {
    guard: Box<dyn Deref<Target = [Address]> + Send + Sync + 'a>,
}

impl<'a> Snapshot<'a> {
    pub fn new<G>(guard: G) -> Self
    where
        G: Deref<Target = [Address]> + Send + Sync + 'a,
    {
        Self {
            guard: Box::new(guard),
        }
    }
}

impl Deref for Snapshot<'_> {
    type Target = [Address];

    fn deref(&self) -> &[Address] {
        &**self.guard
    }
}

#[async_trait]
pub trait AddressRegistry: Send + Sync + 'static {
    /// Addresses in registry order, shared-locked until the snapshot is dropped.
    async fn snapshot<'a>(&'a self) -> Snapshot<'a>;

    /// Point-in-time copy; the lock is released before this returns.
    async fn addresses(&self) -> Vec<Address>;

    /// Replace the whole address set under the exclusive lock.
    async fn reconfigure(&self, addresses: Vec<Address>);
}

/// Static list of servers, replaced wholesale on reconfiguration.
#[derive(Default)]
pub struct ServerList {
    addrs: RwLock<Vec<Address>>,
}

impl ServerList {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self {
            addrs: RwLock::new(dedup(addresses)),
        }
    }

    /// Build from `host:port` strings. Resolution blocks; call before the runtime is busy.
    pub fn from_servers<S: AsRef<str>>(servers: &[S]) -> Result<Self> {
        Ok(Self::new(resolve_all(servers)?))
    }

    /// Resolve `host:port` strings and swap them in. Nothing changes if any fails to resolve.
    pub async fn set_servers<S: AsRef<str>>(&self, servers: &[S]) -> Result<()> {
        let mut addresses = Vec::with_capacity(servers.len());
        for server in servers {
            addresses.push(Address::lookup(server.as_ref()).await?);
        }
        self.reconfigure(addresses).await;
        Ok(())
    }
}

fn resolve_all<S: AsRef<str>>(servers: &[S]) -> Result<Vec<Address>> {
    servers
        .iter()
        .map(|server| Address::resolve(server.as_ref()))
        .collect()
}

/// Drop repeated addresses, keeping the first occurrence.
fn dedup(addresses: Vec<Address>) -> Vec<Address> {
    let mut seen = HashSet::with_capacity(addresses.len());
    addresses
        .into_iter()
        .filter(|addr| seen.insert(*addr))
        .collect()
}

#[async_trait]
impl AddressRegistry for ServerList {
    async fn snapshot<'a>(&'a self) -> Snapshot<'a> {
        let guard = self.addrs.read().await;
        Snapshot::new(RwLockReadGuard::map(guard, |addrs| addrs.as_slice()))
    }

    async fn addresses(&self) -> Vec<Address> {
        self.addrs.read().await.clone()
    }

    async fn reconfigure(&self, addresses: Vec<Address>) {
        let addresses = dedup(addresses);
        let mut addrs = self.addrs.write().await;
        tracing::info!(
            "Reconfiguring servers: {} -> {} addresses",
            addrs.len(),
            addresses.len()
        );
        *addrs = addresses;
    }
}
