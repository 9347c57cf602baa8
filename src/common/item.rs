//! Core data types: backend addresses, cache items and counter verbs

use bytes::Bytes;
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

/// A backend endpoint. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(SocketAddr);

impl Address {
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// Resolve a `host:port` string, taking the first socket address returned.
    pub fn resolve(server: &str) -> crate::Result<Self> {
        let invalid = |reason: String| crate::Error::InvalidAddress {
            addr: server.to_string(),
            reason,
        };
        let mut addrs = server
            .to_socket_addrs()
            .map_err(|e| invalid(e.to_string()))?;
        addrs
            .next()
            .map(Self)
            .ok_or_else(|| invalid("no addresses resolved".into()))
    }

    /// Resolve a `host:port` string without blocking the runtime.
    pub async fn lookup(server: &str) -> crate::Result<Self> {
        let invalid = |reason: String| crate::Error::InvalidAddress {
            addr: server.to_string(),
            reason,
        };
        let mut addrs = tokio::net::lookup_host(server)
            .await
            .map_err(|e| invalid(e.to_string()))?;
        addrs
            .next()
            .map(Self)
            .ok_or_else(|| invalid("no addresses resolved".into()))
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl FromStr for Address {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        s.parse::<SocketAddr>()
            .map(Self)
            .map_err(|e| crate::Error::InvalidAddress {
                addr: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An item to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    pub value: Bytes,
    /// Opaque server-side flags
    pub flags: u32,
    /// Expiration in seconds; zero means no expiration
    pub expiration: i32,
    /// Token from a previous get, required by compare-and-swap
    pub cas_id: Option<u64>,
}

impl Item {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            flags: 0,
            expiration: 0,
            cas_id: None,
        }
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_expiration(mut self, seconds: i32) -> Self {
        self.expiration = seconds;
        self
    }

    pub fn with_cas(mut self, cas_id: u64) -> Self {
        self.cas_id = Some(cas_id);
        self
    }
}

/// Counter mutation verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Incr,
    Decr,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Incr => "incr",
            Verb::Decr => "decr",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
