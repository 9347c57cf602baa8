//! TCP connection manager with a bounded idle list per server

use crate::backend::connection::ConnectionManager;
use crate::backend::memcache::MemcacheConn;
use crate::common::{Address, Config, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

pub struct TcpConnectionManager {
    timeout: Duration,
    max_idle_conns: usize,
    idle: Mutex<HashMap<Address, Vec<MemcacheConn>>>,
}

impl TcpConnectionManager {
    pub fn new(timeout: Duration, max_idle_conns: usize) -> Self {
        Self {
            timeout,
            max_idle_conns,
            idle: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.timeout(), config.max_idle_conns)
    }

    /// Number of idle connections currently pooled for `addr`
    pub fn idle_count(&self, addr: &Address) -> usize {
        self.idle.lock().get(addr).map_or(0, Vec::len)
    }
}

#[async_trait]
impl ConnectionManager for TcpConnectionManager {
    type Conn = MemcacheConn;

    async fn acquire(&self, addr: &Address) -> Result<MemcacheConn> {
        let pooled = self.idle.lock().get_mut(addr).and_then(Vec::pop);
        if let Some(conn) = pooled {
            return Ok(conn);
        }

        tracing::debug!("Dialing {}", addr);
        MemcacheConn::connect(*addr, self.timeout).await
    }

    fn release(&self, conn: MemcacheConn, failed: bool) {
        if failed {
            tracing::debug!("Discarding connection to {}", conn.address());
            return;
        }

        let mut idle = self.idle.lock();
        let conns = idle.entry(conn.address()).or_default();
        if conns.len() < self.max_idle_conns {
            conns.push(conn);
        }
    }

    fn retain(&self, addresses: &[Address]) {
        self.idle.lock().retain(|addr, conns| {
            let keep = addresses.contains(addr);
            if !keep {
                tracing::debug!("Closing {} idle connections to {}", conns.len(), addr);
            }
            keep
        });
    }
}
