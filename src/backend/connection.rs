//! Connection acquisition and the per-connection protocol operations

use crate::common::{Address, Item, Result, Verb};
use async_trait::async_trait;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Mutations a single backend connection can perform.
#[async_trait]
pub trait CacheConn: Send + 'static {
    async fn set(&mut self, item: &Item) -> Result<()>;

    async fn add(&mut self, item: &Item) -> Result<()>;

    async fn compare_and_swap(&mut self, item: &Item) -> Result<()>;

    async fn delete(&mut self, key: &str) -> Result<()>;

    /// Returns the counter value after the mutation.
    async fn incr_decr(&mut self, verb: Verb, key: &str, delta: u64) -> Result<u64>;
}

/// Hands out connections for an address and takes them back.
#[async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    type Conn: CacheConn;

    async fn acquire(&self, addr: &Address) -> Result<Self::Conn>;

    /// Pool the connection when `failed` is false, drop it otherwise.
    fn release(&self, conn: Self::Conn, failed: bool);

    /// Drop pooled connections to servers not in `addresses`.
    fn retain(&self, _addresses: &[Address]) {}
}

/// A connection checked out of a [`ConnectionManager`].
///
/// Released when dropped. Unless [`PooledConn::finish`] recorded a clean
/// outcome, the release is flagged as failed, so a connection abandoned by a
/// panic or a cancelled future never goes back to the pool.
pub struct PooledConn<M: ConnectionManager> {
    manager: Arc<M>,
    conn: Option<M::Conn>,
    failed: bool,
}

impl<M: ConnectionManager> PooledConn<M> {
    pub async fn acquire(manager: Arc<M>, addr: &Address) -> Result<Self> {
        let conn = manager.acquire(addr).await?;
        Ok(Self {
            manager,
            conn: Some(conn),
            failed: true,
        })
    }

    /// Record the outcome of the work done on this connection and release it.
    ///
    /// Resumable errors (cache miss, not stored, cas conflict) leave the
    /// stream in sync, so the connection still goes back to the pool.
    pub fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        self.failed = matches!(&result, Err(e) if !e.is_resumable());
        result
    }
}

impl<M: ConnectionManager> Deref for PooledConn<M> {
    type Target = M::Conn;

    fn deref(&self) -> &M::Conn {
        self.conn.as_ref().expect("connection is held until drop")
    }
}

impl<M: ConnectionManager> DerefMut for PooledConn<M> {
    fn deref_mut(&mut self) -> &mut M::Conn {
        self.conn.as_mut().expect("connection is held until drop")
    }
}

impl<M: ConnectionManager> Drop for PooledConn<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.manager.release(conn, self.failed);
        }
    }
}
