//! Redundant write coordinator
//!
//! Every mutation is sent to every registered server:
//! - `set`, `add` and `compare_and_swap` fan out in parallel, one task per
//!   server, while holding the registry's read lock. The call waits for every
//!   task and succeeds when at least one server took the write.
//! - `delete` and `increment_or_decrement` walk the servers one at a time
//!   over a copy of the list, without holding the lock while they walk.

use crate::backend::{CacheConn, ConnectionManager, PooledConn, TcpConnectionManager};
use crate::common::{validate_key, Address, Config, Error, Item, Result, Verb};
use crate::coordinator::aggregator::{ErrorAggregator, FanoutVerdict, OperationOutcome};
use crate::coordinator::registry::{AddressRegistry, ServerList};
use std::fmt;
use std::sync::Arc;

/// Client over real memcached servers
pub type Client = RedundantWriteCoordinator<TcpConnectionManager, ServerList>;

/// Storage commands that share the parallel fan-out path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Set,
    Add,
    CompareAndSwap,
}

impl StoreOp {
    async fn apply<C: CacheConn>(self, conn: &mut C, item: &Item) -> Result<()> {
        match self {
            StoreOp::Set => conn.set(item).await,
            StoreOp::Add => conn.add(item).await,
            StoreOp::CompareAndSwap => conn.compare_and_swap(item).await,
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOp::Set => write!(f, "set"),
            StoreOp::Add => write!(f, "add"),
            StoreOp::CompareAndSwap => write!(f, "cas"),
        }
    }
}

pub struct RedundantWriteCoordinator<M: ConnectionManager, R: AddressRegistry = ServerList> {
    registry: Arc<R>,
    manager: Arc<M>,
}

impl Client {
    /// Build a client for the servers listed in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let registry = ServerList::from_servers(&config.servers)?;
        let manager = TcpConnectionManager::from_config(config);
        Ok(Self::new(Arc::new(registry), Arc::new(manager)))
    }
}

impl<M: ConnectionManager, R: AddressRegistry> RedundantWriteCoordinator<M, R> {
    pub fn new(registry: Arc<R>, manager: Arc<M>) -> Self {
        Self { registry, manager }
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    pub fn manager(&self) -> &Arc<M> {
        &self.manager
    }

    /// Replace the backend set. Waits for in-flight parallel fan-outs, then
    /// closes idle connections to servers that are no longer listed.
    pub async fn reconfigure(&self, addresses: Vec<Address>) {
        self.registry.reconfigure(addresses).await;
        let current = self.registry.addresses().await;
        self.manager.retain(&current);
    }

    pub async fn set(&self, item: Item) -> Result<()> {
        self.store(StoreOp::Set, item).await
    }

    pub async fn add(&self, item: Item) -> Result<()> {
        self.store(StoreOp::Add, item).await
    }

    pub async fn compare_and_swap(&self, item: Item) -> Result<()> {
        if item.cas_id.is_none() {
            return Err(Error::MissingCasToken(item.key));
        }
        self.store(StoreOp::CompareAndSwap, item).await
    }

    async fn store(&self, op: StoreOp, item: Item) -> Result<()> {
        validate_key(&item.key)?;
        let key = item.key.clone();
        self.fan_out(op, Arc::new(item))
            .await?
            .into_result(&key)
    }

    /// Run `op` on every server concurrently and wait for all of them.
    ///
    /// The snapshot's read lock is tied to this future. If the caller drops it
    /// during the join, the lock is released while the spawned tasks keep
    /// writing, so a `reconfigure` can complete before those writes land.
    pub(crate) async fn fan_out(&self, op: StoreOp, item: Arc<Item>) -> Result<FanoutVerdict> {
        // Held until every task has reported.
        let addrs = self.registry.snapshot().await;
        if addrs.is_empty() {
            return Err(Error::NoBackends);
        }

        let handles: Vec<_> = addrs
            .iter()
            .map(|&addr| {
                let manager = Arc::clone(&self.manager);
                let item = Arc::clone(&item);
                let handle = tokio::spawn(async move {
                    let mut conn = PooledConn::acquire(manager, &addr).await?;
                    let result = op.apply(&mut *conn, &item).await;
                    conn.finish(result)
                });
                (addr, handle)
            })
            .collect();

        let mut aggregator = ErrorAggregator::new(&addrs);
        for (addr, handle) in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(Error::TaskFailed(e.to_string())));
            aggregator.record(OperationOutcome::from_result(addr, result));
        }

        let verdict = aggregator.verdict();
        for failure in verdict.failures() {
            tracing::warn!(
                "{} failed on {} for key = {}: {}",
                op,
                failure.address,
                item.key,
                failure.cause
            );
        }
        tracing::debug!(
            "{} key = {}: {}/{} servers failed",
            op,
            item.key,
            verdict.failures().len(),
            verdict.attempted()
        );

        Ok(verdict)
    }

    /// Delete `key` from every server, one after another.
    ///
    /// Succeeds if any server deleted it; if all failed, returns the error
    /// from the last server. With no servers configured there is nothing to
    /// fail, so the call succeeds. The list is copied up front and not locked
    /// while it is walked, so a concurrent `reconfigure` can take effect
    /// mid-walk; this call keeps visiting the servers it copied.
    pub async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let addrs = self.registry.addresses().await;

        let mut failures = 0;
        let mut last_err = None;
        for addr in &addrs {
            let result = async {
                let mut conn = PooledConn::acquire(Arc::clone(&self.manager), addr).await?;
                let result = conn.delete(key).await;
                conn.finish(result)
            }
            .await;

            if let Err(e) = result {
                tracing::warn!("delete failed on {} for key = {}: {}", addr, key, e);
                failures += 1;
                last_err = Some(e);
            }
        }

        match last_err {
            Some(err) if failures == addrs.len() => Err(err),
            _ => Ok(()),
        }
    }

    /// Apply `verb` with `delta` to the counter at `key` on every server, in order.
    ///
    /// NOTE: the value or error returned is the one from the LAST server
    /// visited. Earlier results, successes and failures alike, are logged and
    /// then discarded, so replicas that disagree are not detected. Like
    /// `delete`, the walk runs over an unlocked copy of the server list.
    /// With no servers configured the result is `Ok(0)`.
    pub async fn increment_or_decrement(&self, verb: Verb, key: &str, delta: u64) -> Result<u64> {
        validate_key(key)?;
        let addrs = self.registry.addresses().await;

        let mut last = Ok(0);
        for addr in &addrs {
            last = async {
                let mut conn = PooledConn::acquire(Arc::clone(&self.manager), addr).await?;
                let result = conn.incr_decr(verb, key, delta).await;
                conn.finish(result)
            }
            .await;

            if let Err(e) = &last {
                tracing::warn!("{} failed on {} for key = {}: {}", verb, addr, key, e);
            }
        }
        last
    }

    pub async fn increment(&self, key: &str, delta: u64) -> Result<u64> {
        self.increment_or_decrement(Verb::Incr, key, delta).await
    }

    pub async fn decrement(&self, key: &str, delta: u64) -> Result<u64> {
        self.increment_or_decrement(Verb::Decr, key, delta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::io::Write;
    use tracing_subscriber::fmt::MakeWriter;

    const BROKEN_PORT: u16 = 2;

    struct FlakyConn {
        addr: Address,
    }

    impl FlakyConn {
        fn outcome(&self) -> Result<()> {
            if self.addr.socket_addr().port() == BROKEN_PORT {
                Err(Error::ServerError("out of memory".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CacheConn for FlakyConn {
        async fn set(&mut self, _item: &Item) -> Result<()> {
            self.outcome()
        }
        async fn add(&mut self, _item: &Item) -> Result<()> {
            self.outcome()
        }
        async fn compare_and_swap(&mut self, _item: &Item) -> Result<()> {
            self.outcome()
        }
        async fn delete(&mut self, _key: &str) -> Result<()> {
            self.outcome()
        }
        async fn incr_decr(&mut self, _verb: Verb, _key: &str, _delta: u64) -> Result<u64> {
            self.outcome().map(|_| 1)
        }
    }

    struct FlakyManager;

    #[async_trait]
    impl ConnectionManager for FlakyManager {
        type Conn = FlakyConn;

        async fn acquire(&self, addr: &Address) -> Result<FlakyConn> {
            Ok(FlakyConn { addr: *addr })
        }

        fn release(&self, _conn: FlakyConn, _failed: bool) {}
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn coordinator() -> RedundantWriteCoordinator<FlakyManager> {
        let addrs = (1..=3)
            .map(|port| format!("127.0.0.1:{}", port).parse().unwrap())
            .collect();
        RedundantWriteCoordinator::new(Arc::new(ServerList::new(addrs)), Arc::new(FlakyManager))
    }

    #[tokio::test]
    async fn test_minority_failure_is_logged_not_returned() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let coord = coordinator();
        coord.set(Item::new("k", "v")).await.unwrap();

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        let failures: Vec<&str> = output.lines().filter(|l| l.contains("failed on")).collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("127.0.0.1:2"));
        assert!(failures[0].contains("key = k"));
    }

    #[tokio::test]
    async fn test_verdict_names_failed_server() {
        let coord = coordinator();
        let verdict = coord
            .fan_out(StoreOp::Add, Arc::new(Item::new("k", "v")))
            .await
            .unwrap();

        assert_eq!(verdict.attempted(), 3);
        assert_eq!(verdict.failures().len(), 1);
        assert_eq!(verdict.failures()[0].address.socket_addr().port(), BROKEN_PORT);
        assert!(matches!(verdict.failures()[0].cause, Error::ServerError(_)));
    }

    #[tokio::test]
    async fn test_invalid_key_rejected_before_io() {
        let coord = coordinator();
        assert!(matches!(
            coord.set(Item::new("", "v")).await,
            Err(Error::MalformedKey(_))
        ));
        assert!(matches!(coord.delete("a b").await, Err(Error::MalformedKey(_))));
    }

    #[tokio::test]
    async fn test_cas_without_token() {
        let coord = coordinator();
        assert!(matches!(
            coord.compare_and_swap(Item::new("k", "v")).await,
            Err(Error::MissingCasToken(_))
        ));
        coord
            .compare_and_swap(Item::new("k", "v").with_cas(7))
            .await
            .unwrap();
    }
}
