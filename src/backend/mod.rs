//! Backend side of the client
//!
//! - `connection`: the seams the coordinator talks through (connection
//!   manager, per-connection protocol operations, scoped release)
//! - `memcache`: memcached text protocol over a TCP stream
//! - `pool`: TCP connection manager keeping a few idle connections per server

pub mod connection;
pub mod memcache;
pub mod pool;

pub use connection::{CacheConn, ConnectionManager, PooledConn};
pub use memcache::MemcacheConn;
pub use pool::TcpConnectionManager;
