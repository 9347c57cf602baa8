//! # rwcache
//!
//! A memcached client that writes every mutation to all configured servers:
//! - Parallel fan-out for `set`, `add` and `cas`, tolerant of any failure
//!   short of every server failing
//! - Sequential `delete` and `incr`/`decr` across the same servers
//! - Runtime reconfiguration of the server list
//! - Pooled TCP connections, discarded whenever an operation leaves them dirty
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────────────────────┐
//!   set/add/cas  │  RedundantWriteCoordinator   │  delete/incr/decr
//!  ─────────────►│  (registry read-locked for   │◄─────────────────
//!                │   the whole fan-out)         │
//!                └──────┬─────────┬─────────┬───┘
//!                 task  │   task  │   task  │   one per server
//!                ┌──────▼──┐ ┌────▼────┐ ┌──▼──────┐
//!                │ server A │ │ server B│ │ server C│
//!                └──────────┘ └─────────┘ └─────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! # async fn run() -> rwcache::Result<()> {
//! use rwcache::{Client, Config, Item};
//!
//! let config = Config {
//!     servers: vec!["10.0.0.1:11211".into(), "10.0.0.2:11211".into()],
//!     ..Default::default()
//! };
//! let client = Client::from_config(&config)?;
//! client.set(Item::new("greeting", "hello").with_expiration(60)).await?;
//! let hits = client.increment("hits", 1).await?;
//! # let _ = hits;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod common;
pub mod coordinator;

// Re-export commonly used types
pub use common::{Address, Config, Error, Item, Result, Verb};
pub use coordinator::{Client, RedundantWriteCoordinator};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
