//! Redundant write coordination
//!
//! The coordinator is responsible for:
//! - Holding the set of backend servers (registry)
//! - Fanning every write out to all of them
//! - Reducing per-server outcomes to a single verdict

pub mod aggregator;
pub mod redundant;
pub mod registry;

pub use aggregator::{ErrorAggregator, FanoutVerdict, OperationOutcome};
pub use redundant::{Client, RedundantWriteCoordinator, StoreOp};
pub use registry::{AddressRegistry, ServerList, Snapshot};
