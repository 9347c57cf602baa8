//! Error types for rwcache

use crate::common::Address;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connect to {0} timed out")]
    ConnectTimeout(Address),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    // === Protocol Errors ===
    #[error("Cache miss")]
    CacheMiss,

    #[error("Item not stored")]
    NotStored,

    #[error("Compare-and-swap conflict")]
    CasConflict,

    #[error("Malformed key: {0:?}")]
    MalformedKey(String),

    #[error("Compare-and-swap requires a cas token (key = {0})")]
    MissingCasToken(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Client error: {0}")]
    ClientError(String),

    #[error("Unexpected response: {0:?}")]
    Protocol(String),

    // === Fan-out Errors ===
    #[error("No backend servers configured")]
    NoBackends,

    #[error("Operation failed on all {} backends for key = {key}", .causes.len())]
    AllBackendsFailed {
        key: String,
        causes: Vec<BackendFailure>,
    },

    #[error("Backend task failed: {0}")]
    TaskFailed(String),

    // === Config Errors ===
    #[error("Invalid address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

/// One backend's failure inside a fan-out.
#[derive(Error, Debug)]
#[error("{address}: {cause}")]
pub struct BackendFailure {
    pub address: Address,
    #[source]
    pub cause: Error,
}

impl BackendFailure {
    pub fn new(address: Address, cause: Error) -> Self {
        Self { address, cause }
    }
}

impl Error {
    /// Errors after which the connection's stream is still in a clean state
    /// and may go back to the idle list.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            Error::CacheMiss | Error::NotStored | Error::CasConflict | Error::MalformedKey(_)
        )
    }

    /// Per-backend causes carried by an aggregate failure.
    pub fn causes(&self) -> &[BackendFailure] {
        match self {
            Error::AllBackendsFailed { causes, .. } => causes,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resumable() {
        assert!(Error::CacheMiss.is_resumable());
        assert!(Error::CasConflict.is_resumable());
        assert!(!Error::Protocol("garbage".into()).is_resumable());
        assert!(!Error::Io(std::io::ErrorKind::BrokenPipe.into()).is_resumable());
    }

    #[test]
    fn test_all_failed_message() {
        let addr: Address = "127.0.0.1:11211".parse().unwrap();
        let err = Error::AllBackendsFailed {
            key: "k".into(),
            causes: vec![
                BackendFailure::new(addr, Error::NotStored),
                BackendFailure::new(addr, Error::CacheMiss),
            ],
        };
        assert_eq!(err.to_string(), "Operation failed on all 2 backends for key = k");
        assert_eq!(err.causes().len(), 2);
        assert!(Error::NoBackends.causes().is_empty());
    }
}
