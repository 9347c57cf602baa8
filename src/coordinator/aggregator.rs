//! Reduction of per-server outcomes to one verdict

use crate::common::{Address, BackendFailure, Error, Result};

/// What happened on one server during a fan-out.
#[derive(Debug)]
pub enum OperationOutcome {
    Succeeded(Address),
    Failed(BackendFailure),
}

impl OperationOutcome {
    pub fn from_result(address: Address, result: Result<()>) -> Self {
        match result {
            Ok(()) => OperationOutcome::Succeeded(address),
            Err(cause) => OperationOutcome::Failed(BackendFailure::new(address, cause)),
        }
    }
}

/// Collects exactly one outcome per server of a fan-out.
#[derive(Debug)]
pub struct ErrorAggregator {
    expected: Vec<Address>,
    succeeded: Vec<Address>,
    failures: Vec<BackendFailure>,
}

impl ErrorAggregator {
    pub fn new(addresses: &[Address]) -> Self {
        Self {
            expected: addresses.to_vec(),
            succeeded: Vec::with_capacity(addresses.len()),
            failures: Vec::with_capacity(addresses.len()),
        }
    }

    pub fn record(&mut self, outcome: OperationOutcome) {
        debug_assert!(!self.is_complete(), "more outcomes than servers");
        match outcome {
            OperationOutcome::Succeeded(address) => self.succeeded.push(address),
            OperationOutcome::Failed(failure) => self.failures.push(failure),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded.len() + self.failures.len() >= self.expected.len()
    }

    /// Render the verdict. Call only once every task has reported; a server
    /// that never reported cannot have succeeded and counts as failed.
    pub fn verdict(mut self) -> FanoutVerdict {
        if !self.is_complete() {
            let missing: Vec<Address> = self
                .expected
                .iter()
                .filter(|addr| {
                    !self.succeeded.contains(addr)
                        && !self.failures.iter().any(|f| f.address == **addr)
                })
                .copied()
                .collect();
            for address in missing {
                self.failures.push(BackendFailure::new(
                    address,
                    Error::TaskFailed("no outcome reported".into()),
                ));
            }
        }

        FanoutVerdict {
            attempted: self.expected.len(),
            failures: self.failures,
        }
    }
}

/// Result of one fan-out.
#[derive(Debug)]
pub struct FanoutVerdict {
    attempted: usize,
    failures: Vec<BackendFailure>,
}

impl FanoutVerdict {
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn failures(&self) -> &[BackendFailure] {
        &self.failures
    }

    /// At least one server took the write.
    pub fn succeeded(&self) -> bool {
        self.failures.len() < self.attempted
    }

    /// Partial failures are swallowed; only a total failure becomes an error.
    pub fn into_result(self, key: &str) -> Result<()> {
        if self.succeeded() {
            Ok(())
        } else {
            Err(Error::AllBackendsFailed {
                key: key.to_string(),
                causes: self.failures,
            })
        }
    }
}
