use std::time::Duration;

/// Retry budget of a single transaction.
///
/// Owned by exactly one transaction; the counter only moves forward and
/// never passes `max_retries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    timeout: Duration,
    max_retries: u32,
    retries: u32,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            retries: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Retransmissions performed so far
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn remaining(&self) -> u32 {
        self.max_retries - self.retries
    }

    pub fn is_exhausted(&self) -> bool {
        self.retries >= self.max_retries
    }

    /// Takes one retry from the budget. Returns false, leaving the counter
    /// untouched, once the budget is spent.
    pub fn consume(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.retries += 1;
        true
    }
}
