//! Ledger and relay configuration.

use crate::retry::RetryConfig;
use std::time::Duration;

/// Default IVA rate applied to new documents.
pub const DEFAULT_TAX_RATE: f64 = 0.16;

/// Configuration for issuing and mutating records.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Tax rate used when a draft does not carry one.
    pub tax_rate: f64,

    /// Retry policy for whole allocate-and-append attempts.
    pub retry: RetryConfig,

    /// Retry policy for the record append once a number is reserved.
    ///
    /// Only used by split adapters, where the counter and the records are
    /// committed separately.
    pub append_retry: RetryConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            tax_rate: DEFAULT_TAX_RATE,
            retry: RetryConfig::new(5),
            append_retry: RetryConfig::new(8).with_initial_delay(Duration::from_millis(20)),
        }
    }
}

impl LedgerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default tax rate.
    #[must_use]
    pub const fn tax_rate(mut self, rate: f64) -> Self {
        self.tax_rate = rate;
        self
    }

    /// Sets the retry policy for whole attempts.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the retry policy for reserved-number appends.
    #[must_use]
    pub fn append_retry(mut self, retry: RetryConfig) -> Self {
        self.append_retry = retry;
        self
    }
}

/// Configuration for waiting on an external workflow.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Poll schedule. `max_attempts` bounds the number of polls.
    pub poll: RetryConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll: RetryConfig::new(10)
                .with_initial_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(8)),
        }
    }
}

impl RelayConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll schedule.
    #[must_use]
    pub fn poll(mut self, poll: RetryConfig) -> Self {
        self.poll = poll;
        self
    }
}
