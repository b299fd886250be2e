//! Server configuration.

use remision_core::LedgerConfig;

/// Configuration for the API server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
    /// Most records returned by `get-history`; `None` returns all.
    pub history_limit: Option<usize>,
    /// Issuing and retry settings.
    pub ledger: LedgerConfig,
}

impl ServerConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
            history_limit: None,
            ledger: LedgerConfig::default(),
        }
    }

    /// Sets the body size limit.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Caps the number of history records returned.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Sets the ledger configuration.
    #[must_use]
    pub fn with_ledger(mut self, ledger: LedgerConfig) -> Self {
        self.ledger = ledger;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
