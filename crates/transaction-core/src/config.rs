//! Transaction configuration.
//!
//! ```rust
//! use std::time::Duration;
//! use pktx_transaction_core::TransactionConfig;
//!
//! let config = TransactionConfig::from_toml_str(r#"
//!     timeout_ms = 250
//!     retries = 3
//! "#).unwrap();
//!
//! assert_eq!(config.timeout, Duration::from_millis(250));
//! assert_eq!(config.retries, 3);
//! assert_eq!(config.listener_priority, 100);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default wait for a response before retransmitting
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default number of retransmissions after the first attempt
pub const DEFAULT_RETRIES: u32 = 1;

/// Default listener priority; ahead of general-purpose listeners at 0
pub const DEFAULT_LISTENER_PRIORITY: i32 = 100;

/// Timing and dispatch settings for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// How long each attempt waits for a response
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,

    /// Retransmissions allowed after the first attempt
    pub retries: u32,

    /// Priority of the transaction's listener on the shared socket
    pub listener_priority: i32,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            listener_priority: DEFAULT_LISTENER_PRIORITY,
        }
    }
}

impl TransactionConfig {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            timeout,
            retries,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_listener_priority(mut self, priority: i32) -> Self {
        self.listener_priority = priority;
        self
    }

    /// Parses and validates a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Latest point, relative to the first transmission, at which an
    /// unanswered transaction gives up
    pub fn worst_case_duration(&self) -> Duration {
        self.timeout.saturating_mul(self.retries.saturating_add(1))
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
