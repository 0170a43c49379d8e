//! Bridge configuration.
//!
//! Both bridge halves take a [`BridgeConfig`]. Defaults are usable as-is; a
//! host application can also load one from TOML:
//!
//! ```toml
//! handshake_timeout_ms = 2000
//! max_pending = 256
//! batch_updates = true
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::{BridgeError, Result};

pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_PENDING: usize = 1_024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// How long a channel may stay un-opened before `check_handshake` fails.
    pub handshake_timeout_ms: u64,
    /// Bound on envelopes buffered before the channel opens.
    pub max_pending: usize,
    /// Coalesce the envelopes produced in one turn into a single batch.
    pub batch_updates: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            max_pending: DEFAULT_MAX_PENDING,
            batch_updates: true,
        }
    }
}

impl BridgeConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: BridgeConfig =
            toml::from_str(source).map_err(|err| BridgeError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pending == 0 {
            return Err(BridgeError::Config("max_pending must be at least 1".into()));
        }
        if self.handshake_timeout_ms == 0 {
            return Err(BridgeError::Config(
                "handshake_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
