use libtrade::TradePolicy;
use log::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "coordinator.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration file: {0}")]
    Serde(#[from] serde_yml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Coordinator settings. Every field has a default, so a config file only needs the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Seconds the peer may stay silent before the uncooperative closure path opens.
    pub peer_response_timeout_secs: u64,
    /// Deposit confirmations required before the seller signs the swap tx.
    pub required_confirmations: u32,
    /// Relative timelock on the redirect tx, in blocks.
    pub redirect_timelock_blocks: u16,
    pub confirmation_poll_interval_secs: u64,
    /// Where closed trades are archived. No archive is kept if absent.
    pub archive_dir: Option<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            peer_response_timeout_secs: 600,
            required_confirmations: 1,
            redirect_timelock_blocks: 144,
            confirmation_poll_interval_secs: 30,
            archive_dir: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading coordinator config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_yml(&text)
    }

    pub fn from_yml(text: &str) -> Result<Self, ConfigError> {
        let config: CoordinatorConfig = serde_yml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let text = serde_yml::to_string(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.peer_response_timeout_secs == 0 {
            return Err(ConfigError::Invalid("peer_response_timeout_secs must be positive".into()));
        }
        if self.required_confirmations == 0 {
            return Err(ConfigError::Invalid("required_confirmations must be positive".into()));
        }
        if self.redirect_timelock_blocks == 0 {
            return Err(ConfigError::Invalid("redirect_timelock_blocks must be positive".into()));
        }
        if self.confirmation_poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("confirmation_poll_interval_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn peer_response_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_response_timeout_secs)
    }

    pub fn confirmation_poll_interval(&self) -> Duration {
        Duration::from_secs(self.confirmation_poll_interval_secs)
    }

    /// The protocol parameters every new trade session gets.
    pub fn policy(&self) -> TradePolicy {
        TradePolicy {
            peer_response_timeout: self.peer_response_timeout(),
            required_confirmations: self.required_confirmations,
            redirect_timelock_blocks: self.redirect_timelock_blocks,
        }
    }
}
